// The MIT License (MIT)
//
// Copyright (c) 2016 AT&T
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustc_serialize::json::Json;

use super::{id_value, object};

#[derive(Clone, Debug, PartialEq)]
pub struct Filters {
    pub refuse_seconds: Option<f64>,
}

impl Filters {
    pub fn refuse_seconds(seconds: f64) -> Filters {
        Filters { refuse_seconds: Some(seconds) }
    }

    fn to_json(&self) -> Json {
        let mut pairs = vec![];
        if let Some(seconds) = self.refuse_seconds {
            pairs.push(("refuse_seconds", Json::F64(seconds)));
        }
        object(pairs)
    }
}

/// A task the master should report the latest state of.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconcileTask {
    pub task_id: String,
    pub agent_id: Option<String>,
}

impl ReconcileTask {
    pub fn new(task_id: &str, agent_id: &str) -> ReconcileTask {
        ReconcileTask {
            task_id: task_id.to_string(),
            agent_id: Some(agent_id.to_string()),
        }
    }

    fn to_json(&self) -> Json {
        let mut pairs = vec![("task_id", id_value(&self.task_id))];
        if let Some(ref agent_id) = self.agent_id {
            pairs.push(("agent_id", id_value(agent_id)));
        }
        object(pairs)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerCall {
    /// Carries the complete `subscribe` object.
    Subscribe(Json),
    Teardown,
    Accept {
        offer_ids: Vec<String>,
        operations: Vec<Json>,
        filters: Option<Filters>,
    },
    Decline {
        offer_ids: Vec<String>,
        filters: Option<Filters>,
    },
    Request(Vec<Json>),
    Revive,
    Kill { agent_id: String, task_id: String },
    Shutdown { agent_id: String, executor_id: String },
    Message {
        agent_id: String,
        executor_id: String,
        data: Vec<u8>,
    },
    Reconcile(Vec<ReconcileTask>),
    Acknowledge {
        agent_id: String,
        task_id: String,
        uuid: String,
    },
}

impl SchedulerCall {
    pub fn name(&self) -> &'static str {
        match *self {
            SchedulerCall::Subscribe(_) => "SUBSCRIBE",
            SchedulerCall::Teardown => "TEARDOWN",
            SchedulerCall::Accept { .. } => "ACCEPT",
            SchedulerCall::Decline { .. } => "DECLINE",
            SchedulerCall::Request(_) => "REQUEST",
            SchedulerCall::Revive => "REVIVE",
            SchedulerCall::Kill { .. } => "KILL",
            SchedulerCall::Shutdown { .. } => "SHUTDOWN",
            SchedulerCall::Message { .. } => "MESSAGE",
            SchedulerCall::Reconcile(_) => "RECONCILE",
            SchedulerCall::Acknowledge { .. } => "ACKNOWLEDGE",
        }
    }

    /// Builds `{framework_id, type, <type field>}`.
    pub fn to_json(&self, framework_id: Option<&str>) -> Json {
        let mut pairs = vec![("type", Json::String(self.name().to_string()))];
        if let Some(id) = framework_id {
            pairs.push(("framework_id", id_value(id)));
        }
        if let Some((field, payload)) = self.payload() {
            pairs.push((field, payload));
        }
        object(pairs)
    }

    fn payload(&self) -> Option<(&'static str, Json)> {
        match *self {
            SchedulerCall::Subscribe(ref subscribe) => Some(("subscribe", subscribe.clone())),
            SchedulerCall::Teardown | SchedulerCall::Revive => None,
            SchedulerCall::Accept { ref offer_ids, ref operations, ref filters } => {
                let launch = object(vec![
                    ("type", Json::String("LAUNCH".to_string())),
                    ("launch", object(vec![("task_infos", Json::Array(operations.clone()))])),
                ]);
                let mut pairs = vec![("offer_ids", id_list(offer_ids)), ("operations", Json::Array(vec![launch]))];
                if let Some(ref filters) = *filters {
                    pairs.push(("filters", filters.to_json()));
                }
                Some(("accept", object(pairs)))
            }
            SchedulerCall::Decline { ref offer_ids, ref filters } => {
                let mut pairs = vec![("offer_ids", id_list(offer_ids))];
                if let Some(ref filters) = *filters {
                    pairs.push(("filters", filters.to_json()));
                }
                Some(("decline", object(pairs)))
            }
            SchedulerCall::Request(ref requests) => {
                Some(("request", object(vec![("requests", Json::Array(requests.clone()))])))
            }
            SchedulerCall::Kill { ref agent_id, ref task_id } => Some((
                "kill",
                object(vec![("task_id", id_value(task_id)), ("agent_id", id_value(agent_id))]),
            )),
            SchedulerCall::Shutdown { ref agent_id, ref executor_id } => Some((
                "shutdown",
                object(vec![("executor_id", id_value(executor_id)), ("agent_id", id_value(agent_id))]),
            )),
            SchedulerCall::Message { ref agent_id, ref executor_id, ref data } => Some((
                "message",
                object(vec![
                    ("agent_id", id_value(agent_id)),
                    ("executor_id", id_value(executor_id)),
                    ("data", Json::String(STANDARD.encode(data))),
                ]),
            )),
            SchedulerCall::Reconcile(ref tasks) => {
                let tasks = tasks.iter().map(|task| task.to_json()).collect();
                Some(("reconcile", object(vec![("tasks", Json::Array(tasks))])))
            }
            SchedulerCall::Acknowledge { ref agent_id, ref task_id, ref uuid } => Some((
                "acknowledge",
                object(vec![
                    ("agent_id", id_value(agent_id)),
                    ("task_id", id_value(task_id)),
                    ("uuid", Json::String(uuid.clone())),
                ]),
            )),
        }
    }
}

fn id_list(ids: &[String]) -> Json {
    Json::Array(ids.iter().map(|id| id_value(id)).collect())
}
