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

use std::fmt;
use std::sync::Arc;

use rustc_serialize::json::Json;

use super::session::{MasterLink, Session};
use crate::error::{CallError, ProtocolError};
use crate::protocol::calls::{Filters, ReconcileTask, SchedulerCall};
use crate::protocol::{id_value, value_of};

/// Sends scheduler calls on behalf of one session generation.
///
/// Cheap to clone. Once a newer generation is live every call fails with `StaleSession`.
#[derive(Clone)]
pub struct SchedulerDriver {
    link: Arc<MasterLink>,
    session: Arc<Session>,
}

impl fmt::Debug for SchedulerDriver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SchedulerDriver").field("session", &self.session).finish()
    }
}

impl SchedulerDriver {
    pub fn new(link: Arc<MasterLink>, session: Arc<Session>) -> SchedulerDriver {
        SchedulerDriver {
            link: link,
            session: session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn framework_id(&self) -> Option<&str> {
        self.session.framework_id()
    }

    fn send(&self, call: SchedulerCall) -> Result<(), CallError> {
        self.link.send(&self.session, &call)
    }

    /// Best effort: failures are logged and swallowed.
    pub fn teardown(&self) {
        info!("tearing down framework {:?}", self.session.framework_id());
        if let Err(err) = self.send(SchedulerCall::Teardown) {
            warn!("teardown failed: {}", err);
        }
    }

    /// Accepts several offers with one call, launching every operation as one LAUNCH.
    ///
    /// When all offers come from the same agent, operations without an agent id get that one.
    pub fn accept_offers(&self, offers: &[Offer], operations: Vec<Json>, filters: Option<Filters>)
                         -> Result<(), CallError> {
        let operations = match offers.split_first() {
            Some((first, rest)) if rest.iter().all(|offer| offer.agent_id == first.agent_id) => {
                with_agent_id(operations, &first.agent_id)
            }
            _ => operations,
        };
        self.send(SchedulerCall::Accept {
            offer_ids: offers.iter().map(|offer| offer.id.clone()).collect(),
            operations: operations,
            filters: filters,
        })
    }

    pub fn decline(&self, offer_ids: Vec<String>, filters: Option<Filters>) -> Result<(), CallError> {
        self.send(SchedulerCall::Decline {
            offer_ids: offer_ids,
            filters: filters,
        })
    }

    pub fn request(&self, requests: Vec<Json>) -> Result<(), CallError> {
        self.send(SchedulerCall::Request(requests))
    }

    pub fn revive(&self) -> Result<(), CallError> {
        self.send(SchedulerCall::Revive)
    }

    pub fn kill(&self, agent_id: &str, task_id: &str) -> Result<(), CallError> {
        self.send(SchedulerCall::Kill {
            agent_id: agent_id.to_string(),
            task_id: task_id.to_string(),
        })
    }

    pub fn shutdown(&self, agent_id: &str, executor_id: &str) -> Result<(), CallError> {
        self.send(SchedulerCall::Shutdown {
            agent_id: agent_id.to_string(),
            executor_id: executor_id.to_string(),
        })
    }

    pub fn message(&self, agent_id: &str, executor_id: &str, data: &[u8]) -> Result<(), CallError> {
        self.send(SchedulerCall::Message {
            agent_id: agent_id.to_string(),
            executor_id: executor_id.to_string(),
            data: data.to_vec(),
        })
    }

    /// An empty task list succeeds without contacting the master.
    pub fn reconcile(&self, tasks: Vec<ReconcileTask>) -> Result<(), CallError> {
        if tasks.is_empty() {
            debug!("nothing to reconcile");
            return Ok(());
        }
        self.send(SchedulerCall::Reconcile(tasks))
    }

    pub fn acknowledge(&self, agent_id: &str, task_id: &str, uuid: &str) -> Result<(), CallError> {
        self.send(SchedulerCall::Acknowledge {
            agent_id: agent_id.to_string(),
            task_id: task_id.to_string(),
            uuid: uuid.to_string(),
        })
    }
}

/// One offer of an OFFERS event, bound to the session it arrived on.
#[derive(Clone, Debug)]
pub struct Offer {
    id: String,
    agent_id: String,
    raw: Json,
    driver: SchedulerDriver,
}

impl Offer {
    pub fn from_json(raw: Json, driver: SchedulerDriver) -> Result<Offer, ProtocolError> {
        let id = value_of(&raw, "id").ok_or(ProtocolError::MissingField("offer.id"))?.to_string();
        let agent_id = value_of(&raw, "agent_id")
            .or_else(|| value_of(&raw, "slave_id"))
            .ok_or(ProtocolError::MissingField("offer.agent_id"))?
            .to_string();
        Ok(Offer {
            id: id,
            agent_id: agent_id,
            raw: raw,
            driver: driver,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Resources, attributes and the rest of the offer, untouched.
    pub fn raw(&self) -> &Json {
        &self.raw
    }

    pub fn driver(&self) -> &SchedulerDriver {
        &self.driver
    }

    pub fn accept(&self, operations: Vec<Json>) -> Result<(), CallError> {
        if operations.is_empty() {
            info!("accept of offer {} without operations ignored", self.id);
            return Ok(());
        }
        self.driver.accept_offers(std::slice::from_ref(self), operations, None)
    }

    pub fn decline(&self) -> Result<(), CallError> {
        self.driver.decline(vec![self.id.clone()], None)
    }
}

fn with_agent_id(operations: Vec<Json>, agent_id: &str) -> Vec<Json> {
    operations.into_iter()
        .map(|operation| match operation {
            Json::Object(mut fields) => {
                if !fields.contains_key("agent_id") && !fields.contains_key("slave_id") {
                    fields.insert("agent_id".to_string(), id_value(agent_id));
                }
                Json::Object(fields)
            }
            other => other,
        })
        .collect()
}
