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

use rustc_serialize::json::{Json, Object};

use super::value_of;
use crate::error::ProtocolError;

/// A task status as carried by an UPDATE frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskStatus {
    task_id: String,
    agent_id: Option<String>,
    state: String,
    uuid: Option<String>,
    update: Json,
}

impl TaskStatus {
    /// Reads the `status` of an UPDATE frame's `update` object.
    pub fn from_update(update: Json) -> Result<TaskStatus, ProtocolError> {
        let (task_id, agent_id, state, uuid) = {
            let status = update.find("status").ok_or(ProtocolError::MissingField("update.status"))?;
            let task_id = value_of(status, "task_id").ok_or(ProtocolError::MissingField("update.status.task_id"))?;
            (
                task_id.to_string(),
                value_of(status, "agent_id").map(|id| id.to_string()),
                status.find("state").and_then(|s| s.as_string()).unwrap_or("").to_string(),
                status.find("uuid").and_then(|u| u.as_string()).map(|u| u.to_string()),
            )
        };
        Ok(TaskStatus {
            task_id: task_id,
            agent_id: agent_id,
            state: state,
            uuid: uuid,
            update: update,
        })
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_ref().map(|id| id.as_str())
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Present only when the master expects an acknowledgement.
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_ref().map(|uuid| uuid.as_str())
    }

    /// The raw `update` object, `status` included.
    pub fn raw(&self) -> &Json {
        &self.update
    }
}

/// One decoded frame of the subscribe stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Subscribed {
        framework_id: String,
        heartbeat_interval: Option<f64>,
        master_info: Option<Json>,
    },
    Offers(Vec<Json>),
    Update(TaskStatus),
    Error(Json),
    Failure(Json),
    Rescind(Json),
    Message(Json),
    Heartbeat,
    Unknown(String),
}

impl Frame {
    pub fn parse(frame: Json) -> Result<Frame, ProtocolError> {
        let mut body = match frame {
            Json::Object(body) => body,
            _ => return Err(ProtocolError::BadJson("frame is not an object".to_string())),
        };
        let kind = match body.remove("type") {
            Some(Json::String(kind)) => kind,
            _ => return Err(ProtocolError::MissingField("type")),
        };

        let frame = match kind.as_str() {
            "SUBSCRIBED" => {
                let subscribed = body.remove("subscribed").ok_or(ProtocolError::MissingField("subscribed"))?;
                let framework_id = value_of(&subscribed, "framework_id")
                    .ok_or(ProtocolError::MissingField("subscribed.framework_id"))?
                    .to_string();
                Frame::Subscribed {
                    framework_id: framework_id,
                    heartbeat_interval: subscribed.find("heartbeat_interval_seconds").and_then(|h| h.as_f64()),
                    master_info: subscribed.find("master_info").cloned(),
                }
            }
            "OFFERS" => {
                let offers = body.remove("offers").ok_or(ProtocolError::MissingField("offers"))?;
                match offers.find("offers") {
                    Some(&Json::Array(ref offers)) => Frame::Offers(offers.clone()),
                    _ => return Err(ProtocolError::MissingField("offers.offers")),
                }
            }
            "UPDATE" => {
                let update = body.remove("update").ok_or(ProtocolError::MissingField("update"))?;
                Frame::Update(TaskStatus::from_update(update)?)
            }
            "ERROR" => Frame::Error(sub_payload(&mut body, "error")),
            "FAILURE" => Frame::Failure(sub_payload(&mut body, "failure")),
            "RESCIND" => Frame::Rescind(sub_payload(&mut body, "rescind")),
            "MESSAGE" => Frame::Message(sub_payload(&mut body, "message")),
            "HEARTBEAT" => Frame::Heartbeat,
            _ => Frame::Unknown(kind),
        };
        Ok(frame)
    }
}

fn sub_payload(body: &mut Object, key: &str) -> Json {
    body.remove(key).unwrap_or(Json::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Frame, ProtocolError> {
        Frame::parse(Json::from_str(text).unwrap())
    }

    #[test]
    fn parses_subscribed() {
        let frame = parse(
            r#"{"type":"SUBSCRIBED","subscribed":{"framework_id":{"value":"f1"},
                "heartbeat_interval_seconds":15.0,"master_info":{"id":"m1"}}}"#,
        )
        .unwrap();
        match frame {
            Frame::Subscribed { framework_id, heartbeat_interval, master_info } => {
                assert_eq!(framework_id, "f1");
                assert_eq!(heartbeat_interval, Some(15.0));
                assert!(master_info.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_update_with_and_without_uuid() {
        let acked = parse(
            r#"{"type":"UPDATE","update":{"status":{"task_id":{"value":"t1"},"agent_id":{"value":"a1"},
                "state":"TASK_RUNNING","uuid":"u1"}}}"#,
        )
        .unwrap();
        match acked {
            Frame::Update(status) => {
                assert_eq!(status.task_id(), "t1");
                assert_eq!(status.agent_id(), Some("a1"));
                assert_eq!(status.state(), "TASK_RUNNING");
                assert_eq!(status.uuid(), Some("u1"));
            }
            other => panic!("unexpected {:?}", other),
        }

        match parse(r#"{"type":"UPDATE","update":{"status":{"task_id":{"value":"t1"},"state":"TASK_LOST"}}}"#).unwrap() {
            Frame::Update(status) => assert_eq!(status.uuid(), None),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn update_without_task_id_is_a_protocol_error() {
        assert_eq!(
            parse(r#"{"type":"UPDATE","update":{"status":{"state":"TASK_LOST"}}}"#),
            Err(ProtocolError::MissingField("update.status.task_id"))
        );
    }

    #[test]
    fn frame_without_type_is_a_protocol_error() {
        assert_eq!(parse(r#"{"heartbeat":{}}"#), Err(ProtocolError::MissingField("type")));
    }

    #[test]
    fn unknown_kinds_are_kept_by_name() {
        assert_eq!(parse(r#"{"type":"INVERSE_OFFERS"}"#), Ok(Frame::Unknown("INVERSE_OFFERS".to_string())));
    }
}
