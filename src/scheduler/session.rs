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

use std::io::Read;
use std::sync::{Arc, RwLock};

use crate::collaborator::auth::Authenticator;
use crate::error::{AuthError, CallError, ConnectionError, ProtocolError};
use crate::protocol::calls::SchedulerCall;
use crate::protocol::{JSON_CONTENT, SCHEDULER_PATH, STREAM_ID_HEADER};
use crate::transport::{HttpReply, Transport};

/// One generation of the connection to the master. Never mutated: a reconnect, or learning the
/// framework id, publishes a new value.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    generation: u64,
    base_url: String,
    stream_id: String,
    framework_id: Option<String>,
}

impl Session {
    pub fn new(generation: u64, base_url: &str, stream_id: &str, framework_id: Option<&str>) -> Session {
        Session {
            generation: generation,
            base_url: base_url.to_string(),
            stream_id: stream_id.to_string(),
            framework_id: framework_id.map(|id| id.to_string()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn framework_id(&self) -> Option<&str> {
        self.framework_id.as_ref().map(|id| id.as_str())
    }

    pub fn scheduler_url(&self) -> String {
        format!("{}{}", self.base_url, SCHEDULER_PATH)
    }

    pub fn with_framework_id(&self, framework_id: &str) -> Session {
        Session { framework_id: Some(framework_id.to_string()), ..self.clone() }
    }
}

/// The live session. Only the stream loop writes it; any thread may read a snapshot.
pub struct SessionSlot {
    current: RwLock<Option<Arc<Session>>>,
}

impl SessionSlot {
    pub fn new() -> SessionSlot {
        SessionSlot { current: RwLock::new(None) }
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn publish(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        *self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session.clone());
        session
    }

    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

/// A successful handshake: the session it opened and the event stream that follows.
pub struct Subscription {
    pub session: Session,
    pub body: Box<dyn Read + Send>,
}

/// What every exchange with the master goes through: transport, optional authenticator, and the
/// slot holding the live session.
pub struct MasterLink {
    transport: Arc<dyn Transport>,
    auth: Option<Arc<dyn Authenticator>>,
    sessions: SessionSlot,
}

impl MasterLink {
    pub fn new(transport: Arc<dyn Transport>, auth: Option<Arc<dyn Authenticator>>) -> MasterLink {
        MasterLink {
            transport: transport,
            auth: auth,
            sessions: SessionSlot::new(),
        }
    }

    pub fn sessions(&self) -> &SessionSlot {
        &self.sessions
    }

    fn headers(&self, stream_id: Option<&str>) -> Result<Vec<(&'static str, String)>, AuthError> {
        let mut headers = vec![("Content-Type", JSON_CONTENT.to_string()), ("Accept", JSON_CONTENT.to_string())];
        if let Some(stream_id) = stream_id {
            headers.push((STREAM_ID_HEADER, stream_id.to_string()));
        }
        if let Some(ref auth) = self.auth {
            headers.push(("Authorization", auth.authorization()?));
        }
        Ok(headers)
    }

    /// Sends `call` for a handle bound to `session`.
    ///
    /// Fails fast when the session is no longer the live one. A completed HTTP exchange counts as
    /// delivered whatever its status; the master does not confirm calls synchronously.
    pub fn send(&self, session: &Session, call: &SchedulerCall) -> Result<(), CallError> {
        match self.sessions.current() {
            None => return Err(CallError::NoSession),
            Some(ref live) if live.generation() != session.generation() => {
                return Err(CallError::StaleSession {
                    handle: session.generation(),
                    current: live.generation(),
                })
            }
            Some(_) => {}
        }

        debug!("sending {} to {}", call.name(), session.base_url());
        let headers = self.headers(Some(session.stream_id()))?;
        let body = call.to_json(session.framework_id()).to_string();
        let reply = self.transport.post(&session.scheduler_url(), &headers, body, false)?;
        if !reply.is_success() {
            let status = reply.status;
            warn!("master answered {} with status {}: {}", call.name(), status, reply.text());
        }
        Ok(())
    }

    /// Subscribes at `base_url`, following at most one leader redirect.
    pub fn subscribe(&self,
                     base_url: &str,
                     call: &SchedulerCall,
                     framework_id: Option<&str>,
                     generation: u64)
                     -> Result<Subscription, ConnectionError> {
        let body = call.to_json(framework_id).to_string();
        let mut base = base_url.to_string();

        let mut reply = self.post_subscribe(&base, &body)?;
        if reply.status == 307 {
            let location = reply.header("Location")
                .and_then(|location| redirect_base(&base, location))
                .ok_or_else(|| ProtocolError::BadRedirect(base.clone()))?;
            info!("{} is not the leading master, redirected to {}", base, location);
            base = location;
            reply = self.post_subscribe(&base, &body)?;
        }

        if reply.status != 200 {
            let status = reply.status;
            return Err(ProtocolError::BadStatus {
                    status: status,
                    url: base,
                    body: reply.text(),
                }
                .into());
        }

        let stream_id = reply.header(STREAM_ID_HEADER)
            .map(|stream_id| stream_id.to_string())
            .ok_or_else(|| ProtocolError::MissingStreamId(base.clone()))?;
        debug!("subscribed to {} with stream id {}", base, stream_id);

        Ok(Subscription {
            session: Session::new(generation, &base, &stream_id, framework_id),
            body: reply.body,
        })
    }

    fn post_subscribe(&self, base: &str, body: &str) -> Result<HttpReply, ConnectionError> {
        let headers = self.headers(None)?;
        let url = format!("{}{}", base, SCHEDULER_PATH);
        let reply = self.transport.post(&url, &headers, body.to_string(), true)?;
        debug!("subscribe answer from {}: {}", url, reply.status);
        Ok(reply)
    }
}

/// Turns a `Location` header into a master base URL.
fn redirect_base(current: &str, location: &str) -> Option<String> {
    let location = location.trim();
    let absolute = if location.starts_with("//") {
        let scheme = current.find("://").map(|end| &current[..end]).unwrap_or("http");
        format!("{}:{}", scheme, location)
    } else if location.contains("://") {
        location.to_string()
    } else if location.is_empty() || location.starts_with('/') {
        return None;
    } else {
        format!("http://{}", location)
    };

    let trimmed = absolute.trim_end_matches('/');
    let base = if trimmed.ends_with(SCHEDULER_PATH) {
        &trimmed[..trimmed.len() - SCHEDULER_PATH.len()]
    } else {
        trimmed
    };
    Some(base.trim_end_matches('/').to_string())
}
