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

use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Failure of the underlying HTTP exchange.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("connection refused by {0}")]
    Refused(String),
    #[error("request to {0} timed out")]
    TimedOut(String),
    #[error("transport failure: {0}")]
    Io(String),
}

impl TransportError {
    pub fn is_refused(&self) -> bool {
        match *self {
            TransportError::Refused(_) => true,
            _ => false,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> TransportError {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => TransportError::Refused(err.to_string()),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::TimedOut(err.to_string()),
            _ => TransportError::Io(err.to_string()),
        }
    }
}

/// The master answered, but not in a way the session layer can use.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("unexpected status {status} from {url}: {body}")]
    BadStatus { status: u16, url: String, body: String },
    #[error("subscribe answer from {0} carries no Mesos-Stream-Id")]
    MissingStreamId(String),
    #[error("redirect from {0} carries no usable Location")]
    BadRedirect(String),
    #[error("malformed record length: {0}")]
    BadLength(String),
    #[error("record stream ended inside a frame ({missing} bytes missing)")]
    Truncated { missing: usize },
    #[error("malformed json frame: {0}")]
    BadJson(String),
    #[error("frame is missing {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login against {endpoint} rejected with status {status}: {body}")]
    Rejected { endpoint: String, status: u16, body: String },
    #[error("login exchange failed: {0}")]
    Transport(#[from] TransportError),
    #[error("login reply is unusable: {0}")]
    Malformed(String),
    #[error("unable to sign login token: {0}")]
    Signing(String),
}

/// Supervisor-facing failure: every variant ends the current session generation.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("unable to resolve master: {0}")]
    Resolution(String),
    #[error("status acknowledgement failed: {0}")]
    Acknowledge(Box<CallError>),
}

/// Caller-facing failure of a single scheduler call. Never retried by the library.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("no live session with the master")]
    NoSession,
    #[error("handle belongs to session generation {handle} but generation {current} is live")]
    StaleSession { handle: u64, current: u64 },
    #[error("call delivery failed: {0}")]
    Delivery(#[from] TransportError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("invalid yaml: {0}")]
    Yaml(String),
    #[error("key `{0}` is missing")]
    Missing(String),
    #[error("key `{key}` must be {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("invalid master endpoint `{0}`")]
    Endpoint(String),
    #[error("unable to build http client: {0}")]
    Client(String),
}

/// Whatever a registered event handler may fail with.
pub type HandlerError = Box<dyn StdError + Send + Sync>;
