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

//! HTTP plumbing between the scheduler and the master.

pub mod http;

pub use self::http::{HttpTransport, TransportSettings};

use std::io::Read;

use crate::error::TransportError;

const MAX_ERROR_BODY: u64 = 4096;

pub struct HttpReply {
    pub status: u16,
    headers: Vec<(String, String)>,
    pub body: Box<dyn Read + Send>,
}

impl HttpReply {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Box<dyn Read + Send>) -> HttpReply {
        HttpReply {
            status: status,
            headers: headers.into_iter().map(|(name, value)| (name.to_lowercase(), value)).collect(),
            body: body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers.iter().find(|&&(ref key, _)| *key == name).map(|&(_, ref value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Reads at most a few KiB of the body, for diagnostics.
    pub fn text(self) -> String {
        let mut text = String::new();
        let _ = self.body.take(MAX_ERROR_BODY).read_to_string(&mut text);
        text
    }
}

/// The HTTP exchanges the scheduler needs from the network.
pub trait Transport: Send + Sync {
    /// POSTs `body` to `url`. Streaming requests have no overall deadline, since the subscribe
    /// answer stays open for as long as the framework is registered.
    fn post(&self, url: &str, headers: &[(&'static str, String)], body: String, streaming: bool)
            -> Result<HttpReply, TransportError>;

    /// Issues a plain GET and returns the status; used to tell how a master can be reached.
    fn probe(&self, url: &str) -> Result<u16, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_lookup_ignores_case() {
        let reply = HttpReply::new(307,
                                   vec![("Location".to_string(), "http://b:5050".to_string())],
                                   Box::new(Cursor::new(vec![])));
        assert_eq!(reply.header("location"), Some("http://b:5050"));
        assert_eq!(reply.header("LOCATION"), Some("http://b:5050"));
        assert_eq!(reply.header("Mesos-Stream-Id"), None);
        assert!(!reply.is_success());
    }
}
