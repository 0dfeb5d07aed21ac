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

//! Scripted stand-ins for the network used by the unit tests.

use std::cmp;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, Read};
use std::sync::Mutex;

use rustc_serialize::json::Json;

use crate::error::{ConnectionError, TransportError};
use crate::master::{ZkConnector, ZkDirectory};
use crate::transport::{HttpReply, Transport};

/// A body that hands out its bytes in the given chunks, then ends or fails.
pub struct ChunkedBody {
    chunks: VecDeque<Vec<u8>>,
    failure: Option<io::ErrorKind>,
}

impl ChunkedBody {
    pub fn new(chunks: Vec<Vec<u8>>) -> ChunkedBody {
        ChunkedBody {
            chunks: chunks.into_iter().collect(),
            failure: None,
        }
    }

    pub fn failing(chunks: Vec<Vec<u8>>, kind: io::ErrorKind) -> ChunkedBody {
        ChunkedBody {
            chunks: chunks.into_iter().collect(),
            failure: Some(kind),
        }
    }
}

impl Read for ChunkedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(chunk) = self.chunks.pop_front() {
            if chunk.is_empty() {
                continue;
            }
            let read = cmp::min(buf.len(), chunk.len());
            buf[..read].copy_from_slice(&chunk[..read]);
            if read < chunk.len() {
                self.chunks.push_front(chunk[read..].to_vec());
            }
            return Ok(read);
        }
        match self.failure {
            Some(kind) => Err(io::Error::new(kind, "stream broken")),
            None => Ok(0),
        }
    }
}

pub fn stream_of(frames: &[&str]) -> Vec<u8> {
    frames.iter().map(|frame| format!("{}\n{}", frame.len(), frame)).collect::<String>().into_bytes()
}

pub enum Scripted {
    Reply {
        status: u16,
        headers: Vec<(String, String)>,
        body: Box<dyn Read + Send>,
    },
    Fail(TransportError),
}

impl Scripted {
    pub fn reply(status: u16, headers: Vec<(&str, &str)>, body: &str) -> Scripted {
        Scripted::Reply {
            status: status,
            headers: headers.into_iter().map(|(name, value)| (name.to_string(), value.to_string())).collect(),
            body: Box::new(Cursor::new(body.as_bytes().to_vec())),
        }
    }

    pub fn stream(stream_id: &str, frames: &[&str]) -> Scripted {
        Scripted::stream_body(stream_id, ChunkedBody::new(vec![stream_of(frames)]))
    }

    pub fn stream_body(stream_id: &str, body: ChunkedBody) -> Scripted {
        Scripted::Reply {
            status: 200,
            headers: vec![("Mesos-Stream-Id".to_string(), stream_id.to_string())],
            body: Box::new(body),
        }
    }

    pub fn redirect(location: &str) -> Scripted {
        Scripted::reply(307, vec![("Location", location)], "")
    }
}

#[derive(Clone, Debug)]
pub struct SentRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Json,
    pub streaming: bool,
}

impl SentRequest {
    pub fn kind(&self) -> Option<&str> {
        self.body.find("type").and_then(|kind| kind.as_string())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|&&(ref key, _)| key == name).map(|&(_, ref value)| value.as_str())
    }
}

/// Records every request and answers from per-URL scripts, kept apart for streaming requests and
/// plain calls.
///
/// Unscripted streaming requests are refused; unscripted calls get an empty 202.
pub struct RecordingTransport {
    sent: Mutex<Vec<SentRequest>>,
    streams: Mutex<HashMap<String, VecDeque<Scripted>>>,
    replies: Mutex<HashMap<String, VecDeque<Scripted>>>,
    probes: Mutex<HashMap<String, Result<u16, TransportError>>>,
    call_failure: Mutex<Option<TransportError>>,
}

impl RecordingTransport {
    pub fn new() -> RecordingTransport {
        RecordingTransport {
            sent: Mutex::new(vec![]),
            streams: Mutex::new(HashMap::new()),
            replies: Mutex::new(HashMap::new()),
            probes: Mutex::new(HashMap::new()),
            call_failure: Mutex::new(None),
        }
    }

    /// Queues the answer to the next streaming request to `url`.
    pub fn script(&self, url: &str, answer: Scripted) {
        self.streams.lock().unwrap().entry(url.to_string()).or_insert_with(VecDeque::new).push_back(answer);
    }

    /// Queues the answer to the next plain call to `url`.
    pub fn script_call(&self, url: &str, answer: Scripted) {
        self.replies.lock().unwrap().entry(url.to_string()).or_insert_with(VecDeque::new).push_back(answer);
    }

    pub fn set_probe(&self, url: &str, result: Result<u16, TransportError>) {
        self.probes.lock().unwrap().insert(url.to_string(), result);
    }

    pub fn fail_calls(&self, failure: Option<TransportError>) {
        *self.call_failure.lock().unwrap() = failure;
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: &str) -> Vec<SentRequest> {
        self.sent().into_iter().filter(|request| request.kind() == Some(kind)).collect()
    }
}

impl Transport for RecordingTransport {
    fn post(&self, url: &str, headers: &[(&'static str, String)], body: String, streaming: bool)
            -> Result<HttpReply, TransportError> {
        self.sent.lock().unwrap().push(SentRequest {
            url: url.to_string(),
            headers: headers.iter().map(|&(name, ref value)| (name.to_string(), value.clone())).collect(),
            body: Json::from_str(&body).unwrap_or(Json::Null),
            streaming: streaming,
        });

        let scripts = if streaming { &self.streams } else { &self.replies };
        let scripted = scripts.lock().unwrap().get_mut(url).and_then(|queue| queue.pop_front());
        match scripted {
            Some(Scripted::Reply { status, headers, body }) => return Ok(HttpReply::new(status, headers, body)),
            Some(Scripted::Fail(err)) => return Err(err),
            None => {}
        }

        if streaming {
            return Err(TransportError::Refused(url.to_string()));
        }
        if let Some(ref failure) = *self.call_failure.lock().unwrap() {
            return Err(failure.clone());
        }
        Ok(HttpReply::new(202, vec![], Box::new(Cursor::new(vec![]))))
    }

    fn probe(&self, url: &str) -> Result<u16, TransportError> {
        self.probes.lock().unwrap().get(url).cloned().unwrap_or(Ok(200))
    }
}

/// An in-memory ZooKeeper tree; children are listed in insertion order.
pub struct FakeZooKeeper {
    reachable: bool,
    nodes: Vec<(String, Vec<u8>)>,
}

impl FakeZooKeeper {
    pub fn new() -> FakeZooKeeper {
        FakeZooKeeper {
            reachable: true,
            nodes: vec![],
        }
    }

    pub fn unreachable() -> FakeZooKeeper {
        FakeZooKeeper {
            reachable: false,
            nodes: vec![],
        }
    }

    pub fn node(mut self, path: &str, data: &str) -> FakeZooKeeper {
        self.nodes.push((path.to_string(), data.as_bytes().to_vec()));
        self
    }
}

impl ZkConnector for FakeZooKeeper {
    fn connect(&self, ensemble: &str) -> Result<Box<dyn ZkDirectory>, ConnectionError> {
        if !self.reachable {
            return Err(ConnectionError::Resolution(format!("zookeeper {} unreachable", ensemble)));
        }
        Ok(Box::new(FakeDirectory { nodes: self.nodes.clone() }))
    }
}

struct FakeDirectory {
    nodes: Vec<(String, Vec<u8>)>,
}

impl ZkDirectory for FakeDirectory {
    fn children(&self, path: &str) -> Result<Vec<String>, ConnectionError> {
        let parent = format!("{}/", path.trim_end_matches('/'));
        let children: Vec<String> = self.nodes
            .iter()
            .filter(|&&(ref node, _)| node.starts_with(&parent))
            .map(|&(ref node, _)| node[parent.len()..].to_string())
            .filter(|child| !child.contains('/'))
            .collect();
        if children.is_empty() {
            return Err(ConnectionError::Resolution(format!("no node {}", path)));
        }
        Ok(children)
    }

    fn data(&self, path: &str) -> Result<Vec<u8>, ConnectionError> {
        self.nodes
            .iter()
            .find(|&&(ref node, _)| node == path)
            .map(|&(_, ref data)| data.clone())
            .ok_or_else(|| ConnectionError::Resolution(format!("no node {}", path)))
    }
}
