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

//! A minimal master speaking just enough HTTP/1.1 for the scheduler client.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Recorded {
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers.iter().find(|&&(ref key, _)| *key == name).map(|&(_, ref value)| value.as_str())
    }

    pub fn is(&self, kind: &str) -> bool {
        self.body.contains(&format!("\"type\":\"{}\"", kind))
    }
}

/// How the master answers the next SUBSCRIBE.
pub enum Answer {
    Redirect(String),
    /// Writes each chunk separately, then keeps the stream open until the client goes away.
    Stream { stream_id: String, chunks: Vec<Vec<u8>> },
}

pub fn record(frame: &str) -> Vec<u8> {
    format!("{}\n{}", frame.len(), frame).into_bytes()
}

pub struct FakeMaster {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    answers: Arc<Mutex<VecDeque<Answer>>>,
}

impl FakeMaster {
    pub fn start() -> FakeMaster {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(vec![]));
        let answers = Arc::new(Mutex::new(VecDeque::new()));

        let (seen, queued) = (requests.clone(), answers.clone());
        thread::Builder::new()
            .name("fake-master".to_string())
            .spawn(move || {
                for connection in listener.incoming() {
                    let connection = match connection {
                        Ok(connection) => connection,
                        Err(_) => break,
                    };
                    let (seen, queued) = (seen.clone(), queued.clone());
                    thread::spawn(move || serve(connection, &seen, &queued));
                }
            })
            .unwrap();

        FakeMaster {
            url: url,
            requests: requests,
            answers: answers,
        }
    }

    pub fn answer(&self, answer: Answer) {
        self.answers.lock().unwrap().push_back(answer);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_of(&self, kind: &str) -> Vec<Recorded> {
        self.requests().into_iter().filter(|request| request.is(kind)).collect()
    }
}

fn serve(connection: TcpStream, seen: &Mutex<Vec<Recorded>>, queued: &Mutex<VecDeque<Answer>>) {
    let mut reader = BufReader::new(match connection.try_clone() {
        Ok(clone) => clone,
        Err(_) => return,
    });
    let request = match read_request(&mut reader) {
        Some(request) => request,
        None => return,
    };
    let subscribe = request.is("SUBSCRIBE");
    seen.lock().unwrap().push(request);

    let mut connection = connection;
    if !subscribe {
        let _ = connection.write_all(b"HTTP/1.1 202 Accepted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    let answer = queued.lock().unwrap().pop_front();
    match answer {
        Some(Answer::Redirect(location)) => {
            let head = format!("HTTP/1.1 307 Temporary Redirect\r\nLocation: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                               location);
            let _ = connection.write_all(head.as_bytes());
        }
        Some(Answer::Stream { stream_id, chunks }) => {
            let head = format!("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nMesos-Stream-Id: {}\r\nConnection: close\r\n\r\n",
                               stream_id);
            if connection.write_all(head.as_bytes()).is_err() {
                return;
            }
            for chunk in chunks {
                if connection.write_all(&chunk).and_then(|_| connection.flush()).is_err() {
                    return;
                }
                thread::sleep(Duration::from_millis(20));
            }
            // Hold the stream open until the client hangs up.
            let _ = connection.set_read_timeout(Some(Duration::from_secs(10)));
            let mut sink = [0; 512];
            while let Ok(read) = reader.read(&mut sink) {
                if read == 0 {
                    break;
                }
            }
        }
        None => {
            let _ = connection.write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        }
    }
}

fn read_request(reader: &mut BufReader<TcpStream>) -> Option<Recorded> {
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let path = line.split_whitespace().nth(1)?.to_string();

    let mut headers = vec![];
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let colon = line.find(':')?;
        headers.push((line[..colon].trim().to_lowercase(), line[colon + 1..].trim().to_string()));
    }

    let length = headers.iter()
        .find(|&&(ref name, _)| name == "content-length")
        .and_then(|&(_, ref value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body).ok()?;

    Some(Recorded {
        path: path,
        headers: headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
