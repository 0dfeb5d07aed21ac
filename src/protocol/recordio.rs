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

//! RecordIO framing of the subscribe stream.
//!
//! Every record is a decimal byte count terminated by a newline, followed by exactly that many
//! bytes of json. The next count may start right after the payload in the same network chunk, so
//! the decoder keeps its own carry-over buffer and never relies on chunk boundaries.

use std::cmp;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::mem;
use std::str;

use rustc_serialize::json::Json;

use crate::error::{ConnectionError, ProtocolError, TransportError};

const MAX_RECORD_LEN: usize = 64 * 1024 * 1024;
const MAX_LENGTH_DIGITS: usize = 10;
const READ_CHUNK: usize = 8 * 1024;

#[derive(Clone, Copy, Debug, PartialEq)]
enum DecoderState {
    AwaitingLength,
    AwaitingPayload(usize),
}

pub struct RecordDecoder {
    state: DecoderState,
    digits: Vec<u8>,
    carry: Vec<u8>,
}

impl RecordDecoder {
    pub fn new() -> RecordDecoder {
        RecordDecoder {
            state: DecoderState::AwaitingLength,
            digits: Vec::new(),
            carry: Vec::new(),
        }
    }

    /// Consumes one chunk and appends every record it completes to `frames`.
    pub fn feed(&mut self, chunk: &[u8], frames: &mut VecDeque<Json>) -> Result<(), ProtocolError> {
        let mut pos = 0;
        while pos < chunk.len() {
            match self.state {
                DecoderState::AwaitingLength => {
                    let byte = chunk[pos];
                    match byte {
                        b'0'..=b'9' => {
                            if self.digits.len() == MAX_LENGTH_DIGITS {
                                return Err(ProtocolError::BadLength("record length has too many digits".to_string()));
                            }
                            self.digits.push(byte);
                            pos += 1;
                        }
                        b'\n' => {
                            pos += 1;
                            if !self.digits.is_empty() {
                                self.begin_payload()?;
                            }
                        }
                        b'\r' => pos += 1,
                        // payload glued straight onto its length
                        _ if !self.digits.is_empty() => self.begin_payload()?,
                        _ => return Err(ProtocolError::BadLength(format!("unexpected byte 0x{:02x}", byte))),
                    }
                }
                DecoderState::AwaitingPayload(len) => {
                    let take = cmp::min(len - self.carry.len(), chunk.len() - pos);
                    self.carry.extend_from_slice(&chunk[pos..pos + take]);
                    pos += take;
                    if self.carry.len() == len {
                        frames.push_back(self.finish_payload()?);
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks that the stream ended on a record boundary.
    pub fn finish(&self) -> Result<(), ProtocolError> {
        match self.state {
            DecoderState::AwaitingPayload(len) => Err(ProtocolError::Truncated { missing: len - self.carry.len() }),
            DecoderState::AwaitingLength if !self.digits.is_empty() => {
                Err(ProtocolError::BadLength("stream ended inside a record length".to_string()))
            }
            DecoderState::AwaitingLength => Ok(()),
        }
    }

    fn begin_payload(&mut self) -> Result<(), ProtocolError> {
        let text = String::from_utf8_lossy(&self.digits).into_owned();
        self.digits.clear();
        let len: usize = text.parse().map_err(|_| ProtocolError::BadLength(text.clone()))?;
        if len == 0 || len > MAX_RECORD_LEN {
            return Err(ProtocolError::BadLength(text));
        }
        self.carry.reserve(len);
        self.state = DecoderState::AwaitingPayload(len);
        Ok(())
    }

    fn finish_payload(&mut self) -> Result<Json, ProtocolError> {
        self.state = DecoderState::AwaitingLength;
        let payload = mem::replace(&mut self.carry, Vec::new());
        let text = str::from_utf8(&payload).map_err(|err| ProtocolError::BadJson(err.to_string()))?;
        Json::from_str(text).map_err(|err| ProtocolError::BadJson(format!("{:?}", err)))
    }
}

/// Pulls whole frames out of a streaming response body, one at a time.
pub struct RecordReader<R> {
    source: R,
    decoder: RecordDecoder,
    ready: VecDeque<Json>,
    buffer: Vec<u8>,
    finished: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(source: R) -> RecordReader<R> {
        RecordReader {
            source: source,
            decoder: RecordDecoder::new(),
            ready: VecDeque::new(),
            buffer: vec![0; READ_CHUNK],
            finished: false,
        }
    }

    /// Returns the next frame, or `None` once the stream ended cleanly between records.
    ///
    /// Frames already decoded from a previous chunk are returned without touching the network.
    pub fn next_record(&mut self) -> Result<Option<Json>, ConnectionError> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }
            if self.finished {
                return Ok(None);
            }

            let read = match self.source.read(&mut self.buffer) {
                Ok(read) => read,
                Err(ref err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::from(err).into()),
            };

            if read == 0 {
                self.finished = true;
                self.decoder.finish()?;
                continue;
            }
            self.decoder.feed(&self.buffer[..read], &mut self.ready)?;
        }
    }
}
