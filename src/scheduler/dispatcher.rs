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

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use rustc_serialize::json::Json;

use super::driver::{Offer, SchedulerDriver};
use crate::error::HandlerError;
use crate::protocol::events::TaskStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Subscribed,
    Offers,
    Update,
    Error,
    Failure,
    Rescind,
    Message,
    Heartbeat,
    Disconnected,
    Reconnected,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match *self {
            EventKind::Subscribed => "SUBSCRIBED",
            EventKind::Offers => "OFFERS",
            EventKind::Update => "UPDATE",
            EventKind::Error => "ERROR",
            EventKind::Failure => "FAILURE",
            EventKind::Rescind => "RESCIND",
            EventKind::Message => "MESSAGE",
            EventKind::Heartbeat => "HEARTBEAT",
            EventKind::Disconnected => "DISCONNECTED",
            EventKind::Reconnected => "RECONNECTED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What handlers receive. `Disconnected` and `Reconnected` never come from the wire.
#[derive(Debug)]
pub enum Event {
    Subscribed(SchedulerDriver),
    Offers(Vec<Offer>),
    Update(TaskStatus),
    Error(Json),
    Failure(Json),
    Rescind(Json),
    Message(Json),
    Heartbeat,
    Disconnected(String),
    Reconnected(String),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match *self {
            Event::Subscribed(_) => EventKind::Subscribed,
            Event::Offers(_) => EventKind::Offers,
            Event::Update(_) => EventKind::Update,
            Event::Error(_) => EventKind::Error,
            Event::Failure(_) => EventKind::Failure,
            Event::Rescind(_) => EventKind::Rescind,
            Event::Message(_) => EventKind::Message,
            Event::Heartbeat => EventKind::Heartbeat,
            Event::Disconnected(_) => EventKind::Disconnected,
            Event::Reconnected(_) => EventKind::Reconnected,
        }
    }
}

pub type Handler = Box<dyn FnMut(&Event) -> Result<(), HandlerError> + Send>;

pub struct EventDispatcher {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventDispatcher {
    pub fn new() -> EventDispatcher {
        EventDispatcher { handlers: HashMap::new() }
    }

    pub fn on(&mut self, kind: EventKind, handler: Handler) {
        self.handlers.entry(kind).or_insert_with(Vec::new).push(handler);
    }

    /// Runs every handler of the event's kind in registration order.
    ///
    /// Returns false when any of them failed or panicked; the others still ran.
    pub fn dispatch(&mut self, event: &Event) -> bool {
        let kind = event.kind();
        let handlers = match self.handlers.get_mut(&kind) {
            Some(handlers) => handlers,
            None => {
                debug!("no handler for {} event", kind);
                return true;
            }
        };

        let mut all_ok = true;
        for (index, handler) in handlers.iter_mut().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!("{} handler #{} failed: {}", kind, index, err);
                    all_ok = false;
                }
                Err(_) => {
                    error!("{} handler #{} panicked", kind, index);
                    all_ok = false;
                }
            }
        }
        all_ok
    }
}
