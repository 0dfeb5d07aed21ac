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

//! Client for the Mesos v1 HTTP scheduler API.
//!
//! A `MesosClient` finds the leading master, subscribes a framework, feeds the event stream to
//! registered handlers and reconnects when the stream is lost. Calls go out through the
//! `SchedulerDriver` handed to SUBSCRIBED handlers.

#[macro_use]
extern crate log;

pub mod collaborator;
pub mod error;
pub mod master;
pub mod protocol;
pub mod scheduler;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod testing;

pub use crate::error::{CallError, ConfigError, ConnectionError};
pub use crate::master::Endpoint;
pub use crate::protocol::calls::{Filters, ReconcileTask};
pub use crate::protocol::events::TaskStatus;
pub use crate::scheduler::{ConnectionState, Event, EventKind, FrameworkIdentity, MesosClient, Offer, SchedulerDriver,
                           StopHandle, Termination};
pub use crate::utils::ClientConfig;
