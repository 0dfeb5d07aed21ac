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

use std::cmp;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use rustc_serialize::json::Json;

use super::dispatcher::{Event, EventDispatcher, EventKind, Handler};
use super::driver::{Offer, SchedulerDriver};
use super::framework::FrameworkIdentity;
use super::session::{MasterLink, Session, Subscription};
use crate::collaborator::auth::{Authenticator, ServiceAccountAuth};
use crate::error::{ConfigError, ConnectionError, ProtocolError, TransportError};
use crate::master::{MasterResolver, ZkConnector};
use crate::protocol::calls::SchedulerCall;
use crate::protocol::events::Frame;
use crate::protocol::recordio::RecordReader;
use crate::transport::{HttpTransport, Transport};
use crate::utils::config::ClientConfig;

const PAUSE_SLICE_MS: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
    Stopped,
}

/// How `register` ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Stop was requested; the framework was torn down.
    Stopped,
    /// Disconnect was requested; the framework stays registered with the master.
    Disconnected,
    /// Every allowed attempt failed.
    GaveUp,
}

impl Termination {
    pub fn succeeded(&self) -> bool {
        *self != Termination::GaveUp
    }
}

/// Requests the end of a running `register` loop from any thread.
///
/// Requests are polled once per received frame and during the pause between attempts.
#[derive(Clone, Debug)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
    disconnect: Arc<AtomicBool>,
}

impl StopHandle {
    /// Tear the framework down and end the loop.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// End the loop but leave the framework registered, so it can be resumed later.
    pub fn disconnect(&self) {
        self.disconnect.store(true, Ordering::SeqCst);
    }

    fn requested(&self) -> Option<Termination> {
        if self.stop.load(Ordering::SeqCst) {
            Some(Termination::Stopped)
        } else if self.disconnect.load(Ordering::SeqCst) {
            Some(Termination::Disconnected)
        } else {
            None
        }
    }

    fn clear(&self) {
        self.stop.store(false, Ordering::SeqCst);
        self.disconnect.store(false, Ordering::SeqCst);
    }
}

/// The scheduler side of a framework: finds the master, subscribes, streams events to the
/// registered handlers and reconnects when the stream is lost.
///
/// `register` blocks for as long as the framework is connected and is meant to own a thread.
/// Everything else may be called from other threads, handlers included.
pub struct MesosClient {
    identity: FrameworkIdentity,
    max_reconnect: u32,
    reconnect_wait: Duration,
    link: Arc<MasterLink>,
    resolver: MasterResolver,
    dispatcher: Mutex<EventDispatcher>,
    framework_id: RwLock<Option<String>>,
    framework_id_learned: AtomicBool,
    master_info: RwLock<Option<Json>>,
    heartbeat_interval: RwLock<Option<f64>>,
    driver: RwLock<Option<SchedulerDriver>>,
    state: RwLock<ConnectionState>,
    generation: AtomicU64,
    control: StopHandle,
}

impl MesosClient {
    /// Talks plain http(s) to the master with the transport settings of `config`, logging in
    /// through its service account when one is configured.
    pub fn new(config: ClientConfig) -> Result<MesosClient, ConfigError> {
        if let Some(auth) = service_account_auth(&config)? {
            return MesosClient::with_auth(config, auth);
        }
        let transport = HttpTransport::new(&config.transport_settings())?;
        let zookeeper = default_zookeeper(&config);
        Ok(MesosClient::with_transport(config, Arc::new(transport), None, zookeeper))
    }

    /// Like `new`, authorizing every request through `auth` and using its TLS policy.
    pub fn with_auth(config: ClientConfig, auth: Arc<dyn Authenticator>) -> Result<MesosClient, ConfigError> {
        let mut settings = config.transport_settings();
        settings.tls = auth.tls_policy();
        let transport = HttpTransport::new(&settings)?;
        let zookeeper = default_zookeeper(&config);
        Ok(MesosClient::with_transport(config, Arc::new(transport), Some(auth), zookeeper))
    }

    pub fn with_transport(config: ClientConfig,
                          transport: Arc<dyn Transport>,
                          auth: Option<Arc<dyn Authenticator>>,
                          zookeeper: Option<Arc<dyn ZkConnector>>)
                          -> MesosClient {
        let mut identity = config.framework;
        if identity.principal.is_none() {
            identity.principal = auth.as_ref().and_then(|auth| auth.principal());
        }
        let framework_id = identity.framework_id.clone();

        MesosClient {
            identity: identity,
            max_reconnect: config.max_reconnect,
            reconnect_wait: config.reconnect_wait,
            link: Arc::new(MasterLink::new(transport.clone(), auth)),
            resolver: MasterResolver::new(config.masters, transport, zookeeper),
            dispatcher: Mutex::new(EventDispatcher::new()),
            framework_id: RwLock::new(framework_id),
            framework_id_learned: AtomicBool::new(false),
            master_info: RwLock::new(None),
            heartbeat_interval: RwLock::new(None),
            driver: RwLock::new(None),
            state: RwLock::new(ConnectionState::Disconnected),
            generation: AtomicU64::new(0),
            control: StopHandle {
                stop: Arc::new(AtomicBool::new(false)),
                disconnect: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Adds a handler for `kind`; handlers of one kind run in the order they were added.
    ///
    /// Must not be called from inside a handler.
    pub fn on<F>(&self, kind: EventKind, handler: F)
        where F: FnMut(&Event) -> Result<(), crate::error::HandlerError> + Send + 'static
    {
        let handler: Handler = Box::new(handler);
        lock(&self.dispatcher).on(kind, handler);
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.control.clone()
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn disconnect(&self) {
        self.control.disconnect();
    }

    /// The configured id until the master announced one, then the announced one.
    pub fn framework_id(&self) -> Option<String> {
        read(&self.framework_id).clone()
    }

    pub fn master_info(&self) -> Option<Json> {
        read(&self.master_info).clone()
    }

    pub fn heartbeat_interval(&self) -> Option<f64> {
        *read(&self.heartbeat_interval)
    }

    /// The driver bound to the live session, once SUBSCRIBED arrived on it.
    pub fn driver(&self) -> Option<SchedulerDriver> {
        read(&self.driver).clone()
    }

    pub fn state(&self) -> ConnectionState {
        *read(&self.state)
    }

    /// Connects and streams until stopped, disconnected, or out of attempts.
    ///
    /// Connectivity loss is never an error here: it is retried up to `max_reconnect` consecutive
    /// failures and reported as `Termination::GaveUp` afterwards. Only a SUBSCRIBED event resets
    /// the count, so a master that accepts the handshake and then drops the stream still runs
    /// out of attempts.
    pub fn register(&self) -> Termination {
        let termination = self.supervise();
        self.leave_session();
        self.set_state(ConnectionState::Stopped);
        self.control.clear();
        info!("scheduler loop ended: {:?}", termination);
        termination
    }

    fn supervise(&self) -> Termination {
        let max_attempts = cmp::max(self.max_reconnect, 1);
        let mut failures = 0;
        let mut disconnected = false;

        loop {
            if let Some(requested) = self.control.requested() {
                return requested;
            }

            self.enter_connecting();
            let outcome = self.connect().and_then(|subscription| {
                self.stream(subscription, &mut |session: &Session| {
                    failures = 0;
                    if disconnected {
                        disconnected = false;
                        self.emit(&Event::Reconnected(format!("subscribed again to {}", session.base_url())));
                    }
                })
            });

            let err = match outcome {
                Ok(termination) => return termination,
                Err(err) => err,
            };

            failures += 1;
            error!("connection to master lost ({}/{}): {}", failures, max_attempts, err);
            self.leave_session();
            self.set_state(ConnectionState::Disconnected);
            if !disconnected {
                disconnected = true;
                self.emit(&Event::Disconnected(err.to_string()));
            }

            if failures >= max_attempts {
                error!("giving up after {} failed attempts", failures);
                return Termination::GaveUp;
            }
            self.pause();
        }
    }

    fn enter_connecting(&self) {
        self.set_state(ConnectionState::Connecting);
        self.resolver.reset();
        *write(&self.driver) = None;
    }

    fn leave_session(&self) {
        *write(&self.driver) = None;
        self.link.sessions().clear();
    }

    /// Tries every endpoint once, returning the first successful subscription.
    fn connect(&self) -> Result<Subscription, ConnectionError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let framework_id = self.framework_id();
        let framework_id = framework_id.as_ref().map(|id| id.as_str());
        let call = SchedulerCall::Subscribe(self.identity.subscribe_payload(framework_id));

        let mut last_error = None;
        while let Some(candidate) = self.resolver.next_candidate() {
            let subscribed =
                candidate.and_then(|base| self.link.subscribe(&base, &call, framework_id, generation));
            match subscribed {
                Ok(subscription) => {
                    info!("subscribed to {} (generation {})", subscription.session.base_url(), generation);
                    return Ok(subscription);
                }
                Err(err) => {
                    warn!("subscribe failed: {}", err);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ConnectionError::Resolution("no master endpoint configured".to_string())))
    }

    /// Reads frames until the stream breaks or a stop is requested. `on_subscribed` runs ahead of
    /// the handlers of every SUBSCRIBED frame.
    fn stream(&self, subscription: Subscription, on_subscribed: &mut dyn FnMut(&Session))
              -> Result<Termination, ConnectionError> {
        let mut session = self.link.sessions().publish(subscription.session);
        let mut reader = RecordReader::new(subscription.body);
        self.set_state(ConnectionState::Streaming);

        loop {
            let frame = match reader.next_record()? {
                Some(frame) => Frame::parse(frame)?,
                None => {
                    let closed = format!("{} closed the event stream", session.base_url());
                    return Err(TransportError::Io(closed).into());
                }
            };
            if let Frame::Subscribed { .. } = frame {
                on_subscribed(&session);
            }
            self.handle_frame(&mut session, frame)?;

            match self.control.requested() {
                Some(Termination::Stopped) => {
                    if let Some(driver) = self.driver() {
                        driver.teardown();
                    }
                    return Ok(Termination::Stopped);
                }
                Some(requested) => {
                    info!("leaving framework {:?} registered", session.framework_id());
                    return Ok(requested);
                }
                None => {}
            }
        }
    }

    fn handle_frame(&self, session: &mut Arc<Session>, frame: Frame) -> Result<(), ConnectionError> {
        match frame {
            Frame::Subscribed { framework_id, heartbeat_interval, master_info } => {
                let framework_id = self.learn_framework_id(framework_id);
                *session = self.link.sessions().publish(session.with_framework_id(&framework_id));
                *write(&self.master_info) = master_info;
                *write(&self.heartbeat_interval) = heartbeat_interval;

                let driver = SchedulerDriver::new(self.link.clone(), session.clone());
                *write(&self.driver) = Some(driver.clone());
                self.emit(&Event::Subscribed(driver));
            }
            Frame::Offers(offers) => {
                let driver = SchedulerDriver::new(self.link.clone(), session.clone());
                let offers = offers.into_iter()
                    .map(|offer| Offer::from_json(offer, driver.clone()))
                    .collect::<Result<Vec<_>, _>>()?;
                debug!("received {} offers", offers.len());
                self.emit(&Event::Offers(offers));
            }
            Frame::Update(status) => {
                if let Some(uuid) = status.uuid() {
                    let agent_id = status.agent_id().ok_or(ProtocolError::MissingField("update.status.agent_id"))?;
                    SchedulerDriver::new(self.link.clone(), session.clone())
                        .acknowledge(agent_id, status.task_id(), uuid)
                        .map_err(|err| ConnectionError::Acknowledge(Box::new(err)))?;
                }
                debug!("task {} is {}", status.task_id(), status.state());
                self.emit(&Event::Update(status));
            }
            Frame::Error(payload) => {
                error!("master reported an error: {}", payload);
                self.emit(&Event::Error(payload));
            }
            Frame::Failure(payload) => self.emit(&Event::Failure(payload)),
            Frame::Rescind(payload) => self.emit(&Event::Rescind(payload)),
            Frame::Message(payload) => self.emit(&Event::Message(payload)),
            Frame::Heartbeat => self.emit(&Event::Heartbeat),
            Frame::Unknown(kind) => debug!("ignoring {} event", kind),
        }
        Ok(())
    }

    /// The first id the master announces sticks for the life of this client.
    fn learn_framework_id(&self, announced: String) -> String {
        let mut known = write(&self.framework_id);
        if self.framework_id_learned.swap(true, Ordering::SeqCst) {
            if let Some(ref id) = *known {
                if *id != announced {
                    warn!("master announced framework id {}, keeping {}", announced, id);
                }
                return id.clone();
            }
        }
        info!("registered as framework {}", announced);
        *known = Some(announced.clone());
        announced
    }

    fn emit(&self, event: &Event) {
        if !lock(&self.dispatcher).dispatch(event) {
            debug!("some {} handlers failed", event.kind());
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *write(&self.state) = state;
    }

    /// Waits out the reconnect delay unless stop or disconnect is requested meanwhile.
    fn pause(&self) {
        let deadline = Instant::now() + self.reconnect_wait;
        loop {
            let now = Instant::now();
            if now >= deadline || self.control.requested().is_some() {
                return;
            }
            thread::sleep(cmp::min(deadline - now, Duration::from_millis(PAUSE_SLICE_MS)));
        }
    }
}

fn service_account_auth(config: &ClientConfig) -> Result<Option<Arc<dyn Authenticator>>, ConfigError> {
    match config.service_account {
        Some(ref secret) => {
            info!("authenticating as service account {}", secret.uid);
            let auth = ServiceAccountAuth::from_secret(secret.clone(), config.tls.clone())?;
            Ok(Some(Arc::new(auth)))
        }
        None => Ok(None),
    }
}

#[cfg(feature = "zookeeper")]
fn default_zookeeper(config: &ClientConfig) -> Option<Arc<dyn ZkConnector>> {
    Some(Arc::new(crate::master::zookeeper::ZooKeeperConnector::new(config.zookeeper_timeout)))
}

#[cfg(not(feature = "zookeeper"))]
fn default_zookeeper(_config: &ClientConfig) -> Option<Arc<dyn ZkConnector>> {
    None
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read<T>(rw: &RwLock<T>) -> std::sync::RwLockReadGuard<T> {
    rw.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(rw: &RwLock<T>) -> std::sync::RwLockWriteGuard<T> {
    rw.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
