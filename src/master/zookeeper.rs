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

//! Leader discovery through the ZooKeeper group the masters register in.

use std::str;

use rustc_serialize::json::Json;

use crate::error::ConnectionError;

pub const DEFAULT_PREFIX: &'static str = "/mesos";

const MASTER_PID_PREFIX: &'static str = "master@";

/// Read-only view of one ZooKeeper session.
pub trait ZkDirectory {
    fn children(&self, path: &str) -> Result<Vec<String>, ConnectionError>;
    fn data(&self, path: &str) -> Result<Vec<u8>, ConnectionError>;
}

pub trait ZkConnector: Send + Sync {
    fn connect(&self, ensemble: &str) -> Result<Box<dyn ZkDirectory>, ConnectionError>;
}

/// Returns the `host:port` of the master registered under `prefix`.
///
/// Only `json.*` children carry master info; they are visited in sequence order, so the lowest
/// sequence number (the elected leader) wins.
pub fn detect_master(connector: &dyn ZkConnector, ensemble: &str, prefix: &str) -> Result<String, ConnectionError> {
    let directory = connector.connect(ensemble)?;
    let mut children = directory.children(prefix)?;
    children.sort();

    for child in children.iter().filter(|child| child.starts_with("json")) {
        let path = format!("{}/{}", prefix.trim_end_matches('/'), child);
        let data = match directory.data(&path) {
            Ok(data) => data,
            Err(err) => {
                warn!("unable to read {}: {}", path, err);
                continue;
            }
        };

        let info = match str::from_utf8(&data).ok().and_then(|text| Json::from_str(text).ok()) {
            Some(info) => info,
            None => {
                warn!("{} does not hold json master info", path);
                continue;
            }
        };

        if let Some(pid) = info.find("pid").and_then(|pid| pid.as_string()) {
            if pid.starts_with(MASTER_PID_PREFIX) {
                let address = &pid[MASTER_PID_PREFIX.len()..];
                debug!("zookeeper {} names master {}", ensemble, address);
                return Ok(address.to_string());
            }
        }
    }

    Err(ConnectionError::Resolution(format!("no master registered in zookeeper {}{}", ensemble, prefix)))
}

#[cfg(feature = "zookeeper")]
pub use self::ensemble::ZooKeeperConnector;

#[cfg(feature = "zookeeper")]
mod ensemble {
    use std::time::Duration;

    use ::zookeeper::{WatchedEvent, Watcher, ZooKeeper};

    use super::{ZkConnector, ZkDirectory};
    use crate::error::ConnectionError;

    struct LoggingWatcher;

    impl Watcher for LoggingWatcher {
        fn handle(&self, event: WatchedEvent) {
            debug!("zookeeper watch fired on {:?}", event.path);
        }
    }

    pub struct ZooKeeperConnector {
        session_timeout: Duration,
    }

    impl ZooKeeperConnector {
        pub fn new(session_timeout: Duration) -> ZooKeeperConnector {
            ZooKeeperConnector { session_timeout: session_timeout }
        }
    }

    impl ZkConnector for ZooKeeperConnector {
        fn connect(&self, ensemble: &str) -> Result<Box<dyn ZkDirectory>, ConnectionError> {
            let zk = ZooKeeper::connect(ensemble, self.session_timeout, LoggingWatcher).map_err(|err| {
                ConnectionError::Resolution(format!("zookeeper {} unreachable: {:?}", ensemble, err))
            })?;
            Ok(Box::new(EnsembleSession { zk: zk }))
        }
    }

    struct EnsembleSession {
        zk: ZooKeeper,
    }

    impl ZkDirectory for EnsembleSession {
        fn children(&self, path: &str) -> Result<Vec<String>, ConnectionError> {
            self.zk
                .get_children(path, false)
                .map_err(|err| ConnectionError::Resolution(format!("unable to list {}: {:?}", path, err)))
        }

        fn data(&self, path: &str) -> Result<Vec<u8>, ConnectionError> {
            self.zk
                .get_data(path, false)
                .map(|(data, _)| data)
                .map_err(|err| ConnectionError::Resolution(format!("unable to read {}: {:?}", path, err)))
        }
    }

    impl Drop for EnsembleSession {
        fn drop(&mut self) {
            if let Err(err) = self.zk.close() {
                debug!("closing zookeeper session failed: {:?}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeZooKeeper;

    #[test]
    fn picks_the_lowest_sequence_master() {
        let zk = FakeZooKeeper::new()
            .node("/mesos/log_replicas", "")
            .node("/mesos/json.info_0000000007", r#"{"pid":"master@10.0.0.7:5050"}"#)
            .node("/mesos/json.info_0000000003", r#"{"pid":"master@10.0.0.3:5050"}"#);

        assert_eq!(detect_master(&zk, "zk1:2181", "/mesos").unwrap(), "10.0.0.3:5050");
    }

    #[test]
    fn skips_children_without_a_master_pid() {
        let zk = FakeZooKeeper::new()
            .node("/cluster/json.info_0000000001", "not json")
            .node("/cluster/json.info_0000000002", r#"{"pid":"slave@10.0.0.2:5051"}"#)
            .node("/cluster/json.info_0000000003", r#"{"pid":"master@10.0.0.4:5050"}"#);

        assert_eq!(detect_master(&zk, "zk1:2181", "/cluster").unwrap(), "10.0.0.4:5050");
    }

    #[test]
    fn fails_without_any_master() {
        let zk = FakeZooKeeper::new().node("/mesos/log_replicas", "");
        match detect_master(&zk, "zk1:2181", "/mesos") {
            Err(ConnectionError::Resolution(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unreachable_ensemble_is_a_resolution_error() {
        let zk = FakeZooKeeper::unreachable();
        match detect_master(&zk, "zk1:2181", "/mesos") {
            Err(ConnectionError::Resolution(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
