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

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::zookeeper::{self, ZkConnector, DEFAULT_PREFIX};
use crate::error::{ConfigError, ConnectionError};
use crate::transport::Transport;

/// Where a master can be found.
#[derive(Clone, Debug, PartialEq)]
pub enum Endpoint {
    Direct(String),
    ZooKeeper { ensemble: String, prefix: String },
}

impl Endpoint {
    pub fn parse(text: &str) -> Result<Endpoint, ConfigError> {
        let text = text.trim();
        if text.starts_with("zk://") {
            let rest = &text["zk://".len()..];
            let (ensemble, prefix) = match rest.find('/') {
                Some(slash) => (&rest[..slash], &rest[slash..]),
                None => (rest, ""),
            };
            if ensemble.is_empty() {
                return Err(ConfigError::Endpoint(text.to_string()));
            }
            let prefix = match prefix.trim_matches('/') {
                "" => DEFAULT_PREFIX.to_string(),
                path => format!("/{}", path),
            };
            return Ok(Endpoint::ZooKeeper {
                ensemble: ensemble.to_string(),
                prefix: prefix,
            });
        }

        let base = text.trim_end_matches('/');
        if base.is_empty() || base.contains(char::is_whitespace) {
            return Err(ConfigError::Endpoint(text.to_string()));
        }
        if base.starts_with("http://") || base.starts_with("https://") {
            Ok(Endpoint::Direct(base.to_string()))
        } else {
            Ok(Endpoint::Direct(format!("http://{}", base)))
        }
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(text)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Endpoint::Direct(ref url) => write!(f, "{}", url),
            Endpoint::ZooKeeper { ref ensemble, ref prefix } => write!(f, "zk://{}{}", ensemble, prefix),
        }
    }
}

/// Turns the configured endpoints into master base URLs, one candidate at a time.
pub struct MasterResolver {
    endpoints: Vec<Endpoint>,
    cursor: AtomicUsize,
    transport: Arc<dyn Transport>,
    zookeeper: Option<Arc<dyn ZkConnector>>,
}

impl MasterResolver {
    pub fn new(endpoints: Vec<Endpoint>,
               transport: Arc<dyn Transport>,
               zookeeper: Option<Arc<dyn ZkConnector>>)
               -> MasterResolver {
        MasterResolver {
            endpoints: endpoints,
            cursor: AtomicUsize::new(0),
            transport: transport,
            zookeeper: zookeeper,
        }
    }

    /// Starts over at the first endpoint.
    pub fn reset(&self) {
        self.cursor.store(0, Ordering::SeqCst);
    }

    /// Resolves the next endpoint, or `None` once every endpoint has been tried.
    pub fn next_candidate(&self) -> Option<Result<String, ConnectionError>> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.endpoints.get(index).map(|endpoint| self.resolve(endpoint))
    }

    pub fn resolve(&self, endpoint: &Endpoint) -> Result<String, ConnectionError> {
        match *endpoint {
            Endpoint::Direct(ref url) => Ok(url.clone()),
            Endpoint::ZooKeeper { ref ensemble, ref prefix } => {
                let connector = self.zookeeper.as_ref().ok_or_else(|| {
                    ConnectionError::Resolution(format!("no zookeeper support to resolve {}", endpoint))
                })?;
                let address = zookeeper::detect_master(&**connector, ensemble, prefix)?;
                Ok(self.base_url_for(&address))
            }
        }
    }

    /// A master that refuses plain http is assumed to speak https only.
    fn base_url_for(&self, address: &str) -> String {
        let plain = format!("http://{}", address);
        match self.transport.probe(&plain) {
            Err(ref err) if err.is_refused() => {
                info!("{} refuses plain http, switching to https", address);
                format!("https://{}", address)
            }
            _ => plain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::testing::{FakeZooKeeper, RecordingTransport};

    fn zk_with_master() -> Arc<dyn ZkConnector> {
        Arc::new(FakeZooKeeper::new().node("/mesos/json.info_0000000001", r#"{"pid":"master@10.0.0.1:5050"}"#))
    }

    #[test]
    fn parses_endpoints() {
        assert_eq!(Endpoint::parse("http://m1:5050/").unwrap(), Endpoint::Direct("http://m1:5050".to_string()));
        assert_eq!(Endpoint::parse("m1:5050").unwrap(), Endpoint::Direct("http://m1:5050".to_string()));
        assert_eq!(Endpoint::parse("zk://zk1:2181,zk2:2181").unwrap(),
                   Endpoint::ZooKeeper {
                       ensemble: "zk1:2181,zk2:2181".to_string(),
                       prefix: "/mesos".to_string(),
                   });
        assert_eq!(Endpoint::parse("zk://zk1:2181/dc1/mesos/").unwrap(),
                   Endpoint::ZooKeeper {
                       ensemble: "zk1:2181".to_string(),
                       prefix: "/dc1/mesos".to_string(),
                   });
        assert!(Endpoint::parse("zk:///mesos").is_err());
        assert!(Endpoint::parse("").is_err());
    }

    #[test]
    fn walks_candidates_in_order_until_reset() {
        let transport = Arc::new(RecordingTransport::new());
        let resolver = MasterResolver::new(vec![Endpoint::parse("http://a").unwrap(), Endpoint::parse("http://b").unwrap()],
                                           transport,
                                           None);

        assert_eq!(resolver.next_candidate().unwrap().unwrap(), "http://a");
        assert_eq!(resolver.next_candidate().unwrap().unwrap(), "http://b");
        assert!(resolver.next_candidate().is_none());

        resolver.reset();
        assert_eq!(resolver.next_candidate().unwrap().unwrap(), "http://a");
    }

    #[test]
    fn zookeeper_master_answering_http_keeps_http() {
        let transport = Arc::new(RecordingTransport::new());
        transport.set_probe("http://10.0.0.1:5050", Ok(200));
        let resolver = MasterResolver::new(vec![], transport, Some(zk_with_master()));

        let endpoint = Endpoint::parse("zk://zk1:2181/mesos").unwrap();
        assert_eq!(resolver.resolve(&endpoint).unwrap(), "http://10.0.0.1:5050");
    }

    #[test]
    fn zookeeper_master_refusing_http_switches_to_https() {
        let transport = Arc::new(RecordingTransport::new());
        transport.set_probe("http://10.0.0.1:5050", Err(TransportError::Refused("http://10.0.0.1:5050".to_string())));
        let resolver = MasterResolver::new(vec![], transport, Some(zk_with_master()));

        let endpoint = Endpoint::parse("zk://zk1:2181/mesos").unwrap();
        assert_eq!(resolver.resolve(&endpoint).unwrap(), "https://10.0.0.1:5050");
    }

    #[test]
    fn other_probe_failures_keep_http() {
        let transport = Arc::new(RecordingTransport::new());
        transport.set_probe("http://10.0.0.1:5050", Err(TransportError::TimedOut("http://10.0.0.1:5050".to_string())));
        let resolver = MasterResolver::new(vec![], transport, Some(zk_with_master()));

        let endpoint = Endpoint::parse("zk://zk1:2181").unwrap();
        assert_eq!(resolver.resolve(&endpoint).unwrap(), "http://10.0.0.1:5050");
    }

    #[test]
    fn zookeeper_endpoint_without_connector_fails() {
        let resolver = MasterResolver::new(vec![], Arc::new(RecordingTransport::new()), None);
        match resolver.resolve(&Endpoint::parse("zk://zk1:2181").unwrap()) {
            Err(ConnectionError::Resolution(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
