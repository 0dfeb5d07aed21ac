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

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use yaml_rust::yaml::Yaml;
use yaml_rust::YamlLoader;

use crate::collaborator::auth::{ServiceSecret, TlsPolicy};
use crate::error::ConfigError;
use crate::master::Endpoint;
use crate::scheduler::framework::{FrameworkIdentity, DEFAULT_NAME, DEFAULT_USER};
use crate::transport::TransportSettings;

pub const DEFAULT_MAX_RECONNECT: u32 = 3;
pub const DEFAULT_RECONNECT_WAIT: f64 = 10.0;
pub const DEFAULT_CALL_TIMEOUT: f64 = 30.0;
pub const DEFAULT_ZOOKEEPER_TIMEOUT: f64 = 10.0;
pub const DEFAULT_SIGNING_SCHEME: &'static str = "RS256";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub masters: Vec<Endpoint>,
    pub framework: FrameworkIdentity,
    /// Consecutive failed attempts before giving up.
    pub max_reconnect: u32,
    pub reconnect_wait: Duration,
    pub connect_timeout: Option<Duration>,
    pub call_timeout: Duration,
    pub zookeeper_timeout: Duration,
    pub tls: TlsPolicy,
    pub service_account: Option<ServiceSecret>,
}

impl ClientConfig {
    pub fn new(masters: Vec<Endpoint>, framework: FrameworkIdentity) -> ClientConfig {
        ClientConfig {
            masters: masters,
            framework: framework,
            max_reconnect: DEFAULT_MAX_RECONNECT,
            reconnect_wait: Duration::from_secs_f64(DEFAULT_RECONNECT_WAIT),
            connect_timeout: None,
            call_timeout: Duration::from_secs_f64(DEFAULT_CALL_TIMEOUT),
            zookeeper_timeout: Duration::from_secs_f64(DEFAULT_ZOOKEEPER_TIMEOUT),
            tls: TlsPolicy::Verify,
            service_account: None,
        }
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
        let path = path.as_ref();
        let unreadable = |err: std::io::Error| {
            ConfigError::Unreadable {
                path: path.display().to_string(),
                reason: err.to_string(),
            }
        };
        let mut text = String::new();
        File::open(path).and_then(|mut file| file.read_to_string(&mut text)).map_err(unreadable)?;
        ClientConfig::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<ClientConfig, ConfigError> {
        let docs = YamlLoader::load_from_str(text).map_err(|err| ConfigError::Yaml(err.to_string()))?;
        let doc = docs.into_iter().next().ok_or_else(|| ConfigError::Missing("masters".to_string()))?;

        let masters = read_list(&doc, "masters")?;
        if masters.is_empty() {
            return Err(ConfigError::Missing("masters".to_string()));
        }
        let masters = masters.iter().map(|master| Endpoint::parse(master)).collect::<Result<Vec<_>, _>>()?;

        let mut config = ClientConfig::new(masters, read_framework(&doc["framework"])?);
        config.max_reconnect = read_int(&doc, "max_reconnect", DEFAULT_MAX_RECONNECT as i64)? as u32;
        config.reconnect_wait = read_seconds(&doc, "reconnect_wait_seconds", DEFAULT_RECONNECT_WAIT)?;
        config.connect_timeout = match read_optional_float(&doc, "connect_timeout_seconds")? {
            Some(value) => Some(seconds("connect_timeout_seconds", value)?),
            None => None,
        };
        config.call_timeout = read_seconds(&doc, "call_timeout_seconds", DEFAULT_CALL_TIMEOUT)?;
        config.zookeeper_timeout =
            read_seconds(&doc, "zookeeper_session_timeout_seconds", DEFAULT_ZOOKEEPER_TIMEOUT)?;
        config.tls = read_tls(&doc["tls"])?;
        config.service_account = read_service_account(&doc["service_account"])?;
        Ok(config)
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            connect_timeout: self.connect_timeout,
            call_timeout: self.call_timeout,
            tls: self.tls.clone(),
        }
    }
}

fn read_seconds(element: &Yaml, key: &str, default: f64) -> Result<Duration, ConfigError> {
    seconds(key, read_float(element, key, default)?)
}

fn seconds(key: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value.max(0.0)).map_err(|_| wrong_type(key, "a finite number of seconds"))
}

fn read_framework(element: &Yaml) -> Result<FrameworkIdentity, ConfigError> {
    let name = read_optional_string(element, "name")?.unwrap_or_else(|| DEFAULT_NAME.to_string());
    let user = read_optional_string(element, "user")?.unwrap_or_else(|| DEFAULT_USER.to_string());

    let mut identity = FrameworkIdentity::new(&name, &user).checkpoint(read_bool(element, "checkpoint", true)?);
    identity.hostname = read_optional_string(element, "hostname")?;
    identity.webui_url = read_optional_string(element, "webui_url")?;
    identity.role = read_optional_string(element, "role")?;
    identity.capabilities = read_list(element, "capabilities")?;
    identity.failover_timeout = read_optional_float(element, "failover_timeout")?;
    identity.principal = read_optional_string(element, "principal")?;
    identity.secret = read_optional_string(element, "secret")?;
    identity.framework_id = read_optional_string(element, "id")?;
    Ok(identity)
}

fn read_tls(element: &Yaml) -> Result<TlsPolicy, ConfigError> {
    if let Some(bundle) = read_optional_string(element, "ca_bundle")? {
        return Ok(TlsPolicy::TrustBundle(PathBuf::from(bundle)));
    }
    match element["verify"].is_badvalue() {
        true => Ok(TlsPolicy::Verify),
        false if read_bool(element, "verify", true)? => Ok(TlsPolicy::Verify),
        false => Ok(TlsPolicy::Insecure),
    }
}

fn read_service_account(element: &Yaml) -> Result<Option<ServiceSecret>, ConfigError> {
    if element.is_badvalue() || element.is_null() {
        return Ok(None);
    }
    Ok(Some(ServiceSecret {
        uid: read_string(element, "uid")?,
        private_key: read_string(element, "private_key")?,
        scheme: read_optional_string(element, "scheme")?.unwrap_or_else(|| DEFAULT_SIGNING_SCHEME.to_string()),
        login_endpoint: read_string(element, "login_endpoint")?,
    }))
}

fn wrong_type(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::WrongType {
        key: key.to_string(),
        expected: expected,
    }
}

pub fn read_string(element: &Yaml, key: &str) -> Result<String, ConfigError> {
    read_optional_string(element, key)?.ok_or_else(|| ConfigError::Missing(key.to_string()))
}

pub fn read_optional_string(element: &Yaml, key: &str) -> Result<Option<String>, ConfigError> {
    match element[key] {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::String(ref value) => Ok(Some(value.clone())),
        Yaml::Integer(value) => Ok(Some(value.to_string())),
        _ => Err(wrong_type(key, "a string")),
    }
}

pub fn read_bool(element: &Yaml, key: &str, default: bool) -> Result<bool, ConfigError> {
    match element[key].is_badvalue() {
        true => Ok(default),
        false => element[key].as_bool().ok_or_else(|| wrong_type(key, "a boolean")),
    }
}

pub fn read_float(element: &Yaml, key: &str, default: f64) -> Result<f64, ConfigError> {
    Ok(read_optional_float(element, key)?.unwrap_or(default))
}

fn read_optional_float(element: &Yaml, key: &str) -> Result<Option<f64>, ConfigError> {
    match element[key] {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Integer(value) => Ok(Some(value as f64)),
        ref value => value.as_f64().map(Some).ok_or_else(|| wrong_type(key, "a number")),
    }
}

pub fn read_int(element: &Yaml, key: &str, default: i64) -> Result<i64, ConfigError> {
    match element[key].is_badvalue() {
        true => Ok(default),
        false => {
            match element[key].as_i64() {
                Some(value) if value >= 0 => Ok(value),
                _ => Err(wrong_type(key, "a non-negative integer")),
            }
        }
    }
}

/// A list of strings; a lone string counts as a one-element list.
pub fn read_list(element: &Yaml, key: &str) -> Result<Vec<String>, ConfigError> {
    match element[key] {
        Yaml::BadValue | Yaml::Null => Ok(vec![]),
        Yaml::String(ref value) => Ok(vec![value.clone()]),
        Yaml::Array(ref items) => {
            items.iter()
                .map(|item| item.as_str().map(|value| value.to_string()).ok_or_else(|| wrong_type(key, "a list of strings")))
                .collect()
        }
        _ => Err(wrong_type(key, "a list of strings")),
    }
}
