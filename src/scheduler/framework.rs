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

use rustc_serialize::json::Json;

use crate::protocol::{id_value, object};

pub const DEFAULT_NAME: &'static str = "Mesos HTTP framework";
pub const DEFAULT_USER: &'static str = "root";

/// Who the framework claims to be when it subscribes.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameworkIdentity {
    pub name: String,
    pub user: String,
    pub hostname: Option<String>,
    pub webui_url: Option<String>,
    pub role: Option<String>,
    pub capabilities: Vec<String>,
    pub failover_timeout: Option<f64>,
    pub checkpoint: bool,
    pub principal: Option<String>,
    pub secret: Option<String>,
    /// Id of a framework registered earlier by another process, to resume it.
    pub framework_id: Option<String>,
}

impl Default for FrameworkIdentity {
    fn default() -> FrameworkIdentity {
        FrameworkIdentity::new(DEFAULT_NAME, DEFAULT_USER)
    }
}

impl FrameworkIdentity {
    pub fn new(name: &str, user: &str) -> FrameworkIdentity {
        FrameworkIdentity {
            name: name.to_string(),
            user: user.to_string(),
            hostname: None,
            webui_url: None,
            role: None,
            capabilities: vec![],
            failover_timeout: None,
            checkpoint: true,
            principal: None,
            secret: None,
            framework_id: None,
        }
    }

    pub fn hostname(mut self, hostname: &str) -> FrameworkIdentity {
        self.hostname = Some(hostname.to_string());
        self
    }

    pub fn webui_url(mut self, url: &str) -> FrameworkIdentity {
        self.webui_url = Some(url.to_string());
        self
    }

    pub fn role(mut self, role: &str) -> FrameworkIdentity {
        self.role = Some(role.to_string());
        self
    }

    /// Adds a capability tag such as `PARTITION_AWARE`.
    pub fn capability(mut self, capability: &str) -> FrameworkIdentity {
        self.capabilities.push(capability.to_string());
        self
    }

    pub fn failover_timeout(mut self, seconds: f64) -> FrameworkIdentity {
        self.failover_timeout = Some(seconds);
        self
    }

    pub fn checkpoint(mut self, checkpoint: bool) -> FrameworkIdentity {
        self.checkpoint = checkpoint;
        self
    }

    pub fn credentials(mut self, principal: &str, secret: &str) -> FrameworkIdentity {
        self.principal = Some(principal.to_string());
        self.secret = Some(secret.to_string());
        self
    }

    pub fn framework_id(mut self, framework_id: &str) -> FrameworkIdentity {
        self.framework_id = Some(framework_id.to_string());
        self
    }

    /// Builds the `subscribe` object of a SUBSCRIBE call, resuming `framework_id` when given.
    pub fn subscribe_payload(&self, framework_id: Option<&str>) -> Json {
        let mut info = vec![
            ("user", Json::String(self.user.clone())),
            ("name", Json::String(self.name.clone())),
            ("checkpoint", Json::Boolean(self.checkpoint)),
        ];
        if let Some(ref hostname) = self.hostname {
            info.push(("hostname", Json::String(hostname.clone())));
        }
        if let Some(ref url) = self.webui_url {
            info.push(("webui_url", Json::String(url.clone())));
        }
        if let Some(ref role) = self.role {
            info.push(("role", Json::String(role.clone())));
        }
        if !self.capabilities.is_empty() {
            let capabilities = self.capabilities
                .iter()
                .map(|capability| object(vec![("type", Json::String(capability.clone()))]))
                .collect();
            info.push(("capabilities", Json::Array(capabilities)));
        }
        if let Some(timeout) = self.failover_timeout {
            info.push(("failover_timeout", Json::F64(timeout)));
        }
        if let Some(ref principal) = self.principal {
            info.push(("principal", Json::String(principal.clone())));
        }
        if let Some(id) = framework_id {
            info.push(("id", id_value(id)));
        }

        let mut subscribe = vec![("framework_info", object(info))];
        if let (Some(principal), Some(secret)) = (self.principal.as_ref(), self.secret.as_ref()) {
            let credential = object(vec![
                ("principal", Json::String(principal.clone())),
                ("secret", Json::String(secret.clone())),
            ]);
            subscribe.push(("credentials", Json::Array(vec![credential])));
        }
        object(subscribe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_identity_sends_only_user_name_and_checkpoint() {
        let payload = FrameworkIdentity::new("sample", "nobody").subscribe_payload(None);
        let expected = Json::from_str(
            r#"{"framework_info":{"user":"nobody","name":"sample","checkpoint":true}}"#,
        )
        .unwrap();
        assert_eq!(payload, expected);
    }

    #[test]
    fn optional_fields_are_included_when_set() {
        let identity = FrameworkIdentity::new("sample", "root")
            .role("batch")
            .capability("PARTITION_AWARE")
            .failover_timeout(3600.0)
            .checkpoint(false)
            .credentials("svc", "s3cret");
        let payload = identity.subscribe_payload(Some("f1"));

        let info = payload.find("framework_info").unwrap();
        assert_eq!(info.find("role").and_then(|r| r.as_string()), Some("batch"));
        assert_eq!(info.find("checkpoint").and_then(|r| r.as_boolean()), Some(false));
        assert_eq!(info.find_path(&["id", "value"]).and_then(|r| r.as_string()), Some("f1"));
        assert_eq!(info.find("failover_timeout").and_then(|r| r.as_f64()), Some(3600.0));
        assert_eq!(info.find("principal").and_then(|r| r.as_string()), Some("svc"));
        assert_eq!(info.find("capabilities"),
                   Some(&Json::from_str(r#"[{"type":"PARTITION_AWARE"}]"#).unwrap()));
        assert_eq!(payload.find("credentials"),
                   Some(&Json::from_str(r#"[{"principal":"svc","secret":"s3cret"}]"#).unwrap()));
    }
}
