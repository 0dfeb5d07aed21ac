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

//! Optional authentication in front of the master (service-account login).

use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rustc_serialize::json::Json;
use serde::Serialize;

use crate::error::{AuthError, ConfigError};
use crate::protocol::{object, JSON_CONTENT};
use crate::transport::{HttpTransport, Transport, TransportSettings};

const TOKEN_LIFETIME_SECONDS: i64 = 180;

/// How the master's certificate is checked.
#[derive(Clone, Debug, PartialEq)]
pub enum TlsPolicy {
    Verify,
    Insecure,
    TrustBundle(PathBuf),
}

pub trait Authenticator: Send + Sync {
    /// Value for the `Authorization` header of the next request.
    fn authorization(&self) -> Result<String, AuthError>;

    fn tls_policy(&self) -> TlsPolicy;

    /// The principal the master knows this framework as, if the login implies one.
    fn principal(&self) -> Option<String> {
        None
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServiceSecret {
    pub uid: String,
    pub private_key: String,
    pub scheme: String,
    pub login_endpoint: String,
}

/// Produces the signed login token (typically a JWT over `uid` and `exp`).
pub trait LoginSigner: Send + Sync {
    fn sign(&self, secret: &ServiceSecret, expires_at: DateTime<Utc>) -> Result<String, AuthError>;
}

#[derive(Serialize)]
struct LoginClaims<'a> {
    uid: &'a str,
    exp: i64,
}

/// Signs `{uid, exp}` as a JWT with the account's private key and scheme.
pub struct JwtSigner {
    algorithm: Algorithm,
    key: EncodingKey,
}

impl JwtSigner {
    /// Parses the scheme and key up front so a bad secret fails at startup.
    pub fn new(secret: &ServiceSecret) -> Result<JwtSigner, ConfigError> {
        let algorithm = secret.scheme.parse::<Algorithm>().map_err(|_| ConfigError::WrongType {
            key: "service_account.scheme".to_string(),
            expected: "a JWT algorithm such as RS256",
        })?;
        let pem = secret.private_key.as_bytes();
        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(EncodingKey::from_secret(pem)),
            Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem),
            Algorithm::EdDSA => EncodingKey::from_ed_pem(pem),
            _ => EncodingKey::from_rsa_pem(pem),
        };
        let key = key.map_err(|_| ConfigError::WrongType {
            key: "service_account.private_key".to_string(),
            expected: "a PEM private key matching the scheme",
        })?;

        Ok(JwtSigner {
            algorithm: algorithm,
            key: key,
        })
    }
}

impl LoginSigner for JwtSigner {
    fn sign(&self, secret: &ServiceSecret, expires_at: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = LoginClaims {
            uid: &secret.uid,
            exp: expires_at.timestamp(),
        };
        jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.key)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Logs in with a service account and hands out `token=<...>` authorizations, logging in again
/// once the previous token expired.
pub struct ServiceAccountAuth {
    secret: ServiceSecret,
    signer: Box<dyn LoginSigner>,
    tls: TlsPolicy,
    transport: Arc<dyn Transport>,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(secret: ServiceSecret, signer: Box<dyn LoginSigner>, tls: TlsPolicy)
               -> Result<ServiceAccountAuth, ConfigError> {
        let settings = TransportSettings { tls: tls.clone(), ..TransportSettings::default() };
        let transport = HttpTransport::new(&settings)?;
        Ok(ServiceAccountAuth::with_transport(secret, signer, tls, Arc::new(transport)))
    }

    /// Signs logins with a `JwtSigner` built from `secret`.
    pub fn from_secret(secret: ServiceSecret, tls: TlsPolicy) -> Result<ServiceAccountAuth, ConfigError> {
        let signer = JwtSigner::new(&secret)?;
        ServiceAccountAuth::new(secret, Box::new(signer), tls)
    }

    pub fn with_transport(secret: ServiceSecret,
                          signer: Box<dyn LoginSigner>,
                          tls: TlsPolicy,
                          transport: Arc<dyn Transport>)
                          -> ServiceAccountAuth {
        ServiceAccountAuth {
            secret: secret,
            signer: signer,
            tls: tls,
            transport: transport,
            cached: Mutex::new(None),
        }
    }

    fn login(&self) -> Result<CachedToken, AuthError> {
        let expires_at = Utc::now() + Duration::seconds(TOKEN_LIFETIME_SECONDS);
        let login_token = self.signer.sign(&self.secret, expires_at)?;
        let payload = object(vec![
            ("uid", Json::String(self.secret.uid.clone())),
            ("token", Json::String(login_token)),
        ]);

        debug!("logging in as {} against {}", self.secret.uid, self.secret.login_endpoint);
        let headers = [("Content-Type", JSON_CONTENT.to_string())];
        let reply = self.transport.post(&self.secret.login_endpoint, &headers, payload.to_string(), false)?;
        if reply.status != 200 {
            return Err(AuthError::Rejected {
                endpoint: self.secret.login_endpoint.clone(),
                status: reply.status,
                body: reply.text(),
            });
        }

        let mut text = String::new();
        let mut body = reply.body;
        body.read_to_string(&mut text).map_err(|err| AuthError::Malformed(err.to_string()))?;
        let json = Json::from_str(&text).map_err(|err| AuthError::Malformed(format!("{:?}", err)))?;
        let token = json.find("token")
            .and_then(|token| token.as_string())
            .ok_or_else(|| AuthError::Malformed("no token in login reply".to_string()))?;

        Ok(CachedToken {
            token: token.to_string(),
            expires_at: expires_at,
        })
    }
}

impl Authenticator for ServiceAccountAuth {
    fn authorization(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let expired = match *cached {
            Some(ref token) => Utc::now() >= token.expires_at,
            None => true,
        };
        if expired {
            *cached = Some(self.login()?);
        }

        match *cached {
            Some(ref token) => Ok(format!("token={}", token.token)),
            None => Err(AuthError::Malformed("no token cached after login".to_string())),
        }
    }

    fn tls_policy(&self) -> TlsPolicy {
        self.tls.clone()
    }

    fn principal(&self) -> Option<String> {
        Some(self.secret.uid.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTransport, Scripted};

    struct PlainSigner;

    impl LoginSigner for PlainSigner {
        fn sign(&self, secret: &ServiceSecret, _expires_at: DateTime<Utc>) -> Result<String, AuthError> {
            Ok(format!("signed-{}", secret.uid))
        }
    }

    fn secret() -> ServiceSecret {
        ServiceSecret {
            uid: "scheduler".to_string(),
            private_key: "key".to_string(),
            scheme: "RS256".to_string(),
            login_endpoint: "http://iam/acs/api/v1/auth/login".to_string(),
        }
    }

    #[test]
    fn logs_in_once_and_reuses_the_token() {
        let transport = Arc::new(RecordingTransport::new());
        transport.script_call("http://iam/acs/api/v1/auth/login", Scripted::reply(200, vec![], r#"{"token":"abc"}"#));
        let auth = ServiceAccountAuth::with_transport(secret(), Box::new(PlainSigner), TlsPolicy::Insecure, transport.clone());

        assert_eq!(auth.authorization().unwrap(), "token=abc");
        assert_eq!(auth.authorization().unwrap(), "token=abc");

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body.find("token").and_then(|t| t.as_string()), Some("signed-scheduler"));
        assert_eq!(auth.principal(), Some("scheduler".to_string()));
    }

    #[derive(serde::Deserialize)]
    struct SignedClaims {
        uid: String,
        exp: i64,
    }

    #[test]
    fn jwt_signer_signs_uid_and_expiry() {
        let mut secret = secret();
        secret.scheme = "HS256".to_string();
        let signer = JwtSigner::new(&secret).unwrap();
        let expires_at = Utc::now() + Duration::seconds(TOKEN_LIFETIME_SECONDS);

        let token = signer.sign(&secret, expires_at).unwrap();
        let decoded = jsonwebtoken::decode::<SignedClaims>(&token,
                                                           &jsonwebtoken::DecodingKey::from_secret(b"key"),
                                                           &jsonwebtoken::Validation::new(Algorithm::HS256))
            .unwrap();
        assert_eq!(decoded.claims.uid, "scheduler");
        assert_eq!(decoded.claims.exp, expires_at.timestamp());
    }

    #[test]
    fn jwt_signer_rejects_unusable_secrets() {
        let mut secret = secret();
        secret.scheme = "ROT13".to_string();
        match JwtSigner::new(&secret) {
            Err(ConfigError::WrongType { ref key, .. }) if key == "service_account.scheme" => {}
            Err(other) => panic!("unexpected {:?}", other),
            Ok(_) => panic!("unknown scheme accepted"),
        }

        let secret = self::secret();
        match JwtSigner::new(&secret) {
            Err(ConfigError::WrongType { ref key, .. }) if key == "service_account.private_key" => {}
            Err(other) => panic!("unexpected {:?}", other),
            Ok(_) => panic!("non-PEM RSA key accepted"),
        }
    }

    #[test]
    fn rejected_login_is_an_auth_error() {
        let transport = Arc::new(RecordingTransport::new());
        transport.script_call("http://iam/acs/api/v1/auth/login", Scripted::reply(401, vec![], "denied"));
        let auth = ServiceAccountAuth::with_transport(secret(), Box::new(PlainSigner), TlsPolicy::Verify, transport);

        match auth.authorization() {
            Err(AuthError::Rejected { status, body, .. }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "denied");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
