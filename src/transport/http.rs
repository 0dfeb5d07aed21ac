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

use std::error::Error as StdError;
use std::fs;
use std::io;
use std::time::Duration;

use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::redirect::Policy;
use reqwest::Certificate;

use super::{HttpReply, Transport};
use crate::collaborator::auth::TlsPolicy;
use crate::error::{ConfigError, TransportError};

#[derive(Clone, Debug)]
pub struct TransportSettings {
    pub connect_timeout: Option<Duration>,
    pub call_timeout: Duration,
    pub tls: TlsPolicy,
}

impl Default for TransportSettings {
    fn default() -> TransportSettings {
        TransportSettings {
            connect_timeout: None,
            call_timeout: Duration::from_secs(30),
            tls: TlsPolicy::Verify,
        }
    }
}

/// Blocking reqwest clients: one without a total deadline for the subscribe stream, one bounded
/// by the call timeout for everything else. Neither follows redirects on its own.
pub struct HttpTransport {
    stream_client: Client,
    call_client: Client,
}

impl HttpTransport {
    pub fn new(settings: &TransportSettings) -> Result<HttpTransport, ConfigError> {
        let stream_client = builder(settings)?
            .timeout(None)
            .build()
            .map_err(|err| ConfigError::Client(err.to_string()))?;
        let call_client = builder(settings)?
            .timeout(settings.call_timeout)
            .build()
            .map_err(|err| ConfigError::Client(err.to_string()))?;

        Ok(HttpTransport {
            stream_client: stream_client,
            call_client: call_client,
        })
    }
}

impl Transport for HttpTransport {
    fn post(&self, url: &str, headers: &[(&'static str, String)], body: String, streaming: bool)
            -> Result<HttpReply, TransportError> {
        let client = if streaming { &self.stream_client } else { &self.call_client };

        let mut request = client.post(url).body(body);
        for &(name, ref value) in headers {
            request = request.header(name, value.as_str());
        }

        let response = request.send().map_err(|err| classify(url, err))?;
        Ok(reply(response))
    }

    fn probe(&self, url: &str) -> Result<u16, TransportError> {
        let response = self.call_client.get(url).send().map_err(|err| classify(url, err))?;
        Ok(response.status().as_u16())
    }
}

fn builder(settings: &TransportSettings) -> Result<ClientBuilder, ConfigError> {
    let mut builder = Client::builder().redirect(Policy::none());
    if let Some(timeout) = settings.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    match settings.tls {
        TlsPolicy::Verify => {}
        TlsPolicy::Insecure => builder = builder.danger_accept_invalid_certs(true),
        TlsPolicy::TrustBundle(ref path) => {
            let pem = fs::read(path).map_err(|err| {
                ConfigError::Unreadable {
                    path: path.display().to_string(),
                    reason: err.to_string(),
                }
            })?;
            let certificate = Certificate::from_pem(&pem).map_err(|err| ConfigError::Client(err.to_string()))?;
            builder = builder.add_root_certificate(certificate);
        }
    }
    Ok(builder)
}

fn reply(response: Response) -> HttpReply {
    let status = response.status().as_u16();
    let headers = response.headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string())))
        .collect();
    HttpReply::new(status, headers, Box::new(response))
}

fn classify(url: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::TimedOut(url.to_string());
    }
    if connection_refused(&err) {
        return TransportError::Refused(url.to_string());
    }
    TransportError::Io(format!("{}: {}", url, err))
}

fn connection_refused(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
