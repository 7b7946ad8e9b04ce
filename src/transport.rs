// HTTP transport against the cluster REST namespace
//
// All requests go through one blocking agent with connect and overall
// timeouts. Non-2xx statuses are split: 4xx keeps the server's message as a
// validation rejection, anything else is a transport failure.

use std::io::Read;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::connection::Connection;
use crate::error::{NimbusError, Result};
use crate::params::ParamSet;

const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// HTTP verb for a cluster request. The protocol only ever reads state or
/// submits work; nothing is deleted through this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A downloaded attachment: server-suggested filename (when the response
/// carried one) plus the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: Option<String>,
    pub body: Vec<u8>,
}

/// Request dispatch seam. `HttpTransport` is the production implementation;
/// tests substitute a scripted recorder.
pub trait Transport: Send + Sync {
    /// Send a parameterized request and parse the JSON body.
    fn request(&self, method: Method, path: &str, params: &ParamSet) -> Result<Value>;

    /// POST a raw body (CSV upload) with query parameters.
    fn upload(&self, path: &str, params: &ParamSet, body: &[u8]) -> Result<Value>;

    /// GET a binary attachment.
    fn download(&self, path: &str, params: &ParamSet) -> Result<Attachment>;
}

/// Production transport over a blocking `ureq` agent.
pub struct HttpTransport {
    agent: ureq::Agent,
    base: Url,
}

impl HttpTransport {
    pub fn new(connection: &Connection, request_timeout: Duration) -> Result<Self> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .timeout(request_timeout)
            .user_agent(concat!("nimbus-client/", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self {
            agent,
            base: connection.base_url()?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base.join(path.trim_start_matches('/')).map_err(|e| {
            NimbusError::InvalidArgument(format!("invalid endpoint path {:?}: {}", path, e))
        })
    }

    fn parse_body(response: ureq::Response) -> Result<Value> {
        response.into_json::<Value>().map_err(|e| {
            NimbusError::MalformedResponse(format!("response body is not valid JSON: {}", e))
        })
    }
}

impl Transport for HttpTransport {
    fn request(&self, method: Method, path: &str, params: &ParamSet) -> Result<Value> {
        let url = self.endpoint(path)?;
        let result = match method {
            Method::Get => {
                let mut request = self.agent.request_url("GET", &url);
                for (name, value) in params.render() {
                    request = request.query(&name, &value);
                }
                request.call()
            }
            Method::Post => {
                let rendered = params.render();
                let form: Vec<(&str, &str)> = rendered
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str()))
                    .collect();
                self.agent.request_url("POST", &url).send_form(&form)
            }
        };
        match result {
            Ok(response) => Self::parse_body(response),
            Err(e) => Err(classify(e)),
        }
    }

    fn upload(&self, path: &str, params: &ParamSet, body: &[u8]) -> Result<Value> {
        let url = self.endpoint(path)?;
        let mut request = self
            .agent
            .request_url("POST", &url)
            .set("Content-Type", "text/csv");
        for (name, value) in params.render() {
            request = request.query(&name, &value);
        }
        match request.send_bytes(body) {
            Ok(response) => Self::parse_body(response),
            Err(e) => Err(classify(e)),
        }
    }

    fn download(&self, path: &str, params: &ParamSet) -> Result<Attachment> {
        let url = self.endpoint(path)?;
        let mut request = self.agent.request_url("GET", &url);
        for (name, value) in params.render() {
            request = request.query(&name, &value);
        }
        match request.call() {
            Ok(response) => {
                let filename = response
                    .header("Content-Disposition")
                    .and_then(attachment_filename);
                let mut body = Vec::new();
                response.into_reader().read_to_end(&mut body)?;
                Ok(Attachment { filename, body })
            }
            Err(e) => Err(classify(e)),
        }
    }
}

fn classify(err: ureq::Error) -> NimbusError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = server_message(&body);
            if (400..500).contains(&status) {
                NimbusError::RemoteValidation { status, message }
            } else {
                NimbusError::Transport(format!("server returned {}: {}", status, message))
            }
        }
        ureq::Error::Transport(t) => NimbusError::Transport(t.to_string()),
    }
}

/// Pull the server's own message out of an error body, preserved verbatim.
/// Error payloads carry `exception_msg` (sometimes `msg`); anything else is
/// passed through as-is.
fn server_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for field in ["exception_msg", "msg"] {
            if let Some(message) = value.get(field).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    body.trim().to_string()
}

/// Parse the filename out of `attachment; filename=...` (quoted or bare).
fn attachment_filename(header: &str) -> Option<String> {
    let marker = "filename=";
    let start = header.find(marker)? + marker.len();
    let raw = header[start..].split(';').next()?.trim().trim_matches('"');
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
