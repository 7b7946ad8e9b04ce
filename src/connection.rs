// Cluster endpoint identity

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::{NimbusError, Result};

/// Identifies a remote cluster endpoint. Immutable once created; the base
/// URL is validated eagerly so later calls cannot fail on URL syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    host: String,
    port: u16,
}

impl Connection {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(NimbusError::InvalidArgument("host must not be empty".to_string()));
        }
        let connection = Self { host, port };
        connection.base_url()?;
        Ok(connection)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for the REST namespace, e.g. `http://localhost:54321/`.
    pub fn base_url(&self) -> Result<Url> {
        let raw = format!("http://{}:{}/", self.host, self.port);
        Url::parse(&raw).map_err(|e| {
            NimbusError::InvalidArgument(format!("invalid cluster address {:?}: {}", raw, e))
        })
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
