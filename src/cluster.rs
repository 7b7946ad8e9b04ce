// Cluster context: the one object every operation goes through.
//
// Holds the connection, the transport, and the request-log toggle. No global
// state anywhere; callers keep the Cluster and pass it explicitly.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::Value;

use crate::connection::Connection;
use crate::error::{NimbusError, Result};
use crate::params::ParamSet;
use crate::transport::{Attachment, HttpTransport, Method, Transport};

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;
const RETRY_BACKOFF_MS: u64 = 250;

/// Client handle for one cluster endpoint. All operations take `&self`; the
/// handle can be shared across threads.
pub struct Cluster {
    connection: Connection,
    transport: Box<dyn Transport>,
    retries: u32,
    pub(crate) request_log: Mutex<Option<PathBuf>>,
}

impl Cluster {
    /// Connect with default settings.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::builder(Connection::new(host, port)?).build()
    }

    pub fn builder(connection: Connection) -> ClusterBuilder {
        ClusterBuilder::new(connection)
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub(crate) fn get(&self, path: &str, params: ParamSet) -> Result<Value> {
        self.log_request(Method::Get, path, &params);
        debug!("GET {}", path);
        self.with_retries(|| self.transport.request(Method::Get, path, &params))
    }

    /// POSTs submit work, so they are never retried.
    pub(crate) fn post(&self, path: &str, params: ParamSet) -> Result<Value> {
        self.log_request(Method::Post, path, &params);
        debug!("POST {}", path);
        self.transport.request(Method::Post, path, &params)
    }

    pub(crate) fn upload_bytes(
        &self,
        path: &str,
        params: ParamSet,
        body: &[u8],
    ) -> Result<Value> {
        self.log_request(Method::Post, path, &params);
        debug!("POST {} ({} bytes)", path, body.len());
        self.transport.upload(path, &params, body)
    }

    pub(crate) fn download(&self, path: &str, params: ParamSet) -> Result<Attachment> {
        self.log_request(Method::Get, path, &params);
        debug!("GET {} (attachment)", path);
        self.with_retries(|| self.transport.download(path, &params))
    }

    /// Rerun an idempotent call on transport failure, up to the configured
    /// attempt count. Validation rejections pass straight through.
    fn with_retries<T>(&self, mut run: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            match run() {
                Err(NimbusError::Transport(message)) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "transport failure, retrying ({}/{}): {}",
                        attempt, self.retries, message
                    );
                    thread::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64));
                }
                other => return other,
            }
        }
    }
}

/// Configuration for a `Cluster` handle.
pub struct ClusterBuilder {
    connection: Connection,
    request_timeout: Duration,
    retries: u32,
    transport: Option<Box<dyn Transport>>,
}

impl ClusterBuilder {
    fn new(connection: Connection) -> Self {
        Self {
            connection,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            retries: 0,
            transport: None,
        }
    }

    /// Overall per-request timeout for the HTTP transport.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Extra attempts for idempotent requests after a transport failure.
    /// Off unless asked for.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Substitute the transport. Used for scripted transports in tests.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn build(self) -> Result<Cluster> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Box::new(HttpTransport::new(&self.connection, self.request_timeout)?),
        };
        info!("cluster client ready for {}", self.connection);
        Ok(Cluster {
            connection: self.connection,
            transport,
            retries: self.retries,
            request_log: Mutex::new(None),
        })
    }
}
