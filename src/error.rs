// Client error taxonomy
//
// Local validation failures are raised before any request is sent; remote
// failures carry the server's message verbatim.

use std::time::Duration;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, NimbusError>;

#[derive(Debug, Error)]
pub enum NimbusError {
    /// A parameter failed local validation. No network call was made.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The HTTP call itself failed: could not connect, timed out, or the
    /// server answered 5xx.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server rejected the request parameters (HTTP 4xx).
    #[error("server rejected request ({status}): {message}")]
    RemoteValidation { status: u16, message: String },

    /// The remote job finished in the FAILED state.
    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    /// The remote job finished in the CANCELLED state.
    #[error("job {job_id} was cancelled: {message}")]
    JobCancelled { job_id: String, message: String },

    /// Polling gave up before the job turned terminal. The remote job keeps
    /// running; the client never cancels it.
    #[error("gave up waiting for job {job_id} after {waited:?}")]
    PollTimeout { job_id: String, waited: Duration },

    /// A response did not match the documented wire shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl NimbusError {
    /// True for failures raised locally, before any request went out.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}
