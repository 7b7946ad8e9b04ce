// Job lifecycle payloads

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NimbusError, Result};
use crate::models::key_name;

/// Server-side lifecycle state of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Done,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Parse a wire status string. The status comes from the server, so an
    /// unrecognized value means the response does not match the contract.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(NimbusError::MalformedResponse(format!(
                "unknown job status {:?}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Terminal states never transition again; polling stops here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle to a submitted remote job: the job id for polling plus the key the
/// result will land under. Serializable, so a fresh process can resume
/// polling with nothing but this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub destination_key: String,
}

impl JobHandle {
    /// Parse the `{"job": {...}}` envelope returned by a model-builder
    /// submission.
    pub(crate) fn from_submit_payload(payload: &Value) -> Result<Self> {
        let job = payload.get("job").ok_or_else(|| {
            NimbusError::MalformedResponse("submit response carries no job object".to_string())
        })?;
        let job_id = job.get("key").and_then(key_name).ok_or_else(|| {
            NimbusError::MalformedResponse("submit response job has no key name".to_string())
        })?;
        let destination_key = job.get("dest").and_then(key_name).ok_or_else(|| {
            NimbusError::MalformedResponse("submit response job has no destination key".to_string())
        })?;
        Ok(Self {
            job_id,
            destination_key,
        })
    }
}

/// One observation of a job's state, as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: String,
    pub destination_key: String,
    pub status: JobStatus,
    pub progress: Option<f64>,
    pub exception: Option<String>,
}

impl JobView {
    /// Parse the first entry of a `{"jobs": [...]}` status payload.
    pub(crate) fn from_jobs_payload(payload: &Value) -> Result<Self> {
        let job = payload
            .get("jobs")
            .and_then(|v| v.as_array())
            .and_then(|jobs| jobs.first())
            .ok_or_else(|| {
                NimbusError::MalformedResponse("jobs payload carries no job entry".to_string())
            })?;
        let job_id = job.get("key").and_then(key_name).ok_or_else(|| {
            NimbusError::MalformedResponse("job entry has no key name".to_string())
        })?;
        let destination_key = job.get("dest").and_then(key_name).ok_or_else(|| {
            NimbusError::MalformedResponse("job entry has no destination key".to_string())
        })?;
        let raw_status = job.get("status").and_then(|v| v.as_str()).ok_or_else(|| {
            NimbusError::MalformedResponse("job entry has no status".to_string())
        })?;
        Ok(Self {
            job_id,
            destination_key,
            status: JobStatus::parse(raw_status)?,
            progress: job.get("progress").and_then(|v| v.as_f64()),
            exception: job
                .get("exception")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            job_id: self.job_id.clone(),
            destination_key: self.destination_key.clone(),
        }
    }

    /// The server's failure message, verbatim when one was reported.
    pub fn failure_message(&self) -> String {
        match &self.exception {
            Some(message) => message.clone(),
            None => format!("job {} reported no failure detail", self.job_id),
        }
    }
}
