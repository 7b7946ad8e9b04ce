// Job polling
//
// Polling is plain blocking sleep between status requests. Any JobHandle
// works, including one deserialized in a fresh process; nothing about a job
// lives client-side.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::cluster::Cluster;
use crate::error::{NimbusError, Result};
use crate::models::{JobHandle, JobStatus, JobView};
use crate::params::ParamSet;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Poll pacing: the wait between status requests and an optional overall
/// deadline. The default polls every 500 ms and waits indefinitely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: None,
        }
    }
}

impl PollConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

impl Cluster {
    /// One status request for a submitted job.
    pub fn poll_job(&self, handle: &JobHandle) -> Result<JobView> {
        let payload = self.get(&format!("/3/Jobs/{}", handle.job_id), ParamSet::new())?;
        JobView::from_jobs_payload(&payload)
    }

    /// Poll until the job reaches a terminal state or the timeout elapses.
    ///
    /// Terminal views come back as values, FAILED and CANCELLED included;
    /// the caller decides whether those are errors. On timeout the remote
    /// job keeps running: no cancellation is ever sent.
    pub fn wait_for_job(&self, handle: &JobHandle, config: &PollConfig) -> Result<JobView> {
        let started = Instant::now();
        loop {
            let view = self.poll_job(handle)?;
            if view.is_terminal() {
                info!("job {} finished: {}", handle.job_id, view.status);
                return Ok(view);
            }
            debug!(
                "job {} running, progress {:.0}%",
                handle.job_id,
                view.progress.unwrap_or(0.0) * 100.0
            );
            if let Some(timeout) = config.timeout {
                if started.elapsed() >= timeout {
                    return Err(NimbusError::PollTimeout {
                        job_id: handle.job_id.clone(),
                        waited: started.elapsed(),
                    });
                }
            }
            thread::sleep(config.interval);
        }
    }
}

/// Promote a terminal view into the result the synchronous path needs: DONE
/// passes through, FAILED and CANCELLED become errors carrying the server's
/// message.
pub(crate) fn ensure_done(view: JobView) -> Result<JobView> {
    match view.status {
        JobStatus::Done => Ok(view),
        JobStatus::Failed => {
            let message = view.failure_message();
            Err(NimbusError::JobFailed {
                job_id: view.job_id,
                message,
            })
        }
        JobStatus::Cancelled => {
            let message = view
                .exception
                .clone()
                .unwrap_or_else(|| "cancelled on the server".to_string());
            Err(NimbusError::JobCancelled {
                job_id: view.job_id,
                message,
            })
        }
        JobStatus::Running => Err(NimbusError::MalformedResponse(format!(
            "job {} came back non-terminal after waiting",
            view.job_id
        ))),
    }
}
