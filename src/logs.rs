// Request capture sidecar and server log operations
//
// The capture toggle lives on the Cluster handle. Capturing is best effort:
// a failed append is logged and swallowed, never surfaced to the caller, and
// in-flight jobs are unaffected by toggling.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};

use crate::cluster::Cluster;
use crate::error::{NimbusError, Result};
use crate::params::{ParamSet, ParamValue};
use crate::transport::Method;

const DOWNLOAD_FALLBACK_FORMAT: &str = "nimbus_logs_%Y%m%d_%H%M%S.zip";

impl Cluster {
    /// Start appending one line per dispatched request to the given file.
    pub fn start_request_log(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        info!("request log enabled at {}", path.display());
        *self.request_log.lock() = Some(path);
    }

    /// Stop capturing requests. The capture file stays on disk.
    pub fn stop_request_log(&self) {
        *self.request_log.lock() = None;
    }

    /// Where requests are being captured, when enabled.
    pub fn request_log_path(&self) -> Option<PathBuf> {
        self.request_log.lock().clone()
    }

    /// Delete the capture file. A missing file is fine.
    pub fn clear_request_log(&self) -> Result<()> {
        let path = self.request_log.lock().clone();
        if let Some(path) = path {
            match std::fs::remove_file(&path) {
                Ok(()) => info!("cleared request log {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(NimbusError::Io(e)),
            }
        }
        Ok(())
    }

    /// Append one capture line for an outgoing request, when enabled.
    pub(crate) fn log_request(&self, method: Method, path: &str, params: &ParamSet) {
        let log_path = self.request_log.lock().clone();
        if let Some(log_path) = log_path {
            let query = params.render_query();
            let line = if query.is_empty() {
                format!("{} {} {}\n", Utc::now().to_rfc3339(), method.as_str(), path)
            } else {
                format!(
                    "{} {} {} {}\n",
                    Utc::now().to_rfc3339(),
                    method.as_str(),
                    path,
                    query
                )
            };
            if let Err(e) = append_line(&log_path, &line) {
                warn!("request log append failed at {}: {}", log_path.display(), e);
            }
        }
    }

    /// Ask the server to write a message into its own log; returns the echo.
    pub fn log_and_echo(&self, message: &str) -> Result<String> {
        let mut params = ParamSet::new();
        params.set("message", ParamValue::Str(message.to_string()));
        let payload = self.post("/3/LogAndEcho", params)?;
        payload
            .get("message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                NimbusError::MalformedResponse("log echo response has no message".to_string())
            })
    }

    /// Download the cluster's log archive into `dir` and return the local
    /// path. The name comes from the caller, else the attachment header,
    /// else a timestamped default. Header names are reduced to their final
    /// path component, so the file always lands under `dir`.
    pub fn download_logs(&self, dir: impl AsRef<Path>, filename: Option<&str>) -> Result<PathBuf> {
        let attachment = self.download("/3/Logs/download", ParamSet::new())?;
        let name = match filename {
            Some(name) => name.to_string(),
            None => attachment
                .filename
                .as_deref()
                .and_then(sanitize_attachment_name)
                .unwrap_or_else(|| Utc::now().format(DOWNLOAD_FALLBACK_FORMAT).to_string()),
        };
        std::fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(name);
        std::fs::write(&path, &attachment.body)?;
        info!(
            "downloaded cluster logs to {} ({} bytes)",
            path.display(),
            attachment.body.len()
        );
        Ok(path)
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

/// Reduce a server-suggested filename to its final path component so it
/// cannot name anything outside the download directory. Names with no final
/// component ("..", for one) are dropped in favor of the fallback.
fn sanitize_attachment_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}
