// Scripted transport for tests: replays queued replies in order and records
// every dispatched call, so tests can count and inspect network traffic.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::cluster::Cluster;
use crate::connection::Connection;
use crate::error::{NimbusError, Result};
use crate::params::ParamSet;
use crate::transport::{Attachment, Method, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Request,
    Upload,
    Download,
}

/// One dispatched call, with its parameters as rendered for the wire.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

pub enum ScriptedReply {
    Json(Value),
    Download(Attachment),
    TransportFailure(String),
    Validation { status: u16, message: String },
}

impl ScriptedReply {
    pub fn json(value: Value) -> Self {
        Self::Json(value)
    }

    pub fn download(filename: Option<&str>, body: Vec<u8>) -> Self {
        Self::Download(Attachment {
            filename: filename.map(|s| s.to_string()),
            body,
        })
    }

    pub fn transport_failure(message: &str) -> Self {
        Self::TransportFailure(message.to_string())
    }

    pub fn validation(status: u16, message: &str) -> Self {
        Self::Validation {
            status,
            message: message.to_string(),
        }
    }
}

pub struct MockTransport {
    script: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new(script: Vec<ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    fn record(
        &self,
        kind: CallKind,
        method: Method,
        path: &str,
        params: &ParamSet,
        body: Option<&[u8]>,
    ) {
        self.calls.lock().push(RecordedCall {
            kind,
            method,
            path: path.to_string(),
            params: params.render(),
            body: body.map(|b| b.to_vec()),
        });
    }

    fn next_reply(&self, path: &str) -> ScriptedReply {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("mock transport script exhausted at {}", path))
    }

    fn next_json(&self, path: &str) -> Result<Value> {
        match self.next_reply(path) {
            ScriptedReply::Json(value) => Ok(value),
            ScriptedReply::Download(_) => {
                panic!("scripted download where JSON was expected at {}", path)
            }
            ScriptedReply::TransportFailure(message) => Err(NimbusError::Transport(message)),
            ScriptedReply::Validation { status, message } => {
                Err(NimbusError::RemoteValidation { status, message })
            }
        }
    }
}

impl Transport for MockTransport {
    fn request(&self, method: Method, path: &str, params: &ParamSet) -> Result<Value> {
        self.record(CallKind::Request, method, path, params, None);
        self.next_json(path)
    }

    fn upload(&self, path: &str, params: &ParamSet, body: &[u8]) -> Result<Value> {
        self.record(CallKind::Upload, Method::Post, path, params, Some(body));
        self.next_json(path)
    }

    fn download(&self, path: &str, params: &ParamSet) -> Result<Attachment> {
        self.record(CallKind::Download, Method::Get, path, params, None);
        match self.next_reply(path) {
            ScriptedReply::Download(attachment) => Ok(attachment),
            ScriptedReply::Json(_) => {
                panic!("scripted JSON where a download was expected at {}", path)
            }
            ScriptedReply::TransportFailure(message) => Err(NimbusError::Transport(message)),
            ScriptedReply::Validation { status, message } => {
                Err(NimbusError::RemoteValidation { status, message })
            }
        }
    }
}

// Tests keep one Arc for assertions and hand the clone to the Cluster.
impl Transport for Arc<MockTransport> {
    fn request(&self, method: Method, path: &str, params: &ParamSet) -> Result<Value> {
        self.as_ref().request(method, path, params)
    }

    fn upload(&self, path: &str, params: &ParamSet, body: &[u8]) -> Result<Value> {
        self.as_ref().upload(path, params, body)
    }

    fn download(&self, path: &str, params: &ParamSet) -> Result<Attachment> {
        self.as_ref().download(path, params)
    }
}

pub fn cluster_with(mock: &Arc<MockTransport>) -> Cluster {
    cluster_with_retries(mock, 0)
}

pub fn cluster_with_retries(mock: &Arc<MockTransport>, retries: u32) -> Cluster {
    Cluster::builder(Connection::new("localhost", 54321).unwrap())
        .retries(retries)
        .transport(Arc::clone(mock))
        .build()
        .unwrap()
}

pub fn submit_payload(job_id: &str, dest: &str) -> Value {
    json!({
        "job": {
            "key": {"name": job_id},
            "dest": {"name": dest},
            "status": "RUNNING",
            "progress": 0.0
        }
    })
}

pub fn job_status_payload(job_id: &str, dest: &str, status: &str, progress: f64) -> Value {
    json!({
        "jobs": [{
            "key": {"name": job_id},
            "dest": {"name": dest},
            "status": status,
            "progress": progress,
            "exception": null
        }]
    })
}

pub fn failed_job_payload(job_id: &str, dest: &str, message: &str) -> Value {
    json!({
        "jobs": [{
            "key": {"name": job_id},
            "dest": {"name": dest},
            "status": "FAILED",
            "progress": 0.5,
            "exception": message
        }]
    })
}

pub fn cancelled_job_payload(job_id: &str, dest: &str, message: &str) -> Value {
    json!({
        "jobs": [{
            "key": {"name": job_id},
            "dest": {"name": dest},
            "status": "CANCELLED",
            "progress": 0.4,
            "exception": message
        }]
    })
}

pub fn models_payload(dest: &str, algo: &str, output: Value) -> Value {
    json!({
        "models": [{
            "model_id": {"name": dest},
            "algo": algo,
            "output": output
        }]
    })
}

pub fn glm_models_payload(dest: &str, coefficients: &[(&str, f64, f64)]) -> Value {
    let data: Vec<Value> = coefficients
        .iter()
        .map(|(name, value, standardized)| json!([name, value, standardized]))
        .collect();
    models_payload(
        dest,
        "glm",
        json!({
            "coefficients_table": {
                "name": "Coefficients",
                "columns": ["names", "coefficients", "standardized_coefficients"],
                "data": data
            }
        }),
    )
}

pub fn frames_payload(key: &str, columns: &[(&str, &str)]) -> Value {
    let columns: Vec<Value> = columns
        .iter()
        .map(|(label, kind)| json!({"label": label, "type": kind}))
        .collect();
    json!({
        "frames": [{
            "frame_id": {"name": key},
            "rows": 150,
            "columns": columns
        }]
    })
}

pub fn upload_ack_payload(key: &str) -> Value {
    json!({"destination_frame": {"name": key}})
}
