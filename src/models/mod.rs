// Wire payload models (structs) and their parsers
pub mod frame;
pub mod gbm;
pub mod glm;
pub mod job;

pub use frame::*;
pub use gbm::*;
pub use glm::*;
pub use job::*;

use serde_json::Value;

use crate::error::{NimbusError, Result};

/// Read the `name` field out of a `{"name": ...}` key reference.
pub(crate) fn key_name(value: &Value) -> Option<String> {
    value
        .get("name")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// The models endpoint wraps its payload in `{"models": [...]}` with exactly
/// one element for a direct key fetch.
pub(crate) fn first_model(payload: &Value) -> Result<&Value> {
    payload
        .get("models")
        .and_then(|v| v.as_array())
        .and_then(|models| models.first())
        .ok_or_else(|| {
            NimbusError::MalformedResponse("models payload carries no model entry".to_string())
        })
}
