// Gradient boosting types and the generic model artifact view

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NimbusError, Result};
use crate::models::{first_model, key_name};

/// Loss distribution for gradient boosting. `Auto` defers the choice to the
/// server based on the response column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Auto,
    Bernoulli,
    Multinomial,
    Gaussian,
    Poisson,
    Gamma,
}

impl Distribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Bernoulli => "bernoulli",
            Self::Multinomial => "multinomial",
            Self::Gaussian => "gaussian",
            Self::Poisson => "poisson",
            Self::Gamma => "gamma",
        }
    }
}

impl FromStr for Distribution {
    type Err = NimbusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "bernoulli" => Ok(Self::Bernoulli),
            "multinomial" => Ok(Self::Multinomial),
            "gaussian" => Ok(Self::Gaussian),
            "poisson" => Ok(Self::Poisson),
            "gamma" => Ok(Self::Gamma),
            _ => Err(NimbusError::InvalidArgument(format!(
                "unknown distribution {:?} (expected one of: auto, bernoulli, multinomial, gaussian, poisson, gamma)",
                s
            ))),
        }
    }
}

/// Generic model artifact for algorithms whose output the client does not
/// reshape. The output object is the server's, unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub destination_key: String,
    pub algo: String,
    pub output: Value,
}

impl ModelInfo {
    pub(crate) fn from_models_payload(payload: &Value) -> Result<Self> {
        let model = first_model(payload)?;
        let destination_key = model.get("model_id").and_then(key_name).ok_or_else(|| {
            NimbusError::MalformedResponse("model entry has no model_id".to_string())
        })?;
        let algo = model
            .get("algo")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                NimbusError::MalformedResponse("model entry has no algo tag".to_string())
            })?
            .to_string();
        let output = model.get("output").cloned().ok_or_else(|| {
            NimbusError::MalformedResponse("model entry has no output".to_string())
        })?;
        Ok(Self {
            destination_key,
            algo,
            output,
        })
    }
}
