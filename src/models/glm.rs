// Generalized linear model types: hyperparameter enums, constraint tables,
// and the materialized coefficients artifact.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NimbusError, Result};
use crate::models::{first_model, key_name, LocalTable};

/// Distribution family of the response column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Gaussian,
    Binomial,
    Poisson,
    Gamma,
    Tweedie,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gaussian => "gaussian",
            Self::Binomial => "binomial",
            Self::Poisson => "poisson",
            Self::Gamma => "gamma",
            Self::Tweedie => "tweedie",
        }
    }
}

impl FromStr for Family {
    type Err = NimbusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gaussian" => Ok(Self::Gaussian),
            "binomial" => Ok(Self::Binomial),
            "poisson" => Ok(Self::Poisson),
            "gamma" => Ok(Self::Gamma),
            "tweedie" => Ok(Self::Tweedie),
            _ => Err(NimbusError::InvalidArgument(format!(
                "unknown family {:?} (expected one of: gaussian, binomial, poisson, gamma, tweedie)",
                s
            ))),
        }
    }
}

/// Link function. `FamilyDefault` lets the server pick the canonical link
/// for the chosen family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    FamilyDefault,
    Identity,
    Logit,
    Log,
    Inverse,
    Tweedie,
}

impl Link {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FamilyDefault => "family_default",
            Self::Identity => "identity",
            Self::Logit => "logit",
            Self::Log => "log",
            Self::Inverse => "inverse",
            Self::Tweedie => "tweedie",
        }
    }
}

impl FromStr for Link {
    type Err = NimbusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "family_default" => Ok(Self::FamilyDefault),
            "identity" => Ok(Self::Identity),
            "logit" => Ok(Self::Logit),
            "log" => Ok(Self::Log),
            "inverse" => Ok(Self::Inverse),
            "tweedie" => Ok(Self::Tweedie),
            _ => Err(NimbusError::InvalidArgument(format!(
                "unknown link {:?} (expected one of: family_default, identity, logit, log, inverse, tweedie)",
                s
            ))),
        }
    }
}

/// Optimization solver used on the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Solver {
    Auto,
    Irlsm,
    LBfgs,
    CoordinateDescent,
}

impl Solver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Irlsm => "IRLSM",
            Self::LBfgs => "L_BFGS",
            Self::CoordinateDescent => "COORDINATE_DESCENT",
        }
    }
}

impl FromStr for Solver {
    type Err = NimbusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "irlsm" => Ok(Self::Irlsm),
            "l_bfgs" => Ok(Self::LBfgs),
            "coordinate_descent" => Ok(Self::CoordinateDescent),
            _ => Err(NimbusError::InvalidArgument(format!(
                "unknown solver {:?} (expected one of: auto, irlsm, l_bfgs, coordinate_descent)",
                s
            ))),
        }
    }
}

/// Prior constraints on the coefficients. Either a table already living on
/// the cluster, or one assembled locally and uploaded before submission.
#[derive(Debug, Clone, PartialEq)]
pub enum BetaConstraints {
    Key(String),
    Table(LocalTable),
}

/// One fitted coefficient. `standardized` is present when the server
/// reported a standardized column alongside the raw one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub value: f64,
    pub standardized: Option<f64>,
}

// Coefficients table row layout: [name, value, standardized value, ...].
const NAME_COLUMN: usize = 0;
const VALUE_COLUMN: usize = 1;
const STANDARDIZED_COLUMN: usize = 2;

/// Materialized linear model artifact: the destination key, the ordered
/// coefficients, and every other output field passed through unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlmModel {
    pub destination_key: String,
    pub coefficients: Vec<Coefficient>,
    pub output: Value,
}

impl GlmModel {
    /// Reshape a `{"models": [...]}` payload. Pure function of the payload:
    /// parsing the same payload twice yields equal models.
    pub(crate) fn from_models_payload(payload: &Value) -> Result<Self> {
        let model = first_model(payload)?;
        let destination_key = model.get("model_id").and_then(key_name).ok_or_else(|| {
            NimbusError::MalformedResponse("model entry has no model_id".to_string())
        })?;
        let output = model.get("output").cloned().ok_or_else(|| {
            NimbusError::MalformedResponse("model entry has no output".to_string())
        })?;
        let coefficients = parse_coefficients_table(&output)?;
        Ok(Self {
            destination_key,
            coefficients,
            output,
        })
    }

    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value)
    }

    pub fn coefficient_names(&self) -> Vec<&str> {
        self.coefficients.iter().map(|c| c.name.as_str()).collect()
    }
}

fn parse_coefficients_table(output: &Value) -> Result<Vec<Coefficient>> {
    let table = output.get("coefficients_table").ok_or_else(|| {
        NimbusError::MalformedResponse("model output has no coefficients table".to_string())
    })?;
    let data = table.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
        NimbusError::MalformedResponse("coefficients table has no data rows".to_string())
    })?;
    let mut coefficients = Vec::with_capacity(data.len());
    for row in data {
        let cells = row.as_array().ok_or_else(|| {
            NimbusError::MalformedResponse("coefficients table row is not an array".to_string())
        })?;
        let name = cells
            .get(NAME_COLUMN)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                NimbusError::MalformedResponse(
                    "coefficients table row has no name cell".to_string(),
                )
            })?;
        let value = cells
            .get(VALUE_COLUMN)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| {
                NimbusError::MalformedResponse(format!(
                    "coefficient {:?} has no numeric value",
                    name
                ))
            })?;
        coefficients.push(Coefficient {
            name: name.to_string(),
            value,
            standardized: cells.get(STANDARDIZED_COLUMN).and_then(|v| v.as_f64()),
        });
    }
    Ok(coefficients)
}
