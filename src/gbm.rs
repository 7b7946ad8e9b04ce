// Gradient boosting builds

use log::info;

use crate::cluster::Cluster;
use crate::error::{NimbusError, Result};
use crate::jobs::{ensure_done, PollConfig};
use crate::models::frame::resolve_columns;
use crate::models::{ColumnSelector, Distribution, Frame, JobHandle, ModelInfo};
use crate::params::{ParamSet, ParamValue};

const GBM_ENDPOINT: &str = "/3/ModelBuilders/gbm";

/// Parameter builder for a gradient boosting build. Same omission rule as
/// the linear builder: unset parameters never reach the wire.
pub struct GbmBuilder {
    frame: Frame,
    response: ColumnSelector,
    predictors: Option<Vec<ColumnSelector>>,
    validation_frame: Option<String>,
    distribution: Option<Distribution>,
    ntrees: Option<u32>,
    max_depth: Option<u32>,
    min_rows: Option<f64>,
    learn_rate: Option<f64>,
    sample_rate: Option<f64>,
    col_sample_rate: Option<f64>,
    nfolds: Option<u32>,
    seed: Option<i64>,
}

impl GbmBuilder {
    pub fn new(frame: Frame, response: impl Into<ColumnSelector>) -> Self {
        Self {
            frame,
            response: response.into(),
            predictors: None,
            validation_frame: None,
            distribution: None,
            ntrees: None,
            max_depth: None,
            min_rows: None,
            learn_rate: None,
            sample_rate: None,
            col_sample_rate: None,
            nfolds: None,
            seed: None,
        }
    }

    pub fn predictors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ColumnSelector>,
    {
        self.predictors = Some(selectors.into_iter().map(Into::into).collect());
        self
    }

    pub fn validation_frame(mut self, key: impl Into<String>) -> Self {
        self.validation_frame = Some(key.into());
        self
    }

    pub fn distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = Some(distribution);
        self
    }

    pub fn ntrees(mut self, count: u32) -> Self {
        self.ntrees = Some(count);
        self
    }

    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn min_rows(mut self, rows: f64) -> Self {
        self.min_rows = Some(rows);
        self
    }

    pub fn learn_rate(mut self, rate: f64) -> Self {
        self.learn_rate = Some(rate);
        self
    }

    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn col_sample_rate(mut self, rate: f64) -> Self {
        self.col_sample_rate = Some(rate);
        self
    }

    pub fn nfolds(mut self, folds: u32) -> Self {
        self.nfolds = Some(folds);
        self
    }

    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Submit the build and return the job handle without waiting.
    pub fn submit(self, cluster: &Cluster) -> Result<JobHandle> {
        let frame_key = self.frame.key.clone();
        let params = self.into_params()?;
        info!("submitting gbm build against frame {}", frame_key);
        let payload = cluster.post(GBM_ENDPOINT, params)?;
        JobHandle::from_submit_payload(&payload)
    }

    pub fn fit(self, cluster: &Cluster) -> Result<ModelInfo> {
        self.fit_with(cluster, &PollConfig::default())
    }

    pub fn fit_with(self, cluster: &Cluster, poll: &PollConfig) -> Result<ModelInfo> {
        let handle = self.submit(cluster)?;
        let view = cluster.wait_for_job(&handle, poll)?;
        ensure_done(view)?;
        cluster.model(&handle.destination_key)
    }

    fn check_ranges(&self) -> Result<()> {
        // Cross-validation and a held-out validation frame are mutually
        // exclusive on the server; reject the combination locally.
        if let (Some(folds), Some(_)) = (self.nfolds, &self.validation_frame) {
            if folds >= 2 {
                return Err(NimbusError::InvalidArgument(format!(
                    "cross-validation with nfolds {} cannot be combined with a validation frame",
                    folds
                )));
            }
        }
        if let Some(count) = self.ntrees {
            if count == 0 {
                return Err(NimbusError::InvalidArgument(
                    "ntrees must be at least 1".to_string(),
                ));
            }
        }
        if let Some(depth) = self.max_depth {
            if depth == 0 {
                return Err(NimbusError::InvalidArgument(
                    "max_depth must be at least 1".to_string(),
                ));
            }
        }
        if let Some(rows) = self.min_rows {
            if rows <= 0.0 || rows.is_nan() {
                return Err(NimbusError::InvalidArgument(format!(
                    "min_rows {} is not positive",
                    rows
                )));
            }
        }
        let rates = [
            ("learn_rate", self.learn_rate),
            ("sample_rate", self.sample_rate),
            ("col_sample_rate", self.col_sample_rate),
        ];
        for (name, rate) in rates {
            if let Some(rate) = rate {
                if rate <= 0.0 || rate > 1.0 || rate.is_nan() {
                    return Err(NimbusError::InvalidArgument(format!(
                        "{} {} is outside (0, 1]",
                        name, rate
                    )));
                }
            }
        }
        Ok(())
    }

    fn into_params(self) -> Result<ParamSet> {
        let (response, ignored) =
            resolve_columns(&self.frame, &self.response, self.predictors.as_deref())?;
        self.check_ranges()?;

        let mut params = ParamSet::new();
        params.set("training_frame", ParamValue::Key(self.frame.key.clone()));
        params.set("response_column", ParamValue::Str(response));
        if !ignored.is_empty() {
            params.set("ignored_columns", ParamValue::strings(ignored));
        }
        if let Some(key) = self.validation_frame {
            params.set("validation_frame", ParamValue::Key(key));
        }
        if let Some(distribution) = self.distribution {
            params.set(
                "distribution",
                ParamValue::Str(distribution.as_str().to_string()),
            );
        }
        if let Some(count) = self.ntrees {
            params.set("ntrees", ParamValue::Int(count as i64));
        }
        if let Some(depth) = self.max_depth {
            params.set("max_depth", ParamValue::Int(depth as i64));
        }
        if let Some(rows) = self.min_rows {
            params.set("min_rows", ParamValue::Float(rows));
        }
        if let Some(rate) = self.learn_rate {
            params.set("learn_rate", ParamValue::Float(rate));
        }
        if let Some(rate) = self.sample_rate {
            params.set("sample_rate", ParamValue::Float(rate));
        }
        if let Some(rate) = self.col_sample_rate {
            params.set("col_sample_rate", ParamValue::Float(rate));
        }
        if let Some(folds) = self.nfolds {
            params.set("nfolds", ParamValue::Int(folds as i64));
        }
        if let Some(seed) = self.seed {
            params.set("seed", ParamValue::Int(seed));
        }
        Ok(params)
    }
}

impl Cluster {
    /// Fetch any model artifact by destination key. No reshaping happens;
    /// the output object is the server's own.
    pub fn model(&self, destination_key: &str) -> Result<ModelInfo> {
        let payload = self.get(&format!("/3/Models/{}", destination_key), ParamSet::new())?;
        ModelInfo::from_models_payload(&payload)
    }
}
