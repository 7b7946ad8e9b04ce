// Generalized linear model builds: parameter assembly, submission, and
// result materialization.

use log::info;

use crate::cluster::Cluster;
use crate::error::{NimbusError, Result};
use crate::jobs::{ensure_done, PollConfig};
use crate::models::frame::resolve_columns;
use crate::models::{
    BetaConstraints, ColumnSelector, Family, Frame, GlmModel, JobHandle, Link, Solver,
};
use crate::params::{ParamSet, ParamValue};

const GLM_ENDPOINT: &str = "/3/ModelBuilders/glm";

/// Parameter builder for a linear model build.
///
/// Only parameters explicitly set here go on the wire; everything left unset
/// is omitted so the server applies its own defaults. Ranges that are known
/// client-side are checked before anything touches the network; domains the
/// server owns (tweedie powers, for one) are left to it.
pub struct GlmBuilder {
    frame: Frame,
    response: ColumnSelector,
    predictors: Option<Vec<ColumnSelector>>,
    validation_frame: Option<String>,
    family: Option<Family>,
    link: Option<Link>,
    solver: Option<Solver>,
    alpha: Option<Vec<f64>>,
    lambda: Option<Vec<f64>>,
    lambda_search: Option<bool>,
    nlambdas: Option<u32>,
    standardize: Option<bool>,
    use_all_factor_levels: Option<bool>,
    max_iterations: Option<u32>,
    beta_epsilon: Option<f64>,
    tweedie_variance_power: Option<f64>,
    tweedie_link_power: Option<f64>,
    nfolds: Option<u32>,
    seed: Option<i64>,
    beta_constraints: Option<BetaConstraints>,
}

impl GlmBuilder {
    pub fn new(frame: Frame, response: impl Into<ColumnSelector>) -> Self {
        Self {
            frame,
            response: response.into(),
            predictors: None,
            validation_frame: None,
            family: None,
            link: None,
            solver: None,
            alpha: None,
            lambda: None,
            lambda_search: None,
            nlambdas: None,
            standardize: None,
            use_all_factor_levels: None,
            max_iterations: None,
            beta_epsilon: None,
            tweedie_variance_power: None,
            tweedie_link_power: None,
            nfolds: None,
            seed: None,
            beta_constraints: None,
        }
    }

    /// Restrict the predictor set. Without this every column except the
    /// response is a predictor.
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

    pub fn family(mut self, family: Family) -> Self {
        self.family = Some(family);
        self
    }

    pub fn link(mut self, link: Link) -> Self {
        self.link = Some(link);
        self
    }

    pub fn solver(mut self, solver: Solver) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Elastic-net mixing values, each in [0, 1].
    pub fn alpha(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.alpha = Some(values.into_iter().collect());
        self
    }

    /// Regularization strengths, each nonnegative.
    pub fn lambda(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.lambda = Some(values.into_iter().collect());
        self
    }

    pub fn lambda_search(mut self, enabled: bool) -> Self {
        self.lambda_search = Some(enabled);
        self
    }

    pub fn nlambdas(mut self, count: u32) -> Self {
        self.nlambdas = Some(count);
        self
    }

    pub fn standardize(mut self, enabled: bool) -> Self {
        self.standardize = Some(enabled);
        self
    }

    pub fn use_all_factor_levels(mut self, enabled: bool) -> Self {
        self.use_all_factor_levels = Some(enabled);
        self
    }

    pub fn max_iterations(mut self, count: u32) -> Self {
        self.max_iterations = Some(count);
        self
    }

    pub fn beta_epsilon(mut self, epsilon: f64) -> Self {
        self.beta_epsilon = Some(epsilon);
        self
    }

    pub fn tweedie_variance_power(mut self, power: f64) -> Self {
        self.tweedie_variance_power = Some(power);
        self
    }

    pub fn tweedie_link_power(mut self, power: f64) -> Self {
        self.tweedie_link_power = Some(power);
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

    /// Coefficient bounds, either as a frame key already on the cluster or
    /// as a local table. A local table is uploaded before submission.
    pub fn beta_constraints(mut self, constraints: BetaConstraints) -> Self {
        self.beta_constraints = Some(constraints);
        self
    }

    /// Submit the build and return the job handle without waiting.
    pub fn submit(self, cluster: &Cluster) -> Result<JobHandle> {
        let frame_key = self.frame.key.clone();
        let params = self.into_params(cluster)?;
        info!("submitting glm build against frame {}", frame_key);
        let payload = cluster.post(GLM_ENDPOINT, params)?;
        JobHandle::from_submit_payload(&payload)
    }

    /// Submit, wait with default pacing, and materialize the fitted model.
    pub fn fit(self, cluster: &Cluster) -> Result<GlmModel> {
        self.fit_with(cluster, &PollConfig::default())
    }

    /// Submit, wait with the given pacing, and materialize the fitted model.
    /// FAILED and CANCELLED jobs surface as errors carrying the server's
    /// message.
    pub fn fit_with(self, cluster: &Cluster, poll: &PollConfig) -> Result<GlmModel> {
        let handle = self.submit(cluster)?;
        let view = cluster.wait_for_job(&handle, poll)?;
        ensure_done(view)?;
        cluster.glm_model(&handle.destination_key)
    }

    fn check_ranges(&self) -> Result<()> {
        if let Some(values) = &self.alpha {
            for value in values {
                if !(0.0..=1.0).contains(value) {
                    return Err(NimbusError::InvalidArgument(format!(
                        "alpha {} is outside [0, 1]",
                        value
                    )));
                }
            }
        }
        if let Some(values) = &self.lambda {
            for value in values {
                if *value < 0.0 || value.is_nan() {
                    return Err(NimbusError::InvalidArgument(format!(
                        "lambda {} is not a nonnegative number",
                        value
                    )));
                }
            }
        }
        if let Some(count) = self.nlambdas {
            if count == 0 {
                return Err(NimbusError::InvalidArgument(
                    "nlambdas must be at least 1".to_string(),
                ));
            }
        }
        if let Some(count) = self.max_iterations {
            if count == 0 {
                return Err(NimbusError::InvalidArgument(
                    "max_iterations must be at least 1".to_string(),
                ));
            }
        }
        if let Some(epsilon) = self.beta_epsilon {
            if epsilon <= 0.0 || epsilon.is_nan() {
                return Err(NimbusError::InvalidArgument(format!(
                    "beta_epsilon {} is not positive",
                    epsilon
                )));
            }
        }
        Ok(())
    }

    /// Resolve selectors, run the local checks, upload a constraints table
    /// when one was given, and render the outgoing parameter set.
    fn into_params(self, cluster: &Cluster) -> Result<ParamSet> {
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
        if let Some(family) = self.family {
            params.set("family", ParamValue::Str(family.as_str().to_string()));
        }
        if let Some(link) = self.link {
            params.set("link", ParamValue::Str(link.as_str().to_string()));
        }
        if let Some(solver) = self.solver {
            params.set("solver", ParamValue::Str(solver.as_str().to_string()));
        }
        if let Some(values) = self.alpha {
            params.set("alpha", ParamValue::floats(&values));
        }
        if let Some(values) = self.lambda {
            params.set("lambda", ParamValue::floats(&values));
        }
        if let Some(enabled) = self.lambda_search {
            params.set("lambda_search", ParamValue::Bool(enabled));
        }
        if let Some(count) = self.nlambdas {
            params.set("nlambdas", ParamValue::Int(count as i64));
        }
        if let Some(enabled) = self.standardize {
            params.set("standardize", ParamValue::Bool(enabled));
        }
        if let Some(enabled) = self.use_all_factor_levels {
            params.set("use_all_factor_levels", ParamValue::Bool(enabled));
        }
        if let Some(count) = self.max_iterations {
            params.set("max_iterations", ParamValue::Int(count as i64));
        }
        if let Some(epsilon) = self.beta_epsilon {
            params.set("beta_epsilon", ParamValue::Float(epsilon));
        }
        if let Some(power) = self.tweedie_variance_power {
            params.set("tweedie_variance_power", ParamValue::Float(power));
        }
        if let Some(power) = self.tweedie_link_power {
            params.set("tweedie_link_power", ParamValue::Float(power));
        }
        if let Some(folds) = self.nfolds {
            params.set("nfolds", ParamValue::Int(folds as i64));
        }
        if let Some(seed) = self.seed {
            params.set("seed", ParamValue::Int(seed));
        }
        if let Some(constraints) = self.beta_constraints {
            let key = match constraints {
                BetaConstraints::Key(key) => key,
                BetaConstraints::Table(table) => cluster.upload_table(&table, None)?,
            };
            params.set("beta_constraints", ParamValue::Key(key));
        }
        Ok(params)
    }
}

impl Cluster {
    /// Fetch a finished linear model by destination key and reshape its
    /// coefficients table into an ordered name-to-value structure.
    pub fn glm_model(&self, destination_key: &str) -> Result<GlmModel> {
        let payload = self.get(&format!("/3/Models/{}", destination_key), ParamSet::new())?;
        GlmModel::from_models_payload(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::models::{Cell, ColumnSpec, LocalTable};
    use crate::testing::{
        cluster_with, glm_models_payload, job_status_payload, submit_payload, upload_ack_payload,
        CallKind, MockTransport, ScriptedReply,
    };

    fn training_frame() -> Frame {
        Frame {
            key: "train.hex".to_string(),
            rows: 150,
            columns: vec![
                ColumnSpec {
                    label: "sepal_len".to_string(),
                    column_type: "real".to_string(),
                },
                ColumnSpec {
                    label: "sepal_wid".to_string(),
                    column_type: "real".to_string(),
                },
                ColumnSpec {
                    label: "petal_len".to_string(),
                    column_type: "real".to_string(),
                },
                ColumnSpec {
                    label: "species".to_string(),
                    column_type: "enum".to_string(),
                },
            ],
        }
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            timeout: None,
        }
    }

    #[test]
    fn test_alpha_bounds_checked_before_any_request() {
        for bad in [-0.01, 1.01] {
            let mock = Arc::new(MockTransport::new(vec![]));
            let cluster = cluster_with(&mock);
            let err = GlmBuilder::new(training_frame(), "species")
                .alpha([bad])
                .submit(&cluster)
                .unwrap_err();
            assert!(matches!(err, NimbusError::InvalidArgument(_)));
            assert!(mock.recorded_calls().is_empty());
        }
    }

    #[test]
    fn test_alpha_endpoints_accepted() {
        let mock = Arc::new(MockTransport::new(vec![ScriptedReply::json(
            submit_payload("job_1", "glm_1"),
        )]));
        let cluster = cluster_with(&mock);
        GlmBuilder::new(training_frame(), "species")
            .alpha([0.0, 1.0])
            .submit(&cluster)
            .unwrap();
        assert_eq!(mock.recorded_calls()[0].param("alpha"), Some("[0,1]"));
    }

    #[test]
    fn test_lambda_checked_before_any_request() {
        for bad in [-0.5, f64::NAN] {
            let mock = Arc::new(MockTransport::new(vec![]));
            let cluster = cluster_with(&mock);
            let err = GlmBuilder::new(training_frame(), "species")
                .lambda([bad])
                .submit(&cluster)
                .unwrap_err();
            assert!(matches!(err, NimbusError::InvalidArgument(_)));
            assert!(err.to_string().contains("is not a nonnegative number"));
            assert!(mock.recorded_calls().is_empty());
        }
    }

    #[test]
    fn test_bad_enum_string_never_reaches_the_wire() {
        let mock = Arc::new(MockTransport::new(vec![]));
        let _cluster = cluster_with(&mock);
        let err = "gossip".parse::<Family>().unwrap_err();
        assert!(err.is_local());
        assert!(mock.recorded_calls().is_empty());
    }

    #[test]
    fn test_unknown_column_rejected_before_any_request() {
        let mock = Arc::new(MockTransport::new(vec![]));
        let cluster = cluster_with(&mock);
        let err = GlmBuilder::new(training_frame(), "species")
            .predictors(["petal_wid"])
            .submit(&cluster)
            .unwrap_err();
        assert!(matches!(err, NimbusError::InvalidArgument(_)));
        assert!(err.to_string().contains("petal_wid"));
        assert!(mock.recorded_calls().is_empty());
    }

    #[test]
    fn test_unset_parameters_stay_off_the_wire() {
        let mock = Arc::new(MockTransport::new(vec![ScriptedReply::json(
            submit_payload("job_1", "glm_1"),
        )]));
        let cluster = cluster_with(&mock);
        GlmBuilder::new(training_frame(), "species")
            .family(Family::Binomial)
            .submit(&cluster)
            .unwrap();

        let calls = mock.recorded_calls();
        let call = &calls[0];
        assert_eq!(call.path, "/3/ModelBuilders/glm");
        assert_eq!(call.param("training_frame"), Some("train.hex"));
        assert_eq!(call.param("response_column"), Some("species"));
        assert_eq!(call.param("family"), Some("binomial"));
        assert_eq!(call.param("alpha"), None);
        assert_eq!(call.param("solver"), None);
        assert_eq!(call.param("lambda_search"), None);
    }

    #[test]
    fn test_predictor_selection_renders_ignored_columns() {
        let mock = Arc::new(MockTransport::new(vec![ScriptedReply::json(
            submit_payload("job_1", "glm_1"),
        )]));
        let cluster = cluster_with(&mock);
        GlmBuilder::new(training_frame(), 3usize)
            .predictors(["sepal_len", "petal_len"])
            .lambda_search(true)
            .submit(&cluster)
            .unwrap();

        let calls = mock.recorded_calls();
        assert_eq!(calls[0].param("response_column"), Some("species"));
        assert_eq!(calls[0].param("ignored_columns"), Some("[sepal_wid]"));
        assert_eq!(calls[0].param("lambda_search"), Some("true"));
    }

    #[test]
    fn test_fit_polls_then_materializes() {
        let mock = Arc::new(MockTransport::new(vec![
            ScriptedReply::json(submit_payload("job_1", "glm_1")),
            ScriptedReply::json(job_status_payload("job_1", "glm_1", "RUNNING", 0.2)),
            ScriptedReply::json(job_status_payload("job_1", "glm_1", "RUNNING", 0.8)),
            ScriptedReply::json(job_status_payload("job_1", "glm_1", "DONE", 1.0)),
            ScriptedReply::json(glm_models_payload(
                "glm_1",
                &[("Intercept", 1.25, 1.25), ("sepal_len", -0.4, -0.8)],
            )),
        ]));
        let cluster = cluster_with(&mock);
        let model = GlmBuilder::new(training_frame(), "species")
            .family(Family::Binomial)
            .fit_with(&cluster, &fast_poll())
            .unwrap();

        assert_eq!(model.destination_key, "glm_1");
        assert_eq!(model.coefficient("sepal_len"), Some(-0.4));

        let calls = mock.recorded_calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0].path, "/3/ModelBuilders/glm");
        assert_eq!(calls[1].path, "/3/Jobs/job_1");
        assert_eq!(calls[3].path, "/3/Jobs/job_1");
        assert_eq!(calls[4].path, "/3/Models/glm_1");
    }

    #[test]
    fn test_failed_fit_carries_server_message_verbatim() {
        let mock = Arc::new(MockTransport::new(vec![
            ScriptedReply::json(submit_payload("job_1", "glm_1")),
            ScriptedReply::json(crate::testing::failed_job_payload(
                "job_1",
                "glm_1",
                "Gram matrix is not positive definite",
            )),
        ]));
        let cluster = cluster_with(&mock);
        let err = GlmBuilder::new(training_frame(), "species")
            .fit_with(&cluster, &fast_poll())
            .unwrap_err();
        match err {
            NimbusError::JobFailed { job_id, message } => {
                assert_eq!(job_id, "job_1");
                assert_eq!(message, "Gram matrix is not positive definite");
            }
            other => panic!("expected JobFailed, got {:?}", other),
        }
        // Failure short-circuits: no model fetch after the FAILED poll.
        assert_eq!(mock.recorded_calls().len(), 2);
    }

    #[test]
    fn test_cancelled_fit_carries_server_message_verbatim() {
        let mock = Arc::new(MockTransport::new(vec![
            ScriptedReply::json(submit_payload("job_1", "glm_1")),
            ScriptedReply::json(crate::testing::cancelled_job_payload(
                "job_1",
                "glm_1",
                "Killed by admin",
            )),
        ]));
        let cluster = cluster_with(&mock);
        let err = GlmBuilder::new(training_frame(), "species")
            .fit_with(&cluster, &fast_poll())
            .unwrap_err();
        match err {
            NimbusError::JobCancelled { job_id, message } => {
                assert_eq!(job_id, "job_1");
                assert_eq!(message, "Killed by admin");
            }
            other => panic!("expected JobCancelled, got {:?}", other),
        }
        // Cancellation short-circuits: no model fetch after the CANCELLED poll.
        assert_eq!(mock.recorded_calls().len(), 2);
    }

    #[test]
    fn test_constraints_table_uploads_before_submission() {
        let mock = Arc::new(MockTransport::new(vec![
            ScriptedReply::json(upload_ack_payload("constraints_1.hex")),
            ScriptedReply::json(submit_payload("job_1", "glm_1")),
        ]));
        let cluster = cluster_with(&mock);
        let mut table = LocalTable::new(["names", "lower_bounds", "upper_bounds"]);
        table
            .push_row(vec![
                Cell::from("sepal_len"),
                Cell::from(-0.5),
                Cell::from(0.5),
            ])
            .unwrap();
        GlmBuilder::new(training_frame(), "species")
            .beta_constraints(BetaConstraints::Table(table))
            .submit(&cluster)
            .unwrap();

        let calls = mock.recorded_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].kind, CallKind::Upload);
        assert_eq!(calls[0].path, "/3/PostFile");
        assert_eq!(
            calls[1].param("beta_constraints"),
            Some("constraints_1.hex")
        );
    }

    #[test]
    fn test_constraints_key_passes_straight_through() {
        let mock = Arc::new(MockTransport::new(vec![ScriptedReply::json(
            submit_payload("job_1", "glm_1"),
        )]));
        let cluster = cluster_with(&mock);
        GlmBuilder::new(training_frame(), "species")
            .beta_constraints(BetaConstraints::Key("bounds.hex".to_string()))
            .submit(&cluster)
            .unwrap();

        let calls = mock.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].param("beta_constraints"), Some("bounds.hex"));
    }

    #[test]
    fn test_materializer_is_idempotent_across_fetches() {
        let payload = glm_models_payload("glm_1", &[("Intercept", 0.5, 0.5)]);
        let mock = Arc::new(MockTransport::new(vec![
            ScriptedReply::json(payload.clone()),
            ScriptedReply::json(payload),
        ]));
        let cluster = cluster_with(&mock);
        let first = cluster.glm_model("glm_1").unwrap();
        let second = cluster.glm_model("glm_1").unwrap();
        assert_eq!(first, second);
    }
}
