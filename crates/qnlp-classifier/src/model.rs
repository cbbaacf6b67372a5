//! The variational classifier and its training loop.
//!
//! ```text
//!   fit(x, y)
//!     │
//!     ├─ init params ~ U[-π, π)
//!     │
//!     └─ per iteration:  c0 = cost(params)
//!                        new = optimizer.step(cost, params)
//!                        c1 = cost(new)
//!                        commit new; stop when |c1 - c0| < threshold
//! ```
//!
//! Parameters are committed only after a whole iteration, so a failed or
//! cancelled fit leaves the last committed vector readable through
//! [`VariationalClassifier::committed_parameters`].

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use qnlp_hal::{BackendKind, CancelToken, Dispatcher, HalError, TokenProvider, ValidationResult};
use qnlp_ir::Circuit;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{Span, debug, info, info_span, instrument, warn};

use crate::ansatz::{Ansatz, AnsatzType};
use crate::builder::CircuitBuilder;
use crate::config::ClassifierConfig;
use crate::encoding::{Encoder, EncodingType, HybridTail};
use crate::error::{QnlpError, QnlpResult};
use crate::executor;
use crate::loss::{Loss, MeanSquaredError};
use crate::metrics::{CircuitMetrics, MetricsCollector};
use crate::optimizers::{Optimizer, OptimizerConfig};

/// Expectation of qubit 0 at or above which a row is labelled 1.
///
/// Training targets are Z expectations: `+1` for class 1 and `-1` for
/// class 0. The threshold sits at their midpoint.
pub const LABEL_THRESHOLD: f64 = 0.0;

/// Lifecycle of a classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    Uninitialized,
    Fitting,
    Fitted,
    FitFailed,
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingState::Uninitialized => "uninitialized",
            TrainingState::Fitting => "fitting",
            TrainingState::Fitted => "fitted",
            TrainingState::FitFailed => "fit_failed",
        };
        f.write_str(name)
    }
}

/// Variational quantum circuit classifier.
pub struct VariationalClassifier {
    config: ClassifierConfig,
    builder: CircuitBuilder,
    dispatcher: Dispatcher,
    optimizer: Box<dyn Optimizer>,
    loss: Box<dyn Loss>,
    tokens: Arc<dyn TokenProvider>,
    state: TrainingState,
    parameters: Vec<f64>,
    optimal_parameters: Option<Vec<f64>>,
    loss_history: Vec<f64>,
    metrics_history: Vec<CircuitMetrics>,
    span: Span,
}

struct Components {
    builder: CircuitBuilder,
    dispatcher: Dispatcher,
    optimizer: Box<dyn Optimizer>,
}

fn components(config: &ClassifierConfig, tokens: Arc<dyn TokenProvider>) -> QnlpResult<Components> {
    config.check().map_err(QnlpError::Validation)?;

    let encoder = Encoder::new(config.encoding)
        .with_angle_rz(config.angle_rz)
        .with_hybrid_tail(config.hybrid_tail);
    let ansatz = Ansatz::new(config.ansatz, config.n_qubits, config.n_layers)?
        .with_entangling_parameters(config.entangling_parameters);

    Ok(Components {
        builder: CircuitBuilder::new(encoder, ansatz),
        dispatcher: executor::connect(config, tokens)?,
        optimizer: config.optimizer.build(config.learning_rate),
    })
}

impl VariationalClassifier {
    /// Create a classifier. Remote executors read their token from
    /// `QNLP_BACKEND_TOKEN`.
    pub fn new(config: ClassifierConfig) -> QnlpResult<Self> {
        Self::with_token_provider(config, executor::default_token_provider())
    }

    /// Create a classifier whose remote executor authenticates with `tokens`.
    pub fn with_token_provider(
        config: ClassifierConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> QnlpResult<Self> {
        let Components {
            builder,
            dispatcher,
            optimizer,
        } = components(&config, Arc::clone(&tokens))?;

        let span = info_span!(
            "variational_classifier",
            ansatz = %config.ansatz,
            encoding = %config.encoding,
            n_qubits = config.n_qubits
        );
        Ok(Self {
            config,
            builder,
            dispatcher,
            optimizer,
            loss: Box::new(MeanSquaredError),
            tokens,
            state: TrainingState::Uninitialized,
            parameters: Vec::new(),
            optimal_parameters: None,
            loss_history: Vec::new(),
            metrics_history: Vec::new(),
            span,
        })
    }

    /// Record fit and predict events inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Train against `loss` instead of mean squared error.
    #[must_use]
    pub fn with_loss<L: Loss + 'static>(mut self, loss: L) -> Self {
        self.loss = Box::new(loss);
        self
    }

    // =========================================================================
    // Training
    // =========================================================================

    /// Fit on the full data set.
    ///
    /// Uses `StdRng::seed_from_u64(seed)` when a seed is configured and
    /// entropy otherwise.
    pub fn fit<X, Y>(&mut self, x: &[X], y: &[Y]) -> QnlpResult<()>
    where
        X: AsRef<[f64]>,
        Y: AsRef<[f64]>,
    {
        let mut rng = self.rng();
        self.fit_with_rng(x, y, &mut rng)
    }

    /// Fit on the full data set, drawing all randomness from `rng`.
    #[instrument(
        parent = &self.span,
        skip_all,
        fields(rows = x.len(), optimizer = self.optimizer.name())
    )]
    pub fn fit_with_rng<X, Y>(&mut self, x: &[X], y: &[Y], rng: &mut dyn RngCore) -> QnlpResult<()>
    where
        X: AsRef<[f64]>,
        Y: AsRef<[f64]>,
    {
        check_training_data(x, y)?;
        self.begin_fit(rng);
        let result = self.train_full_batch(x, y, rng);
        self.finish_fit(x, result)
    }

    /// Fit one optimizer step per contiguous mini-batch, for up to
    /// `epochs` passes over the data.
    pub fn fit_minibatch<X, Y>(
        &mut self,
        x: &[X],
        y: &[Y],
        batch_size: usize,
        epochs: usize,
    ) -> QnlpResult<()>
    where
        X: AsRef<[f64]>,
        Y: AsRef<[f64]>,
    {
        let mut rng = self.rng();
        self.fit_minibatch_with_rng(x, y, batch_size, epochs, &mut rng)
    }

    /// Mini-batch fit drawing all randomness from `rng`.
    #[instrument(
        parent = &self.span,
        skip_all,
        fields(
            rows = x.len(),
            batch_size = batch_size,
            epochs = epochs,
            optimizer = self.optimizer.name()
        )
    )]
    pub fn fit_minibatch_with_rng<X, Y>(
        &mut self,
        x: &[X],
        y: &[Y],
        batch_size: usize,
        epochs: usize,
        rng: &mut dyn RngCore,
    ) -> QnlpResult<()>
    where
        X: AsRef<[f64]>,
        Y: AsRef<[f64]>,
    {
        check_training_data(x, y)?;
        if batch_size == 0 {
            return Err(QnlpError::Validation(
                "batch_size must be greater than 0".into(),
            ));
        }
        if epochs == 0 {
            return Err(QnlpError::Validation(
                "epochs must be greater than 0".into(),
            ));
        }
        self.begin_fit(rng);
        let result = self.train_minibatch(x, y, batch_size, epochs, rng);
        self.finish_fit(x, result)
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn begin_fit(&mut self, rng: &mut dyn RngCore) {
        self.dispatcher.cancel_token().reset();
        self.optimizer.reset();

        let count = self.builder.ansatz().parameter_count();
        self.parameters = (0..count).map(|_| rng.gen_range(-PI..PI)).collect();
        self.optimal_parameters = None;
        self.loss_history.clear();
        self.state = TrainingState::Fitting;
        debug!(parameters = count, "parameters initialized");
    }

    fn train_full_batch<X, Y>(&mut self, x: &[X], y: &[Y], rng: &mut dyn RngCore) -> QnlpResult<()>
    where
        X: AsRef<[f64]>,
        Y: AsRef<[f64]>,
    {
        let evaluator = Evaluator::new(&self.builder, &self.dispatcher, &self.config);
        let loss = self.loss.as_ref();
        let cancel = self.dispatcher.cancel_token();
        let threshold = self.config.convergence_threshold;
        let start = Instant::now();

        for iteration in 0..self.config.max_iterations {
            check_cancelled(&cancel)?;

            let c0 = evaluator.cost(&self.parameters, x, y, loss)?;
            let mut objective = |p: &[f64]| evaluator.cost(p, x, y, loss);
            let candidate = self.optimizer.step(&mut objective, &self.parameters, rng)?;
            check_candidate(&candidate, self.parameters.len())?;
            let c1 = evaluator.cost(&candidate, x, y, loss)?;

            self.parameters = candidate;
            self.loss_history.push(c1);

            let delta = (c1 - c0).abs();
            debug!(iteration, cost = c1, delta, elapsed = ?start.elapsed(), "iteration complete");
            if delta < threshold {
                info!(iteration, cost = c1, delta, "converged");
                return Ok(());
            }
        }

        info!(
            iterations = self.config.max_iterations,
            elapsed = ?start.elapsed(),
            "iteration budget exhausted"
        );
        Ok(())
    }

    fn train_minibatch<X, Y>(
        &mut self,
        x: &[X],
        y: &[Y],
        batch_size: usize,
        epochs: usize,
        rng: &mut dyn RngCore,
    ) -> QnlpResult<()>
    where
        X: AsRef<[f64]>,
        Y: AsRef<[f64]>,
    {
        let evaluator = Evaluator::new(&self.builder, &self.dispatcher, &self.config);
        let loss = self.loss.as_ref();
        let cancel = self.dispatcher.cancel_token();
        let threshold = self.config.convergence_threshold;
        let start = Instant::now();
        let mut previous: Option<f64> = None;

        for epoch in 0..epochs {
            let mut batch_costs = Vec::with_capacity(x.len().div_ceil(batch_size));
            for (xb, yb) in x.chunks(batch_size).zip(y.chunks(batch_size)) {
                check_cancelled(&cancel)?;

                self.optimizer.objective_changed();
                let mut objective = |p: &[f64]| evaluator.cost(p, xb, yb, loss);
                let candidate = self.optimizer.step(&mut objective, &self.parameters, rng)?;
                check_candidate(&candidate, self.parameters.len())?;
                batch_costs.push(evaluator.cost(&candidate, xb, yb, loss)?);
                self.parameters = candidate;
            }

            let epoch_loss = batch_costs.iter().sum::<f64>() / batch_costs.len() as f64;
            self.loss_history.push(epoch_loss);
            debug!(
                epoch,
                cost = epoch_loss,
                batches = batch_costs.len(),
                elapsed = ?start.elapsed(),
                "epoch complete"
            );

            if let Some(prev) = previous {
                let delta = (epoch_loss - prev).abs();
                if delta < threshold {
                    info!(epoch, cost = epoch_loss, delta, "converged");
                    return Ok(());
                }
            }
            previous = Some(epoch_loss);
        }

        info!(epochs, elapsed = ?start.elapsed(), "epoch budget exhausted");
        Ok(())
    }

    fn finish_fit<X: AsRef<[f64]>>(&mut self, x: &[X], result: QnlpResult<()>) -> QnlpResult<()> {
        match result.and_then(|()| self.snapshot(&self.parameters, x)) {
            Ok(metrics) => {
                self.metrics_history.push(metrics);
                self.optimal_parameters = Some(self.parameters.clone());
                self.state = TrainingState::Fitted;
                info!(
                    iterations = self.loss_history.len(),
                    final_cost = self.loss_history.last().copied(),
                    "fit complete"
                );
                Ok(())
            }
            Err(err) => {
                self.state = TrainingState::FitFailed;
                warn!(error = %err, iterations = self.loss_history.len(), "fit failed");
                let message = if err.is_cancelled() {
                    format!("fit cancelled after {} iterations", self.loss_history.len())
                } else {
                    format!("fit failed after {} iterations", self.loss_history.len())
                };
                Err(QnlpError::optimization(message, err))
            }
        }
    }

    // =========================================================================
    // Inference
    // =========================================================================

    /// Per-qubit Z expectations for every row.
    #[instrument(parent = &self.span, skip_all, fields(rows = x.len()))]
    pub fn predict<X: AsRef<[f64]>>(&self, x: &[X]) -> QnlpResult<Vec<Vec<f64>>> {
        let params = self.fitted_parameters("predict")?;
        self.evaluator().expectations(params, x)
    }

    /// Binary labels from qubit 0's expectation.
    pub fn predict_labels<X: AsRef<[f64]>>(&self, x: &[X]) -> QnlpResult<Vec<f64>> {
        Ok(self
            .predict(x)?
            .iter()
            .map(|row| row.first().map_or(0.0, |&z| label_for(z)))
            .collect())
    }

    /// Fraction of rows whose predicted label matches the label in `y`.
    ///
    /// Labels may be given as 0/1 or as ±1 targets; any positive value is class 1.
    pub fn score<X: AsRef<[f64]>>(&self, x: &[X], y: &[f64]) -> QnlpResult<f64> {
        if x.len() != y.len() {
            return Err(QnlpError::Validation(format!(
                "{} rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(QnlpError::Validation("cannot score an empty data set".into()));
        }
        let labels = self.predict_labels(x)?;
        let correct = labels
            .iter()
            .zip(y)
            .filter(|&(&predicted, &actual)| {
                let actual = if actual > 0.0 { 1.0 } else { 0.0 };
                predicted == actual
            })
            .count();
        Ok(correct as f64 / y.len() as f64)
    }

    /// Mean loss of `params` over the data set.
    pub fn cost<X, Y>(&self, params: &[f64], x: &[X], y: &[Y]) -> QnlpResult<f64>
    where
        X: AsRef<[f64]>,
        Y: AsRef<[f64]>,
    {
        self.cost_with_loss(params, x, y, self.loss.as_ref())
    }

    /// Mean `loss` of `params` over the data set.
    pub fn cost_with_loss<X, Y>(&self, params: &[f64], x: &[X], y: &[Y], loss: &dyn Loss) -> QnlpResult<f64>
    where
        X: AsRef<[f64]>,
        Y: AsRef<[f64]>,
    {
        check_training_data(x, y)?;
        self.evaluator().cost(params, x, y, loss)
    }

    /// Metrics for the circuit of the first row, bound to the fitted parameters.
    pub fn get_metrics<X: AsRef<[f64]>>(&self, x: &[X]) -> QnlpResult<CircuitMetrics> {
        let params = self.fitted_parameters("get_metrics")?;
        self.snapshot(params, x)
    }

    fn snapshot<X: AsRef<[f64]>>(&self, params: &[f64], x: &[X]) -> QnlpResult<CircuitMetrics> {
        let row = x
            .first()
            .ok_or_else(|| QnlpError::Validation("metrics need at least one row".into()))?;
        let circuit = self.builder.build(row.as_ref(), params)?;
        self.evaluator().admit(&circuit)?;
        let result = self
            .dispatcher
            .run(&circuit, self.config.backend.shots)
            .map_err(|e| QnlpError::execution("metrics execution failed", e))?;
        let ideal = self
            .dispatcher
            .statevector(&circuit)
            .map_err(|e| QnlpError::execution("statevector retrieval failed", e))?;
        let noise = self.dispatcher.executor().capabilities().noise_profile.as_ref();
        let cost = self.loss_history.last().copied().unwrap_or(0.0);

        MetricsCollector::collect(&circuit, &result, ideal.as_deref(), noise, cost)
    }

    fn fitted_parameters(&self, operation: &str) -> QnlpResult<&[f64]> {
        match (self.state, &self.optimal_parameters) {
            (TrainingState::Fitted, Some(params)) => Ok(params),
            (state, _) => Err(QnlpError::NotFitted(format!(
                "call fit before {operation} (state: {state})"
            ))),
        }
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.builder, &self.dispatcher, &self.config)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn is_fitted(&self) -> bool {
        self.state == TrainingState::Fitted
    }

    /// Length of the trainable parameter vector.
    pub fn parameter_count(&self) -> usize {
        self.builder.ansatz().parameter_count()
    }

    /// Parameters of the last successful fit.
    pub fn optimal_parameters(&self) -> Option<&[f64]> {
        self.optimal_parameters.as_deref()
    }

    /// Parameters after the last completed iteration, including during a
    /// failed or cancelled fit.
    pub fn committed_parameters(&self) -> &[f64] {
        &self.parameters
    }

    /// Cost after every iteration (or every epoch for mini-batch fits).
    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    pub fn metrics_history(&self) -> &[CircuitMetrics] {
        &self.metrics_history
    }

    /// Handle that stops a running fit from another thread.
    ///
    /// Rebuilding the executor through [`Self::set_params`] invalidates
    /// previously returned handles.
    pub fn cancel_handle(&self) -> CancelToken {
        self.dispatcher.cancel_token()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // =========================================================================
    // Model selection
    // =========================================================================

    /// Hyperparameters as a flat map.
    pub fn get_params(&self) -> BTreeMap<String, Value> {
        let c = &self.config;
        let entries = [
            ("n_qubits", json!(c.n_qubits)),
            ("n_layers", json!(c.n_layers)),
            ("ansatz_type", json!(c.ansatz.as_str())),
            ("encoding_type", json!(c.encoding.as_str())),
            (
                "optimizer",
                serde_json::to_value(&c.optimizer).unwrap_or(Value::Null),
            ),
            ("learning_rate", json!(c.learning_rate)),
            ("max_iterations", json!(c.max_iterations)),
            ("convergence_threshold", json!(c.convergence_threshold)),
            ("backend", json!(c.backend.kind.as_str())),
            ("shots", json!(c.backend.shots)),
            ("seed", json!(c.seed)),
            ("concurrency", json!(c.backend.max_concurrency)),
            ("angle_rz", json!(c.angle_rz)),
            ("hybrid_tail", json!(c.hybrid_tail.as_str())),
            ("entangling_parameters", json!(c.entangling_parameters)),
        ];
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Update hyperparameters and rebuild the classifier.
    ///
    /// On any error the classifier is left untouched. On success the
    /// training state is reset to [`TrainingState::Uninitialized`].
    pub fn set_params(&mut self, params: &BTreeMap<String, Value>) -> QnlpResult<()> {
        let mut config = self.config.clone();
        for (key, value) in params {
            apply_param(&mut config, key, value)?;
        }

        let Components {
            builder,
            dispatcher,
            optimizer,
        } = components(&config, Arc::clone(&self.tokens))?;

        debug!(keys = params.len(), "hyperparameters updated");
        self.config = config;
        self.builder = builder;
        self.dispatcher = dispatcher;
        self.optimizer = optimizer;
        self.state = TrainingState::Uninitialized;
        self.parameters.clear();
        self.optimal_parameters = None;
        self.loss_history.clear();
        self.metrics_history.clear();
        Ok(())
    }
}

impl fmt::Debug for VariationalClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariationalClassifier")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("optimizer", &self.optimizer.name())
            .field("loss", &self.loss.name())
            .field("state", &self.state)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

/// Evaluates circuits for a fixed builder and dispatcher.
struct Evaluator<'a> {
    builder: &'a CircuitBuilder,
    dispatcher: &'a Dispatcher,
    shots: Option<u32>,
    concurrent: bool,
}

impl<'a> Evaluator<'a> {
    fn new(builder: &'a CircuitBuilder, dispatcher: &'a Dispatcher, config: &ClassifierConfig) -> Self {
        Self {
            builder,
            dispatcher,
            shots: config.backend.shots,
            concurrent: config.backend.max_concurrency > 1,
        }
    }

    fn expectations<X: AsRef<[f64]>>(&self, params: &[f64], x: &[X]) -> QnlpResult<Vec<Vec<f64>>> {
        let n = self.builder.n_qubits() as usize;

        if self.concurrent && x.len() > 1 {
            let circuits = self.builder.build_batch(x, params)?;
            circuits.iter().try_for_each(|c| self.admit(c))?;
            let results = self
                .dispatcher
                .run_batch(circuits, self.shots)
                .map_err(|e| QnlpError::execution("batch execution failed", e))?;
            return Ok(results.iter().map(|r| r.expectation_values(n)).collect());
        }

        x.iter()
            .enumerate()
            .map(|(i, row)| {
                let circuit = self
                    .builder
                    .build(row.as_ref(), params)
                    .map_err(|e| e.with_context(&format!("row {i}")))?;
                self.admit(&circuit)
                    .map_err(|e| e.with_context(&format!("row {i}")))?;
                let result = self
                    .dispatcher
                    .run(&circuit, self.shots)
                    .map_err(|e| QnlpError::execution(format!("row {i} execution failed"), e))?;
                Ok(result.expectation_values(n))
            })
            .collect()
    }

    /// Reject circuits the executor cannot run before dispatching them.
    fn admit(&self, circuit: &Circuit) -> QnlpResult<()> {
        self.dispatcher
            .validate(circuit)
            .and_then(ValidationResult::into_result)
            .map_err(|e| QnlpError::execution("circuit rejected by executor", e))
    }

    fn cost<X, Y>(&self, params: &[f64], x: &[X], y: &[Y], loss: &dyn Loss) -> QnlpResult<f64>
    where
        X: AsRef<[f64]>,
        Y: AsRef<[f64]>,
    {
        let predictions = self.expectations(params, x)?;
        let mut total = 0.0;
        for (predicted, target) in predictions.iter().zip(y) {
            total += loss.loss(predicted, target.as_ref())?;
        }
        Ok(total / x.len() as f64)
    }
}

fn label_for(z: f64) -> f64 {
    if z >= LABEL_THRESHOLD { 1.0 } else { 0.0 }
}

fn check_training_data<X, Y>(x: &[X], y: &[Y]) -> QnlpResult<()> {
    if x.len() != y.len() {
        return Err(QnlpError::Validation(format!(
            "{} feature rows but {} target rows",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(QnlpError::Validation("training data is empty".into()));
    }
    Ok(())
}

fn check_cancelled(cancel: &CancelToken) -> QnlpResult<()> {
    cancel
        .check()
        .map_err(|e| QnlpError::execution("training interrupted", e))
}

fn check_candidate(candidate: &[f64], expected: usize) -> QnlpResult<()> {
    if candidate.len() != expected {
        return Err(QnlpError::Validation(format!(
            "optimizer returned {} parameters, expected {expected}",
            candidate.len()
        )));
    }
    if candidate.iter().any(|p| !p.is_finite()) {
        return Err(QnlpError::Validation(
            "optimizer returned non-finite parameters".into(),
        ));
    }
    Ok(())
}

fn apply_param(config: &mut ClassifierConfig, key: &str, value: &Value) -> QnlpResult<()> {
    let invalid =
        |expected: &str| QnlpError::Validation(format!("parameter '{key}' expects {expected}, got {value}"));
    let unsigned = || value.as_u64().ok_or_else(|| invalid("a non-negative integer"));
    let number = || value.as_f64().ok_or_else(|| invalid("a number"));
    let boolean = || value.as_bool().ok_or_else(|| invalid("a boolean"));
    let text = || value.as_str().ok_or_else(|| invalid("a string"));

    match key {
        "n_qubits" => config.n_qubits = u32::try_from(unsigned()?).map_err(|_| invalid("a u32"))?,
        "n_layers" => config.n_layers = u32::try_from(unsigned()?).map_err(|_| invalid("a u32"))?,
        "ansatz_type" => config.ansatz = text()?.parse::<AnsatzType>()?,
        "encoding_type" => config.encoding = text()?.parse::<EncodingType>()?,
        "optimizer" => {
            config.optimizer = match value {
                Value::String(name) => name.parse::<OptimizerConfig>()?,
                other => serde_json::from_value(other.clone())
                    .map_err(|e| QnlpError::Validation(format!("parameter 'optimizer': {e}")))?,
            }
        }
        "learning_rate" => config.learning_rate = number()?,
        "max_iterations" => {
            config.max_iterations = usize::try_from(unsigned()?).map_err(|_| invalid("a usize"))?;
        }
        "convergence_threshold" => config.convergence_threshold = number()?,
        "backend" => {
            config.backend.kind = text()?
                .parse::<BackendKind>()
                .map_err(|e: HalError| QnlpError::Validation(e.to_string()))?;
        }
        "shots" => {
            config.backend.shots = match value {
                Value::Null => None,
                _ => Some(u32::try_from(unsigned()?).map_err(|_| invalid("a u32"))?),
            }
        }
        "seed" => {
            config.seed = match value {
                Value::Null => None,
                _ => Some(unsigned()?),
            }
        }
        "concurrency" => {
            config.backend.max_concurrency =
                usize::try_from(unsigned()?).map_err(|_| invalid("a usize"))?;
        }
        "angle_rz" => config.angle_rz = boolean()?,
        "hybrid_tail" => config.hybrid_tail = text()?.parse::<HybridTail>()?,
        "entangling_parameters" => config.entangling_parameters = boolean()?,
        other => {
            return Err(QnlpError::Validation(format!(
                "unknown parameter '{other}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use qnlp_adapter_sim::StatevectorExecutor;
    use qnlp_hal::DispatchOptions;

    fn angle_config() -> ClassifierConfig {
        ClassifierConfig {
            n_qubits: 2,
            n_layers: 1,
            ansatz: AnsatzType::Simple,
            encoding: EncodingType::Angle,
            max_iterations: 3,
            seed: Some(1),
            ..ClassifierConfig::default()
        }
    }

    #[test]
    fn test_new_classifier_is_uninitialized() {
        let model = VariationalClassifier::new(angle_config()).unwrap();
        assert_eq!(model.state(), TrainingState::Uninitialized);
        assert_eq!(model.parameter_count(), 4);
        assert!(model.optimal_parameters().is_none());
    }

    #[test]
    fn test_constructor_rejects_bad_config_as_validation() {
        let config = ClassifierConfig {
            n_layers: 0,
            ..angle_config()
        };
        let err = VariationalClassifier::new(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_apply_param_rejects_wrong_types() {
        let mut config = angle_config();
        assert!(apply_param(&mut config, "n_qubits", &json!("four")).is_err());
        assert!(apply_param(&mut config, "angle_rz", &json!(1)).is_err());
        assert!(apply_param(&mut config, "shots", &json!(-5)).is_err());
        assert!(apply_param(&mut config, "backend", &json!("quantum_cloud")).is_err());
        assert_eq!(config, angle_config());
    }

    #[test]
    fn test_apply_param_optimizer_forms() {
        let mut config = angle_config();
        apply_param(&mut config, "optimizer", &json!("spsa")).unwrap();
        assert_eq!(config.optimizer, OptimizerConfig::spsa());

        apply_param(
            &mut config,
            "optimizer",
            &json!({"type": "gradient_descent", "epsilon": 0.01}),
        )
        .unwrap();
        assert_eq!(
            config.optimizer,
            OptimizerConfig::GradientDescent { epsilon: 0.01 }
        );
    }

    #[test]
    fn test_label_threshold_splits_signed_targets() {
        assert_eq!(label_for(0.3), 1.0);
        assert_eq!(label_for(0.058), 1.0);
        assert_eq!(label_for(0.0), 1.0);
        assert_eq!(label_for(-0.3), 0.0);
        assert_eq!(label_for(-1.0), 0.0);
    }

    #[test]
    fn test_evaluator_rejects_circuits_wider_than_executor() {
        let config = angle_config();
        let builder = CircuitBuilder::new(
            Encoder::new(EncodingType::Angle),
            Ansatz::new(AnsatzType::Simple, 2, 1).unwrap(),
        );
        let executor = Arc::new(StatevectorExecutor::with_max_qubits(1));
        let dispatcher = Dispatcher::new(executor, DispatchOptions::default()).unwrap();
        let evaluator = Evaluator::new(&builder, &dispatcher, &config);

        let err = evaluator
            .expectations(&[0.1; 4], &[vec![0.3, 0.4]])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("rejected by executor"), "{err}");
    }

    #[test]
    fn test_candidate_checks() {
        assert!(check_candidate(&[0.1, 0.2], 2).is_ok());
        assert!(check_candidate(&[0.1], 2).is_err());
        assert!(check_candidate(&[f64::NAN, 0.2], 2).is_err());
    }
}
