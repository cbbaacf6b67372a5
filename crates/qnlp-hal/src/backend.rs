//! Executor trait and backend configuration.
//!
//! An [`Executor`] turns a bound [`Circuit`] into an [`ExecutionResult`]:
//!
//! ```text
//!   capabilities() ──→ validate() ──→ execute() ──→ ExecutionResult
//!    (sync, &ref)       (async)        (async)       exact | sampled
//! ```
//!
//! Implementations are `Send + Sync` so one instance can serve the
//! concurrent fan-out in [`crate::Dispatcher`]. Retries are never attempted
//! at this layer.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use num_complex::Complex64;
use qnlp_ir::Circuit;
use serde::{Deserialize, Serialize};

use crate::capability::{Capabilities, NoiseProfile};
use crate::error::{HalError, HalResult};
use crate::result::ExecutionResult;

/// Family of executor selected at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Exact expectation values from a statevector.
    #[default]
    Statevector,
    /// Measurement counts sampled from a statevector.
    ShotSampling,
    /// Remote service reached over HTTP.
    Remote,
}

impl BackendKind {
    /// Stable configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Statevector => "statevector",
            BackendKind::ShotSampling => "shot_sampling",
            BackendKind::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = HalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "statevector" | "exact" => Ok(BackendKind::Statevector),
            "shot_sampling" | "shots" | "sampled" => Ok(BackendKind::ShotSampling),
            "remote" | "hardware" => Ok(BackendKind::Remote),
            other => Err(HalError::Configuration(format!(
                "unknown backend kind '{other}'"
            ))),
        }
    }
}

/// Configuration for an executor instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Name of the executor.
    pub name: String,
    /// Executor family.
    #[serde(default)]
    pub kind: BackendKind,
    /// API endpoint URL (remote executors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Default shot budget for sampling executors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shots: Option<u32>,
    /// Seed for sampling executors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Budget for connecting and for each execution.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Per-gate error probabilities to publish in capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_profile: Option<NoiseProfile>,
    /// Additional configuration.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BackendConfig {
    /// Create a new backend configuration.
    pub fn new(name: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            name: name.into(),
            kind,
            endpoint: None,
            shots: None,
            seed: None,
            timeout: Duration::from_secs(30),
            noise_profile: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the default shot budget.
    pub fn with_shots(mut self, shots: u32) -> Self {
        self.shots = Some(shots);
        self
    }

    /// Set the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the connect and execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the published noise profile.
    pub fn with_noise_profile(mut self, profile: NoiseProfile) -> Self {
        self.noise_profile = Some(profile);
        self
    }

    /// Add extra configuration.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Result of circuit validation against executor constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    /// Circuit can be executed as-is.
    Valid,
    /// Circuit cannot run on this executor.
    Invalid {
        /// Reasons the circuit is invalid.
        reasons: Vec<String>,
    },
}

impl ValidationResult {
    /// Check if the circuit is valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Turn an invalid result into [`HalError::InvalidCircuit`].
    pub fn into_result(self) -> HalResult<()> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid { reasons } => {
                Err(HalError::InvalidCircuit(reasons.join("; ")))
            }
        }
    }
}

/// Trait for circuit executors.
///
/// # Contract
///
/// - `capabilities()` is synchronous and infallible; it is cached at
///   construction time.
/// - `execute()` with `shots == None` returns exact expectations when
///   `capabilities().supports_exact`, otherwise the executor's default shot
///   budget is used.
/// - `statevector()` returns the final state for executors with state
///   access, `None` otherwise.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Get the name of this executor.
    fn name(&self) -> &str;

    /// Get the capabilities of this executor.
    fn capabilities(&self) -> &Capabilities;

    /// Validate a circuit against executor constraints.
    async fn validate(&self, circuit: &Circuit) -> HalResult<ValidationResult> {
        let caps = self.capabilities();
        let mut reasons = Vec::new();

        if circuit.num_qubits() > caps.num_qubits {
            reasons.push(format!(
                "circuit has {} qubits, executor supports {}",
                circuit.num_qubits(),
                caps.num_qubits
            ));
        }
        for inst in circuit.instructions() {
            match inst.as_gate() {
                Some(gate) if !caps.gate_set.contains(gate.name()) => {
                    reasons.push(format!("unsupported gate '{}'", gate.name()));
                }
                None if !caps.supports_state_preparation => {
                    reasons.push("state preparation not supported".into());
                }
                _ => {}
            }
        }
        if let Err(e) = circuit.validate() {
            reasons.push(e.to_string());
        }

        if reasons.is_empty() {
            Ok(ValidationResult::Valid)
        } else {
            Ok(ValidationResult::Invalid { reasons })
        }
    }

    /// Execute a circuit.
    async fn execute(&self, circuit: &Circuit, shots: Option<u32>) -> HalResult<ExecutionResult>;

    /// Final statevector of a circuit, if this executor has state access.
    async fn statevector(&self, _circuit: &Circuit) -> HalResult<Option<Vec<Complex64>>> {
        Ok(None)
    }
}
