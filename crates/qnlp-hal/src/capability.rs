//! Executor capability introspection.
//!
//! [`Capabilities`] describe what an executor can run: register width,
//! supported gates, shot limits and whether exact expectation values are
//! available. The optional [`NoiseProfile`] carries per-gate error
//! probabilities used for post-fit error-rate estimates; it does not change
//! what the bundled simulators compute.

use std::collections::BTreeMap;

use qnlp_ir::{Instruction, OpClass};
use serde::{Deserialize, Serialize};

use crate::error::{HalError, HalResult};

/// Capabilities of an executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    /// Name of the executor.
    pub name: String,
    /// Number of qubits available.
    pub num_qubits: u32,
    /// Supported gate set.
    pub gate_set: GateSet,
    /// Maximum number of shots per execution.
    pub max_shots: u32,
    /// Whether this is a simulator (`true`) or hardware (`false`).
    pub is_simulator: bool,
    /// Whether exact expectation values can be returned without sampling.
    pub supports_exact: bool,
    /// Whether register state preparation is accepted.
    pub supports_state_preparation: bool,
    /// Per-gate error probabilities, when the executor publishes them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_profile: Option<NoiseProfile>,
}

impl Capabilities {
    /// Capabilities of an in-process statevector simulator.
    pub fn simulator(num_qubits: u32) -> Self {
        Self {
            name: "simulator".into(),
            num_qubits,
            gate_set: GateSet::universal(),
            max_shots: 1_000_000,
            is_simulator: true,
            supports_exact: true,
            supports_state_preparation: true,
            noise_profile: None,
        }
    }

    /// Capabilities of a remote sampling executor.
    pub fn remote(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            gate_set: GateSet::universal(),
            max_shots: 100_000,
            is_simulator: false,
            supports_exact: false,
            supports_state_preparation: true,
            noise_profile: None,
        }
    }

    /// Rename these capabilities.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach a noise profile.
    pub fn with_noise_profile(mut self, profile: NoiseProfile) -> Self {
        self.noise_profile = Some(profile);
        self
    }
}

/// Gate names an executor accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSet {
    /// Single-qubit gates supported.
    pub single_qubit: Vec<String>,
    /// Two-qubit gates supported.
    pub two_qubit: Vec<String>,
}

impl GateSet {
    /// Every gate defined in `qnlp-ir`.
    pub fn universal() -> Self {
        Self {
            single_qubit: ["x", "h", "rx", "ry", "rz", "u"]
                .into_iter()
                .map(String::from)
                .collect(),
            two_qubit: ["cx", "crz"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Check if a gate is supported.
    pub fn contains(&self, gate: &str) -> bool {
        self.single_qubit.iter().any(|g| g == gate) || self.two_qubit.iter().any(|g| g == gate)
    }
}

/// Per-operation error probabilities.
///
/// Lookup order for an instruction: an entry for its exact name in
/// `gate_errors`, then the default for its operation class, then zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    /// Error probability keyed by operation name (`"cx"`, `"ry"`, ...).
    #[serde(default)]
    pub gate_errors: BTreeMap<String, f64>,
    /// Fallback for single-qubit gates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_qubit_error: Option<f64>,
    /// Fallback for two-qubit gates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_qubit_error: Option<f64>,
    /// Fallback for state preparation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_preparation_error: Option<f64>,
}

impl NoiseProfile {
    /// Uniform single- and two-qubit error probabilities.
    pub fn uniform(single_qubit: f64, two_qubit: f64) -> Self {
        Self {
            single_qubit_error: Some(single_qubit),
            two_qubit_error: Some(two_qubit),
            ..Self::default()
        }
    }

    /// Override the error probability of one operation name.
    pub fn with_gate_error(mut self, name: impl Into<String>, probability: f64) -> Self {
        self.gate_errors.insert(name.into(), probability);
        self
    }

    /// Error probability of a single instruction.
    pub fn error_probability(&self, instruction: &Instruction) -> f64 {
        if let Some(&p) = self.gate_errors.get(instruction.name()) {
            return p;
        }
        let fallback = match instruction.op_class() {
            OpClass::SingleQubit => self.single_qubit_error,
            OpClass::Entangling => self.two_qubit_error,
            OpClass::StatePreparation => self.state_preparation_error,
        };
        fallback.unwrap_or(0.0)
    }

    /// Check that every probability lies in `[0, 1]`.
    pub fn validate(&self) -> HalResult<()> {
        let named = self.gate_errors.iter().map(|(k, v)| (k.as_str(), *v));
        let defaults = [
            ("single_qubit_error", self.single_qubit_error),
            ("two_qubit_error", self.two_qubit_error),
            ("state_preparation_error", self.state_preparation_error),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)));

        for (name, p) in named.chain(defaults) {
            if !(0.0..=1.0).contains(&p) {
                return Err(HalError::Configuration(format!(
                    "error probability for '{name}' must be in [0, 1], got {p}"
                )));
            }
        }
        Ok(())
    }
}
