//! Classifier configuration.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with QNLP_ prefix)
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values
//!
//! The remote access token is never part of the configuration; the remote
//! executor reads it from `QNLP_BACKEND_TOKEN`.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use qnlp_hal::{BackendConfig, BackendKind, NoiseProfile};
use serde::{Deserialize, Serialize};

use crate::ansatz::AnsatzType;
use crate::encoding::{EncodingType, HybridTail};
use crate::error::{QnlpError, QnlpResult};
use crate::optimizers::OptimizerConfig;

/// Widest register the classifier accepts.
pub const MAX_QUBITS: u32 = 20;

/// Complete classifier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Register width
    #[serde(default = "default_n_qubits")]
    pub n_qubits: u32,

    /// Ansatz repetitions
    #[serde(default = "default_n_layers")]
    pub n_layers: u32,

    #[serde(default)]
    pub ansatz: AnsatzType,

    #[serde(default)]
    pub encoding: EncodingType,

    /// Follow angle-encoding `Ry` gates with `Rz`
    #[serde(default)]
    pub angle_rz: bool,

    /// Encoding for the second half of hybrid vectors
    #[serde(default)]
    pub hybrid_tail: HybridTail,

    /// Trainable QNN entangler angles
    #[serde(default)]
    pub entangling_parameters: bool,

    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Step size for gradient descent
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Stop once the cost moves by less than this between iterations
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f64,

    /// Seed for parameter initialization and shot sampling
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub backend: BackendSettings,
}

/// Executor selection and dispatch limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub kind: BackendKind,

    /// Remote service base URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Shot budget; `None` uses the executor default
    #[serde(default)]
    pub shots: Option<u32>,

    /// Connect and per-execution timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Circuits evaluated concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub noise_profile: Option<NoiseProfile>,
}

// Default value functions
fn default_n_qubits() -> u32 {
    4
}

fn default_n_layers() -> u32 {
    2
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_max_iterations() -> usize {
    100
}

fn default_convergence_threshold() -> f64 {
    1e-6
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_concurrency() -> usize {
    1
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            n_qubits: default_n_qubits(),
            n_layers: default_n_layers(),
            ansatz: AnsatzType::default(),
            encoding: EncodingType::default(),
            angle_rz: false,
            hybrid_tail: HybridTail::default(),
            entangling_parameters: false,
            optimizer: OptimizerConfig::default(),
            learning_rate: default_learning_rate(),
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
            seed: None,
            backend: BackendSettings::default(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            kind: BackendKind::default(),
            endpoint: None,
            shots: None,
            timeout_ms: default_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            noise_profile: None,
        }
    }
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ClassifierConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> QnlpResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| QnlpError::Config(format!("cannot read {}: {e}", path.display())))?;

        let config: ClassifierConfig = serde_yaml_ng::from_str(&contents)
            .map_err(|e| QnlpError::Config(format!("cannot parse {}: {e}", path.display())))?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `QNLP_*` environment variables.
    pub fn from_env() -> QnlpResult<Self> {
        Self::default().merge_env()
    }

    /// Load configuration with the following precedence:
    /// 1. Load from file if provided
    /// 2. Apply environment variable overrides
    /// 3. Validate the result
    pub fn load(config_file: Option<&Path>) -> QnlpResult<Self> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.merge_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Merge environment variables into this configuration.
    ///
    /// Absent variables leave fields unchanged. A variable that does not
    /// parse is an error.
    pub fn merge_env(self) -> QnlpResult<Self> {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Merge overrides from an arbitrary variable lookup.
    pub fn merge_vars<F>(mut self, lookup: F) -> QnlpResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Model shape
        if let Some(v) = parsed(&lookup, "QNLP_N_QUBITS")? {
            self.n_qubits = v;
        }
        if let Some(v) = parsed(&lookup, "QNLP_N_LAYERS")? {
            self.n_layers = v;
        }
        if let Some(v) = parsed(&lookup, "QNLP_ANSATZ")? {
            self.ansatz = v;
        }
        if let Some(v) = parsed(&lookup, "QNLP_ENCODING")? {
            self.encoding = v;
        }

        // Training
        if let Some(v) = parsed(&lookup, "QNLP_MAX_ITERATIONS")? {
            self.max_iterations = v;
        }
        if let Some(v) = parsed(&lookup, "QNLP_CONVERGENCE_THRESHOLD")? {
            self.convergence_threshold = v;
        }
        if let Some(v) = parsed(&lookup, "QNLP_SEED")? {
            self.seed = Some(v);
        }

        // Backend
        if let Some(v) = parsed(&lookup, "QNLP_BACKEND")? {
            self.backend.kind = v;
        }
        if let Some(v) = parsed(&lookup, "QNLP_SHOTS")? {
            self.backend.shots = Some(v);
        }
        if let Some(v) = lookup("QNLP_ENDPOINT") {
            self.backend.endpoint = Some(v);
        }
        if let Some(v) = parsed(&lookup, "QNLP_TIMEOUT_MS")? {
            self.backend.timeout_ms = v;
        }

        Ok(self)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> QnlpResult<()> {
        self.check().map_err(QnlpError::Config)
    }

    /// Validation shared by the loader and the classifier constructors.
    pub(crate) fn check(&self) -> Result<(), String> {
        if !(1..=MAX_QUBITS).contains(&self.n_qubits) {
            return Err(format!(
                "n_qubits must be in [1, {MAX_QUBITS}], got {}",
                self.n_qubits
            ));
        }
        if self.n_layers == 0 {
            return Err("n_layers must be greater than 0".to_string());
        }
        if self.max_iterations == 0 {
            return Err("max_iterations must be greater than 0".to_string());
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold <= 0.0 {
            return Err(format!(
                "convergence_threshold must be positive and finite, got {}",
                self.convergence_threshold
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            ));
        }
        self.optimizer.validate()?;

        let backend = &self.backend;
        if backend.shots == Some(0) {
            return Err("shots must be greater than 0".to_string());
        }
        if backend.timeout_ms == 0 {
            return Err("timeout_ms must be greater than 0".to_string());
        }
        if backend.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".to_string());
        }
        if backend.kind == BackendKind::Remote
            && backend.endpoint.as_deref().is_none_or(|e| e.trim().is_empty())
        {
            return Err("remote backend requires an endpoint".to_string());
        }
        if let Some(profile) = &backend.noise_profile {
            profile.validate().map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    /// Executor configuration derived from the backend settings.
    pub fn backend_config(&self) -> BackendConfig {
        let backend = &self.backend;
        let mut config = BackendConfig::new(backend.kind.as_str(), backend.kind)
            .with_timeout(backend.timeout());
        if let Some(endpoint) = &backend.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        if let Some(shots) = backend.shots {
            config = config.with_shots(shots);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(profile) = &backend.noise_profile {
            config = config.with_noise_profile(profile.clone());
        }
        config
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> QnlpResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| QnlpError::Config(format!("invalid {key}='{raw}': {e}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ClassifierConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_qubits, 4);
        assert_eq!(config.ansatz, AnsatzType::Qnn);
        assert_eq!(config.backend.kind, BackendKind::Statevector);
    }

    #[test]
    fn test_merge_vars_overrides() {
        let config = ClassifierConfig::default()
            .merge_vars(vars(&[
                ("QNLP_N_QUBITS", "3"),
                ("QNLP_ANSATZ", "vqe"),
                ("QNLP_ENCODING", "angle"),
                ("QNLP_BACKEND", "shot_sampling"),
                ("QNLP_SHOTS", "2048"),
                ("QNLP_SEED", "11"),
                ("QNLP_TIMEOUT_MS", "500"),
            ]))
            .unwrap();

        assert_eq!(config.n_qubits, 3);
        assert_eq!(config.ansatz, AnsatzType::Vqe);
        assert_eq!(config.encoding, EncodingType::Angle);
        assert_eq!(config.backend.kind, BackendKind::ShotSampling);
        assert_eq!(config.backend.shots, Some(2048));
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.backend.timeout(), Duration::from_millis(500));
        // untouched fields keep their values
        assert_eq!(config.n_layers, 2);
    }

    #[test]
    fn test_merge_vars_rejects_garbage() {
        let err = ClassifierConfig::default()
            .merge_vars(vars(&[("QNLP_N_LAYERS", "many")]))
            .unwrap_err();
        assert!(matches!(err, QnlpError::Config(_)));
        assert!(err.to_string().contains("QNLP_N_LAYERS"));
    }

    #[test]
    fn test_validate_rules() {
        let cases: Vec<Box<dyn Fn(&mut ClassifierConfig)>> = vec![
            Box::new(|c: &mut ClassifierConfig| c.n_qubits = 0),
            Box::new(|c: &mut ClassifierConfig| c.n_qubits = MAX_QUBITS + 1),
            Box::new(|c: &mut ClassifierConfig| c.n_layers = 0),
            Box::new(|c: &mut ClassifierConfig| c.max_iterations = 0),
            Box::new(|c: &mut ClassifierConfig| c.convergence_threshold = 0.0),
            Box::new(|c: &mut ClassifierConfig| c.convergence_threshold = f64::NAN),
            Box::new(|c: &mut ClassifierConfig| c.backend.shots = Some(0)),
            Box::new(|c: &mut ClassifierConfig| c.backend.kind = BackendKind::Remote),
            Box::new(|c: &mut ClassifierConfig| c.backend.noise_profile = Some(NoiseProfile::uniform(1.5, 0.0))),
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut config = ClassifierConfig::default();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(QnlpError::Config(_))),
                "case {i} should fail"
            );
        }
    }

    #[test]
    fn test_yaml_with_partial_fields() {
        let yaml = r#"
n_qubits: 2
ansatz: simple
optimizer:
  type: spsa
  a: 0.2
backend:
  kind: shot_sampling
  shots: 512
"#;
        let config: ClassifierConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.n_qubits, 2);
        assert_eq!(config.ansatz, AnsatzType::Simple);
        assert_eq!(config.optimizer.name(), "spsa");
        assert_eq!(config.backend.shots, Some(512));
        assert_eq!(config.backend.max_concurrency, 1);
        assert_eq!(config.max_iterations, 100);
    }

    #[test]
    fn test_backend_config_carries_seed_and_shots() {
        let mut config = ClassifierConfig::default();
        config.seed = Some(5);
        config.backend.kind = BackendKind::ShotSampling;
        config.backend.shots = Some(64);

        let backend = config.backend_config();
        assert_eq!(backend.kind, BackendKind::ShotSampling);
        assert_eq!(backend.seed, Some(5));
        assert_eq!(backend.shots, Some(64));
        assert_eq!(backend.timeout, Duration::from_secs(30));
    }
}
