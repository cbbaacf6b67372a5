//! Simulator executors.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use num_complex::Complex64;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, instrument};

use qnlp_hal::{
    BackendConfig, Capabilities, ExecutionResult, Executor, HalError, HalResult, NoiseProfile,
};
use qnlp_ir::Circuit;

use crate::statevector::Statevector;

/// Largest register the simulators accept by default.
pub const DEFAULT_MAX_QUBITS: u32 = 20;

/// Shot budget used when a sampled execution is requested without one.
pub const DEFAULT_SHOTS: u32 = 1024;

/// Run a circuit from |0...0⟩ and return the final state.
#[instrument(skip(circuit), fields(circuit = circuit.name()))]
pub fn simulate(circuit: &Circuit, max_qubits: u32) -> HalResult<Statevector> {
    if circuit.num_qubits() > max_qubits {
        return Err(HalError::CircuitTooLarge(format!(
            "Circuit has {} qubits but simulator only supports {}",
            circuit.num_qubits(),
            max_qubits
        )));
    }

    let mut sv = Statevector::new(circuit.num_qubits() as usize);
    for inst in circuit.instructions() {
        sv.apply(inst)?;
    }
    debug!(
        qubits = circuit.num_qubits(),
        instructions = circuit.len(),
        "simulation finished"
    );
    Ok(sv)
}

fn max_qubits_from(config: &BackendConfig) -> u32 {
    config
        .extra
        .get("max_qubits")
        .and_then(serde_json::Value::as_u64)
        .map_or(DEFAULT_MAX_QUBITS, |v| {
            u32::try_from(v).unwrap_or(DEFAULT_MAX_QUBITS)
        })
}

fn capabilities_from(name: &str, max_qubits: u32, noise: Option<&NoiseProfile>) -> HalResult<Capabilities> {
    let caps = Capabilities::simulator(max_qubits).with_name(name);
    match noise {
        Some(profile) => {
            profile.validate()?;
            Ok(caps.with_noise_profile(profile.clone()))
        }
        None => Ok(caps),
    }
}

/// Exact statevector executor.
///
/// Returns ⟨Z⟩ per qubit computed from the final state. The requested shot
/// count is ignored; results are always exact.
pub struct StatevectorExecutor {
    name: String,
    capabilities: Capabilities,
    max_qubits: u32,
}

impl StatevectorExecutor {
    /// Create a new executor with default settings.
    pub fn new() -> Self {
        Self::with_max_qubits(DEFAULT_MAX_QUBITS)
    }

    /// Create an executor with custom max qubits.
    pub fn with_max_qubits(max_qubits: u32) -> Self {
        Self {
            name: "statevector".into(),
            capabilities: Capabilities::simulator(max_qubits).with_name("statevector"),
            max_qubits,
        }
    }

    /// Build from configuration.
    ///
    /// Recognized `extra` keys: `max_qubits`.
    pub fn from_config(config: &BackendConfig) -> HalResult<Self> {
        let max_qubits = max_qubits_from(config);
        Ok(Self {
            name: config.name.clone(),
            capabilities: capabilities_from(&config.name, max_qubits, config.noise_profile.as_ref())?,
            max_qubits,
        })
    }
}

impl Default for StatevectorExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for StatevectorExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[instrument(skip(self, circuit), fields(circuit = circuit.name()))]
    async fn execute(&self, circuit: &Circuit, shots: Option<u32>) -> HalResult<ExecutionResult> {
        let start = Instant::now();
        let sv = simulate(circuit, self.max_qubits)?;
        let elapsed = start.elapsed();
        debug!(?shots, ?elapsed, "exact execution completed");
        Ok(ExecutionResult::exact(sv.expectation_values())
            .with_execution_time(elapsed)
            .with_backend(&self.name))
    }

    async fn statevector(&self, circuit: &Circuit) -> HalResult<Option<Vec<Complex64>>> {
        Ok(Some(simulate(circuit, self.max_qubits)?.into_amplitudes()))
    }
}

/// Shot-sampling executor.
///
/// Simulates the circuit exactly, then draws measurement outcomes from the
/// final distribution. With a seed, sampling is reproducible for a fixed
/// sequence of calls.
pub struct ShotExecutor {
    name: String,
    capabilities: Capabilities,
    max_qubits: u32,
    default_shots: u32,
    rng: Mutex<StdRng>,
}

impl ShotExecutor {
    /// Create a new executor drawing from entropy.
    pub fn new() -> Self {
        Self::build(StdRng::from_entropy())
    }

    /// Create an executor with a fixed sampling seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::build(StdRng::seed_from_u64(seed))
    }

    fn build(rng: StdRng) -> Self {
        let mut capabilities =
            Capabilities::simulator(DEFAULT_MAX_QUBITS).with_name("shot_sampling");
        capabilities.supports_exact = false;
        Self {
            name: "shot_sampling".into(),
            capabilities,
            max_qubits: DEFAULT_MAX_QUBITS,
            default_shots: DEFAULT_SHOTS,
            rng: Mutex::new(rng),
        }
    }

    /// Set the shot budget used when `execute` is called without one.
    pub fn with_default_shots(mut self, shots: u32) -> Self {
        self.default_shots = shots;
        self
    }

    /// Set the largest accepted register.
    pub fn with_max_qubits(mut self, max_qubits: u32) -> Self {
        self.max_qubits = max_qubits;
        self.capabilities.num_qubits = max_qubits;
        self
    }

    /// Build from configuration.
    ///
    /// Uses `seed`, `shots` and `noise_profile`; recognized `extra` keys:
    /// `max_qubits`.
    pub fn from_config(config: &BackendConfig) -> HalResult<Self> {
        let mut executor = match config.seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
        .with_max_qubits(max_qubits_from(config));
        if let Some(shots) = config.shots {
            executor.default_shots = shots;
        }
        let mut capabilities =
            capabilities_from(&config.name, executor.max_qubits, config.noise_profile.as_ref())?;
        capabilities.supports_exact = false;
        executor.capabilities = capabilities;
        executor.name = config.name.clone();
        Ok(executor)
    }
}

impl Default for ShotExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ShotExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[instrument(skip(self, circuit), fields(circuit = circuit.name()))]
    async fn execute(&self, circuit: &Circuit, shots: Option<u32>) -> HalResult<ExecutionResult> {
        let shots = shots.unwrap_or(self.default_shots);
        if shots == 0 {
            return Err(HalError::InvalidShots("shot count must be positive".into()));
        }
        if shots > self.capabilities.max_shots {
            return Err(HalError::InvalidShots(format!(
                "{shots} shots requested, maximum is {}",
                self.capabilities.max_shots
            )));
        }

        let start = Instant::now();
        let sv = simulate(circuit, self.max_qubits)?;
        let counts = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            sv.sample_counts(shots, &mut *rng)
        };
        let elapsed = start.elapsed();
        debug!(shots, outcomes = counts.len(), ?elapsed, "sampled execution completed");

        Ok(ExecutionResult::sampled(counts, shots)
            .with_execution_time(elapsed)
            .with_backend(&self.name))
    }

    async fn statevector(&self, circuit: &Circuit) -> HalResult<Option<Vec<Complex64>>> {
        Ok(Some(simulate(circuit, self.max_qubits)?.into_amplitudes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnlp_hal::BackendKind;
    use qnlp_ir::QubitId;

    fn bell() -> Circuit {
        let mut circuit = Circuit::new("bell", 2);
        circuit.h(QubitId(0)).unwrap();
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit
    }

    #[tokio::test]
    async fn test_statevector_capabilities() {
        let executor = StatevectorExecutor::new();
        let caps = executor.capabilities();

        assert!(caps.is_simulator);
        assert!(caps.supports_exact);
        assert_eq!(caps.num_qubits, 20);
    }

    #[tokio::test]
    async fn test_statevector_exact_bell() {
        let executor = StatevectorExecutor::new();
        let result = executor.execute(&bell(), None).await.unwrap();
        let z = result.expectation_values(2);
        assert!(z[0].abs() < 1e-12);
        assert!(z[1].abs() < 1e-12);
        assert!(result.counts().is_none());
        assert_eq!(result.backend, "statevector");
    }

    #[tokio::test]
    async fn test_shot_bell_state() {
        let executor = ShotExecutor::with_seed(42);
        let result = executor.execute(&bell(), Some(1000)).await.unwrap();
        assert_eq!(result.shots, Some(1000));

        let counts = result.counts().unwrap();
        assert_eq!(counts.get("00") + counts.get("11"), 1000);
        assert_eq!(counts.get("01") + counts.get("10"), 0);
    }

    #[tokio::test]
    async fn test_shot_seed_reproducible() {
        let a = ShotExecutor::with_seed(7).execute(&bell(), Some(500)).await.unwrap();
        let b = ShotExecutor::with_seed(7).execute(&bell(), Some(500)).await.unwrap();
        assert_eq!(a.counts(), b.counts());
    }

    #[tokio::test]
    async fn test_shot_default_and_zero() {
        let executor = ShotExecutor::with_seed(1).with_default_shots(64);
        let result = executor.execute(&bell(), None).await.unwrap();
        assert_eq!(result.shots, Some(64));
        assert_eq!(result.counts().unwrap().total_shots(), 64);

        assert!(matches!(
            executor.execute(&bell(), Some(0)).await,
            Err(HalError::InvalidShots(_))
        ));
    }

    #[tokio::test]
    async fn test_too_many_qubits() {
        let executor = StatevectorExecutor::with_max_qubits(5);
        let circuit = Circuit::new("test", 10);
        assert!(matches!(
            executor.execute(&circuit, None).await,
            Err(HalError::CircuitTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = BackendConfig::new("sampler", BackendKind::ShotSampling)
            .with_seed(3)
            .with_shots(128)
            .with_noise_profile(NoiseProfile::uniform(0.001, 0.01))
            .with_extra("max_qubits", serde_json::json!(8));
        let executor = ShotExecutor::from_config(&config).unwrap();
        assert_eq!(executor.name(), "sampler");
        assert_eq!(executor.capabilities().num_qubits, 8);
        assert!(!executor.capabilities().supports_exact);
        assert!(executor.capabilities().noise_profile.is_some());

        let result = executor.execute(&bell(), None).await.unwrap();
        assert_eq!(result.shots, Some(128));
    }

    #[tokio::test]
    async fn test_from_config_rejects_bad_noise() {
        let config = BackendConfig::new("sv", BackendKind::Statevector)
            .with_noise_profile(NoiseProfile::uniform(1.5, 0.0));
        assert!(StatevectorExecutor::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_statevector_access() {
        let executor = ShotExecutor::with_seed(0);
        let state = executor.statevector(&bell()).await.unwrap().unwrap();
        assert_eq!(state.len(), 4);
        assert!((state[0].norm_sqr() - 0.5).abs() < 1e-12);
        assert!((state[3].norm_sqr() - 0.5).abs() < 1e-12);
    }
}
