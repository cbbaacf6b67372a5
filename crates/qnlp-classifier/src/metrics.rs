//! Circuit quality metrics.
//!
//! A [`CircuitMetrics`] snapshot summarizes one executed classifier circuit.
//! Fidelity and entanglement carry a [`MetricSource`] label: `Computed`
//! values come from the ideal statevector, `Heuristic` values are fallbacks
//! used when no state is available.
//!
//! The entanglement figure is the normalized linear entropy of the first
//! ⌊n/2⌋ qubits. It characterizes that one bipartition only and is not a
//! certified entanglement measure.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ndarray::Array2;
use num_complex::Complex64;
use qnlp_hal::{Counts, ExecutionResult, NoiseProfile};
use qnlp_ir::{Circuit, OpClass};
use serde::{Deserialize, Serialize};

use crate::error::{QnlpError, QnlpResult};

/// How a metric value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSource {
    Computed,
    Heuristic,
}

/// Immutable metrics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitMetrics {
    /// Agreement between measured and ideal distributions, in [0, 1].
    pub fidelity: f64,
    pub fidelity_source: MetricSource,
    /// Cost associated with the parameters that produced the circuit.
    pub cost: f64,
    /// Longest chain of operations over shared qubits.
    pub depth: usize,
    pub gate_counts: BTreeMap<String, usize>,
    /// Accumulated per-gate error probability, capped at 1.
    pub error_rate: f64,
    pub execution_time: Duration,
    /// Probability that no gate fails.
    pub success_rate: f64,
    /// Bipartite entanglement estimate, in [0, 1].
    pub entanglement: f64,
    pub entanglement_source: MetricSource,
    pub recorded_at: DateTime<Utc>,
}

/// Derives [`CircuitMetrics`] from a circuit and its execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn collect(
        circuit: &Circuit,
        result: &ExecutionResult,
        ideal_state: Option<&[Complex64]>,
        noise: Option<&NoiseProfile>,
        cost: f64,
    ) -> QnlpResult<CircuitMetrics> {
        let depth = circuit
            .depth()
            .map_err(|e| QnlpError::from_ir("computing circuit depth", e))?;

        let (fidelity, fidelity_source) = match (ideal_state, result.counts()) {
            (Some(state), Some(counts)) if counts.total_shots() > 0 => {
                (hellinger_fidelity(state, counts), MetricSource::Computed)
            }
            _ => (1.0, MetricSource::Heuristic),
        };

        let (error_rate, success_rate) = gate_error_rates(circuit, noise);
        let (entanglement, entanglement_source) = entanglement(circuit, ideal_state);

        Ok(CircuitMetrics {
            fidelity,
            fidelity_source,
            cost,
            depth,
            gate_counts: circuit.gate_counts(),
            error_rate,
            execution_time: result.execution_time,
            success_rate,
            entanglement,
            entanglement_source,
            recorded_at: Utc::now(),
        })
    }
}

/// `(Σ sqrt(p_i q_i))²` between the ideal distribution and the counts.
pub fn hellinger_fidelity(state: &[Complex64], counts: &Counts) -> f64 {
    let overlap: f64 = counts
        .probabilities()
        .iter()
        .filter_map(|(bits, q)| {
            let idx = usize::from_str_radix(bits, 2).ok()?;
            let p = state.get(idx)?.norm_sqr();
            Some((p * q).sqrt())
        })
        .sum();
    (overlap * overlap).clamp(0.0, 1.0)
}

fn gate_error_rates(circuit: &Circuit, noise: Option<&NoiseProfile>) -> (f64, f64) {
    let Some(profile) = noise else {
        return (0.0, 1.0);
    };
    let mut total = 0.0;
    let mut success = 1.0;
    for inst in circuit.instructions() {
        let p = profile.error_probability(inst);
        total += p;
        success *= 1.0 - p;
    }
    (total.min(1.0), success.clamp(0.0, 1.0))
}

fn entanglement(circuit: &Circuit, state: Option<&[Complex64]>) -> (f64, MetricSource) {
    let n = circuit.num_qubits() as usize;
    if n < 2 {
        return (0.0, MetricSource::Computed);
    }
    if let Some(value) = state.and_then(|s| linear_entropy(s, n)) {
        return (value, MetricSource::Computed);
    }
    let fraction = if circuit.is_empty() {
        0.0
    } else {
        circuit.count_class(OpClass::Entangling) as f64 / circuit.len() as f64
    };
    (fraction, MetricSource::Heuristic)
}

/// Normalized linear entropy `d/(d-1) * (1 - Tr ρ_A²)` of the low ⌊n/2⌋ qubits.
fn linear_entropy(state: &[Complex64], n: usize) -> Option<f64> {
    if state.len() != 1usize.checked_shl(n as u32)? {
        return None;
    }
    let k = n / 2;
    let dim_a = 1usize << k;
    let dim_b = 1usize << (n - k);

    // row b, column a holds the amplitude of basis index b * 2^k + a
    let psi = Array2::from_shape_vec((dim_b, dim_a), state.to_vec()).ok()?;
    let rho = psi.t().dot(&psi.mapv(|z| z.conj()));
    let purity: f64 = rho.iter().map(|z| z.norm_sqr()).sum();

    let d = dim_a as f64;
    Some((d / (d - 1.0) * (1.0 - purity)).clamp(0.0, 1.0))
}
