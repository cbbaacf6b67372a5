//! Execution results and measurement statistics.
//!
//! # Bit ordering
//!
//! Bitstrings are little-endian: the character for qubit 0 is the rightmost
//! one, qubit `i` sits at position `len - 1 - i`. This matches rendering a
//! basis index with `format!("{:0n$b}")`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Measurement counts keyed by bitstring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counts {
    counts: BTreeMap<String, u64>,
}

impl Counts {
    /// Create an empty count table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a count table from `(bitstring, count)` pairs.
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, u64)>) -> Self {
        let mut counts = Self::new();
        for (bits, n) in pairs {
            counts.insert(bits, n);
        }
        counts
    }

    /// Add `count` occurrences of `bitstring`.
    pub fn insert(&mut self, bitstring: impl Into<String>, count: u64) {
        *self.counts.entry(bitstring.into()).or_insert(0) += count;
    }

    /// Occurrences of a bitstring (zero when absent).
    pub fn get(&self, bitstring: &str) -> u64 {
        self.counts.get(bitstring).copied().unwrap_or(0)
    }

    /// Total number of recorded shots.
    pub fn total_shots(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct bitstrings.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no outcome was recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate over `(bitstring, count)` in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Empirical probability of each outcome. Empty when no shots were recorded.
    pub fn probabilities(&self) -> BTreeMap<String, f64> {
        let total = self.total_shots();
        if total == 0 {
            return BTreeMap::new();
        }
        self.counts
            .iter()
            .map(|(k, &v)| (k.clone(), v as f64 / total as f64))
            .collect()
    }

    /// Expectation of Z on one qubit: `Σ count·(1 − 2·bit) / Σ count`.
    ///
    /// Returns 0.0 when the table is empty. Bitstrings shorter than
    /// `qubit + 1` read that qubit as 0.
    pub fn expectation_z(&self, qubit: usize) -> f64 {
        let total = self.total_shots();
        if total == 0 {
            return 0.0;
        }
        let signed: i128 = self
            .iter()
            .map(|(bits, n)| {
                let sign = if bit_at(bits, qubit) { -1 } else { 1 };
                sign * i128::from(n)
            })
            .sum();
        signed as f64 / total as f64
    }

    /// Z expectations for qubits `0..num_qubits`.
    pub fn expectation_values(&self, num_qubits: usize) -> Vec<f64> {
        (0..num_qubits).map(|q| self.expectation_z(q)).collect()
    }
}

/// Read qubit `qubit` from a little-endian bitstring.
fn bit_at(bits: &str, qubit: usize) -> bool {
    let bytes = bits.as_bytes();
    bytes.len() > qubit && bytes[bytes.len() - 1 - qubit] == b'1'
}

/// What an execution produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Exact Z expectation per qubit.
    Exact(Vec<f64>),
    /// Sampled measurement counts.
    Sampled(Counts),
}

/// Result of executing one circuit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exact expectations or sampled counts.
    pub outcome: Outcome,
    /// Shots used, `None` in exact mode.
    pub shots: Option<u32>,
    /// Wall-clock execution time.
    pub execution_time: Duration,
    /// Unique identifier of this execution.
    pub job_id: String,
    /// Name of the executor that produced the result.
    pub backend: String,
}

impl ExecutionResult {
    fn new(outcome: Outcome, shots: Option<u32>) -> Self {
        Self {
            outcome,
            shots,
            execution_time: Duration::ZERO,
            job_id: Uuid::new_v4().to_string(),
            backend: String::new(),
        }
    }

    /// Exact-mode result.
    pub fn exact(expectations: Vec<f64>) -> Self {
        Self::new(Outcome::Exact(expectations), None)
    }

    /// Sampled-mode result.
    pub fn sampled(counts: Counts, shots: u32) -> Self {
        Self::new(Outcome::Sampled(counts), Some(shots))
    }

    /// Set the execution time.
    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = elapsed;
        self
    }

    /// Set the producing executor's name.
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Sampled counts, if this is a sampled result.
    pub fn counts(&self) -> Option<&Counts> {
        match &self.outcome {
            Outcome::Sampled(counts) => Some(counts),
            Outcome::Exact(_) => None,
        }
    }

    /// Z expectations for qubits `0..num_qubits`, in either mode.
    ///
    /// Exact vectors shorter than `num_qubits` are padded with 0.0.
    pub fn expectation_values(&self, num_qubits: usize) -> Vec<f64> {
        match &self.outcome {
            Outcome::Exact(values) => (0..num_qubits)
                .map(|q| values.get(q).copied().unwrap_or(0.0))
                .collect(),
            Outcome::Sampled(counts) => counts.expectation_values(num_qubits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let mut counts = Counts::new();
        counts.insert("01", 3);
        counts.insert("01", 2);
        counts.insert("10", 5);
        assert_eq!(counts.get("01"), 5);
        assert_eq!(counts.get("11"), 0);
        assert_eq!(counts.total_shots(), 10);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_rightmost_char_is_qubit_zero() {
        // "01": qubit 0 = 1, qubit 1 = 0
        let counts = Counts::from_pairs([("01", 100)]);
        assert_eq!(counts.expectation_values(2), vec![-1.0, 1.0]);
    }

    #[test]
    fn test_expectation_mixed() {
        let counts = Counts::from_pairs([("00", 75), ("11", 25)]);
        let ev = counts.expectation_values(2);
        assert!((ev[0] - 0.5).abs() < 1e-12);
        assert!((ev[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_counts_default_to_zero() {
        let counts = Counts::new();
        assert_eq!(counts.expectation_values(3), vec![0.0, 0.0, 0.0]);
        assert!(counts.probabilities().is_empty());
    }

    #[test]
    fn test_zero_total_defaults_to_zero() {
        let counts = Counts::from_pairs([("1", 0)]);
        assert_eq!(counts.expectation_z(0), 0.0);
    }

    #[test]
    fn test_short_bitstring_reads_zero() {
        let counts = Counts::from_pairs([("1", 4)]);
        assert_eq!(counts.expectation_values(2), vec![-1.0, 1.0]);
    }

    #[test]
    fn test_probabilities_are_shot_fractions() {
        let counts = Counts::from_pairs([("00", 1), ("01", 3)]);
        let probs = counts.probabilities();
        assert_eq!(probs["00"], 0.25);
        assert_eq!(probs["01"], 0.75);
        assert!(Counts::from_pairs([("1", 0)]).probabilities().is_empty());
    }

    #[test]
    fn test_result_expectations_both_modes() {
        let exact = ExecutionResult::exact(vec![0.25]);
        assert_eq!(exact.expectation_values(2), vec![0.25, 0.0]);
        assert!(exact.counts().is_none());
        assert!(exact.shots.is_none());

        let sampled = ExecutionResult::sampled(Counts::from_pairs([("10", 8)]), 8)
            .with_backend("shots");
        assert_eq!(sampled.expectation_values(2), vec![1.0, -1.0]);
        assert_eq!(sampled.shots, Some(8));
        assert_eq!(sampled.backend, "shots");
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = ExecutionResult::exact(vec![]);
        let b = ExecutionResult::exact(vec![]);
        assert_ne!(a.job_id, b.job_id);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sampled_expectations_are_bounded(
                table in proptest::collection::btree_map("[01]{1,5}", 0u64..1000, 1..16)
            ) {
                let counts = Counts::from_pairs(table);
                for ev in counts.expectation_values(5) {
                    prop_assert!((-1.0..=1.0).contains(&ev));
                }
            }
        }
    }
}
