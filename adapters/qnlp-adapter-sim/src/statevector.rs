//! Statevector simulation engine.
//!
//! Qubit `i` is bit `i` of the basis index. Bitstrings render the basis
//! index most-significant first, so qubit 0 is the rightmost character.

use num_complex::Complex64;
use rand::Rng;

use qnlp_hal::{Counts, HalError, HalResult};
use qnlp_ir::{Instruction, InstructionKind, StandardGate};

/// A statevector representing a quantum state.
#[derive(Debug, Clone)]
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    /// Number of qubits.
    num_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let size = 1 << num_qubits;
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); size];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// The state amplitudes.
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Consume the statevector, returning its amplitudes.
    pub fn into_amplitudes(self) -> Vec<Complex64> {
        self.amplitudes
    }

    /// Apply an instruction to the statevector.
    pub fn apply(&mut self, instruction: &Instruction) -> HalResult<()> {
        let qubits: Vec<usize> = instruction.qubits.iter().map(|q| q.index()).collect();
        match &instruction.kind {
            InstructionKind::Gate(gate) => {
                self.apply_gate(gate, &qubits);
                Ok(())
            }
            InstructionKind::StatePreparation { amplitudes } => {
                if qubits.len() != self.num_qubits
                    || qubits.iter().enumerate().any(|(i, &q)| i != q)
                {
                    return Err(HalError::Unsupported(format!(
                        "state preparation on {} of {} qubits",
                        qubits.len(),
                        self.num_qubits
                    )));
                }
                self.initialize(amplitudes)
            }
        }
    }

    /// Overwrite the register with real amplitudes.
    pub fn initialize(&mut self, amplitudes: &[f64]) -> HalResult<()> {
        if amplitudes.len() != self.amplitudes.len() {
            return Err(HalError::InvalidCircuit(format!(
                "state preparation has {} amplitudes, register needs {}",
                amplitudes.len(),
                self.amplitudes.len()
            )));
        }
        for (slot, &a) in self.amplitudes.iter_mut().zip(amplitudes) {
            *slot = Complex64::new(a, 0.0);
        }
        Ok(())
    }

    fn apply_gate(&mut self, gate: &StandardGate, qubits: &[usize]) {
        match *gate {
            StandardGate::X => self.apply_x(qubits[0]),
            StandardGate::H => self.apply_h(qubits[0]),
            StandardGate::Rx(theta) => self.apply_rx(qubits[0], theta),
            StandardGate::Ry(theta) => self.apply_ry(qubits[0], theta),
            StandardGate::Rz(theta) => self.apply_rz(qubits[0], theta),
            StandardGate::U(theta, phi, lambda) => self.apply_u(qubits[0], theta, phi, lambda),
            StandardGate::CX => self.apply_cx(qubits[0], qubits[1]),
            StandardGate::CRz(theta) => self.apply_crz(qubits[0], qubits[1], theta),
        }
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    fn apply_x(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                self.amplitudes.swap(i, i | mask);
            }
        }
    }

    fn apply_h(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        let sqrt2_inv = std::f64::consts::FRAC_1_SQRT_2;
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let (a, b) = (self.amplitudes[i], self.amplitudes[j]);
                self.amplitudes[i] = sqrt2_inv * (a + b);
                self.amplitudes[j] = sqrt2_inv * (a - b);
            }
        }
    }

    fn apply_rx(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let (s, c) = (theta / 2.0).sin_cos();
        let neg_i_s = Complex64::new(0.0, -s);
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let (a, b) = (self.amplitudes[i], self.amplitudes[j]);
                self.amplitudes[i] = c * a + neg_i_s * b;
                self.amplitudes[j] = neg_i_s * a + c * b;
            }
        }
    }

    fn apply_ry(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let (s, c) = (theta / 2.0).sin_cos();
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let (a, b) = (self.amplitudes[i], self.amplitudes[j]);
                self.amplitudes[i] = c * a - s * b;
                self.amplitudes[j] = s * a + c * b;
            }
        }
    }

    fn apply_rz(&mut self, qubit: usize, theta: f64) {
        self.phase_z_where(0, 1 << qubit, theta);
    }

    fn apply_u(&mut self, qubit: usize, theta: f64, phi: f64, lambda: f64) {
        let mask = 1 << qubit;
        let (s, c) = (theta / 2.0).sin_cos();
        let e_il = Complex64::from_polar(1.0, lambda);
        let e_ip = Complex64::from_polar(1.0, phi);
        let e_ipl = Complex64::from_polar(1.0, phi + lambda);
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let (a, b) = (self.amplitudes[i], self.amplitudes[j]);
                self.amplitudes[i] = c * a - e_il * s * b;
                self.amplitudes[j] = e_ip * s * a + e_ipl * c * b;
            }
        }
    }

    // =========================================================================
    // Two-qubit gates
    // =========================================================================

    fn apply_cx(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..self.amplitudes.len() {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                self.amplitudes.swap(i, i | tgt_mask);
            }
        }
    }

    fn apply_crz(&mut self, control: usize, target: usize, theta: f64) {
        self.phase_z_where(1 << control, 1 << target, theta);
    }

    /// Rz(θ) on `tgt_mask` for basis states where every `ctrl_mask` bit is set.
    fn phase_z_where(&mut self, ctrl_mask: usize, tgt_mask: usize, theta: f64) {
        let phase_0 = Complex64::from_polar(1.0, -theta / 2.0);
        let phase_1 = Complex64::from_polar(1.0, theta / 2.0);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if i & ctrl_mask == ctrl_mask {
                *amp *= if i & tgt_mask == 0 { phase_0 } else { phase_1 };
            }
        }
    }

    // =========================================================================
    // Readout
    // =========================================================================

    /// Probability of each basis state.
    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(Complex64::norm_sqr).collect()
    }

    /// Exact ⟨Z⟩ on one qubit.
    pub fn expectation_z(&self, qubit: usize) -> f64 {
        let mask = 1 << qubit;
        self.amplitudes
            .iter()
            .enumerate()
            .map(|(i, amp)| {
                let p = amp.norm_sqr();
                if i & mask == 0 { p } else { -p }
            })
            .sum()
    }

    /// Exact ⟨Z⟩ on every qubit, qubit 0 first.
    pub fn expectation_values(&self) -> Vec<f64> {
        (0..self.num_qubits).map(|q| self.expectation_z(q)).collect()
    }

    /// Sample a measurement outcome.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let cumulative = self.cumulative();
        sample_index(&cumulative, rng)
    }

    /// Sample `shots` measurements into counts.
    pub fn sample_counts<R: Rng + ?Sized>(&self, shots: u32, rng: &mut R) -> Counts {
        let cumulative = self.cumulative();
        let mut tally = vec![0u64; self.amplitudes.len()];
        for _ in 0..shots {
            tally[sample_index(&cumulative, rng)] += 1;
        }
        Counts::from_pairs(
            tally
                .into_iter()
                .enumerate()
                .filter(|&(_, n)| n > 0)
                .map(|(outcome, n)| (self.outcome_to_bitstring(outcome), n)),
        )
    }

    /// Convert a measurement outcome to its bitstring.
    pub fn outcome_to_bitstring(&self, outcome: usize) -> String {
        format!("{:0width$b}", outcome, width = self.num_qubits)
    }

    fn cumulative(&self) -> Vec<f64> {
        self.amplitudes
            .iter()
            .scan(0.0, |acc, amp| {
                *acc += amp.norm_sqr();
                Some(*acc)
            })
            .collect()
    }
}

fn sample_index<R: Rng + ?Sized>(cumulative: &[f64], rng: &mut R) -> usize {
    let total = cumulative.last().copied().unwrap_or(0.0);
    let r: f64 = rng.gen_range(0.0..1.0) * total;
    cumulative
        .partition_point(|&c| c <= r)
        .min(cumulative.len().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnlp_ir::QubitId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::f64::consts::PI;

    fn approx_eq(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-10
    }

    #[test]
    fn test_initial_state() {
        let sv = Statevector::new(2);
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(1.0, 0.0)));
        assert!(sv.amplitudes[1..].iter().all(|a| approx_eq(*a, Complex64::new(0.0, 0.0))));
    }

    #[test]
    fn test_hadamard() {
        let mut sv = Statevector::new(1);
        sv.apply_h(0);

        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(sqrt2_inv, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(sqrt2_inv, 0.0)));
    }

    #[test]
    fn test_bell_state() {
        let mut sv = Statevector::new(2);
        sv.apply_h(0);
        sv.apply_cx(0, 1);

        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(sqrt2_inv, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[2], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(sqrt2_inv, 0.0)));
    }

    #[test]
    fn test_x_flips_expectation() {
        let mut sv = Statevector::new(2);
        sv.apply_x(1);
        assert!((sv.expectation_z(0) - 1.0).abs() < 1e-12);
        assert!((sv.expectation_z(1) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ry_expectation() {
        let mut sv = Statevector::new(1);
        sv.apply_ry(0, PI / 3.0);
        assert!((sv.expectation_z(0) - (PI / 3.0).cos()).abs() < 1e-12);
    }

    #[test]
    fn test_rx_pi_is_x_up_to_phase() {
        let mut sv = Statevector::new(1);
        sv.apply_rx(0, PI);
        assert!(sv.amplitudes[0].norm() < 1e-12);
        assert!((sv.amplitudes[1].norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_u_matches_ry() {
        let mut a = Statevector::new(1);
        let mut b = Statevector::new(1);
        a.apply_u(0, 0.7, 0.0, 0.0);
        b.apply_ry(0, 0.7);
        for (x, y) in a.amplitudes.iter().zip(&b.amplitudes) {
            assert!(approx_eq(*x, *y));
        }
    }

    #[test]
    fn test_crz_respects_control() {
        let mut off = Statevector::new(2);
        off.apply_h(1);
        let before = off.amplitudes.clone();
        off.apply_crz(0, 1, PI);
        for (x, y) in off.amplitudes.iter().zip(&before) {
            assert!(approx_eq(*x, *y));
        }
    }

    #[test]
    fn test_crz_preserves_probabilities() {
        let mut sv = Statevector::new(2);
        sv.apply_h(0);
        sv.apply_h(1);
        let before = sv.probabilities();
        sv.apply_crz(0, 1, 1.3);
        for (p, q) in before.iter().zip(sv.probabilities()) {
            assert!((p - q).abs() < 1e-12);
        }
    }

    #[test]
    fn test_state_preparation() {
        let mut sv = Statevector::new(2);
        let half = 0.5;
        let inst = Instruction::state_preparation(
            vec![half, half, half, half],
            [QubitId(0), QubitId(1)],
        );
        sv.apply(&inst).unwrap();
        assert!(sv.probabilities().iter().all(|p| (p - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_partial_state_preparation_unsupported() {
        let mut sv = Statevector::new(2);
        let inst = Instruction::state_preparation(vec![0.0, 1.0], [QubitId(1)]);
        assert!(matches!(sv.apply(&inst), Err(HalError::Unsupported(_))));
    }

    #[test]
    fn test_bitstring_qubit_zero_rightmost() {
        let sv = Statevector::new(3);
        assert_eq!(sv.outcome_to_bitstring(0b001), "001");
        assert_eq!(sv.outcome_to_bitstring(0b110), "110");
    }

    #[test]
    fn test_sample_deterministic() {
        let mut sv = Statevector::new(1);
        sv.apply_x(0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(sv.sample(&mut rng), 1);
        }
    }

    #[test]
    fn test_sample_counts_match_expectation_sign() {
        let mut sv = Statevector::new(2);
        sv.apply_x(0);
        let mut rng = StdRng::seed_from_u64(11);
        let counts = sv.sample_counts(200, &mut rng);
        assert_eq!(counts.get("01"), 200);
        assert_eq!(counts.expectation_values(2), vec![-1.0, 1.0]);
    }
}
