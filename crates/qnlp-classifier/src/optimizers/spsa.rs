//! SPSA (Simultaneous Perturbation Stochastic Approximation) optimizer.
//!
//! Estimates the gradient from two evaluations along a random Rademacher
//! direction, whatever the number of parameters. Suited to shot-noise
//! objectives.

use rand::{Rng, RngCore};

use super::{Objective, Optimizer};
use crate::error::QnlpResult;

/// SPSA optimizer with the standard gain sequences
/// `a_k = a / (k + 1)^alpha` and `c_k = c / (k + 1)^gamma`.
#[derive(Debug, Clone)]
pub struct Spsa {
    /// Initial step size for gradient estimation.
    pub a: f64,
    /// Perturbation size.
    pub c: f64,
    /// Learning rate decay parameter.
    pub alpha: f64,
    /// Perturbation decay parameter.
    pub gamma: f64,
    k: usize,
}

impl Default for Spsa {
    fn default() -> Self {
        Self {
            a: 0.1,
            c: 0.1,
            alpha: 0.602,
            gamma: 0.101,
            k: 0,
        }
    }
}

impl Spsa {
    /// Create a new SPSA optimizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step and perturbation gains.
    pub fn with_gains(mut self, a: f64, c: f64) -> Self {
        self.a = a;
        self.c = c;
        self
    }

    /// Set the decay exponents.
    pub fn with_decay(mut self, alpha: f64, gamma: f64) -> Self {
        self.alpha = alpha;
        self.gamma = gamma;
        self
    }

    /// Steps taken since the last reset.
    pub fn iteration(&self) -> usize {
        self.k
    }
}

impl Optimizer for Spsa {
    fn name(&self) -> &'static str {
        "spsa"
    }

    fn step(
        &mut self,
        objective: &mut Objective<'_>,
        params: &[f64],
        rng: &mut dyn RngCore,
    ) -> QnlpResult<Vec<f64>> {
        let k = (self.k + 1) as f64;
        let a_k = self.a / k.powf(self.alpha);
        let c_k = self.c / k.powf(self.gamma);

        let delta: Vec<f64> = (0..params.len())
            .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
            .collect();
        let x_plus: Vec<f64> = params.iter().zip(&delta).map(|(x, d)| x + c_k * d).collect();
        let x_minus: Vec<f64> = params.iter().zip(&delta).map(|(x, d)| x - c_k * d).collect();

        let f_plus = objective(&x_plus)?;
        let f_minus = objective(&x_minus)?;
        self.k += 1;

        let slope = (f_plus - f_minus) / (2.0 * c_k);
        Ok(params
            .iter()
            .zip(&delta)
            .map(|(x, d)| x - a_k * slope / d)
            .collect())
    }

    fn reset(&mut self) {
        self.k = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_spsa_simple() {
        let mut spsa = Spsa::new();
        let mut rng = StdRng::seed_from_u64(42);

        // Minimize x^2 + y^2
        let mut objective =
            |p: &[f64]| -> QnlpResult<f64> { Ok(p[0].powi(2) + p[1].powi(2)) };
        let result = spsa
            .minimize(&mut objective, vec![1.0, 1.0], 100, 0.0, &mut rng)
            .unwrap();

        assert!(result.optimal_value < 0.5);
        assert_eq!(spsa.iteration(), 100);
    }

    #[test]
    fn test_seeded_steps_repeat() {
        let mut objective =
            |p: &[f64]| -> QnlpResult<f64> { Ok(p.iter().map(|x| x.sin()).sum()) };

        fn run(objective: &mut Objective<'_>) -> Vec<f64> {
            let mut spsa = Spsa::new();
            let mut rng = StdRng::seed_from_u64(7);
            let first = spsa.step(objective, &[0.2, 0.4, 0.6], &mut rng).unwrap();
            spsa.step(objective, &first, &mut rng).unwrap()
        }

        assert_eq!(run(&mut objective), run(&mut objective));
    }

    #[test]
    fn test_reset_restarts_gain_schedule() {
        let mut spsa = Spsa::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut objective = |p: &[f64]| -> QnlpResult<f64> { Ok(p[0]) };
        spsa.step(&mut objective, &[0.0], &mut rng).unwrap();
        assert_eq!(spsa.iteration(), 1);
        spsa.reset();
        assert_eq!(spsa.iteration(), 0);
    }
}
