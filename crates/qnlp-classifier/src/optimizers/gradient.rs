//! Finite-difference gradient descent.

use rand::RngCore;

use super::{Objective, Optimizer};
use crate::error::QnlpResult;

/// Plain gradient descent on central-difference gradients.
///
/// Each step costs `2n` objective evaluations.
#[derive(Debug, Clone)]
pub struct GradientDescent {
    /// Step size.
    pub learning_rate: f64,
    /// Half-width of the difference stencil.
    pub epsilon: f64,
}

impl GradientDescent {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            epsilon: 1e-3,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Central-difference gradient of `objective` at `params`.
    pub fn gradient(&self, objective: &mut Objective<'_>, params: &[f64]) -> QnlpResult<Vec<f64>> {
        let mut shifted = params.to_vec();
        let mut grad = Vec::with_capacity(params.len());
        for i in 0..params.len() {
            shifted[i] = params[i] + self.epsilon;
            let f_plus = objective(&shifted)?;
            shifted[i] = params[i] - self.epsilon;
            let f_minus = objective(&shifted)?;
            shifted[i] = params[i];
            grad.push((f_plus - f_minus) / (2.0 * self.epsilon));
        }
        Ok(grad)
    }
}

impl Optimizer for GradientDescent {
    fn name(&self) -> &'static str {
        "gradient_descent"
    }

    fn step(
        &mut self,
        objective: &mut Objective<'_>,
        params: &[f64],
        _rng: &mut dyn RngCore,
    ) -> QnlpResult<Vec<f64>> {
        let grad = self.gradient(objective, params)?;
        Ok(params
            .iter()
            .zip(&grad)
            .map(|(x, g)| x - self.learning_rate * g)
            .collect())
    }

    fn reset(&mut self) {}
}
