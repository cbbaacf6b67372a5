//! Per-example loss functions.
//!
//! A target row is compared against the measured per-qubit expectations:
//! a single-element target is broadcast across every qubit, a longer target
//! is compared against the leading expectations.

use crate::error::{QnlpError, QnlpResult};

/// Loss between one prediction row and its target.
pub trait Loss: Send + Sync {
    fn name(&self) -> &'static str;

    fn loss(&self, predicted: &[f64], target: &[f64]) -> QnlpResult<f64>;
}

/// Mean squared error.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl Loss for MeanSquaredError {
    fn name(&self) -> &'static str {
        "mse"
    }

    fn loss(&self, predicted: &[f64], target: &[f64]) -> QnlpResult<f64> {
        mean_over_pairs(predicted, target, |d| d * d)
    }
}

/// Mean absolute error.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAbsoluteError;

impl Loss for MeanAbsoluteError {
    fn name(&self) -> &'static str {
        "mae"
    }

    fn loss(&self, predicted: &[f64], target: &[f64]) -> QnlpResult<f64> {
        mean_over_pairs(predicted, target, f64::abs)
    }
}

fn mean_over_pairs(predicted: &[f64], target: &[f64], f: impl Fn(f64) -> f64) -> QnlpResult<f64> {
    match target.len() {
        0 => Err(QnlpError::Validation("target row is empty".into())),
        _ if predicted.is_empty() => Err(QnlpError::Validation("prediction row is empty".into())),
        1 => {
            let t = target[0];
            Ok(predicted.iter().map(|p| f(p - t)).sum::<f64>() / predicted.len() as f64)
        }
        k if k > predicted.len() => Err(QnlpError::Validation(format!(
            "target has {k} entries but only {} expectations were measured",
            predicted.len()
        ))),
        k => Ok(predicted
            .iter()
            .zip(target)
            .map(|(p, t)| f(p - t))
            .sum::<f64>()
            / k as f64),
    }
}
