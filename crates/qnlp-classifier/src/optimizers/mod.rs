//! Classical optimizers driving the variational parameters.
//!
//! Optimizers are step-based: the training loop owns the parameter vector
//! and asks for one candidate at a time through [`Optimizer::step`].
//! [`Optimizer::minimize`] runs the same loop standalone.

mod cobyla;
mod gradient;
mod spsa;

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

pub use cobyla::Cobyla;
pub use gradient::GradientDescent;
pub use spsa::Spsa;

use crate::error::{QnlpError, QnlpResult};

/// Objective evaluated by an optimizer.
pub type Objective<'a> = dyn FnMut(&[f64]) -> QnlpResult<f64> + 'a;

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Optimal parameter values.
    pub optimal_params: Vec<f64>,
    /// Optimal objective value.
    pub optimal_value: f64,
    /// Number of function evaluations.
    pub num_evaluations: usize,
    /// Number of iterations.
    pub num_iterations: usize,
    /// History of objective values.
    pub history: Vec<f64>,
    /// Whether the optimization converged.
    pub converged: bool,
}

/// A classical optimizer.
pub trait Optimizer: Send {
    fn name(&self) -> &'static str;

    /// Propose the next parameter vector from `params`.
    fn step(
        &mut self,
        objective: &mut Objective<'_>,
        params: &[f64],
        rng: &mut dyn RngCore,
    ) -> QnlpResult<Vec<f64>>;

    /// Drop any state carried between steps.
    fn reset(&mut self);

    /// The objective passed to the next `step` differs from the previous
    /// one (a new mini-batch). Cached objective values must be discarded.
    fn objective_changed(&mut self) {}

    /// Run `step` until the objective changes by less than `tolerance`.
    fn minimize(
        &mut self,
        objective: &mut Objective<'_>,
        initial_params: Vec<f64>,
        max_iterations: usize,
        tolerance: f64,
        rng: &mut dyn RngCore,
    ) -> QnlpResult<OptimizationResult> {
        self.reset();

        let mut num_evaluations = 0usize;
        let mut counted = |p: &[f64]| {
            num_evaluations += 1;
            objective(p)
        };

        let mut params = initial_params;
        let mut value = counted(&params)?;
        let mut history = vec![value];
        let mut converged = false;
        let mut num_iterations = 0;

        for _ in 0..max_iterations {
            let next = self.step(&mut counted, &params, rng)?;
            let next_value = counted(&next)?;
            num_iterations += 1;
            history.push(next_value);

            let delta = (next_value - value).abs();
            params = next;
            value = next_value;
            if delta < tolerance {
                converged = true;
                break;
            }
        }

        Ok(OptimizationResult {
            optimal_params: params,
            optimal_value: value,
            num_evaluations,
            num_iterations,
            history,
            converged,
        })
    }
}

fn default_rhobeg() -> f64 {
    0.5
}

fn default_rhoend() -> f64 {
    1e-4
}

fn default_tol() -> f64 {
    1e-6
}

fn default_spsa_a() -> f64 {
    0.1
}

fn default_spsa_c() -> f64 {
    0.1
}

fn default_alpha() -> f64 {
    0.602
}

fn default_gamma() -> f64 {
    0.101
}

fn default_epsilon() -> f64 {
    1e-3
}

/// Serializable optimizer selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Cobyla {
        #[serde(default = "default_rhobeg")]
        rhobeg: f64,
        #[serde(default = "default_rhoend")]
        rhoend: f64,
        #[serde(default = "default_tol")]
        tol: f64,
    },
    Spsa {
        #[serde(default = "default_spsa_a")]
        a: f64,
        #[serde(default = "default_spsa_c")]
        c: f64,
        #[serde(default = "default_alpha")]
        alpha: f64,
        #[serde(default = "default_gamma")]
        gamma: f64,
    },
    /// Central-difference gradient descent. The step size is the
    /// classifier's `learning_rate`.
    GradientDescent {
        #[serde(default = "default_epsilon")]
        epsilon: f64,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::cobyla()
    }
}

impl OptimizerConfig {
    pub fn cobyla() -> Self {
        OptimizerConfig::Cobyla {
            rhobeg: default_rhobeg(),
            rhoend: default_rhoend(),
            tol: default_tol(),
        }
    }

    pub fn spsa() -> Self {
        OptimizerConfig::Spsa {
            a: default_spsa_a(),
            c: default_spsa_c(),
            alpha: default_alpha(),
            gamma: default_gamma(),
        }
    }

    pub fn gradient_descent() -> Self {
        OptimizerConfig::GradientDescent {
            epsilon: default_epsilon(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizerConfig::Cobyla { .. } => "cobyla",
            OptimizerConfig::Spsa { .. } => "spsa",
            OptimizerConfig::GradientDescent { .. } => "gradient_descent",
        }
    }

    /// Check that every coefficient is finite and positive.
    pub fn validate(&self) -> Result<(), String> {
        let fields: Vec<(&str, f64)> = match *self {
            OptimizerConfig::Cobyla { rhobeg, rhoend, tol } => {
                if rhoend > rhobeg {
                    return Err(format!(
                        "cobyla rhoend ({rhoend}) must not exceed rhobeg ({rhobeg})"
                    ));
                }
                vec![("rhobeg", rhobeg), ("rhoend", rhoend), ("tol", tol)]
            }
            OptimizerConfig::Spsa { a, c, alpha, gamma } => {
                vec![("a", a), ("c", c), ("alpha", alpha), ("gamma", gamma)]
            }
            OptimizerConfig::GradientDescent { epsilon } => vec![("epsilon", epsilon)],
        };
        for (field, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!(
                    "{} {field} must be positive and finite, got {value}",
                    self.name()
                ));
            }
        }
        Ok(())
    }

    /// Instantiate the optimizer.
    pub fn build(&self, learning_rate: f64) -> Box<dyn Optimizer> {
        match *self {
            OptimizerConfig::Cobyla { rhobeg, rhoend, tol } => {
                Box::new(Cobyla::new().with_trust_region(rhobeg, rhoend).with_tol(tol))
            }
            OptimizerConfig::Spsa { a, c, alpha, gamma } => {
                Box::new(Spsa::new().with_gains(a, c).with_decay(alpha, gamma))
            }
            OptimizerConfig::GradientDescent { epsilon } => {
                Box::new(GradientDescent::new(learning_rate).with_epsilon(epsilon))
            }
        }
    }
}

impl fmt::Display for OptimizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OptimizerConfig {
    type Err = QnlpError;

    /// Parse an optimizer name into its default configuration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "cobyla" => Ok(Self::cobyla()),
            "spsa" => Ok(Self::spsa()),
            "gradient_descent" | "gd" => Ok(Self::gradient_descent()),
            other => Err(QnlpError::Validation(format!(
                "unknown optimizer '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_config_round_trips_through_json() {
        let config = OptimizerConfig::Spsa {
            a: 0.2,
            c: 0.05,
            alpha: 0.602,
            gamma: 0.101,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["type"], "spsa");
        let back: OptimizerConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: OptimizerConfig =
            serde_json::from_str(r#"{"type": "cobyla", "rhobeg": 0.25}"#).unwrap();
        assert_eq!(
            config,
            OptimizerConfig::Cobyla {
                rhobeg: 0.25,
                rhoend: 1e-4,
                tol: 1e-6
            }
        );
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        assert!(OptimizerConfig::GradientDescent { epsilon: 0.0 }.validate().is_err());
        assert!(OptimizerConfig::Cobyla {
            rhobeg: 0.1,
            rhoend: 0.5,
            tol: 1e-6
        }
        .validate()
        .is_err());
        assert!(OptimizerConfig::spsa().validate().is_ok());
    }

    #[test]
    fn test_names_parse() {
        for config in [
            OptimizerConfig::cobyla(),
            OptimizerConfig::spsa(),
            OptimizerConfig::gradient_descent(),
        ] {
            assert_eq!(config.name().parse::<OptimizerConfig>().unwrap(), config);
            assert_eq!(config.build(0.1).name(), config.name());
        }
        assert!("adam".parse::<OptimizerConfig>().is_err());
    }

    #[test]
    fn test_minimize_propagates_objective_errors() {
        let mut optimizer = OptimizerConfig::gradient_descent().build(0.1);
        let mut rng = StdRng::seed_from_u64(3);
        let mut calls = 0;
        let mut objective = |_: &[f64]| {
            calls += 1;
            if calls > 2 {
                Err(QnlpError::Validation("boom".into()))
            } else {
                Ok(1.0)
            }
        };
        let err = optimizer
            .minimize(&mut objective, vec![0.0], 10, 1e-9, &mut rng)
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: boom");
    }
}
