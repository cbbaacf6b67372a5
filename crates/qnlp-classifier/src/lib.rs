//! Variational quantum circuit classifier for QNLP feature vectors.
//!
//! Each feature vector is encoded into a state-preparation circuit, followed
//! by a parameterized ansatz. Per-qubit Z expectations are the model output,
//! and a classical optimizer tunes the ansatz parameters against a loss.
//!
//! # Overview
//!
//! - [`Encoder`]: amplitude, angle, basis and hybrid feature encodings
//! - [`Ansatz`]: simple, VQE, QAOA, QNN and custom parameterized layers
//! - [`CircuitBuilder`]: encoding composed with the ansatz
//! - [`VariationalClassifier`]: fit, predict, score and hyperparameter access
//! - [`optimizers`]: COBYLA-style, SPSA and finite-difference gradient descent
//! - [`MetricsCollector`]: fidelity, depth, noise and entanglement snapshots
//!
//! Circuits run through a [`qnlp_hal::Dispatcher`], so the same model trains
//! on the exact statevector executor, the shot sampler or a remote service.
//!
//! # Example
//!
//! ```ignore
//! use qnlp_classifier::{ClassifierConfig, VariationalClassifier};
//!
//! let config = ClassifierConfig {
//!     n_qubits: 2,
//!     seed: Some(7),
//!     ..ClassifierConfig::default()
//! };
//! let mut model = VariationalClassifier::new(config)?;
//!
//! let x = vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 0.0, 0.0, 1.0]];
//! let y = vec![vec![1.0], vec![-1.0]];
//! model.fit(&x, &y)?;
//!
//! let expectations = model.predict(&x)?;
//! ```

pub mod ansatz;
pub mod builder;
pub mod config;
pub mod encoding;
pub mod error;
pub mod executor;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod optimizers;

pub use ansatz::{Ansatz, AnsatzType, parameter_count};
pub use builder::CircuitBuilder;
pub use config::{BackendSettings, ClassifierConfig, MAX_QUBITS};
pub use encoding::{Encoder, EncodingType, HybridTail, NORM_FLOOR};
pub use error::{ErrorKind, QnlpError, QnlpResult};
pub use loss::{Loss, MeanAbsoluteError, MeanSquaredError};
pub use metrics::{CircuitMetrics, MetricSource, MetricsCollector};
pub use model::{LABEL_THRESHOLD, TrainingState, VariationalClassifier};
pub use optimizers::{Cobyla, GradientDescent, Optimizer, OptimizerConfig, Spsa};
