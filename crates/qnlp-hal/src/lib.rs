//! Executor abstraction for the QNLP variational classifier.
//!
//! This crate provides the boundary between the classifier and whatever runs
//! its circuits: in-process simulators or a remote service.
//!
//! # Overview
//!
//! - A common async [`Executor`] trait for circuit execution
//! - [`Capabilities`] describing register width, gate set and noise
//! - [`ExecutionResult`] carrying exact expectations or sampled [`Counts`]
//! - A [`Dispatcher`] that drives executors from synchronous code with
//!   timeouts, cancellation and bounded batch fan-out
//! - [`TokenProvider`]s for authenticated executors
//!
//! # Executors
//!
//! | Kind | Crate | Authentication |
//! |------|-------|----------------|
//! | `statevector` | `qnlp-adapter-sim` | None |
//! | `shot_sampling` | `qnlp-adapter-sim` | None |
//! | `remote` | `qnlp-adapter-remote` | `QNLP_BACKEND_TOKEN` env var |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use qnlp_hal::{DispatchOptions, Dispatcher};
//! use qnlp_adapter_sim::StatevectorExecutor;
//! use qnlp_ir::{Circuit, QubitId};
//!
//! let dispatcher = Dispatcher::new(
//!     Arc::new(StatevectorExecutor::new()),
//!     DispatchOptions::default(),
//! )?;
//!
//! let mut circuit = Circuit::new("flip", 1);
//! circuit.x(QubitId(0))?;
//!
//! let result = dispatcher.run(&circuit, None)?;
//! assert_eq!(result.expectation_values(1), vec![-1.0]);
//! ```

pub mod auth;
pub mod backend;
pub mod capability;
pub mod dispatch;
pub mod error;
pub mod result;

pub use auth::{DEFAULT_TOKEN_ENV, EnvTokenProvider, StaticTokenProvider, TokenProvider};
pub use backend::{BackendConfig, BackendKind, Executor, ValidationResult};
pub use capability::{Capabilities, GateSet, NoiseProfile};
pub use dispatch::{CancelToken, DispatchOptions, Dispatcher};
pub use error::{HalError, HalResult};
pub use result::{Counts, ExecutionResult, Outcome};
