//! Remote executor adapter for the QNLP classifier.
//!
//! Talks to a REST service that executes circuits in their JSON wire form.
//!
//! # Authentication
//!
//! A bearer token is obtained from a [`qnlp_hal::TokenProvider`] at connect
//! time. The default provider reads `QNLP_BACKEND_TOKEN`:
//!
//! ```bash
//! export QNLP_BACKEND_TOKEN="your-token"
//! ```
//!
//! # Protocol
//!
//! 1. `GET {endpoint}/session` returns a session id and the service limits.
//! 2. `POST {endpoint}/execute` with `{ "circuit": ..., "shots": N }` returns
//!    `{ "counts": {...} }` or `{ "expectations": [...] }`.
//!
//! # Example
//!
//! ```ignore
//! use qnlp_adapter_remote::RemoteExecutor;
//! use qnlp_hal::{BackendConfig, BackendKind, EnvTokenProvider};
//!
//! let config = BackendConfig::new("lab", BackendKind::Remote)
//!     .with_endpoint("https://qpu.example.org/api");
//! let executor = RemoteExecutor::connect(&config, &EnvTokenProvider::default()).await?;
//! ```

mod api;
mod error;
mod executor;

pub use api::{ExecuteRequest, ExecuteResponse, RemoteClient, SessionInfo};
pub use error::{RemoteError, RemoteResult};
pub use executor::{DEFAULT_REMOTE_QUBITS, DEFAULT_REMOTE_SHOTS, RemoteExecutor};
