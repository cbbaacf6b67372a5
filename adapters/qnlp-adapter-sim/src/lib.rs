//! Local statevector simulators for the QNLP classifier.
//!
//! Two executors share one engine:
//!
//! - [`StatevectorExecutor`]: exact ⟨Z⟩ per qubit, plus statevector access
//! - [`ShotExecutor`]: measurement counts sampled from the final state,
//!   seedable for reproducible runs
//!
//! # Performance
//!
//! | Qubits | Memory | Simulation Speed |
//! |--------|--------|------------------|
//! | 10 | ~16 KB | Instant |
//! | 15 | ~512 KB | Fast |
//! | 20 | ~16 MB | Moderate |
//!
//! # Example
//!
//! ```ignore
//! use qnlp_adapter_sim::ShotExecutor;
//! use qnlp_hal::Executor;
//! use qnlp_ir::{Circuit, QubitId};
//!
//! let executor = ShotExecutor::with_seed(42);
//! let mut circuit = Circuit::new("bell", 2);
//! circuit.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?;
//!
//! let result = executor.execute(&circuit, Some(1000)).await?;
//! println!("Results: {:?}", result.counts());
//! ```

mod simulator;
mod statevector;

pub use simulator::{
    DEFAULT_MAX_QUBITS, DEFAULT_SHOTS, ShotExecutor, StatevectorExecutor, simulate,
};
pub use statevector::Statevector;
