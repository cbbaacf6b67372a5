//! Circuit description for the QNLP variational classifier.
//!
//! A [`Circuit`] is an ordered list of validated [`Instruction`]s over a
//! fixed qubit register. Instructions are either bound [`StandardGate`]s or
//! a state preparation carrying a normalized real amplitude vector.
//!
//! # Bit ordering
//!
//! Qubit `i` is bit `i` of a computational basis index (little-endian).
//! When a basis index is rendered as a bitstring, qubit 0 is the rightmost
//! character.
//!
//! # Example
//!
//! ```rust
//! use qnlp_ir::{Circuit, QubitId};
//!
//! let mut circuit = Circuit::new("bell", 2);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//!
//! assert_eq!(circuit.num_qubits(), 2);
//! assert_eq!(circuit.depth().unwrap(), 2);
//! ```

pub mod circuit;
pub mod dag;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod qubit;

pub use circuit::Circuit;
pub use dag::{CircuitDag, DagNode, NodeIndex};
pub use error::{IrError, IrResult};
pub use gate::StandardGate;
pub use instruction::{Instruction, InstructionKind, OpClass};
pub use qubit::QubitId;
