//! Error types for the IR crate.

use crate::qubit::QubitId;
use thiserror::Error;

/// Errors that can occur while building or analysing a circuit.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Qubit lies outside the circuit register.
    #[error("Qubit {qubit} not found in circuit of {num_qubits} qubits{}", format_gate_context(.gate_name))]
    QubitNotFound {
        /// The qubit that was not found.
        qubit: QubitId,
        /// Register width of the circuit.
        num_qubits: u32,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Gate requires a different number of qubits.
    #[error("Gate '{gate_name}' requires {expected} qubits, got {got}")]
    QubitCountMismatch {
        /// Name of the gate.
        gate_name: String,
        /// Expected number of qubits.
        expected: u32,
        /// Actual number of qubits provided.
        got: u32,
    },

    /// Duplicate qubit in operation.
    #[error("Duplicate qubit {qubit} in operation{}", format_gate_context(.gate_name))]
    DuplicateQubit {
        /// The duplicate qubit.
        qubit: QubitId,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// State preparation vector does not match the targeted qubits.
    #[error("Invalid state preparation: {0}")]
    InvalidStatePreparation(String),

    /// Gate argument is NaN or infinite.
    #[error("Gate '{gate_name}' has non-finite argument {value}")]
    NonFiniteArgument {
        /// Name of the gate.
        gate_name: String,
        /// Offending value.
        value: f64,
    },

    /// Two circuits cannot be composed.
    #[error("Register mismatch: expected {expected} qubits, got {got}")]
    RegisterMismatch {
        /// Width of the receiving circuit.
        expected: u32,
        /// Width of the appended circuit.
        got: u32,
    },

    /// Invalid DAG structure.
    #[error("Invalid DAG structure: {0}")]
    InvalidDag(String),
}

#[allow(clippy::ref_option)]
fn format_gate_context(gate_name: &Option<String>) -> String {
    match gate_name {
        Some(name) => format!(" (gate: {name})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
