//! Quantum gate types.

use serde::{Deserialize, Serialize};

/// Standard gates with bound numeric arguments.
///
/// Rotation angles are in radians. Every gate in a [`crate::Circuit`] is
/// fully bound; trainable values are substituted by the ansatz before the
/// circuit is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StandardGate {
    // Single-qubit gates
    /// Pauli-X (bit flip).
    X,
    /// Hadamard gate.
    H,
    /// Rotation around X axis.
    Rx(f64),
    /// Rotation around Y axis.
    Ry(f64),
    /// Rotation around Z axis.
    Rz(f64),
    /// Universal single-qubit gate U(θ, φ, λ).
    U(f64, f64, f64),

    // Two-qubit gates
    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled rotation around Z.
    CRz(f64),
}

impl StandardGate {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::X => "x",
            StandardGate::H => "h",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::U(_, _, _) => "u",
            StandardGate::CX => "cx",
            StandardGate::CRz(_) => "crz",
        }
    }

    /// Get the number of qubits this gate operates on.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            StandardGate::X
            | StandardGate::H
            | StandardGate::Rx(_)
            | StandardGate::Ry(_)
            | StandardGate::Rz(_)
            | StandardGate::U(_, _, _) => 1,

            StandardGate::CX | StandardGate::CRz(_) => 2,
        }
    }

    /// Bound arguments of this gate, in declaration order.
    pub fn arguments(&self) -> Vec<f64> {
        match self {
            StandardGate::Rx(t)
            | StandardGate::Ry(t)
            | StandardGate::Rz(t)
            | StandardGate::CRz(t) => vec![*t],
            StandardGate::U(theta, phi, lambda) => vec![*theta, *phi, *lambda],
            StandardGate::X | StandardGate::H | StandardGate::CX => vec![],
        }
    }

    /// Whether this gate acts on two qubits.
    #[inline]
    pub fn is_entangling(&self) -> bool {
        self.num_qubits() == 2
    }
}
