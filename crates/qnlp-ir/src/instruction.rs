//! Circuit instructions combining operations with operands.

use serde::{Deserialize, Serialize};

use crate::gate::StandardGate;
use crate::qubit::QubitId;

/// The kind of instruction in a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    /// A quantum gate operation.
    Gate(StandardGate),
    /// Prepare the targeted qubits in the given real amplitude vector.
    ///
    /// The vector has `2^k` entries for `k` targeted qubits and unit L2 norm.
    StatePreparation {
        /// Normalized amplitudes, indexed little-endian over the targets.
        amplitudes: Vec<f64>,
    },
}

/// Coarse operation class of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpClass {
    /// Register initialization from a classical vector.
    StatePreparation,
    /// Single-qubit gate or rotation.
    SingleQubit,
    /// Two-qubit entangling gate.
    Entangling,
}

/// A complete instruction with operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The kind of instruction.
    pub kind: InstructionKind,
    /// Qubits this instruction operates on.
    pub qubits: Vec<QubitId>,
}

impl Instruction {
    /// Create a gate instruction.
    pub fn gate(gate: StandardGate, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Gate(gate),
            qubits: qubits.into_iter().collect(),
        }
    }

    /// Create a single-qubit gate instruction.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    /// Create a two-qubit gate instruction.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    /// Create a state preparation over the given qubits.
    pub fn state_preparation(
        amplitudes: Vec<f64>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> Self {
        Self {
            kind: InstructionKind::StatePreparation { amplitudes },
            qubits: qubits.into_iter().collect(),
        }
    }

    /// Operation class of this instruction.
    pub fn op_class(&self) -> OpClass {
        match &self.kind {
            InstructionKind::StatePreparation { .. } => OpClass::StatePreparation,
            InstructionKind::Gate(g) if g.is_entangling() => OpClass::Entangling,
            InstructionKind::Gate(_) => OpClass::SingleQubit,
        }
    }

    /// Check if this is a gate instruction.
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(_))
    }

    /// Get the gate if this is a gate instruction.
    pub fn as_gate(&self) -> Option<&StandardGate> {
        match &self.kind {
            InstructionKind::Gate(g) => Some(g),
            InstructionKind::StatePreparation { .. } => None,
        }
    }

    /// Bound numeric arguments carried by this instruction.
    pub fn arguments(&self) -> Vec<f64> {
        match &self.kind {
            InstructionKind::Gate(g) => g.arguments(),
            InstructionKind::StatePreparation { amplitudes } => amplitudes.clone(),
        }
    }

    /// Get the name of the instruction.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Gate(g) => g.name(),
            InstructionKind::StatePreparation { .. } => "state_preparation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_instruction() {
        let inst = Instruction::single_qubit_gate(StandardGate::H, QubitId(0));
        assert!(inst.is_gate());
        assert_eq!(inst.qubits.len(), 1);
        assert_eq!(inst.name(), "h");
        assert_eq!(inst.op_class(), OpClass::SingleQubit);
    }

    #[test]
    fn test_entangling_class() {
        let inst = Instruction::two_qubit_gate(StandardGate::CRz(0.2), QubitId(0), QubitId(1));
        assert_eq!(inst.op_class(), OpClass::Entangling);
        assert_eq!(inst.arguments(), vec![0.2]);
    }

    #[test]
    fn test_state_preparation() {
        let inst = Instruction::state_preparation(vec![0.6, 0.8], [QubitId(0)]);
        assert!(!inst.is_gate());
        assert!(inst.as_gate().is_none());
        assert_eq!(inst.name(), "state_preparation");
        assert_eq!(inst.op_class(), OpClass::StatePreparation);
        assert_eq!(inst.arguments(), vec![0.6, 0.8]);
    }
}
