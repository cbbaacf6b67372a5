//! High-level circuit builder API.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::dag::CircuitDag;
use crate::error::{IrError, IrResult};
use crate::gate::StandardGate;
use crate::instruction::{Instruction, InstructionKind, OpClass};
use crate::qubit::QubitId;

/// Tolerance on the L2 norm of a state preparation vector.
const STATE_NORM_TOLERANCE: f64 = 1e-9;

/// A quantum circuit over a fixed register.
///
/// Instructions are validated as they are appended and kept in program
/// order. Combining circuits never mutates either operand; see
/// [`Circuit::compose`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    /// Name of the circuit.
    name: String,
    /// Width of the qubit register.
    num_qubits: u32,
    /// Instructions in program order.
    instructions: Vec<Instruction>,
}

impl Circuit {
    /// Create a new empty circuit with `num_qubits` qubits.
    pub fn new(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            instructions: vec![],
        }
    }

    /// Validate and append an instruction.
    pub fn apply(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        self.check(&instruction)?;
        self.instructions.push(instruction);
        Ok(self)
    }

    fn check(&self, instruction: &Instruction) -> IrResult<()> {
        let gate_name = Some(instruction.name().to_string());

        match &instruction.kind {
            InstructionKind::Gate(gate) => {
                let expected = gate.num_qubits();
                let got = instruction.qubits.len() as u32;
                if expected != got {
                    return Err(IrError::QubitCountMismatch {
                        gate_name: gate.name().to_string(),
                        expected,
                        got,
                    });
                }
                if let Some(value) = gate.arguments().into_iter().find(|v| !v.is_finite()) {
                    return Err(IrError::NonFiniteArgument {
                        gate_name: gate.name().to_string(),
                        value,
                    });
                }
            }
            InstructionKind::StatePreparation { amplitudes } => {
                let width = instruction.qubits.len();
                if width == 0 {
                    return Err(IrError::InvalidStatePreparation(
                        "no target qubits".into(),
                    ));
                }
                if amplitudes.len() != 1usize << width {
                    return Err(IrError::InvalidStatePreparation(format!(
                        "{} amplitudes for {width} qubits (expected {})",
                        amplitudes.len(),
                        1usize << width
                    )));
                }
                if amplitudes.iter().any(|a| !a.is_finite()) {
                    return Err(IrError::InvalidStatePreparation(
                        "amplitudes must be finite".into(),
                    ));
                }
                let norm = amplitudes.iter().map(|a| a * a).sum::<f64>().sqrt();
                if (norm - 1.0).abs() > STATE_NORM_TOLERANCE {
                    return Err(IrError::InvalidStatePreparation(format!(
                        "amplitude vector has norm {norm}, expected 1"
                    )));
                }
            }
        }

        for &qubit in &instruction.qubits {
            if qubit.0 >= self.num_qubits {
                return Err(IrError::QubitNotFound {
                    qubit,
                    num_qubits: self.num_qubits,
                    gate_name: gate_name.clone(),
                });
            }
        }

        let mut seen = FxHashSet::default();
        for &qubit in &instruction.qubits {
            if !seen.insert(qubit) {
                return Err(IrError::DuplicateQubit {
                    qubit,
                    gate_name: gate_name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Re-check every instruction, e.g. after deserializing.
    pub fn validate(&self) -> IrResult<()> {
        self.instructions.iter().try_for_each(|inst| self.check(inst))
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(StandardGate::X, qubit))
    }

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(StandardGate::H, qubit))
    }

    /// Apply Rx rotation gate.
    pub fn rx(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(StandardGate::Rx(theta), qubit))
    }

    /// Apply Ry rotation gate.
    pub fn ry(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(StandardGate::Ry(theta), qubit))
    }

    /// Apply Rz rotation gate.
    pub fn rz(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(StandardGate::Rz(theta), qubit))
    }

    /// Apply universal U gate.
    pub fn u(&mut self, theta: f64, phi: f64, lambda: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::single_qubit_gate(
            StandardGate::U(theta, phi, lambda),
            qubit,
        ))
    }

    // =========================================================================
    // Two-qubit gates
    // =========================================================================

    /// Apply CNOT (CX) gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::two_qubit_gate(StandardGate::CX, control, target))
    }

    /// Apply controlled-Rz gate.
    pub fn crz(&mut self, theta: f64, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::two_qubit_gate(
            StandardGate::CRz(theta),
            control,
            target,
        ))
    }

    // =========================================================================
    // State preparation
    // =========================================================================

    /// Prepare the given qubits in a normalized real amplitude vector.
    pub fn state_preparation(
        &mut self,
        amplitudes: Vec<f64>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.apply(Instruction::state_preparation(amplitudes, qubits))
    }

    /// Prepare the whole register in a normalized real amplitude vector.
    pub fn state_preparation_all(&mut self, amplitudes: Vec<f64>) -> IrResult<&mut Self> {
        let qubits: Vec<_> = (0..self.num_qubits).map(QubitId).collect();
        self.state_preparation(amplitudes, qubits)
    }

    // =========================================================================
    // Composition and introspection
    // =========================================================================

    /// Return a new circuit running `self` followed by `other`.
    ///
    /// Both circuits must act on registers of the same width.
    pub fn compose(&self, other: &Circuit) -> IrResult<Circuit> {
        if other.num_qubits != self.num_qubits {
            return Err(IrError::RegisterMismatch {
                expected: self.num_qubits,
                got: other.num_qubits,
            });
        }
        let mut instructions = Vec::with_capacity(self.len() + other.len());
        instructions.extend_from_slice(&self.instructions);
        instructions.extend_from_slice(&other.instructions);
        Ok(Circuit {
            name: format!("{}+{}", self.name, other.name),
            num_qubits: self.num_qubits,
            instructions,
        })
    }

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Instructions in program order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the circuit has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Build the DAG view of this circuit.
    pub fn dag(&self) -> IrResult<CircuitDag> {
        CircuitDag::from_circuit(self)
    }

    /// Circuit depth (longest chain of operations sharing a qubit).
    pub fn depth(&self) -> IrResult<usize> {
        self.dag()?.depth()
    }

    /// Count of instructions per operation name.
    pub fn gate_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for inst in &self.instructions {
            *counts.entry(inst.name().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of instructions of a given operation class.
    pub fn count_class(&self, class: OpClass) -> usize {
        self.instructions
            .iter()
            .filter(|inst| inst.op_class() == class)
            .count()
    }
}
