//! Parameterized ansatz families.
//!
//! Each family consumes a flat parameter vector in a fixed walk order, so
//! identical inputs always produce identical circuits.
//!
//! | Family          | Parameters            | Layer layout                                  |
//! |-----------------|-----------------------|-----------------------------------------------|
//! | `Simple`        | `2n`                  | `Rx`, `Ry` per qubit (layers ignored)         |
//! | `Vqe`           | `3nL`                 | `U` per qubit, CX chain                       |
//! | `Qaoa`          | `2nL`                 | CX chain + `Rz` per qubit, then `Rx` per qubit |
//! | `Qnn`, `Custom` | `4nL` (+ `L*((n-1)/2)`) | `U` + `Rz` per qubit, `CRz` on even pairs   |
//!
//! The `CRz` angles of the QNN layout are read through an entangling cursor
//! that starts after the `4nL` rotation block. Positions past the end of the
//! vector read as `0.0`.

use std::fmt;
use std::str::FromStr;

use qnlp_ir::{Circuit, IrResult, QubitId};
use serde::{Deserialize, Serialize};

use crate::error::{QnlpError, QnlpResult};

/// Ansatz family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnsatzType {
    Simple,
    Vqe,
    Qaoa,
    #[default]
    Qnn,
    Custom,
}

impl AnsatzType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnsatzType::Simple => "simple",
            AnsatzType::Vqe => "vqe",
            AnsatzType::Qaoa => "qaoa",
            AnsatzType::Qnn => "qnn",
            AnsatzType::Custom => "custom",
        }
    }

    /// All families, in declaration order.
    pub fn all() -> [AnsatzType; 5] {
        [
            AnsatzType::Simple,
            AnsatzType::Vqe,
            AnsatzType::Qaoa,
            AnsatzType::Qnn,
            AnsatzType::Custom,
        ]
    }
}

impl fmt::Display for AnsatzType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnsatzType {
    type Err = QnlpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(AnsatzType::Simple),
            "vqe" => Ok(AnsatzType::Vqe),
            "qaoa" => Ok(AnsatzType::Qaoa),
            "qnn" => Ok(AnsatzType::Qnn),
            "custom" => Ok(AnsatzType::Custom),
            other => Err(QnlpError::Validation(format!(
                "unknown ansatz type '{other}'"
            ))),
        }
    }
}

/// Number of parameters consumed by the rotation blocks of a family.
pub fn parameter_count(kind: AnsatzType, n_qubits: usize, n_layers: usize) -> usize {
    match kind {
        AnsatzType::Simple => 2 * n_qubits,
        AnsatzType::Vqe => 3 * n_qubits * n_layers,
        AnsatzType::Qaoa => 2 * n_qubits * n_layers,
        AnsatzType::Qnn | AnsatzType::Custom => 4 * n_qubits * n_layers,
    }
}

/// A configured ansatz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ansatz {
    kind: AnsatzType,
    n_qubits: u32,
    n_layers: u32,
    entangling_parameters: bool,
}

impl Ansatz {
    pub fn new(kind: AnsatzType, n_qubits: u32, n_layers: u32) -> QnlpResult<Self> {
        if n_qubits == 0 {
            return Err(QnlpError::Validation(
                "ansatz needs at least one qubit".into(),
            ));
        }
        if n_layers == 0 {
            return Err(QnlpError::Validation(
                "ansatz needs at least one layer".into(),
            ));
        }
        Ok(Self {
            kind,
            n_qubits,
            n_layers,
            entangling_parameters: false,
        })
    }

    /// Give the QNN entanglers their own trainable angles.
    ///
    /// `L * floor((n-1)/2)` angles are appended after the rotations and read
    /// through one cursor that runs across all layers, one angle per even
    /// pair. An even register has more pairs than angles per layer, so the
    /// cursor passes the end early and the last entanglers get 0.0. With
    /// `n = 4, L = 2` both angles land in layer 0.
    ///
    /// Has no effect on the other families.
    pub fn with_entangling_parameters(mut self, enabled: bool) -> Self {
        self.entangling_parameters = enabled;
        self
    }

    pub fn kind(&self) -> AnsatzType {
        self.kind
    }

    pub fn n_qubits(&self) -> u32 {
        self.n_qubits
    }

    pub fn n_layers(&self) -> u32 {
        self.n_layers
    }

    pub fn entangling_parameters(&self) -> bool {
        self.entangling_parameters
    }

    /// Parameters consumed by the rotation blocks alone.
    pub fn rotation_count(&self) -> usize {
        parameter_count(self.kind, self.n_qubits as usize, self.n_layers as usize)
    }

    /// Length of the trainable parameter vector.
    pub fn parameter_count(&self) -> usize {
        self.rotation_count() + self.entangling_count()
    }

    fn entangling_count(&self) -> usize {
        match self.kind {
            AnsatzType::Qnn | AnsatzType::Custom if self.entangling_parameters => {
                (self.n_layers as usize) * ((self.n_qubits as usize).saturating_sub(1) / 2)
            }
            _ => 0,
        }
    }

    /// Bind `params` into a circuit.
    pub fn build(&self, params: &[f64]) -> QnlpResult<Circuit> {
        let needed = self.rotation_count();
        if params.len() < needed {
            return Err(QnlpError::circuit_build(format!(
                "{} ansatz needs {needed} parameters, got {}",
                self.kind,
                params.len()
            )));
        }

        let mut circuit = Circuit::new(format!("{}_ansatz", self.kind), self.n_qubits);
        let layout = match self.kind {
            AnsatzType::Simple => self.simple(&mut circuit, params),
            AnsatzType::Vqe => self.vqe(&mut circuit, params),
            AnsatzType::Qaoa => self.qaoa(&mut circuit, params),
            AnsatzType::Qnn | AnsatzType::Custom => self.qnn(&mut circuit, params),
        };
        layout.map_err(|e| QnlpError::from_ir(format!("{} layout rejected", self.kind), e))?;
        Ok(circuit)
    }

    fn qubits(&self) -> impl Iterator<Item = QubitId> {
        (0..self.n_qubits).map(QubitId)
    }

    fn cx_chain(&self, circuit: &mut Circuit) -> IrResult<()> {
        for i in 1..self.n_qubits {
            circuit.cx(QubitId(i - 1), QubitId(i))?;
        }
        Ok(())
    }

    fn simple(&self, circuit: &mut Circuit, p: &[f64]) -> IrResult<()> {
        for q in self.qubits() {
            let i = q.index();
            circuit.rx(p[2 * i], q)?;
            circuit.ry(p[2 * i + 1], q)?;
        }
        Ok(())
    }

    fn vqe(&self, circuit: &mut Circuit, p: &[f64]) -> IrResult<()> {
        let mut idx = 0;
        for _ in 0..self.n_layers {
            for q in self.qubits() {
                circuit.u(p[idx], p[idx + 1], p[idx + 2], q)?;
                idx += 3;
            }
            self.cx_chain(circuit)?;
        }
        Ok(())
    }

    fn qaoa(&self, circuit: &mut Circuit, p: &[f64]) -> IrResult<()> {
        let mut idx = 0;
        for _ in 0..self.n_layers {
            // cost block
            self.cx_chain(circuit)?;
            for q in self.qubits() {
                circuit.rz(p[idx], q)?;
                idx += 1;
            }
            // mixer block
            for q in self.qubits() {
                circuit.rx(p[idx], q)?;
                idx += 1;
            }
        }
        Ok(())
    }

    fn qnn(&self, circuit: &mut Circuit, p: &[f64]) -> IrResult<()> {
        let mut idx = 0;
        let mut cursor = self.rotation_count();
        for _ in 0..self.n_layers {
            for q in self.qubits() {
                circuit.u(p[idx], p[idx + 1], p[idx + 2], q)?;
                circuit.rz(p[idx + 3], q)?;
                idx += 4;
            }
            for control in (0..self.n_qubits.saturating_sub(1)).step_by(2) {
                let theta = if self.entangling_parameters {
                    p.get(cursor).copied().unwrap_or(0.0)
                } else {
                    0.0
                };
                cursor += 1;
                circuit.crz(theta, QubitId(control), QubitId(control + 1))?;
            }
        }
        Ok(())
    }
}
