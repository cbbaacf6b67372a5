//! Feature encodings.
//!
//! An [`Encoder`] maps a classical feature vector onto a prefix circuit over
//! the classifier's register:
//!
//! | Encoding    | Emitted operations                                        |
//! |-------------|-----------------------------------------------------------|
//! | `Amplitude` | one state preparation of the normalized, padded vector    |
//! | `Angle`     | `Ry(x_i)` on qubit i, plus `Rz(x_i)` when `angle_rz` is set |
//! | `Basis`     | `X` on qubit i when `x_i > 0.5`                            |
//! | `Hybrid`    | amplitude-encoded head followed by the configured tail     |
//!
//! Only the first `n_qubits` features are read by the angle and basis
//! encodings.

use std::fmt;
use std::str::FromStr;

use qnlp_ir::{Circuit, IrError, QubitId};
use serde::{Deserialize, Serialize};

use crate::error::{QnlpError, QnlpResult};

/// Smallest L2 norm accepted by amplitude encoding.
pub const NORM_FLOOR: f64 = 1e-10;

/// Feature encoding family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingType {
    #[default]
    Amplitude,
    Angle,
    Basis,
    Hybrid,
}

impl EncodingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingType::Amplitude => "amplitude",
            EncodingType::Angle => "angle",
            EncodingType::Basis => "basis",
            EncodingType::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for EncodingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodingType {
    type Err = QnlpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "amplitude" => Ok(EncodingType::Amplitude),
            "angle" => Ok(EncodingType::Angle),
            "basis" => Ok(EncodingType::Basis),
            "hybrid" => Ok(EncodingType::Hybrid),
            other => Err(QnlpError::Validation(format!(
                "unknown encoding type '{other}'"
            ))),
        }
    }
}

/// Encoding applied to the second half of a hybrid feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HybridTail {
    #[default]
    Angle,
    /// Prepares the tail over the whole register after the head is encoded.
    /// The preparation replaces the state, so the head has no influence on
    /// the output.
    Amplitude,
}

impl HybridTail {
    pub fn as_str(&self) -> &'static str {
        match self {
            HybridTail::Angle => "angle",
            HybridTail::Amplitude => "amplitude",
        }
    }

    fn encoding(self) -> EncodingType {
        match self {
            HybridTail::Angle => EncodingType::Angle,
            HybridTail::Amplitude => EncodingType::Amplitude,
        }
    }
}

impl FromStr for HybridTail {
    type Err = QnlpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "angle" => Ok(HybridTail::Angle),
            "amplitude" => Ok(HybridTail::Amplitude),
            other => Err(QnlpError::Validation(format!(
                "unknown hybrid tail '{other}'"
            ))),
        }
    }
}

/// Builds encoding circuits for one encoding family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Encoder {
    kind: EncodingType,
    angle_rz: bool,
    hybrid_tail: HybridTail,
}

impl Encoder {
    pub fn new(kind: EncodingType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Follow every `Ry` of the angle encoding with an `Rz` of the same value.
    pub fn with_angle_rz(mut self, enabled: bool) -> Self {
        self.angle_rz = enabled;
        self
    }

    /// Select the encoding used for the tail of a hybrid vector.
    pub fn with_hybrid_tail(mut self, tail: HybridTail) -> Self {
        self.hybrid_tail = tail;
        self
    }

    pub fn kind(&self) -> EncodingType {
        self.kind
    }

    pub fn angle_rz(&self) -> bool {
        self.angle_rz
    }

    pub fn hybrid_tail(&self) -> HybridTail {
        self.hybrid_tail
    }

    /// Encode `features` into a circuit over `n_qubits` qubits.
    pub fn encode(&self, features: &[f64], n_qubits: u32) -> QnlpResult<Circuit> {
        if n_qubits == 0 {
            return Err(QnlpError::encoding(
                "register must have at least one qubit",
            ));
        }
        let mut circuit = Circuit::new("encoding", n_qubits);
        self.emit(self.kind, features, &mut circuit)?;
        Ok(circuit)
    }

    fn emit(&self, kind: EncodingType, features: &[f64], circuit: &mut Circuit) -> QnlpResult<()> {
        check_features(features)?;
        let n_qubits = circuit.num_qubits();

        match kind {
            EncodingType::Amplitude => {
                let amplitudes = normalized_amplitudes(features, n_qubits)?;
                circuit
                    .state_preparation_all(amplitudes)
                    .map_err(|e| ir_error("amplitude state preparation rejected", e))?;
            }
            EncodingType::Angle => {
                for (i, &value) in features.iter().take(n_qubits as usize).enumerate() {
                    let q = QubitId(i as u32);
                    circuit
                        .ry(value, q)
                        .map_err(|e| ir_error("angle rotation rejected", e))?;
                    if self.angle_rz {
                        circuit
                            .rz(value, q)
                            .map_err(|e| ir_error("angle rotation rejected", e))?;
                    }
                }
            }
            EncodingType::Basis => {
                for (i, &value) in features.iter().take(n_qubits as usize).enumerate() {
                    if value > 0.5 {
                        circuit
                            .x(QubitId(i as u32))
                            .map_err(|e| ir_error("basis flip rejected", e))?;
                    }
                }
            }
            EncodingType::Hybrid => {
                let (head, tail) = features.split_at(features.len() / 2);
                self.emit(EncodingType::Amplitude, head, circuit)
                    .map_err(|e| e.with_context("hybrid head"))?;
                self.emit(self.hybrid_tail.encoding(), tail, circuit)
                    .map_err(|e| e.with_context("hybrid tail"))?;
            }
        }
        Ok(())
    }
}

fn check_features(features: &[f64]) -> QnlpResult<()> {
    if features.is_empty() {
        return Err(QnlpError::encoding("features cannot be empty"));
    }
    if features.iter().any(|v| !v.is_finite()) {
        return Err(QnlpError::encoding("features must be finite"));
    }
    if features.iter().all(|&v| v == 0.0) {
        return Err(QnlpError::encoding("features cannot be all zeros"));
    }
    Ok(())
}

/// L2-normalize `features` and zero-pad them to `2^n_qubits` entries.
fn normalized_amplitudes(features: &[f64], n_qubits: u32) -> QnlpResult<Vec<f64>> {
    let norm = features.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm < NORM_FLOOR {
        return Err(QnlpError::encoding(format!(
            "feature norm too close to zero ({norm:e})"
        )));
    }

    let dim = 1usize
        .checked_shl(n_qubits)
        .filter(|&d| d > 0)
        .ok_or_else(|| QnlpError::encoding(format!("{n_qubits} qubits exceed addressable state space")))?;
    if features.len() > dim {
        return Err(QnlpError::encoding(format!(
            "feature dimension {} exceeds state space of {dim}",
            features.len()
        )));
    }

    let mut amplitudes = vec![0.0; dim];
    for (slot, &value) in amplitudes.iter_mut().zip(features) {
        *slot = value / norm;
    }
    Ok(amplitudes)
}

fn ir_error(message: &str, err: IrError) -> QnlpError {
    QnlpError::Encoding {
        message: message.to_string(),
        source: Some(Box::new(err)),
    }
}
