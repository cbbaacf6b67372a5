//! Composes encoding prefixes with ansatz suffixes.

use qnlp_ir::Circuit;

use crate::ansatz::Ansatz;
use crate::encoding::Encoder;
use crate::error::{QnlpError, QnlpResult};

/// Builds the full classifier circuit for one feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBuilder {
    encoder: Encoder,
    ansatz: Ansatz,
}

impl CircuitBuilder {
    pub fn new(encoder: Encoder, ansatz: Ansatz) -> Self {
        Self { encoder, ansatz }
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn ansatz(&self) -> &Ansatz {
        &self.ansatz
    }

    pub fn n_qubits(&self) -> u32 {
        self.ansatz.n_qubits()
    }

    /// Encode `features` and append the ansatz bound to `params`.
    pub fn build(&self, features: &[f64], params: &[f64]) -> QnlpResult<Circuit> {
        let prefix = self
            .encoder
            .encode(features, self.n_qubits())
            .map_err(|e| e.with_context("encoding features"))?;
        let suffix = self
            .ansatz
            .build(params)
            .map_err(|e| e.with_context("building ansatz"))?;
        prefix
            .compose(&suffix)
            .map_err(|e| QnlpError::from_ir("composing circuit", e))
    }

    /// Build one circuit per row, stopping at the first failure.
    pub fn build_batch<R: AsRef<[f64]>>(&self, rows: &[R], params: &[f64]) -> QnlpResult<Vec<Circuit>> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                self.build(row.as_ref(), params)
                    .map_err(|e| e.with_context(&format!("row {i}")))
            })
            .collect()
    }
}
