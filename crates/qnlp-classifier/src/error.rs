//! Error types for the classifier.

use std::error::Error as StdError;
use std::fmt;

use qnlp_hal::HalError;
use qnlp_ir::IrError;
use thiserror::Error;

/// Boxed cause attached to encoding and circuit-build failures.
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by the classifier.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QnlpError {
    /// Caller supplied inconsistent arguments or configuration.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A feature vector could not be turned into an encoding circuit.
    #[error("Encoding error: {message}")]
    Encoding {
        /// Description of the failure.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<BoxedCause>,
    },

    /// The ansatz or the composed circuit could not be built.
    #[error("Circuit build error: {message}")]
    CircuitBuild {
        /// Description of the failure.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<BoxedCause>,
    },

    /// The executor could not be created or connected.
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<HalError>,
    },

    /// A circuit failed to execute.
    #[error("Execution error: {message}")]
    Execution {
        /// Description of the failure.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<HalError>,
    },

    /// Training failed.
    #[error("Optimization error: {message}")]
    Optimization {
        /// Description of the failure.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<Box<QnlpError>>,
    },

    /// An operation needs a fitted model.
    #[error("Model not fitted: {0}")]
    NotFitted(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Stable classification of a [`QnlpError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Encoding,
    CircuitBuild,
    Backend,
    Execution,
    Optimization,
    NotFitted,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Encoding => "encoding",
            ErrorKind::CircuitBuild => "circuit_build",
            ErrorKind::Backend => "backend",
            ErrorKind::Execution => "execution",
            ErrorKind::Optimization => "optimization",
            ErrorKind::NotFitted => "not_fitted",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

impl QnlpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QnlpError::Validation(_) => ErrorKind::Validation,
            QnlpError::Encoding { .. } => ErrorKind::Encoding,
            QnlpError::CircuitBuild { .. } => ErrorKind::CircuitBuild,
            QnlpError::Backend { .. } => ErrorKind::Backend,
            QnlpError::Execution { .. } => ErrorKind::Execution,
            QnlpError::Optimization { .. } => ErrorKind::Optimization,
            QnlpError::NotFitted(_) => ErrorKind::NotFitted,
            QnlpError::Config(_) => ErrorKind::Config,
        }
    }

    /// Encoding failure without an underlying cause.
    pub fn encoding(message: impl Into<String>) -> Self {
        QnlpError::Encoding {
            message: message.into(),
            source: None,
        }
    }

    /// Circuit-build failure without an underlying cause.
    pub fn circuit_build(message: impl Into<String>) -> Self {
        QnlpError::CircuitBuild {
            message: message.into(),
            source: None,
        }
    }

    /// Circuit-build failure raised by the IR.
    pub(crate) fn from_ir(message: impl Into<String>, err: IrError) -> Self {
        QnlpError::CircuitBuild {
            message: message.into(),
            source: Some(Box::new(err)),
        }
    }

    pub(crate) fn backend(message: impl Into<String>, err: HalError) -> Self {
        QnlpError::Backend {
            message: message.into(),
            source: Some(err),
        }
    }

    pub(crate) fn execution(message: impl Into<String>, err: HalError) -> Self {
        QnlpError::Execution {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Wrap `cause` as a training failure.
    pub fn optimization(message: impl Into<String>, cause: QnlpError) -> Self {
        QnlpError::Optimization {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Prefix the message with `context`. The kind and the cause are kept.
    #[must_use]
    pub fn with_context(self, context: &str) -> Self {
        let prefix = |message: String| format!("{context}: {message}");
        match self {
            QnlpError::Validation(m) => QnlpError::Validation(prefix(m)),
            QnlpError::Encoding { message, source } => QnlpError::Encoding {
                message: prefix(message),
                source,
            },
            QnlpError::CircuitBuild { message, source } => QnlpError::CircuitBuild {
                message: prefix(message),
                source,
            },
            QnlpError::Backend { message, source } => QnlpError::Backend {
                message: prefix(message),
                source,
            },
            QnlpError::Execution { message, source } => QnlpError::Execution {
                message: prefix(message),
                source,
            },
            QnlpError::Optimization { message, source } => QnlpError::Optimization {
                message: prefix(message),
                source,
            },
            QnlpError::NotFitted(m) => QnlpError::NotFitted(prefix(m)),
            QnlpError::Config(m) => QnlpError::Config(prefix(m)),
        }
    }

    /// True when this error, or any error it wraps, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            QnlpError::Execution {
                source: Some(HalError::Cancelled),
                ..
            } => true,
            QnlpError::Optimization {
                source: Some(inner),
                ..
            } => inner.is_cancelled(),
            _ => false,
        }
    }
}

/// Result type for classifier operations.
pub type QnlpResult<T> = Result<T, QnlpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_context_keeps_kind_and_cause() {
        let err = QnlpError::from_ir(
            "bad gate",
            IrError::InvalidStatePreparation("no target qubits".into()),
        )
        .with_context("building ansatz");

        assert_eq!(err.kind(), ErrorKind::CircuitBuild);
        assert_eq!(
            err.to_string(),
            "Circuit build error: building ansatz: bad gate"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_optimization_exposes_chain() {
        let inner = QnlpError::execution("dispatch stopped", HalError::Cancelled);
        let err = QnlpError::optimization("fit failed", inner);

        assert_eq!(err.kind(), ErrorKind::Optimization);
        assert!(err.is_cancelled());

        let cause = err.source().map(ToString::to_string);
        assert_eq!(
            cause.as_deref(),
            Some("Execution error: dispatch stopped")
        );
    }

    #[test]
    fn test_plain_errors_are_not_cancellations() {
        assert!(!QnlpError::Validation("x".into()).is_cancelled());
        assert!(!QnlpError::execution("t", HalError::Timeout("run".into())).is_cancelled());
    }
}
