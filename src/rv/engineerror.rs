use thiserror::Error;

use crate::symbolic::backend::BackendError;
use crate::symbolic::parser::ParseError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("shape error: {0}")]
    Shape(String),
    #[error("order error: {0}")]
    Order(String),
    #[error("unknown kind `{0}`")]
    Kind(String),
    #[error("{operation}: {point} lies outside the support [{lower}, {upper}]")]
    OutOfSupport {
        operation: &'static str,
        point: String,
        lower: String,
        upper: String,
    },
    #[error("{operation}: operands of nature {left} and {right} cannot be combined")]
    TypeMismatch {
        operation: &'static str,
        left: String,
        right: String,
    },
    #[error("{operation}: {count} candidate inverses pass on segment {segment}")]
    AmbiguousInverse {
        operation: &'static str,
        segment: usize,
        count: usize,
    },
    #[error("invalid transform: {0}")]
    InvalidTransform(String),
    #[error("invalid mixture: {0}")]
    InvalidMixture(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{operation} is unsupported: {reason}")]
    Unsupported { operation: &'static str, reason: String },
    #[error("{operation} did not converge: {detail}")]
    NonConvergence { operation: &'static str, detail: String },
    #[error("{operation} failed{}: {source}", .segment.map(|s| format!(" on segment {s}")).unwrap_or_default())]
    Backend {
        operation: &'static str,
        segment: Option<usize>,
        #[source]
        source: BackendError,
    },
    #[error("{operation} exceeded the backend budget of {budget_ms} ms")]
    BackendTimeout { operation: String, budget_ms: u64 },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl EngineError {
    /// Wraps a backend failure with the operation and piece that raised it.
    pub fn backend(operation: &'static str, segment: Option<usize>, source: BackendError) -> EngineError {
        match source {
            BackendError::Timeout { operation: inner, budget_ms } => EngineError::BackendTimeout {
                operation: format!("{operation}/{inner}"),
                budget_ms,
            },
            source => EngineError::Backend {
                operation,
                segment,
                source,
            },
        }
    }

    pub fn unsupported(operation: &'static str, reason: impl Into<String>) -> EngineError {
        EngineError::Unsupported {
            operation,
            reason: reason.into(),
        }
    }
}
