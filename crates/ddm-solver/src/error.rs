//! Error types for ddm-solver

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DdmError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DdmError {
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    #[error("singular block: {0}")]
    SingularBlock(String),

    #[error("numerical breakdown after {iterations} iterations ({restarts} restarts)")]
    NumericalBreakdown { iterations: usize, restarts: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("index {index} is invalid for dimension {bound}")]
    InvalidIndex { index: usize, bound: usize },

    #[error("sparse matrix error: {0}")]
    Sparse(String),
}

impl DdmError {
    pub(crate) fn dimension(context: &'static str, expected: usize, actual: usize) -> Self {
        DdmError::DimensionMismatch {
            context,
            expected,
            actual,
        }
    }
}
