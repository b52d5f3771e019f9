//! Backend trait definitions for local factorizations.

use crate::error::Result;
use crate::operator::OpPtr;
use nalgebra_sparse::CsrMatrix;

/// Trait for a factorization backend.
///
/// Implementations factorize a square sparse matrix once and return an
/// operator whose `apply` solves with the stored factors. The returned
/// operator is read-only and can be shared across threads and solves.
pub trait Factorization: Send + Sync {
    /// Factorize `matrix` and return an operator realizing its inverse.
    ///
    /// Fails with [`DdmError::SingularBlock`](crate::DdmError::SingularBlock)
    /// if the matrix is singular or not admissible for the chosen method.
    fn factorize(&self, matrix: &CsrMatrix<f64>) -> Result<OpPtr>;

    /// Human-readable name of this backend.
    fn name(&self) -> &str;
}
