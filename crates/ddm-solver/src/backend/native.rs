//! Native backend using nalgebra and nalgebra-sparse.
//!
//! This is the default backend when no external solver library is available.
//! It supports:
//! - Sparse Cholesky (`CscCholesky`) for symmetric positive definite blocks
//! - Dense LU for small blocks, including symmetric indefinite ones

use super::traits::*;
use crate::error::{DdmError, Result};
use crate::operator::{IdentityOp, LinearOperator, OpPtr};
use crate::sparse::to_dense;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Relative size below which a pivot counts as zero. Compared against
/// `L_ii²` for Cholesky and `|U_ii|` for LU, both on the scale of the matrix.
const PIVOT_TOLERANCE: f64 = 1e-14;

/// Factorization algorithm used by [`NativeBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FactorizationMethod {
    /// Sparse Cholesky factorization (requires SPD)
    #[default]
    SparseCholesky,
    /// Dense LU decomposition with partial pivoting
    DenseLu,
}

/// Native factorization backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeBackend {
    pub method: FactorizationMethod,
}

impl NativeBackend {
    pub fn new(method: FactorizationMethod) -> Self {
        Self { method }
    }
}

impl Factorization for NativeBackend {
    fn factorize(&self, matrix: &CsrMatrix<f64>) -> Result<OpPtr> {
        if matrix.nrows() != matrix.ncols() {
            return Err(DdmError::dimension(
                "factorization of non-square matrix",
                matrix.nrows(),
                matrix.ncols(),
            ));
        }
        let n = matrix.nrows();
        if n == 0 {
            return Ok(Arc::new(IdentityOp::new(0)));
        }

        debug!(
            "{}: factorizing {}x{} block with {} non-zeros",
            self.name(),
            n,
            n,
            matrix.nnz()
        );

        match self.method {
            FactorizationMethod::SparseCholesky => {
                Ok(Arc::new(SparseCholeskySolver::new(matrix)?))
            }
            FactorizationMethod::DenseLu => Ok(Arc::new(DenseLuSolver::new(matrix)?)),
        }
    }

    fn name(&self) -> &str {
        match self.method {
            FactorizationMethod::SparseCholesky => "nalgebra-sparse-Cholesky",
            FactorizationMethod::DenseLu => "nalgebra-LU",
        }
    }
}

/// Stored sparse Cholesky factors; `apply` solves L Lᵀ y = x.
pub struct SparseCholeskySolver {
    factor: CscCholesky<f64>,
    dim: usize,
}

impl SparseCholeskySolver {
    pub fn new(matrix: &CsrMatrix<f64>) -> Result<Self> {
        let csc = CscMatrix::from(matrix);
        let factor = CscCholesky::factor(&csc).map_err(|e| {
            DdmError::SingularBlock(format!("sparse Cholesky factorization failed: {:?}", e))
        })?;

        // Semi-definite blocks can slip through with roundoff-sized pivots.
        let (min_pivot, max_pivot) = pivot_range(factor.l());
        if min_pivot * min_pivot <= PIVOT_TOLERANCE * max_pivot * max_pivot {
            return Err(DdmError::SingularBlock(format!(
                "rank-deficient block (pivot ratio {:.3e})",
                min_pivot / max_pivot
            )));
        }

        Ok(Self {
            factor,
            dim: matrix.nrows(),
        })
    }
}

/// Smallest and largest absolute diagonal entry of a lower-triangular factor.
fn pivot_range(l: &CscMatrix<f64>) -> (f64, f64) {
    let mut min_pivot = f64::INFINITY;
    let mut max_pivot: f64 = 0.0;
    for (col_idx, col) in l.col_iter().enumerate() {
        let diag = col
            .row_indices()
            .iter()
            .position(|&row| row == col_idx)
            .and_then(|pos| col.values().get(pos))
            .map(|v| v.abs())
            .unwrap_or(0.0);
        min_pivot = min_pivot.min(diag);
        max_pivot = max_pivot.max(diag);
    }
    (min_pivot, max_pivot)
}

impl LinearOperator for SparseCholeskySolver {
    fn rows(&self) -> usize {
        self.dim
    }

    fn cols(&self) -> usize {
        self.dim
    }

    fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.dim, "SparseCholeskySolver: dimension mismatch");
        let rhs = DMatrix::from_column_slice(self.dim, 1, x.as_slice());
        let sol = self.factor.solve(&rhs);
        sol.column(0).into_owned()
    }
}

/// Dense LU factorization, stored as the explicit inverse.
pub struct DenseLuSolver {
    inverse: DMatrix<f64>,
}

impl DenseLuSolver {
    pub fn new(matrix: &CsrMatrix<f64>) -> Result<Self> {
        let lu = to_dense(matrix).lu();

        let u = lu.u();
        let diag = u.diagonal().map(|v| v.abs());
        let max_pivot = diag.max();
        let min_pivot = diag.min();
        if !lu.is_invertible() || min_pivot <= PIVOT_TOLERANCE * max_pivot {
            return Err(DdmError::SingularBlock(format!(
                "singular block in LU decomposition (pivot ratio {:.3e})",
                if max_pivot > 0.0 { min_pivot / max_pivot } else { 0.0 }
            )));
        }

        let inverse = lu.try_inverse().ok_or_else(|| {
            DdmError::SingularBlock("failed to invert LU factors".into())
        })?;
        Ok(Self { inverse })
    }
}

impl LinearOperator for DenseLuSolver {
    fn rows(&self) -> usize {
        self.inverse.nrows()
    }

    fn cols(&self) -> usize {
        self.inverse.ncols()
    }

    fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.inverse.ncols(), "DenseLuSolver: dimension mismatch");
        &self.inverse * x
    }
}
