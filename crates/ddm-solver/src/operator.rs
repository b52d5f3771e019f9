//! Linear operator abstraction and composition.
//!
//! Every algorithm in this crate talks to matrices, local solvers and
//! preconditioners through [`LinearOperator`]. Composite operators hold
//! their parts as [`OpPtr`] (reference-counted), so the same local Schur
//! complement can live inside the preconditioner and still be held by the
//! caller.
//!
//! ```text
//! SumOp(A, B)            x ↦ A·x + B·x
//! ProductOp(A, B, C)     x ↦ A·(B·(C·x))
//! AdditiveOp{(T_k,Op_k)} x ↦ Σ_k T_k · Op_k(T_kᵀ · x)
//! ```

use crate::error::{DdmError, Result};
use crate::sparse::{csr_matvec, csr_transpose_matvec};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use std::sync::Arc;

/// A linear map y = A * x between dense vectors.
///
/// `apply` expects `x.len() == cols()` and returns a vector of length
/// `rows()`. Passing a wrongly sized vector is a programming error and
/// panics.
pub trait LinearOperator: Send + Sync {
    /// Number of rows (output dimension).
    fn rows(&self) -> usize;

    /// Number of columns (input dimension).
    fn cols(&self) -> usize;

    /// Apply the operator.
    fn apply(&self, x: &DVector<f64>) -> DVector<f64>;
}

/// Shared handle to a linear operator.
pub type OpPtr = Arc<dyn LinearOperator>;

/// Sparse matrix as operator.
#[derive(Debug, Clone)]
pub struct MatrixOp {
    matrix: Arc<CsrMatrix<f64>>,
}

impl MatrixOp {
    pub fn new(matrix: CsrMatrix<f64>) -> Self {
        Self {
            matrix: Arc::new(matrix),
        }
    }

    pub fn from_shared(matrix: Arc<CsrMatrix<f64>>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    pub fn into_ptr(self) -> OpPtr {
        Arc::new(self)
    }
}

impl LinearOperator for MatrixOp {
    fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    fn cols(&self) -> usize {
        self.matrix.ncols()
    }

    fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        csr_matvec(&self.matrix, x)
    }
}

/// Diagonal operator y_i = d_i * x_i.
#[derive(Debug, Clone)]
pub struct DiagonalOp {
    diagonal: DVector<f64>,
}

impl DiagonalOp {
    pub fn new(diagonal: DVector<f64>) -> Self {
        Self { diagonal }
    }

    /// The operator diag(1 / w_i).
    pub fn inverse_of(weights: &DVector<f64>) -> Self {
        Self {
            diagonal: weights.map(|w| 1.0 / w),
        }
    }

    pub fn diagonal(&self) -> &DVector<f64> {
        &self.diagonal
    }
}

impl LinearOperator for DiagonalOp {
    fn rows(&self) -> usize {
        self.diagonal.len()
    }

    fn cols(&self) -> usize {
        self.diagonal.len()
    }

    fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.diagonal.len(), "DiagonalOp: dimension mismatch");
        self.diagonal.component_mul(x)
    }
}

/// Identity on a space of dimension n. Used as "no preconditioner".
#[derive(Debug, Clone, Copy)]
pub struct IdentityOp {
    dim: usize,
}

impl IdentityOp {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl LinearOperator for IdentityOp {
    fn rows(&self) -> usize {
        self.dim
    }

    fn cols(&self) -> usize {
        self.dim
    }

    fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.dim, "IdentityOp: dimension mismatch");
        x.clone()
    }
}

/// Sum of operators of identical shape.
pub struct SumOp {
    ops: Vec<OpPtr>,
    rows: usize,
    cols: usize,
}

impl SumOp {
    /// Requires at least one summand; all summands must share one shape.
    pub fn new(ops: Vec<OpPtr>) -> Result<Self> {
        let first = ops.first().ok_or_else(|| {
            DdmError::InvalidConfiguration("SumOp needs at least one operator".into())
        })?;
        let (rows, cols) = (first.rows(), first.cols());
        for op in &ops[1..] {
            if op.rows() != rows {
                return Err(DdmError::dimension("SumOp rows", rows, op.rows()));
            }
            if op.cols() != cols {
                return Err(DdmError::dimension("SumOp cols", cols, op.cols()));
            }
        }
        Ok(Self { ops, rows, cols })
    }
}

impl LinearOperator for SumOp {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut y = self.ops[0].apply(x);
        for op in &self.ops[1..] {
            y += op.apply(x);
        }
        y
    }
}

/// Product A·B·C… of operators, applied right to left.
pub struct ProductOp {
    ops: Vec<OpPtr>,
}

impl ProductOp {
    /// `ops` are given in mathematical order: the last one acts first.
    pub fn new(ops: Vec<OpPtr>) -> Result<Self> {
        if ops.is_empty() {
            return Err(DdmError::InvalidConfiguration(
                "ProductOp needs at least one operator".into(),
            ));
        }
        for pair in ops.windows(2) {
            if pair[0].cols() != pair[1].rows() {
                return Err(DdmError::dimension(
                    "ProductOp chain",
                    pair[0].cols(),
                    pair[1].rows(),
                ));
            }
        }
        Ok(Self { ops })
    }
}

impl LinearOperator for ProductOp {
    fn rows(&self) -> usize {
        self.ops[0].rows()
    }

    fn cols(&self) -> usize {
        self.ops[self.ops.len() - 1].cols()
    }

    fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut iter = self.ops.iter().rev();
        let mut y = match iter.next() {
            Some(op) => op.apply(x),
            None => x.clone(),
        };
        for op in iter {
            y = op.apply(&y);
        }
        y
    }
}

/// One contribution of an [`AdditiveOp`]: a transfer matrix (global × local)
/// and the local operator acting on the local space.
#[derive(Clone)]
pub struct AdditivePart {
    pub transfer: Arc<CsrMatrix<f64>>,
    pub op: OpPtr,
}

/// Σ_k T_k · Op_k(T_kᵀ · x)
///
/// Parts only read their own data, so contributions are computed in
/// parallel and summed in one reduction.
pub struct AdditiveOp {
    parts: Vec<AdditivePart>,
    dim: usize,
}

impl AdditiveOp {
    /// An additive operator on a global space of dimension `dim` with no
    /// parts yet (applies as zero).
    pub fn new(dim: usize) -> Self {
        Self {
            parts: Vec::new(),
            dim,
        }
    }

    pub fn with_capacity(dim: usize, capacity: usize) -> Self {
        Self {
            parts: Vec::with_capacity(capacity),
            dim,
        }
    }

    /// Add a part. `transfer` must have `dim` rows and `op.rows() == op.cols()`
    /// columns.
    pub fn add_operator(&mut self, transfer: Arc<CsrMatrix<f64>>, op: OpPtr) -> Result<()> {
        if transfer.nrows() != self.dim {
            return Err(DdmError::dimension(
                "AdditiveOp transfer rows",
                self.dim,
                transfer.nrows(),
            ));
        }
        if op.rows() != transfer.ncols() || op.cols() != transfer.ncols() {
            return Err(DdmError::dimension(
                "AdditiveOp local operator",
                transfer.ncols(),
                op.cols(),
            ));
        }
        self.parts.push(AdditivePart { transfer, op });
        Ok(())
    }

    pub fn parts(&self) -> &[AdditivePart] {
        &self.parts
    }

    pub fn into_ptr(self) -> OpPtr {
        Arc::new(self)
    }
}

impl LinearOperator for AdditiveOp {
    fn rows(&self) -> usize {
        self.dim
    }

    fn cols(&self) -> usize {
        self.dim
    }

    fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.dim, "AdditiveOp: dimension mismatch");
        let dim = self.dim;
        self.parts
            .par_iter()
            .map(|part| {
                let local = csr_transpose_matvec(&part.transfer, x);
                let local = part.op.apply(&local);
                csr_matvec(&part.transfer, &local)
            })
            .reduce(|| DVector::zeros(dim), |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::csr_from_row_slice;

    fn matrix_op(nrows: usize, ncols: usize, data: &[f64]) -> OpPtr {
        MatrixOp::new(csr_from_row_slice(nrows, ncols, data).unwrap()).into_ptr()
    }

    fn assert_close(a: &DVector<f64>, b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for i in 0..b.len() {
            assert!((a[i] - b[i]).abs() < 1e-12, "entry {}: {} vs {}", i, a[i], b[i]);
        }
    }

    #[test]
    fn matrix_op_applies_matrix() {
        let op = matrix_op(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        let y = op.apply(&DVector::from_vec(vec![1.0, 3.0]));
        assert_close(&y, &[5.0, 7.0]);
        assert_eq!(op.rows(), 2);
        assert_eq!(op.cols(), 2);
    }

    #[test]
    fn sum_adds_contributions() {
        let a = matrix_op(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = matrix_op(2, 2, &[0.0, 2.0, 3.0, 0.0]);
        let sum = SumOp::new(vec![a, b]).unwrap();
        let y = sum.apply(&DVector::from_vec(vec![1.0, 1.0]));
        assert_close(&y, &[3.0, 4.0]);
    }

    #[test]
    fn sum_rejects_shape_mismatch() {
        let a = matrix_op(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = matrix_op(1, 2, &[1.0, 1.0]);
        assert!(matches!(
            SumOp::new(vec![a, b]),
            Err(DdmError::DimensionMismatch { .. })
        ));
        assert!(SumOp::new(Vec::new()).is_err());
    }

    #[test]
    fn product_applies_right_to_left() {
        // A is 1x2, B is 2x3: A·B·x
        let a = matrix_op(1, 2, &[1.0, -1.0]);
        let b = matrix_op(2, 3, &[1.0, 0.0, 0.0, 0.0, 0.0, 2.0]);
        let prod = ProductOp::new(vec![a, b]).unwrap();
        assert_eq!(prod.rows(), 1);
        assert_eq!(prod.cols(), 3);
        let y = prod.apply(&DVector::from_vec(vec![4.0, 5.0, 1.0]));
        assert_close(&y, &[2.0]);
    }

    #[test]
    fn product_rejects_broken_chain() {
        let a = matrix_op(1, 2, &[1.0, -1.0]);
        let b = matrix_op(3, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(ProductOp::new(vec![a, b]).is_err());
    }

    #[test]
    fn diagonal_inverse_scales() {
        let d = DiagonalOp::inverse_of(&DVector::from_vec(vec![2.0, 4.0]));
        let y = d.apply(&DVector::from_vec(vec![1.0, 1.0]));
        assert_close(&y, &[0.5, 0.25]);
    }

    #[test]
    fn additive_sums_transferred_contributions() {
        // Global space of size 3; two parts with local size 2.
        let t1 = Arc::new(csr_from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap());
        let t2 = Arc::new(csr_from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]).unwrap());
        let op1 = matrix_op(2, 2, &[2.0, 0.0, 0.0, 2.0]);
        let op2 = matrix_op(2, 2, &[1.0, 1.0, 1.0, 1.0]);

        let mut additive = AdditiveOp::new(3);
        additive.add_operator(t1, op1).unwrap();
        additive.add_operator(t2, op2).unwrap();

        let y = additive.apply(&DVector::from_vec(vec![1.0, 2.0, 3.0]));
        // part 1: T1·2·T1ᵀx = [2, 4, 0]; part 2: T2·[[1,1],[1,1]]·[2,3] = [0, 5, 5]
        assert_close(&y, &[2.0, 9.0, 5.0]);
    }

    #[test]
    fn additive_without_parts_is_zero() {
        let additive = AdditiveOp::new(2);
        let y = additive.apply(&DVector::from_vec(vec![1.0, 1.0]));
        assert_close(&y, &[0.0, 0.0]);
    }

    #[test]
    fn additive_rejects_wrong_transfer() {
        let mut additive = AdditiveOp::new(3);
        let t = Arc::new(csr_from_row_slice(2, 1, &[1.0, 0.0]).unwrap());
        let op = matrix_op(1, 1, &[1.0]);
        assert!(additive.add_operator(t, op).is_err());
    }

    #[test]
    fn operators_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<MatrixOp>();
        assert_send_sync::<AdditiveOp>();
        assert_send_sync::<dyn LinearOperator>();
    }
}
