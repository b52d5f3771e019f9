//! Block partitioning and lazy Schur complements.
//!
//! For a square matrix `M` and an ordered list of kept indices, the
//! remaining (interior) indices are eliminated:
//!
//! ```text
//!       ┌ A00  A01 ┐  kept
//!   M ~ │          │
//!       └ A10  A11 ┘  interior
//!
//!   S = A00 − A01 · A11⁻¹ · A10
//! ```
//!
//! `S` is never formed. It is represented as
//! `SumOp(A00, ProductOp(−A01, A11⁻¹, A10))`, where `A11⁻¹` is the
//! factorization produced once by the backend and reused on every apply.

use crate::backend::Factorization;
use crate::error::{DdmError, Result};
use crate::operator::{MatrixOp, OpPtr, ProductOp, SumOp};
use crate::sparse::{csr_from_triplets, negated};
use log::debug;
use nalgebra_sparse::CsrMatrix;
use std::sync::Arc;

/// The four blocks of a partitioned matrix.
///
/// Index 0 refers to the kept indices (in the order given), index 1 to the
/// interior indices (ascending).
#[derive(Debug, Clone)]
pub struct Blocks {
    pub a00: CsrMatrix<f64>,
    pub a01: CsrMatrix<f64>,
    pub a10: CsrMatrix<f64>,
    pub a11: CsrMatrix<f64>,
    /// Original indices of the kept rows/columns.
    pub kept: Vec<usize>,
    /// Original indices of the eliminated rows/columns.
    pub interior: Vec<usize>,
}

#[derive(Clone, Copy)]
enum Slot {
    Kept(usize),
    Interior(usize),
}

/// Partition `matrix` into blocks with respect to `kept`.
///
/// Fails on non-square input, out-of-range indices and repeated indices.
pub fn matrix_blocks(matrix: &CsrMatrix<f64>, kept: &[usize]) -> Result<Blocks> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(DdmError::dimension(
            "partition of non-square matrix",
            n,
            matrix.ncols(),
        ));
    }

    let mut slots: Vec<Option<Slot>> = vec![None; n];
    for (pos, &idx) in kept.iter().enumerate() {
        if idx >= n || slots[idx].is_some() {
            return Err(DdmError::InvalidIndex { index: idx, bound: n });
        }
        slots[idx] = Some(Slot::Kept(pos));
    }
    let mut interior = Vec::with_capacity(n - kept.len());
    let slots: Vec<Slot> = slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.unwrap_or_else(|| {
                interior.push(idx);
                Slot::Interior(interior.len() - 1)
            })
        })
        .collect();

    let m = kept.len();
    let r = interior.len();
    let mut t00 = (Vec::new(), Vec::new(), Vec::new());
    let mut t01 = (Vec::new(), Vec::new(), Vec::new());
    let mut t10 = (Vec::new(), Vec::new(), Vec::new());
    let mut t11 = (Vec::new(), Vec::new(), Vec::new());

    for (row_idx, row) in matrix.row_iter().enumerate() {
        for (&col_idx, &value) in row.col_indices().iter().zip(row.values().iter()) {
            let (target, i, j) = match (slots[row_idx], slots[col_idx]) {
                (Slot::Kept(i), Slot::Kept(j)) => (&mut t00, i, j),
                (Slot::Kept(i), Slot::Interior(j)) => (&mut t01, i, j),
                (Slot::Interior(i), Slot::Kept(j)) => (&mut t10, i, j),
                (Slot::Interior(i), Slot::Interior(j)) => (&mut t11, i, j),
            };
            target.0.push(i);
            target.1.push(j);
            target.2.push(value);
        }
    }

    Ok(Blocks {
        a00: csr_from_triplets(m, m, t00.0, t00.1, t00.2)?,
        a01: csr_from_triplets(m, r, t01.0, t01.1, t01.2)?,
        a10: csr_from_triplets(r, m, t10.0, t10.1, t10.2)?,
        a11: csr_from_triplets(r, r, t11.0, t11.1, t11.2)?,
        kept: kept.to_vec(),
        interior,
    })
}

/// Lazy Schur complement `A00 − A01 · solver · A10`.
///
/// `solver` must realize `A11⁻¹`. With an empty interior the result is
/// `A00` itself and `solver` is ignored.
pub fn schur_complement(blocks: Blocks, solver: OpPtr) -> Result<OpPtr> {
    let Blocks { a00, a01, a10, a11, .. } = blocks;
    if a11.nrows() == 0 {
        return Ok(MatrixOp::new(a00).into_ptr());
    }
    if solver.rows() != a11.nrows() || solver.cols() != a11.ncols() {
        return Err(DdmError::dimension(
            "interior solver",
            a11.nrows(),
            solver.rows(),
        ));
    }

    let coupling = ProductOp::new(vec![
        MatrixOp::new(negated(&a01)).into_ptr(),
        solver,
        MatrixOp::new(a10).into_ptr(),
    ])?;
    let sum = SumOp::new(vec![MatrixOp::new(a00).into_ptr(), Arc::new(coupling)])?;
    Ok(Arc::new(sum))
}

/// Partition `matrix`, factorize the interior block and return the lazy
/// Schur complement on `kept`.
pub fn schur_complement_of(
    matrix: &CsrMatrix<f64>,
    kept: &[usize],
    factorization: &dyn Factorization,
) -> Result<OpPtr> {
    let blocks = matrix_blocks(matrix, kept)?;
    if blocks.a11.nrows() == 0 {
        return Ok(MatrixOp::new(blocks.a00).into_ptr());
    }
    debug!(
        "Schur complement: keeping {} of {} dofs, eliminating {}",
        blocks.kept.len(),
        matrix.nrows(),
        blocks.interior.len()
    );
    let solver = factorization.factorize(&blocks.a11)?;
    schur_complement(blocks, solver)
}
