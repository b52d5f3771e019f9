//! Sparse matrix helpers shared by the operator and partitioning layers.
//!
//! Matrices are built in COO (triplet) form and converted to CSR, which
//! sums duplicate entries. Products are written as explicit row loops so
//! that the transposed product needs no materialized transpose.

use crate::error::{DdmError, Result};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Build a CSR matrix from separate triplet vectors.
///
/// Duplicate `(i, j)` entries are summed during the COO → CSR conversion.
pub fn csr_from_triplets(
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
) -> Result<CsrMatrix<f64>> {
    let coo = CooMatrix::try_from_triplets(nrows, ncols, rows, cols, values)
        .map_err(|e| DdmError::Sparse(format!("failed to create COO matrix: {}", e)))?;
    Ok(CsrMatrix::from(&coo))
}

/// y = M * x
pub fn csr_matvec(matrix: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    assert_eq!(x.len(), matrix.ncols(), "CSR product: input dimension mismatch");
    let mut y = DVector::zeros(matrix.nrows());
    for (row_idx, row) in matrix.row_iter().enumerate() {
        let mut acc = 0.0;
        for (&col_idx, &value) in row.col_indices().iter().zip(row.values().iter()) {
            acc += value * x[col_idx];
        }
        y[row_idx] = acc;
    }
    y
}

/// y = Mᵀ * x
pub fn csr_transpose_matvec(matrix: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    assert_eq!(
        x.len(),
        matrix.nrows(),
        "CSR transposed product: input dimension mismatch"
    );
    let mut y = DVector::zeros(matrix.ncols());
    for (row_idx, row) in matrix.row_iter().enumerate() {
        let xi = x[row_idx];
        if xi == 0.0 {
            continue;
        }
        for (&col_idx, &value) in row.col_indices().iter().zip(row.values().iter()) {
            y[col_idx] += value * xi;
        }
    }
    y
}

/// Copy of `matrix` with every stored value negated.
pub fn negated(matrix: &CsrMatrix<f64>) -> CsrMatrix<f64> {
    let mut result = matrix.clone();
    for value in result.values_mut() {
        *value = -*value;
    }
    result
}

/// Dense copy of a CSR matrix.
pub fn to_dense(matrix: &CsrMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(matrix.nrows(), matrix.ncols());
    for (row_idx, row) in matrix.row_iter().enumerate() {
        for (&col_idx, &value) in row.col_indices().iter().zip(row.values().iter()) {
            dense[(row_idx, col_idx)] += value;
        }
    }
    dense
}

/// Build a CSR matrix from a dense row-major slice, skipping exact zeros.
pub fn csr_from_row_slice(nrows: usize, ncols: usize, data: &[f64]) -> Result<CsrMatrix<f64>> {
    if data.len() != nrows * ncols {
        return Err(DdmError::dimension(
            "dense row slice",
            nrows * ncols,
            data.len(),
        ));
    }
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut values = Vec::new();
    for i in 0..nrows {
        for j in 0..ncols {
            let v = data[i * ncols + j];
            if v != 0.0 {
                rows.push(i);
                cols.push(j);
                values.push(v);
            }
        }
    }
    csr_from_triplets(nrows, ncols, rows, cols, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CsrMatrix<f64> {
        // [1 0 2]
        // [0 3 0]
        csr_from_row_slice(2, 3, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]).unwrap()
    }

    #[test]
    fn duplicate_triplets_are_summed() {
        let m = csr_from_triplets(2, 2, vec![0, 0, 1], vec![0, 0, 1], vec![1.0, 2.5, 4.0]).unwrap();
        let dense = to_dense(&m);
        assert!((dense[(0, 0)] - 3.5).abs() < 1e-15);
        assert!((dense[(1, 1)] - 4.0).abs() < 1e-15);
        assert_eq!(m.nnz(), 2);
    }

    #[test]
    fn out_of_range_triplet_is_rejected() {
        let result = csr_from_triplets(2, 2, vec![2], vec![0], vec![1.0]);
        assert!(matches!(result, Err(DdmError::Sparse(_))));
    }

    #[test]
    fn matvec_and_transpose_matvec_agree_with_dense() {
        let m = sample();
        let dense = to_dense(&m);

        let x = DVector::from_vec(vec![1.0, -1.0, 0.5]);
        let y = csr_matvec(&m, &x);
        let y_ref = &dense * &x;
        assert!((y - y_ref).norm() < 1e-14);

        let z = DVector::from_vec(vec![2.0, 3.0]);
        let w = csr_transpose_matvec(&m, &z);
        let w_ref = dense.transpose() * &z;
        assert!((w - w_ref).norm() < 1e-14);
    }

    #[test]
    fn negation_flips_every_value() {
        let m = negated(&sample());
        let dense = to_dense(&m);
        assert_eq!(dense[(0, 2)], -2.0);
        assert_eq!(dense[(1, 1)], -3.0);
    }
}
