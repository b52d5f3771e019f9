//! Scaled Dirichlet preconditioner for the Lagrange-multiplier system.
//!
//! Formally the preconditioner is
//!
//! ```text
//!   M = Σ_k  B̂_k · D_k · S_k · D_k · B̂_kᵀ
//! ```
//!
//! where `B̂_k` is the jump matrix of subdomain `k` restricted to its skeleton
//! dofs, `S_k` the local Schur complement on the skeleton and `D_k` the
//! diagonal scaling `diag(1 / w_k)`.
//!
//! Construction is two-phase. A [`ScaledDirichletBuilder`] collects
//! `(B̂_k, S_k)` pairs and computes scaling weights; only then
//! [`ScaledDirichletBuilder::preconditioner`] yields the immutable
//! [`ScaledDirichletPreconditioner`].
//!
//! ```no_run
//! use ddm_solver::{NativeBackend, ScaledDirichletBuilder, restrict_to_skeleton};
//! # fn example(parts: Vec<(nalgebra_sparse::CsrMatrix<f64>, nalgebra_sparse::CsrMatrix<f64>)>)
//! # -> ddm_solver::Result<()> {
//! let backend = NativeBackend::default();
//! let mut builder = ScaledDirichletBuilder::new();
//! builder.reserve(parts.len());
//! for (jump, stiffness) in &parts {
//!     builder.add_local_skeleton(restrict_to_skeleton(jump, stiffness, &backend)?)?;
//! }
//! builder.setup_multiplicity_scaling()?;
//! let _precond = builder.preconditioner()?.into_operator();
//! # Ok(())
//! # }
//! ```

use crate::backend::Factorization;
use crate::error::{DdmError, Result};
use crate::operator::{AdditiveOp, DiagonalOp, LinearOperator, OpPtr, ProductOp};
use crate::schur::schur_complement_of;
use crate::sparse::csr_from_triplets;
use log::{debug, info};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sorted local dofs that carry at least one nonzero jump entry.
pub fn skeleton_dofs(jump: &CsrMatrix<f64>) -> Vec<usize> {
    let mut touched = vec![false; jump.ncols()];
    for row in jump.row_iter() {
        for (&col, &value) in row.col_indices().iter().zip(row.values().iter()) {
            if value != 0.0 {
                touched[col] = true;
            }
        }
    }
    touched
        .iter()
        .enumerate()
        .filter_map(|(dof, &hit)| hit.then_some(dof))
        .collect()
}

/// Restrict the columns of `jump` to `dofs`, renumbered `0..dofs.len()` in
/// the given order. All other columns are dropped.
pub fn restrict_jump_matrix(jump: &CsrMatrix<f64>, dofs: &[usize]) -> Result<CsrMatrix<f64>> {
    let ncols = jump.ncols();
    let mut reverse: Vec<Option<usize>> = vec![None; ncols];
    for (pos, &dof) in dofs.iter().enumerate() {
        if dof >= ncols || reverse[dof].is_some() {
            return Err(DdmError::InvalidIndex {
                index: dof,
                bound: ncols,
            });
        }
        reverse[dof] = Some(pos);
    }

    let mut rows = Vec::with_capacity(jump.nnz());
    let mut cols = Vec::with_capacity(jump.nnz());
    let mut values = Vec::with_capacity(jump.nnz());
    for (row_idx, row) in jump.row_iter().enumerate() {
        for (&col, &value) in row.col_indices().iter().zip(row.values().iter()) {
            if let Some(new_col) = reverse[col] {
                rows.push(row_idx);
                cols.push(new_col);
                values.push(value);
            }
        }
    }
    csr_from_triplets(jump.nrows(), dofs.len(), rows, cols, values)
}

/// Jump matrix and Schur complement of one subdomain, both on its skeleton.
#[derive(Clone)]
pub struct LocalSkeleton {
    pub jump: CsrMatrix<f64>,
    pub schur: OpPtr,
}

/// Restrict a subdomain to its skeleton: extract the skeleton dofs from
/// `jump`, restrict `jump` to them and eliminate the interior of `stiffness`.
pub fn restrict_to_skeleton(
    jump: &CsrMatrix<f64>,
    stiffness: &CsrMatrix<f64>,
    factorization: &dyn Factorization,
) -> Result<LocalSkeleton> {
    if jump.ncols() != stiffness.nrows() {
        return Err(DdmError::StructuralMismatch(format!(
            "jump matrix has {} columns but the local matrix has {} rows",
            jump.ncols(),
            stiffness.nrows()
        )));
    }
    let dofs = skeleton_dofs(jump);
    Ok(LocalSkeleton {
        jump: restrict_jump_matrix(jump, &dofs)?,
        schur: schur_complement_of(stiffness, &dofs, factorization)?,
    })
}

/// Pair of subdomains sharing an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundaryInterface {
    pub first: usize,
    pub second: usize,
}

impl BoundaryInterface {
    pub fn new(first: usize, second: usize) -> Self {
        Self { first, second }
    }
}

struct Subdomain {
    jump: Arc<CsrMatrix<f64>>,
    schur: OpPtr,
}

/// Collects subdomains and scaling weights for the scaled Dirichlet
/// preconditioner.
#[derive(Default)]
pub struct ScaledDirichletBuilder {
    subdomains: Vec<Subdomain>,
    scaling: Option<Vec<DVector<f64>>>,
}

impl ScaledDirichletBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve storage for `n` subdomains.
    pub fn reserve(&mut self, n: usize) {
        self.subdomains.reserve(n);
    }

    /// Register a subdomain by its skeleton jump matrix and local Schur
    /// complement.
    ///
    /// Any previously computed scaling is discarded, since it no longer
    /// covers every subdomain.
    pub fn add_subdomain(&mut self, jump: CsrMatrix<f64>, schur: OpPtr) -> Result<()> {
        if let Some(first) = self.subdomains.first() {
            if jump.nrows() != first.jump.nrows() {
                return Err(DdmError::StructuralMismatch(format!(
                    "jump matrix of subdomain {} has {} rows, expected {}",
                    self.subdomains.len(),
                    jump.nrows(),
                    first.jump.nrows()
                )));
            }
        }
        if schur.rows() != schur.cols() || schur.cols() != jump.ncols() {
            return Err(DdmError::StructuralMismatch(format!(
                "subdomain {}: Schur complement is {}x{} but the jump matrix has {} columns",
                self.subdomains.len(),
                schur.rows(),
                schur.cols(),
                jump.ncols()
            )));
        }
        if self.scaling.take().is_some() {
            debug!("scaling discarded after registering a new subdomain");
        }
        self.subdomains.push(Subdomain {
            jump: Arc::new(jump),
            schur,
        });
        Ok(())
    }

    /// Register the output of [`restrict_to_skeleton`].
    pub fn add_local_skeleton(&mut self, local: LocalSkeleton) -> Result<()> {
        self.add_subdomain(local.jump, local.schur)
    }

    pub fn n_subdomains(&self) -> usize {
        self.subdomains.len()
    }

    pub fn jump_matrix(&self, k: usize) -> Option<&CsrMatrix<f64>> {
        self.subdomains.get(k).map(|s| s.jump.as_ref())
    }

    pub fn local_schur_op(&self, k: usize) -> Option<&OpPtr> {
        self.subdomains.get(k).map(|s| &s.schur)
    }

    /// Scaling weights `w_k` of subdomain `k`, once computed.
    pub fn local_scaling(&self, k: usize) -> Option<&DVector<f64>> {
        self.scaling.as_ref().and_then(|s| s.get(k))
    }

    /// Number of Lagrange multipliers (rows shared by all jump matrices).
    pub fn n_lagrange_multipliers(&self) -> Result<usize> {
        self.subdomains
            .first()
            .map(|s| s.jump.nrows())
            .ok_or_else(|| {
                DdmError::InvalidConfiguration(
                    "number of Lagrange multipliers requires at least one subdomain".into(),
                )
            })
    }

    fn require_subdomains(&self, what: &str) -> Result<()> {
        if self.subdomains.is_empty() {
            return Err(DdmError::InvalidConfiguration(format!(
                "{} requires registered subdomains",
                what
            )));
        }
        Ok(())
    }

    /// Weight of each skeleton dof = 1 + number of rows of its own jump
    /// matrix acting on it.
    pub fn setup_multiplicity_scaling(&mut self) -> Result<()> {
        self.require_subdomains("multiplicity scaling")?;

        let scaling = self
            .subdomains
            .iter()
            .map(|sub| {
                let mut weights = DVector::from_element(sub.schur.rows(), 1.0);
                for row in sub.jump.row_iter() {
                    for (&col, &value) in row.col_indices().iter().zip(row.values().iter()) {
                        if value != 0.0 {
                            weights[col] += 1.0;
                        }
                    }
                }
                weights
            })
            .collect();

        debug!(
            "multiplicity scaling set up for {} subdomains",
            self.subdomains.len()
        );
        self.scaling = Some(scaling);
        Ok(())
    }

    /// Stiffness-weighted (diagonal deluxe) scaling.
    ///
    /// For every interface `(k, l)` and every multiplier row that acts on
    /// dof `i` of `k` and dof `j` of `l`:
    ///
    /// ```text
    ///   w_k(i) += s_l(j) / s_k(i)      w_l(j) += s_k(i) / s_l(j)
    /// ```
    ///
    /// starting from `w = 1`, where `s_k = diag(S_k)`. The resulting
    /// `D_k = diag(1/w_k)` weights each side by its share of the interface
    /// stiffness. With equal diagonals this reproduces multiplicity scaling.
    pub fn setup_deluxe_scaling(&mut self, interfaces: &[BoundaryInterface]) -> Result<()> {
        self.require_subdomains("deluxe scaling")?;
        let n = self.subdomains.len();
        for iface in interfaces {
            if iface.first >= n || iface.second >= n || iface.first == iface.second {
                return Err(DdmError::InvalidConfiguration(format!(
                    "interface ({}, {}) does not connect two of the {} subdomains",
                    iface.first, iface.second, n
                )));
            }
        }

        // (k, l) and (l, k) describe the same interface.
        let mut pairs: Vec<(usize, usize)> = interfaces
            .iter()
            .map(|iface| {
                (
                    iface.first.min(iface.second),
                    iface.first.max(iface.second),
                )
            })
            .collect();
        pairs.sort_unstable();
        pairs.dedup();

        let diagonals: Vec<DVector<f64>> = self
            .subdomains
            .par_iter()
            .map(|sub| operator_diagonal(sub.schur.as_ref()))
            .collect();
        for (k, diag) in diagonals.iter().enumerate() {
            if let Some(i) = diag.iter().position(|&d| !(d > 0.0)) {
                return Err(DdmError::InvalidConfiguration(format!(
                    "deluxe scaling needs a positive Schur diagonal, subdomain {} dof {} has {}",
                    k, i, diag[i]
                )));
            }
        }

        let mut scaling: Vec<DVector<f64>> = diagonals
            .iter()
            .map(|d| DVector::from_element(d.len(), 1.0))
            .collect();

        for &(k, l) in &pairs {
            let jump_k = &self.subdomains[k].jump;
            let jump_l = &self.subdomains[l].jump;
            for (row_k, row_l) in jump_k.row_iter().zip(jump_l.row_iter()) {
                for (&i, &vi) in row_k.col_indices().iter().zip(row_k.values().iter()) {
                    if vi == 0.0 {
                        continue;
                    }
                    for (&j, &vj) in row_l.col_indices().iter().zip(row_l.values().iter()) {
                        if vj == 0.0 {
                            continue;
                        }
                        scaling[k][i] += diagonals[l][j] / diagonals[k][i];
                        scaling[l][j] += diagonals[k][i] / diagonals[l][j];
                    }
                }
            }
        }

        debug!(
            "deluxe scaling set up for {} subdomains over {} interfaces",
            n,
            pairs.len()
        );
        self.scaling = Some(scaling);
        Ok(())
    }

    /// Use caller-provided weights `w_k` (one strictly positive entry per
    /// skeleton dof of every subdomain).
    pub fn set_local_scaling(&mut self, scaling: Vec<DVector<f64>>) -> Result<()> {
        self.require_subdomains("local scaling")?;
        if scaling.len() != self.subdomains.len() {
            return Err(DdmError::dimension(
                "scaling vectors",
                self.subdomains.len(),
                scaling.len(),
            ));
        }
        for (k, (weights, sub)) in scaling.iter().zip(&self.subdomains).enumerate() {
            if weights.len() != sub.schur.rows() {
                return Err(DdmError::dimension(
                    "scaling vector length",
                    sub.schur.rows(),
                    weights.len(),
                ));
            }
            if weights.iter().any(|&w| !(w > 0.0) || !w.is_finite()) {
                return Err(DdmError::InvalidConfiguration(format!(
                    "scaling weights of subdomain {} must be positive and finite",
                    k
                )));
            }
        }
        self.scaling = Some(scaling);
        Ok(())
    }

    /// Assemble the preconditioner.
    ///
    /// Requires at least one subdomain and a scaling computed by one of the
    /// `setup_*` methods or [`set_local_scaling`](Self::set_local_scaling).
    pub fn preconditioner(&self) -> Result<ScaledDirichletPreconditioner> {
        let n_multipliers = self.n_lagrange_multipliers()?;
        let scaling = self.scaling.as_ref().ok_or_else(|| {
            DdmError::InvalidConfiguration(
                "scaled Dirichlet preconditioner needs scaling weights; \
                 call setup_multiplicity_scaling() first"
                    .into(),
            )
        })?;

        let mut additive = AdditiveOp::with_capacity(n_multipliers, self.subdomains.len());
        for (sub, weights) in self.subdomains.iter().zip(scaling) {
            let d: OpPtr = Arc::new(DiagonalOp::inverse_of(weights));
            let local = ProductOp::new(vec![d.clone(), sub.schur.clone(), d])?;
            additive.add_operator(sub.jump.clone(), Arc::new(local))?;
        }

        info!(
            "scaled Dirichlet preconditioner: {} subdomains, {} Lagrange multipliers",
            self.subdomains.len(),
            n_multipliers
        );
        Ok(ScaledDirichletPreconditioner { op: additive })
    }
}

/// Diagonal of an operator, probed with unit vectors.
fn operator_diagonal(op: &dyn LinearOperator) -> DVector<f64> {
    let n = op.rows();
    let mut diag = DVector::zeros(n);
    let mut e = DVector::zeros(n);
    for i in 0..n {
        e[i] = 1.0;
        diag[i] = op.apply(&e)[i];
        e[i] = 0.0;
    }
    diag
}

/// The assembled scaled Dirichlet preconditioner.
///
/// Immutable; holds shared references to the local Schur complements and
/// thereby to their factorizations.
pub struct ScaledDirichletPreconditioner {
    op: AdditiveOp,
}

impl ScaledDirichletPreconditioner {
    pub fn n_subdomains(&self) -> usize {
        self.op.parts().len()
    }

    pub fn into_operator(self) -> OpPtr {
        Arc::new(self)
    }
}

impl LinearOperator for ScaledDirichletPreconditioner {
    fn rows(&self) -> usize {
        self.op.rows()
    }

    fn cols(&self) -> usize {
        self.op.cols()
    }

    fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        self.op.apply(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NativeBackend;
    use crate::operator::MatrixOp;
    use crate::sparse::{csr_from_row_slice, to_dense};

    fn scalar_op(value: f64) -> OpPtr {
        MatrixOp::new(csr_from_row_slice(1, 1, &[value]).unwrap()).into_ptr()
    }

    fn two_subdomain_builder(s1: f64, s2: f64) -> ScaledDirichletBuilder {
        let mut builder = ScaledDirichletBuilder::new();
        builder.reserve(2);
        builder
            .add_subdomain(csr_from_row_slice(1, 1, &[1.0]).unwrap(), scalar_op(s1))
            .unwrap();
        builder
            .add_subdomain(csr_from_row_slice(1, 1, &[-1.0]).unwrap(), scalar_op(s2))
            .unwrap();
        builder
    }

    #[test]
    fn skeleton_dofs_skip_zero_columns() {
        // Column 1 is never touched, column 3 only holds an explicit zero.
        let jump = csr_from_triplets(
            2,
            4,
            vec![0, 0, 1, 1],
            vec![2, 0, 2, 3],
            vec![1.0, -1.0, 1.0, 0.0],
        )
        .unwrap();
        assert_eq!(skeleton_dofs(&jump), vec![0, 2]);
    }

    #[test]
    fn restriction_renumbers_in_given_order() {
        let jump = csr_from_row_slice(2, 4, &[-1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]).unwrap();
        let restricted = restrict_jump_matrix(&jump, &[2, 0]).unwrap();
        assert_eq!(restricted.nrows(), 2);
        assert_eq!(restricted.ncols(), 2);
        let dense = to_dense(&restricted);
        assert_eq!(dense[(0, 0)], 1.0);
        assert_eq!(dense[(0, 1)], -1.0);
        assert_eq!(dense[(1, 0)], 1.0);
        assert_eq!(dense[(1, 1)], 0.0);
    }

    #[test]
    fn restriction_rejects_repeated_dofs() {
        let jump = csr_from_row_slice(1, 2, &[1.0, 0.0]).unwrap();
        assert!(restrict_jump_matrix(&jump, &[0, 0]).is_err());
        assert!(restrict_jump_matrix(&jump, &[5]).is_err());
    }

    #[test]
    fn mismatched_row_counts_are_rejected() {
        let mut builder = ScaledDirichletBuilder::new();
        builder
            .add_subdomain(csr_from_row_slice(1, 1, &[1.0]).unwrap(), scalar_op(1.0))
            .unwrap();
        let result =
            builder.add_subdomain(csr_from_row_slice(2, 1, &[1.0, 0.0]).unwrap(), scalar_op(1.0));
        assert!(matches!(result, Err(DdmError::StructuralMismatch(_))));
        assert_eq!(builder.n_subdomains(), 1);
    }

    #[test]
    fn schur_size_must_match_jump_columns() {
        let mut builder = ScaledDirichletBuilder::new();
        let result =
            builder.add_subdomain(csr_from_row_slice(1, 2, &[1.0, 0.0]).unwrap(), scalar_op(1.0));
        assert!(matches!(result, Err(DdmError::StructuralMismatch(_))));
    }

    #[test]
    fn empty_builder_is_invalid() {
        let mut builder = ScaledDirichletBuilder::new();
        assert!(matches!(
            builder.n_lagrange_multipliers(),
            Err(DdmError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            builder.setup_multiplicity_scaling(),
            Err(DdmError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            builder.preconditioner(),
            Err(DdmError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn preconditioner_requires_scaling() {
        let builder = two_subdomain_builder(1.0, 1.0);
        assert!(matches!(
            builder.preconditioner(),
            Err(DdmError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn adding_subdomain_discards_scaling() {
        let mut builder = two_subdomain_builder(1.0, 1.0);
        builder.setup_multiplicity_scaling().unwrap();
        assert!(builder.local_scaling(1).is_some());
        builder
            .add_subdomain(csr_from_row_slice(1, 1, &[1.0]).unwrap(), scalar_op(1.0))
            .unwrap();
        assert!(builder.local_scaling(0).is_none());
        assert!(builder.preconditioner().is_err());
    }

    #[test]
    fn multiplicity_scaling_counts_own_rows() {
        // One dof touched by two multipliers, one by a single multiplier.
        let mut builder = ScaledDirichletBuilder::new();
        let jump = csr_from_row_slice(2, 2, &[1.0, 0.0, 1.0, -1.0]).unwrap();
        let schur = MatrixOp::new(csr_from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]).unwrap());
        builder.add_subdomain(jump, schur.into_ptr()).unwrap();
        builder.setup_multiplicity_scaling().unwrap();
        let w = builder.local_scaling(0).unwrap();
        assert_eq!(w.as_slice(), &[3.0, 2.0]);
    }

    #[test]
    fn preconditioner_scales_each_side_by_a_quarter() {
        let mut builder = two_subdomain_builder(3.0, 5.0);
        builder.setup_multiplicity_scaling().unwrap();
        assert_eq!(builder.local_scaling(0).unwrap()[0], 2.0);
        assert_eq!(builder.local_scaling(1).unwrap()[0], 2.0);

        let precond = builder.preconditioner().unwrap();
        assert_eq!(precond.n_subdomains(), 2);
        let y = precond.apply(&DVector::from_element(1, 1.0));
        assert!((y[0] - (3.0 + 5.0) / 4.0).abs() < 1e-14);
    }

    #[test]
    fn deluxe_scaling_matches_multiplicity_for_equal_stiffness() {
        let mut builder = two_subdomain_builder(2.0, 2.0);
        builder
            .setup_deluxe_scaling(&[BoundaryInterface::new(0, 1)])
            .unwrap();
        assert!((builder.local_scaling(0).unwrap()[0] - 2.0).abs() < 1e-14);
        assert!((builder.local_scaling(1).unwrap()[0] - 2.0).abs() < 1e-14);
    }

    #[test]
    fn deluxe_scaling_weights_by_stiffness() {
        let mut builder = two_subdomain_builder(1.0, 3.0);
        builder
            .setup_deluxe_scaling(&[BoundaryInterface::new(0, 1)])
            .unwrap();
        // D_1 = 1/4 = s1/(s1+s2), D_2 = 3/4
        assert!((builder.local_scaling(0).unwrap()[0] - 4.0).abs() < 1e-14);
        assert!((builder.local_scaling(1).unwrap()[0] - 4.0 / 3.0).abs() < 1e-14);

        // D S D per side: (1/4)²·1 + (3/4)²·3
        let precond = builder.preconditioner().unwrap();
        let y = precond.apply(&DVector::from_element(1, 1.0));
        let expected = 1.0 / 16.0 + 3.0 * 9.0 / 16.0;
        assert!((y[0] - expected).abs() < 1e-14);
    }

    #[test]
    fn deluxe_scaling_counts_each_interface_once() {
        let mut once = two_subdomain_builder(1.0, 3.0);
        once.setup_deluxe_scaling(&[BoundaryInterface::new(0, 1)])
            .unwrap();

        let mut repeated = two_subdomain_builder(1.0, 3.0);
        repeated
            .setup_deluxe_scaling(&[
                BoundaryInterface::new(0, 1),
                BoundaryInterface::new(1, 0),
                BoundaryInterface::new(0, 1),
            ])
            .unwrap();

        for k in 0..2 {
            assert_eq!(once.local_scaling(k), repeated.local_scaling(k));
        }
        assert!((repeated.local_scaling(0).unwrap()[0] - 4.0).abs() < 1e-14);
    }

    #[test]
    fn deluxe_scaling_rejects_bad_interfaces() {
        let mut builder = two_subdomain_builder(1.0, 1.0);
        assert!(builder
            .setup_deluxe_scaling(&[BoundaryInterface::new(0, 2)])
            .is_err());
        assert!(builder
            .setup_deluxe_scaling(&[BoundaryInterface::new(1, 1)])
            .is_err());
    }

    #[test]
    fn deluxe_scaling_rejects_nonpositive_diagonal() {
        let mut builder = two_subdomain_builder(1.0, -1.0);
        assert!(matches!(
            builder.setup_deluxe_scaling(&[BoundaryInterface::new(0, 1)]),
            Err(DdmError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn user_scaling_is_validated() {
        let mut builder = two_subdomain_builder(1.0, 1.0);
        let bad = vec![DVector::from_element(1, 1.0), DVector::from_element(1, 0.0)];
        assert!(builder.set_local_scaling(bad).is_err());
        let short = vec![DVector::from_element(1, 1.0)];
        assert!(builder.set_local_scaling(short).is_err());
        let good = vec![DVector::from_element(1, 1.0), DVector::from_element(1, 4.0)];
        builder.set_local_scaling(good).unwrap();
        let y = builder
            .preconditioner()
            .unwrap()
            .apply(&DVector::from_element(1, 1.0));
        assert!((y[0] - (1.0 + 1.0 / 16.0)).abs() < 1e-14);
    }

    #[test]
    fn restrict_to_skeleton_eliminates_interior() {
        // Subdomain [0,1] with h = 1/2, Dirichlet dof 0 as identity row.
        let stiffness = csr_from_row_slice(
            3,
            3,
            &[1.0, 0.0, 0.0, 0.0, 4.0, -2.0, 0.0, -2.0, 2.0],
        )
        .unwrap();
        let jump = csr_from_row_slice(1, 3, &[0.0, 0.0, 1.0]).unwrap();
        let local = restrict_to_skeleton(&jump, &stiffness, &NativeBackend::default()).unwrap();
        assert_eq!(local.jump.ncols(), 1);
        assert_eq!(local.schur.rows(), 1);
        // S = 2 - (-2)(1/4)(-2) = 1
        let s = local.schur.apply(&DVector::from_element(1, 1.0));
        assert!((s[0] - 1.0).abs() < 1e-12);
    }
}
