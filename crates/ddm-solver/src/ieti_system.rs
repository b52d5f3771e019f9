//! Lagrange-multiplier (IETI/FETI) system of a non-overlapping decomposition.
//!
//! Each subdomain `k` contributes a local stiffness matrix `A_k`, a jump
//! matrix `B_k` and a local load `f_k`. Continuity `Σ B_k u_k = 0` is
//! enforced by multipliers `λ`:
//!
//! ```text
//!   A_k u_k + B_kᵀ λ = f_k            (every k)
//!   Σ_k B_k u_k      = 0
//! ```
//!
//! Eliminating `u_k` gives the multiplier system
//!
//! ```text
//!   F λ = d,   F = Σ_k B_k A_k⁻¹ B_kᵀ,   d = Σ_k B_k A_k⁻¹ f_k
//! ```
//!
//! which is solved with [`BiCgStab`](crate::BiCgStab) and preconditioned by
//! the scaled Dirichlet preconditioner. Afterwards
//! `u_k = A_k⁻¹ (f_k − B_kᵀ λ)`.

use crate::backend::Factorization;
use crate::error::{DdmError, Result};
use crate::operator::{AdditiveOp, OpPtr};
use crate::sparse::{csr_matvec, csr_transpose_matvec};
use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use std::sync::Arc;

struct LocalProblem {
    jump: Arc<CsrMatrix<f64>>,
    rhs: DVector<f64>,
    solver: OpPtr,
}

/// Collection of factorized local problems sharing one multiplier space.
#[derive(Default)]
pub struct IetiSystem {
    locals: Vec<LocalProblem>,
}

impl IetiSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, n: usize) {
        self.locals.reserve(n);
    }

    /// Register and factorize one subdomain.
    pub fn add_subdomain(
        &mut self,
        jump: CsrMatrix<f64>,
        matrix: &CsrMatrix<f64>,
        rhs: DVector<f64>,
        factorization: &dyn Factorization,
    ) -> Result<()> {
        let k = self.locals.len();
        if let Some(first) = self.locals.first() {
            if jump.nrows() != first.jump.nrows() {
                return Err(DdmError::StructuralMismatch(format!(
                    "jump matrix of subdomain {} has {} rows, expected {}",
                    k,
                    jump.nrows(),
                    first.jump.nrows()
                )));
            }
        }
        if jump.ncols() != matrix.nrows() || rhs.len() != matrix.nrows() {
            return Err(DdmError::StructuralMismatch(format!(
                "subdomain {}: {} local dofs, jump matrix has {} columns, load has {} entries",
                k,
                matrix.nrows(),
                jump.ncols(),
                rhs.len()
            )));
        }

        debug!("IETI subdomain {}: {} local dofs", k, matrix.nrows());
        let solver = factorization.factorize(matrix)?;
        self.locals.push(LocalProblem {
            jump: Arc::new(jump),
            rhs,
            solver,
        });
        Ok(())
    }

    pub fn n_subdomains(&self) -> usize {
        self.locals.len()
    }

    pub fn n_lagrange_multipliers(&self) -> Result<usize> {
        self.locals
            .first()
            .map(|l| l.jump.nrows())
            .ok_or_else(|| {
                DdmError::InvalidConfiguration(
                    "number of Lagrange multipliers requires at least one subdomain".into(),
                )
            })
    }

    /// The multiplier operator F = Σ_k B_k A_k⁻¹ B_kᵀ.
    pub fn schur_complement(&self) -> Result<OpPtr> {
        let n = self.n_lagrange_multipliers()?;
        let mut additive = AdditiveOp::with_capacity(n, self.locals.len());
        for local in &self.locals {
            additive.add_operator(local.jump.clone(), local.solver.clone())?;
        }
        Ok(additive.into_ptr())
    }

    /// The right-hand side d = Σ_k B_k A_k⁻¹ f_k.
    pub fn rhs_for_schur_complement(&self) -> Result<DVector<f64>> {
        let n = self.n_lagrange_multipliers()?;
        Ok(self
            .locals
            .par_iter()
            .map(|local| csr_matvec(&local.jump, &local.solver.apply(&local.rhs)))
            .reduce(|| DVector::zeros(n), |a, b| a + b))
    }

    /// Local solutions u_k = A_k⁻¹ (f_k − B_kᵀ λ).
    pub fn construct_solution_from_lagrange_multipliers(
        &self,
        multipliers: &DVector<f64>,
    ) -> Result<Vec<DVector<f64>>> {
        let n = self.n_lagrange_multipliers()?;
        if multipliers.len() != n {
            return Err(DdmError::dimension("Lagrange multipliers", n, multipliers.len()));
        }
        Ok(self
            .locals
            .par_iter()
            .map(|local| {
                let load = &local.rhs - csr_transpose_matvec(&local.jump, multipliers);
                local.solver.apply(&load)
            })
            .collect())
    }
}
