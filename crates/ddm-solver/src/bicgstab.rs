//! Preconditioned BiCGStab (biconjugate gradient stabilized) solver.
//!
//! Solves A·x = b where both `A` and the preconditioner `P ≈ A⁻¹` are only
//! known as [`LinearOperator`](crate::operator::LinearOperator)s. Nothing here depends on how the operators
//! were built, so the same solver runs on the multiplier system of a domain
//! decomposition or on a plain sparse matrix.
//!
//! # Iteration
//!
//! ```text
//! ρ_new = ⟨r̂₀, r⟩
//! β     = (ρ_new / ρ_old) · (α / ω)
//! p     = r + β (p − ω v)
//! y = P p,   v = A y,   α = ρ_new / ⟨r̂₀, v⟩
//! s     = r − α v
//! z = P s,   t = A z,   ω = ⟨t, s⟩ / ⟨t, t⟩   (ω = 0 if ⟨t, t⟩ = 0)
//! x    += α y + ω z
//! r    -= α v + ω t
//! ```
//!
//! Convergence is declared when ‖r‖ / ‖b‖ < tolerance.
//!
//! # Breakdown
//!
//! If the shadow residual becomes (numerically) orthogonal to the residual,
//! the solver enters [`SolverState::Restarting`], replaces `r̂₀` by the
//! current residual and continues. Each restart consumes one unit of
//! `max_restarts`; running out is reported as
//! [`DdmError::NumericalBreakdown`].
//!
//! # Example
//!
//! ```no_run
//! use ddm_solver::{BiCgStab, BiCgStabConfig, OpPtr};
//! use nalgebra::DVector;
//!
//! # fn example(matrix: OpPtr, precond: OpPtr, rhs: DVector<f64>) -> ddm_solver::Result<()> {
//! let solver = BiCgStab::new(matrix, precond, BiCgStabConfig::default())?;
//! let (x, info) = solver.solve(&rhs)?;
//!
//! println!("converged: {} after {} iterations", info.converged, info.iterations);
//! println!("relative residual: {:.3e}, |x| = {:.6}", info.relative_residual, x.norm());
//! # Ok(())
//! # }
//! ```

use crate::error::{DdmError, Result};
use crate::operator::{IdentityOp, OpPtr};
use log::{info, trace, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// BiCGStab configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiCgStabConfig {
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Relative residual tolerance ‖r‖ / ‖b‖
    pub tolerance: f64,
    /// Breakdown is declared when |⟨r̂₀, r⟩| < threshold · ⟨r̂₀, r̂₀⟩
    pub breakdown_threshold: f64,
    /// Number of breakdown restarts before giving up
    pub max_restarts: usize,
    /// Record the relative residual of every iteration
    pub keep_history: bool,
}

impl Default for BiCgStabConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-10,
            breakdown_threshold: 1e-32,
            max_restarts: 10,
            keep_history: true,
        }
    }
}

/// Why an iteration stopped without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Iteration cap reached
    NonConvergence,
    /// Restart budget exhausted
    Breakdown,
}

/// State of a BiCGStab run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverState {
    Uninitialized,
    Iterating,
    /// Recovering from a breakdown; holds the number of restarts so far
    Restarting { restarts: usize },
    Converged,
    Failed(FailureKind),
}

/// Diagnostics of a finished solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveDiagnostics {
    /// Number of iterations performed
    pub iterations: usize,
    /// Final ‖r‖ / ‖b‖
    pub relative_residual: f64,
    /// Whether the tolerance was reached
    pub converged: bool,
    /// Terminal state
    pub status: SolverState,
    /// Number of breakdown restarts
    pub restarts: usize,
    /// Relative residual after initialization and after each iteration
    pub residual_history: Vec<f64>,
}

/// Preconditioned BiCGStab solver.
pub struct BiCgStab {
    matrix: OpPtr,
    precond: OpPtr,
    config: BiCgStabConfig,
}

impl BiCgStab {
    /// Create a solver for `matrix` with preconditioner `precond`.
    pub fn new(matrix: OpPtr, precond: OpPtr, config: BiCgStabConfig) -> Result<Self> {
        let n = matrix.rows();
        if matrix.cols() != n {
            return Err(DdmError::dimension("BiCGStab matrix", n, matrix.cols()));
        }
        if precond.rows() != n || precond.cols() != n {
            return Err(DdmError::dimension("BiCGStab preconditioner", n, precond.rows()));
        }
        if !(config.tolerance > 0.0) {
            return Err(DdmError::InvalidConfiguration(format!(
                "tolerance must be positive, got {}",
                config.tolerance
            )));
        }
        Ok(Self {
            matrix,
            precond,
            config,
        })
    }

    /// Solver without preconditioning.
    pub fn unpreconditioned(matrix: OpPtr, config: BiCgStabConfig) -> Result<Self> {
        let precond: OpPtr = Arc::new(IdentityOp::new(matrix.rows()));
        Self::new(matrix, precond, config)
    }

    pub fn config(&self) -> &BiCgStabConfig {
        &self.config
    }

    /// Solve A·x = rhs starting from x₀ = 0.
    pub fn solve(&self, rhs: &DVector<f64>) -> Result<(DVector<f64>, SolveDiagnostics)> {
        self.solve_with_guess(rhs, DVector::zeros(self.matrix.cols()))
    }

    /// Solve A·x = rhs starting from `x0`.
    ///
    /// Reaching the iteration cap is not an error: the iterate with the
    /// smallest residual seen so far is returned with `converged == false`,
    /// and `relative_residual` reports that iterate's residual. Only a
    /// breakdown that restarting cannot resolve fails.
    pub fn solve_with_guess(
        &self,
        rhs: &DVector<f64>,
        x0: DVector<f64>,
    ) -> Result<(DVector<f64>, SolveDiagnostics)> {
        let n = self.matrix.rows();
        if rhs.len() != n {
            return Err(DdmError::dimension("BiCGStab right-hand side", n, rhs.len()));
        }
        if x0.len() != n {
            return Err(DdmError::dimension("BiCGStab initial guess", n, x0.len()));
        }

        let mut it = Iteration::new(self, x0);
        it.init(rhs);

        while it.state == SolverState::Iterating
            || matches!(it.state, SolverState::Restarting { .. })
        {
            if it.iterations >= self.config.max_iterations {
                it.state = SolverState::Failed(FailureKind::NonConvergence);
                it.restore_best();
                break;
            }
            it.step()?;
        }

        let diagnostics = it.diagnostics();
        match diagnostics.status {
            SolverState::Converged => info!(
                "BiCGStab converged in {} iterations (relative residual {:.3e})",
                diagnostics.iterations, diagnostics.relative_residual
            ),
            _ => warn!(
                "BiCGStab did not converge within {} iterations (relative residual {:.3e})",
                diagnostics.iterations, diagnostics.relative_residual
            ),
        }
        Ok((it.x, diagnostics))
    }
}

/// Working set of one BiCGStab run.
struct Iteration<'a> {
    solver: &'a BiCgStab,
    state: SolverState,
    x: DVector<f64>,
    res: DVector<f64>,
    r0: DVector<f64>,
    p: DVector<f64>,
    v: DVector<f64>,
    alpha: f64,
    rho: f64,
    omega: f64,
    rhs_norm: f64,
    error: f64,
    best_x: DVector<f64>,
    best_error: f64,
    iterations: usize,
    restarts: usize,
    history: Vec<f64>,
}

impl<'a> Iteration<'a> {
    fn new(solver: &'a BiCgStab, x: DVector<f64>) -> Self {
        let n = x.len();
        let best_x = x.clone();
        Self {
            solver,
            state: SolverState::Uninitialized,
            x,
            res: DVector::zeros(n),
            r0: DVector::zeros(n),
            p: DVector::zeros(n),
            v: DVector::zeros(n),
            alpha: 1.0,
            rho: 1.0,
            omega: 1.0,
            rhs_norm: 0.0,
            error: 0.0,
            best_x,
            best_error: f64::INFINITY,
            iterations: 0,
            restarts: 0,
            history: Vec::new(),
        }
    }

    fn record_error(&mut self) {
        self.error = self.res.norm() / self.rhs_norm;
        if self.solver.config.keep_history {
            self.history.push(self.error);
        }
        if self.error < self.best_error {
            self.best_error = self.error;
            self.best_x.copy_from(&self.x);
        }
        if self.error < self.solver.config.tolerance {
            self.state = SolverState::Converged;
        }
    }

    /// Replace the current iterate by the best one recorded.
    fn restore_best(&mut self) {
        if self.best_error < self.error {
            std::mem::swap(&mut self.x, &mut self.best_x);
            self.error = self.best_error;
        }
    }

    fn init(&mut self, rhs: &DVector<f64>) {
        self.rhs_norm = rhs.norm();
        if self.rhs_norm == 0.0 {
            // A·x = 0 has the zero solution.
            self.x.fill(0.0);
            self.error = 0.0;
            self.state = SolverState::Converged;
            return;
        }

        self.res = rhs - self.solver.matrix.apply(&self.x);
        self.r0 = self.res.clone();
        self.p.fill(0.0);
        self.v.fill(0.0);
        self.alpha = 1.0;
        self.rho = 1.0;
        self.omega = 1.0;
        self.state = SolverState::Iterating;
        self.record_error();
    }

    /// Count a breakdown and move to the restart state.
    fn breakdown(&mut self, reason: &str) -> Result<()> {
        self.restarts += 1;
        if self.restarts > self.solver.config.max_restarts {
            self.state = SolverState::Failed(FailureKind::Breakdown);
            return Err(DdmError::NumericalBreakdown {
                iterations: self.iterations,
                restarts: self.restarts - 1,
            });
        }
        warn!(
            "BiCGStab breakdown at iteration {} ({}), restarting with new shadow residual ({}/{})",
            self.iterations, reason, self.restarts, self.solver.config.max_restarts
        );
        self.state = SolverState::Restarting {
            restarts: self.restarts,
        };
        self.r0 = self.res.clone();
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        let solver = self.solver;
        let matrix = &solver.matrix;
        let precond = &solver.precond;
        self.iterations += 1;

        let rho_old = self.rho;
        self.rho = self.r0.dot(&self.res);
        if self.rho.abs() < self.solver.config.breakdown_threshold * self.r0.dot(&self.r0) {
            self.breakdown("residual orthogonal to shadow residual")?;
            self.rho = self.r0.dot(&self.r0);
        }

        let beta = (self.rho / rho_old) * (self.alpha / self.omega);
        self.p = &self.res + beta * (&self.p - self.omega * &self.v);

        let y = precond.apply(&self.p);
        self.v = matrix.apply(&y);
        let r0v = self.r0.dot(&self.v);
        if r0v == 0.0 || !r0v.is_finite() {
            // α is undefined. A restart only helps if it changes r̂₀; with
            // r̂₀ = r it would rebuild the same p and hit the same zero.
            if self.r0 == self.res {
                self.state = SolverState::Failed(FailureKind::Breakdown);
                warn!(
                    "BiCGStab breakdown at iteration {}: ⟨r̂₀, v⟩ vanishes with r̂₀ = r",
                    self.iterations
                );
                return Err(DdmError::NumericalBreakdown {
                    iterations: self.iterations,
                    restarts: self.restarts,
                });
            }
            self.breakdown("vanishing ⟨r̂₀, v⟩")?;
            self.p.fill(0.0);
            self.v.fill(0.0);
            self.alpha = 1.0;
            self.rho = 1.0;
            self.omega = 1.0;
            return Ok(());
        }
        self.alpha = self.rho / r0v;

        let s = &self.res - self.alpha * &self.v;
        let z = precond.apply(&s);
        let t = matrix.apply(&z);

        let tt = t.dot(&t);
        self.omega = if tt > 0.0 { t.dot(&s) / tt } else { 0.0 };

        self.x += self.alpha * &y + self.omega * &z;
        self.res -= self.alpha * &self.v + self.omega * &t;

        if matches!(self.state, SolverState::Restarting { .. }) {
            self.state = SolverState::Iterating;
        }
        self.record_error();
        trace!(
            "BiCGStab iteration {}: relative residual {:.6e}",
            self.iterations, self.error
        );
        Ok(())
    }

    fn diagnostics(&self) -> SolveDiagnostics {
        SolveDiagnostics {
            iterations: self.iterations,
            relative_residual: self.error,
            converged: self.state == SolverState::Converged,
            status: self.state,
            restarts: self.restarts,
            residual_history: self.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{DiagonalOp, MatrixOp};
    use crate::sparse::{csr_from_row_slice, csr_from_triplets, to_dense};

    fn tridiagonal(n: usize, diag: f64, off: f64) -> OpPtr {
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for i in 0..n {
            rows.push(i);
            cols.push(i);
            vals.push(diag);
            if i + 1 < n {
                rows.extend([i, i + 1]);
                cols.extend([i + 1, i]);
                vals.extend([off, off]);
            }
        }
        MatrixOp::new(csr_from_triplets(n, n, rows, cols, vals).unwrap()).into_ptr()
    }

    #[test]
    fn spd_system_converges_within_n_iterations() {
        let n = 10;
        let a = tridiagonal(n, 10.0, -1.0);
        let x_true = DVector::from_fn(n, |i, _| (i as f64 + 1.0).sin());
        let b = a.apply(&x_true);

        let solver = BiCgStab::unpreconditioned(a, BiCgStabConfig::default()).unwrap();
        let (x, info) = solver.solve(&b).unwrap();

        assert!(info.converged);
        assert_eq!(info.status, SolverState::Converged);
        assert!(info.iterations <= n, "took {} iterations", info.iterations);
        assert!((x - x_true).norm() < 1e-8);
        assert_eq!(info.residual_history.len(), info.iterations + 1);
    }

    #[test]
    fn exact_preconditioner_converges_in_one_iteration() {
        let a = csr_from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]).unwrap();
        let inv = to_dense(&a).try_inverse().unwrap();
        let inv_csr = csr_from_row_slice(2, 2, inv.transpose().as_slice()).unwrap();

        let solver = BiCgStab::new(
            MatrixOp::new(a).into_ptr(),
            MatrixOp::new(inv_csr).into_ptr(),
            BiCgStabConfig::default(),
        )
        .unwrap();
        let (x, info) = solver.solve(&DVector::from_vec(vec![1.0, 2.0])).unwrap();
        assert!(info.converged);
        assert_eq!(info.iterations, 1);
        // [4 1; 1 3]^{-1} [1; 2] = [1/11; 7/11]
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-12);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn zero_rhs_returns_zero_solution() {
        let a = tridiagonal(3, 2.0, -1.0);
        let solver = BiCgStab::unpreconditioned(a, BiCgStabConfig::default()).unwrap();
        let (x, info) = solver
            .solve_with_guess(&DVector::zeros(3), DVector::from_element(3, 5.0))
            .unwrap();
        assert!(info.converged);
        assert_eq!(info.iterations, 0);
        assert_eq!(x, DVector::zeros(3));
    }

    #[test]
    fn exact_initial_guess_converges_immediately() {
        let a = tridiagonal(4, 3.0, 1.0);
        let x_true = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0]);
        let b = a.apply(&x_true);
        let solver = BiCgStab::unpreconditioned(a, BiCgStabConfig::default()).unwrap();
        let (x, info) = solver.solve_with_guess(&b, x_true.clone()).unwrap();
        assert!(info.converged);
        assert_eq!(info.iterations, 0);
        assert_eq!(x, x_true);
    }

    #[test]
    fn iteration_cap_returns_best_iterate() {
        let n = 50;
        let a = tridiagonal(n, 2.0, -1.0);
        let b = DVector::from_element(n, 1.0);
        let config = BiCgStabConfig {
            max_iterations: 2,
            ..BiCgStabConfig::default()
        };
        let solver = BiCgStab::unpreconditioned(a.clone(), config).unwrap();
        let (x, info) = solver.solve(&b).unwrap();
        assert!(!info.converged);
        assert_eq!(info.status, SolverState::Failed(FailureKind::NonConvergence));
        assert_eq!(info.iterations, 2);
        assert_eq!(info.residual_history.len(), 3);

        let best = info
            .residual_history
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min);
        assert_eq!(info.relative_residual, best);
        assert!(info.relative_residual > 1e-10);

        // The reported residual belongs to the returned iterate.
        let true_residual = (&b - a.apply(&x)).norm() / b.norm();
        assert!((true_residual - info.relative_residual).abs() < 1e-10);
    }

    #[test]
    fn vanishing_shadow_product_without_new_direction_is_fatal() {
        // A = [0 1; 1 0], b = e₀: v = A·r is orthogonal to r̂₀ = r on the
        // first step, and restarting with r̂₀ := r would change nothing.
        let a = MatrixOp::new(csr_from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]).unwrap());
        let solver = BiCgStab::unpreconditioned(a.into_ptr(), BiCgStabConfig::default()).unwrap();
        let result = solver.solve(&DVector::from_vec(vec![1.0, 0.0]));
        assert!(matches!(
            result,
            Err(DdmError::NumericalBreakdown {
                iterations: 1,
                restarts: 0
            })
        ));
    }

    #[test]
    fn breakdown_restarts_and_then_converges() {
        // At the first step ρ = ⟨r̂₀, r̂₀⟩, so a threshold above one forces a
        // restart there.
        let a: OpPtr = Arc::new(DiagonalOp::new(DVector::from_vec(vec![2.0])));
        let config = BiCgStabConfig {
            breakdown_threshold: 2.0,
            max_restarts: 5,
            ..BiCgStabConfig::default()
        };
        let solver = BiCgStab::unpreconditioned(a, config).unwrap();
        let (x, info) = solver.solve(&DVector::from_vec(vec![1.0])).unwrap();
        assert!(info.converged);
        assert_eq!(info.restarts, 1);
        assert_eq!(info.iterations, 1);
        assert!((x[0] - 0.5).abs() < 1e-14);
    }

    #[test]
    fn exhausted_restart_budget_is_fatal() {
        let a: OpPtr = Arc::new(DiagonalOp::new(DVector::from_vec(vec![2.0])));
        let config = BiCgStabConfig {
            breakdown_threshold: 2.0,
            max_restarts: 0,
            ..BiCgStabConfig::default()
        };
        let solver = BiCgStab::unpreconditioned(a, config).unwrap();
        let result = solver.solve(&DVector::from_vec(vec![1.0]));
        assert!(matches!(
            result,
            Err(DdmError::NumericalBreakdown {
                iterations: 1,
                restarts: 0
            })
        ));
    }

    #[test]
    fn dimension_mismatches_are_reported() {
        let a = tridiagonal(3, 2.0, -1.0);
        let p: OpPtr = Arc::new(IdentityOp::new(2));
        assert!(BiCgStab::new(a.clone(), p, BiCgStabConfig::default()).is_err());

        let solver = BiCgStab::unpreconditioned(a, BiCgStabConfig::default()).unwrap();
        assert!(matches!(
            solver.solve(&DVector::zeros(4)),
            Err(DdmError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: BiCgStabConfig = serde_json::from_str(r#"{"tolerance":1e-6}"#).unwrap();
        assert_eq!(config.tolerance, 1e-6);
        assert_eq!(config.max_iterations, 1000);
        assert_eq!(config.max_restarts, 10);
    }
}
