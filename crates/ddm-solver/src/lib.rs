//! Scaled Dirichlet preconditioning for IETI/FETI domain decomposition.
//!
//! The crate is built around matrix-free [`LinearOperator`]s. Sparse
//! matrices, factorizations and composites (sums, products and additive
//! subdomain operators) are all shared as [`OpPtr`] and applied lazily.
//!
//! Typical flow for a decomposed problem:
//!
//! 1. Register every subdomain's stiffness matrix, jump matrix and load in
//!    an [`IetiSystem`]. This yields the multiplier operator `F` and its
//!    right-hand side `d`.
//! 2. Restrict every subdomain to its skeleton with
//!    [`restrict_to_skeleton`] and feed the results into a
//!    [`ScaledDirichletBuilder`]. Choose multiplicity or deluxe scaling and
//!    finalize the preconditioner.
//! 3. Solve `F λ = d` with [`BiCgStab`] and recover the primal solution.

pub mod backend;
pub mod bicgstab;
pub mod error;
pub mod ieti_system;
pub mod model_problem;
pub mod operator;
pub mod scaled_dirichlet;
pub mod schur;
pub mod sparse;

pub use backend::{Factorization, FactorizationMethod, NativeBackend, default_backend};
pub use bicgstab::{BiCgStab, BiCgStabConfig, FailureKind, SolveDiagnostics, SolverState};
pub use error::{DdmError, Result};
pub use ieti_system::IetiSystem;
pub use model_problem::{GlobalProblem1d, LaplaceChain1d, LocalProblem1d, PointLoad};
pub use operator::{
    AdditiveOp, AdditivePart, DiagonalOp, IdentityOp, LinearOperator, MatrixOp, OpPtr, ProductOp,
    SumOp,
};
pub use scaled_dirichlet::{
    BoundaryInterface, LocalSkeleton, ScaledDirichletBuilder, ScaledDirichletPreconditioner,
    restrict_jump_matrix, restrict_to_skeleton, skeleton_dofs,
};
pub use schur::{Blocks, matrix_blocks, schur_complement, schur_complement_of};
