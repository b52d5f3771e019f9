//! Factorization backend abstraction.
//!
//! Interior blocks `A11` (for the local Schur complements) and full local
//! stiffness matrices (for the multiplier system) have to be inverted many
//! times with the same matrix. This layer factorizes once and hands the
//! factorization back as a [`LinearOperator`](crate::operator::LinearOperator)
//! realizing the inverse, so the rest of the crate never sees the concrete
//! numerical library.
//!
//! # Backends
//!
//! - **Native** (default): nalgebra-sparse `CscCholesky` for SPD blocks, or a
//!   dense nalgebra LU for small or indefinite blocks.
//!
//! # Architecture
//!
//! ```text
//! Partitioning (CSR blocks A00, A01, A10, A11)
//!         │
//!         ▼
//! Factorization trait ── factorize(A11) ──► OpPtr realizing A11⁻¹
//!         │
//!         ▼
//! NativeBackend (SparseCholesky | DenseLu)
//! ```

pub mod native;
pub mod traits;

pub use native::{FactorizationMethod, NativeBackend};
pub use traits::*;

/// Returns the default factorization backend.
pub fn default_backend() -> Box<dyn Factorization> {
    Box::new(NativeBackend::default())
}
