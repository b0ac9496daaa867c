//! optimization — constrained solver stack, numerical helpers, and unified
//! error surface.
//!
//! Purpose
//! -------
//! Provide the optimization layer the reliability engine plugs into: an
//! Optimizer contract for single equality-constrained subproblems, a default
//! Argmin-backed augmented-Lagrangian implementation, finite-difference
//! derivative helpers, and a single error/result surface.
//!
//! Conventions
//! -----------
//! - All solvers minimize. Callers that need a maximum negate their
//!   objective.
//! - Points, gradients, and Hessians are represented using `ndarray`-based
//!   aliases (`Point`, `Grad`, `Hessian`).
//! - Public optimization entrypoints that can fail return `OptResult<T>`;
//!   callers never see raw Argmin errors.
//! - This layer only logs at `debug` level; reporting belongs to callers.
//!
//! Downstream usage
//! ----------------
//! - The MPP search engine implements `ConstrainedProblem` for its RIA and
//!   PMA formulations and calls any `Optimizer`.
//! - Limit-state evaluators use `constrained::finite_diff` when the truth
//!   model lacks analytic derivatives.

pub mod constrained;
pub mod errors;

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::constrained::prelude::*;
    pub use super::errors::{OptError, OptResult};
}
