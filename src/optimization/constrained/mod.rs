//! constrained — argmin-powered solver for single equality-constrained problems.
//!
//! Purpose
//! -------
//! Provide the Optimizer contract used by the MPP search engine together with
//! a default implementation. Callers implement [`ConstrainedProblem`] for
//! `min f(x) s.t. c(x) = 0` and hand it to any [`Optimizer`]; the default
//! [`AugmentedLagrangian`] runs L-BFGS on augmented-Lagrangian merit
//! functions with configurable line search, tolerances and
//! finite-difference fallbacks.
//!
//! Key behaviors
//! -------------
//! - Convert a constrained problem into a sequence of Argmin-compatible
//!   unconstrained merits via [`adapter::AugLagAdapter`].
//! - Build L-BFGS solvers through [`builders`] and execute them with
//!   [`run::run_lbfgs`].
//! - Normalize results into a [`SolveOutcome`]; exhausting the budget is a
//!   non-converged outcome, not an error.
//! - Provide finite-difference helpers in [`finite_diff`] for gradients and
//!   Hessians when analytic derivatives are missing.
//!
//! Invariants & assumptions
//! ------------------------
//! - Problem callbacks treat invalid inputs as recoverable
//!   [`OptError`](crate::optimization::errors::OptError) values, not panics.
//! - Points, gradients and Hessians use the aliases in [`types`]; all are
//!   assumed finite whenever optimization proceeds.
//! - Configuration types ([`Tolerances`], [`SolverOptions`],
//!   [`AugLagOptions`]) are validated on construction.
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover merit/gradient wiring in [`adapter`],
//!   builder wiring, finite differences, configuration invariants, and
//!   end-to-end solves of small problems with known answers.

pub mod adapter;
pub mod augmented_lagrangian;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::augmented_lagrangian::{AugLagOptions, AugmentedLagrangian};
pub use self::traits::{
    ConstrainedProblem, LineSearcher, Optimizer, SolveOutcome, SolverOptions, Tolerances,
};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Hessian, Point};

pub mod prelude {
    pub use super::augmented_lagrangian::{AugLagOptions, AugmentedLagrangian};
    pub use super::traits::{
        ConstrainedProblem, LineSearcher, Optimizer, SolveOutcome, SolverOptions, Tolerances,
    };
    pub use super::types::{Cost, Grad, Hessian, Point};
}
