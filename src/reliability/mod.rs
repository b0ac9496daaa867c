//! reliability — MPP search and FORM/SORM probability integration.
//!
//! Purpose
//! -------
//! Estimate failure probabilities of scalar response functions of uncertain
//! inputs. For each requested level, the stack searches the most probable
//! point (MPP) of the limit state in standard normal u-space and converts
//! between response level, reliability index, probability and generalized
//! reliability index.
//!
//! Key behaviors
//! -------------
//! - [`core`]: data model, options, space transform, truth-model and
//!   importance-sampler contracts.
//! - [`evaluator`]: exact, Taylor and TANA views of one response function.
//! - [`mpp`]: RIA/PMA subproblems, the search engine with its per-variant
//!   strategies, and warm starts.
//! - [`curvature`]: principal curvatures at the MPP.
//! - [`integration`]: first/second-order `β ↔ p` conversions and `dp/dβ`.
//! - [`controller`]: the level loop that ties everything together.
//!
//! Invariants & assumptions
//! ------------------------
//! - Everything is single-threaded and synchronous. The two blocking seams
//!   are [`Optimizer::solve`](crate::optimization::constrained::Optimizer)
//!   and [`TruthModel::evaluate`]; both are traits.
//! - Fatal conditions are [`ReliabilityError`]s and abort the affected task;
//!   non-fatal ones are [`WarningFlags`] carried on each result.
//!
//! Downstream usage
//! ----------------
//! 1. Implement [`TruthModel`] for the simulation.
//! 2. Build a [`NormalTransform`] for the uncertain variables.
//! 3. Configure [`ReliabilityOptions`] and pick an optimizer (the default is
//!    [`AugmentedLagrangian`](crate::optimization::constrained::AugmentedLagrangian)).
//! 4. Run a [`LevelLoopController`] over one [`LevelSet`] per response
//!   function, optionally with a [`WarmStartCache`] kept across design
//!   iterations.
//!
//! Testing notes
//! -------------
//! - Unit tests live beside each module; whole-run scenarios (linear and
//!   spherical limit states, variants, SORM, warm starts) are in
//!   `tests/integration_reliability_pipeline.rs`.

pub mod controller;
pub mod core;
pub mod curvature;
pub mod errors;
pub mod evaluator;
pub mod integration;
pub mod mpp;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::controller::{FunctionReport, LevelLoopController, ReliabilityReport};
pub use self::core::{
    ApproxSpace, Convention, DesignSensitivities, ImportanceSampler, IntegrationOrder, LevelKind,
    LevelRequest, LevelSet, MppState, NormalTransform, ReliabilityOptions,
    ReliabilitySearchResult, RequestMask, Response, SearchVariant, SecondOrderRule,
    SpaceTransform, TaylorOrder, TruthModel,
};
pub use self::curvature::{PrincipalCurvatureSet, principal_curvatures};
pub use self::errors::{ReliabilityError, ReliabilityResult, WarningFlags};
pub use self::evaluator::LimitStateEvaluator;
pub use self::mpp::{WarmStartCache, WarmStartEntry};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_reliability::reliability::prelude::*;
//
// to import the everyday reliability surface in a single line.

pub mod prelude {
    pub use super::{
        Convention, FunctionReport, ImportanceSampler, IntegrationOrder, LevelKind, LevelSet,
        LevelLoopController, NormalTransform, ReliabilityError, ReliabilityOptions,
        ReliabilityReport, ReliabilityResult, ReliabilitySearchResult, RequestMask, Response,
        SearchVariant, SecondOrderRule, SpaceTransform, TruthModel, WarmStartCache, WarningFlags,
    };
}
