//! reliability::core — data model, options and external contracts.
//!
//! - [`types`]: level requests, evaluation samples, MPP and convergence state,
//!   per-level results.
//! - [`options`]: validated run configuration.
//! - [`levels`]: requested levels and the ordered request queue.
//! - [`transform`]: the x ↔ u contract and the normal transform.
//! - [`model`]: truth-model and importance-sampler contracts.
//! - [`normal`]: standard normal helpers.
pub mod levels;
pub mod model;
pub mod normal;
pub mod options;
pub mod transform;
pub mod types;

pub use self::levels::{LevelSet, validate_request};
pub use self::model::{ImportanceSampler, TruthModel};
pub use self::normal::{inverse_mills, std_normal_cdf, std_normal_inv_cdf, std_normal_pdf};
pub use self::options::{
    ApproxSpace, Convention, IntegrationOrder, ReliabilityOptions, SearchVariant,
    SecondOrderRule, TaylorOrder,
};
pub use self::transform::{NormalTransform, SpaceTransform};
pub use self::types::{
    ConvergenceState, DesignSensitivities, Evaluation, LevelKind, LevelRequest, MppState,
    ReliabilitySearchResult, RequestMask, Response,
};
