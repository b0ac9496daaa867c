//! mpp — most-probable-point search.
//!
//! - [`formulation`]: RIA/PMA subproblems handed to the optimizer.
//! - [`engine`]: the search state machine and its per-variant strategies.
//! - [`warm_start`]: starting points between levels and outer invocations.
pub mod engine;
pub mod formulation;
pub mod warm_start;

pub use self::engine::{MppSearchEngine, SearchOutcome, SearchStrategy, select_strategy, signed_beta};
pub use self::formulation::Formulation;
pub use self::warm_start::{WarmStartCache, WarmStartEntry};
