//! rust_reliability — most-probable-point search and FORM/SORM reliability
//! analysis.
//!
//! Purpose
//! -------
//! Serve as the crate root. The crate estimates failure probabilities of
//! simulation responses by locating most probable points in standard normal
//! space and integrating first- or second-order approximations of the limit
//! state around them.
//!
//! Key behaviors
//! -------------
//! - [`optimization`]: the equality-constrained optimizer contract and its
//!   default augmented-Lagrangian implementation over argmin L-BFGS.
//! - [`reliability`]: transforms, evaluators, the MPP search engine, the
//!   probability integrator and the level-loop controller.
//!
//! Conventions
//! -----------
//! - Indexing is 0-based for response functions and vector components.
//! - Vectors and matrices are `ndarray` containers over `f64`.
//! - Diagnostics go through the `log` facade; the crate never installs a
//!   logger.

pub mod optimization;
pub mod reliability;
