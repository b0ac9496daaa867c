//! Errors and non-fatal warnings for the reliability stack.
//!
//! This module defines the fatal error type [`ReliabilityError`] and the
//! non-fatal [`WarningFlags`] bitmask. Fatal errors abort the affected
//! (response function, level) task and propagate to the caller; warnings are
//! accumulated per task, merged by the level-loop controller and surfaced once
//! at the end of a run.
//!
//! ## Conventions
//! - **Indices are 0-based** (response functions, vector components).
//! - Optimizer errors are wrapped through `From<OptError>`; a non-converged
//!   optimizer run is a warning ([`WarningFlags::OPTIMIZATION_FAILURE`]), not
//!   an error.
use crate::optimization::errors::OptError;

/// Result alias for reliability operations that may produce [`ReliabilityError`].
pub type ReliabilityResult<T> = Result<T, ReliabilityError>;

/// Fatal error kinds of the reliability analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum ReliabilityError {
    // ---- Space transform ----
    /// The correlation matrix could not be factorized. Aborts the analysis.
    SingularTransform { reason: String },

    /// A transform parameter (mean, standard deviation, correlation entry) is invalid.
    InvalidTransformParam { index: usize, value: f64, reason: &'static str },

    // ---- Truth model / evaluation ----
    /// The truth model did not return a usable value.
    EvaluationError { fn_index: usize, text: String },

    /// An approximation was queried before it was built.
    ApproximationNotBuilt,

    /// A sample handed to an approximation lacks required derivative data.
    IncompleteSample { what: &'static str },

    /// The expansion at the means has a vanishing u-space gradient, so it
    /// carries no search direction.
    FlatExpansion { norm: f64 },

    /// Vector or matrix dimensions disagree with the number of uncertain variables.
    DimensionMismatch { what: &'static str, expected: usize, found: usize },

    /// The requested response function does not exist.
    UnknownResponseFunction { fn_index: usize, count: usize },

    // ---- Options / levels ----
    /// An option value is out of range.
    InvalidOption { name: &'static str, value: f64, reason: &'static str },

    /// A requested level is not admissible.
    InvalidLevel { fn_index: usize, value: f64, reason: &'static str },

    /// Unknown name when parsing an option enum.
    InvalidOptionName { name: String, reason: &'static str },

    /// Second-order inversion under the Hong rule has no analytic derivative.
    HongInversionUnsupported,

    // ---- Optimizer ----
    /// Wrapper for optimizer errors other than non-convergence.
    Optimizer(OptError),
}

impl std::error::Error for ReliabilityError {}

impl std::fmt::Display for ReliabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Space transform ----
            ReliabilityError::SingularTransform { reason } => {
                write!(f, "Singular space transform: {reason}")
            }
            ReliabilityError::InvalidTransformParam { index, value, reason } => {
                write!(f, "Invalid transform parameter at index {index}: {value}. {reason}")
            }

            // ---- Truth model / evaluation ----
            ReliabilityError::EvaluationError { fn_index, text } => {
                write!(f, "Evaluation of response function {fn_index} failed: {text}")
            }
            ReliabilityError::ApproximationNotBuilt => {
                write!(f, "Approximation evaluated before it was built.")
            }
            ReliabilityError::IncompleteSample { what } => {
                write!(f, "Approximation sample is missing {what}.")
            }
            ReliabilityError::FlatExpansion { norm } => {
                write!(f, "Expansion at the means is flat (|grad_u| = {norm:e}); no search direction.")
            }
            ReliabilityError::DimensionMismatch { what, expected, found } => {
                write!(f, "Dimension mismatch for {what}: expected {expected}, found {found}")
            }
            ReliabilityError::UnknownResponseFunction { fn_index, count } => {
                write!(f, "Response function {fn_index} out of range; model has {count}.")
            }

            // ---- Options / levels ----
            ReliabilityError::InvalidOption { name, value, reason } => {
                write!(f, "Invalid option {name} = {value}: {reason}")
            }
            ReliabilityError::InvalidLevel { fn_index, value, reason } => {
                write!(f, "Invalid level {value} for response function {fn_index}: {reason}")
            }
            ReliabilityError::InvalidOptionName { name, reason } => {
                write!(f, "Invalid option name '{name}': {reason}")
            }
            ReliabilityError::HongInversionUnsupported => {
                write!(f, "Second-order reliability inversion is not available for the Hong rule.")
            }

            // ---- Optimizer ----
            ReliabilityError::Optimizer(err) => {
                write!(f, "Optimizer error: {err}")
            }
        }
    }
}

impl From<OptError> for ReliabilityError {
    fn from(err: OptError) -> Self {
        ReliabilityError::Optimizer(err)
    }
}

/// Bitmask of non-fatal conditions raised during a run.
///
/// Flags are OR-ed together across tasks; [`WarningFlags::names`] lists the
/// set bits in declaration order for the end-of-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WarningFlags(u8);

impl WarningFlags {
    pub const NONE: WarningFlags = WarningFlags(0);
    /// The optimizer exhausted its budget; the best iterate was kept.
    pub const OPTIMIZATION_FAILURE: WarningFlags = WarningFlags(1 << 0);
    /// A second-order term `1 + k·κ` fell below the guard threshold.
    pub const CURVATURE_GUARD_VIOLATION: WarningFlags = WarningFlags(1 << 1);
    /// The second-order Newton inversion did not converge.
    pub const NEWTON_INVERSION_DIVERGENCE: WarningFlags = WarningFlags(1 << 2);
    /// An approximation-based search hit its iteration cap.
    pub const APPROXIMATION_NON_CONVERGENCE: WarningFlags = WarningFlags(1 << 3);
    /// A second-order probability left `[0, 1]`.
    pub const PROBABILITY_OUT_OF_RANGE: WarningFlags = WarningFlags(1 << 4);
    /// Hong sensitivities were reduced to first order.
    pub const HONG_DERIVATIVE_UNAVAILABLE: WarningFlags = WarningFlags(1 << 5);

    const NAMED: [(WarningFlags, &'static str); 6] = [
        (Self::OPTIMIZATION_FAILURE, "OptimizationFailure"),
        (Self::CURVATURE_GUARD_VIOLATION, "CurvatureGuardViolation"),
        (Self::NEWTON_INVERSION_DIVERGENCE, "NewtonInversionDivergence"),
        (Self::APPROXIMATION_NON_CONVERGENCE, "ApproximationNonConvergence"),
        (Self::PROBABILITY_OUT_OF_RANGE, "ProbabilityOutOfRange"),
        (Self::HONG_DERIVATIVE_UNAVAILABLE, "HongDerivativeUnavailable"),
    ];

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: WarningFlags) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: WarningFlags) {
        self.0 |= other.0;
    }

    /// Names of the set flags, in declaration order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl std::ops::BitOr for WarningFlags {
    type Output = WarningFlags;

    fn bitor(self, rhs: WarningFlags) -> WarningFlags {
        WarningFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for WarningFlags {
    fn bitor_assign(&mut self, rhs: WarningFlags) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for WarningFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.names().join(", "))
        }
    }
}
