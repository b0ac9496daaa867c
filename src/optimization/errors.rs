use argmin::core::{ArgminError, Error};

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OptError {
    // ---- Gradient ----
    /// Implies that FD should be used
    GradientNotImplemented,

    /// Gradient dimensions do not match point dimensions.
    GradientDimMismatch {
        expected: usize,
        found: usize,
    },

    /// Gradient elements need to be finite
    InvalidGradient {
        index: usize,
        value: f64,
        reason: &'static str,
    },

    // ---- SolverOptions ----
    /// Gradient tolerance needs to be positive and finite.
    InvalidTolGrad {
        tol: f64,
        reason: &'static str,
    },
    /// Cost change tolerance needs to be positive and finite.
    InvalidTolCost {
        tol: f64,
        reason: &'static str,
    },
    /// Constraint violation tolerance needs to be positive and finite.
    InvalidTolConstraint {
        tol: f64,
        reason: &'static str,
    },
    /// Step tolerance needs to be positive and finite.
    InvalidTolStep {
        tol: f64,
        reason: &'static str,
    },
    /// Maximum iterations needs to be positive.
    InvalidMaxIter {
        max_iter: usize,
        reason: &'static str,
    },
    /// At least one tolerance must be provided.
    NoTolerancesProvided,

    /// Invalid line searcher name.
    InvalidLineSearch {
        name: String,
        reason: &'static str,
    },

    /// lbfgs_mem needs to be at least 1.
    InvalidLBFGSMem {
        mem: usize,
        reason: &'static str,
    },

    /// Penalty parameters must be finite, positive, and growth must exceed one.
    InvalidPenalty {
        value: f64,
        reason: &'static str,
    },

    // ---- Objective / constraint callbacks ----
    /// Cost function returned a non-finite value.
    NonFiniteCost {
        value: f64,
    },

    /// Constraint function returned a non-finite value.
    NonFiniteConstraint {
        value: f64,
    },

    /// A problem callback failed; the original error is held by the problem.
    ObjectiveEvaluationFailed {
        text: String,
    },

    // ---- Optimizer outcome ----
    /// Optimal point entries must be finite.
    InvalidPointHat {
        index: usize,
        value: f64,
        reason: &'static str,
    },

    /// Optimal point is missing
    MissingPointHat,

    // ---- Argmin ---
    /// Wrapper for argmin::InvalidParameter
    InvalidParameter {
        text: String,
    },
    /// Wrapper for argmin::NotImplemented
    NotImplemented {
        text: String,
    },
    /// Wrapper for argmin::NotInitialized
    NotInitialized {
        text: String,
    },
    /// Wrapper for argmin::ConditionViolated
    ConditionViolated {
        text: String,
    },
    /// Wrapper for argmin::CheckPointNotFound
    CheckPointNotFound {
        text: String,
    },
    /// Wrapper for argmin::PotentialBug
    PotentialBug {
        text: String,
    },
    /// Wrapper for argmin::ImpossibleError
    ImpossibleError {
        text: String,
    },
    /// Wrapper for other argmin::Error types
    BackendError {
        text: String,
    },

    // ---- Finite Diffs ----
    /// Hessian matrix dimensions do not match point dimensions.
    HessianDimMismatch {
        expected: usize,
        found: (usize, usize),
    },

    /// Hessian values need to be finite.
    InvalidHessian {
        row: usize,
        col: usize,
        value: f64,
    },

    // ---- Fallback ----
    UnknownError,
}

impl OptError {
    /// `true` when the error came from a problem callback rather than from the
    /// solver machinery. Callback failures are fatal for the caller; solver
    /// failures leave a usable best iterate.
    pub fn is_callback_failure(&self) -> bool {
        matches!(
            self,
            OptError::ObjectiveEvaluationFailed { .. }
                | OptError::NonFiniteCost { .. }
                | OptError::NonFiniteConstraint { .. }
        )
    }
}

impl std::error::Error for OptError {}

impl std::fmt::Display for OptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Gradient ----
            OptError::GradientNotImplemented => {
                write!(f, "Analytic gradient not implemented")
            }
            OptError::GradientDimMismatch { expected, found } => {
                write!(f, "Gradient dimension mismatch: expected {expected}, found {found}")
            }
            OptError::InvalidGradient { index, value, reason } => {
                write!(f, "Invalid gradient at index {index}: {value}: {reason}")
            }

            // ---- SolverOptions ----
            OptError::InvalidTolGrad { tol, reason } => {
                write!(f, "Invalid gradient tolerance {tol}: {reason}")
            }
            OptError::InvalidTolCost { tol, reason } => {
                write!(f, "Invalid cost function change tolerance {tol}: {reason}")
            }
            OptError::InvalidTolConstraint { tol, reason } => {
                write!(f, "Invalid constraint tolerance {tol}: {reason}")
            }
            OptError::InvalidTolStep { tol, reason } => {
                write!(f, "Invalid step tolerance {tol}: {reason}")
            }
            OptError::InvalidMaxIter { max_iter, reason } => {
                write!(f, "Invalid maximum iterations {max_iter}: {reason}")
            }
            OptError::NoTolerancesProvided => {
                write!(f, "No tolerances provided")
            }
            OptError::InvalidLineSearch { name, reason } => {
                write!(f, "Invalid line searcher '{name}': {reason}")
            }
            OptError::InvalidLBFGSMem { mem, reason } => {
                write!(f, "Invalid L-BFGS memory {mem}: {reason}")
            }
            OptError::InvalidPenalty { value, reason } => {
                write!(f, "Invalid penalty setting {value}: {reason}")
            }

            // ---- Objective / constraint callbacks ----
            OptError::NonFiniteCost { value } => {
                write!(f, "Non-finite cost value: {value}")
            }
            OptError::NonFiniteConstraint { value } => {
                write!(f, "Non-finite constraint value: {value}")
            }
            OptError::ObjectiveEvaluationFailed { text } => {
                write!(f, "Problem evaluation failed: {text}")
            }

            // ---- Optimizer outcome ----
            OptError::InvalidPointHat { index, value, reason } => {
                write!(f, "Invalid optimal point at index {index}: {value}: {reason}")
            }
            OptError::MissingPointHat => {
                write!(f, "Missing optimal point")
            }

            // ---- Argmin ----
            OptError::InvalidParameter { text } => {
                write!(f, "Invalid parameter: {text}")
            }
            OptError::NotImplemented { text } => {
                write!(f, "Not implemented: {text}")
            }
            OptError::NotInitialized { text } => {
                write!(f, "Not initialized: {text}")
            }
            OptError::ConditionViolated { text } => {
                write!(f, "Condition violated: {text}")
            }
            OptError::CheckPointNotFound { text } => {
                write!(f, "Checkpoint not found: {text}")
            }
            OptError::PotentialBug { text } => {
                write!(f, "Potential bug: {text}")
            }
            OptError::ImpossibleError { text } => {
                write!(f, "Impossible error: {text}")
            }
            OptError::BackendError { text } => {
                write!(f, "Backend error: {text}")
            }

            // ---- Finite Diffs ----
            OptError::HessianDimMismatch { expected, found } => {
                write!(
                    f,
                    "Hessian dimension mismatch: expected ({expected}, {expected}), found {found:?}"
                )
            }
            OptError::InvalidHessian { row, col, value } => {
                write!(f, "Invalid Hessian at ({row}, {col}): {value}, must be finite")
            }

            // ---- Fallback ----
            OptError::UnknownError => {
                write!(f, "Unknown error")
            }
        }
    }
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        // Errors raised by our own callbacks travel through argmin boxed; unwrap
        // them first so callers see the original variant.
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast() {
            Ok(opt_err) => match opt_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => OptError::CheckPointNotFound { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => OptError::ImpossibleError { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Round-tripping `OptError` through argmin's boxed error type.
    // - Mapping of argmin's own error enum into `OptError`.
    // - Classification of callback failures versus solver failures.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // An `OptError` boxed into `argmin::core::Error` by a cost callback must
    // come back out unchanged.
    //
    // Given
    // -----
    // - `OptError::ObjectiveEvaluationFailed` converted into an argmin error.
    //
    // Expect
    // ------
    // - `OptError::from` yields the same variant and payload.
    fn boxed_opt_error_round_trips() {
        // Arrange
        let original = OptError::ObjectiveEvaluationFailed { text: "model crashed".to_string() };
        let boxed: Error = original.clone().into();

        // Act
        let back = OptError::from(boxed);

        // Assert
        assert_eq!(back, original);
    }

    #[test]
    // Purpose
    // -------
    // Argmin's own errors keep their category after conversion.
    //
    // Given
    // -----
    // - `ArgminError::ConditionViolated`.
    //
    // Expect
    // ------
    // - `OptError::ConditionViolated` with the same text.
    fn argmin_error_maps_to_matching_variant() {
        // Arrange
        let boxed: Error = ArgminError::ConditionViolated { text: "descent".to_string() }.into();

        // Act
        let back = OptError::from(boxed);

        // Assert
        assert_eq!(back, OptError::ConditionViolated { text: "descent".to_string() });
    }

    #[test]
    // Purpose
    // -------
    // Only callback-originated errors count as callback failures.
    //
    // Expect
    // ------
    // - Callback variants report `true`; argmin wrappers report `false`.
    fn callback_failures_are_classified() {
        assert!(OptError::ObjectiveEvaluationFailed { text: String::new() }.is_callback_failure());
        assert!(OptError::NonFiniteConstraint { value: f64::NAN }.is_callback_failure());
        assert!(!OptError::ConditionViolated { text: String::new() }.is_callback_failure());
    }
}
