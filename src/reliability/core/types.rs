//! Core data carriers of the reliability stack.
//!
//! - [`LevelKind`] / [`LevelRequest`]: what a task is asked to compute.
//! - [`RequestMask`] / [`Response`]: the truth-model evaluation contract.
//! - [`Evaluation`]: a limit-state sample at a point, derivatives optional.
//! - [`MppState`]: the converged most probable point of one task.
//! - [`ConvergenceState`]: iteration bookkeeping of approximation searches.
//! - [`ReliabilitySearchResult`] / [`DesignSensitivities`]: per-level output.
use crate::reliability::{
    core::options::ITERATIONS_PER_VARIABLE,
    errors::{ReliabilityError, ReliabilityResult, WarningFlags},
};
use ndarray::{Array1, Array2};

/// Kind of a requested level.
///
/// Response levels are solved with the reliability index approach (RIA); all
/// other kinds with the performance measure approach (PMA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    ResponseLevel,
    ProbabilityLevel,
    ReliabilityLevel,
    GenReliabilityLevel,
}

impl LevelKind {
    pub fn is_ria(self) -> bool {
        matches!(self, LevelKind::ResponseLevel)
    }
}

/// One queued level for one response function. Immutable once queued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelRequest {
    pub kind: LevelKind,
    pub target: f64,
    pub fn_index: usize,
}

/// Which derivatives an evaluation must return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMask {
    Value,
    ValueGradient,
    ValueGradientHessian,
}

impl RequestMask {
    pub fn wants_gradient(self) -> bool {
        !matches!(self, RequestMask::Value)
    }

    pub fn wants_hessian(self) -> bool {
        matches!(self, RequestMask::ValueGradientHessian)
    }
}

/// Truth-model output in x-space. Derivatives may be absent even when
/// requested; evaluators then fall back to finite differences.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub value: f64,
    pub gradient: Option<Array1<f64>>,
    pub hessian: Option<Array2<f64>>,
}

impl Response {
    pub fn value(value: f64) -> Self {
        Self { value, gradient: None, hessian: None }
    }

    pub fn with_gradient(value: f64, gradient: Array1<f64>) -> Self {
        Self { value, gradient: Some(gradient), hessian: None }
    }
}

/// A limit-state sample at one point, in both spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub x: Array1<f64>,
    pub u: Array1<f64>,
    pub value: f64,
    pub grad_x: Option<Array1<f64>>,
    pub grad_u: Option<Array1<f64>>,
    pub hess_x: Option<Array2<f64>>,
    pub hess_u: Option<Array2<f64>>,
}

impl Evaluation {
    /// u-space gradient, or an error naming what is missing.
    pub fn require_grad_u(&self) -> ReliabilityResult<&Array1<f64>> {
        self.grad_u.as_ref().ok_or(ReliabilityError::IncompleteSample { what: "u-space gradient" })
    }

    /// Promote to an [`MppState`]; requires the u-space gradient.
    pub fn into_mpp_state(self) -> ReliabilityResult<MppState> {
        let grad_u = self
            .grad_u
            .ok_or(ReliabilityError::IncompleteSample { what: "u-space gradient" })?;
        Ok(MppState {
            x: self.x,
            u: self.u,
            value: self.value,
            grad_x: self.grad_x,
            grad_u,
            hess_x: self.hess_x,
            hess_u: self.hess_u,
        })
    }
}

/// Most probable point of one (response function, level) task.
#[derive(Debug, Clone, PartialEq)]
pub struct MppState {
    pub x: Array1<f64>,
    pub u: Array1<f64>,
    pub value: f64,
    pub grad_x: Option<Array1<f64>>,
    pub grad_u: Array1<f64>,
    pub hess_x: Option<Array2<f64>>,
    pub hess_u: Option<Array2<f64>>,
}

impl MppState {
    pub fn curvature_data_available(&self) -> bool {
        self.hess_u.is_some()
    }

    pub fn grad_u_norm(&self) -> f64 {
        self.grad_u.dot(&self.grad_u).sqrt()
    }
}

/// Iteration bookkeeping for approximation-based searches.
///
/// The metric is `‖u_new − u_prev‖₂` of the latest step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceState {
    pub iteration: usize,
    pub metric: f64,
    pub max_iter: usize,
}

impl ConvergenceState {
    /// Fresh state for `n` uncertain variables; `cap` overrides `25·n`.
    pub fn new(n: usize, cap: Option<usize>) -> Self {
        let max_iter = cap.unwrap_or(ITERATIONS_PER_VARIABLE * n.max(1));
        Self { iteration: 0, metric: f64::INFINITY, max_iter }
    }

    /// Record one step from `u_prev` to `u_new`.
    pub fn record(&mut self, u_prev: &Array1<f64>, u_new: &Array1<f64>) {
        let step = u_new - u_prev;
        self.metric = step.dot(&step).sqrt();
        self.iteration += 1;
    }

    /// Record the first candidate, which has no predecessor to compare with.
    pub fn record_first(&mut self) {
        self.metric = f64::INFINITY;
        self.iteration += 1;
    }

    pub fn is_converged(&self, tol: f64) -> bool {
        self.metric < tol
    }

    pub fn cap_exceeded(&self) -> bool {
        self.iteration >= self.max_iter
    }
}

/// Sensitivities of the four result quantities with respect to the outer
/// design variables.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignSensitivities {
    pub response_level: Array1<f64>,
    pub reliability_index: Array1<f64>,
    pub probability: Array1<f64>,
    pub gen_reliability_index: Array1<f64>,
}

/// Output of one level request. Produced exactly once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReliabilitySearchResult {
    pub request: LevelRequest,
    pub response_level: f64,
    pub probability: f64,
    pub reliability_index: f64,
    pub gen_reliability_index: f64,
    pub mpp: MppState,
    pub converged: bool,
    pub warnings: WarningFlags,
    pub truth_evaluations: usize,
    pub sensitivities: Option<DesignSensitivities>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // The convergence metric is the step length and the cap defaults to 25·n.
    fn convergence_state_tracks_step_and_cap() {
        // Arrange
        let mut state = ConvergenceState::new(2, None);
        assert_eq!(state.max_iter, 50);
        assert!(!state.is_converged(1e-3));

        // Act
        state.record(&array![0.0, 0.0], &array![3.0, 4.0]);

        // Assert
        assert_eq!(state.iteration, 1);
        assert_eq!(state.metric, 5.0);
        assert!(!state.is_converged(1e-3));
        state.record(&array![3.0, 4.0], &array![3.0, 4.0]);
        assert!(state.is_converged(1e-3));

        let capped = ConvergenceState { iteration: 3, ..ConvergenceState::new(2, Some(3)) };
        assert!(capped.cap_exceeded());
    }

    #[test]
    // Purpose
    // -------
    // An evaluation without a u-space gradient cannot become an MPP.
    fn mpp_state_requires_gradient() {
        let eval = Evaluation {
            x: array![1.0],
            u: array![1.0],
            value: 0.0,
            grad_x: None,
            grad_u: None,
            hess_x: None,
            hess_u: None,
        };
        assert!(matches!(eval.into_mpp_state(), Err(ReliabilityError::IncompleteSample { .. })));
    }
}
