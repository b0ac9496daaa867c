//! Limit-state evaluators — exact and approximate views of one response
//! function in u-space.
//!
//! Purpose
//! -------
//! Give the MPP search a single [`LimitStateEvaluator`] interface for the
//! truth model and for the surrogates it refines:
//!
//! - [`exact::ExactEvaluator`]: delegates to the truth model, filling in
//!   missing derivatives with finite differences.
//! - [`taylor::TaylorEvaluator`]: first/second-order expansion about one
//!   point (AMV, AMV+, MV).
//! - [`tana::TanaEvaluator`]: two-point adaptive nonlinear approximation.
//!
//! Invariants & assumptions
//! ------------------------
//! - Evaluators are queried with u-space points and always return both the
//!   x- and u-space point of the sample.
//! - `rebuild` must complete before the next optimizer call reads the
//!   evaluator; the search engine sequences this.
//! - `clear_history` drops every stored sample. Call it whenever the outer
//!   (design) variables change.
pub mod exact;
pub mod tana;
pub mod taylor;

use crate::reliability::{
    core::{
        options::ApproxSpace,
        types::{Evaluation, RequestMask},
    },
    errors::{ReliabilityError, ReliabilityResult},
};
use ndarray::{Array1, Array2};

/// Evaluation strategy for one response function.
pub trait LimitStateEvaluator {
    /// Value and requested derivatives at the u-space point `u`.
    fn evaluate(&self, u: &Array1<f64>, mask: RequestMask) -> ReliabilityResult<Evaluation>;

    /// Incorporate a new truth sample. A no-op for exact evaluators.
    fn rebuild(&mut self, sample: &Evaluation) -> ReliabilityResult<()>;

    /// Forget all stored samples.
    fn clear_history(&mut self);
}

/// Point, value, gradient and optional Hessian of `sample` in `space`.
pub(crate) struct SpaceSample {
    pub point: Array1<f64>,
    pub value: f64,
    pub grad: Array1<f64>,
    pub hess: Option<Array2<f64>>,
}

pub(crate) fn sample_in_space(
    sample: &Evaluation, space: ApproxSpace, need_hessian: bool,
) -> ReliabilityResult<SpaceSample> {
    let (point, grad, hess) = match space {
        ApproxSpace::X => (&sample.x, &sample.grad_x, &sample.hess_x),
        ApproxSpace::U => (&sample.u, &sample.grad_u, &sample.hess_u),
    };
    let grad = grad.clone().ok_or(ReliabilityError::IncompleteSample { what: "gradient" })?;
    if need_hessian && hess.is_none() {
        return Err(ReliabilityError::IncompleteSample { what: "Hessian" });
    }
    Ok(SpaceSample { point: point.clone(), value: sample.value, grad, hess: hess.clone() })
}
