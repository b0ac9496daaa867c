//! External collaborators: the truth model being analyzed and an optional
//! importance sampler that refines first/second-order probabilities.
use crate::reliability::{
    core::types::{RequestMask, Response},
    errors::ReliabilityResult,
};
use ndarray::Array1;

/// The simulation model whose response functions are analyzed.
///
/// Required:
/// - `num_functions()`: number of scalar response functions.
/// - `evaluate(x, mask, fn_index)`: value and, where available, x-space
///   derivatives of response `fn_index` at `x`. Implementations report an
///   unusable simulation as `ReliabilityError::EvaluationError`.
///
/// Optional:
/// - `design_gradient(x, fn_index)`: `∂g/∂d` with respect to the outer design
///   variables. `Ok(None)` (the default) disables design sensitivities and
///   the outer warm-start correction.
///
/// Missing derivatives are not errors: evaluators fill them in with finite
/// differences.
pub trait TruthModel {
    fn num_functions(&self) -> usize;

    fn evaluate(
        &self, x: &Array1<f64>, mask: RequestMask, fn_index: usize,
    ) -> ReliabilityResult<Response>;

    fn design_gradient(
        &self, _x: &Array1<f64>, _fn_index: usize,
    ) -> ReliabilityResult<Option<Array1<f64>>> {
        Ok(None)
    }
}

/// Optional refinement of an integrated probability by sampling around the MPP.
pub trait ImportanceSampler {
    fn refine(
        &self, mpp_u: &Array1<f64>, fn_index: usize, prior_probability: f64,
        target_response_level: f64,
    ) -> ReliabilityResult<f64>;
}
