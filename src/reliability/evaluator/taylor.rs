//! Local Taylor approximation about a single expansion point.
//!
//! `g̃(v) = g₀ + ∇g₀·d + ½ dᵀH₀d` with `d = v − v₀`, in x- or u-space. The
//! first-order form drops the quadratic term and reports a zero Hessian.
//! `rebuild` replaces the expansion point.
use crate::reliability::{
    core::{
        options::{ApproxSpace, TaylorOrder},
        transform::SpaceTransform,
        types::{Evaluation, RequestMask},
    },
    errors::{ReliabilityError, ReliabilityResult},
    evaluator::{LimitStateEvaluator, SpaceSample, sample_in_space},
};
use ndarray::{Array1, Array2};

pub struct TaylorEvaluator<'a> {
    transform: &'a dyn SpaceTransform,
    space: ApproxSpace,
    order: TaylorOrder,
    expansion: Option<SpaceSample>,
}

impl<'a> TaylorEvaluator<'a> {
    pub fn new(transform: &'a dyn SpaceTransform, space: ApproxSpace, order: TaylorOrder) -> Self {
        Self { transform, space, order, expansion: None }
    }

    /// Whether rebuilds need Hessian data.
    pub fn needs_hessian(&self) -> bool {
        matches!(self.order, TaylorOrder::Second)
    }

    /// Current expansion point in the approximation space.
    pub fn expansion_point(&self) -> Option<&Array1<f64>> {
        self.expansion.as_ref().map(|e| &e.point)
    }
}

impl LimitStateEvaluator for TaylorEvaluator<'_> {
    /// # Errors
    /// - [`ReliabilityError::ApproximationNotBuilt`] before the first rebuild.
    /// - Transform errors.
    fn evaluate(&self, u: &Array1<f64>, mask: RequestMask) -> ReliabilityResult<Evaluation> {
        let exp = self.expansion.as_ref().ok_or(ReliabilityError::ApproximationNotBuilt)?;
        let x = self.transform.u_to_x(u)?;
        let d = match self.space {
            ApproxSpace::X => &x - &exp.point,
            ApproxSpace::U => u - &exp.point,
        };

        let n = d.len();
        let hess = exp.hess.clone().unwrap_or_else(|| Array2::zeros((n, n)));
        let hd = hess.dot(&d);
        let value = exp.value + exp.grad.dot(&d) + 0.5 * d.dot(&hd);
        let grad = &exp.grad + &hd;

        let mut sample =
            Evaluation { x, u: u.clone(), value, grad_x: None, grad_u: None, hess_x: None, hess_u: None };
        if !mask.wants_gradient() {
            return Ok(sample);
        }
        match self.space {
            ApproxSpace::U => {
                sample.grad_u = Some(grad);
                if mask.wants_hessian() {
                    sample.hess_u = Some(hess);
                }
            }
            ApproxSpace::X => {
                sample.grad_u = Some(self.transform.grad_x_to_u(&grad, &sample.x)?);
                if mask.wants_hessian() {
                    sample.hess_u = Some(self.transform.hess_x_to_u(&hess, &grad, &sample.x)?);
                    sample.hess_x = Some(hess);
                }
                sample.grad_x = Some(grad);
            }
        }
        Ok(sample)
    }

    /// Move the expansion point to `sample`.
    ///
    /// # Errors
    /// - [`ReliabilityError::IncompleteSample`] if the sample lacks the
    ///   gradient, or the Hessian for a second-order expansion, in the
    ///   approximation space.
    fn rebuild(&mut self, sample: &Evaluation) -> ReliabilityResult<()> {
        let mut expansion = sample_in_space(sample, self.space, self.needs_hessian())?;
        if !self.needs_hessian() {
            expansion.hess = None;
        }
        self.expansion = Some(expansion);
        Ok(())
    }

    fn clear_history(&mut self) {
        self.expansion = None;
    }
}
