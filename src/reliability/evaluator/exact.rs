//! Exact evaluator: the truth model seen through the space transform.
//!
//! Gradients the model does not supply are forward-differenced in x-space;
//! Hessians it does not supply are central-differenced from the u-space
//! gradient (forward fallback) and symmetrized. Every truth-model call is
//! counted.
use crate::{
    optimization::constrained::finite_diff::{compute_hessian, run_fd_diff},
    reliability::{
        core::{
            model::TruthModel,
            transform::SpaceTransform,
            types::{Evaluation, RequestMask, Response},
        },
        errors::{ReliabilityError, ReliabilityResult},
        evaluator::LimitStateEvaluator,
    },
};
use ndarray::{Array1, Array2};
use std::cell::{Cell, RefCell};

pub struct ExactEvaluator<'a> {
    model: &'a dyn TruthModel,
    transform: &'a dyn SpaceTransform,
    fn_index: usize,
    evaluations: Cell<usize>,
}

impl<'a> ExactEvaluator<'a> {
    /// # Errors
    /// - [`ReliabilityError::UnknownResponseFunction`] if `fn_index` is out of
    ///   range for `model`.
    pub fn new(
        model: &'a dyn TruthModel, transform: &'a dyn SpaceTransform, fn_index: usize,
    ) -> ReliabilityResult<Self> {
        let count = model.num_functions();
        if fn_index >= count {
            return Err(ReliabilityError::UnknownResponseFunction { fn_index, count });
        }
        Ok(Self { model, transform, fn_index, evaluations: Cell::new(0) })
    }

    /// Number of truth-model calls so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.get()
    }

    pub fn fn_index(&self) -> usize {
        self.fn_index
    }

    pub fn transform(&self) -> &'a dyn SpaceTransform {
        self.transform
    }

    /// `∂g/∂d` at `x`, when the model provides it.
    pub fn design_gradient(&self, x: &Array1<f64>) -> ReliabilityResult<Option<Array1<f64>>> {
        self.model.design_gradient(x, self.fn_index)
    }

    fn truth(&self, x: &Array1<f64>, mask: RequestMask) -> ReliabilityResult<Response> {
        self.evaluations.set(self.evaluations.get() + 1);
        let response = self.model.evaluate(x, mask, self.fn_index)?;
        self.check_response(&response, x.len())?;
        Ok(response)
    }

    fn check_response(&self, response: &Response, n: usize) -> ReliabilityResult<()> {
        if !response.value.is_finite() {
            return Err(self.unusable(format!("non-finite value {}", response.value)));
        }
        if let Some(grad) = &response.gradient {
            if grad.len() != n {
                return Err(ReliabilityError::DimensionMismatch {
                    what: "truth-model gradient",
                    expected: n,
                    found: grad.len(),
                });
            }
            if grad.iter().any(|v| !v.is_finite()) {
                return Err(self.unusable("non-finite gradient".to_string()));
            }
        }
        if let Some(hess) = &response.hessian {
            if hess.nrows() != n || hess.ncols() != n {
                return Err(ReliabilityError::DimensionMismatch {
                    what: "truth-model Hessian",
                    expected: n,
                    found: hess.nrows().max(hess.ncols()),
                });
            }
            if hess.iter().any(|v| !v.is_finite()) {
                return Err(self.unusable("non-finite Hessian".to_string()));
            }
        }
        Ok(())
    }

    fn unusable(&self, text: String) -> ReliabilityError {
        ReliabilityError::EvaluationError { fn_index: self.fn_index, text }
    }

    fn fd_gradient_x(&self, x: &Array1<f64>) -> ReliabilityResult<Array1<f64>> {
        let closure_err: RefCell<Option<ReliabilityError>> = RefCell::new(None);
        let value = |x: &Array1<f64>| -> f64 {
            match self.truth(x, RequestMask::Value) {
                Ok(response) => response.value,
                Err(e) => {
                    let mut slot = closure_err.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    f64::NAN
                }
            }
        };
        run_fd_diff(x, &value, &closure_err)
    }

    fn fd_hessian_u(&self, u: &Array1<f64>) -> ReliabilityResult<Array2<f64>> {
        let n = u.len();
        let closure_err: RefCell<Option<ReliabilityError>> = RefCell::new(None);
        let grad_u = |u: &Array1<f64>| -> Array1<f64> {
            let grad = self
                .evaluate(u, RequestMask::ValueGradient)
                .and_then(|sample| sample.require_grad_u().cloned());
            match grad {
                Ok(g) => g,
                Err(e) => {
                    let mut slot = closure_err.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    Array1::from_elem(n, f64::NAN)
                }
            }
        };
        compute_hessian(&grad_u, u, &closure_err)
    }
}

impl LimitStateEvaluator for ExactEvaluator<'_> {
    /// # Errors
    /// - Transform errors, [`ReliabilityError::EvaluationError`] for unusable
    ///   model output, and finite-difference failures.
    fn evaluate(&self, u: &Array1<f64>, mask: RequestMask) -> ReliabilityResult<Evaluation> {
        let x = self.transform.u_to_x(u)?;
        let response = self.truth(&x, mask)?;

        let grad_x = match (response.gradient, mask.wants_gradient()) {
            (Some(g), _) => Some(g),
            (None, true) => Some(self.fd_gradient_x(&x)?),
            (None, false) => None,
        };
        let grad_u = match &grad_x {
            Some(g) => Some(self.transform.grad_x_to_u(g, &x)?),
            None => None,
        };

        let (hess_x, hess_u) = match (response.hessian, &grad_x, mask.wants_hessian()) {
            (_, _, false) => (None, None),
            (Some(h), Some(g), true) => {
                let hess_u = self.transform.hess_x_to_u(&h, g, &x)?;
                (Some(h), Some(hess_u))
            }
            _ => (None, Some(self.fd_hessian_u(u)?)),
        };

        Ok(Evaluation { x, u: u.clone(), value: response.value, grad_x, grad_u, hess_x, hess_u })
    }

    fn rebuild(&mut self, _sample: &Evaluation) -> ReliabilityResult<()> {
        Ok(())
    }

    fn clear_history(&mut self) {}
}
