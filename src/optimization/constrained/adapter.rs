//! Adapter that exposes a [`ConstrainedProblem`] to `argmin` as an
//! unconstrained augmented-Lagrangian merit function.
//!
//! For multiplier `λ` and penalty `μ` the merit is
//! `L(x) = f(x) + λ·c(x) + (μ/2)·c(x)²` with gradient
//! `∇L(x) = ∇f(x) + (λ + μ·c(x))·∇c(x)`. When the problem does not provide
//! both analytic gradients, we finite-difference the merit itself.
use std::cell::RefCell;

use crate::optimization::{
    constrained::{
        finite_diff::run_fd_diff,
        traits::ConstrainedProblem,
        types::{Cost, Grad, Point},
        validation::{validate_constraint, validate_grad, validate_value},
    },
    errors::OptError,
};
use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;

/// Bridges a [`ConstrainedProblem`] to `argmin`'s `CostFunction` and `Gradient`
/// for one fixed `(λ, μ)` pair of the outer augmented-Lagrangian loop.
#[derive(Clone, Copy)]
pub struct AugLagAdapter<'a> {
    pub problem: &'a dyn ConstrainedProblem,
    pub lambda: f64,
    pub mu: f64,
}

impl<'a> CostFunction for AugLagAdapter<'a> {
    type Param = Point;
    type Output = Cost;

    /// Evaluate the merit `L(x) = f + λc + (μ/2)c²`.
    ///
    /// # Errors
    /// Propagates any `OptError` from the problem callbacks, and rejects
    /// non-finite objective or constraint values.
    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        let f = self.problem.objective(x)?;
        validate_value(f)?;
        let c = self.problem.constraint(x)?;
        validate_constraint(c)?;
        Ok(f + self.lambda * c + 0.5 * self.mu * c * c)
    }
}

impl<'a> Gradient for AugLagAdapter<'a> {
    type Param = Point;
    type Gradient = Grad;

    /// Evaluate `∇L(x)`.
    ///
    /// Behavior:
    /// - With both analytic gradients: `∇f + (λ + μc)∇c`, validated.
    /// - Otherwise: *central* differences of the merit; if any callback
    ///   failed during differencing (captured via `closure_err`) or the result
    ///   is not finite, retry with *forward* differences.
    ///
    /// # Errors
    /// - Propagates non-`GradientNotImplemented` errors from the callbacks.
    /// - Propagates any error raised by merit evaluations during FD.
    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, Error> {
        let dim = x.len();
        match self.analytic_gradient(x) {
            Ok(g) => {
                validate_grad(&g, dim)?;
                Ok(g)
            }
            Err(OptError::GradientNotImplemented) => {
                let closure_err: RefCell<Option<Error>> = RefCell::new(None);
                let merit = |x: &Point| -> f64 {
                    match self.cost(x) {
                        Ok(val) => val,
                        Err(e) => {
                            let mut slot = closure_err.borrow_mut();
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                            f64::NAN
                        }
                    }
                };
                let fd_grad = x.central_diff(&merit);
                if closure_err.borrow().is_none() && validate_grad(&fd_grad, dim).is_ok() {
                    return Ok(fd_grad);
                }
                run_fd_diff(x, &merit, &closure_err)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<'a> AugLagAdapter<'a> {
    /// Construct a new adapter for fixed multiplier `lambda` and penalty `mu`.
    pub fn new(problem: &'a dyn ConstrainedProblem, lambda: f64, mu: f64) -> Self {
        Self { problem, lambda, mu }
    }

    fn analytic_gradient(&self, x: &Point) -> Result<Grad, OptError> {
        let grad_f = self.problem.objective_grad(x)?;
        let grad_c = self.problem.constraint_grad(x)?;
        let c = self.problem.constraint(x)?;
        validate_constraint(c)?;
        Ok(grad_f + &(grad_c * (self.lambda + self.mu * c)))
    }
}
