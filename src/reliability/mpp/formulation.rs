//! RIA and PMA subproblems as [`ConstrainedProblem`]s over a limit-state
//! evaluator.
//!
//! - RIA: `min u·u  s.t.  g(u) − z = 0`.
//! - PMA: `min ±g(u)  s.t.  u·u − β² = 0`, minimizing `g` for
//!   `(cdf ∧ β ≥ 0) ∨ (ccdf ∧ β < 0)` and maximizing otherwise.
//!
//! Evaluator failures are parked in an error slot and reported to the
//! optimizer as [`OptError::ObjectiveEvaluationFailed`]; [`solve_subproblem`]
//! re-raises the original [`ReliabilityError`] after the solve.
use crate::{
    optimization::{
        constrained::{ConstrainedProblem, Cost, Grad, Optimizer, Point, SolveOutcome},
        errors::{OptError, OptResult},
    },
    reliability::{
        core::{
            options::Convention,
            types::{Evaluation, RequestMask},
        },
        errors::{ReliabilityError, ReliabilityResult},
        evaluator::LimitStateEvaluator,
    },
};
use ndarray::Array1;
use std::cell::RefCell;

/// Which MPP subproblem to solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Formulation {
    /// Reliability index approach: fixed response level `target`.
    Ria { target: f64 },
    /// Performance measure approach: fixed reliability index `beta_target`.
    Pma { beta_target: f64, minimize: bool },
}

impl Formulation {
    pub fn ria(target: f64) -> Self {
        Formulation::Ria { target }
    }

    pub fn pma(beta_target: f64, convention: Convention) -> Self {
        let minimize = (convention.is_cdf() && beta_target >= 0.0)
            || (!convention.is_cdf() && beta_target < 0.0);
        Formulation::Pma { beta_target, minimize }
    }

    pub fn is_ria(&self) -> bool {
        matches!(self, Formulation::Ria { .. })
    }
}

/// One subproblem bound to an evaluator, with a single-point sample cache.
pub struct MppProblem<'e> {
    evaluator: &'e dyn LimitStateEvaluator,
    formulation: Formulation,
    cache: RefCell<Option<Evaluation>>,
    error_slot: RefCell<Option<ReliabilityError>>,
}

impl<'e> MppProblem<'e> {
    pub fn new(evaluator: &'e dyn LimitStateEvaluator, formulation: Formulation) -> Self {
        Self { evaluator, formulation, cache: RefCell::new(None), error_slot: RefCell::new(None) }
    }

    /// First evaluator error raised during the solve, if any.
    pub fn take_error(&self) -> Option<ReliabilityError> {
        self.error_slot.borrow_mut().take()
    }

    fn sample(&self, u: &Point, mask: RequestMask) -> OptResult<Evaluation> {
        if let Some(cached) = self.cache.borrow().as_ref() {
            if cached.u == *u && (cached.grad_u.is_some() || !mask.wants_gradient()) {
                return Ok(cached.clone());
            }
        }
        match self.evaluator.evaluate(u, mask) {
            Ok(sample) => {
                *self.cache.borrow_mut() = Some(sample.clone());
                Ok(sample)
            }
            Err(e) => {
                let text = e.to_string();
                let mut slot = self.error_slot.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                Err(OptError::ObjectiveEvaluationFailed { text })
            }
        }
    }

    fn gradient(&self, u: &Point) -> OptResult<Grad> {
        let sample = self.sample(u, RequestMask::ValueGradient)?;
        sample.grad_u.ok_or_else(|| OptError::ObjectiveEvaluationFailed {
            text: "evaluator returned no u-space gradient".to_string(),
        })
    }
}

impl ConstrainedProblem for MppProblem<'_> {
    fn objective(&self, u: &Point) -> OptResult<Cost> {
        match self.formulation {
            Formulation::Ria { .. } => Ok(u.dot(u)),
            Formulation::Pma { minimize, .. } => {
                let value = self.sample(u, RequestMask::Value)?.value;
                Ok(if minimize { value } else { -value })
            }
        }
    }

    fn constraint(&self, u: &Point) -> OptResult<f64> {
        match self.formulation {
            Formulation::Ria { target } => Ok(self.sample(u, RequestMask::Value)?.value - target),
            Formulation::Pma { beta_target, .. } => Ok(u.dot(u) - beta_target * beta_target),
        }
    }

    fn objective_grad(&self, u: &Point) -> OptResult<Grad> {
        match self.formulation {
            Formulation::Ria { .. } => Ok(2.0 * u),
            Formulation::Pma { minimize, .. } => {
                let grad = self.gradient(u)?;
                Ok(if minimize { grad } else { -grad })
            }
        }
    }

    fn constraint_grad(&self, u: &Point) -> OptResult<Grad> {
        match self.formulation {
            Formulation::Ria { .. } => self.gradient(u),
            Formulation::Pma { .. } => Ok(2.0 * u),
        }
    }
}

/// Solve `formulation` on `evaluator` from `u0`.
///
/// # Errors
/// - The evaluator's own error when a callback failed.
/// - [`ReliabilityError::Optimizer`] for any other optimizer error.
pub fn solve_subproblem(
    optimizer: &dyn Optimizer, evaluator: &dyn LimitStateEvaluator, formulation: Formulation,
    u0: &Array1<f64>,
) -> ReliabilityResult<SolveOutcome> {
    let problem = MppProblem::new(evaluator, formulation);
    let outcome = optimizer.solve(&problem, u0.clone());
    match (outcome, problem.take_error()) {
        (Ok(outcome), _) => Ok(outcome),
        (Err(_), Some(original)) => Err(original),
        (Err(e), None) => Err(e.into()),
    }
}
