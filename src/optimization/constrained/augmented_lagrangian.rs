//! Default [`Optimizer`]: augmented Lagrangian outer loop over argmin L-BFGS.
//!
//! For `min f(x) s.t. c(x) = 0` each outer iteration minimizes the merit
//! `f + λc + (μ/2)c²` with L-BFGS from the previous iterate, then applies the
//! first-order multiplier update `λ ← λ + μc`. The multiplier starts from its
//! least-squares estimate at `x0` when analytic gradients are available. The
//! penalty grows by `penalty_growth` whenever the violation failed to shrink
//! by a factor of 4.
//!
//! Termination
//! -----------
//! - Converged: `|c| ≤ tol_constraint` and the outer step `‖Δx‖ ≤ tol_step`.
//! - Not converged (still `Ok`): outer budget exhausted, or the inner solver
//!   backend failed (e.g., a line-search breakdown). The last accepted
//!   iterate is returned with `converged = false`.
//! - `Err`: configuration errors and failures raised by the problem's own
//!   callbacks.
use crate::optimization::{
    constrained::{
        adapter::AugLagAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::{InnerOutcome, run_lbfgs},
        traits::{ConstrainedProblem, LineSearcher, Optimizer, SolveOutcome, SolverOptions},
        types::{FnEvalMap, Point},
        validation::{validate_constraint, verify_tol_constraint, verify_tol_step},
    },
    errors::{OptError, OptResult},
};
use argmin::core::Gradient;
use argmin_math::ArgminL2Norm;

const PENALTY_MAX: f64 = 1e10;
const VIOLATION_REDUCTION: f64 = 0.25;

/// Outer-loop configuration for [`AugmentedLagrangian`].
///
/// Default:
/// - `tol_constraint = 1e-10`, `tol_step = 1e-8`, `max_outer_iter = 100`
/// - `penalty0 = 10`, `penalty_growth = 10`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugLagOptions {
    pub tol_constraint: f64,
    pub tol_step: f64,
    pub max_outer_iter: usize,
    pub penalty0: f64,
    pub penalty_growth: f64,
}

impl AugLagOptions {
    /// Construct validated outer-loop options.
    ///
    /// # Errors
    /// - [`OptError::InvalidTolConstraint`] / [`OptError::InvalidTolStep`] for
    ///   non-finite or non-positive tolerances.
    /// - [`OptError::InvalidMaxIter`] if `max_outer_iter == 0`.
    /// - [`OptError::InvalidPenalty`] if `penalty0` is not finite and positive
    ///   or `penalty_growth` is not finite and greater than one.
    pub fn new(
        tol_constraint: f64, tol_step: f64, max_outer_iter: usize, penalty0: f64,
        penalty_growth: f64,
    ) -> OptResult<Self> {
        verify_tol_constraint(tol_constraint)?;
        verify_tol_step(tol_step)?;
        if max_outer_iter == 0 {
            return Err(OptError::InvalidMaxIter {
                max_iter: max_outer_iter,
                reason: "Maximum outer iterations must be greater than zero.",
            });
        }
        if !penalty0.is_finite() || penalty0 <= 0.0 {
            return Err(OptError::InvalidPenalty {
                value: penalty0,
                reason: "Initial penalty must be finite and positive.",
            });
        }
        if !penalty_growth.is_finite() || penalty_growth <= 1.0 {
            return Err(OptError::InvalidPenalty {
                value: penalty_growth,
                reason: "Penalty growth must be finite and greater than one.",
            });
        }
        Ok(Self { tol_constraint, tol_step, max_outer_iter, penalty0, penalty_growth })
    }
}

impl Default for AugLagOptions {
    fn default() -> Self {
        Self {
            tol_constraint: 1e-10,
            tol_step: 1e-8,
            max_outer_iter: 100,
            penalty0: 10.0,
            penalty_growth: 10.0,
        }
    }
}

/// Augmented-Lagrangian solver for single equality-constrained problems.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AugmentedLagrangian {
    pub inner: SolverOptions,
    pub outer: AugLagOptions,
}

impl AugmentedLagrangian {
    pub fn new(inner: SolverOptions, outer: AugLagOptions) -> Self {
        Self { inner, outer }
    }

    fn inner_solve(&self, x: Point, adapter: AugLagAdapter<'_>) -> OptResult<InnerOutcome> {
        match self.inner.line_searcher {
            LineSearcher::MoreThuente => {
                let solver = build_optimizer_more_thuente(&self.inner)?;
                run_lbfgs(x, &self.inner, adapter, solver)
            }
            LineSearcher::HagerZhang => {
                let solver = build_optimizer_hager_zhang(&self.inner)?;
                run_lbfgs(x, &self.inner, adapter, solver)
            }
        }
    }
}

impl Optimizer for AugmentedLagrangian {
    /// Solve `min f(x) s.t. c(x) = 0` from `x0`.
    ///
    /// # Errors
    /// - Callback failures (see [`OptError::is_callback_failure`]) and
    ///   validation errors on the returned point.
    fn solve(&self, problem: &dyn ConstrainedProblem, x0: Point) -> OptResult<SolveOutcome> {
        let tol_grad = self.inner.tols.tol_grad.unwrap_or(f64::EPSILON);
        let mut x = x0;
        let mut lambda = initial_multiplier(problem, &x)?;
        let mut mu = self.outer.penalty0;
        let mut c = problem.constraint(&x)?;
        validate_constraint(c)?;
        let mut fn_evals = FnEvalMap::new();
        let mut converged = false;
        let mut status = "Outer iteration budget exhausted".to_string();
        let mut iterations = 0;

        for outer in 0..self.outer.max_outer_iter {
            iterations = outer + 1;
            let adapter = AugLagAdapter::new(problem, lambda, mu);
            // Already stationary for this (λ, μ): a line search from here has
            // no descent direction to work with.
            let stationary = match adapter.gradient(&x) {
                Ok(g) => g.l2_norm() <= tol_grad,
                Err(e) => return Err(e.into()),
            };
            let x_new = if stationary {
                x.clone()
            } else {
                match self.inner_solve(x.clone(), adapter) {
                    Ok(inner) => {
                        for (name, count) in inner.fn_evals {
                            *fn_evals.entry(name).or_insert(0) += count;
                        }
                        inner.point
                    }
                    Err(e) if e.is_callback_failure() => return Err(e),
                    Err(e) => {
                        log::debug!("augmented Lagrangian: inner solve failed at outer {outer}: {e}");
                        if c.abs() <= self.outer.tol_constraint {
                            converged = true;
                            status = format!("Converged with stalled inner solver: {e}");
                        } else {
                            status = format!("Inner solver failed: {e}");
                        }
                        break;
                    }
                }
            };

            let step = (&x_new - &x).l2_norm();
            let c_new = problem.constraint(&x_new)?;
            validate_constraint(c_new)?;
            x = x_new;

            if c_new.abs() <= self.outer.tol_constraint && step <= self.outer.tol_step {
                c = c_new;
                converged = true;
                status = format!("Converged after {iterations} outer iterations");
                break;
            }

            lambda += mu * c_new;
            if c_new.abs() > VIOLATION_REDUCTION * c.abs() {
                mu = (mu * self.outer.penalty_growth).min(PENALTY_MAX);
            }
            c = c_new;
        }

        let objective = problem.objective(&x)?;
        log::debug!(
            "augmented Lagrangian: converged = {converged}, |c| = {:.3e}, iterations = {iterations}",
            c.abs()
        );
        SolveOutcome::new(Some(x), objective, c, converged, status, iterations, fn_evals)
    }
}

/// Least-squares multiplier estimate `λ = −(∇f·∇c)/‖∇c‖²` at `x`.
///
/// Zero when the problem has no analytic gradients or `∇c` vanishes.
fn initial_multiplier(problem: &dyn ConstrainedProblem, x: &Point) -> OptResult<f64> {
    let grads = problem
        .objective_grad(x)
        .and_then(|grad_f| problem.constraint_grad(x).map(|grad_c| (grad_f, grad_c)));
    match grads {
        Ok((grad_f, grad_c)) => {
            let denom = grad_c.dot(&grad_c);
            let lambda = -grad_f.dot(&grad_c) / denom;
            Ok(if denom > 0.0 && lambda.is_finite() { lambda } else { 0.0 })
        }
        Err(OptError::GradientNotImplemented) => Ok(0.0),
        Err(e) => Err(e),
    }
}
