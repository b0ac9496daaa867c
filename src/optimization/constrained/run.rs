//! Execution helper that runs an `argmin` solver on one augmented-Lagrangian
//! merit function and returns the best point it found.
use crate::optimization::{
    constrained::{
        adapter::AugLagAdapter,
        traits::SolverOptions,
        types::{FnEvalMap, Grad, Point},
        validation::validate_point_hat,
    },
    errors::OptResult,
};
#[cfg(feature = "obs_slog")]
use argmin::core::{CostFunction, Gradient};
use argmin::core::{Executor, State, TerminationStatus};
#[cfg(feature = "obs_slog")]
use argmin_math::ArgminL2Norm;

/// Result of one inner unconstrained solve.
#[derive(Debug, Clone, PartialEq)]
pub struct InnerOutcome {
    pub point: Point,
    pub merit: f64,
    pub terminated: bool,
    pub status: String,
    pub iterations: u64,
    pub fn_evals: FnEvalMap,
}

/// Run an `argmin` L-BFGS solve of the merit wrapped by `problem`.
///
/// Wires up the chosen solver, the initial point `x0` (consumed), optional
/// observers (behind the `obs_slog` feature) and optional `max_iters`, then
/// executes and keeps the best parameter.
///
/// # Errors
/// - Propagates any `argmin` runtime error (callback failures, line-search
///   failures) via `From<argmin::core::Error>`.
/// - Returns a validation error when the best point is missing or non-finite.
pub fn run_lbfgs<'a, S>(
    x0: Point, opts: &SolverOptions, problem: AugLagAdapter<'a>, solver: S,
) -> OptResult<InnerOutcome>
where
    S: argmin::core::Solver<
            AugLagAdapter<'a>,
            argmin::core::IterState<Point, Grad, (), (), (), f64>,
        > + 'static,
{
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        log_initial_state(&x0, &problem)?;
    }
    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(x0));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let fn_evals = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    let merit = result.get_best_cost();
    let point = validate_point_hat(result.take_best_param())?;
    let terminated = !matches!(termination, TerminationStatus::NotTerminated);
    Ok(InnerOutcome {
        point,
        merit,
        terminated,
        status: format!("{termination:?}"),
        iterations,
        fn_evals,
    })
}

// ---- Helper Methods ----

#[cfg(feature = "obs_slog")]
fn log_initial_state(x0: &Point, problem: &AugLagAdapter<'_>) -> OptResult<()> {
    let l0 = problem.cost(x0)?;
    let g0n = problem.gradient(x0).ok().map(|g| g.l2_norm());

    eprintln!(
        "init: merit(x0) = {:.6}, lambda = {:.6}, mu = {:.3e}{}",
        l0,
        problem.lambda,
        problem.mu,
        g0n.map(|n| format!(", ||grad|| = {:.6}", n)).unwrap_or_default()
    );
    Ok(())
}
