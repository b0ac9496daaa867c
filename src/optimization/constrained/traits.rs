//! Public API surface for equality-constrained minimization.
//!
//! - [`ConstrainedProblem`]: trait callers implement for `min f(x) s.t. c(x) = 0`.
//! - [`Optimizer`]: swappable solver strategy for such problems.
//! - [`SolverOptions`] and [`Tolerances`]: configuration for the inner
//!   unconstrained L-BFGS solves.
//! - [`LineSearcher`]: choice of line search used by L-BFGS.
//! - [`SolveOutcome`]: normalized result returned by every optimizer.
//!
//! Convention: a solve that exhausts its budget is *not* an error. It returns
//! its best iterate with `converged = false`; only failures inside the
//! problem's own callbacks (and invalid configuration) surface as `Err`.
use crate::optimization::{
    constrained::{
        types::{Cost, FnEvalMap, Grad, Point},
        validation::{validate_point_hat, validate_value, verify_tol_cost, verify_tol_grad},
    },
    errors::{OptError, OptResult},
};
use std::str::FromStr;

/// A single equality-constrained minimization problem `min f(x) s.t. c(x) = 0`.
///
/// Required:
/// - `objective(&Point) -> OptResult<Cost>`: evaluate `f(x)`.
/// - `constraint(&Point) -> OptResult<f64>`: evaluate `c(x)`.
///
/// Optional:
/// - `objective_grad` / `constraint_grad`: analytic gradients. If either is
///   not implemented, finite differences of the merit function are used.
pub trait ConstrainedProblem {
    // Required methods
    fn objective(&self, x: &Point) -> OptResult<Cost>;
    fn constraint(&self, x: &Point) -> OptResult<f64>;

    // Optional methods
    fn objective_grad(&self, _x: &Point) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
    fn constraint_grad(&self, _x: &Point) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Strategy interface for constrained solvers.
///
/// The MPP search engine only ever talks to this trait, so a remote, batched
/// or third-party solver can replace the default without touching the search
/// state machine.
pub trait Optimizer {
    fn solve(&self, problem: &dyn ConstrainedProblem, x0: Point) -> OptResult<SolveOutcome>;
}

/// Choice of line search used inside the L-BFGS solver.
///
/// Parsing:
/// This enum implements `FromStr` and accepts case-insensitive names
/// (`"MoreThuente"`, `"HagerZhang"`). Unknown names return
/// `OptError::InvalidLineSearch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Inner-solver configuration.
///
/// Fields:
/// - `tols: Tolerances` — numerical tolerances and iteration limits.
/// - `line_searcher: LineSearcher` — line-search algorithm used by L-BFGS.
/// - `verbose: bool` — if `true`, attaches an observer (behind the `obs_slog`
///   feature) and prints progress.
/// - `lbfgs_mem: Option<usize>` — history size; `None` uses the default of 7.
///
/// Default:
/// - `tols`: `tol_grad = 1e-10`, `tol_cost = 1e-15`, `max_iter = 500`
/// - `line_searcher`: `MoreThuente`
/// - `verbose`: `false`
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl SolverOptions {
    /// Create a new set of inner-solver options.
    ///
    /// # Errors
    /// - [`OptError::InvalidLBFGSMem`] if `lbfgs_mem == Some(0)`.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if let Some(m) = lbfgs_mem {
            if m == 0 {
                return Err(OptError::InvalidLBFGSMem {
                    mem: m,
                    reason: "L-BFGS memory must be greater than zero.",
                });
            }
        }
        Ok(Self { tols, line_searcher, verbose, lbfgs_mem })
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances { tol_grad: Some(1e-10), tol_cost: Some(1e-15), max_iter: Some(500) },
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Numerical tolerances and iteration limits for inner solves.
///
/// - `tol_grad`: terminate when the gradient norm falls below this threshold.
/// - `tol_cost`: terminate when the change in cost falls below this threshold.
/// - `max_iter`: hard cap on the number of iterations.
///
/// Any field can be `None` but **at least one** of the three must be provided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Construct validated tolerances.
    ///
    /// # Errors
    /// - [`OptError::NoTolerancesProvided`] if all three are `None`.
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolCost`] for
    ///   non-finite or non-positive tolerances.
    /// - [`OptError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_cost(tol_cost)?;
        verify_tol_grad(tol_grad)?;
        if let Some(max_iter) = max_iter {
            if max_iter == 0 {
                return Err(OptError::InvalidMaxIter {
                    max_iter,
                    reason: "Maximum iterations must be greater than zero.",
                });
            }
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

/// Canonical result returned by every [`Optimizer`].
///
/// - `point`: best point found.
/// - `objective`: `f(point)`.
/// - `constraint`: `c(point)`.
/// - `converged`: `false` when the solver ran out of budget or its backend
///   failed; `point` is then the best iterate, still usable.
/// - `status`: human-readable termination status.
/// - `iterations`: outer iterations performed.
/// - `fn_evals`: accumulated inner function-evaluation counters.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub point: Point,
    pub objective: f64,
    pub constraint: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
}

impl SolveOutcome {
    /// Build a validated [`SolveOutcome`].
    ///
    /// # Errors
    /// - Propagates validation errors for `point` (missing or non-finite)
    ///   and `objective` (non-finite).
    pub fn new(
        point: Option<Point>, objective: f64, constraint: f64, converged: bool, status: String,
        iterations: usize, fn_evals: FnEvalMap,
    ) -> OptResult<Self> {
        let point = validate_point_hat(point)?;
        validate_value(objective)?;
        Ok(Self { point, objective, constraint, converged, status, iterations, fn_evals })
    }
}
