//! Reliability options — configuration for MPP searches and probability
//! integration.
//!
//! Purpose
//! -------
//! Collect every knob of a reliability run in one validated value: the
//! distribution convention, first- or second-order integration and the
//! second-order rule, the search variant and its approximation settings,
//! convergence controls, the curvature guard and the Newton inversion limits.
//!
//! Key behaviors
//! -------------
//! - [`ReliabilityOptions::new`] validates the core choices; the `with_*`
//!   builders validate and set the numeric controls.
//! - The option enums parse case-insensitively via `FromStr`, returning
//!   [`ReliabilityError::InvalidOptionName`] for unknown names.
//! - [`ReliabilityOptions::validate`] re-checks a value whose public fields
//!   were edited directly; the level-loop controller calls it before any
//!   search starts.
//!
//! Invariants & assumptions
//! ------------------------
//! - `convergence_tol`, `curvature_threshold` are finite and positive.
//! - `max_iter`, when set, is positive; `None` means `25·n` for `n`
//!   uncertain variables.
//! - `newton_max_iter` and `backtrack_max` are positive.
//! - `initial_point_u`, when set, is finite. Its length is checked against the
//!   transform at run time.
use crate::reliability::errors::{ReliabilityError, ReliabilityResult};
use ndarray::Array1;
use std::str::FromStr;

/// Default curvature guard threshold for `1 + k·κ`.
pub const DEFAULT_CURVATURE_THRESHOLD: f64 = 1e-10;
/// Default Newton iteration cap for second-order inversion.
pub const DEFAULT_NEWTON_MAX_ITER: usize = 20;
/// Default backtracking cap per Newton step.
pub const DEFAULT_BACKTRACK_MAX: usize = 10;
/// Default cap on second-order PMA target refinements.
pub const DEFAULT_TARGET_REFINEMENTS: usize = 10;
/// Search iterations allowed per uncertain variable when no cap is given.
pub const ITERATIONS_PER_VARIABLE: usize = 25;

/// Whether probabilities are reported as `P(g ≤ z)` (CDF) or `P(g > z)` (CCDF).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    Cdf,
    Ccdf,
}

impl Convention {
    pub fn is_cdf(self) -> bool {
        matches!(self, Convention::Cdf)
    }
}

impl FromStr for Convention {
    type Err = ReliabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cdf" => Ok(Convention::Cdf),
            "ccdf" => Ok(Convention::Ccdf),
            _ => Err(ReliabilityError::InvalidOptionName {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'cdf' or 'ccdf'.",
            }),
        }
    }
}

/// First-order (FORM) or second-order (SORM) integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationOrder {
    First,
    Second,
}

/// Second-order correction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondOrderRule {
    Breitung,
    HohenbichlerRackwitz,
    Hong,
}

impl FromStr for SecondOrderRule {
    type Err = ReliabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "breitung" => Ok(SecondOrderRule::Breitung),
            "hohenbichlerrackwitz" | "hohenbichler_rackwitz" => {
                Ok(SecondOrderRule::HohenbichlerRackwitz)
            }
            "hong" => Ok(SecondOrderRule::Hong),
            _ => Err(ReliabilityError::InvalidOptionName {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'Breitung', 'HohenbichlerRackwitz' or 'Hong'.",
            }),
        }
    }
}

/// MPP search variant.
///
/// - `NoApprox`: optimize on the truth model directly.
/// - `Mv`: mean-value closed forms, no search.
/// - `Amv`: one optimize on a Taylor expansion at the means.
/// - `AmvPlus`: Taylor expansion rebuilt at every candidate.
/// - `Tana`: two-point adaptive nonlinear approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchVariant {
    NoApprox,
    Mv,
    Amv,
    AmvPlus,
    Tana,
}

impl SearchVariant {
    /// Whether the variant expands an approximation about the means.
    pub fn expands_at_means(self) -> bool {
        !matches!(self, SearchVariant::NoApprox)
    }
}

impl FromStr for SearchVariant {
    type Err = ReliabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "no_approx" | "noapprox" => Ok(SearchVariant::NoApprox),
            "mv" => Ok(SearchVariant::Mv),
            "amv" => Ok(SearchVariant::Amv),
            "amv+" | "amvplus" | "amv_plus" => Ok(SearchVariant::AmvPlus),
            "tana" => Ok(SearchVariant::Tana),
            _ => Err(ReliabilityError::InvalidOptionName {
                name: s.to_string(),
                reason: "Valid options are 'no_approx', 'mv', 'amv', 'amv+' or 'tana'.",
            }),
        }
    }
}

/// Space in which approximations are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproxSpace {
    X,
    U,
}

/// Order of the Taylor expansion used by AMV and AMV+.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaylorOrder {
    First,
    Second,
}

/// ReliabilityOptions — configuration of one reliability run.
///
/// Default:
/// - CDF convention, first-order integration, Breitung rule, `NoApprox`
/// - u-space, first-order Taylor expansions
/// - `convergence_tol = 1e-6`, iteration cap `25·n`
/// - `curvature_threshold = 1e-10`, Newton cap 20, backtracking cap 10
/// - at most 10 second-order PMA target refinements, no initial point
#[derive(Debug, Clone, PartialEq)]
pub struct ReliabilityOptions {
    pub convention: Convention,
    pub integration_order: IntegrationOrder,
    pub second_order_rule: SecondOrderRule,
    pub variant: SearchVariant,
    pub approx_space: ApproxSpace,
    pub taylor_order: TaylorOrder,
    pub convergence_tol: f64,
    pub max_iter: Option<usize>,
    pub curvature_threshold: f64,
    pub newton_max_iter: usize,
    pub backtrack_max: usize,
    pub target_refinements: usize,
    pub initial_point_u: Option<Array1<f64>>,
    pub verbose: bool,
}

impl ReliabilityOptions {
    /// Create options with the given core choices and default numeric controls.
    ///
    /// # Errors
    /// - [`ReliabilityError::InvalidOption`] if `convergence_tol` is not finite
    ///   and positive.
    pub fn new(
        convention: Convention, integration_order: IntegrationOrder,
        second_order_rule: SecondOrderRule, variant: SearchVariant, convergence_tol: f64,
    ) -> ReliabilityResult<Self> {
        verify_positive("convergence_tol", convergence_tol)?;
        Ok(Self {
            convention,
            integration_order,
            second_order_rule,
            variant,
            convergence_tol,
            ..Self::default()
        })
    }

    /// Set the approximation space and Taylor order used by AMV/AMV+/TANA.
    pub fn with_approximation(mut self, space: ApproxSpace, order: TaylorOrder) -> Self {
        self.approx_space = space;
        self.taylor_order = order;
        self
    }

    /// Override the `25·n` search iteration cap.
    ///
    /// # Errors
    /// - [`ReliabilityError::InvalidOption`] if `max_iter == 0`.
    pub fn with_max_iter(mut self, max_iter: usize) -> ReliabilityResult<Self> {
        verify_count("max_iter", max_iter)?;
        self.max_iter = Some(max_iter);
        Ok(self)
    }

    /// Set the curvature guard threshold for `1 + k·κ`.
    ///
    /// # Errors
    /// - [`ReliabilityError::InvalidOption`] if `threshold` is not finite and
    ///   positive.
    pub fn with_curvature_threshold(mut self, threshold: f64) -> ReliabilityResult<Self> {
        verify_positive("curvature_threshold", threshold)?;
        self.curvature_threshold = threshold;
        Ok(self)
    }

    /// Set the Newton iteration and backtracking caps of the inversion.
    ///
    /// # Errors
    /// - [`ReliabilityError::InvalidOption`] if either cap is zero.
    pub fn with_newton_limits(
        mut self, newton_max_iter: usize, backtrack_max: usize,
    ) -> ReliabilityResult<Self> {
        verify_count("newton_max_iter", newton_max_iter)?;
        verify_count("backtrack_max", backtrack_max)?;
        self.newton_max_iter = newton_max_iter;
        self.backtrack_max = backtrack_max;
        Ok(self)
    }

    /// Start the first level of every response function at `u0`.
    ///
    /// # Errors
    /// - [`ReliabilityError::InvalidOption`] if any entry is non-finite.
    pub fn with_initial_point_u(mut self, u0: Array1<f64>) -> ReliabilityResult<Self> {
        verify_initial_point(&u0)?;
        self.initial_point_u = Some(u0);
        Ok(self)
    }

    /// Search iteration cap for `n` uncertain variables.
    pub fn iteration_cap(&self, n: usize) -> usize {
        self.max_iter.unwrap_or(ITERATIONS_PER_VARIABLE * n.max(1))
    }

    /// Whether second-order integration is active.
    pub fn second_order(&self) -> bool {
        matches!(self.integration_order, IntegrationOrder::Second)
    }

    /// Re-validate every numeric control.
    ///
    /// # Errors
    /// - [`ReliabilityError::InvalidOption`] naming the first offending field,
    ///   including second-order integration with the `Mv` variant.
    pub fn validate(&self) -> ReliabilityResult<()> {
        verify_positive("convergence_tol", self.convergence_tol)?;
        verify_positive("curvature_threshold", self.curvature_threshold)?;
        if let Some(max_iter) = self.max_iter {
            verify_count("max_iter", max_iter)?;
        }
        verify_count("newton_max_iter", self.newton_max_iter)?;
        verify_count("backtrack_max", self.backtrack_max)?;
        if let Some(u0) = &self.initial_point_u {
            verify_initial_point(u0)?;
        }
        if self.variant == SearchVariant::Mv && self.second_order() {
            return Err(ReliabilityError::InvalidOption {
                name: "integration_order",
                value: 2.0,
                reason: "The mean-value variant has no Hessian at the MPP; integrate to first order.",
            });
        }
        Ok(())
    }
}

impl Default for ReliabilityOptions {
    fn default() -> Self {
        Self {
            convention: Convention::Cdf,
            integration_order: IntegrationOrder::First,
            second_order_rule: SecondOrderRule::Breitung,
            variant: SearchVariant::NoApprox,
            approx_space: ApproxSpace::U,
            taylor_order: TaylorOrder::First,
            convergence_tol: 1e-6,
            max_iter: None,
            curvature_threshold: DEFAULT_CURVATURE_THRESHOLD,
            newton_max_iter: DEFAULT_NEWTON_MAX_ITER,
            backtrack_max: DEFAULT_BACKTRACK_MAX,
            target_refinements: DEFAULT_TARGET_REFINEMENTS,
            initial_point_u: None,
            verbose: false,
        }
    }
}

// ---- Helper methods ----

fn verify_positive(name: &'static str, value: f64) -> ReliabilityResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ReliabilityError::InvalidOption {
            name,
            value,
            reason: "Must be finite and strictly positive.",
        });
    }
    Ok(())
}

fn verify_count(name: &'static str, value: usize) -> ReliabilityResult<()> {
    if value == 0 {
        return Err(ReliabilityError::InvalidOption {
            name,
            value: 0.0,
            reason: "Must be greater than zero.",
        });
    }
    Ok(())
}

fn verify_initial_point(u0: &Array1<f64>) -> ReliabilityResult<()> {
    match u0.iter().find(|v| !v.is_finite()) {
        Some(&value) => Err(ReliabilityError::InvalidOption {
            name: "initial_point_u",
            value,
            reason: "Initial point entries must be finite.",
        }),
        None => Ok(()),
    }
}
