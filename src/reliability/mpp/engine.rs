//! engine — the MPP search state machine and its search strategies.
//!
//! Purpose
//! -------
//! Drive one (response function, level) search through
//! `Optimize → Evaluate → UpdateApprox → …` until the step between successive
//! candidates falls below the convergence tolerance, and hand back an
//! [`MppState`] sampled on the truth model.
//!
//! Key behaviors
//! -------------
//! - Variant-specific behavior lives behind [`SearchStrategy`], selected once
//!   per response function by [`select_strategy`]:
//!   - [`ExactSearch`] (`NoApprox`): one optimize on the truth model.
//!   - [`MeanValueSearch`] (`Mv`): closed-form linear MPP from the expansion
//!     at the means; no truth evaluation per level.
//!   - [`ApproximateSearch`] (`Amv`, `AmvPlus`, `Tana`): optimize on a
//!     surrogate, sample the truth model at the candidate, rebuild the
//!     surrogate and repeat when refinement is enabled.
//! - A non-converged optimizer run raises
//!   [`WarningFlags::OPTIMIZATION_FAILURE`]; hitting the iteration cap raises
//!   [`WarningFlags::APPROXIMATION_NON_CONVERGENCE`]. Both keep the best
//!   iterate.
//! - With second-order integration the final sample is upgraded to carry a
//!   u-space Hessian.
//! - Expansions at the means need a non-vanishing gradient;
//!   a flat one is [`ReliabilityError::FlatExpansion`].
//!
//! Invariants & assumptions
//! ------------------------
//! - `update_approximation` completes before the next `propose_candidate`.
//! - The engine holds no state between searches; everything carried between
//!   levels is passed in explicitly by the controller.
use crate::{
    optimization::constrained::Optimizer,
    reliability::{
        core::{
            options::{ReliabilityOptions, SearchVariant, TaylorOrder},
            types::{ConvergenceState, Evaluation, MppState, RequestMask},
        },
        errors::{ReliabilityError, ReliabilityResult, WarningFlags},
        evaluator::{
            LimitStateEvaluator, exact::ExactEvaluator, tana::TanaEvaluator,
            taylor::TaylorEvaluator,
        },
        mpp::{
            formulation::{Formulation, solve_subproblem},
            warm_start::{pma_projection, ria_projection},
        },
    },
};
use ndarray::Array1;

const ZERO_GRADIENT: f64 = 1e-14;

/// Point proposed by one `Optimize` step.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub u: Array1<f64>,
    pub optimizer_converged: bool,
}

/// Per-variant behavior of the MPP search.
pub trait SearchStrategy {
    /// Seed the strategy for a new response function. `mean` is the truth
    /// sample at the means, when it was taken.
    fn initialize(&mut self, mean: Option<&Evaluation>) -> ReliabilityResult<()>;

    /// Optimize the subproblem from `u0`.
    fn propose_candidate(
        &self, optimizer: &dyn Optimizer, formulation: Formulation, u0: &Array1<f64>,
    ) -> ReliabilityResult<Candidate>;

    /// Sample the limit state at a candidate.
    fn evaluate(&self, u: &Array1<f64>, mask: RequestMask) -> ReliabilityResult<Evaluation>;

    /// Feed a new sample into the approximation, if any.
    fn update_approximation(&mut self, sample: &Evaluation) -> ReliabilityResult<()>;

    fn is_converged(&self, state: &ConvergenceState, tol: f64) -> bool;

    /// Derivatives each sample must carry for `update_approximation`.
    fn sample_mask(&self) -> RequestMask {
        RequestMask::ValueGradient
    }

    fn truth(&self) -> &ExactEvaluator<'_>;
}

/// Build the strategy for `options.variant` around `truth`.
pub fn select_strategy<'a>(
    options: &ReliabilityOptions, truth: ExactEvaluator<'a>,
) -> Box<dyn SearchStrategy + 'a> {
    let transform = truth.transform();
    match options.variant {
        SearchVariant::NoApprox => Box::new(ExactSearch { truth }),
        SearchVariant::Mv => Box::new(MeanValueSearch { truth, mean: None }),
        SearchVariant::Amv | SearchVariant::AmvPlus => {
            let surrogate =
                TaylorEvaluator::new(transform, options.approx_space, options.taylor_order);
            Box::new(ApproximateSearch {
                truth,
                surrogate: Box::new(surrogate),
                refine: options.variant == SearchVariant::AmvPlus,
                mask: match options.taylor_order {
                    TaylorOrder::First => RequestMask::ValueGradient,
                    TaylorOrder::Second => RequestMask::ValueGradientHessian,
                },
            })
        }
        SearchVariant::Tana => Box::new(ApproximateSearch {
            truth,
            surrogate: Box::new(TanaEvaluator::new(transform, options.approx_space)),
            refine: true,
            mask: RequestMask::ValueGradient,
        }),
    }
}

/// `NoApprox`: the truth model is optimized directly.
pub struct ExactSearch<'a> {
    truth: ExactEvaluator<'a>,
}

impl SearchStrategy for ExactSearch<'_> {
    fn initialize(&mut self, _mean: Option<&Evaluation>) -> ReliabilityResult<()> {
        Ok(())
    }

    fn propose_candidate(
        &self, optimizer: &dyn Optimizer, formulation: Formulation, u0: &Array1<f64>,
    ) -> ReliabilityResult<Candidate> {
        let outcome = solve_subproblem(optimizer, &self.truth, formulation, u0)?;
        Ok(Candidate { u: outcome.point, optimizer_converged: outcome.converged })
    }

    fn evaluate(&self, u: &Array1<f64>, mask: RequestMask) -> ReliabilityResult<Evaluation> {
        self.truth.evaluate(u, mask)
    }

    fn update_approximation(&mut self, _sample: &Evaluation) -> ReliabilityResult<()> {
        Ok(())
    }

    fn is_converged(&self, _state: &ConvergenceState, _tol: f64) -> bool {
        true
    }

    fn truth(&self) -> &ExactEvaluator<'_> {
        &self.truth
    }
}

/// `Mv`: first-order expansion at the means, solved in closed form.
pub struct MeanValueSearch<'a> {
    truth: ExactEvaluator<'a>,
    mean: Option<Evaluation>,
}

impl MeanValueSearch<'_> {
    fn mean(&self) -> ReliabilityResult<(&Evaluation, &Array1<f64>)> {
        let mean = self
            .mean
            .as_ref()
            .ok_or(ReliabilityError::IncompleteSample { what: "mean-value sample" })?;
        Ok((mean, mean.require_grad_u()?))
    }
}

impl SearchStrategy for MeanValueSearch<'_> {
    fn initialize(&mut self, mean: Option<&Evaluation>) -> ReliabilityResult<()> {
        let mean = mean.ok_or(ReliabilityError::IncompleteSample { what: "mean-value sample" })?;
        require_direction(mean)?;
        self.mean = Some(mean.clone());
        Ok(())
    }

    fn propose_candidate(
        &self, _optimizer: &dyn Optimizer, formulation: Formulation, _u0: &Array1<f64>,
    ) -> ReliabilityResult<Candidate> {
        let (mean, grad) = self.mean()?;
        let u = match formulation {
            Formulation::Ria { target } => ria_projection(&mean.u, grad, mean.value, target),
            Formulation::Pma { beta_target, minimize } => {
                pma_projection(grad, beta_target, minimize)
            }
        };
        Ok(Candidate { u, optimizer_converged: true })
    }

    /// Linear model `g_m + ∇g_m·(u − u_m)`; never carries a Hessian.
    fn evaluate(&self, u: &Array1<f64>, _mask: RequestMask) -> ReliabilityResult<Evaluation> {
        let (mean, grad) = self.mean()?;
        let x = self.truth.transform().u_to_x(u)?;
        let value = mean.value + grad.dot(&(u - &mean.u));
        Ok(Evaluation {
            x,
            u: u.clone(),
            value,
            grad_x: mean.grad_x.clone(),
            grad_u: Some(grad.clone()),
            hess_x: None,
            hess_u: None,
        })
    }

    fn update_approximation(&mut self, _sample: &Evaluation) -> ReliabilityResult<()> {
        Ok(())
    }

    fn is_converged(&self, _state: &ConvergenceState, _tol: f64) -> bool {
        true
    }

    fn truth(&self) -> &ExactEvaluator<'_> {
        &self.truth
    }
}

/// `Amv`, `AmvPlus` and `Tana`: optimize a surrogate, verify on the truth.
pub struct ApproximateSearch<'a> {
    truth: ExactEvaluator<'a>,
    surrogate: Box<dyn LimitStateEvaluator + 'a>,
    refine: bool,
    mask: RequestMask,
}

impl SearchStrategy for ApproximateSearch<'_> {
    fn initialize(&mut self, mean: Option<&Evaluation>) -> ReliabilityResult<()> {
        let mean = mean.ok_or(ReliabilityError::IncompleteSample { what: "mean-value sample" })?;
        require_direction(mean)?;
        self.surrogate.clear_history();
        self.surrogate.rebuild(mean)
    }

    fn propose_candidate(
        &self, optimizer: &dyn Optimizer, formulation: Formulation, u0: &Array1<f64>,
    ) -> ReliabilityResult<Candidate> {
        let outcome = solve_subproblem(optimizer, self.surrogate.as_ref(), formulation, u0)?;
        Ok(Candidate { u: outcome.point, optimizer_converged: outcome.converged })
    }

    fn evaluate(&self, u: &Array1<f64>, mask: RequestMask) -> ReliabilityResult<Evaluation> {
        self.truth.evaluate(u, mask)
    }

    /// Rebuild only when refining; a single-pass AMV keeps the expansion at
    /// the means for every level.
    fn update_approximation(&mut self, sample: &Evaluation) -> ReliabilityResult<()> {
        if self.refine { self.surrogate.rebuild(sample) } else { Ok(()) }
    }

    fn is_converged(&self, state: &ConvergenceState, tol: f64) -> bool {
        !self.refine || state.is_converged(tol)
    }

    fn sample_mask(&self) -> RequestMask {
        self.mask
    }

    fn truth(&self) -> &ExactEvaluator<'_> {
        &self.truth
    }
}

/// Result of one MPP search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub mpp: MppState,
    pub converged: bool,
    pub iterations: usize,
    pub warnings: WarningFlags,
}

/// MppSearchEngine — drives a [`SearchStrategy`] to a converged MPP.
#[derive(Clone, Copy)]
pub struct MppSearchEngine<'o> {
    optimizer: &'o dyn Optimizer,
    tol: f64,
    max_iter: Option<usize>,
    need_hessian: bool,
}

impl<'o> MppSearchEngine<'o> {
    pub fn new(optimizer: &'o dyn Optimizer, options: &ReliabilityOptions) -> Self {
        Self {
            optimizer,
            tol: options.convergence_tol,
            max_iter: options.max_iter,
            need_hessian: options.second_order(),
        }
    }

    /// Search for the MPP of `formulation` starting at `u0`.
    ///
    /// # Errors
    /// - Evaluation, transform and optimizer errors from the strategy.
    pub fn search(
        &self, strategy: &mut dyn SearchStrategy, formulation: Formulation, u0: &Array1<f64>,
    ) -> ReliabilityResult<SearchOutcome> {
        let mut state = ConvergenceState::new(u0.len(), self.max_iter);
        let mut warnings = WarningFlags::NONE;
        let mut u_prev = u0.clone();
        let mut first = true;
        let mask = strategy.sample_mask();

        let (mut sample, converged) = loop {
            let candidate = strategy.propose_candidate(self.optimizer, formulation, &u_prev)?;
            if !candidate.optimizer_converged {
                log::debug!("MPP search: optimizer stopped early at iteration {}", state.iteration);
                warnings |= WarningFlags::OPTIMIZATION_FAILURE;
            }
            let sample = strategy.evaluate(&candidate.u, mask)?;
            // The start point is not a candidate; the first step never converges.
            if first {
                state.record_first();
                first = false;
            } else {
                state.record(&u_prev, &candidate.u);
            }
            strategy.update_approximation(&sample)?;
            log::debug!(
                "MPP search: iteration {}, g = {:.6e}, |du| = {:.3e}",
                state.iteration,
                sample.value,
                state.metric
            );

            if strategy.is_converged(&state, self.tol) {
                break (sample, candidate.optimizer_converged);
            }
            if state.cap_exceeded() {
                log::debug!("MPP search: iteration cap {} reached", state.max_iter);
                warnings |= WarningFlags::APPROXIMATION_NON_CONVERGENCE;
                break (sample, false);
            }
            u_prev = candidate.u;
        };

        if self.need_hessian && sample.hess_u.is_none() {
            sample = strategy.evaluate(&sample.u.clone(), RequestMask::ValueGradientHessian)?;
        }
        let iterations = state.iteration;
        Ok(SearchOutcome { mpp: sample.into_mpp_state()?, converged, iterations, warnings })
    }
}

/// Reject an expansion point whose u-space gradient vanishes.
fn require_direction(mean: &Evaluation) -> ReliabilityResult<()> {
    let grad = mean.require_grad_u()?;
    let norm = grad.dot(grad).sqrt();
    if !(norm > ZERO_GRADIENT) {
        return Err(ReliabilityError::FlatExpansion { norm });
    }
    Ok(())
}

/// Signed reliability index of an MPP: `−‖u‖` when `⟨u, ∇g_u⟩ > 0`, `+‖u‖`
/// otherwise, negated for the CCDF convention.
pub fn signed_beta(u: &Array1<f64>, grad_u: &Array1<f64>, cdf: bool) -> f64 {
    let norm = u.dot(u).sqrt();
    let beta = if u.dot(grad_u) > 0.0 { -norm } else { norm };
    if cdf { beta } else { -beta }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        optimization::constrained::AugmentedLagrangian,
        reliability::core::{
            model::TruthModel,
            options::{ApproxSpace, Convention, IntegrationOrder, SecondOrderRule},
            transform::NormalTransform,
            types::Response,
        },
    };
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The β sign rule.
    // - Exact, mean-value and AMV+ searches on small limit states.
    // - Hessian upgrade of the final sample for second-order integration.
    // -------------------------------------------------------------------------

    /// g(x) = 3 − x₀ − x₁ + 0.1x₀², with gradient and Hessian.
    struct Bent;

    impl TruthModel for Bent {
        fn num_functions(&self) -> usize {
            1
        }
        fn evaluate(
            &self, x: &Array1<f64>, mask: RequestMask, _fn_index: usize,
        ) -> ReliabilityResult<Response> {
            Ok(Response {
                value: 3.0 - x[0] - x[1] + 0.1 * x[0] * x[0],
                gradient: Some(array![-1.0 + 0.2 * x[0], -1.0]),
                hessian: mask
                    .wants_hessian()
                    .then(|| array![[0.2, 0.0], [0.0, 0.0]]),
            })
        }
    }

    fn options(variant: SearchVariant) -> ReliabilityOptions {
        ReliabilityOptions::new(
            Convention::Cdf,
            IntegrationOrder::First,
            SecondOrderRule::Breitung,
            variant,
            1e-6,
        )
        .expect("valid options")
    }

    fn std_normal() -> NormalTransform {
        NormalTransform::independent(array![0.0, 0.0], array![1.0, 1.0]).expect("valid")
    }

    fn search(variant: SearchVariant, transform: &NormalTransform) -> SearchOutcome {
        let opts = options(variant);
        let optimizer = AugmentedLagrangian::default();
        let truth = ExactEvaluator::new(&Bent, transform, 0).expect("valid index");
        let mean = truth.evaluate(&array![0.0, 0.0], RequestMask::ValueGradient).expect("mean");
        let mut strategy = select_strategy(&opts, truth);
        strategy.initialize(Some(&mean)).expect("initialize");
        let u0 = ria_projection(&mean.u, mean.grad_u.as_ref().expect("grad"), mean.value, 0.0);
        MppSearchEngine::new(&optimizer, &opts)
            .search(strategy.as_mut(), Formulation::ria(0.0), &u0)
            .expect("search")
    }

    #[test]
    // Purpose
    // -------
    // The reliability index is positive when the origin lies on the safe
    // side under CDF, and flips for CCDF.
    fn signed_beta_follows_gradient_and_convention() {
        let u = array![3.0, 4.0];
        assert_abs_diff_eq!(signed_beta(&u, &array![-1.0, 0.0], true), 5.0, epsilon = 1e-15);
        assert_abs_diff_eq!(signed_beta(&u, &array![1.0, 0.0], true), -5.0, epsilon = 1e-15);
        assert_abs_diff_eq!(signed_beta(&u, &array![1.0, 0.0], false), 5.0, epsilon = 1e-15);
    }

    #[test]
    // Purpose
    // -------
    // AMV+ converges to the same MPP as the exact search.
    //
    // Given
    // -----
    // - g = 3 − u₀ − u₁ + 0.1u₀², RIA with z = 0, tolerance 1e-6.
    //
    // Expect
    // ------
    // - Both MPPs agree, lie on g = 0 and converge.
    fn amv_plus_matches_exact_search() {
        // Arrange
        let transform = std_normal();

        // Act
        let exact = search(SearchVariant::NoApprox, &transform);
        let amv_plus = search(SearchVariant::AmvPlus, &transform);

        // Assert
        assert!(exact.converged && amv_plus.converged);
        assert!(amv_plus.warnings.is_empty());
        assert!(amv_plus.iterations > 1);
        assert_abs_diff_eq!(exact.mpp.value, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(amv_plus.mpp.value, 0.0, epsilon = 1e-6);
        for i in 0..2 {
            assert_abs_diff_eq!(exact.mpp.u[i], amv_plus.mpp.u[i], epsilon = 1e-4);
        }
    }

    #[test]
    // Purpose
    // -------
    // The mean-value search lands on the linearization without a search.
    //
    // Expect
    // ------
    // - u = (1.5, 1.5), surrogate value 0, gradient (−1, −1).
    fn mean_value_search_uses_linearization() {
        let transform = std_normal();
        let outcome = search(SearchVariant::Mv, &transform);
        assert_eq!(outcome.iterations, 1);
        assert_abs_diff_eq!(outcome.mpp.u[0], 1.5, epsilon = 1e-14);
        assert_abs_diff_eq!(outcome.mpp.u[1], 1.5, epsilon = 1e-14);
        assert_abs_diff_eq!(outcome.mpp.value, 0.0, epsilon = 1e-14);
        assert_eq!(outcome.mpp.grad_u, array![-1.0, -1.0]);
        assert!(outcome.mpp.hess_u.is_none());
    }

    #[test]
    // Purpose
    // -------
    // Second-order integration upgrades the final sample with a Hessian.
    fn second_order_requests_hessian_at_the_mpp() {
        let transform = std_normal();
        let opts = ReliabilityOptions {
            integration_order: IntegrationOrder::Second,
            ..options(SearchVariant::NoApprox)
        };
        let optimizer = AugmentedLagrangian::default();
        let truth = ExactEvaluator::new(&Bent, &transform, 0).expect("valid index");
        let mut strategy = select_strategy(&opts, truth);
        strategy.initialize(None).expect("initialize");

        let outcome = MppSearchEngine::new(&optimizer, &opts)
            .search(strategy.as_mut(), Formulation::ria(0.0), &array![1.5, 1.5])
            .expect("search");

        let hess: Array2<f64> = outcome.mpp.hess_u.expect("hessian");
        assert_abs_diff_eq!(hess[[0, 0]], 0.2, epsilon = 1e-14);
        assert!(strategy.truth().evaluations() >= 2);
    }

    /// g(x) = ‖x‖² − 4: flat at the origin.
    struct Bowl;

    impl TruthModel for Bowl {
        fn num_functions(&self) -> usize {
            1
        }
        fn evaluate(
            &self, x: &Array1<f64>, _mask: RequestMask, _fn_index: usize,
        ) -> ReliabilityResult<Response> {
            Ok(Response::with_gradient(x.dot(x) - 4.0, x * 2.0))
        }
    }

    #[test]
    // Purpose
    // -------
    // Expansions at a stationary mean are rejected instead of searched.
    //
    // Given
    // -----
    // - g = ‖x‖² − 4 with ∇g(0) = 0, variants Mv, Amv, AmvPlus and Tana.
    //
    // Expect
    // ------
    // - `initialize` fails with `FlatExpansion` for every variant.
    fn flat_mean_expansion_is_rejected() {
        let transform = std_normal();
        for variant in [SearchVariant::Mv, SearchVariant::Amv, SearchVariant::AmvPlus, SearchVariant::Tana]
        {
            let truth = ExactEvaluator::new(&Bowl, &transform, 0).expect("valid index");
            let mean = truth.evaluate(&array![0.0, 0.0], RequestMask::ValueGradient).expect("mean");
            let mut strategy = select_strategy(&options(variant), truth);
            assert!(
                matches!(strategy.initialize(Some(&mean)), Err(ReliabilityError::FlatExpansion { .. })),
                "{variant:?}"
            );
        }
    }

    #[test]
    // Purpose
    // -------
    // The iteration cap stops a refining search and keeps its last iterate.
    //
    // Given
    // -----
    // - AMV+ on g = 3 − u₀ − u₁ + 0.1u₀², cap of 2 iterations, tolerance 1e-12.
    //
    // Expect
    // ------
    // - `APPROXIMATION_NON_CONVERGENCE`, `converged == false`, two iterations.
    // - The kept iterate is the second linearized MPP, ‖u‖ ≈ 2.27337.
    fn iteration_cap_keeps_last_iterate() {
        // Arrange
        let transform = std_normal();
        let opts = ReliabilityOptions::new(
            Convention::Cdf,
            IntegrationOrder::First,
            SecondOrderRule::Breitung,
            SearchVariant::AmvPlus,
            1e-12,
        )
        .and_then(|o| o.with_max_iter(2))
        .expect("valid options");
        let optimizer = AugmentedLagrangian::default();
        let truth = ExactEvaluator::new(&Bent, &transform, 0).expect("valid index");
        let mean = truth.evaluate(&array![0.0, 0.0], RequestMask::ValueGradient).expect("mean");
        let mut strategy = select_strategy(&opts, truth);
        strategy.initialize(Some(&mean)).expect("initialize");

        // Act
        let outcome = MppSearchEngine::new(&optimizer, &opts)
            .search(strategy.as_mut(), Formulation::ria(0.0), &array![1.5, 1.5])
            .expect("search");

        // Assert
        assert!(outcome.warnings.contains(WarningFlags::APPROXIMATION_NON_CONVERGENCE));
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 2);
        let norm = outcome.mpp.u.dot(&outcome.mpp.u).sqrt();
        assert_abs_diff_eq!(norm, 2.273368579440337, epsilon = 1e-5);
    }

    #[test]
    // Purpose
    // -------
    // Approximation strategies refuse to start without a mean sample.
    fn approximations_need_a_mean_sample() {
        let transform = std_normal();
        let opts = options(SearchVariant::Tana).with_approximation(ApproxSpace::X, TaylorOrder::First);
        let truth = ExactEvaluator::new(&Bent, &transform, 0).expect("valid index");
        let mut strategy = select_strategy(&opts, truth);
        assert!(matches!(
            strategy.initialize(None),
            Err(ReliabilityError::IncompleteSample { .. })
        ));
    }
}
