//! controller — the level loop over response functions and requested levels.
//!
//! Purpose
//! -------
//! Turn per-function [`LevelSet`]s into [`ReliabilitySearchResult`]s: pick
//! the RIA or PMA formulation, warm-start from the previous level, run the
//! MPP search and fill in the missing quantities with the probability
//! integrator.
//!
//! Key behaviors
//! -------------
//! - Response levels run first, then probability, reliability and
//!   generalized-reliability levels, each group in request order. Exactly
//!   one result is produced per request.
//! - Level 0 starts from the [`WarmStartCache`] entry when one exists, then
//!   from `initial_point_u`, then from a projection of the mean sample. Later
//!   levels warm-start from the previous level's MPP.
//! - Second-order PMA probability levels re-solve with the SORM-inverted
//!   target index until it settles (bounded by `target_refinements`).
//! - Warnings are merged per function and once more for the run, and logged
//!   a single time at the end.
//!
//! Invariants & assumptions
//! ------------------------
//! - No state survives between calls except what the caller keeps in the
//!   cache; response functions are independent of each other.
//! - A second-order Hong configuration with probability or generalized
//!   reliability levels is rejected before any truth evaluation.
use crate::{
    optimization::constrained::Optimizer,
    reliability::{
        core::{
            levels::LevelSet,
            model::{ImportanceSampler, TruthModel},
            normal::{std_normal_cdf, std_normal_pdf},
            options::{ReliabilityOptions, SecondOrderRule},
            transform::SpaceTransform,
            types::{
                DesignSensitivities, Evaluation, LevelKind, LevelRequest, MppState,
                ReliabilitySearchResult,
            },
        },
        curvature::principal_curvatures,
        errors::{ReliabilityError, ReliabilityResult, WarningFlags},
        evaluator::{LimitStateEvaluator, exact::ExactEvaluator},
        integration::{
            NewtonLimits, SecondOrder, gen_reliability, probability, probability_beta_derivative,
            reliability,
        },
        mpp::{
            engine::{MppSearchEngine, SearchOutcome, SearchStrategy, select_strategy, signed_beta},
            formulation::Formulation,
            warm_start::{WarmStartCache, pma_projection, pma_rescale, ria_projection},
        },
    },
};
use ndarray::Array1;

/// Results of one response function, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionReport {
    pub fn_index: usize,
    pub results: Vec<ReliabilitySearchResult>,
    pub warnings: WarningFlags,
}

/// Results of a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReliabilityReport {
    pub functions: Vec<FunctionReport>,
    pub warnings: WarningFlags,
}

/// MPP of the previous level, carried to the next one.
struct PreviousLevel {
    u: Array1<f64>,
    grad_u: Array1<f64>,
    value: f64,
    beta: f64,
}

/// Quantities of one finished level.
struct LevelSolution {
    outcome: SearchOutcome,
    response_level: f64,
    reliability_index: f64,
    probability: f64,
    curvatures: Option<Array1<f64>>,
    warnings: WarningFlags,
}

pub struct LevelLoopController<'a> {
    options: ReliabilityOptions,
    optimizer: &'a dyn Optimizer,
    sampler: Option<&'a dyn ImportanceSampler>,
}

impl<'a> LevelLoopController<'a> {
    /// # Errors
    /// - [`ReliabilityError::InvalidOption`] if `options` fail validation.
    pub fn new(
        options: ReliabilityOptions, optimizer: &'a dyn Optimizer,
    ) -> ReliabilityResult<Self> {
        options.validate()?;
        Ok(Self { options, optimizer, sampler: None })
    }

    /// Refine RIA and PMA reliability-level probabilities with `sampler`.
    pub fn with_importance_sampler(mut self, sampler: &'a dyn ImportanceSampler) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn options(&self) -> &ReliabilityOptions {
        &self.options
    }

    /// Analyze every response function of `model`; `levels[i]` belongs to
    /// function `i`.
    ///
    /// # Errors
    /// - [`ReliabilityError::DimensionMismatch`] if `levels` does not have one
    ///   entry per response function.
    /// - The first fatal error of any task.
    pub fn run(
        &self, model: &dyn TruthModel, transform: &dyn SpaceTransform, levels: &[LevelSet],
        mut cache: Option<&mut WarmStartCache>,
    ) -> ReliabilityResult<ReliabilityReport> {
        let count = model.num_functions();
        if levels.len() != count {
            return Err(ReliabilityError::DimensionMismatch {
                what: "level sets",
                expected: count,
                found: levels.len(),
            });
        }

        let mut functions = Vec::with_capacity(count);
        let mut warnings = WarningFlags::NONE;
        for (fn_index, set) in levels.iter().enumerate() {
            let report =
                self.run_function(model, transform, fn_index, set, cache.as_deref_mut())?;
            warnings |= report.warnings;
            functions.push(report);
        }
        if !warnings.is_empty() {
            log::warn!("reliability analysis finished with warnings: {warnings}");
        }
        Ok(ReliabilityReport { functions, warnings })
    }

    /// Analyze one response function.
    ///
    /// # Errors
    /// - [`ReliabilityError::HongInversionUnsupported`] for a second-order
    ///   Hong run with probability or generalized reliability levels.
    /// - [`ReliabilityError::InvalidLevel`], dimension, evaluation and
    ///   optimizer errors.
    pub fn run_function(
        &self, model: &dyn TruthModel, transform: &dyn SpaceTransform, fn_index: usize,
        levels: &LevelSet, mut cache: Option<&mut WarmStartCache>,
    ) -> ReliabilityResult<FunctionReport> {
        let opts = &self.options;
        let queue = levels.queue(fn_index)?;
        if opts.second_order()
            && opts.second_order_rule == SecondOrderRule::Hong
            && levels.needs_inversion()
        {
            return Err(ReliabilityError::HongInversionUnsupported);
        }
        let n = transform.dim();
        if let Some(u0) = &opts.initial_point_u {
            if u0.len() != n {
                return Err(ReliabilityError::DimensionMismatch {
                    what: "initial point",
                    expected: n,
                    found: u0.len(),
                });
            }
        }

        let truth = ExactEvaluator::new(model, transform, fn_index)?;
        let mut strategy = select_strategy(opts, truth);
        let engine = MppSearchEngine::new(self.optimizer, opts);
        let mut report =
            FunctionReport { fn_index, results: Vec::new(), warnings: WarningFlags::NONE };
        if queue.is_empty() {
            return Ok(report);
        }

        let cached = cache
            .as_deref()
            .and_then(|c| c.initial_point(fn_index))
            .filter(|u| u.len() == n);
        let mean = if opts.variant.expands_at_means()
            || (cached.is_none() && opts.initial_point_u.is_none())
        {
            let u_mean = transform.x_to_u(&transform.mean_x())?;
            Some(strategy.truth().evaluate(&u_mean, strategy.sample_mask())?)
        } else {
            None
        };
        strategy.initialize(mean.as_ref())?;

        let mut previous: Option<PreviousLevel> = None;
        let mut counted = 0;
        for (level, request) in queue.iter().enumerate() {
            let start = |formulation: &Formulation| {
                self.initial_point(formulation, previous.as_ref(), cached.as_ref(), mean.as_ref())
            };
            let solution = self.solve_level(request, strategy.as_mut(), &engine, start)?;
            let mpp = &solution.outcome.mpp;

            let sorm = self.second_order(solution.curvatures.as_ref());
            let gen_reliability_index = gen_reliability(solution.probability);
            let design_grad = strategy.truth().design_gradient(&mpp.x)?;
            let (sensitivities, sens_warnings) = match &design_grad {
                Some(dg) => {
                    let (s, w) = self.sensitivities(
                        request.kind,
                        mpp,
                        dg,
                        solution.reliability_index,
                        gen_reliability_index,
                        sorm.as_ref(),
                    );
                    (Some(s), w)
                }
                None => (None, WarningFlags::NONE),
            };

            let evaluations = strategy.truth().evaluations();
            let warnings = solution.warnings | solution.outcome.warnings | sens_warnings;
            let result = ReliabilitySearchResult {
                request: *request,
                response_level: solution.response_level,
                probability: solution.probability,
                reliability_index: solution.reliability_index,
                gen_reliability_index,
                mpp: mpp.clone(),
                converged: solution.outcome.converged,
                warnings,
                truth_evaluations: evaluations - counted,
                sensitivities,
            };
            counted = evaluations;
            self.log_level(&result);

            if level == 0 {
                if let Some(cache) = cache.as_deref_mut() {
                    cache.store(fn_index, mpp.u.clone(), mpp.grad_u.clone(), mpp.value, design_grad);
                }
            }
            previous = Some(PreviousLevel {
                u: mpp.u.clone(),
                grad_u: mpp.grad_u.clone(),
                value: mpp.value,
                beta: solution.reliability_index,
            });
            report.warnings |= warnings;
            report.results.push(result);
        }
        Ok(report)
    }

    fn solve_level(
        &self, request: &LevelRequest, strategy: &mut dyn SearchStrategy,
        engine: &MppSearchEngine<'_>,
        start: impl Fn(&Formulation) -> ReliabilityResult<Array1<f64>>,
    ) -> ReliabilityResult<LevelSolution> {
        let opts = &self.options;
        let convention = opts.convention;
        let limits = NewtonLimits::from_options(opts);
        let mut warnings = WarningFlags::NONE;

        match request.kind {
            LevelKind::ResponseLevel => {
                let formulation = Formulation::ria(request.target);
                let outcome = engine.search(strategy, formulation, &start(&formulation)?)?;
                let mpp = &outcome.mpp;
                let beta = signed_beta(&mpp.u, &mpp.grad_u, convention.is_cdf());
                let curvatures = self.curvatures(mpp)?;
                let p = probability(beta, convention, self.second_order(curvatures.as_ref()).as_ref());
                warnings |= p.warnings;
                let (p, w) = self.refine(mpp, request.fn_index, p.value, request.target)?;
                warnings |= w;
                Ok(LevelSolution {
                    response_level: mpp.value,
                    reliability_index: beta,
                    probability: p,
                    curvatures,
                    warnings,
                    outcome,
                })
            }
            LevelKind::ReliabilityLevel => {
                let beta = request.target;
                let formulation = Formulation::pma(beta, convention);
                let outcome = engine.search(strategy, formulation, &start(&formulation)?)?;
                let mpp = &outcome.mpp;
                let curvatures = self.curvatures(mpp)?;
                let p = probability(beta, convention, self.second_order(curvatures.as_ref()).as_ref());
                warnings |= p.warnings;
                let (p, w) = self.refine(mpp, request.fn_index, p.value, mpp.value)?;
                warnings |= w;
                Ok(LevelSolution {
                    response_level: mpp.value,
                    reliability_index: beta,
                    probability: p,
                    curvatures,
                    warnings,
                    outcome,
                })
            }
            LevelKind::ProbabilityLevel | LevelKind::GenReliabilityLevel => {
                let p_target = match request.kind {
                    LevelKind::ProbabilityLevel => request.target,
                    _ => std_normal_cdf(-request.target),
                };
                let mut beta = reliability(p_target, convention, None, &limits)?.value;
                let formulation = Formulation::pma(beta, convention);
                let mut outcome = engine.search(strategy, formulation, &start(&formulation)?)?;
                let mut curvatures = self.curvatures(&outcome.mpp)?;

                if opts.second_order() {
                    let mut settled = false;
                    for _ in 0..opts.target_refinements {
                        let Some(sorm) = self.second_order(curvatures.as_ref()) else {
                            settled = true;
                            break;
                        };
                        let estimate = reliability(p_target, convention, Some(&sorm), &limits)?;
                        warnings |= estimate.warnings;
                        if (estimate.value - beta).abs() < opts.convergence_tol {
                            settled = true;
                            break;
                        }
                        let u0 = pma_rescale(&outcome.mpp.u, beta, estimate.value);
                        beta = estimate.value;
                        warnings |= outcome.warnings;
                        outcome = engine.search(strategy, Formulation::pma(beta, convention), &u0)?;
                        curvatures = self.curvatures(&outcome.mpp)?;
                    }
                    if !settled {
                        log::debug!(
                            "second-order target for p = {p_target:.6e} still moving after {} refinements",
                            opts.target_refinements
                        );
                    }
                }

                let p = probability(beta, convention, self.second_order(curvatures.as_ref()).as_ref());
                warnings |= p.warnings;
                Ok(LevelSolution {
                    response_level: outcome.mpp.value,
                    reliability_index: beta,
                    probability: p.value,
                    curvatures,
                    warnings,
                    outcome,
                })
            }
        }
    }

    fn initial_point(
        &self, formulation: &Formulation, previous: Option<&PreviousLevel>,
        cached: Option<&Array1<f64>>, mean: Option<&Evaluation>,
    ) -> ReliabilityResult<Array1<f64>> {
        if let Some(prev) = previous {
            return Ok(match *formulation {
                Formulation::Ria { target } => {
                    ria_projection(&prev.u, &prev.grad_u, prev.value, target)
                }
                Formulation::Pma { beta_target, .. } => pma_rescale(&prev.u, prev.beta, beta_target),
            });
        }
        if let Some(u0) = cached.or(self.options.initial_point_u.as_ref()) {
            return Ok(u0.clone());
        }
        let mean = mean.ok_or(ReliabilityError::IncompleteSample { what: "mean-value sample" })?;
        let grad = mean.require_grad_u()?;
        Ok(match *formulation {
            Formulation::Ria { target } => ria_projection(&mean.u, grad, mean.value, target),
            Formulation::Pma { beta_target, minimize } => {
                pma_projection(grad, beta_target, minimize)
            }
        })
    }

    /// Principal curvatures at `mpp` when second-order integration is on and
    /// a Hessian is available.
    fn curvatures(&self, mpp: &MppState) -> ReliabilityResult<Option<Array1<f64>>> {
        if !self.options.second_order() {
            return Ok(None);
        }
        let Some(hess_u) = &mpp.hess_u else {
            log::debug!("no u-space Hessian at the MPP; integrating to first order");
            return Ok(None);
        };
        Ok(principal_curvatures(&mpp.grad_u, hess_u, &mpp.u)?.map(|set| set.curvatures))
    }

    fn second_order<'c>(&self, curvatures: Option<&'c Array1<f64>>) -> Option<SecondOrder<'c>> {
        curvatures.map(|curvatures| SecondOrder {
            rule: self.options.second_order_rule,
            curvatures,
            threshold: self.options.curvature_threshold,
        })
    }

    fn refine(
        &self, mpp: &MppState, fn_index: usize, p: f64, response_level: f64,
    ) -> ReliabilityResult<(f64, WarningFlags)> {
        let Some(sampler) = self.sampler else {
            return Ok((p, WarningFlags::NONE));
        };
        let refined = sampler.refine(&mpp.u, fn_index, p, response_level)?;
        if !(0.0..=1.0).contains(&refined) {
            return Ok((p, WarningFlags::PROBABILITY_OUT_OF_RANGE));
        }
        Ok((refined, WarningFlags::NONE))
    }

    fn sensitivities(
        &self, kind: LevelKind, mpp: &MppState, design_grad: &Array1<f64>, beta: f64,
        gen_beta: f64, sorm: Option<&SecondOrder<'_>>,
    ) -> (DesignSensitivities, WarningFlags) {
        let zeros = Array1::zeros(design_grad.len());
        if !kind.is_ria() {
            let sens = DesignSensitivities {
                response_level: design_grad.clone(),
                reliability_index: zeros.clone(),
                probability: zeros.clone(),
                gen_reliability_index: zeros,
            };
            return (sens, WarningFlags::NONE);
        }

        let norm = mpp.grad_u_norm();
        let scale = if norm > 0.0 { 1.0 / norm } else { 0.0 };
        let dbeta = if self.options.convention.is_cdf() {
            design_grad * scale
        } else {
            design_grad * -scale
        };
        let dp_dbeta = probability_beta_derivative(beta, self.options.convention, sorm);
        let dp = &dbeta * dp_dbeta.value;
        let density = std_normal_pdf(gen_beta);
        let dgen = if density > 0.0 { &dp * (-1.0 / density) } else { zeros.clone() };
        let sens = DesignSensitivities {
            response_level: zeros,
            reliability_index: dbeta,
            probability: dp,
            gen_reliability_index: dgen,
        };
        (sens, dp_dbeta.warnings)
    }

    fn log_level(&self, result: &ReliabilitySearchResult) {
        let level = if self.options.verbose { log::Level::Info } else { log::Level::Debug };
        log::log!(
            level,
            "fn {} {:?} {:.6e}: z = {:.6e}, beta = {:.6e}, p = {:.6e}, evaluations = {}",
            result.request.fn_index,
            result.request.kind,
            result.request.target,
            result.response_level,
            result.reliability_index,
            result.probability,
            result.truth_evaluations
        );
    }
}
