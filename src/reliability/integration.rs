//! integration — FORM/SORM conversions between reliability index and
//! probability.
//!
//! Purpose
//! -------
//! Convert a signed reliability index `β` into a probability and back, to
//! first order (`p = Φ(−β)`) or with a second-order curvature correction
//! (Breitung, Hohenbichler–Rackwitz or Hong), and provide `dp/dβ` for design
//! sensitivities.
//!
//! Key behaviors
//! -------------
//! - [`guarded_correction`] is the single place that applies the curvature
//!   guard and the probability range check. It returns
//!   [`Guarded::Corrected`] or [`Guarded::Degraded`] with the first-order
//!   value and a reason; [`probability`], [`reliability`] and
//!   [`probability_beta_derivative`] all consume it.
//! - Second-order work happens in corrected coordinates: `β_c = |β|`,
//!   `p_c = Φ(−β_c)`, and curvatures flip sign when `(cdf ∧ β < 0)` or
//!   `(ccdf ∧ β ≥ 0)`.
//! - [`reliability`] refines the first-order guess `−Φ⁻¹(p)` with a damped
//!   Newton iteration on `f(β) = p·∏√(1 + k(β)κᵢ) − Φ(−β)`, halving steps
//!   until `|f|` decreases.
//!
//! Invariants & assumptions
//! ------------------------
//! - Degradation never produces NaN/Inf probabilities; it returns the
//!   first-order value and raises a warning flag.
//! - The Hong rule has no analytic `df/dβ`: [`reliability`] rejects it with
//!   [`ReliabilityError::HongInversionUnsupported`] and the derivative
//!   degrades to first order with
//!   [`WarningFlags::HONG_DERIVATIVE_UNAVAILABLE`].
use crate::reliability::{
    core::{
        normal::{inverse_mills, std_normal_cdf, std_normal_inv_cdf, std_normal_pdf},
        options::{Convention, ReliabilityOptions, SecondOrderRule},
    },
    errors::{ReliabilityError, ReliabilityResult, WarningFlags},
};
use ndarray::Array1;

/// Second-order context: rule, principal curvatures at the MPP and guard.
#[derive(Debug, Clone, Copy)]
pub struct SecondOrder<'a> {
    pub rule: SecondOrderRule,
    pub curvatures: &'a Array1<f64>,
    pub threshold: f64,
}

/// Limits of the Newton inversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonLimits {
    pub max_iter: usize,
    pub backtrack_max: usize,
    pub tol: f64,
}

impl NewtonLimits {
    pub fn from_options(opts: &ReliabilityOptions) -> Self {
        Self {
            max_iter: opts.newton_max_iter,
            backtrack_max: opts.backtrack_max,
            tol: opts.convergence_tol,
        }
    }
}

/// Why a second-order value fell back to first order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    CurvatureGuard,
    OutOfRange,
    NewtonDivergence,
    HongDerivative,
}

impl DegradeReason {
    pub fn warning(self) -> WarningFlags {
        match self {
            DegradeReason::CurvatureGuard => WarningFlags::CURVATURE_GUARD_VIOLATION,
            DegradeReason::OutOfRange => WarningFlags::PROBABILITY_OUT_OF_RANGE,
            DegradeReason::NewtonDivergence => WarningFlags::NEWTON_INVERSION_DIVERGENCE,
            DegradeReason::HongDerivative => WarningFlags::HONG_DERIVATIVE_UNAVAILABLE,
        }
    }
}

/// Outcome of the guarded second-order correction.
#[derive(Debug, Clone, PartialEq)]
pub enum Guarded<T> {
    Corrected(T),
    Degraded { first_order: f64, reason: DegradeReason },
}

/// Second-order quantities at one `β`, in corrected coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    /// `|β|`.
    pub beta_corr: f64,
    /// `∏ √(1 + k·κᵢ)`.
    pub product: f64,
    /// `Σ κᵢ·k′ / (2(1 + k·κᵢ))`, i.e. `d ln(product)/dβ_c`; `None` for Hong.
    pub dlog_product: Option<f64>,
    /// Corrected probability in corrected coordinates.
    pub p_corr: f64,
    /// Corrected probability in the caller's convention.
    pub probability: f64,
}

/// A value together with the warnings raised while computing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub value: f64,
    pub warnings: WarningFlags,
}

impl Estimate {
    fn clean(value: f64) -> Self {
        Self { value, warnings: WarningFlags::NONE }
    }

    fn degraded(value: f64, reason: DegradeReason) -> Self {
        Self { value, warnings: reason.warning() }
    }
}

/// Apply the second-order correction at `beta`, or explain why not.
///
/// Degrades with [`DegradeReason::CurvatureGuard`] when some
/// `1 + k·κᵢ ≤ threshold` (for Hong also `1 + β_c·κᵢ`), and with
/// [`DegradeReason::OutOfRange`] when the corrected probability leaves
/// `[0, 1]`.
pub fn guarded_correction(
    beta: f64, convention: Convention, sorm: &SecondOrder<'_>,
) -> Guarded<Correction> {
    let first_order = std_normal_cdf(-beta);
    let degrade = |reason| Guarded::Degraded { first_order, reason };

    let positive = beta >= 0.0;
    let beta_corr = beta.abs();
    let flip = (convention.is_cdf() && !positive) || (!convention.is_cdf() && positive);
    let kappa: Array1<f64> = if flip { -sorm.curvatures } else { sorm.curvatures.clone() };

    let psi = inverse_mills(beta_corr);
    let (kterm, kterm_derivative) = match sorm.rule {
        SecondOrderRule::Breitung => (beta_corr, Some(1.0)),
        SecondOrderRule::HohenbichlerRackwitz => (psi, Some(psi * (psi - beta_corr))),
        SecondOrderRule::Hong => (psi, None),
    };

    let mut product = 1.0;
    let mut dlog = 0.0;
    for &k in kappa.iter() {
        let term = 1.0 + kterm * k;
        if !(term > sorm.threshold) {
            return degrade(DegradeReason::CurvatureGuard);
        }
        product *= term.sqrt();
        if let Some(dk) = kterm_derivative {
            dlog += k * dk / (2.0 * term);
        }
    }

    let p1_corr = std_normal_cdf(-beta_corr);
    let mut p_corr = p1_corr / product;
    if sorm.rule == SecondOrderRule::Hong && !kappa.is_empty() {
        let m = kappa.len() as f64;
        let mut c1 = 0.0;
        for &k in kappa.iter() {
            let denom = 1.0 + beta_corr * k;
            if !(denom > sorm.threshold) {
                return degrade(DegradeReason::CurvatureGuard);
            }
            let h = m * k / 2.0 / denom;
            c1 += std_normal_cdf(-beta_corr - h) / p1_corr * (psi * h).exp();
        }
        p_corr *= c1 / m;
    }
    if !(0.0..=1.0).contains(&p_corr) {
        return degrade(DegradeReason::OutOfRange);
    }

    Guarded::Corrected(Correction {
        beta_corr,
        product,
        dlog_product: kterm_derivative.map(|_| dlog),
        p_corr,
        probability: if positive { p_corr } else { 1.0 - p_corr },
    })
}

/// Forward conversion `β → p`.
///
/// First order without `sorm`; otherwise the guarded second-order value.
pub fn probability(beta: f64, convention: Convention, sorm: Option<&SecondOrder<'_>>) -> Estimate {
    let Some(sorm) = sorm else {
        return Estimate::clean(std_normal_cdf(-beta));
    };
    match guarded_correction(beta, convention, sorm) {
        Guarded::Corrected(c) => Estimate::clean(c.probability),
        Guarded::Degraded { first_order, reason } => Estimate::degraded(first_order, reason),
    }
}

/// Inverse conversion `p → β`.
///
/// # Errors
/// - [`ReliabilityError::HongInversionUnsupported`] for the Hong rule.
///
/// Non-convergence, failed backtracking and guard failures at any trial `β`
/// return the first-order guess with a warning.
pub fn reliability(
    p: f64, convention: Convention, sorm: Option<&SecondOrder<'_>>, limits: &NewtonLimits,
) -> ReliabilityResult<Estimate> {
    let beta0 = -std_normal_inv_cdf(p);
    let Some(sorm) = sorm else {
        return Ok(Estimate::clean(beta0));
    };
    if sorm.rule == SecondOrderRule::Hong {
        return Err(ReliabilityError::HongInversionUnsupported);
    }
    if sorm.curvatures.is_empty() || !beta0.is_finite() {
        return Ok(Estimate::clean(beta0));
    }

    let positive = beta0 >= 0.0;
    let signed = |beta_corr: f64| if positive { beta_corr } else { -beta_corr };
    let p_target = if positive { p } else { 1.0 - p };
    let residual = |beta_corr: f64| -> Result<(f64, f64), DegradeReason> {
        match guarded_correction(signed(beta_corr), convention, sorm) {
            Guarded::Corrected(c) => {
                let dlog = c.dlog_product.ok_or(DegradeReason::HongDerivative)?;
                let scaled = p_target * c.product;
                let f = scaled - std_normal_cdf(-beta_corr);
                let df = scaled * dlog + std_normal_pdf(beta_corr);
                Ok((f, df))
            }
            Guarded::Degraded { reason, .. } => Err(reason),
        }
    };

    let mut beta_corr = beta0.abs();
    let (mut f, mut df) = match residual(beta_corr) {
        Ok(pair) => pair,
        Err(reason) => return Ok(Estimate::degraded(beta0, reason)),
    };
    for _ in 0..limits.max_iter {
        let step = f / df;
        if !step.is_finite() {
            break;
        }
        if step.abs() < limits.tol {
            return Ok(Estimate::clean(signed(beta_corr - step)));
        }

        let mut damping = 1.0;
        let mut accepted = None;
        for _ in 0..=limits.backtrack_max {
            let trial = beta_corr - damping * step;
            if trial >= 0.0 {
                match residual(trial) {
                    Ok((ft, dft)) if ft.abs() < f.abs() => {
                        accepted = Some((trial, ft, dft));
                        break;
                    }
                    Ok(_) => {}
                    Err(reason) => return Ok(Estimate::degraded(beta0, reason)),
                }
            }
            damping *= 0.5;
        }
        let Some((trial, ft, dft)) = accepted else {
            break;
        };

        let change = (trial - beta_corr).abs();
        beta_corr = trial;
        (f, df) = (ft, dft);
        if change < limits.tol {
            return Ok(Estimate::clean(signed(beta_corr)));
        }
    }
    log::debug!("second-order inversion of p = {p:.6e} did not converge; using first order");
    Ok(Estimate::degraded(beta0, DegradeReason::NewtonDivergence))
}

/// `dp/dβ` at `beta`, first order `−φ(β)` without `sorm` or on degradation.
pub fn probability_beta_derivative(
    beta: f64, convention: Convention, sorm: Option<&SecondOrder<'_>>,
) -> Estimate {
    let first_order = -std_normal_pdf(beta);
    let Some(sorm) = sorm else {
        return Estimate::clean(first_order);
    };
    match guarded_correction(beta, convention, sorm) {
        Guarded::Corrected(c) => match c.dlog_product {
            Some(dlog) => Estimate::clean(
                -std_normal_pdf(c.beta_corr) / c.product - c.p_corr * dlog,
            ),
            None => Estimate::degraded(first_order, DegradeReason::HongDerivative),
        },
        Guarded::Degraded { reason, .. } => Estimate::degraded(first_order, reason),
    }
}

/// Generalized reliability index `−Φ⁻¹(p)`.
pub fn gen_reliability(p: f64) -> f64 {
    -std_normal_inv_cdf(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - First-order probability ranges and round trips.
    // - Breitung and Hohenbichler–Rackwitz reference values and round trips.
    // - Curvature guard, range check and Hong restrictions.
    // - dp/dβ against central differences of `probability`.
    // -------------------------------------------------------------------------

    const LIMITS: NewtonLimits = NewtonLimits { max_iter: 20, backtrack_max: 10, tol: 1e-10 };

    fn sorm(rule: SecondOrderRule, curvatures: &Array1<f64>) -> SecondOrder<'_> {
        SecondOrder { rule, curvatures, threshold: 1e-10 }
    }

    #[test]
    // Purpose
    // -------
    // CDF probabilities are at most 0.5 for β ≥ 0 and above 0.5 for β < 0.
    fn first_order_probability_ranges() {
        for &beta in &[0.0, 0.4, 1.0, 3.0, 8.0] {
            let p = probability(beta, Convention::Cdf, None).value;
            assert!(p > 0.0 && p <= 0.5, "beta = {beta}, p = {p}");
        }
        for &beta in &[-0.01, -1.0, -3.0, -8.0] {
            let p = probability(beta, Convention::Cdf, None).value;
            assert!(p > 0.5 && p < 1.0, "beta = {beta}, p = {p}");
        }
    }

    #[test]
    // Purpose
    // -------
    // First-order conversions invert each other.
    fn first_order_round_trip() {
        for &beta in &[-2.0, -0.3, 0.0, 1.7, 4.0] {
            let p = probability(beta, Convention::Ccdf, None).value;
            let back = reliability(p, Convention::Ccdf, None, &LIMITS).expect("first order");
            assert_abs_diff_eq!(back.value, beta, epsilon = 1e-8);
            assert!(back.warnings.is_empty());
        }
    }

    #[test]
    // Purpose
    // -------
    // Breitung and Hohenbichler–Rackwitz match hand-computed values.
    //
    // Given
    // -----
    // - CDF, β = 2 (no curvature flip), κ = [0.1, 0.3].
    //
    // Expect
    // ------
    // - Breitung: Φ(−2)/√(1.2·1.6) ≈ 0.0164185.
    // - H–R: Φ(−2)/√((1+0.1ψ)(1+0.3ψ)), ψ = φ(2)/Φ(−2) ≈ 0.0156313.
    fn second_order_reference_values() {
        let kappa = array![0.1, 0.3];
        let breitung =
            probability(2.0, Convention::Cdf, Some(&sorm(SecondOrderRule::Breitung, &kappa)));
        assert_abs_diff_eq!(breitung.value, 0.016418493505475973, epsilon = 1e-12);
        assert!(breitung.warnings.is_empty());

        let hr = probability(
            2.0,
            Convention::Cdf,
            Some(&sorm(SecondOrderRule::HohenbichlerRackwitz, &kappa)),
        );
        assert_abs_diff_eq!(hr.value, 0.015631304855809686, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Second-order conversions invert each other through the Newton solve,
    // for both signs of β and both conventions.
    fn second_order_round_trip() {
        let kappa = array![0.15, -0.05, 0.02];
        for rule in [SecondOrderRule::Breitung, SecondOrderRule::HohenbichlerRackwitz] {
            let ctx = sorm(rule, &kappa);
            for convention in [Convention::Cdf, Convention::Ccdf] {
                for &beta in &[-1.8, 0.7, 2.5] {
                    let p = probability(beta, convention, Some(&ctx));
                    assert!(p.warnings.is_empty());
                    let back = reliability(p.value, convention, Some(&ctx), &LIMITS)
                        .expect("Newton inversion");
                    assert!(back.warnings.is_empty(), "{rule:?} {convention:?} {beta}");
                    assert_abs_diff_eq!(back.value, beta, epsilon = 1e-7);
                }
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // A violated curvature guard degrades to first order with a warning and
    // never yields NaN/Inf.
    //
    // Given
    // -----
    // - CDF, β = 2, κ = [−0.6]: 1 + 2·(−0.6) = −0.2.
    fn curvature_guard_falls_back_to_first_order() {
        let kappa = array![-0.6];
        let ctx = sorm(SecondOrderRule::Breitung, &kappa);

        let p = probability(2.0, Convention::Cdf, Some(&ctx));
        assert_abs_diff_eq!(p.value, std_normal_cdf(-2.0), epsilon = 1e-15);
        assert!(p.warnings.contains(WarningFlags::CURVATURE_GUARD_VIOLATION));

        let beta = reliability(p.value, Convention::Cdf, Some(&ctx), &LIMITS).expect("degrades");
        assert!(beta.value.is_finite());
        assert_abs_diff_eq!(beta.value, 2.0, epsilon = 1e-8);
        assert!(beta.warnings.contains(WarningFlags::CURVATURE_GUARD_VIOLATION));

        let dp = probability_beta_derivative(2.0, Convention::Cdf, Some(&ctx));
        assert_abs_diff_eq!(dp.value, -std_normal_pdf(2.0), epsilon = 1e-15);
        assert!(dp.warnings.contains(WarningFlags::CURVATURE_GUARD_VIOLATION));
    }

    #[test]
    // Purpose
    // -------
    // A corrected probability above one is discarded.
    //
    // Given
    // -----
    // - CDF, β = 0.1, κ = [−9]: 1 + 0.1·(−9) = 0.1 passes the guard but
    //   Φ(−0.1)/√0.1 > 1.
    fn out_of_range_probability_is_discarded() {
        let kappa = array![-9.0];
        let p = probability(0.1, Convention::Cdf, Some(&sorm(SecondOrderRule::Breitung, &kappa)));
        assert_abs_diff_eq!(p.value, std_normal_cdf(-0.1), epsilon = 1e-15);
        assert!(p.warnings.contains(WarningFlags::PROBABILITY_OUT_OF_RANGE));
    }

    #[test]
    // Purpose
    // -------
    // Hong works forward, is rejected for inversion, and has no derivative.
    fn hong_restrictions() {
        let kappa = array![0.1, 0.2];
        let ctx = sorm(SecondOrderRule::Hong, &kappa);
        let p = probability(2.0, Convention::Cdf, Some(&ctx));
        assert!(p.value > 0.0 && p.value < std_normal_cdf(-2.0));
        assert!(p.warnings.is_empty());

        assert_eq!(
            reliability(p.value, Convention::Cdf, Some(&ctx), &LIMITS),
            Err(ReliabilityError::HongInversionUnsupported)
        );

        let dp = probability_beta_derivative(2.0, Convention::Cdf, Some(&ctx));
        assert!(dp.warnings.contains(WarningFlags::HONG_DERIVATIVE_UNAVAILABLE));
        assert_abs_diff_eq!(dp.value, -std_normal_pdf(2.0), epsilon = 1e-15);

        let flat = Array1::zeros(2);
        let flat_p = probability(1.3, Convention::Cdf, Some(&sorm(SecondOrderRule::Hong, &flat)));
        assert_abs_diff_eq!(flat_p.value, std_normal_cdf(-1.3), epsilon = 1e-14);
    }

    #[test]
    // Purpose
    // -------
    // Running out of Newton iterations keeps the first-order index and flags
    // the divergence.
    //
    // Given
    // -----
    // - Breitung, CDF, κ = [0.1, 0.3], p = Breitung probability at β = 2.
    // - One Newton iteration with tolerance 1e-14.
    //
    // Expect
    // ------
    // - β = −Φ⁻¹(p) (first order) with `NEWTON_INVERSION_DIVERGENCE`.
    // - With the default cap the same inversion converges to 2 cleanly.
    fn newton_cap_falls_back_to_first_order() {
        // Arrange
        let k = array![0.1, 0.3];
        let rule = sorm(SecondOrderRule::Breitung, &k);
        let p = probability(2.0, Convention::Cdf, Some(&rule)).value;
        let capped = NewtonLimits { max_iter: 1, backtrack_max: 10, tol: 1e-14 };

        // Act
        let degraded = reliability(p, Convention::Cdf, Some(&rule), &capped).expect("breitung");
        let converged = reliability(p, Convention::Cdf, Some(&rule), &LIMITS).expect("breitung");

        // Assert
        assert!(degraded.warnings.contains(WarningFlags::NEWTON_INVERSION_DIVERGENCE));
        assert_abs_diff_eq!(degraded.value, -std_normal_inv_cdf(p), epsilon = 1e-15);
        assert!(degraded.value > 2.0);
        assert!(converged.warnings.is_empty());
        assert_abs_diff_eq!(converged.value, 2.0, epsilon = 1e-8);
    }

    #[test]
    // Purpose
    // -------
    // Analytic dp/dβ agrees with central differences of `probability`.
    fn probability_derivative_matches_finite_differences() {
        let kappa = array![0.2, -0.1];
        let h = 1e-6;
        for rule in [SecondOrderRule::Breitung, SecondOrderRule::HohenbichlerRackwitz] {
            let ctx = sorm(rule, &kappa);
            for &beta in &[1.5, -0.8] {
                let fd = (probability(beta + h, Convention::Cdf, Some(&ctx)).value
                    - probability(beta - h, Convention::Cdf, Some(&ctx)).value)
                    / (2.0 * h);
                let analytic = probability_beta_derivative(beta, Convention::Cdf, Some(&ctx));
                assert!(analytic.warnings.is_empty());
                assert_abs_diff_eq!(analytic.value, fd, epsilon = 1e-7);
            }
        }
        let first = probability_beta_derivative(0.5, Convention::Cdf, None);
        assert_abs_diff_eq!(first.value, -std_normal_pdf(0.5), epsilon = 1e-15);
    }

    #[test]
    // Purpose
    // -------
    // The generalized reliability index inverts Φ(−β*).
    fn generalized_reliability_inverts_first_order() {
        assert_abs_diff_eq!(gen_reliability(std_normal_cdf(-1.25)), 1.25, epsilon = 1e-9);
        assert_abs_diff_eq!(gen_reliability(0.5), 0.0, epsilon = 1e-15);
    }
}
