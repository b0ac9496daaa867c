//! Two-point adaptive nonlinear approximation (TANA).
//!
//! With the latest sample `v₂` and the one before it `v₁`, each coordinate is
//! expanded in an intervening variable `sᵢ^{pᵢ}`:
//!
//! ```text
//! g̃(v) = g(v₂) + Σᵢ ∂ᵢg(v₂) · s₂ᵢ^{1−pᵢ}/pᵢ · (sᵢ^{pᵢ} − s₂ᵢ^{pᵢ})
//!              + ½ ε Σᵢ (sᵢ^{pᵢ} − s₂ᵢ^{pᵢ})²
//! ```
//!
//! where `s = v + shift` keeps both samples positive,
//! `pᵢ = 1 + ln(∂ᵢg(v₁)/∂ᵢg(v₂)) / ln(s₁ᵢ/s₂ᵢ)` (1 when undefined) and `ε`
//! makes `g̃(v₁) = g(v₁)`. The Hessian is diagonal. With a single sample the
//! approximation is the first-order Taylor expansion about it.
//!
//! Shifted coordinates below `S_FLOOR · s₂ᵢ` are clamped to that floor, so
//! `g̃` stays continuous and flat in `vᵢ` there instead of blowing up at
//! `sᵢ → 0⁺`.
use crate::reliability::{
    core::{
        options::ApproxSpace,
        transform::SpaceTransform,
        types::{Evaluation, RequestMask},
    },
    errors::{ReliabilityError, ReliabilityResult},
    evaluator::{LimitStateEvaluator, SpaceSample, sample_in_space},
};
use ndarray::{Array1, Array2};

const MIN_EXPONENT: f64 = 1e-8;
const S_FLOOR: f64 = 1e-3;

pub struct TanaEvaluator<'a> {
    transform: &'a dyn SpaceTransform,
    space: ApproxSpace,
    previous: Option<SpaceSample>,
    current: Option<SpaceSample>,
    fit: Option<TanaFit>,
}

#[derive(Debug, Clone, PartialEq)]
struct TanaFit {
    shift: Array1<f64>,
    exponents: Array1<f64>,
    epsilon: f64,
}

impl<'a> TanaEvaluator<'a> {
    pub fn new(transform: &'a dyn SpaceTransform, space: ApproxSpace) -> Self {
        Self { transform, space, previous: None, current: None, fit: None }
    }

    /// Number of stored samples (0, 1 or 2).
    pub fn samples(&self) -> usize {
        usize::from(self.previous.is_some()) + usize::from(self.current.is_some())
    }

    /// Fitted exponents, once two samples are stored.
    pub fn exponents(&self) -> Option<&Array1<f64>> {
        self.fit.as_ref().map(|f| &f.exponents)
    }

    fn approximate(&self, v: &Array1<f64>) -> ReliabilityResult<(f64, Array1<f64>, Array1<f64>)> {
        let cur = self.current.as_ref().ok_or(ReliabilityError::ApproximationNotBuilt)?;
        let n = v.len();
        let Some(fit) = &self.fit else {
            let d = v - &cur.point;
            return Ok((cur.value + cur.grad.dot(&d), cur.grad.clone(), Array1::zeros(n)));
        };

        let mut value = cur.value;
        let mut grad = Array1::zeros(n);
        let mut hess_diag = Array1::zeros(n);
        let mut quad = 0.0;
        let mut dquad = Array1::zeros(n);
        let mut d2quad = Array1::zeros(n);
        for i in 0..n {
            let s2 = cur.point[i] + fit.shift[i];
            let floor = S_FLOOR * s2;
            let raw = v[i] + fit.shift[i];
            let s = raw.max(floor);
            let p = fit.exponents[i];
            let g2 = cur.grad[i];
            let t = s.powf(p) - s2.powf(p);
            value += g2 * s2.powf(1.0 - p) / p * t;
            quad += t * t;
            if raw < floor {
                continue;
            }
            grad[i] = g2 * (s / s2).powf(p - 1.0);
            hess_diag[i] = g2 * (p - 1.0) * s.powf(p - 2.0) * s2.powf(1.0 - p);
            dquad[i] = p * s.powf(p - 1.0) * t;
            d2quad[i] = p * (p * s.powf(2.0 * p - 2.0) + t * (p - 1.0) * s.powf(p - 2.0));
        }
        value += 0.5 * fit.epsilon * quad;
        grad = grad + dquad * fit.epsilon;
        hess_diag = hess_diag + d2quad * fit.epsilon;
        Ok((value, grad, hess_diag))
    }
}

impl LimitStateEvaluator for TanaEvaluator<'_> {
    /// # Errors
    /// - [`ReliabilityError::ApproximationNotBuilt`] before the first rebuild.
    /// - Transform errors.
    fn evaluate(&self, u: &Array1<f64>, mask: RequestMask) -> ReliabilityResult<Evaluation> {
        let x = self.transform.u_to_x(u)?;
        let v = match self.space {
            ApproxSpace::X => &x,
            ApproxSpace::U => u,
        };
        let (value, grad, hess_diag) = self.approximate(v)?;

        let mut sample =
            Evaluation { x, u: u.clone(), value, grad_x: None, grad_u: None, hess_x: None, hess_u: None };
        if !mask.wants_gradient() {
            return Ok(sample);
        }
        let hess = mask.wants_hessian().then(|| Array2::from_diag(&hess_diag));
        match self.space {
            ApproxSpace::U => {
                sample.grad_u = Some(grad);
                sample.hess_u = hess;
            }
            ApproxSpace::X => {
                sample.grad_u = Some(self.transform.grad_x_to_u(&grad, &sample.x)?);
                if let Some(h) = hess {
                    sample.hess_u = Some(self.transform.hess_x_to_u(&h, &grad, &sample.x)?);
                    sample.hess_x = Some(h);
                }
                sample.grad_x = Some(grad);
            }
        }
        Ok(sample)
    }

    /// Append `sample`, discarding the oldest of three, and refit.
    ///
    /// # Errors
    /// - [`ReliabilityError::IncompleteSample`] without a gradient in the
    ///   approximation space.
    fn rebuild(&mut self, sample: &Evaluation) -> ReliabilityResult<()> {
        let next = sample_in_space(sample, self.space, false)?;
        self.previous = self.current.take();
        self.current = Some(next);
        self.fit = match (&self.previous, &self.current) {
            (Some(prev), Some(cur)) => Some(fit_two_point(prev, cur)),
            _ => None,
        };
        Ok(())
    }

    fn clear_history(&mut self) {
        self.previous = None;
        self.current = None;
        self.fit = None;
    }
}

// ---- Helper methods ----

fn fit_two_point(prev: &SpaceSample, cur: &SpaceSample) -> TanaFit {
    let n = cur.point.len();
    let mut shift = Array1::zeros(n);
    let mut exponents = Array1::ones(n);
    for i in 0..n {
        let (v1, v2) = (prev.point[i], cur.point[i]);
        let lo = v1.min(v2);
        if lo <= 0.0 {
            shift[i] = -lo + (v1 - v2).abs().max(1.0);
        }
        let (s1, s2) = (v1 + shift[i], v2 + shift[i]);
        let grad_ratio = prev.grad[i] / cur.grad[i];
        let p = 1.0 + grad_ratio.ln() / (s1 / s2).ln();
        if grad_ratio > 0.0 && s1 != s2 && p.is_finite() && p.abs() > MIN_EXPONENT {
            exponents[i] = p;
        }
    }

    let mut residual = prev.value - cur.value;
    let mut denom = 0.0;
    for i in 0..n {
        let p = exponents[i];
        let s1 = prev.point[i] + shift[i];
        let s2 = cur.point[i] + shift[i];
        let t = s1.powf(p) - s2.powf(p);
        residual -= cur.grad[i] * s2.powf(1.0 - p) / p * t;
        denom += t * t;
    }
    let epsilon = if denom > f64::EPSILON { 2.0 * residual / denom } else { 0.0 };
    TanaFit { shift, exponents, epsilon: if epsilon.is_finite() { epsilon } else { 0.0 } }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reliability::core::transform::NormalTransform;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Single-sample behavior (first-order Taylor).
    // - Exact reproduction of separable power functions from two samples.
    // - Interpolation of the older sample and history management.
    // -------------------------------------------------------------------------

    /// Exact sample of g(v) = v₀² + v₁³ at v (u-space, identity transform).
    fn power_sample(v: Array1<f64>) -> Evaluation {
        let value = v[0].powi(2) + v[1].powi(3);
        let grad = array![2.0 * v[0], 3.0 * v[1].powi(2)];
        Evaluation {
            x: v.clone(),
            u: v,
            value,
            grad_x: Some(grad.clone()),
            grad_u: Some(grad),
            hess_x: None,
            hess_u: None,
        }
    }

    fn identity() -> NormalTransform {
        NormalTransform::independent(array![0.0, 0.0], array![1.0, 1.0]).expect("valid")
    }

    #[test]
    // Purpose
    // -------
    // One sample gives the linear expansion about it.
    fn single_sample_is_linear() {
        let transform = identity();
        let mut tana = TanaEvaluator::new(&transform, ApproxSpace::U);
        tana.rebuild(&power_sample(array![1.0, 1.0])).expect("rebuild");
        assert_eq!(tana.samples(), 1);
        let s = tana.evaluate(&array![2.0, 1.0], RequestMask::Value).expect("evaluate");
        // g = 2, ∇g = [2, 3]; step [1, 0].
        assert_abs_diff_eq!(s.value, 4.0, epsilon = 1e-14);
    }

    #[test]
    // Purpose
    // -------
    // Two samples of a separable power function recover it exactly.
    //
    // Given
    // -----
    // - g = v₀² + v₁³ sampled at [1, 1] and [2, 1.5] (positive, no shift).
    //
    // Expect
    // ------
    // - Exponents [2, 3], ε = 0; value, gradient and Hessian exact elsewhere.
    fn recovers_separable_power_function() {
        // Arrange
        let transform = identity();
        let mut tana = TanaEvaluator::new(&transform, ApproxSpace::U);
        tana.rebuild(&power_sample(array![1.0, 1.0])).expect("rebuild");
        tana.rebuild(&power_sample(array![2.0, 1.5])).expect("rebuild");

        // Act
        let v = array![1.3, 0.8];
        let s = tana.evaluate(&v, RequestMask::ValueGradientHessian).expect("evaluate");

        // Assert
        let p = tana.exponents().expect("fitted");
        assert_abs_diff_eq!(p[0], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(p[1], 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(s.value, 1.3f64.powi(2) + 0.8f64.powi(3), epsilon = 1e-10);
        let g = s.grad_u.expect("gradient");
        assert_abs_diff_eq!(g[0], 2.6, epsilon = 1e-10);
        assert_abs_diff_eq!(g[1], 3.0 * 0.64, epsilon = 1e-10);
        let h = s.hess_u.expect("hessian");
        assert_abs_diff_eq!(h[[0, 0]], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(h[[1, 1]], 6.0 * 0.8, epsilon = 1e-9);
        assert_eq!(h[[0, 1]], 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Leaving the shifted positive region clamps the coordinate: the value
    // stays continuous and finite, and the clamped direction is flat.
    //
    // Given
    // -----
    // - The exact fit of g = v₀² + v₁³ from [1, 1] and [2, 1.5] (s₂₀ = 2, so
    //   the floor for v₀ is 0.002).
    //
    // Expect
    // ------
    // - g̃ at v₀ = −0.5 and v₀ = −5 both equal g̃ at the floor, 0.002² + 0.8³.
    // - Just above the floor the value agrees to 1e-8.
    // - Zero gradient and Hessian along v₀ below the floor; all entries finite.
    fn clamps_below_the_shifted_floor() {
        // Arrange
        let transform = identity();
        let mut tana = TanaEvaluator::new(&transform, ApproxSpace::U);
        tana.rebuild(&power_sample(array![1.0, 1.0])).expect("rebuild");
        tana.rebuild(&power_sample(array![2.0, 1.5])).expect("rebuild");
        let mask = RequestMask::ValueGradientHessian;

        // Act
        let below = tana.evaluate(&array![-0.5, 0.8], mask).expect("evaluate");
        let far = tana.evaluate(&array![-5.0, 0.8], mask).expect("evaluate");
        let above = tana.evaluate(&array![0.002 + 1e-9, 0.8], mask).expect("evaluate");

        // Assert
        let at_floor = 0.002f64.powi(2) + 0.8f64.powi(3);
        assert_abs_diff_eq!(below.value, at_floor, epsilon = 1e-9);
        assert_eq!(below.value, far.value);
        assert_abs_diff_eq!(above.value, below.value, epsilon = 1e-8);

        let g = below.grad_u.expect("gradient");
        let h = below.hess_u.expect("hessian");
        assert_eq!(g[0], 0.0);
        assert_eq!(h[[0, 0]], 0.0);
        assert_abs_diff_eq!(g[1], 3.0 * 0.64, epsilon = 1e-10);
        assert!(g.iter().chain(h.iter()).all(|v| v.is_finite()));
    }

    #[test]
    // Purpose
    // -------
    // The approximation interpolates both samples even after a shift.
    //
    // Given
    // -----
    // - g(v) = exp(v₀) − v₁ sampled at [−1, 0.5] and [0.5, −2].
    //
    // Expect
    // ------
    // - g̃ equals g at both samples; history clears to zero samples.
    fn interpolates_both_samples_with_shift() {
        let transform = identity();
        let exp_sample = |v: Array1<f64>| Evaluation {
            x: v.clone(),
            u: v.clone(),
            value: v[0].exp() - v[1],
            grad_x: Some(array![v[0].exp(), -1.0]),
            grad_u: Some(array![v[0].exp(), -1.0]),
            hess_x: None,
            hess_u: None,
        };
        let first = exp_sample(array![-1.0, 0.5]);
        let second = exp_sample(array![0.5, -2.0]);
        let mut tana = TanaEvaluator::new(&transform, ApproxSpace::U);
        tana.rebuild(&first).expect("rebuild");
        tana.rebuild(&second).expect("rebuild");

        let at_first = tana.evaluate(&first.u, RequestMask::Value).expect("evaluate");
        let at_second = tana.evaluate(&second.u, RequestMask::Value).expect("evaluate");
        assert_abs_diff_eq!(at_first.value, first.value, epsilon = 1e-10);
        assert_abs_diff_eq!(at_second.value, second.value, epsilon = 1e-12);

        tana.clear_history();
        assert_eq!(tana.samples(), 0);
        assert!(tana.evaluate(&first.u, RequestMask::Value).is_err());
    }
}
