//! Standard normal helpers: density, distribution, quantile and the
//! inverse Mills ratio used by the second-order rules.
use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::{PI, SQRT_2};

/// Standard normal density φ(x).
pub fn std_normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Standard normal distribution function Φ(x).
pub fn std_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal quantile Φ⁻¹(p).
///
/// Returns `-inf` at `p = 0`, `+inf` at `p = 1` and `NaN` outside `[0, 1]`.
pub fn std_normal_inv_cdf(p: f64) -> f64 {
    if !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    -SQRT_2 * erfc_inv(2.0 * p)
}

/// ψ(β) = φ(β) / Φ(−β), the inverse Mills ratio at `β`.
///
/// Falls back to the asymptotic expansion `β + 1/β` once Φ(−β) underflows.
pub fn inverse_mills(beta: f64) -> f64 {
    let tail = std_normal_cdf(-beta);
    if tail > f64::MIN_POSITIVE {
        std_normal_pdf(beta) / tail
    } else {
        beta + 1.0 / beta
    }
}
