//! Space transform — mapping between physical x-space and standard normal
//! u-space.
//!
//! Purpose
//! -------
//! Define the [`SpaceTransform`] contract the search engine and evaluators
//! rely on, and provide [`NormalTransform`] for independent or correlated
//! normal variables.
//!
//! Key behaviors
//! -------------
//! - Map points `x ↔ u` and pull x-space gradients/Hessians back to u-space.
//! - For normal variables the map is affine, `x = μ + D·L·u`, with `D` the
//!   diagonal of standard deviations and `L` the lower Cholesky factor of the
//!   correlation matrix. Then `∇g_u = (D L)ᵀ ∇g_x` and
//!   `H_u = (D L)ᵀ H_x (D L)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every vector passed in or returned has length [`SpaceTransform::dim`].
//! - A correlation matrix that cannot be factorized yields
//!   [`ReliabilityError::SingularTransform`], which is fatal for the run.
use crate::reliability::errors::{ReliabilityError, ReliabilityResult};
use nalgebra::{DMatrix, DVector, linalg::Cholesky};
use ndarray::{Array1, Array2};

/// Contract for x ↔ u mappings.
///
/// Nonlinear transforms (e.g., Nataf) implement the same interface; the
/// Hessian pull-back receives the x-space gradient for the curvature term of
/// the map.
pub trait SpaceTransform {
    /// Number of uncertain variables.
    fn dim(&self) -> usize;

    /// Means of the uncertain variables in x-space.
    fn mean_x(&self) -> Array1<f64>;

    fn x_to_u(&self, x: &Array1<f64>) -> ReliabilityResult<Array1<f64>>;

    fn u_to_x(&self, u: &Array1<f64>) -> ReliabilityResult<Array1<f64>>;

    fn grad_x_to_u(&self, grad_x: &Array1<f64>, x: &Array1<f64>)
    -> ReliabilityResult<Array1<f64>>;

    fn hess_x_to_u(
        &self, hess_x: &Array2<f64>, grad_x: &Array1<f64>, x: &Array1<f64>,
    ) -> ReliabilityResult<Array2<f64>>;
}

/// Affine transform for (possibly correlated) normal variables.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalTransform {
    means: Array1<f64>,
    std_devs: Array1<f64>,
    /// Lower Cholesky factor `L` of the correlation matrix.
    lower: DMatrix<f64>,
    jacobian: Array2<f64>,
}

impl NormalTransform {
    /// Independent normals with the given means and standard deviations.
    ///
    /// # Errors
    /// - [`ReliabilityError::DimensionMismatch`] if the lengths differ.
    /// - [`ReliabilityError::InvalidTransformParam`] for non-finite means or
    ///   non-positive standard deviations.
    pub fn independent(means: Array1<f64>, std_devs: Array1<f64>) -> ReliabilityResult<Self> {
        let n = means.len();
        Self::new(means, std_devs, Array2::eye(n))
    }

    /// Correlated normals.
    ///
    /// # Errors
    /// - As [`NormalTransform::independent`], plus
    ///   [`ReliabilityError::InvalidTransformParam`] for a correlation matrix
    ///   that is not symmetric with unit diagonal and entries in `[-1, 1]`.
    /// - [`ReliabilityError::SingularTransform`] if the Cholesky factorization
    ///   fails.
    pub fn new(
        means: Array1<f64>, std_devs: Array1<f64>, correlation: Array2<f64>,
    ) -> ReliabilityResult<Self> {
        let n = means.len();
        check_len("standard deviations", n, std_devs.len())?;
        check_len("correlation rows", n, correlation.nrows())?;
        check_len("correlation columns", n, correlation.ncols())?;
        validate_marginals(&means, &std_devs)?;
        validate_correlation(&correlation)?;

        let lower = cholesky_lower(&correlation)?;
        let mut jacobian = Array2::from_shape_fn((n, n), |(i, j)| lower[(i, j)]);
        for (i, mut row) in jacobian.rows_mut().into_iter().enumerate() {
            row *= std_devs[i];
        }
        Ok(Self { means, std_devs, lower, jacobian })
    }

    /// `∂x/∂u = D·L`.
    pub fn jacobian(&self) -> &Array2<f64> {
        &self.jacobian
    }

    fn check_dim(&self, what: &'static str, found: usize) -> ReliabilityResult<()> {
        check_len(what, self.means.len(), found)
    }
}

impl SpaceTransform for NormalTransform {
    fn dim(&self) -> usize {
        self.means.len()
    }

    fn mean_x(&self) -> Array1<f64> {
        self.means.clone()
    }

    fn x_to_u(&self, x: &Array1<f64>) -> ReliabilityResult<Array1<f64>> {
        self.check_dim("x", x.len())?;
        let z = (x - &self.means) / &self.std_devs;
        let rhs = DVector::from_iterator(z.len(), z.iter().copied());
        let u = self.lower.solve_lower_triangular(&rhs).ok_or_else(|| {
            ReliabilityError::SingularTransform {
                reason: "triangular solve on the Cholesky factor failed".to_string(),
            }
        })?;
        Ok(Array1::from_iter(u.iter().copied()))
    }

    fn u_to_x(&self, u: &Array1<f64>) -> ReliabilityResult<Array1<f64>> {
        self.check_dim("u", u.len())?;
        Ok(&self.means + &self.jacobian.dot(u))
    }

    fn grad_x_to_u(
        &self, grad_x: &Array1<f64>, x: &Array1<f64>,
    ) -> ReliabilityResult<Array1<f64>> {
        self.check_dim("x-space gradient", grad_x.len())?;
        self.check_dim("x", x.len())?;
        Ok(self.jacobian.t().dot(grad_x))
    }

    fn hess_x_to_u(
        &self, hess_x: &Array2<f64>, grad_x: &Array1<f64>, x: &Array1<f64>,
    ) -> ReliabilityResult<Array2<f64>> {
        self.check_dim("x-space Hessian", hess_x.nrows())?;
        self.check_dim("x-space Hessian", hess_x.ncols())?;
        self.check_dim("x-space gradient", grad_x.len())?;
        self.check_dim("x", x.len())?;
        // The map is affine, so the gradient term vanishes.
        Ok(self.jacobian.t().dot(hess_x).dot(&self.jacobian))
    }
}

// ---- Helper methods ----

fn check_len(what: &'static str, expected: usize, found: usize) -> ReliabilityResult<()> {
    if expected != found {
        return Err(ReliabilityError::DimensionMismatch { what, expected, found });
    }
    Ok(())
}

fn validate_marginals(means: &Array1<f64>, std_devs: &Array1<f64>) -> ReliabilityResult<()> {
    for (index, &value) in means.iter().enumerate() {
        if !value.is_finite() {
            return Err(ReliabilityError::InvalidTransformParam {
                index,
                value,
                reason: "Means must be finite.",
            });
        }
    }
    for (index, &value) in std_devs.iter().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            return Err(ReliabilityError::InvalidTransformParam {
                index,
                value,
                reason: "Standard deviations must be finite and strictly positive.",
            });
        }
    }
    Ok(())
}

fn validate_correlation(corr: &Array2<f64>) -> ReliabilityResult<()> {
    let n = corr.nrows();
    for i in 0..n {
        if (corr[[i, i]] - 1.0).abs() > 1e-12 {
            return Err(ReliabilityError::InvalidTransformParam {
                index: i,
                value: corr[[i, i]],
                reason: "Correlation diagonal must be one.",
            });
        }
        for j in 0..i {
            let (a, b) = (corr[[i, j]], corr[[j, i]]);
            if !a.is_finite() || a.abs() > 1.0 || (a - b).abs() > 1e-12 {
                return Err(ReliabilityError::InvalidTransformParam {
                    index: i * n + j,
                    value: a,
                    reason: "Correlation must be symmetric with entries in [-1, 1].",
                });
            }
        }
    }
    Ok(())
}

/// Lower Cholesky factor of `corr`.
fn cholesky_lower(corr: &Array2<f64>) -> ReliabilityResult<DMatrix<f64>> {
    let n = corr.nrows();
    let corr_nalg = DMatrix::<f64>::from_fn(n, n, |i, j| corr[[i, j]]);
    let chol = Cholesky::new(corr_nalg).ok_or_else(|| ReliabilityError::SingularTransform {
        reason: "correlation matrix is not positive definite".to_string(),
    })?;
    let lower = chol.l();
    if lower.diagonal().iter().any(|d| !d.is_finite() || *d <= 0.0) {
        return Err(ReliabilityError::SingularTransform {
            reason: "Cholesky factor has a non-positive pivot".to_string(),
        });
    }
    Ok(lower)
}
