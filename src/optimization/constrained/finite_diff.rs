//! constrained::finite_diff — finite-difference gradient and Hessian helpers.
//!
//! Purpose
//! -------
//! Provide finite-difference gradient and Hessian approximations around a
//! point, together with validation and symmetry cleanup, so that callers
//! (the merit adapter, limit-state evaluators lacking analytic derivatives)
//! can request derivatives without depending directly on the `finitediff`
//! API.
//!
//! Key behaviors
//! -------------
//! - Compute forward-difference gradients with error capture and post-hoc
//!   validation via [`run_fd_diff`].
//! - Construct central-difference Hessians of a gradient map, falling back to
//!   forward differences when validation fails, via [`compute_hessian`].
//! - Enforce symmetry of Hessian matrices in-place using [`symmetrize_hess`].
//!
//! Invariants & assumptions
//! ------------------------
//! - The `finitediff` closures must return plain values, so fallible
//!   callbacks write their first error into a shared `closure_err` cell and
//!   return `NaN`. Any captured error is treated as a hard failure.
//! - Helpers are generic over the caller's error type `E`; validation
//!   failures are raised as `OptError` and converted with `E::from`.
//! - Gradients and Hessians returned from this module satisfy
//!   [`validate_grad`] and [`validate_hessian`].
use crate::optimization::{
    constrained::{
        types::{Grad, Hessian, Point},
        validation::{validate_grad, validate_hessian},
    },
    errors::OptError,
};
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// Forward-difference gradient with error capture and validation.
///
/// Clears `closure_err`, differentiates `func` at `x`, then returns the
/// captured error if one was written, or the gradient if it validates.
///
/// # Errors
/// - The error captured in `closure_err` during differencing.
/// - `OptError::GradientDimMismatch` / `OptError::InvalidGradient` (converted
///   into `E`) when the gradient fails validation.
pub fn run_fd_diff<G, E>(x: &Point, func: &G, closure_err: &RefCell<Option<E>>) -> Result<Grad, E>
where
    G: Fn(&Point) -> f64,
    E: From<OptError>,
{
    closure_err.replace(None);
    let fd_grad = x.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    validate_grad(&fd_grad, x.len())?;
    Ok(fd_grad)
}

/// Finite-difference Hessian of a gradient map with validation and symmetry.
///
/// Central differences are attempted first; if the gradient map failed
/// (captured in `closure_err`) or the result does not validate, a
/// forward-difference Hessian is tried. The accepted matrix is symmetrized.
///
/// # Errors
/// - The error captured in `closure_err` during the forward pass.
/// - `OptError::HessianDimMismatch` / `OptError::InvalidHessian` (converted
///   into `E`) when the forward-difference Hessian fails validation.
pub fn compute_hessian<F, E>(f: &F, x: &Point, closure_err: &RefCell<Option<E>>) -> Result<Hessian, E>
where
    F: Fn(&Point) -> Grad,
    E: From<OptError>,
{
    let dim = x.len();
    closure_err.replace(None);
    let mut cent_hess = x.central_hessian(f);
    if closure_err.borrow().is_none() && validate_hessian(&cent_hess, dim).is_ok() {
        symmetrize_hess(&mut cent_hess);
        return Ok(cent_hess);
    }
    closure_err.replace(None);
    let mut forward_hess = x.forward_hessian(f);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    validate_hessian(&forward_hess, dim)?;
    symmetrize_hess(&mut forward_hess);
    Ok(forward_hess)
}

// ---- Helper methods ----

/// Replace each off-diagonal pair `(i, j)` / `(j, i)` with their average.
/// The diagonal is left untouched; `hess` must be square.
pub fn symmetrize_hess(hess: &mut Hessian) {
    for i in 0..hess.nrows() {
        for j in 0..i {
            let avg = 0.5 * (hess[[i, j]] + hess[[j, i]]);
            hess[[i, j]] = avg;
            hess[[j, i]] = avg;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Forward-difference gradient computation with and without closure errors.
    // - Validation failures for non-finite gradients.
    // - Finite-difference Hessian construction, symmetry, and validation.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // `run_fd_diff` returns a valid gradient for a quadratic with no error path.
    //
    // Expect
    // ------
    // - grad ≈ 2x.
    fn run_fd_diff_quadratic_returns_valid_gradient() {
        // Arrange
        let x: Point = Array1::from(vec![0.0_f64, 1.0]);
        let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
        let f = |x: &Point| x.dot(x);

        // Act
        let grad = run_fd_diff(&x, &f, &closure_err).expect("gradient should be computed");

        // Assert
        assert_eq!(grad.len(), 2);
        assert!((grad[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // An error captured in `closure_err` is returned unchanged.
    fn run_fd_diff_closure_error_is_propagated() {
        // Arrange
        let x: Point = Array1::from(vec![1.0_f64]);
        let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
        let f = |_: &Point| {
            closure_err.replace(Some(OptError::ObjectiveEvaluationFailed {
                text: "fd test".to_string(),
            }));
            f64::NAN
        };

        // Act
        let err = run_fd_diff(&x, &f, &closure_err).expect_err("closure error must propagate");

        // Assert
        assert!(matches!(err, OptError::ObjectiveEvaluationFailed { .. }));
    }

    #[test]
    // Purpose
    // -------
    // A non-finite FD gradient is reported as `InvalidGradient`.
    fn run_fd_diff_non_finite_gradient_yields_invalidgradient_error() {
        let x: Point = Array1::from(vec![0.0_f64, 1.0]);
        let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
        let f = |_x: &Point| f64::NAN;

        let err = run_fd_diff(&x, &f, &closure_err).expect_err("NaN gradient must fail");
        assert!(matches!(err, OptError::InvalidGradient { .. }));
    }

    #[test]
    // Purpose
    // -------
    // `compute_hessian` of a linear gradient map recovers its matrix.
    //
    // Given
    // -----
    // - g(x) = A x with A = [[2, 1], [1, 4]].
    //
    // Expect
    // ------
    // - H ≈ A, exactly symmetric.
    fn compute_hessian_linear_gradient_recovers_matrix() {
        // Arrange
        let x: Point = Array1::from(vec![1.0_f64, 2.0]);
        let a = Array2::from_shape_vec((2, 2), vec![2.0, 1.0, 1.0, 4.0]).unwrap();
        let grad_fn = |x: &Point| a.dot(x);
        let closure_err: RefCell<Option<OptError>> = RefCell::new(None);

        // Act
        let hess = compute_hessian(&grad_fn, &x, &closure_err).expect("hessian should compute");

        // Assert
        assert_eq!(hess.shape(), &[2, 2]);
        assert_eq!(hess[[0, 1]], hess[[1, 0]]);
        for ((i, j), v) in hess.indexed_iter() {
            assert!((v - a[[i, j]]).abs() < 1e-5);
        }
    }

    #[test]
    // Purpose
    // -------
    // Non-finite Hessians on both paths surface as `InvalidHessian`.
    fn compute_hessian_non_finite_entries_yield_invalidhessian_error() {
        let x: Point = Array1::from(vec![0.0_f64]);
        let grad_fn = |_x: &Point| Array1::from(vec![f64::NAN]);
        let closure_err: RefCell<Option<OptError>> = RefCell::new(None);

        let err = compute_hessian(&grad_fn, &x, &closure_err).expect_err("NaN Hessian must fail");
        assert!(matches!(err, OptError::InvalidHessian { .. }));
    }

    #[test]
    // Purpose
    // -------
    // `symmetrize_hess` averages off-diagonal pairs and keeps the diagonal.
    fn symmetrize_hess_makes_matrix_symmetric() {
        let mut h: Hessian = Array2::from_shape_vec((2, 2), vec![1.0_f64, 2.0, 0.0, 3.0]).unwrap();
        symmetrize_hess(&mut h);
        assert_eq!(h[[0, 0]], 1.0);
        assert_eq!(h[[1, 1]], 3.0);
        assert_eq!(h[[0, 1]], 1.0);
        assert_eq!(h[[1, 0]], 1.0);
    }
}
