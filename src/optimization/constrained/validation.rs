//! Validation helpers for constrained optimization.
//!
//! This module centralizes common consistency checks used across the
//! optimizer interface:
//!
//! - **Tolerance checks**: [`verify_tol_grad`], [`verify_tol_cost`],
//!   [`verify_tol_constraint`], [`verify_tol_step`] ensure numeric tolerances
//!   are finite and strictly positive when provided.
//! - **Gradient validation**: [`validate_grad`] enforces correct dimension
//!   and finite entries.
//! - **Solutions**: [`validate_point_hat`] ensures a candidate optimum
//!   exists and contains only finite values.
//! - **Objective values**: [`validate_value`] and [`validate_constraint`]
//!   check callback outputs for finiteness.
//! - **Hessians**: [`validate_hessian`] checks shape and finiteness.
use crate::optimization::{
    constrained::types::{Grad, Hessian, Point},
    errors::{OptError, OptResult},
};

/// Validate the optional gradient‐norm tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolGrad`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate the optional cost‐change tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolCost`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate the constraint-violation tolerance of the outer loop.
///
/// # Errors
/// Returns [`OptError::InvalidTolConstraint`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_constraint(tol: f64) -> OptResult<()> {
    if !tol.is_finite() {
        return Err(OptError::InvalidTolConstraint { tol, reason: "Tolerance must be finite." });
    }
    if tol <= 0.0 {
        return Err(OptError::InvalidTolConstraint { tol, reason: "Tolerance must be positive." });
    }
    Ok(())
}

/// Validate the step-length tolerance of the outer loop.
///
/// # Errors
/// Returns [`OptError::InvalidTolStep`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_step(tol: f64) -> OptResult<()> {
    if !tol.is_finite() {
        return Err(OptError::InvalidTolStep { tol, reason: "Tolerance must be finite." });
    }
    if tol <= 0.0 {
        return Err(OptError::InvalidTolStep { tol, reason: "Tolerance must be positive." });
    }
    Ok(())
}

/// Validate a gradient vector against dimension and finiteness.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if length does not match `dim`.
/// - [`OptError::InvalidGradient`] with the index/value/reason of the first
///   offending element.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate and unwrap a solver's best point.
///
/// # Errors
/// - [`OptError::MissingPointHat`] if no vector was provided.
/// - [`OptError::InvalidPointHat`] if any element is non-finite.
pub fn validate_point_hat(point_hat: Option<Point>) -> OptResult<Point> {
    match point_hat {
        Some(p) => {
            for (index, &value) in p.iter().enumerate() {
                if !value.is_finite() {
                    return Err(OptError::InvalidPointHat {
                        index,
                        value,
                        reason: "Optimal point entries must be finite.",
                    });
                }
            }
            Ok(p)
        }
        None => Err(OptError::MissingPointHat),
    }
}

/// Validate that a scalar objective value is finite.
///
/// # Errors
/// Returns [`OptError::NonFiniteCost`] if the value is `NaN` or infinite.
pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

/// Validate that a scalar constraint value is finite.
///
/// # Errors
/// Returns [`OptError::NonFiniteConstraint`] if the value is `NaN` or infinite.
pub fn validate_constraint(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteConstraint { value });
    }
    Ok(())
}

/// Validate the shape and entries of a Hessian matrix.
///
/// # Errors
/// - [`OptError::HessianDimMismatch`] if dimensions do not match `dim`.
/// - [`OptError::InvalidHessian`] if any entry is non-finite, with offending
///   row/col indices and value.
pub fn validate_hessian(hessian: &Hessian, dim: usize) -> OptResult<()> {
    if hessian.nrows() != dim || hessian.ncols() != dim {
        return Err(OptError::HessianDimMismatch {
            expected: dim,
            found: (hessian.nrows(), hessian.ncols()),
        });
    }
    for ((i, j), &value) in hessian.indexed_iter() {
        if !value.is_finite() {
            return Err(OptError::InvalidHessian { row: i, col: j, value });
        }
    }
    Ok(())
}
