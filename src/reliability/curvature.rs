//! curvature — principal curvatures of the limit-state surface at a point.
//!
//! Purpose
//! -------
//! Turn a u-space gradient and Hessian into the `n − 1` principal curvatures
//! used by second-order integration.
//!
//! Key behaviors
//! -------------
//! - Build a rotation whose last row is the unit gradient (or, if the
//!   gradient vanishes, the unit MPP direction). The remaining seed rows are
//!   the coordinate axes other than the one most aligned with that direction.
//! - Gram–Schmidt the seed rows backward against the rows below them and
//!   normalize, giving an orthonormal `R`.
//! - Form `A = R·H·Rᵀ / ‖∇g_u‖`, take the leading `(n−1)×(n−1)` block and
//!   return its eigenvalues from `nalgebra`'s symmetric eigen-solver.
//!
//! Invariants & assumptions
//! ------------------------
//! - Stateless: the result depends only on `(∇g_u, H_u, u)`.
//! - `Ok(None)` means no direction could be defined (both the gradient and the
//!   point vanish); callers fall back to first order.
//! - A vanishing gradient with a usable MPP direction still yields a rotation,
//!   but the scaling by `1/‖∇g_u‖` is then undefined; such a case also returns
//!   `Ok(None)`.
use crate::reliability::errors::{ReliabilityError, ReliabilityResult};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, s};

const ZERO_NORM: f64 = 1e-14;

/// Principal curvatures and the rotation used to derive them.
///
/// Valid only for the MPP state it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalCurvatureSet {
    pub curvatures: Array1<f64>,
    pub rotation: Array2<f64>,
}

/// principal_curvatures — curvatures of `g` at `u` from `∇g_u` and `H_u`.
///
/// Parameters
/// ----------
/// - `grad_u`: u-space gradient at the point, length `n`.
/// - `hess_u`: symmetric u-space Hessian, `n×n`.
/// - `u`: the point itself, used only for the fallback direction.
///
/// Returns
/// -------
/// `ReliabilityResult<Option<PrincipalCurvatureSet>>`
///   `None` when no normalization direction exists; otherwise `n − 1`
///   unordered curvatures (empty for `n = 1`).
///
/// Errors
/// ------
/// - [`ReliabilityError::DimensionMismatch`] if shapes disagree.
pub fn principal_curvatures(
    grad_u: &Array1<f64>, hess_u: &Array2<f64>, u: &Array1<f64>,
) -> ReliabilityResult<Option<PrincipalCurvatureSet>> {
    let n = grad_u.len();
    check_shape("Hessian rows", n, hess_u.nrows())?;
    check_shape("Hessian columns", n, hess_u.ncols())?;
    check_shape("MPP point", n, u.len())?;

    let grad_norm = grad_u.dot(grad_u).sqrt();
    if grad_norm <= ZERO_NORM {
        return Ok(None);
    }
    let Some(rotation) = rotation_basis(grad_u, u) else {
        return Ok(None);
    };

    let m = n - 1;
    if m == 0 {
        return Ok(Some(PrincipalCurvatureSet { curvatures: Array1::zeros(0), rotation }));
    }
    let a = rotation.dot(hess_u).dot(&rotation.t()) / grad_norm;
    let block = a.slice(s![..m, ..m]);
    let block_nalg = DMatrix::<f64>::from_fn(m, m, |i, j| 0.5 * (block[[i, j]] + block[[j, i]]));
    let curvatures = Array1::from_iter(block_nalg.symmetric_eigen().eigenvalues.iter().copied());
    Ok(Some(PrincipalCurvatureSet { curvatures, rotation }))
}

/// Orthonormal rotation whose last row is the unit gradient, or the unit MPP
/// direction when the gradient vanishes. `None` if both vanish.
///
/// The MPP-direction fallback only matters to direct callers that need a
/// frame at a stationary point: [`principal_curvatures`] returns `Ok(None)`
/// for a vanishing gradient before asking for a rotation.
pub fn rotation_basis(grad_u: &Array1<f64>, u: &Array1<f64>) -> Option<Array2<f64>> {
    let n = grad_u.len();
    let direction = unit(grad_u).or_else(|| unit(u))?;

    // Seed rows: the axes except the one most aligned with `direction`.
    let skip = direction
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| if v.abs() > best.1 { (i, v.abs()) } else { best })
        .0;
    let mut r = Array2::zeros((n, n));
    let mut row = 0;
    for axis in (0..n).filter(|&axis| axis != skip) {
        r[[row, axis]] = 1.0;
        row += 1;
    }
    r.row_mut(n - 1).assign(&direction);

    // Gram–Schmidt, working backward from the last row.
    for i in (0..n.saturating_sub(1)).rev() {
        for j in (i + 1)..n {
            let proj = r.row(i).dot(&r.row(j));
            let basis = r.row(j).to_owned();
            r.row_mut(i).scaled_add(-proj, &basis);
        }
        let norm = r.row(i).dot(&r.row(i)).sqrt();
        if norm <= ZERO_NORM {
            return None;
        }
        r.row_mut(i).mapv_inplace(|v| v / norm);
    }
    Some(r)
}

// ---- Helper methods ----

fn unit(v: &Array1<f64>) -> Option<Array1<f64>> {
    let norm = v.dot(v).sqrt();
    (norm > ZERO_NORM && norm.is_finite()).then(|| v / norm)
}

fn check_shape(what: &'static str, expected: usize, found: usize) -> ReliabilityResult<()> {
    if expected != found {
        return Err(ReliabilityError::DimensionMismatch { what, expected, found });
    }
    Ok(())
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
    // - Orthonormality of the rotation and its last row.
    // - Sphere and paraboloid curvatures with known values.
    // - Degenerate inputs (no direction, n = 1, shape mismatch).
    // -------------------------------------------------------------------------

    /// ∇g and H of g(u) = ‖u‖ − r at a point on the sphere of radius r.
    fn sphere_derivatives(u: &Array1<f64>) -> (Array1<f64>, Array2<f64>) {
        let r = u.dot(u).sqrt();
        let n = u.len();
        let grad = u / r;
        let mut hess = Array2::eye(n) / r;
        for i in 0..n {
            for j in 0..n {
                hess[[i, j]] -= u[i] * u[j] / (r * r * r);
            }
        }
        (grad, hess)
    }

    #[test]
    // Purpose
    // -------
    // The rotation is orthonormal with the unit gradient as its last row,
    // including when the gradient lies on a coordinate axis.
    fn rotation_is_orthonormal() {
        for grad in [array![0.0, 0.0, 2.0], array![1.0, 0.0, 0.0], array![1.0, -2.0, 0.5]] {
            let r = rotation_basis(&grad, &Array1::zeros(3)).expect("direction exists");
            let rrt = r.dot(&r.t());
            for i in 0..3 {
                for j in 0..3 {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert_abs_diff_eq!(rrt[[i, j]], expected, epsilon = 1e-12);
                }
            }
            let norm = grad.dot(&grad).sqrt();
            for k in 0..3 {
                assert_abs_diff_eq!(r[[2, k]], grad[k] / norm, epsilon = 1e-12);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // A sphere of radius 3 has all curvatures equal to 1/3.
    //
    // Given
    // -----
    // - g(u) = ‖u‖ − 3, n = 3, at u = 3·(1, 1, 1)/√3.
    //
    // Expect
    // ------
    // - Two curvatures, both ≈ 0.3333.
    fn sphere_curvatures_are_inverse_radius() {
        // Arrange
        let u = Array1::from_elem(3, 3.0 / 3f64.sqrt());
        let (grad, hess) = sphere_derivatives(&u);

        // Act
        let set = principal_curvatures(&grad, &hess, &u).expect("valid shapes").expect("defined");

        // Assert
        assert_eq!(set.curvatures.len(), 2);
        for k in set.curvatures.iter() {
            assert_abs_diff_eq!(*k, 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Curvatures of a paraboloid at its apex are its Hessian eigenvalues over
    // the gradient norm.
    //
    // Given
    // -----
    // - g(u) = 2u₂ + 0.5·(0.2u₀² + 0.6u₁²), evaluated at u = [0, 0, 1].
    //
    // Expect
    // ------
    // - {0.1, 0.3} in some order.
    fn paraboloid_curvatures() {
        let grad = array![0.0, 0.0, 2.0];
        let hess = array![[0.2, 0.0, 0.0], [0.0, 0.6, 0.0], [0.0, 0.0, 0.0]];
        let set = principal_curvatures(&grad, &hess, &array![0.0, 0.0, 1.0])
            .expect("valid shapes")
            .expect("defined");
        let mut k = set.curvatures.to_vec();
        k.sort_by(|a, b| a.total_cmp(b));
        assert_abs_diff_eq!(k[0], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(k[1], 0.3, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Degenerate inputs fall back or fail cleanly.
    fn degenerate_inputs() {
        let zero = Array1::zeros(2);
        let hess = Array2::eye(2);
        assert_eq!(principal_curvatures(&zero, &hess, &zero).expect("valid shapes"), None);

        let single = principal_curvatures(&array![1.0], &array![[4.0]], &array![1.0])
            .expect("valid shapes")
            .expect("defined");
        assert!(single.curvatures.is_empty());

        assert!(matches!(
            principal_curvatures(&array![1.0, 0.0], &Array2::eye(3), &zero),
            Err(ReliabilityError::DimensionMismatch { .. })
        ));
    }
    #[test]
    // Purpose
    // -------
    // A vanishing gradient still yields a frame along the MPP direction, but
    // no curvatures.
    //
    // Given
    // -----
    // - ∇g = 0 at u = (0, 3).
    //
    // Expect
    // ------
    // - `rotation_basis` ends with (0, 1).
    // - `principal_curvatures` returns `Ok(None)`.
    fn zero_gradient_has_frame_but_no_curvatures() {
        let zero = Array1::zeros(2);
        let u = array![0.0, 3.0];

        let r = rotation_basis(&zero, &u).expect("MPP direction exists");
        assert_abs_diff_eq!(r[[1, 0]], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(r[[1, 1]], 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(r.row(0).dot(&r.row(1)), 0.0, epsilon = 1e-15);

        let curvatures = principal_curvatures(&zero, &Array2::eye(2), &u).expect("valid shapes");
        assert_eq!(curvatures, None);
    }
}
