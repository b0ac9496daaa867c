//! constrained::builders — L-BFGS construction for inner subproblem solves.
//!
//! Purpose
//! -------
//! Provide small, focused builders for the L-BFGS solvers that minimize each
//! augmented-Lagrangian merit function. These helpers hide Argmin’s generic
//! wiring and apply crate-level options (tolerances, memory size) so the
//! outer loop can request a configured solver without touching
//! Argmin-specific types.
//!
//! Conventions
//! -----------
//! - The builders do **not** set an initial point or `max_iters`; these are
//!   runtime concerns applied by the runner ([`super::run::run_lbfgs`]).
//! - Errors are always reported via [`OptResult`]; `argmin::core::Error`
//!   values never leak across module boundaries.
use argmin::solver::quasinewton::LBFGS;

use crate::optimization::{
    constrained::{
        traits::SolverOptions,
        types::{
            Cost, DEFAULT_LBFGS_MEM, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente,
            MoreThuenteLS, Point,
        },
    },
    errors::OptResult,
};

/// Construct L-BFGS with Hager–Zhang line search and the configured
/// tolerances. `opts.lbfgs_mem` overrides [`DEFAULT_LBFGS_MEM`].
///
/// # Errors
/// - `OptError` (via `From<argmin::core::Error>`) when Argmin rejects a
///   tolerance setting.
pub fn build_optimizer_hager_zhang(opts: &SolverOptions) -> OptResult<LbfgsHagerZhang> {
    let hager_zhang = HagerZhangLS::new();
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsHagerZhang::new(hager_zhang, mem);
    configure_lbfgs(lbfgs, opts)
}

/// Construct L-BFGS with More–Thuente line search and the configured
/// tolerances. `opts.lbfgs_mem` overrides [`DEFAULT_LBFGS_MEM`].
///
/// # Errors
/// - `OptError` (via `From<argmin::core::Error>`) when Argmin rejects a
///   tolerance setting.
pub fn build_optimizer_more_thuente(opts: &SolverOptions) -> OptResult<LbfgsMoreThuente> {
    let more_thuente = MoreThuenteLS::new();
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsMoreThuente::new(more_thuente, mem);
    configure_lbfgs(lbfgs, opts)
}

/// Apply optional gradient and cost-change tolerances to an L-BFGS solver,
/// regardless of its line-search type. `None` leaves Argmin's default.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Point, Grad, Cost>, opts: &SolverOptions,
) -> OptResult<LBFGS<L, Point, Grad, Cost>> {
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::constrained::traits::{LineSearcher, Tolerances};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Construction of L-BFGS solvers with both line searches.
    // - Propagation of `lbfgs_mem` (Some vs None) into the builder paths.
    // - Application of tolerances via `configure_lbfgs`.
    //
    // They intentionally DO NOT cover end-to-end solves, which are tested
    // with the augmented-Lagrangian driver.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Hager–Zhang builder succeeds with default and explicit memory.
    fn build_optimizer_hager_zhang_accepts_default_and_explicit_memory() {
        // Arrange
        let tols =
            Tolerances::new(Some(1e-6), Some(1e-8), Some(50)).expect("Tolerances should be valid");
        let default_mem = SolverOptions::new(tols, LineSearcher::HagerZhang, false, None)
            .expect("SolverOptions should be valid");
        let explicit_mem = SolverOptions::new(tols, LineSearcher::HagerZhang, false, Some(11))
            .expect("SolverOptions should be valid");

        // Act / Assert
        assert!(build_optimizer_hager_zhang(&default_mem).is_ok());
        assert!(build_optimizer_hager_zhang(&explicit_mem).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // More–Thuente builder succeeds with default and explicit memory.
    fn build_optimizer_more_thuente_accepts_default_and_explicit_memory() {
        // Arrange
        let tols = Tolerances::new(Some(1e-6), None, Some(30)).expect("Tolerances should be valid");
        let default_mem = SolverOptions::new(tols, LineSearcher::MoreThuente, false, None)
            .expect("SolverOptions should be valid");
        let explicit_mem = SolverOptions::new(tols, LineSearcher::MoreThuente, false, Some(9))
            .expect("SolverOptions should be valid");

        // Act / Assert
        assert!(build_optimizer_more_thuente(&default_mem).is_ok());
        assert!(build_optimizer_more_thuente(&explicit_mem).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // `configure_lbfgs` works with both tolerances present or both absent.
    fn configure_lbfgs_handles_present_and_absent_tolerances() {
        // Arrange
        let with_tols = SolverOptions::new(
            Tolerances::new(Some(1e-6), Some(1e-8), Some(100)).expect("valid"),
            LineSearcher::HagerZhang,
            false,
            None,
        )
        .expect("valid options");
        let without_tols = SolverOptions::new(
            Tolerances::new(None, None, Some(50)).expect("valid"),
            LineSearcher::MoreThuente,
            false,
            None,
        )
        .expect("valid options");

        // Act
        let a = configure_lbfgs(LBFGS::new(HagerZhangLS::new(), DEFAULT_LBFGS_MEM), &with_tols);
        let b = configure_lbfgs(LBFGS::new(MoreThuenteLS::new(), DEFAULT_LBFGS_MEM), &without_tols);

        // Assert
        assert!(a.is_ok());
        assert!(b.is_ok());
    }
}
