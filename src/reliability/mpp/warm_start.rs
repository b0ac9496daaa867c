//! Warm starts between levels and across outer invocations.
//!
//! Pure projections:
//! - [`ria_projection`]: `u + ((z_new − g)/‖∇g_u‖²)·∇g_u`, exact for linear `g`.
//! - [`pma_rescale`]: `u·(β_new/β_prev)`.
//! - [`pma_projection`]: `∓|β|·∇g_u/‖∇g_u‖`, the first PMA start from the means.
//! - [`outer_projection`]: `u − ((∂g/∂d·Δd)/‖∇g_u‖²)·∇g_u` after a design change.
//!
//! [`WarmStartCache`] keeps the level-0 MPP of each response function for
//! the next outer invocation. The enclosing design loop owns it and passes
//! it to the controller; nothing here is global.
use ndarray::Array1;
use std::collections::HashMap;

const ZERO_NORM_SQ: f64 = 1e-28;

/// Project `u_prev` onto the linearization `g = target` along `grad_u`.
///
/// Returns `u_prev` unchanged when the gradient vanishes.
pub fn ria_projection(
    u_prev: &Array1<f64>, grad_u: &Array1<f64>, value_prev: f64, target: f64,
) -> Array1<f64> {
    let norm_sq = grad_u.dot(grad_u);
    if norm_sq <= ZERO_NORM_SQ {
        return u_prev.clone();
    }
    u_prev + &(grad_u * ((target - value_prev) / norm_sq))
}

/// Rescale a PMA start from `beta_prev` to `beta_new`.
///
/// A zero previous index carries no scale; `u_prev` is then reused.
pub fn pma_rescale(u_prev: &Array1<f64>, beta_prev: f64, beta_new: f64) -> Array1<f64> {
    let ratio = beta_new / beta_prev;
    if !ratio.is_finite() {
        return u_prev.clone();
    }
    u_prev * ratio
}

/// PMA start on the sphere `‖u‖ = |β|` along `∓∇g_u`: against the gradient
/// when minimizing `g`, along it when maximizing.
///
/// A vanishing gradient falls back to the unit diagonal.
pub fn pma_projection(grad_u: &Array1<f64>, beta_target: f64, minimize: bool) -> Array1<f64> {
    let n = grad_u.len();
    let norm_sq = grad_u.dot(grad_u);
    let direction = if norm_sq > ZERO_NORM_SQ {
        grad_u / norm_sq.sqrt()
    } else {
        Array1::from_elem(n, 1.0 / (n.max(1) as f64).sqrt())
    };
    let radius = if minimize { -beta_target.abs() } else { beta_target.abs() };
    direction * radius
}

/// Correct a cached MPP for the design step `delta_design`.
pub fn outer_projection(
    u_prev: &Array1<f64>, grad_u: &Array1<f64>, design_grad: &Array1<f64>,
    delta_design: &Array1<f64>,
) -> Array1<f64> {
    let norm_sq = grad_u.dot(grad_u);
    if norm_sq <= ZERO_NORM_SQ {
        return u_prev.clone();
    }
    u_prev - &(grad_u * (design_grad.dot(delta_design) / norm_sq))
}

/// Level-0 MPP data of one response function.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmStartEntry {
    pub u: Array1<f64>,
    pub grad_u: Array1<f64>,
    pub value: f64,
    /// `∂g/∂d` at the MPP, when the model provides it.
    pub design_grad: Option<Array1<f64>>,
    /// Design point the entry was computed at.
    pub design: Option<Array1<f64>>,
}

/// WarmStartCache — level-0 MPPs carried between outer invocations.
///
/// Call [`WarmStartCache::set_design`] with the current design before each
/// invocation; cached points are then corrected by [`outer_projection`] when
/// both design points and `∂g/∂d` are known, and reused as-is otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarmStartCache {
    entries: HashMap<usize, WarmStartEntry>,
    design: Option<Array1<f64>>,
}

impl WarmStartCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the design point of the coming invocation.
    pub fn set_design(&mut self, design: Array1<f64>) {
        self.design = Some(design);
    }

    pub fn design(&self) -> Option<&Array1<f64>> {
        self.design.as_ref()
    }

    pub fn get(&self, fn_index: usize) -> Option<&WarmStartEntry> {
        self.entries.get(&fn_index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Store the level-0 MPP of `fn_index`, stamped with the current design.
    pub fn store(
        &mut self, fn_index: usize, u: Array1<f64>, grad_u: Array1<f64>, value: f64,
        design_grad: Option<Array1<f64>>,
    ) {
        let entry = WarmStartEntry { u, grad_u, value, design_grad, design: self.design.clone() };
        self.entries.insert(fn_index, entry);
    }

    /// Starting point for level 0 of `fn_index`, if one is cached.
    pub fn initial_point(&self, fn_index: usize) -> Option<Array1<f64>> {
        let entry = self.entries.get(&fn_index)?;
        match (&entry.design_grad, &entry.design, &self.design) {
            (Some(dg), Some(prev), Some(current))
                if dg.len() == prev.len() && prev.len() == current.len() =>
            {
                let delta = current - prev;
                Some(outer_projection(&entry.u, &entry.grad_u, dg, &delta))
            }
            _ => Some(entry.u.clone()),
        }
    }
}
