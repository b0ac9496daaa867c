//! Requested levels and the ordered per-function request queue.
//!
//! Response levels (RIA) always precede probability, reliability and
//! generalized-reliability levels (PMA) for a response function; within each
//! kind the caller's order is kept.
use crate::reliability::{
    core::types::{LevelKind, LevelRequest},
    errors::{ReliabilityError, ReliabilityResult},
};

/// Levels requested for one response function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelSet {
    pub response_levels: Vec<f64>,
    pub probability_levels: Vec<f64>,
    pub reliability_levels: Vec<f64>,
    pub gen_reliability_levels: Vec<f64>,
}

impl LevelSet {
    pub fn len(&self) -> usize {
        self.response_levels.len()
            + self.probability_levels.len()
            + self.reliability_levels.len()
            + self.gen_reliability_levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any level needs probability → reliability inversion.
    pub fn needs_inversion(&self) -> bool {
        !self.probability_levels.is_empty() || !self.gen_reliability_levels.is_empty()
    }

    /// Build the validated, ordered request queue for `fn_index`.
    ///
    /// # Errors
    /// - [`ReliabilityError::InvalidLevel`] for non-finite levels or
    ///   probabilities outside the open interval `(0, 1)`.
    pub fn queue(&self, fn_index: usize) -> ReliabilityResult<Vec<LevelRequest>> {
        let groups = [
            (LevelKind::ResponseLevel, &self.response_levels),
            (LevelKind::ProbabilityLevel, &self.probability_levels),
            (LevelKind::ReliabilityLevel, &self.reliability_levels),
            (LevelKind::GenReliabilityLevel, &self.gen_reliability_levels),
        ];
        let mut queue = Vec::with_capacity(self.len());
        for (kind, targets) in groups {
            for &target in targets.iter() {
                let request = LevelRequest { kind, target, fn_index };
                validate_request(&request)?;
                queue.push(request);
            }
        }
        Ok(queue)
    }
}

/// Check that a single request is admissible.
///
/// # Errors
/// - [`ReliabilityError::InvalidLevel`] as described on [`LevelSet::queue`].
pub fn validate_request(request: &LevelRequest) -> ReliabilityResult<()> {
    let LevelRequest { kind, target, fn_index } = *request;
    if !target.is_finite() {
        return Err(ReliabilityError::InvalidLevel {
            fn_index,
            value: target,
            reason: "Levels must be finite.",
        });
    }
    if kind == LevelKind::ProbabilityLevel && !(target > 0.0 && target < 1.0) {
        return Err(ReliabilityError::InvalidLevel {
            fn_index,
            value: target,
            reason: "Probability levels must lie strictly between 0 and 1.",
        });
    }
    Ok(())
}
