//! Rank-biased overlap (RBO) between two ranked lists.
//!
//! RBO compares two rankings by the overlap of their prefixes, weighting
//! shallow depths more than deep ones. The persistence parameter `p` controls
//! the decay: with `p = 0.9` the top 10 ranks carry roughly 86% of the weight.
//!
//! This is the extrapolated-at-depth-k variant:
//!
//! ```text
//! rbo = (x_k / k) * p^k + ((1 - p) / p) * Σ_{d=1..k} p^d * |A[..d] ∩ B[..d]| / d
//! ```
//!
//! where `k` is the length of the longer list, prefixes of the shorter list
//! stop growing at its length, and `x_k` is the overlap of the full lists.

use crate::error::{MergeError, Result};
use std::collections::HashSet;
use std::hash::Hash;

/// Default persistence used across the toolkit
pub const DEFAULT_PERSISTENCE: f64 = 0.9;

fn check_persistence(p: f64) -> Result<()> {
    if p > 0.0 && p < 1.0 {
        Ok(())
    } else {
        Err(MergeError::InvalidPersistence(p))
    }
}

/// Rank-biased overlap of two ranked lists, in `[0, 1]`.
///
/// Two empty lists have no defined overlap and yield `0.0`.
///
/// # Errors
///
/// Returns `InvalidPersistence` unless `0 < p < 1`.
pub fn rbo<T: Eq + Hash>(list_a: &[T], list_b: &[T], p: f64) -> Result<f64> {
    check_persistence(p)?;

    let k = list_a.len().max(list_b.len());
    if k == 0 {
        return Ok(0.0);
    }

    let mut seen_a: HashSet<&T> = HashSet::with_capacity(list_a.len());
    let mut seen_b: HashSet<&T> = HashSet::with_capacity(list_b.len());
    let mut overlap = 0usize;
    let mut weight = 1.0;
    let mut summation = 0.0;

    for depth in 1..=k {
        if let Some(item) = list_a.get(depth - 1) {
            if seen_a.insert(item) && seen_b.contains(item) {
                overlap += 1;
            }
        }
        if let Some(item) = list_b.get(depth - 1) {
            if seen_b.insert(item) && seen_a.contains(item) {
                overlap += 1;
            }
        }

        weight *= p;
        summation += weight * overlap as f64 / depth as f64;
    }

    // After the loop `overlap` is the intersection of the full lists and `weight` is p^k.
    let score = (overlap as f64 / k as f64) * weight + (1.0 - p) / p * summation;
    Ok(score.clamp(0.0, 1.0))
}

/// Share of the total RBO weight carried by the top `depth` ranks.
///
/// Useful for choosing `p`: the depth at which this reaches e.g. 0.9 is the
/// depth a comparison effectively looks at.
///
/// # Errors
///
/// Returns `InvalidPersistence` unless `0 < p < 1`.
pub fn prefix_weight(p: f64, depth: usize) -> Result<f64> {
    check_persistence(p)?;
    if depth == 0 {
        return Ok(0.0);
    }

    // Σ_{i=1..depth-1} p^i / i; `power` ends at p^(depth-1)
    let mut power = 1.0;
    let mut series = 0.0;
    for i in 1..depth {
        power *= p;
        series += power / i as f64;
    }

    let d = depth as f64;
    let weight = 1.0 - power + (1.0 - p) / p * d * ((1.0 / (1.0 - p)).ln() - series);
    Ok(weight.clamp(0.0, 1.0))
}
