//! Activation Calculation
//!
//! The subsymbolic arithmetic behind retrieval.
//!
//! A chunk's activation is the sum of four components:
//! 1. **Base level** (recency/frequency): `B = ln Σ (now − t_k)^(−d)`
//! 2. **Spreading** (context): `S_a = Σ (W_j/n) × S_ji`
//! 3. **Partial matching** (similarity): `P = Σ mp × Sim(k, l)`
//! 4. **Noise**: logistic with scale `s`
//!
//! Retrieval succeeds when `A ≥ τ`, and the winner takes
//! `latency = F × e^(−f × A)` seconds to arrive.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Breakdown of activation components for a single candidate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationBreakdown {
	/// From presentation history: `B = ln Σ (now − t_k)^(−d)`
	pub base_level: f64,
	/// From buffer sources: `Σ (W_j/n) × S_ji`
	pub spreading: f64,
	/// Partial-match penalty (≤ 0)
	pub partial_match: f64,
	/// Logistic noise sample
	pub noise: f64,
	/// Combined total
	pub total: f64,
}

impl ActivationBreakdown {
	/// Sum the components into a breakdown.
	#[must_use]
	pub fn combine(base_level: f64, spreading: f64, partial_match: f64, noise: f64) -> Self {
		Self {
			base_level,
			spreading,
			partial_match,
			noise,
			total: base_level + spreading + partial_match + noise,
		}
	}
}

// ============================================================================
// Base-Level Activation
// ============================================================================

/// Compute base-level activation from presentation times.
///
/// `B = ln[Σ (now − t_k)^(−d)]`
///
/// Only presentations strictly before `now` contribute; a chunk presented
/// at this very instant has not been encoded yet.
///
/// # Returns
///
/// `None` if no presentation lies in the past.
#[must_use]
pub fn base_level(times: &[f64], now: f64, decay: f64) -> Option<f64> {
	let mut any = false;
	let sum: f64 = times
		.iter()
		.filter(|&&t| t < now)
		.map(|&t| {
			any = true;
			(now - t).powf(-decay)
		})
		.sum();
	any.then(|| sum.ln())
}

/// Closed-form approximation of base-level learning.
///
/// `B ≈ ln(n / (1 − d)) − d × ln(L)`
///
/// Where `n` is the number of past presentations and `L` the time since the
/// first one. Requires `d < 1`.
#[must_use]
pub fn optimized_base_level(times: &[f64], now: f64, decay: f64) -> Option<f64> {
	let past: Vec<f64> = times.iter().copied().filter(|&t| t < now).collect();
	let first = past.iter().copied().fold(f64::INFINITY, f64::min);
	if past.is_empty() {
		return None;
	}
	#[allow(clippy::cast_precision_loss)]
	let n = past.len() as f64;
	Some((n / (1.0 - decay)).ln() - decay * (now - first).ln())
}

// ============================================================================
// Associative Strength
// ============================================================================

/// Strength of association between a source and a chunk containing it.
///
/// `S_ji = S − ln((1 + fan_j) / max(1, cooccurrences))`
#[inline]
#[must_use]
pub fn association_strength(maximum: f64, fan: usize, cooccurrences: usize) -> f64 {
	#[allow(clippy::cast_precision_loss)]
	let ratio = (1 + fan) as f64 / cooccurrences.max(1) as f64;
	maximum - ratio.ln()
}

// ============================================================================
// Noise
// ============================================================================

/// Draw logistic noise with scale `s`.
///
/// Sampled through the inverse CDF `s × ln(u / (1 − u))`. A scale of 0
/// draws nothing and returns 0, so noiseless runs leave the RNG untouched.
pub fn logistic_noise<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
	if scale == 0.0 {
		return 0.0;
	}
	let u: f64 = rng.gen_range(0.001..0.999);
	scale * (u / (1.0 - u)).ln()
}

// ============================================================================
// Retrieval Probability and Latency
// ============================================================================

/// Compute probability of successful retrieval.
///
/// `P(recall) = 1 / (1 + e^((τ − A) / s))`
///
/// With `s = 0` this degenerates into a step at the threshold.
#[inline]
#[must_use]
pub fn retrieval_probability(activation: f64, threshold: f64, noise: f64) -> f64 {
	if noise == 0.0 {
		return if activation >= threshold { 1.0 } else { 0.0 };
	}
	let exponent = (threshold - activation) / noise;
	1.0 / (1.0 + exponent.exp())
}

/// Retrieval latency in seconds.
///
/// `latency = F × e^(−f × A)`
///
/// Also used with `A = τ` for the time it takes to fail.
#[inline]
#[must_use]
pub fn retrieval_latency(activation: f64, latency_factor: f64, latency_exponent: f64) -> f64 {
	latency_factor * (-latency_exponent * activation).exp()
}
