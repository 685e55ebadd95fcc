//! Retrieval Pipeline
//!
//! One pass over declarative memory per request:
//!
//! 1. Drop candidates excluded by the recency window (finst)
//! 2. Filter by the request pattern (or score it, under partial matching)
//! 3. Compute base level, spreading, and noise
//! 4. Keep candidates at or above the threshold, highest activation wins
//!
//! In symbolic mode steps 3 and 4 collapse into "first match wins".

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::{logistic_noise, retrieval_latency, retrieval_probability, ActivationBreakdown};
use crate::chunk::{Chunk, SlotValue};
use crate::config::ModelConfig;
use crate::error::{ActrError, Result};
use crate::matching::{Bindings, SimilarityTable};
use crate::memory::DeclarativeMemory;
use crate::spreading::{spreading_activation, SpreadingSource};

/// Request slot that toggles the recency filter.
pub const RECENTLY_RETRIEVED: &str = "recently_retrieved";

// ============================================================================
// Finst
// ============================================================================

/// FIFO window of the most recent retrieval results.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Finst {
	capacity: usize,
	recent: VecDeque<Option<Chunk>>,
}

impl Finst {
	/// Window holding at most `capacity` results (0 disables it).
	#[must_use]
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			recent: VecDeque::with_capacity(capacity),
		}
	}

	/// Remember a retrieval result, evicting the oldest beyond capacity.
	pub fn record(&mut self, result: Option<Chunk>) {
		if self.capacity == 0 {
			return;
		}
		self.recent.push_back(result);
		while self.recent.len() > self.capacity {
			let _ = self.recent.pop_front();
		}
	}

	/// Whether `chunk` is in the window.
	#[must_use]
	pub fn contains(&self, chunk: &Chunk) -> bool {
		self.recent.iter().flatten().any(|recent| recent == chunk)
	}

	/// Number of recorded results.
	#[must_use]
	pub fn len(&self) -> usize {
		self.recent.len()
	}

	/// Whether nothing has been recorded.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.recent.is_empty()
	}
}

// ============================================================================
// Requests and outcomes
// ============================================================================

/// Split the recency filter off a request chunk.
///
/// # Errors
///
/// [`ActrError::Rule`] if the filter value is not a boolean.
pub fn split_request(request: &Chunk) -> Result<(Chunk, Option<bool>)> {
	let filter = match request.get(RECENTLY_RETRIEVED) {
		SlotValue::Empty => None,
		SlotValue::Value(value) => match value.as_atom() {
			Some("True" | "true") => Some(true),
			Some("False" | "false") => Some(false),
			_ => {
				return Err(ActrError::rule(format!(
					"'{RECENTLY_RETRIEVED}' expects True or False, got {value}"
				)))
			}
		},
		SlotValue::Pattern(p) => {
			return Err(ActrError::rule(format!(
				"'{RECENTLY_RETRIEVED}' cannot be a pattern ({p})"
			)))
		}
	};
	let slots = request
		.slots()
		.filter(|(slot, _)| *slot != RECENTLY_RETRIEVED)
		.map(|(slot, value)| (slot.to_string(), value.clone()))
		.collect();
	Ok((Chunk::with_slots(request.typename().to_string(), slots), filter))
}

/// A memory candidate with all activation components.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalCandidate {
	/// The candidate chunk
	pub chunk: Chunk,
	/// Activation components
	pub activation: ActivationBreakdown,
	/// Retrieval probability (0-1)
	pub probability: f64,
}

/// What a retrieval produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalOutcome {
	/// Retrieved chunk, `None` on failure
	pub chunk: Option<Chunk>,
	/// Seconds until the result is available
	pub latency: f64,
	/// Activation of the retrieved chunk (subsymbolic mode)
	pub activation: Option<f64>,
	/// Every candidate that was scored (subsymbolic mode)
	pub candidates: Vec<RetrievalCandidate>,
}

/// Read-only inputs of one retrieval.
pub struct RetrievalContext<'a> {
	/// Current simulated time (s)
	pub now: f64,
	/// Model parameters
	pub config: &'a ModelConfig,
	/// Similarities for partial matching
	pub similarities: &'a SimilarityTable,
	/// Spreading sources from the buffers
	pub sources: &'a [SpreadingSource],
}

// ============================================================================
// Retrieval
// ============================================================================

/// Retrieve the best match for `request` from `memory`.
///
/// `request` must already have its variables resolved. `recently` applies
/// the finst window as a pre-filter (`Some(false)` excludes recent results,
/// `Some(true)` keeps only them). The result is recorded in `finst`.
///
/// # Errors
///
/// [`ActrError::Activation`] if base-level learning is requested for a
/// matching chunk without a usable history.
pub fn retrieve<R: Rng + ?Sized>(
	memory: &DeclarativeMemory,
	request: &Chunk,
	recently: Option<bool>,
	finst: &mut Finst,
	ctx: &RetrievalContext<'_>,
	rng: &mut R,
) -> Result<RetrievalOutcome> {
	let config = ctx.config;
	let admitted = |chunk: &Chunk| match recently {
		Some(wanted) => finst.contains(chunk) == wanted,
		None => true,
	};

	let outcome = if config.subsymbolic {
		let mut candidates = Vec::new();
		let mut best: Option<(usize, f64)> = None;

		for entry in memory.iter() {
			if !admitted(&entry.chunk) {
				continue;
			}
			let mut bindings = Bindings::new();
			let partial_match = if config.partial_matching {
				match request.match_score(&entry.chunk, &mut bindings, ctx.similarities, config.mismatch_penalty) {
					Some(score) => score,
					None => continue,
				}
			} else if request.matches(&entry.chunk, &mut bindings) {
				0.0
			} else {
				continue;
			};

			let Some(base) = entry.base_level(ctx.now, config)? else {
				continue;
			};
			let spreading = spreading_activation(
				ctx.sources,
				&entry.chunk,
				memory,
				config.strength_of_association,
				config.spreading_activation_restricted,
			);
			let noise = logistic_noise(rng, config.instantaneous_noise);
			let activation = ActivationBreakdown::combine(base, spreading, partial_match, noise);

			if config.activation_trace {
				tracing::trace!(
					chunk = %entry.chunk,
					base_level = activation.base_level,
					spreading = activation.spreading,
					partial_match = activation.partial_match,
					noise = activation.noise,
					total = activation.total,
					"retrieval candidate"
				);
			}

			let total = activation.total;
			if total >= config.retrieval_threshold && best.map_or(true, |(_, a)| total > a) {
				best = Some((candidates.len(), total));
			}
			candidates.push(RetrievalCandidate {
				chunk: entry.chunk.clone(),
				probability: retrieval_probability(total, config.retrieval_threshold, config.instantaneous_noise),
				activation,
			});
		}

		match best {
			Some((index, activation)) => RetrievalOutcome {
				chunk: Some(candidates[index].chunk.clone()),
				latency: retrieval_latency(activation, config.latency_factor, config.latency_exponent),
				activation: Some(activation),
				candidates,
			},
			None => RetrievalOutcome {
				chunk: None,
				latency: retrieval_latency(
					config.retrieval_threshold,
					config.latency_factor,
					config.latency_exponent,
				),
				activation: None,
				candidates,
			},
		}
	} else {
		let chunk = memory
			.iter()
			.filter(|entry| admitted(&entry.chunk))
			.find(|entry| !entry.times.contains(&ctx.now) && request.matches(&entry.chunk, &mut Bindings::new()))
			.map(|entry| entry.chunk.clone());
		RetrievalOutcome {
			chunk,
			latency: config.rule_firing,
			activation: None,
			candidates: Vec::new(),
		}
	};

	finst.record(outcome.chunk.clone());
	Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
	use super::*;
	use crate::activation::base_level;
	use rand::rngs::StdRng;
	use rand::SeedableRng;

	fn order(first: i32, second: i32) -> Chunk {
		Chunk::unchecked("countOrder", [("first", first), ("second", second)])
	}

	fn counting_memory() -> DeclarativeMemory {
		let mut dm = DeclarativeMemory::new();
		for i in 1..=5 {
			dm.add(order(i, i + 1), 0.0).unwrap();
		}
		dm
	}

	fn run(
		dm: &DeclarativeMemory,
		request: &Chunk,
		config: &ModelConfig,
		now: f64,
		finst: &mut Finst,
	) -> RetrievalOutcome {
		let similarities = SimilarityTable::new();
		let ctx = RetrievalContext {
			now,
			config,
			similarities: &similarities,
			sources: &[],
		};
		let (request, recently) = split_request(request).unwrap();
		retrieve(dm, &request, recently, finst, &ctx, &mut StdRng::seed_from_u64(7)).unwrap()
	}

	#[test]
	fn test_symbolic_retrieval_latency_is_rule_firing() {
		let config = ModelConfig::default();
		let dm = counting_memory();
		let request = Chunk::unchecked("countOrder", [("first", 3)]);
		let outcome = run(&dm, &request, &config, 1.0, &mut Finst::default());
		assert_eq!(outcome.chunk, Some(order(3, 4)));
		assert_eq!(outcome.latency, config.rule_firing);
	}

	#[test]
	fn test_symbolic_skips_chunks_presented_now() {
		let config = ModelConfig::default();
		let mut dm = DeclarativeMemory::new();
		dm.add(order(1, 2), 0.5).unwrap();
		let request = Chunk::unchecked("countOrder", [("first", 1)]);
		assert!(run(&dm, &request, &config, 0.5, &mut Finst::default()).chunk.is_none());
		assert!(run(&dm, &request, &config, 0.6, &mut Finst::default()).chunk.is_some());
	}

	#[test]
	fn test_failure_returns_none() {
		let config = ModelConfig::default();
		let dm = counting_memory();
		let request = Chunk::unchecked("countOrder", [("first", 9)]);
		let outcome = run(&dm, &request, &config, 1.0, &mut Finst::default());
		assert!(outcome.chunk.is_none());
		assert_eq!(outcome.latency, config.rule_firing);
	}

	#[test]
	fn test_subsymbolic_picks_highest_activation() {
		let config = ModelConfig {
			subsymbolic: true,
			retrieval_threshold: -10.0,
			..Default::default()
		};
		let mut dm = DeclarativeMemory::new();
		dm.add(order(1, 2), 0.0).unwrap();
		dm.add_at_times(order(1, 3), [0.0, 5.0, 9.0]).unwrap();
		let request = Chunk::unchecked("countOrder", [("first", 1)]);
		let outcome = run(&dm, &request, &config, 10.0, &mut Finst::default());

		assert_eq!(outcome.chunk, Some(order(1, 3)));
		assert_eq!(outcome.candidates.len(), 2);
		let expected = base_level(&[0.0, 5.0, 9.0], 10.0, 0.5).unwrap();
		assert!((outcome.activation.unwrap() - expected).abs() < 1e-12);
		assert!((outcome.latency - 0.1 * (-expected).exp()).abs() < 1e-12);
	}

	#[test]
	fn test_subsymbolic_threshold_failure_latency() {
		let config = ModelConfig {
			subsymbolic: true,
			retrieval_threshold: 5.0,
			..Default::default()
		};
		let dm = counting_memory();
		let request = Chunk::unchecked("countOrder", [("first", 1)]);
		let outcome = run(&dm, &request, &config, 10.0, &mut Finst::default());
		assert!(outcome.chunk.is_none());
		assert!((outcome.latency - 0.1 * (-5.0_f64).exp()).abs() < 1e-12);
		assert_eq!(outcome.candidates.len(), 1);
	}

	#[test]
	fn test_subsymbolic_ties_go_to_first_candidate() {
		let config = ModelConfig {
			subsymbolic: true,
			retrieval_threshold: -10.0,
			..Default::default()
		};
		let dm = counting_memory();
		let request = Chunk::with_slots("countOrder".to_string(), smallvec::SmallVec::new());
		let outcome = run(&dm, &request, &config, 10.0, &mut Finst::default());
		assert_eq!(outcome.chunk, Some(order(1, 2)));
	}

	#[test]
	fn test_partial_matching_admits_near_misses() {
		let config = ModelConfig {
			subsymbolic: true,
			partial_matching: true,
			retrieval_threshold: -10.0,
			..Default::default()
		};
		let mut dm = DeclarativeMemory::new();
		dm.add(order(2, 3), 0.0).unwrap();
		let request = Chunk::unchecked("countOrder", [("first", 1)]);
		let outcome = run(&dm, &request, &config, 1.0, &mut Finst::default());
		assert_eq!(outcome.chunk, Some(order(2, 3)));
		// base level 0 at t=1 plus the default -1 mismatch
		assert!((outcome.activation.unwrap() + 1.0).abs() < 1e-12);
	}

	#[test]
	fn test_missing_history_is_activation_error() {
		let config = ModelConfig {
			subsymbolic: true,
			..Default::default()
		};
		let mut dm = DeclarativeMemory::new();
		dm.add_at_times(order(1, 2), Vec::new()).unwrap();
		let similarities = SimilarityTable::new();
		let ctx = RetrievalContext {
			now: 1.0,
			config: &config,
			similarities: &similarities,
			sources: &[],
		};
		let request = Chunk::unchecked("countOrder", [("first", 1)]);
		let err = retrieve(&dm, &request, None, &mut Finst::default(), &ctx, &mut StdRng::seed_from_u64(1))
			.unwrap_err();
		assert!(matches!(err, ActrError::Activation { .. }));
	}

	#[test]
	fn test_finst_excludes_recent_results() {
		let config = ModelConfig::default();
		let dm = counting_memory();
		let mut finst = Finst::new(2);
		let request = Chunk::unchecked(
			"countOrder",
			[("first", "None"), (RECENTLY_RETRIEVED, "False")],
		);

		let first = run(&dm, &request, &config, 1.0, &mut finst).chunk;
		let second = run(&dm, &request, &config, 1.0, &mut finst).chunk;
		let third = run(&dm, &request, &config, 1.0, &mut finst).chunk;
		assert_eq!(first, Some(order(1, 2)));
		assert_eq!(second, Some(order(2, 3)));
		assert_eq!(third, Some(order(3, 4)));

		let recent = Chunk::unchecked("countOrder", [(RECENTLY_RETRIEVED, "True")]);
		let again = run(&dm, &recent, &config, 1.0, &mut finst).chunk;
		assert_eq!(again, Some(order(2, 3)));

		// order(1, 2) has been evicted from the two-slot window
		let fourth = run(&dm, &request, &config, 1.0, &mut finst).chunk;
		assert_eq!(fourth, Some(order(1, 2)));
	}

	#[test]
	fn test_finst_records_failures() {
		let mut finst = Finst::new(1);
		finst.record(Some(order(1, 2)));
		finst.record(None);
		assert_eq!(finst.len(), 1);
		assert!(!finst.contains(&order(1, 2)));

		let mut disabled = Finst::new(0);
		disabled.record(Some(order(1, 2)));
		assert!(disabled.is_empty());
	}

	#[test]
	fn test_bad_recency_filter() {
		let request = Chunk::unchecked("countOrder", [(RECENTLY_RETRIEVED, "maybe")]);
		assert!(split_request(&request).is_err());
	}
}
