//! Spreading Activation
//!
//! Chunks don't get retrieved in isolation. Whatever sits in the
//! buffers spreads activation to the memories it is associated with.
//!
//! `S_a(i) = Σ_j (W / n) × S_ji`
//!
//! Where:
//! - `W` = source weight of the buffer holding source `j`
//! - `n` = number of sources in that buffer's chunk
//! - `S_ji` = associative strength `S − ln((1 + fan_j) / cooc_ij)`
//!
//! Only sources that actually occur in the candidate contribute.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::activation::association_strength;
use crate::chunk::{Chunk, Value};
use crate::memory::DeclarativeMemory;

/// One source of activation taken from a buffer chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpreadingSource {
	/// Buffer the source sits in
	pub buffer: String,
	/// Slot of the buffer chunk holding the value
	pub slot: String,
	/// The source value
	pub value: Value,
	/// Share of the buffer weight: `W / n`
	pub weight: f64,
}

/// Collect the sources of every weighted buffer other than `requester`.
///
/// `buffers` yields each buffer's name and current content. Buffers without
/// a weight, or with an empty chunk, contribute nothing.
pub fn collect_sources<'a>(
	buffers: impl IntoIterator<Item = (&'a str, Option<&'a Chunk>)>,
	requester: &str,
	weights: &BTreeMap<String, f64>,
	only_chunks: bool,
) -> Vec<SpreadingSource> {
	let mut sources = Vec::new();
	for (buffer, content) in buffers.into_iter().filter(|&(buffer, _)| buffer != requester) {
		let (Some(&weight), Some(chunk)) = (weights.get(buffer), content) else {
			continue;
		};
		let values: Vec<(&str, &Value)> = chunk
			.values()
			.filter(|(_, value)| !only_chunks || value.as_chunk().is_some())
			.collect();
		if values.is_empty() {
			continue;
		}
		#[allow(clippy::cast_precision_loss)]
		let share = weight / values.len() as f64;
		sources.extend(values.into_iter().map(|(slot, value)| SpreadingSource {
			buffer: buffer.to_string(),
			slot: slot.to_string(),
			value: value.clone(),
			weight: share,
		}));
	}
	sources
}

/// Spreading activation a candidate receives from the sources.
///
/// With `restricted`, fan and co-occurrence are counted per (slot, value)
/// so a source only reaches chunks holding it in the same slot.
#[must_use]
pub fn spreading_activation(
	sources: &[SpreadingSource],
	candidate: &Chunk,
	memory: &DeclarativeMemory,
	maximum_strength: f64,
	restricted: bool,
) -> f64 {
	sources
		.iter()
		.map(|source| {
			let (cooccurrences, fan) = if restricted {
				let cooc = candidate
					.values()
					.filter(|&(slot, value)| slot == source.slot && *value == source.value)
					.count();
				(cooc, memory.slot_fan(&source.slot, &source.value))
			} else {
				let cooc = candidate
					.values()
					.filter(|&(_, value)| *value == source.value)
					.count();
				(cooc, memory.fan(&source.value))
			};
			if cooccurrences == 0 {
				0.0
			} else {
				source.weight * association_strength(maximum_strength, fan, cooccurrences)
			}
		})
		.sum()
}
