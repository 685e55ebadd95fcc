//! Declarative Memory
//!
//! Long-term store of chunks with their presentation histories.
//!
//! Re-adding a chunk never overwrites it: the new presentation time is
//! appended to its history. Fan counters are maintained on first insertion
//! and feed the associative strengths of spreading activation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::activation::{base_level, optimized_base_level};
use crate::chunk::{Chunk, Value};
use crate::config::ModelConfig;
use crate::error::{ActrError, Result};

/// Handle of a declarative memory owned by a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemoryId(pub(crate) usize);

/// One stored chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryEntry {
	/// The chunk itself
	pub chunk: Chunk,
	/// Presentation times, ascending
	pub times: Vec<f64>,
	/// Externally supplied activation, used in place of the trace sum
	pub activation: Option<f64>,
}

impl MemoryEntry {
	/// Base-level activation at `now`.
	///
	/// An activation set with [`DeclarativeMemory::set_activation`] wins
	/// over the presentation history, with or without base-level learning.
	/// Returns `Ok(None)` when the chunk has only just been presented and
	/// must be skipped.
	///
	/// # Errors
	///
	/// [`ActrError::Activation`] if base-level learning is on, no activation
	/// was set and the history is empty or lies in the future.
	pub fn base_level(&self, now: f64, config: &ModelConfig) -> Result<Option<f64>> {
		if let Some(activation) = self.activation {
			return Ok(Some(activation));
		}
		if !config.baselevel_learning {
			return Ok(Some(0.0));
		}
		if self.times.is_empty() {
			return Err(ActrError::Activation {
				chunk: self.chunk.to_string(),
				reason: "no presentation history".into(),
			});
		}
		if let Some(&future) = self.times.iter().find(|&&t| t > now) {
			return Err(ActrError::Activation {
				chunk: self.chunk.to_string(),
				reason: format!("presented at {future}, after the current time {now}"),
			});
		}
		Ok(if config.optimized_learning {
			optimized_base_level(&self.times, now, config.decay)
		} else {
			base_level(&self.times, now, config.decay)
		})
	}
}

/// A chunk store with presentation histories and fan counters.
#[derive(Clone, Debug, Default)]
pub struct DeclarativeMemory {
	entries: Vec<MemoryEntry>,
	index: HashMap<Chunk, usize>,
	fan: HashMap<Value, usize>,
	slot_fan: HashMap<(String, Value), usize>,
}

impl DeclarativeMemory {
	/// Empty memory.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Record a presentation of `chunk` at `time`.
	///
	/// # Errors
	///
	/// Returns [`ActrError::Rule`] if the chunk still contains patterns.
	pub fn add(&mut self, chunk: Chunk, time: f64) -> Result<()> {
		let index = self.entry_index(chunk)?;
		let times = &mut self.entries[index].times;
		let at = times.partition_point(|&t| t <= time);
		times.insert(at, time);
		Ok(())
	}

	/// Record several presentations at once.
	///
	/// # Errors
	///
	/// Same as [`Self::add`].
	pub fn add_at_times(&mut self, chunk: Chunk, times: impl IntoIterator<Item = f64>) -> Result<()> {
		let index = self.entry_index(chunk)?;
		let history = &mut self.entries[index].times;
		history.extend(times);
		history.sort_by(f64::total_cmp);
		Ok(())
	}

	/// Fix the base-level activation of `chunk`, replacing whatever its
	/// history would give.
	///
	/// # Errors
	///
	/// Same as [`Self::add`].
	pub fn set_activation(&mut self, chunk: Chunk, activation: f64) -> Result<()> {
		let index = self.entry_index(chunk)?;
		self.entries[index].activation = Some(activation);
		Ok(())
	}

	fn entry_index(&mut self, chunk: Chunk) -> Result<usize> {
		if let Some(&index) = self.index.get(&chunk) {
			return Ok(index);
		}
		if chunk.is_pattern() {
			return Err(ActrError::rule(format!(
				"cannot store a pattern in declarative memory: {chunk}"
			)));
		}

		let mut seen: Vec<&Value> = Vec::new();
		for (slot, value) in chunk.values() {
			*self.slot_fan.entry((slot.to_string(), value.clone())).or_insert(0) += 1;
			if !seen.contains(&value) {
				seen.push(value);
				*self.fan.entry(value.clone()).or_insert(0) += 1;
			}
		}

		let index = self.entries.len();
		let _ = self.index.insert(chunk.clone(), index);
		self.entries.push(MemoryEntry {
			chunk,
			times: Vec::new(),
			activation: None,
		});
		Ok(index)
	}

	/// Presentation history of a chunk.
	#[must_use]
	pub fn times(&self, chunk: &Chunk) -> Option<&[f64]> {
		self.index
			.get(chunk)
			.map(|&index| self.entries[index].times.as_slice())
	}

	/// Whether the chunk is stored.
	#[must_use]
	pub fn contains(&self, chunk: &Chunk) -> bool {
		self.index.contains_key(chunk)
	}

	/// Number of stored chunks that contain `value` in some slot.
	#[must_use]
	pub fn fan(&self, value: &Value) -> usize {
		self.fan.get(value).copied().unwrap_or(0)
	}

	/// Number of stored chunks holding `value` in `slot`.
	#[must_use]
	pub fn slot_fan(&self, slot: &str, value: &Value) -> usize {
		self.slot_fan
			.get(&(slot.to_string(), value.clone()))
			.copied()
			.unwrap_or(0)
	}

	/// Number of stored chunks.
	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the memory is empty.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Entries in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
		self.entries.iter()
	}
}
