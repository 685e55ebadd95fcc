//! Chunk Matching
//!
//! The partial order over chunks that drives both rule conditions and
//! declarative retrieval.
//!
//! `A ≤ B` ("A is part of B") holds when every filled slot of the pattern
//! `A` is satisfied by `B`:
//!
//! - values must be equal
//! - `=x` binds on first use and must agree afterwards
//! - `~=x` and `~v` exclude values
//! - empty pattern slots are ignored
//!
//! Under partial matching the same walk accumulates a similarity penalty
//! instead of failing:
//!
//! ```text
//! A_pm = Σ P × Sim(expected, actual)      (Sim = 0 for identity, −1 default)
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::chunk::{Chunk, ChunkTypes, Pattern, SlotValue, Value};
use crate::error::{ActrError, Result};

// ============================================================================
// Bindings
// ============================================================================

/// Variable bindings accumulated during one match attempt.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
	bound: HashMap<String, Value>,
	excluded: HashMap<String, SmallVec<[Value; 2]>>,
}

impl Bindings {
	/// Empty environment.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Value bound to `=name`.
	#[must_use]
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.bound.get(name)
	}

	/// Bind `=name`, keeping an existing binding.
	pub fn bind(&mut self, name: &str, value: Value) {
		let _ = self.bound.entry(name.to_string()).or_insert(value);
	}

	/// Values `~=name` has excluded so far.
	#[must_use]
	pub fn excluded(&self, name: &str) -> &[Value] {
		self.excluded.get(name).map_or(&[], SmallVec::as_slice)
	}

	fn exclude(&mut self, name: &str, value: Value) {
		let values = self.excluded.entry(name.to_string()).or_default();
		if !values.contains(&value) {
			values.push(value);
		}
	}

	/// Number of bound variables.
	#[must_use]
	pub fn len(&self) -> usize {
		self.bound.len()
	}

	/// Whether nothing is bound.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.bound.is_empty()
	}
}

// ============================================================================
// Similarities
// ============================================================================

/// Pairwise similarities used by partial matching.
///
/// Lookups are symmetric. Identical values are always 0; unlisted distinct
/// pairs use the default (−1).
#[derive(Clone, Debug)]
pub struct SimilarityTable {
	pairs: HashMap<(Value, Value), f64>,
	/// Similarity of unlisted distinct pairs
	pub default: f64,
}

impl Default for SimilarityTable {
	fn default() -> Self {
		Self {
			pairs: HashMap::new(),
			default: -1.0,
		}
	}
}

impl SimilarityTable {
	/// Table with only the default.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Set the similarity of a pair (both orders).
	pub fn set(&mut self, a: impl Into<Value>, b: impl Into<Value>, similarity: f64) {
		let _ = self.pairs.insert((a.into(), b.into()), similarity);
	}

	/// Similarity of two values; `None` stands for the empty marker.
	#[must_use]
	pub fn get(&self, a: Option<&Value>, b: Option<&Value>) -> f64 {
		match (a, b) {
			(Some(a), Some(b)) if a == b => 0.0,
			(None, None) => 0.0,
			(Some(a), Some(b)) => self
				.pairs
				.get(&(a.clone(), b.clone()))
				.or_else(|| self.pairs.get(&(b.clone(), a.clone())))
				.copied()
				.unwrap_or(self.default),
			_ => self.default,
		}
	}
}

// ============================================================================
// Matching
// ============================================================================

/// How a mismatch is handled.
#[derive(Clone, Copy)]
enum Mode<'a> {
	Strict,
	Partial {
		similarities: &'a SimilarityTable,
		mismatch_penalty: f64,
	},
}

/// Accumulated penalty of one match attempt.
struct Walk<'a> {
	mode: Mode<'a>,
	score: f64,
}

impl Walk<'_> {
	/// Record a mismatch; returns false if matching must stop.
	fn mismatch(&mut self, expected: Option<&Value>, actual: Option<&Value>) -> bool {
		match self.mode {
			Mode::Strict => false,
			Mode::Partial {
				similarities,
				mismatch_penalty,
			} => {
				self.score += similarities.get(expected, actual) * mismatch_penalty;
				true
			}
		}
	}

	/// Record a full mismatch (negation hit, empty binding).
	fn violation(&mut self) -> bool {
		match self.mode {
			Mode::Strict => false,
			Mode::Partial {
				mismatch_penalty, ..
			} => {
				self.score -= mismatch_penalty;
				true
			}
		}
	}
}

fn target_value(target: &Chunk, slot: &str) -> Option<Value> {
	match target.get(slot) {
		SlotValue::Value(value) => Some(value.clone()),
		SlotValue::Empty => None,
		// a pattern on the target side only matches an identical pattern
		SlotValue::Pattern(p) => Some(Value::Atom(p.to_string())),
	}
}

fn values_agree(expected: &Value, actual: Option<&Value>, bindings: &mut Bindings) -> bool {
	match (expected, actual) {
		(Value::Chunk(pattern), Some(Value::Chunk(target))) if pattern.is_pattern() => {
			walk(pattern, target, bindings, Mode::Strict).is_some()
		}
		(expected, Some(actual)) => expected == actual,
		(_, None) => false,
	}
}

fn check_pattern(pattern: &Pattern, actual: Option<&Value>, bindings: &mut Bindings, state: &mut Walk<'_>) -> bool {
	if let Some(variable) = &pattern.variable {
		match actual {
			// empty counts as absence, never as a satisfiable binding
			None => {
				if !state.violation() {
					return false;
				}
			}
			Some(actual) => {
				if bindings.excluded(variable).contains(actual) && !state.violation() {
					return false;
				}
				match bindings.get(variable) {
					Some(bound) if bound != actual => {
						let bound = bound.clone();
						if !state.mismatch(Some(&bound), Some(actual)) {
							return false;
						}
					}
					Some(_) => {}
					None => bindings.bind(variable, actual.clone()),
				}
			}
		}
	}

	for variable in &pattern.negated_variables {
		if let Some(actual) = actual {
			if bindings.get(variable) == Some(actual) && !state.violation() {
				return false;
			}
			bindings.exclude(variable, actual.clone());
		}
	}

	if let Some(expected) = &pattern.value {
		if !values_agree(expected, actual, bindings) && !state.mismatch(Some(expected), actual) {
			return false;
		}
	}

	for excluded in &pattern.negated_values {
		if actual == Some(excluded) && !state.violation() {
			return false;
		}
	}

	if pattern.forbid_empty && actual.is_none() && !state.violation() {
		return false;
	}

	true
}

fn walk(pattern: &Chunk, target: &Chunk, bindings: &mut Bindings, mode: Mode<'_>) -> Option<f64> {
	if pattern.typename() != target.typename() {
		return None;
	}
	if pattern == target {
		return Some(0.0);
	}

	let mut state = Walk { mode, score: 0.0 };
	for (slot, expected) in pattern.filled_slots() {
		let actual = target_value(target, slot);
		let ok = match expected {
			SlotValue::Empty => true,
			SlotValue::Value(value) => {
				values_agree(value, actual.as_ref(), bindings)
					|| state.mismatch(Some(value), actual.as_ref())
			}
			SlotValue::Pattern(p) => check_pattern(p, actual.as_ref(), bindings, &mut state),
		};
		if !ok {
			return None;
		}
	}
	Some(state.score)
}

impl Chunk {
	/// `self ≤ target`: the pattern is part of the target.
	///
	/// New variable bindings are written into `bindings`; on failure the
	/// bindings may hold partial results and should be discarded.
	pub fn matches(&self, target: &Self, bindings: &mut Bindings) -> bool {
		walk(self, target, bindings, Mode::Strict).is_some()
	}

	/// `self < target`: part of, but not equal to, the target.
	pub fn is_proper_part_of(&self, target: &Self, bindings: &mut Bindings) -> bool {
		self != target && self.matches(target, bindings)
	}

	/// Partial-match penalty of `target` against this pattern.
	///
	/// Returns 0 for a perfect match, a negative sum of similarity penalties
	/// otherwise, and `None` only if the types differ.
	pub fn match_score(
		&self,
		target: &Self,
		bindings: &mut Bindings,
		similarities: &SimilarityTable,
		mismatch_penalty: f64,
	) -> Option<f64> {
		walk(
			self,
			target,
			bindings,
			Mode::Partial {
				similarities,
				mismatch_penalty,
			},
		)
	}

	/// Fully concrete copy with variables replaced by their bindings.
	///
	/// Used for chunks placed into buffers (`+goal`, `@buffer`).
	///
	/// # Errors
	///
	/// [`ActrError::Binding`] for unbound variables, [`ActrError::Rule`] for
	/// negations or conflicting values in one slot.
	pub fn resolve(&self, bindings: &Bindings) -> Result<Self> {
		let mut slots = SmallVec::new();
		for (slot, value) in self.slots() {
			slots.push((slot.to_string(), resolve_value(value, bindings, slot)?));
		}
		Ok(Self::with_slots(self.typename().to_string(), slots))
	}

	/// Request pattern with bound variables substituted.
	///
	/// `=x` becomes the bound value and `~=x` becomes `~value`; literal values
	/// and negated values pass through.
	///
	/// # Errors
	///
	/// [`ActrError::Binding`] if a variable is unbound.
	pub fn resolve_request(&self, bindings: &Bindings) -> Result<Self> {
		let mut slots = SmallVec::new();
		for (slot, value) in self.slots() {
			let resolved = match value {
				SlotValue::Pattern(p) => {
					let mut out = Pattern {
						value: p.value.clone(),
						negated_values: p.negated_values.clone(),
						forbid_empty: p.forbid_empty,
						..Pattern::default()
					};
					if let Some(variable) = &p.variable {
						let bound = lookup(bindings, variable, slot)?;
						if out.value.as_ref().is_some_and(|v| v != bound) {
							return Err(ActrError::rule(format!(
								"slot '{slot}' is forced to two values in a request"
							)));
						}
						out.value = Some(bound.clone());
					}
					for variable in &p.negated_variables {
						out.negated_values.push(lookup(bindings, variable, slot)?.clone());
					}
					SlotValue::from(out)
				}
				SlotValue::Value(Value::Chunk(inner)) => SlotValue::from(inner.resolve_request(bindings)?),
				other => other.clone(),
			};
			let resolved = match resolved {
				SlotValue::Pattern(p) if !p.has_negation() && p.variable.is_none() => {
					p.value.map_or(SlotValue::Empty, SlotValue::Value)
				}
				other => other,
			};
			slots.push((slot.to_string(), resolved));
		}
		Ok(Self::with_slots(self.typename().to_string(), slots))
	}

	/// New chunk with `overrides` applied, variables resolved from `bindings`.
	///
	/// Explicit `SlotValue::Empty` overrides clear a slot. Slots the type does
	/// not know yet are checked against `types` (widening is refused once the
	/// registry is frozen).
	///
	/// # Errors
	///
	/// [`ActrError::Binding`] for unbound variables, [`ActrError::Rule`] for
	/// negations, conflicting values, or unknown slots in a frozen registry.
	pub fn modify<'a>(
		&self,
		overrides: impl IntoIterator<Item = (&'a str, &'a SlotValue)>,
		bindings: &Bindings,
		types: &mut ChunkTypes,
	) -> Result<Self> {
		let mut modified = self.clone();
		for (slot, value) in overrides {
			if !self.slots().any(|(name, _)| name == slot) {
				types.declare(self.typename(), [slot])?;
			}
			modified.set(slot, resolve_value(value, bindings, slot)?);
		}
		Ok(modified)
	}
}

fn lookup<'b>(bindings: &'b Bindings, variable: &str, slot: &str) -> Result<&'b Value> {
	bindings.get(variable).ok_or_else(|| ActrError::Binding {
		variable: variable.to_string(),
		context: format!("slot '{slot}'"),
	})
}

fn resolve_value(value: &SlotValue, bindings: &Bindings, slot: &str) -> Result<SlotValue> {
	match value {
		SlotValue::Empty => Ok(SlotValue::Empty),
		SlotValue::Value(Value::Chunk(inner)) => Ok(SlotValue::from(inner.resolve(bindings)?)),
		SlotValue::Value(value) => Ok(SlotValue::Value(value.clone())),
		SlotValue::Pattern(p) => {
			if p.has_negation() {
				return Err(ActrError::rule(format!(
					"negation '{p}' in slot '{slot}' cannot be used to set a value"
				)));
			}
			match (&p.variable, &p.value) {
				(Some(variable), Some(value)) => {
					let bound = lookup(bindings, variable, slot)?;
					if bound == value {
						Ok(SlotValue::Value(value.clone()))
					} else {
						Err(ActrError::rule(format!(
							"slot '{slot}' is forced to two values: {bound} and {value}"
						)))
					}
				}
				(Some(variable), None) => Ok(SlotValue::Value(lookup(bindings, variable, slot)?.clone())),
				(None, Some(value)) => Ok(SlotValue::Value(value.clone())),
				(None, None) => Ok(SlotValue::Empty),
			}
		}
	}
}
