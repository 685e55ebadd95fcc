//! Chunks
//!
//! A chunk is ACT-R's unit of knowledge: a typed record of slot/value pairs.
//!
//! ```text
//! countOrder(first= 2, second= 3)
//! ```
//!
//! Slot values are concrete (an atom or a nested chunk), empty, or a
//! *pattern* used on the condition side of rules and in requests:
//!
//! | text     | meaning                              |
//! |----------|--------------------------------------|
//! | `=x`     | bind / test variable `x`             |
//! | `~=x`    | must differ from variable `x`        |
//! | `v`, `!v`| must equal `v`                       |
//! | `~v`     | must differ from `v`                 |
//! | `~None`  | must not be empty                    |
//! | `None`   | empty (ignored when matching)        |
//!
//! Tokens combine, e.g. `=x~!3` binds `x` to anything but `3`.
//!
//! Identity is defined over the non-empty slots only, so two chunks that
//! differ in empty slots are the same chunk.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{ActrError, Result};

/// Text form of the empty marker.
pub const EMPTY: &str = "None";

/// Built-in type for motor commands.
pub const MANUAL_TYPE: &str = "_manual";
/// Built-in type for visual locations.
pub const VISUAL_LOCATION_TYPE: &str = "_visuallocation";
/// Built-in type for encoded visual objects.
pub const VISUAL_TYPE: &str = "_visual";

// ============================================================================
// Values
// ============================================================================

/// A concrete slot value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
	/// Symbol or number, kept in canonical text form
	Atom(String),
	/// Nested chunk (relational structure)
	Chunk(Box<Chunk>),
}

impl Value {
	/// Build an atom from anything printable (numbers become their decimal text).
	pub fn atom(text: impl fmt::Display) -> Self {
		Self::Atom(text.to_string())
	}

	/// The atom text, if this is an atom.
	#[must_use]
	pub fn as_atom(&self) -> Option<&str> {
		match self {
			Self::Atom(text) => Some(text),
			Self::Chunk(_) => None,
		}
	}

	/// The nested chunk, if any.
	#[must_use]
	pub fn as_chunk(&self) -> Option<&Chunk> {
		match self {
			Self::Chunk(chunk) => Some(chunk),
			Self::Atom(_) => None,
		}
	}

	/// Numeric reading of an atom.
	#[must_use]
	pub fn as_f64(&self) -> Option<f64> {
		self.as_atom().and_then(|text| text.parse().ok())
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Atom(text) => f.write_str(text),
			Self::Chunk(chunk) => write!(f, "{chunk}"),
		}
	}
}

impl From<Chunk> for Value {
	fn from(chunk: Chunk) -> Self {
		Self::Chunk(Box::new(chunk))
	}
}

impl From<&str> for Value {
	fn from(text: &str) -> Self {
		Self::Atom(text.to_string())
	}
}

impl From<String> for Value {
	fn from(text: String) -> Self {
		Self::Atom(text)
	}
}

impl From<i64> for Value {
	fn from(n: i64) -> Self {
		Self::atom(n)
	}
}

impl From<i32> for Value {
	fn from(n: i32) -> Self {
		Self::atom(n)
	}
}

impl From<f64> for Value {
	/// Whole numbers keep their fraction (`320.0`), so a float slot never
	/// reads as an integer literal.
	fn from(n: f64) -> Self {
		Self::Atom(format!("{n:?}"))
	}
}

// ============================================================================
// Patterns
// ============================================================================

/// Constraints a pattern slot places on the matched value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pattern {
	/// `=x` - variable to bind or test
	pub variable: Option<String>,
	/// `~=x` - variables the value must differ from
	pub negated_variables: SmallVec<[String; 2]>,
	/// `v` / `!v` - required value
	pub value: Option<Value>,
	/// `~v` - excluded values
	pub negated_values: SmallVec<[Value; 2]>,
	/// `~None` - the slot must hold something
	pub forbid_empty: bool,
}

impl Pattern {
	/// Pattern with a single variable.
	pub fn variable(name: impl Into<String>) -> Self {
		Self {
			variable: Some(name.into()),
			..Self::default()
		}
	}

	/// Whether the pattern carries any negation.
	#[must_use]
	pub fn has_negation(&self) -> bool {
		!self.negated_variables.is_empty() || !self.negated_values.is_empty() || self.forbid_empty
	}

	fn normalize(mut self) -> Self {
		self.negated_variables.sort();
		self.negated_variables.dedup();
		self.negated_values.sort();
		self.negated_values.dedup();
		self
	}
}

impl fmt::Display for Pattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if let Some(value) = &self.value {
			write!(f, "{value}")?;
		}
		if let Some(variable) = &self.variable {
			write!(f, "={variable}")?;
		}
		for variable in &self.negated_variables {
			write!(f, "~={variable}")?;
		}
		for value in &self.negated_values {
			write!(f, "~{value}")?;
		}
		if self.forbid_empty {
			write!(f, "~{EMPTY}")?;
		}
		Ok(())
	}
}

/// What a slot holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotValue {
	/// No value supplied
	#[default]
	Empty,
	/// Concrete value
	Value(Value),
	/// Constraint (condition side of rules, requests)
	Pattern(Pattern),
}

impl SlotValue {
	/// Parse the slot-value text syntax described in the module docs.
	#[must_use]
	pub fn parse(text: &str) -> Self {
		let text = text.trim();
		if text.is_empty() || text == EMPTY {
			return Self::Empty;
		}
		if !text.starts_with(['=', '~', '!']) && !text.contains(['=', '~']) {
			return Self::Value(Value::Atom(text.to_string()));
		}

		let mut pattern = Pattern::default();
		for token in tokenize(text) {
			if let Some(name) = token.strip_prefix("~=") {
				pattern.negated_variables.push(name.to_string());
			} else if let Some(value) = token.strip_prefix("~!").or_else(|| token.strip_prefix('~')) {
				if value == EMPTY {
					pattern.forbid_empty = true;
				} else {
					pattern.negated_values.push(Value::Atom(value.to_string()));
				}
			} else if let Some(name) = token.strip_prefix('=') {
				pattern.variable = Some(name.to_string());
			} else {
				let value = token.strip_prefix('!').unwrap_or(token);
				if value != EMPTY {
					pattern.value = Some(Value::Atom(value.to_string()));
				}
			}
		}

		let pattern = pattern.normalize();
		if pattern == Pattern::default() {
			return Self::Empty;
		}
		if pattern.variable.is_none() && !pattern.has_negation() {
			if let Some(value) = pattern.value.clone() {
				return Self::Value(value);
			}
		}
		Self::Pattern(pattern)
	}

	/// Whether the slot is empty.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		matches!(self, Self::Empty)
	}

	/// The concrete value, if any.
	#[must_use]
	pub fn value(&self) -> Option<&Value> {
		match self {
			Self::Value(value) => Some(value),
			_ => None,
		}
	}
}

/// Split pattern text into `=x`, `~=x`, `~!v`, `~v`, `!v` and bare tokens.
fn tokenize(text: &str) -> Vec<&str> {
	let bytes = text.as_bytes();
	let mut starts = vec![0];
	let mut i = 0;
	while i < bytes.len() {
		let at_marker = matches!(bytes[i], b'=' | b'~' | b'!');
		// `~=` and `~!` are one marker; `!` right after `~` is part of it
		let continues_marker = i > 0 && bytes[i - 1] == b'~' && matches!(bytes[i], b'=' | b'!');
		if i > 0 && at_marker && !continues_marker {
			starts.push(i);
		}
		i += 1;
	}
	starts.push(bytes.len());
	starts
		.windows(2)
		.map(|w| &text[w[0]..w[1]])
		.filter(|token| !token.is_empty())
		.collect()
}

impl fmt::Display for SlotValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Empty => f.write_str(EMPTY),
			Self::Value(value) => write!(f, "{value}"),
			Self::Pattern(pattern) => write!(f, "{pattern}"),
		}
	}
}

impl From<&str> for SlotValue {
	fn from(text: &str) -> Self {
		Self::parse(text)
	}
}

impl From<String> for SlotValue {
	fn from(text: String) -> Self {
		Self::parse(&text)
	}
}

impl From<Value> for SlotValue {
	fn from(value: Value) -> Self {
		Self::Value(value)
	}
}

impl From<Chunk> for SlotValue {
	fn from(chunk: Chunk) -> Self {
		Self::Value(Value::from(chunk))
	}
}

impl From<Pattern> for SlotValue {
	fn from(pattern: Pattern) -> Self {
		Self::Pattern(pattern.normalize())
	}
}

impl From<i64> for SlotValue {
	fn from(n: i64) -> Self {
		Self::Value(Value::from(n))
	}
}

impl From<i32> for SlotValue {
	fn from(n: i32) -> Self {
		Self::Value(Value::from(n))
	}
}

impl From<f64> for SlotValue {
	fn from(n: f64) -> Self {
		Self::Value(Value::from(n))
	}
}

impl<T: Into<SlotValue>> From<Option<T>> for SlotValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Empty, Into::into)
	}
}

// ============================================================================
// Chunk
// ============================================================================

static EMPTY_SLOT: SlotValue = SlotValue::Empty;

/// A typed attribute-value record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
	typename: String,
	slots: SmallVec<[(String, SlotValue); 4]>,
}

impl Chunk {
	/// Type name of the chunk.
	#[must_use]
	pub fn typename(&self) -> &str {
		&self.typename
	}

	/// Value of a slot; missing slots read as empty.
	#[must_use]
	pub fn get(&self, slot: &str) -> &SlotValue {
		self.slots
			.iter()
			.find(|(name, _)| name == slot)
			.map_or(&EMPTY_SLOT, |(_, value)| value)
	}

	/// All slots in type-signature order, empty ones included.
	pub fn slots(&self) -> impl Iterator<Item = (&str, &SlotValue)> {
		self.slots.iter().map(|(name, value)| (name.as_str(), value))
	}

	/// Slots holding something.
	pub fn filled_slots(&self) -> impl Iterator<Item = (&str, &SlotValue)> {
		self.slots().filter(|(_, value)| !value.is_empty())
	}

	/// Copy of the chunk without its empty slots.
	#[must_use]
	pub fn remove_empty(&self) -> Self {
		Self {
			typename: self.typename.clone(),
			slots: self
				.slots
				.iter()
				.filter(|(_, value)| !value.is_empty())
				.cloned()
				.collect(),
		}
	}

	/// Whether any slot (recursively) holds a pattern.
	#[must_use]
	pub fn is_pattern(&self) -> bool {
		self.slots.iter().any(|(_, value)| match value {
			SlotValue::Pattern(_) => true,
			SlotValue::Value(Value::Chunk(inner)) => inner.is_pattern(),
			_ => false,
		})
	}

	/// Concrete values that can act as spreading sources (non-empty slots).
	pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.slots
			.iter()
			.filter_map(|(name, value)| value.value().map(|v| (name.as_str(), v)))
	}

	/// Build a chunk without consulting a type registry.
	///
	/// Slot order is the order given. Use [`ChunkTypes::make`] when the type
	/// signature should be enforced.
	pub fn unchecked<K, V>(typename: impl Into<String>, slots: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<SlotValue>,
	{
		Self {
			typename: typename.into(),
			slots: slots.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
		}
	}

	pub(crate) fn with_slots(typename: String, slots: SmallVec<[(String, SlotValue); 4]>) -> Self {
		Self { typename, slots }
	}

	pub(crate) fn set(&mut self, slot: &str, value: SlotValue) {
		if let Some(entry) = self.slots.iter_mut().find(|(name, _)| name == slot) {
			entry.1 = value;
		} else {
			self.slots.push((slot.to_string(), value));
		}
	}

	/// Non-empty slots in canonical (sorted) order.
	fn identity(&self) -> SmallVec<[&(String, SlotValue); 4]> {
		let mut pairs: SmallVec<[&(String, SlotValue); 4]> = self
			.slots
			.iter()
			.filter(|(_, value)| !value.is_empty())
			.collect();
		pairs.sort();
		pairs
	}
}

impl PartialEq for Chunk {
	fn eq(&self, other: &Self) -> bool {
		self.typename == other.typename && self.identity() == other.identity()
	}
}

impl Eq for Chunk {}

impl PartialOrd for Chunk {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Chunk {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.typename
			.cmp(&other.typename)
			.then_with(|| self.identity().cmp(&other.identity()))
	}
}

impl Hash for Chunk {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.typename.hash(state);
		self.identity().hash(state);
	}
}

impl fmt::Display for Chunk {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}(", self.typename)?;
		for (i, (name, value)) in self.slots.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{name}= {value}")?;
		}
		f.write_str(")")
	}
}

// ============================================================================
// Chunk type registry
// ============================================================================

/// Registry of chunk types and their slot signatures.
///
/// Owned by one model. Types widen while the model is built; once a
/// simulation starts the registry is frozen and unknown slots are an error.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkTypes {
	types: HashMap<String, Vec<String>>,
	frozen: bool,
}

impl Default for ChunkTypes {
	fn default() -> Self {
		let mut types = HashMap::new();
		let _ = types.insert(MANUAL_TYPE.to_string(), vec!["cmd".into(), "key".into()]);
		let _ = types.insert(
			VISUAL_LOCATION_TYPE.to_string(),
			vec!["screen_x".into(), "screen_y".into(), "color".into(), "value".into()],
		);
		let _ = types.insert(
			VISUAL_TYPE.to_string(),
			vec!["screen_pos".into(), "value".into(), "color".into(), "cmd".into()],
		);
		Self {
			types,
			frozen: false,
		}
	}
}

impl ChunkTypes {
	/// Registry holding only the built-in types.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Declare a type (or widen an existing one) with the given slots.
	///
	/// # Errors
	///
	/// Returns [`ActrError::Rule`] if the registry is frozen and new slots
	/// would have to be added.
	pub fn declare<S: AsRef<str>>(&mut self, typename: &str, slots: impl IntoIterator<Item = S>) -> Result<()> {
		let frozen = self.frozen;
		let known = self.types.entry(typename.to_string());
		let signature = match known {
			std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
			std::collections::hash_map::Entry::Vacant(entry) => {
				if frozen {
					return Err(ActrError::rule(format!(
						"chunk type '{typename}' declared after the simulation started"
					)));
				}
				entry.insert(Vec::new())
			}
		};
		for slot in slots {
			let slot = slot.as_ref();
			if !signature.iter().any(|s| s == slot) {
				if frozen {
					return Err(ActrError::rule(format!(
						"chunk type '{typename}' has no slot '{slot}' and cannot be widened during a run"
					)));
				}
				tracing::debug!(typename, slot, "widening chunk type");
				signature.push(slot.to_string());
			}
		}
		Ok(())
	}

	/// Slot signature of a type.
	#[must_use]
	pub fn signature(&self, typename: &str) -> Option<&[String]> {
		self.types.get(typename).map(Vec::as_slice)
	}

	/// Build a chunk, filling unmentioned slots with the empty marker.
	///
	/// # Errors
	///
	/// Fails like [`Self::declare`] when slots are unknown to a frozen registry.
	pub fn make<K, V>(&mut self, typename: &str, slots: impl IntoIterator<Item = (K, V)>) -> Result<Chunk>
	where
		K: Into<String>,
		V: Into<SlotValue>,
	{
		let given: Vec<(String, SlotValue)> = slots.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
		self.declare(typename, given.iter().map(|(k, _)| k.as_str()))?;
		let signature = self.signature(typename).unwrap_or_default();
		let mut ordered: SmallVec<[(String, SlotValue); 4]> = signature
			.iter()
			.map(|slot| (slot.clone(), SlotValue::Empty))
			.collect();
		for (slot, value) in given {
			if let Some(entry) = ordered.iter_mut().find(|(name, _)| *name == slot) {
				entry.1 = value;
			}
		}
		Ok(Chunk::with_slots(typename.to_string(), ordered))
	}

	/// Stop accepting new types and slots.
	pub fn freeze(&mut self) {
		self.frozen = true;
	}

	/// Whether the registry is frozen.
	#[must_use]
	pub const fn is_frozen(&self) -> bool {
		self.frozen
	}
}
