//! Production Rules
//!
//! A production pairs conditions on buffers (left-hand side) with actions
//! on buffers (right-hand side).
//!
//! Rules are keyed the conventional way:
//!
//! | side | key      | meaning                                 |
//! |------|----------|-----------------------------------------|
//! | LHS  | `=buf`   | buffer content must match a pattern     |
//! | LHS  | `?buf`   | buffer state probes                     |
//! | RHS  | `?buf`   | extra state test before the actions     |
//! | RHS  | `!buf`   | execute a command                       |
//! | RHS  | `=buf`   | modify the buffer chunk                 |
//! | RHS  | `@buf`   | overwrite without harvesting            |
//! | RHS  | `*buf`   | modify after the goal delay             |
//! | RHS  | `+buf`   | request (retrieve, create, command)     |
//! | RHS  | `~buf`   | clear (harvest into memory)             |
//!
//! Actions run in that priority order, whatever order they were written in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, SlotValue};
use crate::error::{ActrError, Result};

// ============================================================================
// Conditions and actions
// ============================================================================

/// One left-hand-side entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Condition {
	/// `=buf`: the buffer is full and its chunk matches the pattern
	Test {
		/// Buffer name
		buffer: String,
		/// Pattern chunk
		pattern: Chunk,
	},
	/// `?buf`: every probe holds
	Query {
		/// Buffer name
		buffer: String,
		/// `(probe, expected)` pairs, e.g. `("state", "free")`
		probes: Vec<(String, String)>,
	},
}

impl Condition {
	/// Buffer the condition refers to.
	#[must_use]
	pub fn buffer(&self) -> &str {
		match self {
			Self::Test { buffer, .. } | Self::Query { buffer, .. } => buffer,
		}
	}
}

/// One right-hand-side entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
	/// `?buf`: stop the remaining actions unless the probes hold
	Check {
		/// Buffer name
		buffer: String,
		/// Probes as in [`Condition::Query`]
		probes: Vec<(String, String)>,
	},
	/// `!buf`: run a command with a buffer argument
	Execute {
		/// Buffer name
		buffer: String,
		/// Registered command name (`show` is built in)
		command: String,
		/// Command argument, e.g. the slot to show
		argument: String,
	},
	/// `=buf`: merge overrides into the buffer chunk
	Modify {
		/// Buffer name
		buffer: String,
		/// Slot overrides
		overrides: Vec<(String, SlotValue)>,
	},
	/// `@buf`: replace the buffer chunk without harvesting it
	Overwrite {
		/// Buffer name
		buffer: String,
		/// Replacement chunk
		chunk: Chunk,
	},
	/// `*buf`: modify once the goal buffer's delay has passed
	DelayedModify {
		/// Buffer name
		buffer: String,
		/// Slot overrides
		overrides: Vec<(String, SlotValue)>,
	},
	/// `+buf`: request whatever the buffer kind supports
	Request {
		/// Buffer name
		buffer: String,
		/// Request or chunk to create
		chunk: Chunk,
	},
	/// `~buf`: harvest and empty the buffer
	Clear {
		/// Buffer name
		buffer: String,
	},
}

impl Action {
	/// Buffer the action refers to.
	#[must_use]
	pub fn buffer(&self) -> &str {
		match self {
			Self::Check { buffer, .. }
			| Self::Execute { buffer, .. }
			| Self::Modify { buffer, .. }
			| Self::Overwrite { buffer, .. }
			| Self::DelayedModify { buffer, .. }
			| Self::Request { buffer, .. }
			| Self::Clear { buffer } => buffer,
		}
	}

	/// Execution priority; lower runs first.
	#[must_use]
	pub const fn priority(&self) -> u8 {
		match self {
			Self::Check { .. } | Self::Execute { .. } => 0,
			Self::Modify { .. } => 1,
			Self::Overwrite { .. } => 2,
			Self::DelayedModify { .. } => 3,
			Self::Request { .. } => 4,
			Self::Clear { .. } => 5,
		}
	}
}

/// Value side of a keyed rule entry.
#[derive(Clone, Debug, PartialEq)]
pub enum RuleEntry {
	/// A chunk (pattern, request, or chunk to create)
	Chunk(Chunk),
	/// Slot overrides for `=`/`*`
	Slots(Vec<(String, SlotValue)>),
	/// State probes for `?`
	Query(Vec<(String, String)>),
	/// Command and argument for `!`
	Command(String, String),
	/// No value (`~buf`)
	None,
}

// ============================================================================
// Production
// ============================================================================

/// A named production rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Production {
	/// Rule name
	pub name: String,
	/// Left-hand side in written order
	pub conditions: Vec<Condition>,
	/// Right-hand side in execution order
	pub actions: Vec<Action>,
	/// Current utility
	pub utility: f64,
	/// Reward delivered when the rule fires
	pub reward: Option<f64>,
	/// Firing time overriding the model's `rule_firing`
	pub rule_firing: Option<f64>,
	/// Selection times not yet credited by utility learning
	pub selecting_times: Vec<f64>,
}

impl Production {
	/// Empty rule; add conditions and actions with the builder methods.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			conditions: Vec::new(),
			actions: Vec::new(),
			utility: 0.0,
			reward: None,
			rule_firing: None,
			selecting_times: Vec::new(),
		}
	}

	/// Build a rule from keyed entries (`"=g"`, `"+retrieval"`, ...).
	///
	/// # Errors
	///
	/// [`ActrError::Rule`] for unknown key prefixes, empty buffer names, or
	/// values that do not fit the key.
	pub fn from_entries<K: AsRef<str>>(
		name: impl Into<String>,
		lhs: impl IntoIterator<Item = (K, RuleEntry)>,
		rhs: impl IntoIterator<Item = (K, RuleEntry)>,
	) -> Result<Self> {
		let mut rule = Self::new(name);
		for (key, entry) in lhs {
			let (prefix, buffer) = split_key(key.as_ref())?;
			let condition = match (prefix, entry) {
				('=', RuleEntry::Chunk(pattern)) => Condition::Test { buffer, pattern },
				('?', RuleEntry::Query(probes)) => Condition::Query { buffer, probes },
				(prefix, entry) => return Err(misfit(&rule.name, "condition", prefix, &buffer, &entry)),
			};
			rule.conditions.push(condition);
		}
		for (key, entry) in rhs {
			let (prefix, buffer) = split_key(key.as_ref())?;
			let action = match (prefix, entry) {
				('?', RuleEntry::Query(probes)) => Action::Check { buffer, probes },
				('!', RuleEntry::Command(command, argument)) => Action::Execute {
					buffer,
					command,
					argument,
				},
				('=', RuleEntry::Slots(overrides)) => Action::Modify { buffer, overrides },
				('=', RuleEntry::Chunk(chunk)) => Action::Modify {
					buffer,
					overrides: overrides_of(&chunk),
				},
				('*', RuleEntry::Slots(overrides)) => Action::DelayedModify { buffer, overrides },
				('*', RuleEntry::Chunk(chunk)) => Action::DelayedModify {
					buffer,
					overrides: overrides_of(&chunk),
				},
				('@', RuleEntry::Chunk(chunk)) => Action::Overwrite { buffer, chunk },
				('+', RuleEntry::Chunk(chunk)) => Action::Request { buffer, chunk },
				('~', RuleEntry::None) => Action::Clear { buffer },
				(prefix, entry) => return Err(misfit(&rule.name, "action", prefix, &buffer, &entry)),
			};
			rule.push_action(action);
		}
		rule.validate()?;
		Ok(rule)
	}

	fn push_action(&mut self, action: Action) {
		// stable insert keeps written order within one priority
		let at = self
			.actions
			.partition_point(|existing| existing.priority() <= action.priority());
		self.actions.insert(at, action);
	}

	/// `=buf` condition.
	#[must_use]
	pub fn test(mut self, buffer: impl Into<String>, pattern: Chunk) -> Self {
		self.conditions.push(Condition::Test {
			buffer: buffer.into(),
			pattern,
		});
		self
	}

	/// `?buf` condition.
	#[must_use]
	pub fn query<'a>(mut self, buffer: impl Into<String>, probes: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
		self.conditions.push(Condition::Query {
			buffer: buffer.into(),
			probes: to_probes(probes),
		});
		self
	}

	/// `?buf` extra test on the right-hand side.
	#[must_use]
	pub fn check<'a>(mut self, buffer: impl Into<String>, probes: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
		self.push_action(Action::Check {
			buffer: buffer.into(),
			probes: to_probes(probes),
		});
		self
	}

	/// `!buf` command.
	#[must_use]
	pub fn execute(mut self, buffer: impl Into<String>, command: impl Into<String>, argument: impl Into<String>) -> Self {
		self.push_action(Action::Execute {
			buffer: buffer.into(),
			command: command.into(),
			argument: argument.into(),
		});
		self
	}

	/// `=buf` modification.
	#[must_use]
	pub fn modify<K, V>(mut self, buffer: impl Into<String>, overrides: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<SlotValue>,
	{
		self.push_action(Action::Modify {
			buffer: buffer.into(),
			overrides: to_overrides(overrides),
		});
		self
	}

	/// `@buf` overwrite.
	#[must_use]
	pub fn overwrite(mut self, buffer: impl Into<String>, chunk: Chunk) -> Self {
		self.push_action(Action::Overwrite {
			buffer: buffer.into(),
			chunk,
		});
		self
	}

	/// `*buf` delayed modification.
	#[must_use]
	pub fn modify_delayed<K, V>(mut self, buffer: impl Into<String>, overrides: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<SlotValue>,
	{
		self.push_action(Action::DelayedModify {
			buffer: buffer.into(),
			overrides: to_overrides(overrides),
		});
		self
	}

	/// `+buf` request.
	#[must_use]
	pub fn request(mut self, buffer: impl Into<String>, chunk: Chunk) -> Self {
		self.push_action(Action::Request {
			buffer: buffer.into(),
			chunk,
		});
		self
	}

	/// `~buf` clear.
	#[must_use]
	pub fn clear(mut self, buffer: impl Into<String>) -> Self {
		self.push_action(Action::Clear { buffer: buffer.into() });
		self
	}

	/// Set the starting utility.
	#[must_use]
	pub fn utility(mut self, utility: f64) -> Self {
		self.utility = utility;
		self
	}

	/// Set the reward delivered on firing.
	#[must_use]
	pub fn reward(mut self, reward: f64) -> Self {
		self.reward = Some(reward);
		self
	}

	/// Override the firing time for this rule.
	#[must_use]
	pub fn rule_firing(mut self, seconds: f64) -> Self {
		self.rule_firing = Some(seconds);
		self
	}

	/// Buffers tested with `=buf` on the left-hand side.
	pub fn tested_buffers(&self) -> impl Iterator<Item = &str> {
		self.conditions.iter().filter_map(|condition| match condition {
			Condition::Test { buffer, .. } => Some(buffer.as_str()),
			Condition::Query { .. } => None,
		})
	}

	/// Whether some action other than a check or command updates `buffer`.
	#[must_use]
	pub fn updates(&self, buffer: &str) -> bool {
		self.actions.iter().any(|action| {
			action.buffer() == buffer && !matches!(action, Action::Check { .. } | Action::Execute { .. })
		})
	}

	/// Reject negations where concrete values are written into buffers.
	///
	/// # Errors
	///
	/// [`ActrError::Rule`] naming the rule and slot.
	pub fn validate(&self) -> Result<()> {
		if self.name.is_empty() {
			return Err(ActrError::rule("production without a name"));
		}
		for action in &self.actions {
			let slots: Vec<(&str, &SlotValue)> = match action {
				Action::Modify { overrides, .. } | Action::DelayedModify { overrides, .. } => {
					overrides.iter().map(|(slot, value)| (slot.as_str(), value)).collect()
				}
				Action::Overwrite { chunk, .. } => chunk.slots().collect(),
				_ => continue,
			};
			for (slot, value) in slots {
				if let SlotValue::Pattern(p) = value {
					if p.has_negation() {
						return Err(ActrError::rule(format!(
							"rule '{}': negation '{p}' cannot be written into slot '{slot}' of {}",
							self.name,
							action.buffer()
						)));
					}
				}
			}
		}
		Ok(())
	}
}

fn split_key(key: &str) -> Result<(char, String)> {
	let mut chars = key.chars();
	let prefix = chars
		.next()
		.ok_or_else(|| ActrError::rule("empty rule key"))?;
	let buffer = chars.as_str().trim();
	if !matches!(prefix, '=' | '?' | '!' | '+' | '~' | '@' | '*') {
		return Err(ActrError::rule(format!("unknown prefix '{prefix}' in rule key '{key}'")));
	}
	if buffer.is_empty() {
		return Err(ActrError::rule(format!("rule key '{key}' names no buffer")));
	}
	Ok((prefix, buffer.to_string()))
}

fn misfit(rule: &str, side: &str, prefix: char, buffer: &str, entry: &RuleEntry) -> ActrError {
	ActrError::rule(format!(
		"rule '{rule}': {entry:?} is not a valid {side} for '{prefix}{buffer}'"
	))
}

fn overrides_of(chunk: &Chunk) -> Vec<(String, SlotValue)> {
	chunk
		.filled_slots()
		.map(|(slot, value)| (slot.to_string(), value.clone()))
		.collect()
}

fn to_probes<'a>(probes: impl IntoIterator<Item = (&'a str, &'a str)>) -> Vec<(String, String)> {
	probes
		.into_iter()
		.map(|(probe, expected)| (probe.to_string(), expected.to_string()))
		.collect()
}

fn to_overrides<K: Into<String>, V: Into<SlotValue>>(overrides: impl IntoIterator<Item = (K, V)>) -> Vec<(String, SlotValue)> {
	overrides.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

// ============================================================================
// Rule store
// ============================================================================

/// The productions of a model in registration order.
#[derive(Clone, Debug, Default)]
pub struct RuleStore {
	rules: Vec<Production>,
	index: HashMap<String, usize>,
}

impl RuleStore {
	/// Empty store.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a rule.
	///
	/// # Errors
	///
	/// [`ActrError::Rule`] for duplicate names or invalid actions.
	pub fn add(&mut self, rule: Production) -> Result<()> {
		rule.validate()?;
		if self.index.contains_key(&rule.name) {
			return Err(ActrError::rule(format!("duplicate production '{}'", rule.name)));
		}
		let _ = self.index.insert(rule.name.clone(), self.rules.len());
		self.rules.push(rule);
		Ok(())
	}

	/// Look up a rule by name.
	#[must_use]
	pub fn get(&self, name: &str) -> Option<&Production> {
		self.index.get(name).map(|&i| &self.rules[i])
	}

	/// Mutable lookup by name.
	pub fn get_mut(&mut self, name: &str) -> Option<&mut Production> {
		self.index.get(name).map(|&i| &mut self.rules[i])
	}

	/// Rule at a registration index.
	#[must_use]
	pub fn at(&self, index: usize) -> Option<&Production> {
		self.rules.get(index)
	}

	pub(crate) fn at_mut(&mut self, index: usize) -> Option<&mut Production> {
		self.rules.get_mut(index)
	}

	/// Rules in registration order.
	pub fn iter(&self) -> impl Iterator<Item = &Production> {
		self.rules.iter()
	}

	pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Production> {
		self.rules.iter_mut()
	}

	/// Number of rules.
	#[must_use]
	pub fn len(&self) -> usize {
		self.rules.len()
	}

	/// Whether no rules are registered.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}
}
