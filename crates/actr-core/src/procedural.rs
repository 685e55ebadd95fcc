//! Procedural Engine
//!
//! The production cycle:
//!
//! ```text
//! CONFLICT RESOLUTION ──▶ RULE SELECTED ──(rule_firing)──▶ RULE FIRED ──┐
//!        ▲      │                                                        │
//!        │      └──▶ NO RULE FOUND ──(a buffer changes)──┐               │
//!        └───────────────────────────────────────────────┴───────────────┘
//! ```
//!
//! Conflict resolution evaluates every rule against the current buffers.
//! Failing a condition, even one naming a buffer the model does not have,
//! only rules that production out. The highest utility wins.
//!
//! ## Utility learning
//!
//! When a rule carrying a reward fires, every rule selected since the last
//! reward is credited:
//!
//! ```text
//! U ← U + α × (R − (t_fired − t_selected) − U)
//! ```

use std::collections::BTreeMap;

use rand::Rng;

use crate::activation::logistic_noise;
use crate::buffer::Buffer;
use crate::config::{ModelConfig, TieBreak};
use crate::matching::Bindings;
use crate::rule::{Condition, Production, RuleStore};

/// Process name of the production cycle.
pub const PROCEDURAL: &str = "PROCEDURAL";

/// Where the production cycle resumes.
#[derive(Clone, Debug, PartialEq)]
pub enum ProceduralState {
	/// Announce a new cycle
	ConflictResolution,
	/// Match rules and pick one
	Selection,
	/// Fire the selected rule
	Fire {
		/// Registration index of the rule
		rule: usize,
		/// Bindings from matching its conditions
		bindings: Bindings,
	},
}

/// Bindings under which `rule`'s conditions hold, if they do.
#[must_use]
pub fn rule_matches(rule: &Production, buffers: &BTreeMap<String, Buffer>) -> Option<Bindings> {
	let mut bindings = Bindings::new();
	for condition in &rule.conditions {
		let buffer = buffers.get(condition.buffer())?;
		let holds = match condition {
			Condition::Test { pattern, .. } => buffer
				.content()
				.is_some_and(|content| pattern.matches(content, &mut bindings)),
			Condition::Query { probes, .. } => probes
				.iter()
				.all(|(probe, expected)| buffer.query(probe, expected)),
		};
		if !holds {
			return None;
		}
	}
	Some(bindings)
}

/// Every rule whose conditions hold, in registration order.
#[must_use]
pub fn matching_rules(rules: &RuleStore, buffers: &BTreeMap<String, Buffer>) -> Vec<(usize, Bindings)> {
	rules
		.iter()
		.enumerate()
		.filter_map(|(index, rule)| rule_matches(rule, buffers).map(|bindings| (index, bindings)))
		.collect()
}

/// Pick the matching rule with the highest (noisy) utility.
pub fn select<R: Rng + ?Sized>(
	candidates: Vec<(usize, Bindings)>,
	rules: &RuleStore,
	config: &ModelConfig,
	rng: &mut R,
) -> Option<(usize, Bindings)> {
	let mut best: Option<(f64, usize, Bindings)> = None;
	for (index, bindings) in candidates {
		let Some(rule) = rules.at(index) else {
			continue;
		};
		let noise = if config.subsymbolic {
			logistic_noise(rng, config.utility_noise)
		} else {
			0.0
		};
		let utility = rule.utility + noise;
		let wins = best.as_ref().map_or(true, |(top, _, _)| match config.tie_break {
			TieBreak::LastExamined => utility >= *top,
			TieBreak::FirstExamined => utility > *top,
		});
		if wins {
			best = Some((utility, index, bindings));
		}
	}
	best.map(|(_, index, bindings)| (index, bindings))
}

/// Credit every pending selection with `reward`, then forget them.
pub fn learn_utilities(rules: &mut RuleStore, reward: f64, fired_at: f64, alpha: f64) {
	for rule in rules.iter_mut() {
		for selected_at in rule.selecting_times.drain(..) {
			rule.utility += alpha * (reward - (fired_at - selected_at) - rule.utility);
		}
	}
}
