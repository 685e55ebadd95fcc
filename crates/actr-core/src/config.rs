//! Model Parameters
//!
//! Every knob the simulator recognizes lives in [`ModelConfig`]. Configs can be
//! built in code, loaded from TOML/JSON, or adjusted one parameter at a time
//! with [`ModelConfig::set`]. Unknown parameter names are rejected.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ActrError, Result};

/// How conflict resolution settles equal utilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
	/// The rule examined last wins (rule registration order).
	#[default]
	LastExamined,
	/// The rule examined first wins.
	FirstExamined,
}

/// Configuration for a whole model run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
	/// Enable activations, latencies and utility noise
	pub subsymbolic: bool,
	/// Duration of one rule firing (s)
	pub rule_firing: f64,
	/// `F` in `latency = F·e^(−f·A)`
	pub latency_factor: f64,
	/// `f` in `latency = F·e^(−f·A)`
	pub latency_exponent: f64,
	/// `d` in the base-level equation
	pub decay: f64,
	/// Compute base level from presentation times
	pub baselevel_learning: bool,
	/// Use the closed-form approximation of base-level learning
	pub optimized_learning: bool,
	/// `s` of the logistic activation noise (0 = none)
	pub instantaneous_noise: f64,
	/// `τ` - minimum activation for a successful retrieval
	pub retrieval_threshold: f64,
	/// Source weight `W` per buffer name
	pub buffer_spreading_activation: BTreeMap<String, f64>,
	/// `S` - maximum associative strength
	pub strength_of_association: f64,
	/// Count fan per (slot, value) instead of per value
	pub spreading_activation_restricted: bool,
	/// Only chunk-valued slots act as spreading sources
	pub association_only_from_chunks: bool,
	/// Score mismatching candidates instead of rejecting them
	pub partial_matching: bool,
	/// `P` - scale of similarity penalties
	pub mismatch_penalty: f64,
	/// Log every retrieval candidate's activation breakdown
	pub activation_trace: bool,
	/// `s` of the logistic utility noise (0 = none)
	pub utility_noise: f64,
	/// Learn utilities from rewards
	pub utility_learning: bool,
	/// `α` - utility learning rate
	pub utility_alpha: f64,
	/// Tie-breaking among equal utilities
	pub tie_break: TieBreak,
	/// Motor module starts prepared (first command skips preparation)
	pub motor_prepared: bool,
	/// Motor feature preparation (s)
	pub motor_preparation: f64,
	/// Motor initiation (s)
	pub motor_initiation: f64,
	/// Motor execution until the key registers (s)
	pub motor_execution: f64,
	/// Time until the movement is finished after the key registers (s)
	pub motor_finish: f64,
	/// Time to encode an attended visual object (s)
	pub visual_encoding: f64,
	/// Fill visual-location buffers automatically on stimulus change
	pub automatic_visual_search: bool,
	/// Capacity of the recently-retrieved window (0 = disabled)
	pub finst: usize,
	/// Clear LHS-tested buffers the RHS leaves untouched
	pub strict_harvesting: bool,
	/// Seed for all noise; entropy-seeded when absent
	pub seed: Option<u64>,
}

impl Default for ModelConfig {
	fn default() -> Self {
		Self {
			subsymbolic: false,
			rule_firing: 0.05,
			latency_factor: 0.1,
			latency_exponent: 1.0,
			decay: 0.5,
			baselevel_learning: true,
			optimized_learning: false,
			instantaneous_noise: 0.0,
			retrieval_threshold: 0.0,
			buffer_spreading_activation: BTreeMap::new(),
			strength_of_association: 0.0,
			spreading_activation_restricted: false,
			association_only_from_chunks: false,
			partial_matching: false,
			mismatch_penalty: 1.0,
			activation_trace: false,
			utility_noise: 0.0,
			utility_learning: false,
			utility_alpha: 0.2,
			tie_break: TieBreak::LastExamined,
			motor_prepared: false,
			motor_preparation: 0.25,
			motor_initiation: 0.05,
			motor_execution: 0.1,
			motor_finish: 0.1,
			visual_encoding: 0.085,
			automatic_visual_search: true,
			finst: 0,
			strict_harvesting: false,
			seed: None,
		}
	}
}

/// A single parameter value for [`ModelConfig::set`].
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
	/// Boolean switch
	Bool(bool),
	/// Numeric parameter (durations, weights, rates)
	Number(f64),
	/// Count parameter
	Count(usize),
	/// Buffer → weight map
	Weights(BTreeMap<String, f64>),
	/// Symbolic option (`tie_break`)
	Text(String),
	/// Unset an optional parameter
	None,
}

impl From<bool> for ParamValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<f64> for ParamValue {
	fn from(value: f64) -> Self {
		Self::Number(value)
	}
}

impl From<usize> for ParamValue {
	fn from(value: usize) -> Self {
		Self::Count(value)
	}
}

impl From<&str> for ParamValue {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}

fn wrong_type(name: &str, expected: &str) -> ActrError {
	ActrError::configuration(format!("parameter '{name}' expects {expected}"))
}

impl ModelConfig {
	/// Parse a config from TOML text.
	///
	/// # Errors
	///
	/// Returns [`ActrError::Parse`] on malformed input or unknown parameters,
	/// and [`ActrError::Configuration`] if validation fails.
	pub fn from_toml_str(text: &str) -> Result<Self> {
		let config: Self = toml::from_str(text).map_err(|e| ActrError::Parse(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	/// Parse a config from JSON text.
	///
	/// # Errors
	///
	/// Returns [`ActrError::Parse`] on malformed input or unknown parameters,
	/// and [`ActrError::Configuration`] if validation fails.
	pub fn from_json_str(text: &str) -> Result<Self> {
		let config: Self =
			serde_json::from_str(text).map_err(|e| ActrError::Parse(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	/// Load configuration from a `.toml` or `.json` file.
	///
	/// # Errors
	///
	/// Fails on I/O errors, unsupported extensions, and anything
	/// [`Self::from_toml_str`] / [`Self::from_json_str`] rejects.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let content = std::fs::read_to_string(path.as_ref())?;
		match path.as_ref().extension().and_then(|e| e.to_str()) {
			Some("toml") => Self::from_toml_str(&content),
			Some("json") => Self::from_json_str(&content),
			_ => Err(ActrError::configuration(
				"Unsupported config file format. Use .toml or .json",
			)),
		}
	}

	/// Set one parameter by name.
	///
	/// # Errors
	///
	/// Returns [`ActrError::Configuration`] for unknown names, values of the
	/// wrong kind, or values that fail validation.
	pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
		let mut next = self.clone();
		next.apply(name, value.into())?;
		next.validate()?;
		*self = next;
		Ok(())
	}

	fn apply(&mut self, name: &str, value: ParamValue) -> Result<()> {
		match name {
			"subsymbolic" => self.subsymbolic = expect_bool(name, &value)?,
			"baselevel_learning" => self.baselevel_learning = expect_bool(name, &value)?,
			"optimized_learning" => self.optimized_learning = expect_bool(name, &value)?,
			"spreading_activation_restricted" => {
				self.spreading_activation_restricted = expect_bool(name, &value)?;
			}
			"association_only_from_chunks" => {
				self.association_only_from_chunks = expect_bool(name, &value)?;
			}
			"partial_matching" => self.partial_matching = expect_bool(name, &value)?,
			"activation_trace" => self.activation_trace = expect_bool(name, &value)?,
			"utility_learning" => self.utility_learning = expect_bool(name, &value)?,
			"motor_prepared" => self.motor_prepared = expect_bool(name, &value)?,
			"automatic_visual_search" => {
				self.automatic_visual_search = expect_bool(name, &value)?;
			}
			"strict_harvesting" => self.strict_harvesting = expect_bool(name, &value)?,
			"rule_firing" => self.rule_firing = expect_number(name, &value)?,
			"latency_factor" => self.latency_factor = expect_number(name, &value)?,
			"latency_exponent" => self.latency_exponent = expect_number(name, &value)?,
			"decay" => self.decay = expect_number(name, &value)?,
			"instantaneous_noise" => self.instantaneous_noise = expect_number(name, &value)?,
			"retrieval_threshold" => self.retrieval_threshold = expect_number(name, &value)?,
			"strength_of_association" => {
				self.strength_of_association = expect_number(name, &value)?;
			}
			"mismatch_penalty" => self.mismatch_penalty = expect_number(name, &value)?,
			"utility_noise" => self.utility_noise = expect_number(name, &value)?,
			"utility_alpha" => self.utility_alpha = expect_number(name, &value)?,
			"motor_preparation" => self.motor_preparation = expect_number(name, &value)?,
			"motor_initiation" => self.motor_initiation = expect_number(name, &value)?,
			"motor_execution" => self.motor_execution = expect_number(name, &value)?,
			"motor_finish" => self.motor_finish = expect_number(name, &value)?,
			"visual_encoding" => self.visual_encoding = expect_number(name, &value)?,
			"finst" => {
				self.finst = match value {
					ParamValue::Count(n) => n,
					_ => return Err(wrong_type(name, "a count")),
				};
			}
			"buffer_spreading_activation" => {
				self.buffer_spreading_activation = match value {
					ParamValue::Weights(weights) => weights,
					_ => return Err(wrong_type(name, "a buffer → weight map")),
				};
			}
			"tie_break" => {
				self.tie_break = match &value {
					ParamValue::Text(t) if t == "last_examined" => TieBreak::LastExamined,
					ParamValue::Text(t) if t == "first_examined" => TieBreak::FirstExamined,
					_ => return Err(wrong_type(name, "'last_examined' or 'first_examined'")),
				};
			}
			"seed" => {
				self.seed = match value {
					ParamValue::Count(n) => Some(n as u64),
					ParamValue::None => None,
					_ => return Err(wrong_type(name, "a count or none")),
				};
			}
			_ => {
				return Err(ActrError::configuration(format!(
					"unknown model parameter '{name}'"
				)))
			}
		}
		Ok(())
	}

	/// Check parameter ranges.
	///
	/// # Errors
	///
	/// Returns [`ActrError::Configuration`] naming the first bad parameter.
	pub fn validate(&self) -> Result<()> {
		let durations = [
			("rule_firing", self.rule_firing),
			("motor_preparation", self.motor_preparation),
			("motor_initiation", self.motor_initiation),
			("motor_execution", self.motor_execution),
			("motor_finish", self.motor_finish),
			("visual_encoding", self.visual_encoding),
			("latency_factor", self.latency_factor),
			("instantaneous_noise", self.instantaneous_noise),
			("utility_noise", self.utility_noise),
			("decay", self.decay),
		];
		for (name, value) in durations {
			if !value.is_finite() || value < 0.0 {
				return Err(ActrError::configuration(format!(
					"parameter '{name}' must be a non-negative number, got {value}"
				)));
			}
		}
		if self.optimized_learning && self.decay >= 1.0 {
			return Err(ActrError::configuration(
				"optimized_learning requires decay < 1",
			));
		}
		if let Some((buffer, weight)) = self
			.buffer_spreading_activation
			.iter()
			.find(|(_, w)| !w.is_finite())
		{
			return Err(ActrError::configuration(format!(
				"spreading weight for buffer '{buffer}' must be finite, got {weight}"
			)));
		}
		Ok(())
	}
}

fn expect_bool(name: &str, value: &ParamValue) -> Result<bool> {
	match value {
		ParamValue::Bool(b) => Ok(*b),
		_ => Err(wrong_type(name, "a boolean")),
	}
}

fn expect_number(name: &str, value: &ParamValue) -> Result<f64> {
	match value {
		ParamValue::Number(n) => Ok(*n),
		#[allow(clippy::cast_precision_loss)]
		ParamValue::Count(n) => Ok(*n as f64),
		_ => Err(wrong_type(name, "a number")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_match_reference_constants() {
		let config = ModelConfig::default();
		assert_eq!(config.rule_firing, 0.05);
		assert_eq!(config.motor_preparation, 0.25);
		assert_eq!(config.motor_initiation, 0.05);
		assert_eq!(config.motor_execution, 0.1);
		assert_eq!(config.motor_finish, 0.1);
		assert!(!config.subsymbolic);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_toml_overrides_and_defaults() {
		let config = ModelConfig::from_toml_str(
			r#"
			subsymbolic = true
			retrieval_threshold = -2.0
			tie_break = "first_examined"

			[buffer_spreading_activation]
			g = 1.0
			"#,
		)
		.unwrap();
		assert!(config.subsymbolic);
		assert_eq!(config.retrieval_threshold, -2.0);
		assert_eq!(config.tie_break, TieBreak::FirstExamined);
		assert_eq!(config.buffer_spreading_activation.get("g"), Some(&1.0));
		assert_eq!(config.decay, 0.5);
	}

	#[test]
	fn test_unknown_parameter_rejected() {
		let err = ModelConfig::from_toml_str("rule_fring = 0.1").unwrap_err();
		assert!(err.is_configuration());

		let mut config = ModelConfig::default();
		let err = config.set("no_such_param", true).unwrap_err();
		assert!(matches!(err, ActrError::Configuration(_)));
	}

	#[test]
	fn test_json_config() {
		let config = ModelConfig::from_json_str(r#"{"utility_learning": true, "finst": 3}"#).unwrap();
		assert!(config.utility_learning);
		assert_eq!(config.finst, 3);
	}

	#[test]
	fn test_set_checks_types_and_ranges() {
		let mut config = ModelConfig::default();
		config.set("decay", 0.3).unwrap();
		assert_eq!(config.decay, 0.3);

		assert!(config.set("decay", true).is_err());
		assert!(config.set("rule_firing", -0.01).is_err());
		assert_eq!(config.rule_firing, 0.05);
		assert!(config.set("tie_break", "random").is_err());

		config.set("seed", 7_usize).unwrap();
		assert_eq!(config.seed, Some(7));
	}

	#[test]
	fn test_optimized_learning_requires_decay_below_one() {
		let mut config = ModelConfig {
			optimized_learning: true,
			..Default::default()
		};
		assert!(config.set("decay", 1.0).is_err());
	}
}
