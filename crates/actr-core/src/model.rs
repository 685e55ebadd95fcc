//! Model Builder
//!
//! A [`Model`] owns everything one simulated agent needs: parameters, the
//! chunk-type registry, similarities, declarative memories, buffers, rules,
//! user commands and an optional environment. Nothing is global, so any
//! number of models can coexist.
//!
//! Build the model, then turn it into a [`Simulation`] with
//! [`Model::simulation`]. From that point the chunk types are frozen.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::buffer::{Buffer, Module};
use crate::chunk::{Chunk, ChunkTypes, SlotValue};
use crate::config::{ModelConfig, ParamValue};
use crate::environment::Environment;
use crate::error::{ActrError, Result};
use crate::matching::SimilarityTable;
use crate::memory::{DeclarativeMemory, MemoryId};
use crate::motor::MotorModule;
use crate::retrieval::Finst;
use crate::rule::{Production, RuleStore};
use crate::simulation::{Simulation, SimulationOptions};
use crate::vision::VisualModule;

/// Side-effecting command run by `!buffer` actions.
///
/// Receives the buffer content and the action argument; a returned string
/// is emitted as a trace event for that buffer.
pub type Command = Box<dyn FnMut(Option<&Chunk>, &str) -> Option<String>>;

/// An ACT-R model under construction.
pub struct Model {
	pub(crate) config: ModelConfig,
	pub(crate) types: ChunkTypes,
	pub(crate) similarities: SimilarityTable,
	pub(crate) memories: Vec<DeclarativeMemory>,
	pub(crate) buffers: BTreeMap<String, Buffer>,
	pub(crate) rules: RuleStore,
	pub(crate) commands: HashMap<String, Command>,
	pub(crate) environment: Option<Environment>,
}

impl fmt::Debug for Model {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Model")
			.field("config", &self.config)
			.field("memories", &self.memories.len())
			.field("buffers", &self.buffers.keys().collect::<Vec<_>>())
			.field("rules", &self.rules.len())
			.field("commands", &self.commands.keys().collect::<Vec<_>>())
			.finish_non_exhaustive()
	}
}

impl Default for Model {
	fn default() -> Self {
		Self {
			config: ModelConfig::default(),
			types: ChunkTypes::new(),
			similarities: SimilarityTable::new(),
			memories: Vec::new(),
			buffers: BTreeMap::new(),
			rules: RuleStore::new(),
			commands: HashMap::new(),
			environment: None,
		}
	}
}

impl Model {
	/// Model with the given parameters.
	///
	/// # Errors
	///
	/// [`ActrError::Configuration`] if the parameters fail validation.
	pub fn new(config: ModelConfig) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			config,
			..Self::default()
		})
	}

	/// Model parameters.
	#[must_use]
	pub const fn config(&self) -> &ModelConfig {
		&self.config
	}

	/// Change one parameter by name.
	///
	/// # Errors
	///
	/// See [`ModelConfig::set`].
	pub fn set_parameter(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
		self.config.set(name, value)
	}

	// ------------------------------------------------------------------------
	// Chunks
	// ------------------------------------------------------------------------

	/// Declare a chunk type.
	///
	/// # Errors
	///
	/// See [`ChunkTypes::declare`].
	pub fn declare_type<S: AsRef<str>>(&mut self, typename: &str, slots: impl IntoIterator<Item = S>) -> Result<()> {
		self.types.declare(typename, slots)
	}

	/// Build a chunk against the model's type registry.
	///
	/// # Errors
	///
	/// See [`ChunkTypes::make`].
	pub fn chunk<K, V>(&mut self, typename: &str, slots: impl IntoIterator<Item = (K, V)>) -> Result<Chunk>
	where
		K: Into<String>,
		V: Into<SlotValue>,
	{
		self.types.make(typename, slots)
	}

	/// Chunk-type registry.
	#[must_use]
	pub const fn types(&self) -> &ChunkTypes {
		&self.types
	}

	/// Similarity of two values for partial matching.
	pub fn set_similarity(&mut self, a: &str, b: &str, similarity: f64) {
		self.similarities.set(a, b, similarity);
	}

	// ------------------------------------------------------------------------
	// Memories and buffers
	// ------------------------------------------------------------------------

	/// Add an empty declarative memory.
	pub fn add_memory(&mut self) -> MemoryId {
		self.memories.push(DeclarativeMemory::new());
		MemoryId(self.memories.len() - 1)
	}

	/// A declarative memory.
	#[must_use]
	pub fn memory(&self, id: MemoryId) -> Option<&DeclarativeMemory> {
		self.memories.get(id.0)
	}

	/// Mutable access, for seeding.
	pub fn memory_mut(&mut self, id: MemoryId) -> Option<&mut DeclarativeMemory> {
		self.memories.get_mut(id.0)
	}

	/// Goal buffer. `delay` postpones `+name` creations and `*name`
	/// modifications.
	///
	/// # Errors
	///
	/// [`ActrError::Configuration`] for duplicate names, unknown memories or a
	/// negative delay.
	pub fn add_goal(&mut self, name: &str, memory: Option<MemoryId>, delay: f64) -> Result<()> {
		if !delay.is_finite() || delay < 0.0 {
			return Err(ActrError::configuration(format!(
				"goal buffer '{name}' needs a non-negative delay, got {delay}"
			)));
		}
		self.insert_buffer(name, Module::Goal { delay }, memory)
	}

	/// Retrieval buffer searching (and harvesting into) `memory`.
	///
	/// # Errors
	///
	/// [`ActrError::Configuration`] for duplicate names or unknown memories.
	pub fn add_retrieval(&mut self, name: &str, memory: MemoryId) -> Result<()> {
		let module = Module::Retrieval {
			finst: Finst::new(self.config.finst),
			last_activation: None,
		};
		self.insert_buffer(name, module, Some(memory))
	}

	/// Motor buffer.
	///
	/// # Errors
	///
	/// [`ActrError::Configuration`] for duplicate names.
	pub fn add_motor(&mut self, name: &str) -> Result<()> {
		self.insert_buffer(name, Module::Motor(MotorModule::default()), None)
	}

	/// Visual-location buffer.
	///
	/// # Errors
	///
	/// [`ActrError::Configuration`] for duplicate names or unknown memories.
	pub fn add_visual_location(&mut self, name: &str, memory: Option<MemoryId>) -> Result<()> {
		self.insert_buffer(name, Module::VisualLocation, memory)
	}

	/// Visual buffer.
	///
	/// # Errors
	///
	/// [`ActrError::Configuration`] for duplicate names or unknown memories.
	pub fn add_visual(&mut self, name: &str, memory: Option<MemoryId>) -> Result<()> {
		self.insert_buffer(name, Module::Visual(VisualModule::default()), memory)
	}

	/// Plain buffer (imaginal-like).
	///
	/// # Errors
	///
	/// [`ActrError::Configuration`] for duplicate names or unknown memories.
	pub fn add_buffer(&mut self, name: &str, memory: Option<MemoryId>) -> Result<()> {
		self.insert_buffer(name, Module::Generic, memory)
	}

	fn insert_buffer(&mut self, name: &str, module: Module, memory: Option<MemoryId>) -> Result<()> {
		if self.buffers.contains_key(name) {
			return Err(ActrError::configuration(format!("buffer '{name}' already exists")));
		}
		if let Some(id) = memory {
			if id.0 >= self.memories.len() {
				return Err(ActrError::configuration(format!(
					"buffer '{name}' refers to an unknown memory"
				)));
			}
		}
		let _ = self.buffers.insert(name.to_string(), Buffer::new(name, module, memory));
		Ok(())
	}

	/// A buffer.
	#[must_use]
	pub fn buffer(&self, name: &str) -> Option<&Buffer> {
		self.buffers.get(name)
	}

	/// Place a chunk into a buffer before the run (e.g. the first goal).
	///
	/// # Errors
	///
	/// [`ActrError::Configuration`] for unknown buffers, [`ActrError::Rule`]
	/// for motor buffers or chunks that still hold patterns.
	pub fn set_buffer(&mut self, name: &str, chunk: Chunk) -> Result<()> {
		let buffer = self
			.buffers
			.get_mut(name)
			.ok_or_else(|| ActrError::configuration(format!("unknown buffer '{name}'")))?;
		if matches!(buffer.module(), Module::Motor(_)) {
			return Err(ActrError::rule(format!("motor buffer '{name}' only accepts requests")));
		}
		if chunk.is_pattern() {
			return Err(ActrError::rule(format!("cannot place pattern {chunk} into '{name}'")));
		}
		let _ = buffer.replace(chunk);
		Ok(())
	}

	// ------------------------------------------------------------------------
	// Rules, commands, environment
	// ------------------------------------------------------------------------

	/// Register a production.
	///
	/// # Errors
	///
	/// See [`RuleStore::add`].
	pub fn add_rule(&mut self, rule: Production) -> Result<()> {
		self.rules.add(rule)
	}

	/// Registered productions.
	#[must_use]
	pub const fn rules(&self) -> &RuleStore {
		&self.rules
	}

	/// Register a command for `!buffer` actions.
	pub fn register_command<F>(&mut self, name: &str, command: F)
	where
		F: FnMut(Option<&Chunk>, &str) -> Option<String> + 'static,
	{
		let _ = self.commands.insert(name.to_string(), Box::new(command));
	}

	/// Attach the environment the vision and motor modules interact with.
	pub fn set_environment(&mut self, environment: Environment) {
		self.environment = Some(environment);
	}

	/// Freeze the model and start a simulation.
	///
	/// # Errors
	///
	/// [`ActrError::Configuration`] if the parameters are invalid or a rule
	/// acts on a buffer the model does not have.
	pub fn simulation(mut self, options: SimulationOptions) -> Result<Simulation> {
		self.config.validate()?;
		for rule in self.rules.iter() {
			if let Some(action) = rule
				.actions
				.iter()
				.find(|action| !self.buffers.contains_key(action.buffer()))
			{
				return Err(ActrError::configuration(format!(
					"rule '{}' acts on unknown buffer '{}'",
					rule.name,
					action.buffer()
				)));
			}
		}
		self.types.freeze();
		let prepared = self.config.motor_prepared;
		let finst = self.config.finst;
		for buffer in self.buffers.values_mut() {
			match buffer.module_mut() {
				Module::Motor(motor) => *motor = MotorModule::new(prepared),
				Module::Retrieval { finst: window, .. } => *window = Finst::new(finst),
				_ => {}
			}
		}
		Ok(Simulation::new(self, options))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_duplicate_buffer_rejected() {
		let mut model = Model::default();
		model.add_goal("g", None, 0.0).unwrap();
		assert!(model.add_buffer("g", None).unwrap_err().is_configuration());
	}

	#[test]
	fn test_unknown_memory_rejected() {
		let mut model = Model::default();
		let err = model.add_retrieval("retrieval", MemoryId(3)).unwrap_err();
		assert!(err.is_configuration());
	}

	#[test]
	fn test_rule_on_unknown_buffer_rejected_at_start() {
		let mut model = Model::default();
		model.add_goal("g", None, 0.0).unwrap();
		model.add_rule(Production::new("r").clear("imaginal")).unwrap();
		let err = model.simulation(SimulationOptions::default()).unwrap_err();
		assert!(err.is_configuration());
	}

	#[test]
	fn test_motor_buffer_rejects_direct_content() {
		let mut model = Model::default();
		model.add_motor("manual").unwrap();
		let chunk = model.chunk("_manual", [("cmd", "press_key"), ("key", "a")]).unwrap();
		assert!(model.set_buffer("manual", chunk).is_err());
	}

	#[test]
	fn test_types_frozen_after_start() {
		let mut model = Model::default();
		model.add_goal("g", None, 0.0).unwrap();
		let _ = model.chunk("item", [("a", 1)]).unwrap();
		let simulation = model.simulation(SimulationOptions::default()).unwrap();
		assert!(simulation.model().types().is_frozen());
	}

	#[test]
	fn test_set_parameter_validates() {
		let mut model = Model::default();
		model.set_parameter("strict_harvesting", true).unwrap();
		assert!(model.config().strict_harvesting);
		assert!(model.set_parameter("latency_factor", -1.0).is_err());
	}
}
