//! Simulation
//!
//! Drives a frozen [`Model`] through simulated time. Every step yields one
//! [`Event`], the `(time, process, label)` triple that makes up the trace.
//!
//! Processes:
//!
//! | name          | drives                                       |
//! |---------------|----------------------------------------------|
//! | `PROCEDURAL`  | conflict resolution and rule firing          |
//! | buffer name   | retrieval, motor, vision, delayed goal work  |
//! | `env`         | the stimulus sequence                        |
//!
//! After any non-procedural step the procedural process is woken if it
//! was idle, so a finished retrieval or a new stimulus starts a new cycle
//! at the same instant. Events produced by one step (a rule firing emits
//! several) are handed out one by one before the clock moves on.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::buffer::{Buffer, BufferKind, BufferState, Module};
use crate::chunk::{Chunk, SlotValue, EMPTY};
use crate::environment::{Environment, ENVIRONMENT_PROCESS};
use crate::error::{ActrError, Result};
use crate::matching::Bindings;
use crate::memory::{DeclarativeMemory, MemoryId};
use crate::model::Model;
use crate::motor::{MotorModule, MotorPhase};
use crate::procedural::{learn_utilities, matching_rules, select, ProceduralState, PROCEDURAL};
use crate::retrieval::{retrieve, split_request, RetrievalContext, RetrievalOutcome};
use crate::rule::{Action, Production, RuleStore};
use crate::scheduler::{Scheduler, Wake};
use crate::spreading::collect_sources;
use crate::vision::{find_location, nearest_location, object_at, VisionPhase, VisualModule};

// ============================================================================
// Events and options
// ============================================================================

/// One line of the trace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
	/// Simulated time (s)
	pub time: f64,
	/// Process that produced the event
	pub process: String,
	/// What happened
	pub label: String,
}

impl Event {
	fn new(time: f64, process: impl Into<String>, label: impl Into<String>) -> Self {
		Self {
			time,
			process: process.into(),
			label: label.into(),
		}
	}
}

impl fmt::Display for Event {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "({:.4}, {}, {})", self.time, self.process, self.label)
	}
}

/// How a simulation is played back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationOptions {
	/// Sleep between events to match simulated time
	pub realtime: bool,
	/// Log every event at `info` level (otherwise `debug`)
	pub trace: bool,
}

// ============================================================================
// Process states
// ============================================================================

#[derive(Clone, Debug)]
enum RetrievalPhase {
	Start { request: Chunk, recently: Option<bool> },
	Finish(RetrievalOutcome),
}

#[derive(Clone, Debug)]
enum GoalPhase {
	Create(Chunk),
	Modify(Chunk),
}

#[derive(Clone, Debug)]
enum Process {
	Procedural(ProceduralState),
	Retrieval(RetrievalPhase),
	Goal(GoalPhase),
	Motor(MotorPhase),
	Vision(VisionPhase),
	Environment(usize),
}

// ============================================================================
// Simulation
// ============================================================================

/// A running model.
pub struct Simulation {
	model: Model,
	scheduler: Scheduler<Process>,
	pending: VecDeque<Event>,
	rng: StdRng,
	options: SimulationOptions,
	last_time: f64,
}

impl fmt::Debug for Simulation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Simulation")
			.field("now", &self.scheduler.now())
			.field("model", &self.model)
			.field("options", &self.options)
			.finish_non_exhaustive()
	}
}

fn unknown_buffer(name: &str) -> ActrError {
	ActrError::configuration(format!("unknown buffer '{name}'"))
}

fn buffer_mut<'a>(buffers: &'a mut std::collections::BTreeMap<String, Buffer>, name: &str) -> Result<&'a mut Buffer> {
	buffers.get_mut(name).ok_or_else(|| unknown_buffer(name))
}

/// Memory receiving `buffer`'s content: its own, or the only one there is.
fn harvest_target(buffer: &Buffer, memories: &[DeclarativeMemory]) -> Result<MemoryId> {
	match (buffer.memory(), memories.len()) {
		(Some(id), _) => Ok(id),
		(None, 1) => Ok(MemoryId(0)),
		(None, n) => Err(ActrError::configuration(format!(
			"buffer '{}' has no memory to clear into ({n} memories, none assigned)",
			buffer.name()
		))),
	}
}

fn display_or_empty(chunk: Option<&Chunk>) -> String {
	chunk.map_or_else(|| EMPTY.to_string(), ToString::to_string)
}

impl Simulation {
	pub(crate) fn new(model: Model, options: SimulationOptions) -> Self {
		let rng = model
			.config
			.seed
			.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
		let mut scheduler = Scheduler::new();
		scheduler.spawn(PROCEDURAL, 0.0, Process::Procedural(ProceduralState::ConflictResolution));
		if let Some(environment) = &model.environment {
			scheduler.spawn(ENVIRONMENT_PROCESS, environment.starts_at(), Process::Environment(0));
		}
		Self {
			model,
			scheduler,
			pending: VecDeque::new(),
			rng,
			options,
			last_time: 0.0,
		}
	}

	/// Current simulated time.
	#[must_use]
	pub const fn now(&self) -> f64 {
		self.scheduler.now()
	}

	/// The model being simulated.
	#[must_use]
	pub const fn model(&self) -> &Model {
		&self.model
	}

	/// A buffer.
	#[must_use]
	pub fn buffer(&self, name: &str) -> Option<&Buffer> {
		self.model.buffers.get(name)
	}

	/// A declarative memory.
	#[must_use]
	pub fn memory(&self, id: MemoryId) -> Option<&DeclarativeMemory> {
		self.model.memories.get(id.0)
	}

	/// Productions with their current utilities.
	#[must_use]
	pub const fn rules(&self) -> &RuleStore {
		&self.model.rules
	}

	/// The environment, if one is attached.
	#[must_use]
	pub const fn environment(&self) -> Option<&Environment> {
		self.model.environment.as_ref()
	}

	/// Time of the next event, if any.
	pub fn next_time(&mut self) -> Option<f64> {
		if self.pending.is_empty() {
			self.scheduler.peek_time()
		} else {
			Some(self.scheduler.now())
		}
	}

	/// Advance to the next event. `Ok(None)` once nothing is left to do.
	///
	/// # Errors
	///
	/// Any model error raised while firing a rule or running a module; the
	/// simulation should not be continued afterwards.
	pub fn step(&mut self) -> Result<Option<Event>> {
		loop {
			if let Some(event) = self.pending.pop_front() {
				self.announce(&event);
				return Ok(Some(event));
			}
			let Some((now, name, process)) = self.scheduler.pop() else {
				return Ok(None);
			};
			let procedural = matches!(process, Process::Procedural(_));
			let wake = self.advance(now, &name, process)?;
			self.scheduler.resume(&name, wake);
			if !procedural {
				let _ = self.scheduler.activate(PROCEDURAL);
			}
		}
	}

	/// Run until nothing is scheduled or the next event lies past
	/// `max_time`. Returns the events in order.
	///
	/// # Errors
	///
	/// See [`Self::step`].
	pub fn run(&mut self, max_time: Option<f64>) -> Result<Vec<Event>> {
		info!(max_time = ?max_time, "simulation started");
		let mut events = Vec::new();
		loop {
			if let (Some(limit), Some(next)) = (max_time, self.next_time()) {
				if next > limit {
					break;
				}
			}
			match self.step()? {
				Some(event) => events.push(event),
				None => break,
			}
		}
		info!(time = self.now(), events = events.len(), "simulation finished");
		Ok(events)
	}

	fn announce(&mut self, event: &Event) {
		if self.options.realtime && event.time > self.last_time {
			std::thread::sleep(Duration::from_secs_f64(event.time - self.last_time));
		}
		self.last_time = event.time;
		if self.options.trace {
			info!(time = event.time, process = %event.process, "{}", event.label);
		} else {
			debug!(time = event.time, process = %event.process, "{}", event.label);
		}
	}

	fn emit(&mut self, time: f64, process: &str, label: impl Into<String>) {
		self.pending.push_back(Event::new(time, process, label));
	}

	fn advance(&mut self, now: f64, name: &str, process: Process) -> Result<Wake<Process>> {
		match process {
			Process::Procedural(state) => self.procedural(now, state),
			Process::Retrieval(phase) => self.retrieval(now, name, phase),
			Process::Goal(phase) => self.goal(now, name, phase),
			Process::Motor(phase) => self.motor(now, name, phase),
			Process::Vision(phase) => self.vision(now, name, phase),
			Process::Environment(index) => Ok(self.environment_step(now, index)),
		}
	}

	// ========================================================================
	// Production cycle
	// ========================================================================

	fn procedural(&mut self, now: f64, state: ProceduralState) -> Result<Wake<Process>> {
		match state {
			ProceduralState::ConflictResolution => {
				self.emit(now, PROCEDURAL, "CONFLICT RESOLUTION");
				Ok(Wake::At(now, Process::Procedural(ProceduralState::Selection)))
			}
			ProceduralState::Selection => {
				let candidates = matching_rules(&self.model.rules, &self.model.buffers);
				let Some((index, bindings)) = select(candidates, &self.model.rules, &self.model.config, &mut self.rng) else {
					self.emit(now, PROCEDURAL, "NO RULE FOUND");
					return Ok(Wake::Parked(Process::Procedural(ProceduralState::ConflictResolution)));
				};
				let config = &self.model.config;
				let rule = self
					.model
					.rules
					.at_mut(index)
					.ok_or_else(|| ActrError::rule(format!("no production at index {index}")))?;
				if config.utility_learning {
					rule.selecting_times.push(now);
				}
				let firing = rule.rule_firing.unwrap_or(config.rule_firing);
				let label = format!("RULE SELECTED: {}", rule.name);
				self.emit(now, PROCEDURAL, label);
				Ok(Wake::At(
					now + firing,
					Process::Procedural(ProceduralState::Fire { rule: index, bindings }),
				))
			}
			ProceduralState::Fire { rule, bindings } => {
				let production = self
					.model
					.rules
					.at(rule)
					.cloned()
					.ok_or_else(|| ActrError::rule(format!("no production at index {rule}")))?;
				self.emit(now, PROCEDURAL, format!("RULE FIRED: {}", production.name));
				self.fire(now, &production, &bindings)?;

				if self.model.config.strict_harvesting {
					let mut untouched: Vec<&str> = production
						.tested_buffers()
						.filter(|buffer| !production.updates(buffer))
						.collect();
					untouched.sort_unstable();
					untouched.dedup();
					for buffer in untouched {
						self.clear(now, buffer)?;
					}
				}
				if let (true, Some(reward)) = (self.model.config.utility_learning, production.reward) {
					learn_utilities(&mut self.model.rules, reward, now, self.model.config.utility_alpha);
				}
				Ok(Wake::At(now, Process::Procedural(ProceduralState::ConflictResolution)))
			}
		}
	}

	fn fire(&mut self, now: f64, production: &Production, bindings: &Bindings) -> Result<()> {
		for action in &production.actions {
			match action {
				Action::Check { buffer, probes } => {
					let target = self.model.buffers.get(buffer).ok_or_else(|| unknown_buffer(buffer))?;
					if !probes.iter().all(|(probe, expected)| target.query(probe, expected)) {
						debug!(rule = %production.name, buffer = %buffer, "right-hand check failed, skipping remaining actions");
						break;
					}
				}
				Action::Execute {
					buffer,
					command,
					argument,
				} => self.execute(now, buffer, command, argument)?,
				Action::Modify { buffer, overrides } => {
					let modified = self.modified(buffer, overrides, bindings)?;
					let _ = buffer_mut(&mut self.model.buffers, buffer)?.replace(modified);
					self.emit(now, buffer, "MODIFIED");
				}
				Action::Overwrite { buffer, chunk } => self.overwrite(now, buffer, chunk, bindings)?,
				Action::DelayedModify { buffer, overrides } => {
					let Module::Goal { delay } = *self
						.model
						.buffers
						.get(buffer)
						.ok_or_else(|| unknown_buffer(buffer))?
						.module()
					else {
						return Err(ActrError::rule(format!(
							"delayed modification needs a goal buffer, '{buffer}' is not one"
						)));
					};
					let modified = self.modified(buffer, overrides, bindings)?;
					if delay > 0.0 {
						self.scheduler
							.spawn(buffer.as_str(), now + delay, Process::Goal(GoalPhase::Modify(modified)));
					} else {
						let _ = buffer_mut(&mut self.model.buffers, buffer)?.replace(modified);
						self.emit(now, buffer, "MODIFIED");
					}
				}
				Action::Request { buffer, chunk } => self.request(now, buffer, chunk, bindings)?,
				Action::Clear { buffer } => self.clear(now, buffer)?,
			}
		}
		Ok(())
	}

	/// Content of `name` with `overrides` applied.
	fn modified(&mut self, name: &str, overrides: &[(String, SlotValue)], bindings: &Bindings) -> Result<Chunk> {
		let buffer = self.model.buffers.get(name).ok_or_else(|| unknown_buffer(name))?;
		if buffer.kind() == BufferKind::Motor {
			return Err(ActrError::rule(format!("motor buffer '{name}' cannot be modified")));
		}
		let content = buffer
			.content()
			.ok_or_else(|| ActrError::rule(format!("cannot modify empty buffer '{name}'")))?;
		content.modify(
			overrides.iter().map(|(slot, value)| (slot.as_str(), value)),
			bindings,
			&mut self.model.types,
		)
	}

	fn overwrite(&mut self, now: f64, name: &str, chunk: &Chunk, bindings: &Bindings) -> Result<()> {
		let resolved = chunk.resolve(bindings)?;
		self.model
			.types
			.declare(resolved.typename(), resolved.slots().map(|(slot, _)| slot))?;
		let buffer = buffer_mut(&mut self.model.buffers, name)?;
		if buffer.kind() == BufferKind::Motor {
			return Err(ActrError::rule(format!("motor buffer '{name}' cannot be overwritten")));
		}
		let _ = buffer.replace(resolved);
		self.emit(now, name, "OVERWRITTEN");
		Ok(())
	}

	fn execute(&mut self, now: f64, name: &str, command: &str, argument: &str) -> Result<()> {
		let buffer = self.model.buffers.get(name).ok_or_else(|| unknown_buffer(name))?;
		let label = if command == "show" {
			let value = buffer
				.content()
				.map_or_else(|| EMPTY.to_string(), |chunk| chunk.get(argument).to_string());
			Some(format!("SHOW: {value}"))
		} else if let Some(run) = self.model.commands.get_mut(command) {
			run(buffer.content(), argument)
		} else {
			warn!(command, buffer = name, "unknown command, skipped");
			None
		};
		if let Some(label) = label {
			self.emit(now, name, label);
		}
		Ok(())
	}

	// ========================================================================
	// Buffer requests
	// ========================================================================

	/// Harvest the content of `name` into memory and emit `CLEARED`.
	fn clear(&mut self, now: f64, name: &str) -> Result<()> {
		self.harvest(now, name)?;
		self.emit(now, name, "CLEARED");
		Ok(())
	}

	/// Move the content of `name` (if any) into its memory. Returns whether
	/// something was harvested.
	fn harvest(&mut self, now: f64, name: &str) -> Result<bool> {
		let buffer = buffer_mut(&mut self.model.buffers, name)?;
		if buffer.is_empty() {
			return Ok(false);
		}
		let target = harvest_target(buffer, &self.model.memories)?;
		let memory = self
			.model
			.memories
			.get_mut(target.0)
			.ok_or_else(|| ActrError::configuration(format!("buffer '{name}' refers to an unknown memory")))?;
		if let Some(chunk) = buffer.take() {
			memory.add(chunk, now)?;
		}
		Ok(true)
	}

	/// Empty a buffer before a request, emitting `CLEARED` only if it held
	/// something.
	fn harvest_for_request(&mut self, now: f64, name: &str) -> Result<()> {
		if self.harvest(now, name)? {
			self.emit(now, name, "CLEARED");
		}
		Ok(())
	}

	fn create(&mut self, now: f64, name: &str, chunk: Chunk) -> Result<()> {
		self.harvest_for_request(now, name)?;
		let label = format!("CREATED A CHUNK: {chunk}");
		let buffer = buffer_mut(&mut self.model.buffers, name)?;
		let _ = buffer.replace(chunk);
		buffer.set_state(BufferState::Free);
		self.emit(now, name, label);
		Ok(())
	}

	fn request(&mut self, now: f64, name: &str, chunk: &Chunk, bindings: &Bindings) -> Result<()> {
		let buffer = self.model.buffers.get(name).ok_or_else(|| unknown_buffer(name))?;
		match buffer.module() {
			Module::Goal { delay } => {
				let delay = *delay;
				let created = self.resolve_new_chunk(chunk, bindings)?;
				if delay > 0.0 {
					self.scheduler.spawn(name, now + delay, Process::Goal(GoalPhase::Create(created)));
					Ok(())
				} else {
					self.create(now, name, created)
				}
			}
			Module::Generic => {
				let created = self.resolve_new_chunk(chunk, bindings)?;
				self.create(now, name, created)
			}
			Module::Retrieval { .. } => {
				let (request, recently) = split_request(&chunk.resolve_request(bindings)?)?;
				self.harvest_for_request(now, name)?;
				buffer_mut(&mut self.model.buffers, name)?.set_state(BufferState::Busy);
				self.scheduler
					.spawn(name, now, Process::Retrieval(RetrievalPhase::Start { request, recently }));
				Ok(())
			}
			Module::Motor(motor) => {
				let key = MotorModule::parse_command(&chunk.resolve(bindings)?)?;
				let jammed = motor.is_busy();
				let buffer = buffer_mut(&mut self.model.buffers, name)?;
				if jammed {
					warn!(buffer = name, key = %key, "motor module busy, running command cancelled");
				}
				let held = match buffer.module_mut() {
					Module::Motor(motor) => motor.interrupt(),
					_ => None,
				};
				buffer.set_state(BufferState::Busy);
				if let (Some(held), Some(environment)) = (held, self.model.environment.as_mut()) {
					environment.release(&held);
				}
				self.scheduler.spawn(name, now, Process::Motor(MotorPhase::Command { key }));
				Ok(())
			}
			Module::VisualLocation => {
				let request = chunk.resolve_request(bindings)?;
				self.harvest_for_request(now, name)?;
				buffer_mut(&mut self.model.buffers, name)?.set_state(BufferState::Busy);
				self.scheduler.spawn(name, now, Process::Vision(VisionPhase::Find(request)));
				Ok(())
			}
			Module::Visual(_) => {
				let location = VisualModule::parse_command(&chunk.resolve_request(bindings)?)?;
				self.harvest_for_request(now, name)?;
				buffer_mut(&mut self.model.buffers, name)?.set_state(BufferState::Busy);
				let encoding = self.model.config.visual_encoding;
				self.scheduler
					.spawn(name, now + encoding, Process::Vision(VisionPhase::Encode(location)));
				Ok(())
			}
		}
	}

	fn resolve_new_chunk(&mut self, chunk: &Chunk, bindings: &Bindings) -> Result<Chunk> {
		let resolved = chunk.resolve(bindings)?;
		self.model
			.types
			.declare(resolved.typename(), resolved.slots().map(|(slot, _)| slot))?;
		Ok(resolved)
	}

	// ========================================================================
	// Module processes
	// ========================================================================

	fn retrieval(&mut self, now: f64, name: &str, phase: RetrievalPhase) -> Result<Wake<Process>> {
		match phase {
			RetrievalPhase::Start { request, recently } => {
				self.emit(now, name, "START RETRIEVAL");
				let config = &self.model.config;
				let sources = collect_sources(
					self.model
						.buffers
						.iter()
						.map(|(buffer_name, buffer)| (buffer_name.as_str(), buffer.content())),
					name,
					&config.buffer_spreading_activation,
					config.association_only_from_chunks,
				);
				let buffer = buffer_mut(&mut self.model.buffers, name)?;
				let memory = harvest_target(buffer, &self.model.memories)
					.ok()
					.and_then(|id| self.model.memories.get(id.0))
					.ok_or_else(|| ActrError::configuration(format!("retrieval buffer '{name}' has no memory")))?;
				let Module::Retrieval { finst, .. } = buffer.module_mut() else {
					return Err(ActrError::configuration(format!("'{name}' is not a retrieval buffer")));
				};
				let ctx = RetrievalContext {
					now,
					config,
					similarities: &self.model.similarities,
					sources: &sources,
				};
				let outcome = retrieve(memory, &request, recently, finst, &ctx, &mut self.rng)?;
				Ok(Wake::At(
					now + outcome.latency,
					Process::Retrieval(RetrievalPhase::Finish(outcome)),
				))
			}
			RetrievalPhase::Finish(outcome) => {
				let label = format!("RETRIEVED: {}", display_or_empty(outcome.chunk.as_ref()));
				let buffer = buffer_mut(&mut self.model.buffers, name)?;
				match outcome.chunk {
					Some(chunk) => {
						let _ = buffer.replace(chunk);
						buffer.set_state(BufferState::Free);
					}
					None => buffer.set_state(BufferState::Error),
				}
				if let Module::Retrieval { last_activation, .. } = buffer.module_mut() {
					*last_activation = outcome.activation;
				}
				self.emit(now, name, label);
				Ok(Wake::Done)
			}
		}
	}

	fn goal(&mut self, now: f64, name: &str, phase: GoalPhase) -> Result<Wake<Process>> {
		match phase {
			GoalPhase::Create(chunk) => self.create(now, name, chunk)?,
			GoalPhase::Modify(chunk) => {
				let _ = buffer_mut(&mut self.model.buffers, name)?.replace(chunk);
				self.emit(now, name, "MODIFIED");
			}
		}
		Ok(Wake::Done)
	}

	fn motor(&mut self, now: f64, name: &str, phase: MotorPhase) -> Result<Wake<Process>> {
		let buffer = buffer_mut(&mut self.model.buffers, name)?;
		let Module::Motor(motor) = buffer.module_mut() else {
			return Err(ActrError::configuration(format!("'{name}' is not a motor buffer")));
		};
		let step = motor.advance(phase, &self.model.config);
		if step.done {
			buffer.set_state(BufferState::Free);
		}
		self.pending.push_back(Event::new(now, name, step.label));

		if let Some(environment) = self.model.environment.as_mut() {
			if let Some(key) = &step.pressed {
				if environment.press(key) {
					self.scheduler.reschedule(ENVIRONMENT_PROCESS, now);
				}
			}
			if let Some(key) = &step.released {
				environment.release(key);
			}
		}
		Ok(match step.next {
			Some((delay, next)) => Wake::At(now + delay, Process::Motor(next)),
			None => Wake::Done,
		})
	}

	fn vision(&mut self, now: f64, name: &str, phase: VisionPhase) -> Result<Wake<Process>> {
		let stimulus = self
			.model
			.environment
			.as_ref()
			.and_then(Environment::current_stimulus);
		let attended = self.model.buffers.values().find_map(|buffer| match buffer.module() {
			Module::Visual(visual) => visual.attended(),
			_ => None,
		});
		let found = match &phase {
			VisionPhase::Find(request) => stimulus.and_then(|s| find_location(request, s)),
			VisionPhase::AutoBuffer => stimulus.and_then(|s| nearest_location(s, attended)),
			VisionPhase::Encode(location) => stimulus.and_then(|s| object_at(s, location)),
		};

		let buffer = buffer_mut(&mut self.model.buffers, name)?;
		let label = match phase {
			VisionPhase::Find(_) => format!("ENCODED LOCATION: {}", display_or_empty(found.as_ref())),
			VisionPhase::AutoBuffer => {
				let Some(location) = &found else {
					return Ok(Wake::Done);
				};
				if !buffer.is_empty() {
					return Ok(Wake::Done);
				}
				format!("AUTOMATIC BUFFERING: {location}")
			}
			VisionPhase::Encode(location) => {
				if found.is_some() {
					if let Module::Visual(visual) = buffer.module_mut() {
						visual.attend(location);
					}
				}
				format!("ENCODED VIS OBJECT: {}", display_or_empty(found.as_ref()))
			}
		};
		match found {
			Some(chunk) => {
				let _ = buffer.replace(chunk);
				buffer.set_state(BufferState::Free);
			}
			None => buffer.set_state(BufferState::Error),
		}
		self.emit(now, name, label);
		Ok(Wake::Done)
	}

	fn environment_step(&mut self, now: f64, index: usize) -> Wake<Process> {
		let Some(environment) = self.model.environment.as_mut() else {
			return Wake::Done;
		};
		let Some(duration) = environment.show(index) else {
			self.emit(now, ENVIRONMENT_PROCESS, "FINISHED");
			return Wake::Done;
		};
		self.emit(now, ENVIRONMENT_PROCESS, "PRINTED NEW STIMULUS");

		let automatic = self.model.config.automatic_visual_search;
		let encoding = self.model.config.visual_encoding;
		// a pending request outranks refreshing what is on screen
		let mut refresh = Vec::new();
		for (name, buffer) in self
			.model
			.buffers
			.iter()
			.filter(|(_, buffer)| buffer.state() != BufferState::Busy)
		{
			match buffer.module() {
				Module::VisualLocation if automatic && buffer.is_empty() => {
					refresh.push((name.clone(), now, VisionPhase::AutoBuffer));
				}
				Module::Visual(visual) => {
					if let Some(location) = visual.attended() {
						refresh.push((name.clone(), now + encoding, VisionPhase::Encode(location.clone())));
					}
				}
				_ => {}
			}
		}
		for (name, at, phase) in refresh {
			self.scheduler.spawn(name, at, Process::Vision(phase));
		}

		let next = Process::Environment(index + 1);
		match duration {
			Some(seconds) => Wake::At(now + seconds, next),
			None => Wake::Parked(next),
		}
	}
}
