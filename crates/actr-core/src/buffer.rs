//! Buffers
//!
//! Single-chunk working-memory registers. Each buffer carries a state flag
//! (`free`, `busy`, `error`), an optional declarative memory that receives
//! its content when cleared, and the data of the module behind it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::memory::MemoryId;
use crate::motor::MotorModule;
use crate::retrieval::Finst;
use crate::vision::VisualModule;

/// Capability tag of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferKind {
	/// Holds the current goal; requests create chunks directly
	Goal,
	/// Requests search declarative memory
	Retrieval,
	/// Requests issue motor commands; content is never set directly
	Motor,
	/// Requests search the locations on screen
	VisualLocation,
	/// Requests move attention and encode objects
	Visual,
	/// Plain register (imaginal-like); requests create chunks directly
	Generic,
}

impl fmt::Display for BufferKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Goal => "goal",
			Self::Retrieval => "retrieval",
			Self::Motor => "motor",
			Self::VisualLocation => "visual location",
			Self::Visual => "visual",
			Self::Generic => "generic",
		};
		f.write_str(name)
	}
}

/// Buffer state probed by `?buf state ...`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferState {
	/// Idle
	#[default]
	Free,
	/// A request is being processed
	Busy,
	/// The last request failed
	Error,
}

impl BufferState {
	/// Query text of the state.
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Free => "free",
			Self::Busy => "busy",
			Self::Error => "error",
		}
	}
}

impl fmt::Display for BufferState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Module data behind a buffer.
#[derive(Clone, Debug)]
pub enum Module {
	/// Goal buffer with a creation/modification delay (s)
	Goal {
		/// Delay of `+goal` and `*goal`
		delay: f64,
	},
	/// Declarative retrieval
	Retrieval {
		/// Recently retrieved window
		finst: Finst,
		/// Activation of the last retrieved chunk
		last_activation: Option<f64>,
	},
	/// Motor module
	Motor(MotorModule),
	/// Visual-location search
	VisualLocation,
	/// Visual attention
	Visual(VisualModule),
	/// Plain register
	Generic,
}

/// A working-memory buffer.
#[derive(Clone, Debug)]
pub struct Buffer {
	name: String,
	content: Option<Chunk>,
	state: BufferState,
	memory: Option<MemoryId>,
	module: Module,
}

impl Buffer {
	/// Empty, free buffer.
	pub fn new(name: impl Into<String>, module: Module, memory: Option<MemoryId>) -> Self {
		Self {
			name: name.into(),
			content: None,
			state: BufferState::Free,
			memory,
			module,
		}
	}

	/// Buffer name.
	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Capability tag.
	#[must_use]
	pub const fn kind(&self) -> BufferKind {
		match self.module {
			Module::Goal { .. } => BufferKind::Goal,
			Module::Retrieval { .. } => BufferKind::Retrieval,
			Module::Motor(_) => BufferKind::Motor,
			Module::VisualLocation => BufferKind::VisualLocation,
			Module::Visual(_) => BufferKind::Visual,
			Module::Generic => BufferKind::Generic,
		}
	}

	/// Current chunk.
	#[must_use]
	pub const fn content(&self) -> Option<&Chunk> {
		self.content.as_ref()
	}

	/// Whether the buffer holds nothing.
	#[must_use]
	pub const fn is_empty(&self) -> bool {
		self.content.is_none()
	}

	/// Current state.
	#[must_use]
	pub const fn state(&self) -> BufferState {
		self.state
	}

	/// Memory that receives the content on clear.
	#[must_use]
	pub const fn memory(&self) -> Option<MemoryId> {
		self.memory
	}

	/// Module data.
	#[must_use]
	pub const fn module(&self) -> &Module {
		&self.module
	}

	pub(crate) fn module_mut(&mut self) -> &mut Module {
		&mut self.module
	}

	/// Motor data, for motor buffers.
	#[must_use]
	pub const fn motor(&self) -> Option<&MotorModule> {
		match &self.module {
			Module::Motor(motor) => Some(motor),
			_ => None,
		}
	}

	/// Activation of the last retrieved chunk, for retrieval buffers.
	#[must_use]
	pub const fn last_activation(&self) -> Option<f64> {
		match self.module {
			Module::Retrieval { last_activation, .. } => last_activation,
			_ => None,
		}
	}

	pub(crate) fn set_state(&mut self, state: BufferState) {
		self.state = state;
	}

	/// Place a chunk, returning the previous content for harvesting.
	pub(crate) fn replace(&mut self, chunk: Chunk) -> Option<Chunk> {
		self.content.replace(chunk)
	}

	pub(crate) fn take(&mut self) -> Option<Chunk> {
		self.content.take()
	}

	/// Evaluate one state probe.
	///
	/// Unknown probes are false, never an error: a rule testing something a
	/// buffer does not have simply does not match.
	#[must_use]
	pub fn query(&self, probe: &str, expected: &str) -> bool {
		match probe {
			"buffer" => match expected {
				"full" => self.content.is_some(),
				"empty" => self.content.is_none(),
				_ => false,
			},
			"state" => self.state.as_str() == expected,
			_ => match &self.module {
				Module::Motor(motor) => motor.query(probe, expected),
				Module::Visual(visual) => visual.query(probe, expected),
				_ => false,
			},
		}
	}
}
