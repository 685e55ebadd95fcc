//! Motor Module
//!
//! Staged key presses:
//!
//! ```text
//! COMMAND ─prep─▶ PREPARATION COMPLETE ─init─▶ INITIATION COMPLETE
//!         ─exec─▶ KEY PRESSED ─finish─▶ MOVEMENT FINISHED
//! ```
//!
//! Preparation is skipped when the same key was the last one pressed. The
//! buffer is busy from the command until the movement finishes; the key is
//! visible to the environment between KEY PRESSED and MOVEMENT FINISHED.

use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, MANUAL_TYPE};
use crate::config::ModelConfig;
use crate::error::{ActrError, Result};

/// The only motor command.
pub const PRESS_KEY: &str = "press_key";

/// Sub-states of the motor module.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorModule {
	preparation_busy: bool,
	processor_busy: bool,
	execution_busy: bool,
	last_key: Option<String>,
	held: Option<String>,
	last_command: Option<String>,
	prepared: bool,
}

/// Stage a motor process resumes in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MotorPhase {
	/// Command issued
	Command {
		/// Key to press
		key: String,
	},
	/// Features prepared
	Prepared {
		/// Key to press
		key: String,
	},
	/// Movement initiated
	Initiated {
		/// Key to press
		key: String,
	},
	/// Key registered by the environment
	Pressed {
		/// Key pressed
		key: String,
	},
	/// Finger back in place
	Finished {
		/// Key released
		key: String,
	},
}

/// Result of advancing a motor process by one stage.
#[derive(Clone, Debug, PartialEq)]
pub struct MotorStep {
	/// Trace label
	pub label: String,
	/// Delay and stage to continue with
	pub next: Option<(f64, MotorPhase)>,
	/// Key that became pressed
	pub pressed: Option<String>,
	/// Key that was released
	pub released: Option<String>,
	/// Whether the whole movement is over
	pub done: bool,
}

impl MotorModule {
	/// Module whose first command skips preparation when `prepared` is set.
	#[must_use]
	pub fn new(prepared: bool) -> Self {
		Self {
			prepared,
			..Self::default()
		}
	}

	/// Whether any stage is running.
	#[must_use]
	pub const fn is_busy(&self) -> bool {
		self.preparation_busy || self.processor_busy || self.execution_busy
	}

	/// Key most recently pressed.
	#[must_use]
	pub fn last_key(&self) -> Option<&str> {
		self.last_key.as_deref()
	}

	/// Evaluate a motor probe (`preparation`, `processor`, `execution`,
	/// `last_command`).
	#[must_use]
	pub fn query(&self, probe: &str, expected: &str) -> bool {
		let busy = match probe {
			"preparation" => self.preparation_busy,
			"processor" => self.processor_busy,
			"execution" => self.execution_busy,
			"last_command" => return self.last_command.as_deref() == Some(expected),
			_ => return false,
		};
		expected == if busy { "busy" } else { "free" }
	}

	/// Key of a `_manual` request.
	///
	/// # Errors
	///
	/// [`ActrError::Rule`] for other chunk types, commands other than
	/// `press_key`, or a missing key.
	pub fn parse_command(request: &Chunk) -> Result<String> {
		if request.typename() != MANUAL_TYPE {
			return Err(ActrError::rule(format!(
				"motor requests must be of type {MANUAL_TYPE}, got {request}"
			)));
		}
		let command = request.get("cmd").value().and_then(|v| v.as_atom());
		if command != Some(PRESS_KEY) {
			return Err(ActrError::rule(format!("unsupported motor command in {request}")));
		}
		request
			.get("key")
			.value()
			.and_then(|v| v.as_atom())
			.map(str::to_string)
			.ok_or_else(|| ActrError::rule(format!("motor request without a key: {request}")))
	}

	/// Key between KEY PRESSED and MOVEMENT FINISHED.
	#[must_use]
	pub fn held_key(&self) -> Option<&str> {
		self.held.as_deref()
	}

	/// Reset the stages for a new command (a running one is abandoned).
	/// Returns the key the abandoned movement was still holding down.
	pub(crate) fn interrupt(&mut self) -> Option<String> {
		self.preparation_busy = false;
		self.processor_busy = false;
		self.execution_busy = false;
		self.held.take()
	}

	/// Run one stage of a movement.
	pub(crate) fn advance(&mut self, phase: MotorPhase, config: &ModelConfig) -> MotorStep {
		let step = |label: String, next: Option<(f64, MotorPhase)>| MotorStep {
			label,
			next,
			pressed: None,
			released: None,
			done: false,
		};
		match phase {
			MotorPhase::Command { key } => {
				let skip = self.prepared || self.last_key.as_deref() == Some(key.as_str());
				self.prepared = false;
				self.last_command = Some(PRESS_KEY.to_string());
				self.preparation_busy = true;
				let delay = if skip { 0.0 } else { config.motor_preparation };
				step(format!("COMMAND: {PRESS_KEY}"), Some((delay, MotorPhase::Prepared { key })))
			}
			MotorPhase::Prepared { key } => {
				self.preparation_busy = false;
				self.processor_busy = true;
				step(
					"PREPARATION COMPLETE".into(),
					Some((config.motor_initiation, MotorPhase::Initiated { key })),
				)
			}
			MotorPhase::Initiated { key } => {
				self.processor_busy = false;
				self.execution_busy = true;
				step(
					"INITIATION COMPLETE".into(),
					Some((config.motor_execution, MotorPhase::Pressed { key })),
				)
			}
			MotorPhase::Pressed { key } => {
				self.last_key = Some(key.clone());
				self.held = Some(key.clone());
				MotorStep {
					pressed: Some(key.clone()),
					..step(
						format!("KEY PRESSED: {key}"),
						Some((config.motor_finish, MotorPhase::Finished { key })),
					)
				}
			}
			MotorPhase::Finished { key } => {
				self.execution_busy = false;
				self.held = None;
				MotorStep {
					released: Some(key),
					done: true,
					..step("MOVEMENT FINISHED".into(), None)
				}
			}
		}
	}
}
