//! Environment
//!
//! A scripted screen the model looks at and types into. Stimuli are shown
//! in order, each for a fixed time or until one of the trigger keys is
//! pressed. Keys pressed by the motor module are visible here between
//! `KEY PRESSED` and `MOVEMENT FINISHED`.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// Process name of the environment driver.
pub const ENVIRONMENT_PROCESS: &str = "env";

/// One object on screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisualObject {
	/// Displayed text
	pub text: String,
	/// Horizontal position (px)
	pub x: f64,
	/// Vertical position (px)
	pub y: f64,
	/// Colour, if any
	pub color: Option<String>,
}

impl VisualObject {
	/// Uncoloured object at `(x, y)`.
	pub fn new(text: impl Into<String>, x: f64, y: f64) -> Self {
		Self {
			text: text.into(),
			x,
			y,
			color: None,
		}
	}

	/// Set the colour.
	#[must_use]
	pub fn color(mut self, color: impl Into<String>) -> Self {
		self.color = Some(color.into());
		self
	}
}

/// A screenful of objects.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
	/// Objects shown together
	pub objects: Vec<VisualObject>,
	/// Display time (s); `None` waits for a trigger key
	pub duration: Option<f64>,
}

/// Stimulus sequence plus the keys currently held down.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Environment {
	stimuli: Vec<Stimulus>,
	triggers: HashSet<String>,
	start_time: f64,
	current: Option<usize>,
	pressed: BTreeSet<String>,
}

impl Environment {
	/// Blank environment.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a stimulus.
	#[must_use]
	pub fn stimulus(mut self, objects: impl IntoIterator<Item = VisualObject>, duration: Option<f64>) -> Self {
		self.stimuli.push(Stimulus {
			objects: objects.into_iter().collect(),
			duration,
		});
		self
	}

	/// Make `key` advance to the next stimulus.
	#[must_use]
	pub fn trigger(mut self, key: impl Into<String>) -> Self {
		let _ = self.triggers.insert(key.into());
		self
	}

	/// Time the first stimulus appears.
	#[must_use]
	pub fn start_time(mut self, seconds: f64) -> Self {
		self.start_time = seconds;
		self
	}

	/// When the first stimulus appears.
	#[must_use]
	pub const fn starts_at(&self) -> f64 {
		self.start_time
	}

	/// Stimulus on screen, if any.
	#[must_use]
	pub fn current_stimulus(&self) -> Option<&Stimulus> {
		self.current.and_then(|i| self.stimuli.get(i))
	}

	/// Index of the stimulus on screen.
	#[must_use]
	pub const fn current_index(&self) -> Option<usize> {
		self.current
	}

	/// Keys currently held down.
	pub fn pressed_keys(&self) -> impl Iterator<Item = &str> {
		self.pressed.iter().map(String::as_str)
	}

	/// Whether `key` advances the display.
	#[must_use]
	pub fn is_trigger(&self, key: &str) -> bool {
		self.triggers.contains(key)
	}

	/// Put stimulus `index` on screen. Returns its display time, or `None`
	/// in the outer option once the sequence is exhausted.
	pub(crate) fn show(&mut self, index: usize) -> Option<Option<f64>> {
		match self.stimuli.get(index) {
			Some(stimulus) => {
				self.current = Some(index);
				Some(stimulus.duration)
			}
			None => {
				self.current = None;
				None
			}
		}
	}

	/// Register a key press; returns whether it is a trigger.
	pub(crate) fn press(&mut self, key: &str) -> bool {
		let _ = self.pressed.insert(key.to_string());
		self.is_trigger(key)
	}

	pub(crate) fn release(&mut self, key: &str) {
		let _ = self.pressed.remove(key);
	}
}
