//! Vision
//!
//! Two buffers look at the [`Environment`](crate::environment::Environment):
//!
//! - **visual location** answers "where is something like this?" with a
//!   `_visuallocation` chunk
//! - **visual** moves attention to a location and encodes the object there
//!   as a `_visual` chunk, after `visual_encoding` seconds
//!
//! When the screen changes, an empty visual-location buffer is refilled
//! automatically and an attending visual buffer re-encodes what is now at
//! the attended position. Neither happens while the buffer is busy with a
//! request; the request finishes against the new screen instead.

use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, SlotValue, Value, VISUAL_LOCATION_TYPE, VISUAL_TYPE};
use crate::environment::{Stimulus, VisualObject};
use crate::error::{ActrError, Result};
use crate::matching::Bindings;

/// The only visual command.
pub const MOVE_ATTENTION: &str = "move_attention";

/// Attention state behind a visual buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualModule {
	attended: Option<Chunk>,
}

/// Stage a vision process resumes in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VisionPhase {
	/// Search the screen for a location matching the request
	Find(Chunk),
	/// Fill an empty visual-location buffer after a screen change
	AutoBuffer,
	/// Encode the object at a location
	Encode(Chunk),
}

impl VisualModule {
	/// Location currently attended.
	#[must_use]
	pub const fn attended(&self) -> Option<&Chunk> {
		self.attended.as_ref()
	}

	pub(crate) fn attend(&mut self, location: Chunk) {
		self.attended = Some(location);
	}

	/// Evaluate a visual probe: `attended` is `True` while attention rests
	/// on a location.
	#[must_use]
	pub fn query(&self, probe: &str, expected: &str) -> bool {
		match probe {
			"attended" => expected == if self.attended.is_some() { "True" } else { "False" },
			_ => false,
		}
	}

	/// Location a `move_attention` request points at.
	///
	/// # Errors
	///
	/// [`ActrError::Rule`] for other chunk types or commands, or when
	/// `screen_pos` is not a location chunk.
	pub fn parse_command(request: &Chunk) -> Result<Chunk> {
		if request.typename() != VISUAL_TYPE {
			return Err(ActrError::rule(format!(
				"visual requests must be of type {VISUAL_TYPE}, got {request}"
			)));
		}
		if request.get("cmd").value().and_then(Value::as_atom) != Some(MOVE_ATTENTION) {
			return Err(ActrError::rule(format!("unsupported visual command in {request}")));
		}
		match request.get("screen_pos").value().and_then(Value::as_chunk) {
			Some(location) if location.typename() == VISUAL_LOCATION_TYPE => Ok(location.clone()),
			_ => Err(ActrError::rule(format!(
				"visual request needs a {VISUAL_LOCATION_TYPE} chunk in screen_pos: {request}"
			))),
		}
	}
}

/// `_visuallocation` chunk of an object.
#[must_use]
pub fn location_chunk(object: &VisualObject) -> Chunk {
	Chunk::unchecked(
		VISUAL_LOCATION_TYPE,
		[
			("screen_x", SlotValue::from(object.x)),
			("screen_y", SlotValue::from(object.y)),
			("color", SlotValue::from(object.color.as_deref())),
			("value", SlotValue::Empty),
		],
	)
}

/// Slots of an encoded `_visual` object. The type's `cmd` slot belongs to
/// `move_attention` requests only.
pub const VISUAL_OBJECT_SLOTS: [&str; 3] = ["screen_pos", "value", "color"];

/// `_visual` chunk of an object seen at `location`.
#[must_use]
pub fn object_chunk(object: &VisualObject, location: Chunk) -> Chunk {
	let [screen_pos, value, color] = VISUAL_OBJECT_SLOTS;
	Chunk::unchecked(
		VISUAL_TYPE,
		[
			(screen_pos, SlotValue::from(location)),
			(value, SlotValue::from(object.text.as_str())),
			(color, SlotValue::from(object.color.as_deref())),
		],
	)
}

/// First location on screen matching a resolved request.
#[must_use]
pub fn find_location(request: &Chunk, stimulus: &Stimulus) -> Option<Chunk> {
	stimulus
		.objects
		.iter()
		.map(location_chunk)
		.find(|location| request.matches(location, &mut Bindings::new()))
}

/// Location of the object closest to `from` (first object when `from` is
/// unknown).
#[must_use]
pub fn nearest_location(stimulus: &Stimulus, from: Option<&Chunk>) -> Option<Chunk> {
	let origin = from.and_then(position);
	let object = match origin {
		Some((x, y)) => stimulus
			.objects
			.iter()
			.min_by(|a, b| distance(a, x, y).total_cmp(&distance(b, x, y))),
		None => stimulus.objects.first(),
	};
	object.map(location_chunk)
}

/// Encoded object sitting at `location`, if any.
#[must_use]
pub fn object_at(stimulus: &Stimulus, location: &Chunk) -> Option<Chunk> {
	let (x, y) = position(location)?;
	stimulus
		.objects
		.iter()
		.find(|object| object.x == x && object.y == y)
		.map(|object| object_chunk(object, location_chunk(object)))
}

fn position(location: &Chunk) -> Option<(f64, f64)> {
	let x = location.get("screen_x").value().and_then(Value::as_f64)?;
	let y = location.get("screen_y").value().and_then(Value::as_f64)?;
	Some((x, y))
}

fn distance(object: &VisualObject, x: f64, y: f64) -> f64 {
	(object.x - x).hypot(object.y - y)
}
