//! Key Press Example
//!
//! A model reads letters off the screen and types each one. Typing the
//! letter on screen advances the environment to the next stimulus.
//!
//! - The visual-location buffer is filled automatically
//! - Attention is moved there and the object is encoded
//! - The motor module presses the key that was read
//!
//! Run with: `cargo run --example key_press`

use actr_core::{Chunk, Environment, Model, Production, SimulationOptions, SlotValue, VisualObject};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("actr_core=info")))
		.init();

	let mut model = Model::default();
	model.add_goal("g", None, 0.0)?;
	model.add_visual_location("visual_location", None)?;
	model.add_visual("visual", None)?;
	model.add_motor("manual")?;
	model.declare_type("reading", ["state", "last"])?;
	let goal = model.chunk("reading", [("state", "find")])?;
	model.set_buffer("g", goal)?;

	let letters = ["A", "B", "C"];
	let mut environment = Environment::new();
	for letter in letters {
		environment = environment
			.stimulus([VisualObject::new(letter, 320.0, 180.0)], None)
			.trigger(letter);
	}
	model.set_environment(environment);

	let screen_pos = Chunk::unchecked("_visuallocation", [("screen_x", "=x"), ("screen_y", "=y")]);
	model.add_rule(
		Production::new("attend")
			.test("g", Chunk::unchecked("reading", [("state", "find")]))
			.test("visual_location", screen_pos.clone())
			.query("visual", [("state", "free")])
			.modify("g", [("state", "read")])
			.request(
				"visual",
				Chunk::unchecked(
					"_visual",
					[("cmd", SlotValue::from("move_attention")), ("screen_pos", SlotValue::from(screen_pos))],
				),
			),
	)?;
	model.add_rule(
		Production::new("type")
			.test("g", Chunk::unchecked("reading", [("state", "read")]))
			.test("visual", Chunk::unchecked("_visual", [("value", "=letter")]))
			.query("manual", [("preparation", "free")])
			.modify("g", [("state", "wait"), ("last", "=letter")])
			.request("manual", Chunk::unchecked("_manual", [("cmd", "press_key"), ("key", "=letter")])),
	)?;
	// the visual buffer re-encodes after each screen change
	model.add_rule(
		Production::new("next")
			.test("g", Chunk::unchecked("reading", [("state", "wait"), ("last", "=seen")]))
			.test("visual", Chunk::unchecked("_visual", [("value", "~=seen")]))
			.modify("g", [("state", "read")]),
	)?;

	println!("=== Typing what is on screen ===\n");
	let mut simulation = model.simulation(SimulationOptions::default())?;
	for event in simulation.run(Some(5.0))? {
		println!("{event}");
	}
	Ok(())
}
