//! Counting Example
//!
//! The classic first ACT-R model: count from 2 to 4 by retrieving
//! `countOrder` facts from declarative memory.
//!
//! 1. The goal holds where to start and where to stop
//! 2. Each step retrieves the successor of the current count
//! 3. When the count reaches the end the goal is cleared into memory
//!
//! Run with: `cargo run --example counting`
//! More detail: `RUST_LOG=actr_core=debug cargo run --example counting`

use actr_core::{Chunk, Model, Production, SimulationOptions};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("actr_core=info")))
		.init();

	let mut model = Model::default();
	let dm = model.add_memory();
	model.add_goal("g", Some(dm), 0.0)?;
	model.add_retrieval("retrieval", dm)?;
	model.declare_type("countFrom", ["start", "end", "count"])?;

	for i in 1..=5 {
		let fact = model.chunk("countOrder", [("first", i), ("second", i + 1)])?;
		model
			.memory_mut(dm)
			.ok_or_else(|| anyhow::anyhow!("memory vanished"))?
			.add(fact, 0.0)?;
	}
	let goal = model.chunk("countFrom", [("start", 2), ("end", 4)])?;
	model.set_buffer("g", goal)?;

	model.add_rule(
		Production::new("start")
			.test("g", Chunk::unchecked("countFrom", [("start", "=x")]))
			.query("retrieval", [("buffer", "empty"), ("state", "free")])
			.modify("g", [("count", "=x")])
			.request("retrieval", Chunk::unchecked("countOrder", [("first", "=x")])),
	)?;
	model.add_rule(
		Production::new("increment")
			.test("g", Chunk::unchecked("countFrom", [("count", "=x"), ("end", "~=x")]))
			.test("retrieval", Chunk::unchecked("countOrder", [("first", "=x"), ("second", "=y")]))
			.modify("g", [("count", "=y")])
			.request("retrieval", Chunk::unchecked("countOrder", [("first", "=y")]))
			.execute("g", "show", "count"),
	)?;
	model.add_rule(
		Production::new("stop")
			.test("g", Chunk::unchecked("countFrom", [("count", "=x"), ("end", "=x")]))
			.execute("g", "show", "count")
			.clear("g"),
	)?;

	println!("=== Counting from 2 to 4 ===\n");
	let mut simulation = model.simulation(SimulationOptions::default())?;
	for event in simulation.run(Some(1.0))? {
		println!("{event}");
	}

	let memory = simulation.memory(dm).ok_or_else(|| anyhow::anyhow!("memory vanished"))?;
	println!("\n{} chunks in declarative memory", memory.len());
	Ok(())
}
