//! End-to-end model runs
//!
//! Each test builds a small model, runs it to completion and checks the
//! trace: event times, the process that produced them and their order.

use std::collections::BTreeMap;

use actr_core::{
	BufferState, Chunk, Environment, Event, MemoryId, Model, ModelConfig, Production, SimulationOptions, SlotValue,
	VisualObject, PROCEDURAL,
};

fn triples(events: &[Event]) -> Vec<(f64, &str, &str)> {
	events
		.iter()
		.map(|e| (e.time, e.process.as_str(), e.label.as_str()))
		.collect()
}

fn of<'a>(events: &'a [Event], process: &str) -> Vec<(f64, &'a str)> {
	events
		.iter()
		.filter(|e| e.process == process)
		.map(|e| (e.time, e.label.as_str()))
		.collect()
}

fn find<'a>(events: &'a [Event], process: &str, label_prefix: &str) -> Option<&'a Event> {
	events
		.iter()
		.find(|e| e.process == process && e.label.starts_with(label_prefix))
}

// ============================================================================
// Counting
// ============================================================================

fn counting_model() -> (Model, MemoryId) {
	let mut model = Model::default();
	let dm = model.add_memory();
	model.add_goal("g", Some(dm), 0.0).unwrap();
	model.add_retrieval("retrieval", dm).unwrap();
	model.declare_type("countFrom", ["start", "end", "count"]).unwrap();

	for i in 1..=5 {
		let chunk = model.chunk("countOrder", [("first", i), ("second", i + 1)]).unwrap();
		model.memory_mut(dm).unwrap().add(chunk, 0.0).unwrap();
	}
	let goal = model.chunk("countFrom", [("start", 2), ("end", 4)]).unwrap();
	model.set_buffer("g", goal).unwrap();

	model
		.add_rule(
			Production::new("start")
				.test("g", Chunk::unchecked("countFrom", [("start", "=x")]))
				.query("retrieval", [("buffer", "empty"), ("state", "free")])
				.modify("g", [("count", "=x")])
				.request("retrieval", Chunk::unchecked("countOrder", [("first", "=x")])),
		)
		.unwrap();
	model
		.add_rule(
			Production::new("increment")
				.test("g", Chunk::unchecked("countFrom", [("count", "=x"), ("end", "~=x")]))
				.test("retrieval", Chunk::unchecked("countOrder", [("first", "=x"), ("second", "=y")]))
				.modify("g", [("count", "=y")])
				.request("retrieval", Chunk::unchecked("countOrder", [("first", "=y")])),
		)
		.unwrap();
	model
		.add_rule(
			Production::new("stop")
				.test("g", Chunk::unchecked("countFrom", [("count", "=x"), ("end", "=x")]))
				.clear("g"),
		)
		.unwrap();
	(model, dm)
}

#[test]
fn test_counting_trace() {
	let (model, dm) = counting_model();
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();

	let cr = "CONFLICT RESOLUTION";
	let none = "NO RULE FOUND";
	assert_eq!(
		triples(&events),
		vec![
			(0.0, PROCEDURAL, cr),
			(0.0, PROCEDURAL, "RULE SELECTED: start"),
			(0.05, PROCEDURAL, "RULE FIRED: start"),
			(0.05, "g", "MODIFIED"),
			(0.05, "retrieval", "START RETRIEVAL"),
			(0.05, PROCEDURAL, cr),
			(0.05, PROCEDURAL, none),
			(0.1, "retrieval", "RETRIEVED: countOrder(first= 2, second= 3)"),
			(0.1, PROCEDURAL, cr),
			(0.1, PROCEDURAL, "RULE SELECTED: increment"),
			(0.15, PROCEDURAL, "RULE FIRED: increment"),
			(0.15, "g", "MODIFIED"),
			(0.15, "retrieval", "CLEARED"),
			(0.15, "retrieval", "START RETRIEVAL"),
			(0.15, PROCEDURAL, cr),
			(0.15, PROCEDURAL, none),
			(0.2, "retrieval", "RETRIEVED: countOrder(first= 3, second= 4)"),
			(0.2, PROCEDURAL, cr),
			(0.2, PROCEDURAL, "RULE SELECTED: increment"),
			(0.25, PROCEDURAL, "RULE FIRED: increment"),
			(0.25, "g", "MODIFIED"),
			(0.25, "retrieval", "CLEARED"),
			(0.25, "retrieval", "START RETRIEVAL"),
			(0.25, PROCEDURAL, cr),
			(0.25, PROCEDURAL, "RULE SELECTED: stop"),
			(0.3, "retrieval", "RETRIEVED: countOrder(first= 4, second= 5)"),
			(0.3, PROCEDURAL, "RULE FIRED: stop"),
			(0.3, "g", "CLEARED"),
			(0.3, PROCEDURAL, cr),
			(0.3, PROCEDURAL, none),
		]
	);

	// the final goal was harvested next to the five count facts
	let memory = simulation.memory(dm).unwrap();
	assert_eq!(memory.len(), 6);
	let done = Chunk::unchecked("countFrom", [("start", 2), ("end", 4), ("count", 4)]);
	assert_eq!(memory.times(&done), Some(&[0.3][..]));
	// re-harvested retrieval results gain a presentation
	let two_three = Chunk::unchecked("countOrder", [("first", 2), ("second", 3)]);
	assert_eq!(memory.times(&two_three), Some(&[0.0, 0.15][..]));
	assert!(simulation.buffer("g").unwrap().is_empty());
}

#[test]
fn test_bounded_run_stops_before_limit() {
	let (model, _) = counting_model();
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(Some(0.12)).unwrap();
	assert!(events.iter().all(|e| e.time <= 0.12));
	assert_eq!(events.last().map(|e| e.label.as_str()), Some("RULE SELECTED: increment"));
	assert_eq!(simulation.next_time(), Some(0.15));

	// picking up again continues where the first run stopped
	let rest = simulation.run(None).unwrap();
	assert_eq!(rest.first().map(|e| e.label.as_str()), Some("RULE FIRED: increment"));
	assert!(find(&rest, PROCEDURAL, "RULE FIRED: stop").is_some());
}

// ============================================================================
// Retrieval
// ============================================================================

fn single_fact_model(config: &[(&str, bool)]) -> (Model, MemoryId) {
	let mut model = Model::default();
	for (name, value) in config {
		model.set_parameter(name, *value).unwrap();
	}
	let dm = model.add_memory();
	model.add_goal("g", None, 0.0).unwrap();
	model.add_retrieval("retrieval", dm).unwrap();
	let fact = model.chunk("fact", [("name", "cat"), ("kind", "animal")]).unwrap();
	model.memory_mut(dm).unwrap().add(fact, 0.0).unwrap();
	let goal = model.chunk("task", [("step", "recall"), ("name", "cat")]).unwrap();
	model.set_buffer("g", goal).unwrap();
	model
		.add_rule(
			Production::new("recall")
				.test("g", Chunk::unchecked("task", [("step", "recall"), ("name", "=n")]))
				.modify("g", [("step", "wait")])
				.request("retrieval", Chunk::unchecked("fact", [("name", "=n")])),
		)
		.unwrap();
	(model, dm)
}

#[test]
fn test_symbolic_retrieval_takes_one_rule_firing() {
	let (mut model, _) = single_fact_model(&[]);
	model.set_parameter("rule_firing", 0.1).unwrap();
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();
	assert_eq!(
		of(&events, "retrieval"),
		vec![
			(0.1, "START RETRIEVAL"),
			(0.2, "RETRIEVED: fact(name= cat, kind= animal)"),
		]
	);
	assert_eq!(simulation.buffer("retrieval").unwrap().state(), BufferState::Free);
}

#[test]
fn test_subsymbolic_latency_follows_activation() {
	let (model, _) = single_fact_model(&[("subsymbolic", true)]);
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();

	// B = ln(0.05^−0.5) ≈ 1.498, latency = 0.1 × e^−B ≈ 0.0224
	let retrieved = find(&events, "retrieval", "RETRIEVED").unwrap();
	assert_eq!(retrieved.time, 0.0724);
	let activation = simulation.buffer("retrieval").unwrap().last_activation().unwrap();
	assert!((activation - (-0.5 * 0.05_f64.ln())).abs() < 1e-9);
}

#[test]
fn test_failed_retrieval_sets_error_state() {
	let (mut model, _) = single_fact_model(&[]);
	let goal = model.chunk("task", [("step", "recall"), ("name", "dog")]).unwrap();
	model.set_buffer("g", goal).unwrap();
	model
		.add_rule(
			Production::new("give_up")
				.test("g", Chunk::unchecked("task", [("step", "wait")]))
				.query("retrieval", [("state", "error")])
				.modify("g", [("step", "failed")]),
		)
		.unwrap();
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();

	assert!(find(&events, "retrieval", "RETRIEVED: None").is_some());
	assert!(find(&events, PROCEDURAL, "RULE FIRED: give_up").is_some());
	let goal = simulation.buffer("g").unwrap().content().unwrap();
	assert_eq!(goal.get("step").to_string(), "failed");
}

fn animal_model(config: ModelConfig) -> (Model, MemoryId) {
	let mut model = Model::new(config).unwrap();
	let dm = model.add_memory();
	model.add_goal("g", None, 0.0).unwrap();
	model.add_retrieval("retrieval", dm).unwrap();
	let goal = model.chunk("task", [("step", "ask"), ("place", "farm")]).unwrap();
	model.set_buffer("g", goal).unwrap();
	(model, dm)
}

fn subsymbolic() -> ModelConfig {
	ModelConfig {
		subsymbolic: true,
		retrieval_threshold: -5.0,
		..ModelConfig::default()
	}
}

fn ask_for(kind: &str) -> Production {
	Production::new("ask")
		.test("g", Chunk::unchecked("task", [("step", "ask")]))
		.modify("g", [("step", "asked")])
		.request("retrieval", Chunk::unchecked("fact", [("kind", kind)]))
}

#[test]
fn test_new_request_cancels_running_retrieval() {
	let (mut model, dm) = animal_model(subsymbolic());
	let cat = model.chunk("fact", [("name", "cat"), ("kind", "animal")]).unwrap();
	let fern = model.chunk("fact", [("name", "fern"), ("kind", "plant")]).unwrap();
	// latency 0.1·e^2 for the cat, 0.1 for the fern
	model.memory_mut(dm).unwrap().set_activation(cat, -2.0).unwrap();
	model.memory_mut(dm).unwrap().set_activation(fern, 0.0).unwrap();
	model.add_rule(ask_for("animal")).unwrap();
	model
		.add_rule(
			Production::new("ask_again")
				.test("g", Chunk::unchecked("task", [("step", "asked")]))
				.query("retrieval", [("state", "busy")])
				.modify("g", [("step", "asked_again")])
				.request("retrieval", Chunk::unchecked("fact", [("kind", "plant")])),
		)
		.unwrap();
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();

	assert_eq!(
		of(&events, "retrieval"),
		vec![
			(0.05, "START RETRIEVAL"),
			(0.1, "START RETRIEVAL"),
			(0.2, "RETRIEVED: fact(name= fern, kind= plant)"),
		]
	);
	assert_eq!(simulation.buffer("retrieval").unwrap().last_activation(), Some(0.0));
}

#[test]
fn test_goal_spreading_picks_associated_chunk() {
	let run = |config: ModelConfig| {
		let (mut model, dm) = animal_model(config);
		for (name, home) in [("cat", "house"), ("cow", "farm")] {
			let fact = model.chunk("fact", [("name", name), ("kind", "animal"), ("home", home)]).unwrap();
			model.memory_mut(dm).unwrap().set_activation(fact, 0.0).unwrap();
		}
		model.add_rule(ask_for("animal")).unwrap();
		let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
		let events = simulation.run(None).unwrap();
		let label = find(&events, "retrieval", "RETRIEVED").unwrap().label.clone();
		(label, simulation.buffer("retrieval").unwrap().last_activation().unwrap())
	};

	// equal activations: the first chunk examined wins
	let (label, activation) = run(subsymbolic());
	assert!(label.contains("name= cat"));
	assert_eq!(activation, 0.0);

	// "farm" in the goal reaches only the cow: 0.5 × (2 − ln 2)
	let (label, activation) = run(ModelConfig {
		buffer_spreading_activation: BTreeMap::from([("g".to_string(), 1.0)]),
		strength_of_association: 2.0,
		..subsymbolic()
	});
	assert!(label.contains("name= cow"));
	assert!((activation - 0.5 * (2.0 - 2.0_f64.ln())).abs() < 1e-9);
}

#[test]
fn test_partial_matching_retrieves_similar_chunk() {
	let (mut model, dm) = animal_model(ModelConfig {
		partial_matching: true,
		mismatch_penalty: 2.0,
		..subsymbolic()
	});
	model.set_similarity("mammal", "animal", -0.2);
	for (name, kind) in [("rock", "mineral"), ("cow", "mammal")] {
		let fact = model.chunk("fact", [("name", name), ("kind", kind)]).unwrap();
		model.memory_mut(dm).unwrap().set_activation(fact, 0.0).unwrap();
	}
	model.add_rule(ask_for("animal")).unwrap();
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();

	// rock scores −1 × 2, cow −0.2 × 2
	let retrieved = find(&events, "retrieval", "RETRIEVED").unwrap();
	assert_eq!(retrieved.label, "RETRIEVED: fact(name= cow, kind= mammal)");
	let activation = simulation.buffer("retrieval").unwrap().last_activation().unwrap();
	assert!((activation + 0.4).abs() < 1e-9);
}

// ============================================================================
// Procedural
// ============================================================================

fn two_step_model() -> (Model, MemoryId) {
	let mut model = Model::default();
	let dm = model.add_memory();
	model.add_goal("g", Some(dm), 0.0).unwrap();
	let goal = model.chunk("task", [("step", "one")]).unwrap();
	model.set_buffer("g", goal).unwrap();
	(model, dm)
}

#[test]
fn test_strict_harvesting_clears_tested_buffers() {
	let (mut model, dm) = two_step_model();
	model.set_parameter("strict_harvesting", true).unwrap();
	model.add_buffer("imaginal", Some(dm)).unwrap();
	let note = model.chunk("note", [("text", "hello")]).unwrap();
	model.set_buffer("imaginal", note.clone()).unwrap();
	model
		.add_rule(
			Production::new("read")
				.test("g", Chunk::unchecked("task", [("step", "one")]))
				.test("imaginal", Chunk::unchecked("note", [("text", "=t")]))
				.modify("g", [("step", "two")]),
		)
		.unwrap();
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();

	assert_eq!(of(&events, "imaginal"), vec![(0.05, "CLEARED")]);
	assert_eq!(of(&events, "g"), vec![(0.05, "MODIFIED")]);
	assert!(simulation.buffer("imaginal").unwrap().is_empty());
	assert_eq!(simulation.memory(dm).unwrap().times(&note), Some(&[0.05][..]));
}

#[test]
fn test_higher_utility_wins() {
	let (mut model, _) = two_step_model();
	model.set_parameter("subsymbolic", true).unwrap();
	for (name, utility) in [("high", 5.0), ("low", 1.0)] {
		model
			.add_rule(
				Production::new(name)
					.test("g", Chunk::unchecked("task", [("step", "one")]))
					.clear("g")
					.utility(utility),
			)
			.unwrap();
	}
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();
	assert!(find(&events, PROCEDURAL, "RULE SELECTED: high").is_some());
	assert!(find(&events, PROCEDURAL, "RULE SELECTED: low").is_none());
}

#[test]
fn test_utility_learning_from_reward() {
	let (mut model, _) = two_step_model();
	model.set_parameter("utility_learning", true).unwrap();
	model
		.add_rule(
			Production::new("work")
				.test("g", Chunk::unchecked("task", [("step", "one")]))
				.modify("g", [("step", "two")]),
		)
		.unwrap();
	model
		.add_rule(
			Production::new("finish")
				.test("g", Chunk::unchecked("task", [("step", "two")]))
				.clear("g")
				.reward(10.0),
		)
		.unwrap();
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let _ = simulation.run(None).unwrap();

	// selected at 0 and 0.05, rewarded when `finish` fires at 0.1
	let utility = |name: &str| simulation.rules().get(name).unwrap().utility;
	assert!((utility("work") - 0.2 * (10.0 - 0.1)).abs() < 1e-9);
	assert!((utility("finish") - 0.2 * (10.0 - 0.05)).abs() < 1e-9);
}

#[test]
fn test_config_from_toml_drives_run() {
	let config = ModelConfig::from_toml_str(
		r#"
		rule_firing = 0.2
		strict_harvesting = true
		"#,
	)
	.unwrap();
	let mut model = Model::new(config).unwrap();
	let dm = model.add_memory();
	model.add_goal("g", Some(dm), 0.0).unwrap();
	let goal = model.chunk("task", [("step", "one")]).unwrap();
	model.set_buffer("g", goal).unwrap();
	model
		.add_rule(Production::new("done").test("g", Chunk::unchecked("task", [("step", "one")])))
		.unwrap();
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();
	assert_eq!(of(&events, "g"), vec![(0.2, "CLEARED")]);
}

// ============================================================================
// Motor and vision
// ============================================================================

fn typing_model(prepared: bool) -> Model {
	let mut model = Model::default();
	model.set_parameter("motor_prepared", prepared).unwrap();
	model.add_goal("g", None, 0.0).unwrap();
	model.add_motor("manual").unwrap();
	let goal = model.chunk("task", [("step", "press")]).unwrap();
	model.set_buffer("g", goal).unwrap();
	model
		.add_rule(
			Production::new("press")
				.test("g", Chunk::unchecked("task", [("step", "press")]))
				.query("manual", [("preparation", "free")])
				.modify("g", [("step", "done")])
				.request("manual", Chunk::unchecked("_manual", [("cmd", "press_key"), ("key", "A")])),
		)
		.unwrap();
	model
}

#[test]
fn test_key_press_timing() {
	let mut simulation = typing_model(false).simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();
	assert_eq!(
		of(&events, "manual"),
		vec![
			(0.05, "COMMAND: press_key"),
			(0.3, "PREPARATION COMPLETE"),
			(0.35, "INITIATION COMPLETE"),
			(0.45, "KEY PRESSED: A"),
			(0.55, "MOVEMENT FINISHED"),
		]
	);
	let manual = simulation.buffer("manual").unwrap();
	assert_eq!(manual.state(), BufferState::Free);
	assert_eq!(manual.motor().and_then(|m| m.last_key()), Some("A"));
}

#[test]
fn test_prepared_motor_skips_preparation() {
	let mut simulation = typing_model(true).simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();
	let command = find(&events, "manual", "COMMAND").unwrap().time;
	let pressed = find(&events, "manual", "KEY PRESSED").unwrap().time;
	assert_eq!(command, 0.05);
	assert_eq!(pressed, 0.2);
}

#[test]
fn test_reading_and_typing_advance_the_screen() {
	let mut model = Model::default();
	model.add_goal("g", None, 0.0).unwrap();
	model.add_visual_location("visual_location", None).unwrap();
	model.add_visual("visual", None).unwrap();
	model.add_motor("manual").unwrap();
	let goal = model.chunk("task", [("step", "attend")]).unwrap();
	model.set_buffer("g", goal).unwrap();
	model.set_environment(
		Environment::new()
			.stimulus([VisualObject::new("A", 320.0, 180.0)], None)
			.stimulus([VisualObject::new("B", 320.0, 180.0)], None)
			.trigger("A"),
	);

	let screen_pos = Chunk::unchecked("_visuallocation", [("screen_x", "=x"), ("screen_y", "=y")]);
	model
		.add_rule(
			Production::new("attend")
				.test("g", Chunk::unchecked("task", [("step", "attend")]))
				.test(
					"visual_location",
					Chunk::unchecked("_visuallocation", [("screen_x", "=x"), ("screen_y", "=y")]),
				)
				.query("visual", [("state", "free")])
				.modify("g", [("step", "read")])
				.request(
					"visual",
					Chunk::unchecked(
						"_visual",
						[("cmd", SlotValue::from("move_attention")), ("screen_pos", SlotValue::from(screen_pos))],
					),
				),
		)
		.unwrap();
	model
		.add_rule(
			Production::new("respond")
				.test("g", Chunk::unchecked("task", [("step", "read")]))
				.test("visual", Chunk::unchecked("_visual", [("value", "=v")]))
				.modify("g", [("step", "done")])
				.request("manual", Chunk::unchecked("_manual", [("cmd", "press_key"), ("key", "=v")])),
		)
		.unwrap();

	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();

	let env = of(&events, "env");
	assert_eq!(env, vec![(0.0, "PRINTED NEW STIMULUS"), (0.585, "PRINTED NEW STIMULUS")]);

	let buffered = find(&events, "visual_location", "AUTOMATIC BUFFERING").unwrap();
	assert_eq!(buffered.time, 0.0);
	assert!(buffered.label.contains("screen_x= 320.0"));

	let encoded: Vec<(f64, &str)> = of(&events, "visual")
		.into_iter()
		.filter(|(_, label)| label.starts_with("ENCODED VIS OBJECT"))
		.collect();
	assert_eq!(encoded.len(), 2);
	assert_eq!(encoded[0].0, 0.135);
	assert!(encoded[0].1.contains("value= A"));
	// attention stays on the location, so the new object is re-encoded
	assert_eq!(encoded[1].0, 0.67);
	assert!(encoded[1].1.contains("value= B"));

	assert_eq!(find(&events, "manual", "KEY PRESSED").unwrap().label, "KEY PRESSED: A");
	let environment = simulation.environment().unwrap();
	assert_eq!(environment.current_index(), Some(1));
	assert_eq!(environment.pressed_keys().count(), 0);
}

#[test]
fn test_timed_stimuli_finish() {
	let mut model = Model::default();
	model.add_visual_location("visual_location", None).unwrap();
	model.set_environment(
		Environment::new()
			.stimulus([VisualObject::new("X", 10.0, 10.0)], Some(0.5))
			.stimulus([VisualObject::new("Y", 50.0, 10.0).color("red")], Some(0.5))
			.start_time(0.1),
	);
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();

	assert_eq!(
		of(&events, "env"),
		vec![(0.1, "PRINTED NEW STIMULUS"), (0.6, "PRINTED NEW STIMULUS"), (1.1, "FINISHED")]
	);
	// the location buffer was filled at the first stimulus and is never emptied
	let buffered: Vec<(f64, &str)> = of(&events, "visual_location");
	assert_eq!(buffered.len(), 1);
	assert_eq!(buffered[0].0, 0.1);
}

#[test]
fn test_jammed_command_releases_pressed_key() {
	let mut model = Model::default();
	model.add_goal("g", None, 0.4).unwrap();
	model.add_motor("manual").unwrap();
	model.set_environment(Environment::new().stimulus([VisualObject::new("X", 10.0, 10.0)], None));
	let goal = model.chunk("task", [("step", "press")]).unwrap();
	model.set_buffer("g", goal).unwrap();
	model
		.add_rule(
			Production::new("first")
				.test("g", Chunk::unchecked("task", [("step", "press")]))
				.query("manual", [("state", "free")])
				.modify_delayed("g", [("step", "again")])
				.request("manual", Chunk::unchecked("_manual", [("cmd", "press_key"), ("key", "A")])),
		)
		.unwrap();
	// fires at 0.5, after A is down and before its movement finishes
	model
		.add_rule(
			Production::new("second")
				.test("g", Chunk::unchecked("task", [("step", "again")]))
				.modify("g", [("step", "done")])
				.request("manual", Chunk::unchecked("_manual", [("cmd", "press_key"), ("key", "B")])),
		)
		.unwrap();
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();

	assert_eq!(
		of(&events, "manual"),
		vec![
			(0.05, "COMMAND: press_key"),
			(0.3, "PREPARATION COMPLETE"),
			(0.35, "INITIATION COMPLETE"),
			(0.45, "KEY PRESSED: A"),
			(0.5, "COMMAND: press_key"),
			(0.75, "PREPARATION COMPLETE"),
			(0.8, "INITIATION COMPLETE"),
			(0.9, "KEY PRESSED: B"),
			(1.0, "MOVEMENT FINISHED"),
		]
	);
	assert_eq!(simulation.environment().unwrap().pressed_keys().count(), 0);
	let manual = simulation.buffer("manual").unwrap();
	assert_eq!(manual.state(), BufferState::Free);
	assert_eq!(manual.motor().and_then(|m| m.last_key()), Some("B"));
}

#[test]
fn test_attention_request_outlasts_screen_change() {
	let mut model = Model::default();
	let dm = model.add_memory();
	model.add_goal("g", None, 0.0).unwrap();
	model.add_visual_location("visual_location", None).unwrap();
	model.add_visual("visual", Some(dm)).unwrap();
	let goal = model.chunk("task", [("step", "attend")]).unwrap();
	model.set_buffer("g", goal).unwrap();
	model.set_environment(
		Environment::new()
			.stimulus(
				[VisualObject::new("A", 10.0, 10.0), VisualObject::new("B", 100.0, 10.0)],
				Some(0.2),
			)
			.stimulus(
				[VisualObject::new("C", 10.0, 10.0), VisualObject::new("D", 100.0, 10.0)],
				None,
			),
	);

	let attend_to = |location: Chunk| {
		Chunk::unchecked(
			"_visual",
			[("cmd", SlotValue::from("move_attention")), ("screen_pos", SlotValue::from(location))],
		)
	};
	let found = Chunk::unchecked("_visuallocation", [("screen_x", "=x"), ("screen_y", "=y")]);
	model
		.add_rule(
			Production::new("attend")
				.test("g", Chunk::unchecked("task", [("step", "attend")]))
				.test("visual_location", found.clone())
				.modify("g", [("step", "look")])
				.request("visual", attend_to(found)),
		)
		.unwrap();
	// issued at 0.185, still encoding when the screen changes at 0.2
	let right = Chunk::unchecked("_visuallocation", [("screen_x", 100), ("screen_y", 10)]);
	model
		.add_rule(
			Production::new("shift")
				.test("g", Chunk::unchecked("task", [("step", "look")]))
				.test("visual", Chunk::unchecked("_visual", [("value", "A")]))
				.modify("g", [("step", "shifted")])
				.request("visual", attend_to(right)),
		)
		.unwrap();
	let mut simulation = model.simulation(SimulationOptions::default()).unwrap();
	let events = simulation.run(None).unwrap();

	assert_eq!(of(&events, "env"), vec![(0.0, "PRINTED NEW STIMULUS"), (0.2, "PRINTED NEW STIMULUS")]);
	let encoded: Vec<(f64, &str)> = of(&events, "visual")
		.into_iter()
		.filter(|(_, label)| label.starts_with("ENCODED VIS OBJECT"))
		.collect();
	assert_eq!(encoded.len(), 2);
	assert_eq!(encoded[0].0, 0.135);
	assert!(encoded[0].1.contains("value= A"));
	assert_eq!(encoded[1].0, 0.27);
	assert!(encoded[1].1.contains("value= D"));
	let visual = simulation.buffer("visual").unwrap();
	assert_eq!(visual.content().unwrap().get("value").to_string(), "D");
}
