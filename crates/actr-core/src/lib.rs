//! # ACT-R Core
//!
//! A discrete-event simulator for ACT-R production-system models: chunks,
//! declarative memory, buffers, production rules and simple perceptual-motor
//! modules driven by a single simulated clock.
//!
//! ## Core Concepts
//!
//! ### Chunks and matching
//!
//! Knowledge is held in typed slot/value records ([`Chunk`]). Rule
//! conditions and retrieval requests are chunks whose slots may hold
//! variables and negations; matching binds the variables ([`Bindings`]).
//!
//! ### Declarative memory
//!
//! Every chunk in memory keeps its presentation times. Under subsymbolic
//! settings retrieval ranks candidates by activation:
//!
//! ```text
//! A_i = B_i + Σ_j W_j × S_ji − P × mismatch + ε
//! B_i = ln Σ_k (t − t_k)^(−d)
//! ```
//!
//! and pays a latency of `F × e^(−f × A)`.
//!
//! ### Production cycle
//!
//! Conflict resolution picks the matching rule with the highest utility,
//! which fires after `rule_firing` seconds. Its actions modify buffers,
//! issue requests to modules, or clear buffers into declarative memory.
//!
//! ## Example
//!
//! ```rust
//! use actr_core::{Chunk, Model, Production, SimulationOptions};
//!
//! # fn main() -> actr_core::Result<()> {
//! let mut model = Model::default();
//! let dm = model.add_memory();
//! model.add_goal("g", Some(dm), 0.0)?;
//! let goal = model.chunk("countFrom", [("start", "2"), ("end", "4")])?;
//! model.set_buffer("g", goal)?;
//! model.add_rule(
//!     Production::new("done")
//!         .test("g", Chunk::unchecked("countFrom", [("start", "=x")]))
//!         .clear("g"),
//! )?;
//!
//! let mut simulation = model.simulation(SimulationOptions::default())?;
//! for event in simulation.run(Some(1.0))? {
//!     println!("{event}");
//! }
//! assert_eq!(simulation.memory(dm).map(|m| m.len()), Some(1));
//! # Ok(())
//! # }
//! ```
//!
//! ## References
//!
//! - Anderson, J. R. (2007). *How Can the Human Mind Occur in the Physical
//!   Universe?* - ACT-R theory
//! - Anderson, J. R., & Lebiere, C. (1998). *The Atomic Components of
//!   Thought* - activation and utility equations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod activation;
pub mod buffer;
pub mod chunk;
pub mod config;
pub mod environment;
pub mod error;
pub mod matching;
pub mod memory;
pub mod model;
pub mod motor;
pub mod procedural;
pub mod retrieval;
pub mod rule;
pub mod scheduler;
pub mod simulation;
pub mod spreading;
pub mod vision;

pub use activation::{
	association_strength, base_level, optimized_base_level, retrieval_latency, retrieval_probability,
	ActivationBreakdown,
};
pub use buffer::{Buffer, BufferKind, BufferState};
pub use chunk::{Chunk, ChunkTypes, Pattern, SlotValue, Value, EMPTY};
pub use config::{ModelConfig, ParamValue, TieBreak};
pub use environment::{Environment, Stimulus, VisualObject};
pub use error::{ActrError, Result};
pub use matching::{Bindings, SimilarityTable};
pub use memory::{DeclarativeMemory, MemoryEntry, MemoryId};
pub use model::{Command, Model};
pub use motor::MotorModule;
pub use procedural::PROCEDURAL;
pub use retrieval::{retrieve, Finst, RetrievalCandidate, RetrievalContext, RetrievalOutcome};
pub use rule::{Action, Condition, Production, RuleEntry, RuleStore};
pub use simulation::{Event, Simulation, SimulationOptions};
pub use spreading::{collect_sources, spreading_activation, SpreadingSource};
pub use vision::VisualModule;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
