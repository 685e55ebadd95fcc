//! Discrete-Event Scheduler
//!
//! Cooperative processes, one logical thread. Each process is a named state
//! value; stepping it yields how it wants to continue:
//!
//! - [`Wake::At`]: resume at a simulated time
//! - [`Wake::Parked`]: sleep until someone calls [`Scheduler::activate`]
//! - [`Wake::Done`]: finished
//!
//! Wake-ups at the same time run in the order they were scheduled.
//! Spawning a name that is already running replaces the old process; its
//! pending wake-up is discarded.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use ordered_float::OrderedFloat;

/// Clock ticks per simulated second (resolution 1e-4 s).
pub const TICKS_PER_SECOND: f64 = 10_000.0;

/// Round a time to the clock resolution.
#[must_use]
pub fn round_time(seconds: f64) -> f64 {
	(seconds * TICKS_PER_SECOND).round() / TICKS_PER_SECOND
}

/// How a process continues after a step.
#[derive(Clone, Debug, PartialEq)]
pub enum Wake<P> {
	/// Resume with this state at this time
	At(f64, P),
	/// Wait for activation, then resume with this state
	Parked(P),
	/// Process finished
	Done,
}

#[derive(Debug)]
enum Entry<P> {
	Waiting { seq: u64, state: P },
	Parked(P),
	Running,
}

/// Event queue plus process table.
#[derive(Debug)]
pub struct Scheduler<P> {
	now: f64,
	seq: u64,
	queue: BinaryHeap<Reverse<(OrderedFloat<f64>, u64)>>,
	owners: HashMap<u64, String>,
	processes: HashMap<String, Entry<P>>,
}

impl<P> Default for Scheduler<P> {
	fn default() -> Self {
		Self {
			now: 0.0,
			seq: 0,
			queue: BinaryHeap::new(),
			owners: HashMap::new(),
			processes: HashMap::new(),
		}
	}
}

impl<P> Scheduler<P> {
	/// Empty scheduler at time 0.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Current simulated time.
	#[must_use]
	pub const fn now(&self) -> f64 {
		self.now
	}

	/// Start (or restart) process `name` at `at`.
	pub fn spawn(&mut self, name: impl Into<String>, at: f64, state: P) {
		let name = name.into();
		let seq = self.enqueue(&name, at);
		let _ = self.processes.insert(name, Entry::Waiting { seq, state });
	}

	/// Start (or restart) process `name` parked.
	pub fn spawn_parked(&mut self, name: impl Into<String>, state: P) {
		let _ = self.processes.insert(name.into(), Entry::Parked(state));
	}

	/// Whether a process of that name exists.
	#[must_use]
	pub fn contains(&self, name: &str) -> bool {
		self.processes.contains_key(name)
	}

	/// Whether process `name` is waiting for activation.
	#[must_use]
	pub fn is_parked(&self, name: &str) -> bool {
		matches!(self.processes.get(name), Some(Entry::Parked(_)))
	}

	/// Remove a process and its pending wake-up.
	pub fn cancel(&mut self, name: &str) {
		let _ = self.processes.remove(name);
	}

	/// Time of the next live wake-up.
	pub fn peek_time(&mut self) -> Option<f64> {
		while let Some(&Reverse((time, seq))) = self.queue.peek() {
			if self.is_live(seq) {
				return Some(time.into_inner());
			}
			let _ = self.queue.pop();
			let _ = self.owners.remove(&seq);
		}
		None
	}

	/// Take the next due process, advancing the clock to its wake-up time.
	///
	/// The process is marked running; hand its continuation back with
	/// [`Self::resume`].
	pub fn pop(&mut self) -> Option<(f64, String, P)> {
		while let Some(Reverse((time, seq))) = self.queue.pop() {
			let Some(name) = self.owners.remove(&seq) else {
				continue;
			};
			let Some(entry) = self.processes.get_mut(&name) else {
				continue;
			};
			if !matches!(entry, Entry::Waiting { seq: live, .. } if *live == seq) {
				continue;
			}
			let Entry::Waiting { state, .. } = std::mem::replace(entry, Entry::Running) else {
				continue;
			};
			self.now = time.into_inner();
			return Some((self.now, name, state));
		}
		None
	}

	/// Continue a process taken by [`Self::pop`].
	///
	/// Ignored if the process was spawned anew while it was running.
	pub fn resume(&mut self, name: &str, wake: Wake<P>) {
		if !matches!(self.processes.get(name), Some(Entry::Running)) {
			return;
		}
		match wake {
			Wake::At(at, state) => {
				let seq = self.enqueue(name, at);
				let _ = self.processes.insert(name.to_string(), Entry::Waiting { seq, state });
			}
			Wake::Parked(state) => {
				let _ = self.processes.insert(name.to_string(), Entry::Parked(state));
			}
			Wake::Done => {
				let _ = self.processes.remove(name);
			}
		}
	}

	/// Wake a parked process at the current time. Returns whether it was
	/// parked.
	pub fn activate(&mut self, name: &str) -> bool {
		if !self.is_parked(name) {
			return false;
		}
		let seq = self.enqueue(name, self.now);
		if let Some(entry) = self.processes.get_mut(name) {
			if let Entry::Parked(state) = std::mem::replace(entry, Entry::Running) {
				*entry = Entry::Waiting { seq, state };
			}
		}
		true
	}

	/// Move a parked or waiting process to `at`.
	pub fn reschedule(&mut self, name: &str, at: f64) {
		if !matches!(self.processes.get(name), Some(Entry::Parked(_) | Entry::Waiting { .. })) {
			return;
		}
		let seq = self.enqueue(name, at);
		if let Some(entry) = self.processes.get_mut(name) {
			match std::mem::replace(entry, Entry::Running) {
				Entry::Parked(state) | Entry::Waiting { state, .. } => {
					*entry = Entry::Waiting { seq, state };
				}
				Entry::Running => {}
			}
		}
	}

	fn enqueue(&mut self, name: &str, at: f64) -> u64 {
		let seq = self.seq;
		self.seq += 1;
		let at = round_time(at.max(self.now));
		self.queue.push(Reverse((OrderedFloat(at), seq)));
		let _ = self.owners.insert(seq, name.to_string());
		seq
	}

	fn is_live(&self, seq: u64) -> bool {
		self.owners.get(&seq).is_some_and(|name| {
			matches!(self.processes.get(name), Some(Entry::Waiting { seq: live, .. }) if *live == seq)
		})
	}
}
