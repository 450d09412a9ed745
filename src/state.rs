//! Drawer visibility lifecycle, free of any DOM access.
//!
//! `Closed → Opening → Open → Closing → Closed`. A pending close can be interrupted by `open`,
//! which returns straight to `Open`. Requests that don't apply to the current state are no-ops.

use core::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawerVisibility {
	Closed,
	Opening,
	Open,
	Closing,
}

impl DrawerVisibility {
	/// Whether the `hidden` attribute must be present.
	#[must_use]
	pub fn is_hidden(self) -> bool {
		self == Self::Closed
	}

	/// Whether the active class and body scroll lock must be present.
	#[must_use]
	pub fn is_active(self) -> bool {
		matches!(self, Self::Opening | Self::Open)
	}

	/// Value of the root's `data-drawer-state` attribute.
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Closed => "closed",
			Self::Opening => "opening",
			Self::Open => "open",
			Self::Closing => "closing",
		}
	}
}

impl Default for DrawerVisibility {
	fn default() -> Self {
		Self::Closed
	}
}

impl Display for DrawerVisibility {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
	pub from: DrawerVisibility,
	pub to: DrawerVisibility,
}

/// Ticket for the delayed `Closing → Closed` step.
///
/// Only the ticket from the most recent `begin_close` can complete it; any `open` in between invalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct PendingClose(u64);

#[derive(Debug, Default)]
pub struct VisibilityMachine {
	state: DrawerVisibility,
	generation: u64,
}

impl VisibilityMachine {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn state(&self) -> DrawerVisibility {
		self.state
	}

	/// `Closed → Opening`, or `Closing → Open` (cancelling the pending close).
	pub fn begin_open(&mut self) -> Option<Transition> {
		match self.state {
			DrawerVisibility::Closed => Some(self.go(DrawerVisibility::Opening)),
			DrawerVisibility::Closing => {
				self.generation = self.generation.wrapping_add(1);
				Some(self.go(DrawerVisibility::Open))
			}
			DrawerVisibility::Opening | DrawerVisibility::Open => None,
		}
	}

	/// `Opening → Open`.
	pub fn finish_open(&mut self) -> Option<Transition> {
		match self.state {
			DrawerVisibility::Opening => Some(self.go(DrawerVisibility::Open)),
			_ => None,
		}
	}

	/// `Open | Opening → Closing`.
	pub fn begin_close(&mut self) -> Option<(Transition, PendingClose)> {
		match self.state {
			DrawerVisibility::Open | DrawerVisibility::Opening => {
				self.generation = self.generation.wrapping_add(1);
				Some((self.go(DrawerVisibility::Closing), PendingClose(self.generation)))
			}
			DrawerVisibility::Closed | DrawerVisibility::Closing => None,
		}
	}

	/// `Closing → Closed`, unless `pending` was superseded.
	pub fn finish_close(&mut self, pending: PendingClose) -> Option<Transition> {
		if self.state == DrawerVisibility::Closing && pending.0 == self.generation {
			Some(self.go(DrawerVisibility::Closed))
		} else {
			None
		}
	}

	fn go(&mut self, to: DrawerVisibility) -> Transition {
		let transition = Transition { from: self.state, to };
		self.state = to;
		transition
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, Clone, Copy)]
	enum Step {
		Open,
		Close,
		TimerFires,
	}

	/// Drives the machine the way the drawer does: `open` runs both halves, `close` arms a timer.
	fn run(steps: &[Step]) -> (VisibilityMachine, Vec<Transition>) {
		let mut machine = VisibilityMachine::new();
		let mut timers = Vec::new();
		let mut log = Vec::new();
		for step in steps {
			match step {
				Step::Open => {
					log.extend(machine.begin_open());
					log.extend(machine.finish_open());
				}
				Step::Close => {
					if let Some((transition, pending)) = machine.begin_close() {
						log.push(transition);
						timers.push(pending);
					}
				}
				Step::TimerFires => {
					if !timers.is_empty() {
						let pending = timers.remove(0);
						log.extend(machine.finish_close(pending));
					}
				}
			}
			let state = machine.state();
			assert_eq!(state.is_hidden(), state == DrawerVisibility::Closed);
			assert_eq!(state.is_active(), matches!(state, DrawerVisibility::Opening | DrawerVisibility::Open));
		}
		(machine, log)
	}

	#[test]
	fn every_short_sequence_keeps_attribute_invariants() {
		const STEPS: [Step; 3] = [Step::Open, Step::Close, Step::TimerFires];
		for len in 0..=6_u32 {
			for mut code in 0..3_usize.pow(len) {
				let mut steps = Vec::new();
				for _ in 0..len {
					steps.push(STEPS[code % 3]);
					code /= 3;
				}
				let (_, log) = run(&steps);
				for pair in log.windows(2) {
					assert_eq!(pair[0].to, pair[1].from, "{:?}", steps);
				}
			}
		}
	}

	#[test]
	fn open_passes_through_opening() {
		let (machine, log) = run(&[Step::Open]);
		assert_eq!(machine.state(), DrawerVisibility::Open);
		assert_eq!(
			log,
			[
				Transition { from: DrawerVisibility::Closed, to: DrawerVisibility::Opening },
				Transition { from: DrawerVisibility::Opening, to: DrawerVisibility::Open },
			]
		);
	}

	#[test]
	fn redundant_requests_are_no_ops() {
		let mut machine = VisibilityMachine::new();
		assert_eq!(machine.begin_close(), None);
		machine.begin_open();
		machine.finish_open();
		assert_eq!(machine.begin_open(), None);
		assert_eq!(machine.finish_open(), None);
	}

	#[test]
	fn reopening_cancels_pending_close() {
		let (machine, _) = run(&[Step::Open, Step::Close, Step::Open, Step::TimerFires]);
		assert_eq!(machine.state(), DrawerVisibility::Open);
	}

	#[test]
	fn only_the_latest_close_completes() {
		let mut machine = VisibilityMachine::new();
		machine.begin_open();
		machine.finish_open();
		let (_, stale) = machine.begin_close().unwrap();
		machine.begin_open();
		let (_, fresh) = machine.begin_close().unwrap();

		assert_eq!(machine.finish_close(stale), None);
		assert_eq!(machine.state(), DrawerVisibility::Closing);
		assert!(machine.finish_close(fresh).is_some());
		assert_eq!(machine.state(), DrawerVisibility::Closed);
	}
}
