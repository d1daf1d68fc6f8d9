//! Sink state machine: suspend causes, status updates,
//! bulk moves.

//---------------------------------------------------------------------------------------------------- use
use crate::core::{Core,EventKind,Facility};
use crate::device::msg::SinkMsg;
use crate::device::state::{DeviceState,SuspendCause};
use crate::error::Error;
use crate::macros::{assert_ctl_context,debug2,info2,warn2};
use std::sync::atomic::Ordering;

//---------------------------------------------------------------------------------------------------- Core: state machine
impl Core {
	pub(crate) fn sink_set_state(&mut self, index: u32, state: DeviceState) -> Result<(), Error> {
		assert_ctl_context!();

		let (old_state, inputs) = {
			let s = self.sinks.get_mut(&index).ok_or(Error::NoEntity)?;
			if s.state == state {
				return Ok(());
			}

			let old = s.state;
			let suspending = old.is_opened() && !state.is_opened();
			let resuming = !old.is_opened() && state.is_opened();

			if suspending {
				s.driver.suspend(true)?;
			} else if resuming {
				s.driver.suspend(false)?;
			}

			s.state = state;

			if let Some(q) = &s.msgq {
				q.send(SinkMsg::SetState(state));
			}

			(old, s.inputs.iter().copied().collect::<Vec<u32>>())
		};

		let suspending = old_state.is_opened() && !state.is_opened();
		let resuming = !old_state.is_opened() && state.is_opened();

		if suspending || resuming {
			for input in inputs {
				let kill = suspending
					&& self
						.sink_inputs
						.get(&input)
						.map(|i| i.flags.kill_on_suspend)
						.unwrap_or(false);

				if kill {
					info2!("killing input {input}: its sink suspended");
					self.sink_input_kill(input);
					continue;
				}

				if let Some(i) = self.sink_inputs.get_mut(&input) {
					i.driver.suspend(suspending);
				}
			}
		}

		if state != DeviceState::Unlinked && old_state != DeviceState::Init {
			self.subscription_post(Facility::Sink, EventKind::Change, index);
		}

		debug2!("sink {index}: {old_state} -> {state}");
		Ok(())
	}

	/// Add or remove a suspend cause and drive the state machine.
	pub fn sink_suspend(&mut self, index: u32, suspend: bool, cause: SuspendCause) -> Result<(), Error> {
		assert_ctl_context!();
		debug_assert!(cause.any());

		let (any_cause, state) = {
			let s = self.sinks.get_mut(&index).ok_or(Error::NoEntity)?;
			if !s.state.is_linked() {
				return Err(Error::BadState);
			}

			if suspend {
				s.suspend_cause = s.suspend_cause.with(cause);
			} else {
				s.suspend_cause = s.suspend_cause.without(cause);
			}

			(s.suspend_cause.any(), s.state)
		};

		if any_cause {
			return self.sink_set_state(index, DeviceState::Suspended);
		}

		if state == DeviceState::Suspended {
			let dirty = self.sinks[&index].mixer_dirty.swap(false, Ordering::AcqRel);
			if dirty {
				self.sink_reapply_mixer(index)?;
			}
		}

		let target = if self.sinks[&index].used_by() > 0 {
			DeviceState::Running
		} else {
			DeviceState::Idle
		};
		self.sink_set_state(index, target)
	}

	fn sink_reapply_mixer(&mut self, index: u32) -> Result<(), Error> {
		info2!("sink {index}: mixer was dirty, re-applying state");

		let (port, reference, muted) = {
			let s = &self.sinks[&index];
			(s.active_port.clone(), s.reference_volume, s.muted)
		};

		if let Some(port) = port {
			self.sinks.get_mut(&index).unwrap().active_port = None;
			if let Err(e) = self.sink_set_port(index, &port, false) {
				warn2!("sink {index}: failed to re-apply port {port}: {e}");
				self.sinks.get_mut(&index).unwrap().active_port = Some(port);
				return Err(e);
			}
		}

		self.sink_set_volume(index, Some(&reference), true, false);
		self.sink_set_mute(index, muted, false)?;
		Ok(())
	}

	/// Resolve idle vs. running from the attached streams.
	pub fn sink_update_status(&mut self, index: u32) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sinks.get(&index).ok_or(Error::NoEntity)?;
		if !s.state.is_opened() {
			return Ok(());
		}

		let target = if s.used_by() > 0 {
			DeviceState::Running
		} else {
			DeviceState::Idle
		};
		self.sink_set_state(index, target)
	}

	/// How many attached streams inhibit auto-suspend.
	pub fn sink_check_suspend(&self, index: u32) -> usize {
		let Some(s) = self.sinks.get(&index) else { return 0 };

		if !s.state.is_linked() {
			return 0;
		}

		s.inputs
			.iter()
			.filter_map(|i| self.sink_inputs.get(i))
			.filter(|i| i.state.is_active() && !i.flags.dont_inhibit_auto_suspend)
			.count()
	}

	//---------------------------------------------------------------------------------------------------- Bulk moves
	/// Detach every movable stream into a move queue.
	pub fn sink_move_all_start(&mut self, index: u32) -> Vec<u32> {
		assert_ctl_context!();

		let inputs: Vec<u32> = match self.sinks.get(&index) {
			Some(s) => s.inputs.iter().copied().collect(),
			None => return Vec::new(),
		};

		let mut queue = Vec::new();
		for input in inputs {
			if self.sink_input_start_move(input).is_ok() {
				queue.push(input);
			}
		}
		queue
	}

	/// Re-attach a move queue to a new sink.
	pub fn sink_move_all_finish(&mut self, queue: Vec<u32>, dest: u32, save: bool) {
		assert_ctl_context!();

		for input in queue {
			if self.sink_input_finish_move(input, dest, save).is_err() {
				self.sink_input_fail_move(input);
			}
		}
	}

	/// Give up on a move queue.
	pub fn sink_move_all_fail(&mut self, queue: Vec<u32>) {
		assert_ctl_context!();

		for input in queue {
			self.sink_input_fail_move(input);
		}
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::{attach_input,flat_sink,TestCore};
	use pretty_assertions::assert_eq;

	#[test]
	fn streams_drive_running() {
		let mut t = TestCore::new();
		let s = flat_sink(&mut t, "s");
		assert_eq!(t.core.sink(s).unwrap().state(), DeviceState::Idle);

		let x = attach_input(&mut t, s);
		assert_eq!(t.core.sink(s).unwrap().state(), DeviceState::Running);

		t.core.sink_input_cork(x, true).unwrap();
		assert_eq!(t.core.sink(s).unwrap().state(), DeviceState::Idle);
	}

	#[test]
	fn move_all_between_sinks() {
		let mut t = TestCore::new();
		let a = flat_sink(&mut t, "a");
		let b = flat_sink(&mut t, "b");
		let x = attach_input(&mut t, a);
		let y = attach_input(&mut t, a);

		let queue = t.core.sink_move_all_start(a);
		assert_eq!(queue, vec![x, y]);

		t.core.sink_move_all_finish(queue, b, false);
		assert_eq!(t.core.sink_input(x).unwrap().sink, Some(b));
		assert_eq!(t.core.sink_input(y).unwrap().sink, Some(b));
		assert_eq!(t.core.sink(b).unwrap().linked_by(), 2);
		assert_eq!(t.core.sink(a).unwrap().linked_by(), 0);
	}
}
