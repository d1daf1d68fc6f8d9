//! Source state machine: suspend causes, status updates,
//! bulk moves.

//---------------------------------------------------------------------------------------------------- use
use crate::core::{Core,EventKind,Facility};
use crate::device::msg::SourceMsg;
use crate::device::state::{DeviceState,SuspendCause};
use crate::error::Error;
use crate::macros::{assert_ctl_context,debug2,info2,warn2};
use std::sync::atomic::Ordering;

//---------------------------------------------------------------------------------------------------- Core: state machine
impl Core {
	/// Drive the device state machine.
	///
	/// Entering or leaving an *opened* state (idle/running)
	/// notifies every attached stream; suspending kills streams
	/// flagged kill-on-suspend.
	pub(crate) fn source_set_state(&mut self, index: u32, state: DeviceState) -> Result<(), Error> {
		assert_ctl_context!();

		let (old_state, outputs) = {
			let s = self.sources.get_mut(&index).ok_or(Error::NoEntity)?;
			if s.state == state {
				return Ok(());
			}

			let old = s.state;
			let suspending = old.is_opened() && !state.is_opened();
			let resuming = !old.is_opened() && state.is_opened();

			// The driver may veto the transition.
			if suspending {
				s.driver.suspend(true)?;
			} else if resuming {
				s.driver.suspend(false)?;
			}

			s.state = state;

			if let Some(q) = &s.msgq {
				q.send(SourceMsg::SetState(state));
			}

			(old, s.outputs.iter().copied().collect::<Vec<u32>>())
		};

		let suspending = old_state.is_opened() && !state.is_opened();
		let resuming = !old_state.is_opened() && state.is_opened();

		if suspending || resuming {
			for output in outputs {
				let kill = suspending
					&& self
						.source_outputs
						.get(&output)
						.map(|o| o.flags.kill_on_suspend)
						.unwrap_or(false);

				if kill {
					info2!("killing output {output}: its source suspended");
					self.source_output_kill(output);
					continue;
				}

				if let Some(o) = self.source_outputs.get_mut(&output) {
					o.driver.suspend(suspending);
				}
			}
		}

		if state != DeviceState::Unlinked && old_state != DeviceState::Init {
			self.subscription_post(Facility::Source, EventKind::Change, index);
		}

		debug2!("source {index}: {old_state} -> {state}");
		Ok(())
	}

	/// Add or remove a suspend cause and drive the state machine
	/// accordingly.
	///
	/// Monitor sources only accept the passthrough cause; their
	/// lifecycle otherwise follows the monitored sink.
	pub fn source_suspend(&mut self, index: u32, suspend: bool, cause: SuspendCause) -> Result<(), Error> {
		assert_ctl_context!();
		debug_assert!(cause.any());

		let (any_cause, state) = {
			let s = self.sources.get_mut(&index).ok_or(Error::NoEntity)?;
			if !s.state.is_linked() {
				return Err(Error::BadState);
			}

			if s.monitor_of.is_some() && !cause.contains(SuspendCause::PASSTHROUGH) {
				return Err(Error::NotSupported);
			}

			if suspend {
				s.suspend_cause = s.suspend_cause.with(cause);
			} else {
				s.suspend_cause = s.suspend_cause.without(cause);
			}

			(s.suspend_cause.any(), s.state)
		};

		if any_cause {
			return self.source_set_state(index, DeviceState::Suspended);
		}

		if state == DeviceState::Suspended {
			// Resuming: the mixer may have changed while we had no
			// access to it.
			let dirty = self.sources[&index].mixer_dirty.swap(false, Ordering::AcqRel);
			if dirty {
				self.source_reapply_mixer(index)?;
			}
		}

		let target = if self.sources[&index].used_by() > 0 {
			DeviceState::Running
		} else {
			DeviceState::Idle
		};
		self.source_set_state(index, target)
	}

	/// Re-apply port, volume and mute after the hardware mixer
	/// was touched behind our back.
	fn source_reapply_mixer(&mut self, index: u32) -> Result<(), Error> {
		info2!("source {index}: mixer was dirty, re-applying state");

		let (port, reference, muted) = {
			let s = &self.sources[&index];
			(s.active_port.clone(), s.reference_volume, s.muted)
		};

		if let Some(port) = port {
			// Force the switch through even though the port is
			// nominally active already.
			self.sources.get_mut(&index).unwrap().active_port = None;
			if let Err(e) = self.source_set_port(index, &port, false) {
				warn2!("source {index}: failed to re-apply port {port}: {e}");
				self.sources.get_mut(&index).unwrap().active_port = Some(port);
				return Err(e);
			}
		}

		self.source_set_volume(index, Some(&reference), true, false);
		self.source_set_mute(index, muted, false)?;
		Ok(())
	}

	/// Resolve idle vs. running from the attached streams.
	pub fn source_update_status(&mut self, index: u32) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sources.get(&index).ok_or(Error::NoEntity)?;
		if !s.state.is_opened() {
			return Ok(());
		}

		let target = if s.used_by() > 0 {
			DeviceState::Running
		} else {
			DeviceState::Idle
		};
		self.source_set_state(index, target)
	}

	/// How many attached streams inhibit auto-suspend.
	pub fn source_check_suspend(&self, index: u32) -> usize {
		let Some(s) = self.sources.get(&index) else { return 0 };

		if !s.state.is_linked() {
			return 0;
		}

		s.outputs
			.iter()
			.filter_map(|o| self.source_outputs.get(o))
			.filter(|o| {
				o.state.is_active() && !o.flags.dont_inhibit_auto_suspend
			})
			.count()
	}

	//---------------------------------------------------------------------------------------------------- Bulk moves
	/// Detach every movable stream into a move queue
	/// (device removal / reconfiguration).
	pub fn source_move_all_start(&mut self, index: u32) -> Vec<u32> {
		assert_ctl_context!();

		let outputs: Vec<u32> = match self.sources.get(&index) {
			Some(s) => s.outputs.iter().copied().collect(),
			None => return Vec::new(),
		};

		let mut queue = Vec::new();
		for output in outputs {
			if self.source_output_start_move(output).is_ok() {
				queue.push(output);
			}
		}
		queue
	}

	/// Re-attach a move queue to a new source; streams the
	/// destination refuses go through the fail path.
	pub fn source_move_all_finish(&mut self, queue: Vec<u32>, dest: u32, save: bool) {
		assert_ctl_context!();

		for output in queue {
			if self.source_output_finish_move(output, dest, save).is_err() {
				self.source_output_fail_move(output);
			}
		}
	}

	/// Give up on a move queue.
	pub fn source_move_all_fail(&mut self, queue: Vec<u32>) {
		assert_ctl_context!();

		for output in queue {
			self.source_output_fail_move(output);
		}
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::{attach_output,flat_source,source_with_flags,TestCore};
	use crate::device::DeviceFlags;
	use pretty_assertions::assert_eq;

	#[test]
	fn put_lands_in_idle_and_streams_drive_running() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		assert_eq!(t.core.source(a).unwrap().state(), DeviceState::Idle);

		let x = attach_output(&mut t, a);
		assert_eq!(t.core.source(a).unwrap().state(), DeviceState::Running);

		t.core.source_output_cork(x, true).unwrap();
		assert_eq!(t.core.source(a).unwrap().state(), DeviceState::Idle);

		t.core.source_output_cork(x, false).unwrap();
		assert_eq!(t.core.source(a).unwrap().state(), DeviceState::Running);
	}

	#[test]
	fn suspend_causes_accumulate() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");

		t.core.source_suspend(a, true, SuspendCause::IDLE).unwrap();
		t.core.source_suspend(a, true, SuspendCause::SESSION).unwrap();
		assert_eq!(t.core.source(a).unwrap().state(), DeviceState::Suspended);

		// One cause cleared: still suspended.
		t.core.source_suspend(a, false, SuspendCause::IDLE).unwrap();
		assert_eq!(t.core.source(a).unwrap().state(), DeviceState::Suspended);

		// All clear: back to idle.
		t.core.source_suspend(a, false, SuspendCause::SESSION).unwrap();
		assert_eq!(t.core.source(a).unwrap().state(), DeviceState::Idle);
	}

	#[test]
	fn suspend_notifies_driver_and_streams() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let x = attach_output(&mut t, a);

		t.core.source_suspend(a, true, SuspendCause::USER).unwrap();
		t.core.source_suspend(a, false, SuspendCause::USER).unwrap();

		// The driver saw the open at put(), then the round trip.
		let driver = t.source_handles[&a].state.lock().unwrap();
		assert_eq!(driver.suspends, vec![false, true, false]);

		let stream = t.output_handles[&x].lock().unwrap();
		assert_eq!(stream.suspends, vec![true, false]);
	}

	#[test]
	fn kill_on_suspend() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");

		let x = {
			let mut b = t.output_builder(a);
			b.flags.kill_on_suspend = true;
			t.add_output(b)
		};

		t.core.source_suspend(a, true, SuspendCause::SESSION).unwrap();

		assert!(t.core.source_output(x).is_none());
		assert!(t.output_handles[&x].lock().unwrap().killed);
	}

	#[test]
	fn mixer_dirty_reapplies_on_resume() {
		let mut t = TestCore::new();
		let a = source_with_flags(&mut t, "a", DeviceFlags {
			hw_volume_ctrl: true,
			hw_mute_ctrl: true,
			flat_volume: true,
			..DeviceFlags::NONE
		});

		t.core.source_suspend(a, true, SuspendCause::SESSION).unwrap();
		t.core.source(a).unwrap().mixer_dirty.store(true, Ordering::Release);
		t.core.source_suspend(a, false, SuspendCause::SESSION).unwrap();

		// Volume and mute were pushed back into the hardware.
		let driver = t.source_handles[&a].state.lock().unwrap();
		assert!(driver.hw_volume.is_some());
		assert!(driver.hw_muted.is_some());
	}

	#[test]
	fn monitor_accepts_only_passthrough_cause() {
		let mut t = TestCore::new();
		let sink = t.dummy_sink("sink");
		let mon = t.monitor_source("monitor", sink);

		assert_eq!(
			t.core.source_suspend(mon, true, SuspendCause::IDLE),
			Err(Error::NotSupported),
		);
		t.core.source_suspend(mon, true, SuspendCause::PASSTHROUGH).unwrap();
		assert_eq!(t.core.source(mon).unwrap().state(), DeviceState::Suspended);
	}
}
