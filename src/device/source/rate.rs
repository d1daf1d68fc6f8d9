//! Rate switching.

//---------------------------------------------------------------------------------------------------- use
use crate::core::Core;
use crate::device::state::SuspendCause;
use crate::macros::{assert_ctl_context,debug2,info2,warn2};
use crate::sample::{RATE_MAX,RATE_MIN};

//---------------------------------------------------------------------------------------------------- Core: rate
impl Core {
	/// Try to switch the device rate to (the family of) `rate`.
	///
	/// Refused while any non-corked stream runs, for rates
	/// outside the device's two rate families, and for anything
	/// outside the global bounds. Passthrough streams dictate the
	/// exact rate instead.
	///
	/// Returns whether the rate actually changed.
	pub fn source_update_rate(&mut self, index: u32, rate: u32, passthrough: bool) -> bool {
		assert_ctl_context!();

		let desired = {
			let Some(s) = self.sources.get(&index) else { return false };

			let default_rate = s.default_rate;
			let alternate_rate = s.alternate_rate;

			if default_rate == alternate_rate {
				warn2!("default and alternate sample rates are the same");
				return false;
			}

			if s.state.is_running() {
				info2!("cannot update rate, source {index} is running at {} Hz", s.spec.rate);
				return false;
			}

			if !(RATE_MIN..=RATE_MAX).contains(&rate) {
				return false;
			}

			if passthrough {
				// The compressed stream dictates its exact rate.
				rate
			} else {
				debug_assert!(default_rate % 4_000 != 0 || default_rate % 11_025 != 0);

				// Pick whichever configured rate matches the
				// requested rate's family; no family match, no
				// switch.
				let use_alternate = if default_rate % 4_000 != 0 {
					// Default is of the 11025 family.
					alternate_rate % 4_000 == 0 && rate % 4_000 == 0
				} else {
					alternate_rate % 11_025 == 0 && rate % 11_025 == 0
				};

				if use_alternate { alternate_rate } else { default_rate }
			}
		};

		{
			let s = &self.sources[&index];
			if desired == s.spec.rate {
				return false;
			}

			if !passthrough && s.used_by() > 0 {
				return false;
			}
		}

		debug2!("suspending source {index} due to changing the sample rate");
		if self.source_suspend(index, true, SuspendCause::INTERNAL).is_err() {
			return false;
		}

		let updated = {
			let s = self.sources.get_mut(&index).unwrap();
			match s.driver.update_rate(desired) {
				Ok(()) => {
					s.spec.rate = desired;
					true
				},
				Err(e) => {
					debug2!("source {index}: rate update to {desired} Hz failed: {e}");
					false
				},
			}
		};

		drop(self.source_suspend(index, false, SuspendCause::INTERNAL));

		if updated {
			info2!("changed sampling rate of source {index} to {desired} Hz");

			// Corked streams get a chance to re-resample against
			// the new device spec.
			let outputs: Vec<u32> = self.sources[&index].outputs.iter().copied().collect();
			for output in outputs {
				let corked = self
					.source_outputs
					.get(&output)
					.map(|o| o.state == crate::stream::StreamState::Corked)
					.unwrap_or(false);
				if corked {
					drop(self.source_output_update_rate(output));
				}
			}
		}

		updated
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::{attach_output,flat_source,TestCore};
	use pretty_assertions::assert_eq;

	#[test]
	fn refused_while_running() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let _x = attach_output(&mut t, a);

		let before = t.core.source(a).unwrap().spec.rate;
		assert!(!t.core.source_update_rate(a, 48_000, false));
		assert_eq!(t.core.source(a).unwrap().spec.rate, before);
	}

	#[test]
	fn switches_family_while_idle() {
		let mut t = TestCore::new();
		// default 44100 (11025 family), alternate 48000 (4000 family)
		let a = flat_source(&mut t, "a");

		assert!(t.core.source_update_rate(a, 96_000, false));
		assert_eq!(t.core.source(a).unwrap().spec.rate, 48_000);
		assert_eq!(t.source_handles[&a].state.lock().unwrap().rates, vec![48_000]);

		// Device went back to idle afterwards.
		assert!(t.core.source(a).unwrap().state().is_opened());
	}

	#[test]
	fn family_mismatch_is_rejected() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");

		// 22050 matches the default family: no switch needed
		// because the default is already active.
		assert!(!t.core.source_update_rate(a, 22_050, false));
		// Out of global bounds.
		assert!(!t.core.source_update_rate(a, 4_000, false));
	}

	#[test]
	fn passthrough_takes_exact_rate() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");

		assert!(t.core.source_update_rate(a, 32_000, true));
		assert_eq!(t.core.source(a).unwrap().spec.rate, 32_000);
	}
}
