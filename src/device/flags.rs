//! Device capability flags.

//---------------------------------------------------------------------------------------------------- DeviceFlags
/// What a device can do, each independently toggleable.
///
/// The flags double as the contract for the driver object: a flag
/// that is set promises that the corresponding driver method is
/// actually implemented (checked at `put()` as far as possible).
#[allow(clippy::struct_excessive_bools)]
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceFlags {
	/// The device can report its latency.
	pub latency: bool,
	/// The latency can be adjusted at runtime; without this the
	/// device runs at one fixed latency.
	pub dynamic_latency: bool,
	/// The hardware has a volume control.
	pub hw_volume_ctrl: bool,
	/// The hardware has a mute control.
	pub hw_mute_ctrl: bool,
	/// Hardware volume changes are applied asynchronously on the
	/// IO thread, scheduled to stay in step with the audio.
	pub deferred_volume: bool,
	/// The hardware volume is calibrated in decibels.
	pub decibel_volume: bool,
	/// Flat-volume mode: the device volume tracks the loudest
	/// attached stream.
	pub flat_volume: bool,
	/// This device is a filter whose volume merges into its
	/// master's volume tree.
	pub share_volume_with_master: bool,
}

impl DeviceFlags {
	/// No capabilities at all.
	pub const NONE: Self = Self {
		latency: false,
		dynamic_latency: false,
		hw_volume_ctrl: false,
		hw_mute_ctrl: false,
		deferred_volume: false,
		decibel_volume: false,
		flat_volume: false,
		share_volume_with_master: false,
	};

	/// The flag combinations that make no sense together.
	///
	/// Deferred volume needs a hardware volume to defer; volume
	/// sharing excludes a hardware volume of its own (the master
	/// owns the hardware).
	pub const fn is_consistent(&self) -> bool {
		if self.deferred_volume && !self.hw_volume_ctrl {
			return false;
		}
		if self.share_volume_with_master && (self.hw_volume_ctrl || self.hw_mute_ctrl) {
			return false;
		}
		true
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn consistency() {
		assert!(DeviceFlags::NONE.is_consistent());
		assert!(!DeviceFlags { deferred_volume: true, ..DeviceFlags::NONE }.is_consistent());
		assert!(DeviceFlags { deferred_volume: true, hw_volume_ctrl: true, ..DeviceFlags::NONE }.is_consistent());
		assert!(!DeviceFlags {
			share_volume_with_master: true,
			hw_volume_ctrl: true,
			..DeviceFlags::NONE
		}.is_consistent());
	}
}
