//! Device state machine and suspend causes.

//---------------------------------------------------------------------------------------------------- use
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- DeviceState
/// The device state machine:
///
/// ```text
/// INIT ──put──> IDLE or SUSPENDED
/// IDLE <─> RUNNING      (streams attach / last non-corked leaves)
/// IDLE <─> SUSPENDED    (suspend causes set / cleared)
/// any ──unlink──> UNLINKED (terminal)
/// ```
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeviceState {
	/// Created but not yet published.
	#[default]
	Init,
	/// Open and capturing/playing for at least one running stream.
	Running,
	/// Open but no running stream needs data.
	Idle,
	/// Closed by one or more suspend causes.
	Suspended,
	/// Removed; terminal.
	Unlinked,
}

impl DeviceState {
	/// Is the device past `put()` and not yet unlinked?
	pub const fn is_linked(self) -> bool {
		matches!(self, Self::Running | Self::Idle | Self::Suspended)
	}

	/// Is the backing hardware open right now?
	pub const fn is_opened(self) -> bool {
		matches!(self, Self::Running | Self::Idle)
	}

	/// Is the device actively moving samples?
	pub const fn is_running(self) -> bool {
		matches!(self, Self::Running)
	}
}

//---------------------------------------------------------------------------------------------------- SuspendCause
/// Why a device is suspended; a bitmask so that independent
/// subsystems can each hold their own cause.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq,Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SuspendCause(pub u32);

impl SuspendCause {
	/// No cause; the device may run.
	pub const NONE: Self = Self(0);
	/// An application asked for the suspension.
	pub const APPLICATION: Self = Self(1);
	/// The user asked for it.
	pub const USER: Self = Self(1 << 1);
	/// Auto-suspended after idling.
	pub const IDLE: Self = Self(1 << 2);
	/// The login session lost access to the hardware.
	pub const SESSION: Self = Self(1 << 3);
	/// A passthrough stream claimed the device exclusively.
	pub const PASSTHROUGH: Self = Self(1 << 4);
	/// Internal bookkeeping (e.g. around a rate switch).
	pub const INTERNAL: Self = Self(1 << 5);

	/// Is any cause set?
	pub const fn any(self) -> bool {
		self.0 != 0
	}

	/// Are all bits of `other` set in `self`?
	pub const fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}

	/// Set the bits of `other`.
	pub const fn with(self, other: Self) -> Self {
		Self(self.0 | other.0)
	}

	/// Clear the bits of `other`.
	pub const fn without(self, other: Self) -> Self {
		Self(self.0 & !other.0)
	}
}

impl std::ops::BitOr for SuspendCause {
	type Output = Self;
	fn bitor(self, other: Self) -> Self {
		self.with(other)
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn state_predicates() {
		assert!(!DeviceState::Init.is_linked());
		assert!(DeviceState::Idle.is_opened());
		assert!(DeviceState::Running.is_opened());
		assert!(!DeviceState::Suspended.is_opened());
		assert!(DeviceState::Suspended.is_linked());
		assert!(!DeviceState::Unlinked.is_linked());
	}

	#[test]
	fn causes_are_independent() {
		let c = SuspendCause::IDLE | SuspendCause::SESSION;
		assert!(c.any());
		assert!(c.contains(SuspendCause::IDLE));

		let c = c.without(SuspendCause::IDLE);
		assert!(c.any());
		assert!(!c.contains(SuspendCause::IDLE));

		let c = c.without(SuspendCause::SESSION);
		assert!(!c.any());
	}
}
