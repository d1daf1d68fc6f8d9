//! Streams: source outputs (capture side) and sink inputs
//! (playback side).

mod source_output;
pub use source_output::{SourceOutput,SourceOutputBuilder};

mod sink_input;
pub use sink_input::{SinkInput,SinkInputBuilder};

mod driver;
pub use driver::{
	SinkInputDriver,SinkInputIoDriver,
	SourceOutputDriver,SourceOutputIoDriver,
};

#[cfg(any(test, feature = "dummy"))]
pub use driver::{DummySinkInput,DummySinkInputHandle,DummySourceOutput,DummySourceOutputHandle};

//---------------------------------------------------------------------------------------------------- StreamState
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

/// The stream state machine:
///
/// ```text
/// INIT ──put──> RUNNING or CORKED
/// RUNNING <─> CORKED
/// RUNNING <─> DRAINED   (sink inputs, transient)
/// any ──unlink──> UNLINKED (terminal)
/// ```
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StreamState {
	/// Created but not yet published.
	#[default]
	Init,
	/// Actively producing/consuming.
	Running,
	/// Out of data but still attached (sink inputs only).
	Drained,
	/// Paused; does not keep the device from going idle.
	Corked,
	/// Removed; terminal.
	Unlinked,
}

impl StreamState {
	/// Is the stream past `put()` and not yet unlinked?
	pub const fn is_linked(self) -> bool {
		matches!(self, Self::Running | Self::Drained | Self::Corked)
	}

	/// Does the stream currently want data to flow?
	pub const fn is_active(self) -> bool {
		matches!(self, Self::Running | Self::Drained)
	}
}

//---------------------------------------------------------------------------------------------------- StreamFlags
/// Per-stream behavior toggles, set at creation.
#[allow(clippy::struct_excessive_bools)]
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreamFlags {
	/// The stream must never be moved to another device.
	pub dont_move: bool,
	/// The stream does not keep its device from auto-suspending.
	pub dont_inhibit_auto_suspend: bool,
	/// Kill the stream when its device suspends.
	pub kill_on_suspend: bool,
	/// Start in the corked state.
	pub start_corked: bool,
	/// The stream may change its rate after creation.
	pub variable_rate: bool,
	/// Never remap channels while resampling.
	pub no_remap: bool,
	/// Never remix channels while resampling.
	pub no_remix: bool,
	/// Take the device's sample format at creation.
	pub fix_format: bool,
	/// Take the device's rate at creation.
	pub fix_rate: bool,
	/// Take the device's channel map at creation.
	pub fix_channels: bool,
	/// Treat the stream as passthrough even for PCM formats.
	pub passthrough: bool,
	/// Fail creation instead of attaching to a suspended device.
	pub no_create_on_suspend: bool,
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn state_predicates() {
		assert!(!StreamState::Init.is_linked());
		assert!(StreamState::Corked.is_linked());
		assert!(!StreamState::Corked.is_active());
		assert!(StreamState::Drained.is_active());
		assert!(!StreamState::Unlinked.is_linked());
	}
}
