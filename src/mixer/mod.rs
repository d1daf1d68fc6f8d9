//! The port-and-path mixer abstraction.
//!
//! A [`Path`] binds a device to a graph of hardware mixer controls
//! (switches, volumes, enumerations, jack detection). A [`PathSet`]
//! is all paths applicable to one device direction, probed against
//! the hardware, deduplicated and condensed, then resolved into the
//! user-visible device ports.

mod backend;
pub use backend::{MixerBackend,MixerChannel,Rounding,MIXER_CHANNELS,mixer_channel};

#[cfg(any(test, feature = "dummy"))]
mod dummy;
#[cfg(any(test, feature = "dummy"))]
pub use dummy::{DummyElement,DummyMixer,DummyVolume};

mod db_fix;
pub use db_fix::DecibelFix;

mod config;
pub use config::{
	ElementConfig,EnumConfig,JackConfig,OptionConfig,
	PathConfig,PathGeneral,Required,SwitchConfig,VolumeConfig,
};

mod element;
pub use element::{Element,PathOption};
pub(crate) use element::lookup_description;

mod jack;
pub use jack::Jack;

mod path;
pub use path::{Path,Setting};

mod path_set;
pub use path_set::PathSet;

//---------------------------------------------------------------------------------------------------- Direction
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

/// Which way audio flows through a control, path, port or mapping.
#[derive(Copy,Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Direction {
	/// Towards the speakers.
	Playback,
	/// From the microphone.
	Capture,
}

impl Direction {
	/// The other direction.
	pub const fn other(self) -> Self {
		match self {
			Self::Playback => Self::Capture,
			Self::Capture  => Self::Playback,
		}
	}
}
