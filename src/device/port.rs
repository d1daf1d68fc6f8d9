//! Device ports: externally selectable I/O points.

//---------------------------------------------------------------------------------------------------- use
use crate::mixer::Direction;
use crate::sample::Usec;
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- Available
/// Whether a port is currently usable, as far as jack
/// detection can tell.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Available {
	/// No jack information; assume usable.
	#[default]
	Unknown,
	/// Nothing plugged in.
	No,
	/// Something plugged in.
	Yes,
}

//---------------------------------------------------------------------------------------------------- DevicePort
/// One selectable endpoint of a device (speakers, headphones,
/// line-in, …), bound to a mixer path and optionally one of the
/// path's settings.
#[derive(Clone,Debug)]
pub struct DevicePort {
	/// Unique name; `<path>` or `<path>;<setting>`.
	pub name: String,
	/// Human description.
	pub description: String,
	/// Which way audio flows through this port.
	pub direction: Direction,
	/// Higher priority ports are picked as defaults.
	pub priority: u32,
	/// Current availability, driven by jack events.
	pub available: Available,
	/// Extra latency this port adds, applied on activation.
	pub latency_offset: Usec,
	/// The mixer path this port activates.
	pub path_name: String,
	/// The setting within the path, if the path has several.
	pub setting_name: Option<String>,
}

impl DevicePort {
	/// A port with no mixer binding (devices without a probed
	/// path set still expose one nominal port).
	pub fn nominal(name: &str, description: &str, direction: Direction) -> Self {
		Self {
			name: name.to_owned(),
			description: description.to_owned(),
			direction,
			priority: 0,
			available: Available::Unknown,
			latency_offset: 0,
			path_name: String::new(),
			setting_name: None,
		}
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {}
