//! Output schema of the mixer path configuration format.
//!
//! The configuration file parser lives outside this crate; these
//! types are what it produces. A [`crate::mixer::Path`] is built
//! from a [`PathConfig`] and then probed against a
//! [`crate::mixer::MixerBackend`].

//---------------------------------------------------------------------------------------------------- use
use crate::channel::PositionMask;
use crate::mixer::Direction;
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- Required
/// The `required` / `required-any` / `required-absent` keys.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Required {
	/// No requirement.
	#[default]
	Ignore,
	/// Any capability satisfies the requirement.
	Any,
	/// A switch must be present.
	Switch,
	/// A volume must be present.
	Volume,
	/// An enumeration must be present.
	Enumeration,
}

//---------------------------------------------------------------------------------------------------- PathGeneral
/// The `[General]` section of a path file.
#[derive(Clone,Debug,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PathGeneral {
	/// Path priority; higher wins when picking default ports.
	pub priority: u32,
	/// Human description; falls back over `description_key` lookup,
	/// then the path name.
	pub description: Option<String>,
	/// Key into the well-known description table.
	pub description_key: Option<String>,
	/// Mute the hardware while this path is being activated.
	pub mute_during_activation: bool,
	/// HDMI ELD device index, if any.
	pub eld_device: Option<i32>,
}

impl Default for PathGeneral {
	fn default() -> Self {
		Self {
			priority: 0,
			description: None,
			description_key: None,
			mute_during_activation: false,
			eld_device: None,
		}
	}
}

//---------------------------------------------------------------------------------------------------- JackConfig
/// One `[Jack <name>]` section.
#[derive(Clone,Debug,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JackConfig {
	/// The jack control name (without the trailing " Jack").
	pub name: String,
	/// Availability the port reports while plugged.
	pub state_plugged: crate::device::port::Available,
	/// Availability the port reports while unplugged.
	pub state_unplugged: crate::device::port::Available,
	/// Presence requirement.
	#[cfg_attr(feature = "serde", serde(default))]
	pub required: Required,
	/// Contributes to path validity if at least one
	/// `required-any` entity is present.
	#[cfg_attr(feature = "serde", serde(default))]
	pub required_any: Required,
	/// Absence requirement.
	#[cfg_attr(feature = "serde", serde(default))]
	pub required_absent: Required,
}

//---------------------------------------------------------------------------------------------------- SwitchConfig / VolumeConfig / EnumConfig
/// The `switch =` key of an element section.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SwitchConfig {
	/// Leave the switch alone.
	#[default]
	Ignore,
	/// Use the switch as the path's mute control.
	Mute,
	/// Force the switch on during activation.
	On,
	/// Force the switch off during activation.
	Off,
	/// Expose the switch as an on/off setting.
	Select,
}

/// The `volume =` key of an element section.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VolumeConfig {
	/// Leave the volume alone.
	#[default]
	Ignore,
	/// Merge this element into the path's volume slider.
	Merge,
	/// Force the element to its minimum.
	Off,
	/// Force the element to 0 dB.
	Zero,
	/// Force the element to a constant raw step.
	Constant(i64),
}

/// The `enumeration =` key of an element section.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EnumConfig {
	/// Leave the enumeration alone.
	#[default]
	Ignore,
	/// Expose the enumeration items as settings.
	Select,
}

//---------------------------------------------------------------------------------------------------- ElementConfig
/// One `[Element <name>]` section.
#[derive(Clone,Debug,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementConfig {
	/// The mixer element name.
	pub name: String,
	/// Switch usage.
	#[cfg_attr(feature = "serde", serde(default))]
	pub switch: SwitchConfig,
	/// Volume usage.
	#[cfg_attr(feature = "serde", serde(default))]
	pub volume: VolumeConfig,
	/// Enumeration usage.
	#[cfg_attr(feature = "serde", serde(default))]
	pub enumeration: EnumConfig,
	/// Direction to address the element in; defaults to the path's.
	pub direction: Option<Direction>,
	/// Fall back to the opposite direction if the requested one
	/// has no control.
	#[cfg_attr(feature = "serde", serde(default))]
	pub direction_try_other: bool,
	/// Highest raw volume step the path may drive (`volume-limit`).
	pub volume_limit: Option<i64>,
	/// `override-map.1`: masks for the mono layout.
	pub override_map_1: Option<[PositionMask; 1]>,
	/// `override-map.2`: masks for the two-channel layout.
	pub override_map_2: Option<[PositionMask; 2]>,
	/// Presence requirement.
	#[cfg_attr(feature = "serde", serde(default))]
	pub required: Required,
	/// Required-any contribution.
	#[cfg_attr(feature = "serde", serde(default))]
	pub required_any: Required,
	/// Absence requirement.
	#[cfg_attr(feature = "serde", serde(default))]
	pub required_absent: Required,
}

impl ElementConfig {
	/// A bare element with every use set to ignore.
	pub fn new(name: &str) -> Self {
		Self {
			name: name.to_owned(),
			switch: SwitchConfig::Ignore,
			volume: VolumeConfig::Ignore,
			enumeration: EnumConfig::Ignore,
			direction: None,
			direction_try_other: false,
			volume_limit: None,
			override_map_1: None,
			override_map_2: None,
			required: Required::Ignore,
			required_any: Required::Ignore,
			required_absent: Required::Ignore,
		}
	}
}

//---------------------------------------------------------------------------------------------------- OptionConfig
/// One `[Option <element>:<option>]` section.
#[derive(Clone,Debug,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptionConfig {
	/// The element the option belongs to.
	pub element: String,
	/// The hardware-side value name: an enumeration item, or
	/// `on`/`off` for select switches.
	pub alsa_name: String,
	/// The short tag resolved through the well-known name map.
	pub name: Option<String>,
	/// Setting priority.
	#[cfg_attr(feature = "serde", serde(default))]
	pub priority: u32,
	/// Presence requirement.
	#[cfg_attr(feature = "serde", serde(default))]
	pub required: Required,
	/// Required-any contribution.
	#[cfg_attr(feature = "serde", serde(default))]
	pub required_any: Required,
	/// Absence requirement.
	#[cfg_attr(feature = "serde", serde(default))]
	pub required_absent: Required,
}

//---------------------------------------------------------------------------------------------------- PathConfig
/// A whole parsed path file.
#[derive(Clone,Debug,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathConfig {
	/// The path name (the file stem).
	pub name: String,
	/// Which direction the path serves.
	pub direction: Direction,
	/// The `[General]` section.
	#[cfg_attr(feature = "serde", serde(default))]
	pub general: PathGeneral,
	/// `[Jack …]` sections, in file order.
	#[cfg_attr(feature = "serde", serde(default))]
	pub jacks: Vec<JackConfig>,
	/// `[Element …]` sections, in file order.
	///
	/// INVARIANT: order matters; it is the order volume is
	/// distributed over the elements.
	#[cfg_attr(feature = "serde", serde(default))]
	pub elements: Vec<ElementConfig>,
	/// `[Option …]` sections, in file order.
	#[cfg_attr(feature = "serde", serde(default))]
	pub options: Vec<OptionConfig>,
}

impl PathConfig {
	/// A minimal config with no sections.
	pub fn new(name: &str, direction: Direction) -> Self {
		Self {
			name: name.to_owned(),
			direction,
			general: PathGeneral::default(),
			jacks: Vec::new(),
			elements: Vec::new(),
			options: Vec::new(),
		}
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {}
