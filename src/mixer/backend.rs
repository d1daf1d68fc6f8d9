//! The hardware mixer seam.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::Position;
use crate::error::Error;
use crate::mixer::Direction;

//---------------------------------------------------------------------------------------------------- Channels
/// Index of one hardware-side mixer channel.
///
/// Channel `0` doubles as the mono channel, like the underlying
/// mixer APIs do.
pub type MixerChannel = usize;

/// Amount of addressable hardware mixer channels.
pub const MIXER_CHANNELS: usize = 9;

/// The hardware mixer channel a spatial position maps onto,
/// if the mixer API addresses it at all.
pub const fn mixer_channel(p: Position) -> Option<MixerChannel> {
	match p {
		Position::Mono        => Some(0),
		Position::FrontLeft   => Some(0),
		Position::FrontRight  => Some(1),
		Position::RearLeft    => Some(2),
		Position::RearRight   => Some(3),
		Position::FrontCenter => Some(4),
		Position::Lfe         => Some(5),
		Position::SideLeft    => Some(6),
		Position::SideRight   => Some(7),
		Position::RearCenter  => Some(8),
		_                     => None,
	}
}

//---------------------------------------------------------------------------------------------------- Rounding
/// Rounding direction when converting a decibel target into a
/// hardware volume step.
#[derive(Copy,Clone,Debug,PartialEq,Eq)]
pub enum Rounding {
	/// Round towards louder (playback rounds up).
	Up,
	/// Round towards quieter (capture rounds down).
	Down,
}

//---------------------------------------------------------------------------------------------------- MixerBackend
/// Operations of the hardware mixer driver referenced by the path
/// machinery.
///
/// Decibel values cross this interface in centibels (1/100 dB),
/// which is what the hardware APIs speak. Every operation may fail:
/// controls can disappear at runtime (USB unplug, firmware resets).
pub trait MixerBackend: Send {
	/// Does a simple mixer element with this name exist?
	fn has_element(&self, name: &str) -> bool;

	/// Does the element have a switch in `dir`?
	fn has_switch(&self, name: &str, dir: Direction) -> bool;

	/// Does the element have a volume in `dir`?
	fn has_volume(&self, name: &str, dir: Direction) -> bool;

	/// Is the element an enumeration?
	fn is_enumerated(&self, name: &str) -> bool;

	/// The raw volume step range `[min, max]`.
	fn volume_range(&self, name: &str, dir: Direction) -> Result<(i64, i64), Error>;

	/// The decibel range `[min, max]` in centibels,
	/// or `Err` if the element cannot report decibels.
	fn db_range(&self, name: &str, dir: Direction) -> Result<(i64, i64), Error>;

	/// The decibel value (centibels) of a raw volume step.
	fn ask_vol_db(&self, name: &str, dir: Direction, step: i64) -> Result<i64, Error>;

	/// The raw volume step closest to a decibel value (centibels).
	fn ask_db_vol(&self, name: &str, dir: Direction, db: i64, rounding: Rounding) -> Result<i64, Error>;

	/// Is the element mono in `dir`?
	fn is_mono(&self, name: &str, dir: Direction) -> bool;

	/// Does the element have channel `ch` in `dir`?
	fn has_channel(&self, name: &str, dir: Direction, ch: MixerChannel) -> bool;

	/// Read the raw volume step of one channel.
	fn get_volume(&self, name: &str, dir: Direction, ch: MixerChannel) -> Result<i64, Error>;

	/// Write the raw volume step of one channel.
	fn set_volume(&mut self, name: &str, dir: Direction, ch: MixerChannel, step: i64) -> Result<(), Error>;

	/// Write the raw volume step of every channel.
	fn set_volume_all(&mut self, name: &str, dir: Direction, step: i64) -> Result<(), Error>;

	/// Read the decibel value (centibels) of one channel.
	fn get_db(&self, name: &str, dir: Direction, ch: MixerChannel) -> Result<i64, Error>;

	/// Write a decibel value (centibels) to one channel,
	/// returning the decibel value actually selected.
	fn set_db(&mut self, name: &str, dir: Direction, ch: MixerChannel, db: i64, rounding: Rounding) -> Result<i64, Error>;

	/// Write a decibel value (centibels) to every channel.
	fn set_db_all(&mut self, name: &str, dir: Direction, db: i64, rounding: Rounding) -> Result<(), Error>;

	/// Read the switch of the element (channel 0 stands for all).
	fn get_switch(&self, name: &str, dir: Direction) -> Result<bool, Error>;

	/// Write the switch of every channel.
	fn set_switch_all(&mut self, name: &str, dir: Direction, on: bool) -> Result<(), Error>;

	/// The item names of an enumeration element.
	fn enum_items(&self, name: &str) -> Result<Vec<String>, Error>;

	/// Select an enumeration item on every channel.
	fn set_enum_item(&mut self, name: &str, idx: usize) -> Result<(), Error>;

	/// Does a jack (plug detection) control with this name exist?
	fn has_jack(&self, name: &str) -> bool;

	/// Is the jack currently plugged?
	fn jack_plugged(&self, name: &str) -> Result<bool, Error>;
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {}
