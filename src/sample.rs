//! Sample formats and specifications.

//---------------------------------------------------------------------------------------------------- use
use crate::error::Error;
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- Constants
/// Maximum amount of channels a [`SampleSpec`] can describe.
pub const CHANNELS_MAX: usize = 32;

/// Lowest sample rate a device or stream may use.
pub const RATE_MIN: u32 = 8_000;

/// Highest sample rate a device or stream may use.
pub const RATE_MAX: u32 = 384_000;

/// Time unit used throughout the crate: microseconds.
pub type Usec = u64;

/// One second in [`Usec`].
pub const USEC_PER_SEC: Usec = 1_000_000;

/// One millisecond in [`Usec`].
pub const USEC_PER_MSEC: Usec = 1_000;

//---------------------------------------------------------------------------------------------------- SampleFormat
/// On-the-wire encoding of a single PCM sample.
#[derive(Copy,Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SampleFormat {
	/// Signed 16-bit little endian.
	S16Le,
	/// 32-bit IEEE float little endian, nominal range `-1.0..=1.0`.
	F32Le,
}

impl SampleFormat {
	/// Size of one sample of this format, in bytes.
	pub const fn sample_size(self) -> usize {
		match self {
			Self::S16Le => 2,
			Self::F32Le => 4,
		}
	}
}

//---------------------------------------------------------------------------------------------------- SampleSpec
/// A full sample specification: format, rate, channel count.
#[derive(Copy,Clone,Debug,PartialEq,Eq,Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleSpec {
	/// The sample encoding.
	pub format: SampleFormat,
	/// Frames per second.
	pub rate: u32,
	/// Channels per frame.
	pub channels: u8,
}

impl SampleSpec {
	/// A commonly useful default: stereo float at 44.1kHz.
	pub const DEFAULT: Self = Self {
		format:   SampleFormat::F32Le,
		rate:     44_100,
		channels: 2,
	};

	/// Is this spec expressible by the device core?
	///
	/// ```rust
	/// # use resona::sample::*;
	/// assert!(SampleSpec::DEFAULT.is_valid());
	/// assert!(!SampleSpec { rate: 0, ..SampleSpec::DEFAULT }.is_valid());
	/// ```
	pub const fn is_valid(&self) -> bool {
		self.rate >= RATE_MIN
			&& self.rate <= RATE_MAX
			&& self.channels > 0
			&& self.channels as usize <= CHANNELS_MAX
	}

	/// Same as [`Self::is_valid`] but as a `Result` for `?` chains.
	pub const fn validate(&self) -> Result<(), Error> {
		if self.is_valid() { Ok(()) } else { Err(Error::Invalid) }
	}

	/// Size of one frame (all channels of one sampling instant), in bytes.
	pub const fn frame_size(&self) -> usize {
		self.format.sample_size() * self.channels as usize
	}

	/// Round `length` (bytes) down to a whole amount of frames.
	pub const fn frame_align(&self, length: usize) -> usize {
		length - (length % self.frame_size())
	}

	/// Is `length` (bytes) a whole amount of frames?
	pub const fn frame_aligned(&self, length: usize) -> bool {
		length % self.frame_size() == 0
	}

	/// How many bytes are played/captured in `usec` at this spec?
	///
	/// The result is frame aligned.
	pub const fn usec_to_bytes(&self, usec: Usec) -> usize {
		let bytes = (usec as u128 * self.rate as u128 / USEC_PER_SEC as u128) as usize
			* self.frame_size();
		bytes
	}

	/// How long does playing/capturing `bytes` take at this spec?
	pub const fn bytes_to_usec(&self, bytes: usize) -> Usec {
		let frames = bytes / self.frame_size();
		(frames as u128 * USEC_PER_SEC as u128 / self.rate as u128) as Usec
	}

	/// Do two specs describe byte-identical data?
	pub fn equal(&self, other: &Self) -> bool {
		self == other
	}
}

impl Default for SampleSpec {
	fn default() -> Self {
		Self::DEFAULT
	}
}

impl std::fmt::Display for SampleSpec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}ch {}Hz {}", self.channels, self.rate, self.format)
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn frame_size() {
		let s = SampleSpec { format: SampleFormat::S16Le, rate: 48_000, channels: 2 };
		assert_eq!(s.frame_size(), 4);
		assert_eq!(s.frame_align(1027), 1024);
		assert!(s.frame_aligned(1024));
		assert!(!s.frame_aligned(1026 + 1));
	}

	#[test]
	fn usec_bytes_round_trip() {
		let s = SampleSpec { format: SampleFormat::F32Le, rate: 50_000, channels: 2 };
		// 1 second == rate frames == rate * frame_size bytes.
		assert_eq!(s.usec_to_bytes(USEC_PER_SEC), 50_000 * 8);
		assert_eq!(s.bytes_to_usec(50_000 * 8), USEC_PER_SEC);
		// 250ms at 50kHz stereo f32.
		assert_eq!(s.usec_to_bytes(250_000), 12_500 * 8);
	}

	#[test]
	fn validity() {
		assert!(SampleSpec::DEFAULT.is_valid());
		assert!(!SampleSpec { channels: 0, ..SampleSpec::DEFAULT }.is_valid());
		assert!(!SampleSpec { rate: 4_000, ..SampleSpec::DEFAULT }.is_valid());
		assert!(!SampleSpec { rate: RATE_MAX + 1, ..SampleSpec::DEFAULT }.is_valid());
	}
}
