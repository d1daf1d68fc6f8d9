//! Error kinds reported by the device core.

//---------------------------------------------------------------------------------------------------- use
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- Error
/// All errors the device core reports to its callers.
///
/// Hardware- and driver-level failures are folded into these
/// kinds at the seam where they occur; the operation that
/// failed is apparent from the call that returned the error.
#[derive(Copy,Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[derive(thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Error {
	/// Malformed input (invalid sample spec, channel map, volume, name, …).
	Invalid,
	/// The operation is disabled by the device/stream flags,
	/// or the implementor does not provide it.
	NotSupported,
	/// The operation is not allowed in the current state
	/// (e.g. the device is suspended or already unlinked).
	BadState,
	/// A named entity (port, path, mapping, …) does not exist.
	NoEntity,
	/// A fixed capacity was exceeded
	/// (e.g. too many streams attached to one device).
	TooLarge,
	/// Mutually-exclusive access was refused
	/// (e.g. a second passthrough stream on the same device).
	Busy,
	/// A message reached an implementor that does not handle it.
	///
	/// Seeing this error is a bug in the implementor, not in the caller.
	NotImplemented,
}

impl Error {
	/// Short description used in log output.
	pub const fn as_log_str(self) -> &'static str {
		match self {
			Self::Invalid        => "invalid argument",
			Self::NotSupported   => "operation not supported",
			Self::BadState       => "bad state",
			Self::NoEntity       => "no such entity",
			Self::TooLarge       => "too large",
			Self::Busy           => "device or resource busy",
			Self::NotImplemented => "not implemented",
		}
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_is_snake_case() {
		assert_eq!(Error::NotSupported.to_string(), "not_supported");
		assert_eq!(Error::NoEntity.as_ref(), "no_entity");
	}
}
