//! Stream formats and format-list negotiation.

//---------------------------------------------------------------------------------------------------- use
use crate::error::Error;
use crate::sample::{SampleSpec,RATE_MAX,RATE_MIN};
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- Encoding
/// The encoding carried by a stream.
///
/// Everything other than [`Encoding::Pcm`] is a compressed
/// bitstream that is forwarded unmodified (passthrough): it
/// excludes mixing and volume and is exclusive on a device.
#[derive(Copy,Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "kebab-case")]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Encoding {
	/// Plain PCM samples; the only mixable encoding.
	Pcm,
	/// AC-3 frames wrapped in IEC 61937.
	Ac3Iec61937,
	/// E-AC-3 frames wrapped in IEC 61937.
	Eac3Iec61937,
	/// DTS frames wrapped in IEC 61937.
	DtsIec61937,
	/// MPEG frames wrapped in IEC 61937.
	MpegIec61937,
}

impl Encoding {
	/// Is this encoding a compressed passthrough bitstream?
	pub const fn is_passthrough(self) -> bool {
		!matches!(self, Self::Pcm)
	}
}

//---------------------------------------------------------------------------------------------------- FormatInfo
/// One entry of a stream's requested format list or a
/// device's advertised format list.
///
/// `rate`/`channels` of `None` mean "anything the device does".
#[derive(Copy,Clone,Debug,PartialEq,Eq,Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormatInfo {
	/// The encoding.
	pub encoding: Encoding,
	/// Accepted sample rate, if constrained.
	pub rate: Option<u32>,
	/// Accepted channel count, if constrained.
	pub channels: Option<u8>,
}

impl FormatInfo {
	/// An unconstrained PCM format.
	pub const PCM_ANY: Self = Self {
		encoding: Encoding::Pcm,
		rate:     None,
		channels: None,
	};

	/// A passthrough format at a fixed rate.
	pub const fn passthrough(encoding: Encoding, rate: u32) -> Self {
		Self { encoding, rate: Some(rate), channels: Some(2) }
	}

	/// Is this format sane?
	pub fn is_valid(&self) -> bool {
		match self.rate {
			Some(r) if !(RATE_MIN..=RATE_MAX).contains(&r) => return false,
			_ => {},
		}
		!matches!(self.channels, Some(0))
	}

	/// Can a stream requesting `self` run on a device advertising `other`?
	///
	/// Encodings must be equal; a constrained rate/channel count on
	/// either side must match the other side's constraint (or the
	/// other side must be unconstrained).
	pub fn compatible(&self, other: &Self) -> bool {
		if self.encoding != other.encoding {
			return false;
		}

		let rate_ok = match (self.rate, other.rate) {
			(Some(a), Some(b)) => a == b,
			_ => true,
		};
		let channels_ok = match (self.channels, other.channels) {
			(Some(a), Some(b)) => a == b,
			_ => true,
		};

		rate_ok && channels_ok
	}

	/// Resolve this (possibly unconstrained) format into a concrete
	/// sample spec, filling gaps from `fallback`.
	pub fn to_sample_spec(&self, fallback: &SampleSpec) -> SampleSpec {
		SampleSpec {
			format:   fallback.format,
			rate:     self.rate.unwrap_or(fallback.rate),
			channels: self.channels.unwrap_or(fallback.channels),
		}
	}
}

impl Default for FormatInfo {
	fn default() -> Self {
		Self::PCM_ANY
	}
}

impl std::fmt::Display for FormatInfo {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.encoding)?;
		if let Some(r) = self.rate {
			write!(f, " @{r}Hz")?;
		}
		if let Some(c) = self.channels {
			write!(f, " {c}ch")?;
		}
		Ok(())
	}
}

//---------------------------------------------------------------------------------------------------- Negotiation
/// Pick the stream format to use: the first requested entry that is
/// compatible with any advertised entry (request order wins).
pub fn negotiate(requested: &[FormatInfo], advertised: &[FormatInfo]) -> Result<FormatInfo, Error> {
	if requested.is_empty() || advertised.is_empty() {
		return Err(Error::Invalid);
	}

	for req in requested {
		if !req.is_valid() {
			return Err(Error::Invalid);
		}

		for adv in advertised {
			if req.compatible(adv) {
				// Narrow the winner by the advertised constraints.
				return Ok(FormatInfo {
					encoding: req.encoding,
					rate:     req.rate.or(adv.rate),
					channels: req.channels.or(adv.channels),
				});
			}
		}
	}

	Err(Error::NotSupported)
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn pcm_always_negotiates_against_pcm_any() {
		let req = [FormatInfo { encoding: Encoding::Pcm, rate: Some(48_000), channels: Some(2) }];
		let adv = [FormatInfo::PCM_ANY];
		let out = negotiate(&req, &adv).unwrap();
		assert_eq!(out.rate, Some(48_000));
	}

	#[test]
	fn request_order_wins() {
		let req = [
			FormatInfo::passthrough(Encoding::Ac3Iec61937, 48_000),
			FormatInfo::PCM_ANY,
		];
		let adv = [
			FormatInfo::PCM_ANY,
			FormatInfo::passthrough(Encoding::Ac3Iec61937, 48_000),
		];
		assert_eq!(negotiate(&req, &adv).unwrap().encoding, Encoding::Ac3Iec61937);
	}

	#[test]
	fn no_common_format() {
		let req = [FormatInfo::passthrough(Encoding::DtsIec61937, 48_000)];
		let adv = [FormatInfo::PCM_ANY];
		assert_eq!(negotiate(&req, &adv), Err(Error::NotSupported));
	}

	#[test]
	fn rate_conflict_rejected() {
		let req = [FormatInfo { encoding: Encoding::Pcm, rate: Some(44_100), channels: None }];
		let adv = [FormatInfo { encoding: Encoding::Pcm, rate: Some(48_000), channels: None }];
		assert_eq!(negotiate(&req, &adv), Err(Error::NotSupported));
	}
}
