//! Channel positions, position masks, channel maps.

//---------------------------------------------------------------------------------------------------- use
use crate::error::Error;
use crate::sample::{SampleSpec,CHANNELS_MAX};
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- Position
/// Abstract spatial position of one channel in a sample frame.
#[allow(missing_docs)]
#[derive(Copy,Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "kebab-case")]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u8)]
pub enum Position {
	/// A channel carrying everything (single-channel layouts).
	Mono = 0,

	FrontLeft,
	FrontRight,
	FrontCenter,

	RearLeft,
	RearRight,
	RearCenter,

	/// Low frequency effects (subwoofer).
	Lfe,

	FrontLeftOfCenter,
	FrontRightOfCenter,

	SideLeft,
	SideRight,

	TopCenter,
	TopFrontLeft,
	TopFrontRight,
	TopFrontCenter,
	TopRearLeft,
	TopRearRight,
	TopRearCenter,

	Aux0,
	Aux1,
	Aux2,
	Aux3,
}

impl Position {
	/// Amount of distinct positions.
	pub const COUNT: usize = 23;

	/// The bit of this position inside a [`PositionMask`].
	pub const fn mask(self) -> PositionMask {
		PositionMask(1 << self as u64)
	}

	/// Is this a left-ish position?
	pub const fn is_left(self) -> bool {
		matches!(self,
			Self::FrontLeft | Self::RearLeft | Self::FrontLeftOfCenter |
			Self::SideLeft | Self::TopFrontLeft | Self::TopRearLeft)
	}

	/// Is this a right-ish position?
	pub const fn is_right(self) -> bool {
		matches!(self,
			Self::FrontRight | Self::RearRight | Self::FrontRightOfCenter |
			Self::SideRight | Self::TopFrontRight | Self::TopRearRight)
	}

	/// Is this a front-ish position?
	pub const fn is_front(self) -> bool {
		matches!(self,
			Self::FrontLeft | Self::FrontRight | Self::FrontCenter |
			Self::FrontLeftOfCenter | Self::FrontRightOfCenter |
			Self::TopFrontLeft | Self::TopFrontRight | Self::TopFrontCenter)
	}

	/// Is this a rear-ish position?
	pub const fn is_rear(self) -> bool {
		matches!(self,
			Self::RearLeft | Self::RearRight | Self::RearCenter |
			Self::TopRearLeft | Self::TopRearRight | Self::TopRearCenter)
	}

	/// Is this a center-ish position?
	pub const fn is_center(self) -> bool {
		matches!(self,
			Self::FrontCenter | Self::RearCenter | Self::TopCenter |
			Self::TopFrontCenter | Self::TopRearCenter)
	}

	/// Is this a side position?
	pub const fn is_side(self) -> bool {
		matches!(self, Self::SideLeft | Self::SideRight)
	}

	/// Is this an elevated position?
	pub const fn is_top(self) -> bool {
		matches!(self,
			Self::TopCenter | Self::TopFrontLeft | Self::TopFrontRight |
			Self::TopFrontCenter | Self::TopRearLeft | Self::TopRearRight |
			Self::TopRearCenter)
	}

	/// All positions, in declaration order.
	pub fn all() -> impl Iterator<Item = Self> {
		<Self as strum::IntoEnumIterator>::iter()
	}
}

//---------------------------------------------------------------------------------------------------- PositionMask
/// A set of [`Position`]s, one bit per position.
///
/// Masks appear in mixer-path configuration (`override-map.N`) and
/// in the element probe, where they describe which abstract positions
/// one hardware mixer channel controls.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq,Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PositionMask(pub u64);

impl PositionMask {
	/// The empty mask.
	pub const NONE: Self = Self(0);

	/// Every position.
	pub const ALL: Self = Self((1 << Position::COUNT as u64) - 1);

	/// Does this mask contain `p`?
	pub const fn contains(self, p: Position) -> bool {
		self.0 & p.mask().0 != 0
	}

	/// Does this mask share any position with `other`?
	pub const fn intersects(self, other: Self) -> bool {
		self.0 & other.0 != 0
	}

	/// Union.
	pub const fn union(self, other: Self) -> Self {
		Self(self.0 | other.0)
	}

	/// Is this the empty mask?
	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Build a mask from a predicate over all positions.
	fn matching(f: impl Fn(Position) -> bool) -> Self {
		Position::all().filter(|p| f(*p)).fold(Self::NONE, |m, p| m.union(p.mask()))
	}
}

impl std::ops::BitOr for PositionMask {
	type Output = Self;
	fn bitor(self, other: Self) -> Self {
		self.union(other)
	}
}

impl std::ops::BitOrAssign for PositionMask {
	fn bitor_assign(&mut self, other: Self) {
		self.0 |= other.0;
	}
}

impl std::str::FromStr for PositionMask {
	type Err = Error;

	/// Parse the mask syntax of the path configuration format.
	///
	/// `all`, `all-left`, `all-right`, `all-front`, `all-rear`,
	/// `all-center`, `all-side`, `all-top`, `all-no-lfe`,
	/// or the name of a single channel position.
	fn from_str(s: &str) -> Result<Self, Error> {
		Ok(match s {
			"all"        => Self::ALL,
			"all-left"   => Self::matching(Position::is_left),
			"all-right"  => Self::matching(Position::is_right),
			"all-front"  => Self::matching(Position::is_front),
			"all-rear"   => Self::matching(Position::is_rear),
			"all-center" => Self::matching(Position::is_center),
			"all-side"   => Self::matching(Position::is_side),
			"all-top"    => Self::matching(Position::is_top),
			"all-no-lfe" => Self::matching(|p| p != Position::Lfe),
			other        => other.parse::<Position>().map_err(|_| Error::Invalid)?.mask(),
		})
	}
}

//---------------------------------------------------------------------------------------------------- ChannelMap
/// Ordered assignment of [`Position`]s to the channels of a sample buffer.
#[derive(Copy,Clone,Debug,PartialEq,Eq,Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelMap {
	/// How many entries of `map` are in use.
	pub channels: u8,
	/// The position of each channel.
	pub map: [Position; CHANNELS_MAX],
}

impl ChannelMap {
	/// Single channel, mono.
	pub const MONO: Self = {
		let mut map = [Position::Mono; CHANNELS_MAX];
		map[0] = Position::Mono;
		Self { channels: 1, map }
	};

	/// Standard stereo.
	pub const STEREO: Self = {
		let mut map = [Position::Mono; CHANNELS_MAX];
		map[0] = Position::FrontLeft;
		map[1] = Position::FrontRight;
		Self { channels: 2, map }
	};

	/// 5.1 surround.
	pub const SURROUND_5_1: Self = {
		let mut map = [Position::Mono; CHANNELS_MAX];
		map[0] = Position::FrontLeft;
		map[1] = Position::FrontRight;
		map[2] = Position::RearLeft;
		map[3] = Position::RearRight;
		map[4] = Position::FrontCenter;
		map[5] = Position::Lfe;
		Self { channels: 6, map }
	};

	/// A reasonable default map for `channels` channels,
	/// or `None` for channel counts with no well-known layout.
	pub fn default_for(channels: u8) -> Option<Self> {
		match channels {
			1 => Some(Self::MONO),
			2 => Some(Self::STEREO),
			6 => Some(Self::SURROUND_5_1),
			_ => None,
		}
	}

	/// Is this map internally consistent?
	pub const fn is_valid(&self) -> bool {
		self.channels > 0 && self.channels as usize <= CHANNELS_MAX
	}

	/// Does this map describe `spec`'s channel count?
	pub const fn compatible_with(&self, spec: &SampleSpec) -> bool {
		self.channels == spec.channels
	}

	/// The in-use prefix of the position table.
	pub fn positions(&self) -> &[Position] {
		&self.map[..self.channels as usize]
	}

	/// Union of the positions this map names.
	pub fn mask(&self) -> PositionMask {
		self.positions().iter().fold(PositionMask::NONE, |m, p| m.union(p.mask()))
	}

	/// Do two maps name the same positions in the same order?
	pub fn equal(&self, other: &Self) -> bool {
		self.channels == other.channels && self.positions() == other.positions()
	}
}

impl Default for ChannelMap {
	fn default() -> Self {
		Self::STEREO
	}
}

impl std::fmt::Display for ChannelMap {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut first = true;
		for p in self.positions() {
			if !first {
				write!(f, ",")?;
			}
			write!(f, "{p}")?;
			first = false;
		}
		Ok(())
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn mask_groups() {
		let left: PositionMask = "all-left".parse().unwrap();
		assert!(left.contains(Position::FrontLeft));
		assert!(left.contains(Position::SideLeft));
		assert!(!left.contains(Position::FrontRight));
		assert!(!left.contains(Position::Lfe));

		let no_lfe: PositionMask = "all-no-lfe".parse().unwrap();
		assert!(!no_lfe.contains(Position::Lfe));
		assert!(no_lfe.contains(Position::Mono));

		let single: PositionMask = "front-center".parse().unwrap();
		assert_eq!(single, Position::FrontCenter.mask());

		assert!("left-of-nowhere".parse::<PositionMask>().is_err());
	}

	#[test]
	fn default_maps() {
		assert_eq!(ChannelMap::default_for(1), Some(ChannelMap::MONO));
		assert_eq!(ChannelMap::default_for(2), Some(ChannelMap::STEREO));
		assert_eq!(ChannelMap::default_for(6), Some(ChannelMap::SURROUND_5_1));
		assert_eq!(ChannelMap::default_for(3), None);
	}

	#[test]
	fn map_mask() {
		let m = ChannelMap::STEREO.mask();
		assert!(m.contains(Position::FrontLeft));
		assert!(m.contains(Position::FrontRight));
		assert!(!m.contains(Position::RearLeft));
	}
}
