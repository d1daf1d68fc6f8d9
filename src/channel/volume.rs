//! Linear volumes, decibel conversion, per-channel volume vectors.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::map::ChannelMap;
use crate::error::Error;
use crate::sample::{SampleSpec,CHANNELS_MAX};

//---------------------------------------------------------------------------------------------------- Volume
/// A single-channel volume.
///
/// This is a fixed-point linear value:
/// - [`Volume::MUTED`] (`0`) is silence
/// - [`Volume::NORM`] (`0x10000`) is unity gain (0 dB)
/// - [`Volume::MAX`] (`2 * NORM`) is the highest accepted amplification
///
/// The perceived loudness mapping is cubic: the amplitude factor
/// applied to samples is `(v / NORM)^3`, so that equal volume steps
/// feel equally loud.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Volume(pub u32);

impl Volume {
	/// Silence.
	pub const MUTED: Self = Self(0);

	/// Unity gain, 0 dB.
	pub const NORM: Self = Self(0x10000);

	/// Highest accepted volume.
	pub const MAX: Self = Self(0x20000);

	/// Clamp an arbitrary raw value into the accepted range.
	pub const fn clamped(v: u32) -> Self {
		if v > Self::MAX.0 { Self::MAX } else { Self(v) }
	}

	/// Is this a usable volume?
	pub const fn is_valid(self) -> bool {
		self.0 <= Self::MAX.0
	}

	/// The linear amplitude factor this volume applies to samples.
	pub fn to_linear(self) -> f64 {
		if self.0 == Self::MUTED.0 {
			return 0.0;
		}

		let f = f64::from(self.0) / f64::from(Self::NORM.0);
		f * f * f
	}

	/// Inverse of [`Self::to_linear`].
	pub fn from_linear(linear: f64) -> Self {
		if linear <= 0.0 {
			return Self::MUTED;
		}

		let v = (linear.cbrt() * f64::from(Self::NORM.0)).round();
		Self::clamped(v as u32)
	}

	/// This volume expressed in decibels.
	pub fn to_db(self) -> VolumeDb {
		if self.0 == Self::MUTED.0 {
			return VolumeDb::MINUS_INFINITY;
		}

		VolumeDb(20.0 * self.to_linear().log10())
	}

	/// Inverse of [`Self::to_db`].
	pub fn from_db(db: VolumeDb) -> Self {
		if db.0 == f64::NEG_INFINITY {
			return Self::MUTED;
		}

		Self::from_linear(10.0_f64.powf(db.0 / 20.0))
	}

	/// Combine two volumes as if applied one after the other.
	///
	/// ```rust
	/// # use resona::channel::Volume;
	/// assert_eq!(Volume::NORM.multiply(Volume::NORM), Volume::NORM);
	/// assert_eq!(Volume::MUTED.multiply(Volume::NORM), Volume::MUTED);
	/// ```
	pub const fn multiply(self, other: Self) -> Self {
		let v = (self.0 as u64 * other.0 as u64 + Self::NORM.0 as u64 / 2)
			/ Self::NORM.0 as u64;
		Self::clamped(v as u32)
	}

	/// Inverse of [`Self::multiply`]; dividing by [`Volume::MUTED`] yields mute.
	pub const fn divide(self, other: Self) -> Self {
		if other.0 == Self::MUTED.0 {
			return Self::MUTED;
		}

		let v = (self.0 as u64 * Self::NORM.0 as u64 + other.0 as u64 / 2)
			/ other.0 as u64;
		Self::clamped(v as u32)
	}

	/// Map this volume onto an integer hardware range `[min, max]`.
	pub fn to_hw(self, min: i64, max: i64) -> i64 {
		let v = (f64::from(self.0) * (max - min) as f64 / f64::from(Self::NORM.0)).round() as i64 + min;
		v.clamp(min, max)
	}

	/// Inverse of [`Self::to_hw`].
	pub fn from_hw(v: i64, min: i64, max: i64) -> Self {
		if max <= min {
			return Self::MUTED;
		}

		let f = ((v - min) as f64 * f64::from(Self::NORM.0) / (max - min) as f64).round();
		Self::clamped(f as u32)
	}
}

impl std::fmt::Display for Volume {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}%", (u64::from(self.0) * 100 + u64::from(Self::NORM.0) / 2) / u64::from(Self::NORM.0))
	}
}

//---------------------------------------------------------------------------------------------------- VolumeDb
/// A gain in decibels.
#[derive(Copy,Clone,Debug,Default,PartialEq,PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct VolumeDb(pub f64);

impl VolumeDb {
	/// Silence.
	pub const MINUS_INFINITY: Self = Self(f64::NEG_INFINITY);

	/// Unity gain.
	pub const ZERO: Self = Self(0.0);
}

impl std::fmt::Display for VolumeDb {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.0 == f64::NEG_INFINITY {
			write!(f, "-inf dB")
		} else {
			write!(f, "{:.2} dB", self.0)
		}
	}
}

//---------------------------------------------------------------------------------------------------- ChannelVolumes
/// One [`Volume`] per channel.
///
/// Compatible with a [`SampleSpec`] or [`ChannelMap`] iff the
/// channel counts match.
#[derive(Copy,Clone,Debug,PartialEq,Eq,Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelVolumes {
	/// How many entries of `values` are in use.
	pub channels: u8,
	/// Per-channel linear volumes.
	pub values: [Volume; CHANNELS_MAX],
}

impl ChannelVolumes {
	/// All channels at unity gain.
	pub fn norm(channels: u8) -> Self {
		Self::uniform(channels, Volume::NORM)
	}

	/// All channels muted.
	pub fn muted(channels: u8) -> Self {
		Self::uniform(channels, Volume::MUTED)
	}

	/// All channels at `v`.
	pub fn uniform(channels: u8, v: Volume) -> Self {
		debug_assert!(channels as usize <= CHANNELS_MAX);
		Self { channels, values: [v; CHANNELS_MAX] }
	}

	/// Is this vector internally consistent?
	pub fn is_valid(&self) -> bool {
		self.channels > 0
			&& self.channels as usize <= CHANNELS_MAX
			&& self.as_slice().iter().all(|v| v.is_valid())
	}

	/// Channel-count compatibility with a sample spec.
	pub const fn compatible_with(&self, spec: &SampleSpec) -> bool {
		self.channels == spec.channels
	}

	/// Channel-count compatibility with a channel map.
	pub const fn compatible_with_map(&self, map: &ChannelMap) -> bool {
		self.channels == map.channels
	}

	/// The in-use prefix of the value table.
	pub fn as_slice(&self) -> &[Volume] {
		&self.values[..self.channels as usize]
	}

	/// Mutable in-use prefix of the value table.
	pub fn as_mut_slice(&mut self) -> &mut [Volume] {
		&mut self.values[..self.channels as usize]
	}

	/// The loudest channel.
	pub fn max(&self) -> Volume {
		self.as_slice().iter().copied().max().unwrap_or(Volume::MUTED)
	}

	/// The arithmetic mean over all channels.
	pub fn avg(&self) -> Volume {
		if self.channels == 0 {
			return Volume::MUTED;
		}

		let sum: u64 = self.as_slice().iter().map(|v| u64::from(v.0)).sum();
		Volume((sum / self.channels as u64) as u32)
	}

	/// Are all channels exactly at unity?
	pub fn is_norm(&self) -> bool {
		self.as_slice().iter().all(|v| *v == Volume::NORM)
	}

	/// Are all channels muted?
	pub fn is_muted(&self) -> bool {
		self.as_slice().iter().all(|v| *v == Volume::MUTED)
	}

	/// Set every channel back to unity, keeping the channel count.
	pub fn reset(&mut self, channels: u8) {
		*self = Self::norm(channels);
	}

	/// Mute every channel, keeping the channel count.
	pub fn mute(&mut self, channels: u8) {
		*self = Self::muted(channels);
	}

	/// Channel-wise multiply.
	pub fn multiply(&self, other: &Self) -> Self {
		debug_assert_eq!(self.channels, other.channels);
		let mut out = *self;
		for (o, b) in out.as_mut_slice().iter_mut().zip(other.as_slice()) {
			*o = o.multiply(*b);
		}
		out
	}

	/// Channel-wise divide.
	pub fn divide(&self, other: &Self) -> Self {
		debug_assert_eq!(self.channels, other.channels);
		let mut out = *self;
		for (o, b) in out.as_mut_slice().iter_mut().zip(other.as_slice()) {
			*o = o.divide(*b);
		}
		out
	}

	/// Channel-wise maximum of two vectors.
	pub fn merge(&self, other: &Self) -> Self {
		debug_assert_eq!(self.channels, other.channels);
		let mut out = *self;
		for (o, b) in out.as_mut_slice().iter_mut().zip(other.as_slice()) {
			if b.0 > o.0 {
				*o = *b;
			}
		}
		out
	}

	/// Rescale so the loudest channel lands on `target`,
	/// keeping the relative balance between channels.
	pub fn scale(&mut self, target: Volume) {
		let max = self.max();

		if max == Volume::MUTED {
			*self = Self::uniform(self.channels, target);
			return;
		}

		for v in self.as_mut_slice() {
			*v = v.multiply(target).divide(max);
		}
	}

	/// Re-express this vector (over map `from`) in the layout of map `to`.
	///
	/// Each target channel takes the mean of the source channels
	/// sharing its position; positions absent from the source take
	/// the mean over all source channels.
	pub fn remap(&self, from: &ChannelMap, to: &ChannelMap) -> Self {
		debug_assert!(self.compatible_with_map(from));

		if from.equal(to) {
			return *self;
		}

		let overall_avg = self.avg();
		let mut out = Self::muted(to.channels);

		for (k, target) in to.positions().iter().enumerate() {
			let mut sum: u64 = 0;
			let mut n: u64 = 0;

			for (j, source) in from.positions().iter().enumerate() {
				if source == target {
					sum += u64::from(self.values[j].0);
					n += 1;
				}
			}

			out.values[k] = if n == 0 {
				overall_avg
			} else {
				Volume((sum / n) as u32)
			};
		}

		out
	}

	/// Like [`Self::remap`], but tries to minimize the impact when
	/// folding a per-stream volume into a device volume.
	///
	/// If `template` (the current device volume) already remaps back
	/// to this vector it is reused unchanged. Otherwise, with unequal
	/// maps, every device channel is set to the stream's loudest
	/// channel, so that changing one stream cannot leak into unrelated
	/// channels of another stream.
	pub fn remap_minimum_impact(
		&self,
		template: &Self,
		from: &ChannelMap,
		to: &ChannelMap,
	) -> Self {
		debug_assert!(self.compatible_with_map(from));
		debug_assert!(template.compatible_with_map(to));

		if from.equal(to) {
			return *self;
		}

		if template.remap(to, from) == *self {
			return *template;
		}

		Self::uniform(to.channels, self.max())
	}
}

impl Default for ChannelVolumes {
	fn default() -> Self {
		Self::norm(2)
	}
}

impl std::fmt::Display for ChannelVolumes {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut first = true;
		for v in self.as_slice() {
			if !first {
				write!(f, " ")?;
			}
			write!(f, "{v}")?;
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

	fn cv(values: &[u32]) -> ChannelVolumes {
		let mut out = ChannelVolumes::muted(values.len() as u8);
		for (i, v) in values.iter().enumerate() {
			out.values[i] = Volume(*v);
		}
		out
	}

	#[test]
	fn db_round_trip() {
		assert_eq!(Volume::NORM.to_db(), VolumeDb::ZERO);
		assert_eq!(Volume::MUTED.to_db(), VolumeDb::MINUS_INFINITY);
		assert_eq!(Volume::from_db(VolumeDb::MINUS_INFINITY), Volume::MUTED);

		for v in [0x2000_u32, 0x8000, 0x10000, 0x18000, 0x20000] {
			let v = Volume(v);
			let back = Volume::from_db(v.to_db());
			assert!(back.0.abs_diff(v.0) <= 1, "{v:?} -> {back:?}");
		}
	}

	#[test]
	fn multiply_divide_inverse() {
		let a = Volume(0x8000);
		let b = Volume(0xC000);
		let m = a.multiply(b);
		// divide is multiply's inverse up to fixed-point rounding
		assert!(m.divide(b).0.abs_diff(a.0) <= 1);
		assert_eq!(Volume::MUTED.divide(Volume::MUTED), Volume::MUTED);
	}

	#[test]
	fn hw_range_round_trip() {
		let (min, max) = (-10_i64, 245);
		for v in [0_u32, 0x4000, 0x8000, 0x10000] {
			let v = Volume(v);
			let hw = v.to_hw(min, max);
			assert!((min..=max).contains(&hw));
			let back = Volume::from_hw(hw, min, max);
			// quantized by the 256-step range
			assert!(back.0.abs_diff(v.0) <= Volume::NORM.0 / 128);
		}
	}

	#[test]
	fn merge_and_scale() {
		let a = cv(&[0x8000, 0x10000]);
		let b = cv(&[0x10000, 0x4000]);
		assert_eq!(a.merge(&b), cv(&[0x10000, 0x10000]));

		let mut c = cv(&[0x8000, 0x10000]);
		c.scale(Volume(0x8000));
		assert_eq!(c.max(), Volume(0x8000));
		assert!(c.values[0].0.abs_diff(0x4000) <= 1);
	}

	#[test]
	fn remap_identity_and_down() {
		let v = cv(&[0x8000, 0x10000]);
		assert_eq!(v.remap(&ChannelMap::STEREO, &ChannelMap::STEREO), v);

		// stereo -> mono: average
		let mono = v.remap(&ChannelMap::STEREO, &ChannelMap::MONO);
		assert_eq!(mono.channels, 1);
		assert_eq!(mono.values[0], Volume(0xC000));

		// mono -> stereo: broadcast the average
		let back = mono.remap(&ChannelMap::MONO, &ChannelMap::STEREO);
		assert_eq!(back.as_slice(), &[Volume(0xC000), Volume(0xC000)]);
	}

	#[test]
	fn remap_minimum_impact_prefers_template() {
		// A mono stream volume over a stereo device whose current
		// volume remaps back to exactly the stream volume: template wins.
		let stream = cv(&[0xC000]);
		let template = cv(&[0xC000, 0xC000]);
		let out = stream.remap_minimum_impact(&template, &ChannelMap::MONO, &ChannelMap::STEREO);
		assert_eq!(out, template);

		// Template does not match: all channels take the stream max.
		let template = cv(&[0x4000, 0x10000]);
		let out = stream.remap_minimum_impact(&template, &ChannelMap::MONO, &ChannelMap::STEREO);
		assert_eq!(out, cv(&[0xC000, 0xC000]));
	}
}
