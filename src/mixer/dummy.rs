//! An in-memory mixer backend.
//!
//! Used in tests and by embedders that want to exercise the path
//! machinery without hardware. Elements are declared up front with
//! whatever capabilities the test needs, including deliberately
//! broken decibel reporting.

//---------------------------------------------------------------------------------------------------- use
use crate::error::Error;
use crate::mixer::backend::{MixerBackend,MixerChannel,Rounding,MIXER_CHANNELS};
use crate::mixer::Direction;
use std::collections::HashMap;

//---------------------------------------------------------------------------------------------------- DummyVolume
/// The volume capability of one [`DummyElement`] direction.
#[derive(Clone,Debug)]
pub struct DummyVolume {
	/// Lowest raw step.
	pub min: i64,
	/// Highest raw step.
	pub max: i64,
	/// Decibels (centibels) at `min`, if the element reports decibels.
	pub db_min: Option<i64>,
	/// Decibels (centibels) at `max`.
	pub db_max: Option<i64>,
	/// Reported dB range override, for simulating drivers whose
	/// `db_range` disagrees with their per-step answers.
	pub broken_db_range: Option<(i64, i64)>,
	/// Current raw step per channel.
	pub values: [i64; MIXER_CHANNELS],
}

impl DummyVolume {
	/// A dB-capable volume over `[min, max]` mapping to `[db_min, db_max]` centibels.
	pub fn with_db(min: i64, max: i64, db_min: i64, db_max: i64) -> Self {
		Self {
			min,
			max,
			db_min: Some(db_min),
			db_max: Some(db_max),
			broken_db_range: None,
			values: [min; MIXER_CHANNELS],
		}
	}

	/// A volume without decibel information.
	pub fn without_db(min: i64, max: i64) -> Self {
		Self {
			min,
			max,
			db_min: None,
			db_max: None,
			broken_db_range: None,
			values: [min; MIXER_CHANNELS],
		}
	}

	/// Linear step→centibel interpolation.
	fn step_to_db(&self, step: i64) -> Option<i64> {
		let (db_min, db_max) = (self.db_min?, self.db_max?);
		if self.max == self.min {
			return Some(db_min);
		}
		let step = step.clamp(self.min, self.max);
		Some(db_min + (step - self.min) * (db_max - db_min) / (self.max - self.min))
	}

	/// Inverse of [`Self::step_to_db`], with caller-chosen rounding.
	fn db_to_step(&self, db: i64, rounding: Rounding) -> Option<i64> {
		let (db_min, db_max) = (self.db_min?, self.db_max?);
		if db_max == db_min {
			return Some(self.min);
		}
		let db = db.clamp(db_min, db_max);
		let num = (db - db_min) * (self.max - self.min);
		let den = db_max - db_min;
		let step = match rounding {
			Rounding::Up   => (num + den - 1) / den,
			Rounding::Down => num / den,
		};
		Some((self.min + step).clamp(self.min, self.max))
	}
}

//---------------------------------------------------------------------------------------------------- DummyElement
/// One declared element of a [`DummyMixer`].
#[derive(Clone,Debug,Default)]
pub struct DummyElement {
	/// Playback-side volume capability.
	pub playback_volume: Option<DummyVolume>,
	/// Capture-side volume capability.
	pub capture_volume: Option<DummyVolume>,
	/// Playback switch state, if the element has one.
	pub playback_switch: Option<bool>,
	/// Capture switch state, if the element has one.
	pub capture_switch: Option<bool>,
	/// Enumeration items; non-empty means the element is enumerated.
	pub enum_items: Vec<String>,
	/// Currently selected enumeration item.
	pub enum_selected: usize,
	/// Is the element mono?
	pub mono: bool,
	/// Which hardware channels exist (ignored for mono elements).
	pub channels: Vec<MixerChannel>,
}

impl DummyElement {
	/// A stereo element with a dB-capable volume in `dir`.
	pub fn stereo_volume(dir: Direction, min: i64, max: i64, db_min: i64, db_max: i64) -> Self {
		let vol = DummyVolume::with_db(min, max, db_min, db_max);
		let mut e = Self { channels: vec![0, 1], ..Self::default() };
		match dir {
			Direction::Playback => e.playback_volume = Some(vol),
			Direction::Capture  => e.capture_volume = Some(vol),
		}
		e
	}

	/// A switch-only element in `dir`, initially `on`.
	pub fn switch(dir: Direction, on: bool) -> Self {
		let mut e = Self { channels: vec![0, 1], ..Self::default() };
		match dir {
			Direction::Playback => e.playback_switch = Some(on),
			Direction::Capture  => e.capture_switch = Some(on),
		}
		e
	}

	/// An enumeration element with the given items.
	pub fn enumeration(items: &[&str]) -> Self {
		Self {
			enum_items: items.iter().map(|s| (*s).to_owned()).collect(),
			channels:   vec![0, 1],
			..Self::default()
		}
	}

	fn volume(&self, dir: Direction) -> Option<&DummyVolume> {
		match dir {
			Direction::Playback => self.playback_volume.as_ref(),
			Direction::Capture  => self.capture_volume.as_ref(),
		}
	}

	fn volume_mut(&mut self, dir: Direction) -> Option<&mut DummyVolume> {
		match dir {
			Direction::Playback => self.playback_volume.as_mut(),
			Direction::Capture  => self.capture_volume.as_mut(),
		}
	}

	fn switch_ref(&self, dir: Direction) -> Option<&bool> {
		match dir {
			Direction::Playback => self.playback_switch.as_ref(),
			Direction::Capture  => self.capture_switch.as_ref(),
		}
	}

	fn has_channel(&self, ch: MixerChannel) -> bool {
		if self.mono {
			ch == 0
		} else {
			self.channels.contains(&ch)
		}
	}
}

//---------------------------------------------------------------------------------------------------- DummyMixer
/// The in-memory mixer: a name→element table plus jack states.
#[derive(Clone,Debug,Default)]
pub struct DummyMixer {
	/// Declared elements by name.
	pub elements: HashMap<String, DummyElement>,
	/// Declared jacks: name → plugged.
	pub jacks: HashMap<String, bool>,
}

impl DummyMixer {
	/// An empty mixer.
	pub fn new() -> Self {
		Self::default()
	}

	/// Declare an element.
	pub fn with_element(mut self, name: &str, e: DummyElement) -> Self {
		self.elements.insert(name.to_owned(), e);
		self
	}

	/// Declare a jack.
	pub fn with_jack(mut self, name: &str, plugged: bool) -> Self {
		self.jacks.insert(name.to_owned(), plugged);
		self
	}

	fn element(&self, name: &str) -> Result<&DummyElement, Error> {
		self.elements.get(name).ok_or(Error::NoEntity)
	}

	fn element_mut(&mut self, name: &str) -> Result<&mut DummyElement, Error> {
		self.elements.get_mut(name).ok_or(Error::NoEntity)
	}
}

impl MixerBackend for DummyMixer {
	fn has_element(&self, name: &str) -> bool {
		self.elements.contains_key(name)
	}

	fn has_switch(&self, name: &str, dir: Direction) -> bool {
		self.element(name).map(|e| e.switch_ref(dir).is_some()).unwrap_or(false)
	}

	fn has_volume(&self, name: &str, dir: Direction) -> bool {
		self.element(name).map(|e| e.volume(dir).is_some()).unwrap_or(false)
	}

	fn is_enumerated(&self, name: &str) -> bool {
		self.element(name).map(|e| !e.enum_items.is_empty()).unwrap_or(false)
	}

	fn volume_range(&self, name: &str, dir: Direction) -> Result<(i64, i64), Error> {
		let v = self.element(name)?.volume(dir).ok_or(Error::NotSupported)?;
		Ok((v.min, v.max))
	}

	fn db_range(&self, name: &str, dir: Direction) -> Result<(i64, i64), Error> {
		let v = self.element(name)?.volume(dir).ok_or(Error::NotSupported)?;

		if let Some(broken) = v.broken_db_range {
			return Ok(broken);
		}

		match (v.db_min, v.db_max) {
			(Some(a), Some(b)) => Ok((a, b)),
			_ => Err(Error::NotSupported),
		}
	}

	fn ask_vol_db(&self, name: &str, dir: Direction, step: i64) -> Result<i64, Error> {
		let v = self.element(name)?.volume(dir).ok_or(Error::NotSupported)?;
		v.step_to_db(step).ok_or(Error::NotSupported)
	}

	fn ask_db_vol(&self, name: &str, dir: Direction, db: i64, rounding: Rounding) -> Result<i64, Error> {
		let v = self.element(name)?.volume(dir).ok_or(Error::NotSupported)?;
		v.db_to_step(db, rounding).ok_or(Error::NotSupported)
	}

	fn is_mono(&self, name: &str, _dir: Direction) -> bool {
		self.element(name).map(|e| e.mono).unwrap_or(false)
	}

	fn has_channel(&self, name: &str, _dir: Direction, ch: MixerChannel) -> bool {
		self.element(name).map(|e| e.has_channel(ch)).unwrap_or(false)
	}

	fn get_volume(&self, name: &str, dir: Direction, ch: MixerChannel) -> Result<i64, Error> {
		let e = self.element(name)?;
		if !e.has_channel(ch) {
			return Err(Error::NoEntity);
		}
		let v = e.volume(dir).ok_or(Error::NotSupported)?;
		Ok(v.values[ch])
	}

	fn set_volume(&mut self, name: &str, dir: Direction, ch: MixerChannel, step: i64) -> Result<(), Error> {
		let e = self.element_mut(name)?;
		if !e.has_channel(ch) {
			return Err(Error::NoEntity);
		}
		let v = e.volume_mut(dir).ok_or(Error::NotSupported)?;
		v.values[ch] = step.clamp(v.min, v.max);
		Ok(())
	}

	fn set_volume_all(&mut self, name: &str, dir: Direction, step: i64) -> Result<(), Error> {
		let v = self.element_mut(name)?.volume_mut(dir).ok_or(Error::NotSupported)?;
		let step = step.clamp(v.min, v.max);
		v.values = [step; MIXER_CHANNELS];
		Ok(())
	}

	fn get_db(&self, name: &str, dir: Direction, ch: MixerChannel) -> Result<i64, Error> {
		let step = self.get_volume(name, dir, ch)?;
		self.ask_vol_db(name, dir, step)
	}

	fn set_db(&mut self, name: &str, dir: Direction, ch: MixerChannel, db: i64, rounding: Rounding) -> Result<i64, Error> {
		let step = self.ask_db_vol(name, dir, db, rounding)?;
		self.set_volume(name, dir, ch, step)?;
		self.ask_vol_db(name, dir, step)
	}

	fn set_db_all(&mut self, name: &str, dir: Direction, db: i64, rounding: Rounding) -> Result<(), Error> {
		let step = self.ask_db_vol(name, dir, db, rounding)?;
		self.set_volume_all(name, dir, step)
	}

	fn get_switch(&self, name: &str, dir: Direction) -> Result<bool, Error> {
		self.element(name)?.switch_ref(dir).copied().ok_or(Error::NotSupported)
	}

	fn set_switch_all(&mut self, name: &str, dir: Direction, on: bool) -> Result<(), Error> {
		let e = self.element_mut(name)?;
		let s = match dir {
			Direction::Playback => e.playback_switch.as_mut(),
			Direction::Capture  => e.capture_switch.as_mut(),
		};
		*s.ok_or(Error::NotSupported)? = on;
		Ok(())
	}

	fn enum_items(&self, name: &str) -> Result<Vec<String>, Error> {
		let e = self.element(name)?;
		if e.enum_items.is_empty() {
			return Err(Error::NotSupported);
		}
		Ok(e.enum_items.clone())
	}

	fn set_enum_item(&mut self, name: &str, idx: usize) -> Result<(), Error> {
		let e = self.element_mut(name)?;
		if idx >= e.enum_items.len() {
			return Err(Error::Invalid);
		}
		e.enum_selected = idx;
		Ok(())
	}

	fn has_jack(&self, name: &str) -> bool {
		self.jacks.contains_key(name)
	}

	fn jack_plugged(&self, name: &str) -> Result<bool, Error> {
		self.jacks.get(name).copied().ok_or(Error::NoEntity)
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn db_interpolation() {
		let v = DummyVolume::with_db(0, 100, -5_000, 0);
		assert_eq!(v.step_to_db(0), Some(-5_000));
		assert_eq!(v.step_to_db(100), Some(0));
		assert_eq!(v.step_to_db(50), Some(-2_500));

		assert_eq!(v.db_to_step(-2_500, Rounding::Down), Some(50));
		// A value between two steps rounds per direction.
		assert_eq!(v.db_to_step(-2_475, Rounding::Up), Some(51));
		assert_eq!(v.db_to_step(-2_475, Rounding::Down), Some(50));
	}

	#[test]
	fn volume_read_write() {
		let mut m = DummyMixer::new().with_element(
			"Master",
			DummyElement::stereo_volume(Direction::Playback, 0, 64, -6_400, 0),
		);

		m.set_volume("Master", Direction::Playback, 0, 32).unwrap();
		assert_eq!(m.get_volume("Master", Direction::Playback, 0).unwrap(), 32);
		assert_eq!(m.get_db("Master", Direction::Playback, 0).unwrap(), -3_200);
	}
}
