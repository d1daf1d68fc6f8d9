//! One hardware mixer control inside a path.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::{ChannelMap,ChannelVolumes,PositionMask,Volume,VolumeDb};
use crate::error::Error;
use crate::macros::{debug2,warn2};
use crate::mixer::backend::{mixer_channel,MixerBackend,MixerChannel,Rounding,MIXER_CHANNELS};
use crate::mixer::config::{ElementConfig,EnumConfig,OptionConfig,Required,SwitchConfig,VolumeConfig};
use crate::mixer::db_fix::DecibelFix;
use crate::mixer::Direction;
use crate::channel::Position;

//---------------------------------------------------------------------------------------------------- Constants
/// The centibel value standing in for "minus infinity".
pub(crate) const DECIBEL_MININFTY_CB: i64 = -20_000;

/// Centibels → linear volume.
pub(crate) fn volume_from_cb(cb: i64) -> Volume {
	if cb <= DECIBEL_MININFTY_CB {
		Volume::MUTED
	} else {
		Volume::from_db(VolumeDb(cb as f64 / 100.0))
	}
}

/// Linear volume → centibels.
pub(crate) fn volume_to_cb(v: Volume) -> i64 {
	if v == Volume::MUTED {
		DECIBEL_MININFTY_CB
	} else {
		(v.to_db().0 * 100.0).round() as i64
	}
}

//---------------------------------------------------------------------------------------------------- PathOption
/// One selectable value of a `select` switch or enumeration.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct PathOption {
	/// The hardware-side value name (`on`/`off` for switches,
	/// the item string for enumerations).
	pub alsa_name: String,
	/// The short user-facing tag.
	pub name: String,
	/// Human description (resolved through the well-known table).
	pub description: String,
	/// Setting priority.
	pub priority: u32,
	/// Hardware index of this value; `None` until probed or if absent.
	pub alsa_idx: Option<usize>,
	/// Presence requirement.
	pub required: Required,
	/// Required-any contribution.
	pub required_any: Required,
	/// Absence requirement.
	pub required_absent: Required,
}

/// Well-known option tag → description.
const OPTION_DESCRIPTIONS: &[(&str, &str)] = &[
	("input",                     "Input"),
	("input-docking",             "Docking Station Input"),
	("input-docking-microphone",  "Docking Station Microphone"),
	("input-docking-linein",      "Docking Station Line In"),
	("input-linein",              "Line In"),
	("input-microphone",          "Microphone"),
	("input-microphone-front",    "Front Microphone"),
	("input-microphone-rear",     "Rear Microphone"),
	("input-microphone-external", "External Microphone"),
	("input-microphone-internal", "Internal Microphone"),
	("input-radio",               "Radio"),
	("input-video",               "Video"),
	("input-agc-on",              "Automatic Gain Control"),
	("input-agc-off",             "No Automatic Gain Control"),
	("input-boost-on",            "Boost"),
	("input-boost-off",           "No Boost"),
	("output-amplifier-on",       "Amplifier"),
	("output-amplifier-off",      "No Amplifier"),
	("output-bass-boost-on",      "Bass Boost"),
	("output-bass-boost-off",     "No Bass Boost"),
	("output-speaker",            "Speaker"),
	("output-headphones",         "Headphones"),
];

pub(crate) fn lookup_description(key: &str, table: &[(&str, &str)]) -> Option<String> {
	table.iter().find(|(k, _)| *k == key).map(|(_, d)| (*d).to_owned())
}

impl PathOption {
	/// Build from the configuration schema.
	pub fn from_config(cfg: &OptionConfig) -> Self {
		let name = cfg.name.clone().unwrap_or_else(|| cfg.alsa_name.clone());
		let description = lookup_description(&name, OPTION_DESCRIPTIONS)
			.unwrap_or_else(|| name.clone());

		Self {
			alsa_name: cfg.alsa_name.clone(),
			name,
			description,
			priority: cfg.priority,
			alsa_idx: None,
			required: cfg.required,
			required_any: cfg.required_any,
			required_absent: cfg.required_absent,
		}
	}
}

//---------------------------------------------------------------------------------------------------- Element
/// One mixer control with a switch-use, volume-use and/or
/// enumeration-use, plus the channel masks the probe resolved.
#[derive(Clone,Debug)]
pub struct Element {
	/// The hardware element name.
	pub alsa_name: String,
	/// How the switch of this element is used.
	pub switch_use: SwitchConfig,
	/// How the volume of this element is used.
	pub volume_use: VolumeConfig,
	/// How the enumeration of this element is used.
	pub enumeration_use: EnumConfig,
	/// Which direction this element is addressed in.
	pub direction: Direction,
	/// Flip to the other direction if this one has no control.
	pub direction_try_other: bool,
	/// Presence requirement.
	pub required: Required,
	/// Required-any contribution.
	pub required_any: Required,
	/// Absence requirement.
	pub required_absent: Required,
	/// Highest raw step the path may drive, from `volume-limit`.
	pub volume_limit: Option<i64>,
	/// Configured channel masks override the probed ones.
	pub override_map: bool,

	/// Probed: element reports decibels.
	pub has_db: bool,
	/// Probed: raw step range.
	pub min_volume: i64,
	/// Probed: raw step range.
	pub max_volume: i64,
	/// Probed: decibel range in centibels.
	pub min_db: i64,
	/// Probed: decibel range in centibels.
	pub max_db: i64,
	/// Probed: hardware channel count (1 or 2).
	pub n_channels: usize,
	/// Per hardware channel, per layout column (`n_channels - 1`):
	/// the abstract positions this channel controls.
	pub masks: [[PositionMask; 2]; MIXER_CHANNELS],
	/// Union of the masks.
	pub merged_mask: PositionMask,

	/// Decibel fix attached to this element, if any.
	pub db_fix: Option<DecibelFix>,
	/// Options of a select switch / enumeration.
	pub options: Vec<PathOption>,
}

impl Element {
	/// Build from the configuration schema. `options` are the
	/// `[Option]` sections naming this element.
	pub fn from_config(cfg: &ElementConfig, path_direction: Direction, options: &[OptionConfig]) -> Self {
		let mut masks = [[PositionMask::NONE; 2]; MIXER_CHANNELS];
		let mut override_map = false;

		if let Some([m]) = cfg.override_map_1 {
			masks[0][0] = m;
			override_map = true;
		}
		if let Some([a, b]) = cfg.override_map_2 {
			masks[0][1] = a;
			masks[1][1] = b;
			override_map = true;
		}

		Self {
			alsa_name: cfg.name.clone(),
			switch_use: cfg.switch,
			volume_use: cfg.volume,
			enumeration_use: cfg.enumeration,
			direction: cfg.direction.unwrap_or(path_direction),
			direction_try_other: cfg.direction_try_other,
			required: cfg.required,
			required_any: cfg.required_any,
			required_absent: cfg.required_absent,
			volume_limit: cfg.volume_limit,
			override_map,
			has_db: false,
			min_volume: 0,
			max_volume: 0,
			min_db: 0,
			max_db: 0,
			n_channels: 0,
			masks,
			merged_mask: PositionMask::NONE,
			db_fix: None,
			options: options
				.iter()
				.filter(|o| o.element == cfg.name)
				.map(PathOption::from_config)
				.collect(),
		}
	}

	/// Static consistency checks before probing.
	pub fn verify(&self) -> Result<(), Error> {
		if (self.required != Required::Ignore && self.required == self.required_absent)
			|| (self.required_any != Required::Ignore && self.required_any == self.required_absent)
			|| (self.required_absent == Required::Any && self.required_any != Required::Ignore)
			|| (self.required_absent == Required::Any && self.required != Required::Ignore)
		{
			warn2!("element {} cannot be required and absent at the same time", self.alsa_name);
			return Err(Error::Invalid);
		}

		if self.switch_use == SwitchConfig::Select && self.enumeration_use == EnumConfig::Select {
			warn2!("element {} cannot select both switch and enumeration", self.alsa_name);
			return Err(Error::Invalid);
		}

		for o in &self.options {
			if self.enumeration_use != EnumConfig::Select && self.switch_use != SwitchConfig::Select {
				warn2!("element {} of option {} not set for select", self.alsa_name, o.name);
				return Err(Error::Invalid);
			}

			if self.switch_use == SwitchConfig::Select
				&& o.alsa_name != "on"
				&& o.alsa_name != "off"
			{
				warn2!("switch {} options must be named on or off", self.alsa_name);
				return Err(Error::Invalid);
			}
		}

		Ok(())
	}

	//---------------------------------------------------------------------------------------------------- Probe
	/// Probe this element against the hardware.
	///
	/// Returns whether this element satisfies a `required-any`
	/// clause of its path. Errors fail the whole path.
	pub fn probe(&mut self, mixer: &mut dyn MixerBackend) -> Result<bool, Error> {
		if !mixer.has_element(&self.alsa_name) {
			if self.required != Required::Ignore {
				return Err(Error::NoEntity);
			}

			self.switch_use = SwitchConfig::Ignore;
			self.volume_use = VolumeConfig::Ignore;
			self.enumeration_use = EnumConfig::Ignore;
			return Ok(false);
		}

		self.probe_switch(mixer);
		self.probe_volume(mixer)?;
		self.probe_options(mixer)?;

		self.check_required(mixer)
	}

	fn probe_switch(&mut self, mixer: &dyn MixerBackend) {
		if self.switch_use == SwitchConfig::Ignore {
			return;
		}

		if !mixer.has_switch(&self.alsa_name, self.direction) {
			if self.direction_try_other && mixer.has_switch(&self.alsa_name, self.direction.other()) {
				self.direction = self.direction.other();
			} else {
				self.switch_use = SwitchConfig::Ignore;
			}
		}

		if self.switch_use != SwitchConfig::Ignore {
			self.direction_try_other = false;
		}
	}

	fn probe_volume(&mut self, mixer: &mut dyn MixerBackend) -> Result<(), Error> {
		if self.volume_use == VolumeConfig::Ignore {
			return Ok(());
		}

		if !mixer.has_volume(&self.alsa_name, self.direction) {
			if self.direction_try_other && mixer.has_volume(&self.alsa_name, self.direction.other()) {
				self.direction = self.direction.other();
			} else {
				self.volume_use = VolumeConfig::Ignore;
				return Ok(());
			}
		}

		self.direction_try_other = false;

		let (min, max) = mixer.volume_range(&self.alsa_name, self.direction)?;
		self.min_volume = min;
		self.max_volume = max;

		if min >= max {
			warn2!("broken driver: volume range of {} is {min}..{max}", self.alsa_name);
			self.volume_use = VolumeConfig::Ignore;
			return Ok(());
		}

		if let VolumeConfig::Constant(c) = self.volume_use {
			if c < min || c > max {
				warn2!("constant volume {c} for {} outside range {min}..{max}", self.alsa_name);
				self.volume_use = VolumeConfig::Ignore;
				return Ok(());
			}
		}

		// A decibel fix whose step range does not fit the
		// hardware range gets dropped.
		if let Some(fix) = &self.db_fix {
			if min > fix.min_step || max < fix.max_step {
				warn2!("decibel fix for {} does not fit range {min}..{max}, disabling", self.alsa_name);
				self.db_fix = None;
			}
		}

		if let Some(fix) = &self.db_fix {
			self.has_db = true;
			self.min_volume = fix.min_step;
			self.max_volume = fix.max_step;
			self.min_db = fix.min_db();
			self.max_db = fix.max_db();
		} else {
			match mixer.db_range(&self.alsa_name, self.direction) {
				Ok((min_db, max_db)) => {
					self.has_db = true;
					self.min_db = min_db;
					self.max_db = max_db;
				},
				Err(_) => self.has_db = false,
			}

			// Cross-check the reported range against the per-step
			// answers; a driver that disagrees with itself is broken
			// and the element is rejected.
			if self.has_db {
				let min_checked = mixer.ask_vol_db(&self.alsa_name, self.direction, self.min_volume)?;
				let max_checked = mixer.ask_vol_db(&self.alsa_name, self.direction, self.max_volume)?;

				if min_checked != self.min_db || max_checked != self.max_db {
					warn2!(
						"broken driver: dB range of {} is {}..{} but endpoints answer {}..{}",
						self.alsa_name, self.min_db, self.max_db, min_checked, max_checked,
					);
					return Err(Error::Invalid);
				}
			}
		}

		if self.has_db && self.min_db >= self.max_db {
			warn2!("broken driver: dB range of {} is {}..{}", self.alsa_name, self.min_db, self.max_db);
			self.has_db = false;
		}

		self.apply_volume_limit(mixer)?;
		self.probe_channels(mixer)?;

		Ok(())
	}

	fn apply_volume_limit(&mut self, mixer: &dyn MixerBackend) -> Result<(), Error> {
		let Some(limit) = self.volume_limit else {
			return Ok(());
		};

		if limit <= self.min_volume || limit > self.max_volume {
			warn2!(
				"volume limit {limit} for {} outside valid range {}..{}, ignoring",
				self.alsa_name, self.min_volume + 1, self.max_volume,
			);
			return Ok(());
		}

		self.max_volume = limit;

		if self.has_db {
			if let Some(fix) = &mut self.db_fix {
				fix.limit_max_step(limit);
				self.max_db = fix.max_db();
			} else {
				match mixer.ask_vol_db(&self.alsa_name, self.direction, limit) {
					Ok(db) => self.max_db = db,
					Err(_) => {
						warn2!("failed to get dB at limited volume of {}", self.alsa_name);
						self.has_db = false;
					},
				}
			}
		}

		Ok(())
	}

	fn probe_channels(&mut self, mixer: &dyn MixerBackend) -> Result<(), Error> {
		if mixer.is_mono(&self.alsa_name, self.direction) {
			self.n_channels = 1;

			if !self.override_map {
				for ch in 0..MIXER_CHANNELS {
					self.masks[ch][0] = PositionMask::NONE;
				}
				self.masks[0][0] = PositionMask::ALL;
			}

			self.merged_mask = self.masks[0][0];
			return Ok(());
		}

		let mut n = 0;
		for ch in 0..MIXER_CHANNELS {
			if mixer.has_channel(&self.alsa_name, self.direction, ch) {
				n += 1;
			}
		}

		if n == 0 {
			warn2!("volume element {} with no channels", self.alsa_name);
			return Err(Error::Invalid);
		}

		// The mask table only has columns for one- and two-channel
		// layouts; elements with more channels are not supported.
		if n > 2 {
			warn2!("volume element {} has {n} channels, too many", self.alsa_name);
			return Err(Error::Invalid);
		}

		self.n_channels = n;

		if !self.override_map {
			for p in Position::all() {
				let Some(ch) = mixer_channel(p) else { continue };
				if mixer.has_channel(&self.alsa_name, self.direction, ch) {
					self.masks[ch][n - 1] |= p.mask();
				}
			}
		}

		self.merged_mask = PositionMask::NONE;
		for ch in 0..MIXER_CHANNELS {
			self.merged_mask |= self.masks[ch][n - 1];
		}

		Ok(())
	}

	fn probe_options(&mut self, mixer: &dyn MixerBackend) -> Result<(), Error> {
		if self.switch_use == SwitchConfig::Select {
			for o in &mut self.options {
				o.alsa_idx = Some(usize::from(o.alsa_name == "on"));
			}
		} else if self.enumeration_use == EnumConfig::Select {
			let items = mixer.enum_items(&self.alsa_name).map_err(|e| {
				warn2!("failed to enumerate items of {}: {e}", self.alsa_name);
				e
			})?;

			for o in &mut self.options {
				o.alsa_idx = items.iter().position(|i| *i == o.alsa_name);
			}
		}

		Ok(())
	}

	/// The `required` / `required-absent` / `required-any` policy,
	/// evaluated after the individual probes.
	fn check_required(&mut self, mixer: &dyn MixerBackend) -> Result<bool, Error> {
		let has_switch = mixer.has_switch(&self.alsa_name, self.direction)
			|| (self.direction_try_other && mixer.has_switch(&self.alsa_name, self.direction.other()));
		let has_volume = mixer.has_volume(&self.alsa_name, self.direction)
			|| (self.direction_try_other && mixer.has_volume(&self.alsa_name, self.direction.other()));
		let has_enumeration = mixer.is_enumerated(&self.alsa_name);

		let missing = match self.required {
			Required::Switch if !has_switch => true,
			Required::Volume if !has_volume => true,
			Required::Enumeration if !has_enumeration => true,
			Required::Any if !(has_switch || has_volume || has_enumeration) => true,
			_ => false,
		};
		if missing {
			return Err(Error::NoEntity);
		}

		let present = match self.required_absent {
			Required::Switch => has_switch,
			Required::Volume => has_volume,
			Required::Enumeration => has_enumeration,
			Required::Any => has_switch || has_volume || has_enumeration,
			Required::Ignore => false,
		};
		if present {
			return Err(Error::NoEntity);
		}

		let mut req_any_present = match self.required_any {
			Required::Ignore => false,
			Required::Volume => self.volume_use != VolumeConfig::Ignore,
			Required::Switch => self.switch_use != SwitchConfig::Ignore,
			Required::Enumeration => self.enumeration_use != EnumConfig::Ignore,
			Required::Any => {
				self.volume_use != VolumeConfig::Ignore
					|| self.switch_use != SwitchConfig::Ignore
					|| self.enumeration_use != EnumConfig::Ignore
			},
		};

		if self.enumeration_use == EnumConfig::Select || self.switch_use == SwitchConfig::Select {
			for o in &self.options {
				req_any_present |= o.required_any != Required::Ignore && o.alsa_idx.is_some();

				if o.required != Required::Ignore && o.alsa_idx.is_none() {
					return Err(Error::NoEntity);
				}
				if o.required_absent != Required::Ignore && o.alsa_idx.is_some() {
					return Err(Error::NoEntity);
				}
			}
		}

		Ok(req_any_present)
	}

	/// Drop options the hardware does not offer; the element itself
	/// survives iff any use is left.
	pub(crate) fn drop_unsupported(&mut self) -> bool {
		self.options.retain(|o| o.alsa_idx.is_some());

		self.switch_use != SwitchConfig::Ignore
			|| self.volume_use != VolumeConfig::Ignore
			|| self.enumeration_use != EnumConfig::Ignore
	}

	//---------------------------------------------------------------------------------------------------- Volume
	/// The mask column in use for this element's layout.
	fn mask(&self, ch: MixerChannel) -> PositionMask {
		self.masks[ch][self.n_channels - 1]
	}

	/// Read this element's per-channel volume, folded onto `cm`.
	///
	/// Channels not covered by the element read as
	/// [`Volume::NORM`]; covered channels take the loudest
	/// matching hardware channel.
	pub fn get_volume(
		&self,
		mixer: &dyn MixerBackend,
		cm: &ChannelMap,
		use_db: bool,
	) -> Result<ChannelVolumes, Error> {
		let mut v = ChannelVolumes::muted(cm.channels);
		let mut covered = PositionMask::NONE;

		for ch in 0..MIXER_CHANNELS {
			if !mixer.has_channel(&self.alsa_name, self.direction, ch) && !(self.n_channels == 1 && ch == 0) {
				continue;
			}

			let f = if self.has_db && use_db {
				let cb = if let Some(fix) = &self.db_fix {
					let step = mixer.get_volume(&self.alsa_name, self.direction, ch)?;
					// Out-of-range steps get clamped back into the
					// fix's range on the hardware side too.
					fix.db_at(step)
				} else {
					mixer.get_db(&self.alsa_name, self.direction, ch)?
				};

				volume_from_cb(cb)
			} else {
				let step = mixer.get_volume(&self.alsa_name, self.direction, ch)?;
				Volume::from_hw(step, self.min_volume, self.max_volume)
			};

			for (k, p) in cm.positions().iter().enumerate() {
				if self.mask(ch).contains(*p) && v.values[k] < f {
					v.values[k] = f;
				}
			}

			covered |= self.mask(ch);
		}

		for (k, p) in cm.positions().iter().enumerate() {
			if !covered.contains(*p) {
				v.values[k] = Volume::NORM;
			}
		}

		Ok(v)
	}

	/// Ask the hardware which decibel value it would actually pick
	/// for `cb`, checking both rounding directions and returning
	/// the closer one. Used under deferred volume, where later
	/// correction is not possible.
	fn nearest_db(&self, mixer: &dyn MixerBackend, cb: i64) -> Result<i64, Error> {
		let up_step = mixer.ask_db_vol(&self.alsa_name, self.direction, cb, Rounding::Up)?;
		let up_cb = mixer.ask_vol_db(&self.alsa_name, self.direction, up_step)?;

		let down_step = mixer.ask_db_vol(&self.alsa_name, self.direction, cb, Rounding::Down)?;
		let down_cb = mixer.ask_vol_db(&self.alsa_name, self.direction, down_step)?;

		Ok(if (up_cb - cb).abs() <= (cb - down_cb).abs() { up_cb } else { down_cb })
	}

	/// Write `v` (over `cm`) to this element, returning what the
	/// hardware actually selected, folded back onto `cm`.
	pub fn set_volume(
		&self,
		mixer: &mut dyn MixerBackend,
		cm: &ChannelMap,
		v: &ChannelVolumes,
		use_db: bool,
		deferred: bool,
		write_to_hw: bool,
	) -> Result<ChannelVolumes, Error> {
		debug_assert!(v.compatible_with_map(cm));

		let rounding = match self.direction {
			Direction::Playback => Rounding::Up,
			Direction::Capture  => Rounding::Down,
		};

		let mut rv = ChannelVolumes::muted(cm.channels);
		let mut covered = PositionMask::NONE;

		for ch in 0..MIXER_CHANNELS {
			if !mixer.has_channel(&self.alsa_name, self.direction, ch) && !(self.n_channels == 1 && ch == 0) {
				continue;
			}

			// The loudest requested volume among the positions this
			// hardware channel controls; uncovered channels get the
			// overall maximum.
			let mut f = Volume::MUTED;
			let mut found = false;
			for (k, p) in cm.positions().iter().enumerate() {
				if self.mask(ch).contains(*p) {
					found = true;
					if v.values[k] > f {
						f = v.values[k];
					}
				}
			}
			if !found {
				f = v.max();
			}

			let selected = if self.has_db && use_db {
				let mut cb = volume_to_cb(f);

				if self.volume_limit.is_some() && cb > self.max_db {
					cb = self.max_db;
				}

				let out_cb = if let Some(fix) = &self.db_fix {
					let (step, actual) = fix.step_for_db(cb, rounding);
					if write_to_hw {
						mixer.set_volume(&self.alsa_name, self.direction, ch, step)?;
					}
					actual
				} else if write_to_hw {
					if deferred {
						let nearest = self.nearest_db(mixer, cb)?;
						mixer.set_db(&self.alsa_name, self.direction, ch, nearest, rounding)?
					} else {
						mixer.set_db(&self.alsa_name, self.direction, ch, cb, rounding)?
					}
				} else {
					let step = mixer.ask_db_vol(&self.alsa_name, self.direction, cb, rounding)?;
					mixer.ask_vol_db(&self.alsa_name, self.direction, step)?
				};

				volume_from_cb(out_cb)
			} else {
				let step = f.to_hw(self.min_volume, self.max_volume);
				if write_to_hw {
					mixer.set_volume(&self.alsa_name, self.direction, ch, step)?;
				}
				Volume::from_hw(step, self.min_volume, self.max_volume)
			};

			for (k, p) in cm.positions().iter().enumerate() {
				if self.mask(ch).contains(*p) && rv.values[k] < selected {
					rv.values[k] = selected;
				}
			}

			covered |= self.mask(ch);
		}

		for (k, p) in cm.positions().iter().enumerate() {
			if !covered.contains(*p) {
				rv.values[k] = Volume::NORM;
			}
		}

		Ok(rv)
	}

	//---------------------------------------------------------------------------------------------------- Switch / constant / option
	/// Read this element's switch.
	pub fn get_switch(&self, mixer: &dyn MixerBackend) -> Result<bool, Error> {
		mixer.get_switch(&self.alsa_name, self.direction)
	}

	/// Write this element's switch.
	pub fn set_switch(&self, mixer: &mut dyn MixerBackend, on: bool) -> Result<(), Error> {
		mixer.set_switch_all(&self.alsa_name, self.direction, on).map_err(|e| {
			warn2!("failed to set switch of {}: {e}", self.alsa_name);
			e
		})
	}

	/// Apply an `off`, `zero` or `constant` volume use.
	pub fn set_constant_volume(&self, mixer: &mut dyn MixerBackend) -> Result<(), Error> {
		let step = match self.volume_use {
			VolumeConfig::Off => Some(self.min_volume),
			VolumeConfig::Constant(c) => Some(c),
			VolumeConfig::Zero => {
				let rounding = match self.direction {
					Direction::Playback => Rounding::Up,
					Direction::Capture  => Rounding::Down,
				};
				self.db_fix.as_ref().map(|fix| fix.step_for_db(0, rounding).0)
			},
			_ => {
				debug2!("set_constant_volume on {} with use {:?}", self.alsa_name, self.volume_use);
				return Err(Error::Invalid);
			},
		};

		match step {
			Some(step) => mixer.set_volume_all(&self.alsa_name, self.direction, step),
			// Zero without a fix: ask the hardware for 0 dB directly.
			// Elements that cannot express decibels at all get pinned
			// to their maximum step instead.
			None => {
				let rounding = match self.direction {
					Direction::Playback => Rounding::Up,
					Direction::Capture  => Rounding::Down,
				};
				match mixer.set_db_all(&self.alsa_name, self.direction, 0, rounding) {
					Err(Error::NotSupported) => {
						mixer.set_volume_all(&self.alsa_name, self.direction, self.max_volume)
					},
					r => r,
				}
			},
		}
		.map_err(|e| {
			warn2!("failed to set constant volume of {}: {e}", self.alsa_name);
			e
		})
	}

	/// Select one option on a select switch / enumeration.
	pub fn set_option(&self, mixer: &mut dyn MixerBackend, opt: &PathOption) -> Result<(), Error> {
		let Some(idx) = opt.alsa_idx else {
			return Err(Error::NoEntity);
		};

		if self.switch_use == SwitchConfig::Select {
			mixer.set_switch_all(&self.alsa_name, self.direction, idx != 0)
		} else {
			debug_assert_eq!(self.enumeration_use, EnumConfig::Select);
			mixer.set_enum_item(&self.alsa_name, idx)
		}
		.map_err(|e| {
			warn2!("failed to set option of {}: {e}", self.alsa_name);
			e
		})
	}

	//---------------------------------------------------------------------------------------------------- Subset
	/// Is `self`'s use of the hardware a subset of `other`'s?
	///
	/// `Ignore` is a subset of everything; `Constant` equals only
	/// itself; anything fits inside `Merge` provided the effective
	/// maximum stays within `Merge`'s volume limit; `On`/`Off` fit
	/// inside `Select` iff the corresponding option exists.
	pub fn is_subset(&self, other: &Self, mixer: &dyn MixerBackend) -> bool {
		// Volume use.
		if self.volume_use != VolumeConfig::Ignore {
			if let (VolumeConfig::Constant(a), VolumeConfig::Constant(b)) = (self.volume_use, other.volume_use) {
				if a != b {
					return false;
				}
			}

			if std::mem::discriminant(&self.volume_use) != std::mem::discriminant(&other.volume_use)
				&& other.volume_use != VolumeConfig::Merge
			{
				return false;
			}

			if other.volume_use == VolumeConfig::Merge {
				if let Some(b_limit) = other.volume_limit {
					let a_limit = match self.volume_use {
						VolumeConfig::Constant(c) => Some(c),
						VolumeConfig::Off => Some(self.min_volume),
						VolumeConfig::Merge => Some(self.volume_limit.unwrap_or(self.max_volume)),
						VolumeConfig::Zero => {
							let rounding = match self.direction {
								Direction::Playback => Rounding::Up,
								Direction::Capture  => Rounding::Down,
							};
							match &self.db_fix {
								Some(fix) => Some(fix.step_for_db(0, rounding).0),
								None => mixer.ask_db_vol(&self.alsa_name, self.direction, 0, rounding).ok(),
							}
						},
						VolumeConfig::Ignore => None,
					};

					match a_limit {
						Some(a_limit) if a_limit <= b_limit => {},
						_ => return false,
					}
				}
			}

			if self.volume_use == VolumeConfig::Merge {
				// Differing channel layouts/masks are not subsets.
				if self.n_channels != other.n_channels {
					return false;
				}
				for ch in 0..MIXER_CHANNELS {
					if self.mask(ch) != other.mask(ch) {
						debug2!("element {} not a subset: mask mismatch at channel {ch}", self.alsa_name);
						return false;
					}
				}
			}
		}

		// Switch use.
		if self.switch_use != SwitchConfig::Ignore {
			if self.switch_use != other.switch_use {
				if self.switch_use == SwitchConfig::Select
					|| self.switch_use == SwitchConfig::Mute
					|| other.switch_use == SwitchConfig::Off
					|| other.switch_use == SwitchConfig::On
				{
					return false;
				}

				if other.switch_use == SwitchConfig::Select {
					let needed = match self.switch_use {
						SwitchConfig::On  => "on",
						SwitchConfig::Off => "off",
						_ => return false,
					};
					if !other.options.iter().any(|o| o.alsa_name == needed) {
						return false;
					}
				}
			} else if self.switch_use == SwitchConfig::Select
				&& !options_are_subset(&self.options, &other.options)
			{
				return false;
			}
		}

		// Enumeration use.
		if self.enumeration_use != EnumConfig::Ignore {
			if other.enumeration_use == EnumConfig::Ignore {
				return false;
			}
			if !options_are_subset(&self.options, &other.options) {
				return false;
			}
		}

		true
	}
}

/// Every option of `a` must exist in `b` (by hardware name).
fn options_are_subset(a: &[PathOption], b: &[PathOption]) -> bool {
	if a.is_empty() {
		return true;
	}
	if b.is_empty() {
		return false;
	}

	a.iter().all(|oa| b.iter().any(|ob| ob.alsa_name == oa.alsa_name))
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::mixer::dummy::{DummyElement,DummyMixer};
	use pretty_assertions::assert_eq;

	fn merge_element(name: &str) -> Element {
		let mut cfg = ElementConfig::new(name);
		cfg.volume = VolumeConfig::Merge;
		Element::from_config(&cfg, Direction::Playback, &[])
	}

	#[test]
	fn missing_element_downgrades_to_ignore() {
		let mut mixer = DummyMixer::new();
		let mut e = merge_element("Master");

		assert!(e.probe(&mut mixer).is_ok());
		assert_eq!(e.volume_use, VolumeConfig::Ignore);
	}

	#[test]
	fn missing_required_element_fails() {
		let mut mixer = DummyMixer::new();
		let mut e = merge_element("Master");
		e.required = Required::Volume;

		assert_eq!(e.probe(&mut mixer), Err(Error::NoEntity));
	}

	#[test]
	fn probe_fills_ranges_and_masks() {
		let mut mixer = DummyMixer::new().with_element(
			"Master",
			DummyElement::stereo_volume(Direction::Playback, 0, 64, -6_400, 0),
		);
		let mut e = merge_element("Master");

		e.probe(&mut mixer).unwrap();

		assert!(e.has_db);
		assert_eq!((e.min_volume, e.max_volume), (0, 64));
		assert_eq!((e.min_db, e.max_db), (-6_400, 0));
		assert_eq!(e.n_channels, 2);
		assert!(e.mask(0).contains(Position::FrontLeft));
		assert!(e.mask(1).contains(Position::FrontRight));
	}

	#[test]
	fn inconsistent_db_reporting_rejects_element() {
		let mut dummy = DummyElement::stereo_volume(Direction::Playback, 0, 64, -6_400, 0);
		dummy.playback_volume.as_mut().unwrap().broken_db_range = Some((-9_999, 0));
		let mut mixer = DummyMixer::new().with_element("Master", dummy);

		let mut e = merge_element("Master");
		assert_eq!(e.probe(&mut mixer), Err(Error::Invalid));
	}

	#[test]
	fn volume_round_trips_through_hardware() {
		let mut mixer = DummyMixer::new().with_element(
			"Master",
			DummyElement::stereo_volume(Direction::Playback, 0, 255, -10_000, 0),
		);
		let mut e = merge_element("Master");
		e.probe(&mut mixer).unwrap();

		let cm = ChannelMap::STEREO;
		let v = ChannelVolumes::uniform(2, Volume(0xC000));
		let applied = e.set_volume(&mut mixer, &cm, &v, true, false, true).unwrap();
		let read = e.get_volume(&mixer, &cm, true).unwrap();

		assert_eq!(applied, read);
		// Quantization across 255 steps of 100dB stays within ~1%.
		assert!(read.values[0].0.abs_diff(0xC000) < 0x400);
	}

	#[test]
	fn switch_select_probes_on_off() {
		let mut mixer = DummyMixer::new()
			.with_element("Boost", DummyElement::switch(Direction::Capture, false));

		let mut cfg = ElementConfig::new("Boost");
		cfg.switch = SwitchConfig::Select;
		let opts = [
			OptionConfig {
				element: "Boost".into(), alsa_name: "on".into(),
				name: Some("input-boost-on".into()), priority: 5,
				required: Required::Ignore, required_any: Required::Ignore,
				required_absent: Required::Ignore,
			},
			OptionConfig {
				element: "Boost".into(), alsa_name: "off".into(),
				name: Some("input-boost-off".into()), priority: 1,
				required: Required::Ignore, required_any: Required::Ignore,
				required_absent: Required::Ignore,
			},
		];
		let mut e = Element::from_config(&cfg, Direction::Capture, &opts);
		e.probe(&mut mixer).unwrap();

		assert_eq!(e.options[0].alsa_idx, Some(1));
		assert_eq!(e.options[1].alsa_idx, Some(0));
		assert_eq!(e.options[0].description, "Boost");

		e.set_option(&mut mixer, &e.options[0]).unwrap();
		assert!(mixer.get_switch("Boost", Direction::Capture).unwrap());
	}
}
