//! A mixer path: an ordered chain of elements exposing one logical
//! volume slider, one logical mute switch and optionally a pick-list
//! of named settings.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::{ChannelMap,ChannelVolumes,PositionMask};
use crate::error::Error;
use crate::macros::{debug2,info2};
use crate::mixer::backend::MixerBackend;
use crate::mixer::config::{EnumConfig,PathConfig,Required,SwitchConfig,VolumeConfig};
use crate::mixer::db_fix::DecibelFix;
use crate::mixer::element::{lookup_description,Element};
use crate::mixer::jack::Jack;
use crate::mixer::Direction;
use crate::channel::Position;

//---------------------------------------------------------------------------------------------------- Descriptions
/// Well-known path name/key → description.
const PATH_DESCRIPTIONS: &[(&str, &str)] = &[
	("analog-input",                      "Analog Input"),
	("analog-input-microphone",           "Microphone"),
	("analog-input-microphone-front",     "Front Microphone"),
	("analog-input-microphone-rear",      "Rear Microphone"),
	("analog-input-microphone-dock",      "Dock Microphone"),
	("analog-input-microphone-internal",  "Internal Microphone"),
	("analog-input-microphone-headset",   "Headset Microphone"),
	("analog-input-linein",               "Line In"),
	("analog-input-radio",                "Radio"),
	("analog-input-video",                "Video"),
	("analog-output",                     "Analog Output"),
	("analog-output-headphones",          "Headphones"),
	("analog-output-lfe-on-mono",         "LFE on Separate Mono Output"),
	("analog-output-lineout",             "Line Out"),
	("analog-output-mono",                "Analog Mono Output"),
	("analog-output-speaker",             "Speakers"),
	("hdmi-output",                       "HDMI / DisplayPort"),
	("iec958-stereo-output",              "Digital Output (S/PDIF)"),
	("iec958-stereo-input",               "Digital Input (S/PDIF)"),
	("iec958-passthrough-output",         "Digital Passthrough (S/PDIF)"),
];

//---------------------------------------------------------------------------------------------------- Setting
/// A named permutation of the `select` options along a path.
///
/// Options are referenced as (element index, option index) into the
/// owning path.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Setting {
	/// Unique name within the path (options joined with `+`).
	pub name: String,
	/// Human description (options joined with ` / `).
	pub description: String,
	/// Highest priority among the chosen options.
	pub priority: u32,
	/// One chosen option per `select` element, in element order.
	pub options: Vec<(usize, usize)>,
}

//---------------------------------------------------------------------------------------------------- Path
/// A probed (or to-be-probed) mixer path.
#[derive(Clone,Debug)]
pub struct Path {
	/// Path name, unique within a path set.
	pub name: String,
	/// Human description.
	pub description: String,
	/// Key into the well-known description table.
	pub description_key: Option<String>,
	/// Which direction this path serves.
	pub direction: Direction,
	/// Priority; higher wins for the default port.
	pub priority: u32,
	/// HDMI ELD device index, if any.
	pub eld_device: Option<i32>,
	/// Mute the hardware while activating this path.
	pub mute_during_activation: bool,

	/// Has [`Self::probe`] run?
	pub probed: bool,
	/// Did the probe succeed?
	pub supported: bool,

	/// At least one element merges into the path volume.
	pub has_volume: bool,
	/// All merged elements report decibels.
	pub has_db: bool,
	/// At least one element acts as the mute switch.
	pub has_mute: bool,
	/// Raw step range of the path volume (first merged element).
	pub min_volume: i64,
	/// Raw step range of the path volume (first merged element).
	pub max_volume: i64,
	/// Summed decibel range (centibels) over the covered channels.
	pub min_db: i64,
	/// Summed decibel range (centibels) over the covered channels.
	pub max_db: i64,

	/// Any `required-any` clause exists in the config.
	pub has_req_any: bool,
	/// Some `required-any` entity turned out present.
	pub req_any_present: bool,

	/// The elements, in configuration order.
	pub elements: Vec<Element>,
	/// The jacks.
	pub jacks: Vec<Jack>,
	/// The synthesized settings.
	pub settings: Vec<Setting>,
}

impl Path {
	/// Build an unprobed path from the configuration schema.
	pub fn from_config(cfg: &PathConfig, db_fixes: &[DecibelFix]) -> Result<Self, Error> {
		let mut elements: Vec<Element> = cfg
			.elements
			.iter()
			.map(|e| Element::from_config(e, cfg.direction, &cfg.options))
			.collect();

		for e in &mut elements {
			e.db_fix = db_fixes.iter().find(|f| f.name == e.alsa_name).cloned();
		}

		let jacks: Vec<Jack> = cfg.jacks.iter().map(Jack::from_config).collect();

		let has_req_any = elements.iter().any(|e| e.required_any != Required::Ignore)
			|| elements.iter().flat_map(|e| &e.options).any(|o| o.required_any != Required::Ignore)
			|| jacks.iter().any(|j| j.required_any != Required::Ignore);

		let description = cfg.general.description.clone().or_else(|| {
			let key = cfg.general.description_key.as_deref().unwrap_or(&cfg.name);
			lookup_description(key, PATH_DESCRIPTIONS)
		});

		let this = Self {
			name: cfg.name.clone(),
			description: description.unwrap_or_else(|| cfg.name.clone()),
			description_key: cfg.general.description_key.clone(),
			direction: cfg.direction,
			priority: cfg.general.priority,
			eld_device: cfg.general.eld_device,
			mute_during_activation: cfg.general.mute_during_activation,
			probed: false,
			supported: false,
			has_volume: false,
			has_db: false,
			has_mute: false,
			min_volume: 0,
			max_volume: 0,
			min_db: 0,
			max_db: 0,
			has_req_any,
			req_any_present: false,
			elements,
			jacks,
			settings: Vec::new(),
		};

		this.verify()?;
		Ok(this)
	}

	/// Synthesize a one-element fallback path around a single
	/// element name (used when no path files apply).
	pub fn synthesize(element: &str, direction: Direction) -> Self {
		let mut cfg = PathConfig::new(element, direction);
		let mut e = crate::mixer::config::ElementConfig::new(element);
		e.volume = VolumeConfig::Merge;
		e.switch = SwitchConfig::Mute;
		cfg.elements.push(e);

		// A config this minimal always passes verification.
		Self::from_config(&cfg, &[]).unwrap()
	}

	/// Static consistency checks.
	fn verify(&self) -> Result<(), Error> {
		for e in &self.elements {
			e.verify()?;
		}
		Ok(())
	}

	//---------------------------------------------------------------------------------------------------- Probe
	/// Probe jacks and elements, resolve the path-level invariants,
	/// drop unsupported pieces and synthesize the settings.
	pub fn probe(&mut self, mixer: &mut dyn MixerBackend, ignore_db: bool) -> Result<(), Error> {
		if self.probed {
			return if self.supported { Ok(()) } else { Err(Error::NoEntity) };
		}
		self.probed = true;

		debug2!("probing path '{}'", self.name);

		for j in &mut self.jacks {
			match j.probe(mixer) {
				Ok(contributes) => self.req_any_present |= contributes,
				Err(e) => {
					debug2!("probe of jack '{}' failed", j.alsa_name);
					self.supported = false;
					return Err(e);
				},
			}
		}

		// Per-position dB ranges, summed over the merged elements.
		let mut min_db = [0_i64; Position::COUNT];
		let mut max_db = [0_i64; Position::COUNT];
		let mut volume_channels = PositionMask::NONE;

		for i in 0..self.elements.len() {
			let e = &mut self.elements[i];

			match e.probe(mixer) {
				Ok(contributes) => self.req_any_present |= contributes,
				Err(err) => {
					debug2!("probe of element '{}' failed", e.alsa_name);
					self.supported = false;
					return Err(err);
				},
			}

			if ignore_db {
				e.has_db = false;
			}

			if e.volume_use == VolumeConfig::Merge {
				if e.has_db {
					if self.has_volume && !self.has_db {
						// Earlier merged elements lack dB, this one has
						// it. All variable gain must be concentrated in
						// the dB-capable elements, so pin the earlier
						// ones to their 0 dB position and start the dB
						// aggregation afresh from this element.
						for earlier in &mut self.elements[..i] {
							if earlier.volume_use == VolumeConfig::Merge {
								info2!("zeroing volume of '{}' on path '{}'", earlier.alsa_name, self.name);
								earlier.volume_use = VolumeConfig::Zero;
							}
						}
						self.has_volume = false;
					}

					let e = &self.elements[i];
					if !self.has_volume {
						self.min_volume = e.min_volume;
						self.max_volume = e.max_volume;

						for p in Position::all() {
							if e.merged_mask.contains(p) {
								min_db[p as usize] = e.min_db;
								max_db[p as usize] = e.max_db;
								volume_channels |= p.mask();
							}
						}
						self.has_db = true;
					} else {
						for p in Position::all() {
							if e.merged_mask.contains(p) {
								min_db[p as usize] += e.min_db;
								max_db[p as usize] += e.max_db;
								volume_channels |= p.mask();
							}
						}
					}

					self.has_volume = true;
				} else if self.has_volume {
					// A gain-free element after the volume is already
					// covered cannot participate.
					info2!("ignoring volume of '{}' on path '{}' (missing dB info)", e.alsa_name, self.name);
					e.volume_use = VolumeConfig::Ignore;
				} else {
					self.min_volume = e.min_volume;
					self.max_volume = e.max_volume;
					self.has_volume = true;
				}
			}

			let e = &self.elements[i];
			if e.switch_use == SwitchConfig::Mute {
				self.has_mute = true;
			}
		}

		if self.has_req_any && !self.req_any_present {
			debug2!("skipping path '{}', no required-any entity present", self.name);
			self.supported = false;
			return Err(Error::NoEntity);
		}

		self.drop_unsupported();
		self.make_options_unique();
		self.create_settings();

		self.supported = true;

		self.min_db = i64::MAX;
		self.max_db = i64::MIN;
		for p in Position::all() {
			if volume_channels.contains(p) {
				self.min_db = self.min_db.min(min_db[p as usize]);
				self.max_db = self.max_db.max(max_db[p as usize]);
			}
		}
		if self.min_db > self.max_db {
			self.min_db = 0;
			self.max_db = 0;
		}

		Ok(())
	}

	/// Remove elements with no remaining use.
	fn drop_unsupported(&mut self) {
		self.elements.retain_mut(Element::drop_unsupported);
	}

	/// Append `-N` to option names (and ` N` to descriptions)
	/// colliding across elements of this path.
	fn make_options_unique(&mut self) {
		let mut names: Vec<String> = self
			.elements
			.iter()
			.flat_map(|e| e.options.iter().map(|o| o.name.clone()))
			.collect();
		names.sort();

		let duplicated: Vec<String> = names
			.windows(2)
			.filter(|w| w[0] == w[1])
			.map(|w| w[0].clone())
			.collect();

		for dup in duplicated {
			let mut i = 1_u32;
			for e in &mut self.elements {
				for o in &mut e.options {
					if o.name == dup {
						o.name = format!("{dup}-{i}");
						o.description = format!("{} {i}", o.description);
						i += 1;
					}
				}
			}
		}
	}

	/// Synthesize the Cartesian settings over all `select`
	/// elements: one option per such element per setting.
	fn create_settings(&mut self) {
		let select: Vec<usize> = self
			.elements
			.iter()
			.enumerate()
			.filter(|(_, e)| {
				e.switch_use == SwitchConfig::Select || e.enumeration_use == EnumConfig::Select
			})
			.map(|(i, _)| i)
			.collect();

		self.settings.clear();
		if select.is_empty() {
			return;
		}

		let mut settings = Vec::new();
		Self::compose_settings(&self.elements, &select, 0, None, &mut settings);
		self.settings = settings;
	}

	fn compose_settings(
		elements: &[Element],
		select: &[usize],
		depth: usize,
		template: Option<&Setting>,
		out: &mut Vec<Setting>,
	) {
		if depth == select.len() {
			if let Some(t) = template {
				out.push(t.clone());
			}
			return;
		}

		let elem_idx = select[depth];
		for (opt_idx, o) in elements[elem_idx].options.iter().enumerate() {
			let s = match template {
				Some(t) => Setting {
					name: format!("{}+{}", t.name, o.name),
					description: if t.description.is_empty() {
						o.description.clone()
					} else if o.description.is_empty() {
						t.description.clone()
					} else {
						format!("{} / {}", t.description, o.description)
					},
					priority: t.priority.max(o.priority),
					options: {
						let mut v = t.options.clone();
						v.push((elem_idx, opt_idx));
						v
					},
				},
				None => Setting {
					name: o.name.clone(),
					description: o.description.clone(),
					priority: o.priority,
					options: vec![(elem_idx, opt_idx)],
				},
			};

			Self::compose_settings(elements, select, depth + 1, Some(&s), out);
		}
	}

	//---------------------------------------------------------------------------------------------------- Volume / mute
	/// Read the path volume, folded onto `cm`.
	///
	/// With decibels, the merged elements multiply; without, the
	/// first merged element alone defines the volume.
	pub fn get_volume(&self, mixer: &dyn MixerBackend, cm: &ChannelMap) -> Result<ChannelVolumes, Error> {
		if !self.has_volume {
			return Err(Error::NotSupported);
		}

		let mut v = ChannelVolumes::norm(cm.channels);

		for e in &self.elements {
			if e.volume_use != VolumeConfig::Merge {
				continue;
			}

			let ev = e.get_volume(mixer, cm, self.has_db)?;

			if !self.has_db {
				return Ok(ev);
			}

			v = v.multiply(&ev);
		}

		Ok(v)
	}

	/// Write the path volume: distribute `v` over the merged
	/// elements, each taking what it can and passing the remainder
	/// on. Returns what the hardware chain actually realizes.
	pub fn set_volume(
		&self,
		mixer: &mut dyn MixerBackend,
		cm: &ChannelMap,
		v: &ChannelVolumes,
		deferred: bool,
		write_to_hw: bool,
	) -> Result<ChannelVolumes, Error> {
		debug_assert!(v.compatible_with_map(cm));

		if !self.has_volume {
			return Err(Error::NotSupported);
		}

		// Remaining adjustment / adjustment done.
		let mut rv = *v;
		let mut done = ChannelVolumes::norm(cm.channels);

		for e in &self.elements {
			if e.volume_use != VolumeConfig::Merge {
				continue;
			}

			debug_assert!(!self.has_db || e.has_db);

			let ev = e.set_volume(mixer, cm, &rv, self.has_db, deferred, write_to_hw)?;

			if !self.has_db {
				return Ok(ev);
			}

			done = done.multiply(&ev);
			rv = rv.divide(&ev);
		}

		Ok(done)
	}

	/// Read the path mute state (first mute element wins).
	pub fn get_mute(&self, mixer: &dyn MixerBackend) -> Result<bool, Error> {
		if !self.has_mute {
			return Err(Error::NotSupported);
		}

		for e in &self.elements {
			if e.switch_use == SwitchConfig::Mute {
				return Ok(!e.get_switch(mixer)?);
			}
		}

		Err(Error::NotSupported)
	}

	/// Write the path mute state to every mute element.
	pub fn set_mute(&self, mixer: &mut dyn MixerBackend, muted: bool) -> Result<(), Error> {
		if !self.has_mute {
			return Err(Error::NotSupported);
		}

		for e in &self.elements {
			if e.switch_use == SwitchConfig::Mute {
				e.set_switch(mixer, !muted)?;
			}
		}

		Ok(())
	}

	//---------------------------------------------------------------------------------------------------- Select
	/// Activate this path: apply constant volumes, forced switches
	/// and the chosen setting's options.
	///
	/// With `mute-during-activation`, the hardware mute is engaged
	/// around the whole procedure and restored to `device_is_muted`.
	pub fn select(
		&self,
		setting: Option<usize>,
		mixer: &mut dyn MixerBackend,
		device_is_muted: bool,
	) -> Result<(), Error> {
		debug2!("activating path {}", self.name);

		if self.mute_during_activation {
			for e in &self.elements {
				if e.switch_use == SwitchConfig::Mute {
					// Failing to pre-mute is not fatal for selection.
					drop(e.set_switch(mixer, false));
				}
			}
		}

		for e in &self.elements {
			match e.switch_use {
				SwitchConfig::Off => e.set_switch(mixer, false)?,
				SwitchConfig::On  => e.set_switch(mixer, true)?,
				SwitchConfig::Mute | SwitchConfig::Ignore | SwitchConfig::Select => {},
			}

			match e.volume_use {
				VolumeConfig::Off | VolumeConfig::Zero | VolumeConfig::Constant(_) => {
					e.set_constant_volume(mixer)?;
				},
				VolumeConfig::Merge | VolumeConfig::Ignore => {},
			}
		}

		if let Some(idx) = setting {
			let s = self.settings.get(idx).ok_or(Error::NoEntity)?;
			for (elem_idx, opt_idx) in &s.options {
				let e = &self.elements[*elem_idx];
				e.set_option(mixer, &e.options[*opt_idx])?;
			}
		}

		if self.mute_during_activation {
			for e in &self.elements {
				if e.switch_use == SwitchConfig::Mute {
					e.set_switch(mixer, !device_is_muted)?;
				}
			}
		}

		Ok(())
	}

	//---------------------------------------------------------------------------------------------------- Subset
	/// Is this path a subset of `other` (so it can be dropped from
	/// a path set)?
	pub fn is_subset_of(&self, other: &Self, mixer: &dyn MixerBackend) -> bool {
		// Every controlled jack must exist in `other` with the same
		// availability mapping.
		for ja in &self.jacks {
			if !ja.has_control {
				continue;
			}

			let exists = other.jacks.iter().any(|jb| {
				jb.has_control
					&& jb.alsa_name == ja.alsa_name
					&& ja.state_plugged == jb.state_plugged
					&& ja.state_unplugged == jb.state_unplugged
			});

			if !exists {
				return false;
			}
		}

		// Walk elements pairwise; names must line up.
		if self.elements.len() != other.elements.len() {
			return false;
		}

		for (ea, eb) in self.elements.iter().zip(&other.elements) {
			if ea.alsa_name != eb.alsa_name {
				return false;
			}
			if !ea.is_subset(eb, mixer) {
				return false;
			}
		}

		true
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::channel::Volume;
	use crate::mixer::config::{ElementConfig,JackConfig,OptionConfig};
	use crate::mixer::dummy::{DummyElement,DummyMixer};
	use crate::device::port::Available;
	use pretty_assertions::assert_eq;

	fn opt(element: &str, alsa_name: &str, name: &str, priority: u32) -> OptionConfig {
		OptionConfig {
			element: element.to_owned(),
			alsa_name: alsa_name.to_owned(),
			name: Some(name.to_owned()),
			priority,
			required: Required::Ignore,
			required_any: Required::Ignore,
			required_absent: Required::Ignore,
		}
	}

	fn two_slider_mixer() -> DummyMixer {
		DummyMixer::new()
			.with_element("Master", DummyElement::stereo_volume(Direction::Playback, 0, 64, -6_400, 0))
			.with_element("PCM", DummyElement::stereo_volume(Direction::Playback, 0, 255, -5_100, 0))
			.with_element("Master Mute", DummyElement::switch(Direction::Playback, true))
	}

	fn two_slider_path() -> Path {
		let mut cfg = PathConfig::new("analog-output", Direction::Playback);

		let mut master = ElementConfig::new("Master");
		master.volume = VolumeConfig::Merge;
		cfg.elements.push(master);

		let mut mute = ElementConfig::new("Master Mute");
		mute.switch = SwitchConfig::Mute;
		cfg.elements.push(mute);

		let mut pcm = ElementConfig::new("PCM");
		pcm.volume = VolumeConfig::Merge;
		cfg.elements.push(pcm);

		Path::from_config(&cfg, &[]).unwrap()
	}

	#[test]
	fn probe_aggregates_path_invariants() {
		let mut mixer = two_slider_mixer();
		let mut p = two_slider_path();

		p.probe(&mut mixer, false).unwrap();

		assert!(p.supported);
		assert!(p.has_volume);
		assert!(p.has_db);
		assert!(p.has_mute);
		// dB ranges of both sliders sum over the covered channels.
		assert_eq!(p.min_db, -11_500);
		assert_eq!(p.max_db, 0);
		assert_eq!(p.description, "Analog Output");
	}

	#[test]
	fn set_volume_distributes_over_elements() {
		let mut mixer = two_slider_mixer();
		let mut p = two_slider_path();
		p.probe(&mut mixer, false).unwrap();

		let cm = ChannelMap::STEREO;
		let v = ChannelVolumes::uniform(2, Volume(0xB000));
		let applied = p.set_volume(&mut mixer, &cm, &v, false, true).unwrap();
		let read = p.get_volume(&mixer, &cm).unwrap();

		assert_eq!(applied, read);
		// 448 steps across ~115 dB: stays within one percent.
		assert!(read.values[0].0.abs_diff(0xB000) < 0x400);
	}

	#[test]
	fn mute_round_trip() {
		let mut mixer = two_slider_mixer();
		let mut p = two_slider_path();
		p.probe(&mut mixer, false).unwrap();

		assert!(!p.get_mute(&mixer).unwrap());
		p.set_mute(&mut mixer, true).unwrap();
		assert!(p.get_mute(&mixer).unwrap());
	}

	#[test]
	fn earlier_element_without_db_demoted_to_zero() {
		let mut mixer = DummyMixer::new()
			.with_element("Raw", {
				let mut e = DummyElement::default();
				e.channels = vec![0, 1];
				e.playback_volume = Some(crate::mixer::dummy::DummyVolume::without_db(0, 100));
				e
			})
			.with_element("Master", DummyElement::stereo_volume(Direction::Playback, 0, 64, -6_400, 0));

		let mut cfg = PathConfig::new("out", Direction::Playback);
		let mut raw = ElementConfig::new("Raw");
		raw.volume = VolumeConfig::Merge;
		cfg.elements.push(raw);
		let mut master = ElementConfig::new("Master");
		master.volume = VolumeConfig::Merge;
		cfg.elements.push(master);

		let mut p = Path::from_config(&cfg, &[]).unwrap();
		p.probe(&mut mixer, false).unwrap();

		assert_eq!(p.elements[0].volume_use, VolumeConfig::Zero);
		assert_eq!(p.elements[1].volume_use, VolumeConfig::Merge);
		assert!(p.has_db);
	}

	#[test]
	fn settings_compose_cartesian() {
		let mut mixer = DummyMixer::new()
			.with_element("Input Source", DummyElement::enumeration(&["Mic", "Line"]))
			.with_element("Boost", DummyElement::switch(Direction::Capture, false));

		let mut cfg = PathConfig::new("analog-input", Direction::Capture);

		let mut source = ElementConfig::new("Input Source");
		source.enumeration = EnumConfig::Select;
		cfg.elements.push(source);

		let mut boost = ElementConfig::new("Boost");
		boost.switch = SwitchConfig::Select;
		cfg.elements.push(boost);

		cfg.options.push(opt("Input Source", "Mic", "input-microphone", 20));
		cfg.options.push(opt("Input Source", "Line", "input-linein", 10));
		cfg.options.push(opt("Boost", "on", "input-boost-on", 2));
		cfg.options.push(opt("Boost", "off", "input-boost-off", 1));

		let mut p = Path::from_config(&cfg, &[]).unwrap();
		p.probe(&mut mixer, false).unwrap();

		let names: Vec<&str> = p.settings.iter().map(|s| s.name.as_str()).collect();
		assert_eq!(names, vec![
			"input-microphone+input-boost-on",
			"input-microphone+input-boost-off",
			"input-linein+input-boost-on",
			"input-linein+input-boost-off",
		]);
		assert_eq!(p.settings[0].priority, 20);
		assert_eq!(p.settings[0].description, "Microphone / Boost");

		// Selecting a setting drives the hardware.
		p.select(Some(2), &mut mixer, false).unwrap();
		assert!(mixer.get_switch("Boost", Direction::Capture).unwrap());
		assert_eq!(mixer.elements["Input Source"].enum_selected, 1);
	}

	#[test]
	fn required_any_gates_path() {
		let mut mixer = DummyMixer::new();

		let mut cfg = PathConfig::new("analog-input", Direction::Capture);
		let mut e = ElementConfig::new("Mic");
		e.volume = VolumeConfig::Merge;
		e.required_any = Required::Volume;
		cfg.elements.push(e);

		let mut p = Path::from_config(&cfg, &[]).unwrap();
		assert_eq!(p.probe(&mut mixer, false), Err(Error::NoEntity));
		assert!(!p.supported);
	}

	#[test]
	fn jack_failure_fails_path() {
		let mut mixer = DummyMixer::new();

		let mut cfg = PathConfig::new("analog-output-headphones", Direction::Playback);
		cfg.jacks.push(JackConfig {
			name: "Headphone".into(),
			state_plugged: Available::Yes,
			state_unplugged: Available::No,
			required: Required::Any,
			required_any: Required::Ignore,
			required_absent: Required::Ignore,
		});

		let mut p = Path::from_config(&cfg, &[]).unwrap();
		assert_eq!(p.probe(&mut mixer, false), Err(Error::NoEntity));
	}
}
