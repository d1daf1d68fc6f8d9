//! Mappings, profiles and profile sets.
//!
//! A *mapping* names a (sample spec, channel map, device string)
//! combination for one direction; a *profile* is a named set of
//! input and output mappings a card can run simultaneously. The
//! probing of the actual PCM devices is an external collaborator
//! behind [`MappingProber`].

//---------------------------------------------------------------------------------------------------- use
use crate::channel::ChannelMap;
use crate::error::Error;
use crate::macros::{debug2,warn2};
use crate::mixer::{lookup_description,DecibelFix,Direction,MixerBackend,PathSet};
use std::collections::BTreeMap;
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- Descriptions
/// Well-known mapping name → description.
const MAPPING_DESCRIPTIONS: &[(&str, &str)] = &[
	("analog-mono",            "Analog Mono"),
	("analog-stereo",          "Analog Stereo"),
	("analog-surround-21",     "Analog Surround 2.1"),
	("analog-surround-40",     "Analog Surround 4.0"),
	("analog-surround-41",     "Analog Surround 4.1"),
	("analog-surround-50",     "Analog Surround 5.0"),
	("analog-surround-51",     "Analog Surround 5.1"),
	("analog-surround-71",     "Analog Surround 7.1"),
	("iec958-stereo",          "Digital Stereo (IEC958)"),
	("iec958-passthrough",     "Digital Passthrough (IEC958)"),
	("hdmi-stereo",            "Digital Stereo (HDMI)"),
	("hdmi-surround-51",       "Digital Surround 5.1 (HDMI)"),
];

/// Well-known profile name → description.
const PROFILE_DESCRIPTIONS: &[(&str, &str)] = &[
	("output:analog-mono+input:analog-mono",     "Analog Mono Duplex"),
	("output:analog-stereo+input:analog-stereo", "Analog Stereo Duplex"),
	("output:iec958-stereo+input:iec958-stereo", "Digital Stereo Duplex (IEC958)"),
	("off",                                      "Off"),
];

//---------------------------------------------------------------------------------------------------- MappingDirection
/// The `direction =` key of a mapping: which device directions
/// the mapping may serve.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MappingDirection {
	/// Both directions.
	#[default]
	Any,
	/// Capture only.
	Input,
	/// Playback only.
	Output,
}

impl MappingDirection {
	/// Can a mapping with this direction serve `dir`?
	pub const fn serves(self, dir: Direction) -> bool {
		match self {
			Self::Any    => true,
			Self::Input  => matches!(dir, Direction::Capture),
			Self::Output => matches!(dir, Direction::Playback),
		}
	}
}

//---------------------------------------------------------------------------------------------------- Config schema
/// One `[Mapping <name>]` section of a profile-set file.
#[derive(Clone,Debug,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MappingConfig {
	/// The mapping name.
	pub name: String,
	/// Device strings, `%f` replaced by the card identifier.
	pub device_strings: Vec<String>,
	/// The channel map this mapping runs.
	pub channel_map: ChannelMap,
	/// Names of path files for the capture side.
	#[cfg_attr(feature = "serde", serde(default))]
	pub paths_input: Vec<String>,
	/// Names of path files for the playback side.
	#[cfg_attr(feature = "serde", serde(default))]
	pub paths_output: Vec<String>,
	/// Fallback single mixer element for the capture side.
	pub element_input: Option<String>,
	/// Fallback single mixer element for the playback side.
	pub element_output: Option<String>,
	/// Which directions the mapping serves.
	#[cfg_attr(feature = "serde", serde(default))]
	pub direction: MappingDirection,
	/// Human description.
	pub description: Option<String>,
	/// Priority for auto-profile synthesis.
	#[cfg_attr(feature = "serde", serde(default))]
	pub priority: u32,
}

/// One `[Profile <name>]` section of a profile-set file.
#[derive(Clone,Debug,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileConfig {
	/// The profile name.
	pub name: String,
	/// Names of the capture mappings.
	#[cfg_attr(feature = "serde", serde(default))]
	pub input_mappings: Vec<String>,
	/// Names of the playback mappings.
	#[cfg_attr(feature = "serde", serde(default))]
	pub output_mappings: Vec<String>,
	/// Trust the profile without probing it.
	#[cfg_attr(feature = "serde", serde(default))]
	pub skip_probe: bool,
	/// Human description.
	pub description: Option<String>,
	/// Priority.
	#[cfg_attr(feature = "serde", serde(default))]
	pub priority: u32,
}

/// A whole parsed profile-set file.
#[derive(Clone,Debug,Default,PartialEq,Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProfileSetConfig {
	/// `[General] auto-profiles`.
	pub auto_profiles: bool,
	/// The mapping sections.
	pub mappings: Vec<MappingConfig>,
	/// The profile sections.
	pub profiles: Vec<ProfileConfig>,
	/// `[DecibelFix <element>]` sections, resolved to tables.
	pub decibel_fixes: Vec<DecibelFix>,
}

//---------------------------------------------------------------------------------------------------- Mapping
/// A verified mapping.
#[derive(Clone,Debug)]
pub struct Mapping {
	/// The mapping name.
	pub name: String,
	/// Human description.
	pub description: String,
	/// Device strings.
	pub device_strings: Vec<String>,
	/// The channel map.
	pub channel_map: ChannelMap,
	/// Path file names per direction.
	pub paths_input: Vec<String>,
	/// Path file names per direction.
	pub paths_output: Vec<String>,
	/// Fallback elements per direction.
	pub element_input: Option<String>,
	/// Fallback elements per direction.
	pub element_output: Option<String>,
	/// Served directions.
	pub direction: MappingDirection,
	/// Priority (boosted for bonus channel maps).
	pub priority: u32,
	/// How many supported profiles reference this mapping.
	pub supported: u32,
	/// The probed capture path set, if resolved.
	pub input_path_set: Option<PathSet>,
	/// The probed playback path set, if resolved.
	pub output_path_set: Option<PathSet>,
}

impl Mapping {
	/// Verify a config section into a mapping.
	///
	/// `bonus` is the channel map the caller would prefer; matching
	/// it bumps the priority (exact match more than count match).
	pub fn verify(cfg: &MappingConfig, bonus: Option<&ChannelMap>) -> Result<Self, Error> {
		if !cfg.channel_map.is_valid() {
			warn2!("mapping {} is missing a channel map", cfg.name);
			return Err(Error::Invalid);
		}

		if cfg.device_strings.is_empty() {
			warn2!("mapping {} is missing device strings", cfg.name);
			return Err(Error::Invalid);
		}

		if (!cfg.paths_input.is_empty() && cfg.element_input.is_some())
			|| (!cfg.paths_output.is_empty() && cfg.element_output.is_some())
		{
			warn2!("mapping {} must have either mixer path or mixer element, not both", cfg.name);
			return Err(Error::Invalid);
		}

		let description = cfg
			.description
			.clone()
			.or_else(|| lookup_description(&cfg.name, MAPPING_DESCRIPTIONS))
			.unwrap_or_else(|| cfg.name.clone());

		let mut priority = cfg.priority;
		if let Some(bonus) = bonus {
			if cfg.channel_map.equal(bonus) {
				priority += 50;
			} else if cfg.channel_map.channels == bonus.channels {
				priority += 30;
			}
		}

		Ok(Self {
			name: cfg.name.clone(),
			description,
			device_strings: cfg.device_strings.clone(),
			channel_map: cfg.channel_map,
			paths_input: cfg.paths_input.clone(),
			paths_output: cfg.paths_output.clone(),
			element_input: cfg.element_input.clone(),
			element_output: cfg.element_output.clone(),
			direction: cfg.direction,
			priority,
			supported: 0,
			input_path_set: None,
			output_path_set: None,
		})
	}

	/// Resolve and probe the path sets of this mapping against the
	/// hardware mixer. `path_configs` is the pool of parsed path
	/// files, keyed by name.
	pub fn probe_paths(
		&mut self,
		mixer: &mut dyn MixerBackend,
		path_configs: &[crate::mixer::PathConfig],
		db_fixes: &[DecibelFix],
	) {
		if self.direction.serves(Direction::Capture) && self.input_path_set.is_none() {
			self.input_path_set = self.resolve_direction(
				mixer, path_configs, db_fixes,
				Direction::Capture, &self.paths_input.clone(), self.element_input.clone(),
			);
		}

		if self.direction.serves(Direction::Playback) && self.output_path_set.is_none() {
			self.output_path_set = self.resolve_direction(
				mixer, path_configs, db_fixes,
				Direction::Playback, &self.paths_output.clone(), self.element_output.clone(),
			);
		}
	}

	fn resolve_direction(
		&self,
		mixer: &mut dyn MixerBackend,
		path_configs: &[crate::mixer::PathConfig],
		db_fixes: &[DecibelFix],
		direction: Direction,
		path_names: &[String],
		element: Option<String>,
	) -> Option<PathSet> {
		let mut set = if let Some(element) = element {
			PathSet::synthesize(&element, direction)
		} else if path_names.is_empty() {
			return None;
		} else {
			let configs: Vec<_> = path_configs
				.iter()
				.filter(|c| path_names.contains(&c.name))
				.cloned()
				.collect();
			PathSet::from_configs(&configs, db_fixes, direction)
		};

		match set.probe(mixer, false) {
			Ok(()) => Some(set),
			Err(_) => {
				debug2!("no usable {direction} path for mapping {}", self.name);
				None
			},
		}
	}
}

//---------------------------------------------------------------------------------------------------- Profile
/// A verified profile: a named combination of mappings.
#[derive(Clone,Debug)]
pub struct Profile {
	/// The profile name.
	pub name: String,
	/// Human description.
	pub description: String,
	/// Names of the capture mappings.
	pub input_mappings: Vec<String>,
	/// Names of the playback mappings.
	pub output_mappings: Vec<String>,
	/// Priority; auto profiles derive theirs from the mappings.
	pub priority: u32,
	/// Trust without probing.
	pub skip_probe: bool,
	/// Did the probe (or skip-probe) declare this usable?
	pub supported: bool,
}

//---------------------------------------------------------------------------------------------------- MappingProber
/// External collaborator that checks whether a mapping's PCM
/// device can actually be opened in a direction.
pub trait MappingProber {
	/// Try the mapping in `dir`; `true` means usable.
	fn probe_mapping(&mut self, mapping: &Mapping, dir: Direction) -> bool;
}

impl<F: FnMut(&Mapping, Direction) -> bool> MappingProber for F {
	fn probe_mapping(&mut self, mapping: &Mapping, dir: Direction) -> bool {
		self(mapping, dir)
	}
}

//---------------------------------------------------------------------------------------------------- ProfileSet
/// All mappings and profiles of one card.
#[derive(Clone,Debug,Default)]
pub struct ProfileSet {
	/// Mappings by name.
	pub mappings: BTreeMap<String, Mapping>,
	/// Profiles by name.
	pub profiles: BTreeMap<String, Profile>,
	/// Decibel fixes by element name.
	pub decibel_fixes: Vec<DecibelFix>,
	/// Has [`Self::probe`] run?
	pub probed: bool,
}

impl ProfileSet {
	/// Build from a parsed profile-set file.
	///
	/// Broken mappings/profiles are skipped; with `auto-profiles`
	/// the Cartesian mapping combinations are synthesized for
	/// whatever explicit profiles do not already cover.
	pub fn from_config(cfg: &ProfileSetConfig, bonus: Option<&ChannelMap>) -> Self {
		let mut this = Self {
			decibel_fixes: cfg.decibel_fixes.clone(),
			..Self::default()
		};

		for m in &cfg.mappings {
			match Mapping::verify(m, bonus) {
				Ok(m) => {
					this.mappings.insert(m.name.clone(), m);
				},
				Err(_) => warn2!("skipping broken mapping {}", m.name),
			}
		}

		for p in &cfg.profiles {
			match this.verify_profile(p) {
				Ok(p) => {
					this.profiles.insert(p.name.clone(), p);
				},
				Err(_) => warn2!("skipping broken profile {}", p.name),
			}
		}

		if cfg.auto_profiles {
			this.add_auto_profiles();
		}

		this
	}

	fn verify_profile(&self, cfg: &ProfileConfig) -> Result<Profile, Error> {
		let mut input_mappings = cfg.input_mappings.clone();
		let mut output_mappings = cfg.output_mappings.clone();
		input_mappings.dedup();
		output_mappings.dedup();

		for name in &input_mappings {
			match self.mappings.get(name) {
				Some(m) if m.direction.serves(Direction::Capture) => {},
				_ => {
					warn2!("profile '{}' refers to nonexistent input mapping '{name}'", cfg.name);
					return Err(Error::NoEntity);
				},
			}
		}

		for name in &output_mappings {
			match self.mappings.get(name) {
				Some(m) if m.direction.serves(Direction::Playback) => {},
				_ => {
					warn2!("profile '{}' refers to nonexistent output mapping '{name}'", cfg.name);
					return Err(Error::NoEntity);
				},
			}
		}

		let description = cfg
			.description
			.clone()
			.or_else(|| lookup_description(&cfg.name, PROFILE_DESCRIPTIONS))
			.unwrap_or_else(|| cfg.name.clone());

		Ok(Profile {
			name: cfg.name.clone(),
			description,
			input_mappings,
			output_mappings,
			priority: cfg.priority,
			skip_probe: cfg.skip_probe,
			supported: false,
		})
	}

	/// Synthesize `output:X`, `input:Y` and `output:X+input:Y`
	/// profiles for every mapping combination not already named
	/// by an explicit profile.
	fn add_auto_profiles(&mut self) {
		let inputs: Vec<String> = self
			.mappings
			.values()
			.filter(|m| m.direction.serves(Direction::Capture))
			.map(|m| m.name.clone())
			.collect();
		let outputs: Vec<String> = self
			.mappings
			.values()
			.filter(|m| m.direction.serves(Direction::Playback))
			.map(|m| m.name.clone())
			.collect();

		for i in &inputs {
			self.add_auto_pair(None, Some(i));
		}

		for o in &outputs {
			self.add_auto_pair(Some(o), None);
			for i in &inputs {
				self.add_auto_pair(Some(o), Some(i));
			}
		}
	}

	fn add_auto_pair(&mut self, output: Option<&String>, input: Option<&String>) {
		let name = match (output, input) {
			(Some(o), Some(i)) => format!("output:{o}+input:{i}"),
			(Some(o), None)    => format!("output:{o}"),
			(None, Some(i))    => format!("input:{i}"),
			(None, None)       => return,
		};

		if self.profiles.contains_key(&name) {
			return;
		}

		let mut priority = 0;
		if let Some(o) = output {
			priority += self.mappings[o].priority * 100;
		}
		if let Some(i) = input {
			priority += self.mappings[i].priority;
		}

		let description = lookup_description(&name, PROFILE_DESCRIPTIONS)
			.unwrap_or_else(|| name.clone());

		self.profiles.insert(name.clone(), Profile {
			name,
			description,
			input_mappings: input.into_iter().cloned().collect(),
			output_mappings: output.into_iter().cloned().collect(),
			priority,
			skip_probe: false,
			supported: false,
		});
	}

	/// Probe every profile: a profile is supported iff all its
	/// mappings open (`skip_probe` trusts without checking).
	/// Mapping probe results are cached across profiles.
	pub fn probe(&mut self, prober: &mut dyn MappingProber) {
		if self.probed {
			return;
		}
		self.probed = true;

		let mut cache: BTreeMap<(String, Direction), bool> = BTreeMap::new();

		let names: Vec<String> = self.profiles.keys().cloned().collect();
		for name in names {
			let p = &self.profiles[&name];

			let supported = p.skip_probe || {
				let mut ok = true;

				for (list, dir) in [
					(p.input_mappings.clone(), Direction::Capture),
					(p.output_mappings.clone(), Direction::Playback),
				] {
					for m in list {
						let key = (m.clone(), dir);
						let hit = *cache.entry(key).or_insert_with(|| {
							prober.probe_mapping(&self.mappings[&m], dir)
						});
						ok &= hit;
					}
				}

				ok
			};

			self.profiles.get_mut(&name).unwrap().supported = supported;

			if supported {
				let p = self.profiles[&name].clone();
				for m in p.input_mappings.iter().chain(&p.output_mappings) {
					self.mappings.get_mut(m).unwrap().supported += 1;
				}
			}
		}
	}

	/// Remove unsupported profiles and mappings no supported
	/// profile references.
	pub fn drop_unsupported(&mut self) {
		self.profiles.retain(|_, p| p.supported);
		self.mappings.retain(|_, m| m.supported > 0);
	}

	/// The supported profile with the highest priority.
	pub fn default_profile(&self) -> Option<&Profile> {
		self.profiles.values().filter(|p| p.supported).max_by_key(|p| p.priority)
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn mapping_cfg(name: &str, dir: MappingDirection, priority: u32) -> MappingConfig {
		MappingConfig {
			name: name.to_owned(),
			device_strings: vec!["hw:%f".into()],
			channel_map: ChannelMap::STEREO,
			paths_input: Vec::new(),
			paths_output: Vec::new(),
			element_input: None,
			element_output: None,
			direction: dir,
			description: None,
			priority,
		}
	}

	fn stereo_duplex_config() -> ProfileSetConfig {
		ProfileSetConfig {
			auto_profiles: true,
			mappings: vec![
				mapping_cfg("analog-stereo", MappingDirection::Any, 10),
				mapping_cfg("iec958-stereo", MappingDirection::Output, 5),
			],
			profiles: Vec::new(),
			decibel_fixes: Vec::new(),
		}
	}

	#[test]
	fn auto_profiles_cover_all_pairs() {
		let set = ProfileSet::from_config(&stereo_duplex_config(), None);

		let names: Vec<&str> = set.profiles.keys().map(String::as_str).collect();
		assert_eq!(names, vec![
			"input:analog-stereo",
			"output:analog-stereo",
			"output:analog-stereo+input:analog-stereo",
			"output:iec958-stereo",
			"output:iec958-stereo+input:analog-stereo",
		]);

		// Duplex auto profile combines the mapping priorities.
		assert_eq!(
			set.profiles["output:analog-stereo+input:analog-stereo"].priority,
			10 * 100 + 10,
		);
		assert_eq!(
			set.profiles["output:analog-stereo+input:analog-stereo"].description,
			"Analog Stereo Duplex",
		);
	}

	#[test]
	fn explicit_profile_shadows_auto_pair() {
		let mut cfg = stereo_duplex_config();
		cfg.profiles.push(ProfileConfig {
			name: "output:analog-stereo+input:analog-stereo".into(),
			input_mappings: vec!["analog-stereo".into()],
			output_mappings: vec!["analog-stereo".into()],
			skip_probe: true,
			description: Some("Handmade Duplex".into()),
			priority: 7,
		});

		let set = ProfileSet::from_config(&cfg, None);
		let p = &set.profiles["output:analog-stereo+input:analog-stereo"];
		assert_eq!(p.description, "Handmade Duplex");
		assert_eq!(p.priority, 7);
		assert!(p.skip_probe);
	}

	#[test]
	fn bonus_channel_map_boosts_priority() {
		let cfg = stereo_duplex_config();
		let set = ProfileSet::from_config(&cfg, Some(&ChannelMap::STEREO));
		assert_eq!(set.mappings["analog-stereo"].priority, 60);
	}

	#[test]
	fn probe_supports_and_drops() {
		let mut set = ProfileSet::from_config(&stereo_duplex_config(), None);

		// Only the analog output opens; every profile touching the
		// capture side or the digital output must go away.
		let mut prober = |m: &Mapping, dir: Direction| {
			m.name == "analog-stereo" && dir == Direction::Playback
		};
		set.probe(&mut prober);
		set.drop_unsupported();

		let names: Vec<&str> = set.profiles.keys().map(String::as_str).collect();
		assert_eq!(names, vec!["output:analog-stereo"]);
		assert_eq!(set.default_profile().unwrap().name, "output:analog-stereo");
		assert!(set.mappings.contains_key("analog-stereo"));
		assert!(!set.mappings.contains_key("iec958-stereo"));
	}

	#[test]
	fn mapping_with_paths_and_element_is_rejected() {
		let mut m = mapping_cfg("broken", MappingDirection::Any, 0);
		m.paths_output = vec!["analog-output".into()];
		m.element_output = Some("Master".into());

		assert!(Mapping::verify(&m, None).is_err());
	}
}
