//! Path sets: all paths applicable to one device direction.

//---------------------------------------------------------------------------------------------------- use
use crate::device::port::{Available,DevicePort};
use crate::error::Error;
use crate::macros::{debug2,trace2};
use crate::mixer::backend::MixerBackend;
use crate::mixer::config::PathConfig;
use crate::mixer::db_fix::DecibelFix;
use crate::mixer::path::Path;
use crate::mixer::Direction;

//---------------------------------------------------------------------------------------------------- PathSet
/// The probed, deduplicated and condensed set of paths for one
/// device direction, ready to be resolved into ports.
#[derive(Clone,Debug,Default)]
pub struct PathSet {
	/// The surviving paths.
	pub paths: Vec<Path>,
}

impl PathSet {
	/// Build from parsed path configurations. Paths whose static
	/// verification fails are skipped, not fatal.
	pub fn from_configs(
		configs: &[PathConfig],
		db_fixes: &[DecibelFix],
		direction: Direction,
	) -> Self {
		let mut paths = Vec::new();

		for cfg in configs {
			if cfg.direction != direction {
				continue;
			}
			// A path name may appear only once.
			if paths.iter().any(|p: &Path| p.name == cfg.name) {
				continue;
			}

			match Path::from_config(cfg, db_fixes) {
				Ok(p) => paths.push(p),
				Err(_) => debug2!("path '{}' failed verification, skipping", cfg.name),
			}
		}

		Self { paths }
	}

	/// A set holding one synthesized single-element path.
	pub fn synthesize(element: &str, direction: Direction) -> Self {
		Self { paths: vec![Path::synthesize(element, direction)] }
	}

	/// Probe every path, drop the unsupported ones, condense
	/// subsets, and make descriptions unique.
	pub fn probe(&mut self, mixer: &mut dyn MixerBackend, ignore_db: bool) -> Result<(), Error> {
		self.paths.retain_mut(|p| p.probe(mixer, ignore_db).is_ok());

		self.condense(mixer);
		self.make_descriptions_unique();

		if self.paths.is_empty() {
			return Err(Error::NoEntity);
		}

		Ok(())
	}

	/// Remove every path that is a subset of another path in the
	/// set: it would expose no control the other does not.
	pub fn condense(&mut self, mixer: &dyn MixerBackend) {
		if self.paths.len() < 2 {
			return;
		}

		let mut drop = vec![false; self.paths.len()];

		for a in 0..self.paths.len() {
			if drop[a] {
				continue;
			}

			for b in 0..self.paths.len() {
				if a == b || drop[b] {
					continue;
				}

				if self.paths[a].is_subset_of(&self.paths[b], mixer) {
					debug2!(
						"removing path '{}' as it is a subset of '{}'",
						self.paths[a].name, self.paths[b].name,
					);
					drop[a] = true;
					break;
				}
			}
		}

		let mut keep = drop.iter().map(|d| !d);
		self.paths.retain(|_| keep.next().unwrap());
	}

	/// Append ` N` to duplicated path descriptions.
	fn make_descriptions_unique(&mut self) {
		for i in 0..self.paths.len() {
			let desc = self.paths[i].description.clone();

			let mut n = 2_u32;
			let mut any = false;
			for j in (i + 1)..self.paths.len() {
				if self.paths[j].description == desc {
					self.paths[j].description = format!("{desc} {n}");
					n += 1;
					any = true;
				}
			}

			if any {
				trace2!("duplicated path description '{desc}'");
			}
		}
	}

	/// Resolve the set into device ports.
	///
	/// A path with zero or one setting becomes a single port; a
	/// path with several settings becomes one port per setting,
	/// named `<path>;<setting>`.
	pub fn ports(&self) -> Vec<DevicePort> {
		let mut out = Vec::new();

		for p in &self.paths {
			let available = p
				.jacks
				.iter()
				.filter(|j| j.has_control)
				.map(|j| j.available())
				.fold(Available::Unknown, std::cmp::max);

			if p.settings.len() <= 1 {
				out.push(DevicePort {
					name: p.name.clone(),
					description: p.description.clone(),
					direction: p.direction,
					priority: p.priority * 100,
					available,
					latency_offset: 0,
					path_name: p.name.clone(),
					setting_name: p.settings.first().map(|s| s.name.clone()),
				});
			} else {
				for s in &p.settings {
					out.push(DevicePort {
						name: format!("{};{}", p.name, s.name),
						description: if s.description.is_empty() {
							p.description.clone()
						} else {
							format!("{} / {}", p.description, s.description)
						},
						direction: p.direction,
						priority: p.priority * 100 + s.priority,
						available,
						latency_offset: 0,
						path_name: p.name.clone(),
						setting_name: Some(s.name.clone()),
					});
				}
			}
		}

		out
	}

	/// Look up a path by name.
	pub fn find(&self, name: &str) -> Option<&Path> {
		self.paths.iter().find(|p| p.name == name)
	}

	/// Look up a path by name, mutably.
	pub fn find_mut(&mut self, name: &str) -> Option<&mut Path> {
		self.paths.iter_mut().find(|p| p.name == name)
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::mixer::config::{ElementConfig,EnumConfig,OptionConfig,Required,VolumeConfig};
	use crate::mixer::dummy::{DummyElement,DummyMixer};
	use pretty_assertions::assert_eq;

	fn merge_cfg(path: &str, element: &str, limit: Option<i64>) -> PathConfig {
		let mut cfg = PathConfig::new(path, Direction::Playback);
		let mut e = ElementConfig::new(element);
		e.volume = VolumeConfig::Merge;
		e.volume_limit = limit;
		cfg.elements.push(e);
		cfg
	}

	#[test]
	fn limited_path_with_extra_off_element_is_condensed_away() {
		// Path P: E1 merged over its full range, E2 merged.
		// Path Q: the same E1 with a volume-limit, E2 forced off.
		// The lower limit still fits inside P's range and `off` is a
		// subset of `merge`, so Q is a subset of P and must be dropped.
		let mut mixer = DummyMixer::new()
			.with_element("E1", DummyElement::stereo_volume(Direction::Playback, 0, 64, -6_400, 0))
			.with_element("E2", DummyElement::stereo_volume(Direction::Playback, 0, 32, -3_200, 0));

		let mut p = merge_cfg("p", "E1", None);
		let mut e2_p = ElementConfig::new("E2");
		e2_p.volume = VolumeConfig::Merge;
		p.elements.push(e2_p);

		let mut q = merge_cfg("q", "E1", Some(32));
		let mut e2_q = ElementConfig::new("E2");
		e2_q.volume = VolumeConfig::Off;
		q.elements.push(e2_q);

		let mut set = PathSet::from_configs(&[p, q], &[], Direction::Playback);
		set.probe(&mut mixer, false).unwrap();

		let names: Vec<&str> = set.paths.iter().map(|p| p.name.as_str()).collect();
		assert_eq!(names, vec!["p"]);
	}

	#[test]
	fn no_path_is_a_strict_subset_after_condensation() {
		let mut mixer = DummyMixer::new()
			.with_element("E1", DummyElement::stereo_volume(Direction::Playback, 0, 64, -6_400, 0))
			.with_element("E2", DummyElement::switch(Direction::Playback, true));

		let a = merge_cfg("a", "E1", None);
		let b = merge_cfg("b", "E1", Some(48));
		let c = merge_cfg("c", "E1", Some(32));

		let mut set = PathSet::from_configs(&[a, b, c], &[], Direction::Playback);
		set.probe(&mut mixer, false).unwrap();

		for i in 0..set.paths.len() {
			for j in 0..set.paths.len() {
				if i != j {
					assert!(
						!set.paths[i].is_subset_of(&set.paths[j], &mixer),
						"{} is still a subset of {}",
						set.paths[i].name, set.paths[j].name,
					);
				}
			}
		}
	}

	#[test]
	fn ports_for_multi_setting_paths_carry_setting_suffix() {
		let mut mixer = DummyMixer::new()
			.with_element("Input Source", DummyElement::enumeration(&["Mic", "Line"]));

		let mut cfg = PathConfig::new("analog-input", Direction::Capture);
		cfg.general.priority = 9;
		let mut e = ElementConfig::new("Input Source");
		e.enumeration = EnumConfig::Select;
		cfg.elements.push(e);
		cfg.options.push(OptionConfig {
			element: "Input Source".into(), alsa_name: "Mic".into(),
			name: Some("input-microphone".into()), priority: 20,
			required: Required::Ignore, required_any: Required::Ignore,
			required_absent: Required::Ignore,
		});
		cfg.options.push(OptionConfig {
			element: "Input Source".into(), alsa_name: "Line".into(),
			name: Some("input-linein".into()), priority: 10,
			required: Required::Ignore, required_any: Required::Ignore,
			required_absent: Required::Ignore,
		});

		let mut set = PathSet::from_configs(&[cfg], &[], Direction::Capture);
		set.probe(&mut mixer, false).unwrap();

		let ports = set.ports();
		let names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
		assert_eq!(names, vec!["analog-input;input-microphone", "analog-input;input-linein"]);
		assert_eq!(ports[0].description, "Analog Input / Microphone");
		assert_eq!(ports[0].priority, 9 * 100 + 20);
	}

	#[test]
	fn duplicate_descriptions_get_numbered() {
		let mut mixer = DummyMixer::new()
			.with_element("E1", DummyElement::stereo_volume(Direction::Playback, 0, 64, -6_400, 0))
			.with_element("E2", DummyElement::stereo_volume(Direction::Playback, 0, 64, -6_400, 0));

		let mut a = merge_cfg("first", "E1", None);
		a.general.description = Some("Line Out".into());
		let mut b = merge_cfg("second", "E2", None);
		b.general.description = Some("Line Out".into());

		let mut set = PathSet::from_configs(&[a, b], &[], Direction::Playback);
		set.probe(&mut mixer, false).unwrap();

		let descs: Vec<&str> = set.paths.iter().map(|p| p.description.as_str()).collect();
		assert_eq!(descs, vec!["Line Out", "Line Out 2"]);
	}
}
