//! Jack (plug detection) controls.

//---------------------------------------------------------------------------------------------------- use
use crate::device::port::Available;
use crate::error::Error;
use crate::macros::debug2;
use crate::mixer::backend::MixerBackend;
use crate::mixer::config::{JackConfig,Required};

//---------------------------------------------------------------------------------------------------- Jack
/// One plug-detect control bound to a path.
///
/// Jack events map the raw plugged/unplugged state onto the
/// availability reported by the port the path is bound to.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Jack {
	/// Configured name (section name, without the " Jack" suffix).
	pub name: String,
	/// The control name on the hardware side.
	pub alsa_name: String,
	/// Did the probe find the control?
	pub has_control: bool,
	/// Last observed raw state.
	pub plugged_in: bool,
	/// Availability reported while plugged.
	pub state_plugged: Available,
	/// Availability reported while unplugged.
	pub state_unplugged: Available,
	/// Presence requirement.
	pub required: Required,
	/// Required-any contribution.
	pub required_any: Required,
	/// Absence requirement.
	pub required_absent: Required,
}

impl Jack {
	/// Build from the configuration schema.
	pub fn from_config(cfg: &JackConfig) -> Self {
		Self {
			name: cfg.name.clone(),
			alsa_name: format!("{} Jack", cfg.name),
			has_control: false,
			plugged_in: false,
			state_plugged: cfg.state_plugged,
			state_unplugged: cfg.state_unplugged,
			required: cfg.required,
			required_any: cfg.required_any,
			required_absent: cfg.required_absent,
		}
	}

	/// Probe this jack. Returns its `required-any` contribution;
	/// errors fail the whole path.
	pub fn probe(&mut self, mixer: &dyn MixerBackend) -> Result<bool, Error> {
		self.has_control = mixer.has_jack(&self.alsa_name);

		if self.has_control {
			if self.required_absent != Required::Ignore {
				return Err(Error::NoEntity);
			}
			self.plugged_in = mixer.jack_plugged(&self.alsa_name)?;
		} else if self.required != Required::Ignore {
			return Err(Error::NoEntity);
		}

		debug2!("probe of jack {} ({})", self.alsa_name, if self.has_control { "found" } else { "not found" });

		Ok(self.required_any != Required::Ignore && self.has_control)
	}

	/// The availability the bound port should report right now.
	pub fn available(&self) -> Available {
		if !self.has_control {
			return Available::Unknown;
		}

		if self.plugged_in {
			self.state_plugged
		} else {
			self.state_unplugged
		}
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::mixer::dummy::DummyMixer;
	use pretty_assertions::assert_eq;

	fn config(name: &str) -> JackConfig {
		JackConfig {
			name: name.to_owned(),
			state_plugged: Available::Yes,
			state_unplugged: Available::No,
			required: Required::Ignore,
			required_any: Required::Ignore,
			required_absent: Required::Ignore,
		}
	}

	#[test]
	fn plugged_state_maps_to_availability() {
		let mixer = DummyMixer::new().with_jack("Headphone Jack", true);
		let mut j = Jack::from_config(&config("Headphone"));

		j.probe(&mixer).unwrap();
		assert!(j.has_control);
		assert_eq!(j.available(), Available::Yes);

		j.plugged_in = false;
		assert_eq!(j.available(), Available::No);
	}

	#[test]
	fn missing_jack_is_unknown() {
		let mixer = DummyMixer::new();
		let mut j = Jack::from_config(&config("Headphone"));

		j.probe(&mixer).unwrap();
		assert!(!j.has_control);
		assert_eq!(j.available(), Available::Unknown);
	}

	#[test]
	fn required_jack_missing_fails() {
		let mixer = DummyMixer::new();
		let mut j = Jack::from_config(&config("Headphone"));
		j.required = Required::Any;

		assert_eq!(j.probe(&mixer), Err(Error::NoEntity));
	}
}
