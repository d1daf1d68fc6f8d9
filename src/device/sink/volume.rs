//! Volume propagation across a sink and its sharing tree.
//!
//! The exact mirror of the source-side algebra, over sink inputs.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::{ChannelMap,ChannelVolumes,Volume};
use crate::core::{Core,EventKind,Facility};
use crate::device::msg::SinkMsg;
use crate::error::Error;
use crate::macros::{assert_ctl_context,warn2};

//---------------------------------------------------------------------------------------------------- Core: volume algebra
impl Core {
	/// `i.reference_ratio := i.volume / i.sink.reference_volume`.
	pub(crate) fn sink_compute_reference_ratio(&mut self, input: u32) {
		let Some((sink, volume)) = self
			.sink_inputs
			.get(&input)
			.and_then(|i| Some((i.sink?, i.volume)))
		else { return };

		let (reference, sink_map) = {
			let s = &self.sinks[&sink];
			(s.reference_volume, s.map)
		};

		let i = self.sink_inputs.get_mut(&input).unwrap();
		let remapped = reference.remap(&sink_map, &i.map);

		i.reference_ratio.channels = i.spec.channels;

		for c in 0..i.spec.channels as usize {
			if remapped.values[c] <= Volume::MUTED {
				continue;
			}

			if i.reference_ratio.values[c].multiply(remapped.values[c]) == volume.values[c] {
				continue;
			}

			i.reference_ratio.values[c] = volume.values[c].divide(remapped.values[c]);
		}
	}

	/// Reference ratios for every stream in the sharing subtree.
	pub(crate) fn sink_compute_reference_ratios(&mut self, sink: u32) {
		let inputs: Vec<u32> = match self.sinks.get(&sink) {
			Some(s) => s.inputs.iter().copied().collect(),
			None => return,
		};

		for input in inputs {
			self.sink_compute_reference_ratio(input);

			if let Some(dest) = self.sink_sharing_destination(input) {
				self.sink_compute_reference_ratios(dest);
			}
		}
	}

	fn sink_compute_real_ratios(&mut self, sink: u32) {
		let (real, sink_map, inputs) = match self.sinks.get(&sink) {
			Some(s) => (s.real_volume, s.map, s.inputs.iter().copied().collect::<Vec<u32>>()),
			None => return,
		};

		for input in inputs {
			if let Some(dest) = self.sink_sharing_destination(input) {
				let i = self.sink_inputs.get_mut(&input).unwrap();
				i.real_ratio = ChannelVolumes::norm(i.real_ratio.channels);
				i.soft_volume = i.volume_factor;

				self.sink_compute_real_ratios(dest);
				continue;
			}

			let Some(i) = self.sink_inputs.get_mut(&input) else { continue };
			let remapped = real.remap(&sink_map, &i.map);

			i.real_ratio.channels = i.spec.channels;
			i.soft_volume.channels = i.spec.channels;

			for c in 0..i.spec.channels as usize {
				if remapped.values[c] <= Volume::MUTED {
					i.soft_volume.values[c] = Volume::MUTED;
					continue;
				}

				if i.real_ratio.values[c].multiply(remapped.values[c]) != i.volume.values[c] {
					i.real_ratio.values[c] = i.volume.values[c].divide(remapped.values[c]);
				}

				i.soft_volume.values[c] =
					i.real_ratio.values[c].multiply(i.volume_factor.values[c]);
			}
		}
	}

	/// The sharing filter sink this input feeds, if any.
	pub(crate) fn sink_sharing_destination(&self, input: u32) -> Option<u32> {
		let dest = self.sink_inputs.get(&input)?.origin_sink?;
		let s = self.sinks.get(&dest)?;
		s.flags.share_volume_with_master.then_some(dest)
	}

	fn sink_get_maximum_input_volume(&self, sink: u32, max_volume: &mut ChannelVolumes, map: &ChannelMap) {
		let Some(s) = self.sinks.get(&sink) else { return };

		for input in &s.inputs {
			if let Some(dest) = self.sink_sharing_destination(*input) {
				self.sink_get_maximum_input_volume(dest, max_volume, map);
				continue;
			}

			let Some(i) = self.sink_inputs.get(input) else { continue };
			let remapped = i.volume.remap_minimum_impact(max_volume, &i.map, map);
			*max_volume = max_volume.merge(&remapped);
		}
	}

	fn sink_has_inputs(&self, sink: u32) -> bool {
		let Some(s) = self.sinks.get(&sink) else { return false };

		s.inputs.iter().any(|input| {
			match self.sink_sharing_destination(*input) {
				Some(dest) => self.sink_has_inputs(dest),
				None => true,
			}
		})
	}

	fn update_sink_real_volume(&mut self, sink: u32, new_volume: &ChannelVolumes, map: &ChannelMap) {
		let inputs: Vec<u32> = {
			let Some(s) = self.sinks.get_mut(&sink) else { return };
			s.real_volume = new_volume.remap(map, &s.map);
			s.inputs.iter().copied().collect()
		};

		let flat = self.sink_flat_volume_enabled(sink);

		for input in inputs {
			let Some(dest) = self.sink_sharing_destination(input) else { continue };

			if flat {
				let i = self.sink_inputs.get_mut(&input).unwrap();
				let old_volume = i.volume;
				i.volume = new_volume.remap(map, &i.map);
				let changed = i.volume != old_volume;
				let volume = i.volume;

				self.sink_compute_reference_ratio(input);

				if changed {
					let i = self.sink_inputs.get_mut(&input).unwrap();
					i.driver.volume_changed(&volume);
					self.subscription_post(Facility::SinkInput, EventKind::Change, input);
				}
			}

			self.update_sink_real_volume(dest, new_volume, map);
		}
	}

	fn sink_compute_real_volume(&mut self, root: u32) {
		debug_assert!(!self.sinks[&root].shares_volume());

		let (reference, map) = {
			let s = &self.sinks[&root];
			(s.reference_volume, s.map)
		};

		if !self.sink_has_inputs(root) {
			self.update_sink_real_volume(root, &reference, &map);
			return;
		}

		let mut max_volume = ChannelVolumes::muted(map.channels);
		self.sink_get_maximum_input_volume(root, &mut max_volume, &map);
		self.update_sink_real_volume(root, &max_volume, &map);
		self.sink_compute_real_ratios(root);
	}

	fn sink_propagate_reference_volume(&mut self, sink: u32) {
		let (reference, sink_map, inputs) = match self.sinks.get(&sink) {
			Some(s) => (s.reference_volume, s.map, s.inputs.iter().copied().collect::<Vec<u32>>()),
			None => return,
		};

		for input in inputs {
			if let Some(dest) = self.sink_sharing_destination(input) {
				self.sink_propagate_reference_volume(dest);
				continue;
			}

			let Some(i) = self.sink_inputs.get_mut(&input) else { continue };
			let old_volume = i.volume;

			i.volume = reference.remap(&sink_map, &i.map).multiply(&i.reference_ratio);

			if i.volume != old_volume {
				let volume = i.volume;
				i.driver.volume_changed(&volume);
				self.subscription_post(Facility::SinkInput, EventKind::Change, input);
			}
		}
	}

	fn update_sink_reference_volume(
		&mut self,
		sink: u32,
		v: &ChannelVolumes,
		map: &ChannelMap,
		save: bool,
	) -> bool {
		let (changed, shares, inputs) = {
			let Some(s) = self.sinks.get_mut(&sink) else { return false };
			let volume = v.remap(map, &s.map);

			let changed = volume != s.reference_volume;
			s.reference_volume = volume;
			s.save_volume = (!changed && s.save_volume) || save;

			(changed, s.flags.share_volume_with_master, s.inputs.iter().copied().collect::<Vec<u32>>())
		};

		if changed {
			self.subscription_post(Facility::Sink, EventKind::Change, sink);
		} else if !shares {
			return false;
		}

		for input in inputs {
			if let Some(dest) = self.sink_sharing_destination(input) {
				self.update_sink_reference_volume(dest, v, map, false);
			}
		}

		true
	}

	//---------------------------------------------------------------------------------------------------- Public volume ops
	/// Set the device volume; `None` re-synchronizes from the
	/// streams (flat mode only).
	pub fn sink_set_volume(
		&mut self,
		index: u32,
		volume: Option<&ChannelVolumes>,
		send_msg: bool,
		save: bool,
	) {
		assert_ctl_context!();

		let Some(s) = self.sinks.get(&index) else { return };
		debug_assert!(s.state.is_linked());
		debug_assert!(volume.is_some() || self.sink_flat_volume_enabled(index));

		if self.sink_is_passthrough(index) && !volume.map(ChannelVolumes::is_norm).unwrap_or(false) {
			warn2!("cannot change volume, sink {index} is in passthrough mode");
			return;
		}

		let Some(root) = self.sink_shared_root(index) else { return };
		let flat = self.sink_flat_volume_enabled(root);

		match volume {
			Some(v) => {
				let (spec, reference, s_map) = {
					let s = &self.sinks[&index];
					(s.spec, s.reference_volume, s.map)
				};
				let root_map = self.sinks[&root].map;

				let new_reference = if v.compatible_with(&spec) {
					*v
				} else {
					let mut scaled = reference;
					scaled.scale(v.max());
					scaled
				};
				let new_reference = new_reference.remap(&s_map, &root_map);

				if self.update_sink_reference_volume(root, &new_reference, &root_map, save) {
					if flat {
						self.sink_propagate_reference_volume(root);
						self.sink_compute_real_volume(root);
					} else {
						let (reference, map) = {
							let r = &self.sinks[&root];
							(r.reference_volume, r.map)
						};
						self.update_sink_real_volume(root, &reference, &map);
					}
				}
			},

			None => {
				debug_assert!(flat);

				self.sink_compute_real_volume(root);

				let (s_reference, s_map) = {
					let s = &self.sinks[&index];
					(s.reference_volume, s.map)
				};
				let (root_real, root_map) = {
					let r = &self.sinks[&root];
					(r.real_volume, r.map)
				};

				let new_reference = if index != root && !s_map.equal(&root_map) {
					s_reference.remap(&s_map, &root_map).merge(&root_real)
				} else {
					s_reference.merge(&root_real)
				};

				self.update_sink_reference_volume(root, &new_reference, &root_map, save);
				self.sink_compute_reference_ratios(root);
			},
		}

		{
			let r = self.sinks.get_mut(&root).unwrap();
			if r.flags.hw_volume_ctrl {
				r.soft_volume = ChannelVolumes::norm(r.spec.channels);
				if !r.flags.deferred_volume {
					let real = r.real_volume;
					let mut soft = r.soft_volume;
					if let Err(e) = r.driver.set_volume(&real, &mut soft) {
						warn2!("sink {root}: driver set_volume failed: {e}");
					}
					r.soft_volume = soft;
				}
			} else {
				r.soft_volume = r.real_volume;
			}
		}

		if send_msg {
			self.sink_sync_shared_volume(root);
		}
	}

	/// Push the post-algebra volumes of the sharing subtree to
	/// the IO threads.
	pub(crate) fn sink_sync_shared_volume(&mut self, sink: u32) {
		let Some(s) = self.sinks.get(&sink) else { return };

		let Some(q) = s.msgq.clone() else { return };
		let soft = s.soft_volume;
		let real = s.real_volume;
		let inputs: Vec<(u32, ChannelVolumes)> = s
			.inputs
			.iter()
			.filter_map(|i| self.sink_inputs.get(i).map(|i| (i.index, i.soft_volume)))
			.collect();
		let children: Vec<u32> = s
			.inputs
			.iter()
			.filter_map(|i| self.sink_sharing_destination(*i))
			.collect();

		q.send(SinkMsg::SetSharedVolume { soft, real, inputs });

		for child in children {
			self.sink_sync_shared_volume(child);
		}
	}

	/// Implementors without a hardware volume route their
	/// residual gain through here.
	pub fn sink_set_soft_volume(&mut self, index: u32, volume: Option<&ChannelVolumes>) {
		assert_ctl_context!();

		let Some(s) = self.sinks.get_mut(&index) else { return };
		debug_assert!(!s.flags.share_volume_with_master);

		s.soft_volume = match volume {
			Some(v) => *v,
			None => ChannelVolumes::norm(s.spec.channels),
		};

		if s.state.is_linked() && !s.flags.deferred_volume {
			let soft = s.soft_volume;
			if let Some(q) = &s.msgq {
				q.send(SinkMsg::SetSoftVolume(soft));
			}
		}
	}

	/// Read the reference volume, optionally refreshing the real
	/// volume from the hardware first.
	pub fn sink_get_volume(&mut self, index: u32, force_refresh: bool) -> Result<ChannelVolumes, Error> {
		assert_ctl_context!();

		{
			let s = self.sinks.get(&index).ok_or(Error::NoEntity)?;
			if !s.state.is_linked() {
				return Err(Error::BadState);
			}
		}

		if force_refresh {
			debug_assert!(!self.sinks[&index].shares_volume());

			let old_real = self.sinks[&index].real_volume;

			{
				let s = self.sinks.get_mut(&index).unwrap();
				if !s.flags.deferred_volume && s.flags.hw_volume_ctrl {
					let mut real = s.real_volume;
					if s.driver.get_volume(&mut real).is_ok() {
						s.real_volume = real;
					}
				}
			}

			let (real, map) = {
				let s = &self.sinks[&index];
				(s.real_volume, s.map)
			};
			self.update_sink_real_volume(index, &real, &map);
			self.sink_propagate_real_volume(index, &old_real);
		}

		Ok(self.sinks[&index].reference_volume)
	}

	/// Hardware told us its volume changed.
	pub(crate) fn sink_volume_changed(&mut self, index: u32, new_real: &ChannelVolumes) {
		assert_ctl_context!();

		let Some(s) = self.sinks.get(&index) else { return };
		if !s.state.is_linked() || s.shares_volume() {
			return;
		}

		let old_real = s.real_volume;
		let map = s.map;
		self.update_sink_real_volume(index, new_real, &map);
		self.sink_propagate_real_volume(index, &old_real);
	}

	fn sink_propagate_real_volume(&mut self, sink: u32, old_real: &ChannelVolumes) {
		let (shares, real, map) = {
			let Some(s) = self.sinks.get(&sink) else { return };
			(s.shares_volume(), s.real_volume, s.map)
		};

		if !shares {
			if *old_real == real {
				return;
			}
			self.update_sink_reference_volume(sink, &real, &map, true);
		}

		if self.sink_flat_volume_enabled(sink) {
			let (reference, sink_map, inputs) = {
				let s = &self.sinks[&sink];
				(s.reference_volume, s.map, s.inputs.iter().copied().collect::<Vec<u32>>())
			};

			for input in inputs {
				{
					let Some(i) = self.sink_inputs.get_mut(&input) else { continue };
					let old_volume = i.volume;

					i.reference_ratio = i.real_ratio;
					i.volume = reference.remap(&sink_map, &i.map).multiply(&i.reference_ratio);

					if i.volume != old_volume {
						let volume = i.volume;
						i.driver.volume_changed(&volume);
						self.subscription_post(Facility::SinkInput, EventKind::Change, input);
					}
				}

				if let Some(dest) = self.sink_sharing_destination(input) {
					self.sink_propagate_real_volume(dest, old_real);
				}
			}
		}

		if !shares {
			self.sinks.get_mut(&sink).unwrap().save_volume = true;
		}
	}

	//---------------------------------------------------------------------------------------------------- Mute
	/// Set the device mute.
	pub fn sink_set_mute(&mut self, index: u32, mute: bool, save: bool) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sinks.get_mut(&index).ok_or(Error::NoEntity)?;
		if !s.state.is_linked() {
			return Err(Error::BadState);
		}

		let old_muted = s.muted;
		s.muted = mute;
		s.save_muted = (old_muted == mute && s.save_muted) || save;

		if !s.flags.deferred_volume && s.flags.hw_mute_ctrl {
			if let Err(e) = s.driver.set_mute(mute) {
				warn2!("sink {index}: driver set_mute failed: {e}");
			}
		}

		if let Some(q) = &s.msgq {
			q.send(SinkMsg::SetMute(mute));
		}

		if old_muted != mute {
			self.subscription_post(Facility::Sink, EventKind::Change, index);
		}
		Ok(())
	}

	/// Read the mute state, optionally refreshing from hardware.
	pub fn sink_get_mute(&mut self, index: u32, force_refresh: bool) -> Result<bool, Error> {
		assert_ctl_context!();

		{
			let s = self.sinks.get(&index).ok_or(Error::NoEntity)?;
			if !s.state.is_linked() {
				return Err(Error::BadState);
			}
		}

		if force_refresh {
			let s = self.sinks.get_mut(&index).unwrap();
			let old_muted = s.muted;

			if !s.flags.deferred_volume && s.flags.hw_mute_ctrl {
				if let Ok(muted) = s.driver.get_mute() {
					s.muted = muted;
				}
			}

			if old_muted != s.muted {
				s.save_muted = true;
				let muted = s.muted;

				if let Some(q) = &s.msgq {
					q.send(SinkMsg::SetMute(muted));
				}
				self.subscription_post(Facility::Sink, EventKind::Change, index);
			}
		}

		Ok(self.sinks[&index].muted)
	}

	/// Hardware told us its mute changed.
	pub(crate) fn sink_mute_changed(&mut self, index: u32, new_muted: bool) {
		assert_ctl_context!();

		let Some(s) = self.sinks.get_mut(&index) else { return };
		if !s.state.is_linked() || s.muted == new_muted {
			return;
		}

		s.muted = new_muted;
		s.save_muted = true;
		self.subscription_post(Facility::Sink, EventKind::Change, index);
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::{flat_sink,input_with_volume,TestCore};
	use pretty_assertions::assert_eq;

	fn v2(l: f64, r: f64) -> ChannelVolumes {
		let mut v = ChannelVolumes::norm(2);
		v.values[0] = Volume((l * f64::from(Volume::NORM.0)) as u32);
		v.values[1] = Volume((r * f64::from(Volume::NORM.0)) as u32);
		v
	}

	#[test]
	fn flat_volume_tracks_loudest_input() {
		let mut t = TestCore::new();
		let s = flat_sink(&mut t, "s");

		let x = input_with_volume(&mut t, s, v2(0.5, 0.5));
		let y = input_with_volume(&mut t, s, v2(0.2, 1.0));

		let sink = t.core.sink(s).unwrap();
		assert_eq!(sink.real_volume, v2(0.5, 1.0));

		let x = t.core.sink_input(x).unwrap();
		let y = t.core.sink_input(y).unwrap();
		assert_eq!(x.real_ratio, v2(1.0, 0.5));
		assert_eq!(y.real_ratio, v2(0.4, 1.0));
	}

	#[test]
	fn device_volume_round_trips() {
		let mut t = TestCore::new();
		let s = flat_sink(&mut t, "s");
		let _x = input_with_volume(&mut t, s, v2(0.5, 0.5));

		let target = v2(0.7, 0.35);
		t.core.sink_set_volume(s, Some(&target), true, false);
		assert_eq!(t.core.sink_get_volume(s, false).unwrap(), target);
	}

	#[test]
	fn mute_round_trip() {
		let mut t = TestCore::new();
		let s = flat_sink(&mut t, "s");

		t.core.sink_set_mute(s, true, false).unwrap();
		assert!(t.core.sink_get_mute(s, false).unwrap());
	}
}
