//! Volume propagation across a source and its sharing tree.
//!
//! All of this runs in control context at the sharing *root*;
//! internal recursion handles the filter devices hanging below
//! it. The invariants maintained here, flat mode:
//!
//! - `root.real_volume = max over streams (volume remapped)`
//! - `stream.reference_ratio = stream.volume / root.reference_volume`
//! - `stream.real_ratio = stream.volume / root.real_volume`
//! - `stream.soft_volume = real_ratio * volume_factor`
//! - sharing children mirror the root's volumes; their streams
//!   keep `real_ratio` at 0 dB and `soft_volume = volume_factor`.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::{ChannelMap,ChannelVolumes,Volume};
use crate::core::{Core,EventKind,Facility};
use crate::device::msg::SourceMsg;
use crate::error::Error;
use crate::macros::{assert_ctl_context,warn2};

//---------------------------------------------------------------------------------------------------- Core: volume algebra
impl Core {
	/// `o.reference_ratio := o.volume / o.source.reference_volume`,
	/// channel-wise, skipping channels where the source is muted
	/// and avoiding needless precision loss.
	pub(crate) fn compute_reference_ratio(&mut self, output: u32) {
		let Some((source, volume)) = self
			.source_outputs
			.get(&output)
			.and_then(|o| Some((o.source?, o.volume)))
		else { return };

		let (reference, source_map) = {
			let s = &self.sources[&source];
			(s.reference_volume, s.map)
		};

		let o = self.source_outputs.get_mut(&output).unwrap();
		let remapped = reference.remap(&source_map, &o.map);

		o.reference_ratio.channels = o.spec.channels;

		for c in 0..o.spec.channels as usize {
			// We do not update when the source volume is zero anyway.
			if remapped.values[c] <= Volume::MUTED {
				continue;
			}

			// Only recompute when the ratio actually drifted.
			if o.reference_ratio.values[c].multiply(remapped.values[c]) == volume.values[c] {
				continue;
			}

			o.reference_ratio.values[c] = volume.values[c].divide(remapped.values[c]);
		}
	}

	/// Reference ratios for every stream in the sharing subtree.
	pub(crate) fn compute_reference_ratios(&mut self, source: u32) {
		let outputs: Vec<u32> = match self.sources.get(&source) {
			Some(s) => s.outputs.iter().copied().collect(),
			None => return,
		};

		for output in outputs {
			self.compute_reference_ratio(output);

			if let Some(dest) = self.sharing_destination(output) {
				self.compute_reference_ratios(dest);
			}
		}
	}

	/// Real ratios and soft volumes for every stream in the
	/// sharing subtree.
	fn compute_real_ratios(&mut self, source: u32) {
		let (real, source_map, outputs) = match self.sources.get(&source) {
			Some(s) => (s.real_volume, s.map, s.outputs.iter().copied().collect::<Vec<u32>>()),
			None => return,
		};

		for output in outputs {
			if let Some(dest) = self.sharing_destination(output) {
				// The origin device shares its volume: this stream's
				// real ratio is pinned at 0 dB, its soft volume is
				// exactly the volume factor.
				let o = self.source_outputs.get_mut(&output).unwrap();
				o.real_ratio = ChannelVolumes::norm(o.real_ratio.channels);
				o.soft_volume = o.volume_factor;

				self.compute_real_ratios(dest);
				continue;
			}

			let Some(o) = self.source_outputs.get_mut(&output) else { continue };
			let remapped = real.remap(&source_map, &o.map);

			o.real_ratio.channels = o.spec.channels;
			o.soft_volume.channels = o.spec.channels;

			for c in 0..o.spec.channels as usize {
				if remapped.values[c] <= Volume::MUTED {
					// The real ratio is left untouched on muted
					// channels; only the audible path goes silent.
					o.soft_volume.values[c] = Volume::MUTED;
					continue;
				}

				if o.real_ratio.values[c].multiply(remapped.values[c]) != o.volume.values[c] {
					o.real_ratio.values[c] = o.volume.values[c].divide(remapped.values[c]);
				}

				o.soft_volume.values[c] =
					o.real_ratio.values[c].multiply(o.volume_factor.values[c]);
			}
		}
	}

	/// The sharing filter device this output feeds, if its origin
	/// participates in volume sharing.
	fn sharing_destination(&self, output: u32) -> Option<u32> {
		let dest = self.source_outputs.get(&output)?.destination_source?;
		let s = self.sources.get(&dest)?;
		s.flags.share_volume_with_master.then_some(dest)
	}

	/// Fold every stream's volume (minimum-impact remapped onto
	/// `map`) into `max_volume`.
	fn get_maximum_output_volume(&self, source: u32, max_volume: &mut ChannelVolumes, map: &ChannelMap) {
		let Some(s) = self.sources.get(&source) else { return };

		for output in &s.outputs {
			if let Some(dest) = self.sharing_destination(*output) {
				// This stream feeds a sharing device; its volume
				// will be forced to the root's real volume, so it
				// must not feed back into the maximum.
				self.get_maximum_output_volume(dest, max_volume, map);
				continue;
			}

			let Some(o) = self.source_outputs.get(output) else { continue };
			let remapped = o.volume.remap_minimum_impact(max_volume, &o.map, map);
			*max_volume = max_volume.merge(&remapped);
		}
	}

	/// Does the subtree hold any stream that counts for flat
	/// volume?
	fn source_has_outputs(&self, source: u32) -> bool {
		let Some(s) = self.sources.get(&source) else { return false };

		s.outputs.iter().any(|output| {
			match self.sharing_destination(*output) {
				Some(dest) => self.source_has_outputs(dest),
				None => true,
			}
		})
	}

	/// Install `new_volume` (over `map`) as the real volume of
	/// the whole subtree; sharing children follow the root.
	fn update_source_real_volume(&mut self, source: u32, new_volume: &ChannelVolumes, map: &ChannelMap) {
		let outputs: Vec<u32> = {
			let Some(s) = self.sources.get_mut(&source) else { return };
			s.real_volume = new_volume.remap(map, &s.map);
			s.outputs.iter().copied().collect()
		};

		let flat = self.source_flat_volume_enabled(source);

		for output in outputs {
			let Some(dest) = self.sharing_destination(output) else { continue };

			if flat {
				let o = self.source_outputs.get_mut(&output).unwrap();
				let old_volume = o.volume;
				o.volume = new_volume.remap(map, &o.map);
				let changed = o.volume != old_volume;
				let volume = o.volume;

				self.compute_reference_ratio(output);

				if changed {
					let o = self.source_outputs.get_mut(&output).unwrap();
					o.driver.volume_changed(&volume);
					self.subscription_post(Facility::SourceOutput, EventKind::Change, output);
				}
			}

			self.update_source_real_volume(dest, new_volume, map);
		}
	}

	/// Flat mode at the root: derive the real volume from the
	/// attached streams and rebuild every ratio.
	fn compute_real_volume(&mut self, root: u32) {
		debug_assert!(!self.sources[&root].shares_volume());

		let (reference, map) = {
			let s = &self.sources[&root];
			(s.reference_volume, s.map)
		};

		if !self.source_has_outputs(root) {
			// No streams: hold the reference.
			self.update_source_real_volume(root, &reference, &map);
			return;
		}

		let mut max_volume = ChannelVolumes::muted(map.channels);
		self.get_maximum_output_volume(root, &mut max_volume, &map);
		self.update_source_real_volume(root, &max_volume, &map);
		self.compute_real_ratios(root);
	}

	/// The reference volume changed without the streams changing:
	/// push it back into the stream volumes.
	fn propagate_reference_volume(&mut self, source: u32) {
		let (reference, source_map, outputs) = match self.sources.get(&source) {
			Some(s) => (s.reference_volume, s.map, s.outputs.iter().copied().collect::<Vec<u32>>()),
			None => return,
		};

		for output in outputs {
			if let Some(dest) = self.sharing_destination(output) {
				// The sharing child's streams are handled when the
				// real volume propagates.
				self.propagate_reference_volume(dest);
				continue;
			}

			let Some(o) = self.source_outputs.get_mut(&output) else { continue };
			let old_volume = o.volume;

			// o.volume := root.reference_volume * o.reference_ratio
			o.volume = reference.remap(&source_map, &o.map).multiply(&o.reference_ratio);

			if o.volume != old_volume {
				let volume = o.volume;
				o.driver.volume_changed(&volume);
				self.subscription_post(Facility::SourceOutput, EventKind::Change, output);
			}
		}
	}

	/// Install `v` (over `map`) as the reference volume of the
	/// subtree. Returns whether anything actually changed.
	fn update_reference_volume(
		&mut self,
		source: u32,
		v: &ChannelVolumes,
		map: &ChannelMap,
		save: bool,
	) -> bool {
		let (changed, shares, outputs) = {
			let Some(s) = self.sources.get_mut(&source) else { return false };
			let volume = v.remap(map, &s.map);

			let changed = volume != s.reference_volume;
			s.reference_volume = volume;
			s.save_volume = (!changed && s.save_volume) || save;

			(changed, s.flags.share_volume_with_master, s.outputs.iter().copied().collect::<Vec<u32>>())
		};

		if changed {
			self.subscription_post(Facility::Source, EventKind::Change, source);
		} else if !shares {
			// An unchanged root cannot change anything below; a
			// sharing device may still need the propagation due to
			// rounding drift above it.
			return false;
		}

		for output in outputs {
			if let Some(dest) = self.sharing_destination(output) {
				self.update_reference_volume(dest, v, map, false);
			}
		}

		true
	}

	//---------------------------------------------------------------------------------------------------- Public volume ops
	/// Set the device volume (spec §4.1).
	///
	/// With `volume` given it is interpreted over the root's map
	/// (mono broadcasts); with `None` the device volume is
	/// re-synchronized from the attached streams (flat mode only).
	pub fn source_set_volume(
		&mut self,
		index: u32,
		volume: Option<&ChannelVolumes>,
		send_msg: bool,
		save: bool,
	) {
		assert_ctl_context!();

		let Some(s) = self.sources.get(&index) else { return };
		debug_assert!(s.state.is_linked());
		debug_assert!(volume.is_some() || self.source_flat_volume_enabled(index));

		// Passthrough forbids volume, except resetting to 0 dB.
		if self.source_is_passthrough(index) && !volume.map(ChannelVolumes::is_norm).unwrap_or(false) {
			warn2!("cannot change volume, source {index} is in passthrough mode");
			return;
		}

		let Some(root) = self.source_shared_root(index) else { return };
		let flat = self.source_flat_volume_enabled(root);

		match volume {
			Some(v) => {
				let (spec, reference, s_map) = {
					let s = &self.sources[&index];
					(s.spec, s.reference_volume, s.map)
				};
				let root_map = self.sources[&root].map;

				// Mono volumes broadcast over the whole map.
				let new_reference = if v.compatible_with(&spec) {
					*v
				} else {
					let mut scaled = reference;
					scaled.scale(v.max());
					scaled
				};
				let new_reference = new_reference.remap(&s_map, &root_map);

				if self.update_reference_volume(root, &new_reference, &root_map, save) {
					if flat {
						self.propagate_reference_volume(root);
						self.compute_real_volume(root);
					} else {
						let (reference, map) = {
							let r = &self.sources[&root];
							(r.reference_volume, r.map)
						};
						self.update_source_real_volume(root, &reference, &map);
					}
				}
			},

			None => {
				// Synchronize device volume from the streams.
				debug_assert!(flat);

				self.compute_real_volume(root);

				let (s_reference, s_map) = {
					let s = &self.sources[&index];
					(s.reference_volume, s.map)
				};
				let (root_real, root_map) = {
					let r = &self.sources[&root];
					(r.real_volume, r.map)
				};

				// 'Push' the reference volume up if a stream now
				// sits above it.
				let new_reference = if index != root && !s_map.equal(&root_map) {
					s_reference.remap(&s_map, &root_map).merge(&root_real)
				} else {
					s_reference.merge(&root_real)
				};

				self.update_reference_volume(root, &new_reference, &root_map, save);
				self.compute_reference_ratios(root);
			},
		}

		// Hand the real volume to the hardware (or make it all
		// software).
		{
			let r = self.sources.get_mut(&root).unwrap();
			if r.flags.hw_volume_ctrl {
				r.soft_volume = ChannelVolumes::norm(r.spec.channels);
				if !r.flags.deferred_volume {
					let real = r.real_volume;
					let mut soft = r.soft_volume;
					if let Err(e) = r.driver.set_volume(&real, &mut soft) {
						warn2!("source {root}: driver set_volume failed: {e}");
					}
					r.soft_volume = soft;
				}
			} else {
				r.soft_volume = r.real_volume;
			}
		}

		if send_msg {
			self.source_sync_shared_volume(root);
		}
	}

	/// Push the post-algebra soft/real volumes of every device in
	/// the sharing subtree to its IO thread, streams included.
	pub(crate) fn source_sync_shared_volume(&mut self, source: u32) {
		let Some(s) = self.sources.get(&source) else { return };

		let Some(q) = s.msgq.clone() else { return };
		let soft = s.soft_volume;
		let real = s.real_volume;
		let outputs: Vec<(u32, ChannelVolumes)> = s
			.outputs
			.iter()
			.filter_map(|o| self.source_outputs.get(o).map(|o| (o.index, o.soft_volume)))
			.collect();
		let children: Vec<u32> = s
			.outputs
			.iter()
			.filter_map(|o| self.sharing_destination(*o))
			.collect();

		q.send(SourceMsg::SetSharedVolume { soft, real, outputs });

		for child in children {
			self.source_sync_shared_volume(child);
		}
	}

	/// Implementors without a hardware volume route their residual
	/// gain through here.
	pub fn source_set_soft_volume(&mut self, index: u32, volume: Option<&ChannelVolumes>) {
		assert_ctl_context!();

		let Some(s) = self.sources.get_mut(&index) else { return };
		debug_assert!(!s.flags.share_volume_with_master);

		s.soft_volume = match volume {
			Some(v) => *v,
			None => ChannelVolumes::norm(s.spec.channels),
		};

		if s.state.is_linked() && !s.flags.deferred_volume {
			let soft = s.soft_volume;
			if let Some(q) = &s.msgq {
				q.send(SourceMsg::SetSoftVolume(soft));
			}
		}
	}

	/// Read the reference volume, optionally refreshing the real
	/// volume from the hardware first.
	pub fn source_get_volume(&mut self, index: u32, force_refresh: bool) -> Result<ChannelVolumes, Error> {
		assert_ctl_context!();

		{
			let s = self.sources.get(&index).ok_or(Error::NoEntity)?;
			if !s.state.is_linked() {
				return Err(Error::BadState);
			}
		}

		if force_refresh {
			debug_assert!(!self.sources[&index].shares_volume());

			let old_real = self.sources[&index].real_volume;

			{
				let s = self.sources.get_mut(&index).unwrap();
				if !s.flags.deferred_volume && s.flags.hw_volume_ctrl {
					let mut real = s.real_volume;
					if s.driver.get_volume(&mut real).is_ok() {
						s.real_volume = real;
					}
				}
			}

			let (real, map) = {
				let s = &self.sources[&index];
				(s.real_volume, s.map)
			};
			self.update_source_real_volume(index, &real, &map);
			self.source_propagate_real_volume(index, &old_real);
		}

		Ok(self.sources[&index].reference_volume)
	}

	/// Hardware told us its volume changed (deferred readback or
	/// external mixer event). Only meaningful at the root.
	pub(crate) fn source_volume_changed(&mut self, index: u32, new_real: &ChannelVolumes) {
		assert_ctl_context!();

		let Some(s) = self.sources.get(&index) else { return };
		if !s.state.is_linked() || s.shares_volume() {
			return;
		}

		let old_real = s.real_volume;
		let map = s.map;
		self.update_source_real_volume(index, new_real, &map);
		self.source_propagate_real_volume(index, &old_real);
	}

	/// Reconcile a hardware-originated real-volume change: the
	/// real volume becomes the reference, stream volumes rebuild
	/// from their (stable) real ratios.
	fn source_propagate_real_volume(&mut self, source: u32, old_real: &ChannelVolumes) {
		let (shares, real, map) = {
			let Some(s) = self.sources.get(&source) else { return };
			(s.shares_volume(), s.real_volume, s.map)
		};

		if !shares {
			if *old_real == real {
				return;
			}
			self.update_reference_volume(source, &real, &map, true);
		}

		if self.source_flat_volume_enabled(source) {
			let (reference, source_map, outputs) = {
				let s = &self.sources[&source];
				(s.reference_volume, s.map, s.outputs.iter().copied().collect::<Vec<u32>>())
			};

			for output in outputs {
				{
					let Some(o) = self.source_outputs.get_mut(&output) else { continue };
					let old_volume = o.volume;

					// Reference and real are equal now, so the
					// ratios collapse onto each other.
					o.reference_ratio = o.real_ratio;
					o.volume = reference.remap(&source_map, &o.map).multiply(&o.reference_ratio);

					if o.volume != old_volume {
						let volume = o.volume;
						o.driver.volume_changed(&volume);
						self.subscription_post(Facility::SourceOutput, EventKind::Change, output);
					}
				}

				if let Some(dest) = self.sharing_destination(output) {
					self.source_propagate_real_volume(dest, old_real);
				}
			}
		}

		// Externally changed hardware settings are almost
		// certainly the user's doing; keep them.
		if !shares {
			self.sources.get_mut(&source).unwrap().save_volume = true;
		}
	}

	//---------------------------------------------------------------------------------------------------- Mute
	/// Set the device mute.
	pub fn source_set_mute(&mut self, index: u32, mute: bool, save: bool) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sources.get_mut(&index).ok_or(Error::NoEntity)?;
		if !s.state.is_linked() {
			return Err(Error::BadState);
		}

		let old_muted = s.muted;
		s.muted = mute;
		s.save_muted = (old_muted == mute && s.save_muted) || save;

		if !s.flags.deferred_volume && s.flags.hw_mute_ctrl {
			if let Err(e) = s.driver.set_mute(mute) {
				warn2!("source {index}: driver set_mute failed: {e}");
			}
		}

		if let Some(q) = &s.msgq {
			q.send(SourceMsg::SetMute(mute));
		}

		if old_muted != mute {
			self.subscription_post(Facility::Source, EventKind::Change, index);
		}
		Ok(())
	}

	/// Read the mute state, optionally refreshing from hardware.
	pub fn source_get_mute(&mut self, index: u32, force_refresh: bool) -> Result<bool, Error> {
		assert_ctl_context!();

		{
			let s = self.sources.get(&index).ok_or(Error::NoEntity)?;
			if !s.state.is_linked() {
				return Err(Error::BadState);
			}
		}

		if force_refresh {
			let s = self.sources.get_mut(&index).unwrap();
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
					q.send(SourceMsg::SetMute(muted));
				}
				self.subscription_post(Facility::Source, EventKind::Change, index);
			}
		}

		Ok(self.sources[&index].muted)
	}

	/// Hardware told us its mute changed.
	pub(crate) fn source_mute_changed(&mut self, index: u32, new_muted: bool) {
		assert_ctl_context!();

		let Some(s) = self.sources.get_mut(&index) else { return };
		if !s.state.is_linked() || s.muted == new_muted {
			return;
		}

		s.muted = new_muted;
		s.save_muted = true;
		self.subscription_post(Facility::Source, EventKind::Change, index);
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::channel::Volume;
	use crate::tests::{flat_source,output_with_volume,shared_source,TestCore};
	use pretty_assertions::assert_eq;

	fn v2(l: f64, r: f64) -> ChannelVolumes {
		let mut v = ChannelVolumes::norm(2);
		v.values[0] = Volume((l * f64::from(Volume::NORM.0)) as u32);
		v.values[1] = Volume((r * f64::from(Volume::NORM.0)) as u32);
		v
	}

	#[test]
	fn single_device_flat_volume() {
		// Spec scenario: streams at (0.5, 0.5) and (0.2, 1.0) on a
		// flat stereo source.
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");

		let x = output_with_volume(&mut t, a, v2(0.5, 0.5));
		let y = output_with_volume(&mut t, a, v2(0.2, 1.0));

		let s = t.core.source(a).unwrap();
		assert_eq!(s.real_volume, v2(0.5, 1.0));

		let x = t.core.source_output(x).unwrap();
		let y = t.core.source_output(y).unwrap();
		assert_eq!(x.real_ratio, v2(1.0, 0.5));
		assert_eq!(y.real_ratio, v2(0.4, 1.0));

		// Streams' audible result: real_ratio * root.real == volume.
		for o in [x, y] {
			for c in 0..2 {
				assert_eq!(
					o.real_ratio.values[c].multiply(s.real_volume.values[c]),
					o.volume.values[c],
				);
			}
		}
	}

	#[test]
	fn sharing_tree_follows_root() {
		// Spec scenario: root R, filter F sharing with R, stream X
		// at 0.8 on F.
		let mut t = TestCore::new();
		let r = flat_source(&mut t, "root");
		let f = shared_source(&mut t, "filter", r);

		let x = output_with_volume(&mut t, f, v2(0.8, 0.8));

		let root = t.core.source(r).unwrap();
		let filter = t.core.source(f).unwrap();
		assert_eq!(root.real_volume, v2(0.8, 0.8));
		assert_eq!(filter.real_volume, v2(0.8, 0.8));

		let x = t.core.source_output(x).unwrap();
		assert_eq!(x.real_ratio, ChannelVolumes::norm(2));
		assert_eq!(x.soft_volume, x.volume_factor);
	}

	#[test]
	fn sharing_walk_terminates() {
		let mut t = TestCore::new();
		let r = flat_source(&mut t, "root");
		let f = shared_source(&mut t, "f1", r);
		let g = shared_source(&mut t, "f2", f);

		assert_eq!(t.core.source_shared_root(g), Some(r));
		assert_eq!(t.core.source_shared_root(f), Some(r));
		assert_eq!(t.core.source_shared_root(r), Some(r));
	}

	#[test]
	fn reference_ratio_is_idempotent() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let x = output_with_volume(&mut t, a, v2(0.5, 0.7));
		let y = output_with_volume(&mut t, a, v2(0.3, 0.9));

		let reference = t.core.source(a).unwrap().reference_volume;
		let before: Vec<_> = [x, y]
			.iter()
			.map(|o| {
				let o = t.core.source_output(*o).unwrap();
				(o.reference_ratio, o.volume)
			})
			.collect();

		t.core.source_set_volume(a, Some(&reference), true, false);

		let after: Vec<_> = [x, y]
			.iter()
			.map(|o| {
				let o = t.core.source_output(*o).unwrap();
				(o.reference_ratio, o.volume)
			})
			.collect();

		assert_eq!(before, after);
	}

	#[test]
	fn device_volume_round_trips() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let _x = output_with_volume(&mut t, a, v2(0.5, 0.5));

		let target = v2(0.6, 0.3);
		t.core.source_set_volume(a, Some(&target), true, false);
		assert_eq!(t.core.source_get_volume(a, false).unwrap(), target);
	}

	#[test]
	fn mono_volume_broadcasts() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let _x = output_with_volume(&mut t, a, v2(0.5, 0.5));

		let mut mono = ChannelVolumes::norm(1);
		mono.values[0] = Volume(0x8000);
		t.core.source_set_volume(a, Some(&mono), true, false);

		let reference = t.core.source(a).unwrap().reference_volume;
		assert_eq!(reference.channels, 2);
		// Both channels scaled so the maximum lands on 0.5.
		assert_eq!(reference.max(), Volume(0x8000));
	}

	#[test]
	fn hardware_volume_change_becomes_reference() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let x = output_with_volume(&mut t, a, v2(0.5, 0.5));

		// Someone turned the knob: hardware reports a new real volume.
		t.core.source_volume_changed(a, &v2(0.25, 0.25));

		let s = t.core.source(a).unwrap();
		assert_eq!(s.reference_volume, v2(0.25, 0.25));
		assert!(s.save_volume);

		// The stream follows via its (stable) real ratio.
		let x = t.core.source_output(x).unwrap();
		assert_eq!(x.reference_ratio, x.real_ratio);
	}

	#[test]
	fn mute_round_trip() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let _x = output_with_volume(&mut t, a, v2(0.5, 0.5));

		t.core.source_set_mute(a, true, true).unwrap();
		assert!(t.core.source_get_mute(a, false).unwrap());
		assert!(t.core.source(a).unwrap().save_muted);

		t.core.source_set_mute(a, false, false).unwrap();
		assert!(!t.core.source_get_mute(a, false).unwrap());
	}

	#[test]
	fn detaching_all_streams_holds_reference() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let x = output_with_volume(&mut t, a, v2(0.5, 0.5));

		t.core.source_output_unlink(x);

		let s = t.core.source(a).unwrap();
		assert_eq!(s.real_volume, s.reference_volume);
	}
}
