//! Source outputs: the per-stream consumers attached to a source.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::{ChannelMap,ChannelVolumes};
use crate::core::{Core,EventKind,Facility};
use crate::device::msg::{SourceMsg,SourceReply};
use crate::device::source::io::OutputIo;
use crate::device::{MAX_STREAMS_PER_DEVICE,SHARE_WALK_LIMIT};
use crate::error::Error;
use crate::format::{negotiate,FormatInfo};
use crate::hook::{fire_new,fire_veto,HookResult};
use crate::macros::{assert_ctl_context,debug2,info2,warn2};
use crate::memblockq::MemBlockQueue;
use crate::resampler::{ResampleMethod,Resampler,TrivialResampler};
use crate::sample::{SampleFormat,SampleSpec,Usec};
use crate::stream::{SourceOutputDriver,SourceOutputIoDriver,StreamFlags,StreamState};
use std::collections::BTreeMap;

//---------------------------------------------------------------------------------------------------- Constants
/// Upper bound of the per-stream delay queue.
const DELAY_QUEUE_MAXLENGTH: usize = 32 * 1024 * 1024;

//---------------------------------------------------------------------------------------------------- SourceOutput
/// A capture stream.
pub struct SourceOutput {
	/// Stable index.
	pub index: u32,
	/// Stream name.
	pub name: String,
	/// Driver tag.
	pub driver_name: String,
	/// Free-form properties.
	pub props: BTreeMap<String, String>,
	/// Owning module.
	pub module: Option<u32>,
	/// Owning client.
	pub client: Option<u32>,

	/// The source this stream reads from; `None` mid-move.
	pub source: Option<u32>,
	/// The filter source this stream feeds, making it the
	/// filter's master link.
	pub destination_source: Option<u32>,
	/// The sink input whose monitor data this output taps
	/// directly, bypassing the broadcast.
	pub direct_on_input: Option<u32>,

	pub(crate) state: StreamState,
	/// Behavior toggles.
	pub flags: StreamFlags,
	/// Negotiated format.
	pub format: FormatInfo,
	/// Concrete spec derived from the format.
	pub spec: SampleSpec,
	/// Channel map.
	pub map: ChannelMap,

	/// User-visible volume.
	pub volume: ChannelVolumes,
	/// May the user change `volume`? (Not on sharing links.)
	pub volume_writable: bool,
	/// Internal gain, always applied.
	pub volume_factor: ChannelVolumes,
	/// Extra gain carried on the device side (device channels).
	pub volume_factor_source: ChannelVolumes,
	/// `volume / source.reference_volume`.
	pub reference_ratio: ChannelVolumes,
	/// `volume / source.real_volume`.
	pub real_ratio: ChannelVolumes,
	/// What the IO path applies in software.
	pub(crate) soft_volume: ChannelVolumes,
	/// Mute state.
	pub muted: bool,

	/// Persistence hints.
	pub save_volume: bool,
	/// Persistence hints.
	pub save_muted: bool,
	/// Persistence hints.
	pub save_source: bool,

	/// What the creator asked the resampler to be.
	pub requested_resample_method: ResampleMethod,
	/// What it actually is.
	pub actual_resample_method: ResampleMethod,
	/// Latency this stream wants from the device.
	pub requested_latency: Option<Usec>,

	pub(crate) driver: Box<dyn SourceOutputDriver>,
	/// IO-side state, parked here while not attached.
	pub(crate) io: Option<Box<OutputIo>>,
}

impl SourceOutput {
	/// Current state.
	pub const fn state(&self) -> StreamState {
		self.state
	}

	/// Software gain currently applied by the IO path.
	pub const fn soft_volume(&self) -> &ChannelVolumes {
		&self.soft_volume
	}

	/// Is this a compressed bitstream (or forced passthrough)?
	pub fn is_passthrough(&self) -> bool {
		self.format.encoding.is_passthrough() || self.flags.passthrough
	}

	/// May this stream move at all?
	pub fn may_move(&self) -> bool {
		!self.flags.dont_move
	}

	/// Is the user allowed to read a volume off this stream?
	pub fn is_volume_readable(&self) -> bool {
		!self.is_passthrough()
	}
}

impl std::fmt::Debug for SourceOutput {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SourceOutput")
			.field("index", &self.index)
			.field("source", &self.source)
			.field("state", &self.state)
			.field("spec", &self.spec)
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- SourceOutputBuilder
/// The `new_data` candidate for a source output.
pub struct SourceOutputBuilder {
	/// Stream name.
	pub name: String,
	/// Driver tag.
	pub driver_name: String,
	/// Free-form properties.
	pub props: BTreeMap<String, String>,
	/// Owning module.
	pub module: Option<u32>,
	/// Owning client.
	pub client: Option<u32>,
	/// The source to attach to.
	pub source: Option<u32>,
	/// Filter source this stream will feed.
	pub destination_source: Option<u32>,
	/// Sink input to tap directly.
	pub direct_on_input: Option<u32>,
	/// Behavior toggles.
	pub flags: StreamFlags,
	/// Requested formats, in preference order; PCM from
	/// `spec`/`map` when empty.
	pub formats: Vec<FormatInfo>,
	/// Requested sample spec.
	pub spec: Option<SampleSpec>,
	/// Requested channel map.
	pub map: Option<ChannelMap>,
	/// Initial volume, interpreted relative to the device unless
	/// `volume_is_absolute`.
	pub volume: Option<ChannelVolumes>,
	/// Take `volume` as absolute even in flat mode.
	pub volume_is_absolute: bool,
	/// Internal gain.
	pub volume_factor: Option<ChannelVolumes>,
	/// Device-side gain (device channels).
	pub volume_factor_source: Option<ChannelVolumes>,
	/// Initial mute.
	pub muted: bool,
	/// Resampler choice.
	pub resample_method: ResampleMethod,
	/// Persistence hints.
	pub save_volume: bool,
	/// Persistence hints.
	pub save_muted: bool,
	/// Persistence hints.
	pub save_source: bool,

	/// Control-side driver.
	pub driver: Box<dyn SourceOutputDriver>,
	/// IO-side driver.
	pub io_driver: Box<dyn SourceOutputIoDriver>,
}

impl SourceOutputBuilder {
	/// A candidate with defaults.
	pub fn new(
		name: &str,
		source: u32,
		driver: Box<dyn SourceOutputDriver>,
		io_driver: Box<dyn SourceOutputIoDriver>,
	) -> Self {
		Self {
			name: name.to_owned(),
			driver_name: String::new(),
			props: BTreeMap::new(),
			module: None,
			client: None,
			source: Some(source),
			destination_source: None,
			direct_on_input: None,
			flags: StreamFlags::default(),
			formats: Vec::new(),
			spec: None,
			map: None,
			volume: None,
			volume_is_absolute: false,
			volume_factor: None,
			volume_factor_source: None,
			muted: false,
			resample_method: ResampleMethod::Auto,
			save_volume: false,
			save_muted: false,
			save_source: false,
			driver,
			io_driver,
		}
	}
}

impl std::fmt::Debug for SourceOutputBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SourceOutputBuilder")
			.field("name", &self.name)
			.field("source", &self.source)
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- Resampler helper
/// Build a resampler between the device and stream domains, or
/// `None` when the specs already agree.
fn make_resampler(
	source_spec: &SampleSpec,
	source_map: &ChannelMap,
	spec: &SampleSpec,
	map: &ChannelMap,
	flags: &StreamFlags,
) -> Result<Option<Box<dyn Resampler>>, Error> {
	let needed = flags.variable_rate || source_spec != spec || !source_map.equal(map);
	if !needed {
		return Ok(None);
	}

	// The in-tree converter only handles float samples; anything
	// else is for an external resampler implementation.
	if source_spec.format != SampleFormat::F32Le || spec.format != SampleFormat::F32Le {
		warn2!("unsupported resampling operation ({} -> {})", source_spec, spec);
		return Err(Error::NotSupported);
	}

	Ok(Some(Box::new(TrivialResampler::new(
		*source_spec,
		*source_map,
		*spec,
		*map,
	))))
}

//---------------------------------------------------------------------------------------------------- Core: lifecycle
impl Core {
	/// Create a source output: negotiate the format against the
	/// source, fix up spec/map, build the resampler and park the
	/// IO state until [`Core::source_output_put`].
	pub fn source_output_new(&mut self, mut builder: SourceOutputBuilder) -> Result<u32, Error> {
		assert_ctl_context!();

		// Streams feeding a sharing filter may not carry their own
		// user volume.
		let mut volume_writable = true;
		if let Some(dest) = builder.destination_source {
			if self.sources.get(&dest).map(|s| s.shares_volume()).unwrap_or(false) {
				volume_writable = false;
			}
		}

		let mut hooks = std::mem::take(&mut self.hooks.source_output_new);
		let verdict = fire_new(&mut hooks, &mut builder);
		self.hooks.source_output_new = hooks;
		if verdict == HookResult::Cancel {
			return Err(Error::NotSupported);
		}

		let source_idx = builder.source.ok_or(Error::NoEntity)?;
		let (source_spec, source_map, source_state, source_formats, source_outputs) = {
			let s = self.sources.get(&source_idx).ok_or(Error::NoEntity)?;
			(s.spec, s.map, s.state, s.driver.get_formats(), s.outputs.len())
		};

		if !source_state.is_linked() {
			return Err(Error::BadState);
		}

		// Direct taps must tap the sink this source monitors.
		if let Some(input) = builder.direct_on_input {
			let monitor_of = self.sources[&source_idx].monitor_of;
			let input_sink = self.sink_inputs.get(&input).and_then(|i| i.sink);
			if monitor_of.is_none() || input_sink != monitor_of {
				return Err(Error::Invalid);
			}
		}

		// Format negotiation. Requested formats default to PCM at
		// the requested (or device) spec.
		let mut spec = builder.spec.unwrap_or(source_spec);
		let requested = if builder.formats.is_empty() {
			vec![FormatInfo {
				encoding: crate::format::Encoding::Pcm,
				rate: Some(spec.rate),
				channels: Some(spec.channels),
			}]
		} else {
			builder.formats.clone()
		};
		let format = negotiate(&requested, &source_formats)?;

		spec = format.to_sample_spec(&spec);
		spec.validate()?;

		let mut map = match builder.map {
			Some(map) if map.compatible_with(&spec) => map,
			Some(_) => return Err(Error::Invalid),
			None => {
				if source_map.channels == spec.channels {
					source_map
				} else {
					ChannelMap::default_for(spec.channels).ok_or(Error::Invalid)?
				}
			},
		};

		let is_passthrough = format.encoding.is_passthrough() || builder.flags.passthrough;

		// Passthrough forbids any attenuation and is exclusive.
		if is_passthrough {
			if source_outputs > 0 {
				return Err(Error::Busy);
			}
			builder.volume = Some(ChannelVolumes::norm(spec.channels));
			builder.volume_is_absolute = true;
			builder.save_volume = false;
		}

		// The fix-flags force the device's values.
		if builder.flags.fix_format {
			spec.format = source_spec.format;
		}
		if builder.flags.fix_rate {
			spec.rate = source_spec.rate;
		}
		let original_map = map;
		if builder.flags.fix_channels {
			spec.channels = source_spec.channels;
			map = source_map;
		}

		// Glitch-avoidance: try to move the device onto the
		// stream's rate before attaching.
		if !builder.flags.variable_rate && spec != source_spec {
			info2!("trying to change sample rate of source {source_idx}");
			if self.source_update_rate(source_idx, spec.rate, is_passthrough) {
				info2!("rate changed to {} Hz", self.sources[&source_idx].spec.rate);
			}
		}

		let source_spec = self.sources[&source_idx].spec;
		if is_passthrough && spec != source_spec {
			debug2!("could not update source sample spec to match passthrough stream");
			return Err(Error::NotSupported);
		}

		let mut hooks = std::mem::take(&mut self.hooks.source_output_fixate);
		let verdict = fire_new(&mut hooks, &mut builder);
		self.hooks.source_output_fixate = hooks;
		if verdict == HookResult::Cancel {
			return Err(Error::NotSupported);
		}

		if builder.flags.no_create_on_suspend
			&& self.sources[&source_idx].state == crate::device::DeviceState::Suspended
		{
			warn2!("failed to create source output: source is suspended");
			return Err(Error::BadState);
		}

		if self.sources[&source_idx].outputs.len() >= MAX_STREAMS_PER_DEVICE {
			warn2!("failed to create source output: too many outputs per source");
			return Err(Error::TooLarge);
		}

		let resampler = if is_passthrough {
			None
		} else {
			make_resampler(&source_spec, &self.sources[&source_idx].map, &spec, &map, &builder.flags)?
		};

		// Volumes. A volume handed in over the pre-fix layout
		// follows the stream into the final one.
		let mut volume = match builder.volume {
			Some(v) => {
				if !v.compatible_with_map(&original_map) {
					return Err(Error::Invalid);
				}
				v.remap(&original_map, &map)
			},
			None => ChannelVolumes::norm(spec.channels),
		};
		if !volume.compatible_with(&spec) {
			return Err(Error::Invalid);
		}

		let volume_factor = builder.volume_factor.unwrap_or_else(|| ChannelVolumes::norm(spec.channels));
		if !volume_factor.compatible_with(&spec) {
			return Err(Error::Invalid);
		}

		let volume_factor_source = builder
			.volume_factor_source
			.unwrap_or_else(|| ChannelVolumes::norm(source_spec.channels));
		if !volume_factor_source.compatible_with(&source_spec) {
			return Err(Error::Invalid);
		}

		// Relative volumes scale against the device in flat mode.
		if !builder.volume_is_absolute && self.source_flat_volume_enabled(source_idx) {
			let remapped = self.sources[&source_idx]
				.reference_volume
				.remap(&self.sources[&source_idx].map, &map);
			volume = volume.multiply(&remapped);
		}

		let index = self.alloc_index();
		let actual_resample_method = resampler
			.as_ref()
			.map(|r| r.method())
			.unwrap_or(ResampleMethod::Copy);

		let io = Box::new(OutputIo {
			index,
			state: StreamState::Init,
			spec,
			map,
			soft_volume: ChannelVolumes::norm(spec.channels),
			muted: builder.muted,
			volume_factor_source,
			delay_queue: MemBlockQueue::new(DELAY_QUEUE_MAXLENGTH, 0),
			resampler,
			driver: builder.io_driver,
			requested_latency: None,
			direct_on_input: builder.direct_on_input,
		});

		let output = SourceOutput {
			index,
			name: builder.name,
			driver_name: builder.driver_name,
			props: builder.props,
			module: builder.module,
			client: builder.client,
			source: Some(source_idx),
			destination_source: builder.destination_source,
			direct_on_input: builder.direct_on_input,
			state: StreamState::Init,
			flags: builder.flags,
			format,
			spec,
			map,
			volume,
			volume_writable,
			volume_factor,
			volume_factor_source,
			reference_ratio: volume,
			real_ratio: ChannelVolumes::norm(spec.channels),
			soft_volume: ChannelVolumes::norm(spec.channels),
			muted: builder.muted,
			save_volume: builder.save_volume,
			save_muted: builder.save_muted,
			save_source: builder.save_source,
			requested_resample_method: builder.resample_method,
			actual_resample_method,
			requested_latency: None,
			driver: builder.driver,
			io: Some(io),
		};

		info2!(
			"created output {index} \"{}\" on {} with sample spec {} ",
			output.name, source_idx, output.spec,
		);

		self.source_outputs.insert(index, output);
		self.sources.get_mut(&source_idx).unwrap().outputs.insert(index);

		// A filter's master link doubles as the sharing edge.
		if let Some(dest) = builder.destination_source {
			if let Some(filter) = self.sources.get_mut(&dest) {
				filter.output_from_master = Some(index);
			}
		}

		Ok(index)
	}

	/// Publish a source output: initial state, volume wiring,
	/// hand the IO state to the device's IO thread.
	pub fn source_output_put(&mut self, index: u32) -> Result<(), Error> {
		assert_ctl_context!();

		let (source_idx, start_corked) = {
			let o = self.source_outputs.get(&index).ok_or(Error::NoEntity)?;
			debug_assert_eq!(o.state, StreamState::Init);
			(o.source.ok_or(Error::BadState)?, o.flags.start_corked)
		};

		let state = if start_corked { StreamState::Corked } else { StreamState::Running };
		{
			let o = self.source_outputs.get_mut(&index).unwrap();
			o.state = state;
		}
		if state == StreamState::Corked {
			self.sources.get_mut(&source_idx).unwrap().n_corked += 1;
		}

		// Volume initialization.
		if self.source_flat_volume_enabled(source_idx) {
			let save = self.source_outputs[&index].save_volume;
			self.source_set_volume(source_idx, None, false, save);
		} else {
			let o = self.source_outputs.get_mut(&index).unwrap();

			if self
				.sources
				.get(&o.destination_source.unwrap_or(u32::MAX))
				.map(|s| s.shares_volume())
				.unwrap_or(false)
			{
				debug_assert!(o.volume.is_norm());
				debug_assert!(o.reference_ratio.is_norm());
			}

			// real_ratio := volume, soft := real_ratio * factor
			o.real_ratio = o.volume;
			o.soft_volume = o.real_ratio.multiply(&o.volume_factor);
		}

		if self.source_outputs[&index].is_passthrough() {
			self.source_enter_passthrough(source_idx);
		}

		// Ship the IO state to the device thread.
		{
			let io = {
				let o = self.source_outputs.get_mut(&index).unwrap();
				let mut io = o.io.take().ok_or(Error::BadState)?;
				io.soft_volume = o.soft_volume;
				io.muted = o.muted;
				io.state = o.state;
				io
			};

			let q = self.sources[&source_idx].msgq.clone().ok_or(Error::BadState)?;
			q.send(SourceMsg::AddOutput(io));
		}

		// INVARIANT: membership changes and the shared volume reach
		// the IO thread in this order, so its view stays consistent.
		if let Some(root) = self.source_shared_root(source_idx) {
			self.source_sync_shared_volume(root);
		}

		self.subscription_post(Facility::SourceOutput, EventKind::New, index);
		drop(self.source_update_status(source_idx));
		Ok(())
	}

	/// Kill a stream: the implementor tears down, then the
	/// stream unlinks.
	pub fn source_output_kill(&mut self, index: u32) {
		assert_ctl_context!();

		if let Some(o) = self.source_outputs.get_mut(&index) {
			o.driver.kill();
		}
		self.source_output_unlink(index);
	}

	/// Detach and forget a stream.
	pub fn source_output_unlink(&mut self, index: u32) {
		assert_ctl_context!();

		let Some(o) = self.source_outputs.get(&index) else { return };
		let linked = o.state.is_linked();
		let source_idx = o.source;
		let was_corked = o.state == StreamState::Corked;
		let was_passthrough = o.is_passthrough();
		let destination = o.destination_source;

		if let Some(source_idx) = source_idx {
			let s = self.sources.get_mut(&source_idx).unwrap();
			s.outputs.remove(&index);
			if was_corked {
				s.n_corked = s.n_corked.saturating_sub(1);
			}
		}

		self.source_outputs.get_mut(&index).unwrap().state = StreamState::Unlinked;

		if linked {
			if let Some(source_idx) = source_idx {
				if was_passthrough {
					self.source_leave_passthrough(source_idx);
				}

				if self.source_flat_volume_enabled(source_idx) {
					self.source_set_volume(source_idx, None, false, false);
				}

				if let Some(q) = self.sources[&source_idx].msgq.clone() {
					// The IO state comes back and is dropped here.
					q.send(SourceMsg::RemoveOutput(index));
				}

				if let Some(root) = self.source_shared_root(source_idx) {
					self.source_sync_shared_volume(root);
				}

				drop(self.source_update_status(source_idx));
			}
		}

		// Unhook a filter's sharing edge.
		if let Some(dest) = destination {
			if let Some(filter) = self.sources.get_mut(&dest) {
				if filter.output_from_master == Some(index) {
					filter.output_from_master = None;
				}
			}
		}

		self.source_outputs.remove(&index);

		if linked {
			self.subscription_post(Facility::SourceOutput, EventKind::Remove, index);
		}

		debug2!("unlinked source output {index}");
	}

	//---------------------------------------------------------------------------------------------------- State
	fn source_output_set_state(&mut self, index: u32, state: StreamState) -> Result<(), Error> {
		let (old_state, source_idx) = {
			let o = self.source_outputs.get(&index).ok_or(Error::NoEntity)?;
			(o.state, o.source)
		};

		if old_state == state {
			return Ok(());
		}

		// Uncorking onto an unused device: a rate switch avoids
		// the resampler entirely.
		if let Some(source_idx) = source_idx {
			if old_state == StreamState::Corked && state == StreamState::Running {
				let (spec, source_spec, used) = {
					let o = &self.source_outputs[&index];
					let s = &self.sources[&source_idx];
					(o.spec, s.spec, s.used_by())
				};
				if used == 0 && spec != source_spec {
					let passthrough = self.source_outputs[&index].is_passthrough();
					self.source_update_rate(source_idx, spec.rate, passthrough);
				}
			}

			if let Some(q) = self.sources[&source_idx].msgq.clone() {
				q.send(SourceMsg::SetOutputState { output: index, state });
			}

			let s = self.sources.get_mut(&source_idx).unwrap();
			if old_state == StreamState::Corked && state != StreamState::Corked {
				s.n_corked = s.n_corked.saturating_sub(1);
			} else if old_state != StreamState::Corked && state == StreamState::Corked {
				s.n_corked += 1;
			}
		}

		self.source_outputs.get_mut(&index).unwrap().state = state;

		if state != StreamState::Unlinked && state.is_linked() {
			self.subscription_post(Facility::SourceOutput, EventKind::Change, index);
		}

		if let Some(source_idx) = source_idx {
			drop(self.source_update_status(source_idx));
		}
		Ok(())
	}

	/// Pause or resume a stream.
	pub fn source_output_cork(&mut self, index: u32, cork: bool) -> Result<(), Error> {
		assert_ctl_context!();

		let state = if cork { StreamState::Corked } else { StreamState::Running };
		self.source_output_set_state(index, state)
	}

	//---------------------------------------------------------------------------------------------------- Volume / mute
	/// Set the stream volume.
	///
	/// Without `absolute`, the volume is relative to the device's
	/// reference volume in flat mode.
	pub fn source_output_set_volume(
		&mut self,
		index: u32,
		volume: &ChannelVolumes,
		save: bool,
		absolute: bool,
	) -> Result<(), Error> {
		assert_ctl_context!();

		let (source_idx, spec, map, writable) = {
			let o = self.source_outputs.get(&index).ok_or(Error::NoEntity)?;
			if !o.state.is_linked() {
				return Err(Error::BadState);
			}
			(o.source.ok_or(Error::BadState)?, o.spec, o.map, o.volume_writable)
		};

		if !writable {
			return Err(Error::NotSupported);
		}
		if !volume.is_valid() {
			return Err(Error::Invalid);
		}
		if volume.channels != 1 && !volume.compatible_with(&spec) {
			return Err(Error::Invalid);
		}

		let flat = self.source_flat_volume_enabled(source_idx);

		let v = if !absolute && flat {
			let remapped = {
				let s = &self.sources[&source_idx];
				s.reference_volume.remap(&s.map, &map)
			};
			if volume.compatible_with(&spec) {
				remapped.multiply(volume)
			} else {
				let mut scaled = remapped;
				for value in scaled.as_mut_slice() {
					*value = value.multiply(volume.max());
				}
				scaled
			}
		} else if !volume.compatible_with(&spec) {
			let mut scaled = self.source_outputs[&index].volume;
			scaled.scale(volume.max());
			scaled
		} else {
			*volume
		};

		{
			let o = self.source_outputs.get_mut(&index).unwrap();
			if v == o.volume {
				o.save_volume = o.save_volume || save;
				return Ok(());
			}

			o.volume = v;
			o.save_volume = save;
		}

		if flat {
			// Update the device volume, which recomputes every
			// stream's ratios.
			self.source_set_volume(source_idx, None, true, save);
		} else {
			// Normal mode: only this stream changes.
			let o = self.source_outputs.get_mut(&index).unwrap();
			o.real_ratio = o.volume;
			o.soft_volume = o.real_ratio.multiply(&o.volume_factor);
			let (soft, muted) = (o.soft_volume, o.muted);

			if let Some(q) = self.sources[&source_idx].msgq.clone() {
				q.send(SourceMsg::SetOutputVolume { output: index, soft, muted });
			}
		}

		let o = self.source_outputs.get_mut(&index).unwrap();
		let volume = o.volume;
		o.driver.volume_changed(&volume);
		self.subscription_post(Facility::SourceOutput, EventKind::Change, index);
		Ok(())
	}

	/// Read the stream volume: absolute, or relative to the
	/// device in flat mode.
	pub fn source_output_get_volume(&self, index: u32, absolute: bool) -> Result<ChannelVolumes, Error> {
		assert_ctl_context!();

		let o = self.source_outputs.get(&index).ok_or(Error::NoEntity)?;
		if !o.is_volume_readable() {
			return Err(Error::NotSupported);
		}

		let flat = o.source.map(|s| self.source_flat_volume_enabled(s)).unwrap_or(false);
		Ok(if absolute || !flat { o.volume } else { o.reference_ratio })
	}

	/// Set the stream mute.
	pub fn source_output_set_mute(&mut self, index: u32, mute: bool, save: bool) -> Result<(), Error> {
		assert_ctl_context!();

		let (source_idx, changed) = {
			let o = self.source_outputs.get_mut(&index).ok_or(Error::NoEntity)?;
			if !o.state.is_linked() {
				return Err(Error::BadState);
			}

			if o.muted == mute {
				o.save_muted = o.save_muted || save;
				return Ok(());
			}

			o.muted = mute;
			o.save_muted = save;
			(o.source, true)
		};
		debug_assert!(changed);

		if let Some(source_idx) = source_idx {
			let (soft, muted) = {
				let o = &self.source_outputs[&index];
				(o.soft_volume, o.muted)
			};
			if let Some(q) = self.sources[&source_idx].msgq.clone() {
				q.send(SourceMsg::SetOutputVolume { output: index, soft, muted });
			}
		}

		let o = self.source_outputs.get_mut(&index).unwrap();
		o.driver.mute_changed(mute);
		self.subscription_post(Facility::SourceOutput, EventKind::Change, index);
		Ok(())
	}

	//---------------------------------------------------------------------------------------------------- Latency / rate
	/// Ask the device for a latency; min-reduced against the
	/// other streams on the IO side.
	pub fn source_output_set_requested_latency(&mut self, index: u32, latency: Option<Usec>) -> Result<(), Error> {
		assert_ctl_context!();

		let source_idx = {
			let o = self.source_outputs.get_mut(&index).ok_or(Error::NoEntity)?;
			o.requested_latency = latency;
			o.source
		};

		if let Some(source_idx) = source_idx {
			if let Some(q) = self.sources[&source_idx].msgq.clone() {
				q.send(SourceMsg::SetOutputRequestedLatency { output: index, latency });
			}
		}
		Ok(())
	}

	/// Change a variable-rate stream's rate.
	pub fn source_output_set_rate(&mut self, index: u32, rate: u32) -> Result<(), Error> {
		assert_ctl_context!();

		{
			let o = self.source_outputs.get(&index).ok_or(Error::NoEntity)?;
			if !o.flags.variable_rate {
				return Err(Error::NotSupported);
			}
			if o.spec.rate == rate {
				return Ok(());
			}
		}

		let spec = {
			let o = self.source_outputs.get_mut(&index).unwrap();
			o.spec.rate = rate;
			o.spec
		};
		spec.validate()?;

		self.source_output_update_rate(index)?;
		self.subscription_post(Facility::SourceOutput, EventKind::Change, index);
		Ok(())
	}

	/// Rebuild the resampler against the (possibly changed)
	/// device spec. The IO state makes a round trip through the
	/// device thread when the stream is attached.
	pub fn source_output_update_rate(&mut self, index: u32) -> Result<(), Error> {
		assert_ctl_context!();

		let (source_idx, spec, map, flags, passthrough) = {
			let o = self.source_outputs.get(&index).ok_or(Error::NoEntity)?;
			(o.source, o.spec, o.map, o.flags, o.is_passthrough())
		};
		let Some(source_idx) = source_idx else { return Err(Error::BadState) };

		let (source_spec, source_map) = {
			let s = self.sources.get(&source_idx).ok_or(Error::NoEntity)?;
			(s.spec, s.map)
		};

		let attached = self.source_outputs[&index].io.is_none();

		// Pull the IO state back if the device thread holds it.
		let mut io = if attached {
			let q = self.sources[&source_idx].msgq.clone().ok_or(Error::BadState)?;
			match q.send(SourceMsg::RemoveOutput(index)) {
				SourceReply::Output(Some(io)) => io,
				_ => return Err(Error::BadState),
			}
		} else {
			self.source_outputs.get_mut(&index).unwrap().io.take().unwrap()
		};

		// A resampler still matching both domains is kept.
		let keep = io
			.resampler
			.as_ref()
			.map(|r| *r.input_spec() == source_spec && *r.output_spec() == spec)
			.unwrap_or(false);

		if !keep {
			let resampler = if passthrough {
				None
			} else {
				make_resampler(&source_spec, &source_map, &spec, &map, &flags)?
			};

			let method = resampler
				.as_ref()
				.map(|r| r.method())
				.unwrap_or(ResampleMethod::Copy);

			io.resampler = resampler;
			io.spec = spec;
			io.map = map;
			io.delay_queue = MemBlockQueue::new(DELAY_QUEUE_MAXLENGTH, 0);

			self.source_outputs.get_mut(&index).unwrap().actual_resample_method = method;
			debug2!("updated resampler for source output {index}");
		}

		if attached {
			let q = self.sources[&source_idx].msgq.clone().unwrap();
			q.send(SourceMsg::AddOutput(io));
		} else {
			self.source_outputs.get_mut(&index).unwrap().io = Some(io);
		}

		Ok(())
	}

	//---------------------------------------------------------------------------------------------------- Moving
	/// May this stream (ever) land on `dest`?
	///
	/// `false` for its current source, immovable streams, filter
	/// cycles, full destinations and implementor vetoes.
	pub fn source_output_may_move_to(&mut self, index: u32, dest: u32) -> bool {
		assert_ctl_context!();

		let Some(o) = self.source_outputs.get(&index) else { return false };

		if o.source == Some(dest) {
			return false;
		}
		if !o.may_move() {
			return false;
		}

		// A filter must never read from a source it (transitively)
		// feeds.
		let mut current = Some(dest);
		for _ in 0..SHARE_WALK_LIMIT {
			let Some(s) = current.and_then(|c| self.sources.get(&c)) else { break };
			let Some(master) = s.output_from_master else { break };

			if master == index {
				debug2!("cannot connect output {index} to {dest}: cycle");
				return false;
			}

			current = self.source_outputs.get(&master).and_then(|o| o.source);
		}

		if self.sources.get(&dest).map(|s| s.outputs.len()).unwrap_or(usize::MAX)
			>= MAX_STREAMS_PER_DEVICE
		{
			warn2!("refusing move: too many outputs per source");
			return false;
		}

		let dest_name = match self.sources.get(&dest) {
			Some(s) => s.name.clone(),
			None => return false,
		};
		self.source_outputs
			.get_mut(&index)
			.map(|o| o.driver.may_move_to(&dest_name))
			.unwrap_or(false)
	}

	/// Phase one of a move: detach from the current source.
	pub fn source_output_start_move(&mut self, index: u32) -> Result<(), Error> {
		assert_ctl_context!();

		let (source_idx, was_corked, was_passthrough) = {
			let o = self.source_outputs.get(&index).ok_or(Error::NoEntity)?;
			if !o.state.is_linked() {
				return Err(Error::BadState);
			}
			if !o.may_move() {
				return Err(Error::NotSupported);
			}
			(
				o.source.ok_or(Error::BadState)?,
				o.state == StreamState::Corked,
				o.is_passthrough(),
			)
		};

		let mut hooks = std::mem::take(&mut self.hooks.source_output_move_start);
		let verdict = fire_veto(&mut hooks, &self.source_outputs[&index]);
		self.hooks.source_output_move_start = hooks;
		if verdict == HookResult::Cancel {
			return Err(Error::NotSupported);
		}

		{
			let s = self.sources.get_mut(&source_idx).unwrap();
			s.outputs.remove(&index);
			if was_corked {
				s.n_corked = s.n_corked.saturating_sub(1);
			}
		}

		if was_passthrough {
			self.source_leave_passthrough(source_idx);
		}

		if self.source_flat_volume_enabled(source_idx) {
			self.source_set_volume(source_idx, None, false, false);
		}

		// The IO state comes home for the transit.
		let q = self.sources[&source_idx].msgq.clone().ok_or(Error::BadState)?;
		match q.send(SourceMsg::RemoveOutput(index)) {
			SourceReply::Output(Some(io)) => {
				self.source_outputs.get_mut(&index).unwrap().io = Some(io);
			},
			_ => return Err(Error::BadState),
		}

		if let Some(root) = self.source_shared_root(source_idx) {
			self.source_sync_shared_volume(root);
		}

		drop(self.source_update_status(source_idx));
		self.source_outputs.get_mut(&index).unwrap().source = None;
		Ok(())
	}

	/// Update every volume along the sharing tree after this
	/// stream arrived on `dest` (spec §4.3 recursion).
	fn update_volume_due_to_moving(&mut self, index: u32, dest: u32) {
		let Some(o) = self.source_outputs.get(&index) else { return };
		let Some(source_idx) = o.source else { return };

		let shares = self
			.sharing_destination_of(index)
			.is_some();

		if shares {
			let origin = self.source_outputs[&index].destination_source.unwrap();
			let Some(root) = self.source_shared_root(source_idx) else { return };

			if self.source_flat_volume_enabled(source_idx) {
				// volume / reference_ratio fixed up by set_volume
				// at the end of the recursion; real_ratio stays
				// 0 dB, soft stays the factor.
				debug_assert!(self.source_outputs[&index].real_ratio.is_norm());
			} else {
				let o = self.source_outputs.get_mut(&index).unwrap();
				let old_volume = o.volume;
				o.volume = ChannelVolumes::norm(o.volume.channels);
				o.reference_ratio = ChannelVolumes::norm(o.reference_ratio.channels);

				if o.volume != old_volume {
					let volume = o.volume;
					o.driver.volume_changed(&volume);
					self.subscription_post(Facility::SourceOutput, EventKind::Change, index);
				}
			}

			// The origin filter inherits the root's volumes.
			let (root_ref, root_real, root_map) = {
				let r = &self.sources[&root];
				(r.reference_volume, r.real_volume, r.map)
			};
			{
				let origin_src = self.sources.get_mut(&origin).unwrap();
				let old = origin_src.reference_volume;
				origin_src.reference_volume = root_ref.remap(&root_map, &origin_src.map);
				origin_src.real_volume = root_real.remap(&root_map, &origin_src.map);

				if old != origin_src.reference_volume {
					self.subscription_post(Facility::Source, EventKind::Change, origin);
				}
			}

			// Recurse into the filter's own streams.
			let outputs: Vec<u32> = self.sources[&origin].outputs.iter().copied().collect();
			for output in outputs {
				self.update_volume_due_to_moving(output, dest);
			}
		} else {
			let flat = self.source_flat_volume_enabled(source_idx);
			let o = self.source_outputs.get_mut(&index).unwrap();
			let old_volume = o.volume;

			if flat {
				// volume := reference_ratio * dest.reference
				let (reference, source_map) = {
					let s = &self.sources[&source_idx];
					(s.reference_volume, s.map)
				};
				let o = self.source_outputs.get_mut(&index).unwrap();
				o.volume = reference.remap(&source_map, &o.map).multiply(&o.reference_ratio);
			} else {
				o.volume = o.reference_ratio;
				o.real_ratio = o.reference_ratio;
				o.soft_volume = o.real_ratio.multiply(&o.volume_factor);
			}

			let o = self.source_outputs.get_mut(&index).unwrap();
			if o.volume != old_volume {
				let volume = o.volume;
				o.driver.volume_changed(&volume);
				self.subscription_post(Facility::SourceOutput, EventKind::Change, index);
			}
		}

		// Recursion bottomed out on the moved stream itself:
		// let set_volume finish the ratios.
		if self.source_outputs.get(&index).map(|o| o.source) == Some(Some(dest))
			&& self.source_flat_volume_enabled(dest)
		{
			let save = self.source_outputs[&index].save_volume;
			self.source_set_volume(dest, None, false, save);
		}
	}

	fn sharing_destination_of(&self, index: u32) -> Option<u32> {
		let dest = self.source_outputs.get(&index)?.destination_source?;
		self.sources
			.get(&dest)
			.and_then(|s| s.flags.share_volume_with_master.then_some(dest))
	}

	/// Phase two of a move: attach to `dest`.
	pub fn source_output_finish_move(&mut self, index: u32, dest: u32, save: bool) -> Result<(), Error> {
		assert_ctl_context!();

		{
			let o = self.source_outputs.get(&index).ok_or(Error::NoEntity)?;
			if !o.state.is_linked() {
				return Err(Error::BadState);
			}
			debug_assert!(o.source.is_none());
		}

		if !self.source_output_may_move_to(index, dest) {
			return Err(Error::NotSupported);
		}

		let (spec, is_passthrough, format) = {
			let o = &self.source_outputs[&index];
			(o.spec, o.is_passthrough(), o.format)
		};

		// Passthrough needs the destination to advertise the format.
		if is_passthrough {
			let formats = self.sources[&dest].driver.get_formats();
			if negotiate(&[format], &formats).is_err() {
				debug2!("new source does not support stream format, sending format-lost");
				self.source_outputs.get_mut(&index).unwrap().driver.send_event("format-lost");
				return Err(Error::NotSupported);
			}
		}

		// Glitch-avoidance rate change on the destination.
		let variable_rate = self.source_outputs[&index].flags.variable_rate;
		if !variable_rate && spec != self.sources[&dest].spec {
			info2!("trying to change sample rate of source {dest}");
			if self.source_update_rate(dest, spec.rate, is_passthrough) {
				info2!("rate changed to {} Hz", self.sources[&dest].spec.rate);
			}
		}

		let dest_name = self.sources[&dest].name.clone();
		{
			let o = self.source_outputs.get_mut(&index).unwrap();
			o.driver.moving(Some(&dest_name));
			o.source = Some(dest);
			o.save_source = save;
		}

		let was_corked = self.source_outputs[&index].state == StreamState::Corked;
		{
			let s = self.sources.get_mut(&dest).unwrap();
			s.outputs.insert(index);
			if was_corked {
				s.n_corked += 1;
			}
		}

		// The device-side factor moves into the new layout.
		{
			let dest_map = self.sources[&dest].map;
			let o = self.source_outputs.get_mut(&index).unwrap();
			let from = if o.volume_factor_source.channels == o.map.channels {
				o.map
			} else {
				ChannelMap::default_for(o.volume_factor_source.channels).unwrap_or(o.map)
			};
			o.volume_factor_source = o.volume_factor_source.remap(&from, &dest_map);
			if let Some(io) = &mut o.io {
				io.volume_factor_source = o.volume_factor_source;
			}
		}

		// New resampler if the destination runs another spec;
		// this also ships the IO state to the destination thread.
		self.source_output_update_rate(index)?;

		drop(self.source_update_status(dest));
		self.update_volume_due_to_moving(index, dest);

		if is_passthrough {
			self.source_enter_passthrough(dest);
		}

		if let Some(root) = self.source_shared_root(dest) {
			self.source_sync_shared_volume(root);
		}

		let mut hooks = std::mem::take(&mut self.hooks.source_output_move_finish);
		for hook in &mut hooks {
			hook(&self.source_outputs[&index]);
		}
		self.hooks.source_output_move_finish = hooks;

		info2!("successfully moved source output {index} to {dest_name}");
		self.subscription_post(Facility::SourceOutput, EventKind::Change, index);
		Ok(())
	}

	/// The move fell through: give the rescue hooks a chance,
	/// then tell the implementor and kill the stream.
	pub fn source_output_fail_move(&mut self, index: u32) {
		assert_ctl_context!();

		let Some(o) = self.source_outputs.get(&index) else { return };
		if !o.state.is_linked() {
			return;
		}

		let mut hooks = std::mem::take(&mut self.hooks.source_output_move_fail);
		let mut rescued = false;
		for hook in &mut hooks {
			if let Some(dest) = hook(&self.source_outputs[&index]) {
				if self.source_output_finish_move(index, dest, false).is_ok() {
					rescued = true;
					break;
				}
			}
		}
		self.hooks.source_output_move_fail = hooks;

		if rescued {
			return;
		}

		self.source_outputs.get_mut(&index).unwrap().driver.moving(None);
		self.source_output_kill(index);
	}

	/// Move a stream in one call.
	pub fn source_output_move_to(&mut self, index: u32, dest: u32, save: bool) -> Result<(), Error> {
		assert_ctl_context!();

		{
			let o = self.source_outputs.get(&index).ok_or(Error::NoEntity)?;
			if o.source == Some(dest) {
				return Ok(());
			}
		}

		if !self.source_output_may_move_to(index, dest) {
			return Err(Error::NotSupported);
		}

		self.source_output_start_move(index)?;

		if let Err(e) = self.source_output_finish_move(index, dest, save) {
			self.source_output_fail_move(index);
			return Err(e);
		}

		Ok(())
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::channel::Volume;
	use crate::tests::{attach_output,flat_source,output_with_volume,shared_source,surround_flat_source,TestCore};
	use pretty_assertions::assert_eq;

	fn v2(l: f64, r: f64) -> ChannelVolumes {
		let mut v = ChannelVolumes::norm(2);
		v.values[0] = Volume((l * f64::from(Volume::NORM.0)) as u32);
		v.values[1] = Volume((r * f64::from(Volume::NORM.0)) as u32);
		v
	}

	#[test]
	fn move_preserves_reference_ratio() {
		// Spec invariant: for a non-sharing stream with flat volume
		// on both devices, moving keeps reference_ratio and makes
		// volume = reference_ratio * dest.reference_volume.
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let b = flat_source(&mut t, "b");

		let x = output_with_volume(&mut t, a, v2(0.5, 0.25));
		let ratio_before = t.core.source_output(x).unwrap().reference_ratio;

		t.core.source_output_move_to(x, b, false).unwrap();

		let o = t.core.source_output(x).unwrap();
		assert_eq!(o.source, Some(b));
		assert_eq!(o.reference_ratio, ratio_before);

		let dest_reference = t.core.source(b).unwrap().reference_volume;
		for c in 0..2 {
			assert_eq!(
				o.volume.values[c],
				dest_reference.values[c].multiply(ratio_before.values[c]),
			);
		}

		// The implementor heard about the move.
		let moves = t.output_handles[&x].lock().unwrap().moves.clone();
		assert_eq!(moves, vec![Some("b".to_owned())]);
	}

	#[test]
	fn move_to_same_source_is_a_noop_but_not_movable() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let x = attach_output(&mut t, a);

		assert!(!t.core.source_output_may_move_to(x, a));
		assert!(t.core.source_output_move_to(x, a, false).is_ok());
		assert_eq!(t.core.source_output(x).unwrap().source, Some(a));
	}

	#[test]
	fn dont_move_is_honored() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let b = flat_source(&mut t, "b");

		let x = {
			let mut builder = t.output_builder(a);
			builder.flags.dont_move = true;
			let x = t.core.source_output_new(builder).unwrap();
			t.core.source_output_put(x).unwrap();
			x
		};

		assert_eq!(t.core.source_output_move_to(x, b, false), Err(Error::NotSupported));
	}

	#[test]
	fn filter_cycle_is_rejected() {
		// The filter's master link must not move onto the filter's
		// own source.
		let mut t = TestCore::new();
		let root = flat_source(&mut t, "root");
		let filter = shared_source(&mut t, "filter", root);

		let master_link = t.core.source(filter).unwrap().output_from_master.unwrap();
		assert!(!t.core.source_output_may_move_to(master_link, filter));
	}

	#[test]
	fn move_with_channel_map_change_rebuilds_resampler() {
		// Spec scenario S5: a stream on a stereo device moves to a
		// 5.1 device; the device-side factor is remapped and the
		// resampler replaced.
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let b = surround_flat_source(&mut t, "b");

		let x = {
			let mut builder = t.output_builder(a);
			builder.volume_factor_source = Some(v2(0.5, 0.5));
			let x = t.core.source_output_new(builder).unwrap();
			t.core.source_output_put(x).unwrap();
			x
		};
		assert_eq!(t.core.source_output(x).unwrap().actual_resample_method, ResampleMethod::Copy);

		let ratio_before = t.core.source_output(x).unwrap().reference_ratio;
		t.core.source_output_move_to(x, b, false).unwrap();

		let o = t.core.source_output(x).unwrap();
		assert_eq!(o.volume_factor_source.channels, 6);
		assert_eq!(o.actual_resample_method, ResampleMethod::Trivial);
		assert_eq!(o.reference_ratio, ratio_before);
	}

	#[test]
	fn failed_move_kills_unless_rescued() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let x = attach_output(&mut t, a);

		t.core.source_output_start_move(x).unwrap();

		// No rescue hook: the stream dies.
		t.core.source_output_fail_move(x);
		assert!(t.core.source_output(x).is_none());
		let state = t.output_handles[&x].lock().unwrap();
		assert!(state.killed);
		assert_eq!(state.moves.last(), Some(&None));
	}

	#[test]
	fn failed_move_rescue_hook_redirects() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let b = flat_source(&mut t, "b");
		let x = attach_output(&mut t, a);

		t.core.hooks.source_output_move_fail.push(Box::new(move |_| Some(b)));

		t.core.source_output_start_move(x).unwrap();
		t.core.source_output_fail_move(x);

		let o = t.core.source_output(x).unwrap();
		assert_eq!(o.source, Some(b));
	}

	#[test]
	fn passthrough_is_exclusive() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let _x = attach_output(&mut t, a);

		let mut builder = t.output_builder(a);
		builder.flags.passthrough = true;
		assert_eq!(t.core.source_output_new(builder), Err(Error::Busy));
	}

	#[test]
	fn volume_on_stream_updates_flat_device() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let x = output_with_volume(&mut t, a, v2(0.5, 0.5));

		t.core.source_output_set_volume(x, &v2(1.0, 1.0), false, true).unwrap();

		// The device follows the loudest stream.
		assert_eq!(t.core.source(a).unwrap().real_volume, v2(1.0, 1.0));
	}

	#[test]
	fn variable_rate_stream_changes_rate() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");

		let x = {
			let mut builder = t.output_builder(a);
			builder.flags.variable_rate = true;
			let x = t.core.source_output_new(builder).unwrap();
			t.core.source_output_put(x).unwrap();
			x
		};

		t.core.source_output_set_rate(x, 48_000).unwrap();
		let o = t.core.source_output(x).unwrap();
		assert_eq!(o.spec.rate, 48_000);
		assert_eq!(o.actual_resample_method, ResampleMethod::Trivial);
	}
}
