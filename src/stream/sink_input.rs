//! Sink inputs: the per-stream producers attached to a sink.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::{ChannelMap,ChannelVolumes};
use crate::core::{Core,EventKind,Facility};
use crate::device::msg::{SinkMsg,SinkReply};
use crate::device::sink::io::InputIo;
use crate::device::{MAX_STREAMS_PER_DEVICE,SHARE_WALK_LIMIT};
use crate::error::Error;
use crate::format::{negotiate,FormatInfo};
use crate::hook::{fire_new,fire_veto,HookResult};
use crate::macros::{assert_ctl_context,debug2,info2,warn2};
use crate::memblockq::MemBlockQueue;
use crate::resampler::{ResampleMethod,Resampler,TrivialResampler};
use crate::sample::{SampleFormat,SampleSpec,Usec};
use crate::stream::{SinkInputDriver,SinkInputIoDriver,StreamFlags,StreamState};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool,Ordering};
use std::sync::Arc;

//---------------------------------------------------------------------------------------------------- Constants
/// Upper bound of the per-stream render queue.
const RENDER_QUEUE_MAXLENGTH: usize = 32 * 1024 * 1024;

//---------------------------------------------------------------------------------------------------- SinkInput
/// A playback stream.
pub struct SinkInput {
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

	/// The sink this stream plays to; `None` mid-move.
	pub sink: Option<u32>,
	/// The filter sink this stream feeds, making it the filter's
	/// master link.
	pub origin_sink: Option<u32>,

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
	/// Internal gain: the product of the named factor layers.
	pub volume_factor: ChannelVolumes,
	/// The named factor layers multiplying into `volume_factor`.
	pub(crate) volume_factor_items: BTreeMap<String, ChannelVolumes>,
	/// Extra gain carried on the device side (device channels).
	pub volume_factor_sink: ChannelVolumes,
	/// `volume / sink.reference_volume`.
	pub reference_ratio: ChannelVolumes,
	/// `volume / sink.real_volume`.
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
	pub save_sink: bool,

	/// What the creator asked the resampler to be.
	pub requested_resample_method: ResampleMethod,
	/// What it actually is.
	pub actual_resample_method: ResampleMethod,
	/// Latency this stream wants from the device.
	pub requested_latency: Option<Usec>,

	/// Previous member of the start-together chain.
	pub sync_prev: Option<u32>,
	/// Next member of the start-together chain.
	pub sync_next: Option<u32>,

	/// Shared "ran dry" flag, written by the IO thread.
	pub(crate) drained: Arc<AtomicBool>,

	pub(crate) driver: Box<dyn SinkInputDriver>,
	/// IO-side state, parked here while not attached.
	pub(crate) io: Option<Box<InputIo>>,
}

impl SinkInput {
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

	/// May this stream move at all? Sync-group members may not.
	pub fn may_move(&self) -> bool {
		!self.flags.dont_move && self.sync_prev.is_none() && self.sync_next.is_none()
	}

	/// Is the user allowed to read a volume off this stream?
	pub fn is_volume_readable(&self) -> bool {
		!self.is_passthrough()
	}

	/// Has the IO side run out of implementor data?
	pub fn is_drained(&self) -> bool {
		self.drained.load(Ordering::Acquire)
	}
}

impl std::fmt::Debug for SinkInput {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SinkInput")
			.field("index", &self.index)
			.field("sink", &self.sink)
			.field("state", &self.state)
			.field("spec", &self.spec)
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- SinkInputBuilder
/// The `new_data` candidate for a sink input.
pub struct SinkInputBuilder {
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
	/// The sink to attach to.
	pub sink: Option<u32>,
	/// Filter sink this stream will feed.
	pub origin_sink: Option<u32>,
	/// Behavior toggles.
	pub flags: StreamFlags,
	/// Requested formats, in preference order.
	pub formats: Vec<FormatInfo>,
	/// Requested sample spec.
	pub spec: Option<SampleSpec>,
	/// Requested channel map.
	pub map: Option<ChannelMap>,
	/// Initial volume.
	pub volume: Option<ChannelVolumes>,
	/// Take `volume` as absolute even in flat mode.
	pub volume_is_absolute: bool,
	/// Named internal gain layers.
	pub volume_factor_items: BTreeMap<String, ChannelVolumes>,
	/// Device-side gain (device channels).
	pub volume_factor_sink: Option<ChannelVolumes>,
	/// Initial mute.
	pub muted: bool,
	/// Resampler choice.
	pub resample_method: ResampleMethod,
	/// Join this stream's start-together chain.
	pub sync_with: Option<u32>,
	/// Persistence hints.
	pub save_volume: bool,
	/// Persistence hints.
	pub save_muted: bool,
	/// Persistence hints.
	pub save_sink: bool,

	/// Control-side driver.
	pub driver: Box<dyn SinkInputDriver>,
	/// IO-side driver.
	pub io_driver: Box<dyn SinkInputIoDriver>,
}

impl SinkInputBuilder {
	/// A candidate with defaults.
	pub fn new(
		name: &str,
		sink: u32,
		driver: Box<dyn SinkInputDriver>,
		io_driver: Box<dyn SinkInputIoDriver>,
	) -> Self {
		Self {
			name: name.to_owned(),
			driver_name: String::new(),
			props: BTreeMap::new(),
			module: None,
			client: None,
			sink: Some(sink),
			origin_sink: None,
			flags: StreamFlags::default(),
			formats: Vec::new(),
			spec: None,
			map: None,
			volume: None,
			volume_is_absolute: false,
			volume_factor_items: BTreeMap::new(),
			volume_factor_sink: None,
			muted: false,
			resample_method: ResampleMethod::Auto,
			sync_with: None,
			save_volume: false,
			save_muted: false,
			save_sink: false,
			driver,
			io_driver,
		}
	}
}

impl std::fmt::Debug for SinkInputBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SinkInputBuilder")
			.field("name", &self.name)
			.field("sink", &self.sink)
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- Resampler helper
fn make_resampler(
	spec: &SampleSpec,
	map: &ChannelMap,
	sink_spec: &SampleSpec,
	sink_map: &ChannelMap,
	flags: &StreamFlags,
) -> Result<Option<Box<dyn Resampler>>, Error> {
	let needed = flags.variable_rate || spec != sink_spec || !map.equal(sink_map);
	if !needed {
		return Ok(None);
	}

	if spec.format != SampleFormat::F32Le || sink_spec.format != SampleFormat::F32Le {
		warn2!("unsupported resampling operation ({} -> {})", spec, sink_spec);
		return Err(Error::NotSupported);
	}

	// Playback side: stream domain in, device domain out.
	Ok(Some(Box::new(TrivialResampler::new(
		*spec,
		*map,
		*sink_spec,
		*sink_map,
	))))
}

/// The product over every named factor layer.
fn factor_product(items: &BTreeMap<String, ChannelVolumes>, channels: u8) -> ChannelVolumes {
	let mut product = ChannelVolumes::norm(channels);
	for v in items.values() {
		product = product.multiply(v);
	}
	product
}

//---------------------------------------------------------------------------------------------------- Core: lifecycle
impl Core {
	/// Create a sink input (§3 lifecycle): negotiate, fix up,
	/// build the resampler, park the IO state.
	pub fn sink_input_new(&mut self, mut builder: SinkInputBuilder) -> Result<u32, Error> {
		assert_ctl_context!();

		let mut volume_writable = true;
		if let Some(origin) = builder.origin_sink {
			if self.sinks.get(&origin).map(|s| s.shares_volume()).unwrap_or(false) {
				volume_writable = false;
			}
		}

		let mut hooks = std::mem::take(&mut self.hooks.sink_input_new);
		let verdict = fire_new(&mut hooks, &mut builder);
		self.hooks.sink_input_new = hooks;
		if verdict == HookResult::Cancel {
			return Err(Error::NotSupported);
		}

		let sink_idx = builder.sink.ok_or(Error::NoEntity)?;
		let (sink_spec, sink_map, sink_state, sink_formats, sink_inputs) = {
			let s = self.sinks.get(&sink_idx).ok_or(Error::NoEntity)?;
			(s.spec, s.map, s.state, s.driver.get_formats(), s.inputs.len())
		};

		if !sink_state.is_linked() {
			return Err(Error::BadState);
		}

		// Sync chains must stay on one device, and their members
		// must agree on the spec.
		if let Some(other) = builder.sync_with {
			let other = self.sink_inputs.get(&other).ok_or(Error::NoEntity)?;
			if other.sink != Some(sink_idx) {
				return Err(Error::Invalid);
			}
			if let Some(spec) = builder.spec {
				if spec != other.spec {
					return Err(Error::Invalid);
				}
			}
		}

		let mut spec = builder.spec.unwrap_or(sink_spec);
		let requested = if builder.formats.is_empty() {
			vec![FormatInfo {
				encoding: crate::format::Encoding::Pcm,
				rate: Some(spec.rate),
				channels: Some(spec.channels),
			}]
		} else {
			builder.formats.clone()
		};
		let format = negotiate(&requested, &sink_formats)?;

		spec = format.to_sample_spec(&spec);
		spec.validate()?;

		let mut map = match builder.map {
			Some(map) if map.compatible_with(&spec) => map,
			Some(_) => return Err(Error::Invalid),
			None => {
				if sink_map.channels == spec.channels {
					sink_map
				} else {
					ChannelMap::default_for(spec.channels).ok_or(Error::Invalid)?
				}
			},
		};

		let is_passthrough = format.encoding.is_passthrough() || builder.flags.passthrough;

		if is_passthrough {
			if sink_inputs > 0 {
				return Err(Error::Busy);
			}
			builder.volume = Some(ChannelVolumes::norm(spec.channels));
			builder.volume_is_absolute = true;
			builder.save_volume = false;
		}

		if builder.flags.fix_format {
			spec.format = sink_spec.format;
		}
		if builder.flags.fix_rate {
			spec.rate = sink_spec.rate;
		}
		let original_map = map;
		if builder.flags.fix_channels {
			spec.channels = sink_spec.channels;
			map = sink_map;
		}

		if !builder.flags.variable_rate && spec != sink_spec {
			info2!("trying to change sample rate of sink {sink_idx}");
			if self.sink_update_rate(sink_idx, spec.rate, is_passthrough) {
				info2!("rate changed to {} Hz", self.sinks[&sink_idx].spec.rate);
			}
		}

		let sink_spec = self.sinks[&sink_idx].spec;
		if is_passthrough && spec != sink_spec {
			debug2!("could not update sink sample spec to match passthrough stream");
			return Err(Error::NotSupported);
		}

		let mut hooks = std::mem::take(&mut self.hooks.sink_input_fixate);
		let verdict = fire_new(&mut hooks, &mut builder);
		self.hooks.sink_input_fixate = hooks;
		if verdict == HookResult::Cancel {
			return Err(Error::NotSupported);
		}

		if builder.flags.no_create_on_suspend
			&& self.sinks[&sink_idx].state == crate::device::DeviceState::Suspended
		{
			warn2!("failed to create sink input: sink is suspended");
			return Err(Error::BadState);
		}

		if self.sinks[&sink_idx].inputs.len() >= MAX_STREAMS_PER_DEVICE {
			warn2!("failed to create sink input: too many inputs per sink");
			return Err(Error::TooLarge);
		}

		let resampler = if is_passthrough {
			None
		} else {
			make_resampler(&spec, &map, &sink_spec, &self.sinks[&sink_idx].map, &builder.flags)?
		};

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

		for factor in builder.volume_factor_items.values() {
			if !factor.compatible_with(&spec) {
				return Err(Error::Invalid);
			}
		}
		let volume_factor = factor_product(&builder.volume_factor_items, spec.channels);

		let volume_factor_sink = builder
			.volume_factor_sink
			.unwrap_or_else(|| ChannelVolumes::norm(sink_spec.channels));
		if !volume_factor_sink.compatible_with(&sink_spec) {
			return Err(Error::Invalid);
		}

		if !builder.volume_is_absolute && self.sink_flat_volume_enabled(sink_idx) {
			let remapped = self.sinks[&sink_idx]
				.reference_volume
				.remap(&self.sinks[&sink_idx].map, &map);
			volume = volume.multiply(&remapped);
		}

		let index = self.alloc_index();
		let actual_resample_method = resampler
			.as_ref()
			.map(|r| r.method())
			.unwrap_or(ResampleMethod::Copy);

		let drained = Arc::new(AtomicBool::new(false));

		let io = Box::new(InputIo {
			index,
			state: StreamState::Init,
			spec,
			map,
			soft_volume: ChannelVolumes::norm(spec.channels),
			muted: builder.muted,
			volume_factor_sink,
			render_queue: MemBlockQueue::new(RENDER_QUEUE_MAXLENGTH, 0),
			resampler,
			driver: builder.io_driver,
			requested_latency: None,
			rewrite: crate::device::sink::io::Rewrite::None,
			rewrite_flush: false,
			dont_rewind_render: false,
			playing_for: 0,
			underrun_for: u64::MAX,
			underrun_for_sink: 0,
			drained: Arc::clone(&drained),
		});

		let input = SinkInput {
			index,
			name: builder.name,
			driver_name: builder.driver_name,
			props: builder.props,
			module: builder.module,
			client: builder.client,
			sink: Some(sink_idx),
			origin_sink: builder.origin_sink,
			state: StreamState::Init,
			flags: builder.flags,
			format,
			spec,
			map,
			volume,
			volume_writable,
			volume_factor,
			volume_factor_items: builder.volume_factor_items,
			volume_factor_sink,
			reference_ratio: volume,
			real_ratio: ChannelVolumes::norm(spec.channels),
			soft_volume: ChannelVolumes::norm(spec.channels),
			muted: builder.muted,
			save_volume: builder.save_volume,
			save_muted: builder.save_muted,
			save_sink: builder.save_sink,
			requested_resample_method: builder.resample_method,
			actual_resample_method,
			requested_latency: None,
			sync_prev: None,
			sync_next: None,
			drained,
			driver: builder.driver,
			io: Some(io),
		};

		info2!(
			"created input {index} \"{}\" on {} with sample spec {}",
			input.name, sink_idx, input.spec,
		);

		self.sink_inputs.insert(index, input);
		self.sinks.get_mut(&sink_idx).unwrap().inputs.insert(index);

		// Chain into the sync group at the tail.
		if let Some(other) = builder.sync_with {
			let mut tail = other;
			for _ in 0..MAX_STREAMS_PER_DEVICE {
				match self.sink_inputs.get(&tail).and_then(|i| i.sync_next) {
					Some(next) => tail = next,
					None => break,
				}
			}
			self.sink_inputs.get_mut(&tail).unwrap().sync_next = Some(index);
			self.sink_inputs.get_mut(&index).unwrap().sync_prev = Some(tail);
		}

		if let Some(origin) = builder.origin_sink {
			if let Some(filter) = self.sinks.get_mut(&origin) {
				filter.input_to_master = Some(index);
			}
		}

		Ok(index)
	}

	/// Publish a sink input.
	pub fn sink_input_put(&mut self, index: u32) -> Result<(), Error> {
		assert_ctl_context!();

		let (sink_idx, start_corked) = {
			let i = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?;
			debug_assert_eq!(i.state, StreamState::Init);
			(i.sink.ok_or(Error::BadState)?, i.flags.start_corked)
		};

		let state = if start_corked { StreamState::Corked } else { StreamState::Running };
		self.sink_inputs.get_mut(&index).unwrap().state = state;
		if state == StreamState::Corked {
			self.sinks.get_mut(&sink_idx).unwrap().n_corked += 1;
		}

		if self.sink_flat_volume_enabled(sink_idx) {
			let save = self.sink_inputs[&index].save_volume;
			self.sink_set_volume(sink_idx, None, false, save);
		} else {
			let i = self.sink_inputs.get_mut(&index).unwrap();

			if self
				.sinks
				.get(&i.origin_sink.unwrap_or(u32::MAX))
				.map(|s| s.shares_volume())
				.unwrap_or(false)
			{
				debug_assert!(i.volume.is_norm());
				debug_assert!(i.reference_ratio.is_norm());
			}

			i.real_ratio = i.volume;
			i.soft_volume = i.real_ratio.multiply(&i.volume_factor);
		}

		if self.sink_inputs[&index].is_passthrough() {
			self.sink_enter_passthrough(sink_idx);
		}

		{
			let io = {
				let i = self.sink_inputs.get_mut(&index).unwrap();
				let mut io = i.io.take().ok_or(Error::BadState)?;
				io.soft_volume = i.soft_volume;
				io.muted = i.muted;
				io.state = i.state;
				io
			};

			let q = self.sinks[&sink_idx].msgq.clone().ok_or(Error::BadState)?;
			q.send(SinkMsg::AddInput(io));
		}

		// INVARIANT: membership changes and the shared volume reach
		// the IO thread in this order, so its view stays consistent.
		if let Some(root) = self.sink_shared_root(sink_idx) {
			self.sink_sync_shared_volume(root);
		}

		self.subscription_post(Facility::SinkInput, EventKind::New, index);
		drop(self.sink_update_status(sink_idx));
		Ok(())
	}

	/// Kill a stream: the implementor tears down, then the
	/// stream unlinks.
	pub fn sink_input_kill(&mut self, index: u32) {
		assert_ctl_context!();

		if let Some(i) = self.sink_inputs.get_mut(&index) {
			i.driver.kill();
		}
		self.sink_input_unlink(index);
	}

	/// Detach and forget a stream.
	pub fn sink_input_unlink(&mut self, index: u32) {
		assert_ctl_context!();

		let Some(i) = self.sink_inputs.get(&index) else { return };
		let linked = i.state.is_linked();
		let sink_idx = i.sink;
		let was_corked = i.state == StreamState::Corked;
		let was_passthrough = i.is_passthrough();
		let origin = i.origin_sink;
		let (sync_prev, sync_next) = (i.sync_prev, i.sync_next);

		// Splice out of the sync chain.
		if let Some(prev) = sync_prev {
			if let Some(p) = self.sink_inputs.get_mut(&prev) {
				p.sync_next = sync_next;
			}
		}
		if let Some(next) = sync_next {
			if let Some(n) = self.sink_inputs.get_mut(&next) {
				n.sync_prev = sync_prev;
			}
		}

		if let Some(sink_idx) = sink_idx {
			let s = self.sinks.get_mut(&sink_idx).unwrap();
			s.inputs.remove(&index);
			if was_corked {
				s.n_corked = s.n_corked.saturating_sub(1);
			}
		}

		self.sink_inputs.get_mut(&index).unwrap().state = StreamState::Unlinked;

		if linked {
			if let Some(sink_idx) = sink_idx {
				if was_passthrough {
					self.sink_leave_passthrough(sink_idx);
				}

				if self.sink_flat_volume_enabled(sink_idx) {
					self.sink_set_volume(sink_idx, None, false, false);
				}

				if let Some(q) = self.sinks[&sink_idx].msgq.clone() {
					q.send(SinkMsg::RemoveInput(index));
				}

				if let Some(root) = self.sink_shared_root(sink_idx) {
					self.sink_sync_shared_volume(root);
				}

				drop(self.sink_update_status(sink_idx));
			}
		}

		if let Some(origin) = origin {
			if let Some(filter) = self.sinks.get_mut(&origin) {
				if filter.input_to_master == Some(index) {
					filter.input_to_master = None;
				}
			}
		}

		self.sink_inputs.remove(&index);

		if linked {
			self.subscription_post(Facility::SinkInput, EventKind::Remove, index);
		}

		debug2!("unlinked sink input {index}");
	}

	//---------------------------------------------------------------------------------------------------- State
	fn sink_input_set_state(&mut self, index: u32, state: StreamState) -> Result<(), Error> {
		let (old_state, sink_idx) = {
			let i = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?;
			(i.state, i.sink)
		};

		if old_state == state {
			return Ok(());
		}

		if let Some(sink_idx) = sink_idx {
			if old_state == StreamState::Corked && state == StreamState::Running {
				let (spec, sink_spec, used) = {
					let i = &self.sink_inputs[&index];
					let s = &self.sinks[&sink_idx];
					(i.spec, s.spec, s.used_by())
				};
				if used == 0 && spec != sink_spec {
					let passthrough = self.sink_inputs[&index].is_passthrough();
					self.sink_update_rate(sink_idx, spec.rate, passthrough);
				}
			}

			if let Some(q) = self.sinks[&sink_idx].msgq.clone() {
				q.send(SinkMsg::SetInputState { input: index, state });
			}

			let s = self.sinks.get_mut(&sink_idx).unwrap();
			if old_state == StreamState::Corked && state != StreamState::Corked {
				s.n_corked = s.n_corked.saturating_sub(1);
			} else if old_state != StreamState::Corked && state == StreamState::Corked {
				s.n_corked += 1;
			}
		}

		self.sink_inputs.get_mut(&index).unwrap().state = state;

		if state != StreamState::Unlinked && state.is_linked() {
			self.subscription_post(Facility::SinkInput, EventKind::Change, index);
		}

		if let Some(sink_idx) = sink_idx {
			drop(self.sink_update_status(sink_idx));
		}
		Ok(())
	}

	/// Pause or resume a stream. Sync-group members cork and
	/// uncork together.
	pub fn sink_input_cork(&mut self, index: u32, cork: bool) -> Result<(), Error> {
		assert_ctl_context!();

		let state = if cork { StreamState::Corked } else { StreamState::Running };

		// Collect the whole chain first; state updates re-enter.
		let mut members = vec![index];
		let mut cursor = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?.sync_prev;
		while let Some(m) = cursor {
			members.push(m);
			cursor = self.sink_inputs.get(&m).and_then(|i| i.sync_prev);
		}
		cursor = self.sink_inputs.get(&index).unwrap().sync_next;
		while let Some(m) = cursor {
			members.push(m);
			cursor = self.sink_inputs.get(&m).and_then(|i| i.sync_next);
		}

		for member in members {
			self.sink_input_set_state(member, state)?;
		}
		Ok(())
	}

	//---------------------------------------------------------------------------------------------------- Volume / mute
	/// Set the stream volume.
	pub fn sink_input_set_volume(
		&mut self,
		index: u32,
		volume: &ChannelVolumes,
		save: bool,
		absolute: bool,
	) -> Result<(), Error> {
		assert_ctl_context!();

		let (sink_idx, spec, map, writable) = {
			let i = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?;
			if !i.state.is_linked() {
				return Err(Error::BadState);
			}
			(i.sink.ok_or(Error::BadState)?, i.spec, i.map, i.volume_writable)
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

		let flat = self.sink_flat_volume_enabled(sink_idx);

		let v = if !absolute && flat {
			let remapped = {
				let s = &self.sinks[&sink_idx];
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
			let mut scaled = self.sink_inputs[&index].volume;
			scaled.scale(volume.max());
			scaled
		} else {
			*volume
		};

		{
			let i = self.sink_inputs.get_mut(&index).unwrap();
			if v == i.volume {
				i.save_volume = i.save_volume || save;
				return Ok(());
			}

			i.volume = v;
			i.save_volume = save;
		}

		if flat {
			self.sink_set_volume(sink_idx, None, true, save);
		} else {
			let i = self.sink_inputs.get_mut(&index).unwrap();
			i.real_ratio = i.volume;
			i.soft_volume = i.real_ratio.multiply(&i.volume_factor);
			let (soft, muted) = (i.soft_volume, i.muted);

			if let Some(q) = self.sinks[&sink_idx].msgq.clone() {
				q.send(SinkMsg::SetInputVolume { input: index, soft, muted });
			}
		}

		let i = self.sink_inputs.get_mut(&index).unwrap();
		let volume = i.volume;
		i.driver.volume_changed(&volume);
		self.subscription_post(Facility::SinkInput, EventKind::Change, index);
		Ok(())
	}

	/// Read the stream volume.
	pub fn sink_input_get_volume(&self, index: u32, absolute: bool) -> Result<ChannelVolumes, Error> {
		assert_ctl_context!();

		let i = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?;
		if !i.is_volume_readable() {
			return Err(Error::NotSupported);
		}

		let flat = i.sink.map(|s| self.sink_flat_volume_enabled(s)).unwrap_or(false);
		Ok(if absolute || !flat { i.volume } else { i.reference_ratio })
	}

	/// Add (or replace) a named volume-factor layer and fold the
	/// product into the stream's soft volume.
	pub fn sink_input_add_volume_factor(
		&mut self,
		index: u32,
		key: &str,
		factor: &ChannelVolumes,
	) -> Result<(), Error> {
		assert_ctl_context!();

		let (sink_idx, spec) = {
			let i = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?;
			(i.sink, i.spec)
		};

		if !factor.compatible_with(&spec) {
			return Err(Error::Invalid);
		}

		{
			let i = self.sink_inputs.get_mut(&index).unwrap();
			i.volume_factor_items.insert(key.to_owned(), *factor);
			i.volume_factor = factor_product(&i.volume_factor_items, spec.channels);
			i.soft_volume = i.real_ratio.multiply(&i.volume_factor);
		}

		if let Some(sink_idx) = sink_idx {
			let (soft, muted) = {
				let i = &self.sink_inputs[&index];
				(i.soft_volume, i.muted)
			};
			if let Some(q) = self.sinks[&sink_idx].msgq.clone() {
				q.send(SinkMsg::SetInputVolume { input: index, soft, muted });
			}
		}
		Ok(())
	}

	/// Remove a named volume-factor layer.
	pub fn sink_input_remove_volume_factor(&mut self, index: u32, key: &str) -> Result<(), Error> {
		assert_ctl_context!();

		let sink_idx = {
			let i = self.sink_inputs.get_mut(&index).ok_or(Error::NoEntity)?;
			if i.volume_factor_items.remove(key).is_none() {
				return Err(Error::NoEntity);
			}
			let channels = i.spec.channels;
			i.volume_factor = factor_product(&i.volume_factor_items, channels);
			i.soft_volume = i.real_ratio.multiply(&i.volume_factor);
			i.sink
		};

		if let Some(sink_idx) = sink_idx {
			let (soft, muted) = {
				let i = &self.sink_inputs[&index];
				(i.soft_volume, i.muted)
			};
			if let Some(q) = self.sinks[&sink_idx].msgq.clone() {
				q.send(SinkMsg::SetInputVolume { input: index, soft, muted });
			}
		}
		Ok(())
	}

	/// Set the stream mute.
	pub fn sink_input_set_mute(&mut self, index: u32, mute: bool, save: bool) -> Result<(), Error> {
		assert_ctl_context!();

		let sink_idx = {
			let i = self.sink_inputs.get_mut(&index).ok_or(Error::NoEntity)?;
			if !i.state.is_linked() {
				return Err(Error::BadState);
			}

			if i.muted == mute {
				i.save_muted = i.save_muted || save;
				return Ok(());
			}

			i.muted = mute;
			i.save_muted = save;
			i.sink
		};

		if let Some(sink_idx) = sink_idx {
			let (soft, muted) = {
				let i = &self.sink_inputs[&index];
				(i.soft_volume, i.muted)
			};
			if let Some(q) = self.sinks[&sink_idx].msgq.clone() {
				q.send(SinkMsg::SetInputVolume { input: index, soft, muted });
			}
		}

		let i = self.sink_inputs.get_mut(&index).unwrap();
		i.driver.mute_changed(mute);
		self.subscription_post(Facility::SinkInput, EventKind::Change, index);
		Ok(())
	}

	//---------------------------------------------------------------------------------------------------- Latency / rate / rewind
	/// Ask the device for a latency.
	pub fn sink_input_set_requested_latency(&mut self, index: u32, latency: Option<Usec>) -> Result<(), Error> {
		assert_ctl_context!();

		let sink_idx = {
			let i = self.sink_inputs.get_mut(&index).ok_or(Error::NoEntity)?;
			i.requested_latency = latency;
			i.sink
		};

		if let Some(sink_idx) = sink_idx {
			if let Some(q) = self.sinks[&sink_idx].msgq.clone() {
				q.send(SinkMsg::SetInputRequestedLatency { input: index, latency });
			}
		}
		Ok(())
	}

	/// Ask for a rewind so already-rendered data can be replaced
	/// (§4.4 request_rewind).
	///
	/// `rewrite` of `usize::MAX` drops everything buffered;
	/// `None` rewinds the mixer without re-producing.
	pub fn sink_input_request_rewind(
		&mut self,
		index: u32,
		nbytes: usize,
		rewrite: Option<usize>,
		flush: bool,
		dont_rewind_render: bool,
	) -> Result<(), Error> {
		assert_ctl_context!();

		let (sink_idx, device_nbytes) = {
			let i = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?;
			if !i.state.is_linked() {
				return Err(Error::BadState);
			}
			let sink_idx = i.sink.ok_or(Error::BadState)?;

			// Translate the stream-domain request into the device
			// domain; we cannot rewind past what was ever emitted.
			let sink_spec = self.sinks[&sink_idx].spec;
			let stream_bytes = nbytes.min(i.spec.usec_to_bytes(crate::device::MAX_LATENCY));
			let device_nbytes = sink_spec.frame_align(
				(stream_bytes as u128 * sink_spec.rate as u128 * sink_spec.frame_size() as u128
					/ (i.spec.rate as u128 * i.spec.frame_size() as u128).max(1)) as usize,
			);

			(sink_idx, device_nbytes)
		};

		if let Some(q) = self.sinks[&sink_idx].msgq.clone() {
			q.send(SinkMsg::RequestRewind {
				input: Some(index),
				nbytes: device_nbytes,
				rewrite,
				flush,
				dont_rewind_render,
			});
		}
		Ok(())
	}

	/// Change a variable-rate stream's rate.
	pub fn sink_input_set_rate(&mut self, index: u32, rate: u32) -> Result<(), Error> {
		assert_ctl_context!();

		{
			let i = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?;
			if !i.flags.variable_rate {
				return Err(Error::NotSupported);
			}
			if i.spec.rate == rate {
				return Ok(());
			}
		}

		let spec = {
			let i = self.sink_inputs.get_mut(&index).unwrap();
			i.spec.rate = rate;
			i.spec
		};
		spec.validate()?;

		self.sink_input_update_rate(index)?;
		self.subscription_post(Facility::SinkInput, EventKind::Change, index);
		Ok(())
	}

	/// Rebuild the resampler against the (possibly changed)
	/// device spec.
	pub fn sink_input_update_rate(&mut self, index: u32) -> Result<(), Error> {
		assert_ctl_context!();

		let (sink_idx, spec, map, flags, passthrough) = {
			let i = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?;
			(i.sink, i.spec, i.map, i.flags, i.is_passthrough())
		};
		let Some(sink_idx) = sink_idx else { return Err(Error::BadState) };

		let (sink_spec, sink_map) = {
			let s = self.sinks.get(&sink_idx).ok_or(Error::NoEntity)?;
			(s.spec, s.map)
		};

		let attached = self.sink_inputs[&index].io.is_none();

		let mut io = if attached {
			let q = self.sinks[&sink_idx].msgq.clone().ok_or(Error::BadState)?;
			match q.send(SinkMsg::RemoveInput(index)) {
				SinkReply::Input(Some(io)) => io,
				_ => return Err(Error::BadState),
			}
		} else {
			self.sink_inputs.get_mut(&index).unwrap().io.take().unwrap()
		};

		// A resampler still matching both domains is kept.
		let keep = io
			.resampler
			.as_ref()
			.map(|r| *r.input_spec() == spec && *r.output_spec() == sink_spec)
			.unwrap_or(false);

		if !keep {
			let resampler = if passthrough {
				None
			} else {
				make_resampler(&spec, &map, &sink_spec, &sink_map, &flags)?
			};

			let method = resampler
				.as_ref()
				.map(|r| r.method())
				.unwrap_or(ResampleMethod::Copy);

			io.resampler = resampler;
			io.spec = spec;
			io.map = map;
			io.render_queue = MemBlockQueue::new(RENDER_QUEUE_MAXLENGTH, 0);

			self.sink_inputs.get_mut(&index).unwrap().actual_resample_method = method;
			debug2!("updated resampler for sink input {index}");
		}

		if attached {
			let q = self.sinks[&sink_idx].msgq.clone().unwrap();
			q.send(SinkMsg::AddInput(io));
		} else {
			self.sink_inputs.get_mut(&index).unwrap().io = Some(io);
		}

		Ok(())
	}

	//---------------------------------------------------------------------------------------------------- Moving
	/// May this stream (ever) land on `dest`?
	pub fn sink_input_may_move_to(&mut self, index: u32, dest: u32) -> bool {
		assert_ctl_context!();

		let Some(i) = self.sink_inputs.get(&index) else { return false };

		if i.sink == Some(dest) {
			return false;
		}
		if !i.may_move() {
			return false;
		}

		let mut current = Some(dest);
		for _ in 0..SHARE_WALK_LIMIT {
			let Some(s) = current.and_then(|c| self.sinks.get(&c)) else { break };
			let Some(master) = s.input_to_master else { break };

			if master == index {
				debug2!("cannot connect input {index} to {dest}: cycle");
				return false;
			}

			current = self.sink_inputs.get(&master).and_then(|i| i.sink);
		}

		if self.sinks.get(&dest).map(|s| s.inputs.len()).unwrap_or(usize::MAX)
			>= MAX_STREAMS_PER_DEVICE
		{
			warn2!("refusing move: too many inputs per sink");
			return false;
		}

		let dest_name = match self.sinks.get(&dest) {
			Some(s) => s.name.clone(),
			None => return false,
		};
		self.sink_inputs
			.get_mut(&index)
			.map(|i| i.driver.may_move_to(&dest_name))
			.unwrap_or(false)
	}

	/// Phase one of a move: detach from the current sink.
	pub fn sink_input_start_move(&mut self, index: u32) -> Result<(), Error> {
		assert_ctl_context!();

		let (sink_idx, was_corked, was_passthrough) = {
			let i = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?;
			if !i.state.is_linked() {
				return Err(Error::BadState);
			}
			if !i.may_move() {
				return Err(Error::NotSupported);
			}
			(
				i.sink.ok_or(Error::BadState)?,
				i.state == StreamState::Corked,
				i.is_passthrough(),
			)
		};

		let mut hooks = std::mem::take(&mut self.hooks.sink_input_move_start);
		let verdict = fire_veto(&mut hooks, &self.sink_inputs[&index]);
		self.hooks.sink_input_move_start = hooks;
		if verdict == HookResult::Cancel {
			return Err(Error::NotSupported);
		}

		{
			let s = self.sinks.get_mut(&sink_idx).unwrap();
			s.inputs.remove(&index);
			if was_corked {
				s.n_corked = s.n_corked.saturating_sub(1);
			}
		}

		if was_passthrough {
			self.sink_leave_passthrough(sink_idx);
		}

		if self.sink_flat_volume_enabled(sink_idx) {
			self.sink_set_volume(sink_idx, None, false, false);
		}

		let q = self.sinks[&sink_idx].msgq.clone().ok_or(Error::BadState)?;
		match q.send(SinkMsg::RemoveInput(index)) {
			SinkReply::Input(Some(io)) => {
				self.sink_inputs.get_mut(&index).unwrap().io = Some(io);
			},
			_ => return Err(Error::BadState),
		}

		if let Some(root) = self.sink_shared_root(sink_idx) {
			self.sink_sync_shared_volume(root);
		}

		drop(self.sink_update_status(sink_idx));
		self.sink_inputs.get_mut(&index).unwrap().sink = None;
		Ok(())
	}

	fn sink_update_volume_due_to_moving(&mut self, index: u32, dest: u32) {
		let Some(i) = self.sink_inputs.get(&index) else { return };
		let Some(sink_idx) = i.sink else { return };

		let shares = self.sink_sharing_destination(index).is_some();

		if shares {
			let origin = self.sink_inputs[&index].origin_sink.unwrap();
			let Some(root) = self.sink_shared_root(sink_idx) else { return };

			if self.sink_flat_volume_enabled(sink_idx) {
				debug_assert!(self.sink_inputs[&index].real_ratio.is_norm());
			} else {
				let i = self.sink_inputs.get_mut(&index).unwrap();
				let old_volume = i.volume;
				i.volume = ChannelVolumes::norm(i.volume.channels);
				i.reference_ratio = ChannelVolumes::norm(i.reference_ratio.channels);

				if i.volume != old_volume {
					let volume = i.volume;
					i.driver.volume_changed(&volume);
					self.subscription_post(Facility::SinkInput, EventKind::Change, index);
				}
			}

			let (root_ref, root_real, root_map) = {
				let r = &self.sinks[&root];
				(r.reference_volume, r.real_volume, r.map)
			};
			{
				let origin_sink = self.sinks.get_mut(&origin).unwrap();
				let old = origin_sink.reference_volume;
				origin_sink.reference_volume = root_ref.remap(&root_map, &origin_sink.map);
				origin_sink.real_volume = root_real.remap(&root_map, &origin_sink.map);

				if old != origin_sink.reference_volume {
					self.subscription_post(Facility::Sink, EventKind::Change, origin);
				}
			}

			let inputs: Vec<u32> = self.sinks[&origin].inputs.iter().copied().collect();
			for input in inputs {
				self.sink_update_volume_due_to_moving(input, dest);
			}
		} else {
			let flat = self.sink_flat_volume_enabled(sink_idx);
			let i = self.sink_inputs.get_mut(&index).unwrap();
			let old_volume = i.volume;

			if flat {
				let (reference, sink_map) = {
					let s = &self.sinks[&sink_idx];
					(s.reference_volume, s.map)
				};
				let i = self.sink_inputs.get_mut(&index).unwrap();
				i.volume = reference.remap(&sink_map, &i.map).multiply(&i.reference_ratio);
			} else {
				i.volume = i.reference_ratio;
				i.real_ratio = i.reference_ratio;
				i.soft_volume = i.real_ratio.multiply(&i.volume_factor);
			}

			let i = self.sink_inputs.get_mut(&index).unwrap();
			if i.volume != old_volume {
				let volume = i.volume;
				i.driver.volume_changed(&volume);
				self.subscription_post(Facility::SinkInput, EventKind::Change, index);
			}
		}

		if self.sink_inputs.get(&index).map(|i| i.sink) == Some(Some(dest))
			&& self.sink_flat_volume_enabled(dest)
		{
			let save = self.sink_inputs[&index].save_volume;
			self.sink_set_volume(dest, None, false, save);
		}
	}

	/// Phase two of a move: attach to `dest`.
	pub fn sink_input_finish_move(&mut self, index: u32, dest: u32, save: bool) -> Result<(), Error> {
		assert_ctl_context!();

		{
			let i = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?;
			if !i.state.is_linked() {
				return Err(Error::BadState);
			}
			debug_assert!(i.sink.is_none());
		}

		if !self.sink_input_may_move_to(index, dest) {
			return Err(Error::NotSupported);
		}

		let (spec, is_passthrough, format) = {
			let i = &self.sink_inputs[&index];
			(i.spec, i.is_passthrough(), i.format)
		};

		if is_passthrough {
			let formats = self.sinks[&dest].driver.get_formats();
			if negotiate(&[format], &formats).is_err() {
				debug2!("new sink does not support stream format, sending format-lost");
				self.sink_inputs.get_mut(&index).unwrap().driver.send_event("format-lost");
				return Err(Error::NotSupported);
			}
		}

		let variable_rate = self.sink_inputs[&index].flags.variable_rate;
		if !variable_rate && spec != self.sinks[&dest].spec {
			info2!("trying to change sample rate of sink {dest}");
			if self.sink_update_rate(dest, spec.rate, is_passthrough) {
				info2!("rate changed to {} Hz", self.sinks[&dest].spec.rate);
			}
		}

		let dest_name = self.sinks[&dest].name.clone();
		{
			let i = self.sink_inputs.get_mut(&index).unwrap();
			i.driver.moving(Some(&dest_name));
			i.sink = Some(dest);
			i.save_sink = save;
		}

		let was_corked = self.sink_inputs[&index].state == StreamState::Corked;
		{
			let s = self.sinks.get_mut(&dest).unwrap();
			s.inputs.insert(index);
			if was_corked {
				s.n_corked += 1;
			}
		}

		{
			let dest_map = self.sinks[&dest].map;
			let i = self.sink_inputs.get_mut(&index).unwrap();
			let from = if i.volume_factor_sink.channels == i.map.channels {
				i.map
			} else {
				ChannelMap::default_for(i.volume_factor_sink.channels).unwrap_or(i.map)
			};
			i.volume_factor_sink = i.volume_factor_sink.remap(&from, &dest_map);
			if let Some(io) = &mut i.io {
				io.volume_factor_sink = i.volume_factor_sink;
			}
		}

		self.sink_input_update_rate(index)?;

		drop(self.sink_update_status(dest));
		self.sink_update_volume_due_to_moving(index, dest);

		if is_passthrough {
			self.sink_enter_passthrough(dest);
		}

		if let Some(root) = self.sink_shared_root(dest) {
			self.sink_sync_shared_volume(root);
		}

		let mut hooks = std::mem::take(&mut self.hooks.sink_input_move_finish);
		for hook in &mut hooks {
			hook(&self.sink_inputs[&index]);
		}
		self.hooks.sink_input_move_finish = hooks;

		info2!("successfully moved sink input {index} to {dest_name}");
		self.subscription_post(Facility::SinkInput, EventKind::Change, index);
		Ok(())
	}

	/// The move fell through.
	pub fn sink_input_fail_move(&mut self, index: u32) {
		assert_ctl_context!();

		let Some(i) = self.sink_inputs.get(&index) else { return };
		if !i.state.is_linked() {
			return;
		}

		let mut hooks = std::mem::take(&mut self.hooks.sink_input_move_fail);
		let mut rescued = false;
		for hook in &mut hooks {
			if let Some(dest) = hook(&self.sink_inputs[&index]) {
				if self.sink_input_finish_move(index, dest, false).is_ok() {
					rescued = true;
					break;
				}
			}
		}
		self.hooks.sink_input_move_fail = hooks;

		if rescued {
			return;
		}

		self.sink_inputs.get_mut(&index).unwrap().driver.moving(None);
		self.sink_input_kill(index);
	}

	/// Move a stream in one call.
	pub fn sink_input_move_to(&mut self, index: u32, dest: u32, save: bool) -> Result<(), Error> {
		assert_ctl_context!();

		{
			let i = self.sink_inputs.get(&index).ok_or(Error::NoEntity)?;
			if i.sink == Some(dest) {
				return Ok(());
			}
		}

		if !self.sink_input_may_move_to(index, dest) {
			return Err(Error::NotSupported);
		}

		self.sink_input_start_move(index)?;

		if let Err(e) = self.sink_input_finish_move(index, dest, save) {
			self.sink_input_fail_move(index);
			return Err(e);
		}

		Ok(())
	}

	/// The sink's rate changed: mirror of the source path.
	pub fn sink_update_rate(&mut self, index: u32, rate: u32, passthrough: bool) -> bool {
		assert_ctl_context!();

		let desired = {
			let Some(s) = self.sinks.get(&index) else { return false };

			if s.default_rate == s.alternate_rate {
				warn2!("default and alternate sample rates are the same");
				return false;
			}

			if s.state.is_running() {
				info2!("cannot update rate, sink {index} is running at {} Hz", s.spec.rate);
				return false;
			}

			if !(crate::sample::RATE_MIN..=crate::sample::RATE_MAX).contains(&rate) {
				return false;
			}

			if passthrough {
				rate
			} else {
				let use_alternate = if s.default_rate % 4_000 != 0 {
					s.alternate_rate % 4_000 == 0 && rate % 4_000 == 0
				} else {
					s.alternate_rate % 11_025 == 0 && rate % 11_025 == 0
				};

				if use_alternate { s.alternate_rate } else { s.default_rate }
			}
		};

		{
			let s = &self.sinks[&index];
			if desired == s.spec.rate {
				return false;
			}
			if !passthrough && s.used_by() > 0 {
				return false;
			}
		}

		debug2!("suspending sink {index} due to changing the sample rate");
		if self.sink_suspend(index, true, crate::device::SuspendCause::INTERNAL).is_err() {
			return false;
		}

		let updated = {
			let s = self.sinks.get_mut(&index).unwrap();
			match s.driver.update_rate(desired) {
				Ok(()) => {
					s.spec.rate = desired;
					true
				},
				Err(e) => {
					debug2!("sink {index}: rate update to {desired} Hz failed: {e}");
					false
				},
			}
		};

		drop(self.sink_suspend(index, false, crate::device::SuspendCause::INTERNAL));

		if updated {
			info2!("changed sampling rate of sink {index} to {desired} Hz");

			let inputs: Vec<u32> = self.sinks[&index].inputs.iter().copied().collect();
			for input in inputs {
				let corked = self
					.sink_inputs
					.get(&input)
					.map(|i| i.state == StreamState::Corked)
					.unwrap_or(false);
				if corked {
					drop(self.sink_input_update_rate(input));
				}
			}
		}

		updated
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::channel::Volume;
	use crate::chunk::MemChunk;
	use crate::tests::{attach_input,flat_sink,input_with_volume,TestCore};
	use pretty_assertions::assert_eq;

	fn v2(l: f64, r: f64) -> ChannelVolumes {
		let mut v = ChannelVolumes::norm(2);
		v.values[0] = Volume((l * f64::from(Volume::NORM.0)) as u32);
		v.values[1] = Volume((r * f64::from(Volume::NORM.0)) as u32);
		v
	}

	#[test]
	fn named_volume_factors_multiply() {
		let mut t = TestCore::new();
		let s = flat_sink(&mut t, "s");
		let x = attach_input(&mut t, s);

		t.core.sink_input_add_volume_factor(x, "duck", &v2(0.5, 0.5)).unwrap();
		t.core.sink_input_add_volume_factor(x, "balance", &v2(1.0, 0.5)).unwrap();

		let i = t.core.sink_input(x).unwrap();
		assert_eq!(i.volume_factor, v2(0.5, 0.25));

		t.core.sink_input_remove_volume_factor(x, "duck").unwrap();
		let i = t.core.sink_input(x).unwrap();
		assert_eq!(i.volume_factor, v2(1.0, 0.5));

		assert_eq!(
			t.core.sink_input_remove_volume_factor(x, "duck"),
			Err(Error::NoEntity),
		);
	}

	#[test]
	fn sync_group_corks_together_and_pins_moves() {
		let mut t = TestCore::new();
		let a = flat_sink(&mut t, "a");
		let b = flat_sink(&mut t, "b");

		let x = attach_input(&mut t, a);
		let y = {
			let mut builder = t.input_builder(a);
			builder.sync_with = Some(x);
			let y = t.core.sink_input_new(builder).unwrap();
			t.core.sink_input_put(y).unwrap();
			y
		};

		// Chained both ways.
		assert_eq!(t.core.sink_input(x).unwrap().sync_next, Some(y));
		assert_eq!(t.core.sink_input(y).unwrap().sync_prev, Some(x));

		// Sync members cannot move.
		assert!(!t.core.sink_input_may_move_to(x, b));
		assert_eq!(t.core.sink_input_move_to(y, b, false), Err(Error::NotSupported));

		// Corking one corks the chain.
		t.core.sink_input_cork(x, true).unwrap();
		assert_eq!(t.core.sink_input(x).unwrap().state(), StreamState::Corked);
		assert_eq!(t.core.sink_input(y).unwrap().state(), StreamState::Corked);

		// Unlinking one splices the chain and frees the other.
		t.core.sink_input_unlink(x);
		assert_eq!(t.core.sink_input(y).unwrap().sync_prev, None);
		assert!(t.core.sink_input_may_move_to(y, b));
	}

	#[test]
	fn render_applies_soft_volume_and_mixes() {
		let mut t = TestCore::new();
		let s = flat_sink(&mut t, "s");
		let x = input_with_volume(&mut t, s, v2(0.5, 0.5));

		// Queue one chunk of ones on the implementor side.
		let frames = 64;
		t.input_handles[&x].lock().unwrap().to_pop.push_back(
			MemChunk::from_f32(&vec![1.0_f32; frames * 2]),
		);

		t.core.sink_render(s, frames * 8).unwrap();

		let written = t.sink_handles[&s].state.lock().unwrap().written.clone();
		assert_eq!(written.len(), 1);
		let samples = written[0].to_f32();
		assert_eq!(samples.len(), frames * 2);

		// Flat mode put the stream's 0.5 into the device's real
		// volume (hardware-less sink: soft volume), so the samples
		// come out attenuated by the cubic factor of 0.5.
		let expected = Volume(0x8000).to_linear() as f32;
		assert!((samples[0] - expected).abs() < 0.01, "{} vs {expected}", samples[0]);
	}

	#[test]
	fn underrun_yields_silence_and_drained() {
		let mut t = TestCore::new();
		let s = flat_sink(&mut t, "s");
		let x = attach_input(&mut t, s);

		t.core.sink_render(s, 256).unwrap();

		let written = t.sink_handles[&s].state.lock().unwrap().written.clone();
		assert_eq!(written.len(), 1);
		assert!(written[0].to_f32().iter().all(|s| *s == 0.0));
		assert!(t.core.sink_input(x).unwrap().is_drained());
	}

	#[test]
	fn rewind_request_reaches_implementor() {
		let mut t = TestCore::new();
		let s = flat_sink(&mut t, "s");

		let x = {
			let builder = t.input_builder_rewindable(s);
			t.add_input(builder)
		};

		// Render some data first so there is something to rewind.
		let chunk = MemChunk::from_f32(&vec![0.25_f32; 1024]);
		t.input_handles[&x].lock().unwrap().to_pop.push_back(chunk);
		t.core.sink_set_max_rewind(s, 2048).unwrap();
		t.core.sink_render(s, 2048).unwrap();

		t.core.sink_input_request_rewind(x, 1024, Some(1024), false, false).unwrap();

		// Any blocking send doubles as a barrier behind the
		// posted rewind.
		t.core.sink_set_max_rewind(s, 2048).unwrap();

		let state = t.input_handles[&x].lock().unwrap();
		assert!(state.rewritten > 0, "implementor saw no rewrite");
	}
}
