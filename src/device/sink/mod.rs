//! The sink (playback device): control-thread object, builder,
//! lifecycle.

//---------------------------------------------------------------------------------------------------- modules
pub(crate) mod io;

mod volume;
mod state;

//---------------------------------------------------------------------------------------------------- use
use crate::channel::{ChannelMap,ChannelVolumes,Volume};
use crate::core::{Core,EventKind,Facility};
use crate::device::driver::{SinkDriver,SinkIoDriver};
use crate::device::flags::DeviceFlags;
use crate::device::msg::{MsgQueue,SinkMsg,SinkReply};
use crate::device::port::DevicePort;
use crate::device::state::{DeviceState,SuspendCause};
use crate::device::{DEFAULT_FIXED_LATENCY,MAX_LATENCY,MIN_LATENCY};
use crate::error::Error;
use crate::hook::{fire_new,HookResult};
use crate::macros::{assert_ctl_context,debug2,info2};
use crate::mixer::PathSet;
use crate::sample::{SampleSpec,Usec};
use std::collections::{BTreeMap,BTreeSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;

//---------------------------------------------------------------------------------------------------- Sink
/// A playback device. The mirror image of
/// [`crate::device::Source`] on the pull side.
pub struct Sink {
	/// Stable index.
	pub index: u32,
	/// Unique registered name.
	pub name: String,
	/// Human description.
	pub description: String,
	/// Driver tag.
	pub driver_name: String,
	/// Free-form properties.
	pub props: BTreeMap<String, String>,
	/// Owning card, if any.
	pub card: Option<u32>,
	/// Owning module, if any.
	pub module: Option<u32>,

	/// Capabilities.
	pub flags: DeviceFlags,
	/// The one format this device runs.
	pub spec: SampleSpec,
	/// Its channel map.
	pub map: ChannelMap,
	/// Preferred rate.
	pub default_rate: u32,
	/// Rate of the other family the device can switch to.
	pub alternate_rate: u32,

	pub(crate) state: DeviceState,
	pub(crate) suspend_cause: SuspendCause,

	/// What the user asked for; externally visible.
	pub reference_volume: ChannelVolumes,
	/// What the hardware actually applies.
	pub real_volume: ChannelVolumes,
	/// Residual software gain applied while mixing.
	pub(crate) soft_volume: ChannelVolumes,
	/// Mute state.
	pub muted: bool,

	/// Should persist: volume.
	pub save_volume: bool,
	/// Should persist: mute.
	pub save_muted: bool,
	/// Should persist: port.
	pub save_port: bool,

	/// The hardware's 0 dB point.
	pub base_volume: Volume,
	/// Granularity of the hardware volume, 0 if continuous.
	pub n_volume_steps: u32,

	/// Selectable ports.
	pub ports: Vec<DevicePort>,
	/// Name of the active port.
	pub active_port: Option<String>,
	/// The probed mixer paths behind the ports, if any.
	pub(crate) path_set: Option<PathSet>,

	/// Attached inputs, ordered by index.
	pub(crate) inputs: BTreeSet<u32>,
	/// How many of them are corked.
	pub(crate) n_corked: u32,

	/// The master stream one level up the volume sharing tree
	/// (a sink input owned by this filter sink).
	pub input_to_master: Option<u32>,

	/// Accepted latency range.
	pub min_latency: Usec,
	/// Accepted latency range.
	pub max_latency: Usec,
	/// Latency of fixed-latency operation.
	pub fixed_latency: Usec,
	pub(crate) max_rewind: usize,

	/// Set from any context when the hardware mixer may have
	/// changed behind our back; consumed on resume.
	pub mixer_dirty: Arc<AtomicBool>,

	/// Saved user volume around passthrough mode.
	pub(crate) saved_volume: Option<(ChannelVolumes, bool)>,

	pub(crate) driver: Box<dyn SinkDriver>,
	pub(crate) msgq: Option<MsgQueue<SinkMsg, SinkReply>>,
	pub(crate) io_join: Option<JoinHandle<()>>,
	pub(crate) io_driver: Option<Box<dyn SinkIoDriver>>,
}

impl Sink {
	/// Current state.
	pub const fn state(&self) -> DeviceState {
		self.state
	}

	/// Current suspend causes.
	pub const fn suspend_cause(&self) -> SuspendCause {
		self.suspend_cause
	}

	/// Residual software gain.
	pub const fn soft_volume(&self) -> &ChannelVolumes {
		&self.soft_volume
	}

	/// Indices of the attached inputs.
	pub fn inputs(&self) -> impl Iterator<Item = u32> + '_ {
		self.inputs.iter().copied()
	}

	/// How many streams are attached.
	pub fn linked_by(&self) -> usize {
		self.inputs.len()
	}

	/// How many attached streams are not corked.
	pub fn used_by(&self) -> usize {
		self.inputs.len() - self.n_corked as usize
	}

	/// Does this device share its volume with a master?
	pub const fn shares_volume(&self) -> bool {
		self.flags.share_volume_with_master
	}

	/// Look up a port.
	pub fn find_port(&self, name: &str) -> Option<&DevicePort> {
		self.ports.iter().find(|p| p.name == name)
	}
}

impl std::fmt::Debug for Sink {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Sink")
			.field("index", &self.index)
			.field("name", &self.name)
			.field("state", &self.state)
			.field("spec", &self.spec)
			.field("inputs", &self.inputs)
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- SinkBuilder
/// The `new_data` candidate a driver fills before
/// [`Core::sink_new`].
pub struct SinkBuilder {
	/// Unique name to register.
	pub name: String,
	/// Human description.
	pub description: Option<String>,
	/// Driver tag.
	pub driver_name: String,
	/// Free-form properties.
	pub props: BTreeMap<String, String>,
	/// Owning card.
	pub card: Option<u32>,
	/// Owning module.
	pub module: Option<u32>,
	/// Capabilities.
	pub flags: DeviceFlags,
	/// Sample spec; `rate` doubles as the default rate.
	pub spec: SampleSpec,
	/// Channel map; derived from the spec when omitted.
	pub map: Option<ChannelMap>,
	/// Alternate rate; core default when omitted.
	pub alternate_rate: Option<u32>,
	/// Initial volume. Must not be set on sharing devices.
	pub volume: Option<ChannelVolumes>,
	/// Initial mute.
	pub muted: Option<bool>,
	/// The hardware's 0 dB point.
	pub base_volume: Volume,
	/// Volume step count, 0 if continuous.
	pub n_volume_steps: u32,
	/// Ports (often from [`PathSet::ports`]).
	pub ports: Vec<DevicePort>,
	/// Initially active port; highest priority when omitted.
	pub active_port: Option<String>,
	/// The probed path set behind the ports.
	pub path_set: Option<PathSet>,
	/// Causes to start suspended with.
	pub suspend_cause: SuspendCause,
	/// Persistence hints.
	pub save_volume: bool,
	/// Persistence hints.
	pub save_muted: bool,
	/// Persistence hints.
	pub save_port: bool,

	/// Control-side driver.
	pub driver: Box<dyn SinkDriver>,
	/// IO-side driver, moved to the IO thread at `put`.
	pub io_driver: Box<dyn SinkIoDriver>,
}

impl SinkBuilder {
	/// A candidate with defaults.
	pub fn new(
		name: &str,
		driver: Box<dyn SinkDriver>,
		io_driver: Box<dyn SinkIoDriver>,
	) -> Self {
		Self {
			name: name.to_owned(),
			description: None,
			driver_name: String::new(),
			props: BTreeMap::new(),
			card: None,
			module: None,
			flags: DeviceFlags::NONE,
			spec: SampleSpec::DEFAULT,
			map: None,
			alternate_rate: None,
			volume: None,
			muted: None,
			base_volume: Volume::NORM,
			n_volume_steps: 0,
			ports: Vec::new(),
			active_port: None,
			path_set: None,
			suspend_cause: SuspendCause::NONE,
			save_volume: false,
			save_muted: false,
			save_port: false,
			driver,
			io_driver,
		}
	}

	/// Set the sample spec.
	#[must_use]
	pub fn spec(mut self, spec: SampleSpec) -> Self {
		self.spec = spec;
		self
	}

	/// Set the channel map.
	#[must_use]
	pub fn map(mut self, map: ChannelMap) -> Self {
		self.map = Some(map);
		self
	}

	/// Set the capability flags.
	#[must_use]
	pub fn flags(mut self, flags: DeviceFlags) -> Self {
		self.flags = flags;
		self
	}

	/// Attach ports and the path set behind them.
	#[must_use]
	pub fn with_path_set(mut self, path_set: PathSet) -> Self {
		self.ports = path_set.ports();
		self.path_set = Some(path_set);
		self
	}
}

impl std::fmt::Debug for SinkBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SinkBuilder")
			.field("name", &self.name)
			.field("spec", &self.spec)
			.field("flags", &self.flags)
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- Core: lifecycle
impl Core {
	/// Create a sink from a builder.
	pub fn sink_new(&mut self, mut builder: SinkBuilder) -> Result<u32, Error> {
		assert_ctl_context!();

		let mut hooks = std::mem::take(&mut self.hooks.sink_new);
		let verdict = fire_new(&mut hooks, &mut builder);
		self.hooks.sink_new = hooks;
		if verdict == HookResult::Cancel {
			return Err(Error::NotSupported);
		}

		builder.spec.validate()?;

		let map = match builder.map {
			Some(map) => {
				if !map.compatible_with(&builder.spec) {
					return Err(Error::Invalid);
				}
				map
			},
			None => ChannelMap::default_for(builder.spec.channels).ok_or(Error::Invalid)?,
		};

		if builder.flags.share_volume_with_master && builder.volume.is_some() {
			return Err(Error::Invalid);
		}

		if !builder.flags.is_consistent() {
			return Err(Error::Invalid);
		}

		if let Some(v) = &builder.volume {
			if !v.compatible_with(&builder.spec) {
				return Err(Error::Invalid);
			}
		}

		let mut hooks = std::mem::take(&mut self.hooks.sink_fixate);
		let verdict = fire_new(&mut hooks, &mut builder);
		self.hooks.sink_fixate = hooks;
		if verdict == HookResult::Cancel {
			return Err(Error::NotSupported);
		}

		let mut flags = builder.flags;
		flags.decibel_volume = !flags.share_volume_with_master;

		let index = self.alloc_index();
		self.register_name(&builder.name, Facility::Sink, index)?;

		let active_port = builder.active_port.clone().or_else(|| {
			builder
				.ports
				.iter()
				.max_by_key(|p| p.priority)
				.map(|p| p.name.clone())
		});

		let reference_volume = builder
			.volume
			.unwrap_or_else(|| ChannelVolumes::norm(builder.spec.channels));

		let sink = Sink {
			index,
			name: builder.name.clone(),
			description: builder.description.unwrap_or_else(|| builder.name.clone()),
			driver_name: builder.driver_name,
			props: builder.props,
			card: builder.card,
			module: builder.module,
			flags,
			spec: builder.spec,
			map,
			default_rate: builder.spec.rate,
			alternate_rate: builder.alternate_rate.unwrap_or(self.config.alternate_rate),
			state: DeviceState::Init,
			suspend_cause: builder.suspend_cause,
			reference_volume,
			real_volume: reference_volume,
			soft_volume: ChannelVolumes::norm(builder.spec.channels),
			muted: builder.muted.unwrap_or(false),
			save_volume: builder.save_volume,
			save_muted: builder.save_muted,
			save_port: builder.save_port,
			base_volume: builder.base_volume,
			n_volume_steps: builder.n_volume_steps,
			ports: builder.ports,
			active_port,
			path_set: builder.path_set,
			inputs: BTreeSet::new(),
			n_corked: 0,
			input_to_master: None,
			min_latency: MIN_LATENCY,
			max_latency: MAX_LATENCY,
			fixed_latency: DEFAULT_FIXED_LATENCY,
			max_rewind: 0,
			mixer_dirty: Arc::new(AtomicBool::new(false)),
			saved_volume: None,
			driver: builder.driver,
			msgq: None,
			io_join: None,
			io_driver: Some(builder.io_driver),
		};

		info2!("created sink {index} \"{}\" with spec {}", sink.name, sink.spec);
		self.sinks.insert(index, sink);

		Ok(index)
	}

	/// Publish a sink: spawn its IO thread and move it out of
	/// `Init`.
	pub fn sink_put(&mut self, index: u32) -> Result<(), Error> {
		assert_ctl_context!();

		if let Some(root) = self.sink_shared_root(index) {
			if root != index {
				let (reference, real, root_map) = {
					let r = &self.sinks[&root];
					(r.reference_volume, r.real_volume, r.map)
				};
				let s = self.sinks.get_mut(&index).ok_or(Error::NoEntity)?;
				s.reference_volume = reference.remap(&root_map, &s.map);
				s.real_volume = real.remap(&root_map, &s.map);
				s.soft_volume = ChannelVolumes::norm(s.spec.channels);
			}
		}

		{
			let s = self.sinks.get_mut(&index).ok_or(Error::NoEntity)?;

			if s.state != DeviceState::Init {
				return Err(Error::BadState);
			}
			debug_assert!(s.flags.is_consistent());

			let io_driver = s.io_driver.take().ok_or(Error::BadState)?;
			let (msgq, msg_rx) = MsgQueue::new();

			let join = io::SinkIo::init(io::InitArgs {
				index,
				spec: s.spec,
				map: s.map,
				flags: s.flags,
				soft_volume: s.soft_volume,
				real_volume: s.real_volume,
				muted: s.muted,
				safety_margin: self.config.deferred_volume_safety_margin,
				extra_delay: self.config.deferred_volume_extra_delay,
				max_block: self.config.max_block_size,
				driver: io_driver,
				to_ctl: self.reports_tx.clone(),
				msg_rx,
			})
			.map_err(|_| Error::BadState)?;

			s.msgq = Some(msgq);
			s.io_join = Some(join);
		}

		let target = if self.sinks[&index].suspend_cause.any() {
			DeviceState::Suspended
		} else {
			DeviceState::Idle
		};
		self.sink_set_state(index, target)?;

		self.subscription_post(Facility::Sink, EventKind::New, index);
		Ok(())
	}

	/// Remove a sink: kill the attached streams, stop the IO
	/// thread, unregister.
	pub fn sink_unlink(&mut self, index: u32) {
		assert_ctl_context!();

		let Some(s) = self.sinks.get(&index) else { return };
		if s.state == DeviceState::Unlinked {
			return;
		}

		let linked = s.state.is_linked();
		let name = s.name.clone();

		for input in self.sinks[&index].inputs.clone() {
			self.sink_input_kill(input);
		}

		if linked {
			drop(self.sink_set_state(index, DeviceState::Unlinked));
		} else if let Some(s) = self.sinks.get_mut(&index) {
			s.state = DeviceState::Unlinked;
		}

		let s = self.sinks.get_mut(&index).unwrap();
		if let Some(q) = s.msgq.take() {
			q.send(SinkMsg::Shutdown);
		}
		if let Some(join) = s.io_join.take() {
			drop(join.join());
		}

		self.unregister_name(&name);
		self.sinks.remove(&index);

		if linked {
			self.subscription_post(Facility::Sink, EventKind::Remove, index);
		}

		debug2!("unlinked sink {index} \"{name}\"");
	}

	//---------------------------------------------------------------------------------------------------- Ports / latency
	/// Switch the active port (deferred round-trip, as for
	/// sources).
	pub fn sink_set_port(&mut self, index: u32, name: &str, save: bool) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sinks.get_mut(&index).ok_or(Error::NoEntity)?;
		if !s.state.is_linked() {
			return Err(Error::BadState);
		}

		let Some(port) = s.ports.iter().find(|p| p.name == name) else {
			return Err(Error::NoEntity);
		};
		let latency_offset = port.latency_offset;

		if s.active_port.as_deref() == Some(name) {
			s.save_port = s.save_port || save;
			return Ok(());
		}

		if s.flags.deferred_volume {
			let q = s.msgq.clone().ok_or(Error::BadState)?;
			match q.send(SinkMsg::SetPort(name.to_owned())) {
				SinkReply::Status(result) => result?,
				_ => return Err(Error::NotImplemented),
			}
		} else {
			s.driver.set_port(name)?;
		}

		let s = self.sinks.get_mut(&index).unwrap();
		s.active_port = Some(name.to_owned());
		s.save_port = save;

		if let Some(q) = &s.msgq {
			q.send(SinkMsg::SetLatencyOffset(latency_offset));
		}

		self.subscription_post(Facility::Sink, EventKind::Change, index);
		Ok(())
	}

	/// The device's current playback latency.
	pub fn sink_get_latency(&self, index: u32) -> Result<Usec, Error> {
		assert_ctl_context!();

		let s = self.sinks.get(&index).ok_or(Error::NoEntity)?;
		if !s.state.is_linked() {
			return Err(Error::BadState);
		}
		if !s.flags.latency {
			return Ok(0);
		}

		let q = s.msgq.clone().ok_or(Error::BadState)?;
		match q.send(SinkMsg::GetLatency) {
			SinkReply::Latency(l) => Ok(l),
			_ => Err(Error::NotImplemented),
		}
	}

	/// The latency the attached streams collectively asked for,
	/// min-reduced and clamped on the IO side. Fixed-latency
	/// devices report their pinned value.
	pub fn sink_get_requested_latency(&self, index: u32) -> Result<Option<Usec>, Error> {
		assert_ctl_context!();

		let s = self.sinks.get(&index).ok_or(Error::NoEntity)?;
		if !s.state.is_linked() {
			return Err(Error::BadState);
		}

		let q = s.msgq.clone().ok_or(Error::BadState)?;
		match q.send(SinkMsg::GetRequestedLatency) {
			SinkReply::RequestedLatency(l) => Ok(l),
			_ => Err(Error::NotImplemented),
		}
	}

	/// Constrain the dynamic latency range.
	pub fn sink_set_latency_range(&mut self, index: u32, min: Usec, max: Usec) -> Result<(), Error> {
		assert_ctl_context!();

		let min = min.max(MIN_LATENCY);
		let max = max.min(MAX_LATENCY);
		if min > max {
			return Err(Error::Invalid);
		}

		let s = self.sinks.get_mut(&index).ok_or(Error::NoEntity)?;
		if !s.flags.dynamic_latency {
			return Err(Error::NotSupported);
		}

		s.min_latency = min;
		s.max_latency = max;

		if let Some(q) = &s.msgq {
			q.send(SinkMsg::SetLatencyRange(min, max));
		}
		Ok(())
	}

	/// Pin the latency of a fixed-latency device.
	pub fn sink_set_fixed_latency(&mut self, index: u32, latency: Usec) -> Result<(), Error> {
		assert_ctl_context!();

		let latency = latency.clamp(MIN_LATENCY, MAX_LATENCY);
		let s = self.sinks.get_mut(&index).ok_or(Error::NoEntity)?;
		if s.flags.dynamic_latency {
			return Err(Error::NotSupported);
		}

		s.fixed_latency = latency;
		if let Some(q) = &s.msgq {
			q.send(SinkMsg::SetFixedLatency(latency));
		}
		Ok(())
	}

	/// Widen or narrow the rewind window of the device.
	pub fn sink_set_max_rewind(&mut self, index: u32, nbytes: usize) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sinks.get_mut(&index).ok_or(Error::NoEntity)?;
		s.max_rewind = nbytes;
		if let Some(q) = &s.msgq {
			q.send(SinkMsg::SetMaxRewind(nbytes));
		}
		Ok(())
	}

	/// Ask the mixer to re-run from `nbytes` back (upper layers
	/// and implementors call this; the per-stream rewrite wishes
	/// arrive via the sink inputs).
	pub fn sink_request_rewind(&mut self, index: u32, nbytes: usize) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sinks.get(&index).ok_or(Error::NoEntity)?;
		if !s.state.is_opened() {
			return Err(Error::BadState);
		}

		if let Some(q) = s.msgq.clone() {
			q.post(SinkMsg::RequestRewind {
				input: None,
				nbytes,
				rewrite: None,
				flush: false,
				dont_rewind_render: false,
			});
		}
		Ok(())
	}

	/// Render `nbytes` now. Drivers without their own pacing (and
	/// tests) drive the mixer through this.
	pub fn sink_render(&mut self, index: u32, nbytes: usize) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sinks.get(&index).ok_or(Error::NoEntity)?;
		let q = s.msgq.clone().ok_or(Error::BadState)?;
		q.send(SinkMsg::Render(nbytes));
		Ok(())
	}

	/// A jack changed state: update the availability of the ports
	/// behind the jack's path.
	pub fn sink_jack_event(&mut self, index: u32, jack_name: &str, plugged: bool) {
		assert_ctl_context!();

		let Some(s) = self.sinks.get_mut(&index) else { return };
		let Some(path_set) = &mut s.path_set else { return };

		let mut changed_paths = Vec::new();
		for path in &mut path_set.paths {
			for jack in &mut path.jacks {
				if jack.has_control && jack.alsa_name == jack_name {
					jack.plugged_in = plugged;
					changed_paths.push(path.name.clone());
				}
			}
		}

		for path_name in &changed_paths {
			let available = path_set
				.find(path_name)
				.map(|p| {
					p.jacks
						.iter()
						.filter(|j| j.has_control)
						.map(|j| j.available())
						.fold(crate::device::port::Available::Unknown, std::cmp::max)
				})
				.unwrap_or_default();

			for port in s.ports.iter_mut().filter(|p| p.path_name == *path_name) {
				port.available = available;
			}
		}

		if !changed_paths.is_empty() {
			self.subscription_post(Facility::Sink, EventKind::Change, index);
		}
	}

	/// Update the description and tell subscribers.
	pub fn sink_set_description(&mut self, index: u32, description: &str) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sinks.get_mut(&index).ok_or(Error::NoEntity)?;
		if s.description == description {
			return Ok(());
		}

		s.description = description.to_owned();
		if s.state.is_linked() {
			self.subscription_post(Facility::Sink, EventKind::Change, index);
		}
		Ok(())
	}

	/// Merge properties and tell subscribers.
	pub fn sink_update_props(&mut self, index: u32, props: &BTreeMap<String, String>) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sinks.get_mut(&index).ok_or(Error::NoEntity)?;
		for (k, v) in props {
			s.props.insert(k.clone(), v.clone());
		}

		if s.state.is_linked() {
			self.subscription_post(Facility::Sink, EventKind::Change, index);
		}
		Ok(())
	}

	//---------------------------------------------------------------------------------------------------- Sharing tree
	/// Walk `input_to_master` edges to the non-sharing root.
	pub fn sink_shared_root(&self, index: u32) -> Option<u32> {
		let mut current = index;

		for _ in 0..crate::device::SHARE_WALK_LIMIT {
			let s = self.sinks.get(&current)?;
			if !s.flags.share_volume_with_master {
				return Some(current);
			}

			let master_stream = s.input_to_master?;
			current = self.sink_inputs.get(&master_stream)?.sink?;
		}

		None
	}

	/// Is flat volume in effect for this device?
	pub fn sink_flat_volume_enabled(&self, index: u32) -> bool {
		self.sink_shared_root(index)
			.and_then(|root| self.sinks.get(&root))
			.map(|s| s.flags.flat_volume)
			.unwrap_or(false)
	}

	//---------------------------------------------------------------------------------------------------- Passthrough
	/// Is a passthrough stream attached?
	pub fn sink_is_passthrough(&self, index: u32) -> bool {
		let Some(s) = self.sinks.get(&index) else { return false };

		s.inputs
			.iter()
			.filter_map(|i| self.sink_inputs.get(i))
			.any(crate::stream::SinkInput::is_passthrough)
	}

	pub(crate) fn sink_enter_passthrough(&mut self, index: u32) {
		let Some(s) = self.sinks.get(&index) else { return };

		let saved = (s.reference_volume, s.save_volume);
		let norm = ChannelVolumes::norm(s.spec.channels);

		self.sinks.get_mut(&index).unwrap().saved_volume = Some(saved);
		self.sink_set_volume(index, Some(&norm), true, false);

		// The monitor's view of a compressed stream is useless;
		// suspend it for the duration.
		let monitors: Vec<u32> = self
			.sources
			.values()
			.filter(|src| src.monitor_of == Some(index))
			.map(|src| src.index)
			.collect();
		for monitor in monitors {
			drop(self.source_suspend(monitor, true, SuspendCause::PASSTHROUGH));
		}
	}

	pub(crate) fn sink_leave_passthrough(&mut self, index: u32) {
		let Some(s) = self.sinks.get_mut(&index) else { return };

		if let Some((volume, save)) = s.saved_volume.take() {
			self.sink_set_volume(index, Some(&volume), true, save);
		}

		let monitors: Vec<u32> = self
			.sources
			.values()
			.filter(|src| src.monitor_of == Some(index))
			.map(|src| src.index)
			.collect();
		for monitor in monitors {
			drop(self.source_suspend(monitor, false, SuspendCause::PASSTHROUGH));
		}
	}
}
