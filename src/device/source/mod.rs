//! The source (capture device): control-thread object, builder,
//! lifecycle.

//---------------------------------------------------------------------------------------------------- modules
pub(crate) mod io;

mod volume;
mod state;
mod rate;

//---------------------------------------------------------------------------------------------------- use
use crate::channel::{ChannelMap,ChannelVolumes,Volume};
use crate::core::{Core,EventKind,Facility};
use crate::device::driver::{SourceDriver,SourceIoDriver};
use crate::device::flags::DeviceFlags;
use crate::device::msg::{MsgQueue,SinkMsg,SinkReply,SourceMsg,SourceReply};
use crate::device::port::DevicePort;
use crate::device::state::{DeviceState,SuspendCause};
use crate::device::{MAX_LATENCY,MIN_LATENCY,DEFAULT_FIXED_LATENCY};
use crate::error::Error;
use crate::hook::{fire_new,HookResult};
use crate::macros::{assert_ctl_context,debug2,info2,warn2};
use crate::mixer::PathSet;
use crate::sample::{SampleSpec,Usec};
use std::collections::{BTreeMap,BTreeSet};
use std::sync::atomic::{AtomicBool,AtomicU64};
use std::sync::Arc;
use std::thread::JoinHandle;

//---------------------------------------------------------------------------------------------------- Source
/// A capture device.
///
/// Mutating operations live on [`Core`] (`core.source_*`); the
/// struct itself only exposes read access and cheap predicates.
pub struct Source {
	/// Stable index.
	pub index: u32,
	/// Unique registered name.
	pub name: String,
	/// Human description.
	pub description: String,
	/// Driver tag (who created this device).
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
	/// Residual software gain applied in the IO path.
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

	/// Attached outputs, ordered by index.
	pub(crate) outputs: BTreeSet<u32>,
	/// How many of them are corked.
	pub(crate) n_corked: u32,

	/// The sink whose mix this source captures, if any.
	pub monitor_of: Option<u32>,
	/// The master stream one level up the volume sharing tree
	/// (a source output owned by this filter source).
	pub output_from_master: Option<u32>,

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

	pub(crate) driver: Box<dyn SourceDriver>,
	pub(crate) msgq: Option<MsgQueue<SourceMsg, SourceReply>>,
	pub(crate) io_join: Option<JoinHandle<()>>,
	/// The IO driver, parked here between `new` and `put`.
	pub(crate) io_driver: Option<Box<dyn SourceIoDriver>>,
	/// Unplayed-bytes estimate shared with the monitored sink.
	pub(crate) monitor_unplayed: Option<Arc<AtomicU64>>,
}

impl Source {
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

	/// Indices of the attached outputs.
	pub fn outputs(&self) -> impl Iterator<Item = u32> + '_ {
		self.outputs.iter().copied()
	}

	/// How many streams are attached.
	pub fn linked_by(&self) -> usize {
		self.outputs.len()
	}

	/// How many attached streams are not corked.
	pub fn used_by(&self) -> usize {
		self.outputs.len() - self.n_corked as usize
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

impl std::fmt::Debug for Source {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Source")
			.field("index", &self.index)
			.field("name", &self.name)
			.field("state", &self.state)
			.field("spec", &self.spec)
			.field("outputs", &self.outputs)
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- SourceBuilder
/// The `new_data` candidate a driver fills before
/// [`Core::source_new`].
pub struct SourceBuilder {
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
	/// Monitor: the sink whose mix to capture.
	pub monitor_of: Option<u32>,
	/// Causes to start suspended with.
	pub suspend_cause: SuspendCause,
	/// Persistence hints.
	pub save_volume: bool,
	/// Persistence hints.
	pub save_muted: bool,
	/// Persistence hints.
	pub save_port: bool,

	/// Control-side driver.
	pub driver: Box<dyn SourceDriver>,
	/// IO-side driver, moved to the IO thread at `put`.
	pub io_driver: Box<dyn SourceIoDriver>,
}

impl SourceBuilder {
	/// A candidate with defaults.
	pub fn new(
		name: &str,
		driver: Box<dyn SourceDriver>,
		io_driver: Box<dyn SourceIoDriver>,
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
			monitor_of: None,
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

	/// Set the initial volume.
	#[must_use]
	pub fn volume(mut self, volume: ChannelVolumes) -> Self {
		self.volume = Some(volume);
		self
	}

	/// Mark as monitor of a sink.
	#[must_use]
	pub fn monitor_of(mut self, sink: u32) -> Self {
		self.monitor_of = Some(sink);
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

impl std::fmt::Debug for SourceBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SourceBuilder")
			.field("name", &self.name)
			.field("spec", &self.spec)
			.field("flags", &self.flags)
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- Core: lifecycle
impl Core {
	/// Create a source from a builder.
	///
	/// The source lands in `Init`; nothing runs until
	/// [`Core::source_put`].
	pub fn source_new(&mut self, mut builder: SourceBuilder) -> Result<u32, Error> {
		assert_ctl_context!();

		let mut hooks = std::mem::take(&mut self.hooks.source_new);
		let verdict = fire_new(&mut hooks, &mut builder);
		self.hooks.source_new = hooks;
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

		// A sharing device has no volume of its own to start from.
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

		let mut hooks = std::mem::take(&mut self.hooks.source_fixate);
		let verdict = fire_new(&mut hooks, &mut builder);
		self.hooks.source_fixate = hooks;
		if verdict == HookResult::Cancel {
			return Err(Error::NotSupported);
		}

		let mut flags = builder.flags;
		// Decibel volume only makes sense on a device that owns
		// its own volume.
		flags.decibel_volume = !flags.share_volume_with_master;

		let index = self.alloc_index();
		self.register_name(&builder.name, Facility::Source, index)?;

		let active_port = builder.active_port.clone().or_else(|| {
			builder
				.ports
				.iter()
				.max_by_key(|p| p.priority)
				.map(|p| p.name.clone())
		});

		if let Some(port) = &active_port {
			if builder.ports.iter().all(|p| p.name != *port) {
				self.unregister_name(&builder.name);
				return Err(Error::NoEntity);
			}
		}

		let reference_volume = builder
			.volume
			.unwrap_or_else(|| ChannelVolumes::norm(builder.spec.channels));

		let source = Source {
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
			outputs: BTreeSet::new(),
			n_corked: 0,
			monitor_of: builder.monitor_of,
			output_from_master: None,
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
			monitor_unplayed: None,
		};

		info2!("created source {index} \"{}\" with spec {}", source.name, source.spec);
		self.sources.insert(index, source);

		Ok(index)
	}

	/// Publish a source: spawn its IO thread and move it out of
	/// `Init`.
	pub fn source_put(&mut self, index: u32) -> Result<(), Error> {
		assert_ctl_context!();

		// Sharing devices inherit the whole volume triple from
		// their root before anything runs.
		if let Some(root) = self.source_shared_root(index) {
			if root != index {
				let (reference, real, root_map) = {
					let r = &self.sources[&root];
					(r.reference_volume, r.real_volume, r.map)
				};
				let s = self.sources.get_mut(&index).ok_or(Error::NoEntity)?;
				s.reference_volume = reference.remap(&root_map, &s.map);
				s.real_volume = real.remap(&root_map, &s.map);
				s.soft_volume = ChannelVolumes::norm(s.spec.channels);
			}
		}

		let monitor_feed = {
			let s = self.sources.get_mut(&index).ok_or(Error::NoEntity)?;

			if s.state != DeviceState::Init {
				return Err(Error::BadState);
			}
			debug_assert!(s.flags.is_consistent());

			let io_driver = s.io_driver.take().ok_or(Error::BadState)?;
			let (msgq, msg_rx) = MsgQueue::new();

			// Monitors get a dedicated channel the monitored
			// sink's IO thread feeds.
			let monitor = s.monitor_of.map(|sink| {
				let (tx, rx) = crossbeam::channel::unbounded();
				let unplayed = Arc::new(AtomicU64::new(0));
				s.monitor_unplayed = Some(Arc::clone(&unplayed));
				(sink, tx, rx, unplayed)
			});

			let join = io::SourceIo::init(io::InitArgs {
				index,
				spec: s.spec,
				map: s.map,
				flags: s.flags,
				soft_volume: s.soft_volume,
				real_volume: s.real_volume,
				muted: s.muted,
				safety_margin: self.config.deferred_volume_safety_margin,
				extra_delay: self.config.deferred_volume_extra_delay,
				driver: io_driver,
				to_ctl: self.reports_tx.clone(),
				msg_rx,
				monitor_rx: monitor.as_ref().map(|(_, _, rx, _)| rx.clone()),
				monitor_unplayed: s.monitor_unplayed.clone(),
			})
			.map_err(|_| Error::BadState)?;

			s.msgq = Some(msgq);
			s.io_join = Some(join);

			monitor.map(|(sink, tx, _, unplayed)| (sink, tx, unplayed))
		};

		// Monitors: wire the sink's mix into our IO thread.
		if let Some((sink, chunks, unplayed)) = monitor_feed {
			let feed = crate::device::msg::MonitorFeed { chunks, unplayed };
			if let Some(sink_q) = self.sinks.get(&sink).and_then(|s| s.msgq.clone()) {
				match sink_q.send(SinkMsg::SetMonitor(Some(feed))) {
					SinkReply::Ack => {},
					_ => warn2!("sink {sink} did not accept monitor feed"),
				}
			}
		}

		// INIT -> SUSPENDED or IDLE.
		let target = if self.sources[&index].suspend_cause.any() {
			DeviceState::Suspended
		} else {
			DeviceState::Idle
		};
		self.source_set_state(index, target)?;

		self.subscription_post(Facility::Source, EventKind::New, index);
		Ok(())
	}

	/// Remove a source: kill the attached streams, stop the IO
	/// thread, unregister.
	pub fn source_unlink(&mut self, index: u32) {
		assert_ctl_context!();

		let Some(s) = self.sources.get(&index) else { return };
		if s.state == DeviceState::Unlinked {
			return;
		}

		let linked = s.state.is_linked();
		let name = s.name.clone();

		// Kill every attached stream first (a caller that wants to
		// migrate them uses source_move_all_start beforehand).
		for output in self.sources[&index].outputs.clone() {
			self.source_output_kill(output);
		}

		if linked {
			drop(self.source_set_state(index, DeviceState::Unlinked));
		} else if let Some(s) = self.sources.get_mut(&index) {
			s.state = DeviceState::Unlinked;
		}

		let s = self.sources.get_mut(&index).unwrap();
		if let Some(q) = s.msgq.take() {
			q.send(SourceMsg::Shutdown);
		}
		if let Some(join) = s.io_join.take() {
			drop(join.join());
		}

		self.unregister_name(&name);
		self.sources.remove(&index);

		if linked {
			self.subscription_post(Facility::Source, EventKind::Remove, index);
		}

		debug2!("unlinked source {index} \"{name}\"");
	}

	//---------------------------------------------------------------------------------------------------- Ports
	/// Switch the active port.
	///
	/// On deferred-volume devices the switch is a round-trip to
	/// the IO thread; the call returns once it acknowledged.
	pub fn source_set_port(&mut self, index: u32, name: &str, save: bool) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sources.get_mut(&index).ok_or(Error::NoEntity)?;
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
			match q.send(SourceMsg::SetPort(name.to_owned())) {
				SourceReply::Status(result) => result?,
				_ => return Err(Error::NotImplemented),
			}
		} else {
			s.driver.set_port(name)?;
		}

		let s = self.sources.get_mut(&index).unwrap();
		s.active_port = Some(name.to_owned());
		s.save_port = save;

		if let Some(q) = &s.msgq {
			q.send(SourceMsg::SetLatencyOffset(latency_offset));
		}

		self.subscription_post(Facility::Source, EventKind::Change, index);
		Ok(())
	}

	/// A jack changed state: update the availability of the ports
	/// behind the jack's path.
	pub fn source_jack_event(&mut self, index: u32, jack_name: &str, plugged: bool) {
		assert_ctl_context!();

		let Some(s) = self.sources.get_mut(&index) else { return };
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
			self.subscription_post(Facility::Source, EventKind::Change, index);
		}
	}

	//---------------------------------------------------------------------------------------------------- Latency
	/// The device's current capture latency.
	pub fn source_get_latency(&self, index: u32) -> Result<Usec, Error> {
		assert_ctl_context!();

		let s = self.sources.get(&index).ok_or(Error::NoEntity)?;
		if !s.state.is_linked() {
			return Err(Error::BadState);
		}
		if !s.flags.latency {
			return Ok(0);
		}

		let q = s.msgq.clone().ok_or(Error::BadState)?;
		match q.send(SourceMsg::GetLatency) {
			SourceReply::Latency(l) => Ok(l),
			_ => Err(Error::NotImplemented),
		}
	}

	/// Constrain the dynamic latency range.
	pub fn source_set_latency_range(&mut self, index: u32, min: Usec, max: Usec) -> Result<(), Error> {
		assert_ctl_context!();

		let min = min.max(MIN_LATENCY);
		let max = max.min(MAX_LATENCY);
		if min > max {
			return Err(Error::Invalid);
		}

		let s = self.sources.get_mut(&index).ok_or(Error::NoEntity)?;
		if !s.flags.dynamic_latency {
			return Err(Error::NotSupported);
		}

		s.min_latency = min;
		s.max_latency = max;

		if let Some(q) = &s.msgq {
			q.send(SourceMsg::SetLatencyRange(min, max));
		}
		Ok(())
	}

	/// Pin the latency of a fixed-latency device.
	pub fn source_set_fixed_latency(&mut self, index: u32, latency: Usec) -> Result<(), Error> {
		assert_ctl_context!();

		let latency = latency.clamp(MIN_LATENCY, MAX_LATENCY);
		let s = self.sources.get_mut(&index).ok_or(Error::NoEntity)?;
		if s.flags.dynamic_latency {
			return Err(Error::NotSupported);
		}

		s.fixed_latency = latency;
		if let Some(q) = &s.msgq {
			q.send(SourceMsg::SetFixedLatency(latency));
		}
		Ok(())
	}

	/// The latency the attached streams collectively asked for,
	/// min-reduced and clamped on the IO side. Fixed-latency
	/// devices report their pinned value.
	pub fn source_get_requested_latency(&self, index: u32) -> Result<Option<Usec>, Error> {
		assert_ctl_context!();

		let s = self.sources.get(&index).ok_or(Error::NoEntity)?;
		if !s.state.is_linked() {
			return Err(Error::BadState);
		}

		let q = s.msgq.clone().ok_or(Error::BadState)?;
		match q.send(SourceMsg::GetRequestedLatency) {
			SourceReply::RequestedLatency(l) => Ok(l),
			_ => Err(Error::NotImplemented),
		}
	}

	/// Un-read `nbytes` (device sample spec) across every attached
	/// stream. Monitor sources call this when their sink rewinds;
	/// capture drivers call it when they drop ring buffer content.
	pub fn source_process_rewind(&mut self, index: u32, nbytes: usize) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sources.get(&index).ok_or(Error::NoEntity)?;
		if !s.state.is_opened() {
			return Err(Error::BadState);
		}

		if let Some(q) = s.msgq.clone() {
			q.post(SourceMsg::ProcessRewind(nbytes));
		}
		Ok(())
	}

	/// Widen or narrow the rewind window of the device.
	pub fn source_set_max_rewind(&mut self, index: u32, nbytes: usize) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sources.get_mut(&index).ok_or(Error::NoEntity)?;
		s.max_rewind = nbytes;
		if let Some(q) = &s.msgq {
			q.send(SourceMsg::SetMaxRewind(nbytes));
		}
		Ok(())
	}

	//---------------------------------------------------------------------------------------------------- Sharing tree
	/// Walk `output_from_master` edges to the non-sharing root.
	///
	/// `None` when an edge dangles; the walk is bounded so a
	/// cyclic graph cannot hang the control thread.
	pub fn source_shared_root(&self, index: u32) -> Option<u32> {
		let mut current = index;

		for _ in 0..crate::device::SHARE_WALK_LIMIT {
			let s = self.sources.get(&current)?;
			if !s.flags.share_volume_with_master {
				return Some(current);
			}

			let master_stream = s.output_from_master?;
			current = self.source_outputs.get(&master_stream)?.source?;
		}

		None
	}

	/// Is flat volume in effect for this device (decided at the
	/// sharing root)?
	pub fn source_flat_volume_enabled(&self, index: u32) -> bool {
		self.source_shared_root(index)
			.and_then(|root| self.sources.get(&root))
			.map(|s| s.flags.flat_volume)
			.unwrap_or(false)
	}

	//---------------------------------------------------------------------------------------------------- Passthrough
	/// Is a passthrough stream attached (or is this the monitor
	/// of a passthrough sink)?
	pub fn source_is_passthrough(&self, index: u32) -> bool {
		let Some(s) = self.sources.get(&index) else { return false };

		if let Some(sink) = s.monitor_of {
			if self.sink_is_passthrough(sink) {
				return true;
			}
		}

		s.outputs
			.iter()
			.filter_map(|o| self.source_outputs.get(o))
			.any(crate::stream::SourceOutput::is_passthrough)
	}

	pub(crate) fn source_enter_passthrough(&mut self, index: u32) {
		let Some(s) = self.sources.get(&index) else { return };

		// Volume is meaningless on a compressed bitstream; park
		// the user volume and pin the device to 0 dB.
		let saved = (s.reference_volume, s.save_volume);
		let norm = ChannelVolumes::norm(s.spec.channels);

		self.sources.get_mut(&index).unwrap().saved_volume = Some(saved);
		self.source_set_volume(index, Some(&norm), true, false);
	}

	pub(crate) fn source_leave_passthrough(&mut self, index: u32) {
		let Some(s) = self.sources.get_mut(&index) else { return };

		if let Some((volume, save)) = s.saved_volume.take() {
			self.source_set_volume(index, Some(&volume), true, save);
		}
	}

	//---------------------------------------------------------------------------------------------------- Misc
	/// Update the description and tell subscribers.
	pub fn source_set_description(&mut self, index: u32, description: &str) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sources.get_mut(&index).ok_or(Error::NoEntity)?;
		if s.description == description {
			return Ok(());
		}

		s.description = description.to_owned();
		if s.state.is_linked() {
			self.subscription_post(Facility::Source, EventKind::Change, index);
		}
		Ok(())
	}

	/// Merge properties and tell subscribers.
	pub fn source_update_props(&mut self, index: u32, props: &BTreeMap<String, String>) -> Result<(), Error> {
		assert_ctl_context!();

		let s = self.sources.get_mut(&index).ok_or(Error::NoEntity)?;
		for (k, v) in props {
			s.props.insert(k.clone(), v.clone());
		}

		if s.state.is_linked() {
			self.subscription_post(Facility::Source, EventKind::Change, index);
		}
		Ok(())
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use crate::channel::Volume;
	use crate::chunk::MemChunk;
	use crate::device::driver::SourceEvent;
	use crate::device::port::Available;
	use crate::tests::{attach_output,flat_source,source_with_flags,TestCore};
	use pretty_assertions::assert_eq;
	use std::time::Duration;

	fn stereo_ports() -> Vec<DevicePort> {
		vec![
			DevicePort {
				name: "analog-input-microphone".into(),
				description: "Microphone".into(),
				direction: crate::mixer::Direction::Capture,
				priority: 900,
				available: Available::Unknown,
				latency_offset: 0,
				path_name: "analog-input-microphone".into(),
				setting_name: None,
			},
			DevicePort {
				name: "analog-input-linein".into(),
				description: "Line In".into(),
				direction: crate::mixer::Direction::Capture,
				priority: 100,
				available: Available::Unknown,
				latency_offset: 1_000,
				path_name: "analog-input-linein".into(),
				setting_name: None,
			},
		]
	}

	#[test]
	fn highest_priority_port_becomes_active() {
		let mut t = TestCore::new();
		let mut builder = t.source_builder("a", DeviceFlags::NONE);
		builder.ports = stereo_ports();
		let a = t.add_source(builder);

		let s = t.core.source(a).unwrap();
		assert_eq!(s.active_port.as_deref(), Some("analog-input-microphone"));
	}

	#[test]
	fn deferred_port_switch_round_trips_through_io_thread() {
		// Spec property: on a deferred-volume device, set_port
		// returns only after the IO thread acknowledged, and both
		// sides agree on the active port at return.
		let mut t = TestCore::new();
		let mut builder = t.source_builder("a", DeviceFlags {
			deferred_volume: true,
			hw_volume_ctrl: true,
			..DeviceFlags::NONE
		});
		builder.ports = stereo_ports();
		let a = t.add_source(builder);

		t.core.source_set_port(a, "analog-input-linein", true).unwrap();

		// The switch ran on the IO side (recorded with the IO tag),
		// strictly before this call returned.
		{
			let driver = t.source_handles[&a].state.lock().unwrap();
			assert_eq!(driver.ports, vec![("analog-input-linein".to_owned(), true)]);
		}
		let s = t.core.source(a).unwrap();
		assert_eq!(s.active_port.as_deref(), Some("analog-input-linein"));
		assert!(s.save_port);

		// Unknown ports are refused outright.
		assert_eq!(
			t.core.source_set_port(a, "hdmi-input", false),
			Err(Error::NoEntity),
		);
	}

	#[test]
	fn non_deferred_port_switch_uses_control_driver() {
		let mut t = TestCore::new();
		let mut builder = t.source_builder("a", DeviceFlags::NONE);
		builder.ports = stereo_ports();
		let a = t.add_source(builder);

		t.core.source_set_port(a, "analog-input-linein", false).unwrap();

		let driver = t.source_handles[&a].state.lock().unwrap();
		assert_eq!(driver.ports, vec![("analog-input-linein".to_owned(), false)]);
	}

	#[test]
	fn capture_data_reaches_streams_with_volume_applied() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let x = attach_output(&mut t, a);

		// Halve the stream's volume (flat mode folds it into the
		// device real volume; the device has no hardware control,
		// so it lands in the device soft volume).
		let mut half = crate::channel::ChannelVolumes::norm(2);
		half.values[0] = Volume(0x8000);
		half.values[1] = Volume(0x8000);
		t.core.source_output_set_volume(x, &half, false, true).unwrap();

		// Feed one chunk of full-scale samples.
		let frames = 32;
		t.source_handles[&a]
			.feed
			.send(SourceEvent::Chunk(MemChunk::from_f32(&vec![1.0_f32; frames * 2])))
			.unwrap();

		// Chunks travel the driver event channel, not the message
		// queue, so there is no barrier to hide behind: poll.
		let deadline = std::time::Instant::now() + Duration::from_secs(2);
		let pushed = loop {
			let pushed = t.output_handles[&x].lock().unwrap().pushed.clone();
			if !pushed.is_empty() || std::time::Instant::now() > deadline {
				break pushed;
			}
			std::thread::sleep(Duration::from_millis(1));
		};

		assert_eq!(pushed.len(), 1, "stream never received the chunk");
		let samples = pushed[0].to_f32();
		assert_eq!(samples.len(), frames * 2);

		// Device soft volume 0.5 -> cubic factor 0.125.
		let expected = Volume(0x8000).to_linear() as f32;
		assert!((samples[0] - expected).abs() < 0.01, "{} vs {expected}", samples[0]);
	}

	#[test]
	fn muted_stream_receives_silence() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let x = attach_output(&mut t, a);

		t.core.source_output_set_mute(x, true, false).unwrap();

		t.source_handles[&a]
			.feed
			.send(SourceEvent::Chunk(MemChunk::from_f32(&[1.0, 1.0, 1.0, 1.0])))
			.unwrap();

		let deadline = std::time::Instant::now() + Duration::from_secs(2);
		let pushed = loop {
			let pushed = t.output_handles[&x].lock().unwrap().pushed.clone();
			if !pushed.is_empty() || std::time::Instant::now() > deadline {
				break pushed;
			}
			std::thread::sleep(Duration::from_millis(1));
		};

		assert_eq!(pushed.len(), 1);
		assert!(pushed[0].to_f32().iter().all(|s| *s == 0.0));
	}

	#[test]
	fn deferred_volume_writes_are_scheduled() {
		let mut t = TestCore::new();
		let a = source_with_flags(&mut t, "a", DeviceFlags {
			deferred_volume: true,
			hw_volume_ctrl: true,
			flat_volume: true,
			..DeviceFlags::NONE
		});
		let _x = attach_output(&mut t, a);

		let mut v = crate::channel::ChannelVolumes::norm(2);
		v.values[0] = Volume(0x8000);
		v.values[1] = Volume(0x8000);
		t.core.source_set_volume(a, Some(&v), true, false);

		// The scheduled change commits on a later IO iteration.
		let deadline = std::time::Instant::now() + Duration::from_secs(2);
		let written = loop {
			let written = t.source_handles[&a].state.lock().unwrap().written_volumes.clone();
			if !written.is_empty() || std::time::Instant::now() > deadline {
				break written;
			}
			std::thread::sleep(Duration::from_millis(5));
		};

		assert!(!written.is_empty(), "no deferred hardware write happened");
		// hw = real / soft; soft is norm on a hw-volume device.
		assert_eq!(written.last().unwrap().values[0], Volume(0x8000));
	}

	#[test]
	fn unlink_kills_streams_and_stops_io() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");
		let x = attach_output(&mut t, a);

		t.core.source_unlink(a);

		assert!(t.core.source(a).is_none());
		assert!(t.core.source_output(x).is_none());
		assert!(t.output_handles[&x].lock().unwrap().killed);

		// The name is free again.
		let builder = t.source_builder("a", DeviceFlags::NONE);
		t.add_source(builder);
	}

	#[test]
	fn get_latency_asks_the_io_driver() {
		let mut t = TestCore::new();
		let a = source_with_flags(&mut t, "a", DeviceFlags { latency: true, ..DeviceFlags::NONE });

		*t.source_handles[&a].latency.lock().unwrap() = 1_234;
		assert_eq!(t.core.source_get_latency(a).unwrap(), 1_234);

		// Devices that cannot report latency answer zero.
		let b = source_with_flags(&mut t, "b", DeviceFlags::NONE);
		assert_eq!(t.core.source_get_latency(b).unwrap(), 0);
	}

	#[test]
	fn monitor_receives_the_sink_mix() {
		let mut t = TestCore::new();
		let sink = t.dummy_sink("sink");
		let mon = t.monitor_source("mon", sink);
		let x = attach_output(&mut t, mon);

		// Put something on the sink side and render.
		let input = {
			let builder = t.input_builder(sink);
			t.add_input(builder)
		};
		t.input_handles[&input].lock().unwrap().to_pop.push_back(
			MemChunk::from_f32(&vec![0.5_f32; 64]),
		);
		t.core.sink_render(sink, 64 * 4).unwrap();

		// The mix crosses two IO threads; poll.
		let deadline = std::time::Instant::now() + Duration::from_secs(2);
		let pushed = loop {
			let pushed = t.output_handles[&x].lock().unwrap().pushed.clone();
			if !pushed.is_empty() || std::time::Instant::now() > deadline {
				break pushed;
			}
			std::thread::sleep(Duration::from_millis(1));
		};

		assert!(!pushed.is_empty(), "monitor stream saw no data");
		assert!(pushed[0].to_f32().iter().any(|s| *s != 0.0));
	}

	#[test]
	fn rewind_reaches_rewindable_streams() {
		let mut t = TestCore::new();
		let a = flat_source(&mut t, "a");

		let x = {
			let builder = t.output_builder_rewindable(a);
			t.add_output(builder)
		};

		t.source_handles[&a]
			.feed
			.send(SourceEvent::Chunk(MemChunk::from_f32(&vec![0.5_f32; 256])))
			.unwrap();

		t.core.source_process_rewind(a, 512).unwrap();
		// A blocking send orders us behind the posted rewind.
		t.core.source_set_max_rewind(a, 0).unwrap();

		let state = t.output_handles[&x].lock().unwrap();
		assert_eq!(state.rewound, 512);
	}

	#[test]
	fn jack_events_update_port_availability() {
		use crate::mixer::{DummyElement,DummyMixer,Direction,PathConfig,PathSet};
		use crate::mixer::{ElementConfig,JackConfig,Required,VolumeConfig};

		let mut mixer = DummyMixer::new()
			.with_element("Mic", DummyElement::stereo_volume(Direction::Capture, 0, 64, -6_400, 0))
			.with_jack("Mic Jack", false);

		let mut cfg = PathConfig::new("analog-input-microphone", Direction::Capture);
		let mut e = ElementConfig::new("Mic");
		e.volume = VolumeConfig::Merge;
		cfg.elements.push(e);
		cfg.jacks.push(JackConfig {
			name: "Mic".into(),
			state_plugged: Available::Yes,
			state_unplugged: Available::No,
			required: Required::Ignore,
			required_any: Required::Ignore,
			required_absent: Required::Ignore,
		});

		let mut set = PathSet::from_configs(&[cfg], &[], Direction::Capture);
		set.probe(&mut mixer, false).unwrap();

		let mut t = TestCore::new();
		let builder = t.source_builder("a", DeviceFlags::NONE).with_path_set(set);
		let a = t.add_source(builder);

		assert_eq!(t.core.source(a).unwrap().ports[0].available, Available::No);

		t.core.source_jack_event(a, "Mic Jack", true);
		assert_eq!(t.core.source(a).unwrap().ports[0].available, Available::Yes);
	}
}
