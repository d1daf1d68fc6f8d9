//! The core object: registries, defaults, event fan-out.

//---------------------------------------------------------------------------------------------------- use
use crate::device::msg::Report;
use crate::device::{Sink,Source};
use crate::error::Error;
use crate::hook::Hooks;
use crate::macros::{assert_ctl_context,try_send};
use crate::sample::Usec;
use crate::stream::{SinkInput,SourceOutput};
use crossbeam::channel::{unbounded,Receiver,Sender};
use std::collections::{BTreeMap,HashMap};
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- Subscription events
/// What kind of object an event is about.
#[derive(Copy,Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Facility {
	/// A capture device.
	Source,
	/// A playback device.
	Sink,
	/// A capture stream.
	SourceOutput,
	/// A playback stream.
	SinkInput,
}

/// What happened to it.
#[derive(Copy,Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
	/// Object appeared.
	New,
	/// Object changed.
	Change,
	/// Object disappeared.
	Remove,
}

/// One event on the subscription bus. The bus itself (delivery
/// to clients) lives outside this crate; the embedder drains the
/// receiver obtained from [`Core::take_subscription_receiver`].
#[derive(Copy,Clone,Debug,PartialEq,Eq)]
pub struct SubscriptionEvent {
	/// Object kind.
	pub facility: Facility,
	/// What happened.
	pub kind: EventKind,
	/// The object's index.
	pub index: u32,
}

//---------------------------------------------------------------------------------------------------- CoreConfig
/// Tunables of a [`Core`].
#[derive(Clone,Debug)]
pub struct CoreConfig {
	/// Preferred device rate.
	pub default_rate: u32,
	/// Second rate family devices may switch to.
	pub alternate_rate: u32,
	/// Largest block the render path hands out in one piece.
	pub max_block_size: usize,
	/// Safety margin between scheduled hardware volume changes.
	pub deferred_volume_safety_margin: Usec,
	/// Constant shift applied to scheduled hardware volumes.
	pub deferred_volume_extra_delay: i64,
}

impl Default for CoreConfig {
	fn default() -> Self {
		Self {
			default_rate: 44_100,
			alternate_rate: 48_000,
			max_block_size: 64 * 1024,
			deferred_volume_safety_margin: crate::device::VolumeChangeQueue::DEFAULT_SAFETY_MARGIN,
			deferred_volume_extra_delay: 0,
		}
	}
}

//---------------------------------------------------------------------------------------------------- Core
/// Cross-device registries and hook lists.
///
/// Owned by the control thread; every operation in this crate
/// that is documented as control-context goes through `&mut Core`.
pub struct Core {
	/// Tunables.
	pub config: CoreConfig,
	/// Hook lists.
	pub hooks: Hooks,

	pub(crate) sources: BTreeMap<u32, Source>,
	pub(crate) sinks: BTreeMap<u32, Sink>,
	pub(crate) source_outputs: BTreeMap<u32, SourceOutput>,
	pub(crate) sink_inputs: BTreeMap<u32, SinkInput>,

	/// Device name registry.
	names: HashMap<String, (Facility, u32)>,
	/// Shared index allocator; indices are never reused.
	next_index: u32,

	events_tx: Sender<SubscriptionEvent>,
	events_rx: Option<Receiver<SubscriptionEvent>>,

	pub(crate) reports_tx: Sender<Report>,
	reports_rx: Receiver<Report>,
}

impl Core {
	/// A fresh, empty core.
	pub fn new(config: CoreConfig) -> Self {
		let (events_tx, events_rx) = unbounded();
		let (reports_tx, reports_rx) = unbounded();

		Self {
			config,
			hooks: Hooks::default(),
			sources: BTreeMap::new(),
			sinks: BTreeMap::new(),
			source_outputs: BTreeMap::new(),
			sink_inputs: BTreeMap::new(),
			names: HashMap::new(),
			next_index: 0,
			events_tx,
			events_rx: Some(events_rx),
			reports_tx,
			reports_rx,
		}
	}

	//---------------------------------------------------------------------------------------------------- Events
	/// The subscription event stream. Can be taken once.
	pub fn take_subscription_receiver(&mut self) -> Option<Receiver<SubscriptionEvent>> {
		self.events_rx.take()
	}

	pub(crate) fn subscription_post(&self, facility: Facility, kind: EventKind, index: u32) {
		try_send!(self.events_tx, SubscriptionEvent { facility, kind, index });
	}

	/// Drain the IO threads' upward reports and reconcile
	/// hardware-originated volume/mute changes.
	///
	/// The embedder calls this from its event loop whenever
	/// convenient (no report is time-critical).
	pub fn process_reports(&mut self) {
		assert_ctl_context!();

		while let Ok(report) = self.reports_rx.try_recv() {
			match report {
				Report::SourceVolumeAndMute { index, real_volume, muted } => {
					if let Some(v) = real_volume {
						self.source_volume_changed(index, &v);
					}
					if let Some(m) = muted {
						self.source_mute_changed(index, m);
					}
				},
				Report::SinkVolumeAndMute { index, real_volume, muted } => {
					if let Some(v) = real_volume {
						self.sink_volume_changed(index, &v);
					}
					if let Some(m) = muted {
						self.sink_mute_changed(index, m);
					}
				},
			}
		}
	}

	//---------------------------------------------------------------------------------------------------- Registry
	pub(crate) fn alloc_index(&mut self) -> u32 {
		let index = self.next_index;
		self.next_index += 1;
		index
	}

	/// Reserve a device name.
	pub(crate) fn register_name(&mut self, name: &str, facility: Facility, index: u32) -> Result<(), Error> {
		if name.is_empty() || !name.chars().all(|c| c.is_ascii_graphic()) {
			return Err(Error::Invalid);
		}
		if self.names.contains_key(name) {
			return Err(Error::Invalid);
		}

		self.names.insert(name.to_owned(), (facility, index));
		Ok(())
	}

	pub(crate) fn unregister_name(&mut self, name: &str) {
		self.names.remove(name);
	}

	//---------------------------------------------------------------------------------------------------- Lookup
	/// A source by index.
	pub fn source(&self, index: u32) -> Option<&Source> {
		self.sources.get(&index)
	}

	/// A sink by index.
	pub fn sink(&self, index: u32) -> Option<&Sink> {
		self.sinks.get(&index)
	}

	/// A source output by index.
	pub fn source_output(&self, index: u32) -> Option<&SourceOutput> {
		self.source_outputs.get(&index)
	}

	/// A sink input by index.
	pub fn sink_input(&self, index: u32) -> Option<&SinkInput> {
		self.sink_inputs.get(&index)
	}

	/// A source by registered name.
	pub fn source_by_name(&self, name: &str) -> Option<&Source> {
		match self.names.get(name) {
			Some((Facility::Source, index)) => self.sources.get(index),
			_ => None,
		}
	}

	/// A sink by registered name.
	pub fn sink_by_name(&self, name: &str) -> Option<&Sink> {
		match self.names.get(name) {
			Some((Facility::Sink, index)) => self.sinks.get(index),
			_ => None,
		}
	}

	/// All source indices.
	pub fn source_indices(&self) -> Vec<u32> {
		self.sources.keys().copied().collect()
	}

	/// All sink indices.
	pub fn sink_indices(&self) -> Vec<u32> {
		self.sinks.keys().copied().collect()
	}

	//---------------------------------------------------------------------------------------------------- Suspend all
	/// Suspend or resume every device with one cause.
	pub fn suspend_all(&mut self, suspend: bool, cause: crate::device::SuspendCause) {
		assert_ctl_context!();

		for index in self.source_indices() {
			// Monitor sources refuse every external cause; their
			// lifecycle follows the monitored sink.
			drop(self.source_suspend(index, suspend, cause));
		}
		for index in self.sink_indices() {
			drop(self.sink_suspend(index, suspend, cause));
		}
	}
}

impl std::fmt::Debug for Core {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Core")
			.field("sources", &self.sources.len())
			.field("sinks", &self.sinks.len())
			.field("source_outputs", &self.source_outputs.len())
			.field("sink_inputs", &self.sink_inputs.len())
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn name_registry_rejects_duplicates_and_garbage() {
		let mut core = Core::new(CoreConfig::default());

		core.register_name("alsa_input.pci-0000", Facility::Source, 0).unwrap();
		assert_eq!(
			core.register_name("alsa_input.pci-0000", Facility::Source, 1),
			Err(Error::Invalid),
		);
		assert_eq!(core.register_name("", Facility::Source, 2), Err(Error::Invalid));
		assert_eq!(core.register_name("white space", Facility::Source, 3), Err(Error::Invalid));

		core.unregister_name("alsa_input.pci-0000");
		core.register_name("alsa_input.pci-0000", Facility::Source, 4).unwrap();
	}

	#[test]
	fn indices_are_never_reused() {
		let mut core = Core::new(CoreConfig::default());
		let a = core.alloc_index();
		let b = core.alloc_index();
		assert!(b > a);
	}
}
