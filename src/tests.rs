//! These are helper functions used for testing throughout the codebase.

//---------------------------------------------------------------------------------------------------- Use
use crate::channel::{ChannelMap,ChannelVolumes};
use crate::core::{Core,CoreConfig};
use crate::device::{
	DeviceFlags,DummySinkDriver,DummySinkHandle,DummySourceDriver,DummySourceHandle,
	SinkBuilder,SourceBuilder,
};
use crate::sample::{SampleFormat,SampleSpec};
use crate::stream::{
	DummySinkInput,DummySinkInputHandle,DummySourceOutput,DummySourceOutputHandle,
	SinkInputBuilder,SourceOutputBuilder,
};
use std::collections::BTreeMap;

//---------------------------------------------------------------------------------------------------- TestCore
/// A core plus the dummy-driver handles of everything created
/// through the helpers below.
pub(crate) struct TestCore {
	pub(crate) core: Core,
	pub(crate) source_handles: BTreeMap<u32, DummySourceHandle>,
	pub(crate) sink_handles: BTreeMap<u32, DummySinkHandle>,
	pub(crate) output_handles: BTreeMap<u32, DummySourceOutputHandle>,
	pub(crate) input_handles: BTreeMap<u32, DummySinkInputHandle>,

	pending_source: Option<DummySourceHandle>,
	pending_sink: Option<DummySinkHandle>,
	pending_output: Option<DummySourceOutputHandle>,
	pending_input: Option<DummySinkInputHandle>,
}

/// The spec every test device runs unless stated otherwise.
pub(crate) const TEST_SPEC: SampleSpec = SampleSpec {
	format:   SampleFormat::F32Le,
	rate:     44_100,
	channels: 2,
};

impl TestCore {
	pub(crate) fn new() -> Self {
		Self {
			core: Core::new(CoreConfig::default()),
			source_handles: BTreeMap::new(),
			sink_handles: BTreeMap::new(),
			output_handles: BTreeMap::new(),
			input_handles: BTreeMap::new(),
			pending_source: None,
			pending_sink: None,
			pending_output: None,
			pending_input: None,
		}
	}

	//---------------------------------------------------------------------------------------------------- Builders
	/// A source builder backed by dummy drivers.
	pub(crate) fn source_builder(&mut self, name: &str, flags: DeviceFlags) -> SourceBuilder {
		let (ctl, io, handle) = DummySourceDriver::new();
		self.pending_source = Some(handle);
		SourceBuilder::new(name, ctl, io).spec(TEST_SPEC).flags(flags)
	}

	/// `source_new` + `source_put` + handle bookkeeping.
	pub(crate) fn add_source(&mut self, builder: SourceBuilder) -> u32 {
		let index = self.core.source_new(builder).unwrap();
		self.core.source_put(index).unwrap();
		if let Some(handle) = self.pending_source.take() {
			self.source_handles.insert(index, handle);
		}
		index
	}

	/// A sink builder backed by dummy drivers.
	pub(crate) fn sink_builder(&mut self, name: &str, flags: DeviceFlags) -> SinkBuilder {
		let (ctl, io, handle) = DummySinkDriver::new();
		self.pending_sink = Some(handle);
		SinkBuilder::new(name, ctl, io).spec(TEST_SPEC).flags(flags)
	}

	/// `sink_new` + `sink_put` + handle bookkeeping.
	pub(crate) fn add_sink(&mut self, builder: SinkBuilder) -> u32 {
		let index = self.core.sink_new(builder).unwrap();
		self.core.sink_put(index).unwrap();
		if let Some(handle) = self.pending_sink.take() {
			self.sink_handles.insert(index, handle);
		}
		index
	}

	/// A plain sink with no flags.
	pub(crate) fn dummy_sink(&mut self, name: &str) -> u32 {
		let builder = self.sink_builder(name, DeviceFlags::NONE);
		self.add_sink(builder)
	}

	/// A monitor source capturing `sink`'s mix.
	pub(crate) fn monitor_source(&mut self, name: &str, sink: u32) -> u32 {
		let builder = self.source_builder(name, DeviceFlags::NONE).monitor_of(sink);
		self.add_source(builder)
	}

	/// A source output builder backed by dummy drivers.
	pub(crate) fn output_builder(&mut self, source: u32) -> SourceOutputBuilder {
		let (ctl, io, handle) = DummySourceOutput::new(false);
		self.pending_output = Some(handle);
		SourceOutputBuilder::new("stream", source, ctl, io)
	}

	/// Same, but the stream takes rewinds.
	pub(crate) fn output_builder_rewindable(&mut self, source: u32) -> SourceOutputBuilder {
		let (ctl, io, handle) = DummySourceOutput::new(true);
		self.pending_output = Some(handle);
		SourceOutputBuilder::new("stream", source, ctl, io)
	}

	/// `source_output_new` + `put` + handle bookkeeping.
	pub(crate) fn add_output(&mut self, builder: SourceOutputBuilder) -> u32 {
		let index = self.core.source_output_new(builder).unwrap();
		self.core.source_output_put(index).unwrap();
		if let Some(handle) = self.pending_output.take() {
			self.output_handles.insert(index, handle);
		}
		index
	}

	/// A sink input builder backed by dummy drivers.
	pub(crate) fn input_builder(&mut self, sink: u32) -> SinkInputBuilder {
		let (ctl, io, handle) = DummySinkInput::new(false);
		self.pending_input = Some(handle);
		SinkInputBuilder::new("stream", sink, ctl, io)
	}

	/// Same, but the stream takes rewinds.
	pub(crate) fn input_builder_rewindable(&mut self, sink: u32) -> SinkInputBuilder {
		let (ctl, io, handle) = DummySinkInput::new(true);
		self.pending_input = Some(handle);
		SinkInputBuilder::new("stream", sink, ctl, io)
	}

	/// `sink_input_new` + `put` + handle bookkeeping.
	pub(crate) fn add_input(&mut self, builder: SinkInputBuilder) -> u32 {
		let index = self.core.sink_input_new(builder).unwrap();
		self.core.sink_input_put(index).unwrap();
		if let Some(handle) = self.pending_input.take() {
			self.input_handles.insert(index, handle);
		}
		index
	}
}

//---------------------------------------------------------------------------------------------------- Free helpers
/// A flat-volume stereo source.
pub(crate) fn flat_source(t: &mut TestCore, name: &str) -> u32 {
	let builder = t.source_builder(name, DeviceFlags { flat_volume: true, ..DeviceFlags::NONE });
	t.add_source(builder)
}

/// A source with arbitrary flags.
pub(crate) fn source_with_flags(t: &mut TestCore, name: &str, flags: DeviceFlags) -> u32 {
	let builder = t.source_builder(name, flags);
	t.add_source(builder)
}

/// A flat-volume 5.1 source.
pub(crate) fn surround_flat_source(t: &mut TestCore, name: &str) -> u32 {
	let builder = t
		.source_builder(name, DeviceFlags { flat_volume: true, ..DeviceFlags::NONE })
		.spec(SampleSpec { channels: 6, ..TEST_SPEC })
		.map(ChannelMap::SURROUND_5_1);
	t.add_source(builder)
}

/// A filter source sharing its volume with `master`'s tree,
/// wired up through its master-link stream.
pub(crate) fn shared_source(t: &mut TestCore, name: &str, master: u32) -> u32 {
	let builder = t.source_builder(name, DeviceFlags {
		share_volume_with_master: true,
		..DeviceFlags::NONE
	});
	let filter = t.core.source_new(builder).unwrap();

	// The master link: reads from `master`, feeds `filter`.
	let mut link = t.output_builder(master);
	link.name = format!("{name}-master-link");
	link.destination_source = Some(filter);
	let link = t.core.source_output_new(link).unwrap();

	t.core.source_put(filter).unwrap();
	t.core.source_output_put(link).unwrap();

	if let Some(handle) = t.pending_source.take() {
		t.source_handles.insert(filter, handle);
	}
	if let Some(handle) = t.pending_output.take() {
		t.output_handles.insert(link, handle);
	}

	filter
}

/// A stream with an absolute volume on `source`.
pub(crate) fn output_with_volume(t: &mut TestCore, source: u32, volume: ChannelVolumes) -> u32 {
	let mut builder = t.output_builder(source);
	builder.volume = Some(volume);
	builder.volume_is_absolute = true;
	t.add_output(builder)
}

/// A plain running stream on `source`.
pub(crate) fn attach_output(t: &mut TestCore, source: u32) -> u32 {
	let builder = t.output_builder(source);
	t.add_output(builder)
}

/// A flat-volume stereo sink.
pub(crate) fn flat_sink(t: &mut TestCore, name: &str) -> u32 {
	let builder = t.sink_builder(name, DeviceFlags { flat_volume: true, ..DeviceFlags::NONE });
	t.add_sink(builder)
}

/// A stream with an absolute volume on `sink`.
pub(crate) fn input_with_volume(t: &mut TestCore, sink: u32, volume: ChannelVolumes) -> u32 {
	let mut builder = t.input_builder(sink);
	builder.volume = Some(volume);
	builder.volume_is_absolute = true;
	t.add_input(builder)
}

/// A plain running stream on `sink`.
pub(crate) fn attach_input(t: &mut TestCore, sink: u32) -> u32 {
	let builder = t.input_builder(sink);
	t.add_input(builder)
}
