//! Control ⇄ IO-thread messaging.
//!
//! Each device owns one bounded queue of control→IO messages.
//! `send()` is the cooperative rendezvous the control thread uses
//! for anything it needs an answer (or just completion) for;
//! `post()` is fire-and-forget. The IO thread drains the queue
//! every loop iteration, so a blocked `send()` always makes
//! progress as long as the IO thread lives.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::ChannelVolumes;
use crate::device::state::DeviceState;
use crate::error::Error;
use crate::macros::{recv,send};
use crate::sample::Usec;
use crate::stream::StreamState;
use crossbeam::channel::{bounded,Receiver,Sender};

//---------------------------------------------------------------------------------------------------- Queue
/// Control→IO queue depth. Posts beyond this block the control
/// thread until the IO thread catches up.
const QUEUE_DEPTH: usize = 128;

/// An in-flight message plus its optional reply slot.
pub(crate) struct Envelope<M, R> {
	/// The message.
	pub(crate) msg: M,
	/// Where the IO thread must deliver the answer, if the
	/// sender is waiting.
	pub(crate) reply: Option<Sender<R>>,
}

/// The control-thread end of a device message queue.
pub(crate) struct MsgQueue<M, R> {
	tx: Sender<Envelope<M, R>>,
}

// Derived impls would demand `M: Clone`/`M: Debug`, but only the
// sender handle is being cloned or printed.
impl<M, R> Clone for MsgQueue<M, R> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

impl<M, R> std::fmt::Debug for MsgQueue<M, R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MsgQueue").finish_non_exhaustive()
	}
}

impl<M, R> MsgQueue<M, R> {
	/// A fresh queue: (control end, IO end).
	pub(crate) fn new() -> (Self, Receiver<Envelope<M, R>>) {
		let (tx, rx) = bounded(QUEUE_DEPTH);
		(Self { tx }, rx)
	}

	/// Send and park until the IO thread acknowledges.
	///
	/// INVARIANT: must never be called from the device's own IO
	/// thread; that would rendezvous with itself.
	pub(crate) fn send(&self, msg: M) -> R {
		let (reply_tx, reply_rx) = bounded(1);
		send!(self.tx, Envelope { msg, reply: Some(reply_tx) });
		recv!(reply_rx)
	}

	/// Fire-and-forget.
	pub(crate) fn post(&self, msg: M) {
		send!(self.tx, Envelope { msg, reply: None });
	}
}

//---------------------------------------------------------------------------------------------------- Source messages
/// Control→IO messages of a source.
pub(crate) enum SourceMsg {
	/// Mirror a device state change.
	SetState(DeviceState),
	/// Mirror the device soft volume.
	SetSoftVolume(ChannelVolumes),
	/// Shared-volume sync: device soft+real volume plus every
	/// output's soft volume, in one consistent batch.
	SetSharedVolume {
		/// New device soft volume.
		soft: ChannelVolumes,
		/// New device real volume (deferred volume schedules
		/// hardware writes from this).
		real: ChannelVolumes,
		/// Per-output soft volumes.
		outputs: Vec<(u32, ChannelVolumes)>,
	},
	/// Mirror the device mute.
	SetMute(bool),
	/// Attach an output; its IO state moves to the IO thread.
	AddOutput(Box<crate::device::source::io::OutputIo>),
	/// Detach an output; its IO state moves back in the reply.
	RemoveOutput(u32),
	/// Mirror an output state change.
	SetOutputState {
		/// Which output.
		output: u32,
		/// Its new state.
		state: StreamState,
	},
	/// Mirror an output's soft volume / mute.
	SetOutputVolume {
		/// Which output.
		output: u32,
		/// Its new soft volume.
		soft: ChannelVolumes,
		/// Its new mute state.
		muted: bool,
	},
	/// An output's latency request changed.
	SetOutputRequestedLatency {
		/// Which output.
		output: u32,
		/// The request; `None` asks for the default.
		latency: Option<Usec>,
	},
	/// Switch the port on the IO thread (deferred volume).
	SetPort(String),
	/// Ask for the current latency.
	GetLatency,
	/// Ask for the streams' combined latency request.
	GetRequestedLatency,
	/// Mirror the accepted latency range.
	SetLatencyRange(Usec, Usec),
	/// Mirror the fixed latency.
	SetFixedLatency(Usec),
	/// Mirror the active port's latency offset.
	SetLatencyOffset(Usec),
	/// Mirror the rewind window and resize the delay queues.
	SetMaxRewind(usize),
	/// Monitor sources: the monitored sink rewound; fan the
	/// rewind out to the outputs.
	ProcessRewind(usize),
	/// Stop the IO thread.
	Shutdown,
}

/// IO→control replies of a source.
pub(crate) enum SourceReply {
	/// Plain acknowledgement.
	Ack,
	/// Answer to [`SourceMsg::GetLatency`].
	Latency(Usec),
	/// Answer to [`SourceMsg::GetRequestedLatency`].
	RequestedLatency(Option<Usec>),
	/// Outcome of a deferred port switch.
	Status(Result<(), Error>),
	/// The detached output's IO state.
	Output(Option<Box<crate::device::source::io::OutputIo>>),
}

//---------------------------------------------------------------------------------------------------- Sink messages
/// Control→IO messages of a sink.
pub(crate) enum SinkMsg {
	/// Mirror a device state change.
	SetState(DeviceState),
	/// Mirror the device soft volume.
	SetSoftVolume(ChannelVolumes),
	/// Shared-volume sync, as for sources.
	SetSharedVolume {
		/// New device soft volume.
		soft: ChannelVolumes,
		/// New device real volume.
		real: ChannelVolumes,
		/// Per-input soft volumes.
		inputs: Vec<(u32, ChannelVolumes)>,
	},
	/// Mirror the device mute.
	SetMute(bool),
	/// Attach an input; its IO state moves to the IO thread.
	AddInput(Box<crate::device::sink::io::InputIo>),
	/// Detach an input; its IO state moves back in the reply.
	RemoveInput(u32),
	/// Mirror an input state change.
	SetInputState {
		/// Which input.
		input: u32,
		/// Its new state.
		state: StreamState,
	},
	/// Mirror an input's soft volume / mute.
	SetInputVolume {
		/// Which input.
		input: u32,
		/// Its new soft volume.
		soft: ChannelVolumes,
		/// Its new mute state.
		muted: bool,
	},
	/// An input's latency request changed.
	SetInputRequestedLatency {
		/// Which input.
		input: u32,
		/// The request; `None` asks for the default.
		latency: Option<Usec>,
	},
	/// An upper layer wants the stream rewound this many bytes
	/// (in the sink's sample spec); `rewrite` parameters are
	/// carried per input.
	RequestRewind {
		/// Which input asked (its rewrite bookkeeping updates).
		input: Option<u32>,
		/// Bytes to rewind in the sink sample spec.
		nbytes: usize,
		/// How much the input wants to rewrite
		/// (`None`: keep; `Some(usize::MAX)`: drop everything).
		rewrite: Option<usize>,
		/// Silence the render queue after the rewind.
		flush: bool,
		/// Leave the render queue read pointer alone.
		dont_rewind_render: bool,
	},
	/// Wire (or unwire) the monitor source feed.
	SetMonitor(Option<MonitorFeed>),
	/// Switch the port on the IO thread (deferred volume).
	SetPort(String),
	/// Ask for the current latency.
	GetLatency,
	/// Ask for the streams' combined latency request.
	GetRequestedLatency,
	/// Mirror the accepted latency range.
	SetLatencyRange(Usec, Usec),
	/// Mirror the fixed latency.
	SetFixedLatency(Usec),
	/// Mirror the active port's latency offset.
	SetLatencyOffset(Usec),
	/// Mirror the rewind window.
	SetMaxRewind(usize),
	/// Render this many bytes now (driver-paced sinks call this
	/// through their event channel instead).
	Render(usize),
	/// Stop the IO thread.
	Shutdown,
}

/// Where a sink delivers its mix for a monitor source.
pub(crate) struct MonitorFeed {
	/// The monitor source's event channel.
	pub(crate) chunks: Sender<crate::device::driver::SourceEvent>,
	/// Unplayed byte estimate shared with the monitor source.
	pub(crate) unplayed: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

/// IO→control replies of a sink.
pub(crate) enum SinkReply {
	/// Plain acknowledgement.
	Ack,
	/// Answer to [`SinkMsg::GetLatency`].
	Latency(Usec),
	/// Answer to [`SinkMsg::GetRequestedLatency`].
	RequestedLatency(Option<Usec>),
	/// Outcome of a deferred port switch.
	Status(Result<(), Error>),
	/// The detached input's IO state.
	Input(Option<Box<crate::device::sink::io::InputIo>>),
}

//---------------------------------------------------------------------------------------------------- Reports
/// Upward reports from IO threads to the control thread.
///
/// The control thread drains these via
/// [`crate::core::Core::process_reports`] and reconciles the
/// hardware-originated changes with the primary state.
#[derive(Clone,Debug)]
pub(crate) enum Report {
	/// A source's hardware volume and/or mute changed.
	SourceVolumeAndMute {
		/// The source index.
		index: u32,
		/// The hardware volume observed on the IO thread.
		real_volume: Option<ChannelVolumes>,
		/// The hardware mute observed on the IO thread.
		muted: Option<bool>,
	},
	/// A sink's hardware volume and/or mute changed.
	SinkVolumeAndMute {
		/// The sink index.
		index: u32,
		/// The hardware volume observed on the IO thread.
		real_volume: Option<ChannelVolumes>,
		/// The hardware mute observed on the IO thread.
		muted: Option<bool>,
	},
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn send_rendezvous() {
		let (q, rx) = MsgQueue::<u32, u32>::new();

		let io = std::thread::spawn(move || {
			let envelope = rx.recv().unwrap();
			assert_eq!(envelope.msg, 41);
			envelope.reply.unwrap().send(envelope.msg + 1).unwrap();
		});

		assert_eq!(q.send(41), 42);
		io.join().unwrap();
	}

	#[test]
	fn post_does_not_wait() {
		let (q, rx) = MsgQueue::<u32, ()>::new();
		q.post(7);
		let envelope = rx.recv().unwrap();
		assert_eq!(envelope.msg, 7);
		assert!(envelope.reply.is_none());
	}
}
