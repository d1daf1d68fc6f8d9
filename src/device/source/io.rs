//! The source IO thread.
//!
//! Owns the thread-local shadow of the source plus the IO state
//! of every attached output (delay queue, resampler, soft
//! volume), processes the control message queue, and runs the
//! capture data path: device soft volume once, then per output
//! the delay queue, the resampler and the device-side factor.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::{ChannelMap,ChannelVolumes};
use crate::chunk::{silence_chunk,volume_chunk,MemChunk};
use crate::device::driver::{SourceEvent,SourceIoDriver};
use crate::device::flags::DeviceFlags;
use crate::device::msg::{Envelope,Report,SourceMsg,SourceReply};
use crate::device::state::DeviceState;
use crate::device::volume_change::VolumeChangeQueue;
use crate::device::{DEFAULT_FIXED_LATENCY,MAX_LATENCY,MIN_LATENCY};
use crate::macros::{assert_io_context,debug2,error2,trace2,try_send};
use crate::memblockq::MemBlockQueue;
use crate::resampler::Resampler;
use crate::sample::{SampleSpec,Usec};
use crate::stream::{SourceOutputIoDriver,StreamState};
use crossbeam::channel::{Receiver,Select,Sender};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64,Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration,Instant};

//---------------------------------------------------------------------------------------------------- Constants
/// Idle wakeup period of the IO loop when nothing is scheduled.
const IDLE_WAKEUP: Duration = Duration::from_millis(100);

//---------------------------------------------------------------------------------------------------- OutputIo
/// The IO-thread state of one attached source output.
pub(crate) struct OutputIo {
	/// The stream index.
	pub(crate) index: u32,
	/// Mirrored stream state.
	pub(crate) state: StreamState,
	/// The stream's sample spec (post-resampler domain).
	pub(crate) spec: SampleSpec,
	/// The stream's channel map.
	pub(crate) map: ChannelMap,
	/// Mirrored soft volume (stream channels).
	pub(crate) soft_volume: ChannelVolumes,
	/// Mirrored mute.
	pub(crate) muted: bool,
	/// Device-side volume factor (device channels).
	pub(crate) volume_factor_source: ChannelVolumes,
	/// The backpressure/rewind holdback queue (device spec bytes).
	pub(crate) delay_queue: MemBlockQueue,
	/// The resampler, when stream and device specs differ.
	pub(crate) resampler: Option<Box<dyn Resampler>>,
	/// The stream implementor.
	pub(crate) driver: Box<dyn SourceOutputIoDriver>,
	/// Latency this stream asked for.
	pub(crate) requested_latency: Option<Usec>,
	/// Bound sink input for direct delivery, bypassing the
	/// broadcast path.
	pub(crate) direct_on_input: Option<u32>,
}

impl std::fmt::Debug for OutputIo {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OutputIo")
			.field("index", &self.index)
			.field("state", &self.state)
			.field("spec", &self.spec)
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- SourceIo
/// The thread-local shadow of a source.
pub(crate) struct SourceIo {
	index: u32,
	spec: SampleSpec,
	map: ChannelMap,
	flags: DeviceFlags,

	state: DeviceState,
	soft_volume: ChannelVolumes,
	real_volume: ChannelVolumes,
	current_hw_volume: ChannelVolumes,
	muted: bool,
	pending: VolumeChangeQueue,

	max_rewind: usize,
	min_latency: Usec,
	max_latency: Usec,
	fixed_latency: Usec,
	latency_offset: Usec,
	requested_latency: Option<Usec>,

	outputs: BTreeMap<u32, OutputIo>,

	driver: Box<dyn SourceIoDriver>,
	to_ctl: Sender<Report>,

	/// Unplayed-bytes estimate of the monitored sink, when this
	/// source is a monitor.
	monitor_unplayed: Option<Arc<AtomicU64>>,

	/// Zero point of the IO clock.
	epoch: Instant,
}

/// Everything the IO thread needs at start.
pub(crate) struct InitArgs {
	pub(crate) index: u32,
	pub(crate) spec: SampleSpec,
	pub(crate) map: ChannelMap,
	pub(crate) flags: DeviceFlags,
	pub(crate) soft_volume: ChannelVolumes,
	pub(crate) real_volume: ChannelVolumes,
	pub(crate) muted: bool,
	pub(crate) safety_margin: Usec,
	pub(crate) extra_delay: i64,
	pub(crate) driver: Box<dyn SourceIoDriver>,
	pub(crate) to_ctl: Sender<Report>,
	pub(crate) msg_rx: Receiver<Envelope<SourceMsg, SourceReply>>,
	/// Monitor sources: the channel the monitored sink feeds.
	pub(crate) monitor_rx: Option<Receiver<SourceEvent>>,
	pub(crate) monitor_unplayed: Option<Arc<AtomicU64>>,
}

impl SourceIo {
	//---------------------------------------------------------------------------------------------------- Init
	#[cold]
	#[inline(never)]
	/// Spawn the IO thread for one source.
	pub(crate) fn init(args: InitArgs) -> Result<JoinHandle<()>, std::io::Error> {
		std::thread::Builder::new()
			.name(format!("io-src-{}", args.index))
			.spawn(move || {
				let InitArgs {
					index,
					spec,
					map,
					flags,
					soft_volume,
					real_volume,
					muted,
					safety_margin,
					extra_delay,
					mut driver,
					to_ctl,
					msg_rx,
					monitor_rx,
					monitor_unplayed,
				} = args;

				let events = driver.events();
				let channels = spec.channels;

				let this = Self {
					index,
					spec,
					map,
					flags,
					state: DeviceState::Init,
					soft_volume,
					real_volume,
					current_hw_volume: ChannelVolumes::norm(channels),
					muted,
					pending: VolumeChangeQueue::new(safety_margin, extra_delay),
					max_rewind: 0,
					min_latency: MIN_LATENCY,
					max_latency: MAX_LATENCY,
					fixed_latency: DEFAULT_FIXED_LATENCY,
					latency_offset: 0,
					requested_latency: None,
					outputs: BTreeMap::new(),
					driver,
					to_ctl,
					monitor_unplayed,
					epoch: Instant::now(),
				};

				Self::main(this, msg_rx, events, monitor_rx);
			})
	}

	//---------------------------------------------------------------------------------------------------- Main loop
	#[cold]
	#[inline(never)]
	fn main(
		mut self,
		msg_rx: Receiver<Envelope<SourceMsg, SourceReply>>,
		events: Option<Receiver<SourceEvent>>,
		monitor_rx: Option<Receiver<SourceEvent>>,
	) {
		assert_io_context!();
		debug2!("source {} IO thread up", self.index);

		let mut select = Select::new();
		let msg_op = select.recv(&msg_rx);
		let event_op = events.as_ref().map(|rx| select.recv(rx));
		let monitor_op = monitor_rx.as_ref().map(|rx| select.recv(rx));

		loop {
			// Deferred hardware volume: commit whatever is due.
			let timeout = if self.flags.deferred_volume {
				let (committed, next) = self.pending.apply(self.now());
				if let Some(hw) = committed {
					self.current_hw_volume = hw;
					if let Err(e) = self.driver.write_volume(&hw) {
						error2!("source {}: write_volume failed: {e}", self.index);
					}
				}
				next.map(Duration::from_micros).unwrap_or(IDLE_WAKEUP)
			} else {
				IDLE_WAKEUP
			};

			let op = match select.select_timeout(timeout) {
				Ok(op) => op,
				Err(_) => continue,
			};

			if op.index() == msg_op {
				let Ok(envelope) = op.recv(&msg_rx) else {
					// Control side is gone; nothing left to serve.
					return;
				};

				let (reply, exit) = self.handle(envelope.msg);
				if let Some(tx) = envelope.reply {
					try_send!(tx, reply);
				}
				if exit {
					debug2!("source {} IO thread shutting down", self.index);
					return;
				}
			} else if Some(op.index()) == event_op {
				// INVARIANT: event_op exists iff `events` does.
				match op.recv(events.as_ref().unwrap()) {
					Ok(event) => self.event(event),
					Err(_) => return,
				}
			} else if Some(op.index()) == monitor_op {
				match op.recv(monitor_rx.as_ref().unwrap()) {
					Ok(event) => self.event(event),
					// The monitored sink went away; stop polling
					// its channel but idle on.
					Err(_) => select.remove(monitor_op.unwrap()),
				}
			}
		}
	}

	/// Microseconds on the IO clock.
	fn now(&self) -> Usec {
		self.epoch.elapsed().as_micros() as Usec
	}

	//---------------------------------------------------------------------------------------------------- Message handling
	fn handle(&mut self, msg: SourceMsg) -> (SourceReply, bool) {
		match msg {
			SourceMsg::SetState(state) => {
				let was_opened = self.state.is_opened();
				self.state = state;

				if was_opened && !state.is_opened() {
					// Going down: scheduled volume changes are moot.
					self.pending.flush();
					for o in self.outputs.values_mut() {
						o.driver.detach();
					}
				} else if !was_opened && state.is_opened() {
					for o in self.outputs.values_mut() {
						o.driver.attach();
					}
				}

				(SourceReply::Ack, false)
			},

			SourceMsg::SetSoftVolume(v) => {
				self.soft_volume = v;
				(SourceReply::Ack, false)
			},

			SourceMsg::SetSharedVolume { soft, real, outputs } => {
				self.soft_volume = soft;
				self.real_volume = real;

				for (index, soft) in outputs {
					if let Some(o) = self.outputs.get_mut(&index) {
						o.soft_volume = soft;
					}
				}

				if self.flags.deferred_volume {
					let hw = self.real_volume.divide(&self.soft_volume);
					let now = self.now();
					let latency = self.driver.latency();
					self.pending.push(now, latency, hw, &self.current_hw_volume);
				}

				(SourceReply::Ack, false)
			},

			SourceMsg::SetMute(muted) => {
				self.muted = muted;
				(SourceReply::Ack, false)
			},

			SourceMsg::AddOutput(mut output) => {
				output.driver.attach();
				self.outputs.insert(output.index, *output);
				self.update_requested_latency();
				(SourceReply::Ack, false)
			},

			SourceMsg::RemoveOutput(index) => {
				let output = self.outputs.remove(&index).map(|mut o| {
					o.driver.detach();
					Box::new(o)
				});
				self.update_requested_latency();
				(SourceReply::Output(output), false)
			},

			SourceMsg::SetOutputState { output, state } => {
				if let Some(o) = self.outputs.get_mut(&output) {
					o.state = state;
				}
				(SourceReply::Ack, false)
			},

			SourceMsg::SetOutputVolume { output, soft, muted } => {
				if let Some(o) = self.outputs.get_mut(&output) {
					o.soft_volume = soft;
					o.muted = muted;
				}
				(SourceReply::Ack, false)
			},

			SourceMsg::SetOutputRequestedLatency { output, latency } => {
				if let Some(o) = self.outputs.get_mut(&output) {
					o.requested_latency = latency;
				}
				self.update_requested_latency();
				(SourceReply::Ack, false)
			},

			SourceMsg::SetPort(name) => {
				(SourceReply::Status(self.driver.set_port(&name)), false)
			},

			SourceMsg::GetLatency => {
				(SourceReply::Latency(self.driver.latency() + self.latency_offset), false)
			},

			SourceMsg::GetRequestedLatency => {
				// Fixed-latency devices always answer their pin.
				let requested = if self.flags.dynamic_latency {
					self.requested_latency
				} else {
					Some(self.fixed_latency)
				};
				(SourceReply::RequestedLatency(requested), false)
			},

			SourceMsg::SetLatencyRange(min, max) => {
				self.min_latency = min;
				self.max_latency = max;
				self.update_requested_latency();
				(SourceReply::Ack, false)
			},

			SourceMsg::SetFixedLatency(latency) => {
				self.fixed_latency = latency;
				(SourceReply::Ack, false)
			},

			SourceMsg::SetLatencyOffset(offset) => {
				self.latency_offset = offset;
				(SourceReply::Ack, false)
			},

			SourceMsg::SetMaxRewind(nbytes) => {
				self.max_rewind = nbytes;
				for o in self.outputs.values_mut() {
					o.driver.update_max_rewind(nbytes);
				}
				(SourceReply::Ack, false)
			},

			SourceMsg::ProcessRewind(nbytes) => {
				self.process_rewind(nbytes);
				(SourceReply::Ack, false)
			},

			SourceMsg::Shutdown => {
				for o in self.outputs.values_mut() {
					o.driver.detach();
				}
				(SourceReply::Ack, true)
			},
		}
	}

	/// Min-reduce the outputs' latency requests into the device
	/// request and hand it to the driver.
	fn update_requested_latency(&mut self) {
		if !self.flags.dynamic_latency {
			self.requested_latency = None;
			return;
		}

		let requested = self
			.outputs
			.values()
			.filter_map(|o| o.requested_latency)
			.min()
			.map(|l| l.clamp(self.min_latency, self.max_latency));

		if requested != self.requested_latency {
			self.requested_latency = requested;
			self.driver.update_requested_latency(requested);
		}
	}

	//---------------------------------------------------------------------------------------------------- Events
	fn event(&mut self, event: SourceEvent) {
		match event {
			SourceEvent::Chunk(chunk) => self.post(&chunk),
			SourceEvent::DirectChunk { input, chunk } => self.post_direct(input, &chunk),
			SourceEvent::Rewind(nbytes) => self.process_rewind(nbytes),
			SourceEvent::VolumeChanged(v) => {
				self.current_hw_volume = v;
				try_send!(self.to_ctl, Report::SourceVolumeAndMute {
					index: self.index,
					real_volume: Some(v),
					muted: None,
				});
			},
			SourceEvent::MuteChanged(muted) => {
				try_send!(self.to_ctl, Report::SourceVolumeAndMute {
					index: self.index,
					real_volume: None,
					muted: Some(muted),
				});
			},
		}
	}

	//---------------------------------------------------------------------------------------------------- Data path
	/// Deliver captured data to every attached output.
	fn post(&mut self, chunk: &MemChunk) {
		if !self.state.is_opened() {
			return;
		}

		// Device-level soft volume/mute is applied once, up front.
		let mut chunk = chunk.clone();
		if self.muted {
			silence_chunk(&mut chunk, &self.spec);
		} else if !self.soft_volume.is_norm() {
			volume_chunk(&mut chunk, &self.spec, &self.soft_volume);
		}

		let device_spec = self.spec;
		let device_map = self.map;
		let max_rewind = self.max_rewind;
		let monitor_unplayed = self
			.monitor_unplayed
			.as_ref()
			.map(|u| u.load(Ordering::Acquire) as usize);

		for o in self.outputs.values_mut() {
			if o.direct_on_input.is_some() {
				// Direct outputs get their data through post_direct.
				continue;
			}
			Self::output_push(o, &chunk, &device_spec, &device_map, max_rewind, monitor_unplayed);
		}
	}

	/// Deliver one sink input's data directly to its bound output.
	fn post_direct(&mut self, input: u32, chunk: &MemChunk) {
		if !self.state.is_opened() {
			return;
		}

		let mut chunk = chunk.clone();
		if self.muted {
			silence_chunk(&mut chunk, &self.spec);
		} else if !self.soft_volume.is_norm() {
			volume_chunk(&mut chunk, &self.spec, &self.soft_volume);
		}

		let device_spec = self.spec;
		let device_map = self.map;
		let max_rewind = self.max_rewind;
		let monitor_unplayed = self
			.monitor_unplayed
			.as_ref()
			.map(|u| u.load(Ordering::Acquire) as usize);

		for o in self.outputs.values_mut() {
			if o.direct_on_input == Some(input) {
				Self::output_push(o, &chunk, &device_spec, &device_map, max_rewind, monitor_unplayed);
			}
		}
	}

	/// The per-output data path: delay queue, soft volume,
	/// resampler, device-side factor, implementor push.
	fn output_push(
		o: &mut OutputIo,
		chunk: &MemChunk,
		device_spec: &SampleSpec,
		device_map: &ChannelMap,
		max_rewind: usize,
		monitor_unplayed: Option<usize>,
	) {
		if o.state != StreamState::Running {
			return;
		}

		if o.delay_queue.push(chunk).is_err() {
			debug2!("delay queue overflow on output {}", o.index);
			o.delay_queue.seek_relative(chunk.length as i64);
		}

		// Streams that take rewinds need no holdback; everyone else
		// is protected by keeping max_rewind bytes queued. On a
		// monitor source the holdback additionally may not exceed
		// what the sink still holds unplayed, since only that part
		// of the signal can still change.
		let mut limit = if o.driver.rewindable() { 0 } else { max_rewind };
		if limit > 0 {
			if let Some(unplayed) = monitor_unplayed {
				limit = limit.min(unplayed);
			}
		}

		let volume_is_norm = o.soft_volume.is_norm() && !o.muted;
		let need_factor = !o.volume_factor_source.is_norm();

		while o.delay_queue.len() > limit {
			let excess = o.delay_queue.len() - limit;

			let Some(mut qchunk) = o.delay_queue.peek() else { break };
			if qchunk.length > excess {
				qchunk.length = excess;
			}
			if let Some(resampler) = &o.resampler {
				let mbs = resampler.max_block_size();
				if qchunk.length > mbs {
					qchunk.length = mbs;
				}
			}
			let consumed = qchunk.length;

			let mut apply_factor_late = need_factor;

			if !volume_is_norm {
				if o.muted {
					silence_chunk(&mut qchunk, device_spec);
					apply_factor_late = false;
				} else if o.resampler.is_none() && need_factor {
					// No resampler: fuse both adjustments into one pass.
					let fused = o.soft_volume.multiply(&o.volume_factor_source);
					volume_chunk(&mut qchunk, device_spec, &fused);
					apply_factor_late = false;
				} else {
					volume_chunk(&mut qchunk, device_spec, &o.soft_volume);
				}
			}

			match &mut o.resampler {
				None => {
					if apply_factor_late {
						volume_chunk(&mut qchunk, device_spec, &o.volume_factor_source);
					}
					o.driver.push(&qchunk);
				},
				Some(resampler) => {
					let mut rchunk = resampler.run(&qchunk);

					if !rchunk.is_empty() {
						if apply_factor_late {
							// The factor lives in the device layout;
							// past the resampler we are in the
							// stream's, so remap it over.
							let spec = *resampler.output_spec();
							let factor = o.volume_factor_source.remap(device_map, &o.map);
							volume_chunk(&mut rchunk, &spec, &factor);
						}
						o.driver.push(&rchunk);
					}
				},
			}

			o.delay_queue.drop_bytes(consumed);
		}
	}

	/// Un-read `nbytes` (device spec) from every output.
	fn process_rewind(&mut self, nbytes: usize) {
		if nbytes == 0 {
			return;
		}

		trace2!("source {} rewinding {nbytes} bytes", self.index);

		for o in self.outputs.values_mut() {
			if o.driver.rewindable() {
				let local = match &o.resampler {
					Some(r) => r.result(nbytes),
					None => nbytes,
				};

				if local > 0 {
					o.driver.process_rewind(local);
				}

				if let Some(r) = &mut o.resampler {
					r.reset();
				}
			} else {
				o.delay_queue.seek_relative(-(nbytes as i64));
			}
		}
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {}
