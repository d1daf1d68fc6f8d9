//! The sink IO thread.
//!
//! Owns the thread-local shadow of the sink and the IO state of
//! every attached input (render queue, resampler, rewind
//! bookkeeping). The render path is pull-driven: the hardware
//! driver asks for bytes, the loop peeks every input's render
//! queue, mixes, and writes the result out. When a monitor source
//! is wired, the mix is forwarded to it as well.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::{ChannelMap,ChannelVolumes};
use crate::chunk::{mix_into,silence_chunk,volume_chunk,MemChunk};
use crate::device::driver::{SinkEvent,SinkIoDriver,SourceEvent};
use crate::device::flags::DeviceFlags;
use crate::device::msg::{Envelope,MonitorFeed,Report,SinkMsg,SinkReply};
use crate::device::state::DeviceState;
use crate::device::volume_change::VolumeChangeQueue;
use crate::device::{DEFAULT_FIXED_LATENCY,MAX_LATENCY,MIN_LATENCY};
use crate::macros::{assert_io_context,debug2,error2,trace2,try_send};
use crate::memblockq::MemBlockQueue;
use crate::resampler::Resampler;
use crate::sample::{SampleSpec,Usec};
use crate::stream::{SinkInputIoDriver,StreamState};
use crossbeam::channel::{Receiver,Select,Sender};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool,Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration,Instant};

//---------------------------------------------------------------------------------------------------- Constants
/// Idle wakeup period of the IO loop when nothing is scheduled.
const IDLE_WAKEUP: Duration = Duration::from_millis(100);

/// Render request size when the driver does not say (bytes are
/// aligned to the device frame size before use).
const DEFAULT_RENDER_LENGTH: usize = 8 * 1024;

//---------------------------------------------------------------------------------------------------- Rewrite
/// How much an input wants to re-produce on the next rewind.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq)]
pub(crate) enum Rewrite {
	/// Nothing outstanding.
	#[default]
	None,
	/// Re-produce up to this many bytes (input sample spec).
	Bytes(usize),
	/// Drop everything buffered and re-request from scratch.
	Everything,
}

//---------------------------------------------------------------------------------------------------- InputIo
/// The IO-thread state of one attached sink input.
pub(crate) struct InputIo {
	/// The stream index.
	pub(crate) index: u32,
	/// Mirrored stream state.
	pub(crate) state: StreamState,
	/// The stream's sample spec (pre-resampler domain).
	pub(crate) spec: SampleSpec,
	/// The stream's channel map.
	pub(crate) map: ChannelMap,
	/// Mirrored soft volume (stream channels).
	pub(crate) soft_volume: ChannelVolumes,
	/// Mirrored mute.
	pub(crate) muted: bool,
	/// Device-side volume factor (device channels).
	pub(crate) volume_factor_sink: ChannelVolumes,
	/// The render queue (device spec bytes).
	pub(crate) render_queue: MemBlockQueue,
	/// The resampler, when stream and device specs differ.
	pub(crate) resampler: Option<Box<dyn Resampler>>,
	/// The stream implementor.
	pub(crate) driver: Box<dyn SinkInputIoDriver>,
	/// Latency this stream asked for.
	pub(crate) requested_latency: Option<Usec>,

	/// Outstanding rewrite request.
	pub(crate) rewrite: Rewrite,
	/// Silence the render queue after the next rewind.
	pub(crate) rewrite_flush: bool,
	/// Leave the render queue's read pointer alone on the next
	/// rewind.
	pub(crate) dont_rewind_render: bool,
	/// Bytes handed out since the last underrun (device spec).
	pub(crate) playing_for: u64,
	/// Bytes of silence handed out since the underrun began
	/// (stream spec); `u64::MAX` once the counter saturated.
	pub(crate) underrun_for: u64,
	/// Same, in the device's spec.
	pub(crate) underrun_for_sink: u64,
	/// Observable "ran dry" flag shared with the control side.
	pub(crate) drained: Arc<AtomicBool>,
}

impl std::fmt::Debug for InputIo {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InputIo")
			.field("index", &self.index)
			.field("state", &self.state)
			.field("spec", &self.spec)
			.finish_non_exhaustive()
	}
}

impl InputIo {
	/// Fill the render queue from the implementor until it is
	/// readable, then peek one chunk (§4.4 peek contract).
	///
	/// `slength` is in device bytes. The returned volume is what
	/// the *mixer* must still apply: zeroed when it was already
	/// applied here (differing maps), muted, or the soft volume.
	pub(crate) fn peek(
		&mut self,
		slength: usize,
		device_spec: &SampleSpec,
		device_map: &ChannelMap,
		max_block: usize,
	) -> (MemChunk, ChannelVolumes) {
		let block_size_max_sink = device_spec.frame_align(max_block);
		let block_size_max_input = match &self.resampler {
			Some(r) => r.max_block_size(),
			None => self.spec.frame_align(max_block),
		};

		let mut slength = if slength == 0 { DEFAULT_RENDER_LENGTH } else { slength };
		slength = device_spec.frame_align(slength.min(block_size_max_sink)).max(device_spec.frame_size());

		let mut ilength = match &self.resampler {
			Some(r) => r.request(slength),
			None => slength,
		};
		if ilength == 0 {
			ilength = self.spec.frame_align(DEFAULT_RENDER_LENGTH);
		}
		let ilength_full = ilength;
		ilength = ilength.min(block_size_max_input);

		// Differing channel maps force the volume to be applied
		// before resampling, here; otherwise the mixer gets it.
		let do_volume_adj_here = !self.map.equal(device_map);
		let volume_is_norm = self.soft_volume.is_norm() && !self.muted;
		let need_volume_factor_sink = !self.volume_factor_sink.is_norm();

		while !self.render_queue.is_readable() {
			let popped = if self.state == StreamState::Corked {
				None
			} else {
				self.driver.pop(ilength)
			};

			let Some(tchunk) = popped else {
				// Underrun: hand out silence and remember how far
				// behind the implementor is.
				self.drained.store(true, Ordering::Release);
				self.render_queue.seek_relative(slength as i64);
				self.playing_for = 0;
				if self.underrun_for != u64::MAX {
					self.underrun_for = self.underrun_for.saturating_add(ilength_full as u64);
					self.underrun_for_sink = self.underrun_for_sink.saturating_add(slength as u64);
				}
				break;
			};

			debug_assert!(!tchunk.is_empty());
			self.drained.store(false, Ordering::Release);
			self.underrun_for = 0;
			self.underrun_for_sink = 0;
			self.playing_for = self.playing_for.saturating_add(tchunk.length as u64);

			let mut offset = 0;
			while offset < tchunk.length {
				let take = (tchunk.length - offset).min(block_size_max_input);
				let mut wchunk = tchunk.sub_chunk(offset, take);
				offset += take;

				let mut apply_factor_late = need_volume_factor_sink;

				if do_volume_adj_here && !volume_is_norm {
					if self.muted {
						silence_chunk(&mut wchunk, &self.spec);
						apply_factor_late = false;
					} else if self.resampler.is_none() && need_volume_factor_sink {
						// No resampler: one fused pass.
						let fused = self.soft_volume.multiply(&self.volume_factor_sink);
						volume_chunk(&mut wchunk, &self.spec, &fused);
						apply_factor_late = false;
					} else {
						volume_chunk(&mut wchunk, &self.spec, &self.soft_volume);
					}
				}

				match &mut self.resampler {
					None => {
						if apply_factor_late {
							volume_chunk(&mut wchunk, device_spec, &self.volume_factor_sink);
						}
						drop(self.render_queue.push(&wchunk));
					},
					Some(resampler) => {
						let mut rchunk = resampler.run(&wchunk);
						if !rchunk.is_empty() {
							if apply_factor_late {
								volume_chunk(&mut rchunk, device_spec, &self.volume_factor_sink);
							}
							drop(self.render_queue.push(&rchunk));
						}
					},
				}
			}
		}

		// INVARIANT: the queue is readable now, either with data
		// or with the silence hole seeked above.
		let mut chunk = self.render_queue.peek().unwrap();
		if chunk.length > block_size_max_sink {
			chunk.length = block_size_max_sink;
		}

		let volume = if do_volume_adj_here {
			ChannelVolumes::norm(device_spec.channels)
		} else if self.muted {
			ChannelVolumes::muted(device_spec.channels)
		} else {
			self.soft_volume
		};

		(chunk, volume)
	}

	/// Advance the read pointer (§4.4 drop contract).
	pub(crate) fn drop_bytes(&mut self, nbytes: usize) {
		self.render_queue.drop_bytes(nbytes);
	}

	/// `true` when the queue is empty *and* the implementor says
	/// all valid data has been played; the queue is silenced so
	/// later peeks cannot rewind into played audio.
	pub(crate) fn process_underrun(&mut self) -> bool {
		if self.render_queue.is_readable() {
			return false;
		}

		if self.driver.process_underrun() {
			self.render_queue.silence();
			return true;
		}

		false
	}

	/// The rewind protocol (§4.4): rewind the render queue, let
	/// the implementor re-produce, re-seat the write pointer.
	pub(crate) fn process_rewind(&mut self, nbytes: usize) {
		let queue_length = self.render_queue.len();
		let mut called = false;

		if nbytes > 0 && !self.dont_rewind_render {
			trace2!("rewinding {nbytes} bytes on the render queue of input {}", self.index);
			self.render_queue.rewind(nbytes);
		}

		match self.rewrite {
			Rewrite::Everything => {
				// Drop all buffered data; fresh data is requested
				// on the next peek.
				self.render_queue.flush_write();
			},
			Rewrite::Bytes(rewrite_nbytes) => {
				// How much re-producing makes sense at most, in
				// the implementor's domain.
				let mut max_rewrite = nbytes + queue_length;
				if let Some(r) = &self.resampler {
					max_rewrite = r.request(max_rewrite);
				}

				let amount = rewrite_nbytes.min(max_rewrite);
				if amount > 0 {
					trace2!("rewinding {amount} bytes on the implementor of input {}", self.index);
					self.driver.process_rewind(amount);
					called = true;

					// Back into the device domain, then re-seat the
					// write pointer so the region is re-mixed.
					let device_amount = match &self.resampler {
						Some(r) => r.result(amount),
						None => amount,
					};
					if device_amount > 0 {
						self.render_queue.seek_relative(-(device_amount as i64));
					}

					if self.rewrite_flush {
						self.render_queue.silence();
					}

					if let Some(r) = &mut self.resampler {
						r.reset();
					}
				}
			},
			Rewrite::None => {},
		}

		if !called && self.driver.rewindable() {
			self.driver.process_rewind(0);
		}

		self.rewrite = Rewrite::None;
		self.rewrite_flush = false;
		self.dont_rewind_render = false;
	}
}

//---------------------------------------------------------------------------------------------------- SinkIo
/// The thread-local shadow of a sink.
pub(crate) struct SinkIo {
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
	max_block: usize,

	inputs: BTreeMap<u32, InputIo>,

	driver: Box<dyn SinkIoDriver>,
	to_ctl: Sender<Report>,
	monitor: Option<MonitorFeed>,

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
	pub(crate) max_block: usize,
	pub(crate) driver: Box<dyn SinkIoDriver>,
	pub(crate) to_ctl: Sender<Report>,
	pub(crate) msg_rx: Receiver<Envelope<SinkMsg, SinkReply>>,
}

impl SinkIo {
	//---------------------------------------------------------------------------------------------------- Init
	#[cold]
	#[inline(never)]
	/// Spawn the IO thread for one sink.
	pub(crate) fn init(args: InitArgs) -> Result<JoinHandle<()>, std::io::Error> {
		std::thread::Builder::new()
			.name(format!("io-snk-{}", args.index))
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
					max_block,
					mut driver,
					to_ctl,
					msg_rx,
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
					max_block,
					inputs: BTreeMap::new(),
					driver,
					to_ctl,
					monitor: None,
					epoch: Instant::now(),
				};

				Self::main(this, msg_rx, events);
			})
	}

	//---------------------------------------------------------------------------------------------------- Main loop
	#[cold]
	#[inline(never)]
	fn main(
		mut self,
		msg_rx: Receiver<Envelope<SinkMsg, SinkReply>>,
		events: Option<Receiver<SinkEvent>>,
	) {
		assert_io_context!();
		debug2!("sink {} IO thread up", self.index);

		let mut select = Select::new();
		let msg_op = select.recv(&msg_rx);
		let event_op = events.as_ref().map(|rx| select.recv(rx));

		loop {
			let timeout = if self.flags.deferred_volume {
				let (committed, next) = self.pending.apply(self.now());
				if let Some(hw) = committed {
					self.current_hw_volume = hw;
					if let Err(e) = self.driver.write_volume(&hw) {
						error2!("sink {}: write_volume failed: {e}", self.index);
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
					return;
				};

				let (reply, exit) = self.handle(envelope.msg);
				if let Some(tx) = envelope.reply {
					try_send!(tx, reply);
				}
				if exit {
					debug2!("sink {} IO thread shutting down", self.index);
					return;
				}
			} else if Some(op.index()) == event_op {
				match op.recv(events.as_ref().unwrap()) {
					Ok(event) => self.event(event),
					Err(_) => return,
				}
			}
		}
	}

	fn now(&self) -> Usec {
		self.epoch.elapsed().as_micros() as Usec
	}

	//---------------------------------------------------------------------------------------------------- Message handling
	fn handle(&mut self, msg: SinkMsg) -> (SinkReply, bool) {
		match msg {
			SinkMsg::SetState(state) => {
				let was_opened = self.state.is_opened();
				self.state = state;

				if was_opened && !state.is_opened() {
					self.pending.flush();
					for i in self.inputs.values_mut() {
						i.driver.detach();
					}
				} else if !was_opened && state.is_opened() {
					for i in self.inputs.values_mut() {
						i.driver.attach();
					}
				}

				(SinkReply::Ack, false)
			},

			SinkMsg::SetSoftVolume(v) => {
				self.soft_volume = v;
				(SinkReply::Ack, false)
			},

			SinkMsg::SetSharedVolume { soft, real, inputs } => {
				self.soft_volume = soft;
				self.real_volume = real;

				for (index, soft) in inputs {
					if let Some(i) = self.inputs.get_mut(&index) {
						i.soft_volume = soft;
					}
				}

				if self.flags.deferred_volume {
					let hw = self.real_volume.divide(&self.soft_volume);
					let now = self.now();
					let latency = self.driver.latency();
					self.pending.push(now, latency, hw, &self.current_hw_volume);
				}

				(SinkReply::Ack, false)
			},

			SinkMsg::SetMute(muted) => {
				self.muted = muted;
				(SinkReply::Ack, false)
			},

			SinkMsg::AddInput(mut input) => {
				input.driver.attach();
				input.render_queue.set_maxrewind(self.max_rewind);
				self.inputs.insert(input.index, *input);
				self.update_requested_latency();
				(SinkReply::Ack, false)
			},

			SinkMsg::RemoveInput(index) => {
				let input = self.inputs.remove(&index).map(|mut i| {
					i.driver.detach();
					Box::new(i)
				});
				self.update_requested_latency();
				(SinkReply::Input(input), false)
			},

			SinkMsg::SetInputState { input, state } => {
				if let Some(i) = self.inputs.get_mut(&input) {
					i.state = state;
				}
				(SinkReply::Ack, false)
			},

			SinkMsg::SetInputVolume { input, soft, muted } => {
				if let Some(i) = self.inputs.get_mut(&input) {
					i.soft_volume = soft;
					i.muted = muted;
				}
				(SinkReply::Ack, false)
			},

			SinkMsg::SetInputRequestedLatency { input, latency } => {
				if let Some(i) = self.inputs.get_mut(&input) {
					i.requested_latency = latency;
				}
				self.update_requested_latency();
				(SinkReply::Ack, false)
			},

			SinkMsg::RequestRewind { input, nbytes, rewrite, flush, dont_rewind_render } => {
				let mut nbytes = nbytes;

				if let Some(index) = input {
					if let Some(i) = self.inputs.get_mut(&index) {
						// A stream cannot rewind into audio it never
						// emitted.
						nbytes = nbytes.min(i.playing_for as usize);

						// Requests accumulate until the rewind runs.
						i.rewrite = match (i.rewrite, rewrite) {
							(Rewrite::Everything, _) | (_, Some(usize::MAX)) => Rewrite::Everything,
							(Rewrite::Bytes(a), Some(b)) => Rewrite::Bytes(a.max(b)),
							(r, None) => r,
							(Rewrite::None, Some(b)) => Rewrite::Bytes(b),
						};
						i.rewrite_flush |= flush;
						i.dont_rewind_render |= dont_rewind_render;
					}
				}

				self.process_rewind(nbytes);
				(SinkReply::Ack, false)
			},

			SinkMsg::SetMonitor(feed) => {
				self.monitor = feed;
				(SinkReply::Ack, false)
			},

			SinkMsg::SetPort(name) => {
				(SinkReply::Status(self.driver.set_port(&name)), false)
			},

			SinkMsg::GetLatency => {
				(SinkReply::Latency(self.driver.latency() + self.latency_offset), false)
			},

			SinkMsg::GetRequestedLatency => {
				// Fixed-latency devices always answer their pin.
				let requested = if self.flags.dynamic_latency {
					self.requested_latency
				} else {
					Some(self.fixed_latency)
				};
				(SinkReply::RequestedLatency(requested), false)
			},

			SinkMsg::SetLatencyRange(min, max) => {
				self.min_latency = min;
				self.max_latency = max;
				self.update_requested_latency();
				(SinkReply::Ack, false)
			},

			SinkMsg::SetFixedLatency(latency) => {
				self.fixed_latency = latency;
				(SinkReply::Ack, false)
			},

			SinkMsg::SetLatencyOffset(offset) => {
				self.latency_offset = offset;
				(SinkReply::Ack, false)
			},

			SinkMsg::SetMaxRewind(nbytes) => {
				self.max_rewind = nbytes;
				for i in self.inputs.values_mut() {
					i.render_queue.set_maxrewind(nbytes);
					i.driver.update_max_rewind(nbytes);
				}
				(SinkReply::Ack, false)
			},

			SinkMsg::Render(nbytes) => {
				self.render(nbytes);
				(SinkReply::Ack, false)
			},

			SinkMsg::Shutdown => {
				for i in self.inputs.values_mut() {
					i.driver.detach();
				}
				(SinkReply::Ack, true)
			},
		}
	}

	fn update_requested_latency(&mut self) {
		if !self.flags.dynamic_latency {
			self.requested_latency = None;
			return;
		}

		let requested = self
			.inputs
			.values()
			.filter_map(|i| i.requested_latency)
			.min()
			.map(|l| l.clamp(self.min_latency, self.max_latency));

		if requested != self.requested_latency {
			self.requested_latency = requested;
			self.driver.update_requested_latency(requested);
		}
	}

	//---------------------------------------------------------------------------------------------------- Events
	fn event(&mut self, event: SinkEvent) {
		match event {
			SinkEvent::Render(nbytes) => self.render(nbytes),
			SinkEvent::VolumeChanged(v) => {
				self.current_hw_volume = v;
				try_send!(self.to_ctl, Report::SinkVolumeAndMute {
					index: self.index,
					real_volume: Some(v),
					muted: None,
				});
			},
			SinkEvent::MuteChanged(muted) => {
				try_send!(self.to_ctl, Report::SinkVolumeAndMute {
					index: self.index,
					real_volume: None,
					muted: Some(muted),
				});
			},
		}
	}

	//---------------------------------------------------------------------------------------------------- Render path
	/// Pull `nbytes` out of every running input, mix, and write
	/// the result to the hardware (and the monitor).
	fn render(&mut self, nbytes: usize) {
		if !self.state.is_opened() {
			return;
		}

		let length = self.spec.frame_align(nbytes.min(self.max_block)).max(self.spec.frame_size());
		let mut mix = MemChunk::silence(length);
		let device_spec = self.spec;
		let device_map = self.map;
		let max_block = self.max_block;
		let monitor = self.monitor.as_ref().map(|m| m.chunks.clone());

		for input in self.inputs.values_mut() {
			if !input.state.is_linked() {
				continue;
			}

			// Collect exactly `length` bytes from this input.
			let mut collected: Vec<u8> = Vec::with_capacity(length);
			while collected.len() < length {
				let want = length - collected.len();
				let (chunk, volume) = input.peek(want, &device_spec, &device_map, max_block);

				let take = chunk.length.min(want);
				let mut piece = chunk.sub_chunk(0, take);

				if volume.is_muted() {
					silence_chunk(&mut piece, &device_spec);
				} else if !volume.is_norm() {
					volume_chunk(&mut piece, &device_spec, &volume);
				}

				collected.extend_from_slice(piece.bytes());
				input.drop_bytes(take);
			}

			// A stream that ran dry and has played everything valid
			// gets its queue silenced, so later peeks cannot rewind
			// into the played region.
			if input.drained.load(Ordering::Acquire) {
				input.process_underrun();
			}

			let contribution = MemChunk::from_bytes(collected);

			// Direct monitor taps get the unmixed per-stream data.
			if let Some(monitor) = &monitor {
				drop(monitor.try_send(SourceEvent::DirectChunk {
					input: input.index,
					chunk: contribution.clone(),
				}));
			}

			mix_into(&mut mix, &contribution, &device_spec);
		}

		// Device-level soft volume and mute are the mixer's last
		// stage.
		if self.muted {
			silence_chunk(&mut mix, &device_spec);
		} else if !self.soft_volume.is_norm() {
			volume_chunk(&mut mix, &device_spec, &self.soft_volume);
		}

		if let Err(e) = self.driver.write(&mix) {
			error2!("sink {}: write failed: {e}", self.index);
		}

		if let Some(feed) = &self.monitor {
			drop(feed.chunks.try_send(SourceEvent::Chunk(mix)));
			let unplayed = self.spec.usec_to_bytes(self.driver.latency());
			feed.unplayed.store(unplayed as u64, Ordering::Release);
		}
	}

	/// Rewind the stream: take back what the hardware still holds,
	/// re-seat every input, notify the monitor.
	fn process_rewind(&mut self, nbytes: usize) {
		if nbytes == 0 || !self.state.is_opened() {
			return;
		}

		let limited = nbytes.min(self.max_rewind);
		let rewound = self.driver.rewind(limited);
		if rewound == 0 {
			// The hardware kept everything; only flush the
			// outstanding rewrite requests.
			for input in self.inputs.values_mut() {
				input.process_rewind(0);
			}
			return;
		}

		trace2!("sink {} rewound {rewound} bytes", self.index);

		for input in self.inputs.values_mut() {
			input.process_rewind(rewound);
		}

		if let Some(feed) = &self.monitor {
			drop(feed.chunks.try_send(SourceEvent::Rewind(rewound)));
		}
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {}
