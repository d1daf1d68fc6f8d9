//! Driver seams for streams.
//!
//! Like devices, every stream has a control-side driver (kill,
//! move notifications, events) and an IO-side driver that is
//! moved into the owning device's IO thread together with the
//! stream's queues.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::ChannelVolumes;
use crate::chunk::MemChunk;

//---------------------------------------------------------------------------------------------------- Source output drivers
/// Control-side driver of a source output.
pub trait SourceOutputDriver: Send {
	/// The stream is being killed; the implementor must tear its
	/// side down (the core forgets the stream either way).
	fn kill(&mut self) {}

	/// The stream is moving: `Some(name)` of the new device, or
	/// `None` when detached with nowhere to go (last chance to
	/// resurrect it before the kill).
	fn moving(&mut self, _destination: Option<&str>) {}

	/// Veto hook for moves.
	fn may_move_to(&mut self, _destination: &str) -> bool {
		true
	}

	/// The device suspended (`true`) or resumed.
	fn suspend(&mut self, _suspended: bool) {}

	/// An out-of-band event for the implementor ("format-lost", …).
	fn send_event(&mut self, _event: &str) {}

	/// The user-visible volume changed.
	fn volume_changed(&mut self, _volume: &ChannelVolumes) {}

	/// The mute state changed.
	fn mute_changed(&mut self, _muted: bool) {}
}

/// IO-side driver of a source output; lives on the device's IO
/// thread and receives the processed capture data.
pub trait SourceOutputIoDriver: Send {
	/// Deliver one processed chunk (in the stream's sample spec).
	fn push(&mut self, chunk: &MemChunk);

	/// Can this stream un-read data it was already given?
	///
	/// Streams that can take rewinds keep their delay queue empty;
	/// streams that cannot are protected by the delay queue
	/// holding back `max_rewind` bytes.
	fn rewindable(&self) -> bool {
		false
	}

	/// Un-read `nbytes` (in the stream's sample spec).
	fn process_rewind(&mut self, _nbytes: usize) {}

	/// The device's rewind window changed.
	fn update_max_rewind(&mut self, _nbytes: usize) {}

	/// The stream is now wired to the IO thread.
	fn attach(&mut self) {}

	/// The stream is leaving the IO thread.
	fn detach(&mut self) {}
}

//---------------------------------------------------------------------------------------------------- Sink input drivers
/// Control-side driver of a sink input.
pub trait SinkInputDriver: Send {
	/// The stream is being killed.
	fn kill(&mut self) {}

	/// The stream is moving (see
	/// [`SourceOutputDriver::moving`]).
	fn moving(&mut self, _destination: Option<&str>) {}

	/// Veto hook for moves.
	fn may_move_to(&mut self, _destination: &str) -> bool {
		true
	}

	/// The device suspended (`true`) or resumed.
	fn suspend(&mut self, _suspended: bool) {}

	/// An out-of-band event for the implementor.
	fn send_event(&mut self, _event: &str) {}

	/// The user-visible volume changed.
	fn volume_changed(&mut self, _volume: &ChannelVolumes) {}

	/// The mute state changed.
	fn mute_changed(&mut self, _muted: bool) {}
}

/// IO-side driver of a sink input; the render queue pulls from it.
pub trait SinkInputIoDriver: Send {
	/// Produce up to `nbytes` (in the stream's sample spec).
	///
	/// Returning `None` is an underrun: the core hands out
	/// silence and remembers how far behind the stream is.
	fn pop(&mut self, nbytes: usize) -> Option<MemChunk>;

	/// Can this stream re-produce data it already handed out?
	fn rewindable(&self) -> bool {
		false
	}

	/// Re-produce from `nbytes` (in the stream's sample spec)
	/// before the current position. Called with `0` to signal a
	/// rewind that needs no rewrite.
	fn process_rewind(&mut self, _nbytes: usize) {}

	/// All valid data was played; `true` lets the core silence
	/// the render queue instead of rewinding into played audio.
	fn process_underrun(&mut self) -> bool {
		false
	}

	/// The device's rewind window changed.
	fn update_max_rewind(&mut self, _nbytes: usize) {}

	/// The stream is now wired to the IO thread.
	fn attach(&mut self) {}

	/// The stream is leaving the IO thread.
	fn detach(&mut self) {}
}

//---------------------------------------------------------------------------------------------------- Dummies
#[cfg(any(test, feature = "dummy"))]
pub use dummy::{DummySinkInput,DummySinkInputHandle,DummySourceOutput,DummySourceOutputHandle};

#[cfg(any(test, feature = "dummy"))]
mod dummy {
	//! In-memory stream drivers for tests.

	use super::*;
	use std::collections::VecDeque;
	use std::sync::{Arc,Mutex};

	/// Observable state of a dummy source output.
	#[derive(Debug,Default)]
	pub struct DummySourceOutputState {
		/// Chunks pushed to the stream, in order.
		pub pushed: Vec<MemChunk>,
		/// Total rewound bytes.
		pub rewound: usize,
		/// `kill()` was called.
		pub killed: bool,
		/// `moving()` destinations observed.
		pub moves: Vec<Option<String>>,
		/// Suspend notifications.
		pub suspends: Vec<bool>,
		/// Events received.
		pub events: Vec<String>,
	}

	/// Test handle for a dummy source output driver pair.
	pub type DummySourceOutputHandle = Arc<Mutex<DummySourceOutputState>>;

	/// A control+IO driver pair collecting everything it is fed.
	#[derive(Debug)]
	pub struct DummySourceOutput {
		state: DummySourceOutputHandle,
		rewindable: bool,
	}

	impl DummySourceOutput {
		/// A (control driver, IO driver, handle) triple.
		pub fn new(rewindable: bool) -> (Box<Self>, Box<Self>, DummySourceOutputHandle) {
			let state = Arc::new(Mutex::new(DummySourceOutputState::default()));
			(
				Box::new(Self { state: Arc::clone(&state), rewindable }),
				Box::new(Self { state: Arc::clone(&state), rewindable }),
				state,
			)
		}
	}

	impl SourceOutputDriver for DummySourceOutput {
		fn kill(&mut self) {
			self.state.lock().unwrap().killed = true;
		}

		fn moving(&mut self, destination: Option<&str>) {
			self.state.lock().unwrap().moves.push(destination.map(str::to_owned));
		}

		fn suspend(&mut self, suspended: bool) {
			self.state.lock().unwrap().suspends.push(suspended);
		}

		fn send_event(&mut self, event: &str) {
			self.state.lock().unwrap().events.push(event.to_owned());
		}
	}

	impl SourceOutputIoDriver for DummySourceOutput {
		fn push(&mut self, chunk: &MemChunk) {
			self.state.lock().unwrap().pushed.push(chunk.clone());
		}

		fn rewindable(&self) -> bool {
			self.rewindable
		}

		fn process_rewind(&mut self, nbytes: usize) {
			self.state.lock().unwrap().rewound += nbytes;
		}
	}

	/// Observable state of a dummy sink input.
	#[derive(Debug,Default)]
	pub struct DummySinkInputState {
		/// Chunks the stream will hand out on `pop`.
		pub to_pop: VecDeque<MemChunk>,
		/// Total bytes the implementor was asked to rewrite.
		pub rewritten: usize,
		/// `process_underrun` answers to hand out.
		pub underrun_answers: VecDeque<bool>,
		/// `kill()` was called.
		pub killed: bool,
		/// `moving()` destinations observed.
		pub moves: Vec<Option<String>>,
		/// Events received.
		pub events: Vec<String>,
	}

	/// Test handle for a dummy sink input driver pair.
	pub type DummySinkInputHandle = Arc<Mutex<DummySinkInputState>>;

	/// A control+IO driver pair playing back a scripted queue.
	#[derive(Debug)]
	pub struct DummySinkInput {
		state: DummySinkInputHandle,
		rewindable: bool,
	}

	impl DummySinkInput {
		/// A (control driver, IO driver, handle) triple.
		pub fn new(rewindable: bool) -> (Box<Self>, Box<Self>, DummySinkInputHandle) {
			let state = Arc::new(Mutex::new(DummySinkInputState::default()));
			(
				Box::new(Self { state: Arc::clone(&state), rewindable }),
				Box::new(Self { state: Arc::clone(&state), rewindable }),
				state,
			)
		}
	}

	impl SinkInputDriver for DummySinkInput {
		fn kill(&mut self) {
			self.state.lock().unwrap().killed = true;
		}

		fn moving(&mut self, destination: Option<&str>) {
			self.state.lock().unwrap().moves.push(destination.map(str::to_owned));
		}

		fn send_event(&mut self, event: &str) {
			self.state.lock().unwrap().events.push(event.to_owned());
		}
	}

	impl SinkInputIoDriver for DummySinkInput {
		fn pop(&mut self, _nbytes: usize) -> Option<MemChunk> {
			self.state.lock().unwrap().to_pop.pop_front()
		}

		fn rewindable(&self) -> bool {
			self.rewindable
		}

		fn process_rewind(&mut self, nbytes: usize) {
			self.state.lock().unwrap().rewritten += nbytes;
		}

		fn process_underrun(&mut self) -> bool {
			self.state.lock().unwrap().underrun_answers.pop_front().unwrap_or(false)
		}
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {}
