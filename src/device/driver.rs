//! Driver seams for devices.
//!
//! Every device is backed by two driver objects: a control-side
//! half that handles configuration requests, and an IO-side half
//! that is moved into the device's IO thread at `put()` and talks
//! to the hardware from there. All methods are optional; the
//! device flags declare which ones are actually wired up.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::ChannelVolumes;
use crate::chunk::MemChunk;
use crate::error::Error;
use crate::format::FormatInfo;
use crate::sample::Usec;
use crossbeam::channel::Receiver;

//---------------------------------------------------------------------------------------------------- Events
/// Events a source's IO driver feeds into the IO thread.
///
/// Monitor sources receive the same events from the monitored
/// sink's IO thread instead of from hardware.
#[derive(Debug)]
pub enum SourceEvent {
	/// Captured audio, in the device's sample spec.
	Chunk(MemChunk),
	/// One sink input's unmixed data, for outputs bound
	/// direct-on-input.
	DirectChunk {
		/// The sink input the data belongs to.
		input: u32,
		/// The data, in the device's sample spec.
		chunk: MemChunk,
	},
	/// The monitored sink rewound; un-read this many bytes.
	Rewind(usize),
	/// The hardware volume changed behind our back.
	VolumeChanged(ChannelVolumes),
	/// The hardware mute changed behind our back.
	MuteChanged(bool),
}

/// Events a sink's IO driver feeds into the IO thread.
#[derive(Debug)]
pub enum SinkEvent {
	/// The hardware wants this many bytes rendered.
	Render(usize),
	/// The hardware volume changed behind our back.
	VolumeChanged(ChannelVolumes),
	/// The hardware mute changed behind our back.
	MuteChanged(bool),
}

//---------------------------------------------------------------------------------------------------- Source drivers
/// Control-side driver of a source.
pub trait SourceDriver: Send {
	/// Apply `real` to the hardware; any residual the hardware
	/// cannot express goes into `soft`.
	fn set_volume(&mut self, _real: &ChannelVolumes, _soft: &mut ChannelVolumes) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Read the hardware volume back.
	fn get_volume(&mut self, _real: &mut ChannelVolumes) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Apply the mute state to the hardware.
	fn set_mute(&mut self, _muted: bool) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Read the hardware mute back.
	fn get_mute(&mut self) -> Result<bool, Error> {
		Err(Error::NotImplemented)
	}

	/// Switch the active port (non-deferred-volume devices).
	fn set_port(&mut self, _name: &str) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Reconfigure the device sample rate. Only called while the
	/// device is suspended.
	fn update_rate(&mut self, _rate: u32) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// The device is about to suspend (`true`) or resume (`false`).
	fn suspend(&mut self, _suspend: bool) -> Result<(), Error> {
		Ok(())
	}

	/// The formats the device can accept.
	fn get_formats(&self) -> Vec<FormatInfo> {
		vec![FormatInfo::PCM_ANY]
	}
}

/// IO-side driver of a source; lives on the IO thread.
pub trait SourceIoDriver: Send {
	/// The channel the driver feeds captured data and hardware
	/// events through, if it has one.
	fn events(&mut self) -> Option<Receiver<SourceEvent>> {
		None
	}

	/// Write a scheduled hardware volume (deferred volume).
	fn write_volume(&mut self, _hw: &ChannelVolumes) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Switch the active port from the IO thread
	/// (deferred-volume devices).
	fn set_port(&mut self, _name: &str) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Current capture latency.
	fn latency(&self) -> Usec {
		0
	}

	/// The streams' combined latency request changed.
	fn update_requested_latency(&mut self, _latency: Option<Usec>) {}
}

//---------------------------------------------------------------------------------------------------- Sink drivers
/// Control-side driver of a sink.
pub trait SinkDriver: Send {
	/// Apply `real` to the hardware; any residual the hardware
	/// cannot express goes into `soft`.
	fn set_volume(&mut self, _real: &ChannelVolumes, _soft: &mut ChannelVolumes) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Read the hardware volume back.
	fn get_volume(&mut self, _real: &mut ChannelVolumes) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Apply the mute state to the hardware.
	fn set_mute(&mut self, _muted: bool) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Read the hardware mute back.
	fn get_mute(&mut self) -> Result<bool, Error> {
		Err(Error::NotImplemented)
	}

	/// Switch the active port (non-deferred-volume devices).
	fn set_port(&mut self, _name: &str) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Reconfigure the device sample rate. Only called while the
	/// device is suspended.
	fn update_rate(&mut self, _rate: u32) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// The device is about to suspend (`true`) or resume (`false`).
	fn suspend(&mut self, _suspend: bool) -> Result<(), Error> {
		Ok(())
	}

	/// The formats the device can accept.
	fn get_formats(&self) -> Vec<FormatInfo> {
		vec![FormatInfo::PCM_ANY]
	}
}

/// IO-side driver of a sink; lives on the IO thread.
pub trait SinkIoDriver: Send {
	/// The channel the driver requests rendering and reports
	/// hardware events through, if it has one.
	fn events(&mut self) -> Option<Receiver<SinkEvent>> {
		None
	}

	/// Hand a fully mixed chunk to the hardware.
	fn write(&mut self, chunk: &MemChunk) -> Result<(), Error>;

	/// The hardware accepted a rewind of this many bytes:
	/// drop that much of its unplayed buffer.
	fn rewind(&mut self, _nbytes: usize) -> usize {
		0
	}

	/// Write a scheduled hardware volume (deferred volume).
	fn write_volume(&mut self, _hw: &ChannelVolumes) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Switch the active port from the IO thread
	/// (deferred-volume devices).
	fn set_port(&mut self, _name: &str) -> Result<(), Error> {
		Err(Error::NotImplemented)
	}

	/// Current playback latency.
	fn latency(&self) -> Usec {
		0
	}

	/// The streams' combined latency request changed.
	fn update_requested_latency(&mut self, _latency: Option<Usec>) {}
}

//---------------------------------------------------------------------------------------------------- Dummies
#[cfg(any(test, feature = "dummy"))]
pub use dummy::{DummySinkDriver,DummySinkHandle,DummySourceDriver,DummySourceHandle};

#[cfg(any(test, feature = "dummy"))]
mod dummy {
	//! Hardware-free drivers for tests and embedder experiments.

	use super::*;
	use crate::channel::ChannelVolumes;
	use crossbeam::channel::{unbounded,Sender};
	use std::sync::{Arc,Mutex};

	/// Shared observable state of a dummy source driver.
	#[derive(Debug,Default)]
	pub struct DummySourceState {
		/// The last volume the control side applied.
		pub hw_volume: Option<ChannelVolumes>,
		/// Every volume written through the IO side, in order.
		pub written_volumes: Vec<ChannelVolumes>,
		/// The last hardware mute applied.
		pub hw_muted: Option<bool>,
		/// Ports switched to, in order, with the context
		/// (`true` when switched on the IO thread).
		pub ports: Vec<(String, bool)>,
		/// Rates configured, in order.
		pub rates: Vec<u32>,
		/// Suspend/resume notifications.
		pub suspends: Vec<bool>,
	}

	/// The test's handle to a dummy source driver pair.
	#[derive(Clone,Debug)]
	pub struct DummySourceHandle {
		/// Feed captured chunks / hardware events into the device.
		pub feed: Sender<SourceEvent>,
		/// Observed driver calls.
		pub state: Arc<Mutex<DummySourceState>>,
		/// The latency the IO driver reports.
		pub latency: Arc<Mutex<Usec>>,
	}

	/// A control+IO driver pair for a source that exists only
	/// in memory.
	#[derive(Debug)]
	pub struct DummySourceDriver {
		state: Arc<Mutex<DummySourceState>>,
		latency: Arc<Mutex<Usec>>,
		events: Option<Receiver<SourceEvent>>,
	}

	impl DummySourceDriver {
		/// A (control driver, IO driver, test handle) triple.
		pub fn new() -> (Box<Self>, Box<Self>, DummySourceHandle) {
			let (tx, rx) = unbounded();
			let state = Arc::new(Mutex::new(DummySourceState::default()));
			let latency = Arc::new(Mutex::new(0));

			let ctl = Box::new(Self {
				state: Arc::clone(&state),
				latency: Arc::clone(&latency),
				events: None,
			});
			let io = Box::new(Self {
				state: Arc::clone(&state),
				latency: Arc::clone(&latency),
				events: Some(rx),
			});
			let handle = DummySourceHandle { feed: tx, state, latency };

			(ctl, io, handle)
		}
	}

	impl SourceDriver for DummySourceDriver {
		fn set_volume(&mut self, real: &ChannelVolumes, _soft: &mut ChannelVolumes) -> Result<(), Error> {
			self.state.lock().unwrap().hw_volume = Some(*real);
			Ok(())
		}

		fn get_volume(&mut self, real: &mut ChannelVolumes) -> Result<(), Error> {
			if let Some(v) = self.state.lock().unwrap().hw_volume {
				*real = v;
			}
			Ok(())
		}

		fn set_mute(&mut self, muted: bool) -> Result<(), Error> {
			self.state.lock().unwrap().hw_muted = Some(muted);
			Ok(())
		}

		fn get_mute(&mut self) -> Result<bool, Error> {
			Ok(self.state.lock().unwrap().hw_muted.unwrap_or(false))
		}

		fn set_port(&mut self, name: &str) -> Result<(), Error> {
			self.state.lock().unwrap().ports.push((name.to_owned(), false));
			Ok(())
		}

		fn update_rate(&mut self, rate: u32) -> Result<(), Error> {
			self.state.lock().unwrap().rates.push(rate);
			Ok(())
		}

		fn suspend(&mut self, suspend: bool) -> Result<(), Error> {
			self.state.lock().unwrap().suspends.push(suspend);
			Ok(())
		}
	}

	impl SourceIoDriver for DummySourceDriver {
		fn events(&mut self) -> Option<Receiver<SourceEvent>> {
			self.events.take()
		}

		fn write_volume(&mut self, hw: &ChannelVolumes) -> Result<(), Error> {
			let mut state = self.state.lock().unwrap();
			state.hw_volume = Some(*hw);
			state.written_volumes.push(*hw);
			Ok(())
		}

		fn set_port(&mut self, name: &str) -> Result<(), Error> {
			self.state.lock().unwrap().ports.push((name.to_owned(), true));
			Ok(())
		}

		fn latency(&self) -> Usec {
			*self.latency.lock().unwrap()
		}
	}

	/// Shared observable state of a dummy sink driver.
	#[derive(Debug,Default)]
	pub struct DummySinkState {
		/// Every chunk the sink wrote to the "hardware".
		pub written: Vec<MemChunk>,
		/// Bytes taken back by rewinds.
		pub rewound: usize,
		/// The last volume the control side applied.
		pub hw_volume: Option<ChannelVolumes>,
		/// Every volume written through the IO side, in order.
		pub written_volumes: Vec<ChannelVolumes>,
		/// The last hardware mute applied.
		pub hw_muted: Option<bool>,
		/// Ports switched to, in order.
		pub ports: Vec<(String, bool)>,
		/// Rates configured, in order.
		pub rates: Vec<u32>,
		/// Suspend/resume notifications.
		pub suspends: Vec<bool>,
	}

	/// The test's handle to a dummy sink driver pair.
	#[derive(Clone,Debug)]
	pub struct DummySinkHandle {
		/// Request renders / feed hardware events.
		pub feed: Sender<SinkEvent>,
		/// Observed driver calls.
		pub state: Arc<Mutex<DummySinkState>>,
		/// The latency the IO driver reports.
		pub latency: Arc<Mutex<Usec>>,
	}

	/// A control+IO driver pair for a sink that exists only
	/// in memory.
	#[derive(Debug)]
	pub struct DummySinkDriver {
		state: Arc<Mutex<DummySinkState>>,
		latency: Arc<Mutex<Usec>>,
		events: Option<Receiver<SinkEvent>>,
	}

	impl DummySinkDriver {
		/// A (control driver, IO driver, test handle) triple.
		pub fn new() -> (Box<Self>, Box<Self>, DummySinkHandle) {
			let (tx, rx) = unbounded();
			let state = Arc::new(Mutex::new(DummySinkState::default()));
			let latency = Arc::new(Mutex::new(0));

			let ctl = Box::new(Self {
				state: Arc::clone(&state),
				latency: Arc::clone(&latency),
				events: None,
			});
			let io = Box::new(Self {
				state: Arc::clone(&state),
				latency: Arc::clone(&latency),
				events: Some(rx),
			});
			let handle = DummySinkHandle { feed: tx, state, latency };

			(ctl, io, handle)
		}
	}

	impl SinkDriver for DummySinkDriver {
		fn set_volume(&mut self, real: &ChannelVolumes, _soft: &mut ChannelVolumes) -> Result<(), Error> {
			self.state.lock().unwrap().hw_volume = Some(*real);
			Ok(())
		}

		fn get_volume(&mut self, real: &mut ChannelVolumes) -> Result<(), Error> {
			if let Some(v) = self.state.lock().unwrap().hw_volume {
				*real = v;
			}
			Ok(())
		}

		fn set_mute(&mut self, muted: bool) -> Result<(), Error> {
			self.state.lock().unwrap().hw_muted = Some(muted);
			Ok(())
		}

		fn get_mute(&mut self) -> Result<bool, Error> {
			Ok(self.state.lock().unwrap().hw_muted.unwrap_or(false))
		}

		fn set_port(&mut self, name: &str) -> Result<(), Error> {
			self.state.lock().unwrap().ports.push((name.to_owned(), false));
			Ok(())
		}

		fn update_rate(&mut self, rate: u32) -> Result<(), Error> {
			self.state.lock().unwrap().rates.push(rate);
			Ok(())
		}

		fn suspend(&mut self, suspend: bool) -> Result<(), Error> {
			self.state.lock().unwrap().suspends.push(suspend);
			Ok(())
		}
	}

	impl SinkIoDriver for DummySinkDriver {
		fn events(&mut self) -> Option<Receiver<SinkEvent>> {
			self.events.take()
		}

		fn write(&mut self, chunk: &MemChunk) -> Result<(), Error> {
			self.state.lock().unwrap().written.push(chunk.clone());
			Ok(())
		}

		fn rewind(&mut self, nbytes: usize) -> usize {
			self.state.lock().unwrap().rewound += nbytes;
			nbytes
		}

		fn write_volume(&mut self, hw: &ChannelVolumes) -> Result<(), Error> {
			let mut state = self.state.lock().unwrap();
			state.hw_volume = Some(*hw);
			state.written_volumes.push(*hw);
			Ok(())
		}

		fn set_port(&mut self, name: &str) -> Result<(), Error> {
			self.state.lock().unwrap().ports.push((name.to_owned(), true));
			Ok(())
		}

		fn latency(&self) -> Usec {
			*self.latency.lock().unwrap()
		}
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {}
