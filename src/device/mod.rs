//! Devices: sources (capture) and sinks (playback).
//!
//! Every device splits in two: the control-thread object owned by
//! [`crate::Core`], and a shadow owned by the device's IO thread.
//! The two sides only ever talk through the device's message
//! queue: a blocking `send` for round-trips, a fire-and-forget
//! `post` for everything else.

mod flags;
pub use flags::DeviceFlags;

mod state;
pub use state::{DeviceState,SuspendCause};

pub mod port;
pub use port::{Available,DevicePort};

mod driver;
pub use driver::{SinkDriver,SinkEvent,SinkIoDriver,SourceDriver,SourceEvent,SourceIoDriver};

#[cfg(any(test, feature = "dummy"))]
pub use driver::{DummySinkDriver,DummySinkHandle,DummySourceDriver,DummySourceHandle};

pub(crate) mod msg;

mod volume_change;
pub use volume_change::{VolumeChange,VolumeChangeQueue};

pub mod source;
pub use source::{Source,SourceBuilder};

pub mod sink;
pub use sink::{Sink,SinkBuilder};

//---------------------------------------------------------------------------------------------------- Shared constants
use crate::sample::Usec;

/// Lowest latency a device may be asked for.
pub const MIN_LATENCY: Usec = 500;

/// Highest latency a device may be asked for.
pub const MAX_LATENCY: Usec = 10 * crate::sample::USEC_PER_SEC;

/// Latency reported by fixed-latency devices unless configured.
pub const DEFAULT_FIXED_LATENCY: Usec = 250 * crate::sample::USEC_PER_MSEC;

/// Cap on streams attached to one device.
pub const MAX_STREAMS_PER_DEVICE: usize = 256;

/// Hard cap on the volume-sharing walk, guarding against
/// accidentally cyclic device chains.
pub const SHARE_WALK_LIMIT: usize = 100;
