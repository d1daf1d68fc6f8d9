//! Channel maps and per-channel volumes.

mod map;
pub use map::{ChannelMap,Position,PositionMask};

mod volume;
pub use volume::{ChannelVolumes,Volume,VolumeDb};
