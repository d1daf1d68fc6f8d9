//! Resampler seam.
//!
//! The resampling algorithm itself is an external collaborator;
//! this module defines the interface streams drive and the trivial
//! backend used as the in-tree fallback and under test.

mod resampler;
pub use resampler::{ResampleMethod,Resampler};

mod trivial;
pub use trivial::TrivialResampler;
