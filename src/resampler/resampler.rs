//! The `Resampler` trait.

//---------------------------------------------------------------------------------------------------- use
use crate::chunk::MemChunk;
use crate::sample::SampleSpec;
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- ResampleMethod
/// Which resampling algorithm a stream asked for / ended up with.
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "kebab-case")]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ResampleMethod {
	/// Let the core pick.
	#[default]
	Auto,
	/// Nearest-frame conversion, no filtering.
	Trivial,
	/// Linear interpolation.
	Linear,
	/// Windowed-sinc family (provided by an external backend).
	Sinc,
	/// No conversion (specs already match).
	Copy,
}

//---------------------------------------------------------------------------------------------------- Resampler
/// A sample-rate/channel-layout converter between two fixed specs.
///
/// Implementations run on the device IO thread, so they must be
/// `Send` and must not block.
pub trait Resampler: Send + std::fmt::Debug {
	/// The spec fed into [`Self::run`].
	fn input_spec(&self) -> &SampleSpec;

	/// The spec produced by [`Self::run`].
	fn output_spec(&self) -> &SampleSpec;

	/// How many input bytes are needed to produce `out_length` output bytes?
	///
	/// The result is frame aligned in the input spec.
	fn request(&self, out_length: usize) -> usize;

	/// How many output bytes result from `in_length` input bytes?
	///
	/// Inverse of [`Self::request`], frame aligned in the output spec.
	fn result(&self, in_length: usize) -> usize;

	/// The largest input chunk [`Self::run`] accepts, in bytes.
	fn max_block_size(&self) -> usize;

	/// Convert one chunk. May return an empty chunk while the
	/// implementation buffers up data.
	fn run(&mut self, input: &MemChunk) -> MemChunk;

	/// Drop any internal history (after a rewind).
	fn reset(&mut self);

	/// Which algorithm this implementation is.
	fn method(&self) -> ResampleMethod;
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {}
