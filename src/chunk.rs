//! Reference-counted memory chunks and the in-place sample primitives.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::{ChannelVolumes,Volume};
use crate::sample::{SampleFormat,SampleSpec};
use std::sync::Arc;

//---------------------------------------------------------------------------------------------------- MemBlock
/// A reference-counted block of raw audio bytes.
///
/// Blocks handed into streams may be read by many consumers;
/// any in-place mutation must go through [`MemChunk::make_writable`]
/// first, which clones shared data.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct MemBlock(Arc<Vec<u8>>);

impl MemBlock {
	/// Wrap raw bytes.
	pub fn new(data: Vec<u8>) -> Self {
		Self(Arc::new(data))
	}

	/// A zeroed block of `len` bytes.
	pub fn silence(len: usize) -> Self {
		Self(Arc::new(vec![0; len]))
	}

	/// Length in bytes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Is this block empty?
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Is this block shared with another reference?
	pub fn is_shared(&self) -> bool {
		Arc::strong_count(&self.0) > 1
	}
}

impl std::ops::Deref for MemBlock {
	type Target = [u8];
	fn deref(&self) -> &[u8] {
		&self.0
	}
}

//---------------------------------------------------------------------------------------------------- MemChunk
/// A view into a [`MemBlock`]: `length` bytes starting at `index`.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct MemChunk {
	/// The underlying block.
	pub block: MemBlock,
	/// Byte offset of this view.
	pub index: usize,
	/// Byte length of this view.
	pub length: usize,
}

impl MemChunk {
	/// A chunk covering a whole new block.
	pub fn from_bytes(data: Vec<u8>) -> Self {
		let length = data.len();
		Self { block: MemBlock::new(data), index: 0, length }
	}

	/// A silent chunk of `length` bytes.
	pub fn silence(length: usize) -> Self {
		Self { block: MemBlock::silence(length), index: 0, length }
	}

	/// A chunk from interleaved f32 samples.
	pub fn from_f32(samples: &[f32]) -> Self {
		let mut data = Vec::with_capacity(samples.len() * 4);
		for s in samples {
			data.extend_from_slice(&s.to_le_bytes());
		}
		Self::from_bytes(data)
	}

	/// The bytes of this view.
	pub fn bytes(&self) -> &[u8] {
		&self.block[self.index..self.index + self.length]
	}

	/// Decode this view as interleaved f32 samples.
	pub fn to_f32(&self) -> Vec<f32> {
		self.bytes()
			.chunks_exact(4)
			.map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
			.collect()
	}

	/// Is this view zero bytes long?
	pub fn is_empty(&self) -> bool {
		self.length == 0
	}

	/// Split off the first `length` bytes as a (cheap) sub-chunk.
	pub fn sub_chunk(&self, offset: usize, length: usize) -> Self {
		debug_assert!(offset + length <= self.length);
		Self {
			block:  self.block.clone(),
			index:  self.index + offset,
			length,
		}
	}

	/// Guarantee exclusive ownership of the viewed bytes.
	///
	/// If the block is shared, the viewed range is copied into a fresh
	/// block and the view rebased onto it.
	pub fn make_writable(&mut self) {
		if !self.block.is_shared() && self.index == 0 && self.length == self.block.len() {
			return;
		}

		let copy = self.bytes().to_vec();
		self.block = MemBlock::new(copy);
		self.index = 0;
	}

	/// Mutable access to the viewed bytes.
	///
	/// INVARIANT: [`Self::make_writable`] must have been called first.
	fn bytes_mut(&mut self) -> &mut [u8] {
		debug_assert!(!self.block.is_shared());
		debug_assert_eq!(self.index, 0);
		let len = self.length;
		// The strong count is 1, checked above.
		Arc::get_mut(&mut self.block.0).map(|v| &mut v[..len]).unwrap()
	}
}

//---------------------------------------------------------------------------------------------------- Primitives
/// Overwrite a chunk with silence (in place; clones shared data).
pub fn silence_chunk(chunk: &mut MemChunk, _spec: &SampleSpec) {
	chunk.make_writable();
	chunk.bytes_mut().fill(0);
}

/// Apply a per-channel volume to a chunk (in place; clones shared data).
///
/// The chunk must hold whole frames in `spec`; `volume` must be
/// compatible with `spec`.
pub fn volume_chunk(chunk: &mut MemChunk, spec: &SampleSpec, volume: &ChannelVolumes) {
	debug_assert!(volume.compatible_with(spec));
	debug_assert!(spec.frame_aligned(chunk.length));

	if volume.is_norm() {
		return;
	}

	if volume.is_muted() {
		silence_chunk(chunk, spec);
		return;
	}

	chunk.make_writable();

	let channels = spec.channels as usize;
	let factors: Vec<f64> = volume.as_slice().iter().map(|v| v.to_linear()).collect();

	match spec.format {
		SampleFormat::F32Le => {
			for (i, frame) in chunk.bytes_mut().chunks_exact_mut(4).enumerate() {
				let f = factors[i % channels];
				let s = f32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
				frame.copy_from_slice(&((s as f64 * f) as f32).to_le_bytes());
			}
		},
		SampleFormat::S16Le => {
			for (i, frame) in chunk.bytes_mut().chunks_exact_mut(2).enumerate() {
				let f = factors[i % channels];
				let s = i16::from_le_bytes([frame[0], frame[1]]);
				let scaled = (f64::from(s) * f).round();
				let clamped = scaled.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
				frame.copy_from_slice(&clamped.to_le_bytes());
			}
		},
	}
}

/// Mix `src` into `dst` (saturating add), both in `spec`.
pub fn mix_into(dst: &mut MemChunk, src: &MemChunk, spec: &SampleSpec) {
	debug_assert_eq!(dst.length, src.length);

	dst.make_writable();

	match spec.format {
		SampleFormat::F32Le => {
			let src = src.to_f32();
			for (frame, s) in dst.bytes_mut().chunks_exact_mut(4).zip(src) {
				let d = f32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
				frame.copy_from_slice(&(d + s).to_le_bytes());
			}
		},
		SampleFormat::S16Le => {
			let src_bytes = src.bytes().to_vec();
			for (frame, s) in dst.bytes_mut().chunks_exact_mut(2).zip(src_bytes.chunks_exact(2)) {
				let d = i32::from(i16::from_le_bytes([frame[0], frame[1]]));
				let s = i32::from(i16::from_le_bytes([s[0], s[1]]));
				let sum = (d + s).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
				frame.copy_from_slice(&sum.to_le_bytes());
			}
		},
	}
}

/// Apply a single flat volume, the cheap path used when every
/// channel carries the same gain.
pub fn volume_chunk_flat(chunk: &mut MemChunk, spec: &SampleSpec, volume: Volume) {
	let v = ChannelVolumes::uniform(spec.channels, volume);
	volume_chunk(chunk, spec, &v);
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	const SPEC: SampleSpec = SampleSpec {
		format:   SampleFormat::F32Le,
		rate:     48_000,
		channels: 2,
	};

	#[test]
	fn clone_for_write() {
		let a = MemChunk::from_f32(&[1.0, -1.0]);
		let mut b = a.clone();

		silence_chunk(&mut b, &SPEC);

		// `a` must be untouched.
		assert_eq!(a.to_f32(), vec![1.0, -1.0]);
		assert_eq!(b.to_f32(), vec![0.0, 0.0]);
	}

	#[test]
	fn volume_applies_per_channel() {
		let mut c = MemChunk::from_f32(&[1.0, 1.0, 0.5, 0.5]);
		let mut v = ChannelVolumes::norm(2);
		v.values[1] = Volume::MUTED;

		volume_chunk(&mut c, &SPEC, &v);

		let out = c.to_f32();
		assert_eq!(out[0], 1.0);
		assert_eq!(out[1], 0.0);
		assert_eq!(out[2], 0.5);
		assert_eq!(out[3], 0.0);
	}

	#[test]
	fn s16_volume_saturates() {
		let spec = SampleSpec { format: SampleFormat::S16Le, ..SPEC };
		let mut data = Vec::new();
		data.extend_from_slice(&i16::MAX.to_le_bytes());
		data.extend_from_slice(&i16::MAX.to_le_bytes());
		let mut c = MemChunk::from_bytes(data);

		volume_chunk_flat(&mut c, &spec, Volume::MAX);

		let b = c.bytes();
		assert_eq!(i16::from_le_bytes([b[0], b[1]]), i16::MAX);
	}

	#[test]
	fn sub_chunk_is_a_view() {
		let c = MemChunk::from_f32(&[0.0, 1.0, 2.0, 3.0]);
		let s = c.sub_chunk(8, 8);
		assert_eq!(s.to_f32(), vec![2.0, 3.0]);
	}

	#[test]
	fn mixing_sums() {
		let mut a = MemChunk::from_f32(&[0.25, 0.25]);
		let b = MemChunk::from_f32(&[0.5, -0.5]);
		mix_into(&mut a, &b, &SPEC);
		assert_eq!(a.to_f32(), vec![0.75, -0.25]);
	}
}
