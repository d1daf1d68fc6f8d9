//! Nearest-frame resampler.

//---------------------------------------------------------------------------------------------------- use
use crate::channel::ChannelMap;
use crate::chunk::MemChunk;
use crate::resampler::{ResampleMethod,Resampler};
use crate::sample::{SampleFormat,SampleSpec};

//---------------------------------------------------------------------------------------------------- TrivialResampler
/// The simplest possible converter: frames are duplicated or dropped
/// to match the output rate, channels are remapped by position with
/// down-mix-to-average / up-mix-by-copy fallbacks.
///
/// Audibly crude, but stateless-ish, cheap, and exact about lengths,
/// which is what the queue bookkeeping around it cares about.
#[derive(Debug)]
pub struct TrivialResampler {
	input: SampleSpec,
	output: SampleSpec,
	input_map: ChannelMap,
	output_map: ChannelMap,
	/// Running input frame counter, kept so rate conversion
	/// stays phase-continuous across chunks.
	in_frames: u64,
	/// Running output frame counter.
	out_frames: u64,
}

impl TrivialResampler {
	/// Create a converter between two specs.
	///
	/// Only [`SampleFormat::F32Le`] data is converted; the format of
	/// both specs must match.
	pub fn new(
		input: SampleSpec,
		input_map: ChannelMap,
		output: SampleSpec,
		output_map: ChannelMap,
	) -> Self {
		debug_assert_eq!(input.format, output.format);
		debug_assert_eq!(input.format, SampleFormat::F32Le);

		Self {
			input,
			output,
			input_map,
			output_map,
			in_frames: 0,
			out_frames: 0,
		}
	}

	/// Map one input frame into the output layout.
	fn remap_frame(&self, frame: &[f32], out: &mut Vec<f32>) {
		let avg = frame.iter().sum::<f32>() / frame.len() as f32;

		for target in self.output_map.positions() {
			let mut sum = 0.0;
			let mut n = 0_u32;

			for (j, source) in self.input_map.positions().iter().enumerate() {
				if source == target {
					sum += frame[j];
					n += 1;
				}
			}

			out.push(if n == 0 { avg } else { sum / n as f32 });
		}
	}
}

impl Resampler for TrivialResampler {
	fn input_spec(&self) -> &SampleSpec {
		&self.input
	}

	fn output_spec(&self) -> &SampleSpec {
		&self.output
	}

	fn request(&self, out_length: usize) -> usize {
		let out_frames = out_length / self.output.frame_size();
		let in_frames = (out_frames as u64 * u64::from(self.input.rate))
			.div_ceil(u64::from(self.output.rate));
		in_frames as usize * self.input.frame_size()
	}

	fn result(&self, in_length: usize) -> usize {
		let in_frames = in_length / self.input.frame_size();
		let out_frames = in_frames as u64 * u64::from(self.output.rate)
			/ u64::from(self.input.rate);
		out_frames as usize * self.output.frame_size()
	}

	fn max_block_size(&self) -> usize {
		// One second of input.
		self.input.rate as usize * self.input.frame_size()
	}

	fn run(&mut self, input: &MemChunk) -> MemChunk {
		let samples = input.to_f32();
		let in_channels = self.input.channels as usize;
		let frames: Vec<&[f32]> = samples.chunks_exact(in_channels).collect();

		if frames.is_empty() {
			return MemChunk::from_f32(&[]);
		}

		let start = self.in_frames;
		self.in_frames += frames.len() as u64;

		// How many output frames the stream owes after this input.
		let owed = self.in_frames * u64::from(self.output.rate) / u64::from(self.input.rate);
		let produce = owed - self.out_frames;

		let mut out: Vec<f32> = Vec::with_capacity(produce as usize * self.output.channels as usize);

		for k in 0..produce {
			// Nearest input frame for output frame (out_frames + k).
			let t = (self.out_frames + k) * u64::from(self.input.rate) / u64::from(self.output.rate);
			let idx = (t.saturating_sub(start)).min(frames.len() as u64 - 1) as usize;
			self.remap_frame(frames[idx], &mut out);
		}

		self.out_frames = owed;
		MemChunk::from_f32(&out)
	}

	fn reset(&mut self) {
		self.in_frames = 0;
		self.out_frames = 0;
	}

	fn method(&self) -> ResampleMethod {
		ResampleMethod::Trivial
	}
}

//---------------------------------------------------------------------------------------------------- TESTS
#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn spec(rate: u32, channels: u8) -> SampleSpec {
		SampleSpec { format: SampleFormat::F32Le, rate, channels }
	}

	#[test]
	fn upsample_doubles_frames() {
		let mut r = TrivialResampler::new(
			spec(24_000, 1), ChannelMap::MONO,
			spec(48_000, 1), ChannelMap::MONO,
		);

		let out = r.run(&MemChunk::from_f32(&[1.0, 2.0]));
		assert_eq!(out.to_f32(), vec![1.0, 1.0, 2.0, 2.0]);
	}

	#[test]
	fn downsample_halves_frames() {
		let mut r = TrivialResampler::new(
			spec(48_000, 1), ChannelMap::MONO,
			spec(24_000, 1), ChannelMap::MONO,
		);

		let out = r.run(&MemChunk::from_f32(&[1.0, 2.0, 3.0, 4.0]));
		assert_eq!(out.to_f32(), vec![1.0, 3.0]);
	}

	#[test]
	fn request_result_are_inverse_enough() {
		let r = TrivialResampler::new(
			spec(44_100, 2), ChannelMap::STEREO,
			spec(48_000, 2), ChannelMap::STEREO,
		);

		let out_len = 48_000 * 8; // one second of output
		let in_len = r.request(out_len);
		assert!(r.result(in_len) >= out_len);
	}

	#[test]
	fn mono_to_stereo_copies() {
		let mut r = TrivialResampler::new(
			spec(48_000, 1), ChannelMap::MONO,
			spec(48_000, 2), ChannelMap::STEREO,
		);

		let out = r.run(&MemChunk::from_f32(&[0.5]));
		assert_eq!(out.to_f32(), vec![0.5, 0.5]);
	}

	#[test]
	fn phase_continuity_across_chunks() {
		let mut r = TrivialResampler::new(
			spec(30_000, 1), ChannelMap::MONO,
			spec(20_000, 1), ChannelMap::MONO,
		);

		// 3 input frames -> 2 output frames, whichever way they arrive.
		let mut total = 0;
		for _ in 0..3 {
			total += r.run(&MemChunk::from_f32(&[1.0])).to_f32().len();
		}
		assert_eq!(total, 2);
	}
}
