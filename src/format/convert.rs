//! Stateless encoding + channel conversion.

//---------------------------------------------------------------------------------------------------- Use
use crate::format::{
	Sample,
	SampleFormat,
	ChannelMap,
	Route,
	sample::I24,
};

//---------------------------------------------------------------------------------------------------- Constants
/// The maximum channel count [`convert`] handles.
pub const MAX_CHANNELS: u16 = 32;

//---------------------------------------------------------------------------------------------------- Free functions
/// Fill `buffer` with silence in `format`.
///
/// ```rust
/// # use audiodev::format::*;
/// let mut buf = [1_u8; 4];
/// silence(&mut buf, SampleFormat::U8);
/// assert_eq!(buf, [128; 4]);
/// silence(&mut buf, SampleFormat::S16);
/// assert_eq!(buf, [0; 4]);
/// ```
pub fn silence(buffer: &mut [u8], format: SampleFormat) {
	buffer.fill(format.silence_byte());
}

/// Convert interleaved little-endian PCM frames.
///
/// Encoding conversion (`from` -> `to`) and channel conversion
/// (`from_channels` -> `to_channels`, routed by `map`) happen in
/// one pass. The interleaving order is never changed, only the
/// value in each channel slot.
///
/// The number of frames actually converted is returned, which is
/// the minimum of `frames` and what fits in `src` and `dst`.
/// Channel counts of `0` or above [`MAX_CHANNELS`] convert nothing.
///
/// ```rust
/// # use audiodev::format::*;
/// // Mono s16 -> stereo f32.
/// let src = 16_384_i16.to_le_bytes();
/// let mut dst = [0_u8; 8];
/// let frames = convert(
///     &src, SampleFormat::S16, 1,
///     &mut dst, SampleFormat::F32, 2,
///     1, &DefaultChannelMap,
/// );
/// assert_eq!(frames, 1);
/// assert_eq!(f32::from_le_bytes(dst[0..4].try_into().unwrap()), 0.5);
/// assert_eq!(f32::from_le_bytes(dst[4..8].try_into().unwrap()), 0.5);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn convert(
	src: &[u8],
	from: SampleFormat,
	from_channels: u16,
	dst: &mut [u8],
	to: SampleFormat,
	to_channels: u16,
	frames: usize,
	map: &dyn ChannelMap,
) -> usize {
	let valid = 1..=MAX_CHANNELS;
	if !valid.contains(&from_channels) || !valid.contains(&to_channels) {
		return 0;
	}

	let in_stride  = from.bytes() * from_channels as usize;
	let out_stride = to.bytes() * to_channels as usize;
	let frames = frames
		.min(src.len() / in_stride)
		.min(dst.len() / out_stride);

	if frames == 0 {
		return 0;
	}

	let mut routes = [Route::Silence; MAX_CHANNELS as usize];
	for (output, route) in routes.iter_mut().take(to_channels as usize).enumerate() {
		*route = match map.route(from_channels, to_channels, output as u16) {
			// Guard against maps pointing outside the input.
			Route::Channel(c) if c >= from_channels => Route::Silence,
			r => r,
		};
	}
	let routes = &routes[..to_channels as usize];

	// Identical layout routed straight through, nothing to do but copy.
	let identity = from_channels == to_channels
		&& routes.iter().enumerate().all(|(j, r)| *r == Route::Channel(j as u16));
	if from == to && identity {
		let len = frames * in_stride;
		dst[..len].copy_from_slice(&src[..len]);
		return frames;
	}

	let src = &src[..frames * in_stride];
	let dst = &mut dst[..frames * out_stride];

	match from {
		SampleFormat::U8  => convert_from::<u8>(src, from_channels, dst, to, routes),
		SampleFormat::S16 => convert_from::<i16>(src, from_channels, dst, to, routes),
		SampleFormat::S24 => convert_from::<I24>(src, from_channels, dst, to, routes),
		SampleFormat::S32 => convert_from::<i32>(src, from_channels, dst, to, routes),
		SampleFormat::F32 => convert_from::<f32>(src, from_channels, dst, to, routes),
	}

	frames
}

//---------------------------------------------------------------------------------------------------- Private
/// Second half of the format dispatch.
fn convert_from<S: Sample>(
	src: &[u8],
	from_channels: u16,
	dst: &mut [u8],
	to: SampleFormat,
	routes: &[Route],
) {
	match to {
		SampleFormat::U8  => convert_frames::<S, u8>(src, from_channels, dst, routes),
		SampleFormat::S16 => convert_frames::<S, i16>(src, from_channels, dst, routes),
		SampleFormat::S24 => convert_frames::<S, I24>(src, from_channels, dst, routes),
		SampleFormat::S32 => convert_frames::<S, i32>(src, from_channels, dst, routes),
		SampleFormat::F32 => convert_frames::<S, f32>(src, from_channels, dst, routes),
	}
}

/// The monomorphized inner loop.
///
/// `src` and `dst` are already trimmed to an exact frame count.
fn convert_frames<S: Sample, D: Sample>(
	src: &[u8],
	from_channels: u16,
	dst: &mut [u8],
	routes: &[Route],
) {
	let in_stride  = S::BYTES * from_channels as usize;
	let out_stride = D::BYTES * routes.len();

	for (input, output) in src.chunks_exact(in_stride).zip(dst.chunks_exact_mut(out_stride)) {
		for (slot, route) in output.chunks_exact_mut(D::BYTES).zip(routes) {
			let d: D = match *route {
				Route::Channel(c) => {
					let offset = c as usize * S::BYTES;
					sample::<S, D>(S::read(&input[offset..]))
				},
				Route::Average => average::<S, D>(input),
				Route::Silence => D::from_i32(0),
			};
			d.write(slot);
		}
	}
}

#[inline]
/// Convert a single sample.
///
/// Anything involving a float goes through `f32`, integer
/// pairs shift through a left-justified `i32` instead so
/// that 32-bit integers never lose precision.
fn sample<S: Sample, D: Sample>(s: S) -> D {
	if S::FORMAT.is_float() || D::FORMAT.is_float() {
		D::from_f32(s.to_f32())
	} else {
		D::from_i32(s.to_i32())
	}
}

#[inline]
/// Average every sample in one input frame.
fn average<S: Sample, D: Sample>(frame: &[u8]) -> D {
	let count = frame.len() / S::BYTES;

	if S::FORMAT.is_float() || D::FORMAT.is_float() {
		let sum: f32 = frame.chunks_exact(S::BYTES).map(|b| S::read(b).to_f32()).sum();
		D::from_f32(sum / count as f32)
	} else {
		let sum: i64 = frame.chunks_exact(S::BYTES).map(|b| i64::from(S::read(b).to_i32())).sum();
		D::from_i32((sum / count as i64) as i32)
	}
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;
	use crate::format::DefaultChannelMap;
	use strum::IntoEnumIterator;

	/// Encode `samples` (given as left-justified `i32`s) in `format`.
	fn encode(format: SampleFormat, samples: &[i32]) -> Vec<u8> {
		let src: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
		let mut dst = vec![0; samples.len() * format.bytes()];
		convert(&src, SampleFormat::S32, 1, &mut dst, format, 1, samples.len(), &DefaultChannelMap);
		dst
	}

	fn s16(samples: &[i16]) -> Vec<u8> {
		samples.iter().flat_map(|s| s.to_le_bytes()).collect()
	}

	fn to_s16(bytes: &[u8]) -> Vec<i16> {
		bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect()
	}

	#[test]
	fn identical_layout_is_a_copy() {
		for format in SampleFormat::iter() {
			let src: Vec<u8> = (0..format.bytes() * 2 * 16).map(|b| b as u8).collect();
			let mut dst = vec![0; src.len()];
			let frames = convert(&src, format, 2, &mut dst, format, 2, 16, &DefaultChannelMap);
			assert_eq!(frames, 16);
			assert_eq!(src, dst, "{format}");
		}
	}

	#[test]
	fn same_depth_integer_round_trip_is_exact() {
		// Every s16 value through every other
		// encoding of >= 16 bits and back.
		let all: Vec<i16> = (i16::MIN..=i16::MAX).collect();
		let src = s16(&all);

		for via in [SampleFormat::S24, SampleFormat::S32, SampleFormat::F32] {
			let mut mid = vec![0; all.len() * via.bytes()];
			let mut back = vec![0; src.len()];
			convert(&src, SampleFormat::S16, 1, &mut mid, via, 1, all.len(), &DefaultChannelMap);
			convert(&mid, via, 1, &mut back, SampleFormat::S16, 1, all.len(), &DefaultChannelMap);
			assert_eq!(to_s16(&back), all, "s16 -> {via} -> s16");
		}
	}

	#[test]
	fn narrowing_round_trip_is_within_one_step() {
		let all: Vec<i16> = (i16::MIN..=i16::MAX).collect();
		let src = s16(&all);

		let mut mid = vec![0; all.len()];
		let mut back = vec![0; src.len()];
		convert(&src, SampleFormat::S16, 1, &mut mid, SampleFormat::U8, 1, all.len(), &DefaultChannelMap);
		convert(&mid, SampleFormat::U8, 1, &mut back, SampleFormat::S16, 1, all.len(), &DefaultChannelMap);

		// One u8 step is 256 s16 steps.
		for (a, b) in all.iter().zip(to_s16(&back)) {
			assert!((i32::from(*a) - i32::from(b)).abs() < 256, "{a} -> {b}");
		}
	}

	#[test]
	fn s32_through_s24_is_within_one_step() {
		let values = [i32::MIN, -1 << 20, -257, -1, 0, 1, 255, 256, 1 << 20, i32::MAX];
		let src: Vec<u8> = values.iter().flat_map(|s| s.to_le_bytes()).collect();
		let mut mid = vec![0; values.len() * 3];
		let mut back = vec![0; src.len()];
		convert(&src, SampleFormat::S32, 1, &mut mid, SampleFormat::S24, 1, values.len(), &DefaultChannelMap);
		convert(&mid, SampleFormat::S24, 1, &mut back, SampleFormat::S32, 1, values.len(), &DefaultChannelMap);

		for (a, b) in values.iter().zip(back.chunks_exact(4)) {
			let b = i32::from_le_bytes([b[0], b[1], b[2], b[3]]);
			assert!((i64::from(*a) - i64::from(b)).abs() < 256, "{a} -> {b}");
		}
	}

	#[test]
	fn float_clips_to_s16() {
		let src: Vec<u8> = [1.5_f32, -1.5, 1.0, -1.0, 0.0].iter().flat_map(|f| f.to_le_bytes()).collect();
		let mut dst = [0; 10];
		convert(&src, SampleFormat::F32, 1, &mut dst, SampleFormat::S16, 1, 5, &DefaultChannelMap);
		pretty_assertions::assert_eq!(to_s16(&dst), [32_767, -32_768, 32_767, -32_768, 0]);
	}

	#[test]
	fn unsigned_signed_bias() {
		let src = [0_u8, 128, 255];
		let mut dst = [0; 6];
		convert(&src, SampleFormat::U8, 1, &mut dst, SampleFormat::S16, 1, 3, &DefaultChannelMap);
		pretty_assertions::assert_eq!(to_s16(&dst), [-32_768, 0, 32_512]);
	}

	#[test]
	fn mono_stereo_expand_contract() {
		let mono = s16(&[100]);
		let mut stereo = [0; 4];
		let mut back = [0; 2];

		convert(&mono, SampleFormat::S16, 1, &mut stereo, SampleFormat::S16, 2, 1, &DefaultChannelMap);
		pretty_assertions::assert_eq!(to_s16(&stereo), [100, 100]);

		convert(&stereo, SampleFormat::S16, 2, &mut back, SampleFormat::S16, 1, 1, &DefaultChannelMap);
		pretty_assertions::assert_eq!(to_s16(&back), [100]);
	}

	#[test]
	fn stereo_to_mono_averages() {
		let stereo = s16(&[100, 300, -50, 50]);
		let mut mono = [0; 4];
		convert(&stereo, SampleFormat::S16, 2, &mut mono, SampleFormat::S16, 1, 2, &DefaultChannelMap);
		pretty_assertions::assert_eq!(to_s16(&mono), [200, 0]);
	}

	#[test]
	fn channels_and_encoding_compose() {
		// stereo s16 -> mono s24 averages then widens.
		let stereo = s16(&[1000, 3000]);
		let mut mono = [0; 3];
		convert(&stereo, SampleFormat::S16, 2, &mut mono, SampleFormat::S24, 1, 1, &DefaultChannelMap);
		assert_eq!(I24::read(&mono), I24(2000 << 8));
	}

	#[test]
	fn truncates_to_first_channels() {
		let six = s16(&[1, 2, 3, 4, 5, 6]);
		let mut two = [0; 4];
		convert(&six, SampleFormat::S16, 6, &mut two, SampleFormat::S16, 2, 1, &DefaultChannelMap);
		pretty_assertions::assert_eq!(to_s16(&two), [1, 2]);
	}

	#[test]
	fn frame_count_is_clamped_to_buffers() {
		let src = encode(SampleFormat::S16, &[0; 8]);
		let mut dst = vec![0; 4 * 4];
		// 8 frames offered, 100 requested, room for 4.
		let frames = convert(&src, SampleFormat::S16, 1, &mut dst, SampleFormat::F32, 1, 100, &DefaultChannelMap);
		assert_eq!(frames, 4);
	}

	#[test]
	fn invalid_channel_counts_convert_nothing() {
		let src = [0; 64];
		let mut dst = [0; 64];
		assert_eq!(convert(&src, SampleFormat::U8, 0, &mut dst, SampleFormat::U8, 1, 4, &DefaultChannelMap), 0);
		assert_eq!(convert(&src, SampleFormat::U8, 1, &mut dst, SampleFormat::U8, MAX_CHANNELS + 1, 1, &DefaultChannelMap), 0);
	}

	#[test]
	fn silence_round_trips_between_encodings() {
		for from in SampleFormat::iter() {
			for to in SampleFormat::iter() {
				let mut src = vec![0; from.bytes() * 2 * 4];
				silence(&mut src, from);
				let mut dst = vec![0xAA; to.bytes() * 2 * 4];
				convert(&src, from, 2, &mut dst, to, 2, 4, &DefaultChannelMap);
				assert!(dst.iter().all(|b| *b == to.silence_byte()), "{from} -> {to}");
			}
		}
	}

	/// A user-provided map that swaps left and right.
	struct Swap;
	impl ChannelMap for Swap {
		fn route(&self, _: u16, _: u16, output: u16) -> Route {
			Route::Channel(1 - output)
		}
	}

	#[test]
	fn custom_channel_map() {
		let src = s16(&[1, 2]);
		let mut dst = [0; 4];
		let mut mid = [0; 8];
		convert(&src, SampleFormat::S16, 2, &mut mid, SampleFormat::S32, 2, 1, &Swap);
		convert(&mid, SampleFormat::S32, 2, &mut dst, SampleFormat::S16, 2, 1, &DefaultChannelMap);
		pretty_assertions::assert_eq!(to_s16(&dst), [2, 1]);
	}

	#[test]
	fn custom_channel_map_same_layout() {
		// Same encoding and channel count must still be routed.
		let src = s16(&[1, 2, 3, 4]);
		let mut dst = [0; 8];
		let frames = convert(&src, SampleFormat::S16, 2, &mut dst, SampleFormat::S16, 2, 2, &Swap);
		assert_eq!(frames, 2);
		pretty_assertions::assert_eq!(to_s16(&dst), [2, 1, 4, 3]);
	}
}
