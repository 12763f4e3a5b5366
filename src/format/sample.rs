//! Per-encoding sample codecs.
//!
//! Every [`SampleFormat`] has a type implementing [`Sample`] that
//! knows how to read/write itself from little-endian bytes and how
//! to move through the two intermediate representations:
//!
//! - a left-justified `i32` (integer <-> integer conversions)
//! - an `f32` in `-1.0..1.0` (anything involving floats)
//!
//! Integer <-> float scaling uses `2^(bits - 1)` in both directions
//! so integer -> float -> integer is lossless for <= 24-bit encodings.
//! Float -> integer rounds to the nearest value and clips to the
//! representable range instead of wrapping.

//---------------------------------------------------------------------------------------------------- Use
use crate::format::SampleFormat;

//---------------------------------------------------------------------------------------------------- Sample
/// A single PCM sample of some [`SampleFormat`].
pub(crate) trait Sample: Copy + Send + 'static {
	/// The encoding this type represents.
	const FORMAT: SampleFormat;
	/// Size in bytes, must equal `FORMAT.bytes()`.
	const BYTES: usize;

	/// Read from the first `BYTES` of `bytes`.
	fn read(bytes: &[u8]) -> Self;
	/// Write into the first `BYTES` of `bytes`.
	fn write(self, bytes: &mut [u8]);

	/// Left-justify into the full `i32` range.
	fn to_i32(self) -> i32;
	/// Truncate a left-justified `i32`.
	fn from_i32(v: i32) -> Self;

	/// Scale into `-1.0..1.0`.
	fn to_f32(self) -> f32;
	/// Scale from `-1.0..1.0`, clipping out-of-range input.
	fn from_f32(v: f32) -> Self;
}

/// Scale, round, and clip `v` to an integer range.
///
/// `NaN` becomes `0`.
#[inline]
fn quantize(v: f32, scale: f32, min: f32, max: f32) -> f32 {
	if v.is_nan() {
		return 0.0;
	}
	(v * scale).round().clamp(min, max)
}

//---------------------------------------------------------------------------------------------------- U8
impl Sample for u8 {
	const FORMAT: SampleFormat = SampleFormat::U8;
	const BYTES: usize = 1;

	#[inline]
	fn read(bytes: &[u8]) -> Self {
		bytes[0]
	}
	#[inline]
	fn write(self, bytes: &mut [u8]) {
		bytes[0] = self;
	}
	#[inline]
	fn to_i32(self) -> i32 {
		(i32::from(self) - 128) << 24
	}
	#[inline]
	fn from_i32(v: i32) -> Self {
		((v >> 24) + 128) as u8
	}
	#[inline]
	fn to_f32(self) -> f32 {
		(i32::from(self) - 128) as f32 / 128.0
	}
	#[inline]
	fn from_f32(v: f32) -> Self {
		(quantize(v, 128.0, -128.0, 127.0) as i32 + 128) as u8
	}
}

//---------------------------------------------------------------------------------------------------- S16
impl Sample for i16 {
	const FORMAT: SampleFormat = SampleFormat::S16;
	const BYTES: usize = 2;

	#[inline]
	fn read(bytes: &[u8]) -> Self {
		Self::from_le_bytes([bytes[0], bytes[1]])
	}
	#[inline]
	fn write(self, bytes: &mut [u8]) {
		bytes[..2].copy_from_slice(&self.to_le_bytes());
	}
	#[inline]
	fn to_i32(self) -> i32 {
		i32::from(self) << 16
	}
	#[inline]
	fn from_i32(v: i32) -> Self {
		(v >> 16) as Self
	}
	#[inline]
	fn to_f32(self) -> f32 {
		f32::from(self) / 32_768.0
	}
	#[inline]
	fn from_f32(v: f32) -> Self {
		quantize(v, 32_768.0, -32_768.0, 32_767.0) as Self
	}
}

//---------------------------------------------------------------------------------------------------- S24
/// A signed 24-bit sample, sign-extended into the low 24 bits of an `i32`.
#[derive(Copy,Clone,Debug,PartialEq,Eq)]
pub(crate) struct I24(pub(crate) i32);

impl I24 {
	pub(crate) const MIN: i32 = -8_388_608;
	pub(crate) const MAX: i32 = 8_388_607;
}

impl Sample for I24 {
	const FORMAT: SampleFormat = SampleFormat::S24;
	const BYTES: usize = 3;

	#[inline]
	fn read(bytes: &[u8]) -> Self {
		// Place the 3 bytes in the high end, then
		// arithmetic shift back down to sign-extend.
		Self(i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8)
	}
	#[inline]
	fn write(self, bytes: &mut [u8]) {
		bytes[..3].copy_from_slice(&self.0.to_le_bytes()[..3]);
	}
	#[inline]
	fn to_i32(self) -> i32 {
		self.0 << 8
	}
	#[inline]
	fn from_i32(v: i32) -> Self {
		Self(v >> 8)
	}
	#[inline]
	fn to_f32(self) -> f32 {
		self.0 as f32 / 8_388_608.0
	}
	#[inline]
	fn from_f32(v: f32) -> Self {
		Self(quantize(v, 8_388_608.0, Self::MIN as f32, Self::MAX as f32) as i32)
	}
}

//---------------------------------------------------------------------------------------------------- S32
impl Sample for i32 {
	const FORMAT: SampleFormat = SampleFormat::S32;
	const BYTES: usize = 4;

	#[inline]
	fn read(bytes: &[u8]) -> Self {
		Self::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
	}
	#[inline]
	fn write(self, bytes: &mut [u8]) {
		bytes[..4].copy_from_slice(&self.to_le_bytes());
	}
	#[inline]
	fn to_i32(self) -> i32 {
		self
	}
	#[inline]
	fn from_i32(v: i32) -> Self {
		v
	}
	#[inline]
	fn to_f32(self) -> f32 {
		(f64::from(self) / 2_147_483_648.0) as f32
	}
	#[inline]
	fn from_f32(v: f32) -> Self {
		if v.is_nan() {
			return 0;
		}
		// `f32` cannot represent `i32::MAX`, go through `f64`.
		(f64::from(v) * 2_147_483_648.0)
			.round()
			.clamp(f64::from(Self::MIN), f64::from(Self::MAX)) as Self
	}
}

//---------------------------------------------------------------------------------------------------- F32
impl Sample for f32 {
	const FORMAT: SampleFormat = SampleFormat::F32;
	const BYTES: usize = 4;

	#[inline]
	fn read(bytes: &[u8]) -> Self {
		Self::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
	}
	#[inline]
	fn write(self, bytes: &mut [u8]) {
		bytes[..4].copy_from_slice(&self.to_le_bytes());
	}
	#[inline]
	fn to_i32(self) -> i32 {
		i32::from_f32(self)
	}
	#[inline]
	fn from_i32(v: i32) -> Self {
		v.to_f32()
	}
	#[inline]
	fn to_f32(self) -> f32 {
		self
	}
	#[inline]
	fn from_f32(v: f32) -> Self {
		v
	}
}
