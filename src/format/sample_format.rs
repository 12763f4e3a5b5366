//! Sample encodings and stream formats.

//---------------------------------------------------------------------------------------------------- Use
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- SampleFormat
/// The encoding of a single PCM sample.
///
/// All encodings are little-endian.
///
/// ```rust
/// # use audiodev::format::*;
/// assert_eq!(SampleFormat::S24.bytes(), 3);
/// assert_eq!(SampleFormat::F32.to_string(), "f32");
/// assert_eq!("s16".parse::<SampleFormat>().unwrap(), SampleFormat::S16);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy,Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum SampleFormat {
	/// Unsigned 8-bit, `128` is silence.
	U8,
	/// Signed 16-bit.
	S16,
	/// Signed 24-bit, packed into 3 bytes (no padding).
	S24,
	/// Signed 32-bit.
	S32,
	/// 32-bit IEEE float, nominal range `-1.0..=1.0`.
	F32,
}

impl SampleFormat {
	/// ```rust
	/// # use audiodev::format::*;
	/// assert_eq!(SampleFormat::DEFAULT, SampleFormat::F32);
	/// ```
	pub const DEFAULT: Self = Self::F32;

	/// Size of one sample in bytes.
	#[must_use]
	pub const fn bytes(self) -> usize {
		match self {
			Self::U8 => 1,
			Self::S16 => 2,
			Self::S24 => 3,
			Self::S32 | Self::F32 => 4,
		}
	}

	/// Number of significant bits in one sample.
	#[must_use]
	pub const fn bits(self) -> u32 {
		(self.bytes() * 8) as u32
	}

	/// Is this a floating point encoding?
	#[must_use]
	pub const fn is_float(self) -> bool {
		matches!(self, Self::F32)
	}

	/// The byte pattern of a silent sample.
	///
	/// Every byte of a silent sample is this value.
	#[must_use]
	pub const fn silence_byte(self) -> u8 {
		match self {
			Self::U8 => 0x80,
			_ => 0,
		}
	}
}

impl Default for SampleFormat {
	fn default() -> Self {
		Self::DEFAULT
	}
}

//---------------------------------------------------------------------------------------------------- Format
/// A full stream format: encoding, channel count and sample rate.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy,Clone,Debug,PartialEq,Eq,Hash)]
pub struct Format {
	/// The sample encoding.
	pub sample_format: SampleFormat,
	/// Interleaved channels per frame.
	pub channels: u16,
	/// Frames per second.
	pub sample_rate: u32,
}

impl Format {
	/// 48kHz stereo `f32`.
	///
	/// ```rust
	/// # use audiodev::format::*;
	/// assert_eq!(Format::DEFAULT, Format {
	///     sample_format: SampleFormat::F32,
	///     channels:      2,
	///     sample_rate:   48_000,
	/// });
	/// ```
	pub const DEFAULT: Self = Self {
		sample_format: SampleFormat::DEFAULT,
		channels: 2,
		sample_rate: 48_000,
	};

	/// Size of one frame (one sample for every channel) in bytes.
	#[must_use]
	pub const fn bytes_per_frame(&self) -> usize {
		self.sample_format.bytes() * self.channels as usize
	}

	/// How many frames make up `millis` milliseconds at this sample rate?
	///
	/// Rounds to the nearest frame, saturates at [`u32::MAX`].
	///
	/// ```rust
	/// # use audiodev::format::*;
	/// assert_eq!(Format::DEFAULT.frames_in_millis(10), 480);
	/// assert_eq!(Format::DEFAULT.frames_in_millis(u32::MAX), u32::MAX);
	/// ```
	#[must_use]
	pub const fn frames_in_millis(&self, millis: u32) -> u32 {
		let frames = (self.sample_rate as u64 * millis as u64 + 500) / 1000;
		if frames > u32::MAX as u64 {
			u32::MAX
		} else {
			frames as u32
		}
	}

	/// The wall-clock duration of `frames` frames.
	#[must_use]
	pub fn duration_of(&self, frames: u32) -> std::time::Duration {
		if self.sample_rate == 0 {
			return std::time::Duration::ZERO;
		}
		std::time::Duration::from_nanos(frames as u64 * 1_000_000_000 / self.sample_rate as u64)
	}
}

impl Default for Format {
	fn default() -> Self {
		Self::DEFAULT
	}
}

impl std::fmt::Display for Format {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} {}ch {}Hz", self.sample_format, self.channels, self.sample_rate)
	}
}
