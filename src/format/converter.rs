//! Encoding + channel + sample-rate conversion pipeline.
//!
//! [`convert`] handles everything except the sample rate. When the two
//! sides of a [`Converter`] run at different rates, samples are moved
//! into planar `f32`, resampled with `rubato`, then moved back out.
//!
//! All scratch space is allocated in [`Converter::new`], so
//! [`Converter::process`] is real-time safe.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	error::{ConfigError,ExchangeError},
	format::{
		convert,
		ChannelMap,
		DefaultChannelMap,
		Format,
		SampleFormat,
	},
	macros::debug2,
};
use rubato::{
	Resampler as _,
	SincFixedIn,
	SincFixedOut,
	SincInterpolationParameters,
	SincInterpolationType,
	WindowFunction,
};
use std::borrow::Cow;

//---------------------------------------------------------------------------------------------------- Fixed
/// Which side of a [`Converter`] has a fixed frame count per call.
///
/// Without sample-rate conversion both sides always match.
#[derive(Copy,Clone,Debug,PartialEq,Eq,Hash)]
pub enum Fixed {
	/// Every call consumes exactly this many input frames,
	/// the output frame count varies (capture).
	Input(usize),
	/// Every call produces exactly this many output frames,
	/// the input frame count varies (playback).
	Output(usize),
}

impl Fixed {
	const fn frames(self) -> usize {
		match self {
			Self::Input(f) | Self::Output(f) => f,
		}
	}
}

//---------------------------------------------------------------------------------------------------- Rubato
/// The two `rubato` resamplers we use.
enum Rubato {
	In(SincFixedIn<f32>),
	Out(SincFixedOut<f32>),
}

impl Rubato {
	fn input_frames_next(&self) -> usize {
		match self {
			Self::In(r) => r.input_frames_next(),
			Self::Out(r) => r.input_frames_next(),
		}
	}

	fn output_frames_next(&self) -> usize {
		match self {
			Self::In(r) => r.output_frames_next(),
			Self::Out(r) => r.output_frames_next(),
		}
	}

	fn input_frames_max(&self) -> usize {
		match self {
			Self::In(r) => r.input_frames_max(),
			Self::Out(r) => r.input_frames_max(),
		}
	}

	fn output_frames_max(&self) -> usize {
		match self {
			Self::In(r) => r.output_frames_max(),
			Self::Out(r) => r.output_frames_max(),
		}
	}

	fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>]) -> Result<(), rubato::ResampleError> {
		match self {
			Self::In(r) => r.process_into_buffer(input, output, None)?,
			Self::Out(r) => r.process_into_buffer(input, output, None)?,
		};
		Ok(())
	}
}

/// Resampler state plus its planar scratch space.
struct RateConverter {
	rubato: Rubato,
	/// `f32` interleaved bytes, sized for the larger side.
	interleaved: Vec<u8>,
	/// Planar input, one `Vec` per channel.
	planar_in: Vec<Vec<f32>>,
	/// Planar output, one `Vec` per channel.
	planar_out: Vec<Vec<f32>>,
}

//---------------------------------------------------------------------------------------------------- Converter
/// Converts PCM frames from one [`Format`] to another.
///
/// ```rust
/// # use audiodev::format::*;
/// let from = Format { sample_format: SampleFormat::S16, channels: 1, sample_rate: 48_000 };
/// let to   = Format { sample_format: SampleFormat::F32, channels: 2, sample_rate: 48_000 };
/// let mut c = Converter::new(from, to, Fixed::Output(4), Box::new(DefaultChannelMap)).unwrap();
/// assert!(!c.is_resampling());
///
/// let input  = [0_u8; 4 * 2];
/// let mut output = [1_u8; 4 * 8];
/// assert_eq!(c.process(&input, &mut output).unwrap(), (4, 4));
/// assert!(output.iter().all(|b| *b == 0));
/// ```
pub struct Converter {
	from: Format,
	to: Format,
	fixed: Fixed,
	map: Box<dyn ChannelMap>,
	rate: Option<RateConverter>,
}

impl Converter {
	#[cold]
	#[inline(never)]
	/// Create a new [`Converter`].
	///
	/// # Errors
	/// [`ConfigError::Resampler`] if the rate pair or
	/// `fixed` frame count is rejected by the resampler.
	pub fn new(
		from: Format,
		to: Format,
		fixed: Fixed,
		map: Box<dyn ChannelMap>,
	) -> Result<Self, ConfigError> {
		debug2!("Converter - {from} -> {to}, fixed: {fixed:?}");

		let rate = if from.sample_rate == to.sample_rate {
			None
		} else {
			Some(RateConverter::new(from.sample_rate, to.sample_rate, to.channels, fixed)?)
		};

		Ok(Self { from, to, fixed, map, rate })
	}

	/// The input format.
	#[must_use]
	pub const fn from(&self) -> Format {
		self.from
	}

	/// The output format.
	#[must_use]
	pub const fn to(&self) -> Format {
		self.to
	}

	/// Is sample-rate conversion happening?
	#[must_use]
	pub const fn is_resampling(&self) -> bool {
		self.rate.is_some()
	}

	/// How many input frames the next [`Converter::process`] consumes.
	#[must_use]
	pub fn input_frames_next(&self) -> usize {
		self.rate.as_ref().map_or(self.fixed.frames(), |r| r.rubato.input_frames_next())
	}

	/// How many output frames the next [`Converter::process`] produces.
	#[must_use]
	pub fn output_frames_next(&self) -> usize {
		self.rate.as_ref().map_or(self.fixed.frames(), |r| r.rubato.output_frames_next())
	}

	/// The upper bound of [`Converter::input_frames_next`].
	#[must_use]
	pub fn input_frames_max(&self) -> usize {
		self.rate.as_ref().map_or(self.fixed.frames(), |r| r.rubato.input_frames_max())
	}

	/// The upper bound of [`Converter::output_frames_next`].
	#[must_use]
	pub fn output_frames_max(&self) -> usize {
		self.rate.as_ref().map_or(self.fixed.frames(), |r| r.rubato.output_frames_max())
	}

	/// Convert one chunk.
	///
	/// Without resampling, this converts as many frames as fit in both
	/// `input` and `output` (capped at the fixed frame count).
	///
	/// With resampling, exactly [`Converter::input_frames_next`] frames
	/// are consumed (missing input frames are treated as silence) and
	/// [`Converter::output_frames_next`] frames are produced; `output`
	/// must have room for them.
	///
	/// Returns `(frames_consumed, frames_produced)`.
	///
	/// # Errors
	/// The resampler rejected the buffers.
	pub fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize), ExchangeError> {
		let Some(rate) = self.rate.as_mut() else {
			let frames = convert(
				input, self.from.sample_format, self.from.channels,
				output, self.to.sample_format, self.to.channels,
				self.fixed.frames(), self.map.as_ref(),
			);
			return Ok((frames, frames));
		};

		rate.process(self.from, self.to, self.map.as_ref(), input, output)
	}
}

impl std::fmt::Debug for Converter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Converter")
			.field("from", &self.from)
			.field("to", &self.to)
			.field("fixed", &self.fixed)
			.field("resampling", &self.is_resampling())
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- RateConverter
impl RateConverter {
	#[cold]
	#[inline(never)]
	fn new(from_rate: u32, to_rate: u32, channels: u16, fixed: Fixed) -> Result<Self, ConfigError> {
		let ratio = f64::from(to_rate) / f64::from(from_rate);
		let channels = channels as usize;

		debug2!("Converter - creating resampler, {from_rate} -> {to_rate}, ratio: {ratio:.4}");

		let parameters = SincInterpolationParameters {
			sinc_len: 64,
			f_cutoff: 0.95,
			interpolation: SincInterpolationType::Linear,
			oversampling_factor: 128,
			window: WindowFunction::BlackmanHarris2,
		};

		let map_err = |e: rubato::ResamplerConstructionError| ConfigError::Resampler(e.to_string());
		let rubato = match fixed {
			Fixed::Input(chunk) => Rubato::In(
				SincFixedIn::new(ratio, 1.0, parameters, chunk, channels).map_err(map_err)?,
			),
			Fixed::Output(chunk) => Rubato::Out(
				SincFixedOut::new(ratio, 1.0, parameters, chunk, channels).map_err(map_err)?,
			),
		};

		let in_max  = rubato.input_frames_max();
		let out_max = rubato.output_frames_max();
		let f32_bytes = SampleFormat::F32.bytes();

		Ok(Self {
			interleaved: vec![0; in_max.max(out_max) * channels * f32_bytes],
			planar_in: vec![vec![0.0; in_max]; channels],
			planar_out: vec![vec![0.0; out_max]; channels],
			rubato,
		})
	}

	fn process(
		&mut self,
		from: Format,
		to: Format,
		map: &dyn ChannelMap,
		input: &[u8],
		output: &mut [u8],
	) -> Result<(usize, usize), ExchangeError> {
		let channels = to.channels as usize;
		let f32_bytes = SampleFormat::F32.bytes();
		let frames_in = self.rubato.input_frames_next();
		let frames_out = self.rubato.output_frames_next();

		// Input -> `f32` interleaved, already at the output channel count.
		let converted = convert(
			input, from.sample_format, from.channels,
			&mut self.interleaved, SampleFormat::F32, to.channels,
			frames_in, map,
		);

		// Interleaved -> planar, padding with silence.
		for (c, plane) in self.planar_in.iter_mut().enumerate() {
			for (f, sample) in plane[..frames_in].iter_mut().enumerate() {
				*sample = if f < converted {
					let offset = (f * channels + c) * f32_bytes;
					let b = &self.interleaved[offset..offset + f32_bytes];
					f32::from_le_bytes([b[0], b[1], b[2], b[3]])
				} else {
					0.0
				};
			}
		}

		// Planes longer than `frames_in` are fine, the tail is ignored.
		self.rubato
			.process(&self.planar_in, &mut self.planar_out)
			.map_err(|e| ExchangeError::Unknown(Cow::Owned(e.to_string())))?;

		// Planar -> interleaved `f32`.
		for f in 0..frames_out {
			for (c, plane) in self.planar_out.iter().enumerate() {
				let offset = (f * channels + c) * f32_bytes;
				self.interleaved[offset..offset + f32_bytes].copy_from_slice(&plane[f].to_le_bytes());
			}
		}

		// Interleaved `f32` -> output encoding, channel count is already right.
		let produced = convert(
			&self.interleaved, SampleFormat::F32, to.channels,
			output, to.sample_format, to.channels,
			frames_out, &DefaultChannelMap,
		);

		Ok((frames_in, produced))
	}
}
