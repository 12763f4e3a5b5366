//! Invalid [`DeviceConfig`] errors.

//---------------------------------------------------------------------------------------------------- Use
#[allow(unused_imports)] // docs
use crate::config::{DeviceConfig,MAX_CHANNELS,MIN_SAMPLE_RATE,MAX_SAMPLE_RATE,MAX_PERIOD_FRAMES,MAX_PERIODS};

//---------------------------------------------------------------------------------------------------- ConfigError
/// The requested [`DeviceConfig`] is invalid.
///
/// These are always detected before any
/// native resource is touched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
	#[error("invalid channel count - found: `{0}`, expected: `1..={max}`", max = MAX_CHANNELS)]
	/// The channel count was `0` or greater than [`MAX_CHANNELS`].
	Channels(u16),

	#[error("invalid sample rate - found: `{0}`, expected: `{min}..={max}`", min = MIN_SAMPLE_RATE, max = MAX_SAMPLE_RATE)]
	/// The sample rate was outside of [`MIN_SAMPLE_RATE`]..=[`MAX_SAMPLE_RATE`].
	SampleRate(u32),

	#[error("invalid period length - a period must contain at least 1 frame")]
	/// Both `period_frames` and `period_millis` resolved to `0` frames.
	PeriodLength,

	#[error("period too long - found: `{0}` frames, expected at most: `{max}`", max = MAX_PERIOD_FRAMES)]
	/// The period resolved to more than [`MAX_PERIOD_FRAMES`] frames.
	PeriodTooLong(u32),

	#[error("invalid period count - found: `{0}`, expected: `1..={max}`", max = MAX_PERIODS)]
	/// `periods` was `0` or greater than [`MAX_PERIODS`].
	Periods(u32),

	#[error("the backend priority list is empty")]
	/// `backends` was `Some` but contained no entries.
	NoBackends,

	#[error("failed to create the sample-rate converter: {0}")]
	/// The sample-rate converter rejected the rate pair.
	Resampler(String),

	#[error("device `{id}` belongs to backend `{backend}`, which is not in the backend priority list")]
	/// A specific device was requested but its backend was excluded.
	DeviceBackendExcluded {
		/// The requested device's ID.
		id: String,
		/// The requested device's backend.
		backend: &'static str,
	},
}
