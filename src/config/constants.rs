//! Configuration limits and defaults.

//---------------------------------------------------------------------------------------------------- Use
#[allow(unused_imports)] // docs
use crate::config::DeviceConfig;

//---------------------------------------------------------------------------------------------------- Limits
/// The maximum channel count of any [`Format`](crate::format::Format).
pub use crate::format::MAX_CHANNELS;

/// The lowest accepted sample rate.
pub const MIN_SAMPLE_RATE: u32 = 1_000;

/// The highest accepted sample rate.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// The longest accepted period in frames.
pub const MAX_PERIOD_FRAMES: u32 = 1 << 16;

/// The highest accepted [`DeviceConfig::periods`].
pub const MAX_PERIODS: u32 = 32;

//---------------------------------------------------------------------------------------------------- Defaults
/// The default [`DeviceConfig::period_millis`].
pub const DEFAULT_PERIOD_MILLIS: u32 = 10;

/// The default [`DeviceConfig::periods`].
pub const DEFAULT_PERIODS: u32 = 3;

/// The default name of a [`Device`](crate::device::Device)'s worker thread.
pub const DEFAULT_THREAD_NAME: &str = "audiodev::worker";

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rate_bounds() {
		assert!(MIN_SAMPLE_RATE < MAX_SAMPLE_RATE);
		assert!((MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&44_100));
		assert!((MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&192_000));
	}

	#[test]
	fn defaults_are_usable() {
		assert!(DEFAULT_PERIOD_MILLIS > 0);
		assert!((1..=MAX_PERIODS).contains(&DEFAULT_PERIODS));
		// The default period fits at the highest rate.
		assert!(u64::from(MAX_SAMPLE_RATE) * u64::from(DEFAULT_PERIOD_MILLIS) / 1000 <= u64::from(MAX_PERIOD_FRAMES));
		assert!(!DEFAULT_THREAD_NAME.is_empty());
	}
}
