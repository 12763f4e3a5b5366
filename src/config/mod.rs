//! [`Device`] configuration.

#[allow(unused_imports)] // docs
use crate::device::Device;

mod device_config;
pub use device_config::DeviceConfig;

mod constants;
pub use constants::{
	MAX_CHANNELS,
	MIN_SAMPLE_RATE,
	MAX_SAMPLE_RATE,
	MAX_PERIOD_FRAMES,
	MAX_PERIODS,
	DEFAULT_PERIOD_MILLIS,
	DEFAULT_PERIODS,
	DEFAULT_THREAD_NAME,
};
