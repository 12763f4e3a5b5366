//! The configuration a [`Device`] is initialized from.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	backend::BackendKind,
	config::{
		DEFAULT_PERIOD_MILLIS,
		DEFAULT_PERIODS,
		DEFAULT_THREAD_NAME,
		MAX_CHANNELS,
		MAX_PERIOD_FRAMES,
		MAX_PERIODS,
		MAX_SAMPLE_RATE,
		MIN_SAMPLE_RATE,
	},
	device::{DeviceInfo,DeviceType},
	error::ConfigError,
	format::Format,
};
use std::{
	borrow::Cow,
	num::NonZeroU32,
};

#[allow(unused_imports)] // docs
use crate::device::Device;

//---------------------------------------------------------------------------------------------------- DeviceConfig
/// Initialization config for a [`Device`].
///
/// This is the configuration to be used with [`Device::init`].
///
/// It is passed once and is immutable for the rest of the `Device`'s lifetime.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct DeviceConfig {
	//------------------------------------------ Stream
	/// Playback or capture.
	pub device_type: DeviceType,

	/// The format the application callback speaks.
	///
	/// The backend may negotiate a different internal format,
	/// in which case conversion happens on the worker thread.
	pub format: Format,

	/// The exact period length in frames.
	///
	/// If `None`, [`DeviceConfig::period_millis`] is used instead.
	///
	/// This is a request, backends may round it.
	pub period_frames: Option<NonZeroU32>,

	/// The period length in milliseconds, used
	/// if [`DeviceConfig::period_frames`] is `None`.
	pub period_millis: u32,

	/// How many periods the backend buffers.
	///
	/// More periods means more latency but fewer underruns/overruns.
	pub periods: u32,

	//------------------------------------------ Backend
	/// The specific device to open.
	///
	/// If `None`, the first available backend's default device is used.
	///
	/// If `Some`, only the device's own backend is tried.
	pub device: Option<DeviceInfo>,

	/// Override the backend priority order.
	///
	/// If `None`, [`BackendKind::PRIORITY`] is used.
	pub backends: Option<Vec<BackendKind>>,

	//------------------------------------------ Worker
	/// Attempt to promote the worker thread to real-time priority.
	///
	/// Failure to do so is logged and otherwise ignored.
	pub realtime_priority: bool,

	/// The name of the worker thread.
	pub thread_name: Cow<'static, str>,
}

//---------------------------------------------------------------------------------------------------- DeviceConfig Impl
impl DeviceConfig {
	/// A reasonable default [`DeviceConfig`].
	///
	/// ```rust
	/// # use audiodev::{config::*,device::*,format::*};
	/// assert_eq!(DeviceConfig::DEFAULT, DeviceConfig {
	///     device_type:       DeviceType::Playback,
	///     format:            Format::DEFAULT,
	///     period_frames:     None,
	///     period_millis:     10,
	///     periods:           3,
	///     device:            None,
	///     backends:          None,
	///     realtime_priority: true,
	///     thread_name:       "audiodev::worker".into(),
	/// });
	/// ```
	pub const DEFAULT: Self = Self {
		device_type:       DeviceType::Playback,
		format:            Format::DEFAULT,
		period_frames:     None,
		period_millis:     DEFAULT_PERIOD_MILLIS,
		periods:           DEFAULT_PERIODS,
		device:            None,
		backends:          None,
		realtime_priority: true,
		thread_name:       Cow::Borrowed(DEFAULT_THREAD_NAME),
	};

	/// [`DeviceConfig::DEFAULT`] for the given [`DeviceType`].
	#[must_use]
	pub const fn new(device_type: DeviceType) -> Self {
		let mut this = Self::DEFAULT;
		this.device_type = device_type;
		this
	}

	/// The requested period length in frames.
	///
	/// ```rust
	/// # use audiodev::{config::*,device::*};
	/// # use std::num::NonZeroU32;
	/// let mut c = DeviceConfig::DEFAULT;
	/// assert_eq!(c.period_frames(), 480);
	///
	/// c.period_frames = NonZeroU32::new(256);
	/// assert_eq!(c.period_frames(), 256);
	/// ```
	#[must_use]
	pub fn period_frames(&self) -> u32 {
		self.period_frames.map_or_else(
			|| self.format.frames_in_millis(self.period_millis),
			NonZeroU32::get,
		)
	}

	/// The backends to try, in order.
	///
	/// A specific [`DeviceConfig::device`] restricts this to its own backend.
	#[must_use]
	pub fn backend_order(&self) -> Vec<BackendKind> {
		if let Some(device) = &self.device {
			return vec![device.backend];
		}

		let list = self.backends.as_deref().unwrap_or(BackendKind::PRIORITY);
		let mut order = Vec::with_capacity(list.len());
		for kind in list {
			if !order.contains(kind) {
				order.push(*kind);
			}
		}
		order
	}

	#[cold]
	#[inline(never)]
	/// Check this config for errors.
	///
	/// This touches no native resource.
	///
	/// # Errors
	/// See [`ConfigError`].
	///
	/// ```rust
	/// # use audiodev::{config::*,error::*};
	/// let mut c = DeviceConfig::DEFAULT;
	/// assert_eq!(c.validate(), Ok(()));
	///
	/// c.format.channels = 0;
	/// assert_eq!(c.validate(), Err(ConfigError::Channels(0)));
	/// ```
	pub fn validate(&self) -> Result<(), ConfigError> {
		let channels = self.format.channels;
		if channels == 0 || channels > MAX_CHANNELS {
			return Err(ConfigError::Channels(channels));
		}

		let rate = self.format.sample_rate;
		if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
			return Err(ConfigError::SampleRate(rate));
		}

		if !(1..=MAX_PERIODS).contains(&self.periods) {
			return Err(ConfigError::Periods(self.periods));
		}

		match self.period_frames() {
			0 => return Err(ConfigError::PeriodLength),
			f if f > MAX_PERIOD_FRAMES => return Err(ConfigError::PeriodTooLong(f)),
			_ => (),
		}

		if let Some(backends) = &self.backends {
			if backends.is_empty() {
				return Err(ConfigError::NoBackends);
			}

			if let Some(device) = &self.device {
				if !backends.contains(&device.backend) {
					return Err(ConfigError::DeviceBackendExcluded {
						id: device.id.to_string(),
						backend: device.backend.into(),
					});
				}
			}
		}

		Ok(())
	}
}

impl Default for DeviceConfig {
	fn default() -> Self {
		Self::DEFAULT
	}
}
