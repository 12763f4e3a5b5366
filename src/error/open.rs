//! Backend stream opening errors.

//---------------------------------------------------------------------------------------------------- Use
use std::borrow::Cow;

//---------------------------------------------------------------------------------------------------- OpenError
/// A backend failed to open a native stream.
///
/// [`OpenError::Unavailable`] is not fatal during
/// [`Device::init`](crate::device::Device::init), it
/// causes a fallback to the next backend in priority order.
#[derive(thiserror::Error, Debug)]
pub enum OpenError {
	#[error("audio subsystem is not available on this host")]
	/// The native audio subsystem is not present/usable.
	Unavailable,

	#[error("audio device is busy")]
	/// The native device exists but is held by someone else.
	DeviceBusy,

	#[error("audio device is unavailable: {0}")]
	/// The requested native device does not exist or cannot be opened.
	DeviceUnavailable(Cow<'static, str>),

	#[error("audio configuration is unsupported: {0}")]
	/// The native subsystem rejected the configuration outright
	/// (it could not even negotiate a substitute format).
	InvalidConfig(Cow<'static, str>),

	#[error("failed to spawn thread `{name}`: {error}")]
	/// A backend helper thread could not be spawned.
	ThreadSpawn {
		/// Name of the thread that failed to spawn.
		name: &'static str,
		/// Associated IO error.
		error: std::io::Error,
	},

	#[error("audio backend error: {0}")]
	/// Any other native error.
	///
	/// The `str` will contain more information.
	Unknown(Cow<'static, str>),
}

impl OpenError {
	/// Returns `true` if this error means the whole
	/// subsystem is missing (rather than one device failing).
	#[must_use]
	pub const fn is_unavailable(&self) -> bool {
		matches!(self, Self::Unavailable)
	}
}

//---------------------------------------------------------------------------------------------------- Error re-map
impl From<std::io::Error> for OpenError {
	fn from(error: std::io::Error) -> Self {
		use std::io::ErrorKind as K;
		match error.kind() {
			K::NotFound => Self::Unavailable,
			K::PermissionDenied => Self::DeviceUnavailable(Cow::Owned(error.to_string())),
			K::WouldBlock => Self::DeviceBusy,
			K::InvalidInput => Self::InvalidConfig(Cow::Owned(error.to_string())),
			_ => match error.raw_os_error() {
				#[cfg(unix)]
				Some(libc::EBUSY) => Self::DeviceBusy,
				#[cfg(unix)]
				Some(libc::ENODEV | libc::ENXIO) => Self::Unavailable,
				_ => Self::Unknown(Cow::Owned(error.to_string())),
			},
		}
	}
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Error,ErrorKind};

	#[test]
	fn io_not_found_is_unavailable() {
		assert!(OpenError::from(Error::from(ErrorKind::NotFound)).is_unavailable());
	}

	#[test]
	#[cfg(unix)]
	fn io_busy_is_device_busy() {
		let e = OpenError::from(Error::from_raw_os_error(libc::EBUSY));
		assert!(matches!(e, OpenError::DeviceBusy));
	}
}
