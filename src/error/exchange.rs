//! Period exchange errors.

//---------------------------------------------------------------------------------------------------- Use
use std::borrow::Cow;

//---------------------------------------------------------------------------------------------------- ExchangeError
/// Error that occurs while exchanging one period
/// of audio with the native subsystem.
///
/// [`ExchangeError::Xrun`] is recoverable: the worker thread
/// logs it and continues. Every other variant is fatal: the worker
/// stops the device on its own and the error is surfaced on the
/// next [`Device::status`](crate::device::Device::status),
/// [`Device::start`](crate::device::Device::start) or
/// [`Device::stop`](crate::device::Device::stop).
#[derive(thiserror::Error, Debug)]
pub enum ExchangeError {
	#[error("buffer underrun/overrun, {transferred} frame(s) transferred")]
	/// The native buffer ran empty (playback) or
	/// overflowed (capture). Not fatal.
	Xrun {
		/// Frames that were still moved during this exchange.
		transferred: u32,
	},

	#[error("audio hardware/server is unavailable")]
	/// The native device disappeared mid-stream.
	DeviceUnavailable,

	#[error("audio stream was closed")]
	/// The native stream (or its owner thread) is gone.
	Closed,

	#[error("audio stream I/O error: {0}")]
	/// An OS-level error.
	Io(#[from] std::io::Error),

	#[error("the application callback panicked")]
	/// The application data callback panicked on the worker thread.
	CallbackPanicked,

	#[error("unknown error: {0}")]
	/// An unknown or very specific error occurred.
	///
	/// The `str` will contain more information.
	Unknown(Cow<'static, str>),
}

impl ExchangeError {
	/// Can the worker thread continue after this error?
	#[must_use]
	pub const fn is_recoverable(&self) -> bool {
		matches!(self, Self::Xrun { .. })
	}
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_xrun_is_recoverable() {
		assert!(ExchangeError::Xrun { transferred: 0 }.is_recoverable());
		assert!(!ExchangeError::DeviceUnavailable.is_recoverable());
		assert!(!ExchangeError::Closed.is_recoverable());
		assert!(!ExchangeError::CallbackPanicked.is_recoverable());
	}
}
