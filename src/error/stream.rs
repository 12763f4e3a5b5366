//! Backend start/stop errors.

//---------------------------------------------------------------------------------------------------- Use
use std::borrow::Cow;

//---------------------------------------------------------------------------------------------------- StreamError
/// A backend failed to start or stop its native stream.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
	#[error("audio stream was closed")]
	/// The native stream (or its owner thread) is gone.
	Closed,

	#[error("audio hardware/server is unavailable")]
	/// The native device disappeared.
	DeviceUnavailable,

	#[error("audio stream I/O error: {0}")]
	/// An OS-level error.
	Io(#[from] std::io::Error),

	#[error("unknown error: {0}")]
	/// An unknown or very specific error occurred.
	///
	/// The `str` will contain more information.
	Unknown(Cow<'static, str>),
}
