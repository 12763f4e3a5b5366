//! [`Device`] lifecycle errors.

//---------------------------------------------------------------------------------------------------- Use
use crate::error::{ExchangeError,StateError,StreamError};

#[allow(unused_imports)] // docs
use crate::device::Device;

//---------------------------------------------------------------------------------------------------- DeviceError
/// Error returned by the [`Device`] lifecycle functions.
#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
	#[error("illegal device state: {0}")]
	/// The operation is illegal in the current state.
	State(#[from] StateError),

	#[error("audio backend stream error: {0}")]
	/// The backend failed to start/stop the native stream.
	Stream(#[from] StreamError),

	#[error("worker thread stopped the device: {0}")]
	/// The worker thread hit a fatal fault and stopped the device.
	///
	/// This is reported exactly once.
	Fault(#[from] ExchangeError),

	#[error("failed to spawn thread `{name}`: {error}")]
	/// The worker thread could not be spawned.
	ThreadSpawn {
		/// Name of the thread that failed to spawn.
		name: String,
		/// Associated IO error.
		error: std::io::Error,
	},
}
