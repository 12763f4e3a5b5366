//! [`Device::init`] errors.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	backend::BackendKind,
	error::{ConfigError,OpenError},
};

#[allow(unused_imports)] // docs
use crate::device::Device;

//---------------------------------------------------------------------------------------------------- InitError
/// Error returned by [`Device::init`].
///
/// Backends are tried exhaustively in priority order,
/// only the final failure is surfaced here.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
	#[error("invalid device config: {0}")]
	/// The config was rejected before any backend was touched.
	Config(#[from] ConfigError),

	#[error("no audio backend is available on this host")]
	/// Every backend in the priority list reported
	/// its subsystem as unavailable.
	NoBackendAvailable,

	#[error("backend `{backend}` failed to open the device: {error}")]
	/// The last backend that was present on the
	/// host failed to open the native device.
	Open {
		/// The backend that failed.
		backend: BackendKind,
		/// Why it failed.
		error: OpenError,
	},
}
