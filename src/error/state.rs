//! Illegal lifecycle transition errors.

//---------------------------------------------------------------------------------------------------- StateError
/// The operation is illegal in the device's current
/// [`DeviceState`](crate::device::DeviceState).
///
/// This is always recoverable (it is a caller bug)
/// and never changes the device.
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StateError {
	#[error("device is not started")]
	/// `stop()` was called on a device that is not started.
	NotStarted,

	#[error("device is not stopped")]
	/// `uninit()` was called on a started device.
	NotStopped,

	#[error("device is uninitialized")]
	/// The device was already torn down with `uninit()`.
	Uninitialized,

	#[error("device lifecycle function called from its own data callback")]
	/// `start()`/`stop()`/`uninit()` was called from the
	/// worker thread (i.e. from inside the data callback),
	/// which would otherwise deadlock on the worker join.
	CalledFromCallback,
}
