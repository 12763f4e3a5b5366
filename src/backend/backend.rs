//! The backend capability contract.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	backend::BackendKind,
	config::DeviceConfig,
	device::{DeviceInfo,DeviceType},
	error::{ExchangeError,OpenError,StreamError},
	format::Format,
};

//---------------------------------------------------------------------------------------------------- Backend
// The ideal abstract simplification of a native audio subsystem.
//
// # Invariants
// Implementors are expected to implement these functions
// correctly according to the documentation invariants.
//
// 1. `stop()` may be called from any thread, including while
//    another thread is blocked inside `exchange()`, and it must
//    make that `exchange()` return promptly
// 2. `exchange()` is only ever called by one thread at a time
// 3. `close()` is only called after `stop()` returned and
//    no thread is inside `exchange()`
// 4. `format()` and `period_frames()` never change after `open()`
pub(crate) trait Backend
where
	Self: Sized + Send + Sync,
{
	/// Which backend is this?
	const KIND: BackendKind;

	/// Enumerate devices for this subsystem.
	///
	/// Returns an empty `Vec` if the subsystem is unavailable, never fails.
	fn probe(device_type: DeviceType) -> Vec<DeviceInfo>;

	/// Open a native stream.
	///
	/// `device == None` means the subsystem's default device.
	///
	/// If the subsystem cannot speak the requested format exactly,
	/// it picks the closest format it will use and reports it through
	/// `format()`; the caller inserts conversion.
	fn open(config: &DeviceConfig, device: Option<&DeviceInfo>) -> Result<Self, OpenError>;

	/// The negotiated internal format.
	fn format(&self) -> Format;

	/// The negotiated period length in frames, in the internal format.
	fn period_frames(&self) -> u32;

	/// Activate native data flow.
	///
	/// Calling this on an already started stream is `Ok(())`.
	fn start(&self) -> Result<(), StreamError>;

	/// Deactivate native data flow and unblock any in-flight `exchange()`.
	fn stop(&self) -> Result<(), StreamError>;

	/// Exchange up to `frames` frames with the native subsystem.
	///
	/// Playback: consume frames from `buffer`.
	/// Capture: fill frames into `buffer`.
	///
	/// This blocks according to native pacing. Returns the frames
	/// moved, which is less than `frames` only if `stop()` interrupted
	/// the call. Underruns/overruns are reported as [`ExchangeError::Xrun`].
	fn exchange(&self, buffer: &mut [u8], frames: u32) -> Result<u32, ExchangeError>;

	/// Release all native resources.
	fn close(self);
}
