//! Audio devices.
//!
//! [`enumerate`] lists what can be opened, [`Device`]
//! opens one and drives it with a worker thread.

mod info;
pub use info::{CallbackInfo,DeviceId,DeviceInfo,DeviceType};

mod state;
pub use state::{DeviceState,DeviceStats};

mod worker;
pub use worker::DataCallback;

mod device;
pub use device::Device;

use crate::backend::{AnyBackend,BackendKind};

#[cold]
#[inline(never)]
/// List every device of `device_type`, across all compiled
/// backends, in backend priority order.
///
/// Backends whose subsystem is missing contribute nothing,
/// this never fails.
///
/// ```rust
/// # use audiodev::{backend::*, device::*};
/// let devices = enumerate(DeviceType::Playback);
/// // The null device always exists.
/// assert!(devices.iter().any(|d| d.backend == BackendKind::Null && d.is_default));
/// ```
#[must_use]
pub fn enumerate(device_type: DeviceType) -> Vec<DeviceInfo> {
	BackendKind::PRIORITY
		.iter()
		.flat_map(|kind| AnyBackend::probe(*kind, device_type))
		.collect()
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn enumerate_is_in_priority_order() {
		let devices = enumerate(DeviceType::Capture);
		let position = |kind| BackendKind::PRIORITY.iter().position(|k| *k == kind);

		assert!(devices.windows(2).all(|w| position(w[0].backend) <= position(w[1].backend)));
		assert!(devices.iter().all(|d| d.device_type == DeviceType::Capture));
		assert_eq!(devices.last().map(|d| d.backend), Some(BackendKind::Null));
	}
}
