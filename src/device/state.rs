//! Device lifecycle state and counters.

//---------------------------------------------------------------------------------------------------- Use
use std::sync::atomic::{AtomicU8,AtomicU64,Ordering};
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

#[allow(unused_imports)] // docs
use crate::device::Device;

//---------------------------------------------------------------------------------------------------- DeviceState
/// The lifecycle state of a [`Device`].
///
/// ```text
///            init()            start()
///   (none) ---------> Stopped ---------> Started
///                      ^  |                 |
///                      |  | uninit()        | stop() / fatal fault
///                      |  v                 v
///                      | Uninitialized   Stopping
///                      |                    |
///                      +--------------------+
/// ```
///
/// `Stopping` only exists while [`Device::stop`] waits
/// for the worker thread to notice and exit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy,Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum DeviceState {
	/// Torn down, the device can no longer be used.
	Uninitialized = 0,
	/// Initialized, the worker thread is not running.
	Stopped = 1,
	/// The worker thread is running.
	Started = 2,
	/// A stop was requested, the worker thread is exiting.
	Stopping = 3,
}

impl DeviceState {
	/// Is the worker thread (supposed to be) running?
	///
	/// ```rust
	/// # use audiodev::device::*;
	/// assert!(DeviceState::Started.is_running());
	/// assert!(DeviceState::Stopping.is_running());
	/// assert!(!DeviceState::Stopped.is_running());
	/// ```
	#[must_use]
	pub const fn is_running(self) -> bool {
		matches!(self, Self::Started | Self::Stopping)
	}

	const fn from_u8(u: u8) -> Self {
		match u {
			1 => Self::Stopped,
			2 => Self::Started,
			3 => Self::Stopping,
			_ => Self::Uninitialized,
		}
	}
}

//---------------------------------------------------------------------------------------------------- AtomicState
/// A [`DeviceState`] shared between the controlling
/// thread and the worker thread.
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
	pub(crate) const fn new(state: DeviceState) -> Self {
		Self(AtomicU8::new(state as u8))
	}

	pub(crate) fn load(&self) -> DeviceState {
		DeviceState::from_u8(self.0.load(Ordering::Acquire))
	}

	pub(crate) fn store(&self, state: DeviceState) {
		self.0.store(state as u8, Ordering::Release);
	}

	/// Swap `current` for `new` only if `current` is still the state.
	///
	/// Returns the state that was actually found.
	pub(crate) fn compare_exchange(&self, current: DeviceState, new: DeviceState) -> Result<DeviceState, DeviceState> {
		self.0
			.compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
			.map(DeviceState::from_u8)
			.map_err(DeviceState::from_u8)
	}
}

//---------------------------------------------------------------------------------------------------- DeviceStats
/// A snapshot of a [`Device`]'s counters.
///
/// Counters are cumulative over the device's whole life,
/// they are not reset by [`Device::stop`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct DeviceStats {
	/// Periods exchanged with the backend.
	pub exchanges: u64,
	/// Frames (internal format) exchanged with the backend.
	pub frames: u64,
	/// Underruns/overruns reported by the backend.
	pub xruns: u64,
	/// Times the application callback was invoked.
	pub callbacks: u64,
}

/// The live counters behind [`DeviceStats`].
#[derive(Debug, Default)]
pub(crate) struct Counters {
	pub(crate) exchanges: AtomicU64,
	pub(crate) frames: AtomicU64,
	pub(crate) xruns: AtomicU64,
	pub(crate) callbacks: AtomicU64,
}

impl Counters {
	pub(crate) fn exchanged(&self, frames: u32) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
		self.frames.fetch_add(u64::from(frames), Ordering::Relaxed);
	}

	pub(crate) fn snapshot(&self) -> DeviceStats {
		DeviceStats {
			exchanges: self.exchanges.load(Ordering::Relaxed),
			frames: self.frames.load(Ordering::Relaxed),
			xruns: self.xruns.load(Ordering::Relaxed),
			callbacks: self.callbacks.load(Ordering::Relaxed),
		}
	}
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use strum::IntoEnumIterator;

	#[test]
	fn atomic_state_round_trip() {
		let state = AtomicState::new(DeviceState::Uninitialized);
		for s in DeviceState::iter() {
			state.store(s);
			assert_eq!(state.load(), s);
		}
	}

	#[test]
	fn compare_exchange() {
		let state = AtomicState::new(DeviceState::Started);
		assert_eq!(state.compare_exchange(DeviceState::Started, DeviceState::Stopped), Ok(DeviceState::Started));
		assert_eq!(state.compare_exchange(DeviceState::Started, DeviceState::Stopped), Err(DeviceState::Stopped));
		assert_eq!(state.load(), DeviceState::Stopped);
	}

	#[test]
	fn state_strings() {
		assert_eq!(DeviceState::Stopping.as_ref(), "stopping");
		assert_eq!("started".parse::<DeviceState>().unwrap(), DeviceState::Started);
	}

	#[test]
	fn counters() {
		let c = Counters::default();
		c.exchanged(480);
		c.exchanged(480);
		c.xruns.fetch_add(1, Ordering::Relaxed);
		assert_eq!(c.snapshot(), DeviceStats { exchanges: 2, frames: 960, xruns: 1, callbacks: 0 });
	}
}
