//! Enum dispatch over every compiled backend.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	backend::{Backend,BackendKind,Null},
	config::DeviceConfig,
	device::{DeviceInfo,DeviceType},
	error::{ExchangeError,OpenError,StreamError},
	format::Format,
};

#[cfg(unix)]
use crate::backend::Oss;
#[cfg(feature = "cpal")]
use crate::backend::Cpal;

//---------------------------------------------------------------------------------------------------- AnyBackend
/// One opened backend, selected at runtime.
pub(crate) enum AnyBackend {
	Null(Null),
	#[cfg(unix)]
	Oss(Oss),
	#[cfg(feature = "cpal")]
	Cpal(Cpal),
}

/// Forward a call to whichever backend is inside.
macro_rules! dispatch {
	($self:ident, $backend:ident => $expr:expr) => {
		match $self {
			Self::Null($backend) => $expr,
			#[cfg(unix)]
			Self::Oss($backend) => $expr,
			#[cfg(feature = "cpal")]
			Self::Cpal($backend) => $expr,
		}
	};
}

impl AnyBackend {
	#[cold]
	#[inline(never)]
	/// Enumerate the devices of backend `kind`.
	pub(crate) fn probe(kind: BackendKind, device_type: DeviceType) -> Vec<DeviceInfo> {
		match kind {
			BackendKind::Null => Null::probe(device_type),
			#[cfg(unix)]
			BackendKind::Oss => Oss::probe(device_type),
			#[cfg(feature = "cpal")]
			BackendKind::Cpal => Cpal::probe(device_type),
			#[allow(unreachable_patterns)]
			_ => Vec::new(),
		}
	}

	#[cold]
	#[inline(never)]
	/// Open backend `kind`.
	///
	/// A backend that wasn't compiled in is [`OpenError::Unavailable`].
	pub(crate) fn open(
		kind: BackendKind,
		config: &DeviceConfig,
		device: Option<&DeviceInfo>,
	) -> Result<Self, OpenError> {
		match kind {
			BackendKind::Null => Null::open(config, device).map(Self::Null),
			#[cfg(unix)]
			BackendKind::Oss => Oss::open(config, device).map(Self::Oss),
			#[cfg(feature = "cpal")]
			BackendKind::Cpal => Cpal::open(config, device).map(Self::Cpal),
			#[allow(unreachable_patterns)]
			_ => Err(OpenError::Unavailable),
		}
	}

	/// Which backend is this?
	pub(crate) const fn kind(&self) -> BackendKind {
		match self {
			Self::Null(_) => Null::KIND,
			#[cfg(unix)]
			Self::Oss(_) => Oss::KIND,
			#[cfg(feature = "cpal")]
			Self::Cpal(_) => Cpal::KIND,
		}
	}

	/// The inner [`Null`], if that's what this is.
	#[cfg(test)]
	pub(crate) const fn as_null(&self) -> Option<&Null> {
		match self {
			Self::Null(null) => Some(null),
			#[allow(unreachable_patterns)]
			_ => None,
		}
	}

	pub(crate) fn format(&self) -> Format {
		dispatch!(self, b => b.format())
	}

	pub(crate) fn period_frames(&self) -> u32 {
		dispatch!(self, b => b.period_frames())
	}

	pub(crate) fn start(&self) -> Result<(), StreamError> {
		dispatch!(self, b => b.start())
	}

	pub(crate) fn stop(&self) -> Result<(), StreamError> {
		dispatch!(self, b => b.stop())
	}

	pub(crate) fn exchange(&self, buffer: &mut [u8], frames: u32) -> Result<u32, ExchangeError> {
		dispatch!(self, b => b.exchange(buffer, frames))
	}

	pub(crate) fn close(self) {
		dispatch!(self, b => b.close());
	}
}

impl std::fmt::Debug for AnyBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AnyBackend")
			.field("kind", &self.kind())
			.field("format", &self.format())
			.field("period_frames", &self.period_frames())
			.finish()
	}
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn uncompiled_backend_is_unavailable() {
		for kind in [BackendKind::Cpal, BackendKind::Oss] {
			if !kind.is_compiled() {
				assert!(AnyBackend::probe(kind, DeviceType::Playback).is_empty());
				assert!(matches!(
					AnyBackend::open(kind, &DeviceConfig::DEFAULT, None),
					Err(OpenError::Unavailable),
				));
			}
		}
	}

	#[test]
	fn null_dispatch() {
		let backend = AnyBackend::open(BackendKind::Null, &DeviceConfig::DEFAULT, None).unwrap();
		assert_eq!(backend.kind(), BackendKind::Null);
		assert_eq!(backend.format(), DeviceConfig::DEFAULT.format);
		assert_eq!(backend.period_frames(), 480);
		assert!(backend.as_null().is_some());
		backend.close();
	}
}
