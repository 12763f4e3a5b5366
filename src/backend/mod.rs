//! Native audio subsystem backends.
//!
//! Every backend implements the same internal capability contract:
//! probe devices, open a stream, start/stop it, and exchange one
//! period of audio at a time. Backends whose native subsystem pushes
//! data from its own thread (`Null`, `Cpal`) bridge into that contract
//! through a bounded handoff; backends with a blocking native API
//! (`Oss`) implement it directly.
//!
//! [`Device::init`](crate::device::Device::init) picks the first backend in
//! [`BackendKind::PRIORITY`] (or the config's override) that opens successfully.

mod backend_kind;
pub use backend_kind::BackendKind;

mod backend;
pub(crate) use backend::Backend;

mod any;
pub(crate) use any::AnyBackend;

mod handoff;
pub(crate) use handoff::{Handoff,NativeEnd};

mod null;
pub(crate) use null::Null;

// `Oss` needs a unix host, `Cpal` needs its feature.
cfg_if::cfg_if! {
	if #[cfg(unix)] {
		mod oss;
		pub(crate) use oss::Oss;
	}
}

cfg_if::cfg_if! {
	if #[cfg(feature = "cpal")] {
		mod cpal;
		pub(crate) use self::cpal::Cpal;
	}
}
