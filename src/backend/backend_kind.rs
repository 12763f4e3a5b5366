//! Backend identifiers and priority.

//---------------------------------------------------------------------------------------------------- Use
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- BackendKind
/// The available audio backends.
///
/// Every variant exists on every platform, a backend that
/// was not compiled in simply reports itself as unavailable.
///
/// ```rust
/// # use audiodev::backend::*;
/// assert_eq!(BackendKind::Oss.to_string(), "Oss");
/// assert_eq!(*BackendKind::PRIORITY.last().unwrap(), BackendKind::Null);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy,Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
pub enum BackendKind {
	/// A cross-platform push-model backend through `cpal`
	/// (ALSA, CoreAudio, WASAPI, ...).
	///
	/// Requires the `cpal` feature.
	Cpal,
	/// The Open Sound System, `/dev/dsp*`.
	///
	/// Requires a unix host.
	Oss,
	/// A silent backend with no native device.
	///
	/// Playback data is discarded, capture yields silence,
	/// both paced by a monotonic clock. Always available.
	Null,
}

impl BackendKind {
	/// The default backend priority order on this build.
	#[cfg(all(feature = "cpal", unix))]
	pub const PRIORITY: &'static [Self] = &[Self::Cpal, Self::Oss, Self::Null];
	/// The default backend priority order on this build.
	#[cfg(all(feature = "cpal", not(unix)))]
	pub const PRIORITY: &'static [Self] = &[Self::Cpal, Self::Null];
	/// The default backend priority order on this build.
	#[cfg(all(not(feature = "cpal"), unix))]
	pub const PRIORITY: &'static [Self] = &[Self::Oss, Self::Null];
	/// The default backend priority order on this build.
	#[cfg(all(not(feature = "cpal"), not(unix)))]
	pub const PRIORITY: &'static [Self] = &[Self::Null];

	/// Was this backend compiled in?
	///
	/// ```rust
	/// # use audiodev::backend::*;
	/// assert!(BackendKind::Null.is_compiled());
	/// ```
	#[must_use]
	pub const fn is_compiled(self) -> bool {
		match self {
			Self::Cpal => cfg!(feature = "cpal"),
			Self::Oss => cfg!(unix),
			Self::Null => true,
		}
	}
}
