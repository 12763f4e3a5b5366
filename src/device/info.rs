//! Device identity and callback metadata.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	backend::BackendKind,
	format::Format,
};
use strum::{
	AsRefStr,
	Display,
	EnumCount,
	EnumIter,
	EnumString,
	IntoStaticStr,
};

//---------------------------------------------------------------------------------------------------- DeviceType
/// The direction of a stream.
///
/// ```rust
/// # use audiodev::device::*;
/// assert_eq!(DeviceType::Playback.to_string(), "playback");
/// assert_eq!("capture".parse::<DeviceType>().unwrap(), DeviceType::Capture);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[derive(AsRefStr,Display,EnumCount,EnumIter,EnumString,IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceType {
	#[default]
	/// Application -> speakers.
	Playback,
	/// Microphone -> application.
	Capture,
}

impl DeviceType {
	/// Is this [`DeviceType::Playback`]?
	#[must_use]
	pub const fn is_playback(self) -> bool {
		matches!(self, Self::Playback)
	}

	/// Is this [`DeviceType::Capture`]?
	#[must_use]
	pub const fn is_capture(self) -> bool {
		matches!(self, Self::Capture)
	}
}

//---------------------------------------------------------------------------------------------------- DeviceId
/// An opaque, backend-specific device identifier.
///
/// For OSS this is the device node path, for cpal the device name.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct DeviceId(String);

impl DeviceId {
	/// The raw identifier.
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<String> for DeviceId {
	fn from(s: String) -> Self {
		Self(s)
	}
}

impl From<&str> for DeviceId {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

impl AsRef<str> for DeviceId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for DeviceId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

//---------------------------------------------------------------------------------------------------- DeviceInfo
/// A discoverable native device.
///
/// Produced by [`enumerate`](crate::device::enumerate), pass one
/// back in [`DeviceConfig::device`](crate::config::DeviceConfig::device)
/// to open that specific device.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone,Debug,PartialEq,Eq,Hash)]
pub struct DeviceInfo {
	/// Backend-specific identifier.
	pub id: DeviceId,
	/// Human-readable name.
	pub name: String,
	/// The backend that owns this device.
	pub backend: BackendKind,
	/// The direction this device was enumerated for.
	pub device_type: DeviceType,
	/// Is this the backend's default device?
	pub is_default: bool,
}

impl std::fmt::Display for DeviceInfo {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} ({}: {})", self.name, self.backend, self.id)
	}
}

//---------------------------------------------------------------------------------------------------- CallbackInfo
/// Passed to the application callback alongside the sample buffer.
#[derive(Copy,Clone,Debug,PartialEq,Eq,Hash)]
pub struct CallbackInfo {
	/// Playback or capture.
	pub device_type: DeviceType,
	/// The format of the buffer (the requested format).
	pub format: Format,
	/// How many frames the buffer holds.
	///
	/// Playback: the callback should fill up to this many frames
	/// and return how many it wrote, the rest stay silent.
	///
	/// Capture: this many frames are valid.
	pub frame_count: u32,
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn device_type() {
		assert!(DeviceType::default().is_playback());
		assert!(DeviceType::Capture.is_capture());
		assert_eq!(DeviceType::Capture.as_ref(), "capture");
	}

	#[test]
	fn device_info_display() {
		let info = DeviceInfo {
			id: "/dev/dsp1".into(),
			name: "USB Audio".into(),
			backend: BackendKind::Oss,
			device_type: DeviceType::Playback,
			is_default: false,
		};
		assert_eq!(info.to_string(), "USB Audio (Oss: /dev/dsp1)");
	}
}
