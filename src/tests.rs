//! These are helper functions used for testing throughout the codebase.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	backend::BackendKind,
	config::DeviceConfig,
	device::{CallbackInfo,DeviceType},
	format::{Format,SampleFormat},
};
use crossbeam::channel::{self,Receiver,Sender};

//---------------------------------------------------------------------------------------------------- Test Init Helpers
/// A config that only tries the null backend.
///
/// 48kHz stereo `f32`, `480` frame periods.
pub(crate) fn null_config(device_type: DeviceType) -> DeviceConfig {
	let mut config = DeviceConfig::new(device_type);
	config.format = Format {
		sample_format: SampleFormat::F32,
		channels: 2,
		sample_rate: 48_000,
	};
	config.period_frames = std::num::NonZeroU32::new(480);
	config.backends = Some(vec![BackendKind::Null]);
	// Don't ask the OS for real-time threads in tests.
	config.realtime_priority = false;
	config
}

//---------------------------------------------------------------------------------------------------- Recorder
/// One recorded callback invocation.
#[derive(Clone,Debug,PartialEq,Eq)]
pub(crate) struct Call {
	pub(crate) info: CallbackInfo,
	/// Length of the buffer in bytes.
	pub(crate) len: usize,
	/// Was every byte the format's silence byte?
	pub(crate) silent: bool,
}

/// A data callback that reports every call through a channel.
///
/// Playback buffers are left untouched.
pub(crate) struct Recorder {
	send: Sender<Call>,
}

impl Recorder {
	/// The callback and the receiving end of its calls.
	pub(crate) fn new() -> (impl FnMut(CallbackInfo, &mut [u8]) -> u32 + Send + 'static, Receiver<Call>) {
		let (send, recv) = channel::unbounded();
		let mut this = Self { send };
		(move |info: CallbackInfo, buffer: &mut [u8]| this.call(info, buffer), recv)
	}

	/// A callback that records nothing and writes nothing.
	pub(crate) fn silent() -> impl FnMut(CallbackInfo, &mut [u8]) -> u32 + Send + 'static {
		|_: CallbackInfo, _: &mut [u8]| 0
	}

	fn call(&mut self, info: CallbackInfo, buffer: &mut [u8]) -> u32 {
		let silence = info.format.sample_format.silence_byte();
		drop(self.send.send(Call {
			info,
			len: buffer.len(),
			silent: buffer.iter().all(|b| *b == silence),
		}));
		info.frame_count
	}
}
