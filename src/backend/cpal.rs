//! `cpal` backend.
//!
//! This is a push-model backend: `cpal` owns the native audio
//! thread and calls us from it, the [`Handoff`] bridges that
//! into `exchange()`.
//!
//! `cpal::Stream` is not `Send` on every platform, so it is created
//! on, and never leaves, a small owner thread. `start()`/`stop()`/`close()`
//! are commands sent to that thread, each one waits for the reply.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	backend::{Backend,BackendKind,Handoff},
	config::DeviceConfig,
	context::Shared,
	device::{DeviceInfo,DeviceType},
	error::{ExchangeError,OpenError,StreamError},
	format::{Format,SampleFormat},
	macros::{debug2,error2,info2,warn2},
};
use cpal::traits::{DeviceTrait,HostTrait,StreamTrait};
use crossbeam::channel::{self,Receiver,Sender};
use std::{
	borrow::Cow,
	sync::{
		Arc,
		atomic::{AtomicBool,Ordering},
	},
	thread::JoinHandle,
};

//---------------------------------------------------------------------------------------------------- Constants
/// The name of the stream owner thread.
const CPAL_THREAD_NAME: &str = "audiodev::cpal";

//---------------------------------------------------------------------------------------------------- HostContext
/// The process-wide `cpal` host selection.
static HOST: Shared<HostContext> = Shared::new("cpal");

/// Which `cpal` host every device in this process uses.
#[derive(Debug)]
struct HostContext {
	id: cpal::HostId,
}

impl HostContext {
	fn acquire() -> Result<Arc<Self>, OpenError> {
		HOST.acquire(|| {
			let id = cpal::default_host().id();
			info2!("Cpal - using host `{}`", id.name());
			Ok(Self { id })
		})
	}

	fn host(&self) -> Result<cpal::Host, OpenError> {
		cpal::host_from_id(self.id).map_err(|_| OpenError::Unavailable)
	}
}

//---------------------------------------------------------------------------------------------------- Command
/// Commands to the stream owner thread.
#[derive(Copy,Clone,Debug,PartialEq,Eq)]
enum Command {
	Play,
	Pause,
	Close,
}

/// Everything the owner thread reports back after building the stream.
struct Opened {
	name: String,
	format: Format,
	period_frames: u32,
	handoff: Handoff,
}

//---------------------------------------------------------------------------------------------------- Cpal
/// A `cpal` stream, owned by a separate thread.
pub(crate) struct Cpal {
	name: String,
	format: Format,
	period_frames: u32,
	handoff: Handoff,

	commands: Sender<(Command, Sender<Result<(), StreamError>>)>,
	thread: JoinHandle<()>,

	started: AtomicBool,

	/// Keeps the host selection alive as long as a device is open.
	_host: Arc<HostContext>,
}

impl Cpal {
	/// Send a command to the owner thread and wait for the reply.
	fn command(&self, command: Command) -> Result<(), StreamError> {
		let (reply, reply_recv) = channel::bounded(1);
		self.commands.send((command, reply)).map_err(|_| StreamError::Closed)?;
		reply_recv.recv().map_err(|_| StreamError::Closed)?
	}
}

//---------------------------------------------------------------------------------------------------- `Backend` Impl
impl Backend for Cpal {
	const KIND: BackendKind = BackendKind::Cpal;

	#[cold]
	#[inline(never)]
	fn probe(device_type: DeviceType) -> Vec<DeviceInfo> {
		let Ok(context) = HostContext::acquire() else {
			return Vec::new();
		};
		let Ok(host) = context.host() else {
			return Vec::new();
		};

		let (default, devices) = match device_type {
			DeviceType::Playback => (host.default_output_device(), host.output_devices().map(Iterator::collect::<Vec<_>>)),
			DeviceType::Capture  => (host.default_input_device(), host.input_devices().map(Iterator::collect::<Vec<_>>)),
		};
		let default = default.and_then(|d| d.name().ok());

		let Ok(devices) = devices else {
			warn2!("Cpal - failed to enumerate {device_type} devices");
			return Vec::new();
		};

		devices
			.into_iter()
			.filter_map(|d| d.name().ok())
			.map(|name| DeviceInfo {
				is_default: default.as_ref() == Some(&name),
				id: name.as_str().into(),
				name,
				backend: BackendKind::Cpal,
				device_type,
			})
			.collect()
	}

	#[cold]
	#[inline(never)]
	fn open(config: &DeviceConfig, device: Option<&DeviceInfo>) -> Result<Self, OpenError> {
		debug2!("Cpal - open(), config: {config:?}");

		// `cpal` hands us native-endian bytes.
		if cfg!(target_endian = "big") {
			return Err(OpenError::InvalidConfig(Cow::Borrowed("big-endian hosts are not supported")));
		}

		let host = HostContext::acquire()?;
		let host_id = host.id;

		let (opened_send, opened_recv) = channel::bounded(1);
		let (commands, commands_recv) = channel::unbounded();
		let config_owned = config.clone();
		let device_owned = device.cloned();

		let thread = std::thread::Builder::new()
			.name(CPAL_THREAD_NAME.into())
			.spawn(move || owner_thread(host_id, &config_owned, device_owned.as_ref(), &opened_send, &commands_recv))
			.map_err(|error| OpenError::ThreadSpawn { name: CPAL_THREAD_NAME, error })?;

		let opened = match opened_recv.recv() {
			Ok(Ok(opened)) => opened,
			Ok(Err(error)) => {
				drop(thread.join());
				return Err(error);
			},
			Err(_) => {
				drop(thread.join());
				return Err(OpenError::Unknown(Cow::Borrowed("cpal stream owner thread exited")));
			},
		};

		debug2!("Cpal - opened `{}`: {}, period: {} frames", opened.name, opened.format, opened.period_frames);

		Ok(Self {
			name: opened.name,
			format: opened.format,
			period_frames: opened.period_frames,
			handoff: opened.handoff,
			commands,
			thread,
			started: AtomicBool::new(false),
			_host: host,
		})
	}

	fn format(&self) -> Format {
		self.format
	}

	fn period_frames(&self) -> u32 {
		self.period_frames
	}

	fn start(&self) -> Result<(), StreamError> {
		if self.started.swap(true, Ordering::AcqRel) {
			return Ok(());
		}

		debug2!("Cpal - start()");
		self.handoff.reset();
		self.command(Command::Play)
	}

	fn stop(&self) -> Result<(), StreamError> {
		debug2!("Cpal - stop()");
		self.started.store(false, Ordering::Release);
		self.handoff.wake();
		self.command(Command::Pause)
	}

	fn exchange(&self, buffer: &mut [u8], frames: u32) -> Result<u32, ExchangeError> {
		self.handoff.exchange(buffer, frames)
	}

	#[cold]
	#[inline(never)]
	fn close(self) {
		debug2!("Cpal - close(`{}`), xruns: {}", self.name, self.handoff.xruns());
		if let Err(e) = self.command(Command::Close) {
			warn2!("Cpal - close(): {e}");
		}
		if self.thread.join().is_err() {
			error2!("Cpal - stream owner thread panicked");
		}
	}
}

//---------------------------------------------------------------------------------------------------- Owner thread
/// Builds the stream and then serves commands until `Close`.
fn owner_thread(
	host_id: cpal::HostId,
	config: &DeviceConfig,
	device: Option<&DeviceInfo>,
	opened: &Sender<Result<Opened, OpenError>>,
	commands: &Receiver<(Command, Sender<Result<(), StreamError>>)>,
) {
	let stream = match build(host_id, config, device) {
		Ok((stream, o)) => {
			drop(opened.send(Ok(o)));
			stream
		},
		Err(e) => {
			drop(opened.send(Err(e)));
			return;
		},
	};

	for (command, reply) in commands {
		let result = match command {
			Command::Play  => stream.play().map_err(StreamError::from),
			Command::Pause => stream.pause().map_err(StreamError::from),
			Command::Close => {
				drop(reply.send(Ok(())));
				break;
			},
		};
		drop(reply.send(result));
	}

	drop(stream);
}

/// Find the device, negotiate a config and build a paused stream.
fn build(
	host_id: cpal::HostId,
	config: &DeviceConfig,
	info: Option<&DeviceInfo>,
) -> Result<(cpal::Stream, Opened), OpenError> {
	let host = cpal::host_from_id(host_id).map_err(|_| OpenError::Unavailable)?;
	let device_type = config.device_type;

	let device = match (info, device_type) {
		(None, DeviceType::Playback) => host.default_output_device().ok_or(OpenError::Unavailable)?,
		(None, DeviceType::Capture)  => host.default_input_device().ok_or(OpenError::Unavailable)?,
		(Some(info), DeviceType::Playback) => find(host.output_devices(), info)?,
		(Some(info), DeviceType::Capture)  => find(host.input_devices(), info)?,
	};
	let name = device.name().unwrap_or_default();

	let (stream_config, cpal_format, format) = negotiate(&device, device_type, config)?;
	if format != config.format {
		info2!("Cpal - requested {}, device `{name}` uses {format}", config.format);
	}

	let period_frames = match stream_config.buffer_size {
		cpal::BufferSize::Fixed(frames) => frames,
		cpal::BufferSize::Default => scale_period(config, format),
	};

	let (handoff, mut native) = Handoff::new(device_type, format, period_frames, config.periods);

	let faults = handoff.fault_sender();
	let error_callback = move |error: cpal::StreamError| match error {
		cpal::StreamError::DeviceNotAvailable => drop(faults.try_send(ExchangeError::DeviceUnavailable)),
		cpal::StreamError::BackendSpecific { err } => warn2!("Cpal - stream error: {err}"),
	};

	let stream = match device_type {
		DeviceType::Playback => device.build_output_stream_raw(
			&stream_config,
			cpal_format,
			move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| native.play(data.bytes_mut()),
			error_callback,
			None,
		)?,
		DeviceType::Capture => device.build_input_stream_raw(
			&stream_config,
			cpal_format,
			move |data: &cpal::Data, _: &cpal::InputCallbackInfo| native.record(data.bytes()),
			error_callback,
			None,
		)?,
	};

	// Some hosts start streams on creation.
	if let Err(e) = stream.pause() {
		debug2!("Cpal - initial pause(): {e}");
	}

	Ok((stream, Opened { name, format, period_frames, handoff }))
}

/// Find the device matching `info` by name.
fn find<I, E>(devices: Result<I, E>, info: &DeviceInfo) -> Result<cpal::Device, OpenError>
where
	I: Iterator<Item = cpal::Device>,
	E: std::fmt::Display,
{
	let devices = devices.map_err(|e| OpenError::Unknown(Cow::Owned(e.to_string())))?;
	for device in devices {
		if device.name().is_ok_and(|n| n == info.id.as_str()) {
			return Ok(device);
		}
	}
	Err(OpenError::DeviceUnavailable(Cow::Owned(format!("no cpal device named `{}`", info.id))))
}

/// Pick the stream config.
///
/// The exact requested config if the device supports it, else
/// the device's default config, else any config we can speak.
fn negotiate(
	device: &cpal::Device,
	device_type: DeviceType,
	config: &DeviceConfig,
) -> Result<(cpal::StreamConfig, cpal::SampleFormat, Format), OpenError> {
	let requested = config.format;
	let rate = cpal::SampleRate(requested.sample_rate);

	let ranges: Vec<cpal::SupportedStreamConfigRange> = match device_type {
		DeviceType::Playback => device.supported_output_configs().map(Iterator::collect),
		DeviceType::Capture  => device.supported_input_configs().map(Iterator::collect),
	}.unwrap_or_default();

	let contains_rate = |r: &cpal::SupportedStreamConfigRange| r.min_sample_rate() <= rate && rate <= r.max_sample_rate();

	let exact = ranges.iter().find(|r| {
		to_cpal(requested.sample_format) == Some(r.sample_format())
			&& r.channels() == requested.channels
			&& contains_rate(r)
	});

	let supported = if let Some(range) = exact {
		range.clone().with_sample_rate(rate)
	} else {
		let default = match device_type {
			DeviceType::Playback => device.default_output_config(),
			DeviceType::Capture  => device.default_input_config(),
		};
		match default {
			Ok(d) if from_cpal(d.sample_format()).is_some() => d,
			other => {
				if let Err(e) = other {
					debug2!("Cpal - no default config: {e}");
				}
				ranges
					.iter()
					.find(|r| from_cpal(r.sample_format()).is_some())
					.map(|r| {
						let rate = rate.clamp(r.min_sample_rate(), r.max_sample_rate());
						r.clone().with_sample_rate(rate)
					})
					.ok_or(OpenError::InvalidConfig(Cow::Borrowed("device supports no usable sample format")))?
			},
		}
	};

	let cpal_format = supported.sample_format();
	let format = Format {
		sample_format: from_cpal(cpal_format)
			.ok_or(OpenError::InvalidConfig(Cow::Borrowed("device supports no usable sample format")))?,
		channels: supported.channels(),
		sample_rate: supported.sample_rate().0,
	};

	// Ask for our period if the device allows it.
	let wanted = scale_period(config, format);
	let buffer_size = match supported.buffer_size() {
		cpal::SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&wanted) => cpal::BufferSize::Fixed(wanted),
		_ => cpal::BufferSize::Default,
	};

	let mut stream_config = supported.config();
	stream_config.buffer_size = buffer_size;

	Ok((stream_config, cpal_format, format))
}

/// The requested period, at the internal sample rate.
fn scale_period(config: &DeviceConfig, internal: Format) -> u32 {
	let frames = u64::from(config.period_frames()) * u64::from(internal.sample_rate)
		/ u64::from(config.format.sample_rate.max(1));
	u32::try_from(frames.max(1)).unwrap_or(u32::MAX)
}

//---------------------------------------------------------------------------------------------------- Formats
const fn to_cpal(format: SampleFormat) -> Option<cpal::SampleFormat> {
	match format {
		SampleFormat::U8  => Some(cpal::SampleFormat::U8),
		SampleFormat::S16 => Some(cpal::SampleFormat::I16),
		SampleFormat::S24 => None,
		SampleFormat::S32 => Some(cpal::SampleFormat::I32),
		SampleFormat::F32 => Some(cpal::SampleFormat::F32),
	}
}

const fn from_cpal(format: cpal::SampleFormat) -> Option<SampleFormat> {
	match format {
		cpal::SampleFormat::U8  => Some(SampleFormat::U8),
		cpal::SampleFormat::I16 => Some(SampleFormat::S16),
		cpal::SampleFormat::I32 => Some(SampleFormat::S32),
		cpal::SampleFormat::F32 => Some(SampleFormat::F32),
		_ => None,
	}
}

//---------------------------------------------------------------------------------------------------- Error re-map
impl From<cpal::BuildStreamError> for OpenError {
	fn from(error: cpal::BuildStreamError) -> Self {
		use cpal::BuildStreamError as E;
		match error {
			E::DeviceNotAvailable => Self::Unavailable,
			E::StreamConfigNotSupported | E::InvalidArgument => Self::InvalidConfig(Cow::Owned(error.to_string())),
			E::StreamIdOverflow => Self::DeviceBusy,
			E::BackendSpecific { err } => Self::Unknown(Cow::Owned(err.description)),
		}
	}
}

impl From<cpal::PlayStreamError> for StreamError {
	fn from(error: cpal::PlayStreamError) -> Self {
		use cpal::PlayStreamError as E;
		match error {
			E::DeviceNotAvailable => Self::DeviceUnavailable,
			E::BackendSpecific { err } => Self::Unknown(Cow::Owned(err.description)),
		}
	}
}

impl From<cpal::PauseStreamError> for StreamError {
	fn from(error: cpal::PauseStreamError) -> Self {
		use cpal::PauseStreamError as E;
		match error {
			E::DeviceNotAvailable => Self::DeviceUnavailable,
			E::BackendSpecific { err } => Self::Unknown(Cow::Owned(err.description)),
		}
	}
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;
	use strum::IntoEnumIterator;

	#[test]
	fn format_mapping() {
		for format in SampleFormat::iter() {
			match to_cpal(format) {
				Some(c) => assert_eq!(from_cpal(c), Some(format)),
				None => assert_eq!(format, SampleFormat::S24),
			}
		}
		assert_eq!(from_cpal(cpal::SampleFormat::F64), None);
	}

	#[test]
	fn period_scales_with_rate() {
		let mut config = DeviceConfig::DEFAULT;
		config.period_frames = std::num::NonZeroU32::new(441);
		config.format.sample_rate = 44_100;
		let internal = Format { sample_rate: 48_000, ..config.format };
		assert_eq!(scale_period(&config, internal), 480);
	}

	#[test]
	fn probe_never_fails() {
		for device in Cpal::probe(DeviceType::Playback) {
			assert_eq!(device.backend, BackendKind::Cpal);
		}
	}
}
