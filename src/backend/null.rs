//! Null backend.
//!
//! This backend has no native device. A fake "native" thread
//! is spawned that behaves like a push-model subsystem: every
//! period it asks the [`Handoff`] for playback data (and throws
//! it away) or hands it a period of silence (capture).
//!
//! Functionally, it should behave the exact same as
//! other backends, it just doesn't make any noise.
//!
//! This is the backend of last resort, and the one tests use.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	backend::{Backend,BackendKind,Handoff,NativeEnd},
	config::DeviceConfig,
	device::{DeviceInfo,DeviceType},
	error::{ExchangeError,OpenError,StreamError},
	format::Format,
	macros::{debug2,error2,trace2},
};
use crossbeam::channel::{self,Receiver,RecvTimeoutError,Sender};
use std::{
	borrow::Cow,
	thread::JoinHandle,
	time::{Duration,Instant},
	sync::atomic::{AtomicBool,AtomicU64,Ordering},
};

//---------------------------------------------------------------------------------------------------- Constants
/// The ID of the only null device.
const NULL_DEVICE_ID: &str = "null";

/// The name of the fake native thread.
const NULL_THREAD_NAME: &str = "audiodev::null";

//---------------------------------------------------------------------------------------------------- Control
/// Messages to the fake native thread.
#[derive(Copy,Clone,Debug,PartialEq,Eq)]
enum Control {
	Start,
	Stop,
	Exit,
}

//---------------------------------------------------------------------------------------------------- Null
/// The silent backend.
pub(crate) struct Null {
	format: Format,
	period_frames: u32,
	handoff: Handoff,

	/// Commands to the fake native thread.
	control: Sender<Control>,
	thread: JoinHandle<()>,

	started: AtomicBool,
	starts: AtomicU64,
	stops: AtomicU64,
}

impl Null {
	/// How many times was `start()`/`stop()` called?
	#[cfg(test)]
	pub(crate) fn calls(&self) -> (u64, u64) {
		(self.starts.load(Ordering::Acquire), self.stops.load(Ordering::Acquire))
	}
}

//---------------------------------------------------------------------------------------------------- `Backend` Impl
impl Backend for Null {
	const KIND: BackendKind = BackendKind::Null;

	#[cold]
	#[inline(never)]
	fn probe(device_type: DeviceType) -> Vec<DeviceInfo> {
		vec![DeviceInfo {
			id: NULL_DEVICE_ID.into(),
			name: "Null Device".into(),
			backend: BackendKind::Null,
			device_type,
			is_default: true,
		}]
	}

	#[cold]
	#[inline(never)]
	fn open(config: &DeviceConfig, device: Option<&DeviceInfo>) -> Result<Self, OpenError> {
		debug2!("Null - open(), config: {config:?}");

		if let Some(device) = device {
			if device.id.as_str() != NULL_DEVICE_ID {
				return Err(OpenError::DeviceUnavailable(Cow::Owned(format!("no null device `{}`", device.id))));
			}
		}

		// Any format is fine, we never touch the data.
		let format = config.format;
		let period_frames = config.period_frames();
		let period = format.duration_of(period_frames);
		let period_bytes = period_frames as usize * format.bytes_per_frame();
		let silence = format.sample_format.silence_byte();

		let (handoff, native) = Handoff::new(config.device_type, format, period_frames, config.periods);
		let (control, control_recv) = channel::unbounded();

		let thread = std::thread::Builder::new()
			.name(NULL_THREAD_NAME.into())
			.spawn(move || native_thread(native, &control_recv, period, period_bytes, silence))
			.map_err(|error| OpenError::ThreadSpawn { name: NULL_THREAD_NAME, error })?;

		debug2!("Null - opened {format}, period: {period_frames} frames ({period:?})");

		Ok(Self {
			format,
			period_frames,
			handoff,
			control,
			thread,
			started: AtomicBool::new(false),
			starts: AtomicU64::new(0),
			stops: AtomicU64::new(0),
		})
	}

	fn format(&self) -> Format {
		self.format
	}

	fn period_frames(&self) -> u32 {
		self.period_frames
	}

	fn start(&self) -> Result<(), StreamError> {
		self.starts.fetch_add(1, Ordering::AcqRel);

		if self.started.swap(true, Ordering::AcqRel) {
			return Ok(());
		}

		debug2!("Null - start()");
		self.handoff.reset();
		self.control.send(Control::Start).map_err(|_| StreamError::Closed)
	}

	fn stop(&self) -> Result<(), StreamError> {
		self.stops.fetch_add(1, Ordering::AcqRel);
		debug2!("Null - stop()");

		self.started.store(false, Ordering::Release);
		self.handoff.wake();
		self.control.send(Control::Stop).map_err(|_| StreamError::Closed)
	}

	fn exchange(&self, buffer: &mut [u8], frames: u32) -> Result<u32, ExchangeError> {
		self.handoff.exchange(buffer, frames)
	}

	#[cold]
	#[inline(never)]
	fn close(self) {
		debug2!("Null - close(), xruns: {}", self.handoff.xruns());
		let _ = self.control.send(Control::Exit);
		if self.thread.join().is_err() {
			error2!("Null - native thread panicked");
		}
	}
}

//---------------------------------------------------------------------------------------------------- Native thread
/// The fake native audio thread.
///
/// Parked on `control` while stopped, ticks once per `period` while started.
fn native_thread(
	mut native: NativeEnd,
	control: &Receiver<Control>,
	period: Duration,
	period_bytes: usize,
	silence: u8,
) {
	let device_type = native.device_type();
	// Capture never writes to this, so it stays silent.
	let mut buffer = vec![silence; period_bytes];

	let mut running = false;
	let mut deadline = Instant::now();

	loop {
		let message = if running {
			control.recv_deadline(deadline)
		} else {
			control.recv().map_err(|_| RecvTimeoutError::Disconnected)
		};

		match message {
			Ok(Control::Start) => {
				running = true;
				deadline = Instant::now();
				continue;
			},
			Ok(Control::Stop) => {
				running = false;
				continue;
			},
			Ok(Control::Exit) | Err(RecvTimeoutError::Disconnected) => return,
			Err(RecvTimeoutError::Timeout) => (),
		}

		match device_type {
			// Take the data and throw it away.
			DeviceType::Playback => native.play(&mut buffer),
			DeviceType::Capture => native.record(&buffer),
		}

		deadline += period;
		let now = Instant::now();
		// Fell more than a period behind, don't try to catch up.
		if deadline + period < now {
			trace2!("Null - native thread fell behind, resetting clock");
			deadline = now;
		}
	}
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;
	use crate::format::SampleFormat;
	use std::sync::Arc;

	fn config(device_type: DeviceType, sample_format: SampleFormat) -> DeviceConfig {
		let mut c = DeviceConfig::new(device_type);
		c.format = Format { sample_format, channels: 2, sample_rate: 48_000 };
		c.period_frames = std::num::NonZeroU32::new(480);
		c.periods = 2;
		c
	}

	#[test]
	fn probe() {
		let devices = Null::probe(DeviceType::Capture);
		assert_eq!(devices.len(), 1);
		assert!(devices[0].is_default);
		assert_eq!(devices[0].backend, BackendKind::Null);
		assert_eq!(devices[0].device_type, DeviceType::Capture);
	}

	#[test]
	fn open_unknown_device() {
		let mut info = Null::probe(DeviceType::Playback).remove(0);
		info.id = "nope".into();
		let c = config(DeviceType::Playback, SampleFormat::S16);
		assert!(matches!(Null::open(&c, Some(&info)), Err(OpenError::DeviceUnavailable(_))));
	}

	#[test]
	fn internal_format_is_requested_format() {
		let c = config(DeviceType::Playback, SampleFormat::S24);
		let null = Null::open(&c, None).unwrap();
		assert_eq!(null.format(), c.format);
		assert_eq!(null.period_frames(), 480);
		null.close();
	}

	#[test]
	fn playback_is_paced() {
		let c = config(DeviceType::Playback, SampleFormat::S16);
		let null = Null::open(&c, None).unwrap();
		null.start().unwrap();

		// 2 slots are free immediately, the other 4 periods take >= 10ms each.
		let mut buf = vec![0; 480 * 4];
		let now = Instant::now();
		for _ in 0..6 {
			match null.exchange(&mut buf, 480) {
				Ok(n) => assert_eq!(n, 480),
				Err(ExchangeError::Xrun { transferred }) => assert_eq!(transferred, 480),
				Err(e) => panic!("{e}"),
			}
		}
		assert!(now.elapsed() >= Duration::from_millis(30));

		null.stop().unwrap();
		null.close();
	}

	#[test]
	fn capture_is_silence() {
		let c = config(DeviceType::Capture, SampleFormat::U8);
		let null = Null::open(&c, None).unwrap();
		null.start().unwrap();

		let mut buf = vec![0; 480 * 2];
		let n = match null.exchange(&mut buf, 480) {
			Ok(n) | Err(ExchangeError::Xrun { transferred: n }) => n,
			Err(e) => panic!("{e}"),
		};
		assert_eq!(n, 480);
		assert!(buf.iter().all(|b| *b == 0x80));

		null.stop().unwrap();
		null.close();
	}

	#[test]
	fn stop_unblocks_exchange() {
		let c = config(DeviceType::Capture, SampleFormat::F32);
		let null = Arc::new(Null::open(&c, None).unwrap());

		// Never started, so capture would block forever.
		let null2 = Arc::clone(&null);
		let t = std::thread::spawn(move || null2.exchange(&mut vec![0; 480 * 8], 480).unwrap());
		std::thread::sleep(Duration::from_millis(20));
		null.stop().unwrap();
		assert_eq!(t.join().unwrap(), 0);

		assert_eq!(null.calls(), (0, 1));
		let Ok(null) = Arc::try_unwrap(null) else { panic!("arc still shared") };
		null.close();
	}

	#[test]
	fn start_is_idempotent() {
		let c = config(DeviceType::Playback, SampleFormat::F32);
		let null = Null::open(&c, None).unwrap();
		null.start().unwrap();
		null.start().unwrap();
		assert_eq!(null.calls(), (2, 0));
		null.stop().unwrap();
		null.close();
	}
}
