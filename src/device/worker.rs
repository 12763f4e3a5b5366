//! The per-device worker thread.
//!
//! One iteration moves exactly one period:
//!
//! ```text
//! playback: callback -> convert -> exchange
//! capture:  exchange -> convert -> callback
//! ```
//!
//! The worker only blocks inside `exchange()` (native pacing)
//! and inside the application callback.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	backend::AnyBackend,
	device::{CallbackInfo,DeviceState,DeviceType},
	device::state::{AtomicState,Counters},
	error::{ConfigError,ExchangeError},
	format::{ChannelMap,Converter,Fixed,Format},
	macros::{debug2,error2,lock,trace2,warn2},
};
use std::{
	panic::{AssertUnwindSafe,catch_unwind},
	sync::{
		Arc,
		Mutex,
		atomic::Ordering,
	},
	thread::{JoinHandle,ThreadId},
};

//---------------------------------------------------------------------------------------------------- DataCallback
/// The application data callback.
///
/// Invoked on the worker thread once per period with the buffer in the
/// requested [`Format`] (see [`CallbackInfo`]). Returns how many frames it
/// actually wrote (playback) or consumed (capture).
///
/// The callback must not block indefinitely, and must not call
/// [`Device::start`](crate::device::Device::start),
/// [`Device::stop`](crate::device::Device::stop) or
/// [`Device::uninit`](crate::device::Device::uninit)
/// on its own device.
pub type DataCallback = Box<dyn FnMut(CallbackInfo, &mut [u8]) -> u32 + Send + 'static>;

//---------------------------------------------------------------------------------------------------- Inner
/// State shared between a `Device` and its worker thread.
#[derive(Debug)]
pub(crate) struct Inner {
	pub(crate) state: AtomicState,
	pub(crate) counters: Counters,
	/// The first fatal fault the worker hit, taken by the controlling thread.
	pub(crate) fault: Mutex<Option<ExchangeError>>,
	/// The worker thread's ID while it runs.
	pub(crate) worker_id: Mutex<Option<ThreadId>>,
	/// Parked between runs, taken by the worker while it runs.
	pub(crate) parts: Mutex<Option<Worker>>,
}

impl Inner {
	pub(crate) fn new(worker: Worker) -> Self {
		Self {
			state: AtomicState::new(DeviceState::Stopped),
			counters: Counters::default(),
			fault: Mutex::new(None),
			worker_id: Mutex::new(None),
			parts: Mutex::new(Some(worker)),
		}
	}

	/// Is the calling thread this device's worker thread?
	pub(crate) fn is_worker_thread(&self) -> bool {
		*lock!(self.worker_id) == Some(std::thread::current().id())
	}

	/// Record a fault, only the first one is kept.
	fn set_fault(&self, error: ExchangeError) {
		let mut fault = lock!(self.fault);
		if fault.is_none() {
			*fault = Some(error);
		} else {
			trace2!("Worker - dropping extra fault: {error}");
		}
	}
}

//---------------------------------------------------------------------------------------------------- Worker
/// Everything the worker thread owns while running.
pub(crate) struct Worker {
	device_type: DeviceType,
	/// The application-facing format.
	app: Format,
	/// The negotiated backend format.
	internal: Format,
	period_frames: u32,
	realtime_priority: bool,

	callback: DataCallback,
	converter: Converter,

	/// Application-format buffer handed to the callback.
	app_buffer: Vec<u8>,
	/// Internal-format buffer handed to `exchange()`, one period.
	staging: Vec<u8>,
}

impl Worker {
	#[cold]
	#[inline(never)]
	/// Allocate the converter and both buffers.
	pub(crate) fn new(
		device_type: DeviceType,
		app: Format,
		internal: Format,
		period_frames: u32,
		realtime_priority: bool,
		map: Box<dyn ChannelMap>,
		callback: DataCallback,
	) -> Result<Self, ConfigError> {
		if period_frames == 0 {
			return Err(ConfigError::PeriodLength);
		}

		let period = period_frames as usize;
		let converter = match device_type {
			DeviceType::Playback => Converter::new(app, internal, Fixed::Output(period), map)?,
			DeviceType::Capture  => Converter::new(internal, app, Fixed::Input(period), map)?,
		};

		let app_frames = match device_type {
			DeviceType::Playback => converter.input_frames_max(),
			DeviceType::Capture  => converter.output_frames_max(),
		};

		let app_buffer = vec![app.sample_format.silence_byte(); app_frames * app.bytes_per_frame()];
		let staging = vec![internal.sample_format.silence_byte(); period * internal.bytes_per_frame()];

		debug2!(
			"Worker - {device_type}, app: {app}, internal: {internal}, period: {period_frames}, app buffer: {app_frames} frames, resampling: {}",
			converter.is_resampling(),
		);

		Ok(Self {
			device_type,
			app,
			internal,
			period_frames,
			realtime_priority,
			callback,
			converter,
			app_buffer,
			staging,
		})
	}

	/// Call the application, a panic becomes a fault.
	fn call(&mut self, frames: usize, counters: &Counters) -> Result<u32, ExchangeError> {
		let bytes = frames * self.app.bytes_per_frame();
		let info = CallbackInfo {
			device_type: self.device_type,
			format: self.app,
			frame_count: frames as u32,
		};

		counters.callbacks.fetch_add(1, Ordering::Relaxed);

		let callback = &mut self.callback;
		let buffer = &mut self.app_buffer[..bytes];
		catch_unwind(AssertUnwindSafe(|| callback(info, buffer)))
			.map_err(|_| ExchangeError::CallbackPanicked)
	}

	/// One playback period.
	fn playback(&mut self, backend: &AnyBackend, counters: &Counters) -> Result<(), ExchangeError> {
		let frames = self.converter.input_frames_next();
		let bytes = frames * self.app.bytes_per_frame();

		// Whatever the callback doesn't write stays silent.
		self.app_buffer[..bytes].fill(self.app.sample_format.silence_byte());
		let written = self.call(frames, counters)?;
		if (written as usize) < frames {
			trace2!("Worker - callback wrote {written}/{frames} frames");
		}

		let (_, produced) = self.converter.process(&self.app_buffer[..bytes], &mut self.staging)?;
		let produced = (produced as u32).min(self.period_frames);

		let transferred = exchange(backend, &mut self.staging, produced, counters)?;
		if transferred > 0 {
			counters.exchanged(transferred);
		}
		Ok(())
	}

	/// One capture period.
	fn capture(&mut self, backend: &AnyBackend, counters: &Counters) -> Result<(), ExchangeError> {
		let transferred = exchange(backend, &mut self.staging, self.period_frames, counters)?;
		if transferred == 0 {
			// Woken by `stop()`.
			return Ok(());
		}
		counters.exchanged(transferred);

		let bytes = transferred as usize * self.internal.bytes_per_frame();
		let (_, produced) = self.converter.process(&self.staging[..bytes], &mut self.app_buffer)?;
		if produced == 0 {
			return Ok(());
		}

		self.call(produced, counters)?;
		Ok(())
	}
}

impl std::fmt::Debug for Worker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Worker")
			.field("device_type", &self.device_type)
			.field("app", &self.app)
			.field("internal", &self.internal)
			.field("period_frames", &self.period_frames)
			.field("converter", &self.converter)
			.finish_non_exhaustive()
	}
}

/// `exchange()`, with xruns logged and counted instead of returned.
fn exchange(
	backend: &AnyBackend,
	buffer: &mut [u8],
	frames: u32,
	counters: &Counters,
) -> Result<u32, ExchangeError> {
	match backend.exchange(buffer, frames) {
		Ok(n) => Ok(n),
		Err(ExchangeError::Xrun { transferred }) => {
			warn2!("Worker - xrun, {transferred}/{frames} frames transferred");
			counters.xruns.fetch_add(1, Ordering::Relaxed);
			Ok(transferred)
		},
		Err(e) => Err(e),
	}
}

//---------------------------------------------------------------------------------------------------- Spawn
#[cold]
#[inline(never)]
/// Spawn the worker thread.
///
/// The caller must have already set the state to [`DeviceState::Started`].
pub(crate) fn spawn(
	name: &str,
	inner: &Arc<Inner>,
	backend: &Arc<AnyBackend>,
) -> std::io::Result<JoinHandle<()>> {
	let inner = Arc::clone(inner);
	let backend = Arc::clone(backend);

	std::thread::Builder::new()
		.name(name.into())
		.spawn(move || run(&inner, &backend))
}

/// The worker thread's body.
fn run(inner: &Inner, backend: &AnyBackend) {
	let Some(mut worker) = lock!(inner.parts).take() else {
		error2!("Worker - no worker parts, exiting");
		inner.set_fault(ExchangeError::Closed);
		let _ = inner.state.compare_exchange(DeviceState::Started, DeviceState::Stopped);
		return;
	};

	*lock!(inner.worker_id) = Some(std::thread::current().id());
	debug2!("Worker - start, {}", worker.device_type);

	let priority = if worker.realtime_priority {
		match audio_thread_priority::promote_current_thread_to_real_time(
			worker.period_frames,
			worker.internal.sample_rate,
		) {
			Ok(handle) => Some(handle),
			Err(e) => {
				warn2!("Worker - failed to promote to real-time priority: {e}");
				None
			},
		}
	} else {
		None
	};

	while inner.state.load() == DeviceState::Started {
		let result = match worker.device_type {
			DeviceType::Playback => worker.playback(backend, &inner.counters),
			DeviceType::Capture  => worker.capture(backend, &inner.counters),
		};

		if let Err(error) = result {
			error2!("Worker - fatal: {error}, stopping device");
			inner.set_fault(error);
			if let Err(e) = backend.stop() {
				warn2!("Worker - backend stop failed: {e}");
			}
			// A concurrent `stop()` owns the `Stopping` -> `Stopped` transition.
			let _ = inner.state.compare_exchange(DeviceState::Started, DeviceState::Stopped);
			break;
		}
	}

	if let Some(handle) = priority {
		if let Err(e) = audio_thread_priority::demote_current_thread_from_real_time(handle) {
			warn2!("Worker - failed to demote thread: {e}");
		}
	}

	debug2!("Worker - exit");
	*lock!(inner.worker_id) = None;
	*lock!(inner.parts) = Some(worker);
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;
	use crate::format::{DefaultChannelMap,SampleFormat};
	use pretty_assertions::assert_eq;

	fn worker(device_type: DeviceType, app: Format, internal: Format) -> Worker {
		Worker::new(
			device_type,
			app,
			internal,
			480,
			false,
			Box::new(DefaultChannelMap),
			Box::new(|_: CallbackInfo, _: &mut [u8]| 0),
		).unwrap()
	}

	#[test]
	fn zero_period_is_rejected() {
		let e = Worker::new(
			DeviceType::Playback,
			Format::DEFAULT,
			Format::DEFAULT,
			0,
			false,
			Box::new(DefaultChannelMap),
			Box::new(|_: CallbackInfo, _: &mut [u8]| 0),
		).unwrap_err();
		assert_eq!(e, ConfigError::PeriodLength);
	}

	#[test]
	fn buffers_are_sized_from_both_formats() {
		let app = Format { sample_format: SampleFormat::S16, channels: 1, sample_rate: 48_000 };
		let internal = Format { sample_format: SampleFormat::F32, channels: 2, sample_rate: 48_000 };

		let w = worker(DeviceType::Playback, app, internal);
		assert_eq!(w.app_buffer.len(), 480 * 2);
		assert_eq!(w.staging.len(), 480 * 8);

		let w = worker(DeviceType::Capture, app, internal);
		assert_eq!(w.app_buffer.len(), 480 * 2);
		assert_eq!(w.staging.len(), 480 * 8);
	}

	#[test]
	fn resampling_app_buffer_fits_the_largest_chunk() {
		let app = Format { sample_format: SampleFormat::F32, channels: 2, sample_rate: 44_100 };
		let internal = Format { sample_format: SampleFormat::F32, channels: 2, sample_rate: 48_000 };

		let w = worker(DeviceType::Playback, app, internal);
		assert!(w.converter.is_resampling());
		assert!(w.app_buffer.len() >= w.converter.input_frames_next() * app.bytes_per_frame());
		assert_eq!(w.staging.len(), 480 * internal.bytes_per_frame());
	}

	#[test]
	fn callback_panic_is_a_fault() {
		let mut w = Worker::new(
			DeviceType::Playback,
			Format::DEFAULT,
			Format::DEFAULT,
			480,
			false,
			Box::new(DefaultChannelMap),
			Box::new(|_: CallbackInfo, _: &mut [u8]| -> u32 { panic!("callback panic") }),
		).unwrap();

		let counters = Counters::default();
		assert!(matches!(w.call(480, &counters), Err(ExchangeError::CallbackPanicked)));
		assert_eq!(counters.snapshot().callbacks, 1);
	}

	#[test]
	fn playback_zeros_reach_the_backend_unaltered() {
		let format = Format { sample_format: SampleFormat::S16, channels: 2, sample_rate: 48_000 };
		let mut config = crate::config::DeviceConfig::new(DeviceType::Playback);
		config.format = format;
		config.period_frames = std::num::NonZeroU32::new(480);

		let backend = AnyBackend::open(crate::backend::BackendKind::Null, &config, None).unwrap();
		let mut w = Worker::new(
			DeviceType::Playback,
			format,
			backend.format(),
			backend.period_frames(),
			false,
			Box::new(DefaultChannelMap),
			Box::new(|info: CallbackInfo, buffer: &mut [u8]| {
				buffer.fill(0);
				info.frame_count
			}),
		).unwrap();

		// Dirty the staging buffer, the period must overwrite all of it.
		w.staging.fill(0xAA);

		let counters = Counters::default();
		backend.start().unwrap();
		w.playback(&backend, &counters).unwrap();
		backend.stop().unwrap();
		backend.close();

		assert!(w.staging.iter().all(|b| *b == 0));
		assert_eq!(counters.snapshot().callbacks, 1);
		assert_eq!(counters.snapshot().frames, 480);
	}

	#[test]
	fn first_fault_wins() {
		let inner = Inner::new(worker(DeviceType::Playback, Format::DEFAULT, Format::DEFAULT));
		inner.set_fault(ExchangeError::DeviceUnavailable);
		inner.set_fault(ExchangeError::Closed);
		assert!(matches!(*lock!(inner.fault), Some(ExchangeError::DeviceUnavailable)));
		assert!(!inner.is_worker_thread());
	}
}
