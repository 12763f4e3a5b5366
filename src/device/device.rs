//! The audio device and its lifecycle.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	backend::{AnyBackend,BackendKind},
	config::DeviceConfig,
	device::{CallbackInfo,DeviceState,DeviceStats},
	device::worker::{self,DataCallback,Inner,Worker},
	error::{DeviceError,ExchangeError,InitError,OpenError,StateError},
	format::{ChannelMap,DefaultChannelMap,Format},
	macros::{debug2,info2,lock,warn2},
};
use std::{
	sync::{Arc,Mutex},
	thread::JoinHandle,
};

//---------------------------------------------------------------------------------------------------- Control
/// What only the controlling side touches.
#[derive(Debug)]
struct Control {
	/// `None` after `uninit()`.
	backend: Option<Arc<AnyBackend>>,
	/// The worker thread, `Some` while started and
	/// after a worker-initiated stop until reaped.
	worker: Option<JoinHandle<()>>,
}

impl Control {
	/// Join a worker that already exited on its own.
	fn reap(&mut self) {
		if let Some(handle) = self.worker.take() {
			if handle.join().is_err() {
				warn2!("Device - worker thread panicked");
			}
		}
	}
}

//---------------------------------------------------------------------------------------------------- Device
/// An open audio device.
///
/// Created with [`Device::init`], which picks the first working
/// backend, negotiates a format and allocates everything the worker
/// thread needs. [`Device::start`] spawns the worker thread, which
/// calls the data callback once per period until [`Device::stop`].
///
/// Every method takes `&self`, a `Device` can be shared
/// (e.g. in an `Arc`) and controlled from any thread, except
/// from inside its own data callback.
///
/// Dropping a `Device` stops and tears it down.
///
/// ```rust
/// # use audiodev::{config::*, backend::*, device::*, format::*};
/// let mut config = DeviceConfig::new(DeviceType::Playback);
/// config.backends = Some(vec![BackendKind::Null]);
///
/// let device = Device::init(config, |info: CallbackInfo, _buffer: &mut [u8]| {
///     // Leave the buffer silent.
///     info.frame_count
/// }).unwrap();
/// assert_eq!(device.state(), DeviceState::Stopped);
///
/// device.start().unwrap();
/// assert_eq!(device.state(), DeviceState::Started);
///
/// device.stop().unwrap();
/// device.uninit().unwrap();
/// assert_eq!(device.state(), DeviceState::Uninitialized);
/// ```
pub struct Device {
	config: DeviceConfig,
	kind: BackendKind,
	internal: Format,
	period_frames: u32,

	control: Mutex<Control>,
	inner: Arc<Inner>,
}

impl Device {
	#[cold]
	#[inline(never)]
	/// Open a device with the [`DefaultChannelMap`].
	///
	/// See [`Device::init_with_channel_map`].
	///
	/// # Errors
	/// See [`InitError`].
	pub fn init<F>(config: DeviceConfig, callback: F) -> Result<Self, InitError>
	where
		F: FnMut(CallbackInfo, &mut [u8]) -> u32 + Send + 'static,
	{
		Self::init_with_channel_map(config, Box::new(DefaultChannelMap), callback)
	}

	#[cold]
	#[inline(never)]
	/// Open a device.
	///
	/// Backends are tried in [`DeviceConfig::backend_order`]. A backend
	/// whose subsystem is missing is skipped, any other failure is
	/// remembered and the next backend is tried. Only the final failure
	/// is returned.
	///
	/// `map` routes channels when the negotiated channel count
	/// differs from [`DeviceConfig::format`].
	///
	/// The device starts out [`DeviceState::Stopped`].
	///
	/// # Errors
	/// - [`InitError::Config`] if `config` is invalid (no backend is touched)
	/// - [`InitError::NoBackendAvailable`] if no backend subsystem is present
	/// - [`InitError::Open`] with the last backend's error otherwise
	pub fn init_with_channel_map<F>(
		config: DeviceConfig,
		map: Box<dyn ChannelMap>,
		callback: F,
	) -> Result<Self, InitError>
	where
		F: FnMut(CallbackInfo, &mut [u8]) -> u32 + Send + 'static,
	{
		config.validate()?;
		debug2!("Device - init(), config: {config:?}");

		let mut last: Option<(BackendKind, OpenError)> = None;
		let mut opened = None;

		for kind in config.backend_order() {
			match AnyBackend::open(kind, &config, config.device.as_ref()) {
				Ok(backend) => {
					opened = Some(backend);
					break;
				},
				Err(error) if error.is_unavailable() => {
					debug2!("Device - backend {kind} unavailable, skipping");
				},
				Err(error) => {
					warn2!("Device - backend {kind} failed: {error}");
					last = Some((kind, error));
				},
			}
		}

		let Some(backend) = opened else {
			return Err(match last {
				Some((backend, error)) => InitError::Open { backend, error },
				None => InitError::NoBackendAvailable,
			});
		};

		let kind = backend.kind();
		let internal = backend.format();
		let period_frames = backend.period_frames();

		let callback: DataCallback = Box::new(callback);
		let worker = match Worker::new(
			config.device_type,
			config.format,
			internal,
			period_frames,
			config.realtime_priority,
			map,
			callback,
		) {
			Ok(worker) => worker,
			Err(error) => {
				backend.close();
				return Err(error.into());
			},
		};

		info2!(
			"Device - init() {} on {kind}, requested: {}, internal: {internal}, period: {period_frames} frames",
			config.device_type,
			config.format,
		);

		Ok(Self {
			config,
			kind,
			internal,
			period_frames,
			control: Mutex::new(Control {
				backend: Some(Arc::new(backend)),
				worker: None,
			}),
			inner: Arc::new(Inner::new(worker)),
		})
	}

	/// Start the device.
	///
	/// Starting an already started device is a no-op returning `Ok`.
	///
	/// # Errors
	/// - [`DeviceError::Fault`] if the worker stopped the device
	///   since the last check, the device stays stopped
	/// - [`StateError::Uninitialized`] after [`Device::uninit`]
	/// - [`StateError::CalledFromCallback`] from inside the data callback
	/// - [`DeviceError::Stream`] if the backend could not start
	/// - [`DeviceError::ThreadSpawn`] if the worker could not be spawned
	pub fn start(&self) -> Result<(), DeviceError> {
		self.guard()?;
		let mut control = lock!(self.control);

		if let Some(fault) = self.take_fault() {
			control.reap();
			return Err(fault.into());
		}

		match self.inner.state.load() {
			DeviceState::Uninitialized => return Err(StateError::Uninitialized.into()),
			DeviceState::Started => return Ok(()),
			DeviceState::Stopped | DeviceState::Stopping => (),
		}

		let Some(backend) = control.backend.clone() else {
			return Err(StateError::Uninitialized.into());
		};

		control.reap();
		info2!("Device - start()");

		// Must happen before the worker's first `exchange()`.
		backend.start()?;

		self.inner.state.store(DeviceState::Started);
		match worker::spawn(&self.config.thread_name, &self.inner, &backend) {
			Ok(handle) => {
				control.worker = Some(handle);
				Ok(())
			},
			Err(error) => {
				if let Err(e) = backend.stop() {
					warn2!("Device - backend stop after failed spawn: {e}");
				}
				self.inner.state.store(DeviceState::Stopped);
				Err(DeviceError::ThreadSpawn {
					name: self.config.thread_name.to_string(),
					error,
				})
			},
		}
	}

	/// Stop the device.
	///
	/// Returns only after the worker thread has exited, no
	/// further `exchange()` happens after this returns.
	///
	/// # Errors
	/// - [`DeviceError::Fault`] if the worker already stopped the device
	/// - [`StateError::NotStarted`] if the device is not started
	/// - [`StateError::Uninitialized`] after [`Device::uninit`]
	/// - [`StateError::CalledFromCallback`] from inside the data callback
	/// - [`DeviceError::Stream`] if the backend failed to stop
	///   (the worker is still joined and the device is stopped)
	pub fn stop(&self) -> Result<(), DeviceError> {
		self.guard()?;
		let mut control = lock!(self.control);

		match self.inner.state.load() {
			DeviceState::Uninitialized => return Err(StateError::Uninitialized.into()),
			DeviceState::Stopped => {
				control.reap();
				return Err(match self.take_fault() {
					Some(fault) => fault.into(),
					None => StateError::NotStarted.into(),
				});
			},
			DeviceState::Started | DeviceState::Stopping => (),
		}

		info2!("Device - stop()");
		self.inner.state.store(DeviceState::Stopping);

		let result = match control.backend.as_ref() {
			Some(backend) => backend.stop(),
			None => Ok(()),
		};

		control.reap();
		self.inner.state.store(DeviceState::Stopped);

		result.map_err(DeviceError::from)
	}

	/// Tear the device down, closing the backend.
	///
	/// A pending worker fault is kept for [`Device::status`].
	///
	/// # Errors
	/// - [`StateError::NotStopped`] if the device is started
	/// - [`StateError::Uninitialized`] if already torn down
	/// - [`StateError::CalledFromCallback`] from inside the data callback
	pub fn uninit(&self) -> Result<(), StateError> {
		self.guard()?;
		let mut control = lock!(self.control);

		match self.inner.state.load() {
			DeviceState::Started | DeviceState::Stopping => return Err(StateError::NotStopped),
			DeviceState::Uninitialized => return Err(StateError::Uninitialized),
			DeviceState::Stopped => (),
		}

		info2!("Device - uninit()");
		control.reap();
		let backend = control.backend.take();
		self.inner.state.store(DeviceState::Uninitialized);

		if let Some(backend) = backend {
			match Arc::try_unwrap(backend) {
				Ok(backend) => backend.close(),
				// Only the worker clones it, and it was joined.
				Err(_) => warn2!("Device - backend still shared, closing on last drop"),
			}
		}

		drop(lock!(self.inner.parts).take());
		Ok(())
	}

	/// The current state.
	///
	/// This is a pure read, a pending fault is
	/// left in place for [`Device::status`].
	#[must_use]
	pub fn state(&self) -> DeviceState {
		self.inner.state.load()
	}

	/// The current state, or the fault that stopped the device.
	///
	/// A fault is returned exactly once.
	///
	/// # Errors
	/// [`DeviceError::Fault`] if the worker stopped the device since the last check.
	pub fn status(&self) -> Result<DeviceState, DeviceError> {
		match self.take_fault() {
			Some(fault) => Err(fault.into()),
			None => Ok(self.inner.state.load()),
		}
	}

	/// A snapshot of this device's counters.
	#[must_use]
	pub fn stats(&self) -> DeviceStats {
		self.inner.counters.snapshot()
	}

	/// The config this device was opened with.
	#[must_use]
	pub const fn config(&self) -> &DeviceConfig {
		&self.config
	}

	/// The backend that opened this device.
	#[must_use]
	pub const fn backend_kind(&self) -> BackendKind {
		self.kind
	}

	/// The format negotiated with the backend.
	///
	/// The data callback always sees [`DeviceConfig::format`], this
	/// is what the worker converts to/from.
	#[must_use]
	pub const fn internal_format(&self) -> Format {
		self.internal
	}

	/// Frames per period, in the internal format.
	#[must_use]
	pub const fn period_frames(&self) -> u32 {
		self.period_frames
	}

	/// Lifecycle calls from the worker thread would deadlock on the join.
	fn guard(&self) -> Result<(), StateError> {
		if self.inner.is_worker_thread() {
			Err(StateError::CalledFromCallback)
		} else {
			Ok(())
		}
	}

	fn take_fault(&self) -> Option<ExchangeError> {
		lock!(self.inner.fault).take()
	}

	/// The backend, for white-box tests.
	#[cfg(test)]
	fn backend(&self) -> Option<Arc<AnyBackend>> {
		lock!(self.control).backend.clone()
	}
}

impl Drop for Device {
	#[cold]
	#[inline(never)]
	fn drop(&mut self) {
		if self.inner.is_worker_thread() {
			// The last handle was dropped inside the callback, the worker
			// sees `Stopping` and exits on its own, nothing can be joined here.
			warn2!("Device - dropped from its own data callback");
			self.inner.state.store(DeviceState::Stopping);
			return;
		}

		if self.state().is_running() {
			if let Err(e) = self.stop() {
				warn2!("Device - stop on drop: {e}");
			}
		}
		if self.state() == DeviceState::Stopped {
			if let Err(e) = self.uninit() {
				warn2!("Device - uninit on drop: {e}");
			}
		}
		debug2!("Device - drop()");
	}
}

impl std::fmt::Debug for Device {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Device")
			.field("kind", &self.kind)
			.field("state", &self.state())
			.field("internal", &self.internal)
			.field("period_frames", &self.period_frames)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		config::DeviceConfig,
		device::DeviceType,
		format::SampleFormat,
		tests::{null_config,Recorder},
	};
	use crossbeam::channel;
	use pretty_assertions::assert_eq;
	use std::{
		sync::OnceLock,
		time::{Duration,Instant},
	};

	/// `(starts, stops)` seen by the null backend.
	fn backend_calls(device: &Device) -> (u64, u64) {
		let backend = device.backend().unwrap();
		backend.as_null().unwrap().calls()
	}

	#[test]
	fn init_is_stopped() {
		let device = Device::init(null_config(DeviceType::Playback), Recorder::silent()).unwrap();
		assert_eq!(device.state(), DeviceState::Stopped);
		assert_eq!(device.backend_kind(), BackendKind::Null);
		assert_eq!(device.internal_format(), device.config().format);
		assert_eq!(device.period_frames(), 480);
		assert_eq!(device.stats(), DeviceStats::default());
	}

	#[test]
	fn init_rejects_invalid_config() {
		let mut config = null_config(DeviceType::Playback);
		config.format.channels = 0;
		assert!(matches!(
			Device::init(config, Recorder::silent()),
			Err(InitError::Config(_))
		));
	}

	#[test]
	fn init_without_available_backends() {
		// Neither compiled in nor present is the same as unavailable.
		let mut config = null_config(DeviceType::Playback);
		config.backends = Some(vec![BackendKind::Cpal]);
		if BackendKind::Cpal.is_compiled() {
			return;
		}
		assert!(matches!(
			Device::init(config, Recorder::silent()),
			Err(InitError::NoBackendAvailable)
		));
	}

	#[test]
	fn init_reports_the_last_open_error() {
		let mut config = null_config(DeviceType::Playback);
		let mut device = crate::device::enumerate(DeviceType::Playback)
			.into_iter()
			.find(|d| d.backend == BackendKind::Null)
			.unwrap();
		device.id = "missing".into();
		config.device = Some(device);

		match Device::init(config, Recorder::silent()) {
			Err(InitError::Open { backend, error }) => {
				assert_eq!(backend, BackendKind::Null);
				assert!(matches!(error, OpenError::DeviceUnavailable(_)));
			},
			other => panic!("expected open error, got {other:?}"),
		}
	}

	#[test]
	fn start_twice_spawns_one_worker() {
		let device = Device::init(null_config(DeviceType::Playback), Recorder::silent()).unwrap();
		device.start().unwrap();
		let first = lock!(device.control).worker.as_ref().map(|h| h.thread().id());
		device.start().unwrap();
		let second = lock!(device.control).worker.as_ref().map(|h| h.thread().id());

		assert!(first.is_some());
		assert_eq!(first, second);
		assert_eq!(backend_calls(&device), (1, 0));
		assert_eq!(device.state(), DeviceState::Started);
		device.stop().unwrap();
	}

	#[test]
	fn stop_before_start_does_not_touch_the_backend() {
		let device = Device::init(null_config(DeviceType::Playback), Recorder::silent()).unwrap();
		assert!(matches!(device.stop(), Err(DeviceError::State(StateError::NotStarted))));
		assert_eq!(backend_calls(&device), (0, 0));
		assert_eq!(device.state(), DeviceState::Stopped);
	}

	#[test]
	fn no_exchange_after_stop() {
		for _ in 0..10 {
			let device = Device::init(null_config(DeviceType::Playback), Recorder::silent()).unwrap();
			device.start().unwrap();
			device.stop().unwrap();

			let before = device.stats();
			std::thread::sleep(Duration::from_millis(30));
			assert_eq!(device.stats(), before);
			assert!(lock!(device.control).worker.is_none());
		}
	}

	#[test]
	fn playback_end_to_end() {
		let mut config = null_config(DeviceType::Playback);
		config.format.sample_format = SampleFormat::S16;
		let period = config.format.duration_of(480);

		let (recorder, calls) = Recorder::new();
		let device = Device::init(config, recorder).unwrap();

		let now = Instant::now();
		device.start().unwrap();
		let first = calls.recv_timeout(Duration::from_secs(5)).unwrap();
		assert!(now.elapsed() < period + Duration::from_millis(50));

		assert_eq!(first.info.device_type, DeviceType::Playback);
		assert_eq!(first.info.format, device.config().format);
		assert_eq!(first.info.frame_count, 480);
		assert!(first.silent);

		// Let a few periods through.
		for _ in 0..3 {
			calls.recv_timeout(Duration::from_secs(5)).unwrap();
		}

		device.stop().unwrap();
		assert_eq!(device.status().unwrap(), DeviceState::Stopped);

		let stats = device.stats();
		assert!(stats.callbacks >= 4);
		assert!(stats.exchanges >= 3);
		assert_eq!(stats.frames, stats.exchanges * 480);
	}

	#[test]
	fn capture_end_to_end() {
		let mut config = null_config(DeviceType::Capture);
		config.format.sample_format = SampleFormat::U8;

		let (recorder, calls) = Recorder::new();
		let device = Device::init(config, recorder).unwrap();
		device.start().unwrap();

		for _ in 0..3 {
			let call = calls.recv_timeout(Duration::from_secs(5)).unwrap();
			assert_eq!(call.info.device_type, DeviceType::Capture);
			assert_eq!(call.info.frame_count, 480);
			// The null backend captures silence.
			assert!(call.silent);
		}

		device.stop().unwrap();
		assert!(device.status().is_ok());
	}

	#[test]
	fn restart_after_stop() {
		let (recorder, calls) = Recorder::new();
		let device = Device::init(null_config(DeviceType::Playback), recorder).unwrap();

		for _ in 0..3 {
			device.start().unwrap();
			calls.recv_timeout(Duration::from_secs(5)).unwrap();
			device.stop().unwrap();
			while calls.try_recv().is_ok() {}
		}

		assert_eq!(backend_calls(&device), (3, 3));
	}

	#[test]
	fn slow_callback_xruns_keep_running() {
		// 40ms of work per 10ms period.
		let device = Device::init(null_config(DeviceType::Playback), |info: CallbackInfo, _: &mut [u8]| {
			std::thread::sleep(Duration::from_millis(40));
			info.frame_count
		}).unwrap();
		device.start().unwrap();

		let deadline = Instant::now() + Duration::from_secs(5);
		while device.stats().xruns == 0 {
			assert!(Instant::now() < deadline, "no xrun was counted");
			std::thread::sleep(Duration::from_millis(10));
		}

		assert_eq!(device.state(), DeviceState::Started);
		assert_eq!(device.status().unwrap(), DeviceState::Started);
		device.stop().unwrap();
		assert!(device.stats().callbacks > 1);
	}

	#[test]
	fn init_rejects_huge_period() {
		let mut config = null_config(DeviceType::Playback);
		config.period_frames = std::num::NonZeroU32::new(u32::MAX);
		assert!(matches!(
			Device::init(config, Recorder::silent()),
			Err(InitError::Config(crate::error::ConfigError::PeriodTooLong(u32::MAX)))
		));
	}

	#[test]
	fn callback_panic_stops_the_device() {
		let config = null_config(DeviceType::Playback);
		let device = Device::init(config, |_: CallbackInfo, _: &mut [u8]| -> u32 {
			panic!("callback panic");
		}).unwrap();
		device.start().unwrap();

		let deadline = Instant::now() + Duration::from_secs(5);
		while device.state() != DeviceState::Stopped {
			assert!(Instant::now() < deadline, "worker never stopped");
			std::thread::sleep(Duration::from_millis(1));
		}

		assert!(matches!(device.status(), Err(DeviceError::Fault(ExchangeError::CallbackPanicked))));
		// Reported once.
		assert_eq!(device.status().unwrap(), DeviceState::Stopped);
		assert!(matches!(device.stop(), Err(DeviceError::State(StateError::NotStarted))));
		// The worker stopped the backend itself.
		assert_eq!(backend_calls(&device), (1, 1));

		// Still usable.
		device.uninit().unwrap();
	}

	#[test]
	fn fault_surfaces_on_start() {
		let device = Device::init(null_config(DeviceType::Playback), |_: CallbackInfo, _: &mut [u8]| -> u32 {
			panic!("callback panic");
		}).unwrap();
		device.start().unwrap();

		let deadline = Instant::now() + Duration::from_secs(5);
		while device.state() != DeviceState::Stopped {
			assert!(Instant::now() < deadline, "worker never stopped");
			std::thread::sleep(Duration::from_millis(1));
		}

		assert!(matches!(device.start(), Err(DeviceError::Fault(ExchangeError::CallbackPanicked))));
		assert_eq!(device.state(), DeviceState::Stopped);
	}

	#[test]
	fn lifecycle_from_the_callback_is_rejected() {
		static DEVICE: OnceLock<Arc<Device>> = OnceLock::new();

		let (send, recv) = channel::bounded(1);
		let device = Device::init(null_config(DeviceType::Playback), move |_: CallbackInfo, _: &mut [u8]| {
			if let Some(device) = DEVICE.get() {
				let results = (device.start().err(), device.stop().err(), device.uninit().err());
				drop(send.try_send(results));
			}
			0
		}).unwrap();

		let device = DEVICE.get_or_init(|| Arc::new(device));
		device.start().unwrap();

		let (start, stop, uninit) = recv.recv_timeout(Duration::from_secs(5)).unwrap();
		assert!(matches!(start, Some(DeviceError::State(StateError::CalledFromCallback))));
		assert!(matches!(stop, Some(DeviceError::State(StateError::CalledFromCallback))));
		assert_eq!(uninit, Some(StateError::CalledFromCallback));

		assert_eq!(device.state(), DeviceState::Started);
		device.stop().unwrap();
		device.uninit().unwrap();
	}

	#[test]
	fn uninit_states() {
		let device = Device::init(null_config(DeviceType::Capture), Recorder::silent()).unwrap();

		device.start().unwrap();
		assert_eq!(device.uninit(), Err(StateError::NotStopped));
		device.stop().unwrap();

		device.uninit().unwrap();
		assert_eq!(device.state(), DeviceState::Uninitialized);
		assert_eq!(device.uninit(), Err(StateError::Uninitialized));
		assert!(matches!(device.start(), Err(DeviceError::State(StateError::Uninitialized))));
		assert!(matches!(device.stop(), Err(DeviceError::State(StateError::Uninitialized))));
		assert!(device.backend().is_none());
	}

	#[test]
	fn small_mono_u8_period() {
		let mut config = null_config(DeviceType::Playback);
		config.format = Format { sample_format: SampleFormat::U8, channels: 1, sample_rate: 8_000 };
		config.period_frames = std::num::NonZeroU32::new(80);

		let (recorder, calls) = Recorder::new();
		let device = Device::init(config, recorder).unwrap();
		device.start().unwrap();

		let call = calls.recv_timeout(Duration::from_secs(5)).unwrap();
		assert_eq!(call.info.frame_count, 80);
		assert_eq!(call.len, 80);
		assert!(call.silent);
		device.stop().unwrap();
	}

	#[test]
	fn drop_stops_and_joins() {
		let (recorder, calls) = Recorder::new();
		let device = Device::init(null_config(DeviceType::Playback), recorder).unwrap();
		device.start().unwrap();
		calls.recv_timeout(Duration::from_secs(5)).unwrap();
		drop(device);

		// The recorder's sender died with the worker.
		let deadline = Instant::now() + Duration::from_secs(5);
		loop {
			match calls.recv_deadline(deadline) {
				Ok(_) => continue,
				Err(channel::RecvTimeoutError::Disconnected) => break,
				Err(channel::RecvTimeoutError::Timeout) => panic!("worker still running"),
			}
		}
	}

	#[test]
	fn debug_does_not_lock_up() {
		let device = Device::init(DeviceConfig { backends: Some(vec![BackendKind::Null]), ..DeviceConfig::DEFAULT }, Recorder::silent()).unwrap();
		assert!(format!("{device:?}").contains("Null"));
	}
}
