//! Open Sound System backend.
//!
//! This is a poll/blocking-model backend: there is no native thread,
//! `exchange()` itself moves one period through `read(2)`/`write(2)`.
//!
//! The device node is opened non-blocking and `exchange()` waits in
//! `poll(2)` on both the device and a self-pipe. `stop()` writes to
//! the pipe, so it can interrupt an `exchange()` on another thread
//! without closing anything underneath it.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	backend::{Backend,BackendKind},
	config::{DeviceConfig,MAX_CHANNELS},
	context::Shared,
	device::{DeviceInfo,DeviceType},
	error::{ExchangeError,OpenError,StreamError},
	format::{Format,SampleFormat},
	macros::{debug2,info2,trace2,warn2},
};
use std::{
	borrow::Cow,
	collections::BTreeMap,
	fs::{File,OpenOptions},
	io::{self,Read,Write},
	os::{
		fd::{AsFd,OwnedFd},
		unix::fs::OpenOptionsExt,
	},
	path::Path,
	sync::{
		Arc,
		atomic::{AtomicBool,Ordering},
	},
};

mod sys;
use sys::Ready;

//---------------------------------------------------------------------------------------------------- Constants
/// The default device node.
const DEFAULT_DSP: &str = "/dev/dsp";

/// The device table.
const SNDSTAT: &str = "/dev/sndstat";

/// How many `/dev/dspN` nodes are probed.
const MAX_UNITS: u32 = 32;

//---------------------------------------------------------------------------------------------------- DeviceTable
/// Process-wide table of sound units, parsed from `/dev/sndstat`.
static TABLE: Shared<DeviceTable> = Shared::new("oss");

/// One `pcmN` unit.
#[derive(Clone,Debug,Default,PartialEq,Eq)]
struct Unit {
	name: String,
	play: bool,
	rec: bool,
	default: bool,
}

/// `/dev/sndstat`, indexed by unit number.
#[derive(Clone,Debug,Default,PartialEq,Eq)]
struct DeviceTable {
	units: BTreeMap<u32, Unit>,
}

impl DeviceTable {
	/// Read `/dev/sndstat`, empty if it doesn't exist.
	fn load() -> Self {
		match std::fs::read_to_string(SNDSTAT) {
			Ok(s) => Self::parse(&s),
			Err(e) => {
				trace2!("Oss - no {SNDSTAT}: {e}");
				Self::default()
			},
		}
	}

	/// Parse both the FreeBSD format:
	/// ```text
	/// pcm0: <Realtek ALC892 (Analog)> (play/rec) default
	/// ```
	/// and the OSSv4 format:
	/// ```text
	/// Audio devices:
	/// 0: Sound Blaster (DUPLEX)
	/// ```
	fn parse(s: &str) -> Self {
		let mut units = BTreeMap::new();
		let mut in_audio_section = false;

		for line in s.lines() {
			let line = line.trim();

			if line.ends_with(':') && !line.starts_with("pcm") {
				in_audio_section = line == "Audio devices:";
				continue;
			}

			let (number, rest) = if let Some(rest) = line.strip_prefix("pcm") {
				let Some((n, rest)) = rest.split_once(':') else { continue };
				(n, rest.trim())
			} else if in_audio_section {
				let Some((n, rest)) = line.split_once(':') else { continue };
				(n, rest.trim())
			} else {
				continue;
			};

			let Ok(number) = number.trim().parse::<u32>() else { continue };

			let unit = match (rest.find('<'), rest.rfind('>')) {
				// FreeBSD
				(Some(start), Some(end)) if start < end => {
					let caps = &rest[end + 1..];
					let (play, rec) = if caps.contains("play") || caps.contains("rec") {
						(caps.contains("play"), caps.contains("rec"))
					} else {
						(true, true)
					};
					Unit {
						name: rest[start + 1..end].to_string(),
						play,
						rec,
						default: caps.trim_end().ends_with("default"),
					}
				},
				// OSSv4
				_ => Unit {
					name: rest.split(" (").next().unwrap_or(rest).to_string(),
					play: true,
					rec: true,
					default: false,
				},
			};

			units.insert(number, unit);
		}

		Self { units }
	}

	fn unit(&self, number: u32) -> Option<&Unit> {
		self.units.get(&number)
	}

	fn default_unit(&self) -> Option<&Unit> {
		self.units.values().find(|u| u.default)
	}
}

//---------------------------------------------------------------------------------------------------- Oss
/// An open `/dev/dsp*` node.
pub(crate) struct Oss {
	path: String,
	device: File,
	device_type: DeviceType,
	format: Format,
	period_frames: u32,

	/// Self-pipe, `stop()` writes, `exchange()` polls.
	wake_read: OwnedFd,
	wake_write: OwnedFd,

	started: AtomicBool,

	/// Keeps the device table alive as long as a device is open.
	_table: Arc<DeviceTable>,
}

impl Oss {
	const fn trigger(&self) -> libc::c_int {
		match self.device_type {
			DeviceType::Playback => sys::PCM_ENABLE_OUTPUT,
			DeviceType::Capture  => sys::PCM_ENABLE_INPUT,
		}
	}

	/// Drop every pending wake byte.
	fn drain_wake(&self) {
		let mut pipe = File::from(match self.wake_read.try_clone() {
			Ok(fd) => fd,
			Err(e) => {
				warn2!("Oss - failed to clone wake pipe: {e}");
				return;
			},
		});
		let mut buf = [0_u8; 64];
		while matches!(pipe.read(&mut buf), Ok(n) if n > 0) {}
	}

	/// Negotiate the internal format, field by field.
	///
	/// OSS answers every request with the value it will actually use.
	fn negotiate(device: &File, requested: Format) -> Result<Format, OpenError> {
		let fd = device.as_fd();

		let got = sys::ioctl_int(fd, sys::SNDCTL_DSP_SETFMT, sys::afmt(requested.sample_format))?;
		let sample_format = match sys::from_afmt(got) {
			Some(f) => f,
			None => {
				debug2!("Oss - driver picked unknown format {got:#x}, retrying with s16");
				let got = sys::ioctl_int(fd, sys::SNDCTL_DSP_SETFMT, sys::afmt(SampleFormat::S16))?;
				sys::from_afmt(got).ok_or_else(|| {
					OpenError::InvalidConfig(Cow::Owned(format!("unsupported OSS sample format {got:#x}")))
				})?
			},
		};

		let got = sys::ioctl_int(fd, sys::SNDCTL_DSP_CHANNELS, libc::c_int::from(requested.channels))?;
		let channels = u16::try_from(got)
			.ok()
			.filter(|c| (1..=MAX_CHANNELS).contains(c))
			.ok_or_else(|| OpenError::InvalidConfig(Cow::Owned(format!("unsupported OSS channel count {got}"))))?;

		let rate = libc::c_int::try_from(requested.sample_rate).unwrap_or(libc::c_int::MAX);
		let got = sys::ioctl_int(fd, sys::SNDCTL_DSP_SPEED, rate)?;
		let sample_rate = u32::try_from(got)
			.ok()
			.filter(|r| *r > 0)
			.ok_or_else(|| OpenError::InvalidConfig(Cow::Owned(format!("unsupported OSS sample rate {got}"))))?;

		Ok(Format { sample_format, channels, sample_rate })
	}
}

//---------------------------------------------------------------------------------------------------- `Backend` Impl
impl Backend for Oss {
	const KIND: BackendKind = BackendKind::Oss;

	#[cold]
	#[inline(never)]
	fn probe(device_type: DeviceType) -> Vec<DeviceInfo> {
		let Ok(table) = TABLE.acquire(|| Ok::<_, ()>(DeviceTable::load())) else {
			return Vec::new();
		};

		let capable = |unit: &Unit| match device_type {
			DeviceType::Playback => unit.play,
			DeviceType::Capture  => unit.rec,
		};

		let mut devices = Vec::new();

		if Path::new(DEFAULT_DSP).exists() {
			let name = table
				.default_unit()
				.map_or_else(|| "OSS Default Device".to_string(), |u| u.name.clone());
			devices.push(DeviceInfo {
				id: DEFAULT_DSP.into(),
				name,
				backend: BackendKind::Oss,
				device_type,
				is_default: true,
			});
		}

		for number in 0..MAX_UNITS {
			let path = format!("{DEFAULT_DSP}{number}");
			if !Path::new(&path).exists() {
				continue;
			}

			let unit = table.unit(number);
			if unit.is_some_and(|u| !capable(u)) {
				continue;
			}

			devices.push(DeviceInfo {
				name: unit.map_or_else(|| path.clone(), |u| u.name.clone()),
				id: path.into(),
				backend: BackendKind::Oss,
				device_type,
				is_default: false,
			});
		}

		debug2!("Oss - probe({device_type}), found {} device(s)", devices.len());
		devices
	}

	#[cold]
	#[inline(never)]
	fn open(config: &DeviceConfig, device: Option<&DeviceInfo>) -> Result<Self, OpenError> {
		let path = device.map_or(DEFAULT_DSP, |d| d.id.as_str()).to_string();
		debug2!("Oss - open({path})");

		let table = TABLE.acquire(|| Ok::<_, OpenError>(DeviceTable::load()))?;

		let mut options = OpenOptions::new();
		match config.device_type {
			DeviceType::Playback => options.write(true),
			DeviceType::Capture  => options.read(true),
		};
		let file = options.custom_flags(libc::O_NONBLOCK).open(&path).map_err(|e| {
			let error = OpenError::from(e);
			// A missing default node means no OSS, a missing chosen node is that device's problem.
			match (error, device) {
				(OpenError::Unavailable, Some(_)) => OpenError::DeviceUnavailable(Cow::Owned(format!("no such device: {path}"))),
				(error, _) => error,
			}
		})?;
		let fd = file.as_fd();

		// Nothing moves until `start()`.
		if let Err(e) = sys::ioctl_int(fd, sys::SNDCTL_DSP_SETTRIGGER, 0) {
			warn2!("Oss - failed to disable trigger: {e}");
		}

		// Must happen before the format is set.
		let requested = config.format;
		let period_bytes = config.period_frames() as usize * requested.bytes_per_frame();
		if let Err(e) = sys::ioctl_int(fd, sys::SNDCTL_DSP_SETFRAGMENT, sys::fragment_arg(period_bytes, config.periods)) {
			warn2!("Oss - driver rejected fragment size: {e}");
		}

		let format = Self::negotiate(&file, requested)?;
		if format != requested {
			info2!("Oss - requested {requested}, driver picked {format}");
		}

		let request = match config.device_type {
			DeviceType::Playback => sys::SNDCTL_DSP_GETOSPACE,
			DeviceType::Capture  => sys::SNDCTL_DSP_GETISPACE,
		};
		let period_frames = match sys::buf_info(fd, request) {
			Ok(info) if info.fragsize > 0 => {
				debug2!("Oss - {info:?}, {} bytes free", info.bytes);
				info.fragsize as usize / format.bytes_per_frame()
			},
			_ => {
				// Keep the requested period duration at the driver's rate.
				let frames = u64::from(config.period_frames()) * u64::from(format.sample_rate)
					/ u64::from(requested.sample_rate);
				frames as usize
			},
		};
		let period_frames = u32::try_from(period_frames.max(1)).unwrap_or(u32::MAX);

		let (wake_read, wake_write) = sys::pipe()?;

		debug2!("Oss - opened {path}: {format}, period: {period_frames} frames");

		Ok(Self {
			path,
			device: file,
			device_type: config.device_type,
			format,
			period_frames,
			wake_read,
			wake_write,
			started: AtomicBool::new(false),
			_table: table,
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

		debug2!("Oss - start()");
		self.drain_wake();

		// Some drivers start on the first read/write regardless.
		if let Err(e) = sys::ioctl_int(self.device.as_fd(), sys::SNDCTL_DSP_SETTRIGGER, self.trigger()) {
			warn2!("Oss - failed to set trigger: {e}");
		}

		Ok(())
	}

	fn stop(&self) -> Result<(), StreamError> {
		debug2!("Oss - stop()");
		self.started.store(false, Ordering::Release);

		let mut pipe = File::from(self.wake_write.try_clone()?);
		match pipe.write(&[1]) {
			// A full pipe already has a wake pending.
			Ok(_) => (),
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => (),
			Err(e) => return Err(e.into()),
		}

		sys::ioctl_none(self.device.as_fd(), sys::SNDCTL_DSP_HALT)?;
		Ok(())
	}

	fn exchange(&self, buffer: &mut [u8], frames: u32) -> Result<u32, ExchangeError> {
		let bytes_per_frame = self.format.bytes_per_frame();
		let total = (frames as usize * bytes_per_frame).min(buffer.len() / bytes_per_frame * bytes_per_frame);
		let events = match self.device_type {
			DeviceType::Playback => libc::POLLOUT,
			DeviceType::Capture  => libc::POLLIN,
		};

		let mut done = 0;
		while done < total {
			let result = match self.device_type {
				DeviceType::Playback => (&self.device).write(&buffer[done..total]),
				DeviceType::Capture  => (&self.device).read(&mut buffer[done..total]),
			};

			match result {
				Ok(n) if n > 0 => done += n,
				Ok(_) => return Err(ExchangeError::Closed),
				Err(e) if e.kind() == io::ErrorKind::Interrupted => (),
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
					match sys::poll_wake(self.device.as_fd(), events, self.wake_read.as_fd())? {
						Ready::Device => (),
						Ready::Woken => {
							trace2!("Oss - exchange() woken after {done}/{total} bytes");
							break;
						},
						Ready::Hangup => return Err(ExchangeError::DeviceUnavailable),
					}
				},
				Err(e) => return Err(match e.raw_os_error() {
					Some(libc::ENODEV | libc::ENXIO | libc::EBADF) => ExchangeError::DeviceUnavailable,
					_ => ExchangeError::Io(e),
				}),
			}
		}

		Ok((done / bytes_per_frame) as u32)
	}

	#[cold]
	#[inline(never)]
	fn close(self) {
		debug2!("Oss - close({})", self.path);
		// `File` and both pipe ends close on drop.
	}
}
