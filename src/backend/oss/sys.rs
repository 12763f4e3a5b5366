//! Raw OSS ioctls.
//!
//! The request codes are the `_IO*` encodings from `soundcard.h`,
//! they are identical on Linux and the BSDs.

//---------------------------------------------------------------------------------------------------- Use
use crate::format::SampleFormat;
use std::{
	io,
	os::fd::{AsRawFd,BorrowedFd,FromRawFd,OwnedFd},
};
use libc::c_int;

//---------------------------------------------------------------------------------------------------- Requests
pub(super) const SNDCTL_DSP_HALT: u64        = 0x0000_5000;
pub(super) const SNDCTL_DSP_SPEED: u64       = 0xC004_5002;
pub(super) const SNDCTL_DSP_SETFMT: u64      = 0xC004_5005;
pub(super) const SNDCTL_DSP_CHANNELS: u64    = 0xC004_5006;
pub(super) const SNDCTL_DSP_SETFRAGMENT: u64 = 0xC004_500A;
pub(super) const SNDCTL_DSP_GETOSPACE: u64   = 0x8010_500C;
pub(super) const SNDCTL_DSP_GETISPACE: u64   = 0x8010_500D;
pub(super) const SNDCTL_DSP_SETTRIGGER: u64  = 0x4004_5010;

pub(super) const PCM_ENABLE_INPUT: c_int  = 0x1;
pub(super) const PCM_ENABLE_OUTPUT: c_int = 0x2;

//---------------------------------------------------------------------------------------------------- Formats
const AFMT_U8: c_int     = 0x0000_0008;
const AFMT_S16_LE: c_int = 0x0000_0010;
const AFMT_S32_LE: c_int = 0x0000_1000;
const AFMT_FLOAT: c_int  = 0x0000_4000;
#[cfg(target_os = "freebsd")]
const AFMT_S24_PACKED: c_int = 0x0001_0000;
#[cfg(not(target_os = "freebsd"))]
const AFMT_S24_PACKED: c_int = 0x0004_0000;

/// Our format -> OSS format.
pub(super) const fn afmt(format: SampleFormat) -> c_int {
	match format {
		SampleFormat::U8  => AFMT_U8,
		SampleFormat::S16 => AFMT_S16_LE,
		SampleFormat::S24 => AFMT_S24_PACKED,
		SampleFormat::S32 => AFMT_S32_LE,
		SampleFormat::F32 => AFMT_FLOAT,
	}
}

/// OSS format -> our format, if we speak it.
pub(super) const fn from_afmt(afmt: c_int) -> Option<SampleFormat> {
	match afmt {
		AFMT_U8         => Some(SampleFormat::U8),
		AFMT_S16_LE     => Some(SampleFormat::S16),
		AFMT_S24_PACKED => Some(SampleFormat::S24),
		AFMT_S32_LE     => Some(SampleFormat::S32),
		AFMT_FLOAT      => Some(SampleFormat::F32),
		_ => None,
	}
}

//---------------------------------------------------------------------------------------------------- audio_buf_info
/// `struct audio_buf_info`.
#[repr(C)]
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq)]
pub(super) struct AudioBufInfo {
	/// Fragments that can be moved without blocking.
	pub(super) fragments: c_int,
	/// Total fragments allocated.
	pub(super) fragstotal: c_int,
	/// Fragment size in bytes.
	pub(super) fragsize: c_int,
	/// Bytes that can be moved without blocking.
	pub(super) bytes: c_int,
}

//---------------------------------------------------------------------------------------------------- ioctl
/// `ioctl(fd, request, &mut value)`, returning the value the driver wrote back.
pub(super) fn ioctl_int(fd: BorrowedFd<'_>, request: u64, value: c_int) -> io::Result<c_int> {
	let mut value = value;
	// SAFETY: every request passed here takes a `*mut c_int`.
	let ret = unsafe { libc::ioctl(fd.as_raw_fd(), request as _, &mut value as *mut c_int) };
	if ret == -1 {
		Err(io::Error::last_os_error())
	} else {
		Ok(value)
	}
}

/// `ioctl(fd, request)` for requests without an argument.
pub(super) fn ioctl_none(fd: BorrowedFd<'_>, request: u64) -> io::Result<()> {
	// SAFETY: the request takes no argument.
	let ret = unsafe { libc::ioctl(fd.as_raw_fd(), request as _, 0) };
	if ret == -1 {
		Err(io::Error::last_os_error())
	} else {
		Ok(())
	}
}

/// `SNDCTL_DSP_GET{O,I}SPACE`.
pub(super) fn buf_info(fd: BorrowedFd<'_>, request: u64) -> io::Result<AudioBufInfo> {
	let mut info = AudioBufInfo::default();
	// SAFETY: both requests write one `audio_buf_info`.
	let ret = unsafe { libc::ioctl(fd.as_raw_fd(), request as _, &mut info as *mut AudioBufInfo) };
	if ret == -1 {
		Err(io::Error::last_os_error())
	} else {
		Ok(info)
	}
}

/// `SNDCTL_DSP_SETFRAGMENT` argument: `periods` fragments of `2^n >= bytes` bytes.
pub(super) fn fragment_arg(period_bytes: usize, periods: u32) -> c_int {
	// OSS wants a power of two, at least 16 bytes.
	let shift = period_bytes.max(16).next_power_of_two().trailing_zeros() as c_int;
	let count = periods.clamp(2, 0x7FFF) as c_int;
	(count << 16) | shift
}

//---------------------------------------------------------------------------------------------------- Self-pipe
/// A non-blocking `pipe(2)`, `(read, write)`.
pub(super) fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
	let mut fds: [c_int; 2] = [-1, -1];
	// SAFETY: `fds` has room for the 2 descriptors.
	if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
		return Err(io::Error::last_os_error());
	}
	// SAFETY: both descriptors were just created and are owned by nothing else.
	let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

	for fd in [&read, &write] {
		let raw = fd.as_raw_fd();
		// SAFETY: `raw` is a valid open descriptor.
		let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
		// SAFETY: same as above.
		if flags == -1 || unsafe { libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) } == -1 {
			return Err(io::Error::last_os_error());
		}
	}

	Ok((read, write))
}

/// The outcome of [`poll_wake`].
#[derive(Copy,Clone,Debug,PartialEq,Eq)]
pub(super) enum Ready {
	/// The device can move data.
	Device,
	/// The wake pipe was written to.
	Woken,
	/// The device reported an error/hangup.
	Hangup,
}

/// Block until `device` is ready for `events` or `wake` is readable.
pub(super) fn poll_wake(device: BorrowedFd<'_>, events: libc::c_short, wake: BorrowedFd<'_>) -> io::Result<Ready> {
	let mut fds = [
		libc::pollfd { fd: device.as_raw_fd(), events, revents: 0 },
		libc::pollfd { fd: wake.as_raw_fd(), events: libc::POLLIN, revents: 0 },
	];

	loop {
		// SAFETY: `fds` is a valid array of 2 `pollfd`s.
		let ret = unsafe { libc::poll(fds.as_mut_ptr(), 2, -1) };
		if ret == -1 {
			let error = io::Error::last_os_error();
			if error.kind() == io::ErrorKind::Interrupted {
				continue;
			}
			return Err(error);
		}

		if fds[1].revents & libc::POLLIN != 0 {
			return Ok(Ready::Woken);
		}
		if fds[0].revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
			return Ok(Ready::Hangup);
		}
		if fds[0].revents & events != 0 {
			return Ok(Ready::Device);
		}
	}
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;
	use strum::IntoEnumIterator;

	#[test]
	fn afmt_round_trip() {
		for format in SampleFormat::iter() {
			assert_eq!(from_afmt(afmt(format)), Some(format));
		}
		assert_eq!(from_afmt(0x20), None); // AFMT_S16_BE
	}

	#[test]
	fn fragment() {
		// 480 frames * 4 bytes = 1920 -> 2048 = 2^11.
		assert_eq!(fragment_arg(1920, 3), (3 << 16) | 11);
		assert_eq!(fragment_arg(2048, 4), (4 << 16) | 11);
		assert_eq!(fragment_arg(1, 1), (2 << 16) | 4);
	}

	#[test]
	fn wake_pipe_interrupts_poll() {
		use std::os::fd::AsFd;

		// The read end of a second pipe never becomes readable.
		let (idle, _idle_write) = pipe().unwrap();
		let (wake_read, wake_write) = pipe().unwrap();

		let t = std::thread::spawn(move || poll_wake(idle.as_fd(), libc::POLLIN, wake_read.as_fd()).unwrap());
		std::thread::sleep(std::time::Duration::from_millis(20));
		// SAFETY: writing 1 byte from a valid buffer.
		let n = unsafe { libc::write(wake_write.as_raw_fd(), [1_u8].as_ptr().cast(), 1) };
		assert_eq!(n, 1);
		assert_eq!(t.join().unwrap(), Ready::Woken);
	}

	#[test]
	fn audio_buf_info_layout() {
		assert_eq!(std::mem::size_of::<AudioBufInfo>(), 4 * std::mem::size_of::<c_int>());
	}
}
