//! Push-model handoff.
//!
//! Some native subsystems own the audio thread and call us when they
//! want (playback) or have (capture) data. [`Handoff`] turns that into
//! the blocking `exchange()` shape the worker thread expects.
//!
//! A fixed set of period-sized byte slots circulates between the two sides:
//!
//! ```text
//!            playback                          capture
//!
//!   worker --- full ---> native       native --- full ---> worker
//!   worker <-- empty --- native       native <-- empty --- worker
//! ```
//!
//! The channels are bounded to the slot count and slots are never
//! created or destroyed after [`Handoff::new`], so neither side ever
//! allocates and the native side never blocks.

//---------------------------------------------------------------------------------------------------- Use
use crate::{
	device::DeviceType,
	error::ExchangeError,
	format::Format,
	macros::trace2,
};
use crossbeam::channel::{self,Receiver,Sender};
use std::sync::{
	Arc,
	atomic::{AtomicU64,Ordering},
};

//---------------------------------------------------------------------------------------------------- Handoff
/// The worker-thread end of the handoff.
pub(crate) struct Handoff {
	device_type: DeviceType,
	bytes_per_frame: usize,
	silence: u8,

	/// Slots the producer may fill.
	empty_send: Sender<Vec<u8>>,
	empty_recv: Receiver<Vec<u8>>,
	/// Slots the consumer may drain.
	full_send: Sender<Vec<u8>>,
	full_recv: Receiver<Vec<u8>>,

	/// `stop()` sends here to unblock an in-flight `exchange()`.
	wake_send: Sender<()>,
	wake_recv: Receiver<()>,

	/// Fatal native errors.
	fault_send: Sender<ExchangeError>,
	fault_recv: Receiver<ExchangeError>,

	/// Underruns/overruns counted by the native side.
	xruns: Arc<AtomicU64>,
	/// How many of `xruns` the worker already reported.
	xruns_reported: AtomicU64,
}

/// The native-thread end of the handoff.
///
/// Lives inside the native data callback.
pub(crate) struct NativeEnd {
	device_type: DeviceType,
	silence: u8,

	empty_send: Sender<Vec<u8>>,
	empty_recv: Receiver<Vec<u8>>,
	full_send: Sender<Vec<u8>>,
	full_recv: Receiver<Vec<u8>>,

	/// The slot currently being filled/drained and how far into it we are.
	current: Option<(Vec<u8>, usize)>,

	xruns: Arc<AtomicU64>,
	/// Playback underruns only count once real data arrived.
	primed: bool,
}

//---------------------------------------------------------------------------------------------------- Handoff Impl
impl Handoff {
	#[cold]
	#[inline(never)]
	/// Create both ends.
	///
	/// `slots` is clamped to at least `1`.
	pub(crate) fn new(
		device_type: DeviceType,
		format: Format,
		period_frames: u32,
		slots: u32,
	) -> (Self, NativeEnd) {
		let slots = slots.max(1) as usize;
		let bytes_per_frame = format.bytes_per_frame();
		let period_bytes = period_frames as usize * bytes_per_frame;
		let silence = format.sample_format.silence_byte();

		let (empty_send, empty_recv) = channel::bounded(slots);
		let (full_send, full_recv)   = channel::bounded(slots);
		let (wake_send, wake_recv)   = channel::bounded(1);
		let (fault_send, fault_recv) = channel::bounded(1);

		for _ in 0..slots {
			// INVARIANT: `slots` capacity, this never fails.
			drop(empty_send.try_send(vec![silence; period_bytes]));
		}

		let xruns = Arc::new(AtomicU64::new(0));

		let native = NativeEnd {
			device_type,
			silence,
			empty_send: empty_send.clone(),
			empty_recv: empty_recv.clone(),
			full_send: full_send.clone(),
			full_recv: full_recv.clone(),
			current: None,
			xruns: Arc::clone(&xruns),
			primed: false,
		};

		let this = Self {
			device_type,
			bytes_per_frame,
			silence,
			empty_send,
			empty_recv,
			full_send,
			full_recv,
			wake_send,
			wake_recv,
			fault_send,
			fault_recv,
			xruns,
			xruns_reported: AtomicU64::new(0),
		};

		(this, native)
	}

	/// Unblock an in-flight (or the next) [`Handoff::exchange`].
	pub(crate) fn wake(&self) {
		// Full means a wake is already pending.
		let _ = self.wake_send.try_send(());
	}

	/// Prepare for a new start.
	///
	/// Drops pending wakes and recycles queued slots,
	/// stale audio from before a stop is discarded.
	///
	/// Must only be called while the native side is paused.
	pub(crate) fn reset(&self) {
		while self.wake_recv.try_recv().is_ok() {}
		while let Ok(slot) = self.full_recv.try_recv() {
			drop(self.empty_send.try_send(slot));
		}
		self.xruns_reported.store(self.xruns.load(Ordering::Acquire), Ordering::Release);
	}

	/// A sender for native error callbacks that
	/// are separate from the data callback.
	///
	/// The channel holds one fault, later ones are dropped.
	#[cfg_attr(not(feature = "cpal"), allow(dead_code))]
	pub(crate) fn fault_sender(&self) -> Sender<ExchangeError> {
		self.fault_send.clone()
	}

	/// Total underruns/overruns so far.
	pub(crate) fn xruns(&self) -> u64 {
		self.xruns.load(Ordering::Acquire)
	}

	/// Exchange one period with the native side.
	///
	/// Blocks until a slot is available, [`Handoff::wake`]
	/// is called (returns `Ok(0)`), or a fault arrives.
	pub(crate) fn exchange(&self, buffer: &mut [u8], frames: u32) -> Result<u32, ExchangeError> {
		if let Ok(fault) = self.fault_recv.try_recv() {
			return Err(fault);
		}

		let transferred = match self.device_type {
			DeviceType::Playback => self.push(buffer, frames)?,
			DeviceType::Capture  => self.pull(buffer, frames)?,
		};

		self.check_xruns(transferred)?;
		Ok(transferred)
	}

	/// Wait for a slot from `slots`, or a wake, or a fault.
	fn wait(&self, slots: &Receiver<Vec<u8>>) -> Result<Option<Vec<u8>>, ExchangeError> {
		channel::select! {
			recv(slots) -> slot => slot.map(Some).map_err(|_| ExchangeError::Closed),
			recv(self.wake_recv) -> _ => {
				trace2!("Handoff - woken");
				Ok(None)
			},
			recv(self.fault_recv) -> fault => Err(fault.unwrap_or(ExchangeError::Closed)),
		}
	}

	/// Playback: copy `buffer` into an empty slot and queue it.
	fn push(&self, buffer: &[u8], frames: u32) -> Result<u32, ExchangeError> {
		let Some(mut slot) = self.wait(&self.empty_recv)? else {
			return Ok(0);
		};

		let bytes = (frames as usize * self.bytes_per_frame)
			.min(buffer.len())
			.min(slot.len());
		slot[..bytes].copy_from_slice(&buffer[..bytes]);
		slot[bytes..].fill(self.silence);

		self.full_send.try_send(slot).map_err(|_| ExchangeError::Closed)?;
		Ok((bytes / self.bytes_per_frame) as u32)
	}

	/// Capture: copy a full slot into `buffer` and recycle it.
	fn pull(&self, buffer: &mut [u8], frames: u32) -> Result<u32, ExchangeError> {
		let Some(slot) = self.wait(&self.full_recv)? else {
			return Ok(0);
		};

		let bytes = (frames as usize * self.bytes_per_frame)
			.min(buffer.len())
			.min(slot.len());
		buffer[..bytes].copy_from_slice(&slot[..bytes]);

		self.empty_send.try_send(slot).map_err(|_| ExchangeError::Closed)?;
		Ok((bytes / self.bytes_per_frame) as u32)
	}

	fn check_xruns(&self, transferred: u32) -> Result<(), ExchangeError> {
		let total = self.xruns.load(Ordering::Acquire);
		let reported = self.xruns_reported.swap(total, Ordering::AcqRel);
		if total > reported {
			Err(ExchangeError::Xrun { transferred })
		} else {
			Ok(())
		}
	}
}

//---------------------------------------------------------------------------------------------------- NativeEnd Impl
impl NativeEnd {
	/// Playback: fill `output` from queued slots.
	///
	/// Missing data is filled with silence and counted as an underrun.
	pub(crate) fn play(&mut self, output: &mut [u8]) {
		let mut written = 0;

		while written < output.len() {
			let (slot, offset) = match self.current.take() {
				Some(current) => current,
				None => match self.full_recv.try_recv() {
					Ok(slot) => {
						self.primed = true;
						(slot, 0)
					},
					Err(_) => {
						output[written..].fill(self.silence);
						if self.primed {
							self.xruns.fetch_add(1, Ordering::AcqRel);
							trace2!("Handoff - native underrun, {written}/{} bytes", output.len());
						}
						return;
					},
				},
			};

			let n = (slot.len() - offset).min(output.len() - written);
			output[written..written + n].copy_from_slice(&slot[offset..offset + n]);
			written += n;

			if offset + n == slot.len() {
				drop(self.empty_send.try_send(slot));
			} else {
				self.current = Some((slot, offset + n));
			}
		}
	}

	/// Capture: move `input` into empty slots.
	///
	/// Data with no slot to go into is dropped and counted as an overrun.
	pub(crate) fn record(&mut self, input: &[u8]) {
		let mut read = 0;

		while read < input.len() {
			let (mut slot, offset) = match self.current.take() {
				Some(current) => current,
				None => match self.empty_recv.try_recv() {
					Ok(slot) => (slot, 0),
					Err(_) => {
						self.xruns.fetch_add(1, Ordering::AcqRel);
						trace2!("Handoff - native overrun, dropped {} bytes", input.len() - read);
						return;
					},
				},
			};

			let n = (slot.len() - offset).min(input.len() - read);
			slot[offset..offset + n].copy_from_slice(&input[read..read + n]);
			read += n;

			if offset + n == slot.len() {
				drop(self.full_send.try_send(slot));
			} else {
				self.current = Some((slot, offset + n));
			}
		}
	}

	/// Which direction this end moves data in.
	pub(crate) const fn device_type(&self) -> DeviceType {
		self.device_type
	}
}

impl std::fmt::Debug for NativeEnd {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NativeEnd")
			.field("device_type", &self.device_type)
			.field("xruns", &self.xruns.load(Ordering::Relaxed))
			.finish_non_exhaustive()
	}
}
