//! Cross-platform audio device abstraction.
//!
//! `audiodev` opens a playback or capture stream on whatever native
//! audio subsystem is available and drives it from one dedicated worker
//! thread per [`Device`]. The application supplies a data callback that
//! is invoked once per period with raw interleaved little-endian PCM in
//! the format it asked for; the worker converts to/from whatever format
//! the native subsystem actually negotiated.
//!
//! ```text
//!             playback                                 capture
//!
//!  callback -> convert -> exchange -> native   native -> exchange -> convert -> callback
//! ```
//!
//! - [`format`]: sample formats and the PCM converter
//! - [`backend`]: the native subsystem adapters and their priority
//! - [`device`]: device enumeration and the [`Device`] state machine
//! - [`config`]: [`DeviceConfig`](config::DeviceConfig) and its limits
//! - [`error`]: one error type per failure domain
//!
//! ```rust
//! # use audiodev::{config::*, backend::*, device::*, format::*};
//! let mut config = DeviceConfig::new(DeviceType::Playback);
//! config.format = Format { sample_format: SampleFormat::S16, channels: 2, sample_rate: 48_000 };
//! config.backends = Some(vec![BackendKind::Null]);
//!
//! let device = Device::init(config, |info: CallbackInfo, buffer: &mut [u8]| {
//!     // A quiet square wave.
//!     for (i, frame) in buffer.chunks_exact_mut(4).enumerate() {
//!         let s: i16 = if i % 100 < 50 { 1_000 } else { -1_000 };
//!         frame[..2].copy_from_slice(&s.to_le_bytes());
//!         frame[2..].copy_from_slice(&s.to_le_bytes());
//!     }
//!     info.frame_count
//! }).unwrap();
//!
//! device.start().unwrap();
//! std::thread::sleep(std::time::Duration::from_millis(50));
//! device.stop().unwrap();
//! assert!(device.stats().callbacks > 0);
//! ```

//---------------------------------------------------------------------------------------------------- Lints
#![allow(
    clippy::len_zero,
    clippy::type_complexity,
    clippy::module_inception,
)]

#![deny(
    nonstandard_style,
    deprecated,
    missing_docs,
    unreachable_patterns,
    unused_mut,
)]

#![forbid(
    unused_unsafe,
    future_incompatible,
    break_with_label_and_loop,
    coherence_leak_check,
    duplicate_macro_attributes,
    exported_private_dependencies,
    for_loops_over_fallibles,
    large_assignments,
    overlapping_range_endpoints,
    semicolon_in_expressions_from_macros,
    redundant_semicolons,
    unconditional_recursion,
    unused_allocation,
    unused_braces,
    unused_comparisons,
    unused_doc_comments,
    unused_parens,
    unused_labels,
    while_true,
    keyword_idents,
    non_ascii_idents,
    noop_method_call,
	unreachable_pub,
    single_use_lifetimes,
)]

//---------------------------------------------------------------------------------------------------- Public API
pub mod format;
pub mod backend;
pub mod device;
pub mod config;
pub mod error;

pub use device::Device;

//---------------------------------------------------------------------------------------------------- Private Usage
mod context;
mod macros;

#[cfg(test)]
mod tests;
