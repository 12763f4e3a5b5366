//! PCM sample formats and conversion.
//!
//! All sample data handled by `audiodev` is raw, interleaved,
//! little-endian PCM in one of the [`SampleFormat`]s.
//!
//! [`convert`] is the stateless encoding + channel conversion.
//! [`Converter`] adds sample-rate conversion on top of it, and
//! owns the scratch space needed to do so without allocating.

mod sample_format;
pub use sample_format::{SampleFormat,Format};

mod sample;
pub(crate) use sample::Sample;

mod channel_map;
pub use channel_map::{ChannelMap,DefaultChannelMap,Route};

mod convert;
pub use convert::{convert,silence,MAX_CHANNELS};

mod converter;
pub use converter::{Converter,Fixed};
