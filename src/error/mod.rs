//! Errors that can occur.
//!
//! Each failure domain has its own type:
//!
//! | Type              | Returned by                                      |
//! |-------------------|--------------------------------------------------|
//! | [`ConfigError`]   | [`DeviceConfig::validate`](crate::config::DeviceConfig::validate) |
//! | [`OpenError`]     | a backend failing to open a native stream        |
//! | [`InitError`]     | [`Device::init`](crate::device::Device::init)    |
//! | [`StreamError`]   | a backend failing to start/stop a native stream  |
//! | [`ExchangeError`] | the worker thread exchanging a period of audio   |
//! | [`StateError`]    | an operation illegal in the current [`DeviceState`](crate::device::DeviceState) |
//! | [`DeviceError`]   | [`Device`](crate::device::Device) lifecycle operations |

mod config;
pub use config::ConfigError;

mod open;
pub use open::OpenError;

mod init;
pub use init::InitError;

mod stream;
pub use stream::StreamError;

mod exchange;
pub use exchange::ExchangeError;

mod state;
pub use state::StateError;

mod device;
pub use device::DeviceError;
