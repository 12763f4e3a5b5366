// Global macros for internal audiodev usage.

//---------------------------------------------------------------------------------------------------- Logging
// Logs with `log` but only if the `log` feature is enabled.
//
// With the feature disabled the arguments are still
// type-checked (through `format_args!`) but never evaluated.

macro_rules! error2 {
	($($arg:tt)+) => {{
		#[cfg(feature = "log")]
		::log::error!($($arg)+);
		#[cfg(not(feature = "log"))]
		if false { let _ = format_args!($($arg)+); }
	}};
}
pub(crate) use error2;

macro_rules! warn2 {
	($($arg:tt)+) => {{
		#[cfg(feature = "log")]
		::log::warn!($($arg)+);
		#[cfg(not(feature = "log"))]
		if false { let _ = format_args!($($arg)+); }
	}};
}
pub(crate) use warn2;

macro_rules! info2 {
	($($arg:tt)+) => {{
		#[cfg(feature = "log")]
		::log::info!($($arg)+);
		#[cfg(not(feature = "log"))]
		if false { let _ = format_args!($($arg)+); }
	}};
}
pub(crate) use info2;

macro_rules! debug2 {
	($($arg:tt)+) => {{
		#[cfg(feature = "log")]
		::log::debug!($($arg)+);
		#[cfg(not(feature = "log"))]
		if false { let _ = format_args!($($arg)+); }
	}};
}
pub(crate) use debug2;

macro_rules! trace2 {
	($($arg:tt)+) => {{
		#[cfg(feature = "log")]
		::log::trace!($($arg)+);
		#[cfg(not(feature = "log"))]
		if false { let _ = format_args!($($arg)+); }
	}};
}
pub(crate) use trace2;

//---------------------------------------------------------------------------------------------------- Locks
// Lock a `std::sync::Mutex`, recovering the guard if
// another thread panicked while holding it.
//
// Every mutex in this crate guards plain data that stays
// consistent across a panic, so poisoning carries no meaning.
macro_rules! lock {
	($mutex:expr) => {
		$mutex.lock().unwrap_or_else(::std::sync::PoisonError::into_inner)
	};
}
pub(crate) use lock;
