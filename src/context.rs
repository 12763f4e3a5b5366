//! Process-wide backend state.
//!
//! Some backends have state that must exist at most once per process
//! (a parsed device table, a selected host). [`Shared`] creates it on
//! first use and drops it when the last [`Arc`] handed out is dropped,
//! so it lives exactly as long as some device of that backend does.

//---------------------------------------------------------------------------------------------------- Use
use crate::macros::{debug2,lock};
use std::sync::{Arc,Mutex,OnceLock,Weak};

//---------------------------------------------------------------------------------------------------- Shared
/// A lazily-initialized, reference-counted context.
///
/// Meant to be used as a `static`.
pub(crate) struct Shared<T> {
	name: &'static str,
	slot: OnceLock<Mutex<Weak<T>>>,
}

impl<T> Shared<T> {
	/// Create an empty context slot.
	pub(crate) const fn new(name: &'static str) -> Self {
		Self {
			name,
			slot: OnceLock::new(),
		}
	}

	fn slot(&self) -> &Mutex<Weak<T>> {
		self.slot.get_or_init(|| Mutex::new(Weak::new()))
	}

	/// Return the live context, or create it with `init`.
	///
	/// `init` runs with the slot locked, so concurrent
	/// callers never create two contexts.
	///
	/// # Errors
	/// Whatever `init` returns, nothing is stored in that case.
	pub(crate) fn acquire<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
		let mut slot = lock!(self.slot());

		if let Some(context) = slot.upgrade() {
			return Ok(context);
		}

		debug2!("Context - {} - init", self.name);
		let context = Arc::new(init()?);
		*slot = Arc::downgrade(&context);
		Ok(context)
	}

	/// Is a context currently alive?
	pub(crate) fn is_alive(&self) -> bool {
		lock!(self.slot()).strong_count() > 0
	}
}

impl<T> std::fmt::Debug for Shared<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Shared")
			.field("name", &self.name)
			.field("alive", &self.is_alive())
			.finish()
	}
}
