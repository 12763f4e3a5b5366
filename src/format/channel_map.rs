//! Channel routing between differing channel counts.

//---------------------------------------------------------------------------------------------------- Route
/// Where one output channel gets its sample from.
#[derive(Copy,Clone,Debug,PartialEq,Eq,Hash)]
pub enum Route {
	/// Copy input channel `n`.
	Channel(u16),
	/// The average of every input channel.
	Average,
	/// Silence.
	Silence,
}

//---------------------------------------------------------------------------------------------------- ChannelMap
/// A fixed, deterministic channel routing policy.
///
/// [`convert`](crate::format::convert) asks the map once per output channel
/// where that channel's sample comes from; the answer must only depend on
/// the arguments.
pub trait ChannelMap: Send + Sync {
	/// Route output channel `output` (`0..outputs`) given `inputs` input channels.
	fn route(&self, inputs: u16, outputs: u16, output: u16) -> Route;
}

//---------------------------------------------------------------------------------------------------- DefaultChannelMap
/// The default routing policy.
///
/// | Inputs | Outputs     | Output channel `j` gets   |
/// |--------|-------------|---------------------------|
/// | `N`    | `N`         | input `j`                 |
/// | `1`    | `N`         | input `0` (duplicated)    |
/// | `N`    | `1`         | the average of all inputs |
/// | `N`    | `M < N`     | input `j` (truncated)     |
/// | `N > 1`| `M > N`     | input `j % N`             |
///
/// ```rust
/// # use audiodev::format::*;
/// let map = DefaultChannelMap;
/// assert_eq!(map.route(1, 2, 1), Route::Channel(0));
/// assert_eq!(map.route(2, 1, 0), Route::Average);
/// assert_eq!(map.route(6, 2, 1), Route::Channel(1));
/// assert_eq!(map.route(2, 4, 3), Route::Channel(1));
/// ```
#[derive(Copy,Clone,Debug,Default,PartialEq,Eq,Hash)]
pub struct DefaultChannelMap;

impl ChannelMap for DefaultChannelMap {
	fn route(&self, inputs: u16, outputs: u16, output: u16) -> Route {
		if inputs == 0 {
			return Route::Silence;
		}
		if outputs == 1 && inputs > 1 {
			return Route::Average;
		}
		Route::Channel(output % inputs)
	}
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod tests {
	use super::*;

	fn routes(inputs: u16, outputs: u16) -> Vec<Route> {
		(0..outputs).map(|o| DefaultChannelMap.route(inputs, outputs, o)).collect()
	}

	#[test]
	fn identity() {
		pretty_assertions::assert_eq!(routes(3, 3), [Route::Channel(0), Route::Channel(1), Route::Channel(2)]);
	}

	#[test]
	fn mono_duplicates() {
		pretty_assertions::assert_eq!(routes(1, 4), [Route::Channel(0); 4]);
	}

	#[test]
	fn to_mono_averages() {
		pretty_assertions::assert_eq!(routes(2, 1), [Route::Average]);
		pretty_assertions::assert_eq!(routes(8, 1), [Route::Average]);
	}

	#[test]
	fn truncates() {
		pretty_assertions::assert_eq!(routes(6, 2), [Route::Channel(0), Route::Channel(1)]);
	}

	#[test]
	fn expands_round_robin() {
		pretty_assertions::assert_eq!(routes(2, 5), [
			Route::Channel(0), Route::Channel(1),
			Route::Channel(0), Route::Channel(1),
			Route::Channel(0),
		]);
	}
}
