use std::fmt;

/// Lifecycle status of a component instance.
///
/// `Destroyed` is absorbing: no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentStatus {
	/// The context exists, the component instance is being built.
	Constructed,
	/// The component instance is built.
	Ready,
	/// Initial setup after construction is done; the element may now be manipulated.
	Settled,
	Connected,
	Disconnected,
	Destroyed,
}

impl ComponentStatus {
	/// Whether the component reached [`Ready`](Self::Ready) and is not destroyed.
	pub fn is_ready(self) -> bool {
		!matches!(self, Self::Constructed | Self::Destroyed)
	}

	/// Whether the component settled and is not destroyed.
	pub fn is_settled(self) -> bool {
		matches!(self, Self::Settled | Self::Connected | Self::Disconnected)
	}

	pub fn is_connected(self) -> bool {
		self == Self::Connected
	}

	pub fn is_destroyed(self) -> bool {
		self == Self::Destroyed
	}

	/// Position along the forward path; connection toggling shares one rank.
	pub(crate) fn rank(self) -> u8 {
		match self {
			Self::Constructed => 0,
			Self::Ready => 1,
			Self::Settled => 2,
			Self::Connected | Self::Disconnected => 3,
			Self::Destroyed => 4,
		}
	}
}

impl fmt::Display for ComponentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Constructed => "constructed",
			Self::Ready => "ready",
			Self::Settled => "settled",
			Self::Connected => "connected",
			Self::Disconnected => "disconnected",
			Self::Destroyed => "destroyed",
		})
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case(ComponentStatus::Constructed, false, false)]
	#[case(ComponentStatus::Ready, true, false)]
	#[case(ComponentStatus::Settled, true, true)]
	#[case(ComponentStatus::Connected, true, true)]
	#[case(ComponentStatus::Disconnected, true, true)]
	#[case(ComponentStatus::Destroyed, false, false)]
	fn predicates(#[case] status: ComponentStatus, #[case] ready: bool, #[case] settled: bool) {
		assert_eq!(status.is_ready(), ready);
		assert_eq!(status.is_settled(), settled);
	}

	#[test]
	fn ranks_follow_the_lifecycle() {
		use ComponentStatus::*;
		let path = [Constructed, Ready, Settled, Connected, Destroyed];
		assert!(path.windows(2).all(|w| w[0].rank() < w[1].rank()));
		assert_eq!(Connected.rank(), Disconnected.rank());
	}
}
