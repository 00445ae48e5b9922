use elemental_supply::OffReason;

use super::ComponentContext;

/// A component mounted to a pre-existing element.
///
/// The host does not report connection changes of such elements, so they are
/// driven through this handle.
#[derive(Debug, Clone)]
pub struct ComponentMount {
	context: ComponentContext,
}

impl ComponentMount {
	pub(crate) fn new(context: ComponentContext) -> Self {
		Self { context }
	}

	pub fn context(&self) -> &ComponentContext {
		&self.context
	}

	pub fn connected(&self) -> bool {
		self.context.connected()
	}

	/// Marks the component connected.
	pub fn connect(&self) {
		self.context.connect();
	}

	/// Syncs the component with the element's connection state.
	///
	/// Connects the component when the element got connected, and destroys it
	/// when the element got detached. Returns whether the element is connected.
	pub fn check_connected(&self) -> bool {
		let connected = self.context.element().is_some_and(|element| element.is_connected());
		if connected != self.connected() {
			if connected {
				self.connect();
			} else {
				self.context.destroy(OffReason::aborted("element detached"));
			}
		}
		connected
	}
}
