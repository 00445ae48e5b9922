use std::rc::Weak;

use super::{DefinitionContext, DefinitionInner};
use crate::component::ComponentContext;
use crate::error::{Error, HostError};
use crate::host::{ElementCallbacks, ElementHandle};

/// Routes host lifecycle callbacks to component contexts.
///
/// Refers to the definition weakly; the host keeps element types alive.
pub(super) struct DefinitionCallbacks {
	definition: Weak<DefinitionInner>,
}

impl DefinitionCallbacks {
	pub(super) fn new(definition: Weak<DefinitionInner>) -> Self {
		Self { definition }
	}
}

impl ElementCallbacks for DefinitionCallbacks {
	fn construct(&self, element: &ElementHandle) -> Result<(), Error> {
		let Some(definition) = DefinitionContext::from_weak(&self.definition) else {
			return Err(HostError::DefinitionDropped { tag: element.local_name().to_string() }.into());
		};
		ComponentContext::create(&definition, element, false)?;
		Ok(())
	}

	fn connected(&self, element: &ElementHandle) {
		if let Some(context) = ComponentContext::of(&**element) {
			context.connect();
		}
	}

	fn disconnected(&self, element: &ElementHandle) {
		if let Some(context) = ComponentContext::of(&**element) {
			context.disconnect();
		}
	}

	fn attribute_changed(&self, element: &ElementHandle, name: &str, old: Option<&str>, new: Option<&str>) {
		if let Some(context) = ComponentContext::of(&**element) {
			context.attribute_changed(name, old, new);
		}
	}
}
