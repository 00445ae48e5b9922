use std::fmt;
use std::rc::Rc;

use elemental_context::ContextValueSpec;
use elemental_supply::Supply;

use super::{DefinitionContext, OBSERVED_ATTRIBUTES};
use crate::component::{ComponentClass, ComponentContext};

/// Configures a component definition before it is finalized.
///
/// Handed to component `setup` callbacks and to
/// [`setup_definition`](crate::BootstrapContext::setup_definition) receivers.
#[derive(Clone)]
pub struct DefinitionSetup {
	definition: DefinitionContext,
}

impl DefinitionSetup {
	pub(crate) fn new(definition: DefinitionContext) -> Self {
		Self { definition }
	}

	pub fn component_type(&self) -> &ComponentClass {
		self.definition.class()
	}

	/// Called once the element type is registered.
	pub fn when_ready(&self, receiver: impl FnOnce(&DefinitionContext) + 'static) -> Supply {
		self.definition.when_ready(receiver)
	}

	/// Receives every component context created from now on.
	pub fn when_component(&self, receiver: impl FnMut(&ComponentContext) + 'static) -> Supply {
		self.definition.when_component(receiver)
	}

	/// Provides a value of this definition's context.
	pub fn per_definition(&self, spec: ContextValueSpec<DefinitionContext>) -> Supply {
		self.definition.per_definition_registry().provide(spec)
	}

	/// Provides a value for every component of this definition.
	pub fn per_component(&self, spec: ContextValueSpec<ComponentContext>) -> Supply {
		self.definition.per_component_registry().provide(spec)
	}

	/// Adds an attribute to observe; effective if registered before the element type is built.
	pub fn observe_attribute(&self, name: impl Into<Rc<str>>) -> Supply {
		self.per_definition(ContextValueSpec::is(&*OBSERVED_ATTRIBUTES, name.into()))
	}
}

impl fmt::Debug for DefinitionSetup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("DefinitionSetup").field(&self.definition.class().name()).finish()
	}
}
