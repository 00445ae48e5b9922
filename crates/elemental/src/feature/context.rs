use std::ops::Deref;

use elemental_context::ContextValueSpec;
use elemental_supply::{OffReason, Supply};

use super::FeatureClass;
use crate::bootstrap::BootstrapContext;
use crate::component::{ComponentClass, ComponentContext};
use crate::definition::{DefinitionContext, DefinitionSetup};
use crate::error::Error;

/// Handed to feature `setup` callbacks.
///
/// Everything registered through it is bound to the feature's supply and goes
/// away when the feature unloads.
#[derive(Clone)]
pub struct BootstrapSetup {
	bootstrap: BootstrapContext,
	feature: FeatureClass,
	supply: Supply,
}

impl BootstrapSetup {
	pub(crate) fn new(bootstrap: BootstrapContext, feature: FeatureClass, supply: Supply) -> Self {
		Self { bootstrap, feature, supply }
	}

	pub fn bootstrap(&self) -> &BootstrapContext {
		&self.bootstrap
	}

	pub fn feature(&self) -> &FeatureClass {
		&self.feature
	}

	/// Cut off when the feature unloads.
	pub fn supply(&self) -> &Supply {
		&self.supply
	}

	/// Provides a bootstrap context value.
	pub fn provide(&self, spec: ContextValueSpec<BootstrapContext>) -> Supply {
		self.bind(self.bootstrap.registry().provide(spec))
	}

	/// Provides a value for every component definition.
	pub fn per_definition(&self, spec: ContextValueSpec<DefinitionContext>) -> Supply {
		self.bind(self.bootstrap.per_definition_registry().provide(spec))
	}

	/// Provides a value for every component instance.
	pub fn per_component(&self, spec: ContextValueSpec<ComponentContext>) -> Supply {
		self.bind(self.bootstrap.per_component_registry().provide(spec))
	}

	/// Configures the definition of `component` as soon as it exists.
	pub fn setup_definition(&self, component: &ComponentClass, setup: impl FnMut(&DefinitionSetup) + 'static) -> Supply {
		self.bind(self.bootstrap.setup_definition(component, setup))
	}

	fn bind(&self, registration: Supply) -> Supply {
		self.supply.cuts(&registration);
		registration
	}
}

impl Deref for BootstrapSetup {
	type Target = BootstrapContext;

	fn deref(&self) -> &BootstrapContext {
		&self.bootstrap
	}
}

/// Handed to feature `init` callbacks.
#[derive(Clone)]
pub struct FeatureContext {
	setup: BootstrapSetup,
}

impl FeatureContext {
	pub(crate) fn new(setup: BootstrapSetup) -> Self {
		Self { setup }
	}

	/// Defines a component; see [`BootstrapContext::define`].
	pub fn define(&self, component: &ComponentClass) -> Result<DefinitionContext, Error> {
		self.setup.bootstrap.define(component)
	}

	/// Runs `callback` when the feature unloads.
	pub fn on_unload(&self, callback: impl FnOnce(&OffReason) + 'static) -> &Self {
		self.setup.supply.when_off(callback);
		self
	}
}

impl Deref for FeatureContext {
	type Target = BootstrapSetup;

	fn deref(&self) -> &BootstrapSetup {
		&self.setup
	}
}
