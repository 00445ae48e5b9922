//! Components: features that define a custom element.
//!
//! Requesting a component class as a feature defines it. Each element instance
//! gets a [`ComponentContext`] driving the instance through its lifecycle:
//!
//! ```text
//! Constructed -> Ready -> Settled -> Connected <-> Disconnected
//!        \_________\_________\___________\______________\____> Destroyed
//! ```

mod context;
mod def;
mod mount;
mod state;
mod status;

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

use elemental_context::ContextValueSpec;

pub use self::context::{AttributeChange, ComponentContext};
pub use self::def::{ComponentDef, ElementExtend};
pub use self::mount::ComponentMount;
pub use self::state::{STATE_UPDATER, StateUpdater};
pub use self::status::ComponentStatus;
use crate::bootstrap::BootstrapContext;
use crate::definition::{DefinitionContext, DefinitionSetup};
use crate::error::Error;
use crate::feature::{BootstrapSetup, FeatureBuilder, FeatureClass, FeatureContext};
use crate::naming::ElementName;

/// Component descriptor. Dereferences to its feature class.
#[derive(Clone)]
pub struct ComponentClass {
	feature: FeatureClass,
	def: Rc<ComponentDef>,
}

impl ComponentClass {
	pub fn builder(name: impl Into<Rc<str>>) -> ComponentBuilder {
		ComponentBuilder { feature: FeatureClass::builder(name), def: ComponentDef::default() }
	}

	pub(crate) fn from_parts(feature: FeatureClass, def: Rc<ComponentDef>) -> Self {
		Self { feature, def }
	}

	/// Effective component definition, folded over the inheritance chain.
	pub fn component_def(&self) -> &ComponentDef {
		&self.def
	}

	/// The feature class to request or bootstrap.
	pub fn feature(&self) -> FeatureClass {
		self.feature.clone()
	}
}

impl Deref for ComponentClass {
	type Target = FeatureClass;

	fn deref(&self) -> &FeatureClass {
		&self.feature
	}
}

impl From<ComponentClass> for FeatureClass {
	fn from(component: ComponentClass) -> Self {
		component.feature
	}
}

impl PartialEq for ComponentClass {
	fn eq(&self, other: &Self) -> bool {
		self.feature == other.feature
	}
}

impl Eq for ComponentClass {}

impl Hash for ComponentClass {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.feature.hash(state);
	}
}

impl fmt::Debug for ComponentClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentClass").field("name", &self.feature.name()).field("def", &self.def).finish()
	}
}

/// Builds a [`ComponentClass`].
pub struct ComponentBuilder {
	feature: FeatureBuilder,
	def: ComponentDef,
}

impl ComponentBuilder {
	/// Inherits both the feature and the component definition of `parent`.
	pub fn extends(mut self, parent: &FeatureClass) -> Self {
		self.feature = self.feature.extends(parent);
		self
	}

	/// Element name: a plain tag, or a local name in a namespace.
	pub fn name(mut self, name: impl Into<ElementName>) -> Self {
		self.def.name = Some(name.into());
		self
	}

	/// Derives the element from a native element type, optionally customizing a built-in tag.
	pub fn extend(mut self, base: impl Into<Rc<str>>, tag: Option<&str>) -> Self {
		self.def.extend = Some(ElementExtend { base: base.into(), tag: tag.map(Into::into) });
		self
	}

	/// Runs as soon as the definition context exists.
	pub fn setup(mut self, setup: impl Fn(&DefinitionSetup) -> Result<(), Error> + 'static) -> Self {
		self.def.setup.push(Rc::new(setup));
		self
	}

	/// Runs once right before the element type is built.
	pub fn define(mut self, define: impl Fn(&DefinitionContext) -> Result<(), Error> + 'static) -> Self {
		self.def.define.push(Rc::new(define));
		self
	}

	/// Creates the component instance of every element.
	pub fn factory<T: 'static>(mut self, factory: impl Fn(&ComponentContext) -> Result<T, Error> + 'static) -> Self {
		self.def.factory = Some(Rc::new(move |context| Ok(Rc::new(factory(context)?) as Rc<dyn std::any::Any>)));
		self
	}

	pub fn observe(mut self, attribute: impl Into<Rc<str>>) -> Self {
		self.def.observed.push(attribute.into());
		self
	}

	pub fn needs(mut self, feature: &FeatureClass) -> Self {
		self.feature = self.feature.needs(feature);
		self
	}

	pub fn needs_deferred(mut self, feature: impl Fn() -> FeatureClass + 'static) -> Self {
		self.feature = self.feature.needs_deferred(feature);
		self
	}

	pub fn has(mut self, feature: &FeatureClass) -> Self {
		self.feature = self.feature.has(feature);
		self
	}

	pub fn set(mut self, spec: ContextValueSpec<BootstrapContext>) -> Self {
		self.feature = self.feature.set(spec);
		self
	}

	pub fn per_definition(mut self, spec: ContextValueSpec<DefinitionContext>) -> Self {
		self.feature = self.feature.per_definition(spec);
		self
	}

	pub fn per_component(mut self, spec: ContextValueSpec<ComponentContext>) -> Self {
		self.feature = self.feature.per_component(spec);
		self
	}

	/// Feature `setup`, run when the component feature loads.
	pub fn bootstrap_setup(mut self, setup: impl Fn(&BootstrapSetup) -> Result<(), Error> + 'static) -> Self {
		self.feature = self.feature.setup(setup);
		self
	}

	pub fn init<F, Fut>(mut self, init: F) -> Self
	where
		F: Fn(FeatureContext) -> Fut + 'static,
		Fut: Future<Output = Result<(), Error>> + 'static,
	{
		self.feature = self.feature.init(init);
		self
	}

	pub fn build(self) -> ComponentClass {
		let feature = self.feature.with_component(self.def).build();
		let def = feature.component_def().cloned().unwrap_or_default();
		ComponentClass { feature, def }
	}
}
