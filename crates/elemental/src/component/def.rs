use std::any::Any;
use std::fmt;
use std::rc::Rc;

use super::ComponentContext;
use crate::definition::{DefinitionContext, DefinitionSetup};
use crate::error::Error;
use crate::naming::ElementName;

pub(crate) type DefinitionSetupFn = Rc<dyn Fn(&DefinitionSetup) -> Result<(), Error>>;
pub(crate) type DefineFn = Rc<dyn Fn(&DefinitionContext) -> Result<(), Error>>;
pub(crate) type Factory = Rc<dyn Fn(&ComponentContext) -> Result<Rc<dyn Any>, Error>>;

/// Native element a custom element derives from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementExtend {
	/// Name of the native element type, `HTMLElement` by default.
	pub base: Rc<str>,
	/// Built-in tag customized by the element, if any.
	pub tag: Option<Rc<str>>,
}

impl Default for ElementExtend {
	fn default() -> Self {
		Self { base: "HTMLElement".into(), tag: None }
	}
}

/// Declarative definition of a component, on top of its feature definition.
#[derive(Clone, Default)]
pub struct ComponentDef {
	pub(crate) name: Option<ElementName>,
	pub(crate) extend: Option<ElementExtend>,
	pub(crate) setup: Vec<DefinitionSetupFn>,
	pub(crate) define: Vec<DefineFn>,
	pub(crate) factory: Option<Factory>,
	pub(crate) observed: Vec<Rc<str>>,
}

impl ComponentDef {
	/// Combines two definitions. Name, base element and factory are last-wins;
	/// callbacks and observed attributes concatenate, `self` first.
	pub fn merge(&self, other: &ComponentDef) -> ComponentDef {
		ComponentDef {
			name: other.name.clone().or_else(|| self.name.clone()),
			extend: other.extend.clone().or_else(|| self.extend.clone()),
			setup: self.setup.iter().chain(&other.setup).cloned().collect(),
			define: self.define.iter().chain(&other.define).cloned().collect(),
			factory: other.factory.clone().or_else(|| self.factory.clone()),
			observed: self.observed.iter().chain(&other.observed).cloned().collect(),
		}
	}

	pub fn name(&self) -> Option<&ElementName> {
		self.name.as_ref()
	}

	pub fn extend(&self) -> ElementExtend {
		self.extend.clone().unwrap_or_default()
	}

	pub fn observed_attributes(&self) -> &[Rc<str>] {
		&self.observed
	}

	/// Creates the component instance; a unit instance without a factory.
	pub(crate) fn instantiate(&self, context: &ComponentContext) -> Result<Rc<dyn Any>, Error> {
		match &self.factory {
			Some(factory) => factory(context),
			None => Ok(Rc::new(())),
		}
	}
}

impl fmt::Debug for ComponentDef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentDef")
			.field("name", &self.name)
			.field("extend", &self.extend)
			.field("setup", &self.setup.len())
			.field("define", &self.define.len())
			.field("factory", &self.factory.is_some())
			.field("observed", &self.observed)
			.finish()
	}
}
