use std::fmt;
use std::rc::Rc;

use elemental_context::ContextValueSpec;
use futures::future::LocalBoxFuture;

use super::{BootstrapSetup, FeatureClass, FeatureContext};
use crate::bootstrap::BootstrapContext;
use crate::component::ComponentContext;
use crate::definition::DefinitionContext;
use crate::error::Error;

pub(crate) type SetupFn = Rc<dyn Fn(&BootstrapSetup) -> Result<(), Error>>;
pub(crate) type InitFn = Rc<dyn Fn(FeatureContext) -> LocalBoxFuture<'static, Result<(), Error>>>;

/// A dependency on another feature.
#[derive(Clone)]
pub(crate) enum Need {
	Class(FeatureClass),
	/// Resolved on request, so that descriptors may depend on each other.
	Deferred(Rc<dyn Fn() -> FeatureClass>),
}

impl Need {
	pub(crate) fn resolve(&self) -> FeatureClass {
		match self {
			Self::Class(class) => class.clone(),
			Self::Deferred(class) => class(),
		}
	}
}

/// Declarative definition of a feature.
///
/// Immutable once its class is built. Inheritance folds parent and child
/// definitions with [`merge`](Self::merge).
#[derive(Clone, Default)]
pub struct FeatureDef {
	pub(crate) needs: Vec<Need>,
	pub(crate) has: Vec<FeatureClass>,
	pub(crate) set: Vec<ContextValueSpec<BootstrapContext>>,
	pub(crate) per_definition: Vec<ContextValueSpec<DefinitionContext>>,
	pub(crate) per_component: Vec<ContextValueSpec<ComponentContext>>,
	pub(crate) setup: Vec<SetupFn>,
	pub(crate) init: Vec<InitFn>,
}

impl FeatureDef {
	/// Combines two definitions. Lists concatenate and callbacks compose, `self` first.
	pub fn merge(&self, other: &FeatureDef) -> FeatureDef {
		fn concat<T: Clone>(a: &[T], b: &[T]) -> Vec<T> {
			a.iter().chain(b).cloned().collect()
		}

		FeatureDef {
			needs: concat(&self.needs, &other.needs),
			has: concat(&self.has, &other.has),
			set: concat(&self.set, &other.set),
			per_definition: concat(&self.per_definition, &other.per_definition),
			per_component: concat(&self.per_component, &other.per_component),
			setup: concat(&self.setup, &other.setup),
			init: concat(&self.init, &other.init),
		}
	}

	/// Features to initialize before this one, in declaration order.
	pub fn needs(&self) -> Vec<FeatureClass> {
		self.needs.iter().map(Need::resolve).collect()
	}

	/// Features this one provides in place of their own definitions.
	pub fn has(&self) -> &[FeatureClass] {
		&self.has
	}

	pub fn has_init(&self) -> bool {
		!self.init.is_empty()
	}
}

impl fmt::Debug for FeatureDef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FeatureDef")
			.field("needs", &self.needs.len())
			.field("has", &self.has)
			.field("set", &self.set)
			.field("setup", &self.setup.len())
			.field("init", &self.init.len())
			.finish_non_exhaustive()
	}
}
