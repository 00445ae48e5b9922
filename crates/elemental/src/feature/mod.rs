//! Features: units of bootstrap configuration.
//!
//! A feature is declared once as a [`FeatureClass`] descriptor and may be
//! requested any number of times. The bootstrap loads each class at most once:
//! it registers the declared context values, runs `setup` synchronously, then
//! runs `init` after every needed feature finished its own `init`.
//!
//! Components are features too; see [`ComponentClass`](crate::ComponentClass).

mod context;
mod def;
mod feature_ref;
mod loader;

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use elemental_context::ContextValueSpec;
use futures::FutureExt;

pub use self::context::{BootstrapSetup, FeatureContext};
pub use self::def::FeatureDef;
pub use self::feature_ref::FeatureRef;
pub(crate) use self::loader::{FeatureRegistry, FeatureRequest};
use self::def::Need;
use crate::bootstrap::BootstrapContext;
use crate::component::{ComponentClass, ComponentContext, ComponentDef};
use crate::definition::DefinitionContext;
use crate::error::{Error, FeatureError};

static NEXT_CLASS: AtomicU64 = AtomicU64::new(1);

/// Identity of a feature class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u64);

struct ClassInner {
	id: ClassId,
	name: Rc<str>,
	parent: Option<FeatureClass>,
	def: FeatureDef,
	component: Option<Rc<ComponentDef>>,
}

/// Feature descriptor, compared by identity.
#[derive(Clone)]
pub struct FeatureClass(Rc<ClassInner>);

impl FeatureClass {
	pub fn builder(name: impl Into<Rc<str>>) -> FeatureBuilder {
		FeatureBuilder { name: name.into(), parent: None, def: FeatureDef::default(), component: None }
	}

	pub fn id(&self) -> ClassId {
		self.0.id
	}

	pub fn name(&self) -> &str {
		&self.0.name
	}

	pub fn parent(&self) -> Option<&FeatureClass> {
		self.0.parent.as_ref()
	}

	/// Effective definition, folded over the inheritance chain.
	pub fn def(&self) -> &FeatureDef {
		&self.0.def
	}

	/// Whether this class is `other` or inherits from it.
	pub fn inherits(&self, other: &FeatureClass) -> bool {
		let mut class = Some(self);
		while let Some(current) = class {
			if current == other {
				return true;
			}
			class = current.parent();
		}
		false
	}

	pub fn is_component(&self) -> bool {
		self.0.component.is_some()
	}

	/// This class as a component, if it defines one.
	pub fn as_component(&self) -> Option<ComponentClass> {
		self.0.component.as_ref().map(|def| ComponentClass::from_parts(self.clone(), Rc::clone(def)))
	}

	pub(crate) fn component_def(&self) -> Option<&Rc<ComponentDef>> {
		self.0.component.as_ref()
	}
}

impl PartialEq for FeatureClass {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for FeatureClass {}

impl Hash for FeatureClass {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.id.hash(state);
	}
}

impl fmt::Debug for FeatureClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("FeatureClass").field(&self.0.name).finish()
	}
}

impl fmt::Display for FeatureClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0.name)
	}
}

/// Builds a [`FeatureClass`].
pub struct FeatureBuilder {
	name: Rc<str>,
	parent: Option<FeatureClass>,
	def: FeatureDef,
	component: Option<ComponentDef>,
}

impl FeatureBuilder {
	/// Inherits the definition of `parent`, which is merged in front of this one.
	pub fn extends(mut self, parent: &FeatureClass) -> Self {
		self.parent = Some(parent.clone());
		self
	}

	pub fn needs(mut self, feature: &FeatureClass) -> Self {
		self.def.needs.push(Need::Class(feature.clone()));
		self
	}

	/// Needs a feature resolved only when this one is requested.
	pub fn needs_deferred(mut self, feature: impl Fn() -> FeatureClass + 'static) -> Self {
		self.def.needs.push(Need::Deferred(Rc::new(feature)));
		self
	}

	/// Provides `feature`: requests for it load this feature instead.
	pub fn has(mut self, feature: &FeatureClass) -> Self {
		self.def.has.push(feature.clone());
		self
	}

	/// Registers a bootstrap context value while the feature is loaded.
	pub fn set(mut self, spec: ContextValueSpec<BootstrapContext>) -> Self {
		self.def.set.push(spec);
		self
	}

	/// Registers a value for every component definition.
	pub fn per_definition(mut self, spec: ContextValueSpec<DefinitionContext>) -> Self {
		self.def.per_definition.push(spec);
		self
	}

	/// Registers a value for every component instance.
	pub fn per_component(mut self, spec: ContextValueSpec<ComponentContext>) -> Self {
		self.def.per_component.push(spec);
		self
	}

	pub fn setup(mut self, setup: impl Fn(&BootstrapSetup) -> Result<(), Error> + 'static) -> Self {
		self.def.setup.push(Rc::new(setup));
		self
	}

	/// Adds an asynchronous initializer.
	pub fn init<F, Fut>(mut self, init: F) -> Self
	where
		F: Fn(FeatureContext) -> Fut + 'static,
		Fut: Future<Output = Result<(), Error>> + 'static,
	{
		self.def.init.push(Rc::new(move |context| init(context).boxed_local()));
		self
	}

	/// Adds a synchronous initializer.
	pub fn on_init(mut self, init: impl Fn(&FeatureContext) -> Result<(), Error> + 'static) -> Self {
		self.def.init.push(Rc::new(move |context| futures::future::ready(init(&context)).boxed_local()));
		self
	}

	pub(crate) fn with_component(mut self, component: ComponentDef) -> Self {
		self.component = Some(component);
		self
	}

	pub fn build(self) -> FeatureClass {
		let (def, component) = match &self.parent {
			Some(parent) => {
				let component = match (parent.component_def(), self.component) {
					(Some(inherited), Some(own)) => Some(inherited.merge(&own)),
					(Some(inherited), None) => Some((**inherited).clone()),
					(None, own) => own,
				};
				(parent.def().merge(&self.def), component)
			}
			None => (self.def, self.component),
		};
		FeatureClass(Rc::new(ClassInner {
			id: ClassId(NEXT_CLASS.fetch_add(1, Ordering::Relaxed)),
			name: self.name,
			parent: self.parent,
			def,
			component: component.map(Rc::new),
		}))
	}
}

/// Load status of a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeaturePhase {
	/// Loaded, `init` not finished yet.
	Pending,
	Ready,
	/// `init` of the feature or of one of its dependencies failed.
	Failed(FeatureError),
	/// Unloaded.
	Down,
}

impl FeaturePhase {
	pub fn is_ready(&self) -> bool {
		matches!(self, Self::Ready)
	}
}
