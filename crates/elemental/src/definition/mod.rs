//! Component definitions.
//!
//! A [`DefinitionContext`] exists once per component class per bootstrap. It is
//! created when the component is first defined, configured through
//! [`DefinitionSetup`], and finalized once its feature finished `init` and the
//! bootstrap is ready: `define` callbacks run, the [`ElementType`] is built and
//! registered with the host.

mod callbacks;
mod setup;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::sync::LazyLock;

use elemental_context::{ContextRegistry, ContextValueSpec, ContextValues, MultiKey, SingleKey, Values};
use elemental_supply::{EventChannel, Supply};

pub use self::setup::DefinitionSetup;
use self::callbacks::DefinitionCallbacks;
use crate::bootstrap::{BootstrapContext, CUSTOM_ELEMENTS, NAMESPACE_ALIASER};
use crate::component::{ComponentClass, ComponentContext, ComponentMount};
use crate::error::{Error, FeatureError, UsageError};
use crate::host::{ElementHandle, ElementType};
use crate::naming::validate_tag_name;

static DEFINITION: LazyLock<SingleKey<DefinitionContext>> = LazyLock::new(|| SingleKey::new("definition-context"));

/// Attributes the host reports changes of, gathered from every definition layer.
pub static OBSERVED_ATTRIBUTES: LazyLock<MultiKey<Rc<str>>> = LazyLock::new(|| MultiKey::new("observed-attributes"));

pub(crate) struct DefinitionInner {
	bootstrap: BootstrapContext,
	class: ComponentClass,
	values: Values<DefinitionContext>,
	per_definition: ContextRegistry<DefinitionContext>,
	per_component: ContextRegistry<ComponentContext>,
	/// Definition-level component providers followed by bootstrap-level ones.
	component_registry: ContextRegistry<ComponentContext>,
	element_type: RefCell<Option<ElementType>>,
	finalized: Cell<bool>,
	outcome: EventChannel<Result<(), Error>>,
	components: EventChannel<ComponentContext>,
}

/// Context of a component definition.
#[derive(Clone)]
pub struct DefinitionContext(Rc<DefinitionInner>);

impl DefinitionContext {
	/// Key resolving to the consuming definition context.
	pub fn key() -> &'static SingleKey<DefinitionContext> {
		&DEFINITION
	}

	pub(crate) fn new(bootstrap: &BootstrapContext, class: &ComponentClass) -> Self {
		let per_definition = ContextRegistry::new();
		let per_component = ContextRegistry::new();
		let registry = per_definition.append(bootstrap.per_definition_registry()).with_parent(bootstrap.clone());
		let component_registry = per_component.append(bootstrap.per_component_registry());

		let context = Self(Rc::new(DefinitionInner {
			bootstrap: bootstrap.clone(),
			class: class.clone(),
			values: registry.new_values(),
			per_definition,
			per_component,
			component_registry,
			element_type: RefCell::new(None),
			finalized: Cell::new(false),
			outcome: EventChannel::once(),
			components: EventChannel::multicast(),
		}));
		registry.provide_self(&*DEFINITION);
		for attribute in class.component_def().observed_attributes() {
			context.0.per_definition.provide(ContextValueSpec::is(&*OBSERVED_ATTRIBUTES, Rc::clone(attribute)));
		}
		context
	}

	/// Runs setup callbacks of the component and of `setup_definition` receivers.
	pub(crate) fn set_up(&self) -> Result<(), Error> {
		let setup = DefinitionSetup::new(self.clone());
		for callback in &self.0.class.component_def().setup {
			callback(&setup)?;
		}
		self.0.bootstrap.definition_created(self, setup);
		tracing::debug!(component = self.0.class.name(), "definition.created");
		Ok(())
	}

	/// Builds and registers the element type. Runs at most once.
	pub(crate) fn finalize(&self) -> Result<(), Error> {
		if self.0.finalized.replace(true) {
			return Ok(());
		}
		let outcome = self.build();
		match &outcome {
			Ok(()) => tracing::debug!(component = self.0.class.name(), tag = ?self.tag_name(), "definition.ready"),
			Err(err) => tracing::error!(component = self.0.class.name(), error = %err, "definition.failed"),
		}
		self.0.outcome.send(outcome.clone());
		outcome
	}

	/// Fails the definition without building it. No-op once finalized.
	pub(crate) fn abort(&self, err: Error) {
		if self.0.finalized.replace(true) {
			return;
		}
		tracing::error!(component = self.0.class.name(), error = %err, "definition.aborted");
		self.0.outcome.send(Err(err));
	}

	fn build(&self) -> Result<(), Error> {
		let def = self.0.class.component_def();
		for define in &def.define {
			define(self)?;
		}

		let tag_name = match def.name() {
			Some(name) => {
				let tag = self.get(&*NAMESPACE_ALIASER)?.tag_name(name);
				if self.0.bootstrap.config().elements.strict_tag_names {
					validate_tag_name(&tag)?;
				}
				Some(tag)
			}
			None => None,
		};
		let mut observed_attributes: Vec<Rc<str>> = Vec::new();
		for attribute in self.get(&*OBSERVED_ATTRIBUTES)? {
			if !observed_attributes.contains(&attribute) {
				observed_attributes.push(attribute);
			}
		}
		let extend = def.extend();
		let element_type = ElementType {
			tag_name,
			base: extend.base,
			extends: extend.tag,
			observed_attributes,
			callbacks: Rc::new(DefinitionCallbacks::new(Rc::downgrade(&self.0))),
		};

		let custom_elements = self.get(&*CUSTOM_ELEMENTS)?;
		// Visible to components upgraded during registration.
		*self.0.element_type.borrow_mut() = Some(element_type.clone());
		if let Err(err) = custom_elements.define(element_type) {
			self.0.element_type.borrow_mut().take();
			return Err(err.into());
		}
		Ok(())
	}

	pub fn bootstrap(&self) -> &BootstrapContext {
		&self.0.bootstrap
	}

	pub fn class(&self) -> &ComponentClass {
		&self.0.class
	}

	/// The registered element type.
	pub fn element_type(&self) -> Result<ElementType, Error> {
		self.0.element_type.borrow().clone().ok_or_else(|| UsageError::NotYetBuilt { what: "element type", hint: "when_ready" }.into())
	}

	pub fn tag_name(&self) -> Option<String> {
		self.0.element_type.borrow().as_ref().and_then(|element_type| element_type.tag_name.clone())
	}

	pub fn is_ready(&self) -> bool {
		matches!(self.0.outcome.latest(), Some(Ok(())))
	}

	/// Called once the element type is registered; right away when it is.
	pub fn when_ready(&self, receiver: impl FnOnce(&DefinitionContext) + 'static) -> Supply {
		let definition = Rc::downgrade(&self.0);
		self.0.outcome.once_event(move |outcome| {
			if let (Ok(()), Some(inner)) = (outcome, definition.upgrade()) {
				receiver(&DefinitionContext(inner));
			}
		})
	}

	/// Resolves once the element type is registered, or with the reason it never was.
	pub fn ready(&self) -> impl Future<Output = Result<(), Error>> + 'static {
		let outcome = self.0.outcome.next_event();
		async move { outcome.await.unwrap_or_else(|reason| Err(FeatureError::failed(reason.to_string()).into())) }
	}

	/// Receives every component context created from now on.
	pub fn when_component(&self, receiver: impl FnMut(&ComponentContext) + 'static) -> Supply {
		self.0.components.on(receiver)
	}

	/// Binds a new component to an existing element, outside of the host's upgrade.
	///
	/// The component settles right away and connects when the element is connected.
	pub fn mount_to(&self, element: &ElementHandle) -> Result<ComponentMount, Error> {
		let context = ComponentContext::create(self, element, true)?;
		context.settle()?;
		if element.is_connected() {
			context.connect();
		}
		Ok(ComponentMount::new(context))
	}

	pub(crate) fn per_definition_registry(&self) -> &ContextRegistry<DefinitionContext> {
		&self.0.per_definition
	}

	pub(crate) fn per_component_registry(&self) -> &ContextRegistry<ComponentContext> {
		&self.0.per_component
	}

	pub(crate) fn component_registry(&self) -> &ContextRegistry<ComponentContext> {
		&self.0.component_registry
	}

	pub(crate) fn component_ready(&self, component: &ComponentContext) {
		self.0.components.send(component.clone());
	}

	fn from_weak(inner: &Weak<DefinitionInner>) -> Option<Self> {
		inner.upgrade().map(Self)
	}
}

impl ContextValues for DefinitionContext {
	fn values(&self) -> &Values<Self> {
		&self.0.values
	}
}

impl PartialEq for DefinitionContext {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for DefinitionContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DefinitionContext")
			.field("component", &self.0.class.name())
			.field("tag_name", &self.tag_name())
			.field("ready", &self.is_ready())
			.finish()
	}
}
