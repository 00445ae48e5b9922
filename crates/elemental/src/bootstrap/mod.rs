//! Bootstrap: the root of a component object graph.
//!
//! [`bootstrap_components`] (or [`Bootstrap::start`]) loads the requested
//! features synchronously, then initializes them on the caller's executor. The
//! bootstrap becomes ready once every requested feature finished `init`.
//! A component definition is finalized once both its feature finished `init`
//! and the bootstrap is ready.
//!
//! Several bootstraps may coexist; nothing here is global.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::sync::LazyLock;

use elemental_context::{ContextRegistry, ContextValueSpec, ContextValues, SingleKey, Values};
use elemental_supply::{EventChannel, Supply, ValueTracker};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::task::{LocalSpawn, LocalSpawnExt};
use rustc_hash::FxHashMap;

use crate::component::{ComponentClass, ComponentContext};
use crate::config::BootstrapConfig;
use crate::definition::{DefinitionContext, DefinitionSetup};
use crate::error::{Error, FeatureError};
use crate::feature::{ClassId, FeatureClass, FeatureRef, FeatureRegistry, FeatureRequest};
use crate::host::{CustomElements, MemoryCustomElements};
use crate::naming::NamespaceAliaser;

static BOOTSTRAP: LazyLock<SingleKey<BootstrapContext>> = LazyLock::new(|| SingleKey::new("bootstrap-context"));

/// The custom element registry components are defined in.
pub static CUSTOM_ELEMENTS: LazyLock<SingleKey<Rc<dyn CustomElements>>> = LazyLock::new(|| SingleKey::new("custom-elements"));

/// Assigns namespace aliases for namespaced element names.
pub static NAMESPACE_ALIASER: LazyLock<SingleKey<NamespaceAliaser>> = LazyLock::new(|| SingleKey::new("namespace-aliaser"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStage {
	/// Features are initializing.
	Init,
	Ready,
	/// A feature failed to initialize; the bootstrap never becomes ready.
	Failed(FeatureError),
}

struct BootstrapInner {
	config: BootstrapConfig,
	spawner: Rc<dyn LocalSpawn>,
	values: Values<BootstrapContext>,
	per_definition: ContextRegistry<DefinitionContext>,
	per_component: ContextRegistry<ComponentContext>,
	features: FeatureRegistry,
	stage: ValueTracker<BootstrapStage>,
	outcome: EventChannel<Result<(), FeatureError>>,
	definitions: RefCell<FxHashMap<ClassId, DefinitionContext>>,
	pending: RefCell<Vec<DefinitionContext>>,
	setups: RefCell<FxHashMap<ClassId, EventChannel<DefinitionSetup>>>,
	/// Fires once the definition of a class exists.
	created: RefCell<FxHashMap<ClassId, EventChannel<DefinitionContext>>>,
	on_definition: EventChannel<DefinitionContext>,
	on_component: EventChannel<ComponentContext>,
	/// Uses held by the bootstrap itself: the root feature and defined components.
	held: RefCell<Vec<FeatureRequest>>,
}

/// Bootstrap-wide context. Never destroyed; cloning yields the same context.
#[derive(Clone)]
pub struct BootstrapContext(Rc<BootstrapInner>);

#[derive(Clone)]
pub(crate) struct WeakBootstrap(Weak<BootstrapInner>);

impl WeakBootstrap {
	pub(crate) fn upgrade(&self) -> Option<BootstrapContext> {
		self.0.upgrade().map(BootstrapContext)
	}
}

impl BootstrapContext {
	/// Key resolving to the bootstrap context itself.
	pub fn key() -> &'static SingleKey<BootstrapContext> {
		&BOOTSTRAP
	}

	fn new(config: BootstrapConfig, spawner: Rc<dyn LocalSpawn>, custom_elements: Rc<dyn CustomElements>) -> Self {
		let registry = ContextRegistry::new();
		let aliaser = NamespaceAliaser::new(config.naming.aliases.clone());
		let context = Self(Rc::new(BootstrapInner {
			config,
			spawner,
			values: registry.new_values(),
			per_definition: ContextRegistry::new(),
			per_component: ContextRegistry::new(),
			features: FeatureRegistry::default(),
			stage: ValueTracker::new(BootstrapStage::Init),
			outcome: EventChannel::once(),
			definitions: RefCell::default(),
			pending: RefCell::default(),
			setups: RefCell::default(),
			created: RefCell::default(),
			on_definition: EventChannel::multicast(),
			on_component: EventChannel::multicast(),
			held: RefCell::default(),
		}));
		registry.provide_self(&*BOOTSTRAP);
		registry.provide(ContextValueSpec::is(&*CUSTOM_ELEMENTS, custom_elements));
		registry.provide(ContextValueSpec::is(&*NAMESPACE_ALIASER, aliaser));
		context
	}

	pub(crate) fn downgrade(&self) -> WeakBootstrap {
		WeakBootstrap(Rc::downgrade(&self.0))
	}

	pub fn config(&self) -> &BootstrapConfig {
		&self.0.config
	}

	pub fn stage(&self) -> BootstrapStage {
		self.0.stage.get()
	}

	pub fn read_stage(&self, receiver: impl FnMut(&BootstrapStage) + 'static) -> Supply {
		self.0.stage.read(receiver)
	}

	pub fn is_ready(&self) -> bool {
		self.stage() == BootstrapStage::Ready
	}

	pub fn custom_elements(&self) -> Result<Rc<dyn CustomElements>, Error> {
		Ok(self.get(&*CUSTOM_ELEMENTS)?)
	}

	pub fn namespace_aliaser(&self) -> Result<NamespaceAliaser, Error> {
		Ok(self.get(&*NAMESPACE_ALIASER)?)
	}

	/// Called once the bootstrap is ready; right away when it is. Never called
	/// when initialization fails.
	pub fn when_ready(&self, receiver: impl FnOnce(&BootstrapContext) + 'static) -> Supply {
		let bootstrap = self.downgrade();
		self.0.outcome.once_event(move |outcome| {
			if let (Ok(()), Some(bootstrap)) = (outcome, bootstrap.upgrade()) {
				receiver(&bootstrap);
			}
		})
	}

	/// Resolves once the bootstrap is ready, or with the initialization failure.
	pub fn ready(&self) -> impl Future<Output = Result<(), Error>> + 'static {
		let outcome = self.0.outcome.next_event();
		async move {
			match outcome.await {
				Ok(result) => result.map_err(Error::from),
				Err(reason) => Err(FeatureError::failed(reason.to_string()).into()),
			}
		}
	}

	/// Defines a component, loading its feature first when nobody requested it yet.
	///
	/// The element type is built once the component's feature finished `init`
	/// and the bootstrap is ready.
	pub fn define(&self, component: &ComponentClass) -> Result<DefinitionContext, Error> {
		if let Some(definition) = self.definition_of(component) {
			return Ok(definition);
		}
		let init = match self.0.features.loader_of(component) {
			Some(loader) => loader.initialized(self),
			None => {
				let request = self.0.features.request(self, component)?;
				let init = request.initialized(self);
				self.0.held.borrow_mut().push(request);
				init
			}
		};
		let definition = self.create_definition(component)?;

		let bootstrap = self.downgrade();
		let scheduled = definition.clone();
		if let Err(err) = self.spawn(component, async move {
			let outcome = init.await;
			if let Some(bootstrap) = bootstrap.upgrade() {
				bootstrap.schedule(&scheduled, outcome);
			}
		}) {
			definition.abort(err.clone());
			return Err(err);
		}
		Ok(definition)
	}

	/// Resolves with the definition once its element type is registered with the host.
	///
	/// Only waits: a component nobody defines keeps this pending.
	pub fn when_defined(&self, component: &ComponentClass) -> LocalBoxFuture<'static, Result<DefinitionContext, Error>> {
		let bootstrap = self.clone();
		let created = self.definitions_of(component).next_event();
		async move {
			bootstrap.ready().await?;
			let definition = created.await.map_err(|reason| FeatureError::failed(reason.to_string()))?;
			definition.ready().await?;
			if let Some(tag) = definition.tag_name() {
				bootstrap.custom_elements()?.when_defined(&tag).await?;
			}
			Ok(definition)
		}
		.boxed_local()
	}

	/// Loads a feature on demand. It stays loaded while the returned reference lives.
	pub fn load(&self, feature: &FeatureClass) -> Result<FeatureRef, Error> {
		let request = self.0.features.request(self, feature)?;
		let init = request.initialized(self);
		self.spawn(feature, async move {
			let _ = init.await;
		})?;
		Ok(FeatureRef::new(feature.clone(), request))
	}

	/// Receives every definition context created from now on.
	pub fn on_definition(&self, receiver: impl FnMut(&DefinitionContext) + 'static) -> Supply {
		self.0.on_definition.on(receiver)
	}

	/// Receives every component context created from now on.
	pub fn on_component(&self, receiver: impl FnMut(&ComponentContext) + 'static) -> Supply {
		self.0.on_component.on(receiver)
	}

	/// Receives the setup of `component`'s definition, now if it exists already.
	pub fn setup_definition(&self, component: &ComponentClass, receiver: impl FnMut(&DefinitionSetup) + 'static) -> Supply {
		self.setup_channel(component.id()).on(receiver)
	}

	/// Number of loaded features.
	pub fn feature_count(&self) -> usize {
		self.0.features.len()
	}

	pub(crate) fn registry(&self) -> &ContextRegistry<BootstrapContext> {
		self.0.values.registry()
	}

	pub(crate) fn per_definition_registry(&self) -> &ContextRegistry<DefinitionContext> {
		&self.0.per_definition
	}

	pub(crate) fn per_component_registry(&self) -> &ContextRegistry<ComponentContext> {
		&self.0.per_component
	}

	pub(crate) fn features(&self) -> &FeatureRegistry {
		&self.0.features
	}

	/// The definition of `component`, created on first call, scheduled for
	/// finalization. Called once the component's feature finished `init`.
	pub(crate) fn ensure_definition(&self, component: &ComponentClass) -> Result<DefinitionContext, Error> {
		let definition = match self.definition_of(component) {
			Some(definition) => definition,
			None => self.create_definition(component)?,
		};
		self.schedule(&definition, Ok(()));
		Ok(definition)
	}

	fn definition_of(&self, component: &ComponentClass) -> Option<DefinitionContext> {
		self.0.definitions.borrow().get(&component.id()).cloned()
	}

	fn create_definition(&self, component: &ComponentClass) -> Result<DefinitionContext, Error> {
		let definition = DefinitionContext::new(self, component);
		self.0.definitions.borrow_mut().insert(component.id(), definition.clone());
		if let Err(err) = definition.set_up() {
			self.0.definitions.borrow_mut().remove(&component.id());
			return Err(err);
		}
		self.definitions_of(component).send(definition.clone());
		Ok(definition)
	}

	/// Finalizes `definition` now when the bootstrap is ready, at readiness
	/// otherwise. Fails it when initialization failed.
	fn schedule(&self, definition: &DefinitionContext, init: Result<(), FeatureError>) {
		match (init, self.stage()) {
			(Err(err), _) | (Ok(()), BootstrapStage::Failed(err)) => definition.abort(err.into()),
			(Ok(()), BootstrapStage::Ready) => {
				// Failures are reported through the definition's own readiness.
				let _ = definition.finalize();
			}
			(Ok(()), BootstrapStage::Init) => {
				let mut pending = self.0.pending.borrow_mut();
				if !pending.contains(definition) {
					pending.push(definition.clone());
				}
			}
		}
	}

	pub(crate) fn definition_created(&self, definition: &DefinitionContext, setup: DefinitionSetup) {
		self.setup_channel(definition.class().id()).send(setup);
		self.0.on_definition.send(definition.clone());
	}

	pub(crate) fn component_created(&self, component: &ComponentContext) {
		self.0.on_component.send(component.clone());
	}

	fn setup_channel(&self, class: ClassId) -> EventChannel<DefinitionSetup> {
		self.0.setups.borrow_mut().entry(class).or_insert_with(EventChannel::replay).clone()
	}

	fn definitions_of(&self, component: &ComponentClass) -> EventChannel<DefinitionContext> {
		self.0.created.borrow_mut().entry(component.id()).or_insert_with(EventChannel::once).clone()
	}

	fn spawn(&self, feature: &FeatureClass, task: impl Future<Output = ()> + 'static) -> Result<(), Error> {
		self.0.spawner.spawn_local(task).map_err(|err| {
			tracing::error!(feature = feature.name(), error = %err, "feature.spawn_failed");
			FeatureError::Spawn { feature: feature.name().to_string() }.into()
		})
	}

	fn complete(&self, outcome: Result<(), FeatureError>) {
		match &outcome {
			Ok(()) => {
				tracing::debug!(features = self.feature_count(), "bootstrap.ready");
				self.0.stage.set(BootstrapStage::Ready);
				let pending = std::mem::take(&mut *self.0.pending.borrow_mut());
				for definition in pending {
					// Failures are reported through the definition's own readiness.
					let _ = definition.finalize();
				}
			}
			Err(err) => {
				tracing::error!(error = %err, "bootstrap.failed");
				self.0.stage.set(BootstrapStage::Failed(err.clone()));
				let pending = std::mem::take(&mut *self.0.pending.borrow_mut());
				for definition in pending {
					definition.abort(err.clone().into());
				}
			}
		}
		self.0.outcome.send(outcome);
	}
}

impl ContextValues for BootstrapContext {
	fn values(&self) -> &Values<Self> {
		&self.0.values
	}
}

impl PartialEq for BootstrapContext {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for BootstrapContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BootstrapContext")
			.field("stage", &self.stage())
			.field("features", &self.feature_count())
			.field("definitions", &self.0.definitions.borrow().len())
			.finish()
	}
}

/// Configures and starts a bootstrap.
pub struct Bootstrap {
	spawner: Rc<dyn LocalSpawn>,
	config: BootstrapConfig,
	custom_elements: Option<Rc<dyn CustomElements>>,
}

impl Bootstrap {
	/// A bootstrap initializing features on `spawner`.
	pub fn new(spawner: impl LocalSpawn + 'static) -> Self {
		Self { spawner: Rc::new(spawner), config: BootstrapConfig::default(), custom_elements: None }
	}

	pub fn config(mut self, config: BootstrapConfig) -> Self {
		self.config = config;
		self
	}

	/// Host registry to define elements in. Defaults to a fresh [`MemoryCustomElements`].
	pub fn custom_elements(mut self, custom_elements: Rc<dyn CustomElements>) -> Self {
		self.custom_elements = Some(custom_elements);
		self
	}

	/// Loads `features` and spawns their initialization.
	///
	/// Several features are bootstrapped through an aggregate feature needing them
	/// all, so they initialize in the given order.
	pub fn start(self, features: &[FeatureClass]) -> Result<BootstrapContext, Error> {
		let custom_elements = self.custom_elements.unwrap_or_else(|| MemoryCustomElements::new() as Rc<dyn CustomElements>);
		let bootstrap = BootstrapContext::new(self.config, self.spawner, custom_elements);

		let root = match features {
			[feature] => feature.clone(),
			features => features.iter().fold(FeatureClass::builder("bootstrap"), |root, feature| root.needs(feature)).build(),
		};
		tracing::debug!(root = root.name(), features = features.len(), "bootstrap.start");

		let request = bootstrap.0.features.request(&bootstrap, &root)?;
		let init = request.initialized(&bootstrap);
		bootstrap.0.held.borrow_mut().push(request);

		let weak = bootstrap.downgrade();
		bootstrap.spawn(&root, async move {
			let outcome = init.await;
			if let Some(bootstrap) = weak.upgrade() {
				bootstrap.complete(outcome);
			}
		})?;
		Ok(bootstrap)
	}
}

impl fmt::Debug for Bootstrap {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Bootstrap").field("config", &self.config).finish_non_exhaustive()
	}
}

/// Bootstraps `features` with default configuration and an in-memory host.
pub fn bootstrap_components(spawner: impl LocalSpawn + 'static, features: &[FeatureClass]) -> Result<BootstrapContext, Error> {
	Bootstrap::new(spawner).start(features)
}

#[cfg(test)]
mod tests;
