use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use elemental_supply::{Supply, ValueTracker};
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{BootstrapSetup, ClassId, FeatureClass, FeatureContext, FeaturePhase};
use crate::bootstrap::{BootstrapContext, WeakBootstrap};
use crate::error::{ConfigError, Error, FeatureError};
use crate::naming::validate_tag_name;

pub(crate) type InitFuture = Shared<LocalBoxFuture<'static, Result<(), FeatureError>>>;

/// Loaded features of one bootstrap, keyed by class identity.
#[derive(Default)]
pub(crate) struct FeatureRegistry {
	loaders: RefCell<FxHashMap<ClassId, Rc<FeatureLoader>>>,
	/// Provided class to providing class, from `has` clauses of loaded features.
	providers: RefCell<FxHashMap<ClassId, FeatureClass>>,
}

impl FeatureRegistry {
	/// Requests a feature, loading it and everything it needs on first request.
	///
	/// Fails without side effects on a dependency cycle or a failing `setup`.
	pub(crate) fn request(&self, bootstrap: &BootstrapContext, feature: &FeatureClass) -> Result<FeatureRequest, Error> {
		check_cycles(feature)?;
		self.acquire(bootstrap, feature)
	}

	/// The loader that satisfies requests for `feature`, if loaded.
	pub(crate) fn loader_of(&self, feature: &FeatureClass) -> Option<Rc<FeatureLoader>> {
		let target = self.provider_of(feature);
		self.loaders.borrow().get(&target.id()).cloned()
	}

	pub(crate) fn len(&self) -> usize {
		self.loaders.borrow().len()
	}

	fn provider_of(&self, feature: &FeatureClass) -> FeatureClass {
		self.providers.borrow().get(&feature.id()).cloned().unwrap_or_else(|| feature.clone())
	}

	fn acquire(&self, bootstrap: &BootstrapContext, feature: &FeatureClass) -> Result<FeatureRequest, Error> {
		let target = self.provider_of(feature);
		let existing = self.loaders.borrow().get(&target.id()).cloned();
		if let Some(loader) = existing {
			loader.uses.set(loader.uses.get() + 1);
			tracing::trace!(feature = target.name(), uses = loader.uses.get(), "feature.request");
			return Ok(FeatureRequest::new(loader, bootstrap));
		}

		let loader = Rc::new(FeatureLoader::new(target.clone()));
		loader.uses.set(1);
		self.loaders.borrow_mut().insert(target.id(), Rc::clone(&loader));
		{
			let mut providers = self.providers.borrow_mut();
			for provided in target.def().has() {
				providers.insert(provided.id(), target.clone());
			}
		}
		tracing::debug!(feature = target.name(), "feature.load");

		// Dropping `request` on error unloads whatever was loaded so far.
		let request = FeatureRequest::new(Rc::clone(&loader), bootstrap);
		for need in target.def().needs() {
			if self.provider_of(&need) == target {
				continue;
			}
			let need = self.acquire(bootstrap, &need)?;
			loader.needs.borrow_mut().push(need);
		}
		loader.setup(bootstrap)?;
		Ok(request)
	}

	fn release(&self, loader: &Rc<FeatureLoader>) {
		if !loader.release() {
			return;
		}
		{
			let mut loaders = self.loaders.borrow_mut();
			if loaders.get(&loader.class.id()).is_some_and(|current| Rc::ptr_eq(current, loader)) {
				loaders.remove(&loader.class.id());
			}
		}
		self.providers.borrow_mut().retain(|_, provider| *provider != loader.class);
		loader.unload();
	}
}

impl fmt::Debug for FeatureRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FeatureRegistry").field("loaded", &self.len()).finish()
	}
}

/// Rejects features whose static `needs` graph loops back onto itself.
fn check_cycles(root: &FeatureClass) -> Result<(), ConfigError> {
	fn visit(class: &FeatureClass, path: &mut Vec<FeatureClass>, done: &mut FxHashSet<ClassId>) -> Result<(), ConfigError> {
		if let Some(start) = path.iter().position(|seen| seen == class) {
			let mut cycle: Vec<String> = path[start..].iter().map(|c| c.name().to_string()).collect();
			cycle.push(class.name().to_string());
			tracing::warn!(cycle = ?cycle, "feature.cycle");
			return Err(ConfigError::DependencyCycle { path: cycle });
		}
		if done.contains(&class.id()) {
			return Ok(());
		}
		path.push(class.clone());
		for need in class.def().needs() {
			visit(&need, path, done)?;
		}
		path.pop();
		done.insert(class.id());
		Ok(())
	}

	visit(root, &mut Vec::new(), &mut FxHashSet::default())
}

pub(crate) struct FeatureLoader {
	class: FeatureClass,
	supply: Supply,
	uses: Cell<usize>,
	needs: RefCell<Vec<FeatureRequest>>,
	phase: ValueTracker<FeaturePhase>,
	init: RefCell<Option<InitFuture>>,
}

impl FeatureLoader {
	fn new(class: FeatureClass) -> Self {
		Self {
			class,
			supply: Supply::new(),
			uses: Cell::new(0),
			needs: RefCell::default(),
			phase: ValueTracker::new(FeaturePhase::Pending),
			init: RefCell::new(None),
		}
	}

	pub(crate) fn class(&self) -> &FeatureClass {
		&self.class
	}

	pub(crate) fn phase(&self) -> &ValueTracker<FeaturePhase> {
		&self.phase
	}

	/// Registers the declared values and runs `setup` callbacks.
	fn setup(&self, bootstrap: &BootstrapContext) -> Result<(), Error> {
		let def = self.class.def();
		for spec in &def.set {
			self.supply.cuts(&bootstrap.registry().provide(spec.clone()));
		}
		for spec in &def.per_definition {
			self.supply.cuts(&bootstrap.per_definition_registry().provide(spec.clone()));
		}
		for spec in &def.per_component {
			self.supply.cuts(&bootstrap.per_component_registry().provide(spec.clone()));
		}

		if let Some(component) = self.class.component_def()
			&& let Some(name) = &component.name
		{
			let tag = bootstrap.namespace_aliaser()?.tag_name(name);
			if bootstrap.config().elements.strict_tag_names {
				validate_tag_name(&tag)?;
			}
		}

		let setup = BootstrapSetup::new(bootstrap.clone(), self.class.clone(), self.supply.clone());
		for callback in &def.setup {
			callback(&setup)?;
		}
		Ok(())
	}

	/// Shared initialization of this feature, started on first call.
	pub(crate) fn initialized(self: &Rc<Self>, bootstrap: &BootstrapContext) -> InitFuture {
		if let Some(init) = self.init.borrow().as_ref() {
			return init.clone();
		}
		let init = run_init(self.class.clone(), Rc::downgrade(self), bootstrap.downgrade()).boxed_local().shared();
		*self.init.borrow_mut() = Some(init.clone());
		init
	}

	fn need_inits(&self, bootstrap: &BootstrapContext) -> Vec<InitFuture> {
		self.needs.borrow().iter().map(|need| need.loader.initialized(bootstrap)).collect()
	}

	fn finish(&self, result: &Result<(), FeatureError>) {
		if self.phase.get() != FeaturePhase::Pending {
			return;
		}
		match result {
			Ok(()) => {
				tracing::debug!(feature = self.class.name(), "feature.ready");
				self.phase.set(FeaturePhase::Ready);
			}
			Err(err) => {
				tracing::error!(feature = self.class.name(), error = %err, "feature.init_failed");
				self.phase.set(FeaturePhase::Failed(err.clone()));
			}
		}
	}

	/// Drops one use. Returns `true` when this was the last one.
	fn release(&self) -> bool {
		let uses = self.uses.get().saturating_sub(1);
		self.uses.set(uses);
		uses == 0
	}

	fn unload(&self) {
		tracing::debug!(feature = self.class.name(), "feature.unload");
		self.supply.off();
		let needs = std::mem::take(&mut *self.needs.borrow_mut());
		drop(needs);
		self.phase.set(FeaturePhase::Down);
	}
}

async fn run_init(class: FeatureClass, loader: Weak<FeatureLoader>, bootstrap: WeakBootstrap) -> Result<(), FeatureError> {
	let result = init_steps(&class, &loader, &bootstrap).await;
	if let Some(loader) = loader.upgrade() {
		loader.finish(&result);
	}
	result
}

async fn init_steps(class: &FeatureClass, loader: &Weak<FeatureLoader>, bootstrap: &WeakBootstrap) -> Result<(), FeatureError> {
	let unloaded = || FeatureError::Unloaded { feature: class.name().to_string() };
	let init_error = |err: Error| FeatureError::Init { feature: class.name().to_string(), message: err.to_string() };

	let needs = match (loader.upgrade(), bootstrap.upgrade()) {
		(Some(loader), Some(bootstrap)) => loader.need_inits(&bootstrap),
		_ => return Err(unloaded()),
	};
	for need in needs {
		need.await?;
	}

	tracing::debug!(feature = class.name(), "feature.init");
	for init in &class.def().init {
		let context = match (loader.upgrade(), bootstrap.upgrade()) {
			(Some(loader), Some(bootstrap)) if !loader.supply.is_off() => {
				FeatureContext::new(BootstrapSetup::new(bootstrap, class.clone(), loader.supply.clone()))
			}
			_ => return Err(unloaded()),
		};
		init(context).await.map_err(init_error)?;
	}

	if let Some(component) = class.as_component() {
		let bootstrap = bootstrap.upgrade().ok_or_else(unloaded)?;
		bootstrap.ensure_definition(&component).map_err(init_error)?;
	}
	Ok(())
}

/// A counted use of a loaded feature. Dropping the last one unloads it.
pub(crate) struct FeatureRequest {
	loader: Rc<FeatureLoader>,
	bootstrap: WeakBootstrap,
}

impl FeatureRequest {
	fn new(loader: Rc<FeatureLoader>, bootstrap: &BootstrapContext) -> Self {
		Self { loader, bootstrap: bootstrap.downgrade() }
	}

	pub(crate) fn loader(&self) -> &Rc<FeatureLoader> {
		&self.loader
	}

	pub(crate) fn initialized(&self, bootstrap: &BootstrapContext) -> InitFuture {
		self.loader.initialized(bootstrap)
	}
}

impl Drop for FeatureRequest {
	fn drop(&mut self) {
		match self.bootstrap.upgrade() {
			Some(bootstrap) => bootstrap.features().release(&self.loader),
			None => {
				if self.loader.release() {
					self.loader.unload();
				}
			}
		}
	}
}

impl fmt::Debug for FeatureRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FeatureRequest").field("feature", &self.loader.class).field("uses", &self.loader.uses.get()).finish()
	}
}
