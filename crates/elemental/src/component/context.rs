use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::LazyLock;

use elemental_context::{ContextRegistry, ContextValueSpec, ContextValues, SingleKey, Values};
use elemental_supply::{EventChannel, OffReason, Supply, ValueTracker};

use super::ComponentClass;
use super::state::STATE_UPDATER;
use super::status::ComponentStatus;
use crate::definition::DefinitionContext;
use crate::error::{Error, UsageError};
use crate::host::{ElementHandle, HostElement};

static COMPONENT: LazyLock<SingleKey<ComponentContext>> = LazyLock::new(|| SingleKey::new("component-context"));

/// An observed attribute change forwarded by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
	pub name: Rc<str>,
	pub old: Option<Rc<str>>,
	pub new: Option<Rc<str>>,
}

struct ComponentInner {
	definition: DefinitionContext,
	element: Weak<dyn HostElement>,
	local_name: String,
	values: Values<ComponentContext>,
	registry: ContextRegistry<ComponentContext>,
	supply: Supply,
	component: RefCell<Option<Rc<dyn Any>>>,
	constructing: Cell<bool>,
	status: ValueTracker<ComponentStatus>,
	ready: EventChannel<()>,
	settled: EventChannel<()>,
	connected: EventChannel<()>,
	disconnected: EventChannel<()>,
	destroyed: EventChannel<OffReason>,
	attributes: EventChannel<AttributeChange>,
}

/// Context of one component instance.
///
/// Owned by its element (see [`ComponentContext::of`]); refers to the element weakly.
/// Cloning is cheap and yields the same context.
#[derive(Clone)]
pub struct ComponentContext(Rc<ComponentInner>);

impl ComponentContext {
	/// Key resolving to the consuming component context.
	pub fn key() -> &'static SingleKey<ComponentContext> {
		&COMPONENT
	}

	/// The context bound to `element`, destroyed or not.
	pub fn of(element: &dyn HostElement) -> Option<ComponentContext> {
		element.slot().get()
	}

	/// Creates the context of `element` and its component instance.
	///
	/// `mounted` contexts are created outside of the element constructor and may
	/// settle right away.
	pub(crate) fn create(definition: &DefinitionContext, element: &ElementHandle, mounted: bool) -> Result<ComponentContext, Error> {
		if let Some(existing) = element.slot().get()
			&& !existing.status().is_destroyed()
		{
			return Err(UsageError::AlreadyBound { element: element.local_name().to_string() }.into());
		}

		let registry = ContextRegistry::new().chain(definition.component_registry()).with_parent(definition.clone());
		let context = ComponentContext(Rc::new(ComponentInner {
			definition: definition.clone(),
			element: Rc::downgrade(element),
			local_name: element.local_name().to_string(),
			values: registry.new_values(),
			registry,
			supply: Supply::new(),
			component: RefCell::new(None),
			constructing: Cell::new(!mounted),
			status: ValueTracker::new(ComponentStatus::Constructed),
			ready: EventChannel::replay(),
			settled: EventChannel::replay(),
			connected: EventChannel::replay(),
			disconnected: EventChannel::multicast(),
			destroyed: EventChannel::once(),
			attributes: EventChannel::multicast(),
		}));
		context.0.registry.provide_self(&*COMPONENT);

		let weak = Rc::downgrade(&context.0);
		context.0.supply.when_off(move |reason| {
			if let Some(inner) = weak.upgrade() {
				ComponentContext(inner).tear_down(reason);
			}
		});

		element.slot().bind(context.clone());
		tracing::trace!(element = %context.0.local_name, mounted, "component.create");
		definition.bootstrap().component_created(&context);

		let component = match definition.class().component_def().instantiate(&context) {
			Ok(component) => component,
			Err(err) => {
				tracing::error!(element = %context.0.local_name, error = %err, "component.factory_failed");
				context.destroy(OffReason::aborted(err.to_string()));
				return Err(err);
			}
		};
		*context.0.component.borrow_mut() = Some(component);
		context.transition(ComponentStatus::Ready);
		context.0.ready.send(());
		definition.component_ready(&context);
		context.0.constructing.set(false);
		Ok(context)
	}

	pub fn definition(&self) -> &DefinitionContext {
		&self.0.definition
	}

	/// The component class this context instantiates.
	pub fn component_type(&self) -> &ComponentClass {
		self.0.definition.class()
	}

	/// The element, while it is alive.
	pub fn element(&self) -> Option<ElementHandle> {
		self.0.element.upgrade()
	}

	pub fn local_name(&self) -> &str {
		&self.0.local_name
	}

	/// Cut off when the component is destroyed.
	pub fn supply(&self) -> &Supply {
		&self.0.supply
	}

	pub fn status(&self) -> ComponentStatus {
		self.0.status.get()
	}

	/// Receives the current status, then every transition.
	pub fn read_status(&self, receiver: impl FnMut(&ComponentStatus) + 'static) -> Supply {
		self.0.status.read(receiver)
	}

	pub fn connected(&self) -> bool {
		self.status().is_connected()
	}

	/// The component instance.
	pub fn component(&self) -> Result<Rc<dyn Any>, Error> {
		if let Some(component) = self.0.component.borrow().as_ref() {
			return Ok(Rc::clone(component));
		}
		if self.status().is_destroyed() {
			return Err(self.destroyed_error());
		}
		Err(UsageError::NotYetBuilt { what: "component", hint: "when_ready" }.into())
	}

	/// The component instance, downcast to its concrete type.
	pub fn component_as<T: 'static>(&self) -> Result<Rc<T>, Error> {
		self.component()?.downcast::<T>().map_err(|_| UsageError::ComponentType { expected: std::any::type_name::<T>() }.into())
	}

	/// Provides a component-local context value, removed on destruction.
	pub fn provide(&self, spec: ContextValueSpec<ComponentContext>) -> Result<Supply, Error> {
		self.ensure_alive()?;
		let registration = self.0.registry.provide(spec);
		self.0.supply.cuts(&registration);
		Ok(registration)
	}

	/// Marks the component settled, unless it is not ready yet, already settled,
	/// or its element constructor is still running.
	pub fn settle(&self) -> Result<(), Error> {
		self.ensure_alive()?;
		if self.status() == ComponentStatus::Ready && !self.0.constructing.get() {
			self.mark_settled();
		}
		Ok(())
	}

	/// Connects the component, settling it first when needed.
	pub(crate) fn connect(&self) {
		match self.status() {
			ComponentStatus::Destroyed | ComponentStatus::Connected => {}
			ComponentStatus::Constructed => {
				tracing::warn!(element = %self.0.local_name, "component.connect_before_ready");
			}
			ComponentStatus::Ready => {
				self.mark_settled();
				self.mark_connected();
			}
			ComponentStatus::Settled | ComponentStatus::Disconnected => self.mark_connected(),
		}
	}

	pub(crate) fn disconnect(&self) {
		if self.status() != ComponentStatus::Connected {
			return;
		}
		self.transition(ComponentStatus::Disconnected);
		self.0.connected.clear();
		self.0.disconnected.send(());
	}

	/// Destroys the component. Idempotent; the first reason wins.
	pub fn destroy(&self, reason: OffReason) {
		self.0.supply.off_with(reason);
	}

	fn mark_settled(&self) {
		self.transition(ComponentStatus::Settled);
		self.0.settled.send(());
	}

	fn mark_connected(&self) {
		self.transition(ComponentStatus::Connected);
		self.0.connected.send(());
	}

	fn tear_down(&self, reason: &OffReason) {
		self.disconnect();
		self.transition(ComponentStatus::Destroyed);
		tracing::debug!(element = %self.0.local_name, reason = %reason, "component.destroy");

		self.0.component.borrow_mut().take();
		self.0.values.clear();
		self.0.destroyed.send(reason.clone());

		self.0.ready.close(reason.clone());
		self.0.settled.close(reason.clone());
		self.0.connected.close(reason.clone());
		self.0.disconnected.close(reason.clone());
		self.0.attributes.close(reason.clone());
		self.0.status.close(reason.clone());
	}

	fn transition(&self, status: ComponentStatus) {
		let current = self.0.status.get();
		if current.is_destroyed() || status.rank() < current.rank() {
			tracing::warn!(element = %self.0.local_name, from = %current, to = %status, "component.status_rejected");
			return;
		}
		let from = self.0.status.set(status);
		if from != status {
			tracing::trace!(element = %self.0.local_name, %from, to = %status, "component.status");
		}
	}

	fn ensure_alive(&self) -> Result<(), Error> {
		if self.0.supply.is_off() {
			return Err(self.destroyed_error());
		}
		Ok(())
	}

	fn destroyed_error(&self) -> Error {
		UsageError::Destroyed { element: self.0.local_name.clone() }.into()
	}

	/// Wraps a receiver so that channels owned by this context do not keep it alive.
	fn receiver<E: 'static>(&self, mut receiver: impl FnMut(&ComponentContext) + 'static) -> impl FnMut(&E) + 'static {
		let context = Rc::downgrade(&self.0);
		move |_: &E| {
			if let Some(inner) = context.upgrade() {
				receiver(&ComponentContext(inner));
			}
		}
	}

	fn once_receiver<E: 'static>(&self, receiver: impl FnOnce(&ComponentContext) + 'static) -> impl FnOnce(&E) + 'static {
		let context = Rc::downgrade(&self.0);
		move |_: &E| {
			if let Some(inner) = context.upgrade() {
				receiver(&ComponentContext(inner));
			}
		}
	}

	/// Called every time the component is ready: now if it is.
	pub fn once_ready(&self, receiver: impl FnMut(&ComponentContext) + 'static) -> Supply {
		self.0.ready.on(self.receiver(receiver))
	}

	/// Called once, when the component is ready.
	pub fn when_ready(&self, receiver: impl FnOnce(&ComponentContext) + 'static) -> Supply {
		self.0.ready.once_event(self.once_receiver(receiver))
	}

	/// Called when the component settles: now if it did.
	pub fn once_settled(&self, receiver: impl FnMut(&ComponentContext) + 'static) -> Supply {
		self.0.settled.on(self.receiver(receiver))
	}

	/// Called once, when the component settles.
	pub fn when_settled(&self, receiver: impl FnOnce(&ComponentContext) + 'static) -> Supply {
		self.0.settled.once_event(self.once_receiver(receiver))
	}

	/// Called on every connection, including the current one.
	pub fn once_connected(&self, receiver: impl FnMut(&ComponentContext) + 'static) -> Supply {
		self.0.connected.on(self.receiver(receiver))
	}

	/// Called once, on the current or the next connection.
	pub fn when_connected(&self, receiver: impl FnOnce(&ComponentContext) + 'static) -> Supply {
		self.0.connected.once_event(self.once_receiver(receiver))
	}

	/// Called on every disconnection.
	pub fn on_disconnect(&self, receiver: impl FnMut(&ComponentContext) + 'static) -> Supply {
		self.0.disconnected.on(self.receiver(receiver))
	}

	/// Called with the reason once the component is destroyed; right away when it is.
	pub fn when_destroyed(&self, receiver: impl FnOnce(&OffReason) + 'static) -> Supply {
		self.0.destroyed.once_event(receiver)
	}

	pub fn on_attribute_changed(&self, receiver: impl FnMut(&AttributeChange) + 'static) -> Supply {
		self.0.attributes.on(receiver)
	}

	/// Forwards an observed attribute change to receivers and to the state updater.
	pub fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) {
		if self.0.supply.is_off() {
			return;
		}
		let change = AttributeChange { name: name.into(), old: old.map(Into::into), new: new.map(Into::into) };
		self.0.attributes.send(change.clone());
		self.update_state(&["attribute", name], &change.new, &change.old);
	}

	/// Reports a state change to the [`STATE_UPDATER`](super::STATE_UPDATER).
	pub fn update_state(&self, path: &[&str], new: &dyn Any, old: &dyn Any) {
		match self.get(&*STATE_UPDATER) {
			Ok(updater) => updater(path, new, old),
			Err(err) => tracing::warn!(element = %self.0.local_name, error = %err, "component.state_updater"),
		}
	}
}

impl ContextValues for ComponentContext {
	fn values(&self) -> &Values<Self> {
		&self.0.values
	}
}

impl PartialEq for ComponentContext {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for ComponentContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentContext").field("element", &self.0.local_name).field("status", &self.status()).finish()
	}
}

#[cfg(test)]
mod tests;
