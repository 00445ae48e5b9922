use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use elemental_supply::EventChannel;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use rustc_hash::FxHashMap;

use super::{CustomElements, ElementHandle, ElementSlot, ElementType, HostElement};
use crate::error::{Error, HostError};

/// A detached, headless element.
pub struct MemoryElement {
	local_name: String,
	connected: Cell<bool>,
	attributes: RefCell<BTreeMap<String, String>>,
	element_type: RefCell<Option<ElementType>>,
	slot: ElementSlot,
}

impl MemoryElement {
	pub fn new(local_name: impl Into<String>) -> Rc<Self> {
		Rc::new(Self {
			local_name: local_name.into(),
			connected: Cell::new(false),
			attributes: RefCell::default(),
			element_type: RefCell::new(None),
			slot: ElementSlot::default(),
		})
	}

	pub fn attribute(&self, name: &str) -> Option<String> {
		self.attributes.borrow().get(name).cloned()
	}

	/// Whether a custom element type has been attached to this element.
	pub fn is_upgraded(&self) -> bool {
		self.element_type.borrow().is_some()
	}

	/// Flips the connection flag without running any callback.
	pub fn set_connected(&self, connected: bool) {
		self.connected.set(connected);
	}

	fn handle(self: &Rc<Self>) -> ElementHandle {
		Rc::clone(self) as ElementHandle
	}
}

impl HostElement for MemoryElement {
	fn local_name(&self) -> &str {
		&self.local_name
	}

	fn is_connected(&self) -> bool {
		self.connected.get()
	}

	fn slot(&self) -> &ElementSlot {
		&self.slot
	}
}

impl fmt::Debug for MemoryElement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryElement")
			.field("local_name", &self.local_name)
			.field("connected", &self.connected.get())
			.field("upgraded", &self.is_upgraded())
			.finish()
	}
}

#[derive(Default)]
struct MemoryState {
	types: FxHashMap<String, ElementType>,
	pending: Vec<Weak<MemoryElement>>,
	defined: FxHashMap<String, EventChannel<()>>,
}

/// In-memory custom element registry and document.
///
/// Follows the browser's upgrade order: elements created before their tag is
/// defined are upgraded on definition; an upgrade constructs the component,
/// replays observed attributes, then connects if the element is connected.
#[derive(Default)]
pub struct MemoryCustomElements {
	state: RefCell<MemoryState>,
}

impl MemoryCustomElements {
	pub fn new() -> Rc<Self> {
		Rc::new(Self::default())
	}

	pub fn get(&self, tag: &str) -> Option<ElementType> {
		self.state.borrow().types.get(tag).cloned()
	}

	/// Creates an element, upgrading it right away if its tag is defined.
	pub fn create(&self, tag: &str) -> Result<Rc<MemoryElement>, Error> {
		let element = MemoryElement::new(tag);
		match self.get(tag) {
			Some(element_type) => upgrade(&element, element_type)?,
			None => self.state.borrow_mut().pending.push(Rc::downgrade(&element)),
		}
		Ok(element)
	}

	pub fn connect(&self, element: &Rc<MemoryElement>) {
		if element.connected.replace(true) {
			return;
		}
		let element_type = element.element_type.borrow().clone();
		if let Some(element_type) = element_type {
			element_type.callbacks.connected(&element.handle());
		}
	}

	pub fn disconnect(&self, element: &Rc<MemoryElement>) {
		if !element.connected.replace(false) {
			return;
		}
		let element_type = element.element_type.borrow().clone();
		if let Some(element_type) = element_type {
			element_type.callbacks.disconnected(&element.handle());
		}
	}

	/// Sets (`Some`) or removes (`None`) an attribute, notifying observed changes.
	pub fn set_attribute(&self, element: &Rc<MemoryElement>, name: &str, value: Option<&str>) {
		let old = match value {
			Some(value) => element.attributes.borrow_mut().insert(name.to_string(), value.to_string()),
			None => element.attributes.borrow_mut().remove(name),
		};
		if old.as_deref() == value {
			return;
		}
		let element_type = element.element_type.borrow().clone();
		if let Some(element_type) = element_type.filter(|t| t.observes(name)) {
			element_type.callbacks.attribute_changed(&element.handle(), name, old.as_deref(), value);
		}
	}
}

impl CustomElements for MemoryCustomElements {
	fn define(&self, element_type: ElementType) -> Result<(), HostError> {
		let Some(tag) = element_type.tag_name.clone() else {
			return Ok(());
		};
		let (waiting, defined) = {
			let mut state = self.state.borrow_mut();
			if state.types.contains_key(&tag) {
				return Err(HostError::AlreadyDefined { tag });
			}
			state.types.insert(tag.clone(), element_type.clone());

			let mut waiting = Vec::new();
			state.pending.retain(|pending| match pending.upgrade() {
				Some(element) if element.local_name == tag => {
					waiting.push(element);
					false
				}
				Some(_) => true,
				None => false,
			});
			(waiting, state.defined.entry(tag.clone()).or_insert_with(EventChannel::once).clone())
		};
		tracing::debug!(tag = %tag, upgrades = waiting.len(), "host.define");

		for element in waiting {
			if let Err(err) = upgrade(&element, element_type.clone()) {
				tracing::error!(tag = %tag, error = %err, "host.upgrade_failed");
			}
		}
		defined.send(());
		Ok(())
	}

	fn when_defined(&self, tag: &str) -> LocalBoxFuture<'static, Result<(), HostError>> {
		let defined = self.state.borrow_mut().defined.entry(tag.to_string()).or_insert_with(EventChannel::once).next_event();
		let tag = tag.to_string();
		async move { defined.await.map_err(|_| HostError::Dropped { tag }) }.boxed_local()
	}
}

impl fmt::Debug for MemoryCustomElements {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.borrow();
		f.debug_struct("MemoryCustomElements").field("types", &state.types.len()).field("pending", &state.pending.len()).finish()
	}
}

fn upgrade(element: &Rc<MemoryElement>, element_type: ElementType) -> Result<(), Error> {
	*element.element_type.borrow_mut() = Some(element_type.clone());
	let handle = element.handle();
	element_type.callbacks.construct(&handle)?;

	let observed: Vec<(String, String)> = element
		.attributes
		.borrow()
		.iter()
		.filter(|(name, _)| element_type.observes(name))
		.map(|(name, value)| (name.clone(), value.clone()))
		.collect();
	for (name, value) in observed {
		element_type.callbacks.attribute_changed(&handle, &name, None, Some(&value));
	}

	if element.is_connected() {
		element_type.callbacks.connected(&handle);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;

	use futures::executor::block_on;
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::host::ElementCallbacks;

	#[derive(Default)]
	struct Journal(RefCell<Vec<String>>);

	impl ElementCallbacks for Journal {
		fn construct(&self, element: &ElementHandle) -> Result<(), Error> {
			self.0.borrow_mut().push(format!("construct {}", element.local_name()));
			Ok(())
		}

		fn connected(&self, element: &ElementHandle) {
			self.0.borrow_mut().push(format!("connected {}", element.local_name()));
		}

		fn disconnected(&self, element: &ElementHandle) {
			self.0.borrow_mut().push(format!("disconnected {}", element.local_name()));
		}

		fn attribute_changed(&self, _: &ElementHandle, name: &str, old: Option<&str>, new: Option<&str>) {
			self.0.borrow_mut().push(format!("attr {name} {old:?} -> {new:?}"));
		}
	}

	fn element_type(tag: &str, journal: &Rc<Journal>) -> ElementType {
		ElementType {
			tag_name: Some(tag.to_string()),
			base: "HTMLElement".into(),
			extends: None,
			observed_attributes: vec!["title".into()],
			callbacks: Rc::clone(journal) as Rc<dyn ElementCallbacks>,
		}
	}

	#[test]
	fn pending_elements_upgrade_on_define() {
		let host = MemoryCustomElements::new();
		let journal = Rc::new(Journal::default());
		let element = host.create("x-late").unwrap();
		host.set_attribute(&element, "title", Some("hi"));
		host.set_attribute(&element, "ignored", Some("x"));
		host.connect(&element);
		assert!(!element.is_upgraded());

		host.define(element_type("x-late", &journal)).unwrap();

		assert!(element.is_upgraded());
		assert_eq!(
			*journal.0.borrow(),
			vec!["construct x-late".to_string(), "attr title None -> Some(\"hi\")".to_string(), "connected x-late".to_string()]
		);
	}

	#[test]
	fn defined_elements_get_callbacks() {
		let host = MemoryCustomElements::new();
		let journal = Rc::new(Journal::default());
		host.define(element_type("x-now", &journal)).unwrap();

		let element = host.create("x-now").unwrap();
		host.connect(&element);
		host.connect(&element);
		host.set_attribute(&element, "title", Some("a"));
		host.set_attribute(&element, "title", Some("a"));
		host.disconnect(&element);

		assert_eq!(
			*journal.0.borrow(),
			vec![
				"construct x-now".to_string(),
				"connected x-now".to_string(),
				"attr title None -> Some(\"a\")".to_string(),
				"disconnected x-now".to_string(),
			]
		);
	}

	#[test]
	fn redefinition_is_rejected() {
		let host = MemoryCustomElements::new();
		let journal = Rc::new(Journal::default());
		host.define(element_type("x-once", &journal)).unwrap();
		assert_eq!(host.define(element_type("x-once", &journal)), Err(HostError::AlreadyDefined { tag: "x-once".into() }));
	}

	#[test]
	fn when_defined_resolves_before_and_after_definition() {
		let host = MemoryCustomElements::new();
		let journal = Rc::new(Journal::default());
		let early = host.when_defined("x-wait");
		host.define(element_type("x-wait", &journal)).unwrap();
		assert_eq!(block_on(early), Ok(()));
		assert_eq!(block_on(host.when_defined("x-wait")), Ok(()));
	}
}
