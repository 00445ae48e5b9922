//! The custom element host contract.
//!
//! The engine never touches a DOM directly. It defines [`ElementType`]s through a
//! [`CustomElements`] registry and receives lifecycle callbacks through
//! [`ElementCallbacks`], mirroring `customElements.define`, `connectedCallback`,
//! `disconnectedCallback` and `attributeChangedCallback`.

mod memory;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

pub use self::memory::{MemoryCustomElements, MemoryElement};
use crate::component::ComponentContext;
use crate::error::{Error, HostError};

/// An element instance of the host document.
pub trait HostElement {
	fn local_name(&self) -> &str;

	fn is_connected(&self) -> bool;

	/// Storage binding the element to its component context.
	fn slot(&self) -> &ElementSlot;
}

pub type ElementHandle = Rc<dyn HostElement>;

/// Per-element storage of the bound component context.
///
/// The element owns its context; the context refers back to the element weakly.
#[derive(Default)]
pub struct ElementSlot(RefCell<Option<ComponentContext>>);

impl ElementSlot {
	pub fn get(&self) -> Option<ComponentContext> {
		self.0.borrow().clone()
	}

	pub(crate) fn bind(&self, context: ComponentContext) {
		*self.0.borrow_mut() = Some(context);
	}
}

impl fmt::Debug for ElementSlot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ElementSlot").field(&self.0.borrow().is_some()).finish()
	}
}

/// Lifecycle callbacks of a defined element type.
pub trait ElementCallbacks {
	/// Runs when an element of this type is created or upgraded.
	fn construct(&self, element: &ElementHandle) -> Result<(), Error>;

	fn connected(&self, element: &ElementHandle);

	fn disconnected(&self, element: &ElementHandle);

	fn attribute_changed(&self, element: &ElementHandle, name: &str, old: Option<&str>, new: Option<&str>);
}

/// A custom element type ready to be registered with the host.
#[derive(Clone)]
pub struct ElementType {
	/// Registered tag. Anonymous components have none and are only mountable.
	pub tag_name: Option<String>,
	/// Native element type the custom element derives from.
	pub base: Rc<str>,
	/// Built-in tag this element customizes, if any.
	pub extends: Option<Rc<str>>,
	pub observed_attributes: Vec<Rc<str>>,
	pub callbacks: Rc<dyn ElementCallbacks>,
}

impl ElementType {
	pub fn observes(&self, attribute: &str) -> bool {
		self.observed_attributes.iter().any(|a| &**a == attribute)
	}
}

impl fmt::Debug for ElementType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ElementType")
			.field("tag_name", &self.tag_name)
			.field("base", &self.base)
			.field("extends", &self.extends)
			.field("observed_attributes", &self.observed_attributes)
			.finish_non_exhaustive()
	}
}

/// The host's custom element registry.
pub trait CustomElements {
	/// Registers a tagged element type, upgrading existing elements with that tag.
	fn define(&self, element_type: ElementType) -> Result<(), HostError>;

	/// Resolves once `tag` is defined.
	fn when_defined(&self, tag: &str) -> LocalBoxFuture<'static, Result<(), HostError>>;
}
