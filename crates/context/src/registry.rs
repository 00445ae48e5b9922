use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use elemental_supply::Supply;
use rustc_hash::FxHashMap;

use crate::error::ContextError;
use crate::key::{ContextKey, KeyId};
use crate::spec::{ContextValueSpec, Erased, Provider};
use crate::values::{ContextValues, Layers, Values};

static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

pub(crate) type ParentLayers = Rc<dyn Fn(KeyId, &'static str) -> Result<Layers, ContextError>>;

pub(crate) struct Registration<C> {
	pub(crate) id: u64,
	pub(crate) provider: Provider<C>,
	pub(crate) volatile: bool,
	/// Cut off when the registration is removed.
	pub(crate) supply: Supply,
}

impl<C> Clone for Registration<C> {
	fn clone(&self) -> Self {
		Self { id: self.id, provider: Rc::clone(&self.provider), volatile: self.volatile, supply: self.supply.clone() }
	}
}

/// One source layer gathered for a key.
pub(crate) enum Gathered<C> {
	Providers(Vec<Registration<C>>),
	Parent(ParentLayers),
}

enum Link<C> {
	Registry(ContextRegistry<C>),
	Parent(ParentLayers),
}

impl<C> Clone for Link<C> {
	fn clone(&self) -> Self {
		match self {
			Self::Registry(registry) => Self::Registry(registry.clone()),
			Self::Parent(parent) => Self::Parent(Rc::clone(parent)),
		}
	}
}

struct RegistryInner<C> {
	providers: RefCell<FxHashMap<KeyId, Vec<Registration<C>>>>,
	chain: RefCell<Vec<Link<C>>>,
}

/// Registry of context value providers for contexts of type `C`.
///
/// Sources of a key are gathered in layers: this registry's own providers, then
/// every appended registry, then the parent context's values.
pub struct ContextRegistry<C>(Rc<RegistryInner<C>>);

impl<C> Clone for ContextRegistry<C> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<C> Default for ContextRegistry<C> {
	fn default() -> Self {
		Self(Rc::new(RegistryInner { providers: RefCell::default(), chain: RefCell::default() }))
	}
}

impl<C: 'static> ContextRegistry<C> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a value provider.
	///
	/// Cutting the returned supply off removes exactly this registration. Views
	/// that already cached a value for the key keep it until a registration it
	/// was merged from is removed.
	pub fn provide(&self, spec: ContextValueSpec<C>) -> Supply {
		let id = NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed);
		let key = spec.key;
		let supply = Supply::new();
		self.0.providers.borrow_mut().entry(key).or_default().push(Registration {
			id,
			provider: spec.provider,
			volatile: spec.volatile,
			supply: supply.clone(),
		});
		tracing::trace!(key = spec.name, registration = id, "context.provide");

		let registry: Weak<RegistryInner<C>> = Rc::downgrade(&self.0);
		supply.when_off(move |_| {
			let Some(registry) = registry.upgrade() else { return };
			let mut providers = registry.providers.borrow_mut();
			if let Some(list) = providers.get_mut(&key) {
				list.retain(|r| r.id != id);
				if list.is_empty() {
					providers.remove(&key);
				}
			}
		});
		supply
	}

	/// Registers the consuming context itself as the value of `key`.
	pub fn provide_self<K: ContextKey<Source = C>>(&self, key: &K) -> Supply
	where
		C: Clone,
	{
		self.provide(ContextValueSpec::of_self(key))
	}

	/// A new registry yielding this registry's sources followed by `other`'s.
	pub fn append(&self, other: &ContextRegistry<C>) -> ContextRegistry<C> {
		let combined = ContextRegistry::new();
		combined.0.chain.borrow_mut().extend([Link::Registry(self.clone()), Link::Registry(other.clone())]);
		combined
	}

	/// Appends `other` to this registry's own chain.
	pub fn chain(self, other: &ContextRegistry<C>) -> Self {
		self.0.chain.borrow_mut().push(Link::Registry(other.clone()));
		self
	}

	/// Falls back to the values of a parent context after every other layer.
	pub fn with_parent<P: ContextValues + Clone>(self, parent: P) -> Self {
		let layers: ParentLayers = Rc::new(move |sources, name| parent.values().collect(&parent, sources, name));
		self.0.chain.borrow_mut().push(Link::Parent(layers));
		self
	}

	/// Number of registrations for a key in this registry alone.
	pub fn provider_count<K: ContextKey>(&self, key: &K) -> usize {
		self.0.providers.borrow().get(&key.sources_id()).map_or(0, Vec::len)
	}

	/// A fresh view resolving values for one consuming context.
	pub fn new_values(&self) -> Values<C> {
		Values::new(self.clone())
	}

	pub(crate) fn gather(&self, sources: KeyId, out: &mut Vec<Gathered<C>>) {
		if let Some(list) = self.0.providers.borrow().get(&sources) {
			out.push(Gathered::Providers(list.clone()));
		}
		let chain = self.0.chain.borrow().clone();
		for link in chain {
			match link {
				Link::Registry(registry) => registry.gather(sources, out),
				Link::Parent(parent) => out.push(Gathered::Parent(parent)),
			}
		}
	}
}

impl<C> fmt::Debug for ContextRegistry<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ContextRegistry")
			.field("keys", &self.0.providers.borrow().len())
			.field("chain", &self.0.chain.borrow().len())
			.finish()
	}
}
