use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use elemental_supply::Supply;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ContextError;
use crate::key::{ContextKey, KeyId, Sources};
use crate::registry::{ContextRegistry, Gathered};
use crate::spec::Erased;

/// A context exposing resolved context values.
pub trait ContextValues: Sized + 'static {
	fn values(&self) -> &Values<Self>;

	/// Resolves `key`, failing with [`ContextError::Missing`] when nothing provides it.
	fn get<K: ContextKey>(&self, key: &K) -> Result<K::Value, ContextError> {
		self.values().get(self, key)
	}

	/// Resolves `key`, using `fallback` when nothing provides it.
	fn get_or<K: ContextKey>(&self, key: &K, fallback: impl FnOnce() -> K::Value) -> Result<K::Value, ContextError> {
		self.values().get_or(self, key, fallback)
	}

	/// The gathered sources of `key`, most specific layer first.
	fn sources<K: ContextKey>(&self, key: &K) -> Result<Sources<K::Source>, ContextError> {
		self.values().sources(self, key)
	}
}

/// Source values gathered for a key, most specific layer first.
pub(crate) struct Layers {
	pub(crate) values: Vec<Vec<Erased>>,
	/// Some source is the consuming context itself and must not be cached.
	pub(crate) volatile: bool,
	/// Supplies of the registrations the values came from.
	pub(crate) origins: Vec<Supply>,
}

struct Cached {
	value: Erased,
	origins: Vec<Supply>,
}

impl Cached {
	fn is_live(&self) -> bool {
		self.origins.iter().all(|origin| !origin.is_off())
	}
}

struct Memo {
	origin: Supply,
	value: Erased,
}

/// Per-context view over a [`ContextRegistry`].
///
/// Providers run lazily, at most once per view while they produce a value.
/// A merged value is cached for the life of the view: registrations made later
/// do not change it, removing one it was merged from does.
pub struct Values<C> {
	registry: ContextRegistry<C>,
	memo: RefCell<FxHashMap<u64, Memo>>,
	cache: RefCell<FxHashMap<KeyId, Cached>>,
	resolving: RefCell<FxHashSet<KeyId>>,
}

impl<C: 'static> Values<C> {
	pub(crate) fn new(registry: ContextRegistry<C>) -> Self {
		Self {
			registry,
			memo: RefCell::default(),
			cache: RefCell::default(),
			resolving: RefCell::default(),
		}
	}

	pub fn registry(&self) -> &ContextRegistry<C> {
		&self.registry
	}

	pub fn get<K: ContextKey>(&self, ctx: &C, key: &K) -> Result<K::Value, ContextError> {
		self.resolve(ctx, key)?.ok_or(ContextError::Missing { key: key.name() })
	}

	/// Like [`get`](Self::get), but a missing value yields `fallback()`, which is
	/// not cached.
	pub fn get_or<K: ContextKey>(&self, ctx: &C, key: &K, fallback: impl FnOnce() -> K::Value) -> Result<K::Value, ContextError> {
		Ok(self.resolve(ctx, key)?.unwrap_or_else(fallback))
	}

	/// The current sources of `key`. Never cached.
	pub fn sources<K: ContextKey>(&self, ctx: &C, key: &K) -> Result<Sources<K::Source>, ContextError> {
		let layers = self.collect(ctx, key.sources_id(), key.name())?;
		downcast_layers(layers.values, key.name())
	}

	/// Drops every memoized provider result and cached value.
	pub fn clear(&self) {
		self.memo.borrow_mut().clear();
		self.cache.borrow_mut().clear();
	}

	/// Number of memoized provider results.
	pub fn memoized(&self) -> usize {
		self.memo.borrow().len()
	}

	fn resolve<K: ContextKey>(&self, ctx: &C, key: &K) -> Result<Option<K::Value>, ContextError> {
		if let Some(cached) = self.cache.borrow().get(&key.id()).filter(|cached| cached.is_live()) {
			return downcast::<K::Value>(&cached.value, key.name()).map(Some);
		}

		let layers = self.collect(ctx, key.sources_id(), key.name())?;
		let Some(value) = key.merge(downcast_layers(layers.values, key.name())?) else {
			return Ok(None);
		};
		// A view must not cache its own context, or the context would own itself.
		if !layers.volatile {
			self.cache.borrow_mut().insert(key.id(), Cached { value: Rc::new(value.clone()), origins: layers.origins });
		}
		Ok(Some(value))
	}

	/// Gathers the type-erased source layers of a key. Parent links call this too.
	pub(crate) fn collect(&self, ctx: &C, sources: KeyId, name: &'static str) -> Result<Layers, ContextError> {
		let _guard = ResolveGuard::enter(&self.resolving, sources, name)?;

		let mut gathered = Vec::new();
		self.registry.gather(sources, &mut gathered);

		let mut layers = Layers { values: Vec::with_capacity(gathered.len()), volatile: false, origins: Vec::new() };
		for layer in gathered {
			match layer {
				Gathered::Providers(registrations) => {
					let mut values = Vec::with_capacity(registrations.len());
					for registration in registrations {
						layers.origins.push(registration.supply.clone());
						if registration.volatile {
							layers.volatile = true;
							values.extend((*registration.provider)(ctx)?);
							continue;
						}
						let memoized = self.memo.borrow().get(&registration.id).map(|memo| Rc::clone(&memo.value));
						match memoized {
							Some(value) => values.push(value),
							None => {
								if let Some(value) = (*registration.provider)(ctx)? {
									self.remember(&registration.supply, registration.id, Rc::clone(&value));
									values.push(value);
								}
							}
						}
					}
					layers.values.push(values);
				}
				Gathered::Parent(parent) => {
					let parent = (*parent)(sources, name)?;
					layers.values.extend(parent.values);
					layers.origins.extend(parent.origins);
				}
			}
		}
		tracing::trace!(key = name, layers = layers.values.len(), "context.collect");
		Ok(layers)
	}

	/// Memoizes a provider result, forgetting results of removed registrations.
	fn remember(&self, origin: &Supply, id: u64, value: Erased) {
		let mut memo = self.memo.borrow_mut();
		memo.retain(|_, memo| !memo.origin.is_off());
		memo.insert(id, Memo { origin: origin.clone(), value });
	}
}

impl<C> fmt::Debug for Values<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Values").field("cached", &self.cache.borrow().len()).finish_non_exhaustive()
	}
}

fn downcast<V: Clone + 'static>(value: &Erased, name: &'static str) -> Result<V, ContextError> {
	value.downcast_ref::<V>().cloned().ok_or(ContextError::TypeMismatch { key: name })
}

fn downcast_layers<V: Clone + 'static>(layers: Vec<Vec<Erased>>, name: &'static str) -> Result<Sources<V>, ContextError> {
	let layers = layers
		.iter()
		.map(|layer| layer.iter().map(|value| downcast::<V>(value, name)).collect::<Result<Vec<_>, _>>())
		.collect::<Result<Vec<_>, _>>()?;
	Ok(Sources::new(layers))
}

struct ResolveGuard<'a> {
	resolving: &'a RefCell<FxHashSet<KeyId>>,
	key: KeyId,
}

impl<'a> ResolveGuard<'a> {
	fn enter(resolving: &'a RefCell<FxHashSet<KeyId>>, key: KeyId, name: &'static str) -> Result<Self, ContextError> {
		if !resolving.borrow_mut().insert(key) {
			tracing::warn!(key = name, "context.cycle");
			return Err(ContextError::Cycle { key: name });
		}
		Ok(Self { resolving, key })
	}
}

impl Drop for ResolveGuard<'_> {
	fn drop(&mut self) {
		self.resolving.borrow_mut().remove(&self.key);
	}
}
