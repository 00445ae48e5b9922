//! Context value keys.
//!
//! Keys are identity-compared tokens. They are meant to live in statics:
//!
//! ```ignore
//! static GREETING: LazyLock<SingleKey<String>> = LazyLock::new(|| SingleKey::new("greeting"));
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of a key, unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u64);

impl KeyId {
	pub(crate) fn next() -> Self {
		Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
	}
}

/// Value sources of a key, grouped by layer.
///
/// The first layer is the most specific one (the consuming context's own
/// registry); later layers come from appended registries and parent contexts.
/// Within a layer, sources keep registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sources<V> {
	layers: Vec<Vec<V>>,
}

impl<V> Sources<V> {
	pub fn new(layers: Vec<Vec<V>>) -> Self {
		Self { layers: layers.into_iter().filter(|layer| !layer.is_empty()).collect() }
	}

	pub fn layers(&self) -> &[Vec<V>] {
		&self.layers
	}

	pub fn is_empty(&self) -> bool {
		self.layers.is_empty()
	}

	/// The last registered source of the most specific non-empty layer.
	pub fn most_specific(&self) -> Option<&V> {
		self.layers.first().and_then(|layer| layer.last())
	}

	/// All sources, most specific layer first.
	pub fn flatten(self) -> Vec<V> {
		self.layers.into_iter().flatten().collect()
	}
}

/// A key identifying a context value.
pub trait ContextKey {
	/// Resolved value type.
	type Value: Clone + 'static;
	/// Type of the individual values providers register against this key.
	type Source: Clone + 'static;

	/// Identity used for caching the merged value.
	fn id(&self) -> KeyId;

	/// Identity of the provider list this key merges. Differs from [`id`](Self::id)
	/// for keys delegating to a seed.
	fn sources_id(&self) -> KeyId {
		self.id()
	}

	fn name(&self) -> &'static str;

	/// Merges the gathered sources into a value. `None` means missing.
	fn merge(&self, sources: Sources<Self::Source>) -> Option<Self::Value>;
}

impl<K: ContextKey + ?Sized> ContextKey for &K {
	type Value = K::Value;
	type Source = K::Source;

	fn id(&self) -> KeyId {
		(**self).id()
	}

	fn sources_id(&self) -> KeyId {
		(**self).sources_id()
	}

	fn name(&self) -> &'static str {
		(**self).name()
	}

	fn merge(&self, sources: Sources<Self::Source>) -> Option<Self::Value> {
		(**self).merge(sources)
	}
}

/// Key resolving to a single value: the most specific one, else the default.
pub struct SingleKey<V> {
	id: KeyId,
	seed: KeyId,
	name: &'static str,
	default: Option<fn() -> V>,
	_value: PhantomData<fn() -> V>,
}

impl<V> Clone for SingleKey<V> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<V> Copy for SingleKey<V> {}

impl<V: Clone + 'static> SingleKey<V> {
	/// A key without a default; resolving it fails when nothing provides it.
	pub fn new(name: &'static str) -> Self {
		Self { id: KeyId::next(), seed: KeyId::next(), name, default: None, _value: PhantomData }
	}

	/// Creates a key falling back to `default` when nothing is provided.
	pub fn with_default(name: &'static str, default: fn() -> V) -> Self {
		Self { default: Some(default), ..Self::new(name) }
	}

	/// The multi-valued key sharing this key's sources.
	pub fn seed(&self) -> MultiKey<V> {
		MultiKey { id: self.seed, name: self.name, _value: PhantomData }
	}
}

impl<V: Clone + 'static> ContextKey for SingleKey<V> {
	type Value = V;
	type Source = V;

	fn id(&self) -> KeyId {
		self.id
	}

	fn sources_id(&self) -> KeyId {
		self.seed
	}

	fn name(&self) -> &'static str {
		self.name
	}

	fn merge(&self, sources: Sources<V>) -> Option<V> {
		sources.most_specific().cloned().or_else(|| self.default.map(|default| default()))
	}
}

/// Key resolving to every source, most specific layer first.
///
/// Always resolves; an empty list when nothing is provided.
pub struct MultiKey<V> {
	id: KeyId,
	name: &'static str,
	_value: PhantomData<fn() -> V>,
}

impl<V> Clone for MultiKey<V> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<V> Copy for MultiKey<V> {}

impl<V: Clone + 'static> MultiKey<V> {
	/// A key collecting every provided value; empty when nothing provides it.
	pub fn new(name: &'static str) -> Self {
		Self { id: KeyId::next(), name, _value: PhantomData }
	}
}

impl<V: Clone + 'static> ContextKey for MultiKey<V> {
	type Value = Vec<V>;
	type Source = V;

	fn id(&self) -> KeyId {
		self.id
	}

	fn name(&self) -> &'static str {
		self.name
	}

	fn merge(&self, sources: Sources<V>) -> Option<Vec<V>> {
		Some(sources.flatten())
	}
}

impl<V> fmt::Display for SingleKey<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ContextKey({})", self.name)
	}
}

impl<V> fmt::Debug for SingleKey<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SingleKey").field("name", &self.name).field("id", &self.id).finish()
	}
}

impl<V> fmt::Display for MultiKey<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ContextKey({}[])", self.name)
	}
}

impl<V> fmt::Debug for MultiKey<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MultiKey").field("name", &self.name).field("id", &self.id).finish()
	}
}
