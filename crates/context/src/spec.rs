use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::ContextError;
use crate::key::{ContextKey, KeyId};
use crate::values::ContextValues;

pub(crate) type Erased = Rc<dyn Any>;
pub(crate) type Provider<C> = Rc<dyn Fn(&C) -> Result<Option<Erased>, ContextError>>;

/// How a context value is provided for a key.
///
/// Type-checked at construction; the registry stores it type-erased.
pub struct ContextValueSpec<C> {
	pub(crate) key: KeyId,
	pub(crate) name: &'static str,
	pub(crate) provider: Provider<C>,
	pub(crate) volatile: bool,
}

impl<C> Clone for ContextValueSpec<C> {
	fn clone(&self) -> Self {
		Self { key: self.key, name: self.name, provider: Rc::clone(&self.provider), volatile: self.volatile }
	}
}

impl<C> fmt::Debug for ContextValueSpec<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ContextValueSpec").field("key", &self.name).finish_non_exhaustive()
	}
}

impl<C: 'static> ContextValueSpec<C> {
	/// A constant value.
	pub fn is<K: ContextKey>(key: &K, value: K::Source) -> Self {
		let value: Erased = Rc::new(value);
		Self::erased(key, move |_| Ok(Some(Rc::clone(&value))))
	}

	/// A value computed from the consuming context. `None` means absent.
	pub fn by<K: ContextKey>(key: &K, provider: impl Fn(&C) -> Option<K::Source> + 'static) -> Self {
		Self::erased(key, move |ctx| Ok(provider(ctx).map(|v| Rc::new(v) as Erased)))
	}

	/// The consuming context itself. Never cached by the consuming view.
	pub fn of_self<K: ContextKey<Source = C>>(key: &K) -> Self
	where
		C: Clone,
	{
		Self { volatile: true, ..Self::erased(key, |ctx: &C| Ok(Some(Rc::new(ctx.clone()) as Erased))) }
	}

	fn erased<K: ContextKey>(key: &K, provider: impl Fn(&C) -> Result<Option<Erased>, ContextError> + 'static) -> Self {
		Self { key: key.sources_id(), name: key.name(), provider: Rc::new(provider), volatile: false }
	}

	pub fn key_name(&self) -> &'static str {
		self.name
	}
}

impl<C: ContextValues> ContextValueSpec<C> {
	/// An alias: the value of `source` in the consuming context.
	pub fn via<K, S>(key: &K, source: S) -> Self
	where
		K: ContextKey,
		S: ContextKey<Value = K::Source> + 'static,
	{
		Self::erased(key, move |ctx: &C| match ctx.get(&source) {
			Ok(value) => Ok(Some(Rc::new(value) as Erased)),
			Err(ContextError::Missing { .. }) => Ok(None),
			Err(err) => Err(err),
		})
	}

	/// A value computed from other context values, resolved first.
	pub fn by_deps<K, D>(key: &K, deps: D, provider: impl Fn(D::Values) -> Option<K::Source> + 'static) -> Self
	where
		K: ContextKey,
		D: Deps<C>,
	{
		Self::erased(key, move |ctx: &C| Ok(provider(deps.resolve(ctx)?).map(|v| Rc::new(v) as Erased)))
	}
}

/// Dependency keys of a [`ContextValueSpec::by_deps`] provider.
pub trait Deps<C>: 'static {
	type Values;

	fn resolve(&self, ctx: &C) -> Result<Self::Values, ContextError>;
}

macro_rules! impl_deps {
	($($key:ident $var:ident),+) => {
		impl<C: ContextValues, $($key: ContextKey + 'static),+> Deps<C> for ($($key,)+) {
			type Values = ($($key::Value,)+);

			fn resolve(&self, ctx: &C) -> Result<Self::Values, ContextError> {
				let ($($var,)+) = self;
				Ok(($(ctx.get($var)?,)+))
			}
		}
	};
}

impl_deps!(A a);
impl_deps!(A a, B b);
impl_deps!(A a, B b, D d);
impl_deps!(A a, B b, D d, E e);
