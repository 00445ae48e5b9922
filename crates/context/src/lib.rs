//! Context values: a layered, hierarchical dependency-injection registry.
//!
//! A [`ContextRegistry`] holds value providers per key. A [`Values`] view binds a
//! registry to one consuming context and resolves keys lazily, caching results.
//! Registries compose: [`ContextRegistry::append`] stacks a narrower scope in
//! front of a broader one, and [`ContextRegistry::with_parent`] falls back to the
//! values of a parent context of another type.

mod error;
mod key;
mod registry;
mod spec;
mod values;

pub use error::ContextError;
pub use key::{ContextKey, KeyId, MultiKey, SingleKey, Sources};
pub use registry::ContextRegistry;
pub use spec::{ContextValueSpec, Deps};
pub use values::{ContextValues, Values};
