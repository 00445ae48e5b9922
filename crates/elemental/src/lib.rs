//! Component definitions and lifecycle on top of the custom elements contract.
//!
//! Features and components are declared as explicit class descriptors
//! ([`FeatureClass`], [`ComponentClass`]) and bootstrapped into an object graph
//! of three context scopes:
//!
//! - [`BootstrapContext`]: one per bootstrap, ready once every requested feature initialized.
//! - [`DefinitionContext`]: one per component class, ready once its element type is registered.
//! - [`ComponentContext`]: one per element, driving the component lifecycle.
//!
//! Each scope resolves context values through a layered registry falling back to
//! the enclosing scope. The host document is abstracted by [`CustomElements`]
//! and [`HostElement`]; [`MemoryCustomElements`] implements both for headless use.
//!
//! Everything is single-threaded. Feature initialization runs on a caller-provided
//! [`LocalSpawn`](futures::task::LocalSpawn) executor.

mod bootstrap;
mod component;
mod config;
mod definition;
mod error;
mod feature;
mod host;
mod naming;
#[cfg(test)]
mod testing;

pub use bootstrap::{Bootstrap, BootstrapContext, BootstrapStage, CUSTOM_ELEMENTS, NAMESPACE_ALIASER, bootstrap_components};
pub use component::{
	AttributeChange, ComponentBuilder, ComponentClass, ComponentContext, ComponentDef, ComponentMount, ComponentStatus, ElementExtend,
	STATE_UPDATER, StateUpdater,
};
pub use config::{BootstrapConfig, ElementsConfig, NamingConfig};
pub use definition::{DefinitionContext, DefinitionSetup, OBSERVED_ATTRIBUTES};
pub use elemental_context::{ContextError, ContextKey, ContextRegistry, ContextValueSpec, ContextValues, MultiKey, SingleKey};
pub use elemental_supply::{OffReason, Supply};
pub use error::{ConfigError, Error, ErrorKind, FeatureError, HostError, UsageError};
pub use feature::{BootstrapSetup, ClassId, FeatureBuilder, FeatureClass, FeatureContext, FeatureDef, FeaturePhase, FeatureRef};
pub use host::{CustomElements, ElementCallbacks, ElementHandle, ElementSlot, ElementType, HostElement, MemoryCustomElements, MemoryElement};
pub use naming::{ElementName, NamespaceAliaser, NamespaceDef, validate_tag_name};
