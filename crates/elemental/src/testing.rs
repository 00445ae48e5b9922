use std::rc::Rc;

use futures::executor::LocalPool;

use crate::bootstrap::{Bootstrap, BootstrapContext};
use crate::component::ComponentClass;
use crate::definition::DefinitionContext;
use crate::host::MemoryCustomElements;

/// A ready bootstrap with `component` defined in an in-memory host.
pub(crate) struct Fixture {
	pub(crate) pool: LocalPool,
	pub(crate) bootstrap: BootstrapContext,
	pub(crate) host: Rc<MemoryCustomElements>,
	pub(crate) definition: DefinitionContext,
}

impl Fixture {
	pub(crate) fn new(component: &ComponentClass) -> Self {
		let mut pool = LocalPool::new();
		let host = MemoryCustomElements::new();
		let bootstrap = Bootstrap::new(pool.spawner()).custom_elements(host.clone()).start(&[component.feature()]).unwrap();
		let definition = pool.run_until(bootstrap.when_defined(component)).unwrap();
		Self { pool, bootstrap, host, definition }
	}
}
