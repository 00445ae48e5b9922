//! Bootstraps a feature needing a component and drives one element of it
//! through the in-memory host.

use std::cell::Cell;
use std::rc::Rc;

use elemental::{
	Bootstrap, ComponentClass, ComponentContext, ComponentStatus, CustomElements, FeatureClass, MemoryCustomElements, OffReason,
};
use futures::executor::LocalPool;
use pretty_assertions::assert_eq;

fn test_component() -> ComponentClass {
	ComponentClass::builder("TestComponent").name("test-component").extend("HTMLElement", None).build()
}

#[test]
fn defined_component_connects_once() {
	let component = test_component();
	let app = FeatureClass::builder("app").needs(&component).build();
	let host = MemoryCustomElements::new();

	let mut pool = LocalPool::new();
	let bootstrap = Bootstrap::new(pool.spawner()).custom_elements(host.clone()).start(&[app]).unwrap();
	let definition = pool.run_until(bootstrap.when_defined(&component)).unwrap();
	assert_eq!(definition.tag_name().as_deref(), Some("test-component"));
	assert!(pool.run_until(host.when_defined("test-component")).is_ok());

	let element = host.create("test-component").unwrap();
	let context = ComponentContext::of(&*element).unwrap();
	assert_eq!(context.component_type(), &component);
	assert!(!context.connected());

	let connects = Rc::new(Cell::new(0));
	let count = Rc::clone(&connects);
	context.when_connected(move |_| count.set(count.get() + 1));

	host.connect(&element);
	assert!(context.connected());
	assert_eq!(connects.get(), 1);

	host.disconnect(&element);
	host.connect(&element);
	assert_eq!(connects.get(), 1);
}

#[test]
fn destroyed_context_is_not_resurrected() {
	let component = test_component();
	let host = MemoryCustomElements::new();
	let mut pool = LocalPool::new();
	let bootstrap = Bootstrap::new(pool.spawner()).custom_elements(host.clone()).start(&[component.feature()]).unwrap();
	pool.run_until(bootstrap.when_defined(&component)).unwrap();

	let element = host.create("test-component").unwrap();
	let context = ComponentContext::of(&*element).unwrap();
	context.destroy(OffReason::Done);

	assert!(context.settle().is_err());
	host.connect(&element);

	let again = ComponentContext::of(&*element).unwrap();
	assert_eq!(again, context);
	assert_eq!(again.status(), ComponentStatus::Destroyed);
	assert!(!again.connected());
}

#[test]
fn late_defined_tags_upgrade_existing_elements() {
	let component = test_component();
	let host = MemoryCustomElements::new();
	let element = host.create("test-component").unwrap();
	host.set_attribute(&element, "title", Some("before"));
	assert!(host.get("test-component").is_none());

	let mut pool = LocalPool::new();
	let bootstrap = Bootstrap::new(pool.spawner()).custom_elements(host.clone()).start(&[component.feature()]).unwrap();
	pool.run_until(bootstrap.when_defined(&component)).unwrap();

	let context = ComponentContext::of(&*element).unwrap();
	assert_eq!(context.status(), ComponentStatus::Ready);
	assert_eq!(element.attribute("title").as_deref(), Some("before"));
}
