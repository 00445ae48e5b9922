//! Lifecycle ordering as observed from the public API.

use std::cell::RefCell;
use std::rc::Rc;

use elemental::{Bootstrap, ComponentClass, ComponentContext, ComponentStatus, MemoryCustomElements, OffReason};
use futures::executor::LocalPool;
use pretty_assertions::assert_eq;

fn rank(status: ComponentStatus) -> u8 {
	match status {
		ComponentStatus::Constructed => 0,
		ComponentStatus::Ready => 1,
		ComponentStatus::Settled => 2,
		ComponentStatus::Connected | ComponentStatus::Disconnected => 3,
		ComponentStatus::Destroyed => 4,
	}
}

#[test]
fn statuses_never_go_back_past_ready_or_leave_destroyed() {
	let component = ComponentClass::builder("toggle").name("x-toggle").build();
	let host = MemoryCustomElements::new();
	let mut pool = LocalPool::new();
	let bootstrap = Bootstrap::new(pool.spawner()).custom_elements(host.clone()).start(&[component.feature()]).unwrap();
	pool.run_until(bootstrap.when_defined(&component)).unwrap();

	let seen = Rc::new(RefCell::new(Vec::new()));
	let log = Rc::clone(&seen);
	bootstrap.on_component(move |context| {
		let log = Rc::clone(&log);
		context.read_status(move |status| log.borrow_mut().push(*status));
	});

	let element = host.create("x-toggle").unwrap();
	for _ in 0..3 {
		host.connect(&element);
		host.disconnect(&element);
	}
	let context = ComponentContext::of(&*element).unwrap();
	context.destroy(OffReason::Done);
	host.connect(&element);
	context.destroy(OffReason::aborted("again"));

	let seen = seen.borrow();
	assert_eq!(seen.first(), Some(&ComponentStatus::Constructed));
	assert_eq!(seen.last(), Some(&ComponentStatus::Destroyed));
	assert_eq!(seen.iter().filter(|status| **status == ComponentStatus::Destroyed).count(), 1);
	assert!(seen.windows(2).all(|pair| rank(pair[0]) <= rank(pair[1])));
	assert_eq!(seen.iter().filter(|status| **status == ComponentStatus::Connected).count(), 3);
}

#[test]
fn ready_listeners_fire_once_each_even_when_late() {
	let component = ComponentClass::builder("toggle").name("x-toggle").build();
	let host = MemoryCustomElements::new();
	let mut pool = LocalPool::new();
	let bootstrap = Bootstrap::new(pool.spawner()).custom_elements(host.clone()).start(&[component.feature()]).unwrap();
	pool.run_until(bootstrap.when_defined(&component)).unwrap();

	let element = host.create("x-toggle").unwrap();
	let context = ComponentContext::of(&*element).unwrap();
	let calls = Rc::new(RefCell::new(Vec::new()));
	for name in ["first", "second"] {
		let log = Rc::clone(&calls);
		context.when_ready(move |_| log.borrow_mut().push(name));
	}
	host.connect(&element);
	host.disconnect(&element);
	host.connect(&element);

	assert_eq!(*calls.borrow(), vec!["first", "second"]);
}
