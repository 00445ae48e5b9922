use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::LazyLock;

use elemental_context::{ContextValueSpec, ContextValues, SingleKey};
use elemental_supply::OffReason;
use pretty_assertions::assert_eq;

use super::*;
use crate::bootstrap::BootstrapContext;
use crate::component::{ComponentClass, ComponentStatus, STATE_UPDATER, StateUpdater};
use crate::error::ErrorKind;
use crate::host::{ElementHandle, MemoryElement};
use crate::testing::Fixture;

static THEME: LazyLock<SingleKey<&'static str>> = LazyLock::new(|| SingleKey::new("theme"));

fn widget() -> ComponentClass {
	ComponentClass::builder("widget").name("x-widget").observe("label").build()
}

fn created(fixture: &Fixture) -> (Rc<MemoryElement>, ComponentContext) {
	let element = fixture.host.create("x-widget").unwrap();
	let context = ComponentContext::of(&*element).unwrap();
	(element, context)
}

fn recorder(context: &ComponentContext) -> Rc<RefCell<Vec<ComponentStatus>>> {
	let statuses = Rc::new(RefCell::new(Vec::new()));
	let log = Rc::clone(&statuses);
	context.read_status(move |status| log.borrow_mut().push(*status));
	statuses
}

#[test]
fn upgraded_component_walks_the_lifecycle() {
	use ComponentStatus::*;

	let fixture = Fixture::new(&widget());
	let (element, context) = created(&fixture);
	let statuses = recorder(&context);

	fixture.host.connect(&element);
	fixture.host.disconnect(&element);
	fixture.host.connect(&element);
	context.destroy(OffReason::Done);

	assert_eq!(*statuses.borrow(), vec![Ready, Settled, Connected, Disconnected, Connected, Disconnected, Destroyed]);
}

#[test]
fn settling_waits_for_the_constructor() {
	let fixture = Fixture::new(&widget());
	fixture.bootstrap.on_component(|context| {
		context.when_ready(|context| context.settle().unwrap());
	});

	let (_element, context) = created(&fixture);
	assert_eq!(context.status(), ComponentStatus::Ready);

	context.settle().unwrap();
	assert_eq!(context.status(), ComponentStatus::Settled);
}

#[test]
fn mounted_components_settle_right_away() {
	let fixture = Fixture::new(&widget());
	let element = MemoryElement::new("div");
	element.set_connected(true);

	let mount = fixture.definition.mount_to(&(element.clone() as ElementHandle)).unwrap();
	assert!(mount.connected());
	assert_eq!(mount.context().status(), ComponentStatus::Connected);
	assert_eq!(mount.context().local_name(), "div");
}

#[test]
fn mount_follows_element_detachment() {
	let fixture = Fixture::new(&widget());
	let element = MemoryElement::new("div");

	let mount = fixture.definition.mount_to(&(element.clone() as ElementHandle)).unwrap();
	assert_eq!(mount.context().status(), ComponentStatus::Settled);
	assert!(!mount.check_connected());

	element.set_connected(true);
	assert!(mount.check_connected());
	assert!(mount.connected());

	element.set_connected(false);
	assert!(!mount.check_connected());
	assert!(mount.context().status().is_destroyed());
}

#[test]
fn binding_twice_is_rejected() {
	let fixture = Fixture::new(&widget());
	let (element, _context) = created(&fixture);

	let err = fixture.definition.mount_to(&(element.clone() as ElementHandle)).unwrap_err();
	assert_eq!(err, UsageError::AlreadyBound { element: "x-widget".into() }.into());
	assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn once_connected_fires_on_each_connection_when_connected_once() {
	let fixture = Fixture::new(&widget());
	let (element, context) = created(&fixture);
	let every = Rc::new(Cell::new(0));
	let first = Rc::new(Cell::new(0));

	let count = Rc::clone(&every);
	context.once_connected(move |_| count.set(count.get() + 1));
	let count = Rc::clone(&first);
	context.when_connected(move |_| count.set(count.get() + 1));

	fixture.host.connect(&element);
	fixture.host.disconnect(&element);
	fixture.host.connect(&element);

	assert_eq!(every.get(), 2);
	assert_eq!(first.get(), 1);
}

#[test]
fn late_ready_receivers_are_called_right_away() {
	let fixture = Fixture::new(&widget());
	let (_element, context) = created(&fixture);
	let called = Rc::new(Cell::new(false));

	let flag = Rc::clone(&called);
	context.when_ready(move |_| flag.set(true));
	assert!(called.get());
}

#[test]
fn destruction_is_terminal() {
	let fixture = Fixture::new(&widget());
	let (element, context) = created(&fixture);
	let reasons = Rc::new(RefCell::new(Vec::new()));
	let log = Rc::clone(&reasons);
	context.when_destroyed(move |reason| log.borrow_mut().push(reason.clone()));

	context.destroy(OffReason::aborted("gone"));
	context.destroy(OffReason::Done);
	fixture.host.connect(&element);

	assert_eq!(*reasons.borrow(), vec![OffReason::aborted("gone")]);
	assert_eq!(context.status(), ComponentStatus::Destroyed);
	assert_eq!(context.component().unwrap_err(), UsageError::Destroyed { element: "x-widget".into() }.into());
	assert!(context.settle().is_err());
	assert!(context.provide(ContextValueSpec::is(&*THEME, "dark")).is_err());
}

#[test]
fn destroyed_element_can_be_bound_again() {
	let fixture = Fixture::new(&widget());
	let (element, context) = created(&fixture);
	context.destroy(OffReason::Done);

	let mount = fixture.definition.mount_to(&(element.clone() as ElementHandle)).unwrap();
	assert_ne!(mount.context(), &context);
	assert_eq!(ComponentContext::of(&*element).as_ref(), Some(mount.context()));
}

#[test]
fn scopes_resolve_through_their_parents() {
	let fixture = Fixture::new(&widget());
	let (_element, context) = created(&fixture);

	assert_eq!(context.get(ComponentContext::key()), Ok(context.clone()));
	assert_eq!(context.get(DefinitionContext::key()), Ok(fixture.definition.clone()));
	assert_eq!(context.get(BootstrapContext::key()), Ok(fixture.bootstrap.clone()));
}

#[test]
fn component_values_shadow_feature_values_and_go_with_the_component() {
	let component = ComponentClass::builder("themed").name("x-themed").per_component(ContextValueSpec::is(&*THEME, "light")).build();
	let fixture = Fixture::new(&component);
	let element = fixture.host.create("x-themed").unwrap();
	let context = ComponentContext::of(&*element).unwrap();
	assert_eq!(context.get(&THEME.seed()), Ok(vec!["light"]));

	let local = context.provide(ContextValueSpec::is(&*THEME, "dark")).unwrap();
	assert_eq!(context.get(&*THEME), Ok("dark"));
	assert_eq!(context.sources(&*THEME).map(|s| s.layers().concat()), Ok(vec!["dark", "light"]));

	context.destroy(OffReason::Done);
	assert!(local.is_off());
}

#[test]
fn observed_attribute_changes_reach_receivers_and_the_state_updater() {
	let fixture = Fixture::new(&widget());
	let (element, context) = created(&fixture);

	let paths = Rc::new(RefCell::new(Vec::new()));
	let log = Rc::clone(&paths);
	let updater: StateUpdater = Rc::new(move |path: &[&str], new: &dyn Any, _old: &dyn Any| {
		let value = new.downcast_ref::<Option<Rc<str>>>().cloned().flatten();
		log.borrow_mut().push((path.join("."), value));
	});
	context.provide(ContextValueSpec::is(&*STATE_UPDATER, updater)).unwrap();

	let changes = Rc::new(RefCell::new(Vec::new()));
	let log = Rc::clone(&changes);
	context.on_attribute_changed(move |change| log.borrow_mut().push(change.clone()));

	fixture.host.set_attribute(&element, "label", Some("hi"));
	fixture.host.set_attribute(&element, "title", Some("ignored"));

	assert_eq!(*changes.borrow(), vec![AttributeChange { name: "label".into(), old: None, new: Some("hi".into()) }]);
	assert_eq!(*paths.borrow(), vec![("attribute.label".to_string(), Some(Rc::<str>::from("hi")))]);
}

#[test]
fn premature_component_access_names_the_readiness_event() {
	let seen = Rc::new(RefCell::new(None));
	let slot = Rc::clone(&seen);
	let component = ComponentClass::builder("eager")
		.name("x-eager")
		.factory(move |context| {
			*slot.borrow_mut() = Some(context.component().unwrap_err());
			Ok(())
		})
		.build();
	let fixture = Fixture::new(&component);
	fixture.host.create("x-eager").unwrap();

	let err = seen.borrow_mut().take().unwrap();
	assert_eq!(err, UsageError::NotYetBuilt { what: "component", hint: "when_ready" }.into());
	assert_eq!(err.kind(), ErrorKind::Sequencing);
}

#[test]
fn failing_factory_destroys_the_context() {
	let component = ComponentClass::builder("broken")
		.name("x-broken")
		.factory(|_| Err::<(), _>(crate::error::FeatureError::failed("no instance").into()))
		.build();
	let fixture = Fixture::new(&component);

	let err = fixture.host.create("x-broken").unwrap_err();
	assert_eq!(err.to_string(), "no instance");

	let element = MemoryElement::new("div");
	assert!(fixture.definition.mount_to(&(element.clone() as ElementHandle)).is_err());
	let context = ComponentContext::of(&*element).unwrap();
	assert!(context.status().is_destroyed());
	assert!(context.supply().reason().is_some_and(|reason| reason.is_aborted()));
}
