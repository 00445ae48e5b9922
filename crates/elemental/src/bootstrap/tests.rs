use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::LazyLock;

use elemental_context::{ContextValueSpec, ContextValues, SingleKey};
use elemental_supply::OffReason;
use futures::FutureExt;
use futures::executor::LocalPool;
use pretty_assertions::assert_eq;

use super::*;
use crate::error::ErrorKind;
use crate::feature::{FeatureBuilder, FeaturePhase, FeatureRef};

static GREETING: LazyLock<SingleKey<&'static str>> = LazyLock::new(|| SingleKey::new("greeting"));

type Log = Rc<RefCell<Vec<&'static str>>>;

fn logging(name: &'static str, log: &Log) -> FeatureBuilder {
	let log = Rc::clone(log);
	FeatureClass::builder(name).on_init(move |_| {
		log.borrow_mut().push(name);
		Ok(())
	})
}

#[test]
fn ready_is_replayed_to_late_receivers() {
	let mut pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[]).unwrap();
	assert_eq!(bootstrap.stage(), BootstrapStage::Init);

	pool.run_until(bootstrap.ready()).unwrap();
	assert!(bootstrap.is_ready());

	let called = Rc::new(Cell::new(false));
	let flag = Rc::clone(&called);
	bootstrap.when_ready(move |_| flag.set(true));
	assert!(called.get());
	assert_eq!(pool.run_until(bootstrap.ready()), Ok(()));
}

#[test]
fn shared_needs_initialize_once_before_their_dependents() {
	let log = Log::default();
	let c = logging("c", &log).build();
	let a = logging("a", &log).needs(&c).build();
	let b = logging("b", &log).needs(&c).build();

	let mut pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[a, b]).unwrap();
	pool.run_until(bootstrap.ready()).unwrap();

	assert_eq!(*log.borrow(), vec!["c", "a", "b"]);
}

#[test]
fn provided_features_are_not_loaded_separately() {
	let log = Log::default();
	let api = logging("api", &log).build();
	let implementation = logging("impl", &log).has(&api).build();
	let user = logging("user", &log).needs(&api).build();

	let mut pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[implementation.clone(), user]).unwrap();
	pool.run_until(bootstrap.ready()).unwrap();
	assert_eq!(*log.borrow(), vec!["impl", "user"]);

	let loaded = bootstrap.load(&api).unwrap();
	assert_eq!(loaded.provider(), Some(implementation));
	assert_eq!(loaded.status(), FeaturePhase::Ready);
}

#[test]
fn init_may_load_more_features() {
	let log = Log::default();
	let extra = logging("extra", &log).build();
	let kept: Rc<RefCell<Option<FeatureRef>>> = Rc::default();
	let slot = Rc::clone(&kept);
	let loader = FeatureClass::builder("loader")
		.init(move |context| {
			let loaded = context.load(&extra);
			let slot = Rc::clone(&slot);
			async move {
				let loaded = loaded?;
				loaded.when_ready().await?;
				*slot.borrow_mut() = Some(loaded);
				Ok::<(), Error>(())
			}
		})
		.build();

	let mut pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[loader]).unwrap();
	pool.run_until(bootstrap.ready()).unwrap();

	assert_eq!(*log.borrow(), vec!["extra"]);
	assert_eq!(kept.borrow().as_ref().map(FeatureRef::status), Some(FeaturePhase::Ready));
}

#[test]
fn failed_init_fails_the_bootstrap() {
	let failing = FeatureClass::builder("failing").on_init(|_| Err(FeatureError::failed("boom").into())).build();
	let dependent = FeatureClass::builder("dependent").needs(&failing).build();
	let expected = FeatureError::Init { feature: "failing".into(), message: "boom".into() };

	let mut pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[dependent]).unwrap();
	let called = Rc::new(Cell::new(false));
	let flag = Rc::clone(&called);
	bootstrap.when_ready(move |_| flag.set(true));

	let err = pool.run_until(bootstrap.ready()).unwrap_err();
	assert_eq!(err, expected.clone().into());
	assert_eq!(err.kind(), ErrorKind::Async);
	assert_eq!(bootstrap.stage(), BootstrapStage::Failed(expected));
	assert!(!called.get());
}

#[test]
fn failing_setup_fails_the_start_synchronously() {
	let broken = FeatureClass::builder("broken").setup(|_| Err(FeatureError::failed("no setup").into())).build();
	let pool = LocalPool::new();

	let err = bootstrap_components(pool.spawner(), &[broken]).unwrap_err();
	assert_eq!(err, FeatureError::failed("no setup").into());
}

#[test]
fn shut_down_executor_is_reported() {
	let spawner = LocalPool::new().spawner();
	let err = bootstrap_components(spawner, &[]).unwrap_err();
	assert_eq!(err, FeatureError::Spawn { feature: "bootstrap".into() }.into());
}

#[test]
fn loaded_features_provide_values_until_dismissed() {
	let feature = FeatureClass::builder("greeter").set(ContextValueSpec::is(&*GREETING, "hello")).build();
	let mut pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[]).unwrap();
	pool.run_until(bootstrap.ready()).unwrap();
	let before = bootstrap.feature_count();

	let loaded = bootstrap.load(&feature).unwrap();
	pool.run_until(loaded.when_ready()).unwrap();
	assert_eq!(bootstrap.feature_count(), before + 1);
	assert_eq!(bootstrap.get(&*GREETING), Ok("hello"));

	let down = loaded.down();
	loaded.dismiss(OffReason::Done);
	pool.run_until(down);
	assert_eq!(loaded.status(), FeaturePhase::Down);
	assert_eq!(bootstrap.feature_count(), before);
	assert!(bootstrap.get(&*GREETING).unwrap_err().is_missing());

	loaded.dismiss(OffReason::Done);
	assert!(loaded.is_dismissed());
}

#[test]
fn features_stay_loaded_while_any_reference_remains() {
	let feature = FeatureClass::builder("greeter").set(ContextValueSpec::is(&*GREETING, "hello")).build();
	let mut pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[]).unwrap();
	pool.run_until(bootstrap.ready()).unwrap();

	let first = bootstrap.load(&feature).unwrap();
	let second = bootstrap.load(&feature).unwrap();
	pool.run_until(second.when_ready()).unwrap();

	drop(first);
	assert_eq!(second.status(), FeaturePhase::Ready);
	assert_eq!(bootstrap.get(&*GREETING), Ok("hello"));

	drop(second);
	assert!(bootstrap.get(&*GREETING).unwrap_err().is_missing());
}

#[test]
fn dismissed_before_init_reports_unloaded() {
	let feature = FeatureClass::builder("late").build();
	let mut pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[]).unwrap();
	pool.run_until(bootstrap.ready()).unwrap();

	let loaded = bootstrap.load(&feature).unwrap();
	let ready = loaded.when_ready();
	loaded.dismiss(OffReason::Done);

	assert_eq!(pool.run_until(ready), Err(FeatureError::Unloaded { feature: "late".into() }.into()));
}

#[test]
fn waiting_for_an_undefined_component_loads_nothing() {
	let log = Log::default();
	let marker = Rc::clone(&log);
	let component = ComponentClass::builder("ghost")
		.name("x-ghost")
		.init(move |_| {
			marker.borrow_mut().push("ghost");
			async { Ok::<(), Error>(()) }
		})
		.build();

	let host = MemoryCustomElements::new();
	let mut pool = LocalPool::new();
	let bootstrap = Bootstrap::new(pool.spawner()).custom_elements(host.clone()).start(&[]).unwrap();
	pool.run_until(bootstrap.ready()).unwrap();
	let before = bootstrap.feature_count();

	let mut defined = bootstrap.when_defined(&component);
	pool.run_until_stalled();
	assert!((&mut defined).now_or_never().is_none());
	assert_eq!(bootstrap.feature_count(), before);
	assert!(host.get("x-ghost").is_none());
	assert!(log.borrow().is_empty());

	let definition = bootstrap.define(&component).unwrap();
	assert_eq!(pool.run_until(defined), Ok(definition.clone()));
	assert_eq!(*log.borrow(), vec!["ghost"]);
	assert_eq!(bootstrap.feature_count(), before + 1);
	assert_eq!(bootstrap.define(&component), Ok(definition));
}

#[test]
fn components_defined_after_ready_initialize_before_their_element_type() {
	static FLAG: LazyLock<SingleKey<u8>> = LazyLock::new(|| SingleKey::new("flag"));
	let log: Rc<RefCell<Vec<String>>> = Rc::default();
	let on_init = Rc::clone(&log);
	let on_define = Rc::clone(&log);
	let component = ComponentClass::builder("late")
		.name("x-late")
		.init(move |context| {
			context.per_definition(ContextValueSpec::is(&*FLAG, 7));
			on_init.borrow_mut().push("init".to_string());
			async { Ok::<(), Error>(()) }
		})
		.define(move |definition| {
			on_define.borrow_mut().push(format!("define flag={:?}", definition.get(&*FLAG)));
			Ok(())
		})
		.build();

	let mut pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[]).unwrap();
	pool.run_until(bootstrap.ready()).unwrap();

	let definition = bootstrap.define(&component).unwrap();
	assert!(!definition.is_ready());
	assert!(log.borrow().is_empty());

	pool.run_until(definition.ready()).unwrap();
	assert_eq!(*log.borrow(), vec!["init".to_string(), "define flag=Ok(7)".to_string()]);
	assert_eq!(definition.tag_name().as_deref(), Some("x-late"));
}

#[test]
fn failed_component_init_fails_its_definition() {
	let component = ComponentClass::builder("broken")
		.name("x-broken")
		.init(|_| async { Err::<(), Error>(FeatureError::failed("no init").into()) })
		.build();

	let mut pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[]).unwrap();
	pool.run_until(bootstrap.ready()).unwrap();

	let definition = bootstrap.define(&component).unwrap();
	let err = pool.run_until(definition.ready()).unwrap_err();
	assert_eq!(err, FeatureError::Init { feature: "broken".into(), message: "no init".into() }.into());
	assert!(definition.element_type().is_err());
}

#[test]
fn failed_bootstrap_fails_pending_definitions() {
	let component = ComponentClass::builder("widget").name("x-widget").build();
	let failing = FeatureClass::builder("failing").on_init(|_| Err(FeatureError::failed("boom").into())).build();
	let expected: Error = FeatureError::Init { feature: "failing".into(), message: "boom".into() }.into();

	let mut pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[component.feature(), failing]).unwrap();
	let definition = bootstrap.define(&component).unwrap();
	let called = Rc::new(Cell::new(false));
	let flag = Rc::clone(&called);
	definition.when_ready(move |_| flag.set(true));

	assert_eq!(pool.run_until(definition.ready()), Err(expected.clone()));
	assert!(!called.get());
	assert!(definition.element_type().is_err());
	assert_eq!(pool.run_until(bootstrap.when_defined(&component)), Err(expected));
}

#[test]
fn definition_and_component_receivers_see_new_contexts() {
	let component = ComponentClass::builder("widget").name("x-widget").build();
	let host = MemoryCustomElements::new();
	let mut pool = LocalPool::new();
	let bootstrap = Bootstrap::new(pool.spawner()).custom_elements(host.clone()).start(&[component.feature()]).unwrap();

	let definitions = Rc::new(Cell::new(0));
	let components = Rc::new(RefCell::new(Vec::new()));
	let count = Rc::clone(&definitions);
	bootstrap.on_definition(move |_| count.set(count.get() + 1));
	let log = Rc::clone(&components);
	bootstrap.on_component(move |context| log.borrow_mut().push(context.status()));

	pool.run_until(bootstrap.when_defined(&component)).unwrap();
	host.create("x-widget").unwrap();

	assert_eq!(definitions.get(), 1);
	assert_eq!(*components.borrow(), vec![crate::component::ComponentStatus::Constructed]);
}

#[test]
fn elements_created_before_definition_are_upgraded() {
	let component = ComponentClass::builder("widget").name("x-widget").build();
	let host = MemoryCustomElements::new();
	let mut pool = LocalPool::new();
	let bootstrap = Bootstrap::new(pool.spawner()).custom_elements(host.clone()).start(&[component.feature()]).unwrap();

	let element = host.create("x-widget").unwrap();
	host.connect(&element);
	assert!(!element.is_upgraded());

	pool.run_until(bootstrap.when_defined(&component)).unwrap();
	assert!(element.is_upgraded());
	let context = ComponentContext::of(&*element).unwrap();
	assert!(context.connected());
}

#[test]
fn bootstrap_resolves_itself_and_its_services() {
	let pool = LocalPool::new();
	let bootstrap = bootstrap_components(pool.spawner(), &[]).unwrap();

	assert_eq!(bootstrap.get(BootstrapContext::key()), Ok(bootstrap.clone()));
	assert!(bootstrap.custom_elements().is_ok());
	assert!(bootstrap.namespace_aliaser().is_ok());
}
