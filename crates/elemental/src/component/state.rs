use std::any::Any;
use std::rc::Rc;
use std::sync::LazyLock;

use elemental_context::SingleKey;

/// Receives component state changes: the path of the changed state, its new and old value.
pub type StateUpdater = Rc<dyn Fn(&[&str], &dyn Any, &dyn Any)>;

fn ignore_updates() -> StateUpdater {
	Rc::new(|_: &[&str], _: &dyn Any, _: &dyn Any| {})
}

/// Component state updater. Ignores updates unless provided.
pub static STATE_UPDATER: LazyLock<SingleKey<StateUpdater>> = LazyLock::new(|| SingleKey::with_default("state-updater", ignore_updates));
