use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Runs one receiver callback, containing a panic so that the remaining receivers
/// still get their delivery.
pub(crate) fn isolate(what: &'static str, f: impl FnOnce()) {
	if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
		tracing::error!(receiver = what, panic = %panic_message(payload.as_ref()), "event.receiver_panicked");
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		(*msg).to_string()
	} else if let Some(msg) = payload.downcast_ref::<String>() {
		msg.clone()
	} else {
		"<non-string panic payload>".to_string()
	}
}
