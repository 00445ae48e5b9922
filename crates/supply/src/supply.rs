use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::isolate::isolate;

/// Why a [`Supply`] was cut off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffReason {
	/// Normal completion: the subscription, feature or component is done.
	Done,
	/// Abnormal termination carrying a human-readable cause.
	Aborted(Rc<str>),
}

impl OffReason {
	/// Creates an [`OffReason::Aborted`] reason.
	pub fn aborted(cause: impl Into<Rc<str>>) -> Self {
		Self::Aborted(cause.into())
	}

	/// Returns `true` for [`OffReason::Aborted`].
	pub fn is_aborted(&self) -> bool {
		matches!(self, Self::Aborted(_))
	}
}

impl fmt::Display for OffReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Done => f.write_str("done"),
			Self::Aborted(cause) => write!(f, "aborted: {cause}"),
		}
	}
}

type OffCallback = Box<dyn FnOnce(&OffReason)>;

#[derive(Default)]
struct SupplyState {
	off: Option<OffReason>,
	callbacks: Vec<OffCallback>,
}

/// Revocable handle of a subscription or any other resource with a lifetime.
///
/// Clones share the same state. Dropping a handle does not cut the supply off;
/// only [`off`](Self::off) / [`off_with`](Self::off_with) do, exactly once.
#[derive(Clone, Default)]
pub struct Supply(Rc<RefCell<SupplyState>>);

impl Supply {
	/// Creates a new supply that is not cut off yet.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a supply that is already cut off with the given reason.
	pub fn cut_off(reason: OffReason) -> Self {
		let supply = Self::new();
		supply.off_with(reason);
		supply
	}

	/// Returns `true` once this supply has been cut off.
	pub fn is_off(&self) -> bool {
		self.0.borrow().off.is_some()
	}

	/// Returns the cut-off reason, if the supply is cut off.
	pub fn reason(&self) -> Option<OffReason> {
		self.0.borrow().off.clone()
	}

	/// Cuts this supply off with [`OffReason::Done`].
	pub fn off(&self) {
		self.off_with(OffReason::Done);
	}

	/// Cuts this supply off.
	///
	/// The first call wins; later calls are no-ops. Registered `when_off`
	/// callbacks run in registration order, each isolated from the others.
	pub fn off_with(&self, reason: OffReason) {
		let callbacks = {
			let mut state = self.0.borrow_mut();
			if state.off.is_some() {
				return;
			}
			state.off = Some(reason.clone());
			std::mem::take(&mut state.callbacks)
		};
		for callback in callbacks {
			isolate("supply.when_off", || callback(&reason));
		}
	}

	/// Registers a callback invoked when this supply is cut off.
	///
	/// Runs immediately when the supply is cut off already.
	pub fn when_off(&self, callback: impl FnOnce(&OffReason) + 'static) -> &Self {
		let reason = {
			let mut state = self.0.borrow_mut();
			match &state.off {
				Some(reason) => reason.clone(),
				None => {
					state.callbacks.push(Box::new(callback));
					return self;
				}
			}
		};
		isolate("supply.when_off", || callback(&reason));
		self
	}

	/// Makes this supply depend on `other`: cutting `other` off cuts this one off
	/// with the same reason.
	pub fn needs(&self, other: &Supply) -> &Self {
		let dependent = Rc::downgrade(&self.0);
		other.when_off(move |reason| {
			if let Some(state) = Weak::upgrade(&dependent) {
				Supply(state).off_with(reason.clone());
			}
		});
		self
	}

	/// Makes `other` depend on this supply.
	pub fn cuts(&self, other: &Supply) -> &Self {
		other.needs(self);
		self
	}

	/// Creates a new supply that is cut off together with this one.
	pub fn derive(&self) -> Supply {
		let derived = Supply::new();
		derived.needs(self);
		derived
	}

	/// Returns `true` when both handles refer to the same supply.
	pub fn ptr_eq(&self, other: &Supply) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for Supply {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Supply").field("off", &self.0.borrow().off).finish()
	}
}
