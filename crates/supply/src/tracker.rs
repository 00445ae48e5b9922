use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures::channel::oneshot;

use crate::channel::EventChannel;
use crate::isolate::isolate;
use crate::supply::{OffReason, Supply};

/// A current value plus a change stream.
///
/// [`read`](Self::read) replays the current value before reporting changes,
/// so readers never miss the state they subscribed in.
pub struct ValueTracker<T> {
	value: Rc<RefCell<T>>,
	changes: EventChannel<T>,
}

impl<T> Clone for ValueTracker<T> {
	fn clone(&self) -> Self {
		Self { value: Rc::clone(&self.value), changes: self.changes.clone() }
	}
}

impl<T: Clone + PartialEq + 'static> ValueTracker<T> {
	/// A tracker holding `initial`.
	pub fn new(initial: T) -> Self {
		Self { value: Rc::new(RefCell::new(initial)), changes: EventChannel::multicast() }
	}

	/// A clone of the current value.
	pub fn get(&self) -> T {
		self.value.borrow().clone()
	}

	/// Replaces the value, notifying receivers only when it actually changed.
	///
	/// Returns the previous value.
	pub fn set(&self, value: T) -> T {
		let previous = self.value.replace(value.clone());
		if previous != value {
			self.changes.send(value);
		}
		previous
	}

	/// Receives the current value immediately, then every change.
	pub fn read(&self, callback: impl FnMut(&T) + 'static) -> Supply {
		let mut callback = callback;
		let current = self.get();
		isolate("tracker.reader", || callback(&current));
		self.changes.on(callback)
	}

	/// Receives changes only.
	pub fn on_change(&self, callback: impl FnMut(&T) + 'static) -> Supply {
		self.changes.on(callback)
	}

	/// Resolves with the first value (current or later) `select` maps to `Some`.
	///
	/// Fails with the close reason when the tracker closes first.
	pub fn when<R: 'static>(&self, mut select: impl FnMut(&T) -> Option<R> + 'static) -> impl Future<Output = Result<R, OffReason>> + 'static {
		let (tx, rx) = oneshot::channel();
		let tx = Rc::new(RefCell::new(Some(tx)));

		if let Some(found) = select(&self.get()) {
			if let Some(tx) = tx.borrow_mut().take() {
				let _ = tx.send(Ok(found));
			}
		} else {
			let supply = Supply::new();
			let on_off = Rc::clone(&tx);
			supply.when_off(move |reason| {
				if let Some(tx) = on_off.borrow_mut().take() {
					let _ = tx.send(Err(reason.clone()));
				}
			});
			let handle = supply.clone();
			self.changes.subscribe(supply, move |value| {
				if let Some(found) = select(value) {
					if let Some(tx) = tx.borrow_mut().take() {
						let _ = tx.send(Ok(found));
					}
					handle.off();
				}
			});
		}

		async move { rx.await.unwrap_or_else(|_| Err(OffReason::aborted("value tracker dropped"))) }
	}

	/// Cuts every reader off. The value stays readable through [`get`](Self::get).
	pub fn close(&self, reason: OffReason) {
		self.changes.close(reason);
	}
}
