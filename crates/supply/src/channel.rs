use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::channel::oneshot;

use crate::isolate::isolate;
use crate::supply::{OffReason, Supply};

/// Delivery mode of an [`EventChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
	/// Fan-out to the receivers registered at send time.
	Multicast,
	/// Latches the latest event and replays it to late receivers until cleared.
	Replay,
	/// Latches the first event forever and cuts every receiver off after delivery.
	Once,
}

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Receiver<T> {
	id: u64,
	supply: Supply,
	callback: Callback<T>,
}

struct ChannelState<T> {
	delivery: Delivery,
	receivers: Vec<Receiver<T>>,
	latched: Option<T>,
	fired: bool,
	closed: Option<OffReason>,
	next_id: u64,
}

/// Single-threaded event channel handing out a [`Supply`] per receiver.
///
/// Dispatch works on a snapshot of the receivers, so receivers may subscribe,
/// unsubscribe or send from inside a callback.
pub struct EventChannel<T>(Rc<RefCell<ChannelState<T>>>);

impl<T> Clone for EventChannel<T> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<T: Clone + 'static> EventChannel<T> {
	/// An open channel with no receivers.
	pub fn new(delivery: Delivery) -> Self {
		Self(Rc::new(RefCell::new(ChannelState {
			delivery,
			receivers: Vec::new(),
			latched: None,
			fired: false,
			closed: None,
			next_id: 0,
		})))
	}

	/// See [`Delivery::Multicast`].
	pub fn multicast() -> Self {
		Self::new(Delivery::Multicast)
	}

	/// See [`Delivery::Replay`].
	pub fn replay() -> Self {
		Self::new(Delivery::Replay)
	}

	/// See [`Delivery::Once`].
	pub fn once() -> Self {
		Self::new(Delivery::Once)
	}

	/// The mode this channel was created with.
	pub fn delivery(&self) -> Delivery {
		self.0.borrow().delivery
	}

	/// Registers a receiver and returns its supply.
	pub fn on(&self, callback: impl FnMut(&T) + 'static) -> Supply {
		self.subscribe(Supply::new(), callback)
	}

	/// Registers a receiver for the first delivered event only.
	pub fn once_event(&self, callback: impl FnOnce(&T) + 'static) -> Supply {
		let supply = Supply::new();
		let handle = supply.clone();
		let mut callback = Some(callback);
		self.subscribe(supply, move |event| {
			handle.off();
			if let Some(callback) = callback.take() {
				callback(event);
			}
		})
	}

	/// Registers a receiver bound to an existing supply.
	///
	/// Latched events are replayed immediately. A closed channel cuts `supply`
	/// off with the close reason, after replaying a latched `Once` event.
	pub fn subscribe(&self, supply: Supply, callback: impl FnMut(&T) + 'static) -> Supply {
		if supply.is_off() {
			return supply;
		}
		let callback: Callback<T> = Rc::new(RefCell::new(callback));

		let (delivery, latched, closed) = {
			let state = self.0.borrow();
			(state.delivery, state.latched.clone(), state.closed.clone())
		};

		if let Some(reason) = closed {
			if let (Delivery::Once, Some(event)) = (delivery, &latched) {
				deliver(&callback, event);
			}
			supply.off_with(reason);
			return supply;
		}

		if let (Delivery::Once, Some(event)) = (delivery, &latched) {
			deliver(&callback, event);
			supply.off();
			return supply;
		}

		let id = {
			let mut state = self.0.borrow_mut();
			let id = state.next_id;
			state.next_id += 1;
			state.receivers.push(Receiver { id, supply: supply.clone(), callback: Rc::clone(&callback) });
			id
		};
		let channel: Weak<RefCell<ChannelState<T>>> = Rc::downgrade(&self.0);
		supply.when_off(move |_| {
			if let Some(state) = channel.upgrade() {
				if let Ok(mut state) = state.try_borrow_mut() {
					state.receivers.retain(|r| r.id != id);
				}
			}
		});

		if let Some(event) = latched {
			deliver(&callback, &event);
		}
		supply
	}

	/// Sends an event to every live receiver.
	///
	/// Ignored once the channel is closed, and after the first event in `Once` mode.
	pub fn send(&self, event: T) {
		let (delivery, receivers) = {
			let mut state = self.0.borrow_mut();
			if state.closed.is_some() {
				tracing::trace!("event.send_after_close");
				return;
			}
			if state.delivery == Delivery::Once && state.fired {
				return;
			}
			state.fired = true;
			if state.delivery != Delivery::Multicast {
				state.latched = Some(event.clone());
			}
			state.receivers.retain(|r| !r.supply.is_off());
			let snapshot: Vec<(Supply, Callback<T>)> =
				state.receivers.iter().map(|r| (r.supply.clone(), Rc::clone(&r.callback))).collect();
			(state.delivery, snapshot)
		};

		for (supply, callback) in receivers {
			if supply.is_off() {
				continue;
			}
			deliver(&callback, &event);
			if delivery == Delivery::Once {
				supply.off();
			}
		}
	}

	/// Drops the latched event of a `Replay` channel; late receivers no longer see it.
	pub fn clear(&self) {
		let mut state = self.0.borrow_mut();
		if state.delivery == Delivery::Replay {
			state.latched = None;
		}
	}

	/// Closes the channel, cutting every receiver off with `reason`.
	pub fn close(&self, reason: OffReason) {
		let receivers = {
			let mut state = self.0.borrow_mut();
			if state.closed.is_some() {
				return;
			}
			state.closed = Some(reason.clone());
			if state.delivery == Delivery::Replay {
				state.latched = None;
			}
			std::mem::take(&mut state.receivers)
		};
		for receiver in receivers {
			receiver.supply.off_with(reason.clone());
		}
	}

	/// Returns `true` once [`close`](Self::close) was called.
	pub fn is_closed(&self) -> bool {
		self.0.borrow().closed.is_some()
	}

	/// Returns `true` once any event has been sent.
	pub fn has_fired(&self) -> bool {
		self.0.borrow().fired
	}

	/// The latched event, if any.
	pub fn latest(&self) -> Option<T> {
		self.0.borrow().latched.clone()
	}

	/// Number of receivers whose supply is still on.
	pub fn receiver_count(&self) -> usize {
		self.0.borrow().receivers.iter().filter(|r| !r.supply.is_off()).count()
	}

	/// Resolves with the next delivered event (or the latched one), or with the
	/// reason the subscription was cut off first.
	pub fn next_event(&self) -> impl Future<Output = Result<T, OffReason>> + 'static {
		let (tx, rx) = oneshot::channel();
		let tx = Rc::new(RefCell::new(Some(tx)));

		let supply = Supply::new();
		let on_off = Rc::clone(&tx);
		supply.when_off(move |reason| {
			if let Some(tx) = on_off.borrow_mut().take() {
				let _ = tx.send(Err(reason.clone()));
			}
		});
		let handle = supply.clone();
		self.subscribe(supply, move |event| {
			if let Some(tx) = tx.borrow_mut().take() {
				let _ = tx.send(Ok(event.clone()));
			}
			handle.off();
		});

		async move { rx.await.unwrap_or_else(|_| Err(OffReason::aborted("event channel dropped"))) }
	}
}

impl<T> fmt::Debug for EventChannel<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.0.borrow();
		f.debug_struct("EventChannel")
			.field("delivery", &state.delivery)
			.field("receivers", &state.receivers.len())
			.field("fired", &state.fired)
			.field("closed", &state.closed)
			.finish()
	}
}

fn deliver<T>(callback: &Callback<T>, event: &T) {
	match callback.try_borrow_mut() {
		Ok(mut callback) => isolate("event.receiver", || (&mut *callback)(event)),
		Err(_) => tracing::warn!("event.reentrant_delivery_skipped"),
	}
}
