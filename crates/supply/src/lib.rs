//! Revocable supplies and event channels.
//!
//! Everything in the component engine that can be subscribed to hands out a
//! [`Supply`]: a shared, idempotently revocable handle. Cutting a supply off stops
//! future notifications, runs its `when_off` callbacks, and transitively cuts
//! off every supply that [`needs`](Supply::needs) it.
//!
//! Events are delivered through [`EventChannel`], one primitive with three
//! delivery modes:
//!
//! - [`Delivery::Multicast`]: plain fan-out, late receivers see only future events.
//! - [`Delivery::Replay`]: the latest event is latched and replayed to late receivers
//!   until [`EventChannel::clear`] un-latches it. Used for conditions that can be
//!   re-entered, like "connected".
//! - [`Delivery::Once`]: the first event is latched forever; later sends are ignored
//!   and every receiver is cut off right after its single delivery.
//!
//! The crate is single-threaded by construction (`Rc`/`RefCell`), matching the
//! cooperative event-loop model of the custom element host.

mod channel;
mod isolate;
mod supply;
mod tracker;

pub use channel::{Delivery, EventChannel};
pub use supply::{OffReason, Supply};
pub use tracker::ValueTracker;
