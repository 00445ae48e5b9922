use std::cell::RefCell;
use std::fmt;
use std::future::Future;

use elemental_supply::{OffReason, Supply, ValueTracker};

use super::{FeatureClass, FeaturePhase, FeatureRequest};
use crate::error::{Error, FeatureError};

/// A dynamically loaded feature.
///
/// Holds one use of the feature until [dismissed](Self::dismiss) or dropped.
/// The status mirrors the shared load status, except that a dismissed reference
/// reports [`FeaturePhase::Down`] even while other users keep the feature loaded.
pub struct FeatureRef {
	class: FeatureClass,
	status: ValueTracker<FeaturePhase>,
	mirror: Supply,
	request: RefCell<Option<FeatureRequest>>,
}

impl FeatureRef {
	pub(crate) fn new(class: FeatureClass, request: FeatureRequest) -> Self {
		let phase = request.loader().phase();
		let status = ValueTracker::new(phase.get());
		let sink = status.clone();
		let mirror = phase.on_change(move |phase| {
			sink.set(phase.clone());
		});
		Self { class, status, mirror, request: RefCell::new(Some(request)) }
	}

	/// The requested class. May differ from the loaded one when another feature provides it.
	pub fn class(&self) -> &FeatureClass {
		&self.class
	}

	/// The class actually loaded to satisfy this reference.
	pub fn provider(&self) -> Option<FeatureClass> {
		self.request.borrow().as_ref().map(|request| request.loader().class().clone())
	}

	pub fn status(&self) -> FeaturePhase {
		self.status.get()
	}

	/// Receives the current status, then every change.
	pub fn read(&self, receiver: impl FnMut(&FeaturePhase) + 'static) -> Supply {
		self.status.read(receiver)
	}

	/// Resolves once the feature is ready, or with the reason it never will be.
	pub fn when_ready(&self) -> impl Future<Output = Result<(), Error>> + 'static {
		let feature = self.class.name().to_string();
		let unloaded = FeatureError::Unloaded { feature };
		let outcome = {
			let unloaded = unloaded.clone();
			self.status.when(move |phase| match phase {
				FeaturePhase::Pending => None,
				FeaturePhase::Ready => Some(Ok(())),
				FeaturePhase::Failed(err) => Some(Err(err.clone())),
				FeaturePhase::Down => Some(Err(unloaded.clone())),
			})
		};
		async move {
			match outcome.await {
				Ok(result) => result.map_err(Error::from),
				Err(_) => Err(unloaded.into()),
			}
		}
	}

	/// Resolves once this reference reports [`FeaturePhase::Down`].
	pub fn down(&self) -> impl Future<Output = ()> + 'static {
		let down = self.status.when(|phase| (*phase == FeaturePhase::Down).then_some(()));
		async move {
			let _ = down.await;
		}
	}

	/// Gives up this use of the feature. Idempotent.
	///
	/// The feature unloads when no other use remains, cutting off everything it registered.
	pub fn dismiss(&self, reason: OffReason) {
		let Some(request) = self.request.borrow_mut().take() else {
			return;
		};
		tracing::debug!(feature = self.class.name(), reason = %reason, "feature.dismiss");
		self.mirror.off_with(reason.clone());
		drop(request);
		self.status.set(FeaturePhase::Down);
		self.status.close(reason);
	}

	pub fn is_dismissed(&self) -> bool {
		self.request.borrow().is_none()
	}
}

impl Drop for FeatureRef {
	fn drop(&mut self) {
		self.dismiss(OffReason::Done);
	}
}

impl fmt::Debug for FeatureRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FeatureRef").field("class", &self.class).field("status", &self.status.get()).finish()
	}
}
