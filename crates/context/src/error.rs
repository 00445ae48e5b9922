/// Context value resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
	/// Nothing provided a value and the key has no default.
	#[error("no value provided for ContextKey({key})")]
	Missing { key: &'static str },

	/// A provider needed the value of the key it is providing.
	#[error("cyclic resolution of ContextKey({key})")]
	Cycle { key: &'static str },

	/// A provider produced a value of the wrong type.
	#[error("value provided for ContextKey({key}) has unexpected type")]
	TypeMismatch { key: &'static str },
}

impl ContextError {
	/// Name of the key the error is about.
	pub fn key(&self) -> &'static str {
		match self {
			Self::Missing { key } | Self::Cycle { key } | Self::TypeMismatch { key } => key,
		}
	}

	/// Returns `true` when nothing provided the key.
	pub fn is_missing(&self) -> bool {
		matches!(self, Self::Missing { .. })
	}
}
