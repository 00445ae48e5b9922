use elemental_context::ContextError;

/// Configuration mistakes, surfaced synchronously at registration or resolution time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
	#[error(transparent)]
	Context(#[from] ContextError),

	#[error("feature dependency cycle: {}", .path.join(" -> "))]
	DependencyCycle { path: Vec<String> },

	#[error("invalid custom element name {tag:?}: {reason}")]
	InvalidTagName { tag: String, reason: &'static str },

	#[error("invalid bootstrap configuration: {message}")]
	Parse { message: String },
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		Self::Parse { message: err.to_string() }
	}
}

/// API misuse at the call site.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
	#[error("element <{element}> is already bound to a component")]
	AlreadyBound { element: String },

	#[error("component <{element}> is destroyed")]
	Destroyed { element: String },

	/// Premature access; recoverable by waiting for the readiness event named by `hint`.
	#[error("{what} is not built yet; wait for `{hint}` instead")]
	NotYetBuilt { what: &'static str, hint: &'static str },

	#[error("component is not of type {expected}")]
	ComponentType { expected: &'static str },
}

/// Asynchronous feature failure, reported through futures and status trackers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeatureError {
	/// Raised by feature code.
	#[error("{0}")]
	Failed(String),

	#[error("feature `{feature}` failed to initialize: {message}")]
	Init { feature: String, message: String },

	#[error("feature `{feature}` was unloaded")]
	Unloaded { feature: String },

	#[error("cannot spawn initialization of feature `{feature}`: executor is shut down")]
	Spawn { feature: String },
}

impl FeatureError {
	pub fn failed(message: impl Into<String>) -> Self {
		Self::Failed(message.into())
	}
}

/// Custom element host failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
	#[error("custom element <{tag}> is already defined")]
	AlreadyDefined { tag: String },

	#[error("definition of custom element <{tag}> is gone")]
	DefinitionDropped { tag: String },

	#[error("custom element registry dropped before <{tag}> got defined")]
	Dropped { tag: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Configuration,
	Usage,
	/// Premature access, fixed by awaiting a readiness event.
	Sequencing,
	Async,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Usage(#[from] UsageError),

	#[error(transparent)]
	Feature(#[from] FeatureError),

	#[error(transparent)]
	Host(#[from] HostError),
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) => ErrorKind::Configuration,
			Self::Usage(UsageError::NotYetBuilt { .. }) => ErrorKind::Sequencing,
			Self::Usage(_) | Self::Host(HostError::AlreadyDefined { .. }) => ErrorKind::Usage,
			Self::Feature(_) | Self::Host(_) => ErrorKind::Async,
		}
	}
}

impl From<ContextError> for Error {
	fn from(err: ContextError) -> Self {
		Self::Config(ConfigError::Context(err))
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case::missing(ContextError::Missing { key: "k" }.into(), ErrorKind::Configuration)]
	#[case::cycle(ConfigError::DependencyCycle { path: vec![] }.into(), ErrorKind::Configuration)]
	#[case::bound(UsageError::AlreadyBound { element: "x-a".into() }.into(), ErrorKind::Usage)]
	#[case::premature(UsageError::NotYetBuilt { what: "element type", hint: "when_ready" }.into(), ErrorKind::Sequencing)]
	#[case::init(FeatureError::failed("boom").into(), ErrorKind::Async)]
	#[case::redefined(HostError::AlreadyDefined { tag: "x-a".into() }.into(), ErrorKind::Usage)]
	fn classifies(#[case] err: Error, #[case] kind: ErrorKind) {
		assert_eq!(err.kind(), kind);
	}

	#[test]
	fn messages_name_the_subject() {
		let cycle: Error = ConfigError::DependencyCycle { path: vec!["x".into(), "y".into(), "x".into()] }.into();
		assert_eq!(cycle.to_string(), "feature dependency cycle: x -> y -> x");

		let premature: Error = UsageError::NotYetBuilt { what: "element type", hint: "when_ready" }.into();
		assert_eq!(premature.to_string(), "element type is not built yet; wait for `when_ready` instead");

		let missing: Error = ContextError::Missing { key: "greeting" }.into();
		assert_eq!(missing.to_string(), "no value provided for ContextKey(greeting)");
	}
}
