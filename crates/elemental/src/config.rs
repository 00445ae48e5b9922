//! Bootstrap configuration.
//!
//! ```toml
//! [naming.aliases]
//! "https://example.com/ns/ui" = "ui"
//!
//! [elements]
//! strict_tag_names = true
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
	pub naming: NamingConfig,
	pub elements: ElementsConfig,
}

impl BootstrapConfig {
	/// Parses a TOML document; absent sections keep their defaults.
	pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(source)?)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
	/// Preferred alias per namespace URL, overriding the alias a component declares.
	pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElementsConfig {
	/// Reject tags that are not valid custom element names.
	pub strict_tag_names: bool,
}

impl Default for ElementsConfig {
	fn default() -> Self {
		Self { strict_tag_names: true }
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_document_uses_defaults() {
		assert_eq!(BootstrapConfig::from_toml(""), Ok(BootstrapConfig::default()));
		assert!(BootstrapConfig::default().elements.strict_tag_names);
	}

	#[test]
	fn parses_aliases_and_flags() {
		let config = BootstrapConfig::from_toml(
			r#"
			[naming.aliases]
			"https://example.com/ns/ui" = "ui"

			[elements]
			strict_tag_names = false
			"#,
		);
		let config = config.unwrap();
		assert_eq!(config.naming.aliases.get("https://example.com/ns/ui").map(String::as_str), Some("ui"));
		assert!(!config.elements.strict_tag_names);
	}

	#[test]
	fn rejects_unknown_fields() {
		let err = BootstrapConfig::from_toml("[elements]\nstrict = true\n").unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
	}
}
