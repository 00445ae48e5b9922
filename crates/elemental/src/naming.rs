//! Custom element naming.
//!
//! Components name their element either with a plain tag or with a local name in
//! a namespace. Namespaced names are turned into `alias-local` tags by the
//! bootstrap-wide [`NamespaceAliaser`], which keeps aliases unique per namespace URL.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ConfigError;

/// A namespace with its preferred alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceDef {
	pub url: Rc<str>,
	pub alias: Rc<str>,
}

impl NamespaceDef {
	pub fn new(url: impl Into<Rc<str>>, alias: impl Into<Rc<str>>) -> Self {
		Self { url: url.into(), alias: alias.into() }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementName {
	Plain(Rc<str>),
	Namespaced { local: Rc<str>, ns: NamespaceDef },
}

impl ElementName {
	pub fn namespaced(local: impl Into<Rc<str>>, ns: NamespaceDef) -> Self {
		Self::Namespaced { local: local.into(), ns }
	}
}

impl From<&str> for ElementName {
	fn from(tag: &str) -> Self {
		Self::Plain(tag.into())
	}
}

impl From<String> for ElementName {
	fn from(tag: String) -> Self {
		Self::Plain(tag.into())
	}
}

impl fmt::Display for ElementName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Plain(tag) => f.write_str(tag),
			Self::Namespaced { local, ns } => write!(f, "{local} ({})", ns.url),
		}
	}
}

#[derive(Default)]
struct AliaserState {
	preferred: BTreeMap<String, String>,
	by_url: FxHashMap<Rc<str>, Rc<str>>,
	taken: FxHashSet<Rc<str>>,
}

/// Assigns unique aliases to namespaces.
///
/// The first namespace asking for an alias gets it; later namespaces asking for
/// the same alias get `alias1`, `alias2`, and so on.
#[derive(Clone, Default)]
pub struct NamespaceAliaser(Rc<RefCell<AliaserState>>);

impl NamespaceAliaser {
	/// Creates an aliaser honoring configured aliases per namespace URL.
	pub fn new(preferred: BTreeMap<String, String>) -> Self {
		Self(Rc::new(RefCell::new(AliaserState { preferred, ..AliaserState::default() })))
	}

	pub fn alias(&self, ns: &NamespaceDef) -> Rc<str> {
		let mut state = self.0.borrow_mut();
		if let Some(alias) = state.by_url.get(&ns.url) {
			return Rc::clone(alias);
		}
		let preferred: Rc<str> = match state.preferred.get(&*ns.url) {
			Some(alias) => alias.as_str().into(),
			None => Rc::clone(&ns.alias),
		};
		let mut alias = Rc::clone(&preferred);
		let mut n = 1;
		while state.taken.contains(&alias) {
			alias = format!("{preferred}{n}").into();
			n += 1;
		}
		state.taken.insert(Rc::clone(&alias));
		state.by_url.insert(Rc::clone(&ns.url), Rc::clone(&alias));
		tracing::debug!(url = %ns.url, alias = %alias, "naming.alias");
		alias
	}

	pub fn tag_name(&self, name: &ElementName) -> String {
		match name {
			ElementName::Plain(tag) => tag.to_string(),
			ElementName::Namespaced { local, ns } => format!("{}-{local}", self.alias(ns)),
		}
	}
}

impl fmt::Debug for NamespaceAliaser {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NamespaceAliaser").field("aliases", &self.0.borrow().by_url.len()).finish()
	}
}

const RESERVED_TAGS: &[&str] = &[
	"annotation-xml",
	"color-profile",
	"font-face",
	"font-face-src",
	"font-face-uri",
	"font-face-format",
	"font-face-name",
	"missing-glyph",
];

/// Checks that `tag` is a valid custom element name.
pub fn validate_tag_name(tag: &str) -> Result<(), ConfigError> {
	let invalid = |reason| Err(ConfigError::InvalidTagName { tag: tag.to_string(), reason });
	match tag.chars().next() {
		None => return invalid("name is empty"),
		Some(c) if !c.is_ascii_lowercase() => return invalid("must start with a lowercase ASCII letter"),
		Some(_) => {}
	}
	if !tag.contains('-') {
		return invalid("must contain a hyphen");
	}
	if tag.chars().any(|c| c.is_ascii() && !matches!(c, 'a'..='z' | '0'..='9' | '-' | '.' | '_')) {
		return invalid("contains a character not allowed in custom element names");
	}
	if RESERVED_TAGS.contains(&tag) {
		return invalid("name is reserved");
	}
	Ok(())
}
