//! Selector values shared by every extractor and rewriter.
//!
//! A selector is a `(kind, name)` pair. Its canonical key is `.name` for
//! classes, `#name` for ids and the bare `name` for elements; two selectors
//! are equal iff their keys are equal, whatever source they came from.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

lazy_static! {
    /// Identifier shape used by the stylesheet token patterns.
    static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").unwrap();
}

/// Structural selectors that are never renamed, under every spelling.
pub const RESERVED_SELECTORS: &[&str] = &[".body", "#body", ".html", "#html", "body", "html"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Class,
    Id,
    Element,
}

impl SelectorKind {
    /// Syntactic prefix of the canonical key.
    pub fn prefix(self) -> &'static str {
        match self {
            SelectorKind::Class => ".",
            SelectorKind::Id => "#",
            SelectorKind::Element => "",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SelectorKind::Class => "class",
            SelectorKind::Id => "id",
            SelectorKind::Element => "element",
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector {
    kind: SelectorKind,
    name: String,
}

impl Selector {
    pub fn new(kind: SelectorKind, name: impl Into<String>) -> Self {
        Selector {
            kind,
            name: name.into(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(SelectorKind::Class, name)
    }

    pub fn id(name: impl Into<String>) -> Self {
        Self::new(SelectorKind::Id, name)
    }

    pub fn element(name: impl Into<String>) -> Self {
        Self::new(SelectorKind::Element, name)
    }

    /// Parse a canonical key. Bare keys must be identifier-shaped to count
    /// as element selectors; prefixed keys only need a non-empty name.
    pub fn parse(key: &str) -> Option<Self> {
        if let Some(name) = key.strip_prefix('.') {
            (!name.is_empty()).then(|| Self::class(name))
        } else if let Some(name) = key.strip_prefix('#') {
            (!name.is_empty()).then(|| Self::id(name))
        } else if is_identifier(key) {
            Some(Self::element(key))
        } else {
            None
        }
    }

    pub fn kind(&self) -> SelectorKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical string key (`.name`, `#name` or `name`).
    pub fn key(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.name)
    }

    pub fn is_reserved(&self) -> bool {
        let key = self.key();
        RESERVED_SELECTORS.contains(&key.as_str())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.name)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

/// One project's selectors.
pub type SelectorSet = BTreeSet<Selector>;

/// True when `s` has the `[A-Za-z][A-Za-z0-9_-]*` identifier shape.
pub fn is_identifier(s: &str) -> bool {
    IDENT_RE.is_match(s)
}
