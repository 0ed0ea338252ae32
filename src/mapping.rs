//! Mapping Module
//!
//! Assigns every conflicting selector a replacement identifier and keeps the
//! resulting original → replacement table. The table is injective: inserting
//! a second original with an already issued replacement is an error.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use crate::error::ResolveError;
use crate::selector::{is_identifier, Selector, SelectorKind, SelectorSet};

/// Retry budget for the random scheme before giving up on a selector.
const MAX_RANDOM_ATTEMPTS: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// MAPPING TABLE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorMapping {
    pub original: String,
    pub replacement: String,
    pub kind: SelectorKind,
}

impl SelectorMapping {
    /// Replacement without its `.`/`#` prefix, as it appears in attributes
    /// and in bare-identifier script literals.
    pub fn replacement_name(&self) -> &str {
        &self.replacement[self.kind.prefix().len()..]
    }
}

/// Original selector key → mapping record. Serializes as the plain map, which
/// is also the on-disk report format.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Mapping {
    entries: BTreeMap<String, SelectorMapping>,
    #[serde(skip)]
    issued: HashMap<String, String>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: SelectorMapping) -> Result<(), ResolveError> {
        if let Some(existing) = self.issued.get(&entry.replacement) {
            if *existing != entry.original {
                return Err(ResolveError::DuplicateReplacement {
                    replacement: entry.replacement,
                    existing: existing.clone(),
                });
            }
        }
        if let Some(previous) = self.entries.remove(&entry.original) {
            self.issued.remove(&previous.replacement);
        }
        self.issued
            .insert(entry.replacement.clone(), entry.original.clone());
        self.entries.insert(entry.original.clone(), entry);
        Ok(())
    }

    pub fn get(&self, original: &str) -> Option<&SelectorMapping> {
        self.entries.get(original)
    }

    /// Full replacement key for a selector, e.g. `.card` → `.scoped-1a2b3c4d-0`.
    pub fn replacement_for(&self, selector: &Selector) -> Option<&str> {
        self.entries
            .get(&selector.key())
            .map(|m| m.replacement.as_str())
    }

    /// Bare replacement name for a `(kind, name)` pair.
    pub fn renamed(&self, kind: SelectorKind, name: &str) -> Option<&str> {
        let key = format!("{}{}", kind.prefix(), name);
        self.entries.get(&key).map(|m| m.replacement_name())
    }

    pub fn contains_replacement(&self, replacement: &str) -> bool {
        self.issued.contains_key(replacement)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectorMapping> {
        self.entries.values()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATION
// ═══════════════════════════════════════════════════════════════════════════════

/// How replacement identifiers are minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingScheme {
    /// `<prefix>-<salt>-<counter>`; reproducible for identical inputs.
    #[default]
    Deterministic,
    /// `<prefix>-<8 hex digits of a v4 UUID>`, retried on collision.
    Random,
}

#[derive(Debug, Clone)]
pub struct MappingGenerator {
    scheme: NamingScheme,
    prefix: String,
}

impl MappingGenerator {
    pub fn new(scheme: NamingScheme, prefix: impl Into<String>) -> Result<Self, ResolveError> {
        let prefix = prefix.into();
        if !is_identifier(&prefix) {
            return Err(ResolveError::InvalidPrefix(prefix));
        }
        Ok(Self { scheme, prefix })
    }

    /// Build the mapping for `conflicts`. Names already used by any selector
    /// in `existing` are never handed out, whatever their kind.
    pub fn generate(
        &self,
        conflicts: &SelectorSet,
        existing: &[&SelectorSet],
    ) -> Result<Mapping, ResolveError> {
        let taken: HashSet<&str> = existing
            .iter()
            .flat_map(|set| set.iter().map(|s| s.name()))
            .collect();

        let mut mapping = Mapping::new();
        let salt = conflict_salt(conflicts);
        let mut counter: u64 = 0;

        for selector in conflicts {
            let name = match self.scheme {
                NamingScheme::Deterministic => loop {
                    let candidate = format!("{}-{}-{:x}", self.prefix, salt, counter);
                    counter += 1;
                    if !taken.contains(candidate.as_str()) {
                        break candidate;
                    }
                },
                NamingScheme::Random => self.random_name(selector, &taken, &mapping)?,
            };

            let replacement = format!("{}{}", selector.kind().prefix(), name);
            debug!("Mapping {} -> {}", selector, replacement);
            mapping.insert(SelectorMapping {
                original: selector.key(),
                replacement,
                kind: selector.kind(),
            })?;
        }

        Ok(mapping)
    }

    fn random_name(
        &self,
        selector: &Selector,
        taken: &HashSet<&str>,
        mapping: &Mapping,
    ) -> Result<String, ResolveError> {
        for _ in 0..MAX_RANDOM_ATTEMPTS {
            let hex = Uuid::new_v4().simple().to_string();
            let candidate = format!("{}-{}", self.prefix, &hex[..8]);
            let as_replacement = format!("{}{}", selector.kind().prefix(), candidate);
            if !taken.contains(candidate.as_str()) && !mapping.contains_replacement(&as_replacement)
            {
                return Ok(candidate);
            }
        }
        Err(ResolveError::NamespaceExhausted {
            selector: selector.key(),
            attempts: MAX_RANDOM_ATTEMPTS,
        })
    }
}

/// First 8 hex digits of a SHA-256 over the sorted conflict keys.
fn conflict_salt(conflicts: &SelectorSet) -> String {
    let mut hasher = Sha256::new();
    for selector in conflicts {
        hasher.update(selector.key().as_bytes());
        hasher.update(b"\n");
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> SelectorSet {
        keys.iter().filter_map(|k| Selector::parse(k)).collect()
    }

    #[test]
    fn test_kind_is_preserved() {
        let conflicts = set(&[".card", "#menu", "nav"]);
        let generator = MappingGenerator::new(NamingScheme::Deterministic, "scoped").unwrap();
        let mapping = generator.generate(&conflicts, &[]).unwrap();

        let card = mapping.get(".card").unwrap();
        assert!(card.replacement.starts_with(".scoped-"));
        assert_eq!(card.kind, SelectorKind::Class);

        let menu = mapping.get("#menu").unwrap();
        assert!(menu.replacement.starts_with("#scoped-"));
        assert_eq!(menu.replacement_name(), &menu.replacement[1..]);

        let nav = mapping.get("nav").unwrap();
        assert!(nav.replacement.starts_with("scoped-"));
        assert_eq!(nav.replacement_name(), nav.replacement);
    }

    #[test]
    fn test_injective() {
        let keys: Vec<String> = (0..200).map(|i| format!(".c{}", i)).collect();
        let refs: Vec<&str> = keys.iter().map(|s| s.as_str()).collect();
        let conflicts = set(&refs);

        for scheme in [NamingScheme::Deterministic, NamingScheme::Random] {
            let mapping = MappingGenerator::new(scheme, "x")
                .unwrap()
                .generate(&conflicts, &[])
                .unwrap();
            let replacements: HashSet<&str> =
                mapping.iter().map(|m| m.replacement.as_str()).collect();
            assert_eq!(replacements.len(), conflicts.len());
        }
    }

    #[test]
    fn test_deterministic_is_reproducible() {
        let conflicts = set(&[".card", ".btn", "#menu"]);
        let generator = MappingGenerator::new(NamingScheme::Deterministic, "scoped").unwrap();
        let first = generator.generate(&conflicts, &[]).unwrap();
        let second = generator.generate(&conflicts, &[]).unwrap();
        let a: Vec<_> = first.iter().cloned().collect();
        let b: Vec<_> = second.iter().cloned().collect();
        assert_eq!(a, b);

        // A different guest gets a different salt
        let other = generator.generate(&set(&[".card"]), &[]).unwrap();
        assert_ne!(
            other.get(".card").unwrap().replacement,
            first.get(".card").unwrap().replacement
        );
    }

    #[test]
    fn test_skips_names_already_in_use() {
        let conflicts = set(&[".card"]);
        let salt = conflict_salt(&conflicts);
        let squatter_key = format!(".scoped-{}-0", salt);
        let squatter = set(&[squatter_key.as_str()]);

        let mapping = MappingGenerator::new(NamingScheme::Deterministic, "scoped")
            .unwrap()
            .generate(&conflicts, &[&squatter])
            .unwrap();
        assert_eq!(
            mapping.get(".card").unwrap().replacement,
            format!(".scoped-{}-1", salt)
        );
    }

    #[test]
    fn test_insert_rejects_shared_replacement() {
        let mut mapping = Mapping::new();
        mapping
            .insert(SelectorMapping {
                original: ".a".to_string(),
                replacement: ".z".to_string(),
                kind: SelectorKind::Class,
            })
            .unwrap();
        let err = mapping
            .insert(SelectorMapping {
                original: ".b".to_string(),
                replacement: ".z".to_string(),
                kind: SelectorKind::Class,
            })
            .unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateReplacement { .. }));
    }

    #[test]
    fn test_invalid_prefix() {
        assert!(MappingGenerator::new(NamingScheme::Random, "1abc").is_err());
        assert!(MappingGenerator::new(NamingScheme::Random, "has space").is_err());
        assert!(MappingGenerator::new(NamingScheme::Random, "ok-prefix").is_ok());
    }

    #[test]
    fn test_report_shape() {
        let conflicts = set(&[".card"]);
        let mapping = MappingGenerator::new(NamingScheme::Deterministic, "scoped")
            .unwrap()
            .generate(&conflicts, &[])
            .unwrap();
        let json = serde_json::to_value(&mapping).unwrap();
        let entry = &json[".card"];
        assert_eq!(entry["original"], ".card");
        assert_eq!(entry["kind"], "class");
        assert!(entry["replacement"].as_str().unwrap().starts_with(".scoped-"));
    }
}
