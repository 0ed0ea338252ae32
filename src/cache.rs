use crate::discovery::SourceKind;
use crate::selector::SelectorSet;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Extraction results keyed by source kind and content hash.
///
/// Lives for one run. Identical files (vendored copies shared by host and
/// guest, duplicated partials) are only parsed once.
#[derive(Default)]
pub struct ExtractionCache {
    entries: Mutex<HashMap<(SourceKind, String), SelectorSet>>,
    hits: AtomicUsize,
}

impl ExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_hash(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<(SourceKind, String), SelectorSet>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_or_extract<F>(&self, kind: SourceKind, source: &str, extract: F) -> SelectorSet
    where
        F: FnOnce(&str) -> SelectorSet,
    {
        let key = (kind, Self::compute_hash(source));
        if let Some(hit) = self.entries().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return hit.clone();
        }

        // Extract outside the lock; two threads racing on the same content
        // produce the same set.
        let selectors = extract(source);
        self.entries().insert(key, selectors.clone());
        selectors
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Selector;

    #[test]
    fn test_identical_content_extracted_once() {
        let cache = ExtractionCache::new();
        let mut calls = 0;

        for _ in 0..3 {
            let found = cache.get_or_extract(SourceKind::Stylesheet, ".a {}", |_| {
                calls += 1;
                [Selector::class("a")].into_iter().collect()
            });
            assert!(found.contains(&Selector::class("a")));
        }

        assert_eq!(calls, 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_kind_is_part_of_the_key() {
        let cache = ExtractionCache::new();
        cache.get_or_extract(SourceKind::Stylesheet, "x", |_| SelectorSet::new());
        cache.get_or_extract(SourceKind::Script, "x", |_| SelectorSet::new());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(
            ExtractionCache::compute_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
