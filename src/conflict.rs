use crate::selector::SelectorSet;

/// Selectors present in both projects, minus the reserved document-level ones.
pub fn detect_conflicts(host: &SelectorSet, guest: &SelectorSet) -> SelectorSet {
    host.intersection(guest)
        .filter(|s| !s.is_reserved())
        .cloned()
        .collect()
}
