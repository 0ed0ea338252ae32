//! Per-kind selector extraction behind a single trait.

use crate::discovery::SourceKind;
use crate::selector::SelectorSet;
use crate::{css, markup, script};

/// Pulls the selector references out of one file's text.
///
/// Extraction never fails: unparsable input degrades to a best-effort scan.
pub trait SelectorExtractor: Sync {
    fn kind(&self) -> SourceKind;
    fn extract(&self, source: &str) -> SelectorSet;
}

pub struct StylesheetExtractor;
pub struct MarkupExtractor;
pub struct ScriptExtractor;

impl SelectorExtractor for StylesheetExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::Stylesheet
    }

    fn extract(&self, source: &str) -> SelectorSet {
        css::extract_selectors(source)
    }
}

impl SelectorExtractor for MarkupExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::Markup
    }

    fn extract(&self, source: &str) -> SelectorSet {
        markup::extract_selectors(source)
    }
}

impl SelectorExtractor for ScriptExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::Script
    }

    fn extract(&self, source: &str) -> SelectorSet {
        script::extract_references(source)
    }
}

pub fn extractor_for(kind: SourceKind) -> &'static dyn SelectorExtractor {
    match kind {
        SourceKind::Stylesheet => &StylesheetExtractor,
        SourceKind::Markup => &MarkupExtractor,
        SourceKind::Script => &ScriptExtractor,
    }
}
