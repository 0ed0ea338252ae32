//! Per-kind rewriting behind a single trait.

use crate::discovery::SourceKind;
use crate::error::RewriteError;
use crate::mapping::Mapping;
use crate::{css, markup, script};

/// Applies a mapping to one file's text. Text the mapping does not touch
/// comes back byte-for-byte.
pub trait Rewriter: Sync {
    fn kind(&self) -> SourceKind;
    fn rewrite(&self, source: &str, mapping: &Mapping) -> Result<String, RewriteError>;
}

pub struct StylesheetRewriter;
pub struct MarkupRewriter;
pub struct ScriptRewriter;

impl Rewriter for StylesheetRewriter {
    fn kind(&self) -> SourceKind {
        SourceKind::Stylesheet
    }

    fn rewrite(&self, source: &str, mapping: &Mapping) -> Result<String, RewriteError> {
        Ok(css::rewrite_css(source, mapping))
    }
}

impl Rewriter for MarkupRewriter {
    fn kind(&self) -> SourceKind {
        SourceKind::Markup
    }

    fn rewrite(&self, source: &str, mapping: &Mapping) -> Result<String, RewriteError> {
        markup::rewrite_markup(source, mapping)
    }
}

impl Rewriter for ScriptRewriter {
    fn kind(&self) -> SourceKind {
        SourceKind::Script
    }

    fn rewrite(&self, source: &str, mapping: &Mapping) -> Result<String, RewriteError> {
        Ok(script::rewrite_references(source, mapping))
    }
}

pub fn rewriter_for(kind: SourceKind) -> &'static dyn Rewriter {
    match kind {
        SourceKind::Stylesheet => &StylesheetRewriter,
        SourceKind::Markup => &MarkupRewriter,
        SourceKind::Script => &ScriptRewriter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MappingGenerator, NamingScheme};
    use crate::selector::{Selector, SelectorSet};

    fn card_mapping() -> Mapping {
        let conflicts: SelectorSet = [Selector::class("card")].into_iter().collect();
        MappingGenerator::new(NamingScheme::Deterministic, "scoped")
            .unwrap()
            .generate(&conflicts, &[])
            .unwrap()
    }

    #[test]
    fn test_dispatch_by_kind() {
        for kind in [SourceKind::Stylesheet, SourceKind::Markup, SourceKind::Script] {
            assert_eq!(rewriter_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_empty_mapping_is_identity() {
        let mapping = Mapping::new();
        let sources = [
            (SourceKind::Stylesheet, ".card { color: red }"),
            (SourceKind::Markup, "<div class=\"card\">x</div>"),
            (SourceKind::Script, "el.classList.add('card');"),
        ];
        for (kind, source) in sources {
            assert_eq!(rewriter_for(kind).rewrite(source, &mapping).unwrap(), source);
        }
    }

    #[test]
    fn test_every_kind_uses_the_same_replacement() {
        let mapping = card_mapping();
        let new_name = mapping.get(".card").unwrap().replacement_name().to_string();

        let css = rewriter_for(SourceKind::Stylesheet)
            .rewrite(".card { color: red }", &mapping)
            .unwrap();
        let html = rewriter_for(SourceKind::Markup)
            .rewrite("<div class=\"card\">x</div>", &mapping)
            .unwrap();
        let js = rewriter_for(SourceKind::Script)
            .rewrite("el.classList.add('card');", &mapping)
            .unwrap();

        assert_eq!(css, format!(".{} {{ color: red }}", new_name));
        assert!(html.contains(&format!("class=\"{}\"", new_name)));
        assert_eq!(js, format!("el.classList.add('{}');", new_name));
    }
}
