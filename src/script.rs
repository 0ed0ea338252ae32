//! Script Module
//!
//! Best-effort detection of selector usage in script text. There is no
//! script parser here: a fixed catalogue of DOM call-site shapes is matched
//! with regexes and the string literal arguments are read by hand. Whatever
//! the catalogue recognizes is both extracted and rewritten; whatever it
//! misses (computed selectors, string concatenation, escapes) is left alone.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::ops::Range;
use tracing::debug;

use crate::css;
use crate::mapping::Mapping;
use crate::selector::{is_identifier, Selector, SelectorKind, SelectorSet};

/// How the literal argument of a call site is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSiteShape {
    /// A full CSS selector (`querySelector('.card .title')`).
    SelectorQuery,
    /// A bare id (`getElementById('menu')`).
    IdLookup,
    /// Whitespace-separated class names (`className = 'a b'`).
    ClassNames,
    /// One class name per argument (`classList.add('a', 'b')`).
    ClassListMutation,
}

pub struct CallSitePattern {
    pub api: &'static str,
    pub shape: CallSiteShape,
    /// Whether every literal in a comma-separated argument list counts.
    pub all_arguments: bool,
    regex: Regex,
}

impl CallSitePattern {
    fn new(api: &'static str, shape: CallSiteShape, pattern: &str, all_arguments: bool) -> Self {
        Self {
            api,
            shape,
            all_arguments,
            regex: Regex::new(pattern).unwrap(),
        }
    }
}

lazy_static! {
    /// Every pattern ends right where the first literal argument starts.
    pub static ref CALL_SITE_CATALOGUE: Vec<CallSitePattern> = vec![
        CallSitePattern::new(
            "querySelector",
            CallSiteShape::SelectorQuery,
            r"\bquerySelector(?:All)?\s*\(\s*",
            false,
        ),
        CallSitePattern::new(
            "closest/matches",
            CallSiteShape::SelectorQuery,
            r"\.\s*(?:closest|matches)\s*\(\s*",
            false,
        ),
        CallSitePattern::new("$", CallSiteShape::SelectorQuery, r"(?:^|[^\w$.])\$\s*\(\s*", false),
        CallSitePattern::new("jQuery", CallSiteShape::SelectorQuery, r"\bjQuery\s*\(\s*", false),
        CallSitePattern::new(
            "getElementById",
            CallSiteShape::IdLookup,
            r"\bgetElementById\s*\(\s*",
            false,
        ),
        CallSitePattern::new(
            "setAttribute(id)",
            CallSiteShape::IdLookup,
            r#"\bsetAttribute\s*\(\s*["']id["']\s*,\s*"#,
            false,
        ),
        CallSitePattern::new(
            "getElementsByClassName",
            CallSiteShape::ClassNames,
            r"\bgetElementsByClassName\s*\(\s*",
            false,
        ),
        CallSitePattern::new("className", CallSiteShape::ClassNames, r"\bclassName\s*=\s*", false),
        CallSitePattern::new(
            "setAttribute(class)",
            CallSiteShape::ClassNames,
            r#"\bsetAttribute\s*\(\s*["']class["']\s*,\s*"#,
            false,
        ),
        CallSitePattern::new(
            "classList",
            CallSiteShape::ClassListMutation,
            r"\bclassList\s*\.\s*(?:add|remove|toggle|contains|replace)\s*\(\s*",
            true,
        ),
    ];

    static ref NON_SPACE_RE: Regex = Regex::new(r"\S+").unwrap();
}

/// A string literal argument found at a recognized call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralRef {
    pub shape: CallSiteShape,
    /// Byte range of the literal's contents, quotes excluded.
    pub span: Range<usize>,
}

/// Read a quoted literal starting at `pos`. Returns the content range and the
/// offset just past the closing quote. Literals with escapes or `${}`
/// interpolation are not understood and yield `None`.
fn read_literal(src: &str, pos: usize) -> Option<(Range<usize>, usize)> {
    let bytes = src.as_bytes();
    let quote = *bytes.get(pos)?;
    if !matches!(quote, b'\'' | b'"' | b'`') {
        return None;
    }

    let mut i = pos + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            return None;
        }
        if b == b'\n' && quote != b'`' {
            return None;
        }
        if quote == b'`' && b == b'$' && bytes.get(i + 1) == Some(&b'{') {
            return None;
        }
        if b == quote {
            return Some((pos + 1..i, i + 1));
        }
        i += 1;
    }

    None
}

/// All literal arguments at catalogue call sites, in source order and
/// without overlaps.
pub fn find_literal_refs(src: &str) -> Vec<LiteralRef> {
    let mut refs = Vec::new();

    for pattern in CALL_SITE_CATALOGUE.iter() {
        for m in pattern.regex.find_iter(src) {
            let mut pos = m.end();
            while let Some((span, end)) = read_literal(src, pos) {
                debug!("{} call site literal at {:?}", pattern.api, span);
                refs.push(LiteralRef {
                    shape: pattern.shape,
                    span,
                });
                if !pattern.all_arguments {
                    break;
                }
                let Some(after_comma) = src[end..].trim_start().strip_prefix(',') else {
                    break;
                };
                pos = src.len() - after_comma.trim_start().len();
            }
        }
    }

    refs.sort_by_key(|r| r.span.start);
    let mut last_end = 0;
    refs.retain(|r| {
        if r.span.start < last_end {
            return false;
        }
        last_end = r.span.end;
        true
    });
    refs
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// `.x`/`#x` stay as written; anything else is a class name.
fn normalize_class_token(token: &str) -> Option<Selector> {
    if token.starts_with('.') || token.starts_with('#') {
        Selector::parse(token)
    } else if token.is_empty() {
        None
    } else {
        Some(Selector::class(token))
    }
}

fn literal_selectors(shape: CallSiteShape, literal: &str, selectors: &mut SelectorSet) {
    let trimmed = literal.trim();
    match shape {
        CallSiteShape::SelectorQuery => {
            if is_identifier(trimmed) {
                // A lone bare word is taken as an implied class
                selectors.insert(Selector::class(trimmed));
            } else {
                selectors.extend(css::selector_tokens(trimmed));
            }
        }
        CallSiteShape::IdLookup => {
            let name = trimmed.strip_prefix('#').unwrap_or(trimmed);
            if !name.is_empty() && !name.contains(char::is_whitespace) {
                selectors.insert(Selector::id(name));
            }
        }
        CallSiteShape::ClassNames => {
            selectors.extend(trimmed.split_whitespace().filter_map(normalize_class_token));
        }
        CallSiteShape::ClassListMutation => {
            if !trimmed.contains(char::is_whitespace) {
                selectors.extend(normalize_class_token(trimmed));
            }
        }
    }
}

/// Selectors referenced by recognized call sites in `src`.
pub fn extract_references(src: &str) -> SelectorSet {
    let mut selectors = SelectorSet::new();
    for r in find_literal_refs(src) {
        literal_selectors(r.shape, &src[r.span.clone()], &mut selectors);
    }
    selectors
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWRITING
// ═══════════════════════════════════════════════════════════════════════════════

fn rename_class_token(token: &str, mapping: &Mapping) -> Option<String> {
    if token.starts_with('.') || token.starts_with('#') {
        let selector = Selector::parse(token)?;
        mapping.replacement_for(&selector).map(str::to_string)
    } else {
        mapping
            .renamed(SelectorKind::Class, token)
            .map(str::to_string)
    }
}

/// Swap the trimmed core of `literal` for `replacement`, keeping padding.
fn replace_trimmed(literal: &str, replacement: &str) -> String {
    let start = literal.len() - literal.trim_start().len();
    let end = literal.trim_end().len();
    format!("{}{}{}", &literal[..start], replacement, &literal[end..])
}

fn rewrite_literal(shape: CallSiteShape, literal: &str, mapping: &Mapping) -> Option<String> {
    let trimmed = literal.trim();
    let rewritten = match shape {
        CallSiteShape::SelectorQuery => {
            if is_identifier(trimmed) {
                let renamed = mapping.renamed(SelectorKind::Class, trimmed)?;
                replace_trimmed(literal, renamed)
            } else {
                css::rewrite_css(literal, mapping)
            }
        }
        CallSiteShape::IdLookup => {
            let (prefix, name) = match trimmed.strip_prefix('#') {
                Some(name) => ("#", name),
                None => ("", trimmed),
            };
            let renamed = mapping.renamed(SelectorKind::Id, name)?;
            replace_trimmed(literal, &format!("{}{}", prefix, renamed))
        }
        CallSiteShape::ClassNames => NON_SPACE_RE
            .replace_all(literal, |caps: &Captures| {
                rename_class_token(&caps[0], mapping).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned(),
        CallSiteShape::ClassListMutation => {
            let renamed = rename_class_token(trimmed, mapping)?;
            replace_trimmed(literal, &renamed)
        }
    };

    (rewritten != literal).then_some(rewritten)
}

/// Rewrite the literals at recognized call sites, leaving every other byte
/// of `src` untouched.
pub fn rewrite_references(src: &str, mapping: &Mapping) -> String {
    if mapping.is_empty() {
        return src.to_string();
    }

    let replacements: Vec<(usize, usize, String)> = find_literal_refs(src)
        .into_iter()
        .filter_map(|r| {
            rewrite_literal(r.shape, &src[r.span.clone()], mapping)
                .map(|new| (r.span.start, r.span.end, new))
        })
        .collect();

    let mut out = String::with_capacity(src.len());
    let mut last = 0;
    for (start, end, new) in replacements {
        out.push_str(&src[last..start]);
        out.push_str(&new);
        last = end;
    }
    out.push_str(&src[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MappingGenerator, NamingScheme};

    fn keys(set: &SelectorSet) -> Vec<String> {
        set.iter().map(|s| s.key()).collect()
    }

    fn mapping_for(keys: &[&str]) -> Mapping {
        let conflicts: SelectorSet = keys.iter().filter_map(|k| Selector::parse(k)).collect();
        MappingGenerator::new(NamingScheme::Deterministic, "r")
            .unwrap()
            .generate(&conflicts, &[])
            .unwrap()
    }

    #[test]
    fn test_catalogue_shapes() {
        let js = r##"
            document.querySelector('.card .title');
            document.querySelectorAll("#list > li");
            document.getElementById('menu');
            document.getElementsByClassName('a b');
            el.className = "big red";
            el.classList.add('open', "shown");
            el.classList.toggle(`active`);
            el.closest('.panel');
            $('.widget').hide();
            jQuery('#modal');
            el.setAttribute('id', 'hero');
        "##;
        let selectors = extract_references(js);
        assert_eq!(
            keys(&selectors),
            vec![
                ".a", ".active", ".b", ".big", ".card", ".open", ".panel", ".red", ".shown",
                ".title", ".widget", "#hero", "#list", "#menu", "#modal"
            ]
        );
    }

    #[test]
    fn test_bare_identifier_is_implied_class() {
        let selectors = extract_references("$('sidebar')");
        assert_eq!(keys(&selectors), vec![".sidebar"]);
    }

    #[test]
    fn test_unrecognized_shapes_are_ignored() {
        let js = r#"
            const sel = '.card';
            document.querySelector(sel);
            document.querySelector('.a' + suffix);
            document.querySelector(`.x-${id}`);
            el.className == 'nope';
            foo.$('.hidden');
        "#;
        let selectors = extract_references(js);
        assert_eq!(keys(&selectors), vec![".a"]);
    }

    #[test]
    fn test_rewrite_mirrors_extraction() {
        let mapping = mapping_for(&[".card", "#menu", ".open"]);
        let card = mapping.get(".card").unwrap().replacement.clone();
        let menu = mapping.get("#menu").unwrap().replacement_name().to_string();
        let open = mapping.get(".open").unwrap().replacement_name().to_string();

        let js = r#"document.querySelector('.card > .card-body');
document.getElementById("menu");
el.classList.add('open', 'card-like');
const label = 'card';"#;
        let out = rewrite_references(js, &mapping);

        assert!(out.contains(&format!("querySelector('{} > .card-body')", card)));
        assert!(out.contains(&format!("getElementById(\"{}\")", menu)));
        assert!(out.contains(&format!("classList.add('{}', 'card-like')", open)));
        // A plain string outside any call site stays as written
        assert!(out.contains("const label = 'card';"));
    }

    #[test]
    fn test_rewrite_class_names_keeps_spacing() {
        let mapping = mapping_for(&[".big"]);
        let big = mapping.get(".big").unwrap().replacement_name().to_string();
        let out = rewrite_references("el.className = ' big  red ';", &mapping);
        assert_eq!(out, format!("el.className = ' {}  red ';", big));
    }

    #[test]
    fn test_rewrite_without_matches_is_identity() {
        let mapping = mapping_for(&[".zzz"]);
        let js = "document.querySelector('.card');";
        assert_eq!(rewrite_references(js, &mapping), js);
    }

    #[test]
    fn test_overlapping_literals_are_dropped() {
        let refs = find_literal_refs(r#"querySelector("getElementById('y')")"#);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].shape, CallSiteShape::SelectorQuery);
    }
}
