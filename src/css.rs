//! Stylesheet Module
//!
//! Selector extraction and boundary-safe rewriting for CSS text: standalone
//! stylesheets, `<style>` bodies and inline `style` attribute values.
//!
//! Extraction only looks at rule preludes (the selector list before `{`), so
//! tokens inside declaration values never count. A sheet the scanner cannot
//! make sense of degrades to a plain token scan over the whole text.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::ops::Range;
use tracing::warn;

use crate::mapping::Mapping;
use crate::selector::{Selector, SelectorKind, SelectorSet};

/// One escaped code point: `\3A `, `\:`.
const ESCAPE: &str = r"\\(?:[0-9A-Fa-f]{1,6}[ \t\n\r\x0c]?|[^0-9A-Fa-f\n\r\x0c])";

lazy_static! {
    /// Identifier as written in a stylesheet, escapes included, so that
    /// `.md\:flex` and `.\32 xl` name the classes `md:flex` and `2xl`.
    static ref IDENT: String = format!(r"(?:[A-Za-z]|{e})(?:[A-Za-z0-9_-]|{e})*", e = ESCAPE);

    static ref CLASS_TOKEN_RE: Regex = Regex::new(&format!(r"\.({})", *IDENT)).unwrap();
    static ref ID_TOKEN_RE: Regex = Regex::new(&format!(r"#({})", *IDENT)).unwrap();

    /// Any selector-shaped token: class, id or bare identifier.
    static ref SELECTOR_TOKEN_RE: Regex = Regex::new(&format!(r"[.#]?{}", *IDENT)).unwrap();
}

/// At-rules whose block holds further rules rather than declarations.
const GROUPING_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "layer",
    "container",
    "document",
    "-moz-document",
    "scope",
];

/// Characters that may follow a selector token for it to be rewritten.
const SELECTOR_BOUNDARY: &[char] = &[
    ' ', '\t', '\n', '\r', '\x0c', ',', '{', '}', ':', '>', '+', '~', '[', ']', '(', ')', '.', '#',
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssParseError {
    pub message: &'static str,
    pub offset: usize,
}

impl fmt::Display for CssParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RULE SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Collect the selector prelude of every qualified rule, descending into
/// grouping at-rules. Comments are dropped and quoted strings blanked out.
pub fn parse_rule_preludes(css: &str) -> Result<Vec<String>, CssParseError> {
    let mut scanner = RuleScanner { src: css, pos: 0 };
    let mut preludes = Vec::new();
    scanner.rule_list(false, &mut preludes)?;
    Ok(preludes)
}

struct RuleScanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> RuleScanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn error(&self, message: &'static str) -> CssParseError {
        CssParseError {
            message,
            offset: self.pos,
        }
    }

    fn rule_list(&mut self, nested: bool, preludes: &mut Vec<String>) -> Result<(), CssParseError> {
        let mut prelude = String::new();

        loop {
            let Some(b) = self.peek() else {
                if nested {
                    return Err(self.error("unclosed block"));
                }
                // A trailing prelude without a block is dropped, as browsers do
                return Ok(());
            };

            match b {
                b'/' if self.peek_at(1) == Some(b'*') => {
                    self.skip_comment()?;
                    prelude.push(' ');
                }
                b'"' | b'\'' => {
                    self.skip_string(b)?;
                    prelude.push(' ');
                }
                b'{' => {
                    self.pos += 1;
                    let text = std::mem::take(&mut prelude);
                    let trimmed = text.trim();

                    if let Some(at_rule) = trimmed.strip_prefix('@') {
                        let name = at_rule
                            .split(|c: char| c.is_whitespace() || c == '(')
                            .next()
                            .unwrap_or("")
                            .to_ascii_lowercase();
                        if GROUPING_AT_RULES.contains(&name.as_str()) {
                            self.rule_list(true, preludes)?;
                        } else {
                            self.skip_block()?;
                        }
                    } else {
                        if !trimmed.is_empty() {
                            preludes.push(trimmed.to_string());
                        }
                        self.skip_block()?;
                    }
                }
                b'}' => {
                    if nested {
                        self.pos += 1;
                        return Ok(());
                    }
                    return Err(self.error("unexpected '}'"));
                }
                b';' => {
                    // End of a statement at-rule such as @import
                    self.pos += 1;
                    prelude.clear();
                }
                _ => match self.src[self.pos..].chars().next() {
                    Some(ch) => {
                        prelude.push(ch);
                        self.pos += ch.len_utf8();
                    }
                    None => return Ok(()),
                },
            }
        }
    }

    /// Skip a declaration block; `pos` is just past its `{`.
    fn skip_block(&mut self) -> Result<(), CssParseError> {
        let open = self.pos;
        let mut depth = 1usize;

        while let Some(b) = self.peek() {
            match b {
                b'/' if self.peek_at(1) == Some(b'*') => {
                    self.skip_comment()?;
                    continue;
                }
                b'"' | b'\'' => {
                    self.skip_string(b)?;
                    continue;
                }
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }

        Err(CssParseError {
            message: "unclosed block",
            offset: open,
        })
    }

    fn skip_comment(&mut self) -> Result<(), CssParseError> {
        match self.src[self.pos + 2..].find("*/") {
            Some(end) => {
                self.pos += 2 + end + 2;
                Ok(())
            }
            None => Err(self.error("unterminated comment")),
        }
    }

    /// Skip a quoted string. An unescaped newline ends it early (a CSS bad
    /// string); end of input does not.
    fn skip_string(&mut self, quote: u8) -> Result<(), CssParseError> {
        let start = self.pos;
        self.pos += 1;

        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => return Ok(()),
                _ if b == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }

        Err(CssParseError {
            message: "unterminated string",
            offset: start,
        })
    }
}

/// Split a selector list on commas that are not nested in `()` or `[]`.
fn split_selector_list(prelude: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in prelude.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = (depth - 1).max(0),
            ',' if depth == 0 => {
                parts.push(prelude[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(prelude[start..].trim());

    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Resolve CSS escapes in an identifier (`md\:flex` → `md:flex`,
/// `\32 xl` → `2xl`).
fn unescape_ident(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(*h);
                    chars.next();
                }
                _ => break,
            }
        }

        if hex.is_empty() {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
            continue;
        }

        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .filter(|c| *c != '\0')
            .unwrap_or('\u{FFFD}');
        out.push(decoded);
        // A single whitespace after a hex escape belongs to the escape
        if matches!(chars.peek(), Some(' ' | '\t' | '\n' | '\r' | '\x0c')) {
            chars.next();
        }
    }
    out
}

/// Byte ranges of comments and quoted strings, which are never rewritten.
fn literal_spans(css: &str) -> Vec<Range<usize>> {
    let bytes = css.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = css[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |e| i + 2 + e + 2);
                spans.push(i..end);
                i = end;
            }
            quote @ (b'"' | b'\'') => {
                let mut j = i + 1;
                while j < bytes.len() {
                    match bytes[j] {
                        b'\\' => j += 2,
                        b'\n' => break,
                        b if b == quote => {
                            j += 1;
                            break;
                        }
                        _ => j += 1,
                    }
                }
                let end = j.min(bytes.len());
                spans.push(i..end);
                i = end;
            }
            _ => i += 1,
        }
    }
    spans
}

/// Class and id tokens anywhere in `text`, with no regard for CSS structure.
pub fn selector_tokens(text: &str) -> SelectorSet {
    let mut selectors = SelectorSet::new();
    collect_tokens(text, &mut selectors);
    selectors
}

fn collect_tokens(text: &str, selectors: &mut SelectorSet) {
    let literals = literal_spans(text);
    let counts = |start: usize| {
        !text[..start].ends_with('\\') && !literals.iter().any(|span| span.contains(&start))
    };

    for caps in CLASS_TOKEN_RE.captures_iter(text) {
        if counts(caps.get(0).map_or(0, |m| m.start())) {
            selectors.insert(Selector::class(unescape_ident(&caps[1])));
        }
    }
    for caps in ID_TOKEN_RE.captures_iter(text) {
        if counts(caps.get(0).map_or(0, |m| m.start())) {
            selectors.insert(Selector::id(unescape_ident(&caps[1])));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Class and id selectors used by a stylesheet. Never fails.
pub fn extract_selectors(css: &str) -> SelectorSet {
    let mut selectors = SelectorSet::new();

    match parse_rule_preludes(css) {
        Ok(preludes) => {
            for prelude in &preludes {
                for selector in split_selector_list(prelude) {
                    collect_tokens(selector, &mut selectors);
                }
            }
        }
        Err(e) => {
            warn!("Stylesheet parse failed ({}), falling back to token scan", e);
            collect_tokens(css, &mut selectors);
        }
    }

    selectors
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWRITING
// ═══════════════════════════════════════════════════════════════════════════════

/// Replace every mapped selector token in one pass over `css`.
///
/// A token is only replaced when it is the whole token (`.btn` is left alone
/// inside `.btn-large`) and is followed by a selector boundary or the end of
/// the text. Bare element tokens must also not be glued to a preceding word.
/// Escaped spellings match their decoded name. Comments and quoted strings
/// are left as written.
pub fn rewrite_css(css: &str, mapping: &Mapping) -> String {
    if mapping.is_empty() {
        return css.to_string();
    }

    let literals = literal_spans(css);
    let mut next_literal = 0;
    let mut out = String::with_capacity(css.len());
    let mut last = 0;

    for m in SELECTOR_TOKEN_RE.find_iter(css) {
        while next_literal < literals.len() && literals[next_literal].end <= m.start() {
            next_literal += 1;
        }
        if literals
            .get(next_literal)
            .is_some_and(|span| span.contains(&m.start()))
            || css[..m.start()].ends_with('\\')
        {
            continue;
        }

        let Some(selector) = Selector::parse(&unescape_ident(m.as_str())) else {
            continue;
        };
        let Some(replacement) = mapping.replacement_for(&selector) else {
            continue;
        };
        if !followed_by_boundary(css, m.end()) {
            continue;
        }
        if selector.kind() == SelectorKind::Element && !preceded_by_boundary(css, m.start()) {
            continue;
        }

        out.push_str(&css[last..m.start()]);
        out.push_str(replacement);
        last = m.end();
    }

    out.push_str(&css[last..]);
    out
}

fn followed_by_boundary(text: &str, end: usize) -> bool {
    match text[end..].chars().next() {
        None => true,
        Some(c) => SELECTOR_BOUNDARY.contains(&c),
    }
}

fn preceded_by_boundary(text: &str, start: usize) -> bool {
    match text[..start].chars().next_back() {
        None => true,
        Some(c) => !(c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '#' | '@' | '$' | '\\')),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::SelectorMapping;

    fn mapping(pairs: &[(&str, &str)]) -> Mapping {
        let mut mapping = Mapping::new();
        for (original, replacement) in pairs {
            let kind = Selector::parse(original).unwrap().kind();
            mapping
                .insert(SelectorMapping {
                    original: original.to_string(),
                    replacement: replacement.to_string(),
                    kind,
                })
                .unwrap();
        }
        mapping
    }

    fn keys(set: &SelectorSet) -> Vec<String> {
        set.iter().map(|s| s.key()).collect()
    }

    #[test]
    fn test_extracts_from_selector_lists_only() {
        let css = ".card, .panel > #main { color: #fff; background: url(img.png); }";
        let selectors = extract_selectors(css);
        assert_eq!(keys(&selectors), vec![".card", ".panel", "#main"]);
    }

    #[test]
    fn test_compound_and_pseudo_selectors() {
        let css = "a.btn.active:hover, :is(.x, .y) .z::before {}";
        let selectors = extract_selectors(css);
        assert_eq!(keys(&selectors), vec![".active", ".btn", ".x", ".y", ".z"]);
    }

    #[test]
    fn test_grouping_at_rules_are_descended() {
        let css = r#"
            @import url("theme.css");
            @media (max-width: 600px) { .nav { display: none } }
            @font-face { font-family: "X"; src: url(x.woff); }
            @keyframes spin { from { opacity: 0 } to { opacity: 1 } }
            #footer { margin: 0 }
        "#;
        let selectors = extract_selectors(css);
        assert_eq!(keys(&selectors), vec![".nav", "#footer"]);
    }

    #[test]
    fn test_comments_and_strings_ignored_in_preludes() {
        let css = "/* .ghost { } */ .real[data-x=\".fake\"] { content: '.nope' }";
        let selectors = extract_selectors(css);
        assert_eq!(keys(&selectors), vec![".real"]);
    }

    #[test]
    fn test_malformed_sheet_falls_back_to_token_scan() {
        let css = ".open { color: red; .other { ";
        assert!(parse_rule_preludes(css).is_err());
        let selectors = extract_selectors(css);
        assert_eq!(keys(&selectors), vec![".open", ".other"]);

        let stray = "} .after { }";
        assert!(parse_rule_preludes(stray).is_err());
        assert_eq!(keys(&extract_selectors(stray)), vec![".after"]);
    }

    #[test]
    fn test_declarations_only_yield_nothing() {
        assert!(extract_selectors("color: red; background: #fff").is_empty());
    }

    #[test]
    fn test_rewrite_respects_token_boundaries() {
        let map = mapping(&[(".btn", ".r-1")]);
        let css = ".btn { a: b } .btn-large { c: d } .btn:hover, .btn.active, div > .btn {}";
        let out = rewrite_css(css, &map);
        assert_eq!(
            out,
            ".r-1 { a: b } .btn-large { c: d } .r-1:hover, .r-1.active, div > .r-1 {}"
        );
    }

    #[test]
    fn test_rewrite_end_of_text_and_parens() {
        let map = mapping(&[(".card", ".r-1"), ("#menu", "#r-2")]);
        assert_eq!(rewrite_css(".card", &map), ".r-1");
        assert_eq!(rewrite_css(":not(.card)", &map), ":not(.r-1)");
        assert_eq!(rewrite_css("#menu>li", &map), "#r-2>li");
    }

    #[test]
    fn test_rewrite_leaves_values_with_semicolon_alone() {
        let map = mapping(&[("#fff", "#r-1")]);
        assert_eq!(rewrite_css("color: #fff;", &map), "color: #fff;");
    }

    #[test]
    fn test_rewrite_bare_element_needs_leading_boundary() {
        let map = mapping(&[("nav", "r-1")]);
        assert_eq!(rewrite_css("nav a, .mynav {}", &map), "r-1 a, .mynav {}");
        assert_eq!(rewrite_css("x-nav {}", &map), "x-nav {}");
    }

    #[test]
    fn test_rewrite_is_single_pass() {
        // A replacement that looks like another original must not be rewritten again
        let map = mapping(&[(".a", ".b"), (".b", ".c")]);
        assert_eq!(rewrite_css(".a, .b {}", &map), ".b, .c {}");
    }

    #[test]
    fn test_escaped_identifiers_are_decoded() {
        let css = r".md\:flex, .\32 xl > .w-1\/2, #a\.b { display: flex }";
        assert_eq!(
            keys(&extract_selectors(css)),
            vec![".2xl", ".md:flex", ".w-1/2", "#a.b"]
        );
    }

    #[test]
    fn test_rewrite_matches_escaped_spelling() {
        let map = mapping(&[(".md:flex", ".r-1"), (".2xl", ".r-2")]);
        assert_eq!(
            rewrite_css(r".md\:flex { display: flex } .md\:flex:hover, .\32 xl {}", &map),
            ".r-1 { display: flex } .r-1:hover, .r-2 {}"
        );
        // A different escaped class that merely starts the same stays put
        assert_eq!(rewrite_css(r".md\:flex-col {}", &map), r".md\:flex-col {}");
    }

    #[test]
    fn test_rewrite_skips_strings_and_comments() {
        let map = mapping(&[(".btn", ".r-1")]);
        let css = r#".btn::before { content: ".btn " } /* .btn */ [title='.btn'] .btn {}"#;
        assert_eq!(
            rewrite_css(css, &map),
            r#".r-1::before { content: ".btn " } /* .btn */ [title='.btn'] .r-1 {}"#
        );
    }

    #[test]
    fn test_split_selector_list_respects_nesting() {
        assert_eq!(
            split_selector_list(":is(.a, .b), .c"),
            vec![":is(.a, .b)", ".c"]
        );
    }
}
