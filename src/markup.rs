//! Markup Module
//!
//! HTML5-compliant parsing (html5ever) for class/id extraction and for
//! structural rewriting of class tokens, ids, `<style>` bodies, inline
//! `style` attributes and inline `<script>` bodies.
//!
//! Full documents are parsed with `parse_document`; anything else is parsed
//! as a fragment in `<body>` context so serialization does not grow
//! `<html>`/`<head>`/`<body>` wrappers the source never had.

use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_document, parse_fragment, QualName};
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use regex::{Captures, Regex};
use tendril::StrTendril;
use tracing::warn;

use crate::css;
use crate::error::RewriteError;
use crate::mapping::Mapping;
use crate::script;
use crate::selector::{Selector, SelectorKind, SelectorSet};

lazy_static! {
    /// Markers of a whole document rather than a fragment.
    static ref DOCUMENT_MARKER_RE: Regex =
        Regex::new(r"(?i)<(?:!doctype|html|head|body)[\s>/]").unwrap();

    static ref CLASS_TOKEN_RE: Regex = Regex::new(r"\S+").unwrap();
}

/// Script `type` values whose body is JavaScript.
const SCRIPT_TYPES: &[&str] = &[
    "",
    "text/javascript",
    "application/javascript",
    "module",
    "text/ecmascript",
    "application/ecmascript",
];

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// A parsed markup file, held by the node whose children make up its content.
///
/// rcdom empties a node's subtree when its document node is dropped, so the
/// document handle is kept alive for as long as `root` is used.
pub struct MarkupTree {
    _document: Handle,
    root: Handle,
}

impl MarkupTree {
    pub fn parse(html: &str) -> Result<Self, RewriteError> {
        if DOCUMENT_MARKER_RE.is_match(html) {
            let dom = parse_document(RcDom::default(), Default::default())
                .from_utf8()
                .read_from(&mut html.as_bytes())
                .map_err(RewriteError::MarkupParse)?;
            return Ok(Self {
                root: dom.document.clone(),
                _document: dom.document.clone(),
            });
        }

        let context = QualName::new(None, ns!(html), local_name!("body"));
        let dom = parse_fragment(RcDom::default(), Default::default(), context, vec![])
            .from_utf8()
            .read_from(&mut html.as_bytes())
            .map_err(RewriteError::MarkupParse)?;

        // Fragment parsing hangs the content under a synthetic <html> element
        let root = dom
            .document
            .children
            .borrow()
            .iter()
            .find(|child| matches!(child.data, NodeData::Element { .. }))
            .cloned()
            .unwrap_or_else(|| dom.document.clone());

        Ok(Self {
            _document: dom.document.clone(),
            root,
        })
    }

    /// Visit every element below the root, template contents included.
    fn for_each_element(&self, f: &mut dyn FnMut(&Handle)) {
        fn walk(handle: &Handle, f: &mut dyn FnMut(&Handle)) {
            if let NodeData::Element {
                template_contents, ..
            } = &handle.data
            {
                f(handle);
                if let Some(contents) = template_contents.borrow().as_ref() {
                    walk(contents, f);
                }
            }
            for child in handle.children.borrow().iter() {
                walk(child, f);
            }
        }

        for child in self.root.children.borrow().iter() {
            walk(child, f);
        }
    }

    pub fn serialize(&self) -> Result<String, RewriteError> {
        inline_template_contents(&self.root);
        let mut bytes = Vec::new();
        let handle: SerializableHandle = self.root.clone().into();
        serialize(&mut bytes, &handle, SerializeOpts::default())
            .map_err(RewriteError::MarkupSerialize)?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// The serializer only follows `children`, so template contents are moved
/// back under their `<template>` element before writing.
fn inline_template_contents(handle: &Handle) {
    if let NodeData::Element {
        template_contents, ..
    } = &handle.data
    {
        if let Some(contents) = template_contents.borrow_mut().take() {
            let moved: Vec<Handle> = contents.children.borrow_mut().drain(..).collect();
            handle.children.borrow_mut().extend(moved);
        }
    }
    for child in handle.children.borrow().iter() {
        inline_template_contents(child);
    }
}

fn element_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

fn attribute(handle: &Handle, attr_name: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// Inline JavaScript only: external scripts and data blocks are skipped.
fn is_inline_script(handle: &Handle) -> bool {
    if attribute(handle, "src").is_some() {
        return false;
    }
    let script_type = attribute(handle, "type")
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    SCRIPT_TYPES.contains(&script_type.as_str())
}

fn text_content(handle: &Handle) -> String {
    let mut text = String::new();
    for child in handle.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            text.push_str(&contents.borrow());
        }
    }
    text
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Class and id selectors used by a markup file, including the ones in its
/// embedded stylesheets and scripts. Unparseable input yields an empty set.
pub fn extract_selectors(html: &str) -> SelectorSet {
    let mut selectors = SelectorSet::new();

    let tree = match MarkupTree::parse(html) {
        Ok(tree) => tree,
        Err(e) => {
            warn!("Markup parse failed: {}", e);
            return selectors;
        }
    };

    tree.for_each_element(&mut |handle: &Handle| {
        if let Some(classes) = attribute(handle, "class") {
            selectors.extend(classes.split_whitespace().map(Selector::class));
        }
        if let Some(id) = attribute(handle, "id") {
            let id = id.trim();
            if !id.is_empty() {
                selectors.insert(Selector::id(id));
            }
        }
        if let Some(style) = attribute(handle, "style") {
            selectors.extend(css::extract_selectors(&style));
        }

        match element_name(handle).as_deref() {
            Some("style") => selectors.extend(css::extract_selectors(&text_content(handle))),
            Some("script") if is_inline_script(handle) => {
                selectors.extend(script::extract_references(&text_content(handle)))
            }
            _ => {}
        }
    });

    selectors
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWRITING
// ═══════════════════════════════════════════════════════════════════════════════

fn rewrite_class_list(value: &str, mapping: &Mapping) -> String {
    CLASS_TOKEN_RE
        .replace_all(value, |caps: &Captures| {
            mapping
                .renamed(SelectorKind::Class, &caps[0])
                .unwrap_or(&caps[0])
                .to_string()
        })
        .into_owned()
}

fn rewrite_id(value: &str, mapping: &Mapping) -> String {
    match mapping.renamed(SelectorKind::Id, value.trim()) {
        Some(renamed) => renamed.to_string(),
        None => value.to_string(),
    }
}

/// Rewrite the attributes of one element. Returns whether anything changed.
fn rewrite_attributes(handle: &Handle, mapping: &Mapping) -> bool {
    let NodeData::Element { attrs, .. } = &handle.data else {
        return false;
    };

    let mut changed = false;
    for attr in attrs.borrow_mut().iter_mut() {
        let current = attr.value.to_string();
        let rewritten = match &*attr.name.local {
            "class" => rewrite_class_list(&current, mapping),
            "id" => rewrite_id(&current, mapping),
            "style" => css::rewrite_css(&current, mapping),
            _ => continue,
        };
        if rewritten != current {
            attr.value = StrTendril::from_slice(&rewritten);
            changed = true;
        }
    }
    changed
}

/// Rewrite the text children of a `<style>` or `<script>` element.
fn rewrite_text_children(
    handle: &Handle,
    mapping: &Mapping,
    rewrite: fn(&str, &Mapping) -> String,
) -> bool {
    let mut changed = false;
    for child in handle.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            let current = contents.borrow().to_string();
            let rewritten = rewrite(&current, mapping);
            if rewritten != current {
                *contents.borrow_mut() = StrTendril::from_slice(&rewritten);
                changed = true;
            }
        }
    }
    changed
}

/// Apply `mapping` to a markup file. When nothing matches, the input is
/// returned as-is rather than re-serialized.
pub fn rewrite_markup(html: &str, mapping: &Mapping) -> Result<String, RewriteError> {
    if mapping.is_empty() {
        return Ok(html.to_string());
    }

    let tree = MarkupTree::parse(html)?;
    let mut changed = false;

    tree.for_each_element(&mut |handle: &Handle| {
        changed |= rewrite_attributes(handle, mapping);
        match element_name(handle).as_deref() {
            Some("style") => changed |= rewrite_text_children(handle, mapping, css::rewrite_css),
            Some("script") if is_inline_script(handle) => {
                changed |= rewrite_text_children(handle, mapping, script::rewrite_references)
            }
            _ => {}
        }
    });

    if !changed {
        return Ok(html.to_string());
    }
    tree.serialize()
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
    fn test_extracts_classes_ids_and_embedded_sources() {
        let html = r#"
            <style>.themed > p { color: red }</style>
            <div class="card  shadow" id="main" style="color: blue">
                <span class="title">Hi</span>
            </div>
            <script>document.getElementById('menu');</script>
            <script src="app.js">document.getElementById('ignored');</script>
            <script type="application/ld+json">{"x": "document.getElementById('data')"}</script>
        "#;
        let selectors = extract_selectors(html);
        assert_eq!(
            keys(&selectors),
            vec![".card", ".shadow", ".themed", ".title", "#main", "#menu"]
        );
    }

    #[test]
    fn test_malformed_markup_still_extracts() {
        let html = r#"<div class="a"><p class="b">unclosed <span id="c"><li class="d">"#;
        let selectors = extract_selectors(html);
        assert_eq!(keys(&selectors), vec![".a", ".b", ".d", "#c"]);
    }

    #[test]
    fn test_template_contents_are_visited() {
        let html = r#"<template><div class="tpl"></div></template>"#;
        assert_eq!(keys(&extract_selectors(html)), vec![".tpl"]);
    }

    #[test]
    fn test_template_contents_survive_rewrite() {
        let mapping = mapping_for(&[".tpl"]);
        let tpl = mapping.get(".tpl").unwrap().replacement_name().to_string();
        let html = r#"<template><div class="tpl">row</div></template>"#;
        assert_eq!(
            rewrite_markup(html, &mapping).unwrap(),
            format!(r#"<template><div class="{}">row</div></template>"#, tpl)
        );
    }

    #[test]
    fn test_rewrites_tokens_and_ids_structurally() {
        let mapping = mapping_for(&[".card", "#menu"]);
        let card = mapping.get(".card").unwrap().replacement_name().to_string();
        let menu = mapping.get("#menu").unwrap().replacement_name().to_string();

        let html = r#"<div class="card card-body" data-note="card" id="menu">card</div>"#;
        let out = rewrite_markup(html, &mapping).unwrap();

        assert_eq!(
            out,
            format!(
                r#"<div class="{} card-body" data-note="card" id="{}">card</div>"#,
                card, menu
            )
        );
    }

    #[test]
    fn test_rewrites_inline_style_attribute() {
        let mapping = mapping_for(&["#menu"]);
        let menu = mapping.get("#menu").unwrap().replacement.clone();

        let html = r#"<div id="main" title="menu" style="mask: url(#menu)">x</div>"#;
        assert_eq!(
            rewrite_markup(html, &mapping).unwrap(),
            format!(
                r#"<div id="main" title="menu" style="mask: url({})">x</div>"#,
                menu
            )
        );
    }

    #[test]
    fn test_rewrites_style_and_script_bodies() {
        let mapping = mapping_for(&[".card"]);
        let card = mapping.get(".card").unwrap().replacement.clone();

        let html = r#"<style>.card { color: red }</style><script>document.querySelector('.card');</script>"#;
        let out = rewrite_markup(html, &mapping).unwrap();

        assert!(out.contains(&format!("<style>{} {{ color: red }}</style>", card)));
        assert!(out.contains(&format!("querySelector('{}')", card)));
    }

    #[test]
    fn test_unmatched_markup_is_returned_verbatim() {
        let mapping = mapping_for(&[".absent"]);
        let html = "<DIV CLASS='x'>  odd   spacing <br/></DIV>";
        assert_eq!(rewrite_markup(html, &mapping).unwrap(), html);
    }

    #[test]
    fn test_full_document_keeps_its_structure() {
        let mapping = mapping_for(&[".card"]);
        let html = "<!DOCTYPE html><html><head><title>T</title></head><body><div class=\"card\"></div></body></html>";
        let out = rewrite_markup(html, &mapping).unwrap();
        assert!(out.starts_with("<!DOCTYPE html><html><head><title>T</title></head><body>"));
        assert!(!out.contains("class=\"card\""));
    }
}
