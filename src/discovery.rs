//! Discovery Module
//!
//! Recursively scans a project root for stylesheet, markup and script files,
//! and copies a project tree to a new location.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ResolveError;

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Stylesheet,
    Markup,
    Script,
}

/// Which file extensions count as which source kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryOptions {
    pub stylesheet_extensions: Vec<String>,
    pub markup_extensions: Vec<String>,
    pub script_extensions: Vec<String>,
    pub follow_links: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            stylesheet_extensions: vec!["css".to_string()],
            markup_extensions: vec!["html".to_string(), "htm".to_string()],
            script_extensions: vec!["js".to_string(), "mjs".to_string()],
            follow_links: true,
        }
    }
}

impl DiscoveryOptions {
    /// Classify a path by extension (case-insensitive).
    pub fn classify(&self, path: &Path) -> Option<SourceKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let matches = |list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(&ext));

        if matches(&self.stylesheet_extensions) {
            Some(SourceKind::Stylesheet)
        } else if matches(&self.markup_extensions) {
            Some(SourceKind::Markup)
        } else if matches(&self.script_extensions) {
            Some(SourceKind::Script)
        } else {
            None
        }
    }
}

/// A project's source files, grouped by kind, in walk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedFileSet {
    pub stylesheets: Vec<PathBuf>,
    pub markup: Vec<PathBuf>,
    pub scripts: Vec<PathBuf>,
}

impl ClassifiedFileSet {
    pub fn push(&mut self, kind: SourceKind, path: PathBuf) {
        match kind {
            SourceKind::Stylesheet => self.stylesheets.push(path),
            SourceKind::Markup => self.markup.push(path),
            SourceKind::Script => self.scripts.push(path),
        }
    }

    pub fn len(&self) -> usize {
        self.stylesheets.len() + self.markup.len() + self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every file tagged with its kind: stylesheets, then markup, then scripts.
    pub fn entries(&self) -> Vec<(SourceKind, PathBuf)> {
        let tag = |kind: SourceKind, paths: &[PathBuf]| {
            paths
                .iter()
                .map(move |p| (kind, p.clone()))
                .collect::<Vec<_>>()
        };

        let mut entries = tag(SourceKind::Stylesheet, &self.stylesheets);
        entries.extend(tag(SourceKind::Markup, &self.markup));
        entries.extend(tag(SourceKind::Script, &self.scripts));
        entries
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROJECT WALK
// ═══════════════════════════════════════════════════════════════════════════════

/// Collect every classifiable file under `root`.
///
/// A failure to read the root itself is fatal; unreadable entries below it
/// are logged and skipped.
pub fn collect_project_files(
    root: &Path,
    options: &DiscoveryOptions,
) -> Result<ClassifiedFileSet, ResolveError> {
    let mut files = ClassifiedFileSet::default();

    for entry in WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(ResolveError::Walk {
                    path: root.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(kind) = options.classify(path) {
            files.push(kind, path.to_path_buf());
        }
    }

    info!(
        "Found {} markup, {} stylesheet, {} script files in {}",
        files.markup.len(),
        files.stylesheets.len(),
        files.scripts.len(),
        root.display()
    );

    Ok(files)
}

/// Copy the tree at `from` into `to`, merging with whatever `to` holds.
/// When `to` lies inside `from`, that subtree is not copied into itself.
/// Returns the number of files copied.
pub fn copy_project_tree(
    from: &Path,
    to: &Path,
    options: &DiscoveryOptions,
) -> Result<usize, ResolveError> {
    fs::create_dir_all(to).map_err(|e| ResolveError::io(to, e))?;

    let from_abs = fs::canonicalize(from).map_err(|e| ResolveError::io(from, e))?;
    let to_abs = fs::canonicalize(to).map_err(|e| ResolveError::io(to, e))?;
    let nested_output = to_abs.strip_prefix(&from_abs).ok().map(Path::to_path_buf);

    let mut copied = 0;
    let walker = WalkDir::new(from)
        .follow_links(options.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match (&nested_output, entry.path().strip_prefix(from)) {
            (Some(skip), Ok(rel)) => rel.as_os_str().is_empty() || !rel.starts_with(skip),
            _ => true,
        });

    for entry in walker {
        let entry = entry.map_err(|e| ResolveError::Walk {
            path: from.to_path_buf(),
            source: e,
        })?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| ResolveError::io(&target, e))?;
        } else if entry.path().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| ResolveError::io(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| ResolveError::io(&target, e))?;
            debug!("Copied {}", rel.display());
            copied += 1;
        }
    }

    info!(
        "Copied {} files from {} to {}",
        copied,
        from.display(),
        to.display()
    );
    Ok(copied)
}
