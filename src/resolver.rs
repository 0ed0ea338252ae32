//! Resolver Module
//!
//! Drives a run: scan both projects, detect conflicts, mint a mapping, copy
//! the guest to the output location and rewrite the copy in place.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cache::ExtractionCache;
use crate::conflict::detect_conflicts;
use crate::discovery::{ClassifiedFileSet, DiscoveryOptions};
use crate::error::{ProjectRole, ResolveError};
use crate::mapping::{Mapping, MappingGenerator, NamingScheme};
use crate::report::{ConflictReport, FailureStage, FileFailure, RunStatus, SelectorStats};
use crate::rewrite::rewriter_for;
use crate::scan::ProjectScanner;
use crate::workspace::Workspace;

pub const DEFAULT_PREFIX: &str = "scoped";
pub const DEFAULT_REPORT_FILE: &str = "selector_mapping.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverOptions {
    pub naming: NamingScheme,
    pub prefix: String,
    pub report_file_name: String,
    pub discovery: DiscoveryOptions,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            naming: NamingScheme::default(),
            prefix: DEFAULT_PREFIX.to_string(),
            report_file_name: DEFAULT_REPORT_FILE.to_string(),
            discovery: DiscoveryOptions::default(),
        }
    }
}

pub struct ConflictResolver<W: Workspace> {
    workspace: W,
    options: ResolverOptions,
}

impl<W: Workspace> ConflictResolver<W> {
    pub fn new(workspace: W, options: ResolverOptions) -> Self {
        Self { workspace, options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn workspace(&self) -> &W {
        &self.workspace
    }

    /// Merge-proof the guest project against the host.
    ///
    /// The host is only ever read. On conflicts the guest is copied to
    /// `output` and the copy is rewritten; the mapping report is written to
    /// `output` in every successful run. Setup, copy and report failures
    /// abort; a file that cannot be read or rewritten is recorded in the
    /// report and skipped.
    pub fn resolve(
        &self,
        host: &Path,
        guest: &Path,
        output: &Path,
    ) -> Result<ConflictReport, ResolveError> {
        let generator = MappingGenerator::new(self.options.naming, self.options.prefix.as_str())?;
        self.check_layout(host, guest, output)?;

        info!("Starting selector conflict resolution");
        info!("Host project: {}", host.display());
        info!("Guest project: {}", guest.display());

        let cache = ExtractionCache::new();
        let scanner = ProjectScanner::new(&self.workspace, &cache);

        info!("Scanning host project...");
        let host_files = self.workspace.classify(host)?;
        let host_scan = scanner.scan(&host_files);
        info!("Found {} selectors in host project", host_scan.selectors.len());

        info!("Scanning guest project...");
        let guest_files = self.workspace.classify(guest)?;
        let guest_scan = scanner.scan(&guest_files);
        info!("Found {} selectors in guest project", guest_scan.selectors.len());
        debug!("Extraction cache: {} entries, {} hits", cache.len(), cache.hits());

        let conflicts = detect_conflicts(&host_scan.selectors, &guest_scan.selectors);
        let stats = SelectorStats::new(
            host_scan.selectors.len(),
            guest_scan.selectors.len(),
            conflicts.len(),
        );
        let conflict_keys: Vec<String> = conflicts.iter().map(|s| s.key()).collect();

        let mut failures = host_scan.failures;
        failures.extend(guest_scan.failures);

        if conflicts.is_empty() {
            info!("No conflicts detected; guest project left as is");
            let report_path = self.workspace.persist_report(
                output,
                &self.options.report_file_name,
                &Mapping::new(),
            )?;
            return Ok(ConflictReport {
                status: RunStatus::NoConflicts,
                conflicts: conflict_keys,
                mapping: Mapping::new(),
                files_modified: 0,
                output_path: None,
                report_path: Some(report_path),
                stats,
                failures,
            });
        }

        info!(
            "Found {} conflicting selectors ({:.1}% of guest selectors)",
            conflicts.len(),
            stats.conflict_percentage
        );
        for key in &conflict_keys {
            debug!("Conflict: {}", key);
        }

        let mapping =
            generator.generate(&conflicts, &[&host_scan.selectors, &guest_scan.selectors])?;
        info!("Generated {} selector mappings", mapping.len());

        info!("Copying guest project to {}", output.display());
        self.workspace.copy_tree(guest, output)?;

        let output_files = self.workspace.classify(output)?;
        let (files_modified, rewrite_failures) = self.rewrite_files(&output_files, &mapping);
        failures.extend(rewrite_failures);
        info!("Modified {} files", files_modified);

        let report_path =
            self.workspace
                .persist_report(output, &self.options.report_file_name, &mapping)?;

        if !failures.is_empty() {
            warn!("{} files could not be processed", failures.len());
        }

        Ok(ConflictReport {
            status: RunStatus::Success,
            conflicts: conflict_keys,
            mapping,
            files_modified,
            output_path: Some(output.to_path_buf()),
            report_path: Some(report_path),
            stats,
            failures,
        })
    }

    fn check_layout(&self, host: &Path, guest: &Path, output: &Path) -> Result<(), ResolveError> {
        if !self.workspace.exists(host) {
            return Err(ResolveError::MissingProject {
                role: ProjectRole::Host,
                path: host.to_path_buf(),
            });
        }
        if !self.workspace.exists(guest) {
            return Err(ResolveError::MissingProject {
                role: ProjectRole::Guest,
                path: guest.to_path_buf(),
            });
        }

        let host_abs = absolute(host);
        let guest_abs = absolute(guest);
        let output_abs = absolute(output);

        if output_abs.starts_with(&host_abs) || host_abs.starts_with(&output_abs) {
            return Err(ResolveError::OutputOverlapsHost {
                output: output.to_path_buf(),
                host: host.to_path_buf(),
            });
        }
        // Output nested inside the guest is fine; the copy skips it.
        if guest_abs.starts_with(&output_abs) {
            return Err(ResolveError::OutputOverlapsGuest {
                output: output.to_path_buf(),
                guest: guest.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Rewrite every file of the output tree. Returns how many files were
    /// written and which ones failed.
    fn rewrite_files(
        &self,
        files: &ClassifiedFileSet,
        mapping: &Mapping,
    ) -> (usize, Vec<FileFailure>) {
        let results: Vec<Result<bool, FileFailure>> = files
            .entries()
            .into_par_iter()
            .map(|(kind, path)| -> Result<bool, FileFailure> {
                let source = self.workspace.read_text(&path).map_err(|e| {
                    warn!("Could not read {}: {}", path.display(), e);
                    FileFailure::new(&path, FailureStage::Read, e)
                })?;
                let rewritten = rewriter_for(kind).rewrite(&source, mapping).map_err(|e| {
                    warn!("Could not rewrite {}: {}", path.display(), e);
                    FileFailure::new(&path, FailureStage::Rewrite, e)
                })?;
                if rewritten == source {
                    return Ok(false);
                }
                self.workspace.write_text(&path, &rewritten).map_err(|e| {
                    warn!("Could not write {}: {}", path.display(), e);
                    FileFailure::new(&path, FailureStage::Write, e)
                })?;
                debug!("Rewrote {}", path.display());
                Ok(true)
            })
            .collect();

        let mut modified = 0;
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(true) => modified += 1,
                Ok(false) => {}
                Err(failure) => failures.push(failure),
            }
        }
        (modified, failures)
    }
}

/// Absolute, symlink-free form of `path` where it exists. For a path that
/// does not exist yet, its deepest existing ancestor is resolved and the
/// rest is appended with `.`/`..` folded lexically.
fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut existing = joined.as_path();
    let mut rest = Vec::new();
    while let Some(parent) = existing.parent() {
        if let Some(name) = existing.file_name() {
            rest.push(name.to_os_string());
        }
        existing = parent;
        if let Ok(canonical) = fs::canonicalize(existing) {
            let mut resolved = canonical;
            for name in rest.iter().rev() {
                resolved.push(name);
            }
            return normalize(&resolved);
        }
    }
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
