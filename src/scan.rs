//! Project-wide selector extraction.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::cache::ExtractionCache;
use crate::discovery::ClassifiedFileSet;
use crate::extract::extractor_for;
use crate::report::{FailureStage, FileFailure};
use crate::selector::SelectorSet;
use crate::workspace::Workspace;

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub selectors: SelectorSet,
    pub files_scanned: usize,
    pub failures: Vec<FileFailure>,
}

pub struct ProjectScanner<'a> {
    workspace: &'a dyn Workspace,
    cache: &'a ExtractionCache,
}

impl<'a> ProjectScanner<'a> {
    pub fn new(workspace: &'a dyn Workspace, cache: &'a ExtractionCache) -> Self {
        Self { workspace, cache }
    }

    /// Union of every file's selectors. Unreadable files are recorded and
    /// skipped.
    pub fn scan(&self, files: &ClassifiedFileSet) -> ScanOutcome {
        let results: Vec<Result<SelectorSet, FileFailure>> = files
            .entries()
            .into_par_iter()
            .map(|(kind, path)| -> Result<SelectorSet, FileFailure> {
                let source = self.workspace.read_text(&path).map_err(|e| {
                    warn!("Could not read {}: {}", path.display(), e);
                    FileFailure::new(&path, FailureStage::Read, e)
                })?;
                let selectors = self
                    .cache
                    .get_or_extract(kind, &source, |s| extractor_for(kind).extract(s));
                debug!("{} selectors in {}", selectors.len(), path.display());
                Ok(selectors)
            })
            .collect();

        let mut outcome = ScanOutcome::default();
        for result in results {
            match result {
                Ok(selectors) => {
                    outcome.files_scanned += 1;
                    outcome.selectors.extend(selectors);
                }
                Err(failure) => outcome.failures.push(failure),
            }
        }
        outcome
    }
}
