//! Filesystem access for the resolver.
//!
//! Everything that touches disk goes through [`Workspace`], so the pipeline
//! can be driven against an in-memory tree in tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::discovery::{self, ClassifiedFileSet, DiscoveryOptions};
use crate::error::ResolveError;
use crate::mapping::Mapping;

pub trait Workspace: Sync {
    fn exists(&self, path: &Path) -> bool;

    /// Every stylesheet, markup and script file under `root`.
    fn classify(&self, root: &Path) -> Result<ClassifiedFileSet, ResolveError>;

    fn read_text(&self, path: &Path) -> io::Result<String>;

    fn write_text(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Copy `from` into `to`, merging with existing content.
    fn copy_tree(&self, from: &Path, to: &Path) -> Result<(), ResolveError>;

    /// Write the mapping as JSON to `dir/file_name` and return the path.
    fn persist_report(
        &self,
        dir: &Path,
        file_name: &str,
        mapping: &Mapping,
    ) -> Result<PathBuf, ResolveError>;
}

/// The real filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsWorkspace {
    discovery: DiscoveryOptions,
}

impl FsWorkspace {
    pub fn new(discovery: DiscoveryOptions) -> Self {
        Self { discovery }
    }
}

impl Workspace for FsWorkspace {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn classify(&self, root: &Path) -> Result<ClassifiedFileSet, ResolveError> {
        discovery::collect_project_files(root, &self.discovery)
    }

    fn read_text(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write_text(&self, path: &Path, contents: &str) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> Result<(), ResolveError> {
        discovery::copy_project_tree(from, to, &self.discovery).map(|_| ())
    }

    fn persist_report(
        &self,
        dir: &Path,
        file_name: &str,
        mapping: &Mapping,
    ) -> Result<PathBuf, ResolveError> {
        fs::create_dir_all(dir).map_err(|e| ResolveError::io(dir, e))?;
        let path = dir.join(file_name);
        let json = serde_json::to_string_pretty(mapping)?;
        fs::write(&path, json).map_err(|e| ResolveError::io(&path, e))?;
        info!("Saved selector mapping to {}", path.display());
        Ok(path)
    }
}
