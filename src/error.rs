//! Error types for the selector merge pipeline.
//!
//! Two tiers: [`ResolveError`] aborts a run (bad setup, copy or report
//! failure), [`RewriteError`] only ever costs a single file.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Which side of the merge a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectRole {
    Host,
    Guest,
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectRole::Host => write!(f, "host"),
            ProjectRole::Guest => write!(f, "guest"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{role} project not found: {}", path.display())]
    MissingProject { role: ProjectRole, path: PathBuf },

    #[error("output location {} overlaps the host project {}", output.display(), host.display())]
    OutputOverlapsHost { output: PathBuf, host: PathBuf },

    #[error("output location {} is or contains the guest project {}", output.display(), guest.display())]
    OutputOverlapsGuest { output: PathBuf, guest: PathBuf },

    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode mapping report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("invalid replacement prefix '{0}': must start with a letter and contain only letters, digits, '-' or '_'")]
    InvalidPrefix(String),

    #[error("no free replacement name for {selector} after {attempts} attempts")]
    NamespaceExhausted { selector: String, attempts: usize },

    #[error("replacement '{replacement}' is already assigned to {existing}")]
    DuplicateReplacement {
        replacement: String,
        existing: String,
    },
}

impl ResolveError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ResolveError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure to rewrite one file. Recorded and skipped by the resolver.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("markup could not be parsed: {0}")]
    MarkupParse(#[source] io::Error),

    #[error("markup could not be serialized: {0}")]
    MarkupSerialize(#[source] io::Error),

    #[error("serialized markup is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}
