//! # Selector Merge
//!
//! Lets a guest web project be dropped into a host project without CSS
//! collisions. Every class, id and element selector both projects use is
//! renamed on the guest side, consistently across its stylesheets, markup and
//! scripts. The host is never modified.
//!
//! ## Pipeline
//!
//! 1. **Discovery**: classify `.css`, `.html`/`.htm` and `.js`/`.mjs` files.
//! 2. **Extraction**: every file yields a set of canonical selector keys
//!    (`.name`, `#name`, `name`).
//! 3. **Conflicts**: host ∩ guest, minus `body`/`html` and their class/id forms.
//! 4. **Mapping**: one fresh, injective replacement per conflict, never
//!    colliding with a name either project already uses.
//! 5. **Rewrite**: the guest is copied to the output location and the copy is
//!    rewritten in place. The mapping is saved next to it as JSON.
//!
//! ## Guarantees
//!
//! - Extraction and rewriting recognize the same reference forms, so a
//!   reference that was counted is a reference that gets renamed.
//! - Rewriting is single-pass; a replacement is never itself rewritten.
//! - Boundaries are respected: renaming `.btn` leaves `.btn-large` alone.
//! - A file that cannot be read or rewritten is reported and skipped; it never
//!   aborts the run.

mod cache;
mod conflict;
mod css;
mod discovery;
mod error;
mod extract;
mod mapping;
mod markup;
mod report;
mod resolver;
mod rewrite;
mod scan;
mod script;
mod selector;
mod workspace;

pub mod logging;


pub use cache::ExtractionCache;
pub use conflict::detect_conflicts;
pub use css::{extract_selectors as extract_stylesheet_selectors, rewrite_css};
pub use discovery::{
    collect_project_files, copy_project_tree, ClassifiedFileSet, DiscoveryOptions, SourceKind,
};
pub use error::{ProjectRole, ResolveError, RewriteError};
pub use extract::{extractor_for, SelectorExtractor};
pub use mapping::{Mapping, MappingGenerator, NamingScheme, SelectorMapping};
pub use markup::{extract_selectors as extract_markup_selectors, rewrite_markup};
pub use report::{ConflictReport, FailureStage, FileFailure, RunStatus, SelectorStats};
pub use resolver::{ConflictResolver, ResolverOptions, DEFAULT_PREFIX, DEFAULT_REPORT_FILE};
pub use rewrite::{rewriter_for, Rewriter};
pub use scan::{ProjectScanner, ScanOutcome};
pub use script::{extract_references as extract_script_references, rewrite_references};
pub use selector::{Selector, SelectorKind, SelectorSet, RESERVED_SELECTORS};
pub use workspace::{FsWorkspace, Workspace};
