use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info, warn};

use selector_merge::logging::init_logging;
use selector_merge::{
    ConflictReport, ConflictResolver, FsWorkspace, NamingScheme, ResolverOptions, RunStatus,
};

#[derive(Parser)]
#[command(name = "selector-merge")]
#[command(version, about = "Rename CSS classes and ids in a guest project that collide with a host project", long_about = None)]
struct Cli {
    /// Host project root (read only)
    host: PathBuf,

    /// Guest project root (read only)
    guest: PathBuf,

    /// Where the rewritten copy of the guest and the mapping report go
    output: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// How replacement names are generated
    #[arg(long, value_enum, default_value_t = Naming::Deterministic)]
    naming: Naming,

    /// Prefix for replacement names
    #[arg(long, default_value = selector_merge::DEFAULT_PREFIX)]
    prefix: String,

    /// File name of the mapping report inside the output directory
    #[arg(long, default_value = selector_merge::DEFAULT_REPORT_FILE)]
    report_name: String,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the full report as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Naming {
    Deterministic,
    Random,
}

impl From<Naming> for NamingScheme {
    fn from(naming: Naming) -> Self {
        match naming {
            Naming::Deterministic => NamingScheme::Deterministic,
            Naming::Random => NamingScheme::Random,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    let options = ResolverOptions {
        naming: cli.naming.into(),
        prefix: cli.prefix.clone(),
        report_file_name: cli.report_name.clone(),
        ..ResolverOptions::default()
    };
    let resolver = ConflictResolver::new(FsWorkspace::new(options.discovery.clone()), options);

    let report = match resolver.resolve(&cli.host, &cli.guest, &cli.output) {
        Ok(report) => report,
        Err(e) => {
            error!("Resolution failed: {}", e);
            return Err(e).context("selector conflict resolution failed");
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &ConflictReport) {
    info!("{}", "=".repeat(60));
    info!("SELECTOR CONFLICT RESOLUTION SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Host selectors: {}", report.stats.host_selectors);
    info!("Guest selectors: {}", report.stats.guest_selectors);
    info!(
        "Conflicts: {} ({:.1}% of guest selectors)",
        report.stats.conflicts, report.stats.conflict_percentage
    );

    match report.status {
        RunStatus::NoConflicts => info!("No conflicts found; nothing to rewrite"),
        RunStatus::Success => {
            info!("Files modified: {}", report.files_modified);
            if let Some(output) = &report.output_path {
                info!("Output: {}", output.display());
            }
        }
    }
    if let Some(path) = &report.report_path {
        info!("Mapping report: {}", path.display());
    }

    if report.has_failures() {
        warn!("{} files were skipped", report.failures.len());
    }
    for failure in &report.failures {
        warn!(
            "Skipped {} ({:?}): {}",
            failure.path.display(),
            failure.stage,
            failure.message
        );
    }
    info!("{}", "=".repeat(60));
}
