//! annals command-line entry point.
//!
//! # Responsibility
//! - Parse arguments, load config and documents, and drive one core use-case.
//! - Hold the writer lock around every mutating command.
//!
//! # Invariants
//! - The exit code is non-zero only for aborting errors (config, I/O,
//!   parse, lock); item-level reconcile failures are reported, not fatal.

use annals_core::{
    coverage, expand_batch, init_logging, load_batch, write_backup, AuditService, ConfigError,
    CoreConfig, DatasetRepository, ItemOutcome, JsonDocumentRepository, LoggingError,
    ReconcileReport, ReconcileService, RepoError, StoreError, WriterLock, YearRange,
};
use clap::{Parser, Subcommand};
use log::{error, info};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "annals", version, about = "Reconcile historical figures against events")]
struct Cli {
    /// Entity (character) document.
    #[arg(long, global = true, default_value = "data/characters.json")]
    entities: PathBuf,

    /// Event document.
    #[arg(long, global = true, default_value = "data/events.json")]
    events: PathBuf,

    /// TOML config; built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enables file logging into this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look up one entity by name.
    Find { name: String },

    /// Apply a batch of name/event associations.
    Reconcile {
        /// JSON array of `{ name, eventId?, relatedEvents?, ... }` records.
        batch: PathBuf,

        /// Report what would change without saving.
        #[arg(long)]
        dry_run: bool,
    },

    /// Partition entities against an in-scope year range.
    Audit {
        #[arg(long, requires = "to")]
        from: Option<i32>,

        #[arg(long, requires = "from")]
        to: Option<i32>,

        /// Detach and remove the entities marked for removal, then save.
        #[arg(long)]
        apply: bool,

        /// Write removed records here before saving.
        #[arg(long, requires = "apply")]
        backup: Option<PathBuf>,
    },

    /// Summarize link coverage.
    Coverage {
        #[arg(long, default_value_t = annals_core::service::coverage_service::DEFAULT_TOP_N)]
        top: usize,
    },

    /// Restore entity/event edge symmetry and save.
    Repair,
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Repo(RepoError),
    Store(StoreError),
    Output(serde_json::Error),
    Usage(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Output(err) => write!(f, "failed to render output: {err}"),
            Self::Usage(message) => write!(f, "{message}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Output(err) => Some(err),
            Self::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<StoreError> for CliError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=run_end module=cli status=error");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    if let Some(log_dir) = &cli.log_dir {
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or_else(|| annals_core::default_log_level());
        init_logging(level, log_dir)?;
    }
    let repo = JsonDocumentRepository::new(&cli.entities, &cli.events);

    match cli.command {
        Command::Find { name } => {
            let dataset = repo.load(config.normalizer())?;
            match dataset.entities.resolve(&name) {
                Some((entity, _)) if cli.json => print_json(entity)?,
                Some((entity, kind)) => {
                    println!("{} {} ({kind:?} match)", entity.id, entity.name);
                    println!("  events: {}", entity.related_events.join(", "));
                }
                None => println!("not found"),
            }
        }
        Command::Reconcile { batch, dry_run } => {
            let candidates = expand_batch(load_batch(&batch)?);
            let service = ReconcileService::from_config(&config)?;
            let report = if dry_run {
                let dataset = repo.load(config.normalizer())?;
                service.dry_run(&dataset, &candidates)
            } else {
                let _lock = WriterLock::acquire(repo.entities_path())?;
                let mut dataset = repo.load(config.normalizer())?;
                let report = service.reconcile(&mut dataset, &candidates);
                if report.has_changes() {
                    repo.save(&dataset)?;
                }
                report
            };
            if cli.json {
                print_json(&report)?;
            } else {
                print_reconcile(&report);
            }
        }
        Command::Audit {
            from,
            to,
            apply,
            backup,
        } => {
            let scope = match (from, to) {
                (Some(start), Some(end)) => YearRange::new(start, end).ok_or_else(|| {
                    CliError::Usage(format!("--from {start} is after --to {end}"))
                })?,
                _ => config.audit_scope()?.ok_or_else(|| {
                    CliError::Usage(
                        "audit scope required: pass --from/--to or set [audit] in config".into(),
                    )
                })?,
            };
            let _lock = if apply {
                Some(WriterLock::acquire(repo.entities_path())?)
            } else {
                None
            };
            let mut dataset = repo.load(config.normalizer())?;
            let service = AuditService::new(config.audit.pinned.clone());
            let report = service.audit(&dataset, scope);
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "scope {scope}: keep {} remove {} pinned overrides {}",
                    report.partition.keep.len(),
                    report.partition.remove.len(),
                    report.partition.pinned_overrides.len()
                );
                for candidate in &report.partition.remove {
                    println!(
                        "  remove {} {} no_link_in_scope={} outside_lifespan={}",
                        candidate.id,
                        candidate.name,
                        candidate.no_link_in_scope,
                        candidate.outside_lifespan
                    );
                }
                for name in &report.partition.unresolved_pins {
                    println!("  unresolved pin: {name}");
                }
                println!(
                    "findings: orphan events {} dangling edges {} asymmetric edges {}",
                    report.findings.events_without_entities.len(),
                    report.findings.dangling_edges.len(),
                    report.findings.asymmetric_edges.len()
                );
            }
            if apply {
                let applied = service.apply(&mut dataset, &report.partition)?;
                if let Some(path) = &backup {
                    write_backup(path, &applied.removed)?;
                }
                repo.save(&dataset)?;
                if !cli.json {
                    println!(
                        "removed {} entities, detached {} edges",
                        applied.removed.len(),
                        applied.detached_edges
                    );
                }
            }
        }
        Command::Coverage { top } => {
            let dataset = repo.load(config.normalizer())?;
            let report = coverage(&dataset, top);
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "entities {} events {} with entities {} without {} links {}",
                    report.total_entities,
                    report.total_events,
                    report.events_with_entities,
                    report.events_without_entities,
                    report.total_links
                );
                for decade in &report.by_decade {
                    println!(
                        "  {}s: events {} with entities {} links {}",
                        decade.decade, decade.events, decade.events_with_entities, decade.links
                    );
                }
                for (rank, entity) in report.most_linked.iter().enumerate() {
                    println!("  #{} {} {} ({} events)", rank + 1, entity.id, entity.name, entity.events);
                }
            }
        }
        Command::Repair => {
            let _lock = WriterLock::acquire(repo.entities_path())?;
            let mut dataset = repo.load(config.normalizer())?;
            let report = dataset.ledger().repair();
            repo.save(&dataset)?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "restored {} dropped dangling {} dropped duplicates {}",
                    report.restored, report.dropped_dangling, report.dropped_duplicates
                );
            }
        }
    }
    info!("event=run_end module=cli status=ok");
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_reconcile(report: &ReconcileReport) {
    let summary = &report.summary;
    println!(
        "{}created {} reused {} skipped {} failed {} (placeholders {}, lifespan conflicts {})",
        if report.dry_run { "[dry run] " } else { "" },
        summary.created,
        summary.reused,
        summary.skipped,
        summary.failed,
        summary.placeholders,
        summary.lifespan_conflicts
    );
    for item in &report.items {
        let event = item.event_id.as_deref().unwrap_or("-");
        let detail = match &item.outcome {
            ItemOutcome::Created { id, placeholder } => {
                format!("created {id}{}", if *placeholder { " (placeholder)" } else { "" })
            }
            ItemOutcome::Reused { id } => format!("reused {id}"),
            ItemOutcome::SkippedDuplicate { id } => format!("skipped duplicate {id}"),
            ItemOutcome::EventNotFound { event_id } => format!("event not found {event_id}"),
            ItemOutcome::Failed { reason } => format!("failed: {reason}"),
        };
        let warning = if item.lifespan_conflict {
            " [lifespan conflict]"
        } else {
            ""
        };
        println!("  #{} {} @ {event}: {detail}{warning}", item.index, item.name);
    }
}
