use anyhow::Context;
use chronicle_common::{
    ActivityFilter, ActorId, ActorInfo, ContentPath, HistoryFilter, SubjectId, VersionKind,
    VersionRecord,
};
use chronicle_engine::{
    ConflictResolution, CreateOptions, Engine, EngineConfig, MergeStrategy, RestoreOptions,
    StaticDirectory, TracingNotifier,
};
use chronicle_kernel::ConcurrentEdits;
use chronicle_persist::FileStore;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chronicle", about = "CLI tool for content versioning")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Store directory
    #[arg(long, global = true, default_value = ".chronicle")]
    store: PathBuf,

    /// Engine configuration (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Actor directory (YAML list of actors)
    #[arg(long, global = true)]
    actors: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print tool version and store summary
    Info,
    /// Create a new version from a JSON file ("-" reads stdin)
    Create {
        subject: String,
        file: PathBuf,
        #[arg(short, long, default_value = "auto")]
        kind: VersionKind,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Label to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(short, long, default_value = "cli")]
        actor: String,
        /// Head version this content is based on
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        branch: Option<String>,
    },
    /// List versions, newest first
    History {
        subject: String,
        #[arg(short, long, default_value = "50")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Hide snapshot versions
        #[arg(long)]
        no_snapshots: bool,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        actor: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one version (the head if none is given)
    Show {
        subject: String,
        version: Option<String>,
        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare two versions
    Diff {
        subject: String,
        source: String,
        target: String,
        /// Path edited concurrently (repeatable)
        #[arg(long = "concurrent")]
        concurrent: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Restore an earlier version
    Restore {
        subject: String,
        target: String,
        #[arg(short, long, default_value = "overwrite")]
        strategy: MergeStrategy,
        /// Path restored by a selective restore (repeatable)
        #[arg(long = "path")]
        paths: Vec<String>,
        #[arg(long, default_value = "auto")]
        resolution: ConflictResolution,
        /// Path edited concurrently (repeatable)
        #[arg(long = "concurrent")]
        concurrent: Vec<String>,
        /// Skip the pre-restore backup snapshot
        #[arg(long)]
        no_backup: bool,
        /// Notify collaborators
        #[arg(long)]
        notify: bool,
        #[arg(short, long, default_value = "cli")]
        actor: String,
    },
    /// List collaborator activity, newest first
    Activity {
        subject: String,
        #[arg(short, long, default_value = "50")]
        limit: usize,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Verify segment hashes and the manifest chain
    Verify {
        /// Only this subject (all subjects otherwise)
        subject: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let store = Arc::new(
        FileStore::open(&cli.store)
            .with_context(|| format!("opening store {}", cli.store.display()))?,
    );
    let directory = Arc::new(load_directory(cli.actors.as_deref())?);
    let engine = Engine::new(store.clone(), directory)
        .with_config(config)
        .with_notifier(Arc::new(TracingNotifier));

    match cli.command {
        Commands::Info => {
            println!("chronicle v{}", env!("CARGO_PKG_VERSION"));
            println!("store: {}", store.root().display());
            let config = engine.config();
            println!(
                "codec: encoding={}, compression={}, zstd_level={}",
                config.codec.encoding, config.codec.compression, config.codec.zstd_level
            );
            println!("default branch: {}", config.default_branch);
            let subjects = store.subjects()?;
            println!("subjects: {}", subjects.len());
            for meta in subjects {
                println!(
                    "  {} head={} versions={} activities={}",
                    meta.subject_id,
                    meta.head.as_deref().unwrap_or("-"),
                    meta.version_count,
                    meta.activity_count
                );
            }
        }
        Commands::Create {
            subject,
            file,
            kind,
            title,
            description,
            tags,
            actor,
            parent,
            branch,
        } => {
            let content = read_json(&file)?;
            let record = engine.create_version(
                &SubjectId::new(subject),
                &content,
                CreateOptions {
                    kind,
                    title,
                    description,
                    tags: tags.into_iter().collect(),
                    parent_version: parent,
                    branch_name: branch,
                    ..CreateOptions::new(ActorId::new(actor))
                },
            )?;
            println!(
                "created {} ({}, {} bytes, sha256 {})",
                record.version, record.kind, record.metadata.size_bytes, record.metadata.checksum
            );
            for change in &record.changes {
                println!("  {:?} {} {}", change.kind, change.path, change.description);
            }
        }
        Commands::History {
            subject,
            limit,
            offset,
            no_snapshots,
            branch,
            actor,
            json,
        } => {
            let history = engine.list_versions(
                &SubjectId::new(subject),
                HistoryFilter {
                    limit,
                    offset,
                    include_snapshots: !no_snapshots,
                    branch_name: branch,
                    actor_id: actor.map(ActorId::new),
                    ..HistoryFilter::default()
                },
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                for record in &history.versions {
                    print_summary(record);
                }
                println!(
                    "{} of {} version(s){}",
                    history.versions.len(),
                    history.total,
                    if history.has_more { ", more available" } else { "" }
                );
            }
        }
        Commands::Show {
            subject,
            version,
            json,
        } => {
            let subject = SubjectId::new(subject);
            let record = match version {
                Some(version) => engine.get_version(&subject, &version)?,
                None => engine
                    .latest(&subject)?
                    .with_context(|| format!("{subject} has no versions"))?,
            };
            let content = engine.read_content(&record)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_summary(&record);
                if let Some(description) = &record.description {
                    println!("  {description}");
                }
                if !record.tags.is_empty() {
                    let tags: Vec<_> = record.tags.iter().map(String::as_str).collect();
                    println!("  tags: {}", tags.join(", "));
                }
            }
            println!("{}", serde_json::to_string_pretty(&content)?);
        }
        Commands::Diff {
            subject,
            source,
            target,
            concurrent,
            json,
        } => {
            let edits = parse_concurrent(&concurrent)?;
            let comparison = engine.compare(
                &SubjectId::new(subject),
                &source,
                &target,
                edits.as_ref(),
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&comparison)?);
            } else {
                for difference in &comparison.differences {
                    println!(
                        "{:<12} {:<6} {:<24} {}",
                        format!("{:?}", difference.kind),
                        format!("{:?}", difference.severity),
                        difference.path,
                        difference.description
                    );
                }
                let summary = &comparison.summary;
                println!(
                    "{} change(s): +{} -{} ~{} >{}; similarity {:.3}; conflicts {}",
                    summary.total_changes,
                    summary.additions,
                    summary.deletions,
                    summary.modifications,
                    summary.moves,
                    comparison.similarity_score,
                    comparison.conflict_count
                );
            }
        }
        Commands::Restore {
            subject,
            target,
            strategy,
            paths,
            resolution,
            concurrent,
            no_backup,
            notify,
            actor,
        } => {
            let outcome = engine.restore(
                &SubjectId::new(subject),
                RestoreOptions {
                    create_backup: !no_backup,
                    merge_strategy: strategy,
                    selected_paths: paths,
                    conflict_resolution: resolution,
                    notify_collaborators: notify,
                    concurrent_paths: concurrent,
                    ..RestoreOptions::new(target)
                },
                &ActorId::new(actor),
            )?;
            if let Some(backup) = &outcome.backup {
                println!("backup {}", backup.version);
            }
            println!(
                "restored as {} (parent {})",
                outcome.restored.version,
                outcome.restored.parent_version.as_deref().unwrap_or("-")
            );
        }
        Commands::Activity {
            subject,
            limit,
            actor,
        } => {
            let feed = engine.list_activity(
                &SubjectId::new(subject),
                ActivityFilter {
                    limit,
                    actor_id: actor.map(ActorId::new),
                    ..ActivityFilter::default()
                },
            )?;
            for activity in &feed.activities {
                println!(
                    "{} {:<16} {:<10} {} ({} change(s), {})",
                    activity.timestamp.to_rfc3339(),
                    activity.action.as_str(),
                    activity.actor_name,
                    activity.version,
                    activity.changes.len(),
                    activity.session_id
                );
            }
            println!("{} of {} event(s)", feed.activities.len(), feed.total);
        }
        Commands::Verify { subject } => {
            let subjects = match subject {
                Some(subject) => vec![SubjectId::new(subject)],
                None => store
                    .subjects()?
                    .into_iter()
                    .map(|meta| meta.subject_id)
                    .collect(),
            };
            for subject in &subjects {
                store
                    .verify_integrity(subject)
                    .with_context(|| format!("integrity check failed for {subject}"))?;
                println!("{subject}: OK");
            }
            println!("verified {} subject(s)", subjects.len());
        }
    }

    Ok(())
}

fn load_directory(path: Option<&Path>) -> anyhow::Result<StaticDirectory> {
    let Some(path) = path else {
        return Ok(StaticDirectory::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading actors {}", path.display()))?;
    let actors: Vec<ActorInfo> = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing actors {}", path.display()))?;
    tracing::debug!(count = actors.len(), "loaded actor directory");
    Ok(StaticDirectory::from_actors(actors))
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let mut raw = String::new();
    if path.as_os_str() == "-" {
        std::io::stdin().read_to_string(&mut raw)?;
    } else {
        raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
    }
    serde_json::from_str(&raw).with_context(|| format!("parsing JSON from {}", path.display()))
}

fn parse_concurrent(raw: &[String]) -> anyhow::Result<Option<ConcurrentEdits>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let paths = raw
        .iter()
        .map(|p| ContentPath::parse(p).with_context(|| format!("invalid path {p:?}")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Some(ConcurrentEdits::new(paths)))
}

fn print_summary(record: &VersionRecord) {
    println!(
        "{:<28} {:<8} {} {:<20} {}",
        record.version,
        record.kind.as_str(),
        record.created_at.to_rfc3339(),
        record.author.display_name,
        record.title
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn restore_flags_parse() {
        let cli = Cli::parse_from([
            "chronicle",
            "--store",
            "/tmp/x",
            "restore",
            "game-1",
            "1.0.0",
            "--strategy",
            "selective",
            "--path",
            "words",
            "--path",
            "/title",
            "--no-backup",
        ]);
        match cli.command {
            Commands::Restore {
                strategy,
                paths,
                no_backup,
                resolution,
                ..
            } => {
                assert_eq!(strategy, MergeStrategy::Selective);
                assert_eq!(paths, vec!["words", "/title"]);
                assert!(no_backup);
                assert_eq!(resolution, ConflictResolution::Auto);
            }
            _ => panic!("expected restore"),
        }
        assert_eq!(cli.store, PathBuf::from("/tmp/x"));
    }

    #[test]
    fn concurrent_paths_are_optional() {
        assert!(parse_concurrent(&[]).unwrap().is_none());
        let edits = parse_concurrent(&["content.words".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(edits.paths()[0].to_string(), "/content/words");
        assert!(parse_concurrent(&["a..b".to_string()]).is_err());
    }
}
