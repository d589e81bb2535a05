//! # IdeaForge CLI (`forge`)
//!
//! The `forge` binary drives a brainstorming workspace: each project is a
//! directory of markdown documents under the configured projects dir, and
//! research findings are collected in a SQLite database with full-text
//! search. Document writes are atomic and multi-file scaffolds apply
//! all-or-nothing.
//!
//! ## Usage
//!
//! ```bash
//! forge --config ./config/forge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `forge init` | Create the workspace directories and findings database |
//! | `forge plan <project>` | Preview (or `--apply`) a project's document scaffold |
//! | `forge import <file>` | Parse a notes file and store its findings |
//! | `forge search "<query>"` | Full-text search over claims and evidence |
//! | `forge list` | List findings, newest first |
//! | `forge get <id>` | Show one finding in full |
//! | `forge delete <id>` | Remove a finding |
//! | `forge export <project>` | Write the requirements doc and findings dumps |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the workspace
//! forge init --config ./config/forge.toml
//!
//! # Scaffold a project (preview first, then apply)
//! forge plan roadtrip --summary "Plan a two-week EV road trip"
//! forge plan roadtrip --summary "Plan a two-week EV road trip" --apply
//!
//! # Ingest findings from research notes
//! forge import notes/findings.md --workstream research
//!
//! # Search the findings base
//! forge search "battery range" --source-type paper --limit 5
//!
//! # Export everything for the project
//! forge export roadtrip
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use ideaforge::config::{self, Config};
use ideaforge::db::FindingsDb;
use ideaforge::{export, ingest, workstream};

/// IdeaForge CLI — a local-first brainstorming workspace with atomic
/// project documents and a searchable research base.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file with the workspace layout, database path, and defaults.
#[derive(Parser)]
#[command(
    name = "forge",
    about = "IdeaForge — a local-first brainstorming workspace with a searchable research base",
    version,
    long_about = "IdeaForge keeps each brainstorming project as a directory of markdown documents \
    (kernel, outline, and one element per workstream) and collects research findings in a SQLite \
    database with full-text search. Scaffolds are previewed as diffs and applied atomically: a \
    multi-file change either lands completely or leaves every file untouched."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/forge.toml`. The workspace layout, database
    /// path, and search/ingest defaults are read from this file.
    #[arg(long, global = true, default_value = "./config/forge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the workspace.
    ///
    /// Creates the projects and exports directories and the findings
    /// database with its schema and full-text index. This command is
    /// idempotent — running it multiple times is safe.
    Init,

    /// Preview or apply a project's document scaffold.
    ///
    /// Plans `outline.md` plus one `elements/<kind>.md` per workstream and
    /// prints the result as a diff against what is on disk. Nothing is
    /// written without `--apply`; with it, the files land atomically,
    /// all-or-nothing.
    Plan {
        /// Project name (directory under the configured projects dir).
        project: String,

        /// One-paragraph kernel summary to carry into the outline.
        #[arg(long)]
        summary: Option<String>,

        /// Element kind to scaffold (repeatable). Defaults to the standard
        /// five: requirements, research, design, implementation, synthesis.
        #[arg(long = "element")]
        element: Vec<String>,

        /// Context lines shown around each change in the preview.
        #[arg(long, default_value_t = 3)]
        context: usize,

        /// Write the proposed files instead of only previewing them.
        #[arg(long)]
        apply: bool,
    },

    /// Parse a notes file and store its findings.
    ///
    /// Accepts markdown bullet lists
    /// (`- claim | evidence | url | confidence [| tags [| source_type]]`)
    /// or a JSON array of finding objects. Malformed entries are skipped
    /// and duplicates collapse to the highest-confidence copy.
    Import {
        /// Path to a markdown or JSON findings file.
        file: PathBuf,

        /// Workstream to tag findings that don't name one. Defaults to
        /// `[ingest].default_workstream`.
        #[arg(long)]
        workstream: Option<String>,
    },

    /// Full-text search over claims and evidence.
    ///
    /// Queries the FTS5 index and prints ranked results, best match first.
    Search {
        /// The search query string.
        query: String,

        /// Filter results to a single workstream.
        #[arg(long)]
        workstream: Option<String>,

        /// Filter results to a source type (e.g. `web`, `paper`).
        #[arg(long)]
        source_type: Option<String>,

        /// Maximum number of results. Defaults to `[search].default_limit`.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// List findings, newest first.
    List {
        /// Only show findings from this workstream.
        #[arg(long)]
        workstream: Option<String>,

        /// Only show findings with this source type.
        #[arg(long)]
        source_type: Option<String>,

        /// Only show findings at or above this confidence.
        #[arg(long)]
        min_confidence: Option<f64>,

        /// Maximum number of findings to show.
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },

    /// Show one finding in full.
    Get {
        /// Finding id (UUID).
        id: String,
    },

    /// Remove a finding from the store.
    Delete {
        /// Finding id (UUID).
        id: String,
    },

    /// Export a project bundle.
    ///
    /// Writes `requirements.md` (kernel + outline + elements stitched into
    /// one document), `findings.jsonl`, and `findings.csv`.
    Export {
        /// Project name to export.
        project: String,

        /// Output directory. Defaults to `<exports_dir>/<project>`.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&cfg).await?,
        Commands::Plan {
            project,
            summary,
            element,
            context,
            apply,
        } => run_plan(&cfg, &project, summary.as_deref(), &element, context, apply)?,
        Commands::Import { file, workstream } => {
            run_import(&cfg, &file, workstream.as_deref()).await?
        }
        Commands::Search {
            query,
            workstream,
            source_type,
            limit,
        } => {
            run_search(
                &cfg,
                &query,
                workstream.as_deref(),
                source_type.as_deref(),
                limit,
            )
            .await?
        }
        Commands::List {
            workstream,
            source_type,
            min_confidence,
            limit,
        } => {
            run_list(
                &cfg,
                workstream.as_deref(),
                source_type.as_deref(),
                min_confidence,
                limit,
            )
            .await?
        }
        Commands::Get { id } => run_get(&cfg, &id).await?,
        Commands::Delete { id } => run_delete(&cfg, &id).await?,
        Commands::Export { project, out } => run_export(&cfg, &project, out.as_deref()).await?,
    }

    Ok(())
}

async fn run_init(cfg: &Config) -> Result<()> {
    fs::create_dir_all(&cfg.workspace.projects_dir).with_context(|| {
        format!(
            "Failed to create projects directory: {}",
            cfg.workspace.projects_dir.display()
        )
    })?;
    fs::create_dir_all(&cfg.workspace.exports_dir).with_context(|| {
        format!(
            "Failed to create exports directory: {}",
            cfg.workspace.exports_dir.display()
        )
    })?;

    let db = FindingsDb::open(&cfg.db.path).await?;
    db.close().await;

    println!("Workspace initialized.");
    println!("  projects: {}", cfg.workspace.projects_dir.display());
    println!("  database: {}", cfg.db.path.display());
    Ok(())
}

fn run_plan(
    cfg: &Config,
    project: &str,
    summary: Option<&str>,
    elements: &[String],
    context: usize,
    apply: bool,
) -> Result<()> {
    let elements: Vec<String> = if elements.is_empty() {
        workstream::DEFAULT_ELEMENTS
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        elements.to_vec()
    };

    let project_dir = cfg.project_dir(project);
    let set = workstream::plan_change_set(&project_dir, project, summary, &elements)?;

    println!("{}", set.preview(context));
    if set.is_empty() {
        return Ok(());
    }

    if apply {
        set.apply()?;
        println!("Applied {} file(s).", set.len());
    } else {
        println!("Run again with --apply to write {} file(s).", set.len());
    }
    Ok(())
}

async fn run_import(cfg: &Config, file: &Path, workstream: Option<&str>) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read findings file: {}", file.display()))?;

    let default_workstream = workstream.unwrap_or(&cfg.ingest.default_workstream);
    let findings = ingest::parse_findings(&content, default_workstream)?;
    if findings.is_empty() {
        println!("No findings parsed.");
        return Ok(());
    }

    let db = FindingsDb::open(&cfg.db.path).await?;
    for finding in &findings {
        db.insert(finding).await?;
    }
    db.close().await;

    println!("Imported {} finding(s).", findings.len());
    Ok(())
}

async fn run_search(
    cfg: &Config,
    query: &str,
    workstream: Option<&str>,
    source_type: Option<&str>,
    limit: Option<i64>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let limit = limit.unwrap_or(cfg.search.default_limit);
    let db = FindingsDb::open(&cfg.db.path).await?;
    let hits = db.search(query, workstream, source_type, limit).await?;
    db.close().await;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let f = &hit.finding;
        println!("{}. [{:.2}] {}", i + 1, -hit.rank, f.claim);
        if !f.evidence.is_empty() {
            println!("   {}", f.evidence);
        }
        println!("   {} ({})", f.url, f.source_type);
        match &f.workstream {
            Some(ws) => println!("   workstream: {}  confidence: {:.2}", ws, f.confidence),
            None => println!("   confidence: {:.2}", f.confidence),
        }
        println!("   id: {}", f.id);
    }
    Ok(())
}

async fn run_list(
    cfg: &Config,
    workstream: Option<&str>,
    source_type: Option<&str>,
    min_confidence: Option<f64>,
    limit: i64,
) -> Result<()> {
    let db = FindingsDb::open(&cfg.db.path).await?;
    let findings = db.list(workstream, source_type, min_confidence, limit).await?;
    db.close().await;

    if findings.is_empty() {
        println!("No findings.");
        return Ok(());
    }

    println!("{} finding(s):", findings.len());
    for f in &findings {
        println!("- [{:.2}] {} ({})", f.confidence, f.claim, f.source_type);
        println!("  id: {}", f.id);
    }
    Ok(())
}

async fn run_get(cfg: &Config, id: &str) -> Result<()> {
    let db = FindingsDb::open(&cfg.db.path).await?;
    let found = db.get(id).await?;
    db.close().await;

    let Some(f) = found else {
        bail!("Finding not found: {id}");
    };

    println!("id:          {}", f.id);
    println!("claim:       {}", f.claim);
    println!("evidence:    {}", f.evidence);
    println!("url:         {}", f.url);
    println!("source_type: {}", f.source_type);
    println!("confidence:  {:.2}", f.confidence);
    println!("tags:        {}", f.tags.join(", "));
    println!("workstream:  {}", f.workstream.as_deref().unwrap_or("-"));
    println!("retrieved:   {}", f.retrieved_at);
    Ok(())
}

async fn run_delete(cfg: &Config, id: &str) -> Result<()> {
    let db = FindingsDb::open(&cfg.db.path).await?;
    let deleted = db.delete(id).await?;
    db.close().await;

    if !deleted {
        bail!("Finding not found: {id}");
    }
    println!("Deleted {id}.");
    Ok(())
}

async fn run_export(cfg: &Config, project: &str, out: Option<&Path>) -> Result<()> {
    let project_dir = cfg.project_dir(project);
    if !project_dir.is_dir() {
        bail!("Project not found: {}", project_dir.display());
    }

    let out_dir = match out {
        Some(dir) => dir.to_path_buf(),
        None => cfg.workspace.exports_dir.join(project),
    };

    let db = FindingsDb::open(&cfg.db.path).await?;
    let written = export::export_bundle(&db, &project_dir, Some(&out_dir)).await?;
    db.close().await;

    for path in &written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
