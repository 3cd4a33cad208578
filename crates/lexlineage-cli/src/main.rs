//! # lexlineage CLI
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexlineage run` | Group and version a statute collection, export the result set |
//! | `lexlineage show <export.json>` | Query an exported result set |
//! | `lexlineage normalize` | Print the base name of titles |
//! | `lexlineage snippet <id>` | Print the context snippet built for a statute |
//! | `lexlineage stats <members.parquet>` | DuckDB summaries (feature `duckdb`) |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

mod display;
mod progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use lexlineage_ai::{ClaudeOracle, GroupingOracle};
use lexlineage_core::tabular::group_rows;
use lexlineage_core::{Province, RunConfig, ScopeConfig, build_snippet, normalize_base_name};
use lexlineage_engine::{RunStatus, start_run};
use lexlineage_store::export::{read_json, write_csv, write_json, write_parquet};
use lexlineage_store::{
    GroupQuery, JsonFileSource, MemoryResultStore, ResultExport, ResultStore, StatuteSource,
    load_all,
};
use lexlineage_sync::{HttpStatuteSource, SyncClient};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::progress::{ProgressFormat, format_number};

#[derive(Parser)]
#[command(
    name = "lexlineage",
    version,
    about = "Group statute records into versioned instruments and amendment chains"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run grouping, versioning and chain detection over a statute collection.
    Run(RunArgs),

    /// Query a JSON result set written by `run --json-out`.
    Show(ShowArgs),

    /// Print the base name each title normalises to.
    Normalize {
        /// Titles to normalise.
        titles: Vec<String>,

        /// Normalise every title in a statute file instead.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Print the context snippet built for one statute.
    Snippet {
        /// Statute id.
        id: String,

        /// Statute file (JSON array or JSON Lines).
        #[arg(long)]
        input: PathBuf,

        /// Run configuration (TOML); only `[snippet]` is used.
        #[arg(long, env = "LEXLINEAGE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Summaries over an exported member Parquet file.
    #[cfg(feature = "duckdb")]
    Stats {
        /// Parquet file written by `run --parquet-out`.
        parquet: PathBuf,

        /// Number of largest groups to list.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Run an arbitrary query against `statute_members` instead.
        #[arg(long)]
        sql: Option<String>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Statute file: a JSON array or JSON Lines.
    #[arg(long, conflicts_with = "source_url", required_unless_present = "source_url")]
    input: Option<PathBuf>,

    /// Base URL of an upstream statute store.
    #[arg(long, env = "LEXLINEAGE_SOURCE_URL")]
    source_url: Option<String>,

    /// Run configuration (TOML). Flags below override it.
    #[arg(long, env = "LEXLINEAGE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    parallelism: Option<usize>,

    #[arg(long)]
    min_merge_confidence: Option<f32>,

    /// Group every batch by base name without calling the oracle.
    #[arg(long)]
    no_oracle: bool,

    /// Skip amendment chain detection.
    #[arg(long)]
    no_chains: bool,

    /// Only process these jurisdictions (repeatable).
    #[arg(long = "jurisdiction")]
    jurisdictions: Vec<String>,

    /// Only process these statute ids (repeatable).
    #[arg(long = "statute")]
    statute_ids: Vec<String>,

    #[arg(long, value_enum, default_value_t = ProgressFormat::Human)]
    progress: ProgressFormat,

    /// Write the nested result set as JSON.
    #[arg(long)]
    json_out: Option<PathBuf>,

    /// Write one row per group member as Parquet.
    #[arg(long)]
    parquet_out: Option<PathBuf>,

    /// Write one row per group member as CSV.
    #[arg(long)]
    csv_out: Option<PathBuf>,

    /// Push the result set to a downstream inbox at this base URL.
    #[arg(long, env = "LEXLINEAGE_PUSH_URL")]
    push_url: Option<String>,
}

impl RunArgs {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(n) = self.parallelism {
            config.parallelism = n;
        }
        if let Some(c) = self.min_merge_confidence {
            config.min_merge_confidence = c;
        }
        if self.no_oracle {
            config.use_oracle = false;
        }
        if self.no_chains {
            config.detect_chains = false;
        }
        if !self.jurisdictions.is_empty() || !self.statute_ids.is_empty() {
            config.scope = ScopeConfig {
                jurisdictions: self.jurisdictions.clone(),
                statute_ids: self.statute_ids.clone(),
            };
        }
    }
}

#[derive(Args)]
struct ShowArgs {
    /// JSON result set written by `run --json-out`.
    export: PathBuf,

    #[arg(long)]
    jurisdiction: Option<String>,

    /// Base name or raw title; compared after normalisation.
    #[arg(long)]
    base_name: Option<String>,

    /// Only the group (or chain) containing this statute id.
    #[arg(long)]
    statute: Option<String>,

    #[arg(long, default_value_t = 0)]
    offset: usize,

    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// List amendment chains instead of groups.
    #[arg(long)]
    chains: bool,

    /// Print the page as JSON instead of cards.
    #[arg(long)]
    json: bool,
}

impl ShowArgs {
    fn query(&self) -> GroupQuery {
        let mut query = GroupQuery::default().page(self.offset, self.limit);
        if let Some(j) = &self.jurisdiction {
            query = query.jurisdiction(Province::from_label(Some(j.as_str())));
        }
        if let Some(b) = &self.base_name {
            query = query.base_name(b.as_str());
        }
        if let Some(s) = &self.statute {
            query = query.statute_id(s.as_str());
        }
        query
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Show(args) => cmd_show(args).await,
        Commands::Normalize { titles, input } => cmd_normalize(titles, input.as_deref()).await,
        Commands::Snippet { id, input, config } => {
            cmd_snippet(&id, &input, config.as_deref()).await
        }
        #[cfg(feature = "duckdb")]
        Commands::Stats { parquet, top, sql } => cmd_stats(&parquet, top, sql.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RunConfig> {
    match path {
        Some(p) => RunConfig::load(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(RunConfig::default()),
    }
}

async fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate().context("invalid run configuration")?;

    let source: Arc<dyn StatuteSource> = match (&args.input, &args.source_url) {
        (Some(path), _) => Arc::new(JsonFileSource::new(path)),
        (None, Some(url)) => Arc::new(HttpStatuteSource::new(SyncClient::new(url.clone()))),
        (None, None) => bail!("either --input or --source-url is required"),
    };

    let oracle: Option<Arc<dyn GroupingOracle>> = if config.use_oracle {
        match ClaudeOracle::from_config(&config.oracle) {
            Ok(oracle) => Some(Arc::new(oracle)),
            Err(e) => {
                // The run itself warns once when it falls back.
                debug!(error = %e, "oracle client not created");
                None
            }
        }
    } else {
        None
    };

    let store = Arc::new(MemoryResultStore::new());
    let mut handle = start_run(source, store.clone(), oracle, config);

    let cancel = handle.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after committed batches");
            cancel.cancel();
        }
    });

    let reporter = args.progress.reporter();
    while let Some(event) = handle.next_event().await {
        reporter.report(&event);
    }
    let summary = handle.wait().await?;

    if summary.status == RunStatus::Error {
        bail!(
            "run {} failed: {}",
            summary.run_id,
            summary.error.unwrap_or_default()
        );
    }
    if store.current_run().await?.as_deref() != Some(summary.run_id.as_str()) {
        warn!(
            run_id = %summary.run_id,
            "run stopped before any results were committed, nothing to export"
        );
        return Ok(());
    }

    let (groups, chains) = store.snapshot().await;
    if let Some(path) = &args.json_out {
        let export = ResultExport::new(&summary.run_id, groups.clone(), chains.clone());
        write_json(path, &export).with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &args.parquet_out {
        write_parquet(path, &groups).with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &args.csv_out {
        write_csv(path, &groups).with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(url) = &args.push_url {
        let accepted = SyncClient::new(url.clone())
            .push_groups(&summary.run_id, &groups, &chains)
            .await
            .with_context(|| format!("pushing results to {url}"))?;
        info!(accepted, "results pushed");
    }

    let counts = &summary.counts;
    println!(
        "run {} {}: {} statutes, {} groups, {} amendment chains ({} oracle / {} fallback batches)",
        summary.run_id,
        summary.status,
        format_number(counts.statutes),
        format_number(counts.groups),
        format_number(counts.chains),
        counts.oracle_batches,
        counts.fallback_batches
    );
    Ok(())
}

async fn cmd_show(args: ShowArgs) -> anyhow::Result<()> {
    let export = read_json(&args.export)
        .with_context(|| format!("reading result set {}", args.export.display()))?;
    let store = MemoryResultStore::from_export(export);
    let query = args.query();

    if args.chains {
        let page = store.query_chains(&query).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&page)?);
            return Ok(());
        }
        for chain in &page.items {
            display::print_chain(chain);
        }
        print_page_footer(args.offset, page.items.len(), page.total, "chains");
        return Ok(());
    }

    let page = store.query_groups(&query).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }
    for group in &page.items {
        let rows = group_rows(std::slice::from_ref(group))?;
        display::print_group_card(&rows)?;
    }
    print_page_footer(args.offset, page.items.len(), page.total, "groups");
    Ok(())
}

fn print_page_footer(offset: usize, shown: usize, total: usize, what: &str) {
    if shown == 0 {
        println!("no {what} match (total {total})");
    } else {
        println!("{what} {}-{} of {}", offset + 1, offset + shown, total);
    }
}

async fn cmd_normalize(titles: Vec<String>, input: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = input {
        let source = JsonFileSource::new(path);
        let statutes = load_all(&source, 1000, &ScopeConfig::default()).await?;
        for statute in &statutes {
            let title = statute.title_str().unwrap_or("");
            println!(
                "{}\t{}\t{}",
                statute.id,
                Province::of(statute),
                normalize_base_name(title)
            );
        }
        return Ok(());
    }
    if titles.is_empty() {
        bail!("give one or more titles, or --input");
    }
    for title in &titles {
        println!("{}\t{}", title, normalize_base_name(title));
    }
    Ok(())
}

async fn cmd_snippet(id: &str, input: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let source = JsonFileSource::new(input);
    let scope = ScopeConfig {
        jurisdictions: vec![],
        statute_ids: vec![id.to_string()],
    };
    let statutes = load_all(&source, 1000, &scope).await?;
    let Some(statute) = statutes.first() else {
        bail!("statute {id} not found in {}", input.display());
    };
    let snippet = build_snippet(statute, &config.snippet);
    if snippet.is_empty() {
        println!("(empty snippet)");
    } else {
        println!("{}", snippet.text);
    }
    debug!(statute_id = id, chars = snippet.char_len(), "snippet built");
    Ok(())
}

#[cfg(feature = "duckdb")]
fn cmd_stats(parquet: &Path, top: usize, sql: Option<&str>) -> anyhow::Result<()> {
    let store = lexlineage_store::DuckStore::open()?;
    store
        .load_members(parquet)
        .with_context(|| format!("loading {}", parquet.display()))?;

    if let Some(sql) = sql {
        let batches = store.query_arrow(sql)?;
        println!("{}", arrow::util::pretty::pretty_format_batches(&batches)?);
        return Ok(());
    }

    println!("{} member rows", format_number(store.member_count()?));
    println!();
    println!("{:<20} {:>10} {:>10}", "jurisdiction", "members", "groups");
    for (jurisdiction, members, groups) in store.rows_per_jurisdiction()? {
        println!("{jurisdiction:<20} {members:>10} {groups:>10}");
    }
    println!();
    println!("{:<20} {:>10}", "method", "members");
    for (method, members) in store.rows_per_method()? {
        println!("{method:<20} {members:>10}");
    }
    println!();
    println!("largest groups");
    for group in store.largest_groups(top)? {
        println!(
            "  {:>4}  {:<40} {}",
            group.members, group.base_name, group.jurisdiction
        );
    }
    Ok(())
}
