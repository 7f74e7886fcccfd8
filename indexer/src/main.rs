use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use urlindex::{load_cache, save_cache, HistoryInfo, QualificationPolicy, UrlIndex};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One line of a JSONL history dump, as exported by the history store.
#[derive(Debug, Deserialize)]
struct InputRow {
    id: u64,
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    visit_count: u32,
    #[serde(default)]
    typed_count: u32,
    /// Unix timestamp in seconds.
    #[serde(default)]
    last_visit: i64,
}

impl From<InputRow> for HistoryInfo {
    fn from(row: InputRow) -> Self {
        HistoryInfo {
            history_id: row.id,
            url: row.url,
            title: row.title,
            visit_count: row.visit_count,
            typed_count: row.typed_count,
            last_visit: row.last_visit,
        }
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query the URL history search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index cache from a JSONL history dump
    Build {
        /// Input history dump (JSONL, one row per line)
        #[arg(long)]
        input: PathBuf,
        /// Output cache file
        #[arg(long)]
        cache: PathBuf,
        /// Index every row regardless of visit significance
        #[arg(long, default_value_t = false)]
        keep_all: bool,
        /// Display-formatting languages hint, e.g. "en-US,en"
        #[arg(long, default_value = "")]
        languages: String,
    },
    /// Query a saved cache, rebuilding from the dump if the cache is unusable
    Query {
        /// Cache file to restore
        #[arg(long)]
        cache: PathBuf,
        /// History dump to rebuild from when the cache fails to restore
        #[arg(long)]
        input: Option<PathBuf>,
        /// Query terms
        terms: Vec<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            cache,
            keep_all,
            languages,
        } => build(&input, &cache, keep_all, &languages),
        Commands::Query { cache, input, terms } => query(&cache, input.as_deref(), &terms),
    }
}

fn read_rows(input: &Path) -> Result<Vec<HistoryInfo>> {
    let file =
        File::open(input).with_context(|| format!("opening history dump {}", input.display()))?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: InputRow = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", input.display(), line_no + 1))?;
        rows.push(row.into());
    }
    Ok(rows)
}

fn build(input: &Path, cache: &Path, keep_all: bool, languages: &str) -> Result<()> {
    let rows = read_rows(input)?;
    let total = rows.len();
    let policy = if keep_all {
        QualificationPolicy::keep_all()
    } else {
        QualificationPolicy::default()
    };

    let mut index = UrlIndex::with_languages(languages);
    index.rebuild_from_rows(rows, &policy, now_unix());
    tracing::info!(
        rows = total,
        indexed = index.history_item_count(),
        words = index.word_count(),
        "indexed history dump"
    );

    save_cache(cache, &index)?;
    tracing::info!(cache = %cache.display(), "index build complete");
    Ok(())
}

fn query(cache: &Path, input: Option<&Path>, terms: &[String]) -> Result<()> {
    let mut index = match load_cache(cache) {
        Ok(index) => index,
        Err(err) => {
            // A bad cache is an expected condition (first run, format
            // change, corruption); fall back to a full rebuild.
            tracing::warn!(%err, "cache restore failed, rebuilding from history dump");
            let input = input.context("cache unusable and no --input dump to rebuild from")?;
            let rows = read_rows(input)?;
            let mut index = UrlIndex::new();
            index.rebuild_from_rows(rows, &QualificationPolicy::default(), now_unix());
            if let Err(err) = save_cache(cache, &index) {
                tracing::warn!(%err, "could not rewrite cache, continuing in memory");
            }
            index
        }
    };

    let matches = index.history_items_for_terms(&terms.join(" "));
    if matches.is_empty() {
        println!("no matches");
        return Ok(());
    }
    for m in &matches {
        println!("{:>4}  {}  {}", m.raw_score, m.url, m.title);
    }
    Ok(())
}

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
