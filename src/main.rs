//! rustlitmerge - merge and rank literature search results
//!
//! Takes the result lists of several literature queries (one JSON file per
//! query), scores every record, identifies duplicates across queries and
//! writes one curated publication list.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! rustlitmerge merge ./results --keywords "graph,molecule" --sort rank
//! rustlitmerge compare ./results --p 0.9
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! rustlitmerge serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use rustlitmerge::{
    compare::{self, CompareOptions, IdField, PairComparison, RankedList},
    loader,
    merge::{CanonicalPolicy, MergeOptions, SortOrder},
    pipeline::{self, PipelineOptions, PipelineReport},
    record::SourceResultSet,
    MergeError,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Merge, deduplicate, score and rank literature search results
#[derive(Parser)]
#[command(name = "rustlitmerge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge all result files of a directory into one ranked list
    Merge {
        /// Directory with one JSON result file per query
        dir: PathBuf,

        /// Keywords for title/abstract match scores (e.g., "graph,molecule")
        #[arg(long)]
        keywords: Option<String>,

        /// Reference text for similarity scores
        #[arg(long, conflicts_with = "reference_file")]
        reference: Option<String>,

        /// File holding the reference text for similarity scores
        #[arg(long)]
        reference_file: Option<PathBuf>,

        /// Skip cross-source match finding (no occurrence counts)
        #[arg(long)]
        no_matches: bool,

        /// Which duplicate supplies descriptive fields: last, first, most-cited
        #[arg(long, default_value = "last")]
        canonical: CanonicalPolicy,

        /// Output order: title, rank, occurrence, similarity
        #[arg(long, default_value = "title")]
        sort: SortOrder,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },

    /// Compare the result lists pairwise and flag redundant queries
    Compare {
        /// Directory with one JSON result file per query
        dir: PathBuf,

        /// RBO persistence parameter
        #[arg(long, default_value = "0.9")]
        p: f64,

        /// Flag pairs sharing more than this fraction of results
        #[arg(long, default_value = "0.7")]
        min_match: f64,

        /// Flag pairs whose RBO exceeds this value
        #[arg(long, default_value = "0.5")]
        min_rbo: f64,

        /// Compare by DOI instead of normalized title
        #[arg(long)]
        by_doi: bool,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Merge {
            dir,
            keywords,
            reference,
            reference_file,
            no_matches,
            canonical,
            sort,
            output,
        } => {
            let reference_document = match reference_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read reference file {:?}", path))?,
                ),
                None => reference,
            };
            let options = PipelineOptions {
                keywords: split_keywords(keywords.as_deref()),
                reference_document,
                find_matches: !no_matches,
                merge: MergeOptions { canonical, sort },
            };
            run_merge(&dir, &options, &output)
        }
        Commands::Compare {
            dir,
            p,
            min_match,
            min_rbo,
            by_doi,
        } => {
            let options = CompareOptions {
                persistence: p,
                min_match,
                min_rbo,
            };
            let field = if by_doi { IdField::Doi } else { IdField::Title };
            run_compare(&dir, &options, field)
        }
        Commands::Serve { port, host } => run_server(host, port).await,
    }
}

/// Split a comma-separated keyword list, dropping blanks
fn split_keywords(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

// ============================================================================
// Merge Pipeline
// ============================================================================

fn run_merge(dir: &Path, options: &PipelineOptions, output_dir: &Path) -> Result<()> {
    println!("\n--- Loading result files ---");
    let sources = loader::load_sources(dir).context("Failed to load result files")?;
    if sources.is_empty() {
        println!("No result files found in {:?}.", dir);
        return Ok(());
    }
    println!("Found {} result files.", sources.len());

    println!("\n--- Scoring, matching and merging ---");
    let report = match pipeline::run(sources, options) {
        Ok(report) => report,
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Internal consistency violation, aborting");
            return Err(e).context("Reconciliation aborted");
        }
        Err(e) => return Err(e).context("Reconciliation failed"),
    };

    // Create output folder
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let output_folder = output_dir.join(format!("{}_merged", timestamp));
    std::fs::create_dir_all(&output_folder).context("Failed to create output directory")?;
    println!("Output folder: {}", output_folder.display());

    save(&output_folder, &report)?;

    for source in &report.sources {
        println!(
            "  {}: {} records ({} without title dropped, {} shadowed duplicates)",
            source.label, source.records, source.dropped_untitled, source.title_collisions
        );
    }
    for entry in &report.matches {
        println!(
            "  Found {:03} matching papers in data files {:?}",
            entry.count,
            entry.sources.indices()
        );
    }
    println!("Number of unique papers: {}", report.merged.len());

    println!("\n✓ Pipeline complete. Results in: {}", output_folder.display());
    Ok(())
}

fn save(folder: &Path, report: &PipelineReport) -> Result<()> {
    let sources_path = folder.join("1_sources.csv");
    loader::write_csv(&sources_path, &report.sources).context("Failed to write source summary")?;
    println!("Saved: {:?}", sources_path);

    let scored_path = folder.join("2_scored.json");
    loader::write_json(&scored_path, &report.scored).context("Failed to write scored sources")?;
    println!("Saved: {:?}", scored_path);

    if !report.matches.is_empty() {
        let matches_path = folder.join("3_matches.json");
        loader::write_json(&matches_path, &report.matches).context("Failed to write match report")?;
        println!("Saved: {:?}", matches_path);
    }

    if report.merged.is_empty() {
        println!("No merged data to save.");
        return Ok(());
    }

    let csv_path = folder.join("4_merged.csv");
    loader::write_csv(&csv_path, &report.merged).context("Failed to write merged CSV")?;
    println!("Saved: {:?}", csv_path);

    let json_path = folder.join("4_merged.json");
    loader::write_json(&json_path, &report.merged).context("Failed to write merged JSON")?;
    println!("Saved: {:?}", json_path);

    let bib_path = folder.join("4_merged.bib");
    let entries = loader::write_bibtex(&bib_path, &report.merged).context("Failed to write BibTeX")?;
    println!("Saved: {:?} ({} entries)", bib_path, entries);
    Ok(())
}

// ============================================================================
// Query Comparison
// ============================================================================

fn run_compare(dir: &Path, options: &CompareOptions, field: IdField) -> Result<()> {
    let sources = loader::load_sources(dir).context("Failed to load result files")?;
    let lists: Vec<RankedList> = sources
        .iter()
        .map(|s| RankedList::from_source(s, field))
        .collect();

    let comparisons = compare::compare_lists(&lists, options).context("Comparison failed")?;

    println!("------------------");
    for c in &comparisons {
        println!(
            "{} and {} have {:02} matches ({:.0}%) and their RBO is {:.6} (top {} ranks, {:.0}% of RBO weight)",
            c.first,
            c.second,
            c.matches,
            c.match_fraction * 100.0,
            c.rbo,
            c.depth,
            c.depth_weight * 100.0
        );
    }

    println!("------------------");
    println!("QUERY SUGGESTIONS:");
    println!("------------------");
    let redundant: Vec<&PairComparison> = comparisons.iter().filter(|c| c.redundant).collect();
    if redundant.is_empty() {
        println!("No redundant queries.");
    }
    for c in redundant {
        println!("==> Suggesting to skip either {} or {}", c.first, c.second);
    }
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");
    println!("Starting server at http://{}:{}", host, port);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/merge", post(merge_handler))
        .route("/compare", post(compare_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Merge request body
#[derive(Debug, Deserialize)]
struct MergeRequest {
    sources: Vec<SourceResultSet>,
    #[serde(default)]
    options: PipelineOptions,
}

/// Compare request body
#[derive(Debug, Deserialize)]
struct CompareRequest {
    lists: Vec<RankedList>,
    #[serde(default)]
    options: CompareOptions,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: String,
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: String) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            status: "error".to_string(),
            error: message,
        }),
    )
}

fn to_api_error(e: MergeError) -> ApiError {
    let status = if e.is_fatal() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::BAD_REQUEST
    };
    error!(error = %e, status = status.as_u16(), "Request failed");
    api_error(status, e.to_string())
}

/// Merge endpoint handler
async fn merge_handler(Json(req): Json<MergeRequest>) -> Result<Json<PipelineReport>, ApiError> {
    info!(sources = req.sources.len(), "Merge request");

    let result = tokio::task::spawn_blocking(move || pipeline::run(req.sources, &req.options))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Worker failed: {}", e)))?;

    result.map(Json).map_err(to_api_error)
}

/// Compare endpoint handler
async fn compare_handler(Json(req): Json<CompareRequest>) -> Result<Json<Vec<PairComparison>>, ApiError> {
    info!(lists = req.lists.len(), "Compare request");

    let result = tokio::task::spawn_blocking(move || compare::compare_lists(&req.lists, &req.options))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Worker failed: {}", e)))?;

    result.map(Json).map_err(to_api_error)
}
