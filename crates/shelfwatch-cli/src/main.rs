use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use shelfwatch_client::{HttpFetcher, PageFetcher, default_registry};
use shelfwatch_core::log::{LogStore, NewLogEntry};
use shelfwatch_core::operation::{
    CreateOperationRequest, OperationConfig, OperationKind, ProcessorConfig,
};
use shelfwatch_core::store::{OperationFilter, OperationStore, PageRequest, SortSpec};
use shelfwatch_core::{FileResultStore, JobProcessor, ScrapeEngine, Seller};
use shelfwatch_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "shelfwatch", version, about = "Marketplace scraping job engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a scraping operation
    Submit {
        /// Target page URL
        #[arg(short, long)]
        url: String,

        /// Seller id (e.g. "flipkart", "myntra", "pharmeasy")
        #[arg(short, long)]
        seller: String,

        /// "product" or "category"
        #[arg(short = 't', long = "type", default_value = "product")]
        kind: String,

        /// Fetch with plain HTTP instead of a rendered browser session
        #[arg(long, default_value_t = false)]
        no_browser: bool,

        /// Fetch timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Post-render settle time in milliseconds
        #[arg(long)]
        wait_time_ms: Option<u64>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List operations
    List {
        /// Filter by status
        #[arg(short = 's', long)]
        status: Option<String>,

        /// Filter by seller
        #[arg(long)]
        seller: Option<String>,

        /// Number of results to show
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },

    /// Show one operation as JSON
    Show {
        /// Operation ID
        id: Uuid,
    },

    /// Cancel an operation
    Cancel {
        /// Operation ID
        id: Uuid,
    },

    /// Run the background processor until interrupted
    Process {
        /// Polling interval in milliseconds (minimum 1000)
        #[arg(long, default_value_t = 5_000)]
        interval_ms: u64,

        /// Operations processed concurrently per chunk
        #[arg(long, default_value_t = 3)]
        chunk_size: usize,

        /// Directory for result files
        #[arg(long, env = "SHELFWATCH_RESULTS_DIR", default_value = "results")]
        results_dir: String,
    },

    /// Re-queue and execute failed operations with retries remaining
    RetryFailed {
        /// Directory for result files
        #[arg(long, env = "SHELFWATCH_RESULTS_DIR", default_value = "results")]
        results_dir: String,
    },

    /// Delete terminal operations older than the given age
    Cleanup {
        /// Age threshold in days
        #[arg(long, default_value_t = 30)]
        days: u32,

        /// Directory for result files
        #[arg(long, env = "SHELFWATCH_RESULTS_DIR", default_value = "results")]
        results_dir: String,
    },

    /// Show per-status and per-seller aggregates
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shelfwatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            url,
            seller,
            kind,
            no_browser,
            timeout_ms,
            wait_time_ms,
            category,
            notes,
        } => {
            let db = connect_db().await?;
            cmd_submit(
                &db, url, &seller, &kind, no_browser, timeout_ms, wait_time_ms, category, notes,
            )
            .await?;
        }
        Commands::List { status, seller, limit } => {
            let db = connect_db().await?;
            cmd_list(&db, status, seller, limit).await?;
        }
        Commands::Show { id } => {
            let db = connect_db().await?;
            cmd_show(&db, id).await?;
        }
        Commands::Cancel { id } => {
            let db = connect_db().await?;
            let op = db.operation_repo().mark_cancelled(id).await?;
            println!("Cancelled {} ({})", op.id, op.url);
        }
        Commands::Process { interval_ms, chunk_size, results_dir } => {
            let db = connect_db().await?;
            cmd_process(&db, interval_ms, chunk_size, &results_dir).await?;
        }
        Commands::RetryFailed { results_dir } => {
            let db = connect_db().await?;
            let processor = build_processor(&db, ProcessorConfig::default(), &results_dir).await?;
            let outcomes = processor.retry_failed().await?;
            if outcomes.is_empty() {
                println!("No failed operations with retries remaining.");
            }
            for outcome in outcomes {
                match outcome.error {
                    None => println!("  [retried] {}", outcome.id),
                    Some(error) => println!("  [failed]  {} — {}", outcome.id, error),
                }
            }
        }
        Commands::Cleanup { days, results_dir } => {
            let db = connect_db().await?;
            let processor = build_processor(&db, ProcessorConfig::default(), &results_dir).await?;
            let deleted = processor.cleanup_old(days).await?;
            println!("Deleted {} operation(s) older than {days} days", deleted.len());
            for id in deleted {
                println!("  {id}");
            }
        }
        Commands::Stats => {
            let db = connect_db().await?;
            cmd_stats(&db).await?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and run migrations.
async fn connect_db() -> Result<Database> {
    let db = Database::connect(&DatabaseConfig::from_env()?)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;
    Ok(db)
}

async fn build_processor(
    db: &Database,
    config: ProcessorConfig,
    results_dir: &str,
) -> Result<
    JobProcessor<
        PageFetcher,
        shelfwatch_db::OperationRepository,
        shelfwatch_db::LogRepository,
        FileResultStore,
    >,
> {
    // CLI runs on the operator's own machine.
    let http = HttpFetcher::new()?.allow_private_urls();

    #[cfg(feature = "browser")]
    let fetcher = match shelfwatch_client::BrowserFetcher::new().await {
        Ok(browser) => PageFetcher::new(http).with_browser(browser),
        Err(e) => {
            tracing::warn!(error = %e, "Browser unavailable, rendered fetches fall back to HTTP");
            PageFetcher::new(http)
        }
    };
    #[cfg(not(feature = "browser"))]
    let fetcher = PageFetcher::new(http);

    let results = FileResultStore::new(results_dir);
    let engine = ScrapeEngine::new(
        fetcher,
        db.operation_repo(),
        db.log_repo(),
        results.clone(),
        Arc::new(default_registry()),
    );
    Ok(JobProcessor::new(engine, results, config))
}

#[allow(clippy::too_many_arguments)]
async fn cmd_submit(
    db: &Database,
    url: String,
    seller: &str,
    kind: &str,
    no_browser: bool,
    timeout_ms: Option<u64>,
    wait_time_ms: Option<u64>,
    category: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let seller: Seller = seller.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let kind: OperationKind = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let defaults = OperationConfig::default();
    let config = OperationConfig {
        use_browser: !no_browser,
        timeout_ms: timeout_ms.unwrap_or(defaults.timeout_ms),
        wait_time_ms: wait_time_ms.unwrap_or(defaults.wait_time_ms),
    };

    let mut request = CreateOperationRequest::new(url, seller, kind).with_config(config);
    request.category = category;
    request.notes = notes;
    request.validate()?;

    let op = db.operation_repo().create(request).await?;
    db.log_repo()
        .append_quietly(NewLogEntry {
            logged_at: None,
            platform: op.seller.to_string(),
            kind: op.kind,
            url: op.url.clone(),
            category: op.category.clone(),
            status: op.status,
            action: "Manual".to_string(),
            operation_id: Some(op.id),
        })
        .await;
    println!("Queued {} — {} ({}, {})", op.id, op.url, op.seller, op.kind);
    Ok(())
}

async fn cmd_list(
    db: &Database,
    status: Option<String>,
    seller: Option<String>,
    limit: u32,
) -> Result<()> {
    let filter = OperationFilter {
        status: status
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e: String| anyhow::anyhow!(e))?,
        seller: seller
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e: String| anyhow::anyhow!(e))?,
        ..Default::default()
    };
    let page = db
        .operation_repo()
        .list(&filter, &SortSpec::default(), &PageRequest { page: 1, limit })
        .await?;

    if page.items.is_empty() {
        println!("No operations found.");
        return Ok(());
    }

    for op in &page.items {
        println!(
            "{}  {:<11}  {:<9}  retry {}/{}  {}",
            op.id,
            op.status.as_str(),
            op.seller.as_str(),
            op.retry_count,
            op.max_retries,
            op.url
        );
    }
    println!("\nShowing {} of {} operations", page.items.len(), page.total);
    Ok(())
}

async fn cmd_show(db: &Database, id: Uuid) -> Result<()> {
    let op = db
        .operation_repo()
        .get(id)
        .await?
        .with_context(|| format!("Operation not found: {id}"))?;
    println!("{}", serde_json::to_string_pretty(&op)?);
    Ok(())
}

async fn cmd_process(
    db: &Database,
    interval_ms: u64,
    chunk_size: usize,
    results_dir: &str,
) -> Result<()> {
    let config = ProcessorConfig::default()
        .with_poll_interval(Duration::from_millis(interval_ms))
        .with_chunk_size(chunk_size);
    let processor = build_processor(db, config, results_dir).await?;

    processor.start();
    println!("Processor running (interval {interval_ms} ms, chunk {chunk_size}). Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install CTRL+C handler")?;
    println!("Stopping…");
    processor.stop().await;
    Ok(())
}

async fn cmd_stats(db: &Database) -> Result<()> {
    let repo = db.operation_repo();
    let counts = repo.status_counts().await?;
    let sellers = repo.seller_stats().await?;

    println!("Operations by status:");
    println!("  pending      {}", counts.pending);
    println!("  in_progress  {}", counts.in_progress);
    println!("  success      {}", counts.success);
    println!("  failed       {}", counts.failed);
    println!("  cancelled    {}", counts.cancelled);

    if !sellers.is_empty() {
        println!("\nBy seller:");
        for s in sellers {
            println!(
                "  {:<9}  total {:<4}  success {:<4}  failed {:<4}  active {:<4}  rate {:.2}%",
                s.seller.to_string(),
                s.total,
                s.success,
                s.failed,
                s.active,
                s.success_rate
            );
        }
    }
    Ok(())
}
