use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use trawl_client::{
    MovieExtractor, PoolProxyBroker, ProxyConfig, ReqwestFetcher, SiteProfile,
    StockListingExtractor,
};
use trawl_core::orchestrator::ItemStatus;
use trawl_core::pacing::PacingConfig;
use trawl_core::util::sequential_locators;
use trawl_core::{
    BatchOrchestrator, CrawlConfig, ListingService, RunSummary, TracingCrawlReporter, WorkItem,
};
use trawl_db::{Database, DatabaseConfig};

const DEFAULT_LISTING_URL: &str = "https://vip.stock.finance.sina.com.cn/usstock/ustotal.php";

#[derive(Parser)]
#[command(name = "trawl", version, about = "Resilient batch crawler for movie and stock pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl Douban movie subject pages into the movies table
    Movies {
        /// Subject page URLs (defaults to the next --count ids after the highest stored one)
        urls: Vec<String>,

        /// Number of sequential subject ids to crawl when no URLs are given
        #[arg(long, default_value_t = 100)]
        count: usize,

        /// Route requests through the proxy pool (PROXY_POOL_URL)
        #[arg(long, default_value_t = false)]
        proxy: bool,

        /// Maximum pages in flight at once
        #[arg(long, env = "TRAWL_CONCURRENCY", default_value_t = 5)]
        concurrency: usize,

        /// Attempts per page, including the first
        #[arg(long, env = "TRAWL_MAX_RETRIES", default_value_t = 3)]
        max_retries: u32,

        /// Pause after each page, in milliseconds
        #[arg(long, env = "TRAWL_DELAY_MS", default_value_t = 1000)]
        delay_ms: u64,

        /// Random jitter added to the pause, in milliseconds
        #[arg(long, env = "TRAWL_JITTER_MS", default_value_t = 1000)]
        jitter_ms: u64,
    },

    /// Crawl the Sina US stock overview into the stocks table
    Stocks {
        /// Listing page URL
        #[arg(short, long, default_value = DEFAULT_LISTING_URL)]
        url: String,

        /// Route requests through the proxy pool (PROXY_POOL_URL)
        #[arg(long, default_value_t = false)]
        proxy: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trawl=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = shutdown_token();

    match cli.command {
        Commands::Movies {
            urls,
            count,
            proxy,
            concurrency,
            max_retries,
            delay_ms,
            jitter_ms,
        } => {
            let config = CrawlConfig::default()
                .with_concurrency(concurrency)
                .with_max_retries(max_retries)
                .with_pacing(
                    PacingConfig::new(Duration::from_millis(delay_ms))
                        .with_jitter(Duration::from_millis(jitter_ms)),
                )
                .with_proxy(proxy);
            let db = connect_db().await?;
            cmd_movies(&db, urls, count, config, cancel).await?;
        }
        Commands::Stocks { url, proxy } => {
            let db = connect_db().await?;
            let config = CrawlConfig::default().with_proxy(proxy);
            cmd_stocks(&db, &url, config, cancel).await?;
        }
    }

    Ok(())
}

/// Cancelled on the first Ctrl-C; in-flight pages finish their current step.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            trigger.cancel();
        }
    });
    cancel
}

/// Connect to PostgreSQL using DATABASE_URL and apply migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.health_check().await.map_err(|e| anyhow::anyhow!(e))?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

fn proxy_broker() -> Result<PoolProxyBroker> {
    let config = ProxyConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    PoolProxyBroker::new(config).context("Failed to create proxy broker")
}

async fn cmd_movies(
    db: &Database,
    urls: Vec<String>,
    count: usize,
    config: CrawlConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let repo = db.movie_repo();

    let locators = if urls.is_empty() {
        let max_id = repo.max_id().await.map_err(|e| anyhow::anyhow!(e))?;
        tracing::info!(%max_id, %count, "Crawling sequential subjects");
        sequential_locators(max_id, count)
    } else {
        urls
    };
    let items: Vec<WorkItem> = locators.into_iter().map(WorkItem::new).collect();

    let fetcher =
        ReqwestFetcher::new(SiteProfile::douban()).context("Failed to create HTTP client")?;
    let extractor = MovieExtractor::new().map_err(|e| anyhow::anyhow!(e))?;
    let orchestrator = BatchOrchestrator::new(proxy_broker()?, fetcher, extractor, repo, config);

    let started = std::time::Instant::now();
    let reports = orchestrator
        .run_with_reports(items, cancel, TracingCrawlReporter)
        .await;
    let summary = RunSummary::from_reports(
        &orchestrator.config().run_id,
        &reports,
        started.elapsed(),
    );

    for report in reports.iter().filter(|r| !r.status.is_success()) {
        let status = match report.status {
            ItemStatus::PersistFailed => "persist failed",
            ItemStatus::NotFound => "not found",
            ItemStatus::Exhausted => "exhausted",
            ItemStatus::Cancelled => "cancelled",
            ItemStatus::Aborted => "aborted",
            ItemStatus::Created | ItemStatus::Duplicate => continue,
        };
        println!(
            "  [{status}] {} (attempts: {})",
            report.locator, report.attempts
        );
    }
    print_summary(&summary);

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\nRun {} finished in {:.1?}", summary.run_id, summary.elapsed);
    println!(
        "  total: {}  stored: {} (created: {}  duplicate: {})  persist failed: {}",
        summary.total,
        summary.succeeded(),
        summary.created,
        summary.duplicate,
        summary.persist_failed
    );
    println!(
        "  not found: {}  exhausted: {}  cancelled: {}  aborted: {}",
        summary.not_found, summary.exhausted, summary.cancelled, summary.aborted
    );
}

async fn cmd_stocks(
    db: &Database,
    url: &str,
    config: CrawlConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let fetcher =
        ReqwestFetcher::new(SiteProfile::sina()).context("Failed to create HTTP client")?;
    let extractor = StockListingExtractor::new().map_err(|e| anyhow::anyhow!(e))?;
    let service = ListingService::new(proxy_broker()?, fetcher, extractor, db.stock_repo(), config);

    let report = tokio::select! {
        report = service.crawl(url) => report,
        _ = cancel.cancelled() => anyhow::bail!("Listing crawl cancelled"),
    };

    // Output JSON to stdout
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
