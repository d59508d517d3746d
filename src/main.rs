use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use threads_reply_scraper::config::Config;
use threads_reply_scraper::output::OutputFormat;
use threads_reply_scraper::{crawler, extractor, output};

/// Scrape all replies to a Threads post.
#[derive(Debug, Parser)]
#[command(name = "threads-reply-scraper", version, about)]
struct Cli {
    /// Thread URL, e.g. https://www.threads.net/@zuck/post/C9-tPByRVDO
    #[arg(long)]
    url: String,

    /// Output file format.
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Output file directory.
    #[arg(long, default_value = "data")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let cli = Cli::parse();

    info!("Starting threads-reply-scraper");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    url::Url::parse(&cli.url).context("Invalid thread URL")?;

    let client = crawler::build_http_client(&config).context("Failed to build HTTP client")?;

    info!(url = %cli.url, "Fetching thread page");
    let html = crawler::fetch_thread_page(&client, &config, &cli.url).await?;

    let credentials = extractor::extract_credentials(&html);
    info!(
        post_id = ?credentials.post_id,
        fb_dtsg_found = credentials.fb_dtsg.is_some(),
        "Extracted credentials from thread page"
    );

    let replies = crawler::crawl_replies(&client, &config, &credentials)
        .await
        .context("Reply crawl failed")?;

    let post_id = credentials.post_id.as_deref().unwrap_or("unknown");
    let path = output::save_replies(&replies, post_id, cli.format, &cli.output_dir).await?;

    info!(path = %path.display(), total = replies.len(), "Done");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,threads_reply_scraper=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        // Pretty-printed logging for development
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
