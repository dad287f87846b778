use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use leadscout_client::HttpContentApi;
use leadscout_core::{Pipeline, PipelineConfig, ResilienceConfig, ResilientClient};

#[derive(Parser)]
#[command(name = "leadscout", version, about = "Lead enrichment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API key for the scraping service (runs in fallback mode if absent)
    #[arg(long, env = "LEADSCOUT_API_KEY", global = true)]
    api_key: Option<String>,

    /// Scraping API base URL
    #[arg(
        long,
        env = "LEADSCOUT_BASE_URL",
        default_value = "https://api.firecrawl.dev/v2",
        global = true
    )]
    base_url: String,

    /// Rate ceiling: requests per minute
    #[arg(long, default_value_t = 30, global = true)]
    rpm: u32,

    /// Maximum retries per request after the initial attempt
    #[arg(long, default_value_t = 3, global = true)]
    max_retries: u32,

    /// Maximum concurrent in-flight API calls
    #[arg(long, default_value_t = 3, global = true)]
    concurrency: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for a company domain: discover URLs,
    /// filter them by value, scrape the winners, print a JSON report
    Analyze {
        /// Company website domain or URL (e.g., "acme.com")
        #[arg(short, long)]
        domain: String,

        /// How many top-scored URLs to scrape
        #[arg(long, default_value_t = 7)]
        top_k: usize,

        /// Maximum URLs requested from discovery
        #[arg(long, default_value_t = 50)]
        max_urls: usize,

        /// Overall deadline in seconds; partial results on expiry
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// Scrape a single URL through the resilient client
    Scrape {
        /// Target URL
        #[arg(short, long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("leadscout_core=info".parse()?)
                .add_directive("leadscout_client=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ResilienceConfig::default()
        .with_requests_per_minute(cli.rpm)
        .with_max_retries(cli.max_retries)
        .with_max_concurrency(cli.concurrency);

    let client = build_client(cli.api_key.as_deref(), &cli.base_url, &config)?;

    match cli.command {
        Commands::Analyze {
            domain,
            top_k,
            max_urls,
            deadline_secs,
        } => {
            let mut pipeline_config = PipelineConfig::default()
                .with_top_k(top_k)
                .with_max_discovery_urls(max_urls);
            if let Some(secs) = deadline_secs {
                pipeline_config = pipeline_config.with_deadline(Duration::from_secs(secs));
            }

            let pipeline = Pipeline::new(client, pipeline_config);
            let result = pipeline.run(&domain).await;

            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Scrape { url } => {
            let content = client
                .scrape(&url)
                .await
                .with_context(|| format!("failed to scrape {url}"))?;
            println!("{content}");
        }
    }

    Ok(())
}

/// Build the resilient client, dropping to fallback mode when no API key
/// is configured.
fn build_client(
    api_key: Option<&str>,
    base_url: &str,
    config: &ResilienceConfig,
) -> Result<ResilientClient<HttpContentApi>> {
    match api_key {
        Some(key) if !key.trim().is_empty() => {
            let api = HttpContentApi::with_base_url(key, base_url)
                .context("failed to create API client")?;
            Ok(ResilientClient::new(api, config))
        }
        _ => Ok(ResilientClient::without_api(config)),
    }
}
