use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use linkpatrol::config::CrawlConfig;
use linkpatrol::engine::crawl_all;
use linkpatrol::fetch::HttpFetcher;
use linkpatrol::report::{append_run_summary, write_page_rows, write_violation_rows};
use linkpatrol::scheduler::SchedulerMode;
use linkpatrol::sitemap::{fetch_sitemap_seeds, load_seed_file, seed_urls_from_xml, write_seed_csv};

#[derive(Debug, Parser)]
#[command(
    name = "linkpatrol",
    version,
    about = "Concurrent crawler and link-integrity checker with CSV reporting"
)]
struct Cli {
    /// Seed list file: one URL per line, optional `url` header.
    #[arg(long, value_name = "FILE", conflicts_with = "sitemap")]
    seeds: Option<PathBuf>,

    /// Sitemap to pull the seed list from: an http(s) URL or a local XML file.
    #[arg(long, value_name = "URL_OR_FILE")]
    sitemap: Option<String>,

    /// JSON configuration file; flags below override it.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Save the resolved seed list before crawling.
    #[arg(long, value_name = "FILE")]
    save_seeds: Option<PathBuf>,

    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    #[arg(long, value_name = "SECONDS")]
    delay: Option<f64>,

    #[arg(long, value_enum)]
    scheduler: Option<SchedulerMode>,

    #[arg(long, value_name = "N")]
    max_urls: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CrawlConfig::load(path)?,
        None => CrawlConfig::default(),
    };
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if let Some(delay) = cli.delay {
        config.delay = delay;
    }
    if let Some(scheduler) = cli.scheduler {
        config.scheduler = scheduler;
    }
    if let Some(max_urls) = cli.max_urls {
        config.max_urls = max_urls;
    }
    config.validate()?;

    let seeds = match (&cli.seeds, &cli.sitemap) {
        (Some(path), _) => load_seed_file(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?,
        (None, Some(sitemap)) => {
            let seeds = if sitemap.starts_with("http://") || sitemap.starts_with("https://") {
                let fetcher = HttpFetcher::new(config.timeout, &config.user_agent)
                    .map_err(|e| anyhow::anyhow!("{}", e.note()))?;
                fetch_sitemap_seeds(&fetcher, sitemap)
                    .await
                    .map_err(|e| anyhow::anyhow!("sitemap ingestion failed: {}", e.note()))?
            } else {
                let xml = std::fs::read_to_string(sitemap)
                    .with_context(|| format!("failed to read sitemap file {sitemap}"))?;
                seed_urls_from_xml(&xml)
            };
            info!("sitemap yielded {} seed URLs", seeds.len());
            seeds
        }
        (None, None) => bail!("either --seeds or --sitemap is required"),
    };
    if seeds.is_empty() {
        bail!("seed list is empty, nothing to crawl");
    }

    if let Some(path) = &cli.save_seeds {
        let written = write_seed_csv(path, &seeds)?;
        info!("wrote {written} seed URLs -> {}", path.display());
    }

    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("failed to create {}", cli.output_dir.display()))?;

    let report = crawl_all(&seeds, &config).await?;

    let pages_csv = cli.output_dir.join("links_multithread.csv");
    let violations_csv = cli.output_dir.join("violations_links.csv");
    let summary_csv = cli.output_dir.join("run_summary.csv");

    write_page_rows(&pages_csv, &report.pages)?;
    info!(
        "wrote {} page rows -> {}",
        report.pages.len(),
        pages_csv.display()
    );

    write_violation_rows(&violations_csv, &report.violations)?;
    info!(
        "wrote {} violation rows -> {}",
        report.violations.len(),
        violations_csv.display()
    );

    append_run_summary(&summary_csv, &report.summary)?;
    info!("appended run summary -> {}", summary_csv.display());

    Ok(())
}
