use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::time::Duration;
use tern_crawler::{parse_seed, CrawlConfig, Crawler};
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "tern-crawler")]
#[command(about = "Crawl the web to JSONL, respecting robots.txt")]
struct Cli {
    /// Path to a file with seed URLs (one per line)
    #[arg(long)]
    seeds: String,
    /// Output JSONL file path
    #[arg(long, default_value = "./data/crawl.jsonl")]
    output: String,
    /// Maximum number of pages to index
    #[arg(long, default_value_t = 100)]
    max_pages: usize,
    /// Maximum link depth from the seeds
    #[arg(long, default_value_t = 2)]
    max_depth: usize,
    /// Politeness delay between fetches, in milliseconds
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,
    /// Request timeout seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
    /// User-Agent string to use for robots.txt and crawling
    #[arg(long, default_value = "tern-bot/0.1 (+https://example.com/bot)")]
    user_agent: String,
}

#[derive(Serialize)]
struct OutDoc<'a> {
    id: &'a str,
    title: &'a str,
    body: &'a str,
    url: &'a str,
    timestamp: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let mut seeds = Vec::new();
    for line in BufReader::new(File::open(&args.seeds)?).lines() {
        if let Some(url) = parse_seed(&line?) {
            seeds.push(url);
        }
    }
    if seeds.is_empty() {
        return Err(anyhow!("no valid seeds in {}", args.seeds));
    }

    if let Some(dir) = std::path::Path::new(&args.output).parent() {
        fs::create_dir_all(dir)?;
    }
    let mut out = BufWriter::new(File::create(&args.output)?);

    let config = CrawlConfig {
        max_pages: args.max_pages,
        max_depth: args.max_depth,
        delay: Duration::from_millis(args.delay_ms),
        timeout: Duration::from_secs(args.timeout_secs),
        user_agent: args.user_agent,
        ..CrawlConfig::default()
    };
    tracing::info!(
        seeds = seeds.len(),
        max_pages = config.max_pages,
        max_depth = config.max_depth,
        output = %args.output,
        "starting crawl"
    );

    let mut crawler = Crawler::new(config)?;
    let summary = crawler
        .run(seeds, |page| {
            let timestamp = time::OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default();
            let rec = OutDoc {
                id: &page.id,
                title: &page.title,
                body: &page.body,
                url: &page.url,
                timestamp,
            };
            serde_json::to_writer(&mut out, &rec).ok();
            out.write_all(b"\n").ok();
        })
        .await?;
    out.flush()?;

    tracing::info!(
        indexed = summary.pages_indexed,
        visited = summary.pages_visited,
        output = %args.output,
        "crawl finished"
    );
    Ok(())
}
