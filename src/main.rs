use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use feedmix::config::Config;
use feedmix::digest::{group_by_category, relative_date, source_label};
use feedmix::feed::{fetch_feeds_with_taxonomy, FetchFeedsResult, HttpFetcher, NormalizedItem};
use feedmix::taxonomy::Taxonomy;
use feedmix::util::strip_control_chars;

#[derive(Parser, Debug)]
#[command(
    name = "feedmix",
    about = "Merge RSS/Atom feeds into one categorized, newest-first digest"
)]
struct Args {
    /// Feed URL (repeatable)
    #[arg(long = "feed", value_name = "URL")]
    feed: Vec<String>,

    /// Comma-separated feed URLs
    #[arg(long, value_name = "URLS")]
    feeds: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Group text output by category
    #[arg(long)]
    by_category: bool,

    /// Taxonomy JSON file (overrides the config file)
    #[arg(long, value_name = "FILE")]
    taxonomy: Option<PathBuf>,

    /// Config file (default: ~/.config/feedmix/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    /// Command-line URLs, falling back to the config file's list.
    fn feed_urls(&self, config: &Config) -> Vec<String> {
        let csv = self.feeds.as_deref().unwrap_or_default().split(',');
        let urls: Vec<String> = self
            .feed
            .iter()
            .map(String::as_str)
            .chain(csv)
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();

        if urls.is_empty() {
            config.feeds.clone()
        } else {
            urls
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for output
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let taxonomy = match args.taxonomy.as_ref().or(config.taxonomy.as_ref()) {
        Some(path) => Arc::new(
            Taxonomy::load(path)
                .with_context(|| format!("Failed to load taxonomy from {}", path.display()))?,
        ),
        None => Taxonomy::builtin(),
    };

    let urls = args.feed_urls(&config);
    if urls.is_empty() {
        eprintln!("Error: no feeds given");
        eprintln!();
        eprintln!("Pass feeds on the command line:");
        eprintln!("  feedmix --feed https://example.com/rss.xml");
        eprintln!("  feedmix --feeds https://a.example/rss,https://b.example/atom");
        eprintln!();
        eprintln!("Or list them under `feeds` in the config file.");
        std::process::exit(2);
    }

    let fetcher = HttpFetcher::default().with_max_bytes(config.max_feed_bytes);
    let result = fetch_feeds_with_taxonomy(&urls, &fetcher, &taxonomy).await;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &result).context("Failed to write JSON")?;
        writeln!(out)?;
    } else if args.by_category || config.group_by_category {
        print_grouped(&mut out, &result, taxonomy.fallback_label())?;
    } else {
        print_flat(&mut out, &result)?;
    }

    for error in &result.errors {
        eprintln!(
            "Warning: {}: {}",
            strip_control_chars(&error.url),
            error.message
        );
    }

    Ok(())
}

fn print_flat(out: &mut impl Write, result: &FetchFeedsResult) -> Result<()> {
    let now = Utc::now();
    for item in &result.items {
        print_item(out, item, now)?;
        writeln!(out, "    [{}]", strip_control_chars(&item.categories.join(", ")))?;
    }
    Ok(())
}

fn print_grouped(out: &mut impl Write, result: &FetchFeedsResult, fallback: &str) -> Result<()> {
    let now = Utc::now();
    for group in group_by_category(&result.items, fallback) {
        writeln!(
            out,
            "== {} ({}) ==",
            strip_control_chars(&group.name),
            group.items.len()
        )?;
        for item in group.items {
            print_item(out, item, now)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn print_item(out: &mut impl Write, item: &NormalizedItem, now: chrono::DateTime<Utc>) -> Result<()> {
    // SEC-001: feed text is untrusted, strip terminal control sequences
    writeln!(out, "* {}", strip_control_chars(&item.title))?;

    let when = relative_date(item.date, now);
    let source = source_label(item);
    if when.is_empty() {
        writeln!(out, "    {}", strip_control_chars(&source))?;
    } else {
        writeln!(out, "    {} · {}", strip_control_chars(&source), when)?;
    }
    if !item.link.is_empty() {
        writeln!(out, "    {}", strip_control_chars(&item.link))?;
    }
    if !item.summary.is_empty() {
        writeln!(out, "    {}", strip_control_chars(&item.summary))?;
    }
    Ok(())
}
