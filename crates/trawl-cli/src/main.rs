mod store;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use trawl_client::ReqwestFetcher;
use trawl_core::models::{JobSource, NormalizedJob, ScrapeConfig, ScrapeProgress, SourceType};
use trawl_core::scrape::{ProgressCallback, ScrapeService};
use trawl_core::ScraperConfig;

use crate::store::JsonFileSourceStore;

type Service = ScrapeService<ReqwestFetcher, JsonFileSourceStore>;

#[derive(Parser)]
#[command(name = "trawl", version, about = "Multi-source remote job aggregator")]
struct Cli {
    /// JSON file holding user-added sources
    #[arg(
        long,
        global = true,
        env = "TRAWL_SOURCES_FILE",
        default_value = "trawl-sources.json"
    )]
    sources_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape all enabled (or the selected) sources and print the merged list
    Scrape {
        /// Keyword filter; a posting matches if ANY keyword occurs
        #[arg(short = 'k', long = "keyword")]
        keywords: Vec<String>,

        /// Restrict to these source ids (repeatable)
        #[arg(short = 's', long = "source")]
        sources: Vec<String>,

        /// Keep at most this many postings per source
        #[arg(long)]
        max_per_source: Option<usize>,

        /// Worker pool size (overrides TRAWL_MAX_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List built-in and custom sources
    Sources,

    /// Probe a URL and check it looks like the declared source type
    TestSource {
        #[arg(short, long)]
        url: String,

        /// rss, json, html or api
        #[arg(short = 't', long = "type")]
        source_type: SourceType,
    },

    /// Register a custom source
    AddSource {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        url: String,

        #[arg(short = 't', long = "type")]
        source_type: SourceType,

        #[arg(short, long, default_value = "Custom")]
        category: String,
    },

    /// Remove a custom source by id
    RemoveSource {
        #[arg(long)]
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Table,
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
    let config = ScraperConfig::from_env().context("Invalid TRAWL_* configuration")?;

    match cli.command {
        Commands::Scrape {
            keywords,
            sources,
            max_per_source,
            concurrency,
            format,
        } => {
            let mut config = config;
            if let Some(n) = concurrency {
                config.max_concurrency = n.max(1);
            }
            let service = build_service(config, cli.sources_file)?;
            let mut scrape = ScrapeConfig::new(keywords).with_sources(sources);
            scrape.max_jobs_per_source = max_per_source;
            cmd_scrape(&service, &scrape, format).await?;
        }
        Commands::Sources => {
            let service = build_service(config, cli.sources_file)?;
            let sources = service
                .all_sources()
                .context("Failed to load custom sources")?;
            write_sources(&sources, &mut io::stdout().lock())?;
        }
        Commands::TestSource { url, source_type } => {
            let service = build_service(config, cli.sources_file)?;
            let ok = service.test_custom_source(&url, source_type).await;
            if ok {
                println!("OK: {url} looks like a {source_type} source");
            } else {
                println!("FAILED: {url} is unreachable or does not look like {source_type}");
                std::process::exit(1);
            }
        }
        Commands::AddSource {
            name,
            url,
            source_type,
            category,
        } => {
            let service = build_service(config, cli.sources_file)?;
            let source = service
                .add_custom_source(&name, &url, source_type, &category)
                .context("Failed to add custom source")?;
            println!("Added {} ({})", source.id, source.name);
        }
        Commands::RemoveSource { id } => {
            let service = build_service(config, cli.sources_file)?;
            if service
                .remove_custom_source(&id)
                .context("Failed to remove custom source")?
            {
                println!("Removed {id}");
            } else {
                println!("No custom source with id {id}");
            }
        }
    }

    Ok(())
}

/// Construct the fetcher, store and service once.
fn build_service(config: ScraperConfig, sources_file: PathBuf) -> Result<Service> {
    let fetcher =
        ReqwestFetcher::with_user_agent(&config.user_agent).context("Failed to create HTTP client")?;
    let store = JsonFileSourceStore::new(sources_file);
    tracing::debug!(path = %store.path().display(), "Using custom sources file");
    Ok(ScrapeService::new(fetcher, store, config))
}

async fn cmd_scrape(service: &Service, scrape: &ScrapeConfig, format: OutputFormat) -> Result<()> {
    // Ctrl-C stops scheduling further sources; the scrape still returns what it has.
    let aborter = service.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            aborter.abort();
        }
    });

    let on_progress: ProgressCallback = Arc::new(|p: &ScrapeProgress| {
        tracing::info!(
            source = %p.source_name,
            found = p.jobs_found,
            total_jobs = p.total_jobs,
            "[{}/{}]",
            p.current,
            p.total
        );
    });

    let jobs = service.scrape_jobs(scrape, Some(on_progress)).await?;
    ctrl_c.abort();

    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &jobs)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(&jobs, &mut out)?,
        OutputFormat::Table => write_table(&jobs, &mut out)?,
    }
    Ok(())
}

fn write_csv<W: Write>(jobs: &[NormalizedJob], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "id", "title", "company", "location", "job_type", "salary", "posted_at", "source",
        "category", "tags", "url",
    ])?;
    for job in jobs {
        let posted_at = job.posted_at.to_rfc3339();
        let tags = job.tags.join(";");
        writer.write_record([
            job.id.as_str(),
            job.title.as_str(),
            job.company.as_str(),
            job.location.as_str(),
            job.job_type.as_str(),
            job.salary.as_deref().unwrap_or_default(),
            posted_at.as_str(),
            job.source.as_str(),
            job.category.as_deref().unwrap_or_default(),
            tags.as_str(),
            job.url.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_table<W: Write>(jobs: &[NormalizedJob], out: &mut W) -> Result<()> {
    if jobs.is_empty() {
        writeln!(out, "No jobs found.")?;
        return Ok(());
    }
    for job in jobs {
        writeln!(
            out,
            "{}  {:<40}  {:<24}  {:<18}  {}",
            job.posted_at.format("%Y-%m-%d"),
            clip(&job.title, 40),
            clip(&job.company, 24),
            clip(&job.location, 18),
            job.url
        )?;
    }
    writeln!(out, "\nTotal: {} jobs", jobs.len())?;
    Ok(())
}

fn write_sources<W: Write>(sources: &[JobSource], out: &mut W) -> Result<()> {
    for source in sources {
        let ats = source
            .ats
            .as_deref()
            .map(|a| format!(" [{a}]"))
            .unwrap_or_default();
        writeln!(
            out,
            "{} {:<24} {:<5} {:<20} {}{}  {}",
            if source.enabled { "+" } else { "-" },
            source.id,
            source.source_type,
            clip(&source.category, 20),
            source.name,
            ats,
            source.url
        )?;
    }
    Ok(())
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(width.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn job() -> NormalizedJob {
        let source = JobSource::new(
            "wwr",
            "We Work Remotely",
            "https://weworkremotely.com/feed.rss",
            SourceType::Rss,
            "Remote Specialists",
        );
        let mut job = NormalizedJob::new(
            &source,
            "Rust Engineer",
            "Acme, Inc.",
            "https://acme.test/1",
            Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0).unwrap(),
        );
        job.tags = vec!["rust".into(), "tokio".into()];
        job
    }

    #[test]
    fn test_parse_scrape_args() {
        let cli = Cli::try_parse_from([
            "trawl", "scrape", "-k", "rust", "-k", "go", "-s", "remoteok", "--format", "csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Scrape {
                keywords,
                sources,
                format,
                ..
            } => {
                assert_eq!(keywords, vec!["rust", "go"]);
                assert_eq!(sources, vec!["remoteok"]);
                assert_eq!(format, OutputFormat::Csv);
            }
            _ => panic!("expected scrape"),
        }
    }

    #[test]
    fn test_parse_source_type() {
        let cli = Cli::try_parse_from([
            "trawl", "add-source", "--name", "Mine", "--url", "https://x.test/rss", "--type", "rss",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::AddSource { source_type: SourceType::Rss, ref category, .. } if category == "Custom"
        ));
        assert!(Cli::try_parse_from(["trawl", "test-source", "-u", "x", "-t", "xml"]).is_err());
    }

    #[test]
    fn test_csv_quotes_commas() {
        let mut buf = Vec::new();
        write_csv(&[job()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("id,title,company"));
        let row = lines.next().unwrap();
        assert!(row.contains("\"Acme, Inc.\""));
        assert!(row.contains("rust;tokio"));
        assert!(row.contains("2024-06-03T09:30:00+00:00"));
    }

    #[test]
    fn test_table_output() {
        let mut buf = Vec::new();
        write_table(&[job()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("2024-06-03  Rust Engineer"));
        assert!(text.contains("Total: 1 jobs"));

        let mut empty = Vec::new();
        write_table(&[], &mut empty).unwrap();
        assert_eq!(String::from_utf8(empty).unwrap(), "No jobs found.\n");
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("abcdefghij", 5), "abcd…");
    }
}
