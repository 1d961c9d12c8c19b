use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use futures::stream::{self, StreamExt};
use listing_captions::{
    ai::CaptionGenerator, parse_variations, scraper::Scraper, utils, AiConfig, CaptionVariation,
    ExtractorConfig, ListingExtractor, ListingRecord,
};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Real estate listing scraper and caption generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scrape listing URLs and generate social media captions
    Scrape {
        /// Listing URL to scrape (repeatable)
        #[arg(short, long = "url", required = true)]
        urls: Vec<String>,

        /// Number of concurrent requests
        #[arg(short, long, default_value_t = 5)]
        concurrent: usize,

        /// Caption variations per listing
        #[arg(short = 'n', long, default_value_t = 3)]
        variations: usize,

        /// Post type (New Listing, Open House, Just Sold, ...)
        #[arg(short, long, default_value = "New Listing")]
        post_type: String,

        /// Skip caption generation
        #[arg(short, long)]
        skip_ai: bool,

        /// Where to write the JSON report
        #[arg(short, long, default_value = "result.json")]
        output: String,
    },
    /// Extract a listing record from a saved HTML file
    Extract {
        /// HTML file to read
        #[arg(short, long)]
        file: PathBuf,

        /// URL the page was served from, for resolving relative images
        #[arg(short, long)]
        base_url: String,
    },
    /// Parse a saved completion into caption variations
    Parse {
        /// Completion text file
        #[arg(short, long)]
        file: PathBuf,

        /// Expected number of variations
        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,
    },
}

#[derive(Serialize)]
struct ListingReport {
    url: String,
    listing: Option<ListingRecord>,
    captions: Vec<CaptionVariation>,
    error: Option<String>,
}

#[derive(Serialize)]
struct Report {
    generated_at: DateTime<Utc>,
    listings: Vec<ListingReport>,
}

async fn process(
    scraper: &Scraper,
    generator: Option<&CaptionGenerator>,
    url: String,
    post_type: &str,
    variations: usize,
) -> ListingReport {
    let mut report = ListingReport {
        url: url.clone(),
        listing: None,
        captions: Vec::new(),
        error: None,
    };

    let listing = match scraper.scrape(&url).await {
        Ok(listing) => listing,
        Err(e) => {
            error!(url = %url, error = %e, "scrape failed");
            report.error = Some(e.to_string());
            return report;
        }
    };

    if let Some(generator) = generator {
        match generator.generate_captions(&listing, post_type, variations).await {
            Ok(captions) => report.captions = captions,
            Err(e) => {
                error!(url = %url, error = %e, "caption generation failed");
                report.error = Some(e.to_string());
            }
        }
    }

    report.listing = Some(listing);
    report
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            urls,
            concurrent,
            variations,
            post_type,
            skip_ai,
            output,
        } => {
            let scraper = Scraper::with_defaults()?;
            let generator = if skip_ai {
                None
            } else {
                Some(CaptionGenerator::from_config(AiConfig::from_env()?))
            };

            let listings = stream::iter(urls)
                .map(|url| process(&scraper, generator.as_ref(), url, &post_type, variations))
                .buffer_unordered(concurrent.max(1))
                .collect::<Vec<_>>()
                .await;

            let scraped = listings.iter().filter(|l| l.listing.is_some()).count();
            if scraped == 0 {
                warn!("no listing could be scraped");
            }

            let report = Report {
                generated_at: Utc::now(),
                listings,
            };
            utils::save_json(&report, &output)
                .with_context(|| format!("writing report to {}", output))?;
            info!(scraped, total = report.listings.len(), output = %output, "done");
        }
        Commands::Extract { file, base_url } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let extractor = ListingExtractor::new(ExtractorConfig::default())?;
            let record = extractor.extract(&html, &base_url);
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Parse { file, count } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let variations = parse_variations(&text, count);
            println!("{}", serde_json::to_string_pretty(&variations)?);
        }
    }

    Ok(())
}
