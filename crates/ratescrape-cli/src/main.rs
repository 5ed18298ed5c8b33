use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use ratescrape::{
    BrowserOptions, ChromeSession, DEFAULT_SEARCH_URL, Harvester, HttpFetcher, LinkScraper,
    RatingScraper, StoreConfig, SupabaseStore,
};

#[derive(Parser)]
#[command(name = "ratescrape")]
#[command(about = "A ratemyprofessors.com rating distribution scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct BrowserArgs {
    #[arg(
        long,
        default_value = DEFAULT_SEARCH_URL,
        help = "Search results page listing the professors to scrape"
    )]
    search_url: String,

    #[arg(long, help = "Run the browser without a visible window")]
    headless: bool,
}

impl BrowserArgs {
    fn options(&self) -> BrowserOptions {
        BrowserOptions {
            headless: self.headless,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every professor on the search page and upsert their rating distributions
    Sync {
        #[command(flatten)]
        browser: BrowserArgs,

        #[arg(long, env = "SUPABASE_URL", help = "Supabase project URL")]
        supabase_url: String,

        #[arg(
            long,
            env = "SUPABASE_KEY",
            hide_env_values = true,
            help = "Supabase API key"
        )]
        supabase_key: String,

        #[arg(long, default_value = ratescrape::store::DEFAULT_TABLE, help = "Table to upsert into")]
        table: String,
    },
    /// List the professors on the search page without fetching ratings
    Links {
        #[command(flatten)]
        browser: BrowserArgs,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Fetch the rating distribution of a single professor profile
    Ratings {
        #[arg(help = "URL of the professor profile page")]
        url: String,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn http_fetcher() -> HttpFetcher {
    HttpFetcher::new().unwrap_or_else(|e| {
        log::error!("Error creating HTTP client: {}", e);
        process::exit(1);
    })
}

async fn launch_browser(args: &BrowserArgs) -> ChromeSession {
    ChromeSession::launch(&args.options())
        .await
        .unwrap_or_else(|e| {
            log::error!("Error launching browser: {}", e);
            process::exit(1);
        })
}

async fn close_browser(session: ChromeSession) {
    if let Err(e) = session.close().await {
        log::warn!("Error closing browser: {}", e);
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("Error loading .env: {e}");
    }

    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    match cli.command {
        Commands::Sync {
            browser,
            supabase_url,
            supabase_key,
            table,
        } => {
            let config = StoreConfig::new(supabase_url, supabase_key).with_table(table);
            let store = SupabaseStore::new(config).unwrap_or_else(|e| {
                log::error!("Error creating store client: {}", e);
                process::exit(1);
            });

            let harvester = Harvester::new(http_fetcher(), store, browser.search_url.clone());
            if let Err(e) = harvester.verify_store().await {
                log::error!("Exiting due to connection error: {}", e);
                process::exit(1);
            }

            let mut session = launch_browser(&browser).await;
            let result = harvester.harvest(&mut session).await;
            close_browser(session).await;

            match result {
                Ok(stats) => print!("{}", stats),
                Err(e) => {
                    log::error!("Sync failed: {}", e);
                    process::exit(1);
                }
            }
        }

        Commands::Links { browser, format } => {
            let mut session = launch_browser(&browser).await;
            let result = LinkScraper::new()
                .scrape_links(&mut session, &browser.search_url)
                .await;
            close_browser(session).await;

            let links = result.unwrap_or_else(|e| {
                log::error!("Error scraping professor links: {}", e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&links),
                OutputFormat::Text => {
                    if links.is_empty() {
                        println!("No professors found.");
                    } else {
                        for (i, link) in links.iter().enumerate() {
                            println!("{:>4}. {}", i + 1, link);
                        }
                    }
                }
            }
        }

        Commands::Ratings { url, format } => {
            let ratings = RatingScraper::new(http_fetcher());
            let distribution = ratings.fetch_distribution(&url).await.unwrap_or_else(|e| {
                log::error!("Error fetching ratings: {}", e);
                process::exit(1);
            });

            match (distribution, format) {
                (Some(dist), OutputFormat::Json) => serialize_json(&dist),
                (Some(dist), OutputFormat::Text) => println!("{}\n{}", url, dist),
                (None, OutputFormat::Json) => println!("null"),
                (None, OutputFormat::Text) => println!("No rating distribution found for {}", url),
            }
        }
    }
}
