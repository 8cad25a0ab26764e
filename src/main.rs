//! # ION Crawler CLI (`ion-crawler`)
//!
//! ## Usage
//!
//! ```bash
//! ion-crawler --config ./config/crawler.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ion-crawler init` | Create the SQLite database and run schema migrations |
//! | `ion-crawler run` | Run one crawl cycle and print its summary |
//! | `ion-crawler serve` | Crawl every `crawler.interval_minutes` until Ctrl-C |
//! | `ion-crawler status` | Show the cursor and seen/published/pending counts |
//! | `ion-crawler reset` | Forget seen documents (or only the cursor) |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ion_crawler::{config, crawl, migrate, scheduler, status};

/// ION Crawler: discovers new DID documents and publishes discovery events.
#[derive(Parser)]
#[command(
    name = "ion-crawler",
    about = "ION Crawler: discovers new DID documents and publishes discovery events",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/crawler.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Run exactly one crawl cycle.
    Run,

    /// Run crawl cycles on the configured interval until Ctrl-C.
    Serve,

    /// Show crawl state.
    Status,

    /// Reset crawl state.
    ///
    /// Without flags, every seen marker and the cursor are removed, so
    /// documents already published will be published again.
    Reset {
        /// Only clear the cursor; keep the seen markers.
        #[arg(long)]
        cursor_only: bool,
    },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_env("ION_CRAWLER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "ion_crawler=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Run => {
            crawl::run_crawl(&cfg).await?;
        }
        Commands::Serve => {
            scheduler::run_serve(&cfg).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Reset { cursor_only } => {
            status::run_reset(&cfg, cursor_only).await?;
        }
    }

    Ok(())
}
