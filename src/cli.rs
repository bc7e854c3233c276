use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::TrackerConfig;
use crate::sites::SiteKey;

/// Command-line interface for the price tracker.
/// Exit codes: 0=success, 2=invalid arguments, 1=any runtime failure
#[derive(Parser, Debug)]
#[command(name = "rust_pricewatch")]
#[command(about = "Tracks favorited product prices and notifies on drops")]
#[command(version)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        default_value = "./data",
        help = "Directory holding the favorites database"
    )]
    pub data_dir: PathBuf,

    #[arg(long, global = true, help = "Also write rotated text and JSON logs here")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check every due favorite once and exit.
    Run {
        #[command(flatten)]
        overrides: TrackerOverrides,
    },

    /// Run passes on a fixed cadence until Ctrl+C.
    Watch {
        #[arg(
            short,
            long,
            default_value_t = 300,
            help = "Seconds between the start of consecutive passes"
        )]
        interval: u64,

        #[command(flatten)]
        overrides: TrackerOverrides,
    },

    /// Fetch one page and print the extracted price. Nothing is stored.
    Extract {
        #[arg(help = "Page URL")]
        url: String,

        #[arg(short, long, help = "Site key; detected from the URL when omitted")]
        site: Option<SiteKey>,

        #[command(flatten)]
        overrides: TrackerOverrides,
    },

    /// Manage favorites.
    Favorite {
        #[command(subcommand)]
        action: FavoriteCommand,
    },

    /// Manage push tokens.
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },

    /// Dump every favorite with its history as JSONL.
    Export {
        #[arg(
            short,
            long,
            default_value = "./favorites.jsonl",
            help = "Output JSONL file"
        )]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum FavoriteCommand {
    /// Track a product URL or a search query.
    Add {
        #[arg(short, long)]
        user: String,

        #[arg(long, help = "Product page URL")]
        url: Option<String>,

        #[arg(short, long, help = "Search text, used when no URL is given")]
        query: Option<String>,

        #[arg(short, long, help = "Site key; detected from the URL when omitted")]
        site: Option<SiteKey>,

        #[arg(short, long, help = "Display name")]
        name: Option<String>,

        #[arg(long, help = "Favorite id; generated when omitted")]
        id: Option<String>,
    },

    /// List a user's favorites.
    List {
        #[arg(short, long)]
        user: String,
    },

    /// Print a favorite's price history.
    History {
        #[arg(short, long)]
        user: String,

        #[arg(help = "Favorite id")]
        id: String,
    },

    /// Stop tracking a favorite.
    Remove {
        #[arg(short, long)]
        user: String,

        #[arg(help = "Favorite id")]
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Register a push token for a user.
    Add {
        #[arg(short, long)]
        user: String,
        token: String,
    },

    /// Forget a push token.
    Remove {
        #[arg(short, long)]
        user: String,
        token: String,
    },
}

/// Flags that take precedence over `PRICEWATCH_*` environment values.
#[derive(Args, Debug, Default, Clone)]
pub struct TrackerOverrides {
    #[arg(short, long, help = "Concurrent checks per pass")]
    pub concurrency: Option<usize>,

    #[arg(short, long, help = "Fetch timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "User agent string for requests")]
    pub user_agent: Option<String>,

    #[arg(long, help = "Notify when price <= previous * threshold")]
    pub drop_threshold: Option<f64>,

    #[arg(long, help = "Push gateway URL; notifications are only logged when unset")]
    pub push_endpoint: Option<String>,

    #[arg(long, help = "Skip the randomized pause between fetches")]
    pub no_delay: bool,
}

impl TrackerOverrides {
    pub fn apply(&self, config: &mut TrackerConfig) {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.fetch_timeout = Duration::from_secs(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(threshold) = self.drop_threshold {
            config.drop_threshold = threshold;
        }
        if let Some(endpoint) = &self.push_endpoint {
            config.push_endpoint = Some(endpoint.clone());
        }
        if self.no_delay {
            config.delay_min_ms = 0;
            config.delay_max_ms = 0;
        }
    }
}

impl Cli {
    /// Parse CLI arguments. On error, clap prints help and exits with code 2.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
