use rust_pricewatch::cli::{Cli, Commands, FavoriteCommand, TokenCommand, TrackerOverrides};
use rust_pricewatch::config::TrackerConfig;
use rust_pricewatch::extraction::extract_price_match;
use rust_pricewatch::logging::init_logging;
use rust_pricewatch::models::Favorite;
use rust_pricewatch::network::{FetchError, PageFetcher};
use rust_pricewatch::orchestration::{
    build_fetcher, build_tracker, run_export_command, run_watch, setup_shutdown_handler, BuildError,
};
use rust_pricewatch::sites::{page_kind, SiteKey};
use rust_pricewatch::state::{FavoriteStore, StateError, TrackerState};
use rust_pricewatch::tracker::TrackerError;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MainError {
    #[error("{0}")]
    Build(#[from] BuildError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("{0}")]
    Usage(String),
}

fn tracker_config(overrides: &TrackerOverrides) -> TrackerConfig {
    let mut config = TrackerConfig::from_env();
    overrides.apply(&mut config);
    config
}

async fn run_pass_command(data_dir: &Path, overrides: &TrackerOverrides) -> Result<(), MainError> {
    let config = tracker_config(overrides);
    let handles = build_tracker(&config, data_dir)?;

    let summary = handles.tracker.run_once().await?;
    println!("{}", summary);
    Ok(())
}

async fn run_watch_command(data_dir: &Path, interval: u64, overrides: &TrackerOverrides) -> Result<(), MainError> {
    let config = tracker_config(overrides);
    let handles = build_tracker(&config, data_dir)?;
    println!(
        "Watching {} favorites every {}s ({} concurrent checks)",
        handles.state.favorite_count()?,
        interval,
        config.concurrency
    );

    let shutdown = setup_shutdown_handler();
    let report = run_watch(&handles.tracker, Duration::from_secs(interval.max(1)), shutdown).await;
    println!(
        "Stopped after {} passes ({} aborted): {}",
        report.passes, report.failed_passes, report.totals
    );
    Ok(())
}

async fn run_extract_command(url: &str, site: Option<SiteKey>, overrides: &TrackerOverrides) -> Result<(), MainError> {
    let config = tracker_config(overrides);
    let site = site.unwrap_or_else(|| SiteKey::from_url(url));
    let fetcher = build_fetcher(&config)?;

    let page = fetcher.fetch(url).await?;
    if page.is_http_failure() {
        println!("HTTP {} from {}", page.status_code, page.final_url);
        return Ok(());
    }

    let kind = page_kind(site, url);
    match extract_price_match(&page.content, site, kind) {
        Some(found) => println!("{:.2} ({} via {}, {:?} page)", found.price, site.label(), found.strategy, kind),
        None => println!("price not found ({}, {:?} page)", site.label(), kind),
    }
    Ok(())
}

fn run_favorite_command(data_dir: &Path, action: FavoriteCommand) -> Result<(), MainError> {
    let state = TrackerState::new(data_dir)?;

    match action {
        FavoriteCommand::Add {
            user,
            url,
            query,
            site,
            name,
            id,
        } => {
            let url = url.unwrap_or_default();
            let query = query.unwrap_or_default();
            if url.trim().is_empty() && query.trim().is_empty() {
                return Err(MainError::Usage("either --url or --query is required".to_string()));
            }
            let site = site.unwrap_or_else(|| SiteKey::from_url(&url));
            let id = id.unwrap_or_else(|| format!("{}-{}", site, chrono::Utc::now().timestamp_millis()));

            let mut favorite = Favorite::new(id, site, url, query);
            if let Some(name) = name {
                favorite.extra.insert("name".to_string(), serde_json::Value::String(name));
            }
            favorite.extra.insert(
                "createdAt".to_string(),
                serde_json::Value::from(chrono::Utc::now().timestamp_millis()),
            );
            state.put_favorite(&user, &favorite)?;
            println!("Added {} ({}) for {}", favorite.id, site.label(), user);
        }
        FavoriteCommand::List { user } => {
            let favorites = state.list_favorites(&user)?;
            if favorites.is_empty() {
                println!("No favorites for {}", user);
            }
            for f in favorites {
                let price = f.last_price.map(|p| format!("{:.2}", p)).unwrap_or_else(|| "-".to_string());
                let status = f.last_error.as_deref().unwrap_or("ok");
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    f.id,
                    f.site_key,
                    price,
                    status,
                    f.name().unwrap_or_else(|| if f.url.is_empty() { f.query.as_str() } else { f.url.as_str() })
                );
            }
        }
        FavoriteCommand::History { user, id } => {
            let favorite = state
                .get_favorite(&user, &id)?
                .ok_or_else(|| MainError::Usage(format!("no favorite {} for {}", id, user)))?;
            for point in &favorite.history {
                let when = chrono::DateTime::from_timestamp_millis(point.timestamp)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| point.timestamp.to_string());
                println!("{}\t{:.2}", when, point.price);
            }
        }
        FavoriteCommand::Remove { user, id } => {
            if state.remove_favorite(&user, &id)? {
                println!("Removed {}", id);
            } else {
                println!("No favorite {} for {}", id, user);
            }
        }
    }
    Ok(())
}

fn run_token_command(data_dir: &Path, action: TokenCommand) -> Result<(), MainError> {
    let state = TrackerState::new(data_dir)?;
    match action {
        TokenCommand::Add { user, token } => {
            if state.add_token(&user, &token)? {
                println!("Token registered for {}", user);
            } else {
                println!("Token already registered for {}", user);
            }
        }
        TokenCommand::Remove { user, token } => {
            if state.remove_token(&user, &token)? {
                println!("Token removed for {}", user);
            } else {
                println!("Token not registered for {}", user);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let cli = Cli::parse_args();
    let _log_guards = init_logging(cli.log_dir.as_deref()).map_err(|e| MainError::Logging(e.to_string()))?;
    let data_dir = cli.data_dir.as_path();

    match cli.command {
        Commands::Run { overrides } => run_pass_command(data_dir, &overrides).await?,
        Commands::Watch { interval, overrides } => run_watch_command(data_dir, interval, &overrides).await?,
        Commands::Extract { url, site, overrides } => run_extract_command(&url, site, &overrides).await?,
        Commands::Favorite { action } => run_favorite_command(data_dir, action)?,
        Commands::Token { action } => run_token_command(data_dir, action)?,
        Commands::Export { output } => {
            let count = run_export_command(data_dir, &output).map_err(|e| MainError::Export(e.to_string()))?;
            println!("Exported {} favorites to {}", count, output.display());
        }
    }

    Ok(())
}
