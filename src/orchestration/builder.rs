//! Tracker builder: opens the store and wires the HTTP client and push
//! transport into a [`PriceTracker`].

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ConfigError, TrackerConfig};
use crate::network::{FetchError, HttpClient};
use crate::notifier::{HttpPushTransport, LogTransport, Notifier, NotifyError, PushTransport};
use crate::state::{StateError, TrackerState};
use crate::tracker::PriceTracker;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to open store: {0}")]
    State(#[from] StateError),

    #[error("failed to build HTTP client: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to build push transport: {0}")]
    Notify(#[from] NotifyError),
}

/// A ready tracker plus the concrete store it writes to, for admin commands
/// that need more than the tracker's view.
pub struct TrackerHandles {
    pub tracker: PriceTracker,
    pub state: Arc<TrackerState>,
}

pub fn build_fetcher(config: &TrackerConfig) -> Result<HttpClient, FetchError> {
    HttpClient::new(
        config.user_agent.clone(),
        config.accept_language.clone(),
        config.fetch_timeout,
    )
}

/// HTTP push when an endpoint is configured, log-only otherwise.
pub fn build_notifier(config: &TrackerConfig) -> Result<Notifier, NotifyError> {
    let transport: Arc<dyn PushTransport> = match &config.push_endpoint {
        Some(endpoint) => Arc::new(HttpPushTransport::new(endpoint.clone(), config.push_api_key.clone())?),
        None => {
            tracing::info!("No push endpoint configured, notifications will only be logged");
            Arc::new(LogTransport)
        }
    };
    Ok(Notifier::new(transport))
}

/// Builds the tracker with every backend constructed exactly once.
#[tracing::instrument(skip_all, fields(data_dir = %data_dir.as_ref().display()))]
pub fn build_tracker<P: AsRef<Path>>(config: &TrackerConfig, data_dir: P) -> Result<TrackerHandles, BuildError> {
    config.validate()?;

    let state = Arc::new(TrackerState::new(data_dir.as_ref())?);
    let fetcher = Arc::new(build_fetcher(config)?);
    let notifier = build_notifier(config)?;

    let tracker = PriceTracker::new(config, state.clone(), fetcher, notifier);
    tracing::debug!(
        concurrency = config.concurrency,
        history_cap = config.history_cap,
        drop_threshold = config.drop_threshold,
        "Tracker ready"
    );

    Ok(TrackerHandles { tracker, state })
}
