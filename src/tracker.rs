use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;

use crate::backoff::{CheckSchedule, PolitenessDelay};
use crate::config::TrackerConfig;
use crate::extraction::extract_price_match;
use crate::models::{Favorite, UserId};
use crate::network::PageFetcher;
use crate::notifier::{Notifier, PushMessage};
use crate::policy::{CheckError, PriceDrop, UpdatePolicy};
use crate::sites::page_kind;
use crate::state::{FavoriteStore, StateError};

/// Failures that stop a pass before any favorite is processed.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("favorite store unavailable: {0}")]
    StoreUnavailable(#[source] StateError),
}

/// Aggregate outcome of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Favorites that were due and attempted.
    pub checked: usize,
    /// Checks that observed a price and committed it.
    pub updated: usize,
    /// Failed checks, failed store writes and users whose favorites could not be listed.
    pub errors: usize,
    /// Favorites not yet due.
    pub skipped: usize,
    /// Price changes appended to history.
    pub changed: usize,
    /// Drop events delivered to at least one recipient.
    pub notified: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "checked {} | updated {} | changed {} | notified {} | skipped {} | errors {}",
            self.checked, self.updated, self.changed, self.notified, self.skipped, self.errors
        )
    }
}

impl std::ops::AddAssign for RunSummary {
    fn add_assign(&mut self, other: Self) {
        self.checked += other.checked;
        self.updated += other.updated;
        self.errors += other.errors;
        self.skipped += other.skipped;
        self.changed += other.changed;
        self.notified += other.notified;
    }
}

/// What happened to one due favorite.
#[derive(Debug, Clone, PartialEq)]
enum CheckOutcome {
    Priced { changed: bool, notified: bool },
    Failed(CheckError),
    StoreFailed,
}

struct CheckReport {
    user_id: UserId,
    favorite_id: String,
    outcome: CheckOutcome,
}

/// Revisits every due favorite once per pass.
///
/// Backends are injected once at construction; the tracker holds no global
/// state and can be driven entirely by in-memory fakes.
#[derive(Clone)]
pub struct PriceTracker {
    policy: UpdatePolicy,
    delay: PolitenessDelay,
    concurrency: usize,
    store: Arc<dyn FavoriteStore>,
    fetcher: Arc<dyn PageFetcher>,
    notifier: Notifier,
}

impl PriceTracker {
    pub fn new(
        config: &TrackerConfig,
        store: Arc<dyn FavoriteStore>,
        fetcher: Arc<dyn PageFetcher>,
        notifier: Notifier,
    ) -> Self {
        Self {
            policy: UpdatePolicy::from_config(config),
            delay: PolitenessDelay::new(config.delay_min_ms, config.delay_max_ms),
            concurrency: config.concurrency.max(1),
            store,
            fetcher,
            notifier,
        }
    }

    pub fn with_delay(mut self, delay: PolitenessDelay) -> Self {
        self.delay = delay;
        self
    }

    /// One pass at the current wall-clock time.
    pub async fn run_once(&self) -> Result<RunSummary, TrackerError> {
        self.run_once_at(chrono::Utc::now().timestamp_millis()).await
    }

    /// One pass where every due check and every timestamp written uses `now_ms`.
    #[tracing::instrument(skip(self))]
    pub async fn run_once_at(&self, now_ms: i64) -> Result<RunSummary, TrackerError> {
        let users = self.store.list_users().map_err(TrackerError::StoreUnavailable)?;
        let mut summary = RunSummary::default();

        let mut due: Vec<(UserId, Favorite)> = Vec::new();
        for user_id in users {
            let favorites = match self.store.list_favorites(&user_id) {
                Ok(favorites) => favorites,
                Err(e) => {
                    tracing::error!(user = %user_id, error = %e, "Failed to list favorites");
                    summary.errors += 1;
                    continue;
                }
            };
            for favorite in favorites {
                if CheckSchedule::is_due(&favorite, now_ms) {
                    due.push((user_id.clone(), favorite));
                } else {
                    summary.skipped += 1;
                }
            }
        }

        tracing::info!(due = due.len(), skipped = summary.skipped, "Starting pass");

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut in_flight = JoinSet::new();

        for (index, (user_id, favorite)) in due.into_iter().enumerate() {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            if index > 0 {
                sleep(self.delay.delay()).await;
            }

            let tracker = self.clone();
            in_flight.spawn(async move {
                let report = tracker.check_favorite(user_id, favorite, now_ms).await;
                drop(permit);
                report
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            Self::record(&mut summary, joined);
        }

        tracing::info!(%summary, "Pass complete");
        Ok(summary)
    }

    fn record(summary: &mut RunSummary, joined: Result<CheckReport, tokio::task::JoinError>) {
        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Check task failed to join");
                summary.checked += 1;
                summary.errors += 1;
                return;
            }
        };

        summary.checked += 1;
        match report.outcome {
            CheckOutcome::Priced { changed, notified } => {
                summary.updated += 1;
                summary.changed += usize::from(changed);
                summary.notified += usize::from(notified);
            }
            CheckOutcome::Failed(e) => {
                tracing::warn!(
                    user = %report.user_id,
                    favorite = %report.favorite_id,
                    error = %e,
                    "Check failed"
                );
                summary.errors += 1;
            }
            CheckOutcome::StoreFailed => summary.errors += 1,
        }
    }

    /// fetch → extract → store → notify for a single favorite.
    async fn check_favorite(&self, user_id: UserId, favorite: Favorite, now_ms: i64) -> CheckReport {
        let link = favorite.target_url();
        let result = match link.as_deref() {
            Some(url) => self.observe_price(&favorite, url).await,
            None => Err(CheckError::NoTarget),
        };

        let plan = self.policy.plan(&favorite, &result, now_ms, link.as_deref().unwrap_or_default());

        let outcome = match self.store.merge_update(&user_id, &favorite.id, &plan.patch) {
            Err(e) => {
                tracing::error!(user = %user_id, favorite = %favorite.id, error = %e, "Failed to store check result");
                CheckOutcome::StoreFailed
            }
            Ok(()) => match result {
                Err(e) => CheckOutcome::Failed(e),
                Ok(price) => {
                    tracing::debug!(user = %user_id, favorite = %favorite.id, price, changed = plan.price_changed, "Price observed");
                    let notified = match &plan.drop {
                        Some(drop) => self.notify_drop(&user_id, drop).await,
                        None => false,
                    };
                    CheckOutcome::Priced {
                        changed: plan.price_changed,
                        notified,
                    }
                }
            },
        };

        CheckReport {
            user_id,
            favorite_id: favorite.id,
            outcome,
        }
    }

    async fn observe_price(&self, favorite: &Favorite, url: &str) -> Result<f64, CheckError> {
        let page = self.fetcher.fetch(url).await?;
        if page.is_http_failure() {
            return Err(CheckError::Http(page.status_code));
        }

        let kind = page_kind(favorite.site_key, url);
        let found = extract_price_match(&page.content, favorite.site_key, kind).ok_or(CheckError::PriceNotFound)?;
        tracing::trace!(url, strategy = %found.strategy, price = found.price, "Price extracted");
        Ok(found.price)
    }

    /// Returns true if at least one recipient accepted the notification.
    async fn notify_drop(&self, user_id: &str, drop: &PriceDrop) -> bool {
        let tokens = match self.store.list_recipient_tokens(user_id) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "Failed to load push tokens");
                return false;
            }
        };
        if tokens.is_empty() {
            tracing::debug!(user = %user_id, favorite = %drop.favorite_id, "Price drop with no recipients");
            return false;
        }

        tracing::info!(
            user = %user_id,
            favorite = %drop.favorite_id,
            previous = drop.previous_price,
            price = drop.price,
            "Price drop"
        );
        let outcomes = self.notifier.notify(&tokens, &PushMessage::price_drop(drop)).await;
        outcomes.iter().any(|o| o.result.is_ok())
    }
}
