//! Update policy: turns the outcome of one check into the partial write for
//! the favorite and, when the price fell far enough, a drop event.

use thiserror::Error;

use crate::backoff::CheckSchedule;
use crate::config::TrackerConfig;
use crate::extraction::to_cents;
use crate::models::{Favorite, FavoritePatch, HistoryAppend, PricePoint};
use crate::network::FetchError;
use crate::sites::SiteKey;

// Float slack for the threshold comparison; prices carry cents at most.
const DROP_EPSILON: f64 = 1e-6;

/// Why a single favorite check did not produce a price.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("HTTP {0}")]
    Http(u16),

    #[error("price not found")]
    PriceNotFound,

    #[error("no URL or search query to check")]
    NoTarget,
}

/// A qualifying price decrease for one favorite.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceDrop {
    pub favorite_id: String,
    pub favorite_name: Option<String>,
    pub site: SiteKey,
    pub previous_price: f64,
    pub price: f64,
    pub url: String,
}

impl PriceDrop {
    /// Percentage decrease relative to the previous price.
    pub fn percent(&self) -> f64 {
        if self.previous_price <= 0.0 {
            return 0.0;
        }
        ((self.previous_price - self.price) / self.previous_price * 100.0).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub patch: FavoritePatch,
    pub drop: Option<PriceDrop>,
    pub price_changed: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct UpdatePolicy {
    schedule: CheckSchedule,
    drop_threshold: f64,
    history_cap: usize,
}

impl UpdatePolicy {
    pub fn new(schedule: CheckSchedule, drop_threshold: f64, history_cap: usize) -> Self {
        Self {
            schedule,
            drop_threshold,
            history_cap,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(
            CheckSchedule::new(config.success_interval, config.failure_backoff),
            config.drop_threshold,
            config.history_cap,
        )
    }

    /// Plan the write for `favorite` after a check at `now_ms` that fetched `link`.
    pub fn plan(&self, favorite: &Favorite, outcome: &Result<f64, CheckError>, now_ms: i64, link: &str) -> UpdatePlan {
        match outcome {
            Err(error) => UpdatePlan {
                patch: FavoritePatch {
                    last_checked_at: Some(now_ms),
                    next_try_at: Some(self.schedule.next_after_failure(now_ms)),
                    last_error: Some(Some(error.to_string())),
                    ..Default::default()
                },
                drop: None,
                price_changed: false,
            },
            Ok(price) => {
                let price = *price;
                let previous = favorite.last_price;
                let price_changed = previous.map_or(true, |p| to_cents(p) != to_cents(price));

                let drop = previous
                    .filter(|p| is_significant_drop(*p, price, self.drop_threshold))
                    .map(|previous_price| PriceDrop {
                        favorite_id: favorite.id.clone(),
                        favorite_name: favorite.name().map(str::to_string),
                        site: favorite.site_key,
                        previous_price,
                        price,
                        url: link.to_string(),
                    });

                UpdatePlan {
                    patch: FavoritePatch {
                        last_checked_at: Some(now_ms),
                        last_success_at: Some(now_ms),
                        next_try_at: Some(self.schedule.next_after_success(now_ms)),
                        last_price: Some(price),
                        last_error: Some(None),
                        append_history: price_changed.then_some(HistoryAppend {
                            entry: PricePoint { timestamp: now_ms, price },
                            cap: self.history_cap,
                        }),
                    },
                    drop,
                    price_changed,
                }
            }
        }
    }
}

/// `price <= previous * threshold`, e.g. a 10%-or-greater drop for 0.90.
pub fn is_significant_drop(previous: f64, price: f64, threshold: f64) -> bool {
    previous > 0.0 && price <= previous * threshold + DROP_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MIN: i64 = 60_000;

    fn policy() -> UpdatePolicy {
        UpdatePolicy::new(
            CheckSchedule::new(Duration::from_secs(20 * 60), Duration::from_secs(5 * 60)),
            0.90,
            3,
        )
    }

    fn tracked(last_price: Option<f64>) -> Favorite {
        let mut f = Favorite::new("fav-1", SiteKey::Trendyol, "https://www.trendyol.com/x-p-1", "");
        f.last_price = last_price;
        f
    }

    #[test]
    fn test_drop_threshold_boundary() {
        assert!(is_significant_drop(1000.0, 900.0, 0.90));
        assert!(!is_significant_drop(1000.0, 901.0, 0.90));
        assert!(is_significant_drop(999.99, 899.99, 0.90));
    }

    #[test]
    fn test_first_observation_appends_without_drop() {
        let plan = policy().plan(&tracked(None), &Ok(500.0), 1_000, "https://l");
        assert!(plan.price_changed);
        assert!(plan.drop.is_none());
        assert_eq!(
            plan.patch.append_history,
            Some(HistoryAppend { entry: PricePoint { timestamp: 1_000, price: 500.0 }, cap: 3 })
        );
        assert_eq!(plan.patch.next_try_at, Some(1_000 + 20 * MIN));
        assert_eq!(plan.patch.last_error, Some(None));
    }

    #[test]
    fn test_same_price_skips_history() {
        let plan = policy().plan(&tracked(Some(500.0)), &Ok(500.0), 1_000, "https://l");
        assert!(!plan.price_changed);
        assert!(plan.patch.append_history.is_none());
        assert_eq!(plan.patch.last_price, Some(500.0));
        assert_eq!(plan.patch.last_success_at, Some(1_000));
    }

    #[test]
    fn test_drop_event_carries_link_and_prices() {
        let plan = policy().plan(&tracked(Some(1000.0)), &Ok(900.0), 1_000, "https://deep.link/p");
        let drop = plan.drop.unwrap();
        assert_eq!(drop.previous_price, 1000.0);
        assert_eq!(drop.price, 900.0);
        assert_eq!(drop.url, "https://deep.link/p");
        assert_eq!(drop.site, SiteKey::Trendyol);
        assert!((drop.percent() - 10.0).abs() < 1e-9);

        let small = policy().plan(&tracked(Some(1000.0)), &Ok(901.0), 1_000, "https://l");
        assert!(small.drop.is_none());
        assert!(small.price_changed);
    }

    #[test]
    fn test_failure_leaves_price_and_history_alone() {
        let plan = policy().plan(&tracked(Some(500.0)), &Err(CheckError::Http(503)), 1_000, "https://l");
        assert_eq!(plan.patch.last_price, None);
        assert_eq!(plan.patch.append_history, None);
        assert_eq!(plan.patch.last_success_at, None);
        assert_eq!(plan.patch.last_checked_at, Some(1_000));
        assert_eq!(plan.patch.next_try_at, Some(1_000 + 5 * MIN));
        assert_eq!(plan.patch.last_error, Some(Some("HTTP 503".to_string())));
        assert!(plan.drop.is_none());
    }

    #[test]
    fn test_price_not_found_text() {
        let plan = policy().plan(&tracked(None), &Err(CheckError::PriceNotFound), 0, "https://l");
        assert_eq!(plan.patch.last_error, Some(Some("price not found".to_string())));
        assert_eq!(plan.patch.next_try_at, Some(5 * MIN));
    }

    #[test]
    fn test_transport_error_text() {
        let plan = policy().plan(&tracked(None), &Err(CheckError::Fetch(FetchError::Timeout)), 0, "https://l");
        assert_eq!(plan.patch.last_error, Some(Some("fetch failed: Request timeout".to_string())));
    }
}
