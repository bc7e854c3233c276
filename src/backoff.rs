use rand::Rng;
use std::time::Duration;

use crate::models::Favorite;

/// Fixed re-check cadence: a long interval after a successful check, a short
/// backoff after any failure.
#[derive(Debug, Clone, Copy)]
pub struct CheckSchedule {
    success_ms: i64,
    failure_ms: i64,
}

impl CheckSchedule {
    pub fn new(success_interval: Duration, failure_backoff: Duration) -> Self {
        Self {
            success_ms: duration_ms(success_interval),
            failure_ms: duration_ms(failure_backoff),
        }
    }

    pub fn next_after_success(&self, now_ms: i64) -> i64 {
        now_ms.saturating_add(self.success_ms)
    }

    pub fn next_after_failure(&self, now_ms: i64) -> i64 {
        now_ms.saturating_add(self.failure_ms)
    }

    /// Never-checked favorites are always due; otherwise due once `next_try_at` is reached.
    pub fn is_due(favorite: &Favorite, now_ms: i64) -> bool {
        match (favorite.last_checked_at, favorite.next_try_at) {
            (None, _) | (_, None) => true,
            (Some(_), Some(next)) => now_ms >= next,
        }
    }
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Uniformly random pause between successive fetches.
#[derive(Debug, Clone, Copy)]
pub struct PolitenessDelay {
    min_ms: u64,
    max_ms: u64,
}

impl PolitenessDelay {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn delay(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::SiteKey;

    fn favorite(last_checked_at: Option<i64>, next_try_at: Option<i64>) -> Favorite {
        let mut f = Favorite::new("f", SiteKey::Other, "https://shop.test/p", "");
        f.last_checked_at = last_checked_at;
        f.next_try_at = next_try_at;
        f
    }

    #[test]
    fn test_next_times() {
        let schedule = CheckSchedule::new(Duration::from_secs(1200), Duration::from_secs(300));
        assert_eq!(schedule.next_after_success(1_000), 1_201_000);
        assert_eq!(schedule.next_after_failure(1_000), 301_000);
    }

    #[test]
    fn test_first_run_is_due() {
        assert!(CheckSchedule::is_due(&favorite(None, None), 0));
        assert!(CheckSchedule::is_due(&favorite(None, Some(i64::MAX)), 0));
        assert!(CheckSchedule::is_due(&favorite(Some(5), None), 0));
    }

    #[test]
    fn test_due_boundary_is_inclusive() {
        let f = favorite(Some(100), Some(5_000));
        assert!(!CheckSchedule::is_due(&f, 4_999));
        assert!(CheckSchedule::is_due(&f, 5_000));
        assert!(CheckSchedule::is_due(&f, 5_001));
    }

    #[test]
    fn test_delay_within_bounds() {
        let delay = PolitenessDelay::new(800, 1500);
        for _ in 0..50 {
            let d = delay.delay().as_millis();
            assert!((800..=1500).contains(&d));
        }
        assert_eq!(PolitenessDelay::none().delay(), Duration::ZERO);
    }
}
