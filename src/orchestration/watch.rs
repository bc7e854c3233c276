//! Repeated passes on a fixed cadence.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use crate::tracker::{PriceTracker, RunSummary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchReport {
    pub passes: usize,
    pub failed_passes: usize,
    pub totals: RunSummary,
}

/// Run passes every `interval` (measured start to start) until `shutdown` flips
/// to true. A pass in progress always completes; a fatal pass error is logged
/// and the next pass is attempted on schedule.
pub async fn run_watch(tracker: &PriceTracker, interval: Duration, mut shutdown: watch::Receiver<bool>) -> WatchReport {
    let mut report = WatchReport::default();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let started = Instant::now();
        match tracker.run_once().await {
            Ok(summary) => {
                println!("Pass {}: {}", report.passes + 1, summary);
                report.totals += summary;
            }
            Err(e) => {
                tracing::error!(error = %e, "Pass aborted");
                report.failed_passes += 1;
            }
        }
        report.passes += 1;

        tokio::select! {
            _ = sleep_until(started + interval) => {}
            changed = shutdown.changed() => {
                // Sender gone means nobody can ask us to stop; keep the cadence.
                if changed.is_err() {
                    sleep_until(started + interval).await;
                }
            }
        }
    }

    tracing::info!(passes = report.passes, totals = %report.totals, "Watch stopped");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::network::HttpClient;
    use crate::notifier::{LogTransport, Notifier};
    use crate::state::TrackerState;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn tracker(dir: &TempDir) -> PriceTracker {
        let config = TrackerConfig::default();
        let state = Arc::new(TrackerState::new(dir.path()).unwrap());
        let http = Arc::new(HttpClient::new("t".to_string(), "tr".to_string(), Duration::from_secs(1)).unwrap());
        PriceTracker::new(&config, state, http, Notifier::new(Arc::new(LogTransport)))
    }

    #[tokio::test]
    async fn test_stops_before_first_pass_when_already_signalled() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = watch::channel(true);
        let report = run_watch(&tracker(&dir), Duration::from_secs(60), rx).await;
        assert_eq!(report.passes, 0);
        drop(tx);
    }

    #[tokio::test]
    async fn test_shutdown_after_pass() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let (tx, rx) = watch::channel(false);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
            tx
        });

        let report = run_watch(&tracker, Duration::from_secs(3600), rx).await;
        assert_eq!(report.passes, 1);
        assert_eq!(report.failed_passes, 0);
        assert_eq!(report.totals, RunSummary::default());
        drop(stopper.await.unwrap());
    }
}
