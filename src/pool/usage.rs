use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// Trailing window over which usage events count toward the adaptive timeout.
const USAGE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-type sliding-window usage log. The resulting timeout is a three-bucket
/// step function: rarely used types get the minimum (cheaper to re-create
/// than to keep warm), hot types get the maximum (avoid repeated cold starts).
pub struct UsageTracker {
    min_timeout: Duration,
    default_timeout: Duration,
    max_timeout: Duration,
    history: RwLock<HashMap<String, Vec<Instant>>>,
}

impl UsageTracker {
    pub fn new(min_timeout: Duration, default_timeout: Duration, max_timeout: Duration) -> Self {
        Self {
            min_timeout,
            default_timeout,
            max_timeout,
            history: RwLock::new(HashMap::new()),
        }
    }

    pub async fn record_use(&self, model_type: &str) {
        self.history
            .write()
            .await
            .entry(model_type.to_string())
            .or_default()
            .push(Instant::now());
    }

    pub async fn adaptive_timeout(&self, model_type: &str) -> Duration {
        let mut history = self.history.write().await;
        let events = history.entry(model_type.to_string()).or_default();
        let now = Instant::now();
        events.retain(|event| now.duration_since(*event) < USAGE_WINDOW);
        match events.len() {
            count if count < 5 => self.min_timeout,
            count if count > 20 => self.max_timeout,
            _ => self.default_timeout,
        }
    }

    /// In-window event counts per type, pruned on read.
    pub async fn counts(&self) -> HashMap<String, usize> {
        let mut history = self.history.write().await;
        let now = Instant::now();
        history
            .iter_mut()
            .map(|(model_type, events)| {
                events.retain(|event| now.duration_since(*event) < USAGE_WINDOW);
                (model_type.clone(), events.len())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_secs(5 * 60);
    const DEFAULT: Duration = Duration::from_secs(15 * 60);
    const MAX: Duration = Duration::from_secs(20 * 60);

    fn tracker() -> UsageTracker {
        UsageTracker::new(MIN, DEFAULT, MAX)
    }

    async fn record_n(tracker: &UsageTracker, model_type: &str, n: usize) {
        for _ in 0..n {
            tracker.record_use(model_type).await;
        }
    }

    #[tokio::test]
    async fn rare_usage_gets_minimum_timeout() {
        let tracker = tracker();
        record_n(&tracker, "renal", 3).await;
        assert_eq!(tracker.adaptive_timeout("renal").await, MIN);
    }

    #[tokio::test]
    async fn moderate_usage_gets_default_timeout() {
        let tracker = tracker();
        record_n(&tracker, "renal", 10).await;
        assert_eq!(tracker.adaptive_timeout("renal").await, DEFAULT);
    }

    #[tokio::test]
    async fn heavy_usage_gets_maximum_timeout() {
        let tracker = tracker();
        record_n(&tracker, "renal", 25).await;
        assert_eq!(tracker.adaptive_timeout("renal").await, MAX);
    }

    #[tokio::test]
    async fn bucket_boundaries_are_inclusive_of_default() {
        let tracker = tracker();
        record_n(&tracker, "five", 5).await;
        record_n(&tracker, "twenty", 20).await;
        record_n(&tracker, "four", 4).await;
        record_n(&tracker, "twentyone", 21).await;
        assert_eq!(tracker.adaptive_timeout("five").await, DEFAULT);
        assert_eq!(tracker.adaptive_timeout("twenty").await, DEFAULT);
        assert_eq!(tracker.adaptive_timeout("four").await, MIN);
        assert_eq!(tracker.adaptive_timeout("twentyone").await, MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn events_older_than_window_are_pruned() {
        let tracker = tracker();
        record_n(&tracker, "renal", 10).await;
        tokio::time::advance(Duration::from_secs(25 * 60 * 60)).await;
        record_n(&tracker, "renal", 1).await;
        // Only the fresh event survives the window, so the type is rare again.
        assert_eq!(tracker.adaptive_timeout("renal").await, MIN);
        assert_eq!(tracker.counts().await["renal"], 1);
    }

    #[tokio::test]
    async fn unknown_type_counts_as_rare() {
        let tracker = tracker();
        assert_eq!(tracker.adaptive_timeout("portal").await, MIN);
    }
}
