use chrono::Utc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Metrics collector for observability
pub struct Metrics {
    /// Total trade events generated
    pub events_generated: AtomicU64,
    /// Ticks that found no acceptable candidate
    pub ticks_skipped: AtomicU64,
    /// Total cycles finalized
    pub cycles_finalized: AtomicU64,
    /// Outbound publish failures
    pub publish_failures: AtomicU64,
    /// Unix timestamp of the last generated event (0 = none yet)
    last_event_unix: AtomicI64,
    /// Unix timestamp of the last finalized cycle (0 = none yet)
    last_finalize_unix: AtomicI64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            events_generated: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
            cycles_finalized: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            last_event_unix: AtomicI64::new(0),
            last_finalize_unix: AtomicI64::new(0),
        }
    }

    pub fn record_event(&self) {
        self.events_generated.fetch_add(1, Ordering::Relaxed);
        self.last_event_unix
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finalize(&self) {
        self.cycles_finalized.fetch_add(1, Ordering::Relaxed);
        self.last_finalize_unix
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Seconds since the last generated event, if any
    pub fn seconds_since_last_event(&self) -> Option<i64> {
        let ts = self.last_event_unix.load(Ordering::Relaxed);
        if ts == 0 {
            None
        } else {
            Some(Utc::now().timestamp() - ts)
        }
    }

    pub fn last_finalize_unix(&self) -> i64 {
        self.last_finalize_unix.load(Ordering::Relaxed)
    }

    /// Export metrics in Prometheus format
    pub fn prometheus(&self) -> String {
        format!(
            r#"# HELP glidepath_events_generated_total Total trade events generated
# TYPE glidepath_events_generated_total counter
glidepath_events_generated_total {}

# HELP glidepath_ticks_skipped_total Generator ticks with no acceptable candidate
# TYPE glidepath_ticks_skipped_total counter
glidepath_ticks_skipped_total {}

# HELP glidepath_cycles_finalized_total Total cycles finalized
# TYPE glidepath_cycles_finalized_total counter
glidepath_cycles_finalized_total {}

# HELP glidepath_publish_failures_total Outbound publish failures
# TYPE glidepath_publish_failures_total counter
glidepath_publish_failures_total {}

# HELP glidepath_last_event_timestamp_seconds Unix timestamp of the last generated event
# TYPE glidepath_last_event_timestamp_seconds gauge
glidepath_last_event_timestamp_seconds {}

# HELP glidepath_last_finalize_timestamp_seconds Unix timestamp of the last finalized cycle
# TYPE glidepath_last_finalize_timestamp_seconds gauge
glidepath_last_finalize_timestamp_seconds {}
"#,
            self.events_generated.load(Ordering::Relaxed),
            self.ticks_skipped.load(Ordering::Relaxed),
            self.cycles_finalized.load(Ordering::Relaxed),
            self.publish_failures.load(Ordering::Relaxed),
            self.last_event_unix.load(Ordering::Relaxed),
            self.last_finalize_unix.load(Ordering::Relaxed),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let m = Metrics::new();
        m.record_event();
        m.record_event();
        m.record_skip();
        m.record_finalize();
        m.record_publish_failure();

        assert_eq!(m.events_generated.load(Ordering::Relaxed), 2);
        assert_eq!(m.ticks_skipped.load(Ordering::Relaxed), 1);
        assert_eq!(m.cycles_finalized.load(Ordering::Relaxed), 1);
        assert_eq!(m.publish_failures.load(Ordering::Relaxed), 1);
        assert!(m.seconds_since_last_event().is_some());
    }

    #[test]
    fn test_no_event_yet() {
        let m = Metrics::new();
        assert!(m.seconds_since_last_event().is_none());
        assert_eq!(m.last_finalize_unix(), 0);
    }

    #[test]
    fn test_prometheus_export() {
        let m = Metrics::new();
        m.record_event();
        let out = m.prometheus();
        assert!(out.contains("glidepath_events_generated_total 1"));
        assert!(out.contains("glidepath_cycles_finalized_total 0"));
    }
}
