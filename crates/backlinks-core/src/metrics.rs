use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::ItemId;

/// Result of one backlog drain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrainReport {
    /// Items scanned successfully.
    pub scanned: u64,

    /// Items whose scan failed. They stay unregistered, but later drains
    /// skip them until they are edited or deregistered.
    pub failed: Vec<ItemId>,

    /// Unregistered items still waiting for a drain.
    pub remaining: u64,

    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl DrainReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.scanned == 0 && self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Drain: scanned {} items, {} failed in {:?} | Backlog: {}",
            self.scanned,
            self.failed.len(),
            self.duration,
            self.remaining
        )
    }
}

/// Running totals across drains, for the worker's periodic log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogMetrics {
    pub drains: u64,
    pub items_scanned: u64,
    pub items_failed: u64,
    pub backlog_size: u64,
    #[serde(with = "duration_millis")]
    pub last_drain_duration: Duration,
    pub last_drain_at: Option<DateTime<Utc>>,
}

impl Default for BacklogMetrics {
    fn default() -> Self {
        Self {
            drains: 0,
            items_scanned: 0,
            items_failed: 0,
            backlog_size: 0,
            last_drain_duration: Duration::from_secs(0),
            last_drain_at: None,
        }
    }
}

impl BacklogMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished drain into the totals.
    pub fn record(&mut self, report: &DrainReport, at: DateTime<Utc>) {
        self.drains += 1;
        self.items_scanned += report.scanned;
        self.items_failed += report.failed.len() as u64;
        self.backlog_size = report.remaining;
        self.last_drain_duration = report.duration;
        self.last_drain_at = Some(at);
    }

    pub fn set_backlog_size(&mut self, size: u64) {
        self.backlog_size = size;
    }

    /// Get a summary string for logging
    pub fn summary(&self) -> String {
        format!(
            "Drain #{}: {} scanned, {} failed in total, last took {:?} | Backlog: {}",
            self.drains,
            self.items_scanned,
            self.items_failed,
            self.last_drain_duration,
            self.backlog_size
        )
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut metrics = BacklogMetrics::new();
        let report = DrainReport {
            scanned: 18,
            failed: vec![ItemId(4), ItemId(9)],
            remaining: 25,
            duration: Duration::from_millis(120),
        };
        metrics.record(&report, Utc::now());
        metrics.record(
            &DrainReport {
                scanned: 20,
                remaining: 5,
                ..DrainReport::new()
            },
            Utc::now(),
        );

        assert_eq!(metrics.drains, 2);
        assert_eq!(metrics.items_scanned, 38);
        assert_eq!(metrics.items_failed, 2);
        assert_eq!(metrics.backlog_size, 5);
        assert!(metrics.summary().contains("Backlog: 5"));
    }

    #[test]
    fn test_report_json_uses_millis() {
        let report = DrainReport {
            scanned: 1,
            failed: vec![],
            remaining: 0,
            duration: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duration"], 1500);
        assert!(report.summary().starts_with("Drain: scanned 1 items"));
    }
}
