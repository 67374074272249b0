//! Bounded in-memory audit log with scoring and report export.

use std::collections::VecDeque;

use chrono::Utc;
use tracing::{info, warn};

use super::types::{AuditEntry, ReportHeader, SessionReport};
use crate::config::AuditConfig;
use crate::reasoning::Severity;

/// Per-severity score penalties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreWeights {
    pub critical: u32,
    pub medium: u32,
    pub low: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            critical: 15,
            medium: 0,
            low: 0,
        }
    }
}

impl ScoreWeights {
    pub fn from_config(config: &AuditConfig) -> Self {
        Self {
            critical: config.critical_penalty,
            medium: config.medium_penalty,
            low: config.low_penalty,
        }
    }

    fn penalty(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// The session's drift history, newest first, capped at a fixed size.
///
/// The score accrues per recorded event, not per retained entry, so cap
/// eviction never raises it.
pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
    max_entries: usize,
    weights: ScoreWeights,
    accrued_penalty: u32,
}

impl AuditLog {
    pub fn new(max_entries: usize, weights: ScoreWeights) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
            weights,
            accrued_penalty: 0,
        }
    }

    /// Record a drift event. When the cap is reached the oldest entry is
    /// dropped from display; its score penalty stands.
    pub fn append(&mut self, severity: Severity, message: &str) -> &AuditEntry {
        let entry = AuditEntry::new(severity, message);
        if severity == Severity::Critical {
            warn!("Audit: CRITICAL drift recorded: {}", message);
        } else {
            info!("Audit: {} drift recorded: {}", severity, message);
        }

        self.accrued_penalty = self
            .accrued_penalty
            .saturating_add(self.weights.penalty(severity));
        self.entries.push_front(entry);
        while self.entries.len() > self.max_entries {
            self.entries.pop_back();
        }
        &self.entries[0]
    }

    /// Entries newest first, for live display.
    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.accrued_penalty = 0;
    }

    /// Compliance score for the session: 100 minus every recorded event's
    /// per-severity penalty, floored at 0. Monotonically non-increasing
    /// until `clear`.
    pub fn compute_score(&self) -> u32 {
        100u32.saturating_sub(self.accrued_penalty)
    }

    /// Build a session report. Entries come out oldest first.
    pub fn report(&self, duration_secs: f64) -> SessionReport {
        let mut entries: Vec<AuditEntry> = self.entries.iter().cloned().collect();
        entries.reverse();

        SessionReport {
            header: ReportHeader {
                generated_at: Utc::now().to_rfc3339(),
                duration_secs,
                entry_count: entries.len(),
                score: self.compute_score(),
            },
            entries,
        }
    }

    /// Export the report as pretty-printed JSON.
    ///
    /// # Errors
    /// Serialization failure (not expected for these types).
    pub fn export_json(&self, duration_secs: f64) -> Result<String, String> {
        serde_json::to_string_pretty(&self.report(duration_secs))
            .map_err(|e| format!("Failed to serialize session report: {}", e))
    }

    /// Export the entries as CSV with a `timestamp,severity,message` header.
    /// Fields containing commas, quotes, or newlines are quoted.
    pub fn export_csv(&self, duration_secs: f64) -> String {
        let report = self.report(duration_secs);
        let mut csv = String::from("timestamp,severity,message\n");
        for entry in &report.entries {
            csv.push_str(&format!(
                "{},{},{}\n",
                csv_field(&entry.timestamp),
                entry.severity,
                csv_field(&entry.message)
            ));
        }
        csv
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> AuditLog {
        AuditLog::new(300, ScoreWeights::default())
    }

    #[test]
    fn test_append_newest_first() {
        let mut log = log();
        log.append(Severity::Low, "first");
        log.append(Severity::Medium, "second");

        let messages: Vec<&str> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut log = AuditLog::new(3, ScoreWeights::default());
        for i in 1..=5 {
            log.append(Severity::Low, &format!("event {}", i));
        }

        assert_eq!(log.len(), 3);
        let messages: Vec<&str> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["event 5", "event 4", "event 3"]);
    }

    #[test]
    fn test_score_perfect_session() {
        assert_eq!(log().compute_score(), 100);
    }

    #[test]
    fn test_score_penalizes_criticals() {
        let mut log = log();
        log.append(Severity::Critical, "one");
        log.append(Severity::Critical, "two");
        // Default weights ignore non-critical drifts
        log.append(Severity::Medium, "noise");
        log.append(Severity::Low, "noise");

        assert_eq!(log.compute_score(), 70);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let mut log = log();
        for _ in 0..7 {
            log.append(Severity::Critical, "bad");
        }
        assert_eq!(log.compute_score(), 0);

        log.append(Severity::Critical, "worse");
        assert_eq!(log.compute_score(), 0);
    }

    #[test]
    fn test_score_unaffected_by_cap_eviction() {
        let mut log = AuditLog::new(2, ScoreWeights::default());
        log.append(Severity::Critical, "early critical");
        assert_eq!(log.compute_score(), 85);

        // Push the critical entry out of the display buffer
        log.append(Severity::Low, "a");
        log.append(Severity::Low, "b");
        assert_eq!(log.len(), 2);
        assert!(log.entries().all(|e| e.severity == Severity::Low));

        // The penalty stands; the score never went back up
        assert_eq!(log.compute_score(), 85);
    }

    #[test]
    fn test_custom_weights() {
        let weights = ScoreWeights {
            critical: 25,
            medium: 10,
            low: 1,
        };
        let mut log = AuditLog::new(300, weights);
        log.append(Severity::Critical, "a");
        log.append(Severity::Medium, "b");
        log.append(Severity::Low, "c");

        assert_eq!(log.compute_score(), 100 - 25 - 10 - 1);
    }

    #[test]
    fn test_report_chronological_order() {
        let mut log = log();
        log.append(Severity::Low, "first");
        log.append(Severity::Critical, "second");

        let report = log.report(120.0);
        assert_eq!(report.header.entry_count, 2);
        assert_eq!(report.header.score, 85);
        assert_eq!(report.header.duration_secs, 120.0);
        assert_eq!(report.entries[0].message, "first");
        assert_eq!(report.entries[1].message, "second");
    }

    #[test]
    fn test_export_json_parses() {
        let mut log = log();
        log.append(Severity::Critical, "wrong polarity");

        let json = log.export_json(60.0).unwrap();
        let parsed: SessionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.header.score, 85);
        assert_eq!(parsed.entries.len(), 1);
    }

    #[test]
    fn test_export_csv_header_and_quoting() {
        let mut log = log();
        log.append(Severity::Medium, "plain message");
        log.append(Severity::Critical, "message, with \"quotes\"");

        let csv = log.export_csv(60.0);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp,severity,message");
        assert!(lines[1].ends_with(",MEDIUM,plain message"));
        assert!(lines[2].ends_with(",CRITICAL,\"message, with \"\"quotes\"\"\""));
    }

    #[test]
    fn test_clear() {
        let mut log = log();
        log.append(Severity::Critical, "a");
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.compute_score(), 100);
    }
}
