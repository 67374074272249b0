//! Types for the in-memory audit trail and the exported session report.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::reasoning::Severity;

/// One recorded drift event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Time-ordered unique id
    pub id: String,
    /// RFC 3339 timestamp of the verdict
    pub timestamp: String,
    pub severity: Severity,
    /// The corrective message from the verdict
    pub message: String,
}

impl AuditEntry {
    pub fn new(severity: Severity, message: &str) -> Self {
        let now = Utc::now();
        Self {
            id: format!("{}-{:04x}", now.timestamp_millis(), rand::random::<u16>()),
            timestamp: now.to_rfc3339(),
            severity,
            message: message.to_string(),
        }
    }
}

/// Summary block at the top of an exported report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportHeader {
    pub generated_at: String,
    /// Session duration in seconds, from arming to report generation
    pub duration_secs: f64,
    pub entry_count: usize,
    /// Compliance score, 0..=100
    pub score: u32,
}

/// A complete session report: header plus entries in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub header: ReportHeader,
    pub entries: Vec<AuditEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_ids_unique() {
        let a = AuditEntry::new(Severity::Low, "one");
        let b = AuditEntry::new(Severity::Low, "two");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_entry_timestamp_is_rfc3339() {
        let entry = AuditEntry::new(Severity::Critical, "hands in hazard zone");
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    }

    #[test]
    fn test_report_round_trips_through_json() {
        let report = SessionReport {
            header: ReportHeader {
                generated_at: Utc::now().to_rfc3339(),
                duration_secs: 342.5,
                entry_count: 1,
                score: 85,
            },
            entries: vec![AuditEntry::new(Severity::Critical, "wrong polarity")],
        };

        let json = serde_json::to_string(&report).unwrap();
        let parsed: SessionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
