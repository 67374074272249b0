//! Type definitions for the reasoning-service boundary.
//!
//! These types are the single request/response contract with the external
//! multimodal service. Everything inside the crate consumes the canonical
//! `Verdict`; endpoint-specific shapes are adapted in `client`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::overlay::NormalizedBox;

/// Outcome of one analysis call: the scene matches the reference, or it drifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Match,
    Drift,
}

/// Severity of a detected drift. Meaningful only when status is DRIFT;
/// convention is LOW on MATCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

/// Structured result of one reasoning-service call.
///
/// Ephemeral: consumed immediately to drive the overlay, append an audit entry
/// on drift, and feed the timeline controller's advance decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub severity: Severity,
    /// Anomaly geometry in canonical 0-1000 space; `None` when absent or malformed
    pub anomaly_box: Option<NormalizedBox>,
    /// Corrective or confirmatory text, already localized by the service
    pub message: String,
}

/// Reference material a session is supervised against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceMaterial {
    /// A reference image or golden frame, base64-encoded JPEG/PNG
    Image { base64: String },
    /// Extracted document text (e.g. from a procedure PDF)
    Document { text: String },
    /// A free-text procedure description
    Text { text: String },
}

/// One analysis request sent to the reasoning service.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Current camera frame, base64-encoded JPEG
    pub frame_base64: String,
    /// Reference material for comparison, if any is loaded
    pub reference: Option<ReferenceMaterial>,
    /// Instruction text for the active procedure step
    pub instruction: String,
    /// Language tag for localized responses
    pub language: String,
    /// Regions flagged as dangerous, passed as context
    pub hazard_zones: Vec<NormalizedBox>,
}

/// Which raw box ordering an endpoint variant returns.
///
/// Exactly one adapter call converts to the canonical representation; two box
/// conventions never coexist past the client boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxOrder {
    /// `[x, y, width, height]`, top-left origin
    TopLeftXywh,
    /// `[ymin, xmin, ymax, xmax]`
    CornersYxyx,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_serialize_uppercase() {
        let verdict = Verdict {
            status: VerdictStatus::Drift,
            severity: Severity::Critical,
            anomaly_box: NormalizedBox::from_xywh(&[100.0, 200.0, 300.0, 400.0]),
            message: "Wrong polarity".to_string(),
        };

        let json = serde_json::to_string(&verdict).unwrap();
        assert!(json.contains("\"DRIFT\""));
        assert!(json.contains("\"CRITICAL\""));
        assert!(json.contains("Wrong polarity"));
    }

    #[test]
    fn test_verdict_deserialize() {
        let json = r#"{
            "status": "MATCH",
            "severity": "LOW",
            "anomaly_box": null,
            "message": "Step looks correct"
        }"#;

        let verdict: Verdict = serde_json::from_str(json).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Match);
        assert_eq!(verdict.severity, Severity::Low);
        assert!(verdict.anomaly_box.is_none());
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Low.to_string(), "LOW");
        assert_eq!(Severity::Medium.to_string(), "MEDIUM");
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
    }

    #[test]
    fn test_reference_material_tagged_serialization() {
        let reference = ReferenceMaterial::Document {
            text: "Step 1: unplug the unit".to_string(),
        };
        let json = serde_json::to_string(&reference).unwrap();
        assert!(json.contains("\"kind\":\"document\""));
    }
}
