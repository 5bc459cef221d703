//! Wire-shaped records produced by the analysis pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Alert level
// ---------------------------------------------------------------------------

/// Terminal verdict for a pair. Re-evaluated fresh on every analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    /// Lenient conversion from service-reported labels. Anything
    /// unrecognized is treated as info; the final level is decided locally
    /// anyway.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
            Some("error") => AlertLevel::Error,
            Some("warning") => AlertLevel::Warning,
            _ => AlertLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity scale shared by alert severity and risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Differences
// ---------------------------------------------------------------------------

/// One reported discrepancy between the two snapshots.
///
/// Shape defaults are applied at the parse boundary: a missing `type`
/// becomes `"unknown"`, a missing `confidence` becomes 0.0, and fields the
/// service invents are dropped. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    /// Type tag, e.g. `person_detected` or `feature_change`
    #[serde(rename = "type", default = "unknown_kind")]
    pub kind: String,

    /// What changed, in the service's words
    #[serde(default)]
    pub description: String,

    /// Confidence in `[0, 1]`
    #[serde(default)]
    pub confidence: f64,

    /// Optional bounding box as `[x, y, width, height]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[i64; 4]>,

    /// Optional service-reported severity label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

fn unknown_kind() -> String {
    "unknown".to_string()
}

impl Difference {
    pub fn new(kind: impl Into<String>, description: impl Into<String>, confidence: f64) -> Self {
        Difference {
            kind: kind.into(),
            description: description.into(),
            confidence,
            bbox: None,
            severity: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Stage and fused results
// ---------------------------------------------------------------------------

/// Output of the content-analysis stage.
///
/// `similarity` always carries the locally computed pixel score; the
/// service's own estimate is discarded during normalization. `raw` keeps
/// the response body for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub similarity: f64,
    pub differences: Vec<Difference>,
    pub alert_level: AlertLevel,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// The three signals fused into one verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedResult {
    pub similarity_score: f64,
    pub differences: Vec<Difference>,
    pub alert_level: AlertLevel,
}

// ---------------------------------------------------------------------------
// Alert detail and final report
// ---------------------------------------------------------------------------

/// Remediation guidance synthesized for warning and error verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDetail {
    pub severity: Severity,
    pub category: String,
    pub description: String,
    pub impact: String,
    /// Deduplicated; ordering carries no meaning
    pub recommendations: Vec<String>,
    pub risk_level: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_resolution_time: Option<String>,
}

/// Final output for one analyzed pair.
///
/// # Invariants
///
/// `similarity_score` is clamped to `[0, 1]`. `alert_detail` is present
/// exactly when `alert_level` is not info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub similarity_score: f64,
    pub differences: Vec<Difference>,
    pub alert_level: AlertLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_detail: Option<AlertDetail>,
    pub summary: String,
    /// Wall-clock seconds spent on this pair
    pub processing_time: f64,
    /// Completion timestamp (UTC)
    pub analysis_time: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Batch records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Error,
}

/// One entry per input pair; exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemReport {
    pub id: String,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemReport {
    pub fn success(id: String, report: AnalysisReport) -> Self {
        BatchItemReport {
            id,
            status: BatchStatus::Success,
            result: Some(report),
            error: None,
        }
    }

    pub fn failure(id: String, message: String) -> Self {
        BatchItemReport {
            id,
            status: BatchStatus::Error,
            result: None,
            error: Some(message),
        }
    }

    /// Whether this item completed with a report.
    pub fn succeeded(&self) -> bool {
        self.status == BatchStatus::Success
    }
}
