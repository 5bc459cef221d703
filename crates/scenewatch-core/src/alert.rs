//! Alert-level decision rules and remediation detail synthesis.
//!
//! Maps a fused similarity score and difference list to the terminal
//! [`AlertLevel`] for a pair, then synthesizes the [`AlertDetail`] a
//! responder sees: severity and risk banded by similarity, a category from
//! an ordered keyword taxonomy, impact text, and deduplicated follow-up
//! recommendations. Evaluated fresh on every call; the engine keeps no
//! state between pairs.

use std::collections::HashSet;

use crate::config::CLEAN_PAIR_BAR;
use crate::report::{AlertDetail, AlertLevel, Difference, Severity};

/// Confidence a difference needs before its type can drive the level.
const DECISIVE_CONFIDENCE: f64 = 0.8;

/// Confidence a difference needs to be quoted in warning descriptions.
const NOTABLE_CONFIDENCE: f64 = 0.7;

/// Difference types that force the error level on their own.
const ERROR_KINDS: [&str; 4] = ["error", "failure", "danger", "person_detected"];

/// Difference types that raise a warning candidate.
const WARNING_KINDS: [&str; 3] = ["warning", "change", "feature_change"];

// ---------------------------------------------------------------------------
// Level decision
// ---------------------------------------------------------------------------

/// Map the fused score and difference list to an alert level.
///
/// Rules in priority order:
/// 1. Fused similarity below the threshold is an error, whatever the
///    differences say.
/// 2. A confident difference of an error-tier type is immediately decisive;
///    a warning-tier type only raises a candidate, and the scan continues
///    over the remaining differences in case an error-tier match follows.
/// 3. A near-identical pair with no differences is info.
/// 4. Any remaining difference, however weak, is worth a warning.
/// 5. Otherwise info.
pub fn decide_level(similarity: f64, differences: &[Difference], threshold: f64) -> AlertLevel {
    if similarity < threshold {
        return AlertLevel::Error;
    }

    let mut warning_candidate = false;
    for diff in differences {
        if diff.confidence <= DECISIVE_CONFIDENCE {
            continue;
        }
        if ERROR_KINDS.contains(&diff.kind.as_str()) {
            return AlertLevel::Error;
        }
        if WARNING_KINDS.contains(&diff.kind.as_str()) {
            warning_candidate = true;
        }
    }
    if warning_candidate {
        return AlertLevel::Warning;
    }

    if similarity > CLEAN_PAIR_BAR && differences.is_empty() {
        return AlertLevel::Info;
    }
    if !differences.is_empty() {
        return AlertLevel::Warning;
    }

    AlertLevel::Info
}

// ---------------------------------------------------------------------------
// Category taxonomy
// ---------------------------------------------------------------------------

/// Ordered category table. For each difference, the type tag is scanned
/// against the keyword sets in priority order; the first hit wins.
const CATEGORY_RULES: [(&str, &[&str]); 5] = [
    (
        "equipment",
        &["device", "machine", "equipment", "hardware", "component"],
    ),
    ("safety", &["safety", "danger", "hazard", "fire", "smoke", "leak"]),
    (
        "environment",
        &["environment", "lighting", "temperature", "humidity", "noise"],
    ),
    (
        "system",
        &["system", "software", "network", "connection", "status"],
    ),
    ("security", &["person", "intruder", "motion", "movement"]),
];

const DEFAULT_CATEGORY: &str = "system";

fn categorize(differences: &[Difference]) -> String {
    for diff in differences {
        let kind = diff.kind.to_lowercase();
        for (category, keywords) in &CATEGORY_RULES {
            if keywords.iter().any(|k| kind.contains(k)) {
                return (*category).to_string();
            }
        }
    }
    DEFAULT_CATEGORY.to_string()
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// Verification steps for an error verdict on a near-identical pair.
const ERROR_VERIFY_STEPS: [&str; 4] = [
    "check whether anyone has entered the monitored area",
    "confirm the equipment is operating normally",
    "log the detected activity",
    "contact the responsible operator for confirmation if needed",
];

/// Escalation steps for an error verdict with substantial change.
const ERROR_URGENT_STEPS: [&str; 4] = [
    "stop the affected equipment immediately",
    "check equipment status and connections",
    "contact technical support",
    "prepare an emergency response plan",
];

const WARNING_STEPS: [&str; 4] = [
    "check the equipment operating status",
    "monitor the related parameters for further change",
    "prepare a maintenance plan",
    "log the anomaly for follow-up",
];

/// Per-difference follow-up checks, scanned in order against the type tag;
/// the first keyword hit on a difference wins.
const TRIGGER_RULES: [(&str, &str); 5] = [
    ("person", "check the security monitoring system"),
    ("temperature", "check the temperature control system"),
    ("pressure", "check the pressure sensors and piping"),
    ("light", "check the lighting system and power supply"),
    ("motion", "check the equipment operating status"),
];

fn recommend(level: AlertLevel, differences: &[Difference], similarity: f64) -> Vec<String> {
    let high_similarity = similarity > 0.95 && differences.len() <= 2;

    let base: &[&str] = match level {
        AlertLevel::Error if high_similarity => &ERROR_VERIFY_STEPS,
        AlertLevel::Error => &ERROR_URGENT_STEPS,
        AlertLevel::Warning => &WARNING_STEPS,
        AlertLevel::Info => &[],
    };
    let mut recommendations: Vec<String> = base.iter().map(|s| (*s).to_string()).collect();

    // Triggers key off the type tag alone; descriptions are free text and
    // must not steer the step selection.
    for diff in differences {
        let kind = diff.kind.to_lowercase();
        for (keyword, step) in &TRIGGER_RULES {
            if kind.contains(keyword) {
                if *keyword == "person" && high_similarity {
                    recommendations
                        .push("verify the security monitoring system is working correctly".to_string());
                } else {
                    recommendations.push((*step).to_string());
                }
                break;
            }
        }
    }

    // Set semantics: drop duplicates, keep first occurrence.
    let mut seen = HashSet::new();
    recommendations.retain(|r| seen.insert(r.clone()));
    recommendations
}

// ---------------------------------------------------------------------------
// Descriptions and impact
// ---------------------------------------------------------------------------

fn error_description(differences: &[Difference], similarity: f64) -> String {
    if similarity < 0.3 {
        return format!(
            "Major anomaly detected: similarity is only {:.1}%. Possible serious equipment fault, safety issue, or system failure.",
            similarity * 100.0
        );
    }
    if similarity < 0.5 {
        return format!(
            "Significant anomaly detected: similarity is {:.1}%. Clear equipment state change or potential risk.",
            similarity * 100.0
        );
    }

    let leading: Vec<&str> = differences
        .iter()
        .filter(|d| d.confidence > DECISIVE_CONFIDENCE)
        .map(|d| d.description.as_str())
        .take(3)
        .collect();
    if leading.is_empty() {
        format!(
            "Anomalous change detected: similarity is {:.1}%. Further inspection is needed to isolate the cause.",
            similarity * 100.0
        )
    } else if similarity > 0.95 {
        format!(
            "Minor changes detected: similarity is {:.1}%. Leading changes: {}.",
            similarity * 100.0,
            leading.join(", ")
        )
    } else {
        format!(
            "Anomalous changes detected: similarity is {:.1}%. Leading changes: {}.",
            similarity * 100.0,
            leading.join(", ")
        )
    }
}

fn warning_description(differences: &[Difference], similarity: f64) -> String {
    let leading: Vec<&str> = differences
        .iter()
        .filter(|d| d.confidence > NOTABLE_CONFIDENCE)
        .map(|d| d.description.as_str())
        .take(2)
        .collect();
    if leading.is_empty() {
        format!(
            "Minor change detected: similarity is {:.1}%. Recommend monitoring for further drift.",
            similarity * 100.0
        )
    } else {
        format!(
            "Potential issue detected: similarity is {:.1}%. Leading changes: {}.",
            similarity * 100.0,
            leading.join(", ")
        )
    }
}

/// Impact is banded purely by similarity, independent of the alert tier.
fn assess_impact(similarity: f64) -> String {
    let text = if similarity < 0.3 {
        "Severe impact: whole-system operation may be affected and a safety risk is present"
    } else if similarity < 0.5 {
        "Major impact: critical equipment function may be affected, immediate handling required"
    } else if similarity < 0.7 {
        "Moderate impact: some functions may be affected, attention required"
    } else if similarity > 0.95 {
        "Minimal impact: the change is very small and barely affects operation, monitoring suggested"
    } else {
        "Minor impact: little effect on overall operation, monitoring suggested"
    };
    text.to_string()
}

// ---------------------------------------------------------------------------
// Detail and summary synthesis
// ---------------------------------------------------------------------------

/// Build the remediation detail for a non-info verdict.
///
/// Error-tier severity, risk, and resolution estimate are banded by
/// similarity: a near-identical pair that still tripped an error rule gets a
/// softer footing than a pair that barely resembles itself. The warning
/// tier is fixed. Info never carries a detail.
pub fn synthesize_detail(
    level: AlertLevel,
    differences: &[Difference],
    similarity: f64,
) -> Option<AlertDetail> {
    let (severity, risk_level, eta, description) = match level {
        AlertLevel::Info => return None,
        AlertLevel::Error => {
            let (severity, risk, eta) = if similarity > 0.95 {
                (Severity::Medium, Severity::Medium, "1-2 hours")
            } else if similarity < 0.5 {
                (Severity::Critical, Severity::Critical, "immediate")
            } else {
                (Severity::High, Severity::High, "2-4 hours")
            };
            (severity, risk, eta, error_description(differences, similarity))
        }
        AlertLevel::Warning => (
            Severity::Medium,
            Severity::Medium,
            "4-8 hours",
            warning_description(differences, similarity),
        ),
    };

    Some(AlertDetail {
        severity,
        category: categorize(differences),
        description,
        impact: assess_impact(similarity),
        recommendations: recommend(level, differences, similarity),
        risk_level,
        estimated_resolution_time: Some(eta.to_string()),
    })
}

/// One templated sentence per tier embedding the similarity percentage and
/// the difference count.
pub fn summarize(level: AlertLevel, differences: &[Difference], similarity: f64) -> String {
    match level {
        AlertLevel::Error => format!(
            "Severe anomaly detected: similarity {:.1}%, {} significant differences found, immediate handling required.",
            similarity * 100.0,
            differences.len()
        ),
        AlertLevel::Warning => format!(
            "Potential issue detected: similarity {:.1}%, {} changes found, attention recommended.",
            similarity * 100.0,
            differences.len()
        ),
        AlertLevel::Info => format!(
            "Differences are within the normal range: similarity {:.1}%, scene is consistent.",
            similarity * 100.0
        ),
    }
}
