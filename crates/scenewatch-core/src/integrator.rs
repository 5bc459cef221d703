//! Fusion of the three per-stage signals into one verdict.

use tracing::debug;

use crate::alert;
use crate::config::{
    CONTENT_WEIGHT, FEATURE_DRIFT_BAR, FEATURE_DRIFT_MIN_DELTA, FEATURE_WEIGHT, PIXEL_WEIGHT,
};
use crate::features::FeatureComparison;
use crate::report::{Difference, FusedResult, StageResult};

/// Weighted combination of the pixel, feature, and content scores.
pub fn fuse_scores(pixel: f64, feature: f64, content: f64) -> f64 {
    (PIXEL_WEIGHT * pixel + FEATURE_WEIGHT * feature + CONTENT_WEIGHT * content).clamp(0.0, 1.0)
}

/// Combine the stage outputs into the final score, difference list, and
/// alert level for one pair.
pub fn integrate(
    pixel_similarity: f64,
    features: &FeatureComparison,
    content: &StageResult,
    alert_threshold: f64,
) -> FusedResult {
    let similarity_score = fuse_scores(pixel_similarity, features.similarity, content.similarity);

    let mut differences = content.differences.clone();
    if let Some(drift) = synthesize_feature_drift(features, &differences) {
        differences.push(drift);
    }

    let alert_level = alert::decide_level(similarity_score, &differences, alert_threshold);

    FusedResult {
        similarity_score,
        differences,
        alert_level,
    }
}

/// Photometric drift that the content stage missed gets its own synthetic
/// difference, but only when the drift is both relatively and absolutely
/// large enough to matter.
fn synthesize_feature_drift(
    features: &FeatureComparison,
    differences: &[Difference],
) -> Option<Difference> {
    if features.similarity >= FEATURE_DRIFT_BAR
        || !differences.is_empty()
        || features.max_delta() <= FEATURE_DRIFT_MIN_DELTA
    {
        return None;
    }
    debug!(
        feature_similarity = features.similarity,
        max_delta = features.max_delta(),
        "photometric drift unreported by content stage, adding synthetic difference"
    );
    Some(Difference::new(
        "feature_change",
        "detected image feature drift",
        0.8,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::AlertLevel;

    fn content(similarity: f64, differences: Vec<Difference>) -> StageResult {
        StageResult {
            similarity,
            differences,
            alert_level: AlertLevel::Info,
            summary: "test".to_string(),
            raw: None,
        }
    }

    fn comparison(similarity: f64, max_delta: f64) -> FeatureComparison {
        FeatureComparison {
            similarity,
            raw_deltas: vec![max_delta, 1.0, 0.0],
        }
    }

    #[test]
    fn test_fuse_scores_weighting() {
        let fused = fuse_scores(0.9, 0.8, 0.7);
        assert!((fused - 0.78).abs() < 1e-12);
    }

    #[test]
    fn test_fuse_scores_clamped() {
        assert_eq!(fuse_scores(2.0, 2.0, 2.0), 1.0);
        assert_eq!(fuse_scores(-1.0, -1.0, -1.0), 0.0);
    }

    #[test]
    fn test_feature_drift_synthesized() {
        let result = integrate(0.9, &comparison(0.8, 60.0), &content(0.9, Vec::new()), 0.1);
        assert_eq!(result.differences.len(), 1);
        assert_eq!(result.differences[0].kind, "feature_change");
        assert_eq!(result.differences[0].description, "detected image feature drift");
        assert_eq!(result.differences[0].confidence, 0.8);
    }

    #[test]
    fn test_feature_drift_requires_absolute_delta() {
        let result = integrate(0.9, &comparison(0.8, 20.0), &content(0.9, Vec::new()), 0.1);
        assert!(result.differences.is_empty());
    }

    #[test]
    fn test_feature_drift_skipped_when_content_reported() {
        let reported = vec![Difference::new("change", "door opened", 0.9)];
        let result = integrate(0.9, &comparison(0.8, 60.0), &content(0.9, reported), 0.1);
        assert_eq!(result.differences.len(), 1);
        assert_eq!(result.differences[0].kind, "change");
    }

    #[test]
    fn test_feature_drift_skipped_above_bar() {
        let result = integrate(0.9, &comparison(0.97, 60.0), &content(0.9, Vec::new()), 0.1);
        assert!(result.differences.is_empty());
    }
}
