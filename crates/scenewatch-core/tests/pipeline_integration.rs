//! End-to-end pipeline tests over on-disk fixtures and a scripted transport.

use std::path::PathBuf;
use std::sync::Arc;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use scenewatch_core::fakes::FakeTransport;
use scenewatch_core::{
    AlertLevel, AnalysisOptions, ImagePair, ScenePipeline, Severity, TransportError,
};

fn write_png(dir: &TempDir, name: &str, color: [u8; 3]) -> PathBuf {
    let path = dir.path().join(name);
    let img = RgbImage::from_pixel(32, 32, Rgb(color));
    img.save(&path).expect("failed to write fixture image");
    path
}

fn pipeline(transport: Arc<FakeTransport>) -> ScenePipeline {
    ScenePipeline::new(transport, AnalysisOptions::default())
}

/// Test: byte-identical images resolve locally with an info verdict, no
/// detail, and zero transport calls.
#[tokio::test]
async fn test_identical_pair_never_reaches_transport() {
    let dir = TempDir::new().expect("tempdir");
    let a = write_png(&dir, "a.png", [80, 120, 160]);

    let transport = Arc::new(FakeTransport::new());
    let report = pipeline(transport.clone())
        .analyze_images(&a, &a)
        .await
        .expect("analysis failed");

    assert_eq!(transport.call_count(), 0, "identical pair must not query the service");
    assert_eq!(report.similarity_score, 1.0);
    assert!(report.differences.is_empty());
    assert_eq!(report.alert_level, AlertLevel::Info);
    assert!(report.alert_detail.is_none(), "info never carries a detail");
    assert!(report.summary.contains("100.0%"));
    assert!(report.processing_time >= 0.0);
}

/// Test: a pair with nothing in common lands below the alert threshold and
/// escalates to an error with critical remediation detail.
#[tokio::test]
async fn test_gross_change_escalates_to_error() {
    let dir = TempDir::new().expect("tempdir");
    let before = write_png(&dir, "before.png", [0, 0, 0]);
    let after = write_png(&dir, "after.png", [255, 255, 255]);

    let body = r#"{
        "similarity_score": 0.1,
        "differences": [
            {"type": "device_state", "description": "control panel missing from the scene", "confidence": 0.95}
        ],
        "alert_level": "error",
        "summary": "scene replaced"
    }"#;
    let transport = Arc::new(FakeTransport::with_responses(vec![Ok(body.to_string())]));
    let report = pipeline(transport.clone())
        .analyze_images(&before, &after)
        .await
        .expect("analysis failed");

    // Pixel 0.0, feature 0.5, content 0.0 (service estimate replaced by the
    // pixel score) fuse to 0.1, well under the 0.8 default threshold.
    assert_eq!(transport.call_count(), 1, "low-similarity pair skips the verifier");
    assert!((report.similarity_score - 0.1).abs() < 1e-9);
    assert_eq!(report.alert_level, AlertLevel::Error);
    assert!(report.summary.contains("10.0%"));

    let detail = report.alert_detail.expect("error must carry a detail");
    assert_eq!(detail.severity, Severity::Critical);
    assert_eq!(detail.risk_level, Severity::Critical);
    assert_eq!(detail.estimated_resolution_time.as_deref(), Some("immediate"));
    assert_eq!(detail.category, "equipment");
    assert!(!detail.recommendations.is_empty());
}

/// Test: an unreachable service degrades to the neutral mock result instead
/// of failing the pair.
#[tokio::test]
async fn test_service_timeout_degrades_gracefully() {
    let dir = TempDir::new().expect("tempdir");
    let before = write_png(&dir, "before.png", [100, 100, 100]);
    let after = write_png(&dir, "after.png", [110, 110, 110]);

    // Down for the whole pair: the first pass times out, and the verifier
    // probe of the optimistic mock score times out too.
    let transport = Arc::new(FakeTransport::with_responses(vec![
        Err(TransportError::Timeout),
        Err(TransportError::Timeout),
    ]));
    let report = pipeline(transport.clone())
        .analyze_images(&before, &after)
        .await
        .expect("timeout must not fail the pair");

    assert_eq!(transport.call_count(), 2);
    // Pixel ~0.9985, feature ~0.9804, mock content 0.95 fuse to ~0.9706.
    assert!((report.similarity_score - 0.9706).abs() < 1e-3);
    assert!(report.differences.is_empty());
    assert_eq!(report.alert_level, AlertLevel::Info);
    assert!(report.alert_detail.is_none());
}

/// Test: the verifier's second pass refines the difference list for a
/// high-similarity pair without touching the score.
#[tokio::test]
async fn test_verifier_refines_high_similarity_pair() {
    let dir = TempDir::new().expect("tempdir");
    let before = write_png(&dir, "before.png", [100, 100, 100]);
    let after = write_png(&dir, "after.png", [110, 110, 110]);

    let first_pass = r#"{
        "similarity_score": 0.9,
        "differences": [
            {"type": "device", "description": "indicator light differs", "confidence": 0.8}
        ],
        "alert_level": "warning",
        "summary": "initial"
    }"#;
    let second_pass = r#"{
        "differences": [
            {"type": "device", "description": "status indicator switched from green to red", "confidence": 0.88}
        ],
        "summary": "one device change on re-inspection"
    }"#;
    let transport = Arc::new(FakeTransport::with_responses(vec![
        Ok(first_pass.to_string()),
        Ok(second_pass.to_string()),
    ]));
    let report = pipeline(transport.clone())
        .analyze_images(&before, &after)
        .await
        .expect("analysis failed");

    assert_eq!(transport.call_count(), 2, "high similarity triggers exactly one extra call");
    assert_eq!(report.differences.len(), 1);
    assert_eq!(
        report.differences[0].description,
        "status indicator switched from green to red"
    );
    assert_eq!(report.alert_level, AlertLevel::Warning);
    assert!(report.summary.contains("99.5%"));

    let detail = report.alert_detail.expect("warning must carry a detail");
    assert_eq!(detail.category, "equipment");
    assert_eq!(detail.severity, Severity::Medium);
}

/// Test: one broken manifest entry is recorded and the rest of the batch
/// completes, in input order.
#[tokio::test]
async fn test_batch_isolates_per_item_failures() {
    let dir = TempDir::new().expect("tempdir");
    let a = write_png(&dir, "a.png", [40, 40, 40]);
    let c = write_png(&dir, "c.png", [200, 200, 200]);
    let missing = dir.path().join("gone.png");

    let pairs = vec![
        ImagePair {
            id: Some("first".to_string()),
            first: a.clone(),
            second: a.clone(),
        },
        ImagePair {
            id: Some("second".to_string()),
            first: missing.clone(),
            second: missing.clone(),
        },
        ImagePair {
            id: Some("third".to_string()),
            first: c.clone(),
            second: c.clone(),
        },
    ];

    let transport = Arc::new(FakeTransport::new());
    let reports = pipeline(transport.clone()).analyze_batch(&pairs).await;

    assert_eq!(reports.len(), 3, "one record per input pair");
    assert_eq!(reports[0].id, "first");
    assert!(reports[0].succeeded());
    assert_eq!(reports[2].id, "third");
    assert!(reports[2].succeeded());

    assert_eq!(reports[1].id, "second");
    assert!(!reports[1].succeeded());
    let message = reports[1].error.as_deref().expect("failed item carries a message");
    assert!(
        message.contains("gone.png"),
        "error should name the missing path, got: {message}"
    );

    // Both surviving pairs were identical, so the service was never needed.
    assert_eq!(transport.call_count(), 0);
}

/// Test: a free-text response leaves no structured differences, so the
/// integrator's photometric drift check supplies one and the pair lands at
/// warning.
#[tokio::test]
async fn test_free_text_response_falls_back_and_flags_drift() {
    let dir = TempDir::new().expect("tempdir");
    let before = write_png(&dir, "before.png", [100, 100, 100]);
    let after = write_png(&dir, "after.png", [160, 160, 160]);

    let transport = Arc::new(FakeTransport::with_responses(vec![Ok(
        "The two snapshots differ noticeably around the cabinet.".to_string(),
    )]));
    let report = pipeline(transport.clone())
        .analyze_images(&before, &after)
        .await
        .expect("analysis failed");

    // First pass plus a failed verifier probe of the high fallback score.
    assert_eq!(transport.call_count(), 2);
    // Feature similarity ~0.88 with a 60-step channel delta and an empty
    // difference list triggers the synthetic drift difference.
    assert_eq!(report.differences.len(), 1);
    assert_eq!(report.differences[0].kind, "feature_change");
    assert_eq!(report.alert_level, AlertLevel::Warning);
    let detail = report.alert_detail.expect("warning must carry a detail");
    assert_eq!(detail.category, "system", "drift has no taxonomy match, falls to default");
}
