//! Pipeline orchestration: the analysis stages wired end to end.
//!
//! A [`ScenePipeline`] holds only the inference gateway and the analysis
//! options, so one instance can serve any number of pairs and independent
//! analyses can run concurrently without locking.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AnalysisOptions;
use crate::error::Result;
use crate::features::compare_features;
use crate::image_io::ImageHandle;
use crate::inference::{InferenceGateway, InferenceTransport, TransportResult};
use crate::pixel::pixel_similarity;
use crate::report::{AnalysisReport, BatchItemReport};
use crate::{alert, integrator, verifier};

/// One entry in a batch manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePair {
    /// Caller-supplied id echoed in the batch report; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Baseline snapshot
    pub first: PathBuf,

    /// Current snapshot
    pub second: PathBuf,
}

/// Sequences the analysis stages for snapshot pairs.
pub struct ScenePipeline {
    gateway: InferenceGateway,
    options: AnalysisOptions,
}

impl ScenePipeline {
    pub fn new(transport: Arc<dyn InferenceTransport>, options: AnalysisOptions) -> Self {
        ScenePipeline {
            gateway: InferenceGateway::new(transport),
            options,
        }
    }

    /// Load two images from disk and analyze them.
    ///
    /// A missing or unreadable file aborts before any stage runs.
    pub async fn analyze_images(&self, first: &Path, second: &Path) -> Result<AnalysisReport> {
        let first = ImageHandle::load(first)?;
        let second = ImageHandle::load(second)?;
        self.analyze_pair(&first, &second).await
    }

    /// Run the full stage sequence over an already-loaded pair.
    pub async fn analyze_pair(
        &self,
        first: &ImageHandle,
        second: &ImageHandle,
    ) -> Result<AnalysisReport> {
        let start = Instant::now();
        info!(first = %first.source(), second = %second.source(), "starting analysis");

        let pixel = pixel_similarity(first, second);
        debug!(pixel_similarity = pixel, "pixel stage complete");

        let features = compare_features(first, second);
        debug!(
            feature_similarity = features.similarity,
            "feature stage complete"
        );

        let content = self.gateway.analyze(first, second, pixel).await?;
        debug!(
            content_similarity = content.similarity,
            differences = content.differences.len(),
            "content stage complete"
        );

        let content = verifier::reverify(&self.gateway, first, second, content).await;

        let fused = integrator::integrate(pixel, &features, &content, self.options.alert_threshold);

        let alert_detail =
            alert::synthesize_detail(fused.alert_level, &fused.differences, fused.similarity_score);
        let summary =
            alert::summarize(fused.alert_level, &fused.differences, fused.similarity_score);

        let processing_time = start.elapsed().as_secs_f64();
        info!(
            similarity = fused.similarity_score,
            alert_level = %fused.alert_level,
            differences = fused.differences.len(),
            elapsed_s = processing_time,
            "analysis complete"
        );

        Ok(AnalysisReport {
            similarity_score: fused.similarity_score,
            differences: fused.differences,
            alert_level: fused.alert_level,
            alert_detail,
            summary,
            processing_time,
            analysis_time: Utc::now(),
        })
    }

    /// Analyze a manifest of pairs with per-item failure isolation.
    ///
    /// Exactly one output record per input pair, in input order. An item
    /// that fails (missing file, failed inference call) is recorded as an
    /// error entry and the batch moves on.
    pub async fn analyze_batch(&self, pairs: &[ImagePair]) -> Vec<BatchItemReport> {
        let mut reports = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let id = pair
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            match self.analyze_images(&pair.first, &pair.second).await {
                Ok(report) => reports.push(BatchItemReport::success(id, report)),
                Err(e) => {
                    warn!(id = %id, error = %e, "batch item failed, continuing");
                    reports.push(BatchItemReport::failure(id, e.to_string()));
                }
            }
        }
        reports
    }

    /// Probe the inference service: healthy iff the configured model is
    /// listed by the service.
    pub async fn check_connection(&self) -> TransportResult<bool> {
        self.gateway.check_connection().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeTransport;

    #[test]
    fn test_manifest_entry_id_is_optional() {
        let entries: Vec<ImagePair> = serde_json::from_str(
            r#"[
                {"id": "dock-cam", "first": "/imgs/a.png", "second": "/imgs/b.png"},
                {"first": "/imgs/c.png", "second": "/imgs/d.png"}
            ]"#,
        )
        .unwrap();
        assert_eq!(entries[0].id.as_deref(), Some("dock-cam"));
        assert!(entries[1].id.is_none());
        assert_eq!(entries[1].first, PathBuf::from("/imgs/c.png"));
    }

    #[tokio::test]
    async fn test_check_connection_reflects_model_availability() {
        let healthy = ScenePipeline::new(Arc::new(FakeTransport::new()), AnalysisOptions::default());
        assert!(healthy.check_connection().await.unwrap());

        let degraded = ScenePipeline::new(
            Arc::new(FakeTransport::unavailable()),
            AnalysisOptions::default(),
        );
        assert!(
            !degraded.check_connection().await.unwrap(),
            "missing model must report as unavailable"
        );
    }

    #[tokio::test]
    async fn test_batch_generates_ids_and_isolates_load_failures() {
        let transport = Arc::new(FakeTransport::new());
        let pipeline = ScenePipeline::new(transport.clone(), AnalysisOptions::default());

        let pairs = vec![ImagePair {
            id: None,
            first: PathBuf::from("/nonexistent/a.png"),
            second: PathBuf::from("/nonexistent/b.png"),
        }];
        let reports = pipeline.analyze_batch(&pairs).await;

        assert_eq!(reports.len(), 1);
        assert!(!reports[0].id.is_empty());
        assert!(!reports[0].succeeded());
        // Loading failed before any stage, so the transport was never hit.
        assert_eq!(transport.call_count(), 0);
    }
}
