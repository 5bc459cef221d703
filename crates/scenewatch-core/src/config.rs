//! Tuning constants and runtime configuration.
//!
//! The similarity bars below are empirically tuned and intentionally
//! distinct even where their values are close: `NEAR_IDENTITY_SKIP` gates
//! the external call, `SELF_CONSISTENCY_BAR` gates the low-confidence
//! difference filter, and `CLEAN_PAIR_BAR` gates the no-change verdict.

use serde::{Deserialize, Serialize};

/// Edge length of the canonical comparison grid (pixels).
pub const CANONICAL_EDGE: u32 = 224;

/// Score substituted when a deterministic stage cannot produce a signal.
pub const NEUTRAL_SIMILARITY: f64 = 0.5;

/// Pixel similarity above which the external inference call is skipped.
pub const NEAR_IDENTITY_SKIP: f64 = 0.9995;

/// Pixel similarity above which reported differences must clear
/// [`MIN_CONSISTENT_CONFIDENCE`] to survive.
pub const SELF_CONSISTENCY_BAR: f64 = 0.99;

/// Fused similarity above which an empty difference list settles as info.
pub const CLEAN_PAIR_BAR: f64 = 0.99;

/// Minimum confidence a difference needs on a near-identical pair.
pub const MIN_CONSISTENT_CONFIDENCE: f64 = 0.7;

/// Reported similarity above which the verifier requests a second pass.
pub const REVERIFY_TRIGGER: f64 = 0.9;

/// Similarity carried by the substitute result when the service is down.
pub const MOCK_SIMILARITY: f64 = 0.95;

/// Fusion weight of the pixel signal (most sensitive to compression noise).
pub const PIXEL_WEIGHT: f64 = 0.3;

/// Fusion weight of the photometric feature signal.
pub const FEATURE_WEIGHT: f64 = 0.2;

/// Fusion weight of the inference-backed content signal.
pub const CONTENT_WEIGHT: f64 = 0.5;

/// Feature similarity below which silent photometric drift is considered.
pub const FEATURE_DRIFT_BAR: f64 = 0.95;

/// Minimum per-feature delta (0-255 scale) that counts as real drift.
pub const FEATURE_DRIFT_MIN_DELTA: f64 = 30.0;

/// Default similarity threshold below which a pair is an error.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.8;

/// Connection parameters for the inference service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Base URL of the Ollama-compatible endpoint
    pub base_url: String,
    /// Vision model to query
    pub model: String,
    /// Request timeout; on expiry the pair degrades instead of failing
    pub timeout_secs: u64,
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus sampling cutoff
    pub top_p: f64,
    /// Response token budget
    pub max_tokens: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig {
            base_url: std::env::var("SCENEWATCH_INFERENCE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string()),
            model: std::env::var("SCENEWATCH_MODEL")
                .unwrap_or_else(|_| "qwen2.5vl:7b".to_string()),
            timeout_secs: std::env::var("SCENEWATCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            temperature: 0.1,
            top_p: 0.9,
            max_tokens: 2048,
        }
    }
}

impl InferenceConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint and model
    pub fn new(base_url: &str, model: &str) -> Self {
        InferenceConfig {
            base_url: base_url.to_string(),
            model: model.to_string(),
            ..Self::default()
        }
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Per-call analysis options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Fused similarity below this value forces the error level
    pub alert_threshold: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }
}

impl AnalysisOptions {
    /// Override the alert threshold, clamped to the valid `[0, 1]` range.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.alert_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_config_default() {
        let config = InferenceConfig::default();
        assert!(!config.base_url.is_empty());
        assert!(!config.model.is_empty());
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.top_p, 0.9);
        assert_eq!(config.max_tokens, 2048);
    }

    #[test]
    fn test_inference_config_new() {
        let config = InferenceConfig::new("http://inference.example.com:11434", "llava:13b");
        assert_eq!(config.base_url, "http://inference.example.com:11434");
        assert_eq!(config.model, "llava:13b");
    }

    #[test]
    fn test_inference_config_with_timeout() {
        let config = InferenceConfig::default().with_timeout(30);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_analysis_options_default_threshold() {
        let options = AnalysisOptions::default();
        assert_eq!(options.alert_threshold, DEFAULT_ALERT_THRESHOLD);
    }

    #[test]
    fn test_analysis_options_threshold_clamped() {
        assert_eq!(AnalysisOptions::default().with_threshold(1.5).alert_threshold, 1.0);
        assert_eq!(AnalysisOptions::default().with_threshold(-0.2).alert_threshold, 0.0);
        assert_eq!(AnalysisOptions::default().with_threshold(0.6).alert_threshold, 0.6);
    }
}
