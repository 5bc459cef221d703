//! Gateway to the external multimodal inference service.
//!
//! Submits both snapshots with a structured prompt over an Ollama-compatible
//! transport and normalizes whatever comes back: markdown fences are
//! stripped, JSON is decoded leniently, and unparseable bodies fall through
//! to a keyword scan. The service is trusted only for *differences*; its
//! own similarity estimate is always replaced by the locally computed pixel
//! score. An unreachable service never fails a pair; it yields a fixed
//! neutral result instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{
    InferenceConfig, MIN_CONSISTENT_CONFIDENCE, MOCK_SIMILARITY, NEAR_IDENTITY_SKIP,
    SELF_CONSISTENCY_BAR,
};
use crate::error::{Result, SceneError};
use crate::image_io::ImageHandle;
use crate::report::{AlertLevel, Difference, StageResult};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Unreachable-service errors degrade to the neutral mock result; the
    /// remaining variants fail the pair.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Connection(_))
    }
}

/// Raw round-trip to the inference service.
///
/// Implementations carry their own endpoint and model configuration;
/// callers supply only the prompt and the base64-encoded images.
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// Submit one prompt plus encoded images, returning the response text.
    async fn generate(&self, prompt: &str, images: &[String]) -> TransportResult<String>;

    /// Whether the service is reachable and the configured model is loaded.
    async fn check_available(&self) -> TransportResult<bool>;
}

// ---------------------------------------------------------------------------
// Ollama transport
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: &'a [String],
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

/// HTTP transport for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaTransport {
    config: InferenceConfig,
    client: reqwest::Client,
}

impl OllamaTransport {
    pub fn new(config: InferenceConfig) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("scenewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(OllamaTransport { config, client })
    }

    /// Create a transport from environment variables.
    pub fn from_env() -> TransportResult<Self> {
        Self::new(InferenceConfig::from_env())
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn classify(error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_connect() {
            TransportError::Connection(error.to_string())
        } else {
            TransportError::Request(error.to_string())
        }
    }
}

#[async_trait]
impl InferenceTransport for OllamaTransport {
    async fn generate(&self, prompt: &str, images: &[String]) -> TransportResult<String> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            images,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                max_tokens: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint("/api/generate"))
            .json(&body)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(Self::classify)?;
        Ok(parsed.response)
    }

    async fn check_available(&self) -> TransportResult<bool> {
        let response = self
            .client
            .get(self.endpoint("/api/tags"))
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = response.json().await.map_err(Self::classify)?;
        Ok(tags.models.iter().any(|m| m.name == self.config.model))
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Structured prompt biased toward high recall: the probed categories are
/// spelled out so the model does not stop at the first obvious change.
pub(crate) const ANALYSIS_PROMPT: &str = r#"Compare these two monitoring snapshots of the same scene and report every difference you can find.

Examine each of these categories carefully:
1. People: anyone appearing, disappearing, or changing position
2. Objects: items added, removed, or moved
3. Device state: screens, indicator lights, dials, switches
4. Lighting and background: illumination or environment shifts
5. Fine detail: small changes that are easy to miss

Respond with a single JSON object in exactly this shape:
{
  "similarity_score": <float between 0.0 and 1.0>,
  "differences": [
    {
      "type": "<short category tag>",
      "description": "<what changed>",
      "confidence": <float between 0.0 and 1.0>,
      "bbox": [x, y, width, height] or null,
      "severity": "low" | "medium" | "high" or null
    }
  ],
  "alert_level": "info" | "warning" | "error",
  "summary": "<one sentence>"
}

Return only the JSON object with no extra text."#;

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Content-analysis stage over an injected transport.
pub struct InferenceGateway {
    transport: Arc<dyn InferenceTransport>,
}

impl InferenceGateway {
    pub fn new(transport: Arc<dyn InferenceTransport>) -> Self {
        InferenceGateway { transport }
    }

    /// Analyze one pair for semantic differences.
    ///
    /// `pixel_similarity` is the locally computed pixel score for the same
    /// pair: it gates the near-identity shortcut and replaces the service's
    /// own similarity estimate in the returned result.
    ///
    /// Timeouts and connection failures are absorbed into the neutral mock
    /// result; any other transport failure is returned as an error for this
    /// pair.
    pub async fn analyze(
        &self,
        first: &ImageHandle,
        second: &ImageHandle,
        pixel_similarity: f64,
    ) -> Result<StageResult> {
        if pixel_similarity > NEAR_IDENTITY_SKIP {
            debug!(
                similarity = pixel_similarity,
                "near-identical pair, skipping inference call"
            );
            return Ok(identity_result(pixel_similarity));
        }

        match self.query(ANALYSIS_PROMPT, first, second).await {
            Ok(text) => Ok(normalize_response(&text, pixel_similarity)),
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, "inference service unavailable, substituting neutral result");
                Ok(mock_result())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One raw round-trip with a caller-supplied prompt. No fallback applied.
    pub(crate) async fn query(
        &self,
        prompt: &str,
        first: &ImageHandle,
        second: &ImageHandle,
    ) -> TransportResult<String> {
        let images = [
            BASE64.encode(first.as_bytes()),
            BASE64.encode(second.as_bytes()),
        ];
        self.transport.generate(prompt, &images).await
    }

    /// Whether the service is reachable and the configured model is loaded.
    pub async fn check_connection(&self) -> TransportResult<bool> {
        self.transport.check_available().await
    }
}

// ---------------------------------------------------------------------------
// Response normalization
// ---------------------------------------------------------------------------

/// Lenient wire shape of a structured analysis response. The reported
/// `similarity_score` is decoded but always discarded downstream.
#[derive(Debug, Deserialize)]
pub(crate) struct RawAnalysis {
    #[serde(default)]
    #[allow(dead_code)]
    pub similarity_score: Option<f64>,
    #[serde(default)]
    pub differences: Vec<Difference>,
    #[serde(default)]
    pub alert_level: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Strip leading/trailing markdown code fences from a response body.
pub(crate) fn strip_fences(text: &str) -> &str {
    let mut trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        trimmed = rest;
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        trimmed = rest;
    }
    if let Some(rest) = trimmed.strip_suffix("```") {
        trimmed = rest;
    }
    trimmed.trim()
}

/// Parse a response body as structured JSON after fence stripping.
pub(crate) fn parse_structured(text: &str) -> Result<RawAnalysis> {
    serde_json::from_str(strip_fences(text)).map_err(|e| SceneError::ParseFailure(e.to_string()))
}

fn normalize_response(text: &str, pixel_similarity: f64) -> StageResult {
    let mut result = match parse_structured(text) {
        Ok(raw) => StageResult {
            similarity: pixel_similarity,
            differences: raw.differences,
            alert_level: AlertLevel::from_label(raw.alert_level.as_deref()),
            summary: raw
                .summary
                .unwrap_or_else(|| "content analysis completed".to_string()),
            raw: Some(text.to_string()),
        },
        Err(e) => {
            debug!(error = %e, "structured parse failed, falling back to keyword scan");
            keyword_fallback(text, pixel_similarity)
        }
    };
    apply_consistency_guard(&mut result, pixel_similarity);
    result
}

const ERROR_KEYWORDS: [&str; 6] = ["error", "failure", "fault", "anomaly", "danger", "hazard"];
const WARNING_KEYWORDS: [&str; 5] = ["warning", "caution", "change", "changed", "drift"];

/// Last-resort classifier for free-text responses: the level comes from a
/// keyword scan and the difference list stays empty.
fn keyword_fallback(text: &str, pixel_similarity: f64) -> StageResult {
    let lowered = text.to_lowercase();
    let alert_level = if ERROR_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        AlertLevel::Error
    } else if WARNING_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        AlertLevel::Warning
    } else {
        AlertLevel::Info
    };
    StageResult {
        similarity: pixel_similarity,
        differences: Vec::new(),
        alert_level,
        summary: truncate_chars(text.trim(), 200),
        raw: Some(text.to_string()),
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// On a near-identical pair, reported differences are suspect: keep only
/// the confident ones, and collapse to info when none survive.
fn apply_consistency_guard(result: &mut StageResult, pixel_similarity: f64) {
    if pixel_similarity <= SELF_CONSISTENCY_BAR || result.differences.is_empty() {
        return;
    }
    let before = result.differences.len();
    result
        .differences
        .retain(|d| d.confidence > MIN_CONSISTENT_CONFIDENCE);
    let dropped = before - result.differences.len();
    if dropped > 0 {
        debug!(dropped, "filtered low-confidence differences on near-identical pair");
    }
    if result.differences.is_empty() {
        result.alert_level = AlertLevel::Info;
        result.summary = "high similarity with no significant differences".to_string();
    }
}

fn identity_result(similarity: f64) -> StageResult {
    StageResult {
        similarity,
        differences: Vec::new(),
        alert_level: AlertLevel::Info,
        summary: "images are effectively identical, no change detected".to_string(),
        raw: None,
    }
}

/// Fixed substitute when the service is unreachable. The similarity is
/// deliberately optimistic so a flaky service does not page anyone.
fn mock_result() -> StageResult {
    StageResult {
        similarity: MOCK_SIMILARITY,
        differences: Vec::new(),
        alert_level: AlertLevel::Info,
        summary: "inference service unavailable, assuming no significant change".to_string(),
        raw: None,
    }
}
