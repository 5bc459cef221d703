//! Error types for snapshot analysis.
//!
//! Only two variants ever reach callers: [`SceneError::Input`] (bad image
//! reference, raised before any stage runs) and
//! [`SceneError::InferenceFailure`] (the service answered but the call could
//! not complete). Everything else is absorbed inside the pipeline and
//! degrades to a neutral value.

use thiserror::Error;

use crate::inference::TransportError;

#[derive(Error, Debug)]
pub enum SceneError {
    /// Missing or unreadable input image. Aborts the pair before any stage runs.
    #[error("input image unavailable: {path}: {reason}")]
    Input { path: String, reason: String },

    /// A deterministic stage failed internally. Absorbed at the stage and
    /// replaced by the neutral score.
    #[error("degraded signal in {stage} stage: {reason}")]
    DegradedSignal { stage: &'static str, reason: String },

    /// Inference service unreachable or timed out. Absorbed by the gateway
    /// and replaced by the fixed neutral result.
    #[error("inference service unavailable: {0}")]
    InferenceUnavailable(String),

    /// Inference service reachable but the call failed. Propagates for the
    /// affected pair only.
    #[error("inference call failed: {0}")]
    InferenceFailure(String),

    /// Response body was not valid structured output. Recovered through the
    /// keyword fallback parser.
    #[error("unparseable inference response: {0}")]
    ParseFailure(String),
}

impl From<TransportError> for SceneError {
    /// Unreachable-service failures map to the absorbable variant; anything
    /// else fails the pair.
    fn from(e: TransportError) -> Self {
        if e.is_unavailable() {
            SceneError::InferenceUnavailable(e.to_string())
        } else {
            SceneError::InferenceFailure(e.to_string())
        }
    }
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, SceneError>;
