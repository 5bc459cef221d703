//! scenewatch core library
//!
//! Compares two monitoring snapshots through a staged pipeline of pixel
//! scoring, photometric features, multimodal content analysis, and
//! rule-based alerting, and produces a fused [`AnalysisReport`].
//!
//! Re-exports the pipeline components for programmatic access.

pub mod alert;
pub mod config;
pub mod error;
pub mod fakes;
pub mod features;
pub mod image_io;
pub mod inference;
pub mod integrator;
pub mod pipeline;
pub mod pixel;
pub mod report;
pub mod telemetry;
pub mod verifier;

pub use alert::{decide_level, summarize, synthesize_detail};

pub use config::{
    AnalysisOptions, InferenceConfig, CONTENT_WEIGHT, DEFAULT_ALERT_THRESHOLD, FEATURE_WEIGHT,
    NEAR_IDENTITY_SKIP, PIXEL_WEIGHT, REVERIFY_TRIGGER,
};

pub use error::{Result, SceneError};

pub use features::{compare_features, FeatureComparison, ImageFeatures};

pub use image_io::ImageHandle;

pub use inference::{
    InferenceGateway, InferenceTransport, OllamaTransport, TransportError, TransportResult,
};

pub use integrator::{fuse_scores, integrate};

pub use pipeline::{ImagePair, ScenePipeline};

pub use pixel::pixel_similarity;

pub use report::{
    AlertDetail, AlertLevel, AnalysisReport, BatchItemReport, BatchStatus, Difference, FusedResult,
    Severity, StageResult,
};

pub use telemetry::init_telemetry;

pub use verifier::reverify;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
