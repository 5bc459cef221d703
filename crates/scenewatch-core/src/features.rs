//! Photometric feature extraction and comparison.
//!
//! Eight coarse descriptors per image: mean and standard deviation of each
//! RGB channel, plus luminance mean (brightness) and luminance standard
//! deviation (contrast). Cheap to compute and robust to small spatial
//! shifts, they catch drift the pixel metric smears out.

use image::RgbImage;
use tracing::warn;

use crate::config::NEUTRAL_SIMILARITY;
use crate::error::Result;
use crate::image_io::ImageHandle;

/// Number of scalar features per image.
pub const FEATURE_COUNT: usize = 8;

/// Perceptual luminance weights for R, G, B.
pub const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Names of the flattened features, in [`ImageFeatures::as_array`] order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "red_mean",
    "red_std",
    "green_mean",
    "green_std",
    "blue_mean",
    "blue_std",
    "brightness",
    "contrast",
];

/// Photometric descriptors of one image, all on the 0-255 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageFeatures {
    pub channel_mean: [f64; 3],
    pub channel_std: [f64; 3],
    pub brightness: f64,
    pub contrast: f64,
}

impl ImageFeatures {
    /// Extract descriptors from a full-resolution RGB image.
    pub fn extract(image: &RgbImage) -> Self {
        let count = f64::from(image.width() * image.height());

        let mut sum = [0.0f64; 3];
        let mut sum_sq = [0.0f64; 3];
        let mut luma_sum = 0.0f64;
        let mut luma_sum_sq = 0.0f64;

        for pixel in image.pixels() {
            let mut luma = 0.0;
            for channel in 0..3 {
                let value = f64::from(pixel.0[channel]);
                sum[channel] += value;
                sum_sq[channel] += value * value;
                luma += LUMA_WEIGHTS[channel] * value;
            }
            luma_sum += luma;
            luma_sum_sq += luma * luma;
        }

        let mut channel_mean = [0.0f64; 3];
        let mut channel_std = [0.0f64; 3];
        for channel in 0..3 {
            channel_mean[channel] = sum[channel] / count;
            channel_std[channel] = population_std(sum_sq[channel], channel_mean[channel], count);
        }

        let brightness = luma_sum / count;
        let contrast = population_std(luma_sum_sq, brightness, count);

        ImageFeatures {
            channel_mean,
            channel_std,
            brightness,
            contrast,
        }
    }

    /// Flattened in [`FEATURE_NAMES`] order.
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.channel_mean[0],
            self.channel_std[0],
            self.channel_mean[1],
            self.channel_std[1],
            self.channel_mean[2],
            self.channel_std[2],
            self.brightness,
            self.contrast,
        ]
    }
}

fn population_std(sum_sq: f64, mean: f64, count: f64) -> f64 {
    // Guard against tiny negative variance from floating-point rounding.
    (sum_sq / count - mean * mean).max(0.0).sqrt()
}

/// Outcome of comparing the features of two images.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureComparison {
    /// `1 - sum(|delta|) / (255 * FEATURE_COUNT)`, clamped to `[0, 1]`
    pub similarity: f64,
    /// Absolute per-feature deltas in [`FEATURE_NAMES`] order, 0-255 scale
    pub raw_deltas: Vec<f64>,
}

impl FeatureComparison {
    /// Substitute when extraction failed; carries no usable deltas.
    pub fn neutral() -> Self {
        FeatureComparison {
            similarity: NEUTRAL_SIMILARITY,
            raw_deltas: Vec::new(),
        }
    }

    /// Largest single-feature delta, 0.0 when no deltas are available.
    pub fn max_delta(&self) -> f64 {
        self.raw_deltas.iter().copied().fold(0.0, f64::max)
    }
}

/// Compare the photometric features of two snapshots.
///
/// Same fallback policy as the pixel scorer: decode failures degrade to the
/// neutral comparison instead of aborting the pipeline.
pub fn compare_features(first: &ImageHandle, second: &ImageHandle) -> FeatureComparison {
    match try_compare_features(first, second) {
        Ok(comparison) => comparison,
        Err(e) => {
            warn!(stage = "features", error = %e, "feature comparison degraded, using neutral score");
            FeatureComparison::neutral()
        }
    }
}

fn try_compare_features(first: &ImageHandle, second: &ImageHandle) -> Result<FeatureComparison> {
    let a = ImageFeatures::extract(&first.decode_rgb()?);
    let b = ImageFeatures::extract(&second.decode_rgb()?);
    Ok(compare(&a, &b))
}

fn compare(a: &ImageFeatures, b: &ImageFeatures) -> FeatureComparison {
    let raw_deltas: Vec<f64> = a
        .as_array()
        .iter()
        .zip(b.as_array())
        .map(|(x, y)| (x - y).abs())
        .collect();
    let total: f64 = raw_deltas.iter().sum();
    let similarity = (1.0 - total / (255.0 * FEATURE_COUNT as f64)).clamp(0.0, 1.0);
    FeatureComparison {
        similarity,
        raw_deltas,
    }
}
