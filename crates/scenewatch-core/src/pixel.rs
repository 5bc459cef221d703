//! Pixel-level similarity scoring.

use image::RgbImage;
use tracing::warn;

use crate::config::NEUTRAL_SIMILARITY;
use crate::error::Result;
use crate::image_io::ImageHandle;

/// Mean-squared-error similarity over the canonical comparison grids.
///
/// Deterministic and side-effect-free. Never aborts the pipeline: any
/// decode or resize failure yields the neutral score instead.
pub fn pixel_similarity(first: &ImageHandle, second: &ImageHandle) -> f64 {
    match try_pixel_similarity(first, second) {
        Ok(score) => score,
        Err(e) => {
            warn!(stage = "pixel", error = %e, "pixel scoring degraded, using neutral score");
            NEUTRAL_SIMILARITY
        }
    }
}

fn try_pixel_similarity(first: &ImageHandle, second: &ImageHandle) -> Result<f64> {
    let a = first.canonical_rgb()?;
    let b = second.canonical_rgb()?;
    Ok(mse_similarity(&a, &b))
}

/// `1 - MSE / 255^2`, clamped to `[0, 1]`. Inputs must share dimensions.
fn mse_similarity(a: &RgbImage, b: &RgbImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());

    let mut squared_error = 0.0f64;
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        for channel in 0..3 {
            let delta = f64::from(pa.0[channel]) - f64::from(pb.0[channel]);
            squared_error += delta * delta;
        }
    }

    let samples = f64::from(a.width() * a.height() * 3);
    let mse = squared_error / samples;
    (1.0 - mse / (255.0 * 255.0)).clamp(0.0, 1.0)
}
