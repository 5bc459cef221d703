//! Second-opinion pass for pairs the first analysis ranked as similar.
//!
//! A high similarity with a short difference list is where missed changes
//! hide, so those pairs are re-submitted once with a stricter prompt. The
//! second pass can only refine the difference list and summary; it never
//! touches the similarity score, and any failure along the way leaves the
//! first-pass result intact.

use tracing::debug;

use crate::config::{NEAR_IDENTITY_SKIP, REVERIFY_TRIGGER};
use crate::image_io::ImageHandle;
use crate::inference::{parse_structured, InferenceGateway};
use crate::report::StageResult;

const REVERIFY_PROMPT: &str = r#"These two monitoring snapshots were judged highly similar on a first pass. Re-examine them with maximum scrutiny and enumerate EVERY difference, however small.

Do not summarize groups of changes: list each one separately. Check people, objects, device state, indicator lights, text, lighting, and background, pixel region by pixel region.

Respond with a single JSON object in exactly this shape:
{
  "differences": [
    {
      "type": "<short category tag>",
      "description": "<what changed>",
      "confidence": <float between 0.0 and 1.0>,
      "bbox": [x, y, width, height] or null,
      "severity": "low" | "medium" | "high" or null
    }
  ],
  "summary": "<one sentence>"
}

Return only the JSON object with no extra text."#;

/// Run the second pass when the first pass scored above the trigger.
///
/// Returns the refined result, or the unmodified `first_pass` when the pair
/// scored at or below the trigger, above the near-identity bar, the service
/// call failed, or the second response did not parse.
pub async fn reverify(
    gateway: &InferenceGateway,
    first_image: &ImageHandle,
    second_image: &ImageHandle,
    first_pass: StageResult,
) -> StageResult {
    // Pairs above the near-identity bar never reached the service on the
    // first pass; re-querying them here would defeat the shortcut.
    if first_pass.similarity <= REVERIFY_TRIGGER || first_pass.similarity > NEAR_IDENTITY_SKIP {
        return first_pass;
    }

    debug!(
        similarity = first_pass.similarity,
        "high-similarity pair, running verification pass"
    );

    let response = match gateway.query(REVERIFY_PROMPT, first_image, second_image).await {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "verification call failed, keeping first-pass result");
            return first_pass;
        }
    };

    match parse_structured(&response) {
        Ok(detailed) => {
            let mut result = first_pass;
            result.differences = detailed.differences;
            if let Some(summary) = detailed.summary {
                result.summary = summary;
            }
            result.raw = Some(response);
            result
        }
        Err(e) => {
            debug!(error = %e, "verification response unparseable, keeping first-pass result");
            first_pass
        }
    }
}
