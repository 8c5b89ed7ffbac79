//! Instruction text sent to the image-generation model

use serde_json::Value;

/// Build the aging instruction for `context` over `horizon_years`.
///
/// The context is embedded verbatim (pretty-printed); nothing in it is
/// interpreted here.
pub fn build_instruction(context: &Value, horizon_years: u32) -> String {
    let context_json =
        serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
    let unit = if horizon_years == 1 { "year" } else { "years" };

    format!(
        "Transform this photo to show how this person would realistically look in \
         {horizon_years} {unit}, based on the following health profile and lifestyle \
         recommendations:\n\n{context_json}\n\n\
         Keep the person clearly recognizable. Reflect the projected effects of their \
         habits on skin, weight, posture and overall vitality. Produce a photorealistic \
         portrait with the same framing and background."
    )
}
