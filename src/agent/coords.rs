//! Coordinate normalization
//!
//! The model emits pointer coordinates either on a 0-1000 normalized scale or
//! in raw viewport pixels, depending on prompt version. Values at or below
//! 1000 are treated as normalized; values above 1000 are treated as pixels.
//! The 1000 threshold is the disambiguation rule and must be preserved
//! exactly: the fixed viewport exceeds 1000px on its long axis, so genuine
//! pixel coordinates past the threshold stay distinguishable.

use serde_json::Value;

use crate::core::{Result, WebpilotError};

/// Convert a model-supplied coordinate into a viewport pixel coordinate,
/// clamped to `[0, axis_max]`.
pub fn normalize(value: f64, axis_max: u32) -> Result<u32> {
    if !value.is_finite() {
        return Err(WebpilotError::InvalidCoordinate(format!(
            "coordinate value is not finite: {}",
            value
        )));
    }

    let max = axis_max as f64;

    let pixel = if value <= 1000.0 {
        let ratio = value.clamp(0.0, 1000.0) / 1000.0;
        (ratio * max).round()
    } else {
        value.clamp(0.0, max).round()
    };

    Ok(pixel as u32)
}

/// Coerce a JSON argument into a number.
///
/// Accepts JSON numbers and numeric strings; anything else fails with
/// `InvalidCoordinate` so the executor can report it back to the model.
pub fn coerce_number(value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            WebpilotError::InvalidCoordinate(format!("not representable as f64: {}", n))
        }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            WebpilotError::InvalidCoordinate(format!("expected numeric value, got '{}'", s))
        }),
        other => Err(WebpilotError::InvalidCoordinate(format!(
            "expected numeric value, got {}",
            other
        ))),
    }
}
