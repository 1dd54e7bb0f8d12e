//! Score scale normalization.
//!
//! Raw scores arrive on either a unit interval or a ten-point scale with no
//! explicit scale tag. The scale is inferred from magnitude alone:
//!
//! | raw value        | canonical      |
//! |------------------|----------------|
//! | unparsable/null  | fallback       |
//! | `v < 0`          | `0.0`          |
//! | `0 <= v <= 1`    | `v`            |
//! | `1 < v <= 10`    | `v / 10`       |
//! | `v > 10`         | `1.0`          |
//!
//! Every function here is total: it never fails and always lands in `[0, 1]`.

use serde_json::Value;

/// Fallback for unparsable raw scores.
pub const SCORE_FALLBACK: f64 = 0.0;

/// Fallback used when defaulting a dimension threshold.
pub const THRESHOLD_FALLBACK: f64 = 0.8;

/// Upper bound of the raw input range accepted for thresholds (ten-point scale).
pub const RAW_SCALE_MAX: f64 = 10.0;

/// Normalize a raw JSON score to the canonical `[0, 1]` domain.
pub fn normalize_score(raw: &Value) -> f64 {
    normalize_score_or(raw, SCORE_FALLBACK)
}

/// Normalize a raw JSON score, substituting `fallback` when it cannot be
/// parsed. `fallback` is clamped into `[0, 1]`.
pub fn normalize_score_or(raw: &Value, fallback: f64) -> f64 {
    match parse_raw(raw) {
        Some(v) => normalize_value(v),
        None => normalize_value(fallback),
    }
}

/// Normalize an already-numeric score.
pub fn normalize_value(v: f64) -> f64 {
    if v.is_nan() || v < 0.0 {
        0.0
    } else if v <= 1.0 {
        v
    } else if v <= RAW_SCALE_MAX {
        v / RAW_SCALE_MAX
    } else {
        1.0
    }
}

/// Parse a raw score without normalizing it. Numbers and numeric strings
/// parse; everything else (null, booleans, objects, blank or non-numeric
/// strings, NaN) does not.
pub fn parse_raw(raw: &Value) -> Option<f64> {
    let v = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (!v.is_nan()).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_points() {
        assert_eq!(normalize_score(&json!(0.5)), 0.5);
        assert_eq!(normalize_score(&json!(5)), 0.5);
        assert_eq!(normalize_score(&json!(-3)), 0.0);
        assert_eq!(normalize_score(&json!(15)), 1.0);
        assert_eq!(normalize_score(&json!("not a number")), 0.0);
        assert_eq!(normalize_score(&Value::Null), 0.0);
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(normalize_score(&json!(0)), 0.0);
        assert_eq!(normalize_score(&json!(1)), 1.0);
        assert_eq!(normalize_score(&json!(10)), 1.0);
        assert_eq!(normalize_score(&json!(10.5)), 1.0);
        assert!((normalize_score(&json!(1.5)) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_numeric_strings_parse() {
        assert_eq!(normalize_score(&json!("7")), 0.7);
        assert_eq!(normalize_score(&json!(" 0.25 ")), 0.25);
        assert_eq!(normalize_score(&json!("")), 0.0);
    }

    #[test]
    fn test_threshold_fallback() {
        assert_eq!(normalize_score_or(&Value::Null, THRESHOLD_FALLBACK), 0.8);
        assert_eq!(normalize_score_or(&json!("high"), THRESHOLD_FALLBACK), 0.8);
        assert_eq!(normalize_score_or(&json!(9), THRESHOLD_FALLBACK), 0.9);
    }

    #[test]
    fn test_non_numeric_json_is_unparsable() {
        assert_eq!(parse_raw(&json!(true)), None);
        assert_eq!(parse_raw(&json!([1])), None);
        assert_eq!(parse_raw(&json!({"v": 1})), None);
        assert_eq!(parse_raw(&json!("NaN")), None);
    }

    #[test]
    fn test_infinities_clamp() {
        assert_eq!(normalize_value(f64::INFINITY), 1.0);
        assert_eq!(normalize_value(f64::NEG_INFINITY), 0.0);
        assert_eq!(normalize_value(f64::NAN), 0.0);
    }

    #[test]
    fn test_range_and_idempotence_over_sweep() {
        let mut raw = -20.0;
        while raw <= 25.0 {
            let once = normalize_value(raw);
            assert!((0.0..=1.0).contains(&once), "{raw} -> {once}");
            assert_eq!(normalize_value(once), once, "not idempotent at {raw}");
            raw += 0.25;
        }
    }
}
