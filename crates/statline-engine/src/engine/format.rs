//! Display text for computed values.

/// Largest magnitude still shown without decimals.
const WHOLE_LIMIT: f64 = 1e10;

/// Text a cell shows for `value`: integers bare, everything else to two
/// places, `#NAN!` and `#INF!` for non-finite values.
pub fn format_number(value: f64) -> String {
    match value {
        v if v.is_nan() => "#NAN!".into(),
        v if v.is_infinite() => "#INF!".into(),
        // Goes through i64 so `-0` shows as `0`.
        v if v.fract() == 0.0 && v.abs() < WHOLE_LIMIT => (v as i64).to_string(),
        v => format!("{v:.2}"),
    }
}
