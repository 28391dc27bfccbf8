//! Polars `AnyValue` conversions and column access.
//!
//! Source extracts arrive as loosely typed CSV, so every accessor here
//! tolerates both native numeric cells and numeric text.

use polars::prelude::*;

/// Renders a cell as text. `Null` becomes the empty string and floats lose
/// trailing zeros.
///
/// # Examples
///
/// ```
/// use polars::prelude::AnyValue;
/// use sofa_common::any_to_string;
///
/// assert_eq!(any_to_string(AnyValue::Null), "");
/// assert_eq!(any_to_string(AnyValue::Float64(142.0)), "142");
/// assert_eq!(any_to_string(AnyValue::String("PaO2")), "PaO2");
/// ```
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Boolean(b) => b.to_string(),
        other => match any_to_i64(other.clone()) {
            Some(v) => v.to_string(),
            None => other.to_string(),
        },
    }
}

/// Like [`any_to_string`], but blank cells become `None`.
pub fn any_to_string_non_empty(value: AnyValue<'_>) -> Option<String> {
    let s = any_to_string(value);
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Formats a float without trailing zeros.
///
/// ```
/// use sofa_common::format_numeric;
///
/// assert_eq!(format_numeric(1.20), "1.2");
/// assert_eq!(format_numeric(500.0), "500");
/// ```
pub fn format_numeric(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let s = format!("{v}");
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Numeric cell or numeric text as `f64`. Non-finite values are kept; the
/// caller decides whether they are malformed.
pub fn any_to_f64(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(f64::from(v)),
        AnyValue::Int16(v) => Some(f64::from(v)),
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt8(v) => Some(f64::from(v)),
        AnyValue::UInt16(v) => Some(f64::from(v)),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::Float32(v) => Some(f64::from(v)),
        AnyValue::Float64(v) => Some(v),
        AnyValue::String(s) => parse_f64(s),
        AnyValue::StringOwned(s) => parse_f64(&s),
        _ => None,
    }
}

/// Identifier cell as `i64`. Floats are accepted only when integral, since
/// CSV exports sometimes write ids as `123.0`.
pub fn any_to_i64(value: AnyValue<'_>) -> Option<i64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(i64::from(v)),
        AnyValue::Int16(v) => Some(i64::from(v)),
        AnyValue::Int32(v) => Some(i64::from(v)),
        AnyValue::Int64(v) => Some(v),
        AnyValue::UInt8(v) => Some(i64::from(v)),
        AnyValue::UInt16(v) => Some(i64::from(v)),
        AnyValue::UInt32(v) => Some(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).ok(),
        AnyValue::Float32(v) => integral_f64(f64::from(v)),
        AnyValue::Float64(v) => integral_f64(v),
        AnyValue::String(s) => parse_i64(s),
        AnyValue::StringOwned(s) => parse_i64(&s),
        _ => None,
    }
}

/// Quality flag cell as `bool`. Blank cells are `None`.
pub fn any_to_bool(value: AnyValue<'_>) -> Option<bool> {
    match value {
        AnyValue::Null => None,
        AnyValue::Boolean(b) => Some(b),
        AnyValue::String(s) => parse_bool(s),
        AnyValue::StringOwned(s) => parse_bool(&s),
        other => any_to_f64(other).map(|v| v != 0.0),
    }
}

pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

pub fn parse_i64(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(integral_f64))
}

/// Accepts `true/false`, `t/f`, `yes/no`, `y/n` and numeric `1/0`.
pub fn parse_bool(value: &str) -> Option<bool> {
    let trimmed = value.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "" => None,
        "true" | "t" | "yes" | "y" => Some(true),
        "false" | "f" | "no" | "n" => Some(false),
        _ => parse_f64(trimmed).map(|v| v != 0.0),
    }
}

fn integral_f64(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// Cell at `idx` of column `name`, or `Null` if either is missing.
pub fn column_value<'a>(df: &'a DataFrame, name: &str, idx: usize) -> AnyValue<'a> {
    match df.column(name) {
        Ok(column) => column.get(idx).unwrap_or(AnyValue::Null),
        Err(_) => AnyValue::Null,
    }
}

/// Names from `required` that `df` does not have, compared case-insensitively.
pub fn missing_columns(df: &DataFrame, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|name| find_column(df, name).is_none())
        .map(|name| (*name).to_string())
        .collect()
}

/// Actual column name matching `name` case-insensitively.
pub fn find_column(df: &DataFrame, name: &str) -> Option<String> {
    df.get_column_names()
        .into_iter()
        .find(|column| column.as_str().eq_ignore_ascii_case(name))
        .map(|column| column.to_string())
}
