//! Shared utilities for the Gold-layer SOFA crates: Polars cell conversion,
//! column lookup and timestamp parsing.

pub mod polars;
pub mod time;

pub use polars::{
    any_to_bool, any_to_f64, any_to_i64, any_to_string, any_to_string_non_empty, column_value,
    find_column, format_numeric, missing_columns, parse_bool, parse_f64, parse_i64,
};
pub use time::{DATETIME_OUTPUT_FORMAT, any_to_datetime, format_datetime, parse_datetime};
