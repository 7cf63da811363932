//! Display formatting for rates, dates and timeframes

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

/// Formats a rate with exactly four decimals, e.g. `0.849951` -> `"0.8500"`.
pub fn format_rate(value: f64) -> String {
    format!("{value:.4}")
}

/// Formats a value with four decimals and `,` thousands separators.
pub fn format_currency(value: f64) -> String {
    let fixed = format_rate(value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "0000"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

fn parse_date(input: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

/// Formats an ISO-8601 timestamp or date as a short date, e.g. `"Jun 18, 2025"`.
///
/// Input that cannot be parsed is returned unchanged.
pub fn format_date(input: &str) -> String {
    parse_date(input).map_or_else(
        || input.to_string(),
        |date| date.format("%b %-d, %Y").to_string(),
    )
}

/// Formats an RFC 3339 timestamp as local wall-clock time.
pub fn format_time(input: &str) -> String {
    DateTime::parse_from_rfc3339(input).map_or_else(
        |_| input.to_string(),
        |dt| dt.with_timezone(&Local).format("%H:%M:%S").to_string(),
    )
}

/// Human label for a timeframe key; unknown keys are returned unchanged.
pub fn timeframe_label(timeframe: &str) -> String {
    match timeframe {
        "daily" => "Last 24 Hours".to_string(),
        "weekly" => "Last 7 Days".to_string(),
        "monthly" => "Last 30 Days".to_string(),
        other => other.to_string(),
    }
}

/// Upper-cases the first character, leaving the rest as is.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
