use chrono::{Datelike, Utc};

/// Sorts ascending and removes duplicates.
pub fn normalize_years(years: &[i32]) -> Vec<i32> {
    let mut normalized = years.to_vec();
    normalized.sort_unstable();
    normalized.dedup();
    normalized
}

/// Inclusive range of fiscal years. Empty when `start > end`.
pub fn year_range(start: i32, end: i32) -> Vec<i32> {
    if start > end {
        return Vec::new();
    }
    (start..=end).collect()
}

/// The three most recent completed calendar years, used when a project is created without an
/// explicit year list.
pub fn default_year_range() -> Vec<i32> {
    let current = Utc::now().year();
    year_range(current - 3, current - 1)
}

/// Strips a disambiguating `#suffix` from a template label.
///
/// `"Borrowings#current"` displays as `"Borrowings"`.
pub fn display_label(label: &str) -> &str {
    match label.split_once('#') {
        Some((display, _)) => display.trim_end(),
        None => label,
    }
}
