//! Display helpers for the change report.

use chrono::NaiveDate;

/// Format a percentage at the one-decimal precision snapshots carry.
pub fn format_pct(pct: f64) -> String {
    format!("{pct:.1}%")
}

/// Format a delta with an explicit sign.
pub fn format_delta(delta: f64) -> String {
    if delta > 0.0 {
        format!("+{delta:.1}%")
    } else {
        format!("{delta:.1}%")
    }
}

/// Turn "2025-12" into "December 2025". Unparseable input is shown as-is.
pub fn month_display(month: &str) -> String {
    match NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d") {
        Ok(date) => date.format("%B %Y").to_string(),
        Err(_) => month.to_string(),
    }
}
