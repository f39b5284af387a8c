//! Disclosure-sheet parsing. AMCs publish holdings as loosely structured
//! spreadsheets exported to CSV: header preamble, section titles, a stock
//! column and a "% to net assets" column, then totals and benchmark rows.

use csv::ReaderBuilder;
use tracing::debug;

use crate::constants::MAX_SINGLE_HOLDING_PCT;
use crate::errors::{MonitorError, Result};

/// Rows whose instrument cell contains any of these are section headers,
/// totals, or benchmark noise rather than stocks.
const SKIP_KEYWORDS: &[&str] = &[
    "TOTAL", "GRAND", "RETURNS", "SINCE INCEPTION", "MARKET VALUE", "NIFTY", "SENSEX", "DATE",
    "PORTFOLIO", "EQUITY", "DEBT", "CASH", "SCHEME", "FUND", "ASSET", "NAV", "AWAITING", "LISTED",
    "GOVERNMENT", "TREASURY", "CLEARING", "INSTRUMENT",
];

/// Parse `(instrument, percentage)` pairs out of a CSV disclosure sheet.
///
/// The instrument column is the first cell with text; the percentage is the
/// last numeric cell on the row. Sheets that state percentages as fractions
/// of one (0.0803 for 8.03%) are detected and scaled. Company suffixes
/// ("Limited", "Ltd") are stripped so symbols compare across sources.
pub fn parse_holdings_csv(bytes: &[u8]) -> Result<Vec<(String, f64)>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut raw = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| MonitorError::parse(format!("csv: {e}")))?;

        let Some(instrument) = record.iter().find(|cell| !cell.trim().is_empty()) else {
            continue;
        };
        let instrument = instrument.trim();
        if instrument.starts_with('(') || looks_like_noise(instrument) {
            continue;
        }

        let Some(pct) = record
            .iter()
            .rev()
            .find_map(|cell| parse_number(cell))
        else {
            continue;
        };

        raw.push((clean_instrument(instrument), pct));
    }

    if raw.is_empty() {
        return Ok(raw);
    }

    // Fraction-style sheets never carry a value above 1.0.
    let max = raw.iter().map(|(_, p)| *p).fold(f64::MIN, f64::max);
    if max <= 1.0 {
        debug!("Sheet percentages look fractional (max {max}), scaling by 100");
        for (_, pct) in raw.iter_mut() {
            *pct *= 100.0;
        }
    }

    raw.retain(|(_, pct)| *pct > 0.0 && *pct <= MAX_SINGLE_HOLDING_PCT);
    Ok(raw)
}

fn looks_like_noise(instrument: &str) -> bool {
    let upper = instrument.to_uppercase();
    SKIP_KEYWORDS.iter().any(|kw| upper.contains(kw))
}

fn clean_instrument(instrument: &str) -> String {
    instrument
        .to_uppercase()
        .replace(" LIMITED", "")
        .replace(" LTD", "")
        .replace('.', "")
        .trim()
        .to_string()
}

fn parse_number(cell: &str) -> Option<f64> {
    let cleaned = cell.trim().trim_end_matches('%').replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
