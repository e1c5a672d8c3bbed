//! View-independent helpers for presenting rates and conversions

use crate::core::currency::{CurrencyCode, RateSnapshot};
use chrono::DateTime;

/// One line of the rates or converter view. `value` is `None` when the
/// provider did not quote the currency.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    pub code: CurrencyCode,
    pub value: Option<f64>,
}

/// Rates for the requested codes, in the requested order.
pub fn rate_rows(snapshot: &RateSnapshot, displayed: &[CurrencyCode]) -> Vec<DisplayRow> {
    displayed
        .iter()
        .map(|code| DisplayRow {
            code: code.clone(),
            value: snapshot.rate_for(code),
        })
        .collect()
}

/// `amount` of the base currency converted into each requested code.
pub fn conversion_rows(
    snapshot: &RateSnapshot,
    displayed: &[CurrencyCode],
    amount: f64,
) -> Vec<DisplayRow> {
    displayed
        .iter()
        .map(|code| DisplayRow {
            code: code.clone(),
            value: snapshot.rate_for(code).map(|rate| amount * rate),
        })
        .collect()
}

/// Cleans free-form amount input.
///
/// Keeps digits and the first `decimal_separator`, truncates to two fraction
/// digits and drops a single leading zero unless it precedes the separator.
pub fn sanitize_amount(input: &str, decimal_separator: char) -> String {
    let filtered: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == decimal_separator)
        .collect();

    let mut parts = filtered.splitn(3, decimal_separator);
    let whole = parts.next().unwrap_or_default();
    let mut cleaned = match parts.next() {
        Some(fraction) => {
            let fraction: String = fraction.chars().take(2).collect();
            format!("{whole}{decimal_separator}{fraction}")
        }
        None => whole.to_string(),
    };

    let zero_prefix = format!("0{decimal_separator}");
    if cleaned.chars().count() > 1 && cleaned.starts_with('0') && !cleaned.starts_with(&zero_prefix)
    {
        cleaned.remove(0);
    }

    cleaned
}

/// Parses sanitized input; anything unparseable counts as zero.
pub fn parse_amount(sanitized: &str, decimal_separator: char) -> f64 {
    sanitized
        .replace(decimal_separator, ".")
        .parse::<f64>()
        .unwrap_or(0.0)
}

/// Renders the provider timestamp as a medium date with short time.
/// Unrecognised formats are returned unchanged.
pub fn format_update_time(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.format("%b %-d, %Y at %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}
