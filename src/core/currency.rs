//! Currency codes, rate snapshots and the fetcher abstraction

use crate::core::error::{CurrencyCodeError, FetchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// Currencies offered for selection as base or display currency.
pub const AVAILABLE_CURRENCIES: [&str; 12] = [
    "USD", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "HKD", "INR", "PLN", "UAH",
];

/// A three-letter ISO 4217 style code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Wraps a code literal that is known to be valid.
    pub(crate) fn from_static(code: &'static str) -> Self {
        debug_assert!(code.parse::<CurrencyCode>().is_ok(), "invalid code {code}");
        CurrencyCode(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(CurrencyCode(trimmed.to_ascii_uppercase()))
        } else {
            Err(CurrencyCodeError(s.to_string()))
        }
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latest rates published by the provider for one base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub result: String,
    pub base_code: String,
    pub last_updated_utc: String,
    pub rates: BTreeMap<String, f64>,
}

impl RateSnapshot {
    /// Multiplier for `code` relative to the base, if the provider quoted it.
    pub fn rate_for(&self, code: &CurrencyCode) -> Option<f64> {
        self.rates.get(code.as_str()).copied()
    }
}

/// Source of rate snapshots.
#[async_trait]
pub trait RateFetcher: Send + Sync {
    async fn fetch(&self, base: &CurrencyCode) -> Result<RateSnapshot, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_code_parsing() {
        assert_eq!("USD".parse::<CurrencyCode>().unwrap().as_str(), "USD");
        assert_eq!(" eur ".parse::<CurrencyCode>().unwrap().as_str(), "EUR");

        for bad in ["", "US", "USDT", "U$D", "12A", "ÜSD"] {
            assert!(bad.parse::<CurrencyCode>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_currency_code_serde() {
        let codes: Vec<CurrencyCode> = serde_json::from_str(r#"["jpy", "GBP"]"#).unwrap();
        assert_eq!(codes[0].as_str(), "JPY");
        assert_eq!(serde_json::to_string(&codes).unwrap(), r#"["JPY","GBP"]"#);

        assert!(serde_json::from_str::<Vec<CurrencyCode>>(r#"["EURO"]"#).is_err());
    }

    #[test]
    fn test_available_currencies_are_valid_codes() {
        for code in AVAILABLE_CURRENCIES {
            assert!(code.parse::<CurrencyCode>().is_ok());
        }
    }

    #[test]
    fn test_rate_for() {
        let snapshot = RateSnapshot {
            result: "success".into(),
            base_code: "USD".into(),
            last_updated_utc: "2024-01-01T00:00:00Z".into(),
            rates: BTreeMap::from([("EUR".to_string(), 0.9), ("JPY".to_string(), 150.0)]),
        };
        assert_eq!(snapshot.rate_for(&"EUR".parse().unwrap()), Some(0.9));
        assert_eq!(snapshot.rate_for(&"GBP".parse().unwrap()), None);
    }
}
