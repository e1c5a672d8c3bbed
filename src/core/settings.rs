//! Persisted display preferences: the base currency and which currencies to show.

use crate::core::currency::CurrencyCode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_BASE_CURRENCY: &str = "USD";

/// Shown when nothing valid has been persisted yet.
pub const DEFAULT_DISPLAYED_CURRENCIES: [&str; 5] = ["EUR", "JPY", "GBP", "USD", "PLN"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub base_currency: CurrencyCode,
    pub displayed_currencies: Vec<CurrencyCode>,
}

// Fields are decoded one by one so a bad value only resets itself.
#[derive(Debug, Deserialize)]
struct StoredSettings {
    #[serde(default)]
    base_currency: Option<serde_json::Value>,
    #[serde(default)]
    displayed_currencies: Option<serde_json::Value>,
}

fn default_base_currency() -> CurrencyCode {
    CurrencyCode::from_static(DEFAULT_BASE_CURRENCY)
}

fn default_displayed_currencies() -> Vec<CurrencyCode> {
    DEFAULT_DISPLAYED_CURRENCIES
        .into_iter()
        .map(CurrencyCode::from_static)
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_currency: default_base_currency(),
            displayed_currencies: default_displayed_currencies(),
        }
    }
}

impl Settings {
    /// Reads settings from `path`.
    ///
    /// A missing file yields the defaults. Unreadable JSON, or a field that does
    /// not decode, falls back to the default for that field.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", path.display());
                return Ok(Settings::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read settings: {}", path.display()));
            }
        };

        let stored: StoredSettings = match serde_json::from_str(&content) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Settings file is corrupt, using defaults");
                return Ok(Settings::default());
            }
        };

        let base_currency = stored
            .base_currency
            .and_then(|v| serde_json::from_value::<CurrencyCode>(v).ok())
            .unwrap_or_else(|| {
                warn!("Stored base currency missing or invalid, using {DEFAULT_BASE_CURRENCY}");
                default_base_currency()
            });

        let displayed_currencies = stored
            .displayed_currencies
            .and_then(|v| serde_json::from_value::<Vec<CurrencyCode>>(v).ok())
            .unwrap_or_else(|| {
                warn!("Stored displayed currencies missing or invalid, using defaults");
                default_displayed_currencies()
            });

        Ok(Settings {
            base_currency,
            displayed_currencies,
        })
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn is_displayed(&self, code: &CurrencyCode) -> bool {
        self.displayed_currencies.contains(code)
    }

    /// Adds `code` to the end of the display list, or removes it if present.
    /// Returns whether the code is displayed afterwards.
    pub fn toggle_displayed(&mut self, code: CurrencyCode) -> bool {
        if self.is_displayed(&code) {
            self.displayed_currencies.retain(|c| *c != code);
            false
        } else {
            self.displayed_currencies.push(code);
            true
        }
    }

    /// Replaces the display list, keeping first occurrences only.
    pub fn set_displayed(&mut self, codes: Vec<CurrencyCode>) {
        let mut unique: Vec<CurrencyCode> = Vec::with_capacity(codes.len());
        for code in codes {
            if !unique.contains(&code) {
                unique.push(code);
            }
        }
        self.displayed_currencies = unique;
    }
}
