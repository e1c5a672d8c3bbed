//! Core rate pipeline: domain types, fetcher abstraction, store and settings

pub mod config;
pub mod currency;
pub mod display;
pub mod error;
pub mod log;
pub mod settings;
pub mod store;

// Re-export main types for cleaner imports
pub use currency::{AVAILABLE_CURRENCIES, CurrencyCode, RateFetcher, RateSnapshot};
pub use error::{CurrencyCodeError, FetchError};
pub use settings::Settings;
pub use store::{FetchState, RateStore};
