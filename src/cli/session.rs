//! Connects persisted settings to the rate store for the terminal views.

use super::ui;
use crate::core::config::AppConfig;
use crate::core::{CurrencyCode, FetchState, RateFetcher, RateStore, Settings};
use crate::providers::exchange_rate_api::ExchangeRateApiFetcher;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Settings plus the store that renders them.
///
/// The store is refreshed on first display ([`Session::ensure_loaded`]) and
/// whenever the base currency is changed through
/// [`Session::set_base_currency`]. Nothing else triggers a fetch.
pub struct Session {
    settings: Settings,
    settings_path: PathBuf,
    store: RateStore,
}

impl Session {
    pub fn new(settings: Settings, settings_path: PathBuf, fetcher: Arc<dyn RateFetcher>) -> Self {
        Session {
            settings,
            settings_path,
            store: RateStore::new(fetcher),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let settings_path = config.settings_path()?;
        let settings = Settings::load_from_path(&settings_path)?;
        debug!(?settings, "Loaded settings");

        let fetcher = ExchangeRateApiFetcher::from_config(&config.providers.exchangerate);
        Ok(Session::new(settings, settings_path, Arc::new(fetcher)))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &RateStore {
        &self.store
    }

    /// Loads rates if nothing has been fetched yet.
    pub async fn ensure_loaded(&self) {
        if self.store.state() == FetchState::Idle {
            self.refresh().await;
        }
    }

    /// Refreshes rates for the current base currency, showing a spinner while
    /// the request is in flight.
    pub async fn refresh(&self) {
        let rx = self.store.subscribe();
        futures::join!(
            self.store.refresh(&self.settings.base_currency),
            show_progress(rx)
        );
    }

    /// Persists a new base currency and refreshes rates for it. Selecting the
    /// current base is a no-op.
    pub async fn set_base_currency(&mut self, code: CurrencyCode) -> Result<()> {
        if code == self.settings.base_currency {
            debug!(%code, "Base currency unchanged");
            return Ok(());
        }

        info!(from = %self.settings.base_currency, to = %code, "Changing base currency");
        self.settings.base_currency = code;
        self.settings.save_to_path(&self.settings_path)?;
        self.refresh().await;
        Ok(())
    }
}

async fn show_progress(mut rx: watch::Receiver<FetchState>) {
    let mut spinner = None;
    loop {
        if !rx.borrow_and_update().is_loading() {
            break;
        }
        spinner.get_or_insert_with(|| ui::new_spinner("Fetching rates..."));
        if rx.changed().await.is_err() {
            break;
        }
    }
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FetchError, RateSnapshot};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingFetcher {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RateFetcher for RecordingFetcher {
        async fn fetch(&self, base: &CurrencyCode) -> Result<RateSnapshot, FetchError> {
            self.calls.lock().unwrap().push(base.to_string());
            Ok(RateSnapshot {
                result: "success".into(),
                base_code: base.to_string(),
                last_updated_utc: "2024-01-01T00:00:00Z".into(),
                rates: BTreeMap::from([("EUR".to_string(), 0.9)]),
            })
        }
    }

    fn session(dir: &TempDir, fetcher: Arc<RecordingFetcher>) -> Session {
        Session::new(
            Settings::default(),
            dir.path().join("settings.json"),
            fetcher,
        )
    }

    #[tokio::test]
    async fn test_first_display_fetches_once() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(RecordingFetcher::default());
        let session = session(&dir, fetcher.clone());

        session.ensure_loaded().await;
        session.ensure_loaded().await;

        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["USD".to_string()]);
        assert_eq!(session.store().snapshot().unwrap().base_code, "USD");
    }

    #[tokio::test]
    async fn test_base_change_persists_and_refreshes() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(RecordingFetcher::default());
        let mut session = session(&dir, fetcher.clone());

        session.set_base_currency("PLN".parse().unwrap()).await.unwrap();

        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["PLN".to_string()]);
        assert_eq!(session.store().snapshot().unwrap().base_code, "PLN");

        let saved = Settings::load_from_path(dir.path().join("settings.json")).unwrap();
        assert_eq!(saved.base_currency.as_str(), "PLN");

        // Already loaded for the new base, so first display doesn't refetch.
        session.ensure_loaded().await;
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_base_does_not_refetch() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(RecordingFetcher::default());
        let mut session = session(&dir, fetcher.clone());

        session.set_base_currency("USD".parse().unwrap()).await.unwrap();

        assert!(fetcher.calls.lock().unwrap().is_empty());
        assert!(!dir.path().join("settings.json").exists());
    }
}
