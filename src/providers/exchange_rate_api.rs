use async_trait::async_trait;
use reqwest::Url;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, instrument};

use crate::core::config::ExchangeRateProviderConfig;
use crate::core::currency::{CurrencyCode, RateFetcher, RateSnapshot};
use crate::core::error::FetchError;

const SUCCESS: &str = "success";

/// Fetches latest rates from the ExchangeRate-API v6 standard endpoint.
pub struct ExchangeRateApiFetcher {
    base_url: String,
    api_key: String,
}

impl ExchangeRateApiFetcher {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        ExchangeRateApiFetcher {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_config(config: &ExchangeRateProviderConfig) -> Self {
        Self::new(&config.base_url, &config.api_key)
    }

    fn latest_url(&self, base: &CurrencyCode) -> Result<Url, FetchError> {
        if self.api_key.trim().is_empty() {
            return Err(FetchError::InvalidRequest("missing API key".to_string()));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::InvalidRequest(format!("{e}: {}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::InvalidRequest(format!("cannot be a base URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend([self.api_key.as_str(), "latest", base.as_str()]);
        Ok(url)
    }
}

#[derive(Deserialize, Debug)]
struct ResultEnvelope {
    result: String,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

#[derive(Deserialize, Debug)]
struct LatestRatesResponse {
    result: String,
    base_code: String,
    time_last_update_utc: String,
    #[serde(deserialize_with = "unique_rates")]
    conversion_rates: BTreeMap<String, f64>,
}

/// Reads `conversion_rates` without letting a repeated key overwrite an
/// earlier one.
fn unique_rates<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct RatesVisitor;

    impl<'de> Visitor<'de> for RatesVisitor {
        type Value = BTreeMap<String, f64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of currency codes to rates")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut rates = BTreeMap::new();
            while let Some((code, rate)) = map.next_entry::<String, f64>()? {
                if rates.contains_key(&code) {
                    return Err(de::Error::custom(format!("duplicate currency code {code}")));
                }
                rates.insert(code, rate);
            }
            Ok(rates)
        }
    }

    deserializer.deserialize_map(RatesVisitor)
}

fn decode_snapshot(body: &str) -> Result<RateSnapshot, FetchError> {
    let envelope: ResultEnvelope =
        serde_json::from_str(body).map_err(|e| FetchError::Decoding(e.to_string()))?;

    if envelope.result != SUCCESS {
        let message = match envelope.error_type {
            Some(kind) => format!(
                "API request failed with status: {} ({kind})",
                envelope.result
            ),
            None => format!("API request failed with status: {}", envelope.result),
        };
        return Err(FetchError::ApiFailure(message));
    }

    let data: LatestRatesResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decoding(e.to_string()))?;

    if let Some(code) = data
        .conversion_rates
        .keys()
        .find(|code| {
            !code
                .parse::<CurrencyCode>()
                .is_ok_and(|parsed| parsed.as_str() == code.as_str())
        })
    {
        return Err(FetchError::Decoding(format!(
            "invalid currency code {code:?} in conversion rates"
        )));
    }

    if let Some((code, rate)) = data
        .conversion_rates
        .iter()
        .find(|(_, rate)| !rate.is_finite() || **rate <= 0.0)
    {
        return Err(FetchError::Decoding(format!(
            "non-positive rate {rate} for {code}"
        )));
    }

    Ok(RateSnapshot {
        result: data.result,
        base_code: data.base_code,
        last_updated_utc: data.time_last_update_utc,
        rates: data.conversion_rates,
    })
}

#[async_trait]
impl RateFetcher for ExchangeRateApiFetcher {
    #[instrument(name = "ExchangeRateFetch", skip(self), fields(base = %base))]
    async fn fetch(&self, base: &CurrencyCode) -> Result<RateSnapshot, FetchError> {
        let url = self.latest_url(base)?;
        debug!(
            host = url.host_str().unwrap_or_default(),
            "Requesting latest rates"
        );

        let client = reqwest::Client::builder().user_agent("fxview/0.1").build()?;
        let response = client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport {
                status: Some(status.as_u16()),
                reason: format!("HTTP error: {status}"),
            });
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "Received rates response");

        decode_snapshot(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_KEY: &str = "test-key";

    async fn create_mock_server(base: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/{API_KEY}/latest/{base}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn usd() -> CurrencyCode {
        "USD".parse().unwrap()
    }

    #[tokio::test]
    async fn test_successful_fetch() {
        let mock_response = r#"{
            "result": "success",
            "base_code": "USD",
            "time_last_update_utc": "2024-01-01T00:00:00Z",
            "conversion_rates": {"EUR": 0.9, "JPY": 150.0}
        }"#;
        let mock_server = create_mock_server("USD", 200, mock_response).await;

        let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), API_KEY);
        let snapshot = fetcher.fetch(&usd()).await.unwrap();

        assert_eq!(snapshot.result, "success");
        assert_eq!(snapshot.base_code, "USD");
        assert_eq!(snapshot.last_updated_utc, "2024-01-01T00:00:00Z");
        assert_eq!(snapshot.rates.len(), 2);
        assert_eq!(snapshot.rates["EUR"], 0.9);
        assert_eq!(snapshot.rates["JPY"], 150.0);
    }

    #[tokio::test]
    async fn test_base_url_with_path_prefix() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v6/{API_KEY}/latest/EUR")))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"result":"success","base_code":"EUR","time_last_update_utc":"x","conversion_rates":{"USD":1.1}}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let base_url = format!("{}/v6/", mock_server.uri());
        let fetcher = ExchangeRateApiFetcher::new(&base_url, API_KEY);
        let snapshot = fetcher.fetch(&"eur".parse().unwrap()).await.unwrap();
        assert_eq!(snapshot.base_code, "EUR");
    }

    #[tokio::test]
    async fn test_api_failure_without_rates() {
        let mock_response = r#"{"result": "error", "error-type": "invalid-key"}"#;
        let mock_server = create_mock_server("USD", 200, mock_response).await;

        let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), API_KEY);
        let err = fetcher.fetch(&usd()).await.unwrap_err();

        assert_eq!(
            err,
            FetchError::ApiFailure("API request failed with status: error (invalid-key)".into())
        );
    }

    #[tokio::test]
    async fn test_api_failure_even_with_rates() {
        let mock_response = r#"{
            "result": "partial",
            "base_code": "USD",
            "time_last_update_utc": "2024-01-01T00:00:00Z",
            "conversion_rates": {"EUR": 0.9}
        }"#;
        let mock_server = create_mock_server("USD", 200, mock_response).await;

        let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), API_KEY);
        let err = fetcher.fetch(&usd()).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::ApiFailure("API request failed with status: partial".into())
        );
    }

    #[tokio::test]
    async fn test_http_error_status_ignores_body() {
        // A success body must not rescue a non-2xx status.
        let mock_response = r#"{
            "result": "success",
            "base_code": "USD",
            "time_last_update_utc": "2024-01-01T00:00:00Z",
            "conversion_rates": {"EUR": 0.9}
        }"#;
        let mock_server = create_mock_server("USD", 403, mock_response).await;

        let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), API_KEY);
        let err = fetcher.fetch(&usd()).await.unwrap_err();

        assert_eq!(err.status(), Some(403));
        assert!(matches!(err, FetchError::Transport { .. }));
        assert!(err.user_message().contains("403"));
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let mock_server = create_mock_server("USD", 500, "").await;

        let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), API_KEY);
        let err = fetcher.fetch(&usd()).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Transport {
                status: Some(500),
                reason: "HTTP error: 500 Internal Server Error".into()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_rates_on_success_is_decoding_error() {
        let mock_response = r#"{
            "result": "success",
            "base_code": "USD",
            "time_last_update_utc": "2024-01-01T00:00:00Z"
        }"#;
        let mock_server = create_mock_server("USD", 200, mock_response).await;

        let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), API_KEY);
        let err = fetcher.fetch(&usd()).await.unwrap_err();

        match err {
            FetchError::Decoding(reason) => assert!(reason.contains("conversion_rates")),
            other => panic!("expected decoding error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_decoding_error() {
        let mock_server = create_mock_server("USD", 200, "<html>oops</html>").await;

        let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), API_KEY);
        let err = fetcher.fetch(&usd()).await.unwrap_err();
        assert!(matches!(err, FetchError::Decoding(_)));
    }

    #[tokio::test]
    async fn test_non_positive_rate_is_decoding_error() {
        let mock_response = r#"{
            "result": "success",
            "base_code": "USD",
            "time_last_update_utc": "2024-01-01T00:00:00Z",
            "conversion_rates": {"EUR": 0.9, "XXX": 0.0}
        }"#;
        let mock_server = create_mock_server("USD", 200, mock_response).await;

        let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), API_KEY);
        let err = fetcher.fetch(&usd()).await.unwrap_err();
        assert_eq!(err, FetchError::Decoding("non-positive rate 0 for XXX".into()));
    }

    #[tokio::test]
    async fn test_duplicate_rate_key_is_decoding_error() {
        let mock_response = r#"{
            "result": "success",
            "base_code": "USD",
            "time_last_update_utc": "2024-01-01T00:00:00Z",
            "conversion_rates": {"EUR": 0.9, "JPY": 150.0, "EUR": 1.5}
        }"#;
        let mock_server = create_mock_server("USD", 200, mock_response).await;

        let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), API_KEY);
        match fetcher.fetch(&usd()).await.unwrap_err() {
            FetchError::Decoding(reason) => {
                assert!(reason.contains("duplicate currency code EUR"), "{reason}")
            }
            other => panic!("expected decoding error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_rate_key_is_decoding_error() {
        for key in ["EURO", "eur", "E1R", ""] {
            let mock_response = format!(
                r#"{{
                    "result": "success",
                    "base_code": "USD",
                    "time_last_update_utc": "2024-01-01T00:00:00Z",
                    "conversion_rates": {{"JPY": 150.0, "{key}": 0.9}}
                }}"#
            );
            let mock_server = create_mock_server("USD", 200, &mock_response).await;

            let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), API_KEY);
            let err = fetcher.fetch(&usd()).await.unwrap_err();
            assert_eq!(
                err,
                FetchError::Decoding(format!("invalid currency code {key:?} in conversion rates")),
                "key {key:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_base_url_does_no_io() {
        let fetcher = ExchangeRateApiFetcher::new("not a url", API_KEY);
        let err = fetcher.fetch(&usd()).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));

        let fetcher = ExchangeRateApiFetcher::new("mailto:rates@example.com", API_KEY);
        let err = fetcher.fetch(&usd()).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_does_no_io() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), "  ");
        let err = fetcher.fetch(&usd()).await.unwrap_err();
        assert_eq!(err, FetchError::InvalidRequest("missing API key".into()));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let uri = {
            let mock_server = MockServer::start().await;
            mock_server.uri()
        };

        let fetcher = ExchangeRateApiFetcher::new(&uri, API_KEY);
        let err = fetcher.fetch(&usd()).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { status: None, .. }));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_reveal_api_key() {
        let uri = {
            let mock_server = MockServer::start().await;
            mock_server.uri()
        };
        let secret = "SECRETKEY123";

        let fetcher = ExchangeRateApiFetcher::new(&uri, secret);
        let err = fetcher.fetch(&usd()).await.unwrap_err();

        assert!(matches!(err, FetchError::Transport { status: None, .. }));
        assert!(!err.to_string().contains(secret), "{err}");
        assert!(!err.user_message().contains(secret), "{}", err.user_message());
        assert!(!format!("{err:?}").contains(secret), "{err:?}");
    }

    #[tokio::test]
    async fn test_every_call_hits_the_provider() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{API_KEY}/latest/USD")))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"result":"success","base_code":"USD","time_last_update_utc":"x","conversion_rates":{"EUR":0.9}}"#,
            ))
            .expect(2)
            .mount(&mock_server)
            .await;

        let fetcher = ExchangeRateApiFetcher::new(&mock_server.uri(), API_KEY);
        let first = fetcher.fetch(&usd()).await.unwrap();
        let second = fetcher.fetch(&usd()).await.unwrap();
        assert_eq!(first, second);
    }
}
