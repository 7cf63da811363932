use crate::core::rates::RatesProvider;
use crate::core::types::{AggregatedRate, Timeframe, TrendData};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Client for the rates aggregation API.
pub struct HttpRatesProvider {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRatesProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(concat!("fxdash/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("Requesting {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("Unexpected status from {url}"))?;

        let response_text = response
            .text()
            .await
            .context("Failed to get response text")?;

        match serde_json::from_str(&response_text) {
            Ok(data) => Ok(data),
            Err(e) => {
                error!(
                    error = ?e,
                    response = %response_text,
                    "Failed to parse API response"
                );
                Err(e).with_context(|| format!("Failed to parse response from {url}"))
            }
        }
    }
}

#[async_trait]
impl RatesProvider for HttpRatesProvider {
    #[instrument(name = "CurrentRatesFetch", skip(self))]
    async fn get_current_rates(&self) -> Result<Vec<AggregatedRate>> {
        let url = format!("{}/api/rates/current", self.base_url);
        let rates: Vec<AggregatedRate> = self.get_json(&url).await?;
        debug!(count = rates.len(), "Received current rates");
        Ok(rates)
    }

    #[instrument(name = "TrendsFetch", skip(self), fields(currency = %currency, timeframe = %timeframe))]
    async fn get_trends(&self, currency: &str, timeframe: Timeframe) -> Result<TrendData> {
        if currency.is_empty() || !currency.chars().all(|c| c.is_ascii_alphanumeric()) {
            anyhow::bail!("Invalid currency code: {currency:?}");
        }
        let url = format!("{}/api/trends/{}/{}", self.base_url, currency, timeframe);
        let trend: TrendData = self.get_json(&url).await?;
        debug!(points = trend.data_points.len(), "Received trend data");
        Ok(trend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RATES_JSON: &str = r#"[
        {
            "currency": "EUR",
            "average_rate": 0.85,
            "min_rate": 0.84,
            "max_rate": 0.86,
            "last_updated": "2025-06-18T10:00:00+00:00",
            "sources": ["currency-api.pages.dev"]
        },
        {
            "currency": "GBP",
            "average_rate": 0.74,
            "min_rate": 0.73,
            "max_rate": 0.75,
            "last_updated": "2025-06-18T10:00:00+00:00",
            "sources": ["currency-api.pages.dev"]
        }
    ]"#;

    const TREND_JSON: &str = r#"{
        "currency": "EUR",
        "timeframe": "weekly",
        "data_points": [
            {"2025-06-04T00:00:00+00:00": 0.8412},
            {"2025-06-11T00:00:00+00:00": 0.8466},
            {"2025-06-18T00:00:00+00:00": 0.8501}
        ],
        "start_date": "2025-06-04T00:00:00+00:00",
        "end_date": "2025-06-18T00:00:00+00:00"
    }"#;

    async fn create_mock_server(request_path: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(request_path))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(uri: &str) -> HttpRatesProvider {
        HttpRatesProvider::new(uri, Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn test_get_current_rates() {
        let mock_server = create_mock_server("/api/rates/current", 200, RATES_JSON).await;

        let rates = provider(&mock_server.uri())
            .get_current_rates()
            .await
            .unwrap();

        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].currency, "EUR");
        assert_eq!(rates[0].min_rate, 0.84);
        assert_eq!(rates[1].currency, "GBP");
        assert_eq!(rates[1].sources, vec!["currency-api.pages.dev".to_string()]);
    }

    #[tokio::test]
    async fn test_get_trends() {
        let mock_server = create_mock_server("/api/trends/EUR/weekly", 200, TREND_JSON).await;

        let trend = provider(&mock_server.uri())
            .get_trends("EUR", Timeframe::Weekly)
            .await
            .unwrap();

        assert_eq!(trend.currency, "EUR");
        assert_eq!(trend.timeframe, "weekly");
        assert_eq!(trend.data_points.len(), 3);
        assert_eq!(trend.data_points[2].rate, 0.8501);
    }

    #[tokio::test]
    async fn test_invalid_currency_is_rejected_before_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TREND_JSON))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = provider(&mock_server.uri());
        for currency in ["", "EU/R", "EUR daily", "../EUR"] {
            let err = client
                .get_trends(currency, Timeframe::Daily)
                .await
                .unwrap_err();
            assert!(err.to_string().contains("Invalid currency code"));
        }
    }

    #[tokio::test]
    async fn test_trailing_slash_in_base_url() {
        let mock_server = create_mock_server("/api/rates/current", 200, RATES_JSON).await;
        let base_url = format!("{}/", mock_server.uri());

        let rates = provider(&base_url).get_current_rates().await.unwrap();
        assert_eq!(rates.len(), 2);
    }

    #[tokio::test]
    async fn test_error_status_is_failure() {
        let mock_server =
            create_mock_server("/api/rates/current", 500, r#"{"detail": "boom"}"#).await;

        let result = provider(&mock_server.uri()).get_current_rates().await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Unexpected status")
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_is_failure() {
        let mock_server = create_mock_server("/api/trends/EUR/daily", 200, "not json").await;

        let result = provider(&mock_server.uri())
            .get_trends("EUR", Timeframe::Daily)
            .await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse response")
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_failure() {
        let mock_server = MockServer::start().await;

        let result = provider(&mock_server.uri())
            .get_trends("XYZ", Timeframe::Monthly)
            .await;
        assert!(result.is_err());
    }
}
