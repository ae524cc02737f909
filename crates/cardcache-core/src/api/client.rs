//! HTTP transport for the card query API and image downloads.
//!
//! This module provides the `ApiClient` struct. It performs single
//! requests only; retries are layered on top by the callers through
//! [`super::retry::with_retry`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL of the card query API
pub const DEFAULT_API_BASE_URL: &str = "https://api.pokemontcg.io/v2";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while keeping a stuck request from hanging a batch.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header carrying the optional API key
const API_KEY_HEADER: &str = "X-Api-Key";

const USER_AGENT: &str = concat!("cardcache/", env!("CARGO_PKG_VERSION"));

/// Downloads raw image bytes. Implemented by [`ApiClient`]; tests substitute
/// an in-memory fetcher.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}

/// API client for the card query endpoint.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ApiClient {
    /// Create a new API client with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Set the API key sent with query requests
    pub fn set_api_key(&mut self, key: Option<String>) {
        self.api_key = key.filter(|k| !k.trim().is_empty());
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// GET `{base_url}/{path}` with query parameters and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let mut request = self.client.get(&url).query(query);
        if let Some(ref key) = self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = Self::check_response(request.send().await?).await?;
        let text = response.text().await?;
        debug!(url = %url, bytes = text.len(), "Query response received");

        serde_json::from_str(&text)
            .map_err(|e| ApiError::Parse(format!("{} from {}", e, url)))
    }

    /// Download a binary resource from an absolute URL.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = Self::check_response(self.client.get(url).send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageFetcher for ApiClient {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        self.get_bytes(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Ping {
        ok: bool,
    }

    #[tokio::test]
    async fn test_get_json_sends_query_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(query_param("q", "x"))
            .and(header("X-Api-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .mount(&server)
            .await;

        let mut client = ApiClient::new(server.uri()).unwrap();
        client.set_api_key(Some("secret".into()));

        let ping: Ping = client.get_json("ping", &[("q", "x".into())]).await.unwrap();
        assert!(ping.ok);
    }

    #[tokio::test]
    async fn test_get_json_maps_status_and_parse_errors() {
        let server = MockServer::start().await;
        Mock::given(path("/down"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;
        Mock::given(path("/garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri()).unwrap();

        let err = client.get_json::<Ping>("down", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream { status: 503, .. }));

        let err = client.get_json::<Ping>("garbled", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[tokio::test]
    async fn test_get_bytes() {
        let server = MockServer::start().await;
        Mock::given(path("/img.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri()).unwrap();
        let bytes = client
            .fetch_image(&format!("{}/img.png", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let mut client = ApiClient::new("http://localhost/").unwrap();
        client.set_api_key(Some("  ".into()));
        assert!(client.api_key.is_none());
        assert_eq!(client.base_url(), "http://localhost");
    }
}
