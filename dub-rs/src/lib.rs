//! # dub-rs
//!
//! A small Rust client for the [Dub](https://dub.co) link shortener API.
//!
//! Only the two calls needed to shorten links and list existing ones are
//! covered. Responses are handed back as raw JSON so that callers acting as a
//! proxy can forward them unmodified; [`DubLink`] offers a typed view of a
//! created link for everyone else.
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), dub_rs::DubApiError> {
//! use dub_rs::{CreateLinkRequest, DubApi, DubLink};
//!
//! let api = DubApi::new();
//! let request = CreateLinkRequest {
//!     url: "https://example.com/very/long/url".to_string(),
//!     title: "Example".to_string(),
//! };
//!
//! let created = api.create_link("dub_xxxxxx", &request).await?;
//! let link: DubLink = serde_json::from_value(created)
//!     .map_err(|e| dub_rs::DubApiError::DeserializationError(e.to_string()))?;
//! println!("Shortened URL: {}", link.short_link);
//! # Ok(())
//! # }
//! ```

use reqwest::{RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default public endpoint of the Dub API.
pub const DEFAULT_API_URL: &str = "https://api.dub.co";

/// Request payload for creating a shortened URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLinkRequest {
    /// The destination URL to be shortened.
    pub url: String,
    /// Human readable title stored alongside the link.
    pub title: String,
}

/// A link object as returned by Dub after creating a shortened URL.
///
/// Only the fields this crate relies on are typed; everything else Dub sends
/// is kept in `extra` so re-serializing a `DubLink` loses nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DubLink {
    /// The unique identifier of the short link.
    pub id: String,
    /// Domain the short link lives on, e.g. `dub.sh`.
    pub domain: String,
    /// Slug part of the short link.
    pub key: String,
    /// The destination URL.
    pub url: String,
    /// The complete shortened URL.
    pub short_link: String,
    /// Creation timestamp as reported by Dub.
    pub created_at: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Errors that can occur when interacting with the Dub API.
#[derive(Debug, Error)]
pub enum DubApiError {
    /// An error occurred during API configuration (e.g., invalid URL parsing).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    /// An error occurred while sending the HTTP request or receiving the response.
    #[error("Request error: {0}")]
    RequestError(String),
    /// Dub answered with a non-success status. `body` is the raw response text.
    #[error("Dub returned {status}: {body}")]
    Upstream { status: u16, body: String },
    /// An error occurred while deserializing the API response.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

/// A client for the Dub REST API.
///
/// The client does not hold a token: every call takes the bearer token of the
/// workspace it acts for, which lets a single instance serve many callers.
#[derive(Clone, Debug)]
pub struct DubApi {
    url: String,
    client: reqwest::Client,
}

impl Default for DubApi {
    fn default() -> Self {
        Self::new()
    }
}

impl DubApi {
    /// Creates a new `DubApi` client with the default Dub endpoint.
    ///
    /// # Example
    ///
    /// ```rust
    /// use dub_rs::DubApi;
    ///
    /// let api = DubApi::new();
    /// ```
    pub fn new() -> Self {
        Self {
            url: String::from(DEFAULT_API_URL),
            client: reqwest::Client::new(),
        }
    }

    /// Sets a custom API endpoint URL.
    ///
    /// By default, the client uses [`DEFAULT_API_URL`]. Use this method to
    /// point the client somewhere else, such as a local stand-in for tests.
    ///
    /// # Example
    ///
    /// ```rust
    /// use dub_rs::DubApi;
    ///
    /// let api = DubApi::new().with_url("http://localhost:9000");
    /// ```
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.trim_end_matches('/').into();
        self
    }

    /// Bounds every request made by this client to `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the underlying HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, DubApiError> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DubApiError::ConfigurationError(e.to_string()))?;
        Ok(self)
    }

    /// Base URL this client talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Creates a shortened URL.
    ///
    /// Returns the JSON body Dub sent back, untouched.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The API endpoint URL is invalid (`ConfigurationError`)
    /// - The HTTP request fails (`RequestError`)
    /// - Dub answers with a non-success status (`Upstream`)
    /// - The success body is not JSON (`DeserializationError`)
    pub async fn create_link(
        &self,
        token: &str,
        request: &CreateLinkRequest,
    ) -> Result<serde_json::Value, DubApiError> {
        let url = self.endpoint("links")?;

        let request = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(request);

        send(request).await
    }

    /// Lists the links of the workspace the token belongs to.
    ///
    /// # Errors
    ///
    /// Same as [`DubApi::create_link`].
    pub async fn list_links(&self, token: &str) -> Result<serde_json::Value, DubApiError> {
        let url = self.endpoint("links")?;

        let request = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("Content-Type", "application/json");

        send(request).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, DubApiError> {
        Url::parse(&format!("{}/{}", self.url, path))
            .map_err(|e| DubApiError::ConfigurationError(e.to_string()))
    }
}

async fn send(request: RequestBuilder) -> Result<serde_json::Value, DubApiError> {
    let resp = request
        .send()
        .await
        .map_err(|e| DubApiError::RequestError(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp
            .text()
            .await
            .map_err(|e| DubApiError::RequestError(e.to_string()))?;
        return Err(DubApiError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    resp.json::<serde_json::Value>()
        .await
        .map_err(|e| DubApiError::DeserializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use serde_json::json;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn request() -> CreateLinkRequest {
        CreateLinkRequest {
            url: "https://polar.sh/checkout/abc".to_string(),
            title: "Pro plan".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_link_sends_bearer_and_returns_body() {
        let router = Router::new().route(
            "/links",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers["authorization"], "Bearer dub_123");
                Json(json!({
                    "id": "link_1",
                    "domain": "dub.sh",
                    "key": "abc",
                    "url": body["url"],
                    "shortLink": "https://dub.sh/abc",
                    "createdAt": "2024-01-01T00:00:00.000Z",
                    "clicks": 0,
                }))
            }),
        );
        let api = DubApi::new().with_url(&spawn(router).await);

        let created = api.create_link("dub_123", &request()).await.unwrap();
        let link: DubLink = serde_json::from_value(created.clone()).unwrap();

        assert_eq!(link.short_link, "https://dub.sh/abc");
        assert_eq!(link.url, "https://polar.sh/checkout/abc");
        assert_eq!(link.extra["clicks"], 0);
        assert_eq!(serde_json::to_value(&link).unwrap(), created);
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_status_and_body() {
        let router = Router::new().route(
            "/links",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid token") })
                .get(|| async { (StatusCode::FORBIDDEN, "forbidden") }),
        );
        let api = DubApi::new().with_url(&spawn(router).await);

        match api.create_link("dub_bad", &request()).await {
            Err(DubApiError::Upstream { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid token");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        match api.list_links("dub_bad").await {
            Err(DubApiError::Upstream { status, .. }) => assert_eq!(status, 403),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let api = DubApi::new()
            .with_url("http://127.0.0.1:1")
            .with_timeout(Duration::from_secs(2))
            .unwrap();

        let res = api.list_links("dub_123").await;

        assert!(matches!(res, Err(DubApiError::RequestError(_))));
    }

    #[test]
    fn test_with_url_strips_trailing_slash() {
        let api = DubApi::new().with_url("http://localhost:9000/");
        assert_eq!(api.url(), "http://localhost:9000");
    }
}
