use std::time::Duration;

use async_trait::async_trait;
use dub_rs::DubLink;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{RemoteError, ShortLinkCreator, http_client};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateShortLink<'a> {
    url: &'a str,
    title: &'a str,
    dub_token: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    details: Option<String>,
}

/// Creates short links through the `/api/dub/links` proxy endpoint.
#[derive(Clone, Debug)]
pub struct ProxyClient {
    url: String,
    client: reqwest::Client,
}

impl ProxyClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }
}

fn rejection_reason(body: String) -> String {
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody { details, error }) => details
            .filter(|d| !d.is_empty())
            .or(error)
            .unwrap_or(body),
        Err(_) => body,
    }
}

#[async_trait]
impl ShortLinkCreator for ProxyClient {
    #[instrument(skip(self, dub_token), err)]
    async fn create_short_link(
        &self,
        url: &str,
        title: &str,
        dub_token: &str,
    ) -> Result<DubLink, RemoteError> {
        let endpoint = Url::parse(&format!("{}/api/dub/links", self.url))
            .map_err(|e| RemoteError::Configuration(e.to_string()))?;

        let resp = self
            .client
            .post(endpoint)
            .json(&CreateShortLink {
                url,
                title,
                dub_token,
            })
            .send()
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, "proxy rejected short link");

            return Err(RemoteError::Rejected(format!(
                "Failed to create short URL: {}",
                rejection_reason(body)
            )));
        }

        let link: DubLink = resp
            .json()
            .await
            .map_err(|e| RemoteError::Deserialization(e.to_string()))?;

        info!(short_link = %link.short_link, "short link created");

        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::spawn;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::json;

    #[test]
    fn test_rejection_reason_prefers_details() {
        assert_eq!(
            rejection_reason(r#"{"error":"Failed to create short URL","details":"invalid token"}"#.into()),
            "invalid token"
        );
        assert_eq!(
            rejection_reason(r#"{"error":"URL is required"}"#.into()),
            "URL is required"
        );
        assert_eq!(
            rejection_reason(r#"{"error":"x","details":""}"#.into()),
            "x"
        );
        assert_eq!(rejection_reason("Bad Gateway".into()), "Bad Gateway");
    }

    #[tokio::test]
    async fn test_posts_payload_and_parses_link() {
        let router = Router::new().route(
            "/api/dub/links",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["url"], "https://buy.polar.sh/a");
                assert_eq!(body["title"], "Pro");
                assert_eq!(body["dubToken"], "dub_123");
                Json(json!({
                    "id": "link_1",
                    "domain": "dub.sh",
                    "key": "abc",
                    "url": "https://buy.polar.sh/a",
                    "shortLink": "https://dub.sh/abc",
                    "createdAt": "2024-01-01T00:00:00.000Z",
                }))
            }),
        );
        let proxy = ProxyClient::new(&spawn(router).await, Duration::from_secs(5)).unwrap();

        let link = proxy
            .create_short_link("https://buy.polar.sh/a", "Pro", "dub_123")
            .await
            .unwrap();

        assert_eq!(link.short_link, "https://dub.sh/abc");
    }

    #[tokio::test]
    async fn test_rejected() {
        let router = Router::new().route(
            "/api/dub/links",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": "Failed to create short URL", "details": "invalid token"})),
                )
            }),
        );
        let proxy = ProxyClient::new(&spawn(router).await, Duration::from_secs(5)).unwrap();

        let err = proxy
            .create_short_link("https://buy.polar.sh/a", "Pro", "dub_bad")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to create short URL: invalid token");
    }
}
