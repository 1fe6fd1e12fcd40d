use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Url, header::ACCEPT};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{CheckoutLinkSource, RemoteError, http_client};
use crate::models::CheckoutLink;

pub const DEFAULT_POLAR_API_URL: &str = "https://api.polar.sh";

#[derive(Deserialize)]
struct CheckoutLinkList {
    #[serde(default)]
    items: Option<Vec<CheckoutLink>>,
}

/// Reads checkout links straight from the Polar API.
#[derive(Clone, Debug)]
pub struct PolarClient {
    url: String,
    client: reqwest::Client,
}

impl PolarClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl CheckoutLinkSource for PolarClient {
    #[instrument(skip_all, err)]
    async fn list_checkout_links(&self, polar_token: &str) -> Result<Vec<CheckoutLink>, RemoteError> {
        let url = Url::parse(&format!("{}/v1/checkout-links/", self.url))
            .map_err(|e| RemoteError::Configuration(e.to_string()))?;

        let resp = self
            .client
            .get(url)
            .bearer_auth(polar_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "polar request failed");

            let reason = status.canonical_reason().unwrap_or(status.as_str());
            return Err(RemoteError::Rejected(format!(
                "Failed to fetch checkout links: {reason}"
            )));
        }

        let list: CheckoutLinkList = resp
            .json()
            .await
            .map_err(|e| RemoteError::Deserialization(e.to_string()))?;
        let items = list.items.unwrap_or_default();

        info!(count = items.len(), "fetched checkout links");

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::spawn;
    use axum::{
        Json, Router,
        http::{HeaderMap, StatusCode},
        routing::get,
    };
    use serde_json::json;

    fn client(url: &str) -> PolarClient {
        PolarClient::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_lists_items() {
        let router = Router::new().route(
            "/v1/checkout-links/",
            get(|headers: HeaderMap| async move {
                assert_eq!(headers["authorization"], "Bearer polar_oat_abc");
                assert_eq!(headers["accept"], "application/json");
                Json(json!({
                    "items": [
                        {"id": "a", "url": "https://buy.polar.sh/a", "created_at": "2024-05-01T10:00:00Z"},
                        {"id": "b", "url": "https://buy.polar.sh/b", "label": "Promo", "created_at": "2024-05-02T10:00:00Z"},
                    ],
                    "pagination": {"total_count": 2, "max_page": 1},
                }))
            }),
        );
        let polar = client(&spawn(router).await);

        let links = polar.list_checkout_links("polar_oat_abc").await.unwrap();

        let ids: Vec<_> = links.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(links[1].label.as_deref(), Some("Promo"));
    }

    #[tokio::test]
    async fn test_missing_items_is_empty() {
        let router = Router::new().route(
            "/v1/checkout-links/",
            get(|| async { Json(json!({"items": null})) }),
        );
        let polar = client(&format!("{}/", spawn(router).await));

        assert!(polar.list_checkout_links("polar_oat_abc").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_reports_status_reason() {
        let router = Router::new().route(
            "/v1/checkout-links/",
            get(|| async { (StatusCode::UNAUTHORIZED, "nope") }),
        );
        let polar = client(&spawn(router).await);

        let err = polar.list_checkout_links("polar_oat_bad").await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to fetch checkout links: Unauthorized");
    }
}
