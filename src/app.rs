use crate::models::DEFAULT_LINK_TITLE;
use async_trait::async_trait;
use dub_rs::{CreateLinkRequest, DubApi, DubApiError};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Body of `POST /api/dub/links`. Every field is optional on the wire so that
/// missing values get our own 400 instead of a deserialization rejection.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkPayload {
    pub url: Option<String>,
    pub title: Option<String>,
    pub dub_token: Option<String>,
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("{context}: {status} {details}")]
    Upstream {
        context: &'static str,
        status: u16,
        details: String,
    },
    #[error("Internal server error: {0}")]
    Internal(String),
}

pub const URL_REQUIRED: &str = "URL is required";
pub const TOKEN_REQUIRED: &str = "Dub token is required";

const CREATE_FAILED: &str = "Failed to create short URL";
const LIST_FAILED: &str = "Failed to fetch links";

/// The outbound side of the proxy, one call per endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkShortener: Send + Sync {
    async fn create_link(
        &self,
        token: &str,
        request: &CreateLinkRequest,
    ) -> Result<serde_json::Value, DubApiError>;
    async fn list_links(&self, token: &str) -> Result<serde_json::Value, DubApiError>;
}

#[async_trait]
impl LinkShortener for DubApi {
    async fn create_link(
        &self,
        token: &str,
        request: &CreateLinkRequest,
    ) -> Result<serde_json::Value, DubApiError> {
        DubApi::create_link(self, token, request).await
    }

    async fn list_links(&self, token: &str) -> Result<serde_json::Value, DubApiError> {
        DubApi::list_links(self, token).await
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn upstream_error(context: &'static str, e: DubApiError) -> ProxyError {
    match e {
        DubApiError::Upstream { status, body } => {
            error!(status, "dub api error: {body}");
            ProxyError::Upstream {
                context,
                status,
                details: body,
            }
        }
        e => {
            error!("error proxying dub api: {e}");
            ProxyError::Internal(e.to_string())
        }
    }
}

/// Stateless forwarder between the dashboard and Dub.
pub struct App {
    shortener: Arc<dyn LinkShortener>,
}

impl App {
    pub fn new(shortener: Arc<dyn LinkShortener>) -> Arc<Self> {
        Arc::new(Self { shortener })
    }

    #[instrument(skip_all, err)]
    pub async fn create_link(
        &self,
        payload: CreateLinkPayload,
    ) -> Result<serde_json::Value, ProxyError> {
        let Some(url) = non_empty(payload.url.as_deref()) else {
            warn!("rejected: missing url");
            return Err(ProxyError::Validation(URL_REQUIRED));
        };

        let Some(token) = non_empty(payload.dub_token.as_deref()) else {
            warn!("rejected: missing token");
            return Err(ProxyError::Validation(TOKEN_REQUIRED));
        };

        let request = CreateLinkRequest {
            url: url.to_string(),
            title: non_empty(payload.title.as_deref())
                .unwrap_or(DEFAULT_LINK_TITLE)
                .to_string(),
        };

        info!(url = request.url, title = request.title, "creating short link");

        self.shortener
            .create_link(token, &request)
            .await
            .map_err(|e| upstream_error(CREATE_FAILED, e))
    }

    #[instrument(skip_all, err)]
    pub async fn list_links(&self, dub_token: Option<&str>) -> Result<serde_json::Value, ProxyError> {
        let Some(token) = non_empty(dub_token) else {
            warn!("rejected: missing token");
            return Err(ProxyError::Validation(TOKEN_REQUIRED));
        };

        info!("listing links");

        self.shortener
            .list_links(token)
            .await
            .map_err(|e| upstream_error(LIST_FAILED, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(url: &str, title: Option<&str>, token: &str) -> CreateLinkPayload {
        CreateLinkPayload {
            url: Some(url.to_string()),
            title: title.map(str::to_string),
            dub_token: Some(token.to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_url_rejected_before_outbound_call() {
        let mut shortener = MockLinkShortener::new();
        shortener.expect_create_link().never();

        let app = App::new(Arc::new(shortener));

        let res = app.create_link(payload("", None, "dub_123")).await;
        assert!(matches!(res, Err(ProxyError::Validation(URL_REQUIRED))));

        let res = app.create_link(CreateLinkPayload::default()).await;
        assert!(matches!(res, Err(ProxyError::Validation(URL_REQUIRED))));
    }

    #[tokio::test]
    async fn test_missing_token_rejected_before_outbound_call() {
        let mut shortener = MockLinkShortener::new();
        shortener.expect_create_link().never();
        shortener.expect_list_links().never();

        let app = App::new(Arc::new(shortener));

        let res = app.create_link(payload("https://x", None, "")).await;
        assert!(matches!(res, Err(ProxyError::Validation(TOKEN_REQUIRED))));

        let res = app.list_links(None).await;
        assert!(matches!(res, Err(ProxyError::Validation(TOKEN_REQUIRED))));
    }

    #[tokio::test]
    async fn test_title_defaults() {
        let mut shortener = MockLinkShortener::new();
        shortener
            .expect_create_link()
            .times(2)
            .withf(|token, request| token == "dub_123" && request.title == DEFAULT_LINK_TITLE)
            .returning(|_, request| Ok(json!({"url": request.url})));

        let app = App::new(Arc::new(shortener));

        let res = app.create_link(payload("https://x", None, "dub_123")).await.unwrap();
        assert_eq!(res, json!({"url": "https://x"}));

        app.create_link(payload("https://x", Some(""), "dub_123"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upstream_error_is_relayed() {
        let mut shortener = MockLinkShortener::new();
        shortener.expect_create_link().returning(|_, _| {
            Err(DubApiError::Upstream {
                status: 401,
                body: "invalid token".to_string(),
            })
        });

        let app = App::new(Arc::new(shortener));

        match app.create_link(payload("https://x", Some("t"), "dub_bad")).await {
            Err(ProxyError::Upstream {
                context,
                status,
                details,
            }) => {
                assert_eq!(context, CREATE_FAILED);
                assert_eq!(status, 401);
                assert_eq!(details, "invalid token");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_is_internal() {
        let mut shortener = MockLinkShortener::new();
        shortener
            .expect_list_links()
            .withf(|token| token == "dub_123")
            .returning(|_| Err(DubApiError::RequestError("connection refused".to_string())));

        let app = App::new(Arc::new(shortener));

        let res = app.list_links(Some("dub_123")).await;
        assert!(matches!(res, Err(ProxyError::Internal(msg)) if msg.contains("connection refused")));
    }
}
