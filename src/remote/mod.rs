use std::time::Duration;

use async_trait::async_trait;
use dub_rs::DubLink;
use thiserror::Error;

use crate::models::CheckoutLink;

mod polar;
mod proxy;

pub use polar::{DEFAULT_POLAR_API_URL, PolarClient};
pub use proxy::ProxyClient;

/// Errors talking to Polar or to our own proxy.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Request error: {0}")]
    Request(String),
    /// The service answered with a non-success status.
    #[error("{0}")]
    Rejected(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// Lists the checkout links of the organization the token belongs to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckoutLinkSource: Send + Sync {
    async fn list_checkout_links(&self, polar_token: &str) -> Result<Vec<CheckoutLink>, RemoteError>;
}

/// Creates a short link for a long URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortLinkCreator: Send + Sync {
    async fn create_short_link(
        &self,
        url: &str,
        title: &str,
        dub_token: &str,
    ) -> Result<DubLink, RemoteError>;
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, RemoteError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RemoteError::Configuration(e.to_string()))
}
