use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::{
    credentials::{ApiTokens, CredentialError, CredentialStore, validate_tokens},
    in_flight::InFlight,
    models::CheckoutLinkWithShortUrl,
    remote::{CheckoutLinkSource, RemoteError, ShortLinkCreator},
    short_urls::ShortUrlCache,
    store::StoreError,
};

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("API tokens are not configured")]
    NotConfigured,
    #[error(transparent)]
    InvalidCredentials(#[from] CredentialError),
    #[error("Unknown checkout link: {0}")]
    UnknownLink(String),
    #[error("A short URL is already being created for {0}")]
    InFlight(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub loaded: usize,
    pub restored: usize,
}

impl RefreshSummary {
    pub fn message(&self) -> String {
        if self.restored > 0 {
            format!(
                "Loaded {} checkout links ({} with short URLs restored)",
                self.loaded, self.restored
            )
        } else {
            format!("Loaded {} checkout links", self.loaded)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardStats {
    pub total: usize,
    pub with_short_url: usize,
    pub remaining: usize,
    /// Records in the short URL cache, including links no longer listed.
    pub stored: usize,
}

/// One user's dashboard session: credentials, the merged link view and the
/// collaborators needed to refresh it.
pub struct Dashboard {
    credentials: CredentialStore,
    cache: ShortUrlCache,
    source: Arc<dyn CheckoutLinkSource>,
    shortener: Arc<dyn ShortLinkCreator>,
    tokens: RwLock<Option<ApiTokens>>,
    links: RwLock<Vec<CheckoutLinkWithShortUrl>>,
    in_flight: InFlight,
}

impl Dashboard {
    /// Opens a session, picking up previously saved tokens.
    pub async fn open(
        credentials: CredentialStore,
        cache: ShortUrlCache,
        source: Arc<dyn CheckoutLinkSource>,
        shortener: Arc<dyn ShortLinkCreator>,
    ) -> Result<Self, DashboardError> {
        let tokens = credentials.load().await?;

        info!(configured = tokens.is_some(), "dashboard opened");

        Ok(Self {
            credentials,
            cache,
            source,
            shortener,
            tokens: RwLock::new(tokens),
            links: RwLock::new(Vec::new()),
            in_flight: InFlight::new(),
        })
    }

    #[cfg(test)]
    pub async fn is_configured(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    #[instrument(skip_all, err)]
    pub async fn configure(&self, polar_token: &str, dub_token: &str) -> Result<(), DashboardError> {
        let tokens = validate_tokens(polar_token, dub_token)?;

        self.credentials.save(&tokens).await?;
        *self.tokens.write().await = Some(tokens);

        info!("tokens configured");

        Ok(())
    }

    async fn tokens(&self) -> Result<ApiTokens, DashboardError> {
        self.tokens
            .read()
            .await
            .clone()
            .ok_or(DashboardError::NotConfigured)
    }

    /// Fetches checkout links and overlays the cached short URLs.
    #[instrument(skip_all, err)]
    pub async fn refresh(&self) -> Result<RefreshSummary, DashboardError> {
        let tokens = self.tokens().await?;

        let fetched = self.source.list_checkout_links(&tokens.polar_token).await?;
        let merged = self.cache.merge_into(fetched).await;

        let summary = RefreshSummary {
            loaded: merged.len(),
            restored: merged.iter().filter(|l| l.short_url.is_some()).count(),
        };

        *self.links.write().await = merged;

        info!(
            loaded = summary.loaded,
            restored = summary.restored,
            "dashboard refreshed"
        );

        Ok(summary)
    }

    /// Creates a short URL for one link of the current view.
    ///
    /// A second call for the same id while the first is still pending fails
    /// with [`DashboardError::InFlight`] without reaching the shortener.
    #[instrument(skip(self), err)]
    pub async fn create_short_url(&self, link_id: &str) -> Result<String, DashboardError> {
        let Some(_ticket) = self.in_flight.try_acquire(link_id) else {
            warn!("creation already in flight");
            return Err(DashboardError::InFlight(link_id.to_string()));
        };

        let tokens = self.tokens().await?;

        let (url, title) = {
            let links = self.links.read().await;
            let entry = links
                .iter()
                .find(|l| l.link.id == link_id)
                .ok_or_else(|| DashboardError::UnknownLink(link_id.to_string()))?;
            (entry.link.url.clone(), entry.link.title().to_string())
        };

        let created = self
            .shortener
            .create_short_link(&url, &title, &tokens.dub_token)
            .await?;

        self.cache.upsert(link_id, &created.short_link).await;

        if let Some(entry) = self
            .links
            .write()
            .await
            .iter_mut()
            .find(|l| l.link.id == link_id)
        {
            entry.short_url = Some(created.short_link.clone());
        }

        info!(short_link = %created.short_link, "short url created");

        Ok(created.short_link)
    }

    pub async fn short_url(&self, link_id: &str) -> Option<String> {
        self.cache.lookup(link_id).await
    }

    #[cfg(test)]
    pub fn is_creating(&self, link_id: &str) -> bool {
        self.in_flight.contains(link_id)
    }

    /// Drops the cached short URL of one link.
    #[instrument(skip(self))]
    pub async fn forget_short_url(&self, link_id: &str) {
        self.cache.remove(link_id).await;

        if let Some(entry) = self
            .links
            .write()
            .await
            .iter_mut()
            .find(|l| l.link.id == link_id)
        {
            entry.short_url = None;
        }
    }

    /// Forgets the tokens and every cached short URL.
    #[instrument(skip_all, err)]
    pub async fn reset(&self) -> Result<(), DashboardError> {
        self.credentials.clear().await?;
        self.cache.clear().await;

        *self.tokens.write().await = None;
        self.links.write().await.clear();

        info!("configuration reset");

        Ok(())
    }

    pub async fn links(&self) -> Vec<CheckoutLinkWithShortUrl> {
        self.links.read().await.clone()
    }

    pub async fn stats(&self) -> DashboardStats {
        let stored = self.cache.stats().await.stored;

        let links = self.links.read().await;
        let with_short_url = links.iter().filter(|l| l.short_url.is_some()).count();

        DashboardStats {
            total: links.len(),
            with_short_url,
            remaining: links.len() - with_short_url,
            stored,
        }
    }
}
