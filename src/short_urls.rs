use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use crate::{
    models::CheckoutLinkWithShortUrl,
    store::{KeyValueStore, StoreError},
};

pub const SHORT_URLS_KEY: &str = "polar-dub-short-urls";

/// checkout link id -> short url
pub type ShortUrlMapping = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortUrlStats {
    pub stored: usize,
}

/// Persisted mapping from checkout link id to the short URL created for it.
///
/// Reads fail safe: a store error or a malformed record reads as an empty
/// mapping. Writes are best effort: failures are logged and dropped, never
/// returned to the caller. Mutations are serialized so concurrent upserts for
/// different ids never drop each other's records.
#[derive(Clone)]
pub struct ShortUrlCache {
    store: Arc<dyn KeyValueStore>,
    update_lock: Arc<Mutex<()>>,
}

impl ShortUrlCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            update_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn all(&self) -> ShortUrlMapping {
        let raw = match self.store.get(SHORT_URLS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return ShortUrlMapping::new(),
            Err(e) => {
                error!("error reading short urls: {e}");
                return ShortUrlMapping::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            error!("error parsing stored short urls: {e}");
            ShortUrlMapping::new()
        })
    }

    pub async fn lookup(&self, id: &str) -> Option<String> {
        self.all()
            .await
            .remove(id)
            .filter(|short_url| !short_url.is_empty())
    }

    #[instrument(skip(self))]
    pub async fn upsert(&self, id: &str, short_url: &str) {
        let _guard = self.update_lock.lock().await;

        let mut mapping = self.all().await;
        mapping.insert(id.to_string(), short_url.to_string());

        match self.write(&mapping).await {
            Ok(()) => info!("short url saved"),
            Err(e) => error!("error saving short url: {e}"),
        }
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) {
        let _guard = self.update_lock.lock().await;

        let mut mapping = self.all().await;
        if mapping.remove(id).is_none() {
            return;
        }

        if let Err(e) = self.write(&mapping).await {
            error!("error removing short url: {e}");
        }
    }

    pub async fn clear(&self) {
        let _guard = self.update_lock.lock().await;

        if let Err(e) = self.store.remove(SHORT_URLS_KEY).await {
            error!("error clearing short urls: {e}");
        }
    }

    /// Overlays stored short URLs onto `links`, keeping order and length.
    ///
    /// A non-empty stored value always wins; otherwise whatever short URL the
    /// entry already carried is kept.
    pub async fn merge_into<I, L>(&self, links: I) -> Vec<CheckoutLinkWithShortUrl>
    where
        I: IntoIterator<Item = L>,
        L: Into<CheckoutLinkWithShortUrl>,
    {
        let mapping = self.all().await;

        links
            .into_iter()
            .map(Into::into)
            .map(|mut entry| {
                if let Some(short_url) = mapping
                    .get(&entry.link.id)
                    .filter(|short_url| !short_url.is_empty())
                {
                    entry.short_url = Some(short_url.clone());
                }
                entry
            })
            .collect()
    }

    pub async fn stats(&self) -> ShortUrlStats {
        ShortUrlStats {
            stored: self.all().await.len(),
        }
    }

    async fn write(&self, mapping: &ShortUrlMapping) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_string(mapping).map_err(|e| StoreError::Encoding(e.to_string()))?;
        self.store.set(SHORT_URLS_KEY, &encoded).await
    }
}
