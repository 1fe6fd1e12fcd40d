use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::store::{KeyValueStore, StoreError};

pub const TOKENS_KEY: &str = "polar-dub-tokens";

pub const POLAR_TOKEN_PREFIX: &str = "polar_oat_";
pub const DUB_TOKEN_PREFIX: &str = "dub_";

/// Bearer tokens for Polar and Dub, persisted together as one record.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiTokens {
    pub polar_token: String,
    pub dub_token: String,
}

// never print the secrets
impl fmt::Debug for ApiTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTokens")
            .field("polar_token", &"***")
            .field("dub_token", &"***")
            .finish()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Please provide both tokens")]
    Missing,
    #[error("Polar token should start with 'polar_oat_'")]
    PolarPrefix,
    #[error("Dub token should start with 'dub_'")]
    DubPrefix,
}

/// Shape check only. A token that passes can still be rejected by the service
/// it belongs to; that is discovered on first use.
pub fn validate_tokens(polar_token: &str, dub_token: &str) -> Result<ApiTokens, CredentialError> {
    if polar_token.trim().is_empty() || dub_token.trim().is_empty() {
        return Err(CredentialError::Missing);
    }

    if !polar_token.starts_with(POLAR_TOKEN_PREFIX) {
        return Err(CredentialError::PolarPrefix);
    }

    if !dub_token.starts_with(DUB_TOKEN_PREFIX) {
        return Err(CredentialError::DubPrefix);
    }

    Ok(ApiTokens {
        polar_token: polar_token.to_string(),
        dub_token: dub_token.to_string(),
    })
}

#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Loads the saved tokens. A record that does not parse is dropped and
    /// reported as absent, and so is a store file that does not parse.
    pub async fn load(&self) -> Result<Option<ApiTokens>, StoreError> {
        let raw = match self.store.get(TOKENS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(StoreError::Corrupt(e)) => {
                warn!("store is corrupt, treating tokens as absent: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match serde_json::from_str(&raw) {
            Ok(tokens) => Ok(Some(tokens)),
            Err(e) => {
                warn!("error parsing saved tokens: {e}");
                self.store.remove(TOKENS_KEY).await?;
                Ok(None)
            }
        }
    }

    pub async fn save(&self, tokens: &ApiTokens) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_string(tokens).map_err(|e| StoreError::Encoding(e.to_string()))?;
        self.store.set(TOKENS_KEY, &encoded).await?;

        info!("tokens saved");

        Ok(())
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(TOKENS_KEY).await
    }
}
