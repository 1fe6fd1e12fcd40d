use async_trait::async_trait;
use thiserror::Error;

mod file;

pub use file::FileStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store file is corrupt: {0}")]
    Corrupt(String),
    #[error("Store encoding error: {0}")]
    Encoding(String),
}

/// Durable string-keyed store. No transactional guarantees across keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}
