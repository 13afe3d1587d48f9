//! Durable storage for the in-flight multisig request.
//!
//! The coordinator keeps exactly one piece of local state: the identity of
//! the request it most recently sent for verification. It lives under a
//! fixed key of a [`KeyValueStore`] so that a restarted client can resume
//! verification. Writes are last-write-wins with no locking.

use async_trait::async_trait;
use std::sync::Arc;
use twofa_errors::Result;
use twofa_types::PendingRequestRecord;

pub mod backends;

pub use backends::{FileStore, MemoryStore};

/// Key under which the pending request record is stored
pub const PENDING_REQUEST_KEY: &str = "__multisigRequest";

/// String key-value storage backend
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Typed access to the single pending-request slot
#[derive(Clone)]
pub struct PendingRequests {
    store: Arc<dyn KeyValueStore>,
}

impl PendingRequests {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current record, empty when nothing was stored
    pub async fn get(&self) -> Result<PendingRequestRecord> {
        match self.store.get(PENDING_REQUEST_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(PendingRequestRecord::default()),
        }
    }

    pub async fn set(&self, record: &PendingRequestRecord) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        tracing::debug!(record = %raw, "persisting pending request");
        self.store.set(PENDING_REQUEST_KEY, &raw).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.remove(PENDING_REQUEST_KEY).await
    }

    /// Persisted request id, `None` when absent or the sentinel
    pub async fn request_id(&self) -> Result<Option<u64>> {
        Ok(self.get().await?.request_id)
    }
}
