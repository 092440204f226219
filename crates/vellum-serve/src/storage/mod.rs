//! File-backed counter stores.
//!
//! Views and likes are the only durable state this service owns. Each
//! store keeps its working set in memory behind an async mutex and
//! rewrites one JSON file per mutation; the mutex serializes the whole
//! read-mutate-write cycle, so concurrent requests within the process
//! cannot interleave partial states. Cross-process writers are out of
//! contract.
//!
//! Failure policy: an unreadable or corrupt file at startup degrades to an
//! empty store with a warning (counters are not worth refusing to boot
//! over); a failed write is an error for the request that caused it.

pub mod likes;
pub mod views;

pub use likes::LikeStore;
pub use views::ViewStore;

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use vellum_core::metrics;

/// Errors from counter-store persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Load a store file, degrading to `Default` on absence or corruption.
pub(crate) fn load_or_default<T>(path: &Path, store: &'static str) -> T
where
    T: DeserializeOwned + Default,
{
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(store, path = %path.display(), error = %e, "corrupt store file, starting empty");
                T::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
        Err(e) => {
            tracing::warn!(store, path = %path.display(), error = %e, "unreadable store file, starting empty");
            T::default()
        }
    }
}

/// Rewrite a store file in full. Called with the store mutex held.
pub(crate) async fn persist<T: Serialize>(
    path: &Path,
    data: &T,
    store: &'static str,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(data)?;
    tokio::fs::write(path, bytes).await?;
    metrics::record_store_write(store);
    Ok(())
}
