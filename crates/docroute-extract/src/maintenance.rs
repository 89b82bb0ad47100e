//! Maintenance operations
//!
//! Used to rerun extraction from scratch: remove routed attachments, forget
//! which archives were processed, or both.

use tracing::{info, warn};

use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::storage::ObjectStore;

/// Delete every object under the destination root
///
/// Keys carrying the archive extension are never deleted, even when they sit
/// under the root. Returns the number of objects removed.
pub async fn purge_routed(store: &dyn ObjectStore, config: &ExtractorConfig) -> Result<usize> {
    let prefix = config.destination_prefix();
    let objects = store.list(Some(&prefix)).await?;

    let mut deleted = 0usize;
    for object in objects {
        if object.key.ends_with(&config.archive_extension) {
            warn!("Refusing to delete archive {} under {}", object.key, prefix);
            continue;
        }
        store.delete(&object.key).await?;
        deleted += 1;
    }

    info!("Purged {} objects under {}", deleted, prefix);
    Ok(deleted)
}

/// Delete the processed-state payload; returns false when there was none
pub async fn reset_state(store: &dyn ObjectStore, config: &ExtractorConfig) -> Result<bool> {
    if !store.exists(&config.state_key).await? {
        info!("No processed state at {}", config.state_key);
        return Ok(false);
    }

    store.delete(&config.state_key).await?;
    info!("Deleted processed state at {}", config.state_key);
    Ok(true)
}
