pub mod sqlite;

pub use sqlite::Database;
#[cfg(test)]
pub use sqlite::init_test_db;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::models::{CanonicalPosition, Observation, PositionKey};
use crate::reconcile::MergePolicy;

/// Storage the resolver reads history from and writes canonical rows to
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Every observation recorded for `key`, oldest capture first
    async fn fetch_observations(&self, key: &PositionKey) -> Result<Vec<Observation>>;

    /// Insert or replace the canonical row for the position's key
    async fn upsert_canonical(&self, position: &CanonicalPosition) -> Result<()>;
}

/// Rebuild one key's canonical row from its full history and store it.
/// Returns `None` when the key has no observations.
pub async fn refresh_key<S>(store: &S, key: &PositionKey, policy: &MergePolicy) -> Result<Option<CanonicalPosition>>
where
    S: ObservationStore + ?Sized,
{
    let history = store.fetch_observations(key).await?;
    if history.is_empty() {
        debug!("No observations stored for {}", key);
        return Ok(None);
    }

    let mut folded = policy.reconcile_all(&history);
    let position = match folded.remove(key) {
        Some(position) => position,
        None => {
            debug!("History for {} folded under different keys, skipping", key);
            return Ok(None);
        }
    };

    store.upsert_canonical(&position).await?;
    debug!(
        "Refreshed {} from {} observations (breakdown: {})",
        key,
        history.len(),
        position.has_breakdown
    );
    Ok(Some(position))
}
