use relcheck_core::tuple::Revision;

use crate::traits::{StorageError, TupleStore};

/// Compacts everything older than the last `retain_revisions` revisions.
pub async fn run_gc_cycle<S: TupleStore>(
    store: &S,
    retain_revisions: u64,
) -> Result<usize, StorageError> {
    let current = store.revision().await?;
    let horizon = Revision::new(current.value().saturating_sub(retain_revisions));
    if horizon == Revision::ZERO {
        return Ok(0);
    }

    let removed = store.compact(horizon).await?;
    if removed > 0 {
        tracing::info!(
            removed,
            horizon = horizon.value(),
            "compacted deleted tuple versions"
        );
    }
    Ok(removed)
}
