use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use relcheck_core::model::ModelId;
use relcheck_core::tuple::{ObjectRef, Revision, Tuple, TupleFilter};

use crate::traits::{
    ContinuationToken, ModelRecord, ModelStore, ReadOptions, StorageError, TuplePage, TupleStore,
    WriteBatch,
};

const ACTIVE_REVISION: u64 = u64::MAX;

type ShardKey = (ObjectRef, String);

#[derive(Debug, Clone)]
struct StoredTuple {
    tuple: Tuple,
    created_rev: u64,
    deleted_rev: u64,
}

impl StoredTuple {
    fn is_active(&self) -> bool {
        self.deleted_rev == ACTIVE_REVISION
    }

    fn visible_at(&self, revision: u64) -> bool {
        self.created_rev <= revision && self.deleted_rev > revision
    }
}

fn shard_key(tuple: &Tuple) -> ShardKey {
    (tuple.object.clone(), tuple.relation.clone())
}

#[derive(Debug, Default)]
struct Inner {
    shards: DashMap<ShardKey, Vec<StoredTuple>>,
    commit_lock: Mutex<()>,
    current: AtomicU64,
    horizon: AtomicU64,
    models: RwLock<Vec<ModelRecord>>,
}

/// Multi-version tuple store sharded by `(object, relation)`.
///
/// Writers serialize on a commit lock and stage rows at the next revision,
/// which stays invisible until the revision counter is published. Readers
/// never take the commit lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn exists_active(&self, tuple: &Tuple) -> bool {
        self.inner
            .shards
            .get(&shard_key(tuple))
            .is_some_and(|rows| rows.iter().any(|r| r.is_active() && r.tuple == *tuple))
    }

    /// Validates a batch and returns the writes left after deduplication.
    fn prepare<'a>(&self, batch: &'a WriteBatch) -> Result<Vec<&'a Tuple>, StorageError> {
        let deletes: HashSet<&Tuple> = batch.deletes.iter().collect();
        let mut seen = HashSet::new();
        let mut writes = Vec::with_capacity(batch.writes.len());

        for tuple in &batch.writes {
            if deletes.contains(tuple) {
                return Err(StorageError::InvalidBatch(format!(
                    "{tuple} is both written and deleted"
                )));
            }
            if !seen.insert(tuple) {
                if batch.strict {
                    return Err(StorageError::DuplicateTuple(tuple.to_string()));
                }
                continue;
            }
            if self.exists_active(tuple) {
                if batch.strict {
                    return Err(StorageError::DuplicateTuple(tuple.to_string()));
                }
                continue;
            }
            writes.push(tuple);
        }
        Ok(writes)
    }

    fn pinned_revision(&self, requested: Option<Revision>) -> Result<u64, StorageError> {
        let current = self.inner.current.load(Ordering::Acquire);
        let revision = match requested {
            Some(rev) if rev.value() > current => {
                return Err(StorageError::RevisionAhead {
                    requested: rev.value(),
                    current,
                });
            }
            Some(rev) => rev.value(),
            None => current,
        };
        self.check_horizon(revision)?;
        Ok(revision)
    }

    fn check_horizon(&self, revision: u64) -> Result<(), StorageError> {
        let horizon = self.inner.horizon.load(Ordering::Acquire);
        if revision < horizon {
            return Err(StorageError::RevisionCompacted {
                requested: revision,
                horizon,
            });
        }
        Ok(())
    }

    fn collect_visible(&self, filter: &TupleFilter, revision: u64, after: Option<&Tuple>) -> Vec<Tuple> {
        let keep = |row: &StoredTuple| {
            row.visible_at(revision)
                && filter.matches(&row.tuple)
                && after.is_none_or(|a| row.tuple > *a)
        };

        match filter.exact_object_relation() {
            Some((object, relation)) => self
                .inner
                .shards
                .get(&(object, relation.to_string()))
                .map(|rows| {
                    rows.iter()
                        .filter(|r| keep(r))
                        .map(|r| r.tuple.clone())
                        .collect()
                })
                .unwrap_or_default(),
            None => self
                .inner
                .shards
                .iter()
                .flat_map(|entry| {
                    entry
                        .value()
                        .iter()
                        .filter(|r| keep(r))
                        .map(|r| r.tuple.clone())
                        .collect::<Vec<_>>()
                })
                .collect(),
        }
    }
}

impl TupleStore for InMemoryStore {
    async fn write(&self, batch: &WriteBatch) -> Result<Revision, StorageError> {
        let _commit = self.inner.commit_lock.lock();

        let writes = self.prepare(batch)?;
        let current = self.inner.current.load(Ordering::Acquire);
        let next = current + 1;
        let mut changed = 0usize;

        for tuple in &batch.deletes {
            if let Some(mut rows) = self.inner.shards.get_mut(&shard_key(tuple)) {
                for row in rows.iter_mut() {
                    if row.is_active() && row.tuple == *tuple {
                        row.deleted_rev = next;
                        changed += 1;
                    }
                }
            }
        }

        for tuple in &writes {
            self.inner
                .shards
                .entry(shard_key(tuple))
                .or_default()
                .push(StoredTuple {
                    tuple: (*tuple).clone(),
                    created_rev: next,
                    deleted_rev: ACTIVE_REVISION,
                });
            changed += 1;
        }

        if changed == 0 {
            return Ok(Revision::new(current));
        }

        self.inner.current.store(next, Ordering::Release);
        tracing::debug!(
            revision = next,
            written = writes.len(),
            deleted = batch.deletes.len(),
            "committed write batch"
        );
        Ok(Revision::new(next))
    }

    async fn read(
        &self,
        filter: &TupleFilter,
        options: &ReadOptions,
    ) -> Result<TuplePage, StorageError> {
        let revision = self.pinned_revision(options.revision)?;
        let after = options
            .after
            .as_ref()
            .map(ContinuationToken::decode)
            .transpose()?;

        let mut tuples = self.collect_visible(filter, revision, after.as_ref());
        tuples.sort();

        let mut continuation = None;
        if let Some(limit) = options.limit
            && tuples.len() > limit
        {
            tuples.truncate(limit);
            continuation = tuples.last().map(ContinuationToken::after);
        }

        // A concurrent compaction may have dropped versions this read relied on.
        self.check_horizon(revision)?;

        Ok(TuplePage {
            tuples,
            continuation,
            revision: Revision::new(revision),
        })
    }

    async fn revision(&self) -> Result<Revision, StorageError> {
        Ok(Revision::new(self.inner.current.load(Ordering::Acquire)))
    }

    async fn horizon(&self) -> Result<Revision, StorageError> {
        Ok(Revision::new(self.inner.horizon.load(Ordering::Acquire)))
    }

    async fn compact(&self, horizon: Revision) -> Result<usize, StorageError> {
        let _commit = self.inner.commit_lock.lock();

        let current = self.inner.current.load(Ordering::Acquire);
        let horizon = horizon.value().min(current);
        if horizon <= self.inner.horizon.load(Ordering::Acquire) {
            return Ok(0);
        }
        self.inner.horizon.store(horizon, Ordering::Release);

        let mut removed = 0usize;
        self.inner.shards.retain(|_, rows| {
            let before = rows.len();
            rows.retain(|r| r.is_active() || r.deleted_rev > horizon);
            removed += before - rows.len();
            !rows.is_empty()
        });
        Ok(removed)
    }
}

impl ModelStore for InMemoryStore {
    async fn append_model(&self, record: ModelRecord) -> Result<(), StorageError> {
        let mut models = self.inner.models.write();
        if models.iter().any(|m| m.id == record.id) {
            return Err(StorageError::ModelExists(record.id));
        }
        models.push(record);
        Ok(())
    }

    async fn read_model(&self, id: &ModelId) -> Result<Option<ModelRecord>, StorageError> {
        let models = self.inner.models.read();
        Ok(models.iter().find(|m| m.id == *id).cloned())
    }

    async fn latest_model(&self) -> Result<Option<ModelRecord>, StorageError> {
        let models = self.inner.models.read();
        Ok(models.last().cloned())
    }
}
