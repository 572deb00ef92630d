use std::fmt;

use relcheck_core::model::ModelId;
use relcheck_core::tuple::{Revision, Tuple, TupleFilter};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("tuple already exists: {0}")]
    DuplicateTuple(String),
    #[error("invalid write batch: {0}")]
    InvalidBatch(String),
    #[error("revision {requested} is ahead of current {current}")]
    RevisionAhead { requested: u64, current: u64 },
    #[error("revision {requested} has been compacted; oldest readable revision is {horizon}")]
    RevisionCompacted { requested: u64, horizon: u64 },
    #[error("invalid continuation token: {0}")]
    InvalidContinuation(String),
    #[error("model {0} already exists")]
    ModelExists(ModelId),
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Tuples to add and remove under a single revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    pub writes: Vec<Tuple>,
    pub deletes: Vec<Tuple>,
    /// Reject tuples that already exist instead of ignoring them.
    pub strict: bool,
}

impl WriteBatch {
    pub fn writes(writes: Vec<Tuple>) -> Self {
        Self {
            writes,
            ..Default::default()
        }
    }

    pub fn deletes(deletes: Vec<Tuple>) -> Self {
        Self {
            deletes,
            ..Default::default()
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty()
    }
}

/// Resume point of a paged read: the key of the last tuple returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn after(tuple: &Tuple) -> Self {
        Self(tuple.to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let token = Self(raw.to_string());
        token.decode()?;
        Ok(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn decode(&self) -> Result<Tuple, StorageError> {
        self.0
            .parse()
            .map_err(|e| StorageError::InvalidContinuation(format!("{e}")))
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Revision to read at; the latest when unset.
    pub revision: Option<Revision>,
    pub after: Option<ContinuationToken>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuplePage {
    pub tuples: Vec<Tuple>,
    pub continuation: Option<ContinuationToken>,
    /// Revision the page was read at.
    pub revision: Revision,
}

pub trait TupleStore: Send + Sync {
    fn write(
        &self,
        batch: &WriteBatch,
    ) -> impl Future<Output = Result<Revision, StorageError>> + Send;

    fn read(
        &self,
        filter: &TupleFilter,
        options: &ReadOptions,
    ) -> impl Future<Output = Result<TuplePage, StorageError>> + Send;

    fn revision(&self) -> impl Future<Output = Result<Revision, StorageError>> + Send;

    /// Oldest revision that can still be read.
    fn horizon(&self) -> impl Future<Output = Result<Revision, StorageError>> + Send;

    /// Drops tuple versions deleted at or before `horizon` and makes
    /// revisions below it unreadable. Returns the number of versions removed.
    fn compact(&self, horizon: Revision)
    -> impl Future<Output = Result<usize, StorageError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecord {
    pub id: ModelId,
    pub definition: String,
}

/// Append-only model log.
pub trait ModelStore: Send + Sync {
    fn append_model(
        &self,
        record: ModelRecord,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn read_model(
        &self,
        id: &ModelId,
    ) -> impl Future<Output = Result<Option<ModelRecord>, StorageError>> + Send;

    fn latest_model(&self)
    -> impl Future<Output = Result<Option<ModelRecord>, StorageError>> + Send;
}
