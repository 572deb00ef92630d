use std::sync::Arc;

use futures::TryStreamExt;
use relcheck_core::engine::{EvalError, TupleReader};
use relcheck_core::tuple::{Revision, Tuple, TupleFilter};
use relcheck_storage::{TupleStore, tuple_stream};

const READ_PAGE_SIZE: usize = 512;

/// Serves evaluator reads from a tuple store, paging through results.
pub struct StoreTupleReader<S: TupleStore> {
    store: Arc<S>,
}

impl<S: TupleStore> StoreTupleReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: TupleStore> TupleReader for StoreTupleReader<S> {
    async fn read_tuples(
        &self,
        filter: &TupleFilter,
        revision: Option<Revision>,
    ) -> Result<Vec<Tuple>, EvalError> {
        let revision = match revision {
            Some(revision) => revision,
            None => self
                .store
                .revision()
                .await
                .map_err(|e| EvalError::Storage(e.to_string()))?,
        };
        tuple_stream(&*self.store, filter.clone(), revision, READ_PAGE_SIZE)
            .try_collect()
            .await
            .map_err(|e| EvalError::Storage(e.to_string()))
    }
}
