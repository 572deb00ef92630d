use futures::{Stream, TryStreamExt, stream};
use relcheck_core::tuple::{Revision, Tuple, TupleFilter};

use crate::traits::{ReadOptions, StorageError, TupleStore};

/// Lazily pages through every tuple matching `filter` at `revision`.
///
/// Each page is fetched only when the previous one has been consumed.
pub fn tuple_stream<S: TupleStore>(
    store: &S,
    filter: TupleFilter,
    revision: Revision,
    page_size: usize,
) -> impl Stream<Item = Result<Tuple, StorageError>> + Send + '_ {
    let page_size = page_size.max(1);
    stream::try_unfold(Some(None), move |state| {
        let filter = filter.clone();
        async move {
            let Some(after) = state else {
                return Ok(None);
            };
            let options = ReadOptions {
                revision: Some(revision),
                after,
                limit: Some(page_size),
            };
            let page = store.read(&filter, &options).await?;
            let next = page.continuation.map(Some);
            Ok(Some((stream::iter(page.tuples.into_iter().map(Ok)), next)))
        }
    })
    .try_flatten()
}
