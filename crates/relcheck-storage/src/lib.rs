pub mod gc;
pub mod memory;
pub mod stream;
pub mod traits;

pub use gc::run_gc_cycle;
pub use memory::InMemoryStore;
pub use stream::tuple_stream;
pub use traits::{
    ContinuationToken, ModelRecord, ModelStore, ReadOptions, StorageError, TuplePage, TupleStore,
    WriteBatch,
};
