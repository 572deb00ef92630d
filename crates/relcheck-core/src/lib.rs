pub mod engine;
pub mod model;
pub mod tuple;

pub use model::ModelId;
pub use tuple::{ObjectRef, Revision, SubjectRef, Tuple, TupleFilter};
