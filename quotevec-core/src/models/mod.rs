pub mod batch;
pub mod object;
pub mod quote;
pub mod result;

pub use batch::{BatchWriteResult, ObjectWriteResult};
pub use object::StoredObject;
pub use quote::{Record, VectorizedRecord};
pub use result::{QueryResult, SearchHit};
