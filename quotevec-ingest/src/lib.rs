pub mod error;
pub mod pipeline;
pub mod source;

pub use error::{IngestError, SourceError};
pub use pipeline::IngestionPipeline;
pub use source::{CsvRecordSource, RecordSource};
