pub mod batch;
pub mod error;

pub use batch::{Header, RecordBatch};
pub use error::{Error, Result};
