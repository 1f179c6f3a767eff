pub mod query;
pub mod types;

pub use query::{LineResult, QueryParams, QueryResponse};
pub use types::{FileInfo, FileKey};
