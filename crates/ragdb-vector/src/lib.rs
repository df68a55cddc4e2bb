//! LanceDB-backed corpus store with chunk indexing and nearest-neighbour queries.

pub mod schema;
pub mod search;
pub mod store;
pub mod table;
pub mod writer;

pub use search::QueryEngine;
pub use store::{Collection, CorpusStore};
pub use writer::Indexer;
