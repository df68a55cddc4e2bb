use arrow_schema::{Schema, Field, DataType};
use std::sync::Arc;

pub const COL_ID: &str = "id";
pub const COL_SOURCE: &str = "source";
pub const COL_CHUNK_INDEX: &str = "chunk_index";
pub const COL_CHUNK_SIZE: &str = "chunk_size";
pub const COL_DOCUMENT: &str = "document";
/// JSON object holding the merged per-chunk metadata map.
pub const COL_METADATA: &str = "metadata";
pub const COL_VECTOR: &str = "vector";
/// Added by LanceDB to vector search results.
pub const COL_DISTANCE: &str = "_distance";

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(COL_ID, DataType::Utf8, false),
		Field::new(COL_SOURCE, DataType::Utf8, false),
		Field::new(COL_CHUNK_INDEX, DataType::Int32, false),
		Field::new(COL_CHUNK_SIZE, DataType::Int32, false),
		Field::new(COL_DOCUMENT, DataType::Utf8, false),
		Field::new(COL_METADATA, DataType::Utf8, false),
		Field::new(COL_VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
	]))
}
