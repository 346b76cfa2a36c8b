use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const DEFAULT_EMBEDDING_DIM: i32 = 384;

/// Documents table. `tags` and `metadata` are JSON strings; `vector` is null
/// for documents ingested without an embedding.
pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("seq", DataType::Int64, false),
		Field::new("title", DataType::Utf8, false),
		Field::new("body", DataType::Utf8, false),
		Field::new("tags", DataType::Utf8, false),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Dimensionality of the `vector` column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<i32> {
	match schema.field_with_name("vector").ok()?.data_type() {
		DataType::FixedSizeList(_, n) => Some(*n),
		_ => None,
	}
}
