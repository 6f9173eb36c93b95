use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const ID: &str = "id";
pub const SOURCE: &str = "source";
pub const PAGE: &str = "page";
pub const SECTION: &str = "section";
pub const SEQUENCE_ID: &str = "sequence_id";
pub const TEXT: &str = "text";
pub const VECTOR: &str = "vector";
pub const DISTANCE: &str = "_distance";

pub fn vector_field(dim: i32) -> Field {
	Field::new(VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true)
}

/// Row layout of a managed collection; `section` is empty when no heading was found.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(ID, DataType::Utf8, false),
		Field::new(SOURCE, DataType::Utf8, false),
		Field::new(PAGE, DataType::Int32, false),
		Field::new(SECTION, DataType::Utf8, false),
		Field::new(SEQUENCE_ID, DataType::Int64, false),
		Field::new(TEXT, DataType::Utf8, false),
		vector_field(dim),
	]))
}

/// Width of the `vector` column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
	match schema.field_with_name(VECTOR).ok()?.data_type() {
		DataType::FixedSizeList(_, n) => Some(*n as usize),
		_ => None,
	}
}
