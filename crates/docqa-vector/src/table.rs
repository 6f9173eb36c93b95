//! LanceDB connection and table helpers.
use arrow_array::{Array, Float32Array, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use docqa_core::IndexError;
use lancedb::{connect, Connection, Table};
use std::sync::Arc;

pub(crate) fn backend(e: impl std::fmt::Display) -> IndexError {
	IndexError::Backend(e.to_string())
}

pub async fn open_db(uri: &str) -> Result<Connection, IndexError> {
	connect(uri).execute().await.map_err(backend)
}

/// Opens `name`, creating it empty with `schema` first when missing.
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<Table, IndexError> {
	let names = conn.table_names().execute().await.map_err(backend)?;
	if !names.iter().any(|n| n == name) {
		// create empty table with 0 rows
		let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
		conn.create_table(name, Box::new(iter)).execute().await.map_err(backend)?;
		tracing::info!(table = name, "created collection");
	}
	conn.open_table(name).execute().await.map_err(backend)
}

pub(crate) fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, IndexError> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| IndexError::Backend(format!("column '{name}' missing or mistyped")))
}

pub(crate) fn strings<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, IndexError> {
	column::<StringArray>(batch, name)
}

pub(crate) fn int32s<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array, IndexError> {
	column::<Int32Array>(batch, name)
}

pub(crate) fn int64s<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array, IndexError> {
	column::<Int64Array>(batch, name)
}

pub(crate) fn float32s<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float32Array, IndexError> {
	column::<Float32Array>(batch, name)
}

/// Quotes a string literal for a LanceDB SQL predicate.
pub fn sql_literal(s: &str) -> String {
	format!("'{}'", s.replace('\'', "''"))
}
