//! Persistent collection backed by an embedded LanceDB table.
//!
//! The handle owns a tokio runtime and blocks on it, so it must not be driven
//! from inside another async runtime.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use arrow_array::{FixedSizeListArray, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use docqa_core::types::{check_batch, compare_hits};
use docqa_core::{Chunk, ChunkMetadata, Embedder, IndexError, MetadataFilter, RetrievalResult, ScoredChunk, VectorIndex};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use tokio::runtime::Runtime;

use crate::schema::{self, build_chunk_schema};
use crate::table::{backend, ensure_table, float32s, int32s, int64s, open_db, sql_literal, strings};

pub struct ManagedCollection {
	runtime: Runtime,
	table: Table,
	embedder: Arc<dyn Embedder>,
	dim: usize,
	path: PathBuf,
	name: String,
	filter_pushdown: AtomicBool,
}

impl ManagedCollection {
	/// Opens (creating if needed) collection `name` under the database directory `path`.
	pub fn open(path: impl Into<PathBuf>, name: &str, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
		let path = path.into();
		std::fs::create_dir_all(&path).map_err(|e| IndexError::io(&path, e))?;
		let runtime = Runtime::new().map_err(|e| IndexError::io(&path, e))?;
		let dim = embedder.dim();
		let uri = path.to_string_lossy().to_string();
		let table = runtime.block_on(async {
			let conn = open_db(&uri).await?;
			ensure_table(&conn, name, build_chunk_schema(dim as i32)).await
		})?;
		let stored = runtime.block_on(table.schema()).map_err(backend)?;
		match schema::vector_dim(&stored) {
			Some(found) if found != dim => return Err(IndexError::DimensionMismatch { expected: dim, found }),
			Some(_) => {}
			None => return Err(IndexError::Backend(format!("collection '{name}' has no vector column"))),
		}
		tracing::info!(path = %path.display(), collection = name, "opened managed collection");
		Ok(Self { runtime, table, embedder, dim, path, name: name.to_string(), filter_pushdown: AtomicBool::new(true) })
	}

	pub fn path(&self) -> &Path { &self.path }

	pub fn name(&self) -> &str { &self.name }

	/// Stored ids in insertion order, for inspection.
	pub fn ids(&self) -> Result<Vec<String>, IndexError> {
		let batches = self.runtime.block_on(async {
			let stream = self.table.query().select(Select::columns(&[schema::ID])).execute().await.map_err(backend)?;
			stream.try_collect::<Vec<RecordBatch>>().await.map_err(backend)
		})?;
		let mut ids = Vec::new();
		for batch in &batches {
			let col = strings(batch, schema::ID)?;
			ids.extend((0..batch.num_rows()).map(|i| col.value(i).to_string()));
		}
		Ok(ids)
	}

	fn existing_keys(&self, sources: &BTreeSet<&str>) -> Result<HashSet<(String, u64)>, IndexError> {
		let list = sources.iter().map(|s| sql_literal(s)).collect::<Vec<_>>().join(", ");
		let predicate = format!("{} IN ({list})", schema::SOURCE);
		let batches = self.runtime.block_on(async {
			let stream = self
				.table
				.query()
				.only_if(predicate)
				.select(Select::columns(&[schema::SOURCE, schema::SEQUENCE_ID]))
				.execute()
				.await
				.map_err(backend)?;
			stream.try_collect::<Vec<RecordBatch>>().await.map_err(backend)
		})?;
		let mut keys = HashSet::new();
		for batch in &batches {
			let src = strings(batch, schema::SOURCE)?;
			let seq = int64s(batch, schema::SEQUENCE_ID)?;
			for i in 0..batch.num_rows() {
				keys.insert((src.value(i).to_string(), seq.value(i) as u64));
			}
		}
		Ok(keys)
	}

	fn to_record_batch(&self, chunks: &[Chunk], embeddings: Vec<Vec<f32>>, first_id: usize) -> Result<RecordBatch, IndexError> {
		let ids: Vec<String> = (0..chunks.len()).map(|i| format!("chunk_{}", first_id + i)).collect();
		let vectors = embeddings.into_iter().map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>()));
		RecordBatch::try_new(
			build_chunk_schema(self.dim as i32),
			vec![
				Arc::new(StringArray::from(ids)),
				Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.source.as_str()))),
				Arc::new(Int32Array::from_iter_values(chunks.iter().map(|c| c.page as i32))),
				Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.section.as_str()))),
				Arc::new(Int64Array::from_iter_values(chunks.iter().map(|c| c.sequence_id as i64))),
				Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.text.as_str()))),
				Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, self.dim as i32)),
			],
		)
		.map_err(backend)
	}

	/// Switches native predicate filtering on or off. With it off, filtered
	/// searches rank the whole collection and drop non-matching rows.
	pub fn with_filter_pushdown(self, enabled: bool) -> Self {
		self.filter_pushdown.store(enabled, AtomicOrdering::Relaxed);
		self
	}

	pub fn filter_pushdown(&self) -> bool { self.filter_pushdown.load(AtomicOrdering::Relaxed) }

	async fn nearest(&self, q: &[f32], limit: usize, predicate: Option<&str>) -> lancedb::Result<Vec<RecordBatch>> {
		let mut query = self.table.vector_search(q.to_vec())?.distance_type(DistanceType::Cosine).limit(limit);
		if let Some(p) = predicate {
			query = query.only_if(p.to_string());
		}
		query.execute().await?.try_collect::<Vec<RecordBatch>>().await
	}

	/// Top `k` hits in `compare_hits` order. The fetch widens while the cut-off
	/// falls inside a run of equal scores, so ties resolve by `sequence_id`
	/// rather than scan order. `None` when the backend rejects `predicate`.
	async fn ranked(&self, q: &[f32], k: usize, total: usize, predicate: Option<&str>) -> Result<Option<Vec<ScoredChunk>>, IndexError> {
		let mut limit = (k + 1).min(total);
		loop {
			let batches = match self.nearest(q, limit, predicate).await {
				Ok(batches) => batches,
				Err(e) if predicate.is_some() && predicate_unsupported(&e) => {
					tracing::warn!(collection = %self.name, error = %e, "filter pushdown rejected, post-filtering instead");
					return Ok(None);
				}
				Err(e) => return Err(backend(e)),
			};
			let mut hits = hits_from_batches(&batches)?;
			hits.sort_by(compare_hits);
			let split = hits.len() > k && (hits[k - 1].score - hits[k].score).abs() <= f32::EPSILON;
			if !split || limit >= total {
				hits.truncate(k);
				return Ok(Some(hits));
			}
			limit = (limit * 2).min(total);
		}
	}
}

/// Errors that mean the predicate itself cannot be evaluated, as opposed to
/// I/O or storage failures.
fn predicate_unsupported(e: &lancedb::Error) -> bool {
	matches!(e, lancedb::Error::InvalidInput { .. } | lancedb::Error::NotSupported { .. })
}

fn filter_predicate(filter: &MetadataFilter) -> String {
	match filter {
		MetadataFilter::Source(s) => format!("{} = {}", schema::SOURCE, sql_literal(s)),
		MetadataFilter::Page(p) => format!("{} = {p}", schema::PAGE),
		MetadataFilter::Section(s) => format!("{} = {}", schema::SECTION, sql_literal(s)),
	}
}

fn hits_from_batches(batches: &[RecordBatch]) -> Result<Vec<ScoredChunk>, IndexError> {
	let mut hits = Vec::new();
	for batch in batches {
		let text = strings(batch, schema::TEXT)?;
		let source = strings(batch, schema::SOURCE)?;
		let page = int32s(batch, schema::PAGE)?;
		let section = strings(batch, schema::SECTION)?;
		let seq = int64s(batch, schema::SEQUENCE_ID)?;
		let distance = float32s(batch, schema::DISTANCE)?;
		for i in 0..batch.num_rows() {
			let section = section.value(i);
			hits.push(ScoredChunk {
				text: text.value(i).to_string(),
				metadata: ChunkMetadata {
					source: source.value(i).to_string(),
					page: Some(page.value(i) as u32),
					section: if section.is_empty() { None } else { Some(section.to_string()) },
					sequence_id: seq.value(i) as u64,
				},
				score: 1.0 - distance.value(i),
			});
		}
	}
	Ok(hits)
}

impl VectorIndex for ManagedCollection {
	fn backend(&self) -> &'static str { "managed" }

	fn add(&mut self, chunks: &[Chunk]) -> Result<(), IndexError> {
		if chunks.is_empty() {
			return Ok(());
		}
		let sources: BTreeSet<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
		let existing = self.existing_keys(&sources)?;
		check_batch(chunks, |source, seq| existing.contains(&(source.to_string(), seq)))?;

		let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
		let embeddings = self.embedder.embed_batch(&texts).map_err(IndexError::Embedding)?;
		if embeddings.len() != chunks.len() {
			return Err(IndexError::Embedding(anyhow::anyhow!(
				"embedder returned {} vectors for {} texts",
				embeddings.len(),
				chunks.len()
			)));
		}
		if let Some(bad) = embeddings.iter().find(|v| v.len() != self.dim) {
			return Err(IndexError::DimensionMismatch { expected: self.dim, found: bad.len() });
		}

		let count = self.count()?;
		let batch = self.to_record_batch(chunks, embeddings, count)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		self.runtime.block_on(async { self.table.add(reader).execute().await }).map_err(backend)?;
		tracing::debug!(collection = %self.name, added = chunks.len(), total = count + chunks.len(), "collection updated");
		Ok(())
	}

	fn search(&self, query: &str, k: usize, filter: Option<&MetadataFilter>) -> Result<RetrievalResult, IndexError> {
		if k == 0 {
			return Ok(RetrievalResult::default());
		}
		let total = self.count()?;
		if total == 0 {
			return Ok(RetrievalResult::default());
		}
		let q = self
			.embedder
			.embed_batch(&[query.to_string()])
			.map_err(IndexError::Embedding)?
			.into_iter()
			.next()
			.ok_or_else(|| IndexError::Embedding(anyhow::anyhow!("embedder returned no vector for the query")))?;
		if q.len() != self.dim {
			return Err(IndexError::DimensionMismatch { expected: self.dim, found: q.len() });
		}

		let hits = match filter {
			None => self.runtime.block_on(self.ranked(&q, k, total, None))?.unwrap_or_default(),
			Some(f) => {
				let pushed = if self.filter_pushdown() {
					let predicate = filter_predicate(f);
					let hits = self.runtime.block_on(self.ranked(&q, k, total, Some(&predicate)))?;
					if hits.is_none() {
						self.filter_pushdown.store(false, AtomicOrdering::Relaxed);
					}
					hits
				} else {
					None
				};
				match pushed {
					Some(hits) => hits,
					None => {
						let all = self.runtime.block_on(self.ranked(&q, total, total, None))?.unwrap_or_default();
						all.into_iter().filter(|h| f.matches(&h.metadata)).take(k).collect()
					}
				}
			}
		};
		Ok(RetrievalResult::from_hits(hits))
	}

	fn count(&self) -> Result<usize, IndexError> {
		self.runtime.block_on(self.table.count_rows(None)).map_err(backend)
	}

	fn sources(&self) -> Result<BTreeSet<String>, IndexError> {
		let batches = self.runtime.block_on(async {
			let stream = self.table.query().select(Select::columns(&[schema::SOURCE])).execute().await.map_err(backend)?;
			stream.try_collect::<Vec<RecordBatch>>().await.map_err(backend)
		})?;
		let mut out = BTreeSet::new();
		for batch in &batches {
			let col = strings(batch, schema::SOURCE)?;
			out.extend((0..batch.num_rows()).map(|i| col.value(i).to_string()));
		}
		Ok(out)
	}

	fn clear(&mut self) -> Result<(), IndexError> {
		self.runtime.block_on(self.table.delete("true")).map_err(backend)?;
		tracing::info!(collection = %self.name, "collection cleared");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_predicate_errors_disable_pushdown() {
		assert!(predicate_unsupported(&lancedb::Error::InvalidInput { message: "bad filter".into() }));
		assert!(predicate_unsupported(&lancedb::Error::NotSupported { message: "filter".into() }));
		assert!(!predicate_unsupported(&lancedb::Error::Runtime { message: "disk".into() }));
		assert!(!predicate_unsupported(&lancedb::Error::TableNotFound { name: "documents".into(), source: "missing".into() }));
	}

	#[test]
	fn predicates_quote_strings() {
		assert_eq!(filter_predicate(&MetadataFilter::Source("o'neil.txt".into())), "source = 'o''neil.txt'");
		assert_eq!(filter_predicate(&MetadataFilter::Page(4)), "page = 4");
	}
}
