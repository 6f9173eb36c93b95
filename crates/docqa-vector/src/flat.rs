//! In-process exact index persisted as a single binary blob.
//!
//! Layout (little-endian):
//! `magic u32 | version u32 | dims u32 | count u32 | meta_len u64 | f32[count*dims] | meta JSON`
//! where the JSON is the list of stored chunks in insertion order.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashSet};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docqa_core::types::{check_batch, compare_hits};
use docqa_core::{Chunk, Embedder, IndexError, MetadataFilter, RetrievalResult, ScoredChunk, VectorIndex};

const FLAT_MAGIC: u32 = 0x4451_4649; // "DQFI"
const FLAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 24;

pub struct FlatIndex {
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
    dim: usize,
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
    keys: HashSet<(String, u64)>,
}

impl FlatIndex {
    /// Opens the blob at `path`, or starts empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        let path = path.into();
        let dim = embedder.dim();
        let mut index = Self { path, embedder, dim, vectors: Vec::new(), chunks: Vec::new(), keys: HashSet::new() };
        if index.path.exists() {
            let bytes = fs::read(&index.path).map_err(|e| IndexError::io(&index.path, e))?;
            let (vectors, chunks) = decode_blob(&index.path, &bytes, dim)?;
            index.keys = chunks.iter().map(|c| (c.source.clone(), c.sequence_id)).collect();
            index.vectors = vectors;
            index.chunks = chunks;
            tracing::info!(path = %index.path.display(), count = index.chunks.len(), "opened flat index");
        }
        Ok(index)
    }

    pub fn path(&self) -> &Path { &self.path }

    fn vector(&self, i: usize) -> &[f32] { &self.vectors[i * self.dim..(i + 1) * self.dim] }

    fn persist(&self) -> Result<(), IndexError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| IndexError::io(&dir, e))?;
        let meta = serde_json::to_vec(&self.chunks)?;
        let tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| IndexError::io(&dir, e))?;
        {
            let mut w = BufWriter::new(tmp.as_file());
            let io = |e| IndexError::io(tmp.path(), e);
            w.write_all(&FLAT_MAGIC.to_le_bytes()).map_err(io)?;
            w.write_all(&FLAT_VERSION.to_le_bytes()).map_err(io)?;
            w.write_all(&(self.dim as u32).to_le_bytes()).map_err(io)?;
            w.write_all(&(self.chunks.len() as u32).to_le_bytes()).map_err(io)?;
            w.write_all(&(meta.len() as u64).to_le_bytes()).map_err(io)?;
            for v in &self.vectors {
                w.write_all(&v.to_le_bytes()).map_err(io)?;
            }
            w.write_all(&meta).map_err(io)?;
            w.flush().map_err(io)?;
        }
        tmp.as_file().sync_all().map_err(|e| IndexError::io(tmp.path(), e))?;
        tmp.persist(&self.path).map_err(|e| IndexError::io(&self.path, e.error))?;
        Ok(())
    }

    fn rollback(&mut self, len: usize) {
        for c in self.chunks.drain(len..) {
            self.keys.remove(&(c.source, c.sequence_id));
        }
        self.vectors.truncate(len * self.dim);
    }
}

fn corrupt(path: &Path, reason: impl Into<String>) -> IndexError {
    IndexError::Corrupt { path: path.to_path_buf(), reason: reason.into() }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn decode_blob(path: &Path, bytes: &[u8], expected_dim: usize) -> Result<(Vec<f32>, Vec<Chunk>), IndexError> {
    if bytes.len() < HEADER_LEN {
        return Err(corrupt(path, format!("{} bytes is shorter than the header", bytes.len())));
    }
    let magic = read_u32(bytes, 0);
    if magic != FLAT_MAGIC {
        return Err(corrupt(path, format!("bad magic {magic:#X}")));
    }
    let version = read_u32(bytes, 4);
    if version != FLAT_VERSION {
        return Err(corrupt(path, format!("unsupported version {version}")));
    }
    let dims = read_u32(bytes, 8) as usize;
    let count = read_u32(bytes, 12) as usize;
    let mut len_buf = [0u8; 8];
    len_buf.copy_from_slice(&bytes[16..24]);
    let meta_len = u64::from_le_bytes(len_buf) as usize;

    let vec_bytes = dims.checked_mul(count).and_then(|n| n.checked_mul(4));
    let expected_len = vec_bytes.and_then(|n| n.checked_add(HEADER_LEN)).and_then(|n| n.checked_add(meta_len));
    let Some((vec_bytes, expected_len)) = vec_bytes.zip(expected_len) else {
        return Err(corrupt(path, "header sizes overflow"));
    };
    if bytes.len() != expected_len {
        return Err(corrupt(path, format!("size {} does not match header ({expected_len})", bytes.len())));
    }
    if count > 0 && dims != expected_dim {
        return Err(IndexError::DimensionMismatch { expected: expected_dim, found: dims });
    }

    let vectors: Vec<f32> = bytes[HEADER_LEN..HEADER_LEN + vec_bytes]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    let chunks: Vec<Chunk> = serde_json::from_slice(&bytes[HEADER_LEN + vec_bytes..])
        .map_err(|e| corrupt(path, format!("metadata: {e}")))?;
    if chunks.len() != count {
        return Err(corrupt(path, format!("{} metadata records for {count} vectors", chunks.len())));
    }
    Ok((vectors, chunks))
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Min-heap entry for top-k selection: the worst kept hit sits on top.
struct HeapEntry<'a> {
    score: f32,
    sequence_id: u64,
    source: &'a str,
    idx: usize,
}

impl HeapEntry<'_> {
    /// `Less` means `self` ranks ahead of `other`.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.sequence_id.cmp(&other.sequence_id))
            .then_with(|| self.source.cmp(other.source))
    }
}

impl PartialEq for HeapEntry<'_> {
    fn eq(&self, other: &Self) -> bool { self.rank(other) == Ordering::Equal }
}

impl Eq for HeapEntry<'_> {}

impl PartialOrd for HeapEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for HeapEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering { self.rank(other) }
}

impl VectorIndex for FlatIndex {
    fn backend(&self) -> &'static str { "flat" }

    fn add(&mut self, chunks: &[Chunk]) -> Result<(), IndexError> {
        if chunks.is_empty() {
            return Ok(());
        }
        check_batch(chunks, |source, seq| self.keys.contains(&(source.to_string(), seq)))?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).map_err(IndexError::Embedding)?;
        if embeddings.len() != chunks.len() {
            return Err(IndexError::Embedding(anyhow_count(chunks.len(), embeddings.len())));
        }
        if let Some(bad) = embeddings.iter().find(|v| v.len() != self.dim) {
            return Err(IndexError::DimensionMismatch { expected: self.dim, found: bad.len() });
        }

        let before = self.chunks.len();
        for (chunk, mut v) in chunks.iter().zip(embeddings) {
            normalize(&mut v);
            self.vectors.extend_from_slice(&v);
            self.keys.insert((chunk.source.clone(), chunk.sequence_id));
            self.chunks.push(chunk.clone());
        }
        if let Err(e) = self.persist() {
            self.rollback(before);
            return Err(e);
        }
        tracing::debug!(added = chunks.len(), total = self.chunks.len(), "flat index updated");
        Ok(())
    }

    fn search(&self, query: &str, k: usize, filter: Option<&MetadataFilter>) -> Result<RetrievalResult, IndexError> {
        if k == 0 || self.chunks.is_empty() {
            return Ok(RetrievalResult::default());
        }
        let mut q = self
            .embedder
            .embed_batch(&[query.to_string()])
            .map_err(IndexError::Embedding)?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::Embedding(anyhow_count(1, 0)))?;
        if q.len() != self.dim {
            return Err(IndexError::DimensionMismatch { expected: self.dim, found: q.len() });
        }
        normalize(&mut q);

        let mut heap: BinaryHeap<HeapEntry<'_>> = BinaryHeap::with_capacity(k + 1);
        for (idx, chunk) in self.chunks.iter().enumerate() {
            if let Some(f) = filter {
                if !f.matches(&chunk.metadata()) {
                    continue;
                }
            }
            let entry = HeapEntry { score: dot(&q, self.vector(idx)), sequence_id: chunk.sequence_id, source: &chunk.source, idx };
            if heap.len() < k {
                heap.push(entry);
            } else if heap.peek().is_some_and(|worst| entry < *worst) {
                heap.pop();
                heap.push(entry);
            }
        }

        let mut hits: Vec<ScoredChunk> = heap
            .into_iter()
            .map(|e| {
                let c = &self.chunks[e.idx];
                ScoredChunk { text: c.text.clone(), metadata: c.metadata(), score: e.score }
            })
            .collect();
        hits.sort_by(compare_hits);
        Ok(RetrievalResult::from_hits(hits))
    }

    fn count(&self) -> Result<usize, IndexError> { Ok(self.chunks.len()) }

    fn sources(&self) -> Result<BTreeSet<String>, IndexError> {
        Ok(self.chunks.iter().map(|c| c.source.clone()).collect())
    }

    fn clear(&mut self) -> Result<(), IndexError> {
        let chunks = std::mem::take(&mut self.chunks);
        let vectors = std::mem::take(&mut self.vectors);
        let keys = std::mem::take(&mut self.keys);
        if let Err(e) = self.persist() {
            self.chunks = chunks;
            self.vectors = vectors;
            self.keys = keys;
            return Err(e);
        }
        tracing::info!(path = %self.path.display(), "flat index cleared");
        Ok(())
    }
}

fn anyhow_count(expected: usize, got: usize) -> anyhow::Error {
    anyhow::anyhow!("embedder returned {got} vectors for {expected} texts")
}
