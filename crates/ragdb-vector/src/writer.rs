use anyhow::Context;
use arrow_array::{RecordBatch, RecordBatchIterator, Int32Array, FixedSizeListArray, StringArray};
use lancedb::Table;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use ragdb_core::chunker::{Chunker, ChunkingConfig};
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Embedder;
use ragdb_core::types::{chunk_id, ChunkRecord, IngestReport, Metadata, META_CHUNK_INDEX, META_CHUNK_SIZE, META_SOURCE};

use crate::schema::{build_chunk_schema, COL_SOURCE};
use crate::store::{storage_err, Collection, CorpusStore};
use crate::table::quote_literal;

/// Chunks, embeds and writes documents into a collection.
///
/// Re-ingesting a source replaces its previous chunks; distinct sources accumulate.
pub struct Indexer {
    store: Arc<CorpusStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
}

impl Indexer {
    pub fn new(store: Arc<CorpusStore>, embedder: Arc<dyn Embedder>, chunking: ChunkingConfig) -> Self {
        Self { store, embedder, chunker: Chunker::new(chunking) }
    }

    /// Index `text` under `source`, returning the number of chunks written.
    pub fn index(&self, collection: &str, text: &str, source: &str, extra_metadata: Option<&Metadata>) -> Result<usize> {
        if source.trim().is_empty() {
            return Err(Error::InvalidInput("source identifier must not be empty".into()));
        }
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            return Err(Error::InvalidInput(format!("text for '{source}' is empty; nothing to index")));
        }

        let collection = self.store.create_or_get(collection, false)?;
        self.store.ensure_embedder(&collection, self.embedder.embedder_id())?;

        debug!(collection = %collection.name(), source, chunks = chunks.len(), "embedding chunks");
        let vectors = self.embedder.embed_batch(&chunks).map_err(Error::embedding)?;
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!("embedder returned {} vectors for {} chunks", vectors.len(), chunks.len())));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.store.dim()) {
            return Err(Error::Embedding(format!("embedding has {} dims, store expects {}", bad.len(), self.store.dim())));
        }

        let records = build_records(source, chunks, vectors, extra_metadata);
        let written = records.len();
        self.write(&collection, source, &records)?;
        self.store.record_embedder(&collection, self.embedder.embedder_id())?;
        info!(collection = %collection.name(), source, chunks = written, "indexed document");
        Ok(written)
    }

    /// Index every `.txt` file under `dir` (sorted). The source of each file is
    /// its path relative to `dir` with `/` separators, so same-named files in
    /// different subfolders stay distinct. Files without any text are skipped.
    pub fn index_directory(&self, collection: &str, dir: &Path, extra_metadata: Option<&Metadata>) -> Result<IngestReport> {
        let files = list_txt_files(dir);
        if files.is_empty() {
            warn!(dir = %dir.display(), "no .txt files found");
            return Ok(IngestReport::default());
        }
        let mut report = IngestReport::default();
        for (file_index, path) in files.iter().enumerate() {
            let source = relative_source(dir, path);
            let content = read_file_content(path)?;
            if content.trim().is_empty() {
                warn!(file = %path.display(), "skipping empty file");
                continue;
            }
            debug!(file = file_index + 1, total = files.len(), source = %source, "ingesting file");
            report.chunks += self.index(collection, &content, &source, extra_metadata)?;
            report.files += 1;
        }
        info!(collection = %collection, files = report.files, chunks = report.chunks, "directory ingest complete");
        Ok(report)
    }

    fn write(&self, collection: &Collection, source: &str, records: &[ChunkRecord]) -> Result<()> {
        let batch = records_to_batch(records, self.store.dim()).map_err(storage_err)?;
        self.store.block_on(replace_source(collection.table(), source, batch)).map_err(storage_err)
    }
}

/// Pair chunks with vectors and build per-chunk metadata. Caller keys are
/// copied first; `source`, `chunk_index` and `chunk_size` always win.
pub fn build_records(source: &str, chunks: Vec<String>, vectors: Vec<Vec<f32>>, extra_metadata: Option<&Metadata>) -> Vec<ChunkRecord> {
    chunks
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(chunk_index, (document, vector))| {
            let mut metadata = extra_metadata.cloned().unwrap_or_default();
            metadata.insert(META_SOURCE.to_string(), source.into());
            metadata.insert(META_CHUNK_INDEX.to_string(), chunk_index.into());
            metadata.insert(META_CHUNK_SIZE.to_string(), document.chars().count().into());
            ChunkRecord { id: chunk_id(source, chunk_index), source: source.to_string(), chunk_index, document, metadata, vector }
        })
        .collect()
}

fn records_to_batch(records: &[ChunkRecord], dim: usize) -> anyhow::Result<RecordBatch> {
    let dim = i32::try_from(dim).context("embedding dim exceeds i32")?;
    let schema = build_chunk_schema(dim);
    let mut ids = Vec::new(); let mut sources = Vec::new(); let mut chunk_indices = Vec::new(); let mut chunk_sizes = Vec::new(); let mut documents = Vec::new(); let mut metadatas = Vec::new(); let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
    for r in records {
        ids.push(r.id.clone());
        sources.push(r.source.clone());
        chunk_indices.push(i32::try_from(r.chunk_index).context("chunk index exceeds i32")?);
        chunk_sizes.push(i32::try_from(r.chunk_size()).context("chunk size exceeds i32")?);
        documents.push(r.document.clone());
        metadatas.push(serde_json::to_string(&r.metadata)?);
        vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
    }
    let record_batch = RecordBatch::try_new(schema, vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(StringArray::from(sources)),
        Arc::new(Int32Array::from(chunk_indices)),
        Arc::new(Int32Array::from(chunk_sizes)),
        Arc::new(StringArray::from(documents)),
        Arc::new(StringArray::from(metadatas)),
        Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
    ])?;
    Ok(record_batch)
}

async fn replace_source(table: &Table, source: &str, batch: RecordBatch) -> anyhow::Result<()> {
    table.delete(&format!("{COL_SOURCE} = {}", quote_literal(source))).await?;
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    table.add(reader).execute().await?;
    Ok(())
}

/// Path of `path` below `root`, joined with `/` whatever the platform separator.
fn relative_source(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
    }
    txt_files.sort(); txt_files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_keys_override_caller_metadata() {
        let mut extra = Metadata::new();
        extra.insert("source".into(), "spoofed".into());
        extra.insert("floor_id".into(), 1.into());
        let records = build_records("guide.pdf", vec!["One.".into(), "Two.".into()], vec![vec![1.0], vec![0.0]], Some(&extra));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "guide.pdf_chunk_1");
        assert_eq!(records[1].metadata["source"], "guide.pdf");
        assert_eq!(records[1].metadata["chunk_index"], 1);
        assert_eq!(records[1].metadata["chunk_size"], 4);
        assert_eq!(records[1].metadata["floor_id"], 1);
    }

    #[test]
    fn record_batch_has_one_row_per_chunk() {
        let records = build_records("a", vec!["x y.".into(), "z.".into()], vec![vec![0.5, 0.5], vec![1.0, 0.0]], None);
        let batch = records_to_batch(&records, 2).expect("batch");
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 7);
    }

    #[test]
    fn relative_sources_use_forward_slashes() {
        let root = Path::new("/data/manual");
        assert_eq!(relative_source(root, &root.join("floor1").join("notes.txt")), "floor1/notes.txt");
        assert_eq!(relative_source(root, &root.join("notes.txt")), "notes.txt");
    }

    #[test]
    fn txt_files_are_listed_sorted_and_filtered() {
        let tmp = tempfile::TempDir::new().expect("tmp");
        fs::create_dir_all(tmp.path().join("nested")).expect("mkdir");
        fs::write(tmp.path().join("b.txt"), "b").expect("write");
        fs::write(tmp.path().join("nested/a.txt"), "a").expect("write");
        fs::write(tmp.path().join("skip.md"), "c").expect("write");
        let files = list_txt_files(tmp.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("b.txt"));
        assert!(files[1].ends_with("nested/a.txt"));
    }
}
