//! Domain types shared by the store, query engine and answer synthesizer.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Per-chunk metadata map as persisted alongside each chunk.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata keys owned by the indexer. They always win over caller keys.
pub const META_SOURCE: &str = "source";
pub const META_CHUNK_INDEX: &str = "chunk_index";
pub const META_CHUNK_SIZE: &str = "chunk_size";

/// External id of a chunk: `{source}_chunk_{index}`.
pub fn chunk_id(source: &str, chunk_index: usize) -> ChunkId {
    format!("{source}_chunk_{chunk_index}")
}

/// A chunk ready to be written: text, embedding and merged metadata.
///
/// - `id`: unique within a collection, see [`chunk_id`]
/// - `source`: originating document identifier
/// - `chunk_index`: zero-based position within the source document
/// - `document`: the chunk text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub source: String,
    pub chunk_index: usize,
    pub document: String,
    pub metadata: Metadata,
    pub vector: Vec<f32>,
}

impl ChunkRecord {
    /// Chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.document.chars().count()
    }
}

/// One ranked query hit. Lower `distance` is closer (cosine distance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHit {
    pub id: ChunkId,
    pub document: String,
    pub distance: f32,
    pub metadata: Metadata,
}

impl QueryHit {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).and_then(|v| v.as_str())
    }

    pub fn chunk_index(&self) -> Option<u64> {
        self.metadata.get(META_CHUNK_INDEX).and_then(|v| v.as_u64())
    }
}

/// Hits for one query, ordered by ascending distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub collection: String,
    pub hits: Vec<QueryHit>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|h| h.document.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub name: String,
    pub count: usize,
    pub exists: bool,
}

impl CollectionStats {
    pub fn missing(name: &str) -> Self {
        Self { name: name.to_string(), count: 0, exists: false }
    }
}

/// Totals for a batch ingest of several documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub files: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePreview {
    pub text_preview: String,
    pub source: String,
    pub chunk_index: u64,
}

/// How an answer was produced; lets callers branch without parsing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// Generated from retrieved context.
    Answered,
    /// Collection missing or empty; fallback text, generator not called.
    NoContext,
    /// Retrieval itself failed (e.g. embedding error).
    RetrievalFailed,
    /// The generator failed or timed out; `answer` holds the error text.
    GenerationFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub status: AnswerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourcePreview>>,
}
