use anyhow::anyhow;
use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::sync::Arc;
use tracing::debug;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Embedder;
use ragdb_core::types::{Metadata, QueryHit, QueryResult};

use crate::schema::{COL_DISTANCE, COL_DOCUMENT, COL_ID, COL_METADATA};
use crate::store::{resolve_name, storage_err, CorpusStore};

/// Nearest-chunk retrieval by cosine distance.
pub struct QueryEngine { store: Arc<CorpusStore>, embedder: Arc<dyn Embedder> }

impl QueryEngine {
	pub fn new(store: Arc<CorpusStore>, embedder: Arc<dyn Embedder>) -> Self { Self { store, embedder } }

	/// Up to `n_results` hits ordered by ascending distance. An empty collection
	/// yields no hits; a missing one is `Error::NotFound`.
	pub fn query(&self, collection: &str, query_text: &str, n_results: usize) -> Result<QueryResult> {
		if query_text.trim().is_empty() { return Err(Error::InvalidInput("query text must not be empty".into())); }
		if n_results == 0 { return Err(Error::InvalidInput("n_results must be at least 1".into())); }
		let name = resolve_name(collection);
		let handle = self.store.open_collection(&name)?.ok_or_else(|| Error::NotFound(name.clone()))?;
		self.store.ensure_embedder(&handle, self.embedder.embedder_id())?;

		let total = self.store.count(&handle)?;
		if total == 0 {
			debug!(collection = %name, "query on empty collection");
			return Ok(QueryResult { collection: name, hits: Vec::new() });
		}

		let query_vec = self.embedder.embed_batch(&[query_text.to_string()]).map_err(Error::embedding)?
			.into_iter().next().ok_or_else(|| Error::Embedding("embedder returned no vector for query".into()))?;
		if query_vec.len() != self.store.dim() {
			return Err(Error::Embedding(format!("query embedding has {} dims, store expects {}", query_vec.len(), self.store.dim())));
		}

		let limit = n_results.min(total);
		let mut hits = self.store.block_on(nearest(handle.table(), query_vec, limit)).map_err(storage_err)?;
		hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
		hits.truncate(limit);
		debug!(collection = %name, requested = n_results, returned = hits.len(), "query complete");
		Ok(QueryResult { collection: name, hits })
	}
}

async fn nearest(table: &Table, query_vec: Vec<f32>, limit: usize) -> anyhow::Result<Vec<QueryHit>> {
	let mut results = table.vector_search(query_vec)?.distance_type(DistanceType::Cosine).limit(limit).execute().await?;
	let mut hits = Vec::with_capacity(limit);
	while let Some(batch) = results.try_next().await? {
		let ids = string_col(&batch, COL_ID)?;
		let documents = string_col(&batch, COL_DOCUMENT)?;
		let metadatas = string_col(&batch, COL_METADATA)?;
		let distances = batch.column_by_name(COL_DISTANCE).and_then(|c| c.as_any().downcast_ref::<Float32Array>())
			.ok_or_else(|| anyhow!("search result is missing {COL_DISTANCE}"))?;
		for i in 0..batch.num_rows() {
			let metadata: Metadata = serde_json::from_str(metadatas.value(i))?;
			let distance = if distances.is_null(i) { f32::INFINITY } else { distances.value(i) };
			hits.push(QueryHit { id: ids.value(i).to_string(), document: documents.value(i).to_string(), distance, metadata });
		}
	}
	Ok(hits)
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> anyhow::Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("column {name} missing or not utf8"))
}
