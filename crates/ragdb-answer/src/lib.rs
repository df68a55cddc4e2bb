//! Retrieval service: one object wiring store, indexer, query engine and
//! answer synthesizer, built once and shared by callers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use ragdb_core::config::{Config, Settings};
use ragdb_core::error::{Error, Result};
use ragdb_core::logging::init_logging;
use ragdb_core::traits::{Embedder, Generator};
use ragdb_core::types::{Answer, CollectionStats, CollectionSummary, IngestReport, Metadata, QueryHit, QueryResult};
use ragdb_embed::load_embedder;
use ragdb_vector::{CorpusStore, Indexer, QueryEngine};

pub mod generate;
pub mod synth;

pub use generate::ChatCompletionGenerator;
pub use synth::AnswerSynthesizer;

pub struct RetrievalService {
    settings: Settings,
    store: Arc<CorpusStore>,
    indexer: Indexer,
    engine: Arc<QueryEngine>,
    synthesizer: AnswerSynthesizer,
}

impl RetrievalService {
    /// Wire the service around explicit capabilities. The store's vector width
    /// is taken from the embedder.
    pub fn open(settings: &Settings, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Result<Self> {
        settings.validate()?;
        let store = Arc::new(CorpusStore::open(settings.store.persist_path(), embedder.dim())?);
        let indexer = Indexer::new(store.clone(), embedder.clone(), settings.chunking);
        let engine = Arc::new(QueryEngine::new(store.clone(), embedder.clone()));
        let synthesizer = AnswerSynthesizer::new(
            engine.clone(),
            generator,
            settings.answer.clone(),
            Duration::from_secs(settings.generation.timeout_secs),
        );
        info!(root = %store.root().display(), embedder = %embedder.embedder_id(), "retrieval service ready");
        Ok(Self { settings: settings.clone(), store, indexer, engine, synthesizer })
    }

    /// Build everything from configuration: logging, the configured embedder
    /// and the HTTP chat generator.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.settings()?;
        init_logging(&settings.logging)?;
        let embedder: Arc<dyn Embedder> = Arc::from(load_embedder(&settings.embedding).map_err(Error::embedding)?);
        let generator = ChatCompletionGenerator::new(&settings.generation).map_err(|e| Error::Generation(format!("{e:#}")))?;
        Self::open(&settings, embedder, Arc::new(generator))
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn index(&self, collection: &str, text: &str, source: &str, extra_metadata: Option<&Metadata>) -> Result<usize> {
        self.indexer.index(collection, text, source, extra_metadata)
    }

    pub fn index_directory(&self, collection: &str, dir: &Path, extra_metadata: Option<&Metadata>) -> Result<IngestReport> {
        self.indexer.index_directory(collection, dir, extra_metadata)
    }

    /// `n_results` falls back to `query.default_n_results`.
    pub fn query(&self, collection: &str, query_text: &str, n_results: Option<usize>) -> Result<QueryResult> {
        self.engine.query(collection, query_text, self.n_or_default(n_results))
    }

    pub fn ask(&self, collection: &str, question: &str, n_results: Option<usize>, include_sources: bool) -> Answer {
        self.synthesizer.ask(collection, question, self.n_or_default(n_results), include_sources)
    }

    pub fn ask_with_instruction(&self, collection: &str, question: &str, system_instruction: &str, n_results: Option<usize>) -> Answer {
        self.synthesizer.ask_with_instruction(collection, question, system_instruction, self.n_or_default(n_results))
    }

    pub fn retrieve_context(&self, collection: &str, question: &str, n_results: Option<usize>) -> Result<Vec<QueryHit>> {
        self.synthesizer.retrieve_context(collection, question, self.n_or_default(n_results))
    }

    pub fn stats(&self, collection: &str) -> CollectionStats { self.store.stats(collection) }

    pub fn list(&self) -> Result<Vec<CollectionSummary>> { self.store.list() }

    pub fn delete(&self, collection: &str) -> Result<()> { self.store.delete(collection) }

    /// Create (or with `overwrite`, recreate) a collection; returns its normalized name.
    pub fn create_collection(&self, collection: &str, overwrite: bool) -> Result<String> {
        Ok(self.store.create_or_get(collection, overwrite)?.name().to_string())
    }

    fn n_or_default(&self, n_results: Option<usize>) -> usize {
        n_results.unwrap_or(self.settings.query.default_n_results)
    }
}
