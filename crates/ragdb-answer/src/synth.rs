//! Grounded answers: retrieve passages, bound the context, call the generator.
//!
//! `ask` never fails. Missing context, retrieval errors and generation errors
//! all come back as an [`Answer`] whose `status` says what happened.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use ragdb_core::config::AnswerSettings;
use ragdb_core::error::Result;
use ragdb_core::traits::Generator;
use ragdb_core::types::{Answer, AnswerStatus, QueryHit, SourcePreview};
use ragdb_vector::QueryEngine;

pub const FALLBACK_ANSWER: &str = "I couldn't find any relevant information in the knowledge base. \
Please make sure documents have been uploaded and processed.";

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub const GROUNDING_INSTRUCTION: &str = "You are a knowledgeable tutor that provides accurate, direct answers based on the given context.

Your responsibilities:
1. Answer questions using ONLY information from the provided context
2. Be factual, clear, and concise
3. If the answer is not in the context, state that clearly
4. Do not create mnemonics, acronyms, memory devices, or associations
5. Do not make up information or add extra elaboration not supported by the context
6. Answer the specific question asked without tangential information";

pub struct AnswerSynthesizer {
    engine: Arc<QueryEngine>,
    generator: Arc<dyn Generator>,
    settings: AnswerSettings,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(engine: Arc<QueryEngine>, generator: Arc<dyn Generator>, settings: AnswerSettings, timeout: Duration) -> Self {
        Self { engine, generator, settings, timeout }
    }

    /// Answer `question` from the top `n_results` passages of `collection`.
    pub fn ask(&self, collection: &str, question: &str, n_results: usize, include_sources: bool) -> Answer {
        info!(collection, n_results, "answering question");
        let hits = match self.retrieve(collection, question, n_results) {
            Ok(hits) => hits,
            Err(status) => return soft_answer(status, Some(Vec::new())),
        };
        let (answer, status) = self.generate_from(&hits, question, GROUNDING_INSTRUCTION);
        let sources = include_sources.then(|| source_previews(&hits, self.settings.max_sources, self.settings.preview_chars));
        Answer { answer, status, sources }
    }

    /// Same pipeline with a caller-chosen system instruction and no sources.
    pub fn ask_with_instruction(&self, collection: &str, question: &str, system_instruction: &str, n_results: usize) -> Answer {
        let hits = match self.retrieve(collection, question, n_results) {
            Ok(hits) => hits,
            Err(status) => return soft_answer(status, None),
        };
        let (answer, status) = self.generate_from(&hits, question, system_instruction);
        Answer { answer, status, sources: None }
    }

    /// Retrieved passages only. A missing collection yields an empty list.
    pub fn retrieve_context(&self, collection: &str, question: &str, n_results: usize) -> Result<Vec<QueryHit>> {
        match self.engine.query(collection, question, n_results) {
            Ok(result) => Ok(result.hits),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn retrieve(&self, collection: &str, question: &str, n_results: usize) -> std::result::Result<Vec<QueryHit>, SoftStatus> {
        match self.retrieve_context(collection, question, n_results) {
            Ok(hits) if hits.is_empty() => {
                info!(collection, "no context retrieved");
                Err(SoftStatus::NoContext)
            }
            Ok(hits) => {
                debug!(collection, hits = hits.len(), "context retrieved");
                Ok(hits)
            }
            Err(e) => {
                warn!(collection, error = %e, "retrieval failed");
                Err(SoftStatus::RetrievalFailed(e.to_string()))
            }
        }
    }

    fn generate_from(&self, hits: &[QueryHit], question: &str, system_instruction: &str) -> (String, AnswerStatus) {
        let context = assemble_context(hits.iter().map(|h| h.document.as_str()), self.settings.max_context_chars);
        match self.generate(system_instruction, build_user_prompt(&context, question)) {
            Ok(text) => (text, AnswerStatus::Answered),
            Err(message) => {
                warn!(error = %message, "generation failed");
                (message, AnswerStatus::GenerationFailed)
            }
        }
    }

    /// Run the generator on a worker thread; past the timeout the call is
    /// abandoned and its eventual result dropped.
    fn generate(&self, system_instruction: &str, user_prompt: String) -> std::result::Result<String, String> {
        let (tx, rx) = mpsc::channel();
        let generator = Arc::clone(&self.generator);
        let system_instruction = system_instruction.to_string();
        let spawned = thread::Builder::new().name("ragdb-generate".into()).spawn(move || {
            let _ = tx.send(generator.complete(&system_instruction, &user_prompt));
        });
        if let Err(e) = spawned {
            return Err(format!("Error generating answer: {e}"));
        }
        match rx.recv_timeout(self.timeout) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(format!("Error generating answer: {e:#}")),
            Err(RecvTimeoutError::Timeout) => Err(format!("Error generating answer: timed out after {:?}", self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err("Error generating answer: generator stopped without a result".into()),
        }
    }
}

enum SoftStatus {
    NoContext,
    RetrievalFailed(String),
}

fn soft_answer(status: SoftStatus, sources: Option<Vec<SourcePreview>>) -> Answer {
    match status {
        SoftStatus::NoContext => Answer { answer: FALLBACK_ANSWER.to_string(), status: AnswerStatus::NoContext, sources },
        SoftStatus::RetrievalFailed(msg) => Answer { answer: format!("Error retrieving context: {msg}"), status: AnswerStatus::RetrievalFailed, sources },
    }
}

pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!("Based on the following context, answer the question.\n\nContext:\n{context}\n\nQuestion: {question}\n\nAnswer the question directly using only the information in the context above.")
}

/// Join passages in rank order with [`CONTEXT_SEPARATOR`], keeping whole
/// passages while the total stays within `max_chars`. A first passage that is
/// already too long is cut.
pub fn assemble_context<'a>(passages: impl IntoIterator<Item = &'a str>, max_chars: usize) -> String {
    let sep_len = CONTEXT_SEPARATOR.chars().count();
    let mut context = String::new();
    let mut used = 0usize;
    for (i, passage) in passages.into_iter().enumerate() {
        let len = passage.chars().count();
        if i == 0 {
            if len > max_chars {
                return truncate_chars(passage, max_chars).to_string();
            }
            context.push_str(passage);
            used = len;
            continue;
        }
        if used + sep_len + len > max_chars {
            break;
        }
        context.push_str(CONTEXT_SEPARATOR);
        context.push_str(passage);
        used += sep_len + len;
    }
    context
}

/// First `max_chars` characters plus `...` when the text is longer.
pub fn preview(text: &str, max_chars: usize) -> String {
    let cut = truncate_chars(text, max_chars);
    if cut.len() < text.len() { format!("{cut}...") } else { text.to_string() }
}

pub fn source_previews(hits: &[QueryHit], max_sources: usize, preview_chars: usize) -> Vec<SourcePreview> {
    hits.iter()
        .take(max_sources)
        .map(|h| SourcePreview {
            text_preview: preview(&h.document, preview_chars),
            source: h.source().unwrap_or("Unknown").to_string(),
            chunk_index: h.chunk_index().unwrap_or(0),
        })
        .collect()
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
