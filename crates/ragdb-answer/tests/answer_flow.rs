use std::sync::{Arc, Mutex};
use std::time::Duration;

use ragdb_answer::synth::{FALLBACK_ANSWER, GROUNDING_INSTRUCTION};
use ragdb_answer::RetrievalService;
use ragdb_core::config::Settings;
use ragdb_core::traits::{Embedder, Generator};
use ragdb_core::types::AnswerStatus;
use ragdb_embed::HashEmbedder;
use tempfile::TempDir;

/// Records every call and answers with a fixed string.
#[derive(Default)]
struct RecordingGenerator { calls: Mutex<Vec<(String, String)>> }

impl Generator for RecordingGenerator {
    fn complete(&self, system_instruction: &str, user_prompt: &str) -> anyhow::Result<String> {
        self.calls.lock().expect("lock").push((system_instruction.to_string(), user_prompt.to_string()));
        Ok("Paris.".to_string())
    }
}

struct FailingGenerator;

impl Generator for FailingGenerator {
    fn complete(&self, _: &str, _: &str) -> anyhow::Result<String> {
        anyhow::bail!("rate limited")
    }
}

struct SlowGenerator;

impl Generator for SlowGenerator {
    fn complete(&self, _: &str, _: &str) -> anyhow::Result<String> {
        std::thread::sleep(Duration::from_secs(3));
        Ok("too late".to_string())
    }
}

fn service(tmp: &TempDir, generator: Arc<dyn Generator>, timeout_secs: u64) -> RetrievalService {
    let mut settings = Settings::default();
    settings.store.persist_dir = tmp.path().to_string_lossy().to_string();
    settings.generation.timeout_secs = timeout_secs;
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(128));
    RetrievalService::open(&settings, embedder, generator).expect("service")
}

#[test]
fn ask_on_missing_collection_returns_fallback_without_generating() {
    let tmp = TempDir::new().expect("tmp");
    let generator = Arc::new(RecordingGenerator::default());
    let svc = service(&tmp, generator.clone(), 5);
    let answer = svc.ask("nowhere", "What is the capital of France?", None, true);
    assert_eq!(answer.answer, FALLBACK_ANSWER);
    assert_eq!(answer.status, AnswerStatus::NoContext);
    assert_eq!(answer.sources, Some(Vec::new()));
    assert!(generator.calls.lock().expect("lock").is_empty());
    assert!(!svc.stats("nowhere").exists, "ask must not create collections");
}

#[test]
fn ask_on_empty_collection_is_no_context() {
    let tmp = TempDir::new().expect("tmp");
    let svc = service(&tmp, Arc::new(RecordingGenerator::default()), 5);
    svc.create_collection("blank", false).expect("create");
    let answer = svc.ask("blank", "anything?", Some(3), false);
    assert_eq!(answer.status, AnswerStatus::NoContext);
    assert_eq!(answer.answer, FALLBACK_ANSWER);
}

#[test]
fn grounded_answer_with_source_previews() {
    let tmp = TempDir::new().expect("tmp");
    let generator = Arc::new(RecordingGenerator::default());
    let svc = service(&tmp, generator.clone(), 5);
    svc.index("geo", "Paris is the capital of France.", "france.txt", None).expect("index");
    let long = format!("Berlin is the capital of Germany. {}", "It has many museums. ".repeat(20));
    svc.index("geo", &long, "germany.txt", None).expect("index");

    let answer = svc.ask("geo", "What is the capital of France?", Some(5), true);
    assert_eq!(answer.status, AnswerStatus::Answered);
    assert_eq!(answer.answer, "Paris.");
    let sources = answer.sources.expect("sources");
    assert!(!sources.is_empty() && sources.len() <= 3);
    assert_eq!(sources[0].source, "france.txt");
    assert_eq!(sources[0].chunk_index, 0);
    assert!(sources.iter().all(|s| s.text_preview.chars().count() <= 203));

    let calls = generator.calls.lock().expect("lock");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, GROUNDING_INSTRUCTION);
    assert!(calls[0].1.contains("Paris is the capital of France."));
    assert!(calls[0].1.contains("Question: What is the capital of France?"));
}

#[test]
fn sources_are_omitted_when_not_requested() {
    let tmp = TempDir::new().expect("tmp");
    let svc = service(&tmp, Arc::new(RecordingGenerator::default()), 5);
    svc.index("geo", "Paris is the capital of France.", "france.txt", None).expect("index");
    let answer = svc.ask("geo", "capital?", None, false);
    assert_eq!(answer.status, AnswerStatus::Answered);
    assert!(answer.sources.is_none());
}

#[test]
fn generator_errors_become_soft_answers() {
    let tmp = TempDir::new().expect("tmp");
    let svc = service(&tmp, Arc::new(FailingGenerator), 5);
    svc.index("geo", "Paris is the capital of France.", "france.txt", None).expect("index");
    let answer = svc.ask("geo", "capital?", None, true);
    assert_eq!(answer.status, AnswerStatus::GenerationFailed);
    assert!(answer.answer.starts_with("Error generating answer:"));
    assert!(answer.answer.contains("rate limited"));
    assert_eq!(answer.sources.map(|s| s.len()), Some(1));
}

#[test]
fn slow_generator_times_out() {
    let tmp = TempDir::new().expect("tmp");
    let svc = service(&tmp, Arc::new(SlowGenerator), 1);
    svc.index("geo", "Paris is the capital of France.", "france.txt", None).expect("index");
    let answer = svc.ask("geo", "capital?", None, false);
    assert_eq!(answer.status, AnswerStatus::GenerationFailed);
    assert!(answer.answer.contains("timed out after 1s"), "{}", answer.answer);
}

#[test]
fn blank_question_is_a_retrieval_failure_not_a_panic() {
    let tmp = TempDir::new().expect("tmp");
    let svc = service(&tmp, Arc::new(RecordingGenerator::default()), 5);
    svc.index("geo", "Paris is the capital of France.", "france.txt", None).expect("index");
    let answer = svc.ask("geo", "   ", None, true);
    assert_eq!(answer.status, AnswerStatus::RetrievalFailed);
}

#[test]
fn custom_instruction_is_passed_through() {
    let tmp = TempDir::new().expect("tmp");
    let generator = Arc::new(RecordingGenerator::default());
    let svc = service(&tmp, generator.clone(), 5);
    svc.index("geo", "Paris is the capital of France.", "france.txt", None).expect("index");
    let answer = svc.ask_with_instruction("geo", "capital?", "Explain like a tour guide.", Some(2));
    assert_eq!(answer.status, AnswerStatus::Answered);
    assert!(answer.sources.is_none());
    assert_eq!(generator.calls.lock().expect("lock")[0].0, "Explain like a tour guide.");
}

#[test]
fn retrieve_context_and_management_calls() {
    let tmp = TempDir::new().expect("tmp");
    let svc = service(&tmp, Arc::new(RecordingGenerator::default()), 5);
    assert!(svc.retrieve_context("ghost", "q", None).expect("missing is empty").is_empty());

    let name = svc.create_collection("My Notes!", false).expect("create");
    assert_eq!(name, "My_Notes_0");
    svc.index("My Notes!", "Water boils at 100 degrees.", "water.txt", None).expect("index");
    assert_eq!(svc.stats("My Notes!").count, 1);
    assert_eq!(svc.retrieve_context("My Notes!", "boiling water", None).expect("hits").len(), 1);
    assert_eq!(svc.query("My_Notes_0", "water", Some(10)).expect("query").hits.len(), 1);
    assert_eq!(svc.list().expect("list").len(), 1);
    svc.delete("My Notes!").expect("delete");
    assert!(svc.list().expect("list").is_empty());
}
