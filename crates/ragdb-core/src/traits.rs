/// Text embedding capability shared by indexing and querying.
///
/// Implementations must be order-preserving and deterministic for a given
/// `embedder_id`, and return L2-normalized vectors of length `dim()`.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model and version, e.g. `bge-m3:d1024`.
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Opaque text completion capability used for grounded answers.
pub trait Generator: Send + Sync {
    fn complete(&self, system_instruction: &str, user_prompt: &str) -> anyhow::Result<String>;
}
