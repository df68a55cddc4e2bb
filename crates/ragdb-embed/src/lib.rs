//! Embedding models behind the `ragdb_core::traits::Embedder` capability.
//!
//! - [`BgeM3Embedder`]: BGE-M3 (XLM-RoBERTa) on candle, 1024-dim, masked-mean pooled.
//! - [`HashEmbedder`]: deterministic token hashing, no model files. Used by tests
//!   and selected by `embedding.use_fake` or `APP_USE_FAKE_EMBEDDINGS=1`.

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{Device, DType, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{XLMRobertaModel, Config as XLMRobertaConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use ragdb_core::config::EmbeddingSettings;
use ragdb_core::traits::Embedder;

pub mod encode;
pub mod pool;

pub use encode::TokenWindow;
pub use pool::sentence_embedding;

pub const BGE_M3_DIM: usize = 1024;

pub struct BgeM3Embedder { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, max_len: usize, id: String }

impl BgeM3Embedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let device = encode::embedding_device();
        let model_dir = resolve_model_dir(settings.model_dir.as_deref())?;
        info!(model_dir = %model_dir.display(), "loading BGE-M3 model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!("BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device, max_len: settings.max_len, id: format!("bge-m3:d{BGE_M3_DIM}") })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let window = TokenWindow::encode(&self.tokenizer, text, self.max_len)?;
        let (input_ids, attention_mask) = window.to_tensors(&self.device)?;
        let token_type_ids = Tensor::zeros((1, window.width()), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = sentence_embedding(&hidden, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if emb.len() != BGE_M3_DIM {
            return Err(anyhow!("BGE-M3 returned {} dims, expected {}", emb.len(), BGE_M3_DIM));
        }
        let elapsed = start.elapsed().as_millis();
        if elapsed > 100 { debug!(elapsed_ms = elapsed as u64, tokens = window.real_tokens(), "slow embedding"); }
        Ok(emb)
    }
}

impl Embedder for BgeM3Embedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { BGE_M3_DIM }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

/// Bag-of-hashed-tokens embedder. Tokens are lowercased and stripped of
/// surrounding punctuation, so "France." and "France?" land on the same slot.
pub struct HashEmbedder { dim: usize, id: String }

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, id: format!("hash-xx64:d{dim}") } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        let tokens = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|t| !t.is_empty());
        for (i, token) in tokens.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn fake_requested_by_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Build the configured embedder once; callers share it behind an `Arc`.
pub fn load_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if settings.use_fake || fake_requested_by_env() {
        anyhow::ensure!(settings.fake_dim > 0, "embedding.fake_dim must be at least 1");
        info!(dim = settings.fake_dim, "using HashEmbedder");
        return Ok(Box::new(HashEmbedder::new(settings.fake_dim)));
    }
    Ok(Box::new(BgeM3Embedder::new(settings)?))
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = ragdb_core::config::expand_path(dir);
        if p.exists() { return Ok(p); }
        warn!(model_dir = %p.display(), "configured model dir does not exist, falling back");
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) { let p = PathBuf::from(&dir); if p.exists() { debug!(var, "model dir from env"); return Ok(p); } }
    }
    for candidate in ["../models/bge-m3", "models/bge-m3"] {
        let p = Path::new(candidate); if p.exists() { return Ok(p.to_path_buf()); }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}
