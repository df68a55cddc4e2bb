use ragdb_core::config::Config;
use ragdb_embed::load_embedder;

fn main() -> anyhow::Result<()> {
    let settings = Config::load()?.settings()?;
    let embedder = load_embedder(&settings.embedding)?;
    let texts = vec!["hello world".to_string(), "rust embeddings".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("{}: B={} dim={}", embedder.embedder_id(), embs.len(), embedder.dim());
    Ok(())
}
