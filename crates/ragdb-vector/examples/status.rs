use ragdb_core::config::Config;
use ragdb_vector::CorpusStore;

// Prints every collection in the configured store with its chunk count.
fn main() -> anyhow::Result<()> {
    let settings = Config::load()?.settings()?;
    let dim = if settings.embedding.use_fake { settings.embedding.fake_dim } else { ragdb_embed::BGE_M3_DIM };
    let store = CorpusStore::open(settings.store.persist_path(), dim)?;
    println!("store: {}", store.root().display());
    for summary in store.list()? {
        println!("  {:<40} {:>8} chunks", summary.name, summary.count);
    }
    Ok(())
}
