use std::path::PathBuf;

use ragdb_answer::RetrievalService;
use ragdb_core::config::Config;

// Usage: ask <collection> <question> [docs_dir]
// Ingests `docs_dir` (all .txt files) first when given.
fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let collection = args.next().unwrap_or_else(|| "docs".to_string());
    let question = args.next().unwrap_or_else(|| "What is this collection about?".to_string());
    let docs_dir = args.next().map(PathBuf::from);

    let service = RetrievalService::from_config(&Config::load()?)?;
    if let Some(dir) = docs_dir {
        let report = service.index_directory(&collection, &dir, None)?;
        println!("ingested {} files into {} chunks", report.files, report.chunks);
    }
    let answer = service.ask(&collection, &question, None, true);
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}
