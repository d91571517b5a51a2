use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use medrag_cli::{init_tracing, load_embedder, load_settings, open_store};
use medrag_core::config::expand_path;
use medrag_core::traits::ChunkStore;
use medrag_rag::IngestionPipeline;

/// Chunk, embed and store guideline documents for retrieval.
#[derive(Parser)]
#[command(name = "medrag-indexer", version, about)]
struct Cli {
    /// Directory of .txt/.md documents (default: data.docs_dir)
    dir: Option<PathBuf>,

    /// Delete every stored chunk before ingesting
    #[arg(long)]
    reset: bool,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = load_settings()?;

    let dir = cli.dir.unwrap_or_else(|| expand_path(&settings.data.docs_dir));
    let store = open_store(&settings)?;
    if cli.reset {
        store.reset()?;
    }
    let pipeline = IngestionPipeline::new(load_embedder(&settings)?, store.clone() as Arc<dyn ChunkStore>)?
        .with_chunking(settings.chunking)?
        .with_progress(!cli.quiet);

    println!("Ingesting documents from {}", dir.display());
    let report = pipeline.ingest_directory(&dir)?;
    for failure in &report.failures {
        eprintln!("  skipped {}: {}", failure.document_name, failure.reason);
    }
    println!(
        "Ingested {}/{} documents, {} chunks written, {} chunks in store",
        report.documents_ingested,
        report.documents_seen,
        report.chunks_written,
        store.count()?
    );
    Ok(())
}
