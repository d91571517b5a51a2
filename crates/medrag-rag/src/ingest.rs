//! Offline ingestion: documents → word windows → embeddings → chunk store.
use anyhow::{Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use medrag_core::config::ChunkingConfig;
use medrag_core::data_processor::{DataProcessor, LoadFailure};
use medrag_core::traits::{ChunkStore, Embedder};
use medrag_core::types::{Chunk, SourceDocument};
use medrag_core::Error;

/// A document that was skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub document_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents_seen: usize,
    pub documents_ingested: usize,
    pub chunks_written: usize,
    pub failures: Vec<DocumentFailure>,
}

impl IngestReport {
    fn record_load_failures(&mut self, failures: Vec<LoadFailure>) {
        for f in failures {
            self.documents_seen += 1;
            self.failures.push(DocumentFailure { document_name: f.path.display().to_string(), reason: format!("{:#}", f.error) });
        }
    }
}

pub struct IngestionPipeline {
    processor: DataProcessor,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ChunkStore>,
    show_progress: bool,
}

impl IngestionPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn ChunkStore>) -> medrag_core::Result<Self> {
        if let Some(expected) = store.dim() {
            if expected != embedder.dim() {
                return Err(Error::DimensionMismatch { expected, actual: embedder.dim() });
            }
        }
        Ok(Self { processor: DataProcessor::new(), embedder, store, show_progress: false })
    }

    pub fn with_chunking(mut self, config: ChunkingConfig) -> medrag_core::Result<Self> {
        self.processor = DataProcessor::with_config(config)?;
        Ok(self)
    }

    /// Draw a progress bar on stderr while ingesting.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn processor(&self) -> &DataProcessor { &self.processor }

    /// Chunk, embed and upsert every document. A failing document is logged,
    /// recorded in the report and skipped; documents already written stay written.
    pub fn ingest(&self, documents: &[SourceDocument]) -> IngestReport {
        let mut report = IngestReport::default();
        let pb = self.progress_bar(documents.len() as u64);
        for doc in documents {
            report.documents_seen += 1;
            pb.set_message(doc.name.clone());
            match self.ingest_document(doc) {
                Ok(written) => {
                    report.documents_ingested += 1;
                    report.chunks_written += written;
                    tracing::info!(document = %doc.name, chunks = written, "ingested document");
                }
                Err(e) => {
                    tracing::warn!(document = %doc.name, error = %format!("{e:#}"), "skipping document");
                    report.failures.push(DocumentFailure { document_name: doc.name.clone(), reason: format!("{e:#}") });
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        tracing::info!(
            documents = report.documents_ingested,
            failed = report.failures.len(),
            chunks = report.chunks_written,
            "ingestion finished"
        );
        report
    }

    /// Ingest `paths`, each document named by its file name.
    pub fn ingest_paths(&self, paths: &[PathBuf]) -> IngestReport {
        let (documents, failures) = self.processor.load_files(paths);
        self.ingest_loaded(&documents, failures)
    }

    /// Ingest every `.txt`/`.md` file under `dir`, recursively, in path order.
    /// Documents are named by their path relative to `dir`.
    pub fn ingest_directory(&self, dir: &Path) -> Result<IngestReport> {
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("document directory {}", dir.display())).into());
        }
        let (documents, failures) = self.processor.load_directory(dir);
        tracing::info!(dir = %dir.display(), files = documents.len() + failures.len(), "ingesting directory");
        Ok(self.ingest_loaded(&documents, failures))
    }

    fn ingest_loaded(&self, documents: &[SourceDocument], failures: Vec<LoadFailure>) -> IngestReport {
        for f in &failures {
            tracing::warn!(path = %f.path.display(), error = %format!("{:#}", f.error), "could not read document");
        }
        let mut report = self.ingest(documents);
        report.record_load_failures(failures);
        report
    }

    fn ingest_document(&self, doc: &SourceDocument) -> Result<usize> {
        let windows = self.processor.chunk_text(&doc.text);
        if windows.is_empty() {
            tracing::debug!(document = %doc.name, "no words, nothing to store");
            return Ok(0);
        }
        let embeddings = self.embedder.embed_batch(&windows)?;
        if embeddings.len() != windows.len() {
            bail!("embedder returned {} vectors for {} chunks", embeddings.len(), windows.len());
        }
        let dim = self.embedder.dim();
        let chunks = windows
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (text, embedding))| {
                if embedding.len() != dim {
                    return Err(Error::DimensionMismatch { expected: dim, actual: embedding.len() }.into());
                }
                Ok(Chunk { document_name: doc.name.clone(), chunk_index, text, embedding })
            })
            .collect::<Result<Vec<_>>>()?;
        self.store.upsert(&chunks)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
