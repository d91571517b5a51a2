#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use medrag_core::store::MemoryChunkStore;
use medrag_core::traits::{ChunkStore, Embedder, GenerateRequest, Generator};
use medrag_core::types::Chunk;
use medrag_core::GenerateError;
use medrag_rag::{AnswerPipeline, PipelineConfig};

pub const DIM: usize = 4;

/// Unit vector whose cosine similarity with `e0` is exactly `sim`.
pub fn at_similarity(sim: f32) -> Vec<f32> {
    vec![sim, (1.0 - sim * sim).max(0.0).sqrt(), 0.0, 0.0]
}

pub fn e(i: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[i] = 1.0;
    v
}

/// Returns the vector registered for a text, or `default` for anything else.
pub struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    default: Vec<f32>,
    fail_on: Option<String>,
}

impl ScriptedEmbedder {
    pub fn new(default: Vec<f32>) -> Self {
        Self { vectors: HashMap::new(), default, fail_on: None }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Fail any batch containing a text that includes `marker`.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }
}

impl Embedder for ScriptedEmbedder {
    fn dim(&self) -> usize { DIM }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if let Some(marker) = &self.fail_on {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                anyhow::bail!("embedder refused input");
            }
        }
        Ok(texts.iter().map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| self.default.clone())).collect())
    }
}

pub enum Reply {
    Text(String),
    Fail(GenerateError),
}

/// Replies per model (or with a default) and records every prompt it saw.
pub struct ScriptedGenerator {
    replies: HashMap<String, Reply>,
    default: Reply,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub fn replying(text: &str) -> Self {
        Self { replies: HashMap::new(), default: Reply::Text(text.to_string()), prompts: Mutex::new(Vec::new()) }
    }

    pub fn failing(err: GenerateError) -> Self {
        Self { replies: HashMap::new(), default: Reply::Fail(err), prompts: Mutex::new(Vec::new()) }
    }

    pub fn for_model(mut self, model: &str, reply: Reply) -> Self {
        self.replies.insert(model.to_string(), reply);
        self
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().last().map(|(_, p)| p.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize { self.prompts.lock().len() }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, request: &GenerateRequest<'_>) -> Result<String, GenerateError> {
        self.prompts.lock().push((request.model.to_string(), request.prompt.to_string()));
        match self.replies.get(request.model).unwrap_or(&self.default) {
            Reply::Text(t) => Ok(t.clone()),
            Reply::Fail(e) => Err(e.clone()),
        }
    }
}

pub fn timeout() -> GenerateError {
    GenerateError::Timeout(Duration::from_secs(30))
}

pub fn stored(doc: &str, idx: usize, text: &str, embedding: Vec<f32>) -> Chunk {
    Chunk { document_name: doc.to_string(), chunk_index: idx, text: text.to_string(), embedding }
}

pub fn memory_store(chunks: &[Chunk]) -> Arc<MemoryChunkStore> {
    let store = Arc::new(MemoryChunkStore::new(DIM));
    store.upsert(chunks).unwrap();
    store
}

pub fn pipeline(
    embedder: ScriptedEmbedder,
    store: Arc<MemoryChunkStore>,
    generator: Arc<ScriptedGenerator>,
) -> AnswerPipeline {
    AnswerPipeline::new(Arc::new(embedder), store as Arc<dyn ChunkStore>, generator, PipelineConfig::default()).unwrap()
}
