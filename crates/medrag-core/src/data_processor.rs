use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ChunkingConfig;
use crate::types::SourceDocument;

/// Extensions of extracted-text files picked up from a corpus directory.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md"];

/// A document that could not be loaded, kept so the caller can report it.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: anyhow::Error,
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> crate::error::Result<Self> {
        chunking_config.validate()?;
        Ok(Self { chunking_config })
    }

    pub fn chunking_config(&self) -> ChunkingConfig { self.chunking_config }

    /// Split `text` into windows of `window_words` words, advancing `stride_words`.
    ///
    /// The last window may be shorter; once a window reaches the end of the text
    /// no further windows are produced. Whitespace-only text yields no windows.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let ChunkingConfig { window_words, stride_words } = self.chunking_config;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + window_words).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start += stride_words;
        }
        chunks
    }

    /// Load every document under `data_dir`, named by its path relative to
    /// `data_dir`; unreadable files are returned as failures.
    pub fn load_directory(&self, data_dir: &Path) -> (Vec<SourceDocument>, Vec<LoadFailure>) {
        let files = self.list_document_files(data_dir);
        if files.is_empty() {
            tracing::warn!(dir = %data_dir.display(), "no documents found");
        }
        self.load_named(&files, |path| relative_document_name(data_dir, path))
    }

    /// Load `files`, each named by its file name.
    pub fn load_files(&self, files: &[PathBuf]) -> (Vec<SourceDocument>, Vec<LoadFailure>) {
        self.load_named(files, document_name)
    }

    fn load_named(
        &self,
        files: &[PathBuf],
        name_of: impl Fn(&Path) -> Result<String>,
    ) -> (Vec<SourceDocument>, Vec<LoadFailure>) {
        let mut documents = Vec::new();
        let mut failures = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::debug!(file = %file_path.display(), "loading document {}/{}", file_index + 1, files.len());
            let loaded = name_of(file_path).and_then(|name| {
                let text = self.read_file_content(file_path)?;
                Ok(SourceDocument { name, text })
            });
            match loaded {
                Ok(doc) => documents.push(doc),
                Err(error) => {
                    tracing::warn!(file = %file_path.display(), error = %error, "skipping unreadable document");
                    failures.push(LoadFailure { path: file_path.clone(), error });
                }
            }
        }
        (documents, failures)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        let bytes = fs::read(file_path).with_context(|| format!("reading {}", file_path.display()))?;
        match String::from_utf8(bytes) {
            Ok(content) => Ok(content),
            Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).to_string()),
        }
    }

    pub fn list_document_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase);
            if ext.is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str())) { files.push(path.to_path_buf()); }
        }
        files.sort(); files
    }
}

/// File name (with extension) used as the document identity in the store.
pub fn document_name(file_path: &Path) -> Result<String> {
    file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow::anyhow!("{} has no file name", file_path.display()))
}

/// Path of `file_path` below `root`, `/`-separated, so that equally named
/// files in different subdirectories stay distinct documents. Files outside
/// `root` fall back to their file name.
pub fn relative_document_name(root: &Path, file_path: &Path) -> Result<String> {
    let Ok(relative) = file_path.strip_prefix(root) else {
        return document_name(file_path);
    };
    let parts: Vec<String> = relative.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect();
    if parts.is_empty() {
        return document_name(file_path);
    }
    Ok(parts.join("/"))
}
