//! In-memory vector index over the document corpus.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;

use super::chunker::{split_into_chunks, strip_html_tags, ChunkerConfig, TextChunk};
use super::context::{cosine_similarity, ScoredChunk};
use crate::chat::EngineError;
use crate::core::config::IndexConfig;
use crate::llm::LlmProvider;

const TEXT_EXTENSIONS: [&str; 4] = ["txt", "md", "markdown", "rst"];
const HTML_EXTENSIONS: [&str; 2] = ["html", "htm"];

/// A document read from the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Path relative to the data directory, `/`-separated
    pub source: String,
    pub text: String,
}

/// Reads every supported document below `dir`, recursively, in path order.
/// Hidden entries are skipped; unreadable files are logged and skipped.
pub fn load_documents(dir: &Path) -> Result<Vec<SourceDocument>, EngineError> {
    if !dir.is_dir() {
        return Err(EngineError::Index(format!(
            "data directory {} does not exist",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut documents = Vec::new();
    for path in files {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let is_html = HTML_EXTENSIONS.contains(&ext.as_str());
        if !is_html && !TEXT_EXTENSIONS.contains(&ext.as_str()) {
            tracing::debug!("Skipping unsupported document {}", path.display());
            continue;
        }

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("Failed to read {}: {}", path.display(), err);
                continue;
            }
        };
        let text = if is_html { strip_html_tags(&raw) } else { raw };

        let source = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        documents.push(SourceDocument { source, text });
    }

    Ok(documents)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), EngineError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| EngineError::Index(format!("cannot list {}: {}", dir.display(), e)))?;

    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// A chunk together with its embedding.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: TextChunk,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentIndex {
    entries: Vec<IndexedChunk>,
}

impl DocumentIndex {
    /// Loads, chunks and embeds the corpus under `dir`.
    pub async fn build(
        dir: &Path,
        config: &IndexConfig,
        embedder: &dyn LlmProvider,
    ) -> Result<Self, EngineError> {
        let documents = load_documents(dir)?;
        let chunker = ChunkerConfig {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        };
        let chunks: Vec<TextChunk> = documents
            .iter()
            .flat_map(|doc| split_into_chunks(&doc.text, &doc.source, chunker))
            .collect();

        tracing::info!(
            "Indexing {} documents as {} chunks from {}",
            documents.len(),
            chunks.len(),
            dir.display()
        );

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(config.embed_batch_size.max(1)) {
            let inputs: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = embedder.embed(&inputs).await?;
            if embeddings.len() != batch.len() {
                return Err(EngineError::Index(format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }
            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| IndexedChunk { chunk, embedding }),
            );
        }

        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<IndexedChunk>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `top_k` chunks most similar to `query`, best first.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

/// Process-wide handle to the document index. The index is built at most
/// once; later build requests return the existing index.
#[derive(Clone, Default)]
pub struct IndexHandle {
    cell: Arc<OnceCell<Arc<DocumentIndex>>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_built(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn build_once<F, Fut>(&self, build: F) -> Result<Arc<DocumentIndex>, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DocumentIndex, EngineError>>,
    {
        if let Some(index) = self.cell.get() {
            tracing::debug!("Document index already built, reusing it");
            return Ok(index.clone());
        }

        self.cell
            .get_or_try_init(|| async { build().await.map(Arc::new) })
            .await
            .cloned()
    }

    pub fn get(&self) -> Result<Arc<DocumentIndex>, EngineError> {
        self.cell.get().cloned().ok_or(EngineError::IndexNotBuilt)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::llm::{ChatRequest, LlmError};

    /// Embeds text as keyword counts over a tiny fixed vocabulary.
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    const VOCAB: [&str; 3] = ["motionwise", "ecu", "weather"];

    fn keyword_vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCAB
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect()
    }

    #[async_trait]
    impl LlmProvider for KeywordEmbedder {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<String, LlmError> {
            Ok(String::new())
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(inputs.iter().map(|text| keyword_vector(text)).collect())
        }
    }

    fn write_corpus(dir: &Path) {
        fs::create_dir_all(dir.join("guides")).unwrap();
        fs::write(dir.join("overview.md"), "Motionwise is TTTech Auto's safety platform.").unwrap();
        fs::write(
            dir.join("guides").join("hw.html"),
            "<html><body><p>The ECU hosts Motionwise.</p></body></html>",
        )
        .unwrap();
        fs::write(dir.join("image.png"), [0u8, 1, 2]).unwrap();
        fs::write(dir.join(".hidden.md"), "secret").unwrap();
    }

    #[test]
    fn load_documents_walks_recursively_and_filters() {
        let tmp = tempfile::tempdir().unwrap();
        write_corpus(tmp.path());

        let docs = load_documents(tmp.path()).unwrap();
        let sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["guides/hw.html", "overview.md"]);
        assert_eq!(docs[0].text, "The ECU hosts Motionwise.");
    }

    #[test]
    fn missing_data_dir_is_an_index_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_documents(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, EngineError::Index(_)));
    }

    #[tokio::test]
    async fn build_embeds_in_batches_and_search_ranks_by_similarity() {
        let tmp = tempfile::tempdir().unwrap();
        write_corpus(tmp.path());
        fs::write(tmp.path().join("weather.txt"), "Weather is out of scope.").unwrap();
        let embedder = KeywordEmbedder {
            calls: AtomicUsize::new(0),
        };
        let config = IndexConfig {
            embed_batch_size: 2,
            ..Default::default()
        };

        let index = DocumentIndex::build(tmp.path(), &config, &embedder).await.unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

        let hits = index.search(&keyword_vector("weather"), 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.source, "weather.txt");
    }

    #[tokio::test]
    async fn handle_builds_only_once() {
        let handle = IndexHandle::new();
        assert!(!handle.is_built());
        assert!(matches!(handle.get(), Err(EngineError::IndexNotBuilt)));

        let builds = AtomicUsize::new(0);
        for _ in 0..3 {
            handle
                .build_once(|| async {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(DocumentIndex::default())
                })
                .await
                .unwrap();
        }

        assert!(handle.is_built());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(handle.get().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_build_leaves_handle_unbuilt() {
        let handle = IndexHandle::new();
        let err = handle
            .build_once(|| async { Err(EngineError::Index("boom".to_string())) })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Index(_)));
        assert!(!handle.is_built());
    }
}
