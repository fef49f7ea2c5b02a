//! RAG (Retrieval-Augmented Generation) module.
//!
//! This module provides:
//! - document loading and chunking for the corpus directory
//! - `DocumentIndex`: embedded chunks searched by cosine similarity
//! - `IndexHandle`: the once-built, process-wide index
//! - `RagAnswerEngine`: the `AnswerEngine` used in production

mod answer;
mod chunker;
mod context;
mod index;

pub use answer::{RagAnswerEngine, SYSTEM_PROMPT};
pub use chunker::{split_into_chunks, strip_html_tags, ChunkerConfig, TextChunk};
pub use context::{cosine_similarity, format_context, ScoredChunk};
pub use index::{load_documents, DocumentIndex, IndexHandle, IndexedChunk, SourceDocument};
