//! Retrieval context formatting.

use super::chunker::TextChunk;

/// A chunk with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// Joins chunks into one context block with source citations, stopping
/// before `max_length` characters would be exceeded.
pub fn format_context(scored_chunks: &[ScoredChunk], max_length: usize) -> String {
    let mut context = String::new();
    let mut current_length = 0;

    for (i, sc) in scored_chunks.iter().enumerate() {
        let entry = format!("[{}] (Source: {})\n{}\n\n", i + 1, sc.chunk.source, sc.chunk.text);
        let entry_length = entry.chars().count();
        if current_length + entry_length > max_length {
            break;
        }
        context.push_str(&entry);
        current_length += entry_length;
    }

    context.trim().to_string()
}
