pub mod ollama;

use anyhow::Result;
use async_trait::async_trait;

pub use ollama::OllamaClient;

/// Boundary to the external embedding service.
///
/// Given an ordered list of chunk texts, implementations return vectors
/// paired by position. The result may be shorter than the input on
/// partial provider failure; callers pad the missing tail and salvage
/// whatever did embed. An empty result means total failure for the
/// request; an `Err` is reserved for conditions where nothing useful can
/// be said about the batch.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}
