use crate::error::QueryError;
use crate::models::{Chunk, RetrievedChunk};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn index_chunks(
        &mut self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), QueryError>;

    /// Best matches first.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, QueryError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, QueryError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// `source` may be `"auto"`.
    async fn translate(&self, text: &str, source: &str, target: &str)
        -> Result<String, QueryError>;
}
