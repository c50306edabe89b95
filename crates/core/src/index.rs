use crate::artifacts::write_atomic;
use crate::embeddings::cosine_similarity;
use crate::error::{IngestError, QueryError};
use crate::models::{Chunk, RetrievedChunk};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Exact cosine search over every stored vector, persisted as one JSON file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatIndex {
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<(), IngestError> {
        let encoded = serde_json::to_vec(self)?;
        write_atomic(path, &encoded)?;
        debug!(path = %path.display(), entries = self.entries.len(), "saved vector index");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, IngestError> {
        if !path.exists() {
            return Err(IngestError::MissingInput(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), QueryError> {
        if vector.len() != self.dimensions {
            return Err(QueryError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    async fn index_chunks(
        &mut self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), QueryError> {
        if chunks.len() != embeddings.len() {
            return Err(QueryError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }
        for embedding in embeddings {
            self.check_dimensions(embedding)?;
        }

        self.entries.extend(
            chunks
                .iter()
                .zip(embeddings.iter())
                .map(|(chunk, vector)| IndexEntry {
                    chunk: chunk.clone(),
                    vector: vector.clone(),
                }),
        );
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, QueryError> {
        self.check_dimensions(query_vector)?;

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query_vector, &entry.vector), entry))
            .collect();

        scored.sort_by(|(left_score, left), (right_score, right)| {
            right_score
                .partial_cmp(left_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    left.chunk
                        .metadata
                        .chunk_index
                        .cmp(&right.chunk.metadata.chunk_index)
                })
        });

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| RetrievedChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use tempfile::tempdir;

    fn chunk(index: u64, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                chunk_id: format!("chunk-{index}"),
                source: "rules.txt".to_string(),
                chunk_index: index,
                start_offset: 0,
                char_len: text.chars().count(),
                section: None,
            },
        }
    }

    #[tokio::test]
    async fn search_orders_by_score_then_chunk_index() {
        let mut index = FlatIndex::new(2);
        index
            .index_chunks(
                &[chunk(2, "c"), chunk(0, "a"), chunk(1, "b")],
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]],
            )
            .await
            .expect("index");

        let hits = index.search(&[1.0, 0.0], 3).await.expect("search");
        let order: Vec<u64> = hits
            .iter()
            .map(|hit| hit.chunk.metadata.chunk_index)
            .collect();

        assert_eq!(order, vec![1, 2, 0]);
        assert!(hits[0].score > hits[2].score);
        assert_eq!(index.search(&[1.0, 0.0], 1).await.expect("search").len(), 1);
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_rejected() {
        let mut index = FlatIndex::new(3);

        let stored = index.index_chunks(&[chunk(0, "a")], &[vec![1.0]]).await;
        assert!(matches!(
            stored,
            Err(QueryError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
        assert!(index.search(&[1.0, 0.0], 4).await.is_err());
        assert!(index.index_chunks(&[chunk(0, "a")], &[]).await.is_err());
    }

    #[tokio::test]
    async fn saved_index_loads_back() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("vector_index_en.json");
        let mut index = FlatIndex::new(2);
        index
            .index_chunks(&[chunk(0, "first"), chunk(1, "second")], &[vec![0.6, 0.8], vec![1.0, 0.0]])
            .await?;

        index.save(&path)?;
        let loaded = FlatIndex::load(&path)?;

        assert_eq!(loaded, index);
        assert_eq!(loaded.len(), 2);
        assert!(matches!(
            FlatIndex::load(&dir.path().join("absent.json")),
            Err(IngestError::MissingInput(_))
        ));
        Ok(())
    }
}
