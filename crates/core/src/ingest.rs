//! The three offline stages, each reading the previous stage's artifact.

use crate::artifacts::{load_chunks, read_text, save_chunks, write_text_atomic, RulebookPaths};
use crate::chunking::{Chunker, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::{IngestError, QueryError};
use crate::extractor::{join_pages, PdfExtractor};
use crate::index::FlatIndex;
use crate::models::{ChunkCollection, Document};
use crate::pipeline::TextPipeline;
use crate::traits::VectorIndex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Texts sent to the embedder per request.
pub const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub raw_text: PathBuf,
    pub clean_text: PathBuf,
    pub pages: usize,
    pub headings: usize,
    pub document_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub index: PathBuf,
    pub chunks: usize,
    pub dimensions: usize,
}

/// PDF to raw text and normalized Markdown text.
pub fn extract_stage(
    paths: &RulebookPaths,
    extractor: &dyn PdfExtractor,
    pipeline: &TextPipeline,
) -> Result<ExtractReport, IngestError> {
    let pages = extractor.extract_pages(&paths.pdf)?;
    let raw = join_pages(&pages);
    let document = pipeline.process_text(&raw);

    write_text_atomic(&paths.raw_text, &raw)?;
    write_text_atomic(&paths.clean_text, document.as_str())?;

    info!(
        pdf = %paths.pdf.display(),
        raw_text = %paths.raw_text.display(),
        clean_text = %paths.clean_text.display(),
        pages = pages.len(),
        "extracted rulebook text"
    );

    Ok(ExtractReport {
        raw_text: paths.raw_text.clone(),
        clean_text: paths.clean_text.clone(),
        pages: pages.len(),
        headings: document.heading_count,
        document_chars: document.text.chars().count(),
    })
}

/// Normalized text to the chunk collection artifact.
pub fn chunk_stage(
    paths: &RulebookPaths,
    config: ChunkingConfig,
) -> Result<ChunkCollection, IngestError> {
    let chunker = Chunker::new(config)?;
    let document = Document::from_markdown(read_text(&paths.clean_text)?);
    let collection = chunker.build_collection(&source_name(&paths.clean_text), &document);

    save_chunks(&paths.chunks, &collection)?;

    info!(
        chunks = collection.chunks.len(),
        path = %paths.chunks.display(),
        "saved chunk collection"
    );
    if let Some(first) = collection.chunks.first() {
        info!(preview = %preview(&first.text, 300), "first chunk");
    }
    if let Some(second) = collection.chunks.get(1) {
        info!(start = %preview(&second.text, 150), "second chunk starts with");
    }

    Ok(collection)
}

/// Chunk collection to a persisted [`FlatIndex`].
pub async fn index_stage<E>(paths: &RulebookPaths, embedder: &E) -> Result<IndexReport, QueryError>
where
    E: Embedder + ?Sized,
{
    let collection = load_chunks(&paths.chunks)?;
    let mut index = FlatIndex::new(embedder.dimensions());

    for (batch_no, batch) in collection.chunks.chunks(EMBED_BATCH_SIZE).enumerate() {
        let texts: Vec<&str> = batch.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        index.index_chunks(batch, &vectors).await?;
        debug!(batch = batch_no, size = batch.len(), "embedded batch");
    }

    index.save(&paths.index)?;
    info!(
        chunks = index.len(),
        dimensions = index.dimensions(),
        path = %paths.index.display(),
        "saved vector index"
    );

    Ok(IndexReport {
        index: paths.index.clone(),
        chunks: index.len(),
        dimensions: index.dimensions(),
    })
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// First `max_chars` characters, for log lines.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
