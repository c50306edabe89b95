//! Recursive, offset-exact chunking.
//!
//! The document is first split into pieces that tile it exactly: each
//! separator stays attached to the end of the piece before it, and pieces
//! longer than `chunk_size` are split again with the next separator. Pieces
//! are then packed greedily into chunks. Each new chunk starts with the
//! longest run of trailing pieces from the previous chunk that fits in
//! `chunk_overlap`, so overlaps are always contiguous document text.
//!
//! All sizes are counted in chars.

use crate::error::IngestError;
use crate::models::{Chunk, ChunkCollection, ChunkMetadata, Document};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.separators.is_empty() {
            return Err(IngestError::InvalidChunkConfig(
                "at least one separator is required".to_string(),
            ));
        }

        Ok(())
    }
}

/// Location of one chunk inside the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub byte_start: usize,
    pub byte_end: usize,
    pub char_start: usize,
    pub char_len: usize,
}

impl ChunkSpan {
    pub fn text<'a>(&self, document: &'a str) -> &'a str {
        &document[self.byte_start..self.byte_end]
    }
}

#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn chunk(&self, document: &str) -> Vec<ChunkSpan> {
        if document.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.split_range(document, 0, document.len(), &self.config.separators, &mut pieces);
        let spans = self.merge(&pieces);

        debug!(
            pieces = pieces.len(),
            chunks = spans.len(),
            chunk_size = self.config.chunk_size,
            chunk_overlap = self.config.chunk_overlap,
            "chunked document"
        );

        spans
    }

    pub fn chunk_document(&self, source: &str, document: &Document) -> Vec<Chunk> {
        let text = document.as_str();
        let sections = section_starts(text);

        self.chunk(text)
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                let chunk_text = span.text(text).to_string();
                let index = index as u64;
                let section = sections
                    .iter()
                    .take_while(|(offset, _)| *offset <= span.byte_start)
                    .last()
                    .map(|(_, title)| title.clone());

                Chunk {
                    metadata: ChunkMetadata {
                        chunk_id: make_chunk_id(source, index, &chunk_text),
                        source: source.to_string(),
                        chunk_index: index,
                        start_offset: span.char_start,
                        char_len: span.char_len,
                        section,
                    },
                    text: chunk_text,
                }
            })
            .collect()
    }

    pub fn build_collection(&self, source: &str, document: &Document) -> ChunkCollection {
        ChunkCollection {
            source: source.to_string(),
            created_at: Utc::now(),
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
            chunks: self.chunk_document(source, document),
        }
    }

    fn split_range(
        &self,
        document: &str,
        start: usize,
        end: usize,
        separators: &[String],
        pieces: &mut Vec<Piece>,
    ) {
        let text = &document[start..end];
        let chars = text.chars().count();

        if chars <= self.config.chunk_size {
            pieces.push(Piece { start, end, chars });
            return;
        }

        let Some(position) = separators
            .iter()
            .position(|separator| separator.is_empty() || text.contains(separator.as_str()))
        else {
            // No separator left: keep the oversized run whole.
            pieces.push(Piece { start, end, chars });
            return;
        };

        let separator = separators[position].as_str();
        let remaining = &separators[position + 1..];

        if separator.is_empty() {
            pieces.extend(text.char_indices().map(|(offset, c)| Piece {
                start: start + offset,
                end: start + offset + c.len_utf8(),
                chars: 1,
            }));
            return;
        }

        let mut piece_start = start;
        for (offset, _) in text.match_indices(separator) {
            let piece_end = start + offset + separator.len();
            self.split_range(document, piece_start, piece_end, remaining, pieces);
            piece_start = piece_end;
        }

        if piece_start < end {
            self.split_range(document, piece_start, end, remaining, pieces);
        }
    }

    fn merge(&self, pieces: &[Piece]) -> Vec<ChunkSpan> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut char_starts = Vec::with_capacity(pieces.len());
        let mut cursor = 0usize;
        for piece in pieces {
            char_starts.push(cursor);
            cursor += piece.chars;
        }

        let span = |first: usize, last: usize, total: usize| ChunkSpan {
            byte_start: pieces[first].start,
            byte_end: pieces[last].end,
            char_start: char_starts[first],
            char_len: total,
        };

        let mut spans = Vec::new();
        let mut first = 0usize;
        let mut total = 0usize;

        for (index, piece) in pieces.iter().enumerate() {
            if total + piece.chars > size && index > first {
                spans.push(span(first, index - 1, total));

                while first < index && (total > overlap || total + piece.chars > size) {
                    total -= pieces[first].chars;
                    first += 1;
                }
            }
            total += piece.chars;
        }

        if first < pieces.len() {
            spans.push(span(first, pieces.len() - 1, total));
        }

        spans
    }
}

/// Byte offsets of Markdown headings with their text, in document order.
fn section_starts(text: &str) -> Vec<(usize, String)> {
    let mut sections = Vec::new();
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end();
        let title = trimmed
            .strip_prefix("### ")
            .or_else(|| trimmed.strip_prefix("## "));
        if let Some(title) = title {
            sections.push((offset, title.trim().to_string()));
        }
        offset += line.len();
    }

    sections
}

fn make_chunk_id(source: &str, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
