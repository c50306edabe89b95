use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text of one PDF page as produced by the extractor. `index` is 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub index: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum HeadingLevel {
    Section,
    Subsection,
}

impl HeadingLevel {
    pub fn marker(self) -> &'static str {
        match self {
            HeadingLevel::Section => "##",
            HeadingLevel::Subsection => "###",
        }
    }
}

/// A structural title with its rendered text (prefixes and case already applied).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: HeadingLevel,
    pub text: String,
}

impl Heading {
    pub fn new(level: HeadingLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// One line after reassembly. Never empty, never a known noise line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalLine {
    Heading(Heading),
    Body(String),
}

impl LogicalLine {
    pub fn is_heading(&self) -> bool {
        matches!(self, LogicalLine::Heading(_))
    }
}

/// Normalized rulebook text with Markdown heading markers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub text: String,
    pub heading_count: usize,
}

impl Document {
    /// Wraps already formatted text, as read back from the clean-text artifact.
    pub fn from_markdown(text: impl Into<String>) -> Self {
        let text = text.into();
        let heading_count = text
            .lines()
            .filter(|line| line.starts_with("## ") || line.starts_with("### "))
            .count();
        Self {
            text,
            heading_count,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    pub source: String,
    pub chunk_index: u64,
    /// Offset of the first character, counted in chars.
    pub start_offset: usize,
    pub char_len: usize,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// On-disk unit handed from the chunking stage to the indexing stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkCollection {
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub question_en: String,
    pub answer_en: String,
    /// `None` when translating the answer back failed.
    pub answer_local: Option<String>,
    pub sources: Vec<RetrievedChunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_headings_are_counted() {
        let document =
            Document::from_markdown("## ORDERS\n\nText with ## inside.\n\n### FALL WEISS\n\n#not a heading");

        assert_eq!(document.heading_count, 2);
        assert!(!document.is_empty());
        assert!(Document::from_markdown(" \n").is_empty());
    }
}
