pub mod artifacts;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod formatter;
pub mod headings;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod noise;
pub mod orchestrator;
pub mod pipeline;
pub mod reassembly;
pub mod traits;
pub mod translate;

pub use artifacts::RulebookPaths;
pub use chunking::{Chunker, ChunkingConfig};
pub use config::{AppConfig, EmbedderKind, LevelSource, LogLevel};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{ConfigError, IngestError, QueryError};
pub use extractor::{LopdfExtractor, PdfExtractor};
pub use formatter::MarkdownFormatter;
pub use headings::{HeadingClassifier, HeadingRule};
pub use index::FlatIndex;
pub use ingest::{chunk_stage, extract_stage, index_stage, ExtractReport, IndexReport};
pub use llm::OllamaModel;
pub use models::{
    Answer, Chunk, ChunkCollection, ChunkMetadata, Document, Heading, HeadingLevel, LogicalLine,
    RawPage, RetrievedChunk,
};
pub use noise::{LineNoiseFilter, NoiseFilter};
pub use orchestrator::{AssistantOptions, QaAssistant};
pub use pipeline::TextPipeline;
pub use reassembly::{ContinuationRule, ParagraphReassembler};
pub use traits::{LanguageModel, Translator, VectorIndex};
pub use translate::{GoogleTranslator, PassthroughTranslator};
