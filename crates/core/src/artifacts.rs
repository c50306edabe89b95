//! Intermediate files shared between pipeline stages.
//!
//! Every write goes to a temporary file in the destination directory and is
//! renamed into place, so an artifact is either complete or absent.

use crate::config::AppConfig;
use crate::error::{ConfigError, IngestError};
use crate::models::ChunkCollection;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulebookPaths {
    pub pdf: PathBuf,
    pub raw_text: PathBuf,
    pub clean_text: PathBuf,
    pub chunks: PathBuf,
    pub index: PathBuf,
}

impl RulebookPaths {
    pub fn new(data_dir: &Path, rules_file: &str, language: &str) -> Result<Self, IngestError> {
        let stem = Path::new(rules_file)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| {
                IngestError::InvalidArgument(format!("rules file has no name: {rules_file:?}"))
            })?;

        Ok(Self {
            pdf: data_dir.join(rules_file),
            raw_text: data_dir.join(format!("{stem}_raw.txt")),
            clean_text: data_dir.join(format!("{stem}.txt")),
            chunks: data_dir.join(format!("{stem}_chunks.json")),
            index: data_dir.join(format!("vector_index_{language}.json")),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        config.paths()
    }
}

pub fn read_text(path: &Path) -> Result<String, IngestError> {
    if !path.exists() {
        return Err(IngestError::MissingInput(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

pub fn write_text_atomic(path: &Path, text: &str) -> Result<(), IngestError> {
    write_atomic(path, text.as_bytes())
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IngestError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut file = NamedTempFile::new_in(&parent)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path)?;

    debug!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
    Ok(())
}

pub fn save_chunks(path: &Path, collection: &ChunkCollection) -> Result<(), IngestError> {
    let encoded = serde_json::to_vec_pretty(collection)?;
    write_atomic(path, &encoded)
}

pub fn load_chunks(path: &Path) -> Result<ChunkCollection, IngestError> {
    if !path.exists() {
        return Err(IngestError::MissingInput(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ChunkMetadata};
    use chrono::Utc;
    use tempfile::tempdir;

    fn chunk(index: u64, text: &str, start_offset: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                chunk_id: format!("id-{index}"),
                source: "rules.txt".to_string(),
                chunk_index: index,
                start_offset,
                char_len: text.chars().count(),
                section: Some("ORDERS".to_string()),
            },
        }
    }

    #[test]
    fn paths_follow_rules_file_stem() {
        let paths =
            RulebookPaths::new(Path::new("data"), "bolt_v3.pdf", "fr").expect("valid name");

        assert_eq!(paths.pdf, PathBuf::from("data/bolt_v3.pdf"));
        assert_eq!(paths.raw_text, PathBuf::from("data/bolt_v3_raw.txt"));
        assert_eq!(paths.clean_text, PathBuf::from("data/bolt_v3.txt"));
        assert_eq!(paths.chunks, PathBuf::from("data/bolt_v3_chunks.json"));
        assert_eq!(paths.index, PathBuf::from("data/vector_index_fr.json"));
        assert!(RulebookPaths::new(Path::new("data"), "", "fr").is_err());
    }

    #[test]
    fn chunk_collection_round_trips_order_and_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("rules_chunks.json");
        let collection = ChunkCollection {
            source: "rules.txt".to_string(),
            created_at: Utc::now(),
            chunk_size: 20,
            chunk_overlap: 5,
            chunks: vec![
                chunk(0, "## ORDERS\n\n", 0),
                chunk(1, "Dés d'ordre « tirés »\t\n", 11),
                chunk(2, "  trailing spaces  ", 33),
            ],
        };

        save_chunks(&path, &collection)?;
        let loaded = load_chunks(&path)?;

        assert_eq!(loaded, collection);
        Ok(())
    }

    #[test]
    fn missing_inputs_are_named() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("absent.txt");

        match read_text(&path) {
            Err(IngestError::MissingInput(reported)) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            load_chunks(&path),
            Err(IngestError::MissingInput(_))
        ));
    }

    #[test]
    fn atomic_write_replaces_existing_file_and_leaves_no_temp_files(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("clean.txt");

        write_text_atomic(&path, "first")?;
        write_text_atomic(&path, "second")?;

        assert_eq!(read_text(&path)?, "second");
        let entries = fs::read_dir(path.parent().expect("parent"))?.count();
        assert_eq!(entries, 1);
        Ok(())
    }
}
