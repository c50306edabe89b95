//! YAML configuration.
//!
//! Two files are merged: the main `config/cfg.yaml` and a per-machine file
//! (`config/<host>_cfg.yaml`) holding directory settings. Top-level keys of
//! the machine file override the main file.

use crate::artifacts::RulebookPaths;
use crate::chunking::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SEPARATORS};
use crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS;
use crate::error::ConfigError;
use crate::headings::{
    DEFAULT_FACTION_PREFIX, DEFAULT_FACTION_TITLES, DEFAULT_MAJOR_TITLES,
    DEFAULT_SHORT_HEADING_MAX_WORDS, VocabularyRule,
};
use crate::noise::{DEFAULT_FULL_TEXT_RULES, DEFAULT_LINE_RULES};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

pub const DEFAULT_CONFIG_PATH: &str = "config/cfg.yaml";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub const VARIANTS: [&'static str; 5] = ["CRITICAL", "ERROR", "WARNING", "INFO", "DEBUG"];

    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Critical | LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CRITICAL" => Ok(LogLevel::Critical),
            "ERROR" => Ok(LogLevel::Error),
            "WARNING" => Ok(LogLevel::Warning),
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            other => Err(ConfigError::Invalid(format!(
                "log level `{other}` is not one of {}",
                Self::VARIANTS.join("|")
            ))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Critical => "CRITICAL",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        };
        f.write_str(name)
    }
}

/// Where the effective log level came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSource {
    CommandLine,
    ConfigFile,
    Environment,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    #[default]
    Ngram,
    Ollama,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeadingsConfig {
    pub major_titles: Vec<String>,
    pub faction_titles: Vec<String>,
    pub faction_prefix: String,
    pub short_heading_max_words: usize,
}

impl Default for HeadingsConfig {
    fn default() -> Self {
        Self {
            major_titles: to_strings(&DEFAULT_MAJOR_TITLES),
            faction_titles: to_strings(&DEFAULT_FACTION_TITLES),
            faction_prefix: DEFAULT_FACTION_PREFIX.to_string(),
            short_heading_max_words: DEFAULT_SHORT_HEADING_MAX_WORDS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub full_text: Vec<String>,
    pub lines: Vec<String>,
}

impl HeadingsConfig {
    pub fn vocabulary(&self) -> VocabularyRule {
        VocabularyRule {
            major_titles: self.major_titles.clone(),
            faction_titles: self.faction_titles.clone(),
            faction_prefix: self.faction_prefix.clone(),
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            full_text: to_strings(&DEFAULT_FULL_TEXT_RULES),
            lines: to_strings(&DEFAULT_LINE_RULES),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub enabled: bool,
    pub user_locale: String,
    pub model_locale: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_locale: "fr".to_string(),
            model_locale: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub language: String,
    pub rules_files: BTreeMap<String, String>,
    pub embeddings_models: BTreeMap<String, String>,
    pub llm_models: BTreeMap<String, String>,
    pub llm_temperature: f32,
    pub ollama_url: String,
    pub embedder: EmbedderKind,
    pub embedding_dimensions: usize,
    pub retrieval_top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
    pub log_level: Option<LogLevel>,
    pub headings: HeadingsConfig,
    pub noise: NoiseConfig,
    pub translation: TranslationConfig,
    /// Keys not covered above, including the flat `rules_<lang>_file` forms.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("."),
            language: "en".to_string(),
            rules_files: BTreeMap::new(),
            embeddings_models: BTreeMap::new(),
            llm_models: BTreeMap::new(),
            llm_temperature: 0.0,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedder: EmbedderKind::default(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            retrieval_top_k: 4,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: to_strings(&DEFAULT_SEPARATORS),
            log_level: None,
            headings: HeadingsConfig::default(),
            noise: NoiseConfig::default(),
            translation: TranslationConfig::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Loads and merges the main and machine files.
    ///
    /// A missing default machine file is skipped; a machine file passed
    /// explicitly must exist.
    pub fn load(
        cfg_path: Option<&Path>,
        machine_cfg_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let cfg_path = cfg_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut merged = read_mapping(&cfg_path)?;

        let machine = match machine_cfg_path {
            Some(path) => Some(read_mapping(path)?),
            None => match default_machine_config_path() {
                Some(path) if path.exists() => Some(read_mapping(&path)?),
                _ => None,
            },
        };

        if let Some(machine) = machine {
            for (key, value) in machine {
                merged.insert(key, value);
            }
        }

        Self::from_mapping(merged)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        match serde_yaml::from_str::<Value>(yaml)? {
            Value::Mapping(mapping) => Self::from_mapping(mapping),
            _ => Err(ConfigError::Invalid(
                "configuration must be a YAML mapping".to_string(),
            )),
        }
    }

    fn from_mapping(mapping: Mapping) -> Result<Self, ConfigError> {
        let mut config: AppConfig = serde_yaml::from_value(Value::Mapping(mapping))?;
        config.absorb_flat_keys();
        Ok(config)
    }

    /// Folds `rules_<lang>_file`, `embeddings_<lang>_model_name` and
    /// `llm_<lang>_model_name` into their maps. Map entries win.
    fn absorb_flat_keys(&mut self) {
        for (key, value) in &self.extra {
            let Some(value) = value.as_str() else {
                continue;
            };

            let target = if let Some(lang) = flat_key(key, "rules_", "_file") {
                Some((&mut self.rules_files, lang))
            } else if let Some(lang) = flat_key(key, "embeddings_", "_model_name") {
                Some((&mut self.embeddings_models, lang))
            } else if let Some(lang) = flat_key(key, "llm_", "_model_name") {
                Some((&mut self.llm_models, lang))
            } else {
                None
            };

            if let Some((map, lang)) = target {
                map.entry(lang.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking_config()
            .validate()
            .map_err(|error| ConfigError::Invalid(error.to_string()))?;

        if self.retrieval_top_k == 0 {
            return Err(ConfigError::Invalid(
                "retrieval_top_k must be greater than 0".to_string(),
            ));
        }

        self.rules_file()?;
        Ok(())
    }

    pub fn chunking_config(&self) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            separators: self.separators.clone(),
        }
    }

    pub fn rules_file(&self) -> Result<&str, ConfigError> {
        self.rules_files
            .get(&self.language)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::Missing(format!("rules_{}_file", self.language)))
    }

    pub fn embeddings_model(&self) -> Option<&str> {
        self.embeddings_models.get(&self.language).map(String::as_str)
    }

    pub fn llm_model(&self) -> Result<&str, ConfigError> {
        self.llm_models
            .get(&self.language)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::Missing(format!("llm_{}_model_name", self.language)))
    }

    pub fn paths(&self) -> Result<RulebookPaths, ConfigError> {
        RulebookPaths::new(&self.data_dir, self.rules_file()?, &self.language)
            .map_err(|error| ConfigError::Invalid(error.to_string()))
    }

    pub fn log_file_path(&self, file_name: &Path) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Command line first, then the config file, then `env_value` (the
    /// `LOGLEVEL` variable), then DEBUG. Unparseable env values are ignored.
    pub fn resolve_log_level(
        &self,
        cli: Option<LogLevel>,
        env_value: Option<&str>,
    ) -> (LogLevel, LevelSource) {
        if let Some(level) = cli {
            return (level, LevelSource::CommandLine);
        }
        if let Some(level) = self.log_level {
            return (level, LevelSource::ConfigFile);
        }
        if let Some(level) = env_value.and_then(|value| value.parse().ok()) {
            return (level, LevelSource::Environment);
        }
        (LogLevel::Debug, LevelSource::Default)
    }
}

fn read_mapping(path: &Path) -> Result<Mapping, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match serde_yaml::from_str::<Value>(&content)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Err(ConfigError::Invalid(format!(
            "no parameters could be loaded from {}",
            path.display()
        ))),
        _ => Err(ConfigError::Invalid(format!(
            "{} must contain a YAML mapping",
            path.display()
        ))),
    }
}

fn default_machine_config_path() -> Option<PathBuf> {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|host| !host.trim().is_empty())?;
    Some(Path::new("config").join(format!("{}_cfg.yaml", host.trim())))
}

fn flat_key<'a>(key: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?
        .strip_suffix(suffix)
        .filter(|lang| !lang.is_empty())
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
