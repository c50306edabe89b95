use crate::error::QueryError;
use crate::traits::Translator;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

const GOOGLE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Longest text sent in one request, counted in chars.
pub const MAX_SEGMENT_CHARS: usize = 4500;

/// Client for the public Google Translate endpoint used by browser widgets.
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new(GOOGLE_ENDPOINT)
    }
}

impl GoogleTranslator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn request_url(&self, text: &str, source: &str, target: &str) -> Result<Url, QueryError> {
        Ok(Url::parse_with_params(
            &self.endpoint,
            &[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ],
        )?)
    }

    async fn translate_segment(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, QueryError> {
        let url = self.request_url(text, source, target)?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(QueryError::Translation(format!(
                "translation service answered {status}"
            )));
        }

        let body: Value = response.json().await?;
        parse_google_response(&body)
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, QueryError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let segments = split_segments(text, MAX_SEGMENT_CHARS);
        debug!(source, target, segments = segments.len(), "translating text");

        let mut translated = String::with_capacity(text.len());
        for segment in segments {
            if segment.trim().is_empty() {
                translated.push_str(segment);
                continue;
            }
            translated.push_str(&self.translate_segment(segment, source, target).await?);
        }
        Ok(translated)
    }
}

/// Returns the input unchanged. Used when translation is disabled or both
/// sides share a language.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(
        &self,
        text: &str,
        _source: &str,
        _target: &str,
    ) -> Result<String, QueryError> {
        Ok(text.to_string())
    }
}

/// The first array of the response holds `[translated, source_text, ...]`
/// sentence entries; their translated parts are concatenated.
pub fn parse_google_response(body: &Value) -> Result<String, QueryError> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| QueryError::Translation("unexpected response shape".to_string()))?;

    let translated: String = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect();

    if translated.is_empty() {
        return Err(QueryError::Translation(
            "response held no translated text".to_string(),
        ));
    }
    Ok(translated)
}

/// Splits after newlines so that each segment stays within `max_chars`.
/// A single line longer than the limit is cut on char boundaries.
fn split_segments(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut segments = Vec::new();
    let mut start = 0;
    let mut length = 0;
    let mut last_break = None;

    for (offset, ch) in text.char_indices() {
        if length == max_chars {
            let cut = last_break.unwrap_or(offset);
            segments.push(&text[start..cut]);
            length = text[cut..offset].chars().count();
            start = cut;
            last_break = None;
        }
        length += 1;
        if ch == '\n' {
            last_break = Some(offset + 1);
        }
    }
    if start < text.len() {
        segments.push(&text[start..]);
    }
    segments
}
