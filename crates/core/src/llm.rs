use crate::error::QueryError;
use crate::traits::LanguageModel;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Chat model served by Ollama. Each prompt is sent as a single user message.
pub struct OllamaModel {
    client: Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaModel {
    pub fn new(url: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            url: url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Asks the server to download the model, waiting until it is done.
    pub async fn pull(&self) -> Result<String, QueryError> {
        let endpoint = format!("{}/api/pull", self.url);
        info!(model = %self.model, %endpoint, "pulling model");

        let response = self
            .client
            .post(&endpoint)
            .json(&json!({ "model": self.model, "stream": false }))
            .send()
            .await?;

        let body = checked_json(response).await?;
        let status = body["status"].as_str().unwrap_or("unknown").to_string();
        info!(model = %self.model, %status, "pull finished");
        Ok(status)
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn complete(&self, prompt: &str) -> Result<String, QueryError> {
        let endpoint = format!("{}/api/chat", self.url);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
            "options": {
                "temperature": self.temperature,
            },
        });

        debug!(%endpoint, model = %self.model, prompt_chars = prompt.len(), "chat request");

        let response = self.client.post(&endpoint).json(&body).send().await?;
        let body = checked_json(response).await?;
        parse_chat_response(&body)
    }
}

async fn checked_json(response: reqwest::Response) -> Result<Value, QueryError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(QueryError::BackendResponse {
            backend: "ollama".to_string(),
            details: format!("{status}: {body}"),
        });
    }
    Ok(response.json().await?)
}

fn parse_chat_response(body: &Value) -> Result<String, QueryError> {
    body["message"]["content"]
        .as_str()
        .map(|content| content.trim().to_string())
        .ok_or_else(|| QueryError::BackendResponse {
            backend: "ollama".to_string(),
            details: "missing message.content".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_OLLAMA_URL;

    #[test]
    fn chat_content_is_extracted_and_trimmed() {
        let body = json!({
            "model": "llama3",
            "message": { "role": "assistant", "content": "  Roll one order die.\n" },
            "done": true
        });

        assert_eq!(
            parse_chat_response(&body).expect("content"),
            "Roll one order die."
        );
    }

    #[test]
    fn chat_without_content_is_a_backend_error() {
        let body = json!({ "error": "model not found" });

        assert!(matches!(
            parse_chat_response(&body),
            Err(QueryError::BackendResponse { .. })
        ));
    }

    #[test]
    fn trailing_slash_is_dropped_from_url() {
        let model = OllamaModel::new("http://localhost:11434/", "llama3", 0.0);
        assert_eq!(model.url, DEFAULT_OLLAMA_URL);
        assert_eq!(model.model(), "llama3");
    }
}
