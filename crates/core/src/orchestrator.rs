use crate::embeddings::Embedder;
use crate::error::QueryError;
use crate::models::{Answer, RetrievedChunk};
use crate::traits::{LanguageModel, Translator, VectorIndex};
use tracing::{debug, info, warn};

pub const DEFAULT_TOP_K: usize = 4;

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantOptions {
    pub top_k: usize,
    /// Language the user writes in and reads answers in.
    pub user_locale: String,
    /// Language of the indexed rulebook and of the model prompts.
    pub model_locale: String,
    pub translate: bool,
}

impl Default for AssistantOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            user_locale: "fr".to_string(),
            model_locale: "en".to_string(),
            translate: true,
        }
    }
}

impl AssistantOptions {
    fn translates(&self) -> bool {
        self.translate && self.user_locale != self.model_locale
    }
}

/// Retrieval-augmented question answering over an indexed rulebook.
pub struct QaAssistant<E, V, L, T>
where
    E: Embedder,
    V: VectorIndex,
    L: LanguageModel,
    T: Translator,
{
    embedder: E,
    index: V,
    model: L,
    translator: T,
    options: AssistantOptions,
}

impl<E, V, L, T> QaAssistant<E, V, L, T>
where
    E: Embedder,
    V: VectorIndex,
    L: LanguageModel,
    T: Translator,
{
    pub fn new(embedder: E, index: V, model: L, translator: T, options: AssistantOptions) -> Self {
        Self {
            embedder,
            index,
            model,
            translator,
            options,
        }
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, QueryError> {
        let query_vector = self.embedder.embed(question).await?;
        let hits = self.index.search(&query_vector, self.options.top_k).await?;
        debug!(hits = hits.len(), top_k = self.options.top_k, "retrieved context");
        Ok(hits)
    }

    /// Brings the question into the model language. Failure is returned so
    /// that an interactive caller can skip the question.
    pub async fn translate_question(&self, question: &str) -> Result<String, QueryError> {
        if !self.options.translates() {
            return Ok(question.to_string());
        }
        self.translator
            .translate(question, "auto", &self.options.model_locale)
            .await
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::Request("question is empty".to_string()));
        }

        let question_en = self.translate_question(question).await?;
        let sources = self.retrieve(&question_en).await?;
        let prompt = build_prompt(&question_en, &sources);
        let answer_en = self.model.complete(&prompt).await?;

        let answer_local = if self.options.translates() {
            match self
                .translator
                .translate(&answer_en, "auto", &self.options.user_locale)
                .await
            {
                Ok(translated) => Some(translated),
                Err(error) => {
                    warn!(%error, "could not translate the answer back");
                    None
                }
            }
        } else {
            Some(answer_en.clone())
        };

        info!(
            sources = sources.len(),
            answer_chars = answer_en.len(),
            "answered question"
        );

        Ok(Answer {
            question: question.to_string(),
            question_en,
            answer_en,
            answer_local,
            sources,
        })
    }
}

/// "Stuff" prompt: every retrieved chunk in rank order, then the question.
pub fn build_prompt(question: &str, context: &[RetrievedChunk]) -> String {
    let context = context
        .iter()
        .map(|hit| hit.chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{PROMPT_PREAMBLE}\n\n{context}\n\nQuestion: {question}\nHelpful Answer:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::index::FlatIndex;
    use crate::models::{Chunk, ChunkMetadata};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, prompt: &str) -> Result<String, QueryError> {
            self.prompts
                .lock()
                .expect("prompt log")
                .push(prompt.to_string());
            Ok("Each unit gets one order die.".to_string())
        }
    }

    struct FakeTranslator {
        fail_to: Option<&'static str>,
    }

    #[async_trait]
    impl Translator for FakeTranslator {
        async fn translate(
            &self,
            text: &str,
            _source: &str,
            target: &str,
        ) -> Result<String, QueryError> {
            if self.fail_to == Some(target) {
                return Err(QueryError::Translation("service unavailable".to_string()));
            }
            Ok(format!("[{target}] {text}"))
        }
    }

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

    async fn index_of(embedder: &CharacterNgramEmbedder, texts: &[&str]) -> FlatIndex {
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(position, text)| chunk(position as u64, text))
            .collect();
        let vectors = embedder.embed_batch(texts).await.expect("embed");
        let mut index = FlatIndex::new(embedder.dimensions);
        index.index_chunks(&chunks, &vectors).await.expect("index");
        index
    }

    #[tokio::test]
    async fn prompt_holds_retrieved_context_in_rank_order() {
        let embedder = CharacterNgramEmbedder::default();
        let index = index_of(
            &embedder,
            &[
                "Order dice are drawn from a bag one at a time.",
                "Artillery uses indirect fire templates.",
            ],
        )
        .await;
        let assistant = QaAssistant::new(
            embedder,
            index,
            RecordingModel::default(),
            FakeTranslator { fail_to: None },
            AssistantOptions {
                top_k: 2,
                ..AssistantOptions::default()
            },
        );

        let answer = assistant
            .ask("Combien de dés d'ordre ?")
            .await
            .expect("answer");

        assert_eq!(answer.question_en, "[en] Combien de dés d'ordre ?");
        assert_eq!(
            answer.answer_local.as_deref(),
            Some("[fr] Each unit gets one order die.")
        );
        assert_eq!(answer.sources.len(), 2);

        let prompts = assistant.model.prompts.lock().expect("prompt log");
        let prompt = &prompts[0];
        let first = prompt
            .find(answer.sources[0].chunk.text.as_str())
            .expect("first source in prompt");
        let second = prompt
            .find(answer.sources[1].chunk.text.as_str())
            .expect("second source in prompt");
        assert!(first < second);
        assert!(prompt.starts_with(PROMPT_PREAMBLE));
        assert!(prompt.ends_with("Question: [en] Combien de dés d'ordre ?\nHelpful Answer:"));
    }

    #[tokio::test]
    async fn failed_answer_translation_keeps_english_answer() {
        let embedder = CharacterNgramEmbedder::default();
        let index = index_of(&embedder, &["Pinned units take a morale test."]).await;
        let assistant = QaAssistant::new(
            embedder,
            index,
            RecordingModel::default(),
            FakeTranslator { fail_to: Some("fr") },
            AssistantOptions::default(),
        );

        let answer = assistant.ask("Pin ?").await.expect("answer");

        assert_eq!(answer.answer_en, "Each unit gets one order die.");
        assert_eq!(answer.answer_local, None);
    }

    #[tokio::test]
    async fn failed_question_translation_is_returned() {
        let embedder = CharacterNgramEmbedder::default();
        let index = index_of(&embedder, &["text"]).await;
        let assistant = QaAssistant::new(
            embedder,
            index,
            RecordingModel::default(),
            FakeTranslator { fail_to: Some("en") },
            AssistantOptions::default(),
        );

        assert!(matches!(
            assistant.ask("Question ?").await,
            Err(QueryError::Translation(_))
        ));
        assert!(matches!(
            assistant.ask("   ").await,
            Err(QueryError::Request(_))
        ));
    }

    #[tokio::test]
    async fn same_locale_skips_translation() {
        let embedder = CharacterNgramEmbedder::default();
        let index = index_of(&embedder, &["text"]).await;
        let assistant = QaAssistant::new(
            embedder,
            index,
            RecordingModel::default(),
            FakeTranslator { fail_to: Some("en") },
            AssistantOptions {
                user_locale: "en".to_string(),
                ..AssistantOptions::default()
            },
        );

        let answer = assistant.ask("How many dice?").await.expect("answer");
        assert_eq!(answer.question_en, "How many dice?");
        assert_eq!(answer.answer_local.as_deref(), Some(answer.answer_en.as_str()));
    }
}
