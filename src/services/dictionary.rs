use std::sync::Arc;

use crate::response::AppError;
use crate::services::llm::{CompletionClient, LlmError};
use crate::state::AppState;
use crate::store::operations::words::{WordDetails, WordEntry};
use crate::store::{Store, StoreError};
use crate::validation::validate_term;

const SCHEMA: &str = r#"{
      "word": string,
      "partOfSpeech": string,
      "pronunciation": string,
      "wordForms": string[],
      "meaning": string,
      "exampleSentence": string,
      "synonyms": string[],
      "antonyms": string[],
      "memoryTrick": string,
      "origin": string,
      "positivePrompt": string,
      "negativePrompt": string
    }"#;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("invalid word: {0}")]
    InvalidTerm(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("malformed llm response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LookupError> for AppError {
    fn from(value: LookupError) -> Self {
        match value {
            LookupError::InvalidTerm(msg) => AppError::bad_request("INVALID_WORD", &msg),
            LookupError::MalformedResponse(msg) => {
                tracing::warn!(error = %msg, "Discarding malformed LLM output");
                AppError::bad_gateway(
                    "UPSTREAM_MALFORMED",
                    "The dictionary service returned an unreadable answer",
                )
            }
            LookupError::Llm(e) => AppError::internal(&e.to_string()),
            LookupError::Store(e) => e.into(),
        }
    }
}

pub fn definition_prompt(term: &str, subject: Option<&str>) -> String {
    let context = match subject {
        Some(subject) => format!(
            "The word '{term}' is used in the context of the subject '{subject}'.\n    \
             Provide a detailed dictionary-style breakdown of the word: \"{term}\" in the context of '{subject}'."
        ),
        None => format!("Provide a detailed dictionary-style breakdown of the word: \"{term}\"."),
    };
    format!(
        "\n    {context}\n    Format your response as a valid JSON object with these exact keys:\n\n    {SCHEMA}\n\n    \
         Use IPA for pronunciation, 3 to 5 synonyms, and a vivid photorealistic scene for positivePrompt. \
         negativePrompt lists what to avoid: low quality, unrealistic render, cartoonish style, deformed shapes, AI artifacts.\n    \
         Format strictly as valid JSON with double quotes, no text outside the object, and all keys present \
         (empty strings or empty arrays when unknown).\n"
    )
}

pub fn random_word_prompt() -> &'static str {
    "Give me a single rare English word (no meaning), one word only."
}

/// Accepts a bare JSON object or one wrapped in a fenced code block.
pub fn parse_word_details(term: &str, raw: &str) -> Result<WordDetails, LookupError> {
    let body = strip_code_fence(raw.trim());
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| LookupError::MalformedResponse(format!("not JSON: {e}")))?;
    if !value.is_object() {
        return Err(LookupError::MalformedResponse(
            "expected a JSON object".to_string(),
        ));
    }
    let mut details: WordDetails = serde_json::from_value(value)
        .map_err(|e| LookupError::MalformedResponse(format!("unexpected shape: {e}")))?;
    details.word = term.to_string();
    Ok(details)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // 跳过语言标记，例如 ```json
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// First alphabetic token of an LLM answer, lower-cased.
pub fn clean_random_word(raw: &str) -> Option<String> {
    raw.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphabetic() && c != '-'))
        .find(|token| !token.is_empty())
        .map(str::to_lowercase)
}

#[derive(Clone)]
pub struct WordService {
    store: Arc<Store>,
    llm: Arc<dyn CompletionClient>,
}

impl WordService {
    pub fn new(store: Arc<Store>, llm: Arc<dyn CompletionClient>) -> Self {
        Self { store, llm }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.store_arc(), state.llm())
    }

    /// Cached lookup: a stored record is returned as-is, otherwise the LLM
    /// breakdown is persisted first.
    pub async fn lookup(&self, raw_term: &str) -> Result<WordEntry, LookupError> {
        let term = validate_term(raw_term).map_err(|m| LookupError::InvalidTerm(m.to_string()))?;

        if let Some(existing) = self.store.get_word(&term)? {
            tracing::debug!(term = %term, "word cache hit");
            return Ok(existing);
        }

        let raw = self.llm.complete(&definition_prompt(&term, None)).await?;
        let details = parse_word_details(&term, &raw)?;
        let entry = WordEntry::new(details);

        match self.store.insert_word(&entry) {
            Ok(()) => {
                tracing::info!(term = %term, "word defined and cached");
                Ok(entry)
            }
            Err(StoreError::Conflict { .. }) => {
                // 并发请求已写入同一词条，返回已存储的版本
                Ok(self.store.get_word(&term)?.unwrap_or(entry))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Breakdown in a subject's context. Not cached in the word collection.
    pub async fn lookup_in_subject(
        &self,
        raw_term: &str,
        subject: &str,
    ) -> Result<WordDetails, LookupError> {
        let term = validate_term(raw_term).map_err(|m| LookupError::InvalidTerm(m.to_string()))?;
        let raw = self
            .llm
            .complete(&definition_prompt(&term, Some(subject.trim())))
            .await?;
        parse_word_details(&term, &raw)
    }

    pub async fn random_word(&self) -> Result<String, LookupError> {
        let raw = self.llm.complete(random_word_prompt()).await?;
        clean_random_word(&raw)
            .ok_or_else(|| LookupError::MalformedResponse(format!("no word in {raw:?}")))
    }
}
