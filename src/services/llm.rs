use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LLMConfig;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request timed out")]
    Timeout,
    #[error("llm network error: {0}")]
    Network(String),
    #[error("llm api error: status={status}, message={message}")]
    Api { status: u16, message: String },
    #[error("llm returned no content")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(e.to_string())
        }
    }
}

/// Single-turn text completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &LLMConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to LLM");
                LlmError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::error!(status = status.as_u16(), body = %message, "LLM API error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Offline completion client. Answers definition prompts with a schema-valid
/// breakdown of the quoted word and random-word prompts with a fixed word.
#[derive(Debug, Default)]
pub struct MockCompletionClient {
    calls: AtomicUsize,
}

impl MockCompletionClient {
    pub const RANDOM_WORD: &'static str = "petrichor";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn quoted_term(prompt: &str) -> Option<&str> {
        let start = prompt.find("the word: \"")? + "the word: \"".len();
        let rest = &prompt[start..];
        let end = rest.find('"')?;
        Some(&rest[..end])
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let Some(term) = Self::quoted_term(prompt) else {
            return Ok(Self::RANDOM_WORD.to_string());
        };

        let body = serde_json::json!({
            "word": term,
            "partOfSpeech": "noun",
            "pronunciation": format!("/{term}/"),
            "wordForms": [format!("{term}s")],
            "meaning": format!("A sample meaning for {term}."),
            "exampleSentence": format!("She used the word {term} in a sentence."),
            "synonyms": [],
            "antonyms": [],
            "memoryTrick": format!("Picture {term} in bold letters."),
            "origin": "Unknown",
            "positivePrompt": format!("A photorealistic scene illustrating {term}"),
            "negativePrompt": "low quality, cartoonish, deformed, artifacts",
        });
        Ok(body.to_string())
    }
}
