//! Diffusion-service client and job submission.
//!
//! Talks to a ComfyUI-compatible HTTP API: `POST /prompt` queues a workflow,
//! `GET /history/{id}` reports its outputs and `GET /view` serves a finished file.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;

use crate::config::ImageConfig;
use crate::store::operations::words::WordDetails;

const DEFAULT_WORKFLOW: &str = include_str!("../../assets/comfyui_workflow.json");

pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "low quality, unrealistic render, cartoonish style, deformed shapes, AI artifacts";

#[derive(Debug, thiserror::Error)]
pub enum ImageApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("image API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("invalid workflow: {0}")]
    Workflow(String),
    #[error("nothing to draw for '{0}'")]
    EmptyPrompt(String),
}

/// A finished output file reported by the job history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub subfolder: String,
}

#[async_trait]
pub trait ImageJobApi: Send + Sync {
    /// Queue a generation job and return its id.
    async fn submit(&self, positive: &str, negative: &str) -> Result<String, ImageApiError>;

    /// Raw history document for a job; `{}` while the job is unknown or queued.
    async fn history(&self, job_id: &str) -> Result<serde_json::Value, ImageApiError>;

    async fn fetch_artifact(&self, artifact: &Artifact) -> Result<Vec<u8>, ImageApiError>;
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    prompt_id: String,
}

pub struct ComfyUiClient {
    client: reqwest::Client,
    api_url: String,
    workflow: serde_json::Value,
    positive_node: String,
    negative_node: String,
    client_id: String,
}

impl ComfyUiClient {
    pub fn new(config: &ImageConfig) -> Result<Self, ImageApiError> {
        let raw = match &config.workflow_path {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| ImageApiError::Workflow(format!("{path}: {e}")))?,
            None => DEFAULT_WORKFLOW.to_string(),
        };
        let workflow: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| ImageApiError::Workflow(e.to_string()))?;

        for node in [&config.positive_node, &config.negative_node] {
            if workflow.pointer(&format!("/{node}/inputs")).is_none() {
                return Err(ImageApiError::Workflow(format!("node {node} has no inputs")));
            }
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_url: config.comfyui_url.trim_end_matches('/').to_string(),
            workflow,
            positive_node: config.positive_node.clone(),
            negative_node: config.negative_node.clone(),
            client_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Copy of the template with both prompts injected and a fresh sampler seed.
    pub fn build_workflow(&self, positive: &str, negative: &str) -> serde_json::Value {
        let mut workflow = self.workflow.clone();
        if let Some(text) = workflow.pointer_mut(&format!("/{}/inputs/text", self.positive_node)) {
            *text = serde_json::Value::String(positive.to_string());
        } else if let Some(inputs) = workflow.pointer_mut(&format!("/{}/inputs", self.positive_node)) {
            inputs["text"] = serde_json::Value::String(positive.to_string());
        }
        if let Some(text) = workflow.pointer_mut(&format!("/{}/inputs/text", self.negative_node)) {
            *text = serde_json::Value::String(negative.to_string());
        } else if let Some(inputs) = workflow.pointer_mut(&format!("/{}/inputs", self.negative_node)) {
            inputs["text"] = serde_json::Value::String(negative.to_string());
        }

        let seed: u32 = rand::thread_rng().gen();
        if let Some(nodes) = workflow.as_object_mut() {
            for node in nodes.values_mut() {
                if let Some(slot) = node.pointer_mut("/inputs/seed") {
                    *slot = serde_json::Value::from(seed);
                }
            }
        }
        workflow
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ImageApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ImageApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ImageJobApi for ComfyUiClient {
    async fn submit(&self, positive: &str, negative: &str) -> Result<String, ImageApiError> {
        let body = serde_json::json!({
            "prompt": self.build_workflow(positive, negative),
            "client_id": self.client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;
        let submitted: SubmitResponse = Self::ensure_success(response).await?.json().await?;
        tracing::info!(job_id = %submitted.prompt_id, "image job queued");
        Ok(submitted.prompt_id)
    }

    async fn history(&self, job_id: &str) -> Result<serde_json::Value, ImageApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, job_id))
            .send()
            .await?;
        Ok(Self::ensure_success(response).await?.json().await?)
    }

    async fn fetch_artifact(&self, artifact: &Artifact) -> Result<Vec<u8>, ImageApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", artifact.filename.as_str()),
                ("subfolder", artifact.subfolder.as_str()),
                ("type", "output"),
            ])
            .send()
            .await?;
        let bytes = Self::ensure_success(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Turns word records into image jobs.
#[derive(Clone)]
pub struct ImageJobSubmitter {
    api: Arc<dyn ImageJobApi>,
}

impl ImageJobSubmitter {
    pub fn new(api: Arc<dyn ImageJobApi>) -> Self {
        Self { api }
    }

    pub async fn submit_for(&self, details: &WordDetails) -> Result<String, ImageApiError> {
        let (positive, negative) = prompts_for(details)?;
        self.api.submit(&positive, &negative).await
    }
}

/// Positive prompt falls back to the example sentence, then the meaning.
pub fn prompts_for(details: &WordDetails) -> Result<(String, String), ImageApiError> {
    let positive = [
        &details.positive_prompt,
        &details.example_sentence,
        &details.meaning,
    ]
    .into_iter()
    .map(|s| s.trim())
    .find(|s| !s.is_empty())
    .ok_or_else(|| ImageApiError::EmptyPrompt(details.word.clone()))?;

    let negative = match details.negative_prompt.trim() {
        "" => DEFAULT_NEGATIVE_PROMPT,
        n => n,
    };
    Ok((positive.to_string(), negative.to_string()))
}
