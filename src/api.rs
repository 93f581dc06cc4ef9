use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to backend failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{endpoint} returned status {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub model: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    models: Option<u64>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// What the backend reported about itself on `/api/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendStatus {
    pub running: bool,
    pub model_count: u64,
}

/// A chat reply that made it back from the backend, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Reply(String),
    Failed(String),
    Empty,
}

impl ChatResponse {
    /// A non-empty `response` wins; otherwise `error`; otherwise nothing usable.
    fn into_outcome(self) -> ChatOutcome {
        match (self.response, self.error) {
            (Some(text), _) if !text.is_empty() => ChatOutcome::Reply(text),
            (_, Some(error)) => ChatOutcome::Failed(error),
            _ => ChatOutcome::Empty,
        }
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn status(&self) -> Result<BackendStatus, ApiError> {
        let url = format!("{}/api/status", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                endpoint: "/api/status",
                status: response.status(),
            });
        }

        let body: StatusResponse = response.json().await?;
        Ok(BackendStatus {
            running: body.status == "running",
            model_count: body.models.unwrap_or(0),
        })
    }

    pub async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/api/models", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                endpoint: "/api/models",
                status: response.status(),
            });
        }

        let body: ModelsResponse = response.json().await?;
        Ok(body.models)
    }

    /// Posts one chat message. The backend reports application errors in the
    /// body with a 4xx/5xx status, so the body is parsed whatever the status.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatOutcome, ApiError> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body: ChatResponse = response.json().await?;
        let outcome = body.into_outcome();

        if !status.is_success() {
            tracing::debug!(%status, ?outcome, "chat endpoint returned an error status");
        }

        Ok(outcome)
    }
}
