use dotenv::dotenv;
use reqwest::Client;
use serde_json::json;
use std::env;
use thiserror::Error;
use tracing::debug;

use super::endpoints::{ChatCompletionRequest, ChatCompletionResponse, DEFAULT_MODEL, OPENROUTER_CHAT_URL};

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError { status: reqwest::StatusCode, error_body: String },
    #[error("API returned no usable content")]
    EmptyResponse,
}

#[derive(Clone, Debug)]
pub enum Provider {
    OpenRouter {
        /// Name of the environment variable holding the key, not the key.
        api_key_env_var: String,
        model: String,
        /// Upstream provider to pin requests to, if any.
        route: Option<String>,
    },
}

impl Provider {
    pub fn openrouter(api_key_env_var: &str) -> Self {
        dotenv().ok();
        Self::OpenRouter {
            api_key_env_var: api_key_env_var.to_string(),
            model: DEFAULT_MODEL.to_string(),
            route: Some("Cerebras".to_string()),
        }
    }

    pub fn with_model(self, model: impl Into<String>) -> Self {
        match self {
            Provider::OpenRouter { api_key_env_var, route, .. } => {
                Provider::OpenRouter { api_key_env_var, model: model.into(), route }
            }
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenRouter { model, .. } => model,
        }
    }

    pub async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        match self {
            Provider::OpenRouter { api_key_env_var, route, .. } => {
                dotenv().ok();
                let api_key = env::var(api_key_env_var)
                    .map_err(|_| ApiConnectionError::MissingApiKey(api_key_env_var.clone()))?;

                let mut payload = serde_json::to_value(&request)?;
                if let (Some(route), Some(obj)) = (route, payload.as_object_mut()) {
                    obj.insert("provider".to_string(), json!({ "only": [route] }));
                }

                let site_url = env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
                let app_name = env::var("APP_NAME").unwrap_or_else(|_| "MealPlanEngine".to_string());

                debug!(model = %request.model, messages = request.messages.len(), "calling chat completion");
                let response = Client::new()
                    .post(OPENROUTER_CHAT_URL)
                    .bearer_auth(api_key)
                    .header("Content-Type", "application/json")
                    .header("HTTP-Referer", site_url)
                    .header("X-Title", app_name)
                    .json(&payload)
                    .send()
                    .await?;

                if response.status().is_success() {
                    Ok(response.json::<ChatCompletionResponse>().await?)
                } else {
                    let status = response.status();
                    let error_body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to read error body".to_string());
                    Err(ApiConnectionError::ApiError { status, error_body })
                }
            }
        }
    }
}

/// Removes a surrounding markdown code fence (```json ... ``` or ``` ... ```)
/// that models like to wrap JSON answers in.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if !(trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() >= 6) {
        return trimmed;
    }
    let inner = &trimmed[3..trimmed.len() - 3];
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}
