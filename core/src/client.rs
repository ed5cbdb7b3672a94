use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::errors::{GenieError, GenieResult};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, UpstreamErrorResponse};

/// A chat-style completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one request and return the raw text of the first choice.
    async fn complete(&self, request: &ChatCompletionRequest) -> GenieResult<String>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Get the model name being used
    fn model_name(&self) -> String;
}

/// Client for OpenRouter or any other OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    base_url: String,
    model_name: String,
    http_client: Client,
}

impl OpenRouterClient {
    pub fn new(config: &ServiceConfig) -> GenieResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GenieError::Configuration("API key is required for the completion service".to_string())
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| GenieError::Configuration("Invalid API key format".to_string()))?,
        );
        headers.insert(
            HeaderName::from_static("http-referer"),
            HeaderValue::from_str(&config.referer)
                .map_err(|_| GenieError::Configuration("Invalid referer header value".to_string()))?,
        );
        headers.insert(
            HeaderName::from_static("x-title"),
            HeaderValue::from_str(&config.app_name).map_err(|_| {
                GenieError::Configuration("Invalid application name header value".to_string())
            })?,
        );

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()
            .map_err(|e| GenieError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model_name: config.model.clone(),
            http_client,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Error body in OpenAI-compatible form. OpenRouter also sends these with
/// a 2xx status when the routed provider fails.
fn upstream_error(status: reqwest::StatusCode, body: &str) -> Option<GenieError> {
    let error_response = serde_json::from_str::<UpstreamErrorResponse>(body).ok()?;
    Some(GenieError::UpstreamFailure(format!(
        "status {}: {} (code: {:?})",
        status, error_response.error.message, error_response.error.code
    )))
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    fn provider_name(&self) -> &'static str {
        "openrouter"
    }

    fn model_name(&self) -> String {
        self.model_name.clone()
    }

    async fn complete(&self, request: &ChatCompletionRequest) -> GenieResult<String> {
        debug!(model = %request.model, "Sending chat completion request");

        let response = self
            .http_client
            .post(self.api_url())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if let Some(err) = upstream_error(status, &response_text) {
            return Err(err);
        }

        if !status.is_success() {
            return Err(GenieError::UpstreamFailure(format!(
                "status {}: {}",
                status, response_text
            )));
        }

        if response_text.trim().is_empty() {
            return Err(GenieError::EmptyUpstreamResponse);
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenieError::UpstreamFailure(format!("unreadable completion envelope: {}", e)))?;

        if let Some(reason) = completion.choices.first().and_then(|c| c.finish_reason.as_deref()) {
            if reason != "stop" {
                warn!("Completion finish reason: {}", reason);
            }
        }

        completion
            .first_content()
            .map(str::to_string)
            .ok_or(GenieError::EmptyUpstreamResponse)
    }
}
