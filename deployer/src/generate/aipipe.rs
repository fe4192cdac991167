//! AIPipe backend (OpenAI-compatible proxy)

use async_trait::async_trait;
use openapi_client::models::{
    ChatMessage, ChatRequest, ChatResponse, ResponsesRequest, ResponsesResponse,
};
use secrecy::SecretString;
use tracing::warn;

use crate::errors::DeployerError;
use crate::generate::{GenerationError, LlmBackend};
use crate::http::client::{ClientOptions, HttpClient};

/// Which upstream API shape to speak
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiFormat {
    /// `POST /openai/v1/responses`
    #[default]
    Responses,
    /// `POST /openrouter/v1/chat/completions`
    ChatCompletions,
}

impl std::str::FromStr for ApiFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "responses" | "openai" => Ok(ApiFormat::Responses),
            "chat" | "chat_completions" | "openrouter" => Ok(ApiFormat::ChatCompletions),
            _ => Err(format!("Invalid API format: {}", s)),
        }
    }
}

/// LLM backend talking to AIPipe
pub struct AiPipeBackend {
    http: HttpClient,
    format: ApiFormat,
    timeout: std::time::Duration,
}

impl AiPipeBackend {
    /// Create a backend; the HTTP timeout is a backstop, the generation
    /// client enforces the real deadline
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        format: ApiFormat,
        timeout: std::time::Duration,
    ) -> Result<Self, DeployerError> {
        let http = HttpClient::new(ClientOptions {
            base_url: base_url.to_string(),
            bearer: Some(api_key),
            timeout,
            ..Default::default()
        })?;
        Ok(Self {
            http,
            format,
            timeout,
        })
    }
}

#[async_trait]
impl LlmBackend for AiPipeBackend {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let text = match self.format {
            ApiFormat::Responses => {
                let body = ResponsesRequest { model, input: prompt };
                let response: ResponsesResponse = self
                    .http
                    .post("/openai/v1/responses", &body)
                    .await
                    .map_err(|e| classify(e, self.timeout))?;
                response.first_text().map(str::to_string)
            }
            ApiFormat::ChatCompletions => {
                let body = ChatRequest {
                    model: format!("openai/{}", model),
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                };
                let response: ChatResponse = self
                    .http
                    .post("/openrouter/v1/chat/completions", &body)
                    .await
                    .map_err(|e| classify(e, self.timeout))?;
                response.first_content().map(str::to_string)
            }
        };

        match text {
            Some(text) => Ok(text),
            None => {
                warn!("Unexpected response structure from {}", self.http.base_url());
                Err(GenerationError::EmptyOutput(
                    "response contained no text".to_string(),
                ))
            }
        }
    }
}

/// Map transport errors onto generation error classes
fn classify(err: DeployerError, timeout: std::time::Duration) -> GenerationError {
    match &err {
        DeployerError::Status { status: 429, body } => GenerationError::RateLimited(body.clone()),
        DeployerError::HttpError(e) if e.is_timeout() => GenerationError::Timeout(timeout),
        _ => GenerationError::BackendError(err.to_string()),
    }
}
