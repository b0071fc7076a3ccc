use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::CompletionProvider;
use crate::error::{LlmError, Result};

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
///
/// Covers the hosted OpenAI API, OpenRouter, DeepSeek, local Ollama, and the
/// rest of the compatible crowd — the base URL decides.
pub struct OpenAiCompatProvider {
    base_url: String,
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        model: String,
        timeout_secs: u64,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            model,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .connect_timeout(std::time::Duration::from_secs(10))
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(std::time::Duration::from_secs(90))
                .tcp_keepalive(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn build_request(&self, prompt: &str, temperature: f64, max_tokens: u32) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature,
            max_tokens,
        }
    }

    async fn call_api(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(request);

        if let Some(auth_header) = &self.cached_auth_header {
            builder = builder.header("Authorization", auth_header);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            }
            .into());
        }

        Ok(response
            .json()
            .await
            .map_err(|e| LlmError::Request(format!("response JSON decode failed: {e}")))?)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    async fn complete(&self, prompt: &str, temperature: f64, max_tokens: u32) -> Result<String> {
        let request = self.build_request(prompt, temperature, max_tokens);
        let chat_response = self.call_api(&request).await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyCompletion.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let provider =
            OpenAiCompatProvider::new("https://api.openai.com/v1/", None, "gpt-4o".into(), 30);
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn request_carries_model_and_caps() {
        let provider =
            OpenAiCompatProvider::new("https://api.openai.com/v1", Some("sk-x"), "gpt-4o".into(), 30);
        let request = provider.build_request("polish this", 0.3, 100);
        assert_eq!(request.model, "gpt-4o");
        assert!((request.temperature - 0.3).abs() < f64::EPSILON);
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
    }
}
