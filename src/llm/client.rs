//! Async LLM client for command extraction
//!
//! Model-agnostic HTTP client for hosted completion endpoints. Supports the
//! Anthropic messages API and OpenAI-compatible chat APIs (DeepSeek, etc).
//! Every request carries exactly one user-role message; the caller folds
//! instructions, context and the utterance into it.

use crate::core::config::LlmConfig;
use crate::core::error::{AmpError, Result};
use crate::llm::LanguageModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// API format type
#[derive(Debug, Clone, PartialEq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

/// Async LLM client for making API calls
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    api_format: ApiFormat,
}

impl LlmClient {
    /// Create a new LLM client with explicit configuration
    pub fn new(api_key: String, api_url: String, model: String, timeout: Duration) -> Result<Self> {
        let api_format = Self::detect_api_format(&api_url);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AmpError::Config(format!("could not build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            api_url,
            model,
            max_tokens: 100,
            api_format,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AmpError::Config("language model API key not set".into()));
        }
        let mut client = Self::new(
            config.api_key.clone(),
            config.api_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        client.max_tokens = config.max_tokens;
        Ok(client)
    }

    /// Detect API format from URL
    fn detect_api_format(url: &str) -> ApiFormat {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            // DeepSeek, OpenAI, and other compatible APIs use OpenAI format
            ApiFormat::OpenAI
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete_anthropic(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message::user(prompt)],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AmpError::from_transport("language model", e))?;

        let completion: AnthropicResponse = Self::read_json(response).await?;

        completion
            .content
            .into_iter()
            .find_map(|c| c.text)
            .ok_or_else(|| AmpError::Extraction("empty response from language model".into()))
    }

    async fn complete_openai(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message::user(prompt)],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AmpError::from_transport("language model", e))?;

        let completion: OpenAIResponse = Self::read_json(response).await?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AmpError::Extraction("empty response from language model".into()))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AmpError::Extraction(format!(
                "language model API error ({}): {}",
                status.as_u16(),
                error_text
            )));
        }
        response.json().await.map_err(|e| {
            if e.is_timeout() {
                AmpError::from_transport("language model", e)
            } else {
                AmpError::Extraction(format!("unreadable language model response: {}", e))
            }
        })
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.model, chars = prompt.len(), "sending prompt");
        let text = match self.api_format {
            ApiFormat::Anthropic => self.complete_anthropic(prompt).await?,
            ApiFormat::OpenAI => self.complete_openai(prompt).await?,
        };
        tracing::debug!(answer = %text.trim(), "model answered");
        Ok(text.trim().to_string())
    }
}

// Same request shape for both formats: one user message, no system block
#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn user(content: &str) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

// Anthropic API format
#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

// OpenAI-compatible API format (DeepSeek, OpenAI, etc.)
#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlmClient::new(
            "test-key".into(),
            "https://api.example.com".into(),
            "test-model".into(),
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.api_url, "https://api.example.com");
        assert_eq!(client.model(), "test-model");
        assert_eq!(client.api_format, ApiFormat::OpenAI);
    }

    #[test]
    fn test_detect_anthropic() {
        assert_eq!(
            LlmClient::detect_api_format("https://api.anthropic.com/v1/messages"),
            ApiFormat::Anthropic
        );
        assert_eq!(
            LlmClient::detect_api_format("https://api.deepseek.com/chat/completions"),
            ApiFormat::OpenAI
        );
    }

    #[test]
    fn test_from_config_requires_key() {
        let result = LlmClient::from_config(&LlmConfig::default());
        assert!(matches!(result, Err(AmpError::Config(_))));
    }

    #[test]
    fn test_from_config_applies_max_tokens() {
        let config = LlmConfig {
            api_key: "k".into(),
            max_tokens: 42,
            ..LlmConfig::default()
        };
        let client = LlmClient::from_config(&config).unwrap();
        assert_eq!(client.max_tokens, 42);
        assert_eq!(client.api_format, ApiFormat::Anthropic);
    }

    #[test]
    fn test_request_has_single_user_message() {
        let request = CompletionRequest {
            model: "m".into(),
            max_tokens: 10,
            messages: vec![Message::user("hello")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_anthropic_response_skips_non_text_blocks() {
        let json = r#"{"content": [{"type": "thinking"}, {"type": "text", "text": "pause"}]}"#;
        let response: AnthropicResponse = serde_json::from_str(json).unwrap();
        let text = response.content.into_iter().find_map(|c| c.text);
        assert_eq!(text.as_deref(), Some("pause"));
    }
}
