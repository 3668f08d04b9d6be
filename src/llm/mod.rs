pub mod assistant;

use serde::{Deserialize, Serialize};
use reqwest::Client;
use anyhow::Result;
use futures::Stream;
use std::pin::Pin;

use crate::config::Config;

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

#[derive(Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Deserialize, Debug)]
pub struct ChatStreamResponse {
    pub choices: Vec<ChatStreamChoice>,
    pub usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
pub struct ChatStreamChoice {
    pub delta: ChatStreamDelta,
}

#[derive(Deserialize, Debug)]
pub struct ChatStreamDelta {
    pub content: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    #[serde(default)]
    pub total_tokens: usize,
}

impl LlmClient {
    pub fn new(base_url: Option<String>, model: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.unwrap_or_else(|| crate::config::DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Some(config.base_url.clone()),
            Some(config.chat_model.clone()),
            config.api_key.clone(),
        )
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let mut builder = self.client.post(&url);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        builder
    }

    /// Streamed completion. The final event carries token usage when the
    /// server reports it.
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>> {
        let req = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: 0.7,
            stream: Some(true),
            stream_options: Some(StreamOptions { include_usage: true }),
        };

        let resp = self.post("chat/completions").json(&req).send().await?;

        if !resp.status().is_success() {
             let err_text = resp.text().await.unwrap_or_default();
             anyhow::bail!("Chat request failed: {}", err_text);
        }

        let stream = resp.bytes_stream();

        // Server-sent events: one `data: {...}` JSON payload per line.
        let processed_stream = async_stream::try_stream! {
            let mut buffer = String::new();

            for await chunk_res in stream {
                let bytes = chunk_res.map_err(|e| anyhow::anyhow!("Stream error: {}", e))?;
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        break;
                    }

                    if let Ok(resp) = serde_json::from_str::<ChatStreamResponse>(data) {
                        if let Some(choice) = resp.choices.first() {
                            if let Some(content) = &choice.delta.content {
                                yield StreamEvent::Content(content.clone());
                            }
                        }
                        if let Some(usage) = resp.usage {
                            yield StreamEvent::Usage(usage);
                        }
                    }
                }
            }
        };

        Ok(Box::pin(processed_stream))
    }
}

pub enum StreamEvent {
    Content(String),
    Usage(Usage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_request_asks_for_usage() {
        let req = ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![ChatMessage::system("ctx"), ChatMessage::user("q")],
            temperature: 0.7,
            stream: Some(true),
            stream_options: Some(StreamOptions { include_usage: true }),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["stream_options"]["include_usage"], true);
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn stream_chunk_parses_delta_and_usage() {
        let chunk: ChatStreamResponse = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":"Sub"}}],"usage":{"prompt_tokens":3,"completion_tokens":1}}"#,
        )
        .unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Sub"));
        assert_eq!(chunk.usage.map(|u| u.total_tokens), Some(0));
    }

    #[test]
    fn client_defaults() {
        let client = LlmClient::from_config(&Config::default());
        assert_eq!(client.model, "gpt-4o-mini");
        assert!(client.api_key.is_none());
    }
}
