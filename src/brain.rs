use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

pub const DEFAULT_MODEL: &str = "tzafon.northstar.cua.sft";

/// History length past which every request logs a warning; nothing is trimmed.
const LONG_HISTORY_WARNING: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A message in the conversation history sent to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Content,
}

/// Append-only turn history for one task.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: Role::System,
                content: Content::Text(system_prompt.into()),
            }],
        }
    }

    /// A user turn carrying text and one screenshot.
    pub fn push_observation(&mut self, text: impl Into<String>, image_url: impl Into<String>) {
        self.messages.push(ChatMessage {
            role: Role::User,
            content: Content::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: Content::Text(text.into()),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Anything that can look at the conversation and answer with one decision.
#[async_trait]
pub trait Model: Send + Sync {
    async fn decide(&mut self, conversation: &Conversation) -> Result<String>;
}

/// OpenAI-compatible chat completions client.
pub struct ChatModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl Model for ChatModel {
    async fn decide(&mut self, conversation: &Conversation) -> Result<String> {
        if conversation.len() > LONG_HISTORY_WARNING {
            warn!(
                "[Brain] Conversation history is long ({} messages)",
                conversation.len()
            );
        }

        let body = json!({
            "model": self.model,
            "messages": conversation.messages(),
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let json_resp: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let err_msg = json_resp["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error");
            return Err(anyhow!("Model API error ({}): {}", status, err_msg));
        }

        let content = json_resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("No content in model response: {}", json_resp))?;

        debug!("[Brain] Model says: {}", content);
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serializes_multimodal_turns_in_chat_format() {
        let mut conversation = Conversation::new("be brief");
        conversation.push_observation("Task: t", "https://img/1.png");
        conversation.push_assistant(r#"{"action":"wait"}"#);

        let value = serde_json::to_value(conversation.messages()).unwrap();
        assert_eq!(
            value,
            json!([
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": [
                    { "type": "text", "text": "Task: t" },
                    { "type": "image_url", "image_url": { "url": "https://img/1.png" } },
                ]},
                { "role": "assistant", "content": "{\"action\":\"wait\"}" },
            ])
        );
    }

    #[test]
    fn history_only_grows() {
        let mut conversation = Conversation::new("sys");
        for i in 0..3 {
            conversation.push_observation(format!("step {i}"), "u");
            conversation.push_assistant("{}");
        }
        assert_eq!(conversation.len(), 7);
        assert_eq!(conversation.messages()[0].role, Role::System);
        assert_eq!(conversation.messages()[6].role, Role::Assistant);
    }
}
