//! OpenAI-compatible chat-completion client.

use std::time::Duration;

use mentor_core::model::{LanguageModel, Turn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Connection settings for a hosted model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
  /// Base URL including the API version, e.g. `https://api.siliconflow.cn/v1`.
  pub base_url:     String,
  /// Bearer token. Requests are sent unauthenticated when empty.
  pub api_key:      String,
  pub model:        String,
  pub timeout_secs: u64,
}

impl Default for LlmConfig {
  fn default() -> Self {
    Self {
      base_url:     "https://api.siliconflow.cn/v1".to_owned(),
      api_key:      String::new(),
      model:        "Qwen/Qwen2.5-7B-Instruct".to_owned(),
      timeout_secs: 120,
    }
  }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
  config: LlmConfig,
  http:   reqwest::Client,
}

impl OpenAiClient {
  pub fn new(config: LlmConfig) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { config, http })
  }

  fn endpoint(&self) -> String {
    format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
  }

  async fn send(&self, turns: Vec<Turn>) -> Result<String> {
    let request = ChatRequest {
      model:    &self.config.model,
      messages: turns
        .iter()
        .map(|t| ChatMessage { role: t.role.as_ref(), content: &t.content })
        .collect(),
      stream:   false,
    };

    debug!(
      model = %self.config.model,
      turns = turns.len(),
      chars = turns.iter().map(|t| t.content.len()).sum::<usize>(),
      "sending completion request"
    );

    let mut builder = self.http.post(self.endpoint()).json(&request);
    if !self.config.api_key.is_empty() {
      builder = builder.bearer_auth(&self.config.api_key);
    }

    let response = builder.send().await?;
    if !response.status().is_success() {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Status { status, body });
    }

    let reply: ChatResponse = response.json().await?;
    let content = reply
      .choices
      .into_iter()
      .next()
      .map(|c| c.message.content)
      .ok_or(Error::EmptyReply)?;

    debug!(chars = content.len(), "received completion");
    Ok(content)
  }
}

impl LanguageModel for OpenAiClient {
  type Error = Error;

  async fn complete(&self, turns: Vec<Turn>) -> Result<String> { self.send(turns).await }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
  model:    &'a str,
  messages: Vec<ChatMessage<'a>>,
  stream:   bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
  role:    &'a str,
  content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
  #[serde(default)]
  content: String,
}

#[cfg(test)]
mod tests {
  use mentor_core::chat::ChatRole;

  use super::*;

  #[test]
  fn request_uses_lowercase_roles() {
    let turns = [Turn::system("be brief"), Turn::user("hi")];
    let request = ChatRequest {
      model:    "m",
      messages: turns
        .iter()
        .map(|t| ChatMessage { role: t.role.as_ref(), content: &t.content })
        .collect(),
      stream:   false,
    };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["messages"][0]["role"], "system");
    assert_eq!(json["messages"][1]["content"], "hi");
    assert_eq!(json["stream"], false);
    assert_eq!(ChatRole::Assistant.as_ref(), "assistant");
  }

  #[test]
  fn endpoint_tolerates_trailing_slash() {
    let client = OpenAiClient::new(LlmConfig {
      base_url: "http://localhost:8080/v1/".into(),
      ..Default::default()
    })
    .unwrap();
    assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
  }

  #[test]
  fn response_takes_first_choice() {
    let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}],"usage":{"total_tokens":3}}"#;
    let parsed: ChatResponse = serde_json::from_str(body).unwrap();
    assert_eq!(parsed.choices[0].message.content, "hello");
  }
}
