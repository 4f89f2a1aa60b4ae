//! The hosted language model, as seen by the grading pipeline and the tutor.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::chat::ChatRole;

/// One message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
  pub role:    ChatRole,
  pub content: String,
}

impl Turn {
  pub fn system(content: impl Into<String>) -> Self {
    Self { role: ChatRole::System, content: content.into() }
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self { role: ChatRole::User, content: content.into() }
  }

  pub fn assistant(content: impl Into<String>) -> Self {
    Self { role: ChatRole::Assistant, content: content.into() }
  }
}

/// A chat-completion endpoint.
///
/// The returned text is untrusted: callers that expect JSON must run it
/// through [`crate::reply`].
pub trait LanguageModel: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Complete the conversation and return the assistant's reply text.
  fn complete(
    &self,
    turns: Vec<Turn>,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;
}
