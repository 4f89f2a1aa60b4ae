//! Language-model backends for Mentor.
//!
//! [`OpenAiClient`] talks to any OpenAI-compatible `chat/completions`
//! endpoint. [`ScriptedModel`] replays canned replies in-process and is what
//! the service and API tests run against.

mod client;
mod scripted;

pub mod error;

pub use client::{LlmConfig, OpenAiClient};
pub use error::{Error, Result};
pub use scripted::ScriptedModel;
