//! Tutor chat sessions and their append-only message logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
  System,
  User,
  Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
  pub id:         Uuid,
  pub user_id:    Uuid,
  pub title:      String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// One entry in a session's log. Ids increase monotonically, so ordering by
/// id gives conversation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
  pub id:         i64,
  pub session_id: Uuid,
  pub role:       ChatRole,
  pub content:    String,
  pub created_at: DateTime<Utc>,
}
