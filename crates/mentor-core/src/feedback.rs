//! The feedback board: free-form posts with likes and staff responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Category of a post. Unrecognised values fall back to `Other`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(serialize_all = "lowercase")]
pub enum FeedbackKind {
  Bug,
  Feature,
  Praise,
  Question,
  #[default]
  Other,
}

impl FeedbackKind {
  /// Lenient parse used for stored and user-supplied values.
  pub fn parse_lenient(value: &str) -> Self { value.parse().unwrap_or_default() }
}

impl From<String> for FeedbackKind {
  fn from(value: String) -> Self { Self::parse_lenient(&value) }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeedbackStatus {
  /// Also accepted as `pending`.
  #[default]
  #[serde(alias = "pending")]
  #[strum(to_string = "open", serialize = "pending")]
  Open,
  Processing,
  Resolved,
  Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
  pub id:               i64,
  pub title:            String,
  pub content:          String,
  /// A user id when the author was signed in, otherwise a client token.
  pub anonymous_id:     String,
  #[serde(rename = "type")]
  pub kind:             FeedbackKind,
  pub status:           FeedbackStatus,
  pub like_count:       i64,
  pub teacher_response: Option<String>,
  pub responded_at:     Option<DateTime<Utc>>,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
  pub title:        String,
  pub content:      String,
  pub anonymous_id: String,
  pub kind:         FeedbackKind,
}

/// Parameters for [`crate::store::FeedbackStore::list_feedback`]. Results are
/// ordered by like count, then newest first.
#[derive(Debug, Clone, Default)]
pub struct FeedbackQuery {
  pub kind:   Option<FeedbackKind>,
  pub status: Option<FeedbackStatus>,
  /// Substring matched against title and content.
  pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedbackStats {
  pub total:     usize,
  pub by_status: std::collections::BTreeMap<String, usize>,
  pub by_type:   std::collections::BTreeMap<String, usize>,
}

impl FeedbackStats {
  pub fn tally<'a>(items: impl IntoIterator<Item = &'a Feedback>) -> Self {
    use strum::IntoEnumIterator;

    let mut stats = Self::default();
    for status in FeedbackStatus::iter() {
      stats.by_status.insert(status.to_string(), 0);
    }
    for kind in FeedbackKind::iter() {
      stats.by_type.insert(kind.to_string(), 0);
    }
    for item in items {
      stats.total += 1;
      *stats.by_status.entry(item.status.to_string()).or_default() += 1;
      *stats.by_type.entry(item.kind.to_string()).or_default() += 1;
    }
    stats
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pending_is_an_alias_for_open() {
    let s: FeedbackStatus = serde_json::from_str("\"pending\"").unwrap();
    assert_eq!(s, FeedbackStatus::Open);
    assert_eq!("pending".parse::<FeedbackStatus>().unwrap(), FeedbackStatus::Open);
    assert_eq!(FeedbackStatus::Open.to_string(), "open");
  }

  #[test]
  fn unknown_kind_becomes_other() {
    let k: FeedbackKind = serde_json::from_str("\"complaint\"").unwrap();
    assert_eq!(k, FeedbackKind::Other);
    assert_eq!(FeedbackKind::parse_lenient("rant"), FeedbackKind::Other);
    assert_eq!(FeedbackKind::parse_lenient("bug"), FeedbackKind::Bug);
  }
}
