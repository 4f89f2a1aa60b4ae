//! Assignments, their questions, and the per-class publication records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Assignment ──────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssignmentKind {
  #[default]
  Code,
  Choice,
  Fill,
  Mixed,
}

/// Lifecycle of an assignment.
///
/// `Draft → Published` happens on the first publication to any class.
/// `Closed` exists for stored data only; nothing transitions into it.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssignmentStatus {
  #[default]
  Draft,
  Published,
  Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
  pub id:          Uuid,
  pub title:       String,
  pub description: String,
  pub teacher_id:  Uuid,
  pub kind:        AssignmentKind,
  pub status:      AssignmentStatus,
  /// Legacy single-class pointer, still honoured when listing a class's
  /// assignments. New publications go through [`Publication`].
  pub class_id:    Option<Uuid>,
  /// Opaque grading rubric supplied by the author.
  pub rubric:      Option<serde_json::Value>,
  /// Legacy assignment-wide deadline.
  pub deadline:    Option<DateTime<Utc>>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input to [`crate::store::AssignmentStore::create_assignment`]. New
/// assignments always start as drafts.
#[derive(Debug, Clone, Default)]
pub struct NewAssignment {
  pub title:       String,
  pub description: String,
  pub teacher_id:  Uuid,
  pub kind:        AssignmentKind,
  pub rubric:      Option<serde_json::Value>,
  pub class_id:    Option<Uuid>,
  pub deadline:    Option<DateTime<Utc>>,
}

// ─── Question ────────────────────────────────────────────────────────────────

/// The shape of a question. Only multiple-choice questions carry extra data.
///
/// On the wire this flattens into the question object as `"type"` plus, for
/// choice questions, `"options"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
  Choice {
    #[serde(default)]
    options: Vec<String>,
  },
  Fill,
  Code,
}

impl QuestionKind {
  /// The discriminant stored in the `kind` column.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Choice { .. } => "choice",
      Self::Fill => "fill",
      Self::Code => "code",
    }
  }

  pub fn options(&self) -> Option<&[String]> {
    match self {
      Self::Choice { options } => Some(options),
      _ => None,
    }
  }

  /// Rebuild from the stored discriminant and the optional options list.
  pub fn from_parts(discriminant: &str, options: Option<Vec<String>>) -> Result<Self> {
    match discriminant {
      "choice" => Ok(Self::Choice { options: options.unwrap_or_default() }),
      "fill" => Ok(Self::Fill),
      "code" => Ok(Self::Code),
      other => Err(Error::UnknownVariant {
        kind:  "question kind",
        value: other.to_owned(),
      }),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
  pub id:            Uuid,
  pub assignment_id: Uuid,
  #[serde(flatten)]
  pub kind:          QuestionKind,
  /// Prompt text shown to the student.
  pub content:       String,
  /// Canonical answer used for grading.
  pub answer:        String,
  /// Maximum points for this question.
  pub score:         i64,
  /// 1-based position within the assignment.
  pub order_num:     i64,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
  pub assignment_id: Uuid,
  pub kind:          QuestionKind,
  pub content:       String,
  pub answer:        String,
  pub score:         i64,
  pub order_num:     i64,
}

// ─── Publication ─────────────────────────────────────────────────────────────

/// The link between an assignment and one class it was released to.
/// At most one exists per `(assignment_id, class_id)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
  pub id:            Uuid,
  pub assignment_id: Uuid,
  pub class_id:      Uuid,
  /// Submissions after this instant are rejected.
  pub deadline:      Option<DateTime<Utc>>,
  pub released_at:   DateTime<Utc>,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPublication {
  pub assignment_id: Uuid,
  pub class_id:      Uuid,
  pub deadline:      Option<DateTime<Utc>>,
}

/// A publication decorated with its class's display name.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedClass {
  #[serde(flatten)]
  pub publication: Publication,
  pub class_name:  String,
}

/// An assignment together with its ordered question list.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentDetail {
  pub assignment: Assignment,
  pub questions:  Vec<Question>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn choice_question_flattens_type_and_options() {
    let q = Question {
      id:            Uuid::nil(),
      assignment_id: Uuid::nil(),
      kind:          QuestionKind::Choice { options: vec!["A. 1".into(), "B. 2".into()] },
      content:       "1 + 1?".into(),
      answer:        "B".into(),
      score:         5,
      order_num:     1,
    };
    let json = serde_json::to_value(&q).unwrap();
    assert_eq!(json["type"], "choice");
    assert_eq!(json["options"][1], "B. 2");
    assert!(json.get("kind").is_none());
  }

  #[test]
  fn fill_question_has_no_options_on_the_wire() {
    let json = serde_json::json!({
      "id": Uuid::nil(),
      "assignment_id": Uuid::nil(),
      "type": "fill",
      "content": "The zero value of int is __",
      "answer": "0",
      "score": 5,
      "order_num": 2,
    });
    let q: Question = serde_json::from_value(json).unwrap();
    assert_eq!(q.kind, QuestionKind::Fill);
    assert!(q.kind.options().is_none());
    assert!(serde_json::to_value(&q).unwrap().get("options").is_none());
  }

  #[test]
  fn from_parts_rejects_unknown_discriminant() {
    assert!(QuestionKind::from_parts("essay", None).is_err());
    assert_eq!(
      QuestionKind::from_parts("choice", None).unwrap(),
      QuestionKind::Choice { options: vec![] }
    );
  }

  #[test]
  fn status_round_trips_through_strum() {
    let s: AssignmentStatus = "published".parse().unwrap();
    assert_eq!(s, AssignmentStatus::Published);
    assert_eq!(AssignmentStatus::Closed.as_ref(), "closed");
  }
}
