//! Student submissions and their grading results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Question id → the student's answer text.
pub type AnswerMap = BTreeMap<String, String>;
/// Question id → awarded points.
pub type ScoreMap = BTreeMap<String, i64>;
/// Question id → a short grading note.
pub type NoteMap = BTreeMap<String, String>;

/// `Submitted → Graded`. A regrade leaves the submission `Graded`.
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
pub enum SubmissionStatus {
  #[default]
  Submitted,
  Graded,
}

/// One student's work on one assignment. Unique per
/// `(assignment_id, student_id)`; a resubmission overwrites in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
  pub id:                Uuid,
  pub assignment_id:     Uuid,
  pub student_id:        Uuid,
  /// Display name captured at submit time.
  pub student_name:      String,
  pub answers:           AnswerMap,
  pub code:              String,
  /// `None` until the first grading run completes.
  pub total_score:       Option<i64>,
  pub ai_feedback:       String,
  pub teacher_feedback:  String,
  pub question_scores:   ScoreMap,
  pub question_feedback: NoteMap,
  pub status:            SubmissionStatus,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

impl Submission {
  /// Sum of the per-question scores.
  pub fn question_score_sum(&self) -> i64 { self.question_scores.values().sum() }
}

/// Input to [`crate::store::SubmissionStore::create_submission`].
#[derive(Debug, Clone)]
pub struct NewSubmission {
  pub assignment_id: Uuid,
  pub student_id:    Uuid,
  pub student_name:  String,
  pub answers:       AnswerMap,
  pub code:          String,
}

/// The outcome of one grading run, applied by
/// [`crate::store::SubmissionStore::record_grade`]. A map left as `None` keeps
/// whatever is stored.
#[derive(Debug, Clone, Default)]
pub struct Grade {
  pub total_score:       i64,
  pub ai_feedback:       String,
  pub question_scores:   Option<ScoreMap>,
  pub question_feedback: Option<NoteMap>,
}

/// What a student sees for one published assignment.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StudentProgress {
  NotSubmitted,
  Submitted,
  Graded,
}

impl StudentProgress {
  pub fn of(submission: Option<&Submission>) -> Self {
    match submission.map(|s| s.status) {
      None => Self::NotSubmitted,
      Some(SubmissionStatus::Submitted) => Self::Submitted,
      Some(SubmissionStatus::Graded) => Self::Graded,
    }
  }
}
