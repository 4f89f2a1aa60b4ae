//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 with fixed microsecond precision so that string
//! order matches time order. UUIDs are hyphenated lowercase strings. Maps and
//! option lists are compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use mentor_core::{
  assignment::{Assignment, Publication, Question, QuestionKind},
  chat::{ChatMessage, ChatSession},
  class::Class,
  error::parse_variant,
  feedback::{Feedback, FeedbackKind},
  submission::Submission,
  user::User,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

pub fn encode_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, username, password_hash, name, role, \
  class_id, created_at, updated_at, deleted_at";

pub struct RawUser {
  pub user_id:       String,
  pub username:      String,
  pub password_hash: String,
  pub name:          String,
  pub role:          String,
  pub class_id:      Option<String>,
  pub created_at:    String,
  pub updated_at:    String,
  pub deleted_at:    Option<String>,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      username:      row.get(1)?,
      password_hash: row.get(2)?,
      name:          row.get(3)?,
      role:          row.get(4)?,
      class_id:      row.get(5)?,
      created_at:    row.get(6)?,
      updated_at:    row.get(7)?,
      deleted_at:    row.get(8)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:            decode_uuid(&self.user_id)?,
      username:      self.username,
      password_hash: self.password_hash,
      name:          self.name,
      role:          parse_variant("role", &self.role)?,
      class_id:      decode_opt_uuid(self.class_id)?,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
      deleted_at:    decode_opt_dt(self.deleted_at)?,
    })
  }
}

// ─── Classes ─────────────────────────────────────────────────────────────────

pub const CLASS_COLUMNS: &str =
  "class_id, name, teacher_id, code, created_at, updated_at";

pub struct RawClass {
  pub class_id:   String,
  pub name:       String,
  pub teacher_id: String,
  pub code:       String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawClass {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      class_id:   row.get(0)?,
      name:       row.get(1)?,
      teacher_id: row.get(2)?,
      code:       row.get(3)?,
      created_at: row.get(4)?,
      updated_at: row.get(5)?,
    })
  }

  pub fn into_class(self) -> Result<Class> {
    Ok(Class {
      id:         decode_uuid(&self.class_id)?,
      name:       self.name,
      teacher_id: decode_uuid(&self.teacher_id)?,
      code:       self.code,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Assignments ─────────────────────────────────────────────────────────────

pub const ASSIGNMENT_COLUMNS: &str = "a.assignment_id, a.title, a.description, \
  a.teacher_id, a.kind, a.status, a.class_id, a.rubric, a.deadline, \
  a.created_at, a.updated_at";

pub struct RawAssignment {
  pub assignment_id: String,
  pub title:         String,
  pub description:   String,
  pub teacher_id:    String,
  pub kind:          String,
  pub status:        String,
  pub class_id:      Option<String>,
  pub rubric:        Option<String>,
  pub deadline:      Option<String>,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawAssignment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment_id: row.get(0)?,
      title:         row.get(1)?,
      description:   row.get(2)?,
      teacher_id:    row.get(3)?,
      kind:          row.get(4)?,
      status:        row.get(5)?,
      class_id:      row.get(6)?,
      rubric:        row.get(7)?,
      deadline:      row.get(8)?,
      created_at:    row.get(9)?,
      updated_at:    row.get(10)?,
    })
  }

  pub fn into_assignment(self) -> Result<Assignment> {
    Ok(Assignment {
      id:          decode_uuid(&self.assignment_id)?,
      title:       self.title,
      description: self.description,
      teacher_id:  decode_uuid(&self.teacher_id)?,
      kind:        parse_variant("assignment kind", &self.kind)?,
      status:      parse_variant("assignment status", &self.status)?,
      class_id:    decode_opt_uuid(self.class_id)?,
      rubric:      self.rubric.as_deref().map(serde_json::from_str).transpose()?,
      deadline:    decode_opt_dt(self.deadline)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Questions ───────────────────────────────────────────────────────────────

pub const QUESTION_COLUMNS: &str = "question_id, assignment_id, kind, options, \
  content, answer, score, order_num";

/// Split a [`QuestionKind`] into its `kind` and `options` column values.
pub fn encode_question_kind(kind: &QuestionKind) -> Result<(String, Option<String>)> {
  let options = kind.options().map(encode_json).transpose()?;
  Ok((kind.discriminant().to_owned(), options))
}

pub struct RawQuestion {
  pub question_id:   String,
  pub assignment_id: String,
  pub kind:          String,
  pub options:       Option<String>,
  pub content:       String,
  pub answer:        String,
  pub score:         i64,
  pub order_num:     i64,
}

impl RawQuestion {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      question_id:   row.get(0)?,
      assignment_id: row.get(1)?,
      kind:          row.get(2)?,
      options:       row.get(3)?,
      content:       row.get(4)?,
      answer:        row.get(5)?,
      score:         row.get(6)?,
      order_num:     row.get(7)?,
    })
  }

  pub fn into_question(self) -> Result<Question> {
    let options: Option<Vec<String>> =
      self.options.as_deref().map(serde_json::from_str).transpose()?;
    Ok(Question {
      id:            decode_uuid(&self.question_id)?,
      assignment_id: decode_uuid(&self.assignment_id)?,
      kind:          QuestionKind::from_parts(&self.kind, options)?,
      content:       self.content,
      answer:        self.answer,
      score:         self.score,
      order_num:     self.order_num,
    })
  }
}

// ─── Publications ────────────────────────────────────────────────────────────

pub const PUBLICATION_COLUMNS: &str = "publication_id, assignment_id, class_id, \
  deadline, released_at, created_at";

pub struct RawPublication {
  pub publication_id: String,
  pub assignment_id:  String,
  pub class_id:       String,
  pub deadline:       Option<String>,
  pub released_at:    String,
  pub created_at:     String,
}

impl RawPublication {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      publication_id: row.get(0)?,
      assignment_id:  row.get(1)?,
      class_id:       row.get(2)?,
      deadline:       row.get(3)?,
      released_at:    row.get(4)?,
      created_at:     row.get(5)?,
    })
  }

  pub fn into_publication(self) -> Result<Publication> {
    Ok(Publication {
      id:            decode_uuid(&self.publication_id)?,
      assignment_id: decode_uuid(&self.assignment_id)?,
      class_id:      decode_uuid(&self.class_id)?,
      deadline:      decode_opt_dt(self.deadline)?,
      released_at:   decode_dt(&self.released_at)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

// ─── Submissions ─────────────────────────────────────────────────────────────

pub const SUBMISSION_COLUMNS: &str = "submission_id, assignment_id, student_id, \
  student_name, answers, code, total_score, ai_feedback, teacher_feedback, \
  question_scores, question_feedback, status, created_at, updated_at";

pub struct RawSubmission {
  pub submission_id:     String,
  pub assignment_id:     String,
  pub student_id:        String,
  pub student_name:      String,
  pub answers:           String,
  pub code:              String,
  pub total_score:       Option<i64>,
  pub ai_feedback:       String,
  pub teacher_feedback:  String,
  pub question_scores:   String,
  pub question_feedback: String,
  pub status:            String,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawSubmission {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      submission_id:     row.get(0)?,
      assignment_id:     row.get(1)?,
      student_id:        row.get(2)?,
      student_name:      row.get(3)?,
      answers:           row.get(4)?,
      code:              row.get(5)?,
      total_score:       row.get(6)?,
      ai_feedback:       row.get(7)?,
      teacher_feedback:  row.get(8)?,
      question_scores:   row.get(9)?,
      question_feedback: row.get(10)?,
      status:            row.get(11)?,
      created_at:        row.get(12)?,
      updated_at:        row.get(13)?,
    })
  }

  pub fn into_submission(self) -> Result<Submission> {
    Ok(Submission {
      id:                decode_uuid(&self.submission_id)?,
      assignment_id:     decode_uuid(&self.assignment_id)?,
      student_id:        decode_uuid(&self.student_id)?,
      student_name:      self.student_name,
      answers:           serde_json::from_str(&self.answers)?,
      code:              self.code,
      total_score:       self.total_score,
      ai_feedback:       self.ai_feedback,
      teacher_feedback:  self.teacher_feedback,
      question_scores:   serde_json::from_str(&self.question_scores)?,
      question_feedback: serde_json::from_str(&self.question_feedback)?,
      status:            parse_variant("submission status", &self.status)?,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Feedback ────────────────────────────────────────────────────────────────

pub const FEEDBACK_COLUMNS: &str = "feedback_id, title, content, anonymous_id, \
  kind, status, like_count, teacher_response, responded_at, created_at, \
  updated_at";

pub struct RawFeedback {
  pub feedback_id:      i64,
  pub title:            String,
  pub content:          String,
  pub anonymous_id:     String,
  pub kind:             String,
  pub status:           String,
  pub like_count:       i64,
  pub teacher_response: Option<String>,
  pub responded_at:     Option<String>,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawFeedback {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      feedback_id:      row.get(0)?,
      title:            row.get(1)?,
      content:          row.get(2)?,
      anonymous_id:     row.get(3)?,
      kind:             row.get(4)?,
      status:           row.get(5)?,
      like_count:       row.get(6)?,
      teacher_response: row.get(7)?,
      responded_at:     row.get(8)?,
      created_at:       row.get(9)?,
      updated_at:       row.get(10)?,
    })
  }

  pub fn into_feedback(self) -> Result<Feedback> {
    Ok(Feedback {
      id:               self.feedback_id,
      title:            self.title,
      content:          self.content,
      anonymous_id:     self.anonymous_id,
      kind:             FeedbackKind::parse_lenient(&self.kind),
      status:           parse_variant("feedback status", &self.status)?,
      like_count:       self.like_count,
      teacher_response: self.teacher_response,
      responded_at:     decode_opt_dt(self.responded_at)?,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Chat ────────────────────────────────────────────────────────────────────

pub const SESSION_COLUMNS: &str =
  "session_id, user_id, title, created_at, updated_at";

pub struct RawSession {
  pub session_id: String,
  pub user_id:    String,
  pub title:      String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawSession {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id: row.get(0)?,
      user_id:    row.get(1)?,
      title:      row.get(2)?,
      created_at: row.get(3)?,
      updated_at: row.get(4)?,
    })
  }

  pub fn into_session(self) -> Result<ChatSession> {
    Ok(ChatSession {
      id:         decode_uuid(&self.session_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      title:      self.title,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const MESSAGE_COLUMNS: &str =
  "message_id, session_id, role, content, created_at";

pub struct RawMessage {
  pub message_id: i64,
  pub session_id: String,
  pub role:       String,
  pub content:    String,
  pub created_at: String,
}

impl RawMessage {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id: row.get(0)?,
      session_id: row.get(1)?,
      role:       row.get(2)?,
      content:    row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_message(self) -> Result<ChatMessage> {
    Ok(ChatMessage {
      id:         self.message_id,
      session_id: decode_uuid(&self.session_id)?,
      role:       parse_variant("chat role", &self.role)?,
      content:    self.content,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
