//! [`SqliteStore`]: the SQLite implementation of the Mentor storage traits.

use std::path::Path;

use chrono::{DateTime, Utc};
use mentor_core::{
  assignment::{
    Assignment, AssignmentStatus, NewAssignment, NewPublication, NewQuestion,
    Publication, Question,
  },
  chat::{ChatMessage, ChatRole, ChatSession},
  class::{Class, NewClass},
  feedback::{Feedback, FeedbackQuery, FeedbackStatus, NewFeedback},
  store::{
    AssignmentStore, Backend, ChatStore, ClassStore, FeedbackStore,
    SubmissionStore, UserStore,
  },
  submission::{Grade, NewSubmission, Submission, SubmissionStatus},
  user::{NewUser, User},
};
use rusqlite::{OptionalExtension as _, Row};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ASSIGNMENT_COLUMNS, CLASS_COLUMNS, FEEDBACK_COLUMNS, MESSAGE_COLUMNS,
    PUBLICATION_COLUMNS, QUESTION_COLUMNS, RawAssignment, RawClass, RawFeedback,
    RawMessage, RawPublication, RawQuestion, RawSession, RawSubmission, RawUser,
    SESSION_COLUMNS, SUBMISSION_COLUMNS, USER_COLUMNS, encode_dt, encode_json,
    encode_question_kind, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Mentor store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn query_all<T, P, F>(
  conn: &rusqlite::Connection,
  sql: &str,
  params: P,
  map: F,
) -> rusqlite::Result<Vec<T>>
where
  P: rusqlite::Params,
  F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
  let mut stmt = conn.prepare(sql)?;
  let rows: rusqlite::Result<Vec<T>> = stmt.query_map(params, map)?.collect();
  rows
}

impl Backend for SqliteStore {
  type Error = crate::Error;
}

// ─── Users ───────────────────────────────────────────────────────────────────

impl UserStore for SqliteStore {
  async fn create_user(&self, input: NewUser) -> Result<User> {
    let now = Utc::now();
    let user = User {
      id:            Uuid::new_v4(),
      username:      input.username,
      password_hash: input.password_hash,
      name:          input.name,
      role:          input.role,
      class_id:      None,
      created_at:    now,
      updated_at:    now,
      deleted_at:    None,
    };

    let id_str   = encode_uuid(user.id);
    let username = user.username.clone();
    let hash     = user.password_hash.clone();
    let name     = user.name.clone();
    let role     = user.role.as_ref().to_owned();
    let at_str   = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (
             user_id, username, password_hash, name, role, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          rusqlite::params![id_str, username, hash, name, role, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE user_id = ?1 AND deleted_at IS NULL"
              ),
              rusqlite::params![id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn find_user_by_username(&self, username: String) -> Result<Option<User>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE username = ?1 AND deleted_at IS NULL"
              ),
              rusqlite::params![username],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    let raws = self
      .conn
      .call(|conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE deleted_at IS NULL ORDER BY created_at"
          ),
          [],
          RawUser::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn list_class_students(&self, class_id: Uuid) -> Result<Vec<User>> {
    let class_str = encode_uuid(class_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE class_id = ?1 AND role = 'student' AND deleted_at IS NULL
             ORDER BY username"
          ),
          rusqlite::params![class_str],
          RawUser::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn set_user_class(&self, user_id: Uuid, class_id: Option<Uuid>) -> Result<()> {
    let id_str    = encode_uuid(user_id);
    let class_str = class_id.map(encode_uuid);
    let at_str    = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE users SET class_id = ?2, updated_at = ?3
           WHERE user_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, class_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_password_hash(&self, user_id: Uuid, password_hash: String) -> Result<()> {
    let id_str = encode_uuid(user_id);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE users SET password_hash = ?2, updated_at = ?3
           WHERE user_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, password_hash, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_user(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(Utc::now());

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users SET deleted_at = ?2, updated_at = ?2
           WHERE user_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;
    Ok(n > 0)
  }
}

// ─── Classes ─────────────────────────────────────────────────────────────────

impl ClassStore for SqliteStore {
  async fn create_class(&self, input: NewClass) -> Result<Class> {
    let now = Utc::now();
    let class = Class {
      id:         Uuid::new_v4(),
      name:       input.name,
      teacher_id: input.teacher_id,
      code:       input.code,
      created_at: now,
      updated_at: now,
    };

    let id_str      = encode_uuid(class.id);
    let name        = class.name.clone();
    let teacher_str = encode_uuid(class.teacher_id);
    let code        = class.code.clone();
    let at_str      = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO classes (class_id, name, teacher_id, code, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![id_str, name, teacher_str, code, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(class)
  }

  async fn get_class(&self, id: Uuid) -> Result<Option<Class>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CLASS_COLUMNS} FROM classes WHERE class_id = ?1"),
              rusqlite::params![id_str],
              RawClass::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawClass::into_class).transpose()
  }

  async fn find_class_by_code(&self, code: String) -> Result<Option<Class>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CLASS_COLUMNS} FROM classes WHERE code = ?1"),
              rusqlite::params![code],
              RawClass::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawClass::into_class).transpose()
  }

  async fn list_teacher_classes(&self, teacher_id: Uuid) -> Result<Vec<Class>> {
    let teacher_str = encode_uuid(teacher_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {CLASS_COLUMNS} FROM classes
             WHERE teacher_id = ?1 ORDER BY created_at"
          ),
          rusqlite::params![teacher_str],
          RawClass::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawClass::into_class).collect()
  }

  async fn delete_class(&self, id: Uuid) -> Result<usize> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(Utc::now());

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let removed = tx.execute(
          "UPDATE users SET deleted_at = ?2, updated_at = ?2
           WHERE class_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, at_str],
        )?;
        tx.execute(
          "DELETE FROM classes WHERE class_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    Ok(removed)
  }
}

// ─── Assignments ─────────────────────────────────────────────────────────────

impl AssignmentStore for SqliteStore {
  async fn create_assignment(&self, input: NewAssignment) -> Result<Assignment> {
    let now = Utc::now();
    let assignment = Assignment {
      id:          Uuid::new_v4(),
      title:       input.title,
      description: input.description,
      teacher_id:  input.teacher_id,
      kind:        input.kind,
      status:      AssignmentStatus::Draft,
      class_id:    input.class_id,
      rubric:      input.rubric,
      deadline:    input.deadline,
      created_at:  now,
      updated_at:  now,
    };

    let id_str       = encode_uuid(assignment.id);
    let title        = assignment.title.clone();
    let description  = assignment.description.clone();
    let teacher_str  = encode_uuid(assignment.teacher_id);
    let kind_str     = assignment.kind.as_ref().to_owned();
    let status_str   = assignment.status.as_ref().to_owned();
    let class_str    = assignment.class_id.map(encode_uuid);
    let rubric_str   = assignment.rubric.as_ref().map(encode_json).transpose()?;
    let deadline_str = assignment.deadline.map(encode_dt);
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO assignments (
             assignment_id, title, description, teacher_id, kind, status,
             class_id, rubric, deadline, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
          rusqlite::params![
            id_str,
            title,
            description,
            teacher_str,
            kind_str,
            status_str,
            class_str,
            rubric_str,
            deadline_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(assignment)
  }

  async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a
                 WHERE a.assignment_id = ?1"
              ),
              rusqlite::params![id_str],
              RawAssignment::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawAssignment::into_assignment).transpose()
  }

  async fn list_teacher_assignments(&self, teacher_id: Uuid) -> Result<Vec<Assignment>> {
    let teacher_str = encode_uuid(teacher_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a
             WHERE a.teacher_id = ?1 ORDER BY a.created_at DESC"
          ),
          rusqlite::params![teacher_str],
          RawAssignment::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawAssignment::into_assignment).collect()
  }

  async fn list_class_assignments(&self, class_id: Uuid) -> Result<Vec<Assignment>> {
    let class_str = encode_uuid(class_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a
             WHERE a.status = 'published'
               AND (a.class_id = ?1 OR EXISTS (
                 SELECT 1 FROM publications p
                 WHERE p.assignment_id = a.assignment_id AND p.class_id = ?1
               ))
             ORDER BY a.created_at DESC"
          ),
          rusqlite::params![class_str],
          RawAssignment::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawAssignment::into_assignment).collect()
  }

  async fn set_assignment_status(&self, id: Uuid, status: AssignmentStatus) -> Result<()> {
    let id_str     = encode_uuid(id);
    let status_str = status.as_ref().to_owned();
    let at_str     = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE assignments SET status = ?2, updated_at = ?3 WHERE assignment_id = ?1",
          rusqlite::params![id_str, status_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn add_question(&self, input: NewQuestion) -> Result<Question> {
    let question = Question {
      id:            Uuid::new_v4(),
      assignment_id: input.assignment_id,
      kind:          input.kind,
      content:       input.content,
      answer:        input.answer,
      score:         input.score,
      order_num:     input.order_num,
    };

    let id_str                  = encode_uuid(question.id);
    let assignment_str          = encode_uuid(question.assignment_id);
    let (kind_str, options_str) = encode_question_kind(&question.kind)?;
    let content                 = question.content.clone();
    let answer                  = question.answer.clone();
    let score                   = question.score;
    let order_num               = question.order_num;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO questions (
             question_id, assignment_id, kind, options, content, answer, score, order_num
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            assignment_str,
            kind_str,
            options_str,
            content,
            answer,
            score,
            order_num,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(question)
  }

  async fn list_questions(&self, assignment_id: Uuid) -> Result<Vec<Question>> {
    let assignment_str = encode_uuid(assignment_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {QUESTION_COLUMNS} FROM questions
             WHERE assignment_id = ?1 ORDER BY order_num"
          ),
          rusqlite::params![assignment_str],
          RawQuestion::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawQuestion::into_question).collect()
  }

  async fn get_publication(
    &self,
    assignment_id: Uuid,
    class_id: Uuid,
  ) -> Result<Option<Publication>> {
    let assignment_str = encode_uuid(assignment_id);
    let class_str      = encode_uuid(class_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {PUBLICATION_COLUMNS} FROM publications
                 WHERE assignment_id = ?1 AND class_id = ?2"
              ),
              rusqlite::params![assignment_str, class_str],
              RawPublication::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawPublication::into_publication).transpose()
  }

  async fn create_publication(&self, input: NewPublication) -> Result<Publication> {
    let now = Utc::now();
    let publication = Publication {
      id:            Uuid::new_v4(),
      assignment_id: input.assignment_id,
      class_id:      input.class_id,
      deadline:      input.deadline,
      released_at:   now,
      created_at:    now,
    };

    let id_str         = encode_uuid(publication.id);
    let assignment_str = encode_uuid(publication.assignment_id);
    let class_str      = encode_uuid(publication.class_id);
    let deadline_str   = publication.deadline.map(encode_dt);
    let at_str         = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO publications (
             publication_id, assignment_id, class_id, deadline, released_at, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![id_str, assignment_str, class_str, deadline_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(publication)
  }

  async fn set_publication_deadline(
    &self,
    id: Uuid,
    deadline: Option<DateTime<Utc>>,
  ) -> Result<()> {
    let id_str       = encode_uuid(id);
    let deadline_str = deadline.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE publications SET deadline = ?2 WHERE publication_id = ?1",
          rusqlite::params![id_str, deadline_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_publications(&self, assignment_id: Uuid) -> Result<Vec<Publication>> {
    let assignment_str = encode_uuid(assignment_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {PUBLICATION_COLUMNS} FROM publications
             WHERE assignment_id = ?1 ORDER BY created_at"
          ),
          rusqlite::params![assignment_str],
          RawPublication::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawPublication::into_publication).collect()
  }

  async fn delete_assignment(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for sql in [
          "DELETE FROM submissions  WHERE assignment_id = ?1",
          "DELETE FROM questions    WHERE assignment_id = ?1",
          "DELETE FROM publications WHERE assignment_id = ?1",
          "DELETE FROM assignments  WHERE assignment_id = ?1",
        ] {
          tx.execute(sql, rusqlite::params![id_str])?;
        }
        let deleted = tx.changes() > 0;
        tx.commit()?;
        Ok(deleted)
      })
      .await?;
    Ok(deleted)
  }
}

// ─── Submissions ─────────────────────────────────────────────────────────────

impl SubmissionStore for SqliteStore {
  async fn create_submission(&self, input: NewSubmission) -> Result<Submission> {
    let now = Utc::now();
    let submission = Submission {
      id:                Uuid::new_v4(),
      assignment_id:     input.assignment_id,
      student_id:        input.student_id,
      student_name:      input.student_name,
      answers:           input.answers,
      code:              input.code,
      total_score:       None,
      ai_feedback:       String::new(),
      teacher_feedback:  String::new(),
      question_scores:   Default::default(),
      question_feedback: Default::default(),
      status:            SubmissionStatus::Submitted,
      created_at:        now,
      updated_at:        now,
    };

    let id_str         = encode_uuid(submission.id);
    let assignment_str = encode_uuid(submission.assignment_id);
    let student_str    = encode_uuid(submission.student_id);
    let student_name   = submission.student_name.clone();
    let answers_str    = encode_json(&submission.answers)?;
    let code           = submission.code.clone();
    let status_str     = submission.status.as_ref().to_owned();
    let at_str         = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO submissions (
             submission_id, assignment_id, student_id, student_name,
             answers, code, status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
          rusqlite::params![
            id_str,
            assignment_str,
            student_str,
            student_name,
            answers_str,
            code,
            status_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(submission)
  }

  async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE submission_id = ?1"
              ),
              rusqlite::params![id_str],
              RawSubmission::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSubmission::into_submission).transpose()
  }

  async fn find_submission(
    &self,
    assignment_id: Uuid,
    student_id: Uuid,
  ) -> Result<Option<Submission>> {
    let assignment_str = encode_uuid(assignment_id);
    let student_str    = encode_uuid(student_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SUBMISSION_COLUMNS} FROM submissions
                 WHERE assignment_id = ?1 AND student_id = ?2"
              ),
              rusqlite::params![assignment_str, student_str],
              RawSubmission::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSubmission::into_submission).transpose()
  }

  async fn save_submission(&self, mut submission: Submission) -> Result<Submission> {
    submission.updated_at = Utc::now();

    let id_str            = encode_uuid(submission.id);
    let student_name      = submission.student_name.clone();
    let answers_str       = encode_json(&submission.answers)?;
    let code              = submission.code.clone();
    let total_score       = submission.total_score;
    let ai_feedback       = submission.ai_feedback.clone();
    let teacher_feedback  = submission.teacher_feedback.clone();
    let scores_str        = encode_json(&submission.question_scores)?;
    let notes_str         = encode_json(&submission.question_feedback)?;
    let status_str        = submission.status.as_ref().to_owned();
    let at_str            = encode_dt(submission.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE submissions SET
             student_name = ?2, answers = ?3, code = ?4, total_score = ?5,
             ai_feedback = ?6, teacher_feedback = ?7, question_scores = ?8,
             question_feedback = ?9, status = ?10, updated_at = ?11
           WHERE submission_id = ?1",
          rusqlite::params![
            id_str,
            student_name,
            answers_str,
            code,
            total_score,
            ai_feedback,
            teacher_feedback,
            scores_str,
            notes_str,
            status_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(submission)
  }

  async fn record_grade(&self, id: Uuid, grade: Grade) -> Result<Option<Submission>> {
    let id_str     = encode_uuid(id);
    let scores_str = grade.question_scores.as_ref().map(encode_json).transpose()?;
    let notes_str  = grade.question_feedback.as_ref().map(encode_json).transpose()?;
    let status_str = SubmissionStatus::Graded.as_ref().to_owned();
    let at_str     = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE submissions SET
             total_score = ?2, ai_feedback = ?3,
             question_scores = COALESCE(?4, question_scores),
             question_feedback = COALESCE(?5, question_feedback),
             status = ?6, updated_at = ?7
           WHERE submission_id = ?1",
          rusqlite::params![
            id_str,
            grade.total_score,
            grade.ai_feedback,
            scores_str,
            notes_str,
            status_str,
            at_str,
          ],
        )?;
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE submission_id = ?1"
              ),
              rusqlite::params![id_str],
              RawSubmission::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSubmission::into_submission).transpose()
  }

  async fn list_assignment_submissions(&self, assignment_id: Uuid) -> Result<Vec<Submission>> {
    let assignment_str = encode_uuid(assignment_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions
             WHERE assignment_id = ?1 ORDER BY created_at"
          ),
          rusqlite::params![assignment_str],
          RawSubmission::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawSubmission::into_submission).collect()
  }

  async fn count_submissions(
    &self,
    assignment_id: Uuid,
    status: Option<SubmissionStatus>,
  ) -> Result<usize> {
    let assignment_str = encode_uuid(assignment_id);
    let status_str     = status.map(|s| s.as_ref().to_owned());

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM submissions
           WHERE assignment_id = ?1 AND (?2 IS NULL OR status = ?2)",
          rusqlite::params![assignment_str, status_str],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(n as usize)
  }
}

// ─── Feedback ────────────────────────────────────────────────────────────────

fn select_feedback(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawFeedback>> {
  conn
    .query_row(
      &format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE feedback_id = ?1"),
      rusqlite::params![id],
      RawFeedback::from_row,
    )
    .optional()
}

impl FeedbackStore for SqliteStore {
  async fn create_feedback(&self, input: NewFeedback) -> Result<Feedback> {
    let now = Utc::now();

    let title        = input.title.clone();
    let content      = input.content.clone();
    let anonymous_id = input.anonymous_id.clone();
    let kind_str     = input.kind.as_ref().to_owned();
    let status_str   = FeedbackStatus::Open.to_string();
    let at_str       = encode_dt(now);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO feedback (
             title, content, anonymous_id, kind, status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          rusqlite::params![title, content, anonymous_id, kind_str, status_str, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Feedback {
      id,
      title: input.title,
      content: input.content,
      anonymous_id: input.anonymous_id,
      kind: input.kind,
      status: FeedbackStatus::Open,
      like_count: 0,
      teacher_response: None,
      responded_at: None,
      created_at: now,
      updated_at: now,
    })
  }

  async fn get_feedback(&self, id: i64) -> Result<Option<Feedback>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_feedback(conn, id)?))
      .await?;
    raw.map(RawFeedback::into_feedback).transpose()
  }

  async fn list_feedback(&self, query: FeedbackQuery) -> Result<Vec<Feedback>> {
    let kind_str   = query.kind.map(|k| k.as_ref().to_owned());
    let status_str = query.status.map(|s| s.to_string());
    let pattern    = query
      .search
      .filter(|s| !s.trim().is_empty())
      .map(|s| format!("%{}%", s.trim()));

    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback
             WHERE (?1 IS NULL OR kind = ?1)
               AND (?2 IS NULL OR status = ?2)
               AND (?3 IS NULL OR title LIKE ?3 OR content LIKE ?3)
             ORDER BY like_count DESC, created_at DESC, feedback_id DESC"
          ),
          rusqlite::params![kind_str, status_str, pattern],
          RawFeedback::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawFeedback::into_feedback).collect()
  }

  async fn increment_likes(&self, id: i64) -> Result<Option<Feedback>> {
    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE feedback SET like_count = like_count + 1 WHERE feedback_id = ?1",
          rusqlite::params![id],
        )?;
        Ok(select_feedback(conn, id)?)
      })
      .await?;
    raw.map(RawFeedback::into_feedback).transpose()
  }

  async fn save_feedback(&self, mut feedback: Feedback) -> Result<Feedback> {
    feedback.updated_at = Utc::now();

    let id           = feedback.id;
    let status_str   = feedback.status.to_string();
    let response     = feedback.teacher_response.clone();
    let responded_at = feedback.responded_at.map(encode_dt);
    let at_str       = encode_dt(feedback.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE feedback SET
             status = ?2, teacher_response = ?3, responded_at = ?4, updated_at = ?5
           WHERE feedback_id = ?1",
          rusqlite::params![id, status_str, response, responded_at, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(feedback)
  }

  async fn delete_feedback(&self, id: i64) -> Result<bool> {
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM feedback WHERE feedback_id = ?1",
          rusqlite::params![id],
        )?)
      })
      .await?;
    Ok(n > 0)
  }
}

// ─── Chat ────────────────────────────────────────────────────────────────────

impl ChatStore for SqliteStore {
  async fn create_session(&self, user_id: Uuid, title: String) -> Result<ChatSession> {
    let now = Utc::now();
    let session = ChatSession {
      id: Uuid::new_v4(),
      user_id,
      title,
      created_at: now,
      updated_at: now,
    };

    let id_str   = encode_uuid(session.id);
    let user_str = encode_uuid(user_id);
    let title    = session.title.clone();
    let at_str   = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO chat_sessions (session_id, user_id, title, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)",
          rusqlite::params![id_str, user_str, title, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(session)
  }

  async fn get_session(&self, id: Uuid) -> Result<Option<ChatSession>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE session_id = ?1"),
              rusqlite::params![id_str],
              RawSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSession::into_session).transpose()
  }

  async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<ChatSession>> {
    let user_str = encode_uuid(user_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions
             WHERE user_id = ?1 ORDER BY updated_at DESC"
          ),
          rusqlite::params![user_str],
          RawSession::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawSession::into_session).collect()
  }

  async fn set_session_title(&self, id: Uuid, title: String) -> Result<()> {
    let id_str = encode_uuid(id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE chat_sessions SET title = ?2 WHERE session_id = ?1",
          rusqlite::params![id_str, title],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn append_message(
    &self,
    session_id: Uuid,
    role: ChatRole,
    content: String,
  ) -> Result<ChatMessage> {
    let now = Utc::now();

    let session_str = encode_uuid(session_id);
    let role_str    = role.as_ref().to_owned();
    let body        = content.clone();
    let at_str      = encode_dt(now);

    let id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO chat_messages (session_id, role, content, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![session_str, role_str, body, at_str],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
          "UPDATE chat_sessions SET updated_at = ?2 WHERE session_id = ?1",
          rusqlite::params![session_str, at_str],
        )?;
        tx.commit()?;
        Ok(id)
      })
      .await?;

    Ok(ChatMessage { id, session_id, role, content, created_at: now })
  }

  async fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
    let session_str = encode_uuid(session_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages
             WHERE session_id = ?1 ORDER BY message_id"
          ),
          rusqlite::params![session_str],
          RawMessage::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawMessage::into_message).collect()
  }
}
