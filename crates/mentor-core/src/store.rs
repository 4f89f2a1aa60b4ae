//! Storage traits, one per component.
//!
//! Each component trait extends [`Backend`], which fixes a single error type
//! for the whole backend. Services are written against the narrowest trait
//! they need; the [`Store`] umbrella bundles them for wiring.
//!
//! All methods return `Send` futures so implementations can be shared across
//! a multi-threaded tokio runtime.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  assignment::{
    Assignment, AssignmentStatus, NewAssignment, NewPublication, NewQuestion,
    Publication, Question,
  },
  chat::{ChatMessage, ChatRole, ChatSession},
  class::{Class, NewClass},
  feedback::{Feedback, FeedbackQuery, NewFeedback},
  submission::{Grade, NewSubmission, Submission, SubmissionStatus},
  user::{NewUser, User},
};

/// Errors raised by a storage backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// Whether the write was rejected by a uniqueness constraint
  /// (usernames, join codes, one submission per student and assignment).
  fn is_unique_violation(&self) -> bool;
}

pub trait Backend: Send + Sync {
  type Error: StoreError;
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Soft-deleted users are invisible to every read in this trait.
pub trait UserStore: Backend {
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn find_user_by_username(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Students whose `class_id` is `class_id`, ordered by username.
  fn list_class_students(
    &self,
    class_id: Uuid,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Set or clear a user's class membership.
  fn set_user_class(
    &self,
    user_id: Uuid,
    class_id: Option<Uuid>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn set_password_hash(
    &self,
    user_id: Uuid,
    password_hash: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Soft delete. Returns `false` if no live user had this id.
  fn delete_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Classes ─────────────────────────────────────────────────────────────────

pub trait ClassStore: Backend {
  /// Fails with a unique violation if `input.code` is taken.
  fn create_class(
    &self,
    input: NewClass,
  ) -> impl Future<Output = Result<Class, Self::Error>> + Send + '_;

  fn get_class(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Class>, Self::Error>> + Send + '_;

  fn find_class_by_code(
    &self,
    code: String,
  ) -> impl Future<Output = Result<Option<Class>, Self::Error>> + Send + '_;

  fn list_teacher_classes(
    &self,
    teacher_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Class>, Self::Error>> + Send + '_;

  /// Soft-delete every member account, then delete the class, atomically.
  /// Returns the number of member accounts removed.
  fn delete_class(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── Assignments ─────────────────────────────────────────────────────────────

pub trait AssignmentStore: Backend {
  fn create_assignment(
    &self,
    input: NewAssignment,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  fn get_assignment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Assignment>, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_teacher_assignments(
    &self,
    teacher_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  /// Published assignments tied to the class through a publication or the
  /// legacy `class_id` pointer. Newest first, no duplicates.
  fn list_class_assignments(
    &self,
    class_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  fn set_assignment_status(
    &self,
    id: Uuid,
    status: AssignmentStatus,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_question(
    &self,
    input: NewQuestion,
  ) -> impl Future<Output = Result<Question, Self::Error>> + Send + '_;

  /// Ordered by `order_num`.
  fn list_questions(
    &self,
    assignment_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Question>, Self::Error>> + Send + '_;

  fn get_publication(
    &self,
    assignment_id: Uuid,
    class_id: Uuid,
  ) -> impl Future<Output = Result<Option<Publication>, Self::Error>> + Send + '_;

  /// Fails with a unique violation if the pair is already published.
  fn create_publication(
    &self,
    input: NewPublication,
  ) -> impl Future<Output = Result<Publication, Self::Error>> + Send + '_;

  fn set_publication_deadline(
    &self,
    id: Uuid,
    deadline: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_publications(
    &self,
    assignment_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Publication>, Self::Error>> + Send + '_;

  /// Delete the assignment's submissions, questions and publications, then
  /// the assignment, atomically. Returns `false` if it did not exist.
  fn delete_assignment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Submissions ─────────────────────────────────────────────────────────────

pub trait SubmissionStore: Backend {
  /// Fails with a unique violation if the student already submitted.
  fn create_submission(
    &self,
    input: NewSubmission,
  ) -> impl Future<Output = Result<Submission, Self::Error>> + Send + '_;

  fn get_submission(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + '_;

  fn find_submission(
    &self,
    assignment_id: Uuid,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + '_;

  /// Overwrite every mutable field of an existing submission. `updated_at`
  /// is stamped by the store; the stored record is returned.
  fn save_submission(
    &self,
    submission: Submission,
  ) -> impl Future<Output = Result<Submission, Self::Error>> + Send + '_;

  /// Write a grading result and mark the submission graded. Only the
  /// grading columns and `updated_at` change, so answers or teacher feedback
  /// written during a model call survive. `None` if the submission is gone.
  fn record_grade(
    &self,
    id: Uuid,
    grade: Grade,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + '_;

  /// Oldest first.
  fn list_assignment_submissions(
    &self,
    assignment_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Submission>, Self::Error>> + Send + '_;

  fn count_submissions(
    &self,
    assignment_id: Uuid,
    status: Option<SubmissionStatus>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── Feedback ────────────────────────────────────────────────────────────────

pub trait FeedbackStore: Backend {
  fn create_feedback(
    &self,
    input: NewFeedback,
  ) -> impl Future<Output = Result<Feedback, Self::Error>> + Send + '_;

  fn get_feedback(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Feedback>, Self::Error>> + Send + '_;

  fn list_feedback(
    &self,
    query: FeedbackQuery,
  ) -> impl Future<Output = Result<Vec<Feedback>, Self::Error>> + Send + '_;

  /// Add one like in a single atomic update. Returns the updated item, or
  /// `None` if it does not exist.
  fn increment_likes(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Feedback>, Self::Error>> + Send + '_;

  /// Persist status and response fields. `updated_at` is stamped by the
  /// store.
  fn save_feedback(
    &self,
    feedback: Feedback,
  ) -> impl Future<Output = Result<Feedback, Self::Error>> + Send + '_;

  fn delete_feedback(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Chat ────────────────────────────────────────────────────────────────────

pub trait ChatStore: Backend {
  fn create_session(
    &self,
    user_id: Uuid,
    title: String,
  ) -> impl Future<Output = Result<ChatSession, Self::Error>> + Send + '_;

  fn get_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ChatSession>, Self::Error>> + Send + '_;

  /// Most recently active first.
  fn list_sessions(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ChatSession>, Self::Error>> + Send + '_;

  fn set_session_title(
    &self,
    id: Uuid,
    title: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Append to the log and bump the session's `updated_at`.
  fn append_message(
    &self,
    session_id: Uuid,
    role: ChatRole,
    content: String,
  ) -> impl Future<Output = Result<ChatMessage, Self::Error>> + Send + '_;

  /// In conversation order.
  fn list_messages(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ChatMessage>, Self::Error>> + Send + '_;
}

// ─── Umbrella ────────────────────────────────────────────────────────────────

/// Everything the service layer needs from a backend.
pub trait Store:
  UserStore
  + ClassStore
  + AssignmentStore
  + SubmissionStore
  + FeedbackStore
  + ChatStore
  + Clone
  + 'static
{
}

impl<T> Store for T where
  T: UserStore
    + ClassStore
    + AssignmentStore
    + SubmissionStore
    + FeedbackStore
    + ChatStore
    + Clone
    + 'static
{
}
