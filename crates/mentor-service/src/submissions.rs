//! Student submissions and teacher overrides.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mentor_core::{
  assignment::Assignment,
  store::{AssignmentStore, StoreError, SubmissionStore, UserStore},
  submission::{AnswerMap, NewSubmission, Submission},
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
  error::{Result, ServiceError, forbidden, internal, invalid, not_found},
  grading::GradingQueue,
  identity::Actor,
};

/// Body of a submit request. Answer values may be any JSON; non-strings are
/// stored in their JSON text form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
  #[serde(default)]
  pub student_name: Option<String>,
  #[serde(default)]
  pub answers:      BTreeMap<String, serde_json::Value>,
  #[serde(default)]
  pub code:         String,
}

fn normalise_answers(raw: BTreeMap<String, serde_json::Value>) -> AnswerMap {
  raw
    .into_iter()
    .map(|(id, value)| {
      let text = match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
      };
      (id, text)
    })
    .collect()
}

/// A submission's code as a downloadable file.
#[derive(Debug, Clone)]
pub struct CodeDownload {
  pub filename: String,
  pub content:  String,
}

/// `<student>-<first 8 of assignment id>-<YYYYMMDD-HHMMSS>.go`
pub fn download_name(student_name: &str, assignment_id: Uuid, at: DateTime<Utc>) -> String {
  let student: String = student_name
    .chars()
    .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
    .collect();
  let short = &assignment_id.simple().to_string()[..8];
  format!("{student}-{short}-{}.go", at.format("%Y%m%d-%H%M%S"))
}

#[derive(Clone)]
pub struct Submissions<S> {
  store: S,
  queue: GradingQueue,
}

impl<S> Submissions<S>
where
  S: UserStore + AssignmentStore + SubmissionStore,
{
  pub fn new(store: S, queue: GradingQueue) -> Self { Self { store, queue } }

  async fn load(&self, id: Uuid) -> Result<(Submission, Assignment)> {
    let submission = self
      .store
      .get_submission(id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("submission"))?;
    let assignment = self
      .store
      .get_assignment(submission.assignment_id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("assignment"))?;
    Ok((submission, assignment))
  }

  /// Load a submission the actor may grade: the assignment's author.
  async fn load_for_teacher(&self, actor: &Actor, id: Uuid) -> Result<(Submission, Assignment)> {
    let (submission, assignment) = self.load(id).await?;
    if !actor.owns(assignment.teacher_id) {
      return Err(forbidden("not your assignment"));
    }
    Ok((submission, assignment))
  }

  /// Record the student's work and schedule grading. Resubmitting
  /// overwrites the previous answers in place.
  pub async fn submit(
    &self,
    actor: &Actor,
    assignment_id: Uuid,
    request: SubmitRequest,
  ) -> Result<Submission> {
    actor.require_student()?;
    let student = self
      .store
      .get_user(actor.id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("student"))?;
    let class_id = student
      .class_id
      .ok_or_else(|| invalid("join a class before submitting"))?;

    self
      .store
      .get_assignment(assignment_id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("assignment"))?;
    let publication = self
      .store
      .get_publication(assignment_id, class_id)
      .await
      .map_err(internal)?
      .ok_or_else(|| forbidden("assignment is not published to this class"))?;
    if publication.deadline.is_some_and(|deadline| Utc::now() > deadline) {
      return Err(ServiceError::Conflict("submission deadline has passed".to_owned()));
    }

    let student_name = request
      .student_name
      .map(|n| n.trim().to_owned())
      .filter(|n| !n.is_empty())
      .unwrap_or(student.name);
    let answers = normalise_answers(request.answers);

    let existing = self
      .store
      .find_submission(assignment_id, actor.id)
      .await
      .map_err(internal)?;

    let submission = match existing {
      Some(previous) => self.overwrite(previous, student_name, answers, request.code).await?,
      None => {
        let created = self
          .store
          .create_submission(NewSubmission {
            assignment_id,
            student_id: actor.id,
            student_name: student_name.clone(),
            answers: answers.clone(),
            code: request.code.clone(),
          })
          .await;
        match created {
          Ok(s) => s,
          // A concurrent submit won the insert; fall back to overwriting it.
          Err(e) if e.is_unique_violation() => {
            let previous = self
              .store
              .find_submission(assignment_id, actor.id)
              .await
              .map_err(internal)?
              .ok_or_else(|| not_found("submission"))?;
            self.overwrite(previous, student_name, answers, request.code).await?
          }
          Err(e) => return Err(internal(e)),
        }
      }
    };

    info!(submission = %submission.id, assignment = %assignment_id, "submission received");
    self.queue.enqueue(submission.id);
    Ok(submission)
  }

  async fn overwrite(
    &self,
    mut previous: Submission,
    student_name: String,
    answers: AnswerMap,
    code: String,
  ) -> Result<Submission> {
    previous.student_name = student_name;
    previous.answers = answers;
    previous.code = code;
    self.store.save_submission(previous).await.map_err(internal)
  }

  /// Visible to the submitting student and the assignment's author.
  pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Submission> {
    let (submission, assignment) = self.load(id).await?;
    if actor.id != submission.student_id && !actor.owns(assignment.teacher_id) {
      return Err(forbidden("not allowed to view this submission"));
    }
    Ok(submission)
  }

  pub async fn set_score(&self, actor: &Actor, id: Uuid, score: i64) -> Result<Submission> {
    if !(0..=100).contains(&score) {
      return Err(invalid("score must be between 0 and 100"));
    }
    let (mut submission, _) = self.load_for_teacher(actor, id).await?;
    submission.total_score = Some(score);
    self.store.save_submission(submission).await.map_err(internal)
  }

  pub async fn set_teacher_feedback(
    &self,
    actor: &Actor,
    id: Uuid,
    feedback: String,
  ) -> Result<Submission> {
    let (mut submission, _) = self.load_for_teacher(actor, id).await?;
    submission.teacher_feedback = feedback;
    self.store.save_submission(submission).await.map_err(internal)
  }

  /// Set one question's score and recompute the total as the sum of all
  /// per-question scores.
  pub async fn set_question_score(
    &self,
    actor: &Actor,
    id: Uuid,
    question_id: Uuid,
    score: i64,
  ) -> Result<Submission> {
    let (mut submission, assignment) = self.load_for_teacher(actor, id).await?;
    let questions = self
      .store
      .list_questions(assignment.id)
      .await
      .map_err(internal)?;
    let question = questions
      .iter()
      .find(|q| q.id == question_id)
      .ok_or_else(|| not_found("question"))?;
    if !(0..=question.score).contains(&score) {
      return Err(invalid(format!(
        "score must be between 0 and {}",
        question.score
      )));
    }

    submission.question_scores.insert(question_id.to_string(), score);
    submission.total_score = Some(submission.question_score_sum());
    self.store.save_submission(submission).await.map_err(internal)
  }

  pub async fn set_question_feedback(
    &self,
    actor: &Actor,
    id: Uuid,
    question_id: Uuid,
    feedback: String,
  ) -> Result<Submission> {
    let (mut submission, assignment) = self.load_for_teacher(actor, id).await?;
    let questions = self
      .store
      .list_questions(assignment.id)
      .await
      .map_err(internal)?;
    if !questions.iter().any(|q| q.id == question_id) {
      return Err(not_found("question"));
    }

    submission.question_feedback.insert(question_id.to_string(), feedback);
    self.store.save_submission(submission).await.map_err(internal)
  }

  /// Queue another grading run. The outcome is not reported.
  pub async fn regrade(&self, actor: &Actor, id: Uuid) -> Result<()> {
    self.load_for_teacher(actor, id).await?;
    info!(submission = %id, by = %actor.id, "regrade requested");
    self.queue.enqueue(id);
    Ok(())
  }

  pub async fn download_code(&self, actor: &Actor, id: Uuid) -> Result<CodeDownload> {
    let submission = self.get(actor, id).await?;
    if submission.code.trim().is_empty() {
      return Err(ServiceError::NotFound("no code was submitted".to_owned()));
    }
    Ok(CodeDownload {
      filename: download_name(
        &submission.student_name,
        submission.assignment_id,
        submission.created_at,
      ),
      content:  submission.code,
    })
  }
}
