//! The AI grading pipeline and the background worker that drives it.
//!
//! Submitting work only enqueues the submission id on a [`GradingQueue`]. A
//! [`GradingWorker`] drains the queue, spawning one task per job; each task
//! waits a short settle delay and then runs [`Grader::grade`]. Failures are
//! logged against the submission id and never reach the submitter.

use std::{sync::Arc, time::Duration};

use mentor_core::{
  model::{LanguageModel, Turn},
  prompt::grading_prompt,
  reply::{GradingReply, excerpt},
  store::{AssignmentStore, SubmissionStore},
  submission::{Grade, NoteMap, ScoreMap, Submission},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Result, internal, model_unavailable, not_found};

// ─── Grader ──────────────────────────────────────────────────────────────────

pub struct Grader<S, M> {
  store: S,
  model: Arc<M>,
}

impl<S: Clone, M> Clone for Grader<S, M> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), model: Arc::clone(&self.model) }
  }
}

impl<S, M> Grader<S, M>
where
  S: AssignmentStore + SubmissionStore,
  M: LanguageModel,
{
  pub fn new(store: S, model: Arc<M>) -> Self { Self { store, model } }

  /// Grade one submission and persist the result.
  ///
  /// A failed model call is an error and leaves the submission untouched.
  /// A reply that cannot be parsed is not: it is stored verbatim as the
  /// feedback with a score of 0, and the submission is still marked graded.
  pub async fn grade(&self, submission_id: Uuid) -> Result<Submission> {
    let submission = self
      .store
      .get_submission(submission_id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("submission"))?;
    let assignment = self
      .store
      .get_assignment(submission.assignment_id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("assignment"))?;
    let questions = self
      .store
      .list_questions(assignment.id)
      .await
      .map_err(internal)?;

    let prompt = grading_prompt(&assignment, &questions, &submission);
    debug!(submission = %submission_id, chars = prompt.len(), "grading prompt built");

    let reply = self
      .model
      .complete(vec![Turn::user(prompt)])
      .await
      .map_err(|e| {
        warn!(submission = %submission_id, error = %e, "grading model call failed");
        model_unavailable()
      })?;

    let grade = match GradingReply::parse(&reply) {
      Ok(parsed) => Grade {
        total_score:       parsed.total_score,
        ai_feedback:       parsed.ai_feedback,
        question_scores:   match parsed.question_scores {
          Some(Ok(scores)) => Some(scores),
          Some(Err(e)) => {
            warn!(submission = %submission_id, error = %e, "ignoring question scores");
            None
          }
          None => Some(ScoreMap::new()),
        },
        question_feedback: match parsed.question_feedback {
          Some(Ok(notes)) => Some(notes),
          Some(Err(e)) => {
            warn!(submission = %submission_id, error = %e, "ignoring question feedback");
            None
          }
          None => Some(NoteMap::new()),
        },
      },
      Err(e) => {
        warn!(
          submission = %submission_id,
          error = %e,
          reply = %excerpt(&reply),
          "grading reply was not usable JSON; storing it as feedback"
        );
        Grade { total_score: 0, ai_feedback: reply, ..Default::default() }
      }
    };

    let saved = self
      .store
      .record_grade(submission_id, grade)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("submission"))?;
    info!(submission = %submission_id, score = ?saved.total_score, "submission graded");
    Ok(saved)
  }
}

// ─── Queue ───────────────────────────────────────────────────────────────────

/// The sending half: cheap to clone, never blocks.
#[derive(Clone)]
pub struct GradingQueue {
  tx: mpsc::UnboundedSender<Uuid>,
}

/// The receiving half, consumed by a [`GradingWorker`].
pub struct GradingJobs {
  rx: mpsc::UnboundedReceiver<Uuid>,
}

impl GradingQueue {
  pub fn new() -> (Self, GradingJobs) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, GradingJobs { rx })
  }

  /// Schedule a grading run. Returns immediately.
  pub fn enqueue(&self, submission_id: Uuid) {
    if self.tx.send(submission_id).is_err() {
      warn!(submission = %submission_id, "grading worker is gone; job dropped");
    } else {
      debug!(submission = %submission_id, "grading job queued");
    }
  }
}

impl GradingJobs {
  pub async fn next(&mut self) -> Option<Uuid> { self.rx.recv().await }

  /// Take a queued job without waiting.
  pub fn try_next(&mut self) -> Option<Uuid> { self.rx.try_recv().ok() }
}

// ─── Worker ──────────────────────────────────────────────────────────────────

pub struct GradingWorker<S, M> {
  grader: Grader<S, M>,
  jobs:   GradingJobs,
  settle: Duration,
}

impl<S, M> GradingWorker<S, M>
where
  S: AssignmentStore + SubmissionStore + Clone + 'static,
  M: LanguageModel + 'static,
{
  /// `settle` is slept before each run so the triggering write is visible.
  pub fn new(grader: Grader<S, M>, jobs: GradingJobs, settle: Duration) -> Self {
    Self { grader, jobs, settle }
  }

  /// Run until every [`GradingQueue`] handle has been dropped.
  pub async fn run(mut self) {
    while let Some(submission_id) = self.jobs.next().await {
      let grader = self.grader.clone();
      let settle = self.settle;
      tokio::spawn(async move {
        tokio::time::sleep(settle).await;
        if let Err(e) = grader.grade(submission_id).await {
          error!(submission = %submission_id, error = %e, "grading failed");
        }
      });
    }
    info!("grading queue closed; worker exiting");
  }

  pub fn spawn(self) -> JoinHandle<()> { tokio::spawn(self.run()) }
}

#[cfg(test)]
mod tests {
  use std::convert::Infallible;

  use mentor_core::{store::SubmissionStore, submission::SubmissionStatus};
  use mentor_store_sqlite::SqliteStore;

  use super::*;
  use crate::{
    error::ServiceError,
    testing::{Fixture, fixture, submitted},
  };

  #[tokio::test]
  async fn well_formed_reply_is_stored() {
    let f = fixture().await;
    let (submission, question_ids) = submitted(&f).await;
    let (q1, q2) = (&question_ids[0], &question_ids[1]);
    f.model.push_reply(format!(
      "```json\n{{\"total_score\": 15, \"ai_feedback\": \"**Good**\", \
       \"question_scores\": {{\"{q1}\": 10, \"{q2}\": 5}}, \
       \"question_feedback\": {{}}}}\n```"
    ));

    let graded = f.services.grader.grade(submission.id).await.unwrap();
    assert_eq!(graded.status, SubmissionStatus::Graded);
    assert_eq!(graded.total_score, Some(15));
    assert_eq!(graded.ai_feedback, "**Good**");
    assert_eq!(graded.question_scores[q1.as_str()], 10);
    assert!(graded.question_feedback.is_empty());

    let prompt = &f.model.calls()[0];
    assert_eq!(prompt.len(), 1);
    assert!(prompt[0].content.contains("Standard answer: const"));
  }

  #[tokio::test]
  async fn unparseable_reply_degrades_to_raw_feedback() {
    let f = fixture().await;
    let (submission, _) = submitted(&f).await;
    f.model.push_reply("Nice effort! I'd give this about 7/10.");

    let graded = f.services.grader.grade(submission.id).await.unwrap();
    assert_eq!(graded.status, SubmissionStatus::Graded);
    assert_eq!(graded.total_score, Some(0));
    assert_eq!(graded.ai_feedback, "Nice effort! I'd give this about 7/10.");
  }

  #[tokio::test]
  async fn malformed_map_leaves_previous_values() {
    let f = fixture().await;
    let (submission, question_ids) = submitted(&f).await;
    let q1 = &question_ids[0];

    f.model.push_reply(format!(
      "{{\"total_score\": 10, \"question_scores\": {{\"{q1}\": 10}}, \"question_feedback\": {{\"{q1}\": \"right\"}}}}"
    ));
    f.services.grader.grade(submission.id).await.unwrap();

    f.model.push_reply(format!(
      "{{\"total_score\": 8, \"question_scores\": [1, 2], \"question_feedback\": {{\"{q1}\": \"ok\"}}}}"
    ));
    let regraded = f.services.grader.grade(submission.id).await.unwrap();
    assert_eq!(regraded.total_score, Some(8));
    assert_eq!(regraded.question_scores[q1.as_str()], 10);
    assert_eq!(regraded.question_feedback[q1.as_str()], "ok");
  }

  #[tokio::test]
  async fn model_failure_leaves_submission_untouched() {
    let f = fixture().await;
    let (submission, _) = submitted(&f).await;
    f.model.push_failure("timeout");

    let err = f.services.grader.grade(submission.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Upstream(_)));
    let stored = f.store.get_submission(submission.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SubmissionStatus::Submitted);
    assert!(stored.total_score.is_none());
  }

  /// Resubmits on the student's behalf while the grading call is in flight.
  struct ResubmittingModel {
    store:      SqliteStore,
    submission: Uuid,
  }

  impl LanguageModel for ResubmittingModel {
    type Error = Infallible;

    async fn complete(&self, _turns: Vec<Turn>) -> Result<String, Infallible> {
      let mut current = self.store.get_submission(self.submission).await.unwrap().unwrap();
      current.code = "package main // v2".into();
      current.teacher_feedback = "tidy up".into();
      self.store.save_submission(current).await.unwrap();
      Ok("{\"total_score\": 6, \"ai_feedback\": \"ok\"}".to_owned())
    }
  }

  #[tokio::test]
  async fn grading_keeps_writes_made_during_the_model_call() {
    let f = fixture().await;
    let (submission, _) = submitted(&f).await;
    let model = ResubmittingModel { store: f.store.clone(), submission: submission.id };
    let grader = Grader::new(f.store.clone(), Arc::new(model));

    let graded = grader.grade(submission.id).await.unwrap();
    assert_eq!(graded.total_score, Some(6));
    assert_eq!(graded.code, "package main // v2");
    assert_eq!(graded.teacher_feedback, "tidy up");

    let stored = f.store.get_submission(submission.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SubmissionStatus::Graded);
    assert_eq!(stored.code, "package main // v2");
  }

  #[tokio::test]
  async fn worker_grades_queued_submissions() {
    let f = fixture().await;
    let (submission, _) = submitted(&f).await;
    f.model.push_reply("{\"total_score\": 42, \"ai_feedback\": \"fine\"}");

    let (queue, jobs) = GradingQueue::new();
    let worker = GradingWorker::new(f.services.grader.clone(), jobs, Duration::ZERO).spawn();
    queue.enqueue(submission.id);

    let mut graded = None;
    for _ in 0..100 {
      let current = f.store.get_submission(submission.id).await.unwrap().unwrap();
      if current.status == SubmissionStatus::Graded {
        graded = Some(current);
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(graded.expect("graded in time").total_score, Some(42));

    drop(queue);
    worker.await.unwrap();
  }
}
