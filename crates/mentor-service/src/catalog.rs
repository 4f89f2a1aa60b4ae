//! Assignment authoring, publication and listing.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use mentor_core::{
  assignment::{
    Assignment, AssignmentDetail, AssignmentKind, AssignmentStatus, NewAssignment,
    NewPublication, NewQuestion, Publication, PublishedClass, QuestionKind,
  },
  model::{LanguageModel, Turn},
  prompt::generation_prompt,
  reply::GeneratedAssignment,
  store::{AssignmentStore, ClassStore, StoreError, SubmissionStore, UserStore},
  submission::{StudentProgress, Submission, SubmissionStatus},
  user::Role,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  error::{
    Result, ServiceError, forbidden, internal, invalid, model_unavailable, not_found, upstream,
  },
  identity::Actor,
};

/// One question in a manually authored assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionDraft {
  #[serde(flatten)]
  pub kind:    QuestionKind,
  pub content: String,
  #[serde(default)]
  pub answer:  String,
  #[serde(default)]
  pub score:   i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualAssignment {
  pub title:       String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub kind:        AssignmentKind,
  #[serde(default)]
  pub rubric:      Option<serde_json::Value>,
  #[serde(default)]
  pub questions:   Vec<QuestionDraft>,
}

/// A published assignment as one student sees it.
#[derive(Debug, Clone, Serialize)]
pub struct StudentAssignment {
  #[serde(flatten)]
  pub assignment:     Assignment,
  /// Deadline of the publication to the student's class.
  pub class_deadline: Option<DateTime<Utc>>,
  pub progress:       StudentProgress,
  pub submission:     Option<Submission>,
}

/// Parse a `YYYY-MM-DD` deadline and pin it to the last second of that day.
/// Dates before `today` are rejected.
pub fn parse_deadline(raw: &str, today: NaiveDate) -> Result<DateTime<Utc>> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Err(invalid("deadline is required"));
  }
  let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .map_err(|_| invalid("deadline must be a date in YYYY-MM-DD format"))?;
  if date < today {
    return Err(invalid("deadline cannot be in the past"));
  }
  date
    .and_hms_opt(23, 59, 59)
    .map(|dt| dt.and_utc())
    .ok_or_else(|| invalid("deadline is out of range"))
}

pub struct Catalog<S, M> {
  store: S,
  model: Arc<M>,
}

impl<S: Clone, M> Clone for Catalog<S, M> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), model: Arc::clone(&self.model) }
  }
}

impl<S, M> Catalog<S, M>
where
  S: UserStore + ClassStore + AssignmentStore + SubmissionStore,
  M: LanguageModel,
{
  pub fn new(store: S, model: Arc<M>) -> Self { Self { store, model } }

  pub async fn get(&self, id: Uuid) -> Result<Assignment> {
    self
      .store
      .get_assignment(id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("assignment"))
  }

  /// Fetch an assignment the actor authored.
  pub async fn owned(&self, actor: &Actor, id: Uuid) -> Result<Assignment> {
    let assignment = self.get(id).await?;
    if !actor.owns(assignment.teacher_id) {
      return Err(forbidden("not your assignment"));
    }
    Ok(assignment)
  }

  async fn store_questions(
    &self,
    assignment: Assignment,
    drafts: Vec<(QuestionKind, String, String, i64)>,
  ) -> Result<AssignmentDetail> {
    let mut questions = Vec::with_capacity(drafts.len());
    for (i, (kind, content, answer, score)) in drafts.into_iter().enumerate() {
      let question = self
        .store
        .add_question(NewQuestion {
          assignment_id: assignment.id,
          kind,
          content,
          answer,
          score,
          order_num: i as i64 + 1,
        })
        .await
        .map_err(internal)?;
      questions.push(question);
    }
    Ok(AssignmentDetail { assignment, questions })
  }

  pub async fn create_manual(
    &self,
    actor: &Actor,
    input: ManualAssignment,
  ) -> Result<AssignmentDetail> {
    actor.require_teacher()?;
    let title = input.title.trim();
    if title.is_empty() {
      return Err(invalid("title is required"));
    }
    if input.questions.iter().any(|q| q.score < 0) {
      return Err(invalid("question scores cannot be negative"));
    }

    let assignment = self
      .store
      .create_assignment(NewAssignment {
        title: title.to_owned(),
        description: input.description,
        teacher_id: actor.id,
        kind: input.kind,
        rubric: input.rubric,
        ..Default::default()
      })
      .await
      .map_err(internal)?;
    info!(assignment = %assignment.id, teacher = %actor.id, "assignment created");

    let drafts = input
      .questions
      .into_iter()
      .map(|q| (q.kind, q.content, q.answer, q.score))
      .collect();
    self.store_questions(assignment, drafts).await
  }

  /// Ask the model to author a draft assignment on `topic`.
  pub async fn generate(
    &self,
    actor: &Actor,
    topic: &str,
    difficulty: &str,
  ) -> Result<AssignmentDetail> {
    actor.require_teacher()?;
    let topic = topic.trim();
    if topic.is_empty() {
      return Err(invalid("topic is required"));
    }
    let difficulty = match difficulty.trim() {
      "" => "medium",
      d => d,
    };

    let reply = self
      .model
      .complete(vec![Turn::user(generation_prompt(topic, difficulty))])
      .await
      .map_err(|e| {
        warn!(error = %e, "generation model call failed");
        model_unavailable()
      })?;
    let generated = GeneratedAssignment::parse(&reply).map_err(|e| {
      warn!(error = %e, "unusable generation reply");
      upstream(e)
    })?;

    let title = match generated.title.trim() {
      "" => topic.to_owned(),
      t => t.to_owned(),
    };
    let assignment = self
      .store
      .create_assignment(NewAssignment {
        title,
        description: generated.description,
        teacher_id: actor.id,
        kind: AssignmentKind::Mixed,
        ..Default::default()
      })
      .await
      .map_err(internal)?;
    info!(
      assignment = %assignment.id,
      questions = generated.questions.len(),
      "assignment generated"
    );

    let drafts = generated
      .questions
      .into_iter()
      .map(|q| (q.kind, q.content, q.answer, q.score))
      .collect();
    self.store_questions(assignment, drafts).await
  }

  pub async fn detail(&self, id: Uuid) -> Result<AssignmentDetail> {
    let assignment = self.get(id).await?;
    let questions = self.store.list_questions(id).await.map_err(internal)?;
    Ok(AssignmentDetail { assignment, questions })
  }

  /// Release the assignment to a class, or move the deadline if it was
  /// already released there.
  pub async fn publish(
    &self,
    actor: &Actor,
    id: Uuid,
    class_id: Uuid,
    deadline: &str,
  ) -> Result<Publication> {
    let assignment = self.owned(actor, id).await?;
    let deadline = parse_deadline(deadline, Utc::now().date_naive())?;

    let class = self
      .store
      .get_class(class_id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("class"))?;
    if !actor.owns(class.teacher_id) {
      return Err(forbidden("not your class"));
    }
    let students = self.store.list_class_students(class_id).await.map_err(internal)?;
    if students.is_empty() {
      return Err(ServiceError::Conflict(
        "class has no students; cannot publish".to_owned(),
      ));
    }

    if let Some(mut existing) =
      self.store.get_publication(id, class_id).await.map_err(internal)?
    {
      self
        .store
        .set_publication_deadline(existing.id, Some(deadline))
        .await
        .map_err(internal)?;
      existing.deadline = Some(deadline);
      info!(assignment = %id, class = %class_id, "publication deadline updated");
      return Ok(existing);
    }

    let created = self
      .store
      .create_publication(NewPublication {
        assignment_id: id,
        class_id,
        deadline: Some(deadline),
      })
      .await;
    let publication = match created {
      Ok(p) => p,
      // Lost a race with a concurrent publish of the same pair.
      Err(e) if e.is_unique_violation() => {
        let existing = self
          .store
          .get_publication(id, class_id)
          .await
          .map_err(internal)?
          .ok_or_else(|| not_found("publication"))?;
        self
          .store
          .set_publication_deadline(existing.id, Some(deadline))
          .await
          .map_err(internal)?;
        Publication { deadline: Some(deadline), ..existing }
      }
      Err(e) => return Err(internal(e)),
    };

    if assignment.status == AssignmentStatus::Draft {
      self
        .store
        .set_assignment_status(id, AssignmentStatus::Published)
        .await
        .map_err(internal)?;
    }
    info!(assignment = %id, class = %class_id, "assignment published");
    Ok(publication)
  }

  pub async fn published_classes(&self, actor: &Actor, id: Uuid) -> Result<Vec<PublishedClass>> {
    self.owned(actor, id).await?;
    let publications = self.store.list_publications(id).await.map_err(internal)?;

    let mut out = Vec::with_capacity(publications.len());
    for publication in publications {
      match self.store.get_class(publication.class_id).await.map_err(internal)? {
        Some(class) => out.push(PublishedClass { publication, class_name: class.name }),
        None => continue,
      }
    }
    Ok(out)
  }

  pub async fn list_for_teacher(&self, actor: &Actor) -> Result<Vec<Assignment>> {
    self.store.list_teacher_assignments(actor.id).await.map_err(internal)
  }

  pub async fn list_for_class(&self, class_id: Uuid) -> Result<Vec<Assignment>> {
    self.store.list_class_assignments(class_id).await.map_err(internal)
  }

  /// Teachers see what they authored; students see what was published to
  /// their class.
  pub async fn list_visible(&self, actor: &Actor) -> Result<Vec<Assignment>> {
    match actor.role {
      Role::Teacher | Role::Admin => self.list_for_teacher(actor).await,
      Role::Student => match self.student_class(actor).await? {
        Some(class_id) => self.list_for_class(class_id).await,
        None => Ok(Vec::new()),
      },
    }
  }

  async fn student_class(&self, actor: &Actor) -> Result<Option<Uuid>> {
    Ok(
      self
        .store
        .get_user(actor.id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("user"))?
        .class_id,
    )
  }

  /// The student's class assignments with their own submission state.
  pub async fn list_for_student(&self, actor: &Actor) -> Result<Vec<StudentAssignment>> {
    actor.require_student()?;
    let Some(class_id) = self.student_class(actor).await? else {
      return Ok(Vec::new());
    };

    let assignments = self.list_for_class(class_id).await?;
    let mut out = Vec::with_capacity(assignments.len());
    for assignment in assignments {
      let class_deadline = self
        .store
        .get_publication(assignment.id, class_id)
        .await
        .map_err(internal)?
        .and_then(|p| p.deadline)
        .or(assignment.deadline);
      let submission = self
        .store
        .find_submission(assignment.id, actor.id)
        .await
        .map_err(internal)?;
      out.push(StudentAssignment {
        assignment,
        class_deadline,
        progress: StudentProgress::of(submission.as_ref()),
        submission,
      });
    }
    Ok(out)
  }

  pub async fn submissions_for(&self, actor: &Actor, id: Uuid) -> Result<Vec<Submission>> {
    self.owned(actor, id).await?;
    self.store.list_assignment_submissions(id).await.map_err(internal)
  }

  /// Submissions still waiting for a grading run.
  pub async fn pending_count(&self, actor: &Actor, id: Uuid) -> Result<usize> {
    self.owned(actor, id).await?;
    self
      .store
      .count_submissions(id, Some(SubmissionStatus::Submitted))
      .await
      .map_err(internal)
  }

  /// One student's submission, visible to the author and to that student.
  pub async fn student_submission(
    &self,
    actor: &Actor,
    id: Uuid,
    student_id: Uuid,
  ) -> Result<Submission> {
    let assignment = self.get(id).await?;
    if actor.id != student_id && !actor.owns(assignment.teacher_id) {
      return Err(forbidden("not allowed to view this submission"));
    }
    self
      .store
      .find_submission(id, student_id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("submission"))
  }

  pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
    self.owned(actor, id).await?;
    if !self.store.delete_assignment(id).await.map_err(internal)? {
      return Err(not_found("assignment"));
    }
    info!(assignment = %id, by = %actor.id, "assignment deleted");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, Timelike};
  use mentor_core::store::AssignmentStore;

  use super::*;
  use crate::testing::{Fixture, class_with_student, fixture, manual};

  fn tomorrow() -> String {
    (Utc::now().date_naive() + Duration::days(1)).format("%Y-%m-%d").to_string()
  }

  #[test]
  fn deadline_parsing() {
    let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

    let d = parse_deadline("2026-03-10", today).unwrap();
    assert_eq!(d.date_naive(), today);
    assert_eq!((d.hour(), d.minute(), d.second()), (23, 59, 59));

    assert!(matches!(parse_deadline("2026-03-09", today), Err(ServiceError::Validation(_))));
    assert!(matches!(parse_deadline("10/03/2026", today), Err(ServiceError::Validation(_))));
    assert!(matches!(parse_deadline("", today), Err(ServiceError::Validation(_))));
  }

  #[tokio::test]
  async fn manual_assignment_numbers_questions() {
    let Fixture { services, teacher, .. } = fixture().await;
    let detail = services.catalog.create_manual(&teacher, manual()).await.unwrap();

    assert_eq!(detail.assignment.status, AssignmentStatus::Draft);
    let order: Vec<_> = detail.questions.iter().map(|q| q.order_num).collect();
    assert_eq!(order, [1, 2]);

    let fetched = services.catalog.detail(detail.assignment.id).await.unwrap();
    assert_eq!(fetched.questions.len(), 2);
    assert_eq!(fetched.questions[0].content, "Which keyword declares a constant?");
  }

  #[tokio::test]
  async fn generate_persists_a_mixed_draft() {
    let Fixture { services, model, teacher, .. } = fixture().await;
    model.push_reply(
      "Here you go:\n```json\n{\"title\": \"Channels\", \"description\": \"Buffered and unbuffered\", \
       \"questions\": [{\"type\": \"choice\", \"content\": \"Unbuffered send blocks?\", \
       \"options\": [\"A. yes\", \"B. no\"], \"answer\": \"A\", \"score\": 50}, \
       {\"type\": \"code\", \"content\": \"Write a pipeline\", \"answer\": \"\", \"score\": 50}]}\n```",
    );

    let detail = services.catalog.generate(&teacher, "channels", "").await.unwrap();
    assert_eq!(detail.assignment.title, "Channels");
    assert_eq!(detail.assignment.kind, AssignmentKind::Mixed);
    assert_eq!(detail.questions.len(), 2);
    assert_eq!(detail.questions[1].order_num, 2);

    let prompt = &model.calls()[0][0].content;
    assert!(prompt.contains("\"channels\""));
    assert!(prompt.contains("medium difficulty"));
  }

  #[tokio::test]
  async fn generate_reports_unparseable_replies() {
    let Fixture { services, model, teacher, store, .. } = fixture().await;
    model.push_reply("Sorry, I cannot help with that.");

    let err = services.catalog.generate(&teacher, "maps", "easy").await.unwrap_err();
    match err {
      ServiceError::Upstream(message) => assert!(message.contains("Sorry, I cannot")),
      other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.list_teacher_assignments(teacher.id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn publish_twice_keeps_one_record_with_latest_deadline() {
    let f = fixture().await;
    let class = class_with_student(&f).await;
    let detail = f.services.catalog.create_manual(&f.teacher, manual()).await.unwrap();
    let id = detail.assignment.id;

    let first = f.services.catalog.publish(&f.teacher, id, class.id, &tomorrow()).await.unwrap();
    let later = (Utc::now().date_naive() + Duration::days(7)).format("%Y-%m-%d").to_string();
    let second = f.services.catalog.publish(&f.teacher, id, class.id, &later).await.unwrap();

    assert_eq!(first.id, second.id);
    let publications = f.store.list_publications(id).await.unwrap();
    assert_eq!(publications.len(), 1);
    assert_eq!(
      publications[0].deadline.unwrap().date_naive(),
      Utc::now().date_naive() + Duration::days(7)
    );
    assert_eq!(
      f.services.catalog.get(id).await.unwrap().status,
      AssignmentStatus::Published
    );
  }

  #[tokio::test]
  async fn publish_in_the_past_changes_nothing() {
    let f = fixture().await;
    let class = class_with_student(&f).await;
    let id = f.services.catalog.create_manual(&f.teacher, manual()).await.unwrap().assignment.id;
    f.services.catalog.publish(&f.teacher, id, class.id, &tomorrow()).await.unwrap();

    let yesterday = (Utc::now().date_naive() - Duration::days(1)).format("%Y-%m-%d").to_string();
    let err = f.services.catalog.publish(&f.teacher, id, class.id, &yesterday).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let publication = f.store.get_publication(id, class.id).await.unwrap().unwrap();
    assert_eq!(
      publication.deadline.unwrap().date_naive(),
      Utc::now().date_naive() + Duration::days(1)
    );
  }

  #[tokio::test]
  async fn publish_to_empty_class_is_rejected() {
    let Fixture { services, teacher, store, .. } = fixture().await;
    let class = services.registry.create_class(&teacher, "Empty").await.unwrap();
    let id = services.catalog.create_manual(&teacher, manual()).await.unwrap().assignment.id;

    let err = services.catalog.publish(&teacher, id, class.id, &tomorrow()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert!(store.list_publications(id).await.unwrap().is_empty());
    assert_eq!(services.catalog.get(id).await.unwrap().status, AssignmentStatus::Draft);
  }

  #[tokio::test]
  async fn students_see_published_work_with_progress() {
    let f = fixture().await;
    let class = class_with_student(&f).await;
    let catalog = &f.services.catalog;
    let published = catalog.create_manual(&f.teacher, manual()).await.unwrap().assignment.id;
    catalog.create_manual(&f.teacher, manual()).await.unwrap();
    catalog.publish(&f.teacher, published, class.id, &tomorrow()).await.unwrap();

    let visible = catalog.list_visible(&f.student).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(catalog.list_visible(&f.teacher).await.unwrap().len(), 2);

    let mine = catalog.list_for_student(&f.student).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].progress, StudentProgress::NotSubmitted);
    assert!(mine[0].class_deadline.is_some());

    let names: Vec<_> = catalog
      .published_classes(&f.teacher, published)
      .await
      .unwrap()
      .into_iter()
      .map(|p| p.class_name)
      .collect();
    assert_eq!(names, ["Go 101"]);
  }

  #[tokio::test]
  async fn delete_requires_the_author() {
    let f = fixture().await;
    let id = f.services.catalog.create_manual(&f.teacher, manual()).await.unwrap().assignment.id;

    let err = f.services.catalog.delete(&f.other_teacher, id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    f.services.catalog.delete(&f.teacher, id).await.unwrap();
    assert!(matches!(f.services.catalog.detail(id).await, Err(ServiceError::NotFound(_))));
  }
}
