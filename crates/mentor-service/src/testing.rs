//! Shared fixtures for the service tests.

use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{Duration, Utc};
use mentor_core::{
  assignment::{AssignmentKind, QuestionKind},
  class::Class,
  store::UserStore,
  submission::Submission,
  user::{Role, User},
};
use mentor_llm::ScriptedModel;
use mentor_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{
  Accounts, Actor, GradingJobs, GradingQueue, Services,
  catalog::{ManualAssignment, QuestionDraft},
  identity::Registration,
  submissions::SubmitRequest,
};

/// Accounts with deliberately weak hashing parameters.
pub fn accounts(store: SqliteStore) -> Accounts<SqliteStore> {
  let params = Params::new(8, 1, 1, None).expect("valid argon2 params");
  Accounts::new(store).with_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Register `username` with password `secret`; the display name is the
/// username in upper case.
pub async fn register(accounts: &Accounts<SqliteStore>, username: &str, role: Role) -> User {
  accounts
    .register(Registration {
      username: username.into(),
      password: "secret".into(),
      name:     username.to_uppercase(),
      role,
    })
    .await
    .expect("register")
}

pub struct Fixture {
  pub services:      Services<SqliteStore, ScriptedModel>,
  pub store:         SqliteStore,
  pub model:         ScriptedModel,
  pub jobs:          GradingJobs,
  pub teacher:       Actor,
  pub other_teacher: Actor,
  pub student:       Actor,
}

impl Fixture {
  /// The class the student currently belongs to.
  pub async fn student_class(&self) -> Uuid {
    self
      .store
      .get_user(self.student.id)
      .await
      .expect("load student")
      .and_then(|u| u.class_id)
      .expect("student has a class")
  }
}

pub async fn fixture() -> Fixture {
  let store = SqliteStore::open_in_memory().await.expect("open store");
  let model = ScriptedModel::new();
  let (queue, jobs) = GradingQueue::new();

  let mut services = Services::new(store.clone(), Arc::new(model.clone()), queue);
  services.accounts = accounts(store.clone());

  let actor = |u: User| Actor::new(u.id, u.role);
  let teacher = actor(register(&services.accounts, "teach", Role::Teacher).await);
  let other_teacher = actor(register(&services.accounts, "other", Role::Teacher).await);
  let student = actor(register(&services.accounts, "stu", Role::Student).await);

  Fixture { services, store, model, jobs, teacher, other_teacher, student }
}

/// Two questions: a 10-point choice question answered `const` and a
/// 10-point code question.
pub fn manual() -> ManualAssignment {
  ManualAssignment {
    title:       "Basics".into(),
    description: "Warm-up".into(),
    kind:        AssignmentKind::Mixed,
    rubric:      None,
    questions:   vec![
      QuestionDraft {
        kind:    QuestionKind::Choice { options: vec!["const".into(), "let".into()] },
        content: "Which keyword declares a constant?".into(),
        answer:  "const".into(),
        score:   10,
      },
      QuestionDraft {
        kind:    QuestionKind::Code,
        content: "Print hello".into(),
        answer:  String::new(),
        score:   10,
      },
    ],
  }
}

/// Class "Go 101" owned by the teacher, joined by the student.
pub async fn class_with_student(f: &Fixture) -> Class {
  let class = f.services.registry.create_class(&f.teacher, "Go 101").await.expect("create class");
  f.services.registry.join(&f.student, &class.code).await.expect("join class");
  class
}

/// A fresh submission (answers only, no code) to a published copy of
/// [`manual`], with the ids of its questions in order.
pub async fn submitted(f: &Fixture) -> (Submission, Vec<String>) {
  let class = class_with_student(f).await;
  let detail = f.services.catalog.create_manual(&f.teacher, manual()).await.expect("create");
  let id = detail.assignment.id;
  let deadline = (Utc::now().date_naive() + Duration::days(1)).format("%Y-%m-%d").to_string();
  f.services.catalog.publish(&f.teacher, id, class.id, &deadline).await.expect("publish");

  let question_ids: Vec<String> = detail.questions.iter().map(|q| q.id.to_string()).collect();
  let submission = f
    .services
    .submissions
    .submit(
      &f.student,
      id,
      SubmitRequest {
        answers: [(question_ids[0].clone(), serde_json::json!("const"))].into(),
        ..Default::default()
      },
    )
    .await
    .expect("submit");
  (submission, question_ids)
}
