//! Classes, join codes and rosters.

use std::collections::BTreeSet;

use mentor_core::{
  class::{Class, NewClass},
  store::{AssignmentStore, ClassStore, StoreError, SubmissionStore, UserStore},
  user::{Role, User},
};
use rand_core::{OsRng, RngCore};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  error::{Result, ServiceError, forbidden, internal, invalid, not_found},
  identity::Actor,
};

const CODE_ATTEMPTS: usize = 5;

/// Six random decimal digits.
fn join_code() -> String { format!("{:06}", OsRng.next_u32() % 1_000_000) }

/// Per-assignment completion figures for one class.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentProgress {
  pub assignment_id:        Uuid,
  pub title:                String,
  pub submitted_count:      usize,
  pub unsubmitted_count:    usize,
  pub unsubmitted_students: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassStats {
  pub class_id:          Uuid,
  pub student_count:     usize,
  pub assignment_count:  usize,
  /// Students with at least one published assignment still outstanding.
  pub unsubmitted_count: usize,
  pub assignments:       Vec<AssignmentProgress>,
}

#[derive(Clone)]
pub struct Registry<S> {
  store: S,
}

impl<S> Registry<S>
where
  S: UserStore + ClassStore + AssignmentStore + SubmissionStore,
{
  pub fn new(store: S) -> Self { Self { store } }

  pub async fn create_class(&self, actor: &Actor, name: &str) -> Result<Class> {
    actor.require_teacher()?;
    let name = name.trim();
    if name.is_empty() {
      return Err(invalid("class name is required"));
    }

    for attempt in 1..=CODE_ATTEMPTS {
      let new = NewClass {
        name:       name.to_owned(),
        teacher_id: actor.id,
        code:       join_code(),
      };
      match self.store.create_class(new).await {
        Ok(class) => {
          info!(class = %class.id, teacher = %actor.id, "class created");
          return Ok(class);
        }
        Err(e) if e.is_unique_violation() => {
          warn!(attempt, "join code collision, retrying");
        }
        Err(e) => return Err(internal(e)),
      }
    }
    Err(ServiceError::Conflict("could not allocate a unique join code".to_owned()))
  }

  pub async fn get(&self, id: Uuid) -> Result<Class> {
    self
      .store
      .get_class(id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("class"))
  }

  /// Fetch a class the actor may manage.
  pub async fn owned(&self, actor: &Actor, id: Uuid) -> Result<Class> {
    let class = self.get(id).await?;
    if !actor.owns(class.teacher_id) {
      return Err(forbidden("not your class"));
    }
    Ok(class)
  }

  pub async fn teacher_classes(&self, actor: &Actor) -> Result<Vec<Class>> {
    actor.require_teacher()?;
    self.store.list_teacher_classes(actor.id).await.map_err(internal)
  }

  pub async fn students(&self, actor: &Actor, class_id: Uuid) -> Result<Vec<User>> {
    self.owned(actor, class_id).await?;
    self.store.list_class_students(class_id).await.map_err(internal)
  }

  /// Attach the student to the class with this code, replacing any previous
  /// membership.
  pub async fn join(&self, actor: &Actor, code: &str) -> Result<Class> {
    actor.require_student()?;
    let class = self
      .store
      .find_class_by_code(code.trim().to_owned())
      .await
      .map_err(internal)?
      .ok_or_else(|| ServiceError::NotFound("invalid class code".to_owned()))?;

    self
      .store
      .set_user_class(actor.id, Some(class.id))
      .await
      .map_err(internal)?;
    info!(student = %actor.id, class = %class.id, "joined class");
    Ok(class)
  }

  pub async fn add_student(
    &self,
    actor: &Actor,
    class_id: Uuid,
    student_id: Uuid,
  ) -> Result<User> {
    self.owned(actor, class_id).await?;
    let mut student = self
      .store
      .get_user(student_id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("student"))?;
    if student.role != Role::Student {
      return Err(invalid("only students can be added to a class"));
    }

    self
      .store
      .set_user_class(student_id, Some(class_id))
      .await
      .map_err(internal)?;
    student.class_id = Some(class_id);
    Ok(student)
  }

  pub async fn remove_student(
    &self,
    actor: &Actor,
    class_id: Uuid,
    student_id: Uuid,
  ) -> Result<()> {
    self.owned(actor, class_id).await?;
    let student = self
      .store
      .get_user(student_id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("student"))?;
    if student.class_id != Some(class_id) {
      return Err(invalid("student is not in this class"));
    }

    self.store.set_user_class(student_id, None).await.map_err(internal)
  }

  /// Delete the class together with its member accounts.
  pub async fn delete_class(&self, actor: &Actor, class_id: Uuid) -> Result<usize> {
    self.owned(actor, class_id).await?;
    let removed = self.store.delete_class(class_id).await.map_err(internal)?;
    info!(class = %class_id, removed, "class deleted");
    Ok(removed)
  }

  pub async fn stats(&self, actor: &Actor, class_id: Uuid) -> Result<ClassStats> {
    self.owned(actor, class_id).await?;

    let students = self.store.list_class_students(class_id).await.map_err(internal)?;
    let assignments = self
      .store
      .list_class_assignments(class_id)
      .await
      .map_err(internal)?;

    let mut outstanding = BTreeSet::new();
    let mut progress = Vec::with_capacity(assignments.len());

    for assignment in &assignments {
      let submitted: BTreeSet<Uuid> = self
        .store
        .list_assignment_submissions(assignment.id)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|s| s.student_id)
        .collect();

      let missing: Vec<&User> =
        students.iter().filter(|s| !submitted.contains(&s.id)).collect();
      outstanding.extend(missing.iter().map(|s| s.id));

      progress.push(AssignmentProgress {
        assignment_id:        assignment.id,
        title:                assignment.title.clone(),
        submitted_count:      students.len() - missing.len(),
        unsubmitted_count:    missing.len(),
        unsubmitted_students: missing.iter().map(|s| s.name.clone()).collect(),
      });
    }

    Ok(ClassStats {
      class_id,
      student_count: students.len(),
      assignment_count: assignments.len(),
      unsubmitted_count: outstanding.len(),
      assignments: progress,
    })
  }
}

#[cfg(test)]
mod tests {
  use mentor_core::store::UserStore;

  use super::*;
  use crate::testing::{Fixture, fixture};

  #[tokio::test]
  async fn create_and_join_by_code() {
    let Fixture { services, teacher, student, .. } = fixture().await;
    let registry = &services.registry;

    let class = registry.create_class(&teacher, "Go 101").await.unwrap();
    assert_eq!(class.code.len(), 6);
    assert!(class.code.chars().all(|c| c.is_ascii_digit()));

    let joined = registry.join(&student, &class.code).await.unwrap();
    assert_eq!(joined.id, class.id);
    let roster = registry.students(&teacher, class.id).await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].id, student.id);

    let members = services.accounts.students_in_class(class.id).await.unwrap();
    assert_eq!(members.len(), 1);
    let found = services.accounts.find_by_username("stu").await.unwrap();
    assert_eq!(found.class_id, Some(class.id));
  }

  #[tokio::test]
  async fn joining_another_class_replaces_membership() {
    let Fixture { services, store, teacher, student, .. } = fixture().await;
    let registry = &services.registry;

    let first = registry.create_class(&teacher, "A").await.unwrap();
    let second = registry.create_class(&teacher, "B").await.unwrap();
    registry.join(&student, &first.code).await.unwrap();
    registry.join(&student, &second.code).await.unwrap();

    let user = store.get_user(student.id).await.unwrap().unwrap();
    assert_eq!(user.class_id, Some(second.id));
    assert!(registry.students(&teacher, first.id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn unknown_code_is_not_found() {
    let Fixture { services, student, .. } = fixture().await;
    let err = services.registry.join(&student, "999999x").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
  }

  #[tokio::test]
  async fn only_the_owner_manages_a_class() {
    let Fixture { services, teacher, other_teacher, student, .. } = fixture().await;
    let registry = &services.registry;
    let class = registry.create_class(&teacher, "Mine").await.unwrap();

    assert!(matches!(
      registry.students(&other_teacher, class.id).await,
      Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
      registry.create_class(&student, "Nope").await,
      Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
      registry.delete_class(&other_teacher, class.id).await,
      Err(ServiceError::Forbidden(_))
    ));
  }

  #[tokio::test]
  async fn add_and_remove_students_directly() {
    let Fixture { services, teacher, student, .. } = fixture().await;
    let registry = &services.registry;
    let class = registry.create_class(&teacher, "A").await.unwrap();

    let added = registry.add_student(&teacher, class.id, student.id).await.unwrap();
    assert_eq!(added.class_id, Some(class.id));

    let err = registry.add_student(&teacher, class.id, teacher.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    registry.remove_student(&teacher, class.id, student.id).await.unwrap();
    let err = registry.remove_student(&teacher, class.id, student.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
  }

  #[tokio::test]
  async fn deleting_a_class_removes_member_accounts() {
    let Fixture { services, store, teacher, student, .. } = fixture().await;
    let registry = &services.registry;
    let class = registry.create_class(&teacher, "A").await.unwrap();
    registry.join(&student, &class.code).await.unwrap();

    assert_eq!(registry.delete_class(&teacher, class.id).await.unwrap(), 1);
    assert!(matches!(registry.get(class.id).await, Err(ServiceError::NotFound(_))));
    assert!(store.get_user(student.id).await.unwrap().is_none());
  }
}
