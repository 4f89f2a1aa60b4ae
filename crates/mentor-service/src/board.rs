//! The feedback board.

use chrono::Utc;
use mentor_core::{
  feedback::{Feedback, FeedbackKind, FeedbackQuery, FeedbackStats, FeedbackStatus, NewFeedback},
  store::FeedbackStore,
};
use serde::Deserialize;
use tracing::info;

use crate::{
  error::{Result, forbidden, internal, invalid, not_found},
  identity::Actor,
};

/// Author id recorded when the poster is neither signed in nor supplied a
/// token.
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackPost {
  pub title:        String,
  #[serde(default)]
  pub content:      String,
  #[serde(default, rename = "type")]
  pub kind:         FeedbackKind,
  #[serde(default)]
  pub anonymous_id: Option<String>,
}

#[derive(Clone)]
pub struct Board<S> {
  store: S,
}

impl<S: FeedbackStore> Board<S> {
  pub fn new(store: S) -> Self { Self { store } }

  pub async fn post(&self, actor: Option<&Actor>, post: FeedbackPost) -> Result<Feedback> {
    let title = post.title.trim();
    if title.is_empty() {
      return Err(invalid("title is required"));
    }
    let author = match actor {
      Some(actor) => actor.id.to_string(),
      None => post
        .anonymous_id
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_owned()),
    };

    let feedback = self
      .store
      .create_feedback(NewFeedback {
        title:        title.to_owned(),
        content:      post.content,
        anonymous_id: author,
        kind:         post.kind,
      })
      .await
      .map_err(internal)?;
    info!(feedback = feedback.id, kind = %feedback.kind, "feedback posted");
    Ok(feedback)
  }

  pub async fn list(&self, query: FeedbackQuery) -> Result<Vec<Feedback>> {
    let query = FeedbackQuery {
      search: query.search.filter(|s| !s.trim().is_empty()),
      ..query
    };
    self.store.list_feedback(query).await.map_err(internal)
  }

  pub async fn get(&self, id: i64) -> Result<Feedback> {
    self
      .store
      .get_feedback(id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("feedback"))
  }

  pub async fn stats(&self) -> Result<FeedbackStats> {
    let all = self
      .store
      .list_feedback(FeedbackQuery::default())
      .await
      .map_err(internal)?;
    Ok(FeedbackStats::tally(&all))
  }

  /// Likes are not deduplicated; every call adds one.
  pub async fn like(&self, id: i64) -> Result<Feedback> {
    self
      .store
      .increment_likes(id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("feedback"))
  }

  pub async fn set_status(
    &self,
    actor: &Actor,
    id: i64,
    status: FeedbackStatus,
  ) -> Result<Feedback> {
    require_staff(actor)?;
    let mut feedback = self.get(id).await?;
    feedback.status = status;
    feedback.responded_at = Some(Utc::now());
    self.store.save_feedback(feedback).await.map_err(internal)
  }

  /// Attach a staff response. The item moves to `resolved` unless a status
  /// is given.
  pub async fn respond(
    &self,
    actor: &Actor,
    id: i64,
    response: String,
    status: Option<FeedbackStatus>,
  ) -> Result<Feedback> {
    require_staff(actor)?;
    if response.trim().is_empty() {
      return Err(invalid("response is required"));
    }
    let mut feedback = self.get(id).await?;
    feedback.teacher_response = Some(response);
    feedback.responded_at = Some(Utc::now());
    feedback.status = status.unwrap_or(FeedbackStatus::Resolved);
    self.store.save_feedback(feedback).await.map_err(internal)
  }

  /// Owners are matched by user id or by the anonymous token they posted
  /// with.
  pub async fn delete(
    &self,
    actor: Option<&Actor>,
    anonymous_id: Option<&str>,
    id: i64,
  ) -> Result<()> {
    let feedback = self.get(id).await?;
    let by_user = actor.is_some_and(|a| {
      a.role.is_staff() || a.id.to_string() == feedback.anonymous_id
    });
    let by_token = anonymous_id
      .is_some_and(|token| token != ANONYMOUS && token == feedback.anonymous_id);
    if !by_user && !by_token {
      return Err(forbidden("not allowed to delete this feedback"));
    }
    self.store.delete_feedback(id).await.map_err(internal)?;
    Ok(())
  }
}

fn require_staff(actor: &Actor) -> Result<()> {
  if actor.role.is_staff() { Ok(()) } else { Err(forbidden("staff only")) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    error::ServiceError,
    testing::{Fixture, fixture},
  };

  fn post(title: &str, kind: FeedbackKind) -> FeedbackPost {
    FeedbackPost {
      title: title.into(),
      content: "details".into(),
      kind,
      anonymous_id: None,
    }
  }

  #[tokio::test]
  async fn likes_accumulate_without_dedup() {
    let Fixture { services, student, .. } = fixture().await;
    let board = &services.board;
    let item = board.post(Some(&student), post("Dark mode", FeedbackKind::Feature)).await.unwrap();

    for _ in 0..5 {
      board.like(item.id).await.unwrap();
    }
    assert_eq!(board.get(item.id).await.unwrap().like_count, 5);
  }

  #[tokio::test]
  async fn author_falls_back_to_token_then_anonymous() {
    let Fixture { services, student, .. } = fixture().await;
    let board = &services.board;

    let signed = board.post(Some(&student), post("a", FeedbackKind::Bug)).await.unwrap();
    assert_eq!(signed.anonymous_id, student.id.to_string());

    let tokened = board
      .post(None, FeedbackPost { anonymous_id: Some("tok-1".into()), ..post("b", FeedbackKind::Bug) })
      .await
      .unwrap();
    assert_eq!(tokened.anonymous_id, "tok-1");

    let bare = board.post(None, post("c", FeedbackKind::Bug)).await.unwrap();
    assert_eq!(bare.anonymous_id, ANONYMOUS);

    let err = board.post(None, post("  ", FeedbackKind::Bug)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
  }

  #[tokio::test]
  async fn staff_respond_and_change_status() {
    let Fixture { services, teacher, student, .. } = fixture().await;
    let board = &services.board;
    let item = board.post(Some(&student), post("Slow", FeedbackKind::Bug)).await.unwrap();

    let err = board.respond(&student, item.id, "no".into(), None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let answered = board.respond(&teacher, item.id, "Fixed".into(), None).await.unwrap();
    assert_eq!(answered.teacher_response.as_deref(), Some("Fixed"));
    assert_eq!(answered.status, FeedbackStatus::Resolved);
    assert!(answered.responded_at.is_some());

    let reopened = board.set_status(&teacher, item.id, FeedbackStatus::Processing).await.unwrap();
    assert_eq!(reopened.status, FeedbackStatus::Processing);
    assert_eq!(reopened.teacher_response.as_deref(), Some("Fixed"));
  }

  #[tokio::test]
  async fn delete_requires_owner_or_staff() {
    let Fixture { services, other_teacher, student, .. } = fixture().await;
    let board = &services.board;

    let mine = board.post(Some(&student), post("x", FeedbackKind::Other)).await.unwrap();
    let err = board.delete(None, Some(ANONYMOUS), mine.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    board.delete(Some(&student), None, mine.id).await.unwrap();

    let anon = board
      .post(None, FeedbackPost { anonymous_id: Some("tok".into()), ..post("y", FeedbackKind::Other) })
      .await
      .unwrap();
    board.delete(None, Some("tok"), anon.id).await.unwrap();

    let bare = board.post(None, post("z", FeedbackKind::Other)).await.unwrap();
    assert!(board.delete(None, Some(ANONYMOUS), bare.id).await.is_err());
    board.delete(Some(&other_teacher), None, bare.id).await.unwrap();
    assert!(matches!(board.get(bare.id).await, Err(ServiceError::NotFound(_))));
  }

  #[tokio::test]
  async fn stats_count_every_bucket() {
    let Fixture { services, teacher, student, .. } = fixture().await;
    let board = &services.board;
    let a = board.post(Some(&student), post("a", FeedbackKind::Bug)).await.unwrap();
    board.post(Some(&student), post("b", FeedbackKind::Bug)).await.unwrap();
    board.post(None, post("c", FeedbackKind::Praise)).await.unwrap();
    board.respond(&teacher, a.id, "thanks".into(), None).await.unwrap();

    let stats = board.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_type["bug"], 2);
    assert_eq!(stats.by_type["feature"], 0);
    assert_eq!(stats.by_status["open"], 2);
    assert_eq!(stats.by_status["resolved"], 1);

    let bugs = board
      .list(FeedbackQuery { kind: Some(FeedbackKind::Bug), ..Default::default() })
      .await
      .unwrap();
    assert_eq!(bugs.len(), 2);
  }
}
