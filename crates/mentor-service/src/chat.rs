//! The tutor: per-user chat sessions forwarded to the language model.

use std::sync::Arc;

use mentor_core::{
  chat::{ChatMessage, ChatRole, ChatSession},
  model::{LanguageModel, Turn},
  prompt::CHAT_SYSTEM_PROMPT,
  store::{ChatStore, ClassStore, UserStore},
  user::Role,
};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  error::{Result, forbidden, internal, invalid, model_unavailable, not_found},
  identity::Actor,
};

const TITLE_CHARS: usize = 50;

/// A session title derived from the question that opened it.
pub fn session_title(question: &str) -> String {
  let line = question.trim().lines().next().unwrap_or_default().trim();
  if line.chars().count() <= TITLE_CHARS {
    return line.to_owned();
  }
  let mut title: String = line.chars().take(TITLE_CHARS).collect();
  title.push_str("...");
  title
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
  pub session_id: Uuid,
  pub answer:     String,
  pub title:      String,
}

pub struct Tutor<S, M> {
  store: S,
  model: Arc<M>,
}

impl<S: Clone, M> Clone for Tutor<S, M> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), model: Arc::clone(&self.model) }
  }
}

impl<S, M> Tutor<S, M>
where
  S: UserStore + ClassStore + ChatStore,
  M: LanguageModel,
{
  pub fn new(store: S, model: Arc<M>) -> Self { Self { store, model } }

  async fn session(&self, id: Uuid) -> Result<ChatSession> {
    self
      .store
      .get_session(id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("session"))
  }

  /// Ask a question, opening a new session when `session_id` is `None`.
  pub async fn ask(
    &self,
    actor: &Actor,
    session_id: Option<Uuid>,
    question: &str,
  ) -> Result<ChatReply> {
    let question = question.trim();
    if question.is_empty() {
      return Err(invalid("question is required"));
    }

    let mut session = match session_id {
      Some(id) => {
        let session = self.session(id).await?;
        if session.user_id != actor.id {
          return Err(forbidden("not your session"));
        }
        session
      }
      None => {
        let session = self
          .store
          .create_session(actor.id, session_title(question))
          .await
          .map_err(internal)?;
        self
          .store
          .append_message(session.id, ChatRole::System, CHAT_SYSTEM_PROMPT.to_owned())
          .await
          .map_err(internal)?;
        session
      }
    };

    self
      .store
      .append_message(session.id, ChatRole::User, question.to_owned())
      .await
      .map_err(internal)?;
    let history = self.store.list_messages(session.id).await.map_err(internal)?;
    let user_turns = history.iter().filter(|m| m.role == ChatRole::User).count();
    let turns: Vec<Turn> = history
      .into_iter()
      .map(|m| Turn { role: m.role, content: m.content })
      .collect();
    debug!(session = %session.id, turns = turns.len(), "forwarding chat history");

    let reply = self.model.complete(turns).await.map_err(|e| {
      warn!(session = %session.id, error = %e, "tutor model call failed");
      model_unavailable()
    })?;

    self
      .store
      .append_message(session.id, ChatRole::Assistant, reply.clone())
      .await
      .map_err(internal)?;

    if user_turns <= 1 {
      let title = session_title(question);
      if title != session.title {
        self
          .store
          .set_session_title(session.id, title.clone())
          .await
          .map_err(internal)?;
        session.title = title;
      }
    }

    Ok(ChatReply { session_id: session.id, answer: reply, title: session.title })
  }

  /// Messages of a session. Visible to its owner, to the teacher of the
  /// owner's class, and to admins.
  pub async fn history(&self, actor: &Actor, session_id: Uuid) -> Result<Vec<ChatMessage>> {
    let session = self.session(session_id).await?;
    if session.user_id != actor.id && !actor.is_admin() {
      match actor.role {
        Role::Teacher => self.ensure_teaches(actor, session.user_id).await?,
        _ => return Err(forbidden("not your session")),
      }
    }
    self.store.list_messages(session_id).await.map_err(internal)
  }

  pub async fn sessions(&self, actor: &Actor) -> Result<Vec<ChatSession>> {
    self.store.list_sessions(actor.id).await.map_err(internal)
  }

  /// A student's sessions, for the teacher of their class.
  pub async fn student_sessions(
    &self,
    actor: &Actor,
    student_id: Uuid,
  ) -> Result<Vec<ChatSession>> {
    if !actor.is_admin() {
      actor.require_teacher()?;
    }
    let student = self
      .store
      .get_user(student_id)
      .await
      .map_err(internal)?
      .filter(|u| u.role == Role::Student)
      .ok_or_else(|| not_found("student"))?;
    let Some(class_id) = student.class_id else {
      return Ok(Vec::new());
    };
    if !actor.is_admin() {
      self.ensure_class_owner(actor, class_id).await?;
    }
    self.store.list_sessions(student_id).await.map_err(internal)
  }

  async fn ensure_teaches(&self, actor: &Actor, student_id: Uuid) -> Result<()> {
    let student = self
      .store
      .get_user(student_id)
      .await
      .map_err(internal)?
      .filter(|u| u.role == Role::Student)
      .ok_or_else(|| forbidden("not your session"))?;
    let class_id = student
      .class_id
      .ok_or_else(|| forbidden("student is not in a class"))?;
    self.ensure_class_owner(actor, class_id).await
  }

  async fn ensure_class_owner(&self, actor: &Actor, class_id: Uuid) -> Result<()> {
    let class = self
      .store
      .get_class(class_id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("class"))?;
    if class.teacher_id != actor.id {
      return Err(forbidden("not your student"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    error::ServiceError,
    testing::{Fixture, class_with_student, fixture},
  };

  #[test]
  fn titles_are_truncated() {
    assert_eq!(session_title("  What is a slice?\nmore"), "What is a slice?");
    let long = "x".repeat(80);
    let title = session_title(&long);
    assert_eq!(title.chars().count(), TITLE_CHARS + 3);
    assert!(title.ends_with("..."));
  }

  #[tokio::test]
  async fn conversation_keeps_history() {
    let Fixture { services, model, student, .. } = fixture().await;
    model.push_reply("A slice is a view.").push_reply("Use append.");

    let first = services.tutor.ask(&student, None, "What is a slice?").await.unwrap();
    assert_eq!(first.answer, "A slice is a view.");
    assert_eq!(first.title, "What is a slice?");

    let second = services
      .tutor
      .ask(&student, Some(first.session_id), "How do I grow one?")
      .await
      .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.title, "What is a slice?");

    let calls = model.calls();
    assert_eq!(calls[0][0].role, ChatRole::System);
    assert_eq!(calls[0][0].content, CHAT_SYSTEM_PROMPT);
    let roles: Vec<_> = calls[1].iter().map(|t| t.role).collect();
    assert_eq!(
      roles,
      [ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
    );

    let history = services.tutor.history(&student, first.session_id).await.unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(services.tutor.sessions(&student).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn failed_call_keeps_the_question() {
    let Fixture { services, model, student, .. } = fixture().await;
    model.push_failure("down");

    let err = services.tutor.ask(&student, None, "Hello?").await.unwrap_err();
    match err {
      ServiceError::Upstream(message) => assert!(!message.contains("down"), "{message}"),
      other => panic!("unexpected error: {other:?}"),
    }

    let sessions = services.tutor.sessions(&student).await.unwrap();
    let history = services.tutor.history(&student, sessions[0].id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role, ChatRole::User);
  }

  #[tokio::test]
  async fn sessions_are_private_except_to_the_class_teacher() {
    let f = fixture().await;
    f.model.push_reply("hi");
    let reply = f.services.tutor.ask(&f.student, None, "hello").await.unwrap();

    assert!(matches!(
      f.services.tutor.ask(&f.teacher, Some(reply.session_id), "me too").await,
      Err(ServiceError::Forbidden(_))
    ));
    assert!(f.services.tutor.history(&f.teacher, reply.session_id).await.is_err());
    assert!(f.services.tutor.student_sessions(&f.teacher, f.student.id).await.unwrap().is_empty());

    class_with_student(&f).await;
    assert_eq!(f.services.tutor.history(&f.teacher, reply.session_id).await.unwrap().len(), 3);
    assert_eq!(
      f.services.tutor.student_sessions(&f.teacher, f.student.id).await.unwrap().len(),
      1
    );
    assert!(matches!(
      f.services.tutor.student_sessions(&f.other_teacher, f.student.id).await,
      Err(ServiceError::Forbidden(_))
    ));
  }
}
