//! An in-process [`LanguageModel`] that replays queued replies.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use mentor_core::model::{LanguageModel, Turn};

use crate::{Error, Result};

#[derive(Default)]
struct Script {
  replies:  VecDeque<Result<String, String>>,
  fallback: Option<String>,
  calls:    Vec<Vec<Turn>>,
}

/// Replies are served in the order they were queued. Once the queue is
/// empty the fallback reply is used, or the call fails if there is none.
///
/// Clones share the same script, so a test can keep a handle for
/// inspecting [`ScriptedModel::calls`] after handing one to the service.
#[derive(Clone, Default)]
pub struct ScriptedModel {
  script: Arc<Mutex<Script>>,
}

impl ScriptedModel {
  pub fn new() -> Self { Self::default() }

  /// A model that answers every call with `reply`.
  pub fn always(reply: impl Into<String>) -> Self {
    let model = Self::new();
    model.lock().fallback = Some(reply.into());
    model
  }

  pub fn push_reply(&self, reply: impl Into<String>) -> &Self {
    self.lock().replies.push_back(Ok(reply.into()));
    self
  }

  /// Queue a failed call.
  pub fn push_failure(&self, reason: impl Into<String>) -> &Self {
    self.lock().replies.push_back(Err(reason.into()));
    self
  }

  /// Every conversation received so far, oldest first.
  pub fn calls(&self) -> Vec<Vec<Turn>> { self.lock().calls.clone() }

  fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
    self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn next_reply(&self, turns: Vec<Turn>) -> Result<String> {
    let mut script = self.lock();
    script.calls.push(turns);
    match script.replies.pop_front() {
      Some(Ok(reply)) => Ok(reply),
      Some(Err(reason)) => Err(Error::Unavailable(reason)),
      None => script
        .fallback
        .clone()
        .ok_or_else(|| Error::Unavailable("no scripted reply left".to_owned())),
    }
  }
}

impl LanguageModel for ScriptedModel {
  type Error = Error;

  async fn complete(&self, turns: Vec<Turn>) -> Result<String> { self.next_reply(turns) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn replays_in_order_then_falls_back() {
    let model = ScriptedModel::always("fallback");
    model.push_reply("first").push_failure("down");

    assert_eq!(model.complete(vec![Turn::user("a")]).await.unwrap(), "first");
    assert!(model.complete(vec![Turn::user("b")]).await.is_err());
    assert_eq!(model.complete(vec![Turn::user("c")]).await.unwrap(), "fallback");
    assert_eq!(model.calls().len(), 3);
    assert_eq!(model.calls()[2][0].content, "c");
  }

  #[tokio::test]
  async fn empty_script_fails() {
    let model = ScriptedModel::new();
    assert!(matches!(
      model.complete(vec![]).await,
      Err(Error::Unavailable(_))
    ));
  }
}
