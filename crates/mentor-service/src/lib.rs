//! Business logic for the Mentor classroom backend.
//!
//! Every service is generic over its storage backend, and those that talk to
//! the language model are generic over [`LanguageModel`] too. [`Services`]
//! bundles one of each for the HTTP layer.

pub mod board;
pub mod catalog;
pub mod chat;
pub mod error;
pub mod grading;
pub mod identity;
pub mod registry;
pub mod submissions;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use mentor_core::{model::LanguageModel, store::Store};

pub use self::{
  board::Board,
  catalog::Catalog,
  chat::Tutor,
  error::{Result, ServiceError},
  grading::{Grader, GradingJobs, GradingQueue, GradingWorker},
  identity::{Accounts, Actor},
  registry::Registry,
  submissions::Submissions,
};

/// All services over one store and one model.
pub struct Services<S, M> {
  pub accounts:    Accounts<S>,
  pub registry:    Registry<S>,
  pub catalog:     Catalog<S, M>,
  pub submissions: Submissions<S>,
  pub grader:      Grader<S, M>,
  pub board:       Board<S>,
  pub tutor:       Tutor<S, M>,
}

impl<S: Clone, M> Clone for Services<S, M> {
  fn clone(&self) -> Self {
    Self {
      accounts:    self.accounts.clone(),
      registry:    self.registry.clone(),
      catalog:     self.catalog.clone(),
      submissions: self.submissions.clone(),
      grader:      self.grader.clone(),
      board:       self.board.clone(),
      tutor:       self.tutor.clone(),
    }
  }
}

impl<S: Store, M: LanguageModel> Services<S, M> {
  /// Grading jobs go to `queue`; whoever holds the matching
  /// [`GradingJobs`] is expected to run a [`GradingWorker`] over them.
  pub fn new(store: S, model: Arc<M>, queue: GradingQueue) -> Self {
    Self {
      accounts:    Accounts::new(store.clone()),
      registry:    Registry::new(store.clone()),
      catalog:     Catalog::new(store.clone(), Arc::clone(&model)),
      submissions: Submissions::new(store.clone(), queue),
      grader:      Grader::new(store.clone(), Arc::clone(&model)),
      board:       Board::new(store.clone()),
      tutor:       Tutor::new(store, model),
    }
  }
}
