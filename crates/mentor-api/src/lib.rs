//! JSON REST API for Mentor.
//!
//! Exposes an axum [`Router`] over a [`Services`] bundle. Identity comes from
//! the trusted cookie/header pair described in [`caller`]; TLS and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", mentor_api::api_router(services))
//! ```

pub mod assignments;
pub mod caller;
pub mod chat;
pub mod classes;
pub mod error;
pub mod extract;
pub mod feedback;
pub mod submissions;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use mentor_core::{model::LanguageModel, store::Store};
use mentor_service::Services;
use serde_json::{Value, json};

pub use caller::{Caller, MaybeCaller};
pub use error::ApiError;

/// State shared by every handler.
pub type AppState<S, M> = Arc<Services<S, M>>;

pub(crate) fn message(text: &str) -> axum::Json<Value> { axum::Json(json!({ "message": text })) }

/// Build a fully-materialised API router over `services`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, M>(services: Services<S, M>) -> Router<()>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Router::new()
    // Identity
    .route("/register", post(users::register::<S, M>))
    .route("/login", post(users::login::<S, M>))
    .route("/users", get(users::list::<S, M>))
    .route("/users/find", get(users::find::<S, M>))
    .route("/users/{id}", delete(users::deactivate::<S, M>))
    .route("/users/{id}/password", put(users::reset_password::<S, M>))
    // Classes
    .route("/classes", get(classes::list::<S, M>).post(classes::create::<S, M>))
    .route("/classes/join", post(classes::join::<S, M>))
    .route("/classes/{id}", get(classes::get_one::<S, M>).delete(classes::remove::<S, M>))
    .route(
      "/classes/{id}/students",
      get(classes::students::<S, M>).post(classes::add_student::<S, M>),
    )
    .route("/classes/{id}/students/{student_id}", delete(classes::remove_student::<S, M>))
    .route("/classes/{id}/stats", get(classes::stats::<S, M>))
    // Assignments
    .route("/assignments", get(assignments::list::<S, M>).post(assignments::create::<S, M>))
    .route("/assignments/generate", post(assignments::generate::<S, M>))
    .route(
      "/assignments/{id}",
      get(assignments::get_one::<S, M>).delete(assignments::remove::<S, M>),
    )
    .route("/assignments/{id}/publish", post(assignments::publish::<S, M>))
    .route("/assignments/{id}/published", get(assignments::published::<S, M>))
    .route("/assignments/{id}/submissions", get(assignments::submissions::<S, M>))
    .route("/assignments/{id}/pending", get(assignments::pending::<S, M>))
    .route("/assignments/{id}/student/{student_id}", get(assignments::for_student::<S, M>))
    .route("/assignments/{id}/submit", post(submissions::submit::<S, M>))
    .route("/my/assignments", get(assignments::mine::<S, M>))
    // Submissions
    .route("/submissions/{id}", get(submissions::get_one::<S, M>))
    .route("/submissions/{id}/score", put(submissions::set_score::<S, M>))
    .route("/submissions/{id}/feedback", put(submissions::set_feedback::<S, M>))
    .route(
      "/submissions/{id}/questions/{question_id}/score",
      put(submissions::set_question_score::<S, M>),
    )
    .route(
      "/submissions/{id}/questions/{question_id}/feedback",
      put(submissions::set_question_feedback::<S, M>),
    )
    .route("/submissions/{id}/regrade", post(submissions::regrade::<S, M>))
    .route("/submissions/{id}/download", get(submissions::download::<S, M>))
    // Feedback board
    .route("/feedback", get(feedback::list::<S, M>).post(feedback::create::<S, M>))
    .route("/feedback/stats", get(feedback::stats::<S, M>))
    .route("/feedback/{id}", get(feedback::get_one::<S, M>).delete(feedback::remove::<S, M>))
    .route("/feedback/{id}/like", post(feedback::like::<S, M>))
    .route("/feedback/{id}/status", put(feedback::set_status::<S, M>))
    .route("/feedback/{id}/respond", post(feedback::respond::<S, M>))
    // Tutor
    .route("/chat", post(chat::ask::<S, M>))
    .route("/history", get(chat::history::<S, M>))
    .route("/sessions", get(chat::sessions::<S, M>))
    .route("/students/{id}/sessions", get(chat::student_sessions::<S, M>))
    .with_state(Arc::new(services))
}
