//! Handlers for the tutor.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/chat` | `{"question", "session_id"?}`; opens a session when none is given |
//! | `GET`  | `/history?session_id=` | Empty list without a session id |
//! | `GET`  | `/sessions` | The caller's sessions, most recent first |
//! | `GET`  | `/students/{id}/sessions` | Teacher of the student's class |

use axum::extract::State;
use mentor_core::{
  chat::{ChatMessage, ChatSession},
  model::LanguageModel,
  store::Store,
};
use mentor_service::chat::ChatReply;
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, Caller, error::ApiError, extract::{Json, Path, Query}};

#[derive(Debug, Deserialize)]
pub struct AskBody {
  #[serde(default)]
  pub session_id: Option<Uuid>,
  pub question:   String,
}

/// `POST /chat`
pub async fn ask<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Json(body): Json<AskBody>,
) -> Result<Json<ChatReply>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.tutor.ask(&actor, body.session_id, &body.question).await?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub session_id: Option<Uuid>,
}

/// `GET /history?session_id=<id>`
pub async fn history<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ChatMessage>>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let Some(session_id) = params.session_id else {
    return Ok(Json(Vec::new()));
  };
  Ok(Json(app.tutor.history(&actor, session_id).await?))
}

/// `GET /sessions`
pub async fn sessions<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
) -> Result<Json<Vec<ChatSession>>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.tutor.sessions(&actor).await?))
}

/// `GET /students/{id}/sessions`
pub async fn student_sessions<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatSession>>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.tutor.student_sessions(&actor, id).await?))
}
