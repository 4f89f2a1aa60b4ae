//! Handlers for the feedback board. Posting, reading and liking are open to
//! anonymous callers.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/feedback` | `{"title", "content", "type", "anonymous_id"?}` |
//! | `GET`    | `/feedback` | Optional `?type=&status=&search=` |
//! | `GET`    | `/feedback/stats` | |
//! | `GET`    | `/feedback/{id}` | |
//! | `POST`   | `/feedback/{id}/like` | Not deduplicated |
//! | `PUT`    | `/feedback/{id}/status` | Staff; `{"status": "..."}` |
//! | `POST`   | `/feedback/{id}/respond` | Staff; `{"response", "status"?}` |
//! | `DELETE` | `/feedback/{id}` | Author (or `?anonymous_id=`) or staff |

use axum::{
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use mentor_core::{
  feedback::{Feedback, FeedbackKind, FeedbackQuery, FeedbackStats, FeedbackStatus},
  model::LanguageModel,
  store::Store,
};
use mentor_service::board::FeedbackPost;
use serde::Deserialize;

use crate::{AppState, Caller, MaybeCaller, error::ApiError, extract::{Json, Path, Query}};

/// `POST /feedback`
pub async fn create<S, M>(
  State(app): State<AppState<S, M>>,
  MaybeCaller(actor): MaybeCaller,
  Json(body): Json<FeedbackPost>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let feedback = app.board.post(actor.as_ref(), body).await?;
  Ok((StatusCode::CREATED, Json(feedback)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  #[serde(rename = "type")]
  pub kind:   Option<String>,
  pub status: Option<String>,
  pub search: Option<String>,
}

impl ListParams {
  fn into_query(self) -> Result<FeedbackQuery, ApiError> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let status = non_empty(self.status)
      .map(|s| {
        s.parse::<FeedbackStatus>()
          .map_err(|_| ApiError::BadRequest(format!("unknown status `{s}`")))
      })
      .transpose()?;
    Ok(FeedbackQuery {
      kind: non_empty(self.kind).map(|k| FeedbackKind::parse_lenient(&k)),
      status,
      search: non_empty(self.search),
    })
  }
}

/// `GET /feedback[?type=&status=&search=]`
pub async fn list<S, M>(
  State(app): State<AppState<S, M>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Feedback>>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.board.list(params.into_query()?).await?))
}

/// `GET /feedback/stats`
pub async fn stats<S, M>(
  State(app): State<AppState<S, M>>,
) -> Result<Json<FeedbackStats>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.board.stats().await?))
}

/// `GET /feedback/{id}`
pub async fn get_one<S, M>(
  State(app): State<AppState<S, M>>,
  Path(id): Path<i64>,
) -> Result<Json<Feedback>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.board.get(id).await?))
}

/// `POST /feedback/{id}/like`
pub async fn like<S, M>(
  State(app): State<AppState<S, M>>,
  Path(id): Path<i64>,
) -> Result<Json<Feedback>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.board.like(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: FeedbackStatus,
}

/// `PUT /feedback/{id}/status`
pub async fn set_status<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<i64>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Feedback>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.board.set_status(&actor, id, body.status).await?))
}

#[derive(Debug, Deserialize)]
pub struct RespondBody {
  pub response: String,
  #[serde(default)]
  pub status:   Option<FeedbackStatus>,
}

/// `POST /feedback/{id}/respond`
pub async fn respond<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<i64>,
  Json(body): Json<RespondBody>,
) -> Result<Json<Feedback>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.board.respond(&actor, id, body.response, body.status).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
  pub anonymous_id: Option<String>,
}

/// `DELETE /feedback/{id}[?anonymous_id=<token>]`
pub async fn remove<S, M>(
  State(app): State<AppState<S, M>>,
  MaybeCaller(actor): MaybeCaller,
  Path(id): Path<i64>,
  Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  app.board.delete(actor.as_ref(), params.anonymous_id.as_deref(), id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn list_params_are_normalised() {
    let query = ListParams {
      kind:   Some("complaint".into()),
      status: Some("pending".into()),
      search: Some("  ".into()),
    }
    .into_query()
    .unwrap();
    assert_eq!(query.kind, Some(FeedbackKind::Other));
    assert_eq!(query.status, Some(FeedbackStatus::Open));
    assert!(query.search.is_none());

    let bad = ListParams { status: Some("lost".into()), ..Default::default() }.into_query();
    assert!(matches!(bad, Err(ApiError::BadRequest(_))));
  }
}
