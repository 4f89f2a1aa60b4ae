//! Handlers for submitting work and for teacher overrides.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/assignments/{id}/submit` | Student; `{"answers": {...}, "code"?, "student_name"?}` |
//! | `GET`  | `/submissions/{id}` | Submitting student or the assignment's author |
//! | `PUT`  | `/submissions/{id}/score` | `{"score": 0..=100}` |
//! | `PUT`  | `/submissions/{id}/feedback` | `{"feedback": "..."}` |
//! | `PUT`  | `/submissions/{id}/questions/{question_id}/score` | Recomputes the total |
//! | `PUT`  | `/submissions/{id}/questions/{question_id}/feedback` | |
//! | `POST` | `/submissions/{id}/regrade` | 202; grading runs in the background |
//! | `GET`  | `/submissions/{id}/download` | The submitted code as a `.go` attachment |

use axum::{
  extract::State,
  http::{StatusCode, header},
  response::IntoResponse,
};
use mentor_core::{model::LanguageModel, store::Store, submission::Submission};
use mentor_service::submissions::SubmitRequest;
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, Caller, error::ApiError, extract::{Json, Path}, message};

/// `POST /assignments/{id}/submit`
pub async fn submit<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<SubmitRequest>,
) -> Result<Json<Submission>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.submissions.submit(&actor, id, body).await?))
}

/// `GET /submissions/{id}`
pub async fn get_one<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Submission>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.submissions.get(&actor, id).await?))
}

// ─── Overrides ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScoreBody {
  pub score: i64,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
  pub feedback: String,
}

/// `PUT /submissions/{id}/score`
pub async fn set_score<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<ScoreBody>,
) -> Result<Json<Submission>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.submissions.set_score(&actor, id, body.score).await?))
}

/// `PUT /submissions/{id}/feedback`
pub async fn set_feedback<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<FeedbackBody>,
) -> Result<Json<Submission>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.submissions.set_teacher_feedback(&actor, id, body.feedback).await?))
}

/// `PUT /submissions/{id}/questions/{question_id}/score`
pub async fn set_question_score<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path((id, question_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<ScoreBody>,
) -> Result<Json<Submission>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let updated = app
    .submissions
    .set_question_score(&actor, id, question_id, body.score)
    .await?;
  Ok(Json(updated))
}

/// `PUT /submissions/{id}/questions/{question_id}/feedback`
pub async fn set_question_feedback<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path((id, question_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<FeedbackBody>,
) -> Result<Json<Submission>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let updated = app
    .submissions
    .set_question_feedback(&actor, id, question_id, body.feedback)
    .await?;
  Ok(Json(updated))
}

/// `POST /submissions/{id}/regrade`
pub async fn regrade<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  app.submissions.regrade(&actor, id).await?;
  Ok((StatusCode::ACCEPTED, message("regrading scheduled")))
}

/// `GET /submissions/{id}/download`
pub async fn download<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let file = app.submissions.download_code(&actor, id).await?;
  let disposition = format!("attachment; filename=\"{}\"", file.filename);
  Ok((
    [
      (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_owned()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    file.content,
  ))
}
