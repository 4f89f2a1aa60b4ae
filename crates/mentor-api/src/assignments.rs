//! Handlers for `/assignments` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/assignments` | Teacher; manual authoring |
//! | `POST`   | `/assignments/generate` | Teacher; `{"topic", "difficulty"?}` |
//! | `GET`    | `/assignments` | Teacher: own; student: class's published |
//! | `GET`    | `/assignments/{id}` | Assignment with ordered questions |
//! | `DELETE` | `/assignments/{id}` | Owner; cascades |
//! | `POST`   | `/assignments/{id}/publish` | Owner; `{"class_id", "deadline": "YYYY-MM-DD"}` |
//! | `GET`    | `/assignments/{id}/published` | Owner |
//! | `GET`    | `/assignments/{id}/submissions` | Owner |
//! | `GET`    | `/assignments/{id}/pending` | Owner; submissions awaiting grading |
//! | `GET`    | `/assignments/{id}/student/{student_id}` | Owner or that student |
//! | `GET`    | `/my/assignments` | Student; with progress |

use axum::{
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use mentor_core::{
  assignment::{Assignment, AssignmentDetail, PublishedClass},
  model::LanguageModel,
  store::Store,
  submission::Submission,
};
use mentor_service::catalog::{ManualAssignment, StudentAssignment};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{AppState, Caller, error::ApiError, extract::{Json, Path}, message};

// ─── Authoring ────────────────────────────────────────────────────────────────

/// `POST /assignments`
pub async fn create<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Json(body): Json<ManualAssignment>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let detail = app.catalog.create_manual(&actor, body).await?;
  Ok((StatusCode::CREATED, Json(detail)))
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
  pub topic:      String,
  #[serde(default)]
  pub difficulty: String,
}

/// `POST /assignments/generate`
pub async fn generate<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Json(body): Json<GenerateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  if body.topic.trim().is_empty() {
    return Err(ApiError::BadRequest("topic is required".to_owned()));
  }
  let detail = app.catalog.generate(&actor, &body.topic, &body.difficulty).await?;
  Ok((StatusCode::CREATED, Json(detail)))
}

// ─── Reading ──────────────────────────────────────────────────────────────────

/// `GET /assignments`
pub async fn list<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
) -> Result<Json<Vec<Assignment>>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.catalog.list_visible(&actor).await?))
}

/// `GET /my/assignments`
pub async fn mine<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
) -> Result<Json<Vec<StudentAssignment>>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.catalog.list_for_student(&actor).await?))
}

/// `GET /assignments/{id}`
pub async fn get_one<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(_): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<AssignmentDetail>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.catalog.detail(id).await?))
}

/// `DELETE /assignments/{id}`
pub async fn remove<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  app.catalog.delete(&actor, id).await?;
  Ok(message("assignment deleted"))
}

// ─── Publication ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PublishBody {
  pub class_id: Uuid,
  pub deadline: String,
}

/// `POST /assignments/{id}/publish`
pub async fn publish<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<PublishBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let publication = app.catalog.publish(&actor, id, body.class_id, &body.deadline).await?;
  Ok(Json(publication))
}

/// `GET /assignments/{id}/published`
pub async fn published<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<PublishedClass>>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.catalog.published_classes(&actor, id).await?))
}

// ─── Submissions by assignment ────────────────────────────────────────────────

/// `GET /assignments/{id}/submissions`
pub async fn submissions<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Submission>>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.catalog.submissions_for(&actor, id).await?))
}

/// `GET /assignments/{id}/pending`
pub async fn pending<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let count = app.catalog.pending_count(&actor, id).await?;
  Ok(Json(json!({ "assignment_id": id, "pending": count })))
}

/// `GET /assignments/{id}/student/{student_id}`
pub async fn for_student<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path((id, student_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Submission>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.catalog.student_submission(&actor, id, student_id).await?))
}
