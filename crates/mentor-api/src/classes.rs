//! Handlers for `/classes` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/classes` | Teacher; body `{"name": "..."}` |
//! | `GET`    | `/classes` | The teacher's own classes |
//! | `GET`    | `/classes/{id}` | 404 if not found |
//! | `DELETE` | `/classes/{id}` | Owner; removes member accounts too |
//! | `POST`   | `/classes/join` | Student; body `{"code": "123456"}` |
//! | `GET`    | `/classes/{id}/students` | Owner |
//! | `POST`   | `/classes/{id}/students` | Owner; body `{"student_id": "..."}` |
//! | `DELETE` | `/classes/{id}/students/{student_id}` | Owner |
//! | `GET`    | `/classes/{id}/stats` | Owner |

use axum::{
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use mentor_core::{class::Class, model::LanguageModel, store::Store, user::User};
use mentor_service::registry::ClassStats;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{AppState, Caller, error::ApiError, extract::{Json, Path}, message};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

/// `POST /classes`
pub async fn create<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let class = app.registry.create_class(&actor, &body.name).await?;
  Ok((StatusCode::CREATED, Json(class)))
}

/// `GET /classes`
pub async fn list<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
) -> Result<Json<Vec<Class>>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.registry.teacher_classes(&actor).await?))
}

/// `GET /classes/{id}`
pub async fn get_one<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(_): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Class>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.registry.get(id).await?))
}

/// `DELETE /classes/{id}`
pub async fn remove<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let removed = app.registry.delete_class(&actor, id).await?;
  Ok(Json(json!({ "message": "class deleted", "removed_students": removed })))
}

#[derive(Debug, Deserialize)]
pub struct JoinBody {
  pub code: String,
}

/// `POST /classes/join`
pub async fn join<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Json(body): Json<JoinBody>,
) -> Result<Json<Class>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.registry.join(&actor, &body.code).await?))
}

/// `GET /classes/{id}/students`
pub async fn students<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.registry.students(&actor, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AddStudentBody {
  pub student_id: Uuid,
}

/// `POST /classes/{id}/students`
pub async fn add_student<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<AddStudentBody>,
) -> Result<Json<User>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.registry.add_student(&actor, id, body.student_id).await?))
}

/// `DELETE /classes/{id}/students/{student_id}`
pub async fn remove_student<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path((id, student_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  app.registry.remove_student(&actor, id, student_id).await?;
  Ok(message("student removed"))
}

/// `GET /classes/{id}/stats`
pub async fn stats<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<ClassStats>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.registry.stats(&actor, id).await?))
}
