//! Handlers for registration, login and account management.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/register` | `{username, password, name, role}`; role `teacher` or `student` |
//! | `POST`   | `/login` | Sets the identity cookies |
//! | `GET`    | `/users` | Admin only |
//! | `GET`    | `/users/find?username=` | |
//! | `DELETE` | `/users/{id}` | Admin only; soft delete |
//! | `PUT`    | `/users/{id}/password` | Self or admin |

use axum::{
  extract::State,
  http::{StatusCode, header::SET_COOKIE},
  response::{AppendHeaders, IntoResponse},
};
use mentor_core::{
  model::LanguageModel,
  store::Store,
  user::{Role, User},
};
use mentor_service::identity::Registration;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
  AppState, Caller,
  caller::{USER_ID_COOKIE, USER_NAME_COOKIE, USER_ROLE_COOKIE},
  error::ApiError,
  extract::{Json, Path, Query},
  message,
};

const COOKIE_MAX_AGE: u64 = 7 * 24 * 60 * 60;

/// Percent-encode everything outside the RFC 3986 unreserved set so display
/// names survive as cookie values.
fn cookie_value(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for byte in raw.bytes() {
    if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
      out.push(byte as char);
    } else {
      out.push_str(&format!("%{byte:02X}"));
    }
  }
  out
}

fn set_cookie(name: &str, value: &str) -> (axum::http::HeaderName, String) {
  (SET_COOKIE, format!("{name}={}; Path=/; Max-Age={COOKIE_MAX_AGE}", cookie_value(value)))
}

// ─── Register ─────────────────────────────────────────────────────────────────

/// `POST /register`
pub async fn register<S, M>(
  State(app): State<AppState<S, M>>,
  Json(body): Json<Registration>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let user = app.accounts.register(body).await?;
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Login ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
  pub id:       Uuid,
  pub username: String,
  pub name:     String,
  pub role:     Role,
}

/// `POST /login`
pub async fn login<S, M>(
  State(app): State<AppState<S, M>>,
  Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  let user = app.accounts.login(&body.username, &body.password).await?;
  info!(user = %user.id, role = %user.role, "login");

  let cookies = AppendHeaders([
    set_cookie(USER_ID_COOKIE, &user.id.to_string()),
    set_cookie(USER_ROLE_COOKIE, user.role.as_ref()),
    set_cookie(USER_NAME_COOKIE, &user.name),
  ]);
  let response = LoginResponse {
    id:       user.id,
    username: user.username,
    name:     user.name,
    role:     user.role,
  };
  Ok((cookies, Json(response)))
}

// ─── Lookup ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FindParams {
  #[serde(default)]
  pub username: String,
}

/// `GET /users/find?username=<name>`
pub async fn find<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(_): Caller,
  Query(params): Query<FindParams>,
) -> Result<Json<User>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  if params.username.trim().is_empty() {
    return Err(ApiError::BadRequest("username is required".to_owned()));
  }
  Ok(Json(app.accounts.find_by_username(&params.username).await?))
}

/// `GET /users`
pub async fn list<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  Ok(Json(app.accounts.list_all(&actor).await?))
}

// ─── Manage ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PasswordBody {
  pub password: String,
}

/// `PUT /users/{id}/password`
pub async fn reset_password<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<PasswordBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  app.accounts.reset_password(&actor, id, &body.password).await?;
  Ok(message("password updated"))
}

/// `DELETE /users/{id}`
pub async fn deactivate<S, M>(
  State(app): State<AppState<S, M>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: Store,
  M: LanguageModel + 'static,
{
  app.accounts.deactivate(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cookie_values_are_encoded() {
    assert_eq!(cookie_value("ada"), "ada");
    assert_eq!(cookie_value("Ada L; x"), "Ada%20L%3B%20x");
    assert_eq!(cookie_value("é"), "%C3%A9");
  }
}
