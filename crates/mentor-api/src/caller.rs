//! Caller identity extractors.
//!
//! Identity is the trusted `user_id`/`user_role` pair set at login, read from
//! cookies or, failing that, from the `X-User-ID`/`X-User-Role` headers. A
//! complete cookie pair wins over the headers.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use mentor_core::user::Role;
use mentor_service::Actor;
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_COOKIE: &str = "user_id";
pub const USER_ROLE_COOKIE: &str = "user_role";
pub const USER_NAME_COOKIE: &str = "user_name";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// An identified caller. Rejects with 401 when no identity is present.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Actor);

/// A caller who may be anonymous.
#[derive(Debug, Clone, Copy)]
pub struct MaybeCaller(pub Option<Actor>);

fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(key, _)| *key == name)
    .map(|(_, value)| value.trim())
    .filter(|value| !value.is_empty())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

/// Resolve the identity pair. `Ok(None)` means nothing was supplied; a pair
/// that is present but unparseable is an error.
pub fn identify(headers: &HeaderMap) -> Result<Option<Actor>, ApiError> {
  let pair = match (cookie(headers, USER_ID_COOKIE), cookie(headers, USER_ROLE_COOKIE)) {
    (Some(id), Some(role)) => Some((id, role)),
    _ => match (
      header_value(headers, USER_ID_HEADER),
      header_value(headers, USER_ROLE_HEADER),
    ) {
      (Some(id), Some(role)) => Some((id, role)),
      _ => None,
    },
  };
  let Some((id, role)) = pair else {
    return Ok(None);
  };

  let id = Uuid::parse_str(id)
    .map_err(|_| ApiError::Unauthorized("malformed user id".to_owned()))?;
  let role: Role = role
    .parse()
    .map_err(|_| ApiError::Unauthorized("unknown user role".to_owned()))?;
  Ok(Some(Actor::new(id, role)))
}

impl<St: Send + Sync> FromRequestParts<St> for Caller {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    identify(&parts.headers)?
      .map(Caller)
      .ok_or_else(|| ApiError::Unauthorized("not signed in".to_owned()))
  }
}

impl<St: Send + Sync> FromRequestParts<St> for MaybeCaller {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    Ok(MaybeCaller(identify(&parts.headers)?))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
      map.append(*name, HeaderValue::from_str(value).unwrap());
    }
    map
  }

  #[test]
  fn cookies_take_precedence_over_headers() {
    let from_cookie = Uuid::new_v4();
    let from_header = Uuid::new_v4();
    let cookie = format!("theme=dark; user_id={from_cookie}; user_role=teacher");
    let header_id = from_header.to_string();
    let map = headers(&[
      ("cookie", cookie.as_str()),
      ("x-user-id", header_id.as_str()),
      ("x-user-role", "student"),
    ]);

    let actor = identify(&map).unwrap().unwrap();
    assert_eq!(actor.id, from_cookie);
    assert_eq!(actor.role, Role::Teacher);
  }

  #[test]
  fn headers_are_used_without_cookies() {
    let id = Uuid::new_v4();
    let raw = id.to_string();
    let map = headers(&[("x-user-id", raw.as_str()), ("x-user-role", "student")]);
    let actor = identify(&map).unwrap().unwrap();
    assert_eq!(actor, Actor::new(id, Role::Student));
  }

  #[test]
  fn missing_and_malformed_identities() {
    assert!(identify(&HeaderMap::new()).unwrap().is_none());
    assert!(identify(&headers(&[("x-user-id", "abc")])).unwrap().is_none());
    assert!(identify(&headers(&[("x-user-id", "abc"), ("x-user-role", "student")])).is_err());
    let id = Uuid::new_v4().to_string();
    assert!(identify(&headers(&[("x-user-id", id.as_str()), ("x-user-role", "janitor")])).is_err());
  }
}
