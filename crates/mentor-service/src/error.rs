//! The service-layer error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
  /// Bad or missing credentials.
  #[error("{0}")]
  Unauthenticated(String),

  #[error("{0}")]
  NotFound(String),

  /// The caller's role or ownership does not permit the operation.
  #[error("{0}")]
  Forbidden(String),

  /// Missing or malformed input, deadlines in the past, duplicate usernames.
  #[error("{0}")]
  Validation(String),

  /// The request is well-formed but the current state forbids it.
  #[error("{0}")]
  Conflict(String),

  /// The language model failed or returned something unusable.
  #[error("model error: {0}")]
  Upstream(String),

  /// Storage or other unexpected failure. The message is for logs only.
  #[error("internal error: {0}")]
  Internal(String),
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

pub(crate) fn internal(err: impl std::fmt::Display) -> ServiceError {
  ServiceError::Internal(err.to_string())
}

/// For replies that arrived but could not be used; the text goes to the client.
pub(crate) fn upstream(err: impl std::fmt::Display) -> ServiceError {
  ServiceError::Upstream(err.to_string())
}

/// For failed model calls. Transport details stay in the logs.
pub(crate) fn model_unavailable() -> ServiceError {
  ServiceError::Upstream("the language model is unavailable".to_owned())
}

pub(crate) fn not_found(what: &str) -> ServiceError {
  ServiceError::NotFound(format!("{what} not found"))
}

pub(crate) fn forbidden(message: &str) -> ServiceError {
  ServiceError::Forbidden(message.to_owned())
}

pub(crate) fn invalid(message: impl Into<String>) -> ServiceError {
  ServiceError::Validation(message.into())
}
