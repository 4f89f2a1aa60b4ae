//! Error types for `mentor-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  #[error("model reply contained no JSON object")]
  NoJsonObject,

  #[error("could not parse model reply ({reason}); reply began with: {excerpt:?}")]
  MalformedReply { reason: String, excerpt: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Parse a lowercase discriminant (as stored in the database) into one of the
/// strum-backed enums in this crate.
pub fn parse_variant<T: std::str::FromStr>(
  kind: &'static str,
  value: &str,
) -> Result<T> {
  value.parse().map_err(|_| Error::UnknownVariant {
    kind,
    value: value.to_owned(),
  })
}
