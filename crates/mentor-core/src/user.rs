//! Accounts: teachers, students and administrators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// What an account is allowed to do. Fixed at registration.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Teacher,
  Student,
  Admin,
}

impl Role {
  /// Teachers and admins moderate the feedback board and may act on any
  /// student's work they can see.
  pub fn is_staff(self) -> bool { matches!(self, Self::Teacher | Self::Admin) }
}

/// A registered account.
///
/// `class_id` is only meaningful for students, who belong to at most one
/// class at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub id:            Uuid,
  pub username:      String,
  /// Argon2 PHC string; never serialised.
  #[serde(skip_serializing, default)]
  pub password_hash: String,
  /// Display name.
  pub name:          String,
  pub role:          Role,
  pub class_id:      Option<Uuid>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none", default)]
  pub deleted_at:    Option<DateTime<Utc>>,
}

/// Input to [`crate::store::UserStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:      String,
  pub password_hash: String,
  pub name:          String,
  pub role:          Role,
}
