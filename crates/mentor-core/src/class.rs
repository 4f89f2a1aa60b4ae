//! Classes and their join codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A teacher-owned class that students attach to with a join code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
  pub id:         Uuid,
  pub name:       String,
  pub teacher_id: Uuid,
  /// Six ASCII digits; unique across all classes.
  pub code:       String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewClass {
  pub name:       String,
  pub teacher_id: Uuid,
  pub code:       String,
}
