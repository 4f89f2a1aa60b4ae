//! Accounts: registration, login and password management.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use mentor_core::{
  store::{StoreError, UserStore},
  user::{NewUser, Role, User},
};
use rand_core::OsRng;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, ServiceError, forbidden, internal, invalid, not_found};

const BAD_CREDENTIALS: &str = "invalid username or password";

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
  pub id:   Uuid,
  pub role: Role,
}

impl Actor {
  pub fn new(id: Uuid, role: Role) -> Self { Self { id, role } }

  pub fn is_admin(&self) -> bool { self.role == Role::Admin }

  pub fn require_teacher(&self) -> Result<()> {
    match self.role {
      Role::Teacher => Ok(()),
      _ => Err(forbidden("teachers only")),
    }
  }

  pub fn require_student(&self) -> Result<()> {
    match self.role {
      Role::Student => Ok(()),
      _ => Err(forbidden("students only")),
    }
  }

  pub fn require_admin(&self) -> Result<()> {
    if self.is_admin() { Ok(()) } else { Err(forbidden("administrators only")) }
  }

  /// Whether this actor owns a resource created by `owner`. Admins own
  /// everything.
  pub fn owns(&self, owner: Uuid) -> bool { self.is_admin() || self.id == owner }
}

/// Input to [`Accounts::register`].
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
  pub username: String,
  pub password: String,
  #[serde(default)]
  pub name:     String,
  pub role:     Role,
}

#[derive(Clone)]
pub struct Accounts<S> {
  store:  S,
  argon2: Argon2<'static>,
}

impl<S: UserStore> Accounts<S> {
  pub fn new(store: S) -> Self { Self { store, argon2: Argon2::default() } }

  /// Replace the password hasher, e.g. with cheaper parameters in tests.
  pub fn with_argon2(mut self, argon2: Argon2<'static>) -> Self {
    self.argon2 = argon2;
    self
  }

  fn hash(&self, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    self
      .argon2
      .hash_password(password.as_bytes(), &salt)
      .map(|h| h.to_string())
      .map_err(internal)
  }

  fn verify(&self, password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
      .map(|parsed| self.argon2.verify_password(password.as_bytes(), &parsed).is_ok())
      .unwrap_or(false)
  }

  /// Self-service sign-up. Only teachers and students may register; admins
  /// are created out of band with [`Accounts::create_admin`].
  pub async fn register(&self, input: Registration) -> Result<User> {
    if input.role == Role::Admin {
      return Err(invalid("role must be teacher or student"));
    }
    self.create(input).await
  }

  pub async fn create_admin(
    &self,
    username: String,
    password: String,
    name: String,
  ) -> Result<User> {
    self
      .create(Registration { username, password, name, role: Role::Admin })
      .await
  }

  async fn create(&self, input: Registration) -> Result<User> {
    let username = input.username.trim().to_owned();
    if username.is_empty() {
      return Err(invalid("username is required"));
    }
    if input.password.is_empty() {
      return Err(invalid("password is required"));
    }

    let existing = self
      .store
      .find_user_by_username(username.clone())
      .await
      .map_err(internal)?;
    if existing.is_some() {
      return Err(invalid("username already exists"));
    }

    let name = match input.name.trim() {
      "" => username.clone(),
      n => n.to_owned(),
    };

    let new = NewUser {
      username,
      password_hash: self.hash(&input.password)?,
      name,
      role: input.role,
    };

    match self.store.create_user(new).await {
      Ok(user) => {
        info!(user = %user.id, role = %user.role, "registered account");
        Ok(user)
      }
      Err(e) if e.is_unique_violation() => Err(invalid("username already exists")),
      Err(e) => Err(internal(e)),
    }
  }

  /// Unknown users and wrong passwords fail identically.
  pub async fn login(&self, username: &str, password: &str) -> Result<User> {
    let user = self
      .store
      .find_user_by_username(username.trim().to_owned())
      .await
      .map_err(internal)?
      .ok_or_else(|| ServiceError::Unauthenticated(BAD_CREDENTIALS.to_owned()))?;

    if !self.verify(password, &user.password_hash) {
      return Err(ServiceError::Unauthenticated(BAD_CREDENTIALS.to_owned()));
    }
    Ok(user)
  }

  pub async fn get(&self, id: Uuid) -> Result<User> {
    self
      .store
      .get_user(id)
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("user"))
  }

  pub async fn find_by_username(&self, username: &str) -> Result<User> {
    self
      .store
      .find_user_by_username(username.trim().to_owned())
      .await
      .map_err(internal)?
      .ok_or_else(|| not_found("user"))
  }

  pub async fn list_all(&self, actor: &Actor) -> Result<Vec<User>> {
    actor.require_admin()?;
    self.store.list_users().await.map_err(internal)
  }

  pub async fn students_in_class(&self, class_id: Uuid) -> Result<Vec<User>> {
    self.store.list_class_students(class_id).await.map_err(internal)
  }

  /// Users may change their own password; admins may change anyone's.
  pub async fn reset_password(
    &self,
    actor: &Actor,
    user_id: Uuid,
    new_password: &str,
  ) -> Result<()> {
    if !actor.owns(user_id) {
      return Err(forbidden("cannot change another user's password"));
    }
    if new_password.is_empty() {
      return Err(invalid("password is required"));
    }
    self.get(user_id).await?;

    let hash = self.hash(new_password)?;
    self.store.set_password_hash(user_id, hash).await.map_err(internal)?;
    info!(user = %user_id, by = %actor.id, "password changed");
    Ok(())
  }

  /// Soft-delete an account. Admin only; admins cannot remove themselves.
  pub async fn deactivate(&self, actor: &Actor, user_id: Uuid) -> Result<()> {
    actor.require_admin()?;
    if actor.id == user_id {
      return Err(invalid("cannot deactivate your own account"));
    }
    if !self.store.delete_user(user_id).await.map_err(internal)? {
      return Err(not_found("user"));
    }
    info!(user = %user_id, by = %actor.id, "account deactivated");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use mentor_store_sqlite::SqliteStore;

  use super::*;
  use crate::testing::{accounts, register};

  #[tokio::test]
  async fn register_and_login() {
    let accounts = accounts(SqliteStore::open_in_memory().await.unwrap());
    let user = register(&accounts, "ada", Role::Student).await;
    assert_eq!(user.name, "ADA");
    assert_ne!(user.password_hash, "secret");

    let logged_in = accounts.login("ada", "secret").await.unwrap();
    assert_eq!(logged_in.id, user.id);
  }

  #[tokio::test]
  async fn login_failures_are_indistinguishable() {
    let accounts = accounts(SqliteStore::open_in_memory().await.unwrap());
    register(&accounts, "ada", Role::Student).await;

    let wrong = accounts.login("ada", "nope").await.unwrap_err();
    let unknown = accounts.login("bob", "secret").await.unwrap_err();
    assert!(matches!(wrong, ServiceError::Unauthenticated(_)));
    assert_eq!(wrong.to_string(), unknown.to_string());
  }

  #[tokio::test]
  async fn registration_rules() {
    let accounts = accounts(SqliteStore::open_in_memory().await.unwrap());
    register(&accounts, "ada", Role::Teacher).await;

    let dup = accounts
      .register(Registration {
        username: "ada".into(),
        password: "x".into(),
        name:     String::new(),
        role:     Role::Student,
      })
      .await
      .unwrap_err();
    assert_eq!(dup.to_string(), "username already exists");

    let admin = accounts
      .register(Registration {
        username: "root".into(),
        password: "x".into(),
        name:     String::new(),
        role:     Role::Admin,
      })
      .await
      .unwrap_err();
    assert!(matches!(admin, ServiceError::Validation(_)));

    let empty = accounts
      .register(Registration {
        username: "  ".into(),
        password: "x".into(),
        name:     String::new(),
        role:     Role::Student,
      })
      .await
      .unwrap_err();
    assert!(matches!(empty, ServiceError::Validation(_)));
  }

  #[tokio::test]
  async fn password_reset_is_self_or_admin() {
    let accounts = accounts(SqliteStore::open_in_memory().await.unwrap());
    let ada = register(&accounts, "ada", Role::Student).await;
    let bob = register(&accounts, "bob", Role::Student).await;
    let root = accounts
      .create_admin("root".into(), "secret".into(), "Root".into())
      .await
      .unwrap();

    let as_bob = Actor::new(bob.id, Role::Student);
    let err = accounts.reset_password(&as_bob, ada.id, "hijack").await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let as_ada = Actor::new(ada.id, Role::Student);
    accounts.reset_password(&as_ada, ada.id, "fresh").await.unwrap();
    accounts.login("ada", "fresh").await.unwrap();

    let as_root = Actor::new(root.id, Role::Admin);
    accounts.reset_password(&as_root, ada.id, "reset").await.unwrap();
    assert!(accounts.login("ada", "fresh").await.is_err());
    accounts.login("ada", "reset").await.unwrap();
  }

  #[tokio::test]
  async fn deactivated_accounts_disappear() {
    let accounts = accounts(SqliteStore::open_in_memory().await.unwrap());
    let ada = register(&accounts, "ada", Role::Student).await;
    let root = accounts
      .create_admin("root".into(), "secret".into(), String::new())
      .await
      .unwrap();
    let as_root = Actor::new(root.id, Role::Admin);

    assert_eq!(accounts.list_all(&as_root).await.unwrap().len(), 2);
    accounts.deactivate(&as_root, ada.id).await.unwrap();

    assert!(accounts.login("ada", "secret").await.is_err());
    assert!(matches!(accounts.get(ada.id).await, Err(ServiceError::NotFound(_))));
    assert_eq!(accounts.list_all(&as_root).await.unwrap().len(), 1);

    let as_ada = Actor::new(ada.id, Role::Student);
    assert!(accounts.list_all(&as_ada).await.is_err());
  }
}
