//! Core types and trait definitions for the Mentor classroom backend.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement the traits in [`store`]; hosted language models
//! implement [`model::LanguageModel`]. Everything above them (services, the
//! JSON API) is written against these abstractions only.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod assignment;
pub mod chat;
pub mod class;
pub mod error;
pub mod feedback;
pub mod model;
pub mod prompt;
pub mod reply;
pub mod store;
pub mod submission;
pub mod user;

pub use error::{Error, Result};
