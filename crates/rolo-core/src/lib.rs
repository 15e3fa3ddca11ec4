//! Core types and trait definitions for the Rolo CRM.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the domain entities, the registration workflow, form validation, and the
//! [`store::CrmStore`] abstraction that storage backends implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod contact;
pub mod error;
pub mod forms;
pub mod install;
pub mod interaction;
pub mod mail;
pub mod project;
pub mod registration;
pub mod relationship;
pub mod slug;
pub mod store;

pub use error::{Error, Result};
