//! Input validation for everything the CRM accepts from users.
//!
//! Each form deserialises from request input, validates against the store
//! (choice sets depend on the request context), and persists through
//! [`CrmStore`](crate::store::CrmStore). Validation failures are collected per
//! field in [`ValidationErrors`].

pub mod business;
pub mod contact;
pub mod email;
pub mod interaction;
pub mod project;
pub mod relationship;

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
  "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_EMAIL: &str = "Enter a valid e-mail address.";

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Field name → messages, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn add(&mut self, field: &str, message: impl Into<String>) {
    self.0.entry(field.to_owned()).or_default().push(message.into());
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn field(&self, field: &str) -> &[String] {
    self.0.get(field).map(Vec::as_slice).unwrap_or_default()
  }

  pub fn contains(&self, field: &str) -> bool { self.0.contains_key(field) }

  /// `Ok(())` when nothing was recorded.
  pub fn check(self) -> Result<(), Self> {
    if self.is_empty() { Ok(()) } else { Err(self) }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, messages) in &self.0 {
      for message in messages {
        if !first {
          f.write_str("; ")?;
        }
        write!(f, "{field}: {message}")?;
        first = false;
      }
    }
    Ok(())
  }
}

#[derive(Debug, Error)]
pub enum FormError<E> {
  #[error("invalid input: {0}")]
  Invalid(ValidationErrors),

  #[error("store error: {0}")]
  Store(#[source] E),
}

impl<E> From<ValidationErrors> for FormError<E> {
  fn from(errors: ValidationErrors) -> Self { Self::Invalid(errors) }
}

impl<E> FormError<E> {
  /// The validation errors, if this is a validation failure.
  pub fn invalid(&self) -> Option<&ValidationErrors> {
    match self {
      Self::Invalid(errors) => Some(errors),
      Self::Store(_) => None,
    }
  }
}

// ─── Choices ─────────────────────────────────────────────────────────────────

/// One selectable option of a choice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
  pub value: Uuid,
  pub label: String,
}

// ─── Field cleaners ──────────────────────────────────────────────────────────

/// Trimmed `value`; records [`REQUIRED`] when blank.
pub(crate) fn required_text(errors: &mut ValidationErrors, field: &str, value: &str) -> String {
  let value = value.trim();
  if value.is_empty() {
    errors.add(field, REQUIRED);
  }
  value.to_owned()
}

pub(crate) fn max_length(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
  let len = value.chars().count();
  if len > max {
    errors.add(
      field,
      format!("Ensure this value has at most {max} characters (it has {len})."),
    );
  }
}

/// Trimmed, non-empty optional text.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

pub(crate) fn is_valid_email(value: &str) -> bool {
  let Some((local, domain)) = value.rsplit_once('@') else {
    return false;
  };
  !local.is_empty()
    && !value.chars().any(char::is_whitespace)
    && domain.contains('.')
    && !domain.starts_with('.')
    && !domain.ends_with('.')
}
