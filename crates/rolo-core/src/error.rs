//! Error types for `rolo-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("registration {0} is already activated")]
  AlreadyActivated(Uuid),

  #[error("registration {0} has expired")]
  RegistrationExpired(Uuid),

  #[error("password hashing failed: {0}")]
  PasswordHash(String),

  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },
}

impl Error {
  pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
    Self::UnknownVariant { kind, value: value.to_owned() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
