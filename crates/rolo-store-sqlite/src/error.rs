//! Error type for `rolo-store-sqlite`.

use rolo_core::store::{ClassifyError, StoreErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] rolo_core::Error),

  #[error("database error: {0}")]
  Database(#[source] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("conflict: {0}")]
  Conflict(String),
}

impl Error {
  pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
    Self::NotFound { entity, id: id.to_string() }
  }
}

/// Uniqueness violations become [`Error::Conflict`]; everything else stays a
/// database error.
impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match constraint_code(&err) {
      Some(
        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
      ) => Error::Conflict(err.to_string()),
      _ => Error::Database(err),
    }
  }
}

fn constraint_code(err: &tokio_rusqlite::Error) -> Option<std::ffi::c_int> {
  match err {
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(failure, _))
      if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
    {
      Some(failure.extended_code)
    }
    _ => None,
  }
}

impl ClassifyError for Error {
  fn kind(&self) -> StoreErrorKind {
    match self {
      Error::NotFound { .. } => StoreErrorKind::NotFound,
      Error::Conflict(_) => StoreErrorKind::Conflict,
      Error::Core(rolo_core::Error::AlreadyActivated(_)) => {
        StoreErrorKind::AlreadyActivated
      }
      Error::Core(rolo_core::Error::RegistrationExpired(_)) => {
        StoreErrorKind::Expired
      }
      // A dangling reference in an insert.
      Error::Database(err)
        if constraint_code(err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) =>
      {
        StoreErrorKind::NotFound
      }
      _ => StoreErrorKind::Other,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
