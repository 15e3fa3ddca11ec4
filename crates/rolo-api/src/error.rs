//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use rolo_core::{
  forms::{FormError, ValidationErrors},
  store::{ClassifyError, StoreErrorKind},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("invalid input: {0}")]
  Invalid(ValidationErrors),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("gone: {0}")]
  Gone(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a backend error onto a status by its [`StoreErrorKind`].
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + ClassifyError + Send + Sync + 'static,
  {
    match err.kind() {
      StoreErrorKind::NotFound => ApiError::NotFound(err.to_string()),
      StoreErrorKind::Conflict | StoreErrorKind::AlreadyActivated => {
        ApiError::Conflict(err.to_string())
      }
      StoreErrorKind::Expired => ApiError::Gone(err.to_string()),
      StoreErrorKind::Other => ApiError::Store(Box::new(err)),
    }
  }

  pub fn form<E>(err: FormError<E>) -> Self
  where
    E: std::error::Error + ClassifyError + Send + Sync + 'static,
  {
    match err {
      FormError::Invalid(errors) => ApiError::Invalid(errors),
      FormError::Store(e) => Self::store(e),
    }
  }
}

impl From<ValidationErrors> for ApiError {
  fn from(errors: ValidationErrors) -> Self { ApiError::Invalid(errors) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Invalid(errors) => {
        let body = json!({ "error": "invalid input", "fields": errors });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
      }
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Gone(m) => (StatusCode::GONE, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store error");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
