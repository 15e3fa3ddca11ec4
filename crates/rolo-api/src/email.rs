//! Handlers for `/email` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/email/recipients` | `?project_id=` or `?business_id=`; `null` when unrestricted |
//! | `POST` | `/email` | Body: `{"to": uuid, "memo": "..."}`; same scope parameters |

use axum::{
  Json,
  extract::{Query, State},
};
use rolo_core::{
  forms::{
    Choice,
    email::{EmailForm, EmailScope},
  },
  mail::send_silently,
  store::CrmStore,
};
use serde::Serialize;

use crate::{ApiState, error::ApiError};

/// `GET /email/recipients[?project_id=<uuid>|?business_id=<uuid>]`
pub async fn recipients<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Query(scope): Query<EmailScope>,
) -> Result<Json<Option<Vec<Choice>>>, ApiError> {
  let choices = scope
    .choices(state.store.as_ref())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(choices))
}

#[derive(Debug, Serialize)]
pub struct Delivery {
  pub to:   String,
  /// False when the transport refused the message.
  pub sent: bool,
}

/// `POST /email[?project_id=<uuid>|?business_id=<uuid>]`
pub async fn send<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Query(scope): Query<EmailScope>,
  Json(form): Json<EmailForm>,
) -> Result<Json<Delivery>, ApiError> {
  let cleaned = form
    .clean(state.store.as_ref(), scope)
    .await
    .map_err(ApiError::form)?;
  let email = cleaned.compose(&state.settings.site);
  let sent = send_silently(state.mailer.as_ref(), &email);
  Ok(Json(Delivery { to: cleaned.to.email, sent }))
}
