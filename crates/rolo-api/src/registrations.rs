//! Handlers for `/registrations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/registrations` | Body: `{"contact_id": uuid, "groups": [uuid]}`; emails the key |
//! | `GET`  | `/registrations/{key}` | `pending`, `activated` or `expired` |
//! | `POST` | `/registrations/{key}/activate` | Body: `{"password": "..."}`; 409 if used, 410 if expired |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rolo_core::{
  account::{User, hash_password},
  forms::{REQUIRED, ValidationErrors},
  registration::{
    Activation, LoginRegistration, NewRegistration, PreparedEmail,
    RegistrationStatus,
  },
  store::CrmStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, contacts::load_contact, error::ApiError};

/// A registration as seen by clients. The activation key is never echoed.
#[derive(Debug, Serialize)]
pub struct RegistrationView {
  pub registration_id: Uuid,
  pub contact_id:      Uuid,
  pub date:            DateTime<Utc>,
  pub status:          RegistrationStatus,
  pub expires_at:      DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email_sent:      Option<bool>,
}

impl RegistrationView {
  fn new(registration: &LoginRegistration, now: DateTime<Utc>, days: u32) -> Self {
    Self {
      registration_id: registration.registration_id,
      contact_id:      registration.contact_id,
      date:            registration.date,
      status:          registration.status(now, days),
      expires_at:      registration.expires_at(days),
      email_sent:      None,
    }
  }
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub contact_id: Uuid,
  #[serde(default)]
  pub groups:     Vec<Uuid>,
}

/// `POST /registrations`
pub async fn create<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let store = state.store.as_ref();
  let contact = load_contact(store, body.contact_id).await?;
  if contact.user_id.is_some() {
    return Err(ApiError::Conflict(format!(
      "contact {} already has a login account",
      contact.contact_id
    )));
  }
  if contact.email.trim().is_empty() {
    let mut errors = ValidationErrors::new();
    errors.add("email", REQUIRED);
    return Err(errors.into());
  }

  let now = Utc::now();
  let registration = store
    .create_registration(NewRegistration::for_contact(&contact, body.groups, now))
    .await
    .map_err(ApiError::store)?;

  let site = &state.settings.site;
  let sent = match registration.prepare_email(&contact, site, state.mailer.as_ref(), true) {
    PreparedEmail::Sent(sent) => sent,
    PreparedEmail::Deferred(_) => false,
  };
  tracing::info!(
    registration_id = %registration.registration_id,
    contact_id = %contact.contact_id,
    sent,
    "registration created"
  );

  let mut view = RegistrationView::new(&registration, now, site.account_activation_days);
  view.email_sent = Some(sent);
  Ok((StatusCode::CREATED, Json(view)))
}

// ─── Status ───────────────────────────────────────────────────────────────────

/// `GET /registrations/{key}`
pub async fn status<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(key): Path<String>,
) -> Result<Json<RegistrationView>, ApiError> {
  let registration = state
    .store
    .get_registration_by_key(key)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("registration not found".to_owned()))?;
  let days = state.settings.site.account_activation_days;
  Ok(Json(RegistrationView::new(&registration, Utc::now(), days)))
}

// ─── Activate ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActivateBody {
  #[serde(default)]
  pub password: String,
}

/// `POST /registrations/{key}/activate`
pub async fn activate<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(key): Path<String>,
  Json(body): Json<ActivateBody>,
) -> Result<Json<User>, ApiError> {
  if body.password.is_empty() {
    let mut errors = ValidationErrors::new();
    errors.add("password", REQUIRED);
    return Err(errors.into());
  }
  let password_hash =
    hash_password(&body.password).map_err(|e| ApiError::Store(Box::new(e)))?;

  let user = state
    .store
    .activate_registration(Activation {
      activation_key: key,
      password_hash,
      now: Utc::now(),
      activation_days: state.settings.site.account_activation_days,
    })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(user))
}
