//! Handlers for `/contacts` and `/businesses` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/contacts` | Optional `?search=` and `?kind=individual\|business` |
//! | `POST` | `/contacts` | Person signup; body: `{"first_name","last_name","email"}` |
//! | `GET`  | `/contacts/{id}` | 404 if not found |
//! | `PUT`  | `/contacts/{id}/profile` | Notes and picture; the contact must have a login |
//! | `GET`  | `/contacts/{id}/relations` | Outgoing relations; optional `?kind=` |
//! | `POST` | `/contacts/{id}/relations` | Body: `{"to": uuid, "types": [uuid]}`; 409 on duplicate |
//! | `PUT`  | `/contacts/{id}/relations/{to}` | Body: `{"types": [uuid]}` |
//! | `POST` | `/businesses` | Body: `{"name", "business_types": [uuid], ...}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use rolo_core::{
  contact::{Contact, ContactKind},
  forms::{
    business::BusinessForm,
    contact::{PersonForm, ProfileForm, SearchForm},
    relationship::BusinessRelationshipForm,
  },
  relationship::ContactRelationship,
  store::CrmStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// Fetch a contact or fail with 404.
pub(crate) async fn load_contact<S: CrmStore>(store: &S, id: Uuid) -> Result<Contact, ApiError> {
  store
    .get_contact(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub search: Option<String>,
  pub kind:   Option<ContactKind>,
}

/// `GET /contacts[?search=<text>][&kind=<kind>]`
pub async fn list<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Contact>>, ApiError> {
  let query = SearchForm { search: params.search }.query(params.kind);
  let contacts = state.store.list_contacts(query).await.map_err(ApiError::store)?;
  Ok(Json(contacts))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /contacts`
pub async fn create<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Json(form): Json<PersonForm>,
) -> Result<impl IntoResponse, ApiError> {
  let contact = form
    .save(state.store.as_ref(), None)
    .await
    .map_err(ApiError::form)?;
  Ok((StatusCode::CREATED, Json(contact)))
}

/// `POST /businesses`
pub async fn create_business<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Json(form): Json<BusinessForm>,
) -> Result<impl IntoResponse, ApiError> {
  let business = form
    .save(state.store.as_ref(), None)
    .await
    .map_err(ApiError::form)?;
  Ok((StatusCode::CREATED, Json(business)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /contacts/{id}`
pub async fn get_one<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Contact>, ApiError> {
  Ok(Json(load_contact(state.store.as_ref(), id).await?))
}

// ─── Profile ──────────────────────────────────────────────────────────────────

/// `PUT /contacts/{id}/profile`
pub async fn save_profile<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(form): Json<ProfileForm>,
) -> Result<Json<Contact>, ApiError> {
  let contact = load_contact(state.store.as_ref(), id).await?;
  let user_id = contact
    .user_id
    .ok_or_else(|| ApiError::BadRequest(format!("contact {id} has no login account")))?;
  let saved = form
    .save(state.store.as_ref(), user_id)
    .await
    .map_err(ApiError::form)?;
  Ok(Json(saved))
}

// ─── Relations ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RelationsParams {
  pub kind: Option<ContactKind>,
}

/// `GET /contacts/{id}/relations[?kind=<kind>]`
pub async fn relations<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<RelationsParams>,
) -> Result<Json<Vec<Contact>>, ApiError> {
  load_contact(state.store.as_ref(), id).await?;
  let related = state
    .store
    .related_contacts(id, params.kind)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(related))
}

#[derive(Debug, Deserialize)]
pub struct RelateBody {
  pub to:    Uuid,
  #[serde(default)]
  pub types: Vec<Uuid>,
}

/// `POST /contacts/{id}/relations`
pub async fn relate<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RelateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let relationship = BusinessRelationshipForm { types: body.types }
    .create(state.store.as_ref(), id, body.to)
    .await
    .map_err(ApiError::form)?;
  Ok((StatusCode::CREATED, Json(relationship)))
}

/// `PUT /contacts/{id}/relations/{to}`
pub async fn set_relation_types<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path((id, to)): Path<(Uuid, Uuid)>,
  Json(form): Json<BusinessRelationshipForm>,
) -> Result<Json<ContactRelationship>, ApiError> {
  let relationship = form
    .save(state.store.as_ref(), id, to)
    .await
    .map_err(ApiError::form)?;
  Ok(Json(relationship))
}
