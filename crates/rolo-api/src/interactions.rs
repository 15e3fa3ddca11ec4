//! Handlers for `/interactions` endpoints.
//!
//! The form context travels in the query string: `person_id` is the contact
//! the interaction is logged from, `user_id` the acting CRM user.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/interactions` | Newest first; optional `?contact_id=` |
//! | `POST` | `/interactions` | Optional `?person_id=`, `?user_id=` |
//! | `GET`  | `/interactions/project-choices` | `?person_id=` or `?interaction_id=` |
//! | `GET`  | `/interactions/{id}` | 404 if not found |
//! | `PUT`  | `/interactions/{id}` | Edit; project choices come from its client contacts |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use rolo_core::{
  forms::interaction::{InteractionContext, InteractionForm},
  interaction::Interaction,
  project::Project,
  store::CrmStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, contacts::load_contact, error::ApiError};

async fn load_interaction<S: CrmStore>(store: &S, id: Uuid) -> Result<Interaction, ApiError> {
  store
    .get_interaction(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("interaction {id} not found")))
}

#[derive(Debug, Default, Deserialize)]
pub struct ContextParams {
  pub person_id:      Option<Uuid>,
  pub user_id:        Option<Uuid>,
  pub interaction_id: Option<Uuid>,
}

impl ContextParams {
  async fn resolve<S: CrmStore>(
    &self,
    store: &S,
    instance: Option<Interaction>,
  ) -> Result<InteractionContext, ApiError> {
    let person = match self.person_id {
      Some(id) => Some(load_contact(store, id).await?),
      None => None,
    };
    let crm_user = match self.user_id {
      Some(id) => store.find_contact_by_user(id).await.map_err(ApiError::store)?,
      None => None,
    };
    Ok(InteractionContext { person, crm_user, instance })
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub contact_id: Option<Uuid>,
}

/// `GET /interactions[?contact_id=<uuid>]`
pub async fn list<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Interaction>>, ApiError> {
  let interactions = state
    .store
    .list_interactions(params.contact_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(interactions))
}

// ─── Create / update ──────────────────────────────────────────────────────────

/// `POST /interactions[?person_id=<uuid>][&user_id=<uuid>]`
pub async fn create<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ContextParams>,
  Json(form): Json<InteractionForm>,
) -> Result<impl IntoResponse, ApiError> {
  let store = state.store.as_ref();
  let ctx = params.resolve(store, None).await?;
  let interaction = form
    .save(store, &ctx, Utc::now())
    .await
    .map_err(ApiError::form)?;
  tracing::debug!(interaction_id = %interaction.interaction_id, "interaction logged");
  Ok((StatusCode::CREATED, Json(interaction)))
}

/// `PUT /interactions/{id}`
pub async fn update<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<ContextParams>,
  Json(form): Json<InteractionForm>,
) -> Result<Json<Interaction>, ApiError> {
  let store = state.store.as_ref();
  let instance = load_interaction(store, id).await?;
  let ctx = params.resolve(store, Some(instance)).await?;
  let interaction = form
    .save(store, &ctx, Utc::now())
    .await
    .map_err(ApiError::form)?;
  Ok(Json(interaction))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /interactions/{id}`
pub async fn get_one<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Interaction>, ApiError> {
  Ok(Json(load_interaction(state.store.as_ref(), id).await?))
}

// ─── Project choices ──────────────────────────────────────────────────────────

/// `GET /interactions/project-choices[?person_id=<uuid>][&interaction_id=<uuid>]`
pub async fn project_choices<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ContextParams>,
) -> Result<Json<Vec<Project>>, ApiError> {
  let store = state.store.as_ref();
  let instance = match params.interaction_id {
    Some(id) => Some(load_interaction(store, id).await?),
    None => None,
  };
  let ctx = params.resolve(store, instance).await?;
  let projects = ctx.project_choices(store).await.map_err(ApiError::store)?;
  Ok(Json(projects))
}
