//! Handlers for the lookup tables.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/business-types` | |
//! | `POST` | `/business-types` | Body: `{"name", "can_view_all_projects"}` |
//! | `GET`  | `/relationship-types` | |
//! | `POST` | `/relationship-types` | Body: `{"name"}`; slug derived from the name |
//! | `PUT`  | `/relationship-types/{id}` | Rename; the slug is re-derived |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rolo_core::{
  contact::{BusinessType, NewBusinessType},
  forms::{REQUIRED, ValidationErrors},
  relationship::{RelationshipType, SaveRelationshipType},
  store::CrmStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

fn require_name(name: &str) -> Result<String, ApiError> {
  let name = name.trim();
  if name.is_empty() {
    let mut errors = ValidationErrors::new();
    errors.add("name", REQUIRED);
    return Err(errors.into());
  }
  Ok(name.to_owned())
}

// ─── Business types ───────────────────────────────────────────────────────────

/// `GET /business-types`
pub async fn list_business_types<S: CrmStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<BusinessType>>, ApiError> {
  let types = state.store.list_business_types().await.map_err(ApiError::store)?;
  Ok(Json(types))
}

/// `POST /business-types`
pub async fn create_business_type<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewBusinessType>,
) -> Result<impl IntoResponse, ApiError> {
  let input = NewBusinessType { name: require_name(&body.name)?, ..body };
  let created = state
    .store
    .create_business_type(input)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(created)))
}

// ─── Relationship types ───────────────────────────────────────────────────────

/// `GET /relationship-types`
pub async fn list_relationship_types<S: CrmStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<RelationshipType>>, ApiError> {
  let types = state
    .store
    .list_relationship_types()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(types))
}

#[derive(Debug, Deserialize)]
pub struct NameBody {
  pub name: String,
}

/// `POST /relationship-types`
pub async fn create_relationship_type<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, ApiError> {
  let saved = state
    .store
    .save_relationship_type(SaveRelationshipType { id: None, name: require_name(&body.name)? })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(saved)))
}

/// `PUT /relationship-types/{id}`
pub async fn rename_relationship_type<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<NameBody>,
) -> Result<Json<RelationshipType>, ApiError> {
  let saved = state
    .store
    .save_relationship_type(SaveRelationshipType { id: Some(id), name: require_name(&body.name)? })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(saved))
}
