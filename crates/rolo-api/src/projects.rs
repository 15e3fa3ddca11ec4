//! Handlers for `/projects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/projects` | Optional `?business_id=`, `?contact_id=` |
//! | `POST` | `/projects` | Optional `?business_id=` binds the owning business |
//! | `GET`  | `/projects/choices` | Selectable businesses and point people |
//! | `GET`  | `/projects/{id}` | 404 if not found |
//! | `GET`  | `/projects/{id}/contacts` | Member contacts |
//! | `POST` | `/projects/{id}/contacts` | Body: `{"contact": uuid, "types": [uuid]}`; 409 on duplicate |
//! | `PUT`  | `/projects/{id}/contacts/{contact}` | Body: `{"types": [uuid]}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use rolo_core::{
  contact::Contact,
  forms::{Choice, project::ProjectForm, relationship::ProjectRelationshipForm},
  project::{Project, ProjectQuery},
  relationship::ProjectRelationship,
  store::CrmStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, contacts::load_contact, error::ApiError};

/// A project with its rendered trac link.
#[derive(Debug, Serialize)]
pub struct ProjectView {
  #[serde(flatten)]
  pub project:  Project,
  pub trac_url: Option<String>,
}

impl ProjectView {
  fn new(project: Project, template: Option<&str>) -> Self {
    let trac_url = project.trac_url(template);
    Self { project, trac_url }
  }
}

async fn load_project<S: CrmStore>(store: &S, id: Uuid) -> Result<Project, ApiError> {
  store
    .get_project(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("project {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub business_id: Option<Uuid>,
  pub contact_id:  Option<Uuid>,
}

/// `GET /projects[?business_id=<uuid>][&contact_id=<uuid>]`
pub async fn list<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ProjectView>>, ApiError> {
  let projects = state
    .store
    .list_projects(ProjectQuery {
      business_id: params.business_id,
      contact_id:  params.contact_id,
    })
    .await
    .map_err(ApiError::store)?;
  let template = state.settings.trac_url.as_deref();
  Ok(Json(
    projects
      .into_iter()
      .map(|p| ProjectView::new(p, template))
      .collect(),
  ))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateParams {
  pub business_id: Option<Uuid>,
}

/// `POST /projects[?business_id=<uuid>]`
pub async fn create<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<CreateParams>,
  Json(form): Json<ProjectForm>,
) -> Result<impl IntoResponse, ApiError> {
  let store = state.store.as_ref();
  let business = match params.business_id {
    Some(id) => Some(load_contact(store, id).await?),
    None => None,
  };
  let project = form
    .save(store, business.as_ref())
    .await
    .map_err(ApiError::form)?;
  let view = ProjectView::new(project, state.settings.trac_url.as_deref());
  Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Debug, Serialize)]
pub struct ProjectChoices {
  pub business:     Vec<Choice>,
  pub point_person: Vec<Choice>,
}

/// `GET /projects/choices`
pub async fn choices<S: CrmStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<ProjectChoices>, ApiError> {
  let store = state.store.as_ref();
  Ok(Json(ProjectChoices {
    business:     ProjectForm::business_choices(store).await.map_err(ApiError::store)?,
    point_person: ProjectForm::point_person_choices(store)
      .await
      .map_err(ApiError::store)?,
  }))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /projects/{id}`
pub async fn get_one<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ProjectView>, ApiError> {
  let project = load_project(state.store.as_ref(), id).await?;
  Ok(Json(ProjectView::new(project, state.settings.trac_url.as_deref())))
}

// ─── Members ──────────────────────────────────────────────────────────────────

/// `GET /projects/{id}/contacts`
pub async fn members<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Contact>>, ApiError> {
  load_project(state.store.as_ref(), id).await?;
  let contacts = state.store.project_contacts(id).await.map_err(ApiError::store)?;
  Ok(Json(contacts))
}

#[derive(Debug, Deserialize)]
pub struct AddMemberBody {
  pub contact: Uuid,
  #[serde(default)]
  pub types:   Vec<Uuid>,
}

/// `POST /projects/{id}/contacts`
pub async fn add_member<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AddMemberBody>,
) -> Result<impl IntoResponse, ApiError> {
  let store = state.store.as_ref();
  load_project(store, id).await?;
  let membership = ProjectRelationshipForm { types: body.types }
    .create(store, id, body.contact)
    .await
    .map_err(ApiError::form)?;
  Ok((StatusCode::CREATED, Json(membership)))
}

/// `PUT /projects/{id}/contacts/{contact}`
pub async fn set_member_types<S: CrmStore>(
  State(state): State<ApiState<S>>,
  Path((id, contact)): Path<(Uuid, Uuid)>,
  Json(form): Json<ProjectRelationshipForm>,
) -> Result<Json<ProjectRelationship>, ApiError> {
  let membership = form
    .save(state.store.as_ref(), id, contact)
    .await
    .map_err(ApiError::form)?;
  Ok(Json(membership))
}
