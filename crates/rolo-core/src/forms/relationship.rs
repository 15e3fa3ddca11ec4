//! Forms editing the relationship type tags on contact and project links.

use serde::Deserialize;
use uuid::Uuid;

use super::{FormError, INVALID_CHOICE, ValidationErrors};
use crate::{
  relationship::{ContactRelationship, ProjectRelationship},
  store::CrmStore,
};

/// Tags on a link from one contact (usually a person) to another (usually
/// their business).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessRelationshipForm {
  #[serde(default)]
  pub types: Vec<Uuid>,
}

impl BusinessRelationshipForm {
  /// Create the `from → to` relationship with these tags.
  pub async fn create<S: CrmStore>(
    self,
    store: &S,
    from: Uuid,
    to: Uuid,
  ) -> Result<ContactRelationship, FormError<S::Error>> {
    let mut errors = ValidationErrors::new();
    if from == to {
      errors.add("to_contact", "A contact cannot be related to itself.");
    }
    for (field, id) in [("from_contact", from), ("to_contact", to)] {
      if store.get_contact(id).await.map_err(FormError::Store)?.is_none() {
        errors.add(field, INVALID_CHOICE);
      }
    }
    let types = clean_types(store, &mut errors, self.types).await?;
    errors.check()?;

    store
      .create_contact_relationship(from, to, types)
      .await
      .map_err(FormError::Store)
  }

  /// Replace the tags on the existing `from → to` relationship.
  pub async fn save<S: CrmStore>(
    self,
    store: &S,
    from: Uuid,
    to: Uuid,
  ) -> Result<ContactRelationship, FormError<S::Error>> {
    let mut errors = ValidationErrors::new();
    let types = clean_types(store, &mut errors, self.types).await?;
    errors.check()?;

    store
      .set_contact_relationship_types(from, to, types)
      .await
      .map_err(FormError::Store)
  }
}

/// Tags on a contact's membership in a project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectRelationshipForm {
  #[serde(default)]
  pub types: Vec<Uuid>,
}

impl ProjectRelationshipForm {
  /// Add `contact_id` to the project with these tags.
  pub async fn create<S: CrmStore>(
    self,
    store: &S,
    project_id: Uuid,
    contact_id: Uuid,
  ) -> Result<ProjectRelationship, FormError<S::Error>> {
    let mut errors = ValidationErrors::new();
    if store.get_contact(contact_id).await.map_err(FormError::Store)?.is_none() {
      errors.add("contact", INVALID_CHOICE);
    }
    let types = clean_types(store, &mut errors, self.types).await?;
    errors.check()?;

    store
      .add_project_contact(project_id, contact_id, types)
      .await
      .map_err(FormError::Store)
  }

  pub async fn save<S: CrmStore>(
    self,
    store: &S,
    project_id: Uuid,
    contact_id: Uuid,
  ) -> Result<ProjectRelationship, FormError<S::Error>> {
    let mut errors = ValidationErrors::new();
    let types = clean_types(store, &mut errors, self.types).await?;
    errors.check()?;

    store
      .set_project_relationship_types(project_id, contact_id, types)
      .await
      .map_err(FormError::Store)
  }
}

/// Deduplicated tags; unknown ids are recorded against `types`.
async fn clean_types<S: CrmStore>(
  store: &S,
  errors: &mut ValidationErrors,
  requested: Vec<Uuid>,
) -> Result<Vec<Uuid>, FormError<S::Error>> {
  if requested.is_empty() {
    return Ok(requested);
  }
  let known = store.list_relationship_types().await.map_err(FormError::Store)?;

  let mut types = Vec::with_capacity(requested.len());
  for id in requested {
    if !known.iter().any(|rt| rt.relationship_type_id == id) {
      errors.add(
        "types",
        format!("Select a valid choice. {id} is not one of the available choices."),
      );
    } else if !types.contains(&id) {
      types.push(id);
    }
  }
  Ok(types)
}
