//! Project form.

use serde::Deserialize;
use uuid::Uuid;

use super::{
  Choice, FormError, INVALID_CHOICE, REQUIRED, ValidationErrors, max_length,
  optional_text, required_text,
};
use crate::{
  contact::Contact,
  project::{NewProject, Project, ProjectStatus, ProjectType},
  store::CrmStore,
};

const NAME_MAX_LEN: usize = 255;

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectForm {
  pub name:             String,
  /// Ignored when the form is bound to a business.
  #[serde(default)]
  pub business:         Option<Uuid>,
  #[serde(default)]
  pub trac_environment: Option<String>,
  #[serde(default)]
  pub point_person:     Option<Uuid>,
  #[serde(rename = "type", default)]
  pub kind:             Option<ProjectType>,
  #[serde(default)]
  pub status:           Option<ProjectStatus>,
  #[serde(default)]
  pub description:      String,
}

impl ProjectForm {
  /// Selectable owners when the form is not bound to a business.
  pub async fn business_choices<S: CrmStore>(store: &S) -> Result<Vec<Choice>, S::Error> {
    Ok(
      store
        .client_businesses()
        .await?
        .into_iter()
        .map(|c| Choice { value: c.contact_id, label: c.display_name() })
        .collect(),
    )
  }

  /// Staff users only.
  pub async fn point_person_choices<S: CrmStore>(store: &S) -> Result<Vec<Choice>, S::Error> {
    Ok(
      store
        .list_users()
        .await?
        .into_iter()
        .filter(|u| u.is_staff)
        .map(|u| Choice { value: u.user_id, label: u.full_name() })
        .collect(),
    )
  }

  /// Validate and create. With `business` set the `business` field is
  /// dropped and the project is owned by that contact.
  pub async fn save<S: CrmStore>(
    self,
    store: &S,
    business: Option<&Contact>,
  ) -> Result<Project, FormError<S::Error>> {
    let mut errors = ValidationErrors::new();

    let name = required_text(&mut errors, "name", &self.name);
    max_length(&mut errors, "name", &name, NAME_MAX_LEN);
    let description = required_text(&mut errors, "description", &self.description);

    let business_id = match (business, self.business) {
      (Some(bound), _) => Some(bound.contact_id),
      (None, None) => {
        errors.add("business", REQUIRED);
        None
      }
      (None, Some(id)) => {
        let clients = store.client_businesses().await.map_err(FormError::Store)?;
        if clients.iter().any(|c| c.contact_id == id) {
          Some(id)
        } else {
          errors.add("business", INVALID_CHOICE);
          None
        }
      }
    };

    let point_person_id = match self.point_person {
      None => {
        errors.add("point_person", REQUIRED);
        None
      }
      Some(id) => {
        let user = store.get_user(id).await.map_err(FormError::Store)?;
        if user.is_some_and(|u| u.is_staff) {
          Some(id)
        } else {
          errors.add("point_person", INVALID_CHOICE);
          None
        }
      }
    };

    if self.kind.is_none() {
      errors.add("type", REQUIRED);
    }
    if self.status.is_none() {
      errors.add("status", REQUIRED);
    }

    let (Some(business_id), Some(point_person_id), Some(kind), Some(status)) =
      (business_id, point_person_id, self.kind, self.status)
    else {
      return Err(errors.into());
    };
    errors.check()?;

    let project = store
      .create_project(NewProject {
        name,
        trac_environment: optional_text(self.trac_environment),
        business_id,
        point_person_id,
        kind,
        status,
        description,
      })
      .await
      .map_err(FormError::Store)?;

    tracing::debug!(project_id = %project.project_id, "project created");
    Ok(project)
  }
}
