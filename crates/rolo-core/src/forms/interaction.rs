//! Interaction form and its project choice rules.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::{FormError, INVALID_CHOICE, REQUIRED, ValidationErrors};
use crate::{
  contact::{Contact, ContactKind},
  interaction::{Interaction, InteractionType, NewInteraction},
  project::{Project, ProjectQuery},
  store::CrmStore,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionForm {
  /// Defaults to the time of saving.
  #[serde(default)]
  pub date:      Option<DateTime<Utc>>,
  #[serde(rename = "type", default)]
  pub kind:      Option<InteractionType>,
  #[serde(default)]
  pub completed: bool,
  #[serde(default)]
  pub contacts:  Vec<Uuid>,
  #[serde(default)]
  pub project:   Option<Uuid>,
  #[serde(default)]
  pub memo:      String,
}

/// Who is logging the interaction, and about whom.
#[derive(Debug, Clone, Default)]
pub struct InteractionContext {
  /// The contact whose page the interaction is logged from.
  pub person:   Option<Contact>,
  /// The signed-in CRM user's own contact.
  pub crm_user: Option<Contact>,
  /// The interaction being edited; `None` when logging a new one.
  pub instance: Option<Interaction>,
}

impl InteractionContext {
  /// Contacts preselected when the form is first shown.
  pub fn initial_contacts(&self) -> Vec<Uuid> {
    match &self.instance {
      Some(instance) => instance.contacts.clone(),
      None => self.default_contacts(),
    }
  }

  fn default_contacts(&self) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for contact in [&self.person, &self.crm_user].into_iter().flatten() {
      if !ids.contains(&contact.contact_id) {
        ids.push(contact.contact_id);
      }
    }
    ids
  }

  /// Projects the interaction may be filed under.
  ///
  /// New interactions logged from a person's page offer that person's
  /// projects. Existing interactions offer the projects of their client
  /// contacts. Anything else offers nothing.
  pub async fn project_choices<S: CrmStore>(&self, store: &S) -> Result<Vec<Project>, S::Error> {
    match (&self.instance, &self.person) {
      (Some(instance), _) => {
        let clients = client_contacts(store, &instance.contacts).await?;
        if clients.is_empty() {
          return Ok(Vec::new());
        }
        store.projects_for_contacts(clients).await
      }
      (None, Some(person)) => {
        store
          .list_projects(ProjectQuery {
            contact_id: Some(person.contact_id),
            ..ProjectQuery::default()
          })
          .await
      }
      (None, None) => Ok(Vec::new()),
    }
  }
}

/// The subset of `contact_ids` that are client businesses, or are related to
/// one.
pub async fn client_contacts<S: CrmStore>(
  store: &S,
  contact_ids: &[Uuid],
) -> Result<Vec<Uuid>, S::Error> {
  let client_types: Vec<Uuid> = store
    .list_business_types()
    .await?
    .into_iter()
    .filter(|bt| bt.is_client())
    .map(|bt| bt.business_type_id)
    .collect();
  if client_types.is_empty() {
    return Ok(Vec::new());
  }
  let is_client = |c: &Contact| {
    c.kind == ContactKind::Business
      && client_types.iter().any(|id| c.has_business_type(*id))
  };

  let mut clients = Vec::new();
  for &id in contact_ids {
    let Some(contact) = store.get_contact(id).await? else {
      continue;
    };
    let related_to_client = if is_client(&contact) {
      true
    } else {
      store
        .related_contacts(id, Some(ContactKind::Business))
        .await?
        .iter()
        .any(is_client)
    };
    if related_to_client && !clients.contains(&id) {
      clients.push(id);
    }
  }
  Ok(clients)
}

impl InteractionForm {
  /// Validate and persist against `ctx`. New interactions always include
  /// the context person and CRM user among their contacts.
  pub async fn save<S: CrmStore>(
    self,
    store: &S,
    ctx: &InteractionContext,
    now: DateTime<Utc>,
  ) -> Result<Interaction, FormError<S::Error>> {
    let mut errors = ValidationErrors::new();

    if self.kind.is_none() {
      errors.add("type", REQUIRED);
    }

    let mut contacts = Vec::with_capacity(self.contacts.len() + 2);
    for id in self.contacts {
      if contacts.contains(&id) {
        continue;
      }
      if store.get_contact(id).await.map_err(FormError::Store)?.is_some() {
        contacts.push(id);
      } else {
        errors.add(
          "contacts",
          format!("Select a valid choice. {id} is not one of the available choices."),
        );
      }
    }
    if ctx.instance.is_none() {
      for id in ctx.default_contacts() {
        if !contacts.contains(&id) {
          contacts.push(id);
        }
      }
    }
    if contacts.is_empty() && !errors.contains("contacts") {
      errors.add("contacts", REQUIRED);
    }

    if let Some(project_id) = self.project {
      let choices = ctx.project_choices(store).await.map_err(FormError::Store)?;
      if !choices.iter().any(|p| p.project_id == project_id) {
        errors.add("project", INVALID_CHOICE);
      }
    }

    let Some(kind) = self.kind else {
      return Err(errors.into());
    };
    errors.check()?;

    let date = self.date.unwrap_or(now);
    let memo = self.memo.trim().to_owned();

    let saved = match &ctx.instance {
      Some(instance) => {
        store
          .update_interaction(Interaction {
            date,
            kind,
            completed: self.completed,
            project_id: self.project,
            memo,
            contacts,
            ..instance.clone()
          })
          .await
      }
      None => {
        store
          .create_interaction(NewInteraction {
            date,
            kind,
            completed: self.completed,
            project_id: self.project,
            memo,
            cdr_id: None,
            contacts,
          })
          .await
      }
    };
    saved.map_err(FormError::Store)
  }
}
