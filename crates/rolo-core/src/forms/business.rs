//! Business contact form.

use serde::Deserialize;
use uuid::Uuid;

use super::{FormError, ValidationErrors, max_length, optional_text, required_text};
use crate::{
  contact::{Contact, NewContact},
  store::CrmStore,
};

const NAME_MAX_LEN: usize = 255;

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessForm {
  pub name:           String,
  #[serde(default)]
  pub description:    Option<String>,
  #[serde(default)]
  pub notes:          Option<String>,
  #[serde(default)]
  pub business_types: Vec<Uuid>,
}

impl BusinessForm {
  /// Validate and persist. `instance` is the business being edited.
  pub async fn save<S: CrmStore>(
    self,
    store: &S,
    instance: Option<Contact>,
  ) -> Result<Contact, FormError<S::Error>> {
    let mut errors = ValidationErrors::new();

    let name = required_text(&mut errors, "name", &self.name);
    max_length(&mut errors, "name", &name, NAME_MAX_LEN);

    let known = store.list_business_types().await.map_err(FormError::Store)?;
    let mut business_types = Vec::with_capacity(self.business_types.len());
    for id in self.business_types {
      if !known.iter().any(|bt| bt.business_type_id == id) {
        errors.add(
          "business_types",
          format!("Select a valid choice. {id} is not one of the available choices."),
        );
      } else if !business_types.contains(&id) {
        business_types.push(id);
      }
    }

    errors.check()?;

    let description = optional_text(self.description);
    let notes = optional_text(self.notes);

    let contact = match instance {
      Some(mut contact) => {
        contact.name = name;
        contact.description = description;
        contact.notes = notes;
        contact.business_types = business_types;
        store.update_contact(contact).await
      }
      None => {
        let mut input = NewContact::business(name);
        input.description = description;
        input.notes = notes;
        input.business_types = business_types;
        store.create_contact(input).await
      }
    };
    contact.map_err(FormError::Store)
  }
}
