//! Person, profile and search forms.

use serde::Deserialize;
use uuid::Uuid;

use super::{
  FormError, INVALID_EMAIL, ValidationErrors, is_valid_email, max_length,
  optional_text, required_text,
};
use crate::{
  contact::{Contact, ContactKind, ContactQuery, NewContact, ProfileUpdate},
  store::CrmStore,
};

pub const EMAIL_TAKEN: &str = "A user with that e-mail address already exists.";

const NAME_MAX_LEN: usize = 50;

// ─── PersonForm ──────────────────────────────────────────────────────────────

/// Signup / edit form for an individual.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonForm {
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
}

impl PersonForm {
  /// Validate and persist. `instance` is the contact being edited, `None`
  /// for signup.
  pub async fn save<S: CrmStore>(
    self,
    store: &S,
    instance: Option<Contact>,
  ) -> Result<Contact, FormError<S::Error>> {
    let mut errors = ValidationErrors::new();

    let first_name = required_text(&mut errors, "first_name", &self.first_name);
    max_length(&mut errors, "first_name", &first_name, NAME_MAX_LEN);
    let last_name = required_text(&mut errors, "last_name", &self.last_name);
    max_length(&mut errors, "last_name", &last_name, NAME_MAX_LEN);
    let email = clean_email(store, &mut errors, &self.email, instance.is_none()).await?;

    errors.check()?;

    let contact = match instance {
      Some(mut contact) => {
        contact.first_name = first_name;
        contact.last_name = last_name;
        contact.email = email;
        store.update_contact(contact).await
      }
      None => {
        let mut input = NewContact::individual(first_name, last_name);
        input.email = email;
        store.create_contact(input).await
      }
    };
    contact.map_err(FormError::Store)
  }
}

/// Signup rejects an address that already belongs to a login account.
async fn clean_email<S: CrmStore>(
  store: &S,
  errors: &mut ValidationErrors,
  raw: &str,
  creating: bool,
) -> Result<String, FormError<S::Error>> {
  let email = required_text(errors, "email", raw);
  if email.is_empty() {
    return Ok(email);
  }
  if !is_valid_email(&email) {
    errors.add("email", INVALID_EMAIL);
    return Ok(email);
  }
  if creating
    && store
      .find_user_by_email(email.clone())
      .await
      .map_err(FormError::Store)?
      .is_some()
  {
    errors.add("email", EMAIL_TAKEN);
  }
  Ok(email)
}

// ─── ProfileForm ─────────────────────────────────────────────────────────────

/// Notes and picture on the signed-in user's own contact.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
  #[serde(default)]
  pub notes:   Option<String>,
  #[serde(default)]
  pub picture: Option<String>,
}

impl ProfileForm {
  pub async fn save<S: CrmStore>(
    self,
    store: &S,
    user_id: Uuid,
  ) -> Result<Contact, FormError<S::Error>> {
    let update = ProfileUpdate {
      notes:   optional_text(self.notes),
      picture: optional_text(self.picture),
    };
    store.save_profile(user_id, update).await.map_err(FormError::Store)
  }
}

// ─── SearchForm ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchForm {
  #[serde(default)]
  pub search: Option<String>,
}

impl SearchForm {
  pub fn query(self, kind: Option<ContactKind>) -> ContactQuery {
    ContactQuery { search: optional_text(self.search), kind }
  }
}
