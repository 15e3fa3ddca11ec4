//! Compose-an-email form.

use serde::Deserialize;
use uuid::Uuid;

use super::{Choice, FormError, INVALID_CHOICE, REQUIRED, ValidationErrors, max_length};
use crate::{
  account::User,
  mail::OutgoingEmail,
  registration::SiteSettings,
  store::CrmStore,
};

pub const MEMO_MAX_LEN: usize = 4096;

pub const UNKNOWN_RECIPIENT: &str = "Select a valid recipient.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailForm {
  #[serde(default)]
  pub to:   Option<Uuid>,
  #[serde(default)]
  pub memo: String,
}

/// Narrows the recipients to members of a project or business. A project
/// takes precedence over a business.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EmailScope {
  #[serde(default)]
  pub project_id:  Option<Uuid>,
  #[serde(default)]
  pub business_id: Option<Uuid>,
}

impl EmailScope {
  /// Users selectable as recipients, or `None` when the scope is open.
  pub async fn recipients<S: CrmStore>(&self, store: &S) -> Result<Option<Vec<User>>, S::Error> {
    if let Some(project_id) = self.project_id {
      store.users_for_project(project_id).await.map(Some)
    } else if let Some(business_id) = self.business_id {
      store.users_for_business(business_id).await.map(Some)
    } else {
      Ok(None)
    }
  }

  pub async fn choices<S: CrmStore>(&self, store: &S) -> Result<Option<Vec<Choice>>, S::Error> {
    Ok(self.recipients(store).await?.map(|users| {
      users
        .iter()
        .map(|u| Choice { value: u.user_id, label: recipient_label(u) })
        .collect()
    }))
  }
}

/// `"Full Name (email)"`.
pub fn recipient_label(user: &User) -> String {
  format!("{} ({})", user.full_name(), user.email)
}

/// A validated message.
#[derive(Debug, Clone)]
pub struct CleanedEmail {
  pub to:   User,
  pub memo: String,
}

impl CleanedEmail {
  pub fn compose(&self, site: &SiteSettings) -> OutgoingEmail {
    OutgoingEmail {
      subject: format!("Message from {}", site.name),
      body:    self.memo.clone(),
      from:    site.default_from_email.clone(),
      to:      vec![self.to.email.clone()],
    }
  }
}

impl EmailForm {
  pub async fn clean<S: CrmStore>(
    self,
    store: &S,
    scope: EmailScope,
  ) -> Result<CleanedEmail, FormError<S::Error>> {
    let mut errors = ValidationErrors::new();

    let memo = self.memo.trim().to_owned();
    if memo.is_empty() {
      errors.add("memo", REQUIRED);
    }
    max_length(&mut errors, "memo", &memo, MEMO_MAX_LEN);

    let to = match self.to {
      None => {
        errors.add("to", REQUIRED);
        None
      }
      Some(id) => match scope.recipients(store).await.map_err(FormError::Store)? {
        Some(allowed) => {
          let found = allowed.into_iter().find(|u| u.user_id == id);
          if found.is_none() {
            errors.add("to", INVALID_CHOICE);
          }
          found
        }
        None => {
          let found = store.get_user(id).await.map_err(FormError::Store)?;
          if found.is_none() {
            errors.add("to", UNKNOWN_RECIPIENT);
          }
          found
        }
      },
    };

    let Some(to) = to else {
      return Err(errors.into());
    };
    errors.check()?;
    Ok(CleanedEmail { to, memo })
  }
}
