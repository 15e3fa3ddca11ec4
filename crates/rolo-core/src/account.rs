//! Login accounts, groups and permissions.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Users ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:       Uuid,
  pub username:      String,
  pub email:         String,
  /// PHC string produced by argon2. Never serialised.
  #[serde(skip_serializing, default)]
  pub password_hash: String,
  pub first_name:    String,
  pub last_name:     String,
  pub is_staff:      bool,
  pub is_active:     bool,
  pub groups:        Vec<Uuid>,
  pub date_joined:   DateTime<Utc>,
}

impl User {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name).trim().to_owned()
  }

  pub fn check_password(&self, password: &str) -> bool {
    verify_password(password, &self.password_hash)
  }
}

/// Input to [`crate::store::CrmStore::create_user`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  pub username:      String,
  pub email:         String,
  #[serde(default)]
  pub password_hash: String,
  #[serde(default)]
  pub first_name:    String,
  #[serde(default)]
  pub last_name:     String,
  #[serde(default)]
  pub is_staff:      bool,
  #[serde(default)]
  pub is_active:     bool,
}

/// Hash `password` into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Check `password` against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
  PasswordHash::new(password_hash)
    .and_then(|parsed| {
      Argon2::default().verify_password(password.as_bytes(), &parsed)
    })
    .is_ok()
}

// ─── Groups and permissions ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
  pub group_id:    Uuid,
  pub name:        String,
  pub permissions: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
  pub permission_id: Uuid,
  pub app_label:     String,
  pub codename:      String,
  pub name:          String,
}

impl Permission {
  /// The `app_label.codename` form used in permission checks.
  pub fn qualified(&self) -> String {
    format!("{}.{}", self.app_label, self.codename)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
  pub app_label: String,
  pub codename:  String,
  pub name:      String,
}

impl NewPermission {
  pub fn new(app_label: &str, codename: &str, name: &str) -> Self {
    Self {
      app_label: app_label.to_owned(),
      codename:  codename.to_owned(),
      name:      name.to_owned(),
    }
  }
}

pub const CRM_APP: &str = "crm";
pub const AUTH_APP: &str = "auth";
pub const PAGELET_APP: &str = "pagelets";

const CRM_MODELS: [(&str, &str); 8] = [
  ("contact", "contact"),
  ("contactrelationship", "contact relationship"),
  ("businesstype", "business type"),
  ("relationshiptype", "relationship type"),
  ("project", "project"),
  ("projectrelationship", "project relationship"),
  ("interaction", "interaction"),
  ("loginregistration", "login registration"),
];

const AUTH_MODELS: [(&str, &str); 3] =
  [("user", "user"), ("group", "group"), ("permission", "permission")];

const PAGELET_MODELS: [(&str, &str); 1] = [("pagelet", "pagelet")];

const CRM_EXTRA: [(&str, &str); 4] = [
  ("view_project", "Can view project"),
  ("email_project_report", "Can email project report"),
  ("view_interaction", "Can view interaction"),
  ("view_todo_list", "Can view to do list"),
];

/// Every permission the CRM knows about: add/change/delete for each model of
/// the crm, auth and pagelet apps, plus the crm's custom permissions.
pub fn permission_catalogue() -> Vec<NewPermission> {
  let mut perms = Vec::new();
  for (app, models) in [
    (CRM_APP, &CRM_MODELS[..]),
    (AUTH_APP, &AUTH_MODELS[..]),
    (PAGELET_APP, &PAGELET_MODELS[..]),
  ] {
    for (model, verbose) in models {
      for action in ["add", "change", "delete"] {
        perms.push(NewPermission::new(
          app,
          &format!("{action}_{model}"),
          &format!("Can {action} {verbose}"),
        ));
      }
    }
  }
  perms.extend(
    CRM_EXTRA
      .iter()
      .map(|(codename, name)| NewPermission::new(CRM_APP, codename, name)),
  );
  perms
}
