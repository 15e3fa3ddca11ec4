//! Contacts: the people and businesses tracked by the CRM.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Permissions that together allow editing any contact.
pub const EDIT_CONTACT_PERMISSIONS: [&str; 2] =
  ["crm.add_contact", "crm.change_contact"];

/// Name of the business type that marks a business as a client.
pub const CLIENT_BUSINESS_TYPE: &str = "client";

// ─── Kind ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
  Individual,
  Business,
}

impl ContactKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Individual => "individual",
      Self::Business => "business",
    }
  }
}

impl FromStr for ContactKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "individual" => Ok(Self::Individual),
      "business" => Ok(Self::Business),
      other => Err(Error::unknown("contact kind", other)),
    }
  }
}

// ─── Locations ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
  Office,
  Home,
  Mobile,
  Other,
}

impl LocationKind {
  /// Human-readable label used in text exports.
  pub fn label(self) -> &'static str {
    match self {
      Self::Office => "Office",
      Self::Home => "Home",
      Self::Mobile => "Mobile",
      Self::Other => "Other",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneKind {
  Office,
  Mobile,
  Home,
  Fax,
  Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
  pub kind:   PhoneKind,
  pub number: String,
}

impl fmt::Display for Phone {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.number)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
  pub street:      Option<String>,
  pub locality:    Option<String>,
  pub region:      Option<String>,
  pub postal_code: Option<String>,
  pub country:     Option<String>,
}

impl Address {
  /// Render the address on a single line, skipping empty parts.
  pub fn one_line(&self) -> String {
    [
      &self.street,
      &self.locality,
      &self.region,
      &self.postal_code,
      &self.country,
    ]
    .into_iter()
    .filter_map(|part| part.as_deref())
    .map(|part| part.replace('\n', " "))
    .filter(|part| !part.trim().is_empty())
    .collect::<Vec<_>>()
    .join(" ")
  }
}

/// A place a contact can be reached, with its phones and postal addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
  pub kind:      LocationKind,
  #[serde(default)]
  pub phones:    Vec<Phone>,
  #[serde(default)]
  pub addresses: Vec<Address>,
}

// ─── Contact ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
  pub contact_id:     Uuid,
  pub kind:           ContactKind,
  /// The login account linked to this contact, once activated.
  pub user_id:        Option<Uuid>,
  pub name:           String,
  pub first_name:     String,
  pub middle_name:    String,
  pub last_name:      String,
  pub sort_name:      String,
  pub slug:           String,
  pub email:          String,
  pub description:    Option<String>,
  pub notes:          Option<String>,
  /// Path of the uploaded profile picture.
  pub picture:        Option<String>,
  pub business_types: Vec<Uuid>,
  pub locations:      Vec<Location>,
  pub created_at:     DateTime<Utc>,
}

impl Contact {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }

  /// The business name when set, otherwise the person's full name.
  pub fn display_name(&self) -> String {
    if self.name.is_empty() {
      self.full_name()
    } else {
      self.name.clone()
    }
  }

  /// First phone found by kind preference: office, then mobile, then home.
  pub fn primary_phone(&self) -> Option<&Phone> {
    [PhoneKind::Office, PhoneKind::Mobile, PhoneKind::Home]
      .into_iter()
      .find_map(|kind| {
        self
          .locations
          .iter()
          .flat_map(|location| location.phones.iter())
          .find(|phone| phone.kind == kind)
      })
  }

  /// Plain-text export lines. Businesses export nothing.
  pub fn as_text_block(&self) -> Vec<String> {
    if self.kind != ContactKind::Individual {
      return Vec::new();
    }

    let mut fields = vec![
      format!("First Name: {}\n", self.first_name),
      format!("Middle Name: {}\n", self.middle_name),
      format!("Last Name: {}\n", self.last_name),
      format!("Email: {}\n", self.email),
    ];
    for location in &self.locations {
      let label = location.kind.label();
      for phone in &location.phones {
        fields.push(format!("{label} Phone: {phone}\n"));
      }
      for address in &location.addresses {
        fields.push(format!("{label} Address: {}\n", address.one_line()));
      }
    }
    fields
  }

  /// Whether `user` may edit this contact, given the user's resolved
  /// `app_label.codename` permissions.
  pub fn is_editable_by(&self, user_id: Uuid, permissions: &[String]) -> bool {
    let has_perms = EDIT_CONTACT_PERMISSIONS
      .iter()
      .all(|needed| permissions.iter().any(|p| p == needed));
    has_perms || self.user_id == Some(user_id)
  }

  pub fn has_business_type(&self, business_type_id: Uuid) -> bool {
    self.business_types.contains(&business_type_id)
  }

  /// The sort name implied by the current name fields.
  pub fn derived_sort_name(&self) -> String {
    collation_key(self.kind, &self.name, &self.first_name, &self.last_name)
  }
}

impl fmt::Display for Contact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.display_name())
  }
}

/// Input to [`crate::store::CrmStore::create_contact`].
///
/// When `slug` is `None` the store derives a unique one from the display
/// name; an explicit slug that is already taken is a conflict.
#[derive(Debug, Clone)]
pub struct NewContact {
  pub kind:           ContactKind,
  pub name:           String,
  pub first_name:     String,
  pub middle_name:    String,
  pub last_name:      String,
  pub slug:           Option<String>,
  pub email:          String,
  pub description:    Option<String>,
  pub notes:          Option<String>,
  pub picture:        Option<String>,
  pub business_types: Vec<Uuid>,
  pub locations:      Vec<Location>,
}

impl NewContact {
  pub fn individual(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
    Self {
      first_name: first_name.into(),
      last_name: last_name.into(),
      ..Self::blank(ContactKind::Individual)
    }
  }

  pub fn business(name: impl Into<String>) -> Self {
    Self { name: name.into(), ..Self::blank(ContactKind::Business) }
  }

  fn blank(kind: ContactKind) -> Self {
    Self {
      kind,
      name: String::new(),
      first_name: String::new(),
      middle_name: String::new(),
      last_name: String::new(),
      slug: None,
      email: String::new(),
      description: None,
      notes: None,
      picture: None,
      business_types: Vec::new(),
      locations: Vec::new(),
    }
  }

  pub fn display_name(&self) -> String {
    if self.name.is_empty() {
      format!("{} {}", self.first_name, self.last_name)
    } else {
      self.name.clone()
    }
  }

  /// Collation key: "Last, First" for people, the name for businesses.
  pub fn sort_name(&self) -> String {
    collation_key(self.kind, &self.name, &self.first_name, &self.last_name)
  }
}

fn collation_key(kind: ContactKind, name: &str, first_name: &str, last_name: &str) -> String {
  match kind {
    ContactKind::Business => name.to_owned(),
    ContactKind::Individual if first_name.is_empty() => last_name.to_owned(),
    ContactKind::Individual => format!("{last_name}, {first_name}"),
  }
}

/// Input to [`crate::store::CrmStore::save_profile`].
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
  pub notes:   Option<String>,
  pub picture: Option<String>,
}

/// Filter for [`crate::store::CrmStore::list_contacts`].
#[derive(Debug, Clone, Default)]
pub struct ContactQuery {
  /// Case-insensitive substring over names, slug and email.
  pub search: Option<String>,
  pub kind:   Option<ContactKind>,
}

// ─── Business types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessType {
  pub business_type_id:      Uuid,
  pub name:                  String,
  pub slug:                  String,
  /// Lets expenses for businesses of this type be billed to any project.
  pub can_view_all_projects: bool,
}

impl BusinessType {
  pub fn is_client(&self) -> bool {
    self.name.eq_ignore_ascii_case(CLIENT_BUSINESS_TYPE)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBusinessType {
  pub name:                  String,
  #[serde(default)]
  pub can_view_all_projects: bool,
}
