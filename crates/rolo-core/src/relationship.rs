//! Typed relationships between contacts, and between contacts and projects.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tag describing how two parties relate, e.g. "Employee" or "Billing
/// contact". The slug is re-derived from the name on every save and is unique
/// across all relationship types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipType {
  pub relationship_type_id: Uuid,
  pub name:                 String,
  pub slug:                 String,
}

impl fmt::Display for RelationshipType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}

/// Input to [`crate::store::CrmStore::save_relationship_type`]. An `id` of
/// `None` inserts; `Some` renames the existing row.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveRelationshipType {
  #[serde(default)]
  pub id:   Option<Uuid>,
  pub name: String,
}

/// Directed link from one contact to another. At most one exists per
/// `(from_contact, to_contact)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRelationship {
  pub relationship_id: Uuid,
  pub from_contact:    Uuid,
  pub to_contact:      Uuid,
  /// Relationship type ids.
  pub types:           Vec<Uuid>,
}

/// Membership of a contact in a project. At most one exists per
/// `(contact, project)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRelationship {
  pub relationship_id: Uuid,
  pub contact_id:      Uuid,
  pub project_id:      Uuid,
  pub types:           Vec<Uuid>,
}
