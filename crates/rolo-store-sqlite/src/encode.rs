//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so that text
//! ordering matches chronological ordering. Contact locations are stored as
//! compact JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use rolo_core::{
  account::{Group, Permission, User},
  contact::{BusinessType, Contact, Location},
  interaction::Interaction,
  project::Project,
  registration::LoginRegistration,
  relationship::{ContactRelationship, ProjectRelationship, RelationshipType},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_uuids(ids: &[String]) -> Result<Vec<Uuid>> {
  ids.iter().map(|s| decode_uuid(s)).collect()
}

pub fn encode_uuids(ids: &[Uuid]) -> Vec<String> {
  ids.iter().copied().map(encode_uuid).collect()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_locations(locations: &[Location]) -> Result<String> {
  Ok(serde_json::to_string(locations)?)
}

pub fn decode_locations(s: &str) -> Result<Vec<Location>> {
  Ok(serde_json::from_str(s)?)
}

/// Escape `%`, `_` and `\` for a `LIKE … ESCAPE '\'` pattern.
pub fn like_pattern(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('%');
  for ch in text.chars() {
    if matches!(ch, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(ch);
  }
  out.push('%');
  out
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "u.user_id, u.username, u.email, \
                                u.password_hash, u.first_name, u.last_name, \
                                u.is_staff, u.is_active, u.date_joined";

/// Raw strings read directly from a `users` row, plus its group ids.
pub struct RawUser {
  pub user_id:       String,
  pub username:      String,
  pub email:         String,
  pub password_hash: String,
  pub first_name:    String,
  pub last_name:     String,
  pub is_staff:      bool,
  pub is_active:     bool,
  pub date_joined:   String,
  pub groups:        Vec<String>,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      username:      row.get(1)?,
      email:         row.get(2)?,
      password_hash: row.get(3)?,
      first_name:    row.get(4)?,
      last_name:     row.get(5)?,
      is_staff:      row.get(6)?,
      is_active:     row.get(7)?,
      date_joined:   row.get(8)?,
      groups:        Vec::new(),
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       decode_uuid(&self.user_id)?,
      username:      self.username,
      email:         self.email,
      password_hash: self.password_hash,
      first_name:    self.first_name,
      last_name:     self.last_name,
      is_staff:      self.is_staff,
      is_active:     self.is_active,
      groups:        decode_uuids(&self.groups)?,
      date_joined:   decode_dt(&self.date_joined)?,
    })
  }
}

pub struct RawGroup {
  pub group_id:    String,
  pub name:        String,
  pub permissions: Vec<String>,
}

impl RawGroup {
  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      group_id:    decode_uuid(&self.group_id)?,
      name:        self.name,
      permissions: decode_uuids(&self.permissions)?,
    })
  }
}

pub struct RawPermission {
  pub permission_id: String,
  pub app_label:     String,
  pub codename:      String,
  pub name:          String,
}

impl RawPermission {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      permission_id: row.get(0)?,
      app_label:     row.get(1)?,
      codename:      row.get(2)?,
      name:          row.get(3)?,
    })
  }

  pub fn into_permission(self) -> Result<Permission> {
    Ok(Permission {
      permission_id: decode_uuid(&self.permission_id)?,
      app_label:     self.app_label,
      codename:      self.codename,
      name:          self.name,
    })
  }
}

pub struct RawBusinessType {
  pub business_type_id:      String,
  pub name:                  String,
  pub slug:                  String,
  pub can_view_all_projects: bool,
}

impl RawBusinessType {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      business_type_id:      row.get(0)?,
      name:                  row.get(1)?,
      slug:                  row.get(2)?,
      can_view_all_projects: row.get(3)?,
    })
  }

  pub fn into_business_type(self) -> Result<BusinessType> {
    Ok(BusinessType {
      business_type_id:      decode_uuid(&self.business_type_id)?,
      name:                  self.name,
      slug:                  self.slug,
      can_view_all_projects: self.can_view_all_projects,
    })
  }
}

pub struct RawRelationshipType {
  pub relationship_type_id: String,
  pub name:                 String,
  pub slug:                 String,
}

impl RawRelationshipType {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      relationship_type_id: row.get(0)?,
      name:                 row.get(1)?,
      slug:                 row.get(2)?,
    })
  }

  pub fn into_relationship_type(self) -> Result<RelationshipType> {
    Ok(RelationshipType {
      relationship_type_id: decode_uuid(&self.relationship_type_id)?,
      name:                 self.name,
      slug:                 self.slug,
    })
  }
}

pub const CONTACT_COLUMNS: &str = "c.contact_id, c.kind, c.user_id, c.name, \
                                   c.first_name, c.middle_name, c.last_name, \
                                   c.sort_name, c.slug, c.email, c.description, \
                                   c.notes, c.picture, c.locations, c.created_at";

/// Raw strings read directly from a `contacts` row, plus its business types.
pub struct RawContact {
  pub contact_id:     String,
  pub kind:           String,
  pub user_id:        Option<String>,
  pub name:           String,
  pub first_name:     String,
  pub middle_name:    String,
  pub last_name:      String,
  pub sort_name:      String,
  pub slug:           String,
  pub email:          String,
  pub description:    Option<String>,
  pub notes:          Option<String>,
  pub picture:        Option<String>,
  pub locations:      String,
  pub created_at:     String,
  pub business_types: Vec<String>,
}

impl RawContact {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contact_id:     row.get(0)?,
      kind:           row.get(1)?,
      user_id:        row.get(2)?,
      name:           row.get(3)?,
      first_name:     row.get(4)?,
      middle_name:    row.get(5)?,
      last_name:      row.get(6)?,
      sort_name:      row.get(7)?,
      slug:           row.get(8)?,
      email:          row.get(9)?,
      description:    row.get(10)?,
      notes:          row.get(11)?,
      picture:        row.get(12)?,
      locations:      row.get(13)?,
      created_at:     row.get(14)?,
      business_types: Vec::new(),
    })
  }

  pub fn into_contact(self) -> Result<Contact> {
    Ok(Contact {
      contact_id:     decode_uuid(&self.contact_id)?,
      kind:           self.kind.parse()?,
      user_id:        self.user_id.as_deref().map(decode_uuid).transpose()?,
      name:           self.name,
      first_name:     self.first_name,
      middle_name:    self.middle_name,
      last_name:      self.last_name,
      sort_name:      self.sort_name,
      slug:           self.slug,
      email:          self.email,
      description:    self.description,
      notes:          self.notes,
      picture:        self.picture,
      business_types: decode_uuids(&self.business_types)?,
      locations:      decode_locations(&self.locations)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawContactRelationship {
  pub relationship_id: String,
  pub from_contact:    String,
  pub to_contact:      String,
  pub types:           Vec<String>,
}

impl RawContactRelationship {
  pub fn into_relationship(self) -> Result<ContactRelationship> {
    Ok(ContactRelationship {
      relationship_id: decode_uuid(&self.relationship_id)?,
      from_contact:    decode_uuid(&self.from_contact)?,
      to_contact:      decode_uuid(&self.to_contact)?,
      types:           decode_uuids(&self.types)?,
    })
  }
}

pub struct RawProjectRelationship {
  pub relationship_id: String,
  pub contact_id:      String,
  pub project_id:      String,
  pub types:           Vec<String>,
}

impl RawProjectRelationship {
  pub fn into_relationship(self) -> Result<ProjectRelationship> {
    Ok(ProjectRelationship {
      relationship_id: decode_uuid(&self.relationship_id)?,
      contact_id:      decode_uuid(&self.contact_id)?,
      project_id:      decode_uuid(&self.project_id)?,
      types:           decode_uuids(&self.types)?,
    })
  }
}

pub const PROJECT_COLUMNS: &str = "p.project_id, p.name, p.trac_environment, \
                                   p.business_id, p.point_person_id, p.kind, \
                                   p.status, p.description";

pub struct RawProject {
  pub project_id:       String,
  pub name:             String,
  pub trac_environment: Option<String>,
  pub business_id:      String,
  pub point_person_id:  String,
  pub kind:             String,
  pub status:           String,
  pub description:      String,
}

impl RawProject {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      project_id:       row.get(0)?,
      name:             row.get(1)?,
      trac_environment: row.get(2)?,
      business_id:      row.get(3)?,
      point_person_id:  row.get(4)?,
      kind:             row.get(5)?,
      status:           row.get(6)?,
      description:      row.get(7)?,
    })
  }

  pub fn into_project(self) -> Result<Project> {
    Ok(Project {
      project_id:       decode_uuid(&self.project_id)?,
      name:             self.name,
      trac_environment: self.trac_environment,
      business_id:      decode_uuid(&self.business_id)?,
      point_person_id:  decode_uuid(&self.point_person_id)?,
      kind:             self.kind.parse()?,
      status:           self.status.parse()?,
      description:      self.description,
    })
  }
}

pub const INTERACTION_COLUMNS: &str = "i.interaction_id, i.date, i.kind, \
                                       i.completed, i.project_id, i.memo, \
                                       i.cdr_id";

pub struct RawInteraction {
  pub interaction_id: String,
  pub date:           String,
  pub kind:           String,
  pub completed:      bool,
  pub project_id:     Option<String>,
  pub memo:           String,
  pub cdr_id:         Option<String>,
  pub contacts:       Vec<String>,
}

impl RawInteraction {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      interaction_id: row.get(0)?,
      date:           row.get(1)?,
      kind:           row.get(2)?,
      completed:      row.get(3)?,
      project_id:     row.get(4)?,
      memo:           row.get(5)?,
      cdr_id:         row.get(6)?,
      contacts:       Vec::new(),
    })
  }

  pub fn into_interaction(self) -> Result<Interaction> {
    Ok(Interaction {
      interaction_id: decode_uuid(&self.interaction_id)?,
      date:           decode_dt(&self.date)?,
      kind:           self.kind.parse()?,
      completed:      self.completed,
      project_id:     self.project_id.as_deref().map(decode_uuid).transpose()?,
      memo:           self.memo,
      cdr_id:         self.cdr_id,
      contacts:       decode_uuids(&self.contacts)?,
    })
  }
}

pub const REGISTRATION_COLUMNS: &str = "r.registration_id, r.contact_id, \
                                        r.date, r.activation_key, r.activated";

pub struct RawRegistration {
  pub registration_id: String,
  pub contact_id:      String,
  pub date:            String,
  pub activation_key:  String,
  pub activated:       bool,
  pub groups:          Vec<String>,
}

impl RawRegistration {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      registration_id: row.get(0)?,
      contact_id:      row.get(1)?,
      date:            row.get(2)?,
      activation_key:  row.get(3)?,
      activated:       row.get(4)?,
      groups:          Vec::new(),
    })
  }

  pub fn into_registration(self) -> Result<LoginRegistration> {
    Ok(LoginRegistration {
      registration_id: decode_uuid(&self.registration_id)?,
      contact_id:      decode_uuid(&self.contact_id)?,
      date:            decode_dt(&self.date)?,
      activation_key:  self.activation_key,
      activated:       self.activated,
      groups:          decode_uuids(&self.groups)?,
    })
  }
}
