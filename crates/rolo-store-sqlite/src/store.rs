//! [`SqliteStore`], the SQLite implementation of [`CrmStore`].

use std::{collections::HashSet, path::Path};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, params, params_from_iter};
use uuid::Uuid;

use rolo_core::{
  account::{Group, NewPermission, NewUser, Permission, User},
  contact::{
    BusinessType, CLIENT_BUSINESS_TYPE, Contact, ContactKind, ContactQuery,
    NewBusinessType, NewContact, ProfileUpdate,
  },
  interaction::{Interaction, NewInteraction},
  project::{NewProject, Project, ProjectQuery},
  registration::{Activation, LoginRegistration, NewRegistration},
  relationship::{
    ContactRelationship, ProjectRelationship, RelationshipType,
    SaveRelationshipType,
  },
  slug::{slugify, slugify_uniquely},
  store::CrmStore,
};

use crate::{
  Error, Result,
  encode::{
    CONTACT_COLUMNS, INTERACTION_COLUMNS, PROJECT_COLUMNS,
    REGISTRATION_COLUMNS, RawBusinessType, RawContact, RawContactRelationship,
    RawGroup, RawInteraction, RawPermission, RawProject,
    RawProjectRelationship, RawRegistration, RawRelationshipType, RawUser,
    USER_COLUMNS, encode_dt, encode_locations, encode_uuid, encode_uuids,
    like_pattern,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rolo CRM store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// Synchronous; they run inside `Connection::call` closures, often within a
// transaction.

/// First column of every row, as text.
fn strings(conn: &Connection, sql: &str, key: &str) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare_cached(sql)?;
  let rows = stmt
    .query_map([key], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(rows)
}

/// Replace every `(owner, item)` link row in `table` for `owner`.
fn replace_links(
  conn: &Connection,
  table: &str,
  owner_col: &str,
  item_col: &str,
  owner: &str,
  items: &[String],
) -> rusqlite::Result<()> {
  conn.execute(&format!("DELETE FROM {table} WHERE {owner_col} = ?1"), [owner])?;
  let mut stmt = conn.prepare(&format!(
    "INSERT OR IGNORE INTO {table} ({owner_col}, {item_col}) VALUES (?1, ?2)"
  ))?;
  for item in items {
    stmt.execute([owner, item.as_str()])?;
  }
  Ok(())
}

/// A slug for `text` not yet used in `table.slug_col`, ignoring the row whose
/// id is `except_id`.
fn unique_slug(
  conn: &Connection,
  table: &str,
  id_col: &str,
  slug_col: &str,
  text: &str,
  except_id: Option<&str>,
) -> rusqlite::Result<String> {
  let base = slugify(text);
  let mut stmt = conn.prepare(&format!(
    "SELECT {slug_col} FROM {table}
     WHERE ({slug_col} = ?1 OR {slug_col} LIKE ?2) AND {id_col} IS NOT ?3"
  ))?;
  let taken = stmt
    .query_map(params![base, format!("{base}-%"), except_id], |row| row.get(0))?
    .collect::<rusqlite::Result<HashSet<String>>>()?;
  Ok(slugify_uniquely(text, |candidate| taken.contains(candidate)))
}

fn load_users(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawUser>> {
  let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users u {filter}"))?;
  let mut users = stmt
    .query_map(params, RawUser::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for user in &mut users {
    user.groups = strings(
      conn,
      "SELECT group_id FROM user_groups WHERE user_id = ?1 ORDER BY group_id",
      &user.user_id,
    )?;
  }
  Ok(users)
}

fn load_group(conn: &Connection, name: &str) -> rusqlite::Result<Option<RawGroup>> {
  let Some((group_id, name)) = conn
    .query_row(
      "SELECT group_id, name FROM groups WHERE name = ?1",
      [name],
      |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )
    .optional()?
  else {
    return Ok(None);
  };
  let permissions = strings(
    conn,
    "SELECT permission_id FROM group_permissions WHERE group_id = ?1 ORDER BY permission_id",
    &group_id,
  )?;
  Ok(Some(RawGroup { group_id, name, permissions }))
}

fn load_contacts(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawContact>> {
  let mut stmt = conn.prepare(&format!("SELECT {CONTACT_COLUMNS} FROM contacts c {filter}"))?;
  let mut contacts = stmt
    .query_map(params, RawContact::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for contact in &mut contacts {
    contact.business_types = strings(
      conn,
      "SELECT business_type_id FROM contact_business_types
       WHERE contact_id = ?1 ORDER BY business_type_id",
      &contact.contact_id,
    )?;
  }
  Ok(contacts)
}

fn load_contact_relationship(
  conn: &Connection,
  from: &str,
  to: &str,
) -> rusqlite::Result<Option<RawContactRelationship>> {
  let Some(relationship_id) = conn
    .query_row(
      "SELECT relationship_id FROM contact_relationships
       WHERE from_contact = ?1 AND to_contact = ?2",
      [from, to],
      |row| row.get::<_, String>(0),
    )
    .optional()?
  else {
    return Ok(None);
  };
  let types = strings(
    conn,
    "SELECT relationship_type_id FROM contact_relationship_types
     WHERE relationship_id = ?1 ORDER BY relationship_type_id",
    &relationship_id,
  )?;
  Ok(Some(RawContactRelationship {
    relationship_id,
    from_contact: from.to_owned(),
    to_contact: to.to_owned(),
    types,
  }))
}

fn load_project_relationship(
  conn: &Connection,
  project_id: &str,
  contact_id: &str,
) -> rusqlite::Result<Option<RawProjectRelationship>> {
  let Some(relationship_id) = conn
    .query_row(
      "SELECT relationship_id FROM project_relationships
       WHERE project_id = ?1 AND contact_id = ?2",
      [project_id, contact_id],
      |row| row.get::<_, String>(0),
    )
    .optional()?
  else {
    return Ok(None);
  };
  let types = strings(
    conn,
    "SELECT relationship_type_id FROM project_relationship_types
     WHERE relationship_id = ?1 ORDER BY relationship_type_id",
    &relationship_id,
  )?;
  Ok(Some(RawProjectRelationship {
    relationship_id,
    contact_id: contact_id.to_owned(),
    project_id: project_id.to_owned(),
    types,
  }))
}

fn load_projects(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawProject>> {
  let mut stmt = conn.prepare(&format!("SELECT {PROJECT_COLUMNS} FROM projects p {filter}"))?;
  let projects = stmt
    .query_map(params, RawProject::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(projects)
}

fn load_interactions(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawInteraction>> {
  let mut stmt =
    conn.prepare(&format!("SELECT {INTERACTION_COLUMNS} FROM interactions i {filter}"))?;
  let mut interactions = stmt
    .query_map(params, RawInteraction::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for interaction in &mut interactions {
    interaction.contacts = strings(
      conn,
      "SELECT contact_id FROM interaction_contacts
       WHERE interaction_id = ?1 ORDER BY contact_id",
      &interaction.interaction_id,
    )?;
  }
  Ok(interactions)
}

fn load_registrations(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawRegistration>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {REGISTRATION_COLUMNS} FROM login_registrations r {filter}"
  ))?;
  let mut registrations = stmt
    .query_map(params, RawRegistration::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for registration in &mut registrations {
    registration.groups = strings(
      conn,
      "SELECT group_id FROM registration_groups
       WHERE registration_id = ?1 ORDER BY group_id",
      &registration.registration_id,
    )?;
  }
  Ok(registrations)
}

const PROJECT_ORDER: &str = "ORDER BY p.name, p.status, p.kind";

fn users(raws: Vec<RawUser>) -> Result<Vec<User>> {
  raws.into_iter().map(RawUser::into_user).collect()
}

fn contacts(raws: Vec<RawContact>) -> Result<Vec<Contact>> {
  raws.into_iter().map(RawContact::into_contact).collect()
}

fn projects(raws: Vec<RawProject>) -> Result<Vec<Project>> {
  raws.into_iter().map(RawProject::into_project).collect()
}

// ─── CrmStore impl ───────────────────────────────────────────────────────────

/// Result of the activation transaction.
enum ActivationOutcome {
  Activated(Option<RawUser>),
  AlreadyActivated,
  /// The contact was linked to a login by an earlier registration.
  ContactLinked,
}

impl CrmStore for SqliteStore {
  type Error = Error;

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:       Uuid::new_v4(),
      username:      input.username,
      email:         input.email,
      password_hash: input.password_hash,
      first_name:    input.first_name,
      last_name:     input.last_name,
      is_staff:      input.is_staff,
      is_active:     input.is_active,
      groups:        Vec::new(),
      date_joined:   Utc::now(),
    };

    let row = user.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (
             user_id, username, email, password_hash, first_name, last_name,
             is_staff, is_active, date_joined
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          params![
            encode_uuid(row.user_id),
            row.username,
            row.email,
            row.password_hash,
            row.first_name,
            row.last_name,
            row.is_staff,
            row.is_active,
            encode_dt(row.date_joined),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);
    let raws = self
      .conn
      .call(move |conn| Ok(load_users(conn, "WHERE u.user_id = ?1", [id_str])?))
      .await?;
    Ok(users(raws)?.into_iter().next())
  }

  async fn find_user_by_email(&self, email: String) -> Result<Option<User>> {
    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_users(
          conn,
          "WHERE lower(u.email) = lower(?1) ORDER BY u.date_joined LIMIT 1",
          [email],
        )?)
      })
      .await?;
    Ok(users(raws)?.into_iter().next())
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    let raws = self
      .conn
      .call(|conn| Ok(load_users(conn, "ORDER BY u.username", [])?))
      .await?;
    users(raws)
  }

  async fn user_permissions(&self, user_id: Uuid) -> Result<Vec<String>> {
    let id_str = encode_uuid(user_id);
    let perms = self
      .conn
      .call(move |conn| {
        Ok(strings(
          conn,
          "SELECT DISTINCT p.app_label || '.' || p.codename AS qualified
           FROM permissions p
           JOIN group_permissions gp ON gp.permission_id = p.permission_id
           JOIN user_groups ug       ON ug.group_id      = gp.group_id
           WHERE ug.user_id = ?1
           ORDER BY qualified",
          &id_str,
        )?)
      })
      .await?;
    Ok(perms)
  }

  async fn ensure_permission(&self, input: NewPermission) -> Result<Permission> {
    let id_str = encode_uuid(Uuid::new_v4());
    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO permissions (permission_id, app_label, codename, name)
           VALUES (?1, ?2, ?3, ?4)",
          params![id_str, input.app_label, input.codename, input.name],
        )?;
        Ok(conn.query_row(
          "SELECT permission_id, app_label, codename, name FROM permissions
           WHERE app_label = ?1 AND codename = ?2",
          params![input.app_label, input.codename],
          RawPermission::from_row,
        )?)
      })
      .await?;
    raw.into_permission()
  }

  async fn list_permissions(&self) -> Result<Vec<Permission>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT permission_id, app_label, codename, name FROM permissions
           ORDER BY app_label, codename",
        )?;
        let rows = stmt
          .query_map([], RawPermission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawPermission::into_permission).collect()
  }

  async fn get_or_create_group(&self, name: String) -> Result<(Group, bool)> {
    let new_id = encode_uuid(Uuid::new_v4());
    let (raw, created) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Some(existing) = load_group(&tx, &name)? {
          return Ok((existing, false));
        }
        tx.execute(
          "INSERT INTO groups (group_id, name) VALUES (?1, ?2)",
          params![new_id, name],
        )?;
        tx.commit()?;
        Ok((RawGroup { group_id: new_id, name, permissions: Vec::new() }, true))
      })
      .await?;
    Ok((raw.into_group()?, created))
  }

  async fn grant_permission(&self, group_id: Uuid, permission_id: Uuid) -> Result<()> {
    let group_str = encode_uuid(group_id);
    let perm_str = encode_uuid(permission_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO group_permissions (group_id, permission_id)
           VALUES (?1, ?2)",
          [group_str, perm_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Lookup tables ─────────────────────────────────────────────────────────

  async fn create_business_type(&self, input: NewBusinessType) -> Result<BusinessType> {
    let business_type_id = Uuid::new_v4();
    let id_str = encode_uuid(business_type_id);
    let name = input.name.clone();
    let slug = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let slug =
          unique_slug(&tx, "business_types", "business_type_id", "slug", &name, None)?;
        tx.execute(
          "INSERT INTO business_types (business_type_id, name, slug, can_view_all_projects)
           VALUES (?1, ?2, ?3, ?4)",
          params![id_str, name, slug, input.can_view_all_projects],
        )?;
        tx.commit()?;
        Ok(slug)
      })
      .await?;

    Ok(BusinessType {
      business_type_id,
      name: input.name,
      slug,
      can_view_all_projects: input.can_view_all_projects,
    })
  }

  async fn list_business_types(&self) -> Result<Vec<BusinessType>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT business_type_id, name, slug, can_view_all_projects
           FROM business_types ORDER BY name",
        )?;
        let rows = stmt
          .query_map([], RawBusinessType::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawBusinessType::into_business_type).collect()
  }

  async fn save_relationship_type(
    &self,
    input: SaveRelationshipType,
  ) -> Result<RelationshipType> {
    let requested = input.id;
    let id_str = encode_uuid(requested.unwrap_or_else(Uuid::new_v4));
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let slug = unique_slug(
          &tx,
          "relationship_types",
          "relationship_type_id",
          "slug",
          &input.name,
          Some(id_str.as_str()),
        )?;
        if requested.is_some() {
          let changed = tx.execute(
            "UPDATE relationship_types SET name = ?2, slug = ?3
             WHERE relationship_type_id = ?1",
            params![id_str, input.name, slug],
          )?;
          if changed == 0 {
            return Ok(None);
          }
        } else {
          tx.execute(
            "INSERT INTO relationship_types (relationship_type_id, name, slug)
             VALUES (?1, ?2, ?3)",
            params![id_str, input.name, slug],
          )?;
        }
        tx.commit()?;
        Ok(Some(RawRelationshipType { relationship_type_id: id_str, name: input.name, slug }))
      })
      .await?;

    match raw {
      Some(raw) => raw.into_relationship_type(),
      None => Err(Error::not_found(
        "relationship type",
        requested.map(|id| id.to_string()).unwrap_or_default(),
      )),
    }
  }

  async fn list_relationship_types(&self) -> Result<Vec<RelationshipType>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT relationship_type_id, name, slug FROM relationship_types ORDER BY name",
        )?;
        let rows = stmt
          .query_map([], RawRelationshipType::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawRelationshipType::into_relationship_type).collect()
  }

  // ── Contacts ──────────────────────────────────────────────────────────────

  async fn create_contact(&self, input: NewContact) -> Result<Contact> {
    let contact_id = Uuid::new_v4();
    let created_at = Utc::now();
    let sort_name = input.sort_name();
    let display_name = input.display_name();

    let id_str = encode_uuid(contact_id);
    let kind_str = input.kind.as_str();
    let locations_str = encode_locations(&input.locations)?;
    let at_str = encode_dt(created_at);
    let types = encode_uuids(&input.business_types);
    let row = input.clone();
    let sort = sort_name.clone();

    let slug = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let slug = match row.slug {
          Some(slug) => slug,
          None => unique_slug(&tx, "contacts", "contact_id", "slug", &display_name, None)?,
        };
        tx.execute(
          "INSERT INTO contacts (
             contact_id, kind, name, first_name, middle_name, last_name,
             sort_name, slug, email, description, notes, picture, locations,
             created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
          params![
            id_str,
            kind_str,
            row.name,
            row.first_name,
            row.middle_name,
            row.last_name,
            sort,
            slug,
            row.email,
            row.description,
            row.notes,
            row.picture,
            locations_str,
            at_str,
          ],
        )?;
        replace_links(
          &tx,
          "contact_business_types",
          "contact_id",
          "business_type_id",
          &id_str,
          &types,
        )?;
        tx.commit()?;
        Ok(slug)
      })
      .await?;

    let mut business_types = input.business_types;
    business_types.sort();
    business_types.dedup();

    Ok(Contact {
      contact_id,
      kind: input.kind,
      user_id: None,
      name: input.name,
      first_name: input.first_name,
      middle_name: input.middle_name,
      last_name: input.last_name,
      sort_name,
      slug,
      email: input.email,
      description: input.description,
      notes: input.notes,
      picture: input.picture,
      business_types,
      locations: input.locations,
      created_at,
    })
  }

  async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>> {
    let id_str = encode_uuid(id);
    let raws = self
      .conn
      .call(move |conn| Ok(load_contacts(conn, "WHERE c.contact_id = ?1", [id_str])?))
      .await?;
    Ok(contacts(raws)?.into_iter().next())
  }

  async fn find_contact_by_user(&self, user_id: Uuid) -> Result<Option<Contact>> {
    let id_str = encode_uuid(user_id);
    let raws = self
      .conn
      .call(move |conn| Ok(load_contacts(conn, "WHERE c.user_id = ?1", [id_str])?))
      .await?;
    Ok(contacts(raws)?.into_iter().next())
  }

  async fn list_contacts(&self, query: ContactQuery) -> Result<Vec<Contact>> {
    let pattern = query
      .search
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(like_pattern);
    let kind_str = query.kind.map(ContactKind::as_str);

    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_contacts(
          conn,
          "WHERE (?1 IS NULL
                  OR c.name       LIKE ?1 ESCAPE '\\'
                  OR c.first_name LIKE ?1 ESCAPE '\\'
                  OR c.last_name  LIKE ?1 ESCAPE '\\'
                  OR c.email      LIKE ?1 ESCAPE '\\')
             AND (?2 IS NULL OR c.kind = ?2)
           ORDER BY c.sort_name COLLATE NOCASE, c.contact_id",
          params![pattern, kind_str],
        )?)
      })
      .await?;
    contacts(raws)
  }

  async fn update_contact(&self, contact: Contact) -> Result<Contact> {
    let contact_id = contact.contact_id;
    let id_str = encode_uuid(contact_id);
    let sort_name = contact.derived_sort_name();
    let locations_str = encode_locations(&contact.locations)?;
    let types = encode_uuids(&contact.business_types);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE contacts SET
             kind = ?2, name = ?3, first_name = ?4, middle_name = ?5,
             last_name = ?6, sort_name = ?7, slug = ?8, email = ?9,
             description = ?10, notes = ?11, picture = ?12, locations = ?13
           WHERE contact_id = ?1",
          params![
            id_str,
            contact.kind.as_str(),
            contact.name,
            contact.first_name,
            contact.middle_name,
            contact.last_name,
            sort_name,
            contact.slug,
            contact.email,
            contact.description,
            contact.notes,
            contact.picture,
            locations_str,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        replace_links(
          &tx,
          "contact_business_types",
          "contact_id",
          "business_type_id",
          &id_str,
          &types,
        )?;
        let raw = load_contacts(&tx, "WHERE c.contact_id = ?1", [&id_str])?.into_iter().next();
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw
      .ok_or_else(|| Error::not_found("contact", contact_id))?
      .into_contact()
  }

  async fn save_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<Contact> {
    let user_str = encode_uuid(user_id);
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE contacts SET notes = ?2, picture = ?3 WHERE user_id = ?1",
          params![user_str, update.notes, update.picture],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let raw = load_contacts(&tx, "WHERE c.user_id = ?1", [&user_str])?.into_iter().next();
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw
      .ok_or_else(|| Error::not_found("contact for user", user_id))?
      .into_contact()
  }

  async fn create_contact_relationship(
    &self,
    from: Uuid,
    to: Uuid,
    types: Vec<Uuid>,
  ) -> Result<ContactRelationship> {
    let raw = RawContactRelationship {
      relationship_id: encode_uuid(Uuid::new_v4()),
      from_contact:    encode_uuid(from),
      to_contact:      encode_uuid(to),
      types:           encode_uuids(&types),
    };
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO contact_relationships (relationship_id, from_contact, to_contact)
           VALUES (?1, ?2, ?3)",
          [&raw.relationship_id, &raw.from_contact, &raw.to_contact],
        )?;
        replace_links(
          &tx,
          "contact_relationship_types",
          "relationship_id",
          "relationship_type_id",
          &raw.relationship_id,
          &raw.types,
        )?;
        let stored = load_contact_relationship(&tx, &raw.from_contact, &raw.to_contact)?;
        tx.commit()?;
        Ok(stored)
      })
      .await?;

    raw
      .ok_or_else(|| Error::not_found("contact relationship", format!("{from} -> {to}")))?
      .into_relationship()
  }

  async fn get_contact_relationship(
    &self,
    from: Uuid,
    to: Uuid,
  ) -> Result<Option<ContactRelationship>> {
    let (from_str, to_str) = (encode_uuid(from), encode_uuid(to));
    let raw = self
      .conn
      .call(move |conn| Ok(load_contact_relationship(conn, &from_str, &to_str)?))
      .await?;
    raw.map(RawContactRelationship::into_relationship).transpose()
  }

  async fn set_contact_relationship_types(
    &self,
    from: Uuid,
    to: Uuid,
    types: Vec<Uuid>,
  ) -> Result<ContactRelationship> {
    let (from_str, to_str) = (encode_uuid(from), encode_uuid(to));
    let types = encode_uuids(&types);
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(existing) = load_contact_relationship(&tx, &from_str, &to_str)? else {
          return Ok(None);
        };
        replace_links(
          &tx,
          "contact_relationship_types",
          "relationship_id",
          "relationship_type_id",
          &existing.relationship_id,
          &types,
        )?;
        let stored = load_contact_relationship(&tx, &from_str, &to_str)?;
        tx.commit()?;
        Ok(stored)
      })
      .await?;

    raw
      .ok_or_else(|| Error::not_found("contact relationship", format!("{from} -> {to}")))?
      .into_relationship()
  }

  async fn related_contacts(
    &self,
    contact_id: Uuid,
    kind: Option<ContactKind>,
  ) -> Result<Vec<Contact>> {
    let id_str = encode_uuid(contact_id);
    let kind_str = kind.map(ContactKind::as_str);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_contacts(
          conn,
          "WHERE c.contact_id IN (
             SELECT to_contact FROM contact_relationships WHERE from_contact = ?1
           )
             AND (?2 IS NULL OR c.kind = ?2)
           ORDER BY c.sort_name COLLATE NOCASE, c.contact_id",
          params![id_str, kind_str],
        )?)
      })
      .await?;
    contacts(raws)
  }

  async fn client_businesses(&self) -> Result<Vec<Contact>> {
    let raws = self
      .conn
      .call(|conn| {
        Ok(load_contacts(
          conn,
          "WHERE c.kind = ?1
             AND EXISTS (
               SELECT 1 FROM contact_business_types cbt
               JOIN business_types bt ON bt.business_type_id = cbt.business_type_id
               WHERE cbt.contact_id = c.contact_id AND lower(bt.name) = ?2
             )
           ORDER BY c.sort_name COLLATE NOCASE, c.contact_id",
          params![ContactKind::Business.as_str(), CLIENT_BUSINESS_TYPE],
        )?)
      })
      .await?;
    contacts(raws)
  }

  // ── Projects ──────────────────────────────────────────────────────────────

  async fn create_project(&self, input: NewProject) -> Result<Project> {
    let project = Project {
      project_id:       Uuid::new_v4(),
      name:             input.name,
      trac_environment: input.trac_environment,
      business_id:      input.business_id,
      point_person_id:  input.point_person_id,
      kind:             input.kind,
      status:           input.status,
      description:      input.description,
    };

    let row = project.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO projects (
             project_id, name, trac_environment, business_id, point_person_id,
             kind, status, description
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![
            encode_uuid(row.project_id),
            row.name,
            row.trac_environment,
            encode_uuid(row.business_id),
            encode_uuid(row.point_person_id),
            row.kind.as_str(),
            row.status.as_str(),
            row.description,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(project)
  }

  async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
    let id_str = encode_uuid(id);
    let raws = self
      .conn
      .call(move |conn| Ok(load_projects(conn, "WHERE p.project_id = ?1", [id_str])?))
      .await?;
    Ok(projects(raws)?.into_iter().next())
  }

  async fn list_projects(&self, query: ProjectQuery) -> Result<Vec<Project>> {
    let business_str = query.business_id.map(encode_uuid);
    let contact_str = query.contact_id.map(encode_uuid);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_projects(
          conn,
          &format!(
            "WHERE (?1 IS NULL OR p.business_id = ?1)
               AND (?2 IS NULL OR p.project_id IN (
                 SELECT project_id FROM project_relationships WHERE contact_id = ?2
               ))
             {PROJECT_ORDER}"
          ),
          params![business_str, contact_str],
        )?)
      })
      .await?;
    projects(raws)
  }

  async fn projects_for_contacts(&self, contact_ids: Vec<Uuid>) -> Result<Vec<Project>> {
    if contact_ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids = encode_uuids(&contact_ids);
    let raws = self
      .conn
      .call(move |conn| {
        let placeholders = (1..=ids.len())
          .map(|i| format!("?{i}"))
          .collect::<Vec<_>>()
          .join(", ");
        Ok(load_projects(
          conn,
          &format!(
            "WHERE p.business_id IN ({placeholders})
                OR p.project_id IN (
                  SELECT project_id FROM project_relationships
                  WHERE contact_id IN ({placeholders})
                )
             {PROJECT_ORDER}"
          ),
          params_from_iter(ids.iter()),
        )?)
      })
      .await?;
    projects(raws)
  }

  async fn add_project_contact(
    &self,
    project_id: Uuid,
    contact_id: Uuid,
    types: Vec<Uuid>,
  ) -> Result<ProjectRelationship> {
    let raw = RawProjectRelationship {
      relationship_id: encode_uuid(Uuid::new_v4()),
      contact_id:      encode_uuid(contact_id),
      project_id:      encode_uuid(project_id),
      types:           encode_uuids(&types),
    };
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO project_relationships (relationship_id, contact_id, project_id)
           VALUES (?1, ?2, ?3)",
          [&raw.relationship_id, &raw.contact_id, &raw.project_id],
        )?;
        replace_links(
          &tx,
          "project_relationship_types",
          "relationship_id",
          "relationship_type_id",
          &raw.relationship_id,
          &raw.types,
        )?;
        let stored = load_project_relationship(&tx, &raw.project_id, &raw.contact_id)?;
        tx.commit()?;
        Ok(stored)
      })
      .await?;

    raw
      .ok_or_else(|| {
        Error::not_found("project relationship", format!("{project_id}/{contact_id}"))
      })?
      .into_relationship()
  }

  async fn set_project_relationship_types(
    &self,
    project_id: Uuid,
    contact_id: Uuid,
    types: Vec<Uuid>,
  ) -> Result<ProjectRelationship> {
    let (project_str, contact_str) = (encode_uuid(project_id), encode_uuid(contact_id));
    let types = encode_uuids(&types);
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(existing) = load_project_relationship(&tx, &project_str, &contact_str)?
        else {
          return Ok(None);
        };
        replace_links(
          &tx,
          "project_relationship_types",
          "relationship_id",
          "relationship_type_id",
          &existing.relationship_id,
          &types,
        )?;
        let stored = load_project_relationship(&tx, &project_str, &contact_str)?;
        tx.commit()?;
        Ok(stored)
      })
      .await?;

    raw
      .ok_or_else(|| {
        Error::not_found("project relationship", format!("{project_id}/{contact_id}"))
      })?
      .into_relationship()
  }

  async fn project_contacts(&self, project_id: Uuid) -> Result<Vec<Contact>> {
    let id_str = encode_uuid(project_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_contacts(
          conn,
          "WHERE c.contact_id IN (
             SELECT contact_id FROM project_relationships WHERE project_id = ?1
           )
           ORDER BY c.sort_name COLLATE NOCASE, c.contact_id",
          [id_str],
        )?)
      })
      .await?;
    contacts(raws)
  }

  // ── Interactions ──────────────────────────────────────────────────────────

  async fn create_interaction(&self, input: NewInteraction) -> Result<Interaction> {
    let mut contact_ids = input.contacts;
    contact_ids.sort();
    contact_ids.dedup();

    let interaction = Interaction {
      interaction_id: Uuid::new_v4(),
      date:           input.date,
      kind:           input.kind,
      completed:      input.completed,
      project_id:     input.project_id,
      memo:           input.memo,
      cdr_id:         input.cdr_id,
      contacts:       contact_ids,
    };

    let row = interaction.clone();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id_str = encode_uuid(row.interaction_id);
        tx.execute(
          "INSERT INTO interactions (
             interaction_id, date, kind, completed, project_id, memo, cdr_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![
            id_str,
            encode_dt(row.date),
            row.kind.as_str(),
            row.completed,
            row.project_id.map(encode_uuid),
            row.memo,
            row.cdr_id,
          ],
        )?;
        replace_links(
          &tx,
          "interaction_contacts",
          "interaction_id",
          "contact_id",
          &id_str,
          &encode_uuids(&row.contacts),
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(interaction)
  }

  async fn update_interaction(&self, interaction: Interaction) -> Result<Interaction> {
    let interaction_id = interaction.interaction_id;
    let id_str = encode_uuid(interaction_id);
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE interactions SET
             date = ?2, kind = ?3, completed = ?4, project_id = ?5, memo = ?6,
             cdr_id = ?7
           WHERE interaction_id = ?1",
          params![
            id_str,
            encode_dt(interaction.date),
            interaction.kind.as_str(),
            interaction.completed,
            interaction.project_id.map(encode_uuid),
            interaction.memo,
            interaction.cdr_id,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        replace_links(
          &tx,
          "interaction_contacts",
          "interaction_id",
          "contact_id",
          &id_str,
          &encode_uuids(&interaction.contacts),
        )?;
        let raw =
          load_interactions(&tx, "WHERE i.interaction_id = ?1", [&id_str])?.into_iter().next();
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw
      .ok_or_else(|| Error::not_found("interaction", interaction_id))?
      .into_interaction()
  }

  async fn get_interaction(&self, id: Uuid) -> Result<Option<Interaction>> {
    let id_str = encode_uuid(id);
    let raws = self
      .conn
      .call(move |conn| Ok(load_interactions(conn, "WHERE i.interaction_id = ?1", [id_str])?))
      .await?;
    raws.into_iter().next().map(RawInteraction::into_interaction).transpose()
  }

  async fn list_interactions(&self, contact_id: Option<Uuid>) -> Result<Vec<Interaction>> {
    let contact_str = contact_id.map(encode_uuid);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_interactions(
          conn,
          "WHERE ?1 IS NULL OR i.interaction_id IN (
             SELECT interaction_id FROM interaction_contacts WHERE contact_id = ?1
           )
           ORDER BY i.date DESC, i.interaction_id",
          [contact_str],
        )?)
      })
      .await?;
    raws.into_iter().map(RawInteraction::into_interaction).collect()
  }

  // ── Mail recipients ───────────────────────────────────────────────────────

  async fn users_for_project(&self, project_id: Uuid) -> Result<Vec<User>> {
    let id_str = encode_uuid(project_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_users(
          conn,
          "WHERE u.user_id IN (
             SELECT c.user_id FROM contacts c
             JOIN project_relationships pr ON pr.contact_id = c.contact_id
             WHERE pr.project_id = ?1 AND c.user_id IS NOT NULL
           )
           ORDER BY u.last_name, u.first_name, u.username",
          [id_str],
        )?)
      })
      .await?;
    users(raws)
  }

  async fn users_for_business(&self, business_id: Uuid) -> Result<Vec<User>> {
    let id_str = encode_uuid(business_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_users(
          conn,
          "WHERE u.user_id IN (
             SELECT c.user_id FROM contacts c
             JOIN contact_relationships cr
               ON (cr.from_contact = c.contact_id AND cr.to_contact   = ?1)
               OR (cr.to_contact   = c.contact_id AND cr.from_contact = ?1)
             WHERE c.user_id IS NOT NULL
           )
           ORDER BY u.last_name, u.first_name, u.username",
          [id_str],
        )?)
      })
      .await?;
    users(raws)
  }

  // ── Registrations ─────────────────────────────────────────────────────────

  async fn create_registration(&self, input: NewRegistration) -> Result<LoginRegistration> {
    let mut groups = input.groups;
    groups.sort();
    groups.dedup();

    let registration = LoginRegistration {
      registration_id: Uuid::new_v4(),
      contact_id: input.contact_id,
      date: input.date,
      activation_key: input.activation_key,
      activated: false,
      groups,
    };

    let row = registration.clone();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id_str = encode_uuid(row.registration_id);
        tx.execute(
          "INSERT INTO login_registrations (
             registration_id, contact_id, date, activation_key, activated
           ) VALUES (?1, ?2, ?3, ?4, 0)",
          params![
            id_str,
            encode_uuid(row.contact_id),
            encode_dt(row.date),
            row.activation_key,
          ],
        )?;
        replace_links(
          &tx,
          "registration_groups",
          "registration_id",
          "group_id",
          &id_str,
          &encode_uuids(&row.groups),
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(registration)
  }

  async fn get_registration_by_key(
    &self,
    activation_key: String,
  ) -> Result<Option<LoginRegistration>> {
    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_registrations(conn, "WHERE r.activation_key = ?1", [activation_key])?)
      })
      .await?;
    raws.into_iter().next().map(RawRegistration::into_registration).transpose()
  }

  async fn activate_registration(&self, activation: Activation) -> Result<User> {
    let registration = self
      .get_registration_by_key(activation.activation_key.clone())
      .await?
      .ok_or_else(|| Error::not_found("registration", &activation.activation_key))?;
    registration.ensure_activatable(activation.now, activation.activation_days)?;

    let registration_id = registration.registration_id;
    let reg_str = encode_uuid(registration_id);
    let contact_str = encode_uuid(registration.contact_id);
    let user_str = encode_uuid(Uuid::new_v4());
    let joined_str = encode_dt(activation.now);
    let groups = encode_uuids(&registration.groups);
    let password_hash = activation.password_hash;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Claim the registration first so a concurrent activation loses.
        let claimed = tx.execute(
          "UPDATE login_registrations SET activated = 1
           WHERE registration_id = ?1 AND activated = 0",
          [&reg_str],
        )?;
        if claimed == 0 {
          return Ok(ActivationOutcome::AlreadyActivated);
        }

        let (email, first_name, last_name): (String, String, String) = tx.query_row(
          "SELECT email, first_name, last_name FROM contacts WHERE contact_id = ?1",
          [&contact_str],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let full_name = format!("{first_name} {last_name}");
        let username = unique_slug(&tx, "users", "user_id", "username", &full_name, None)?;

        tx.execute(
          "INSERT INTO users (
             user_id, username, email, password_hash, first_name, last_name,
             is_staff, is_active, date_joined
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 1, ?7)",
          params![user_str, username, email, password_hash, first_name, last_name, joined_str],
        )?;
        replace_links(&tx, "user_groups", "user_id", "group_id", &user_str, &groups)?;
        // A contact keeps its first login. Dropping `tx` rolls back the
        // claim and the new user.
        let linked = tx.execute(
          "UPDATE contacts SET user_id = ?2 WHERE contact_id = ?1 AND user_id IS NULL",
          [&contact_str, &user_str],
        )?;
        if linked == 0 {
          return Ok(ActivationOutcome::ContactLinked);
        }

        let raw = load_users(&tx, "WHERE u.user_id = ?1", [&user_str])?.into_iter().next();
        tx.commit()?;
        Ok(ActivationOutcome::Activated(raw))
      })
      .await?;

    let raw = match outcome {
      ActivationOutcome::Activated(Some(raw)) => raw,
      ActivationOutcome::Activated(None) => {
        return Err(Error::not_found("user", "activated account"));
      }
      ActivationOutcome::AlreadyActivated => {
        return Err(rolo_core::Error::AlreadyActivated(registration_id).into());
      }
      ActivationOutcome::ContactLinked => {
        return Err(Error::Conflict(format!(
          "contact {} already has a login account",
          registration.contact_id
        )));
      }
    };
    let user = raw.into_user()?;
    tracing::info!(
      registration_id = %registration_id,
      username = %user.username,
      "registration activated"
    );
    Ok(user)
  }
}
