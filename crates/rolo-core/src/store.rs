//! The `CrmStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `rolo-store-sqlite`).
//! Higher layers (`rolo-api`, the forms in [`crate::forms`]) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  account::{Group, NewPermission, NewUser, Permission, User},
  contact::{
    BusinessType, Contact, ContactKind, ContactQuery, NewBusinessType,
    NewContact, ProfileUpdate,
  },
  interaction::{Interaction, NewInteraction},
  project::{NewProject, Project, ProjectQuery},
  registration::{Activation, LoginRegistration, NewRegistration},
  relationship::{
    ContactRelationship, ProjectRelationship, RelationshipType,
    SaveRelationshipType,
  },
};

// ─── Error classification ────────────────────────────────────────────────────

/// Coarse category of a backend error, so callers can react to it without
/// knowing the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
  /// A referenced row does not exist.
  NotFound,
  /// A uniqueness constraint would be violated.
  Conflict,
  /// The registration is already activated.
  AlreadyActivated,
  /// The registration is past its activation window.
  Expired,
  Other,
}

pub trait ClassifyError {
  fn kind(&self) -> StoreErrorKind;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a CRM storage backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CrmStore: Send + Sync {
  type Error: std::error::Error + ClassifyError + Send + Sync + 'static;

  // ── Accounts ──────────────────────────────────────────────────────────

  /// Create a login account. Usernames are unique.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Case-insensitive lookup by email address.
  fn find_user_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// The user's permissions through group membership, as
  /// `app_label.codename` strings.
  fn user_permissions(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Insert the permission unless `(app_label, codename)` already exists;
  /// returns the stored row either way.
  fn ensure_permission(
    &self,
    input: NewPermission,
  ) -> impl Future<Output = Result<Permission, Self::Error>> + Send + '_;

  fn list_permissions(
    &self,
  ) -> impl Future<Output = Result<Vec<Permission>, Self::Error>> + Send + '_;

  /// Fetch the group named `name`, creating it if needed. The flag is `true`
  /// when the group was created by this call.
  fn get_or_create_group(
    &self,
    name: String,
  ) -> impl Future<Output = Result<(Group, bool), Self::Error>> + Send + '_;

  /// Grant a permission to a group; granting twice is a no-op.
  fn grant_permission(
    &self,
    group_id: Uuid,
    permission_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Lookup tables ─────────────────────────────────────────────────────

  fn create_business_type(
    &self,
    input: NewBusinessType,
  ) -> impl Future<Output = Result<BusinessType, Self::Error>> + Send + '_;

  fn list_business_types(
    &self,
  ) -> impl Future<Output = Result<Vec<BusinessType>, Self::Error>> + Send + '_;

  /// Insert or rename a relationship type. The slug is always re-derived
  /// from the name and made unique against every other row.
  fn save_relationship_type(
    &self,
    input: SaveRelationshipType,
  ) -> impl Future<Output = Result<RelationshipType, Self::Error>> + Send + '_;

  fn list_relationship_types(
    &self,
  ) -> impl Future<Output = Result<Vec<RelationshipType>, Self::Error>> + Send + '_;

  // ── Contacts ──────────────────────────────────────────────────────────

  fn create_contact(
    &self,
    input: NewContact,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  fn get_contact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// The contact linked to a login account, if any.
  fn find_contact_by_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// Contacts matching `query`, ordered by sort name.
  fn list_contacts(
    &self,
    query: ContactQuery,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  /// Overwrite the editable fields of an existing contact, including its
  /// business types and locations.
  fn update_contact(
    &self,
    contact: Contact,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  /// Save notes and picture on the contact linked to `user_id`, in one
  /// transaction.
  fn save_profile(
    &self,
    user_id: Uuid,
    update: ProfileUpdate,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  /// Link `from` to `to`. A second relationship for the same ordered pair is
  /// a conflict.
  fn create_contact_relationship(
    &self,
    from: Uuid,
    to: Uuid,
    types: Vec<Uuid>,
  ) -> impl Future<Output = Result<ContactRelationship, Self::Error>> + Send + '_;

  fn get_contact_relationship(
    &self,
    from: Uuid,
    to: Uuid,
  ) -> impl Future<Output = Result<Option<ContactRelationship>, Self::Error>> + Send + '_;

  /// Replace the relationship type tags on an existing relationship.
  fn set_contact_relationship_types(
    &self,
    from: Uuid,
    to: Uuid,
    types: Vec<Uuid>,
  ) -> impl Future<Output = Result<ContactRelationship, Self::Error>> + Send + '_;

  /// Contacts `contact_id` has an outgoing relationship to, optionally
  /// restricted to one kind.
  fn related_contacts(
    &self,
    contact_id: Uuid,
    kind: Option<ContactKind>,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  /// Business contacts carrying the `client` business type.
  fn client_businesses(
    &self,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  // ── Projects ──────────────────────────────────────────────────────────

  fn create_project(
    &self,
    input: NewProject,
  ) -> impl Future<Output = Result<Project, Self::Error>> + Send + '_;

  fn get_project(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Project>, Self::Error>> + Send + '_;

  /// Projects ordered by name, status, type.
  fn list_projects(
    &self,
    query: ProjectQuery,
  ) -> impl Future<Output = Result<Vec<Project>, Self::Error>> + Send + '_;

  /// Distinct projects that any of `contact_ids` belongs to or owns.
  fn projects_for_contacts(
    &self,
    contact_ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<Vec<Project>, Self::Error>> + Send + '_;

  /// Add a contact to a project. Adding the same contact twice is a conflict.
  fn add_project_contact(
    &self,
    project_id: Uuid,
    contact_id: Uuid,
    types: Vec<Uuid>,
  ) -> impl Future<Output = Result<ProjectRelationship, Self::Error>> + Send + '_;

  fn set_project_relationship_types(
    &self,
    project_id: Uuid,
    contact_id: Uuid,
    types: Vec<Uuid>,
  ) -> impl Future<Output = Result<ProjectRelationship, Self::Error>> + Send + '_;

  fn project_contacts(
    &self,
    project_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  // ── Interactions ──────────────────────────────────────────────────────

  fn create_interaction(
    &self,
    input: NewInteraction,
  ) -> impl Future<Output = Result<Interaction, Self::Error>> + Send + '_;

  fn update_interaction(
    &self,
    interaction: Interaction,
  ) -> impl Future<Output = Result<Interaction, Self::Error>> + Send + '_;

  fn get_interaction(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Interaction>, Self::Error>> + Send + '_;

  /// Interactions newest first, optionally only those involving a contact.
  fn list_interactions(
    &self,
    contact_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Interaction>, Self::Error>> + Send + '_;

  // ── Mail recipients ───────────────────────────────────────────────────

  /// Users linked to the project's contacts.
  fn users_for_project(
    &self,
    project_id: Uuid,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Users linked to contacts related to the business in either direction.
  fn users_for_business(
    &self,
    business_id: Uuid,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  // ── Registrations ─────────────────────────────────────────────────────

  fn create_registration(
    &self,
    input: NewRegistration,
  ) -> impl Future<Output = Result<LoginRegistration, Self::Error>> + Send + '_;

  fn get_registration_by_key(
    &self,
    activation_key: String,
  ) -> impl Future<Output = Result<Option<LoginRegistration>, Self::Error>> + Send + '_;

  /// Exchange a pending, unexpired registration for a live account.
  ///
  /// In one transaction: derives a unique username from the contact's full
  /// name, creates an active user carrying the contact's email and names,
  /// joins the registration's groups, links the contact to the user and marks
  /// the registration activated.
  fn activate_registration(
    &self,
    activation: Activation,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;
}
