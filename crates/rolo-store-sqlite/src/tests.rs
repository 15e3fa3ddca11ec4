//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, TimeZone, Utc};
use rolo_core::{
  account::{NewUser, hash_password},
  contact::{ContactKind, ContactQuery, NewBusinessType, NewContact, ProfileUpdate},
  install::{CRM_ADMIN_GROUP, PAGELET_ADMIN_GROUP, install},
  interaction::{InteractionType, NewInteraction},
  project::{NewProject, ProjectQuery, ProjectStatus, ProjectType},
  registration::{Activation, NewRegistration},
  relationship::SaveRelationshipType,
  store::{ClassifyError, CrmStore, StoreErrorKind},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_user(username: &str, email: &str) -> NewUser {
  NewUser {
    username:      username.into(),
    email:         email.into(),
    password_hash: String::new(),
    first_name:    String::new(),
    last_name:     String::new(),
    is_staff:      true,
    is_active:     true,
  }
}

fn person(first: &str, last: &str, email: &str) -> NewContact {
  let mut input = NewContact::individual(first, last);
  input.email = email.into();
  input
}

fn project(name: &str, business_id: Uuid, point_person_id: Uuid) -> NewProject {
  NewProject {
    name: name.into(),
    trac_environment: None,
    business_id,
    point_person_id,
    kind: ProjectType::Software,
    status: ProjectStatus::Accepted,
    description: "work".into(),
  }
}

fn activation(key: &str) -> Activation {
  Activation {
    activation_key:  key.into(),
    password_hash:   hash_password("s3cret").unwrap(),
    now:             Utc::now(),
    activation_days: 15,
  }
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_find_user_by_email_ignores_case() {
  let s = store().await;
  let user = s.create_user(new_user("jdoe", "Jane@Example.com")).await.unwrap();

  let found = s.find_user_by_email("jane@example.COM".into()).await.unwrap();
  assert_eq!(found.map(|u| u.user_id), Some(user.user_id));
  assert!(s.find_user_by_email("nobody@example.com".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
  let s = store().await;
  s.create_user(new_user("jdoe", "a@example.com")).await.unwrap();
  let err = s.create_user(new_user("jdoe", "b@example.com")).await.unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::Conflict);
}

#[tokio::test]
async fn install_is_idempotent_and_grants_through_groups() {
  let s = store().await;

  let first = install(&s).await.unwrap();
  assert_eq!(first.groups_created, vec![CRM_ADMIN_GROUP, PAGELET_ADMIN_GROUP]);
  assert!(first.grants > 0);

  let second = install(&s).await.unwrap();
  assert!(second.groups_created.is_empty());
  assert_eq!(second.grants, 0);
  assert_eq!(s.list_permissions().await.unwrap().len(), first.permissions);

  let (group, created) = s.get_or_create_group(CRM_ADMIN_GROUP.into()).await.unwrap();
  assert!(!created);
  assert_eq!(group.permissions.len(), first.grants - 3);
}

#[tokio::test]
async fn user_permissions_follow_registration_groups() {
  let s = store().await;
  install(&s).await.unwrap();
  let (admins, _) = s.get_or_create_group(CRM_ADMIN_GROUP.into()).await.unwrap();

  let contact = s.create_contact(person("Jane", "Doe", "jane@example.com")).await.unwrap();
  let reg = s
    .create_registration(NewRegistration::for_contact(&contact, vec![admins.group_id], Utc::now()))
    .await
    .unwrap();
  let user = s.activate_registration(activation(&reg.activation_key)).await.unwrap();

  let perms = s.user_permissions(user.user_id).await.unwrap();
  assert!(perms.contains(&"crm.add_contact".to_owned()));
  assert!(perms.contains(&"crm.change_contact".to_owned()));
  assert!(!perms.iter().any(|p| p.starts_with("pagelets.")));
}

// ─── Lookup tables ───────────────────────────────────────────────────────────

#[tokio::test]
async fn relationship_type_slugs_stay_unique_across_renames() {
  let s = store().await;

  let friend = s
    .save_relationship_type(SaveRelationshipType { id: None, name: "Friend".into() })
    .await
    .unwrap();
  let other = s
    .save_relationship_type(SaveRelationshipType { id: None, name: "friend!".into() })
    .await
    .unwrap();
  assert_eq!(friend.slug, "friend");
  assert_eq!(other.slug, "friend-2");

  // Renaming keeps its own slug available to itself.
  let renamed = s
    .save_relationship_type(SaveRelationshipType {
      id:   Some(friend.relationship_type_id),
      name: "FRIEND".into(),
    })
    .await
    .unwrap();
  assert_eq!(renamed.slug, "friend");

  let renamed = s
    .save_relationship_type(SaveRelationshipType {
      id:   Some(other.relationship_type_id),
      name: "Colleague".into(),
    })
    .await
    .unwrap();
  assert_eq!(renamed.slug, "colleague");
  assert_eq!(s.list_relationship_types().await.unwrap().len(), 2);
}

#[tokio::test]
async fn saving_unknown_relationship_type_is_not_found() {
  let s = store().await;
  let err = s
    .save_relationship_type(SaveRelationshipType { id: Some(Uuid::new_v4()), name: "X".into() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::NotFound);
}

#[tokio::test]
async fn business_type_slugs_are_derived() {
  let s = store().await;
  let a = s
    .create_business_type(NewBusinessType { name: "Client".into(), can_view_all_projects: false })
    .await
    .unwrap();
  let b = s
    .create_business_type(NewBusinessType { name: "client".into(), can_view_all_projects: true })
    .await
    .unwrap();
  assert_eq!((a.slug.as_str(), b.slug.as_str()), ("client", "client-2"));
}

// ─── Contacts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn contact_slugs_are_uniquified() {
  let s = store().await;
  let a = s.create_contact(person("Jane", "Doe", "")).await.unwrap();
  let b = s.create_contact(person("Jane", "Doe", "")).await.unwrap();
  assert_eq!(a.slug, "jane-doe");
  assert_eq!(b.slug, "jane-doe-2");
  assert_eq!(a.sort_name, "Doe, Jane");
}

#[tokio::test]
async fn explicit_duplicate_slug_is_a_conflict() {
  let s = store().await;
  let mut input = NewContact::business("Acme");
  input.slug = Some("acme".into());
  s.create_contact(input.clone()).await.unwrap();

  let err = s.create_contact(input).await.unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::Conflict);
}

#[tokio::test]
async fn list_contacts_searches_and_sorts() {
  let s = store().await;
  s.create_contact(person("Zed", "Adams", "zed@example.com")).await.unwrap();
  s.create_contact(person("Amy", "Young", "amy@example.com")).await.unwrap();
  s.create_contact(NewContact::business("Doe Holdings")).await.unwrap();

  let all = s.list_contacts(ContactQuery::default()).await.unwrap();
  let names: Vec<_> = all.iter().map(|c| c.sort_name.as_str()).collect();
  assert_eq!(names, ["Adams, Zed", "Doe Holdings", "Young, Amy"]);

  let hits = s
    .list_contacts(ContactQuery { search: Some("AMY@".into()), kind: None })
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].first_name, "Amy");

  let businesses = s
    .list_contacts(ContactQuery { search: None, kind: Some(ContactKind::Business) })
    .await
    .unwrap();
  assert_eq!(businesses.len(), 1);

  let none = s
    .list_contacts(ContactQuery { search: Some("%".into()), kind: None })
    .await
    .unwrap();
  assert!(none.is_empty());
}

#[tokio::test]
async fn update_contact_recomputes_sort_name_and_types() {
  let s = store().await;
  let bt = s
    .create_business_type(NewBusinessType { name: "Client".into(), can_view_all_projects: false })
    .await
    .unwrap();
  let mut contact = s.create_contact(person("Jane", "Doe", "")).await.unwrap();

  contact.last_name = "Smith".into();
  contact.business_types = vec![bt.business_type_id];
  let updated = s.update_contact(contact).await.unwrap();
  assert_eq!(updated.sort_name, "Smith, Jane");
  assert_eq!(updated.business_types, vec![bt.business_type_id]);

  let mut ghost = updated.clone();
  ghost.contact_id = Uuid::new_v4();
  assert_eq!(s.update_contact(ghost).await.unwrap_err().kind(), StoreErrorKind::NotFound);
}

#[tokio::test]
async fn save_profile_requires_a_linked_contact() {
  let s = store().await;
  let err = s
    .save_profile(Uuid::new_v4(), ProfileUpdate { notes: Some("x".into()), picture: None })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::NotFound);

  let contact = s.create_contact(person("Jane", "Doe", "jane@example.com")).await.unwrap();
  let reg = s
    .create_registration(NewRegistration::for_contact(&contact, vec![], Utc::now()))
    .await
    .unwrap();
  let user = s.activate_registration(activation(&reg.activation_key)).await.unwrap();

  let saved = s
    .save_profile(
      user.user_id,
      ProfileUpdate { notes: Some("likes tea".into()), picture: Some("jane.png".into()) },
    )
    .await
    .unwrap();
  assert_eq!(saved.contact_id, contact.contact_id);
  assert_eq!(saved.notes.as_deref(), Some("likes tea"));
  assert_eq!(saved.picture.as_deref(), Some("jane.png"));
}

#[tokio::test]
async fn contact_relationships_are_unique_per_pair() {
  let s = store().await;
  let jane = s.create_contact(person("Jane", "Doe", "")).await.unwrap();
  let acme = s.create_contact(NewContact::business("Acme")).await.unwrap();
  let employee = s
    .save_relationship_type(SaveRelationshipType { id: None, name: "Employee".into() })
    .await
    .unwrap();
  let owner = s
    .save_relationship_type(SaveRelationshipType { id: None, name: "Owner".into() })
    .await
    .unwrap();

  let rel = s
    .create_contact_relationship(jane.contact_id, acme.contact_id, vec![employee.relationship_type_id])
    .await
    .unwrap();
  assert_eq!(rel.types, vec![employee.relationship_type_id]);

  let err = s
    .create_contact_relationship(jane.contact_id, acme.contact_id, vec![])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::Conflict);

  // The reverse direction is a different pair.
  s.create_contact_relationship(acme.contact_id, jane.contact_id, vec![]).await.unwrap();

  let rel = s
    .set_contact_relationship_types(jane.contact_id, acme.contact_id, vec![owner.relationship_type_id])
    .await
    .unwrap();
  assert_eq!(rel.types, vec![owner.relationship_type_id]);

  let err = s
    .set_contact_relationship_types(acme.contact_id, Uuid::new_v4(), vec![])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::NotFound);
}

#[tokio::test]
async fn related_contacts_and_client_businesses() {
  let s = store().await;
  let client = s
    .create_business_type(NewBusinessType { name: "CLIENT".into(), can_view_all_projects: false })
    .await
    .unwrap();
  let jane = s.create_contact(person("Jane", "Doe", "")).await.unwrap();
  let bob = s.create_contact(person("Bob", "Roe", "")).await.unwrap();
  let mut acme = NewContact::business("Acme");
  acme.business_types = vec![client.business_type_id];
  let acme = s.create_contact(acme).await.unwrap();
  s.create_contact(NewContact::business("Vendor Co")).await.unwrap();

  s.create_contact_relationship(jane.contact_id, acme.contact_id, vec![]).await.unwrap();
  s.create_contact_relationship(jane.contact_id, bob.contact_id, vec![]).await.unwrap();

  let all = s.related_contacts(jane.contact_id, None).await.unwrap();
  assert_eq!(all.len(), 2);
  let businesses = s
    .related_contacts(jane.contact_id, Some(ContactKind::Business))
    .await
    .unwrap();
  assert_eq!(businesses.iter().map(|c| c.contact_id).collect::<Vec<_>>(), vec![acme.contact_id]);

  let clients = s.client_businesses().await.unwrap();
  assert_eq!(clients.iter().map(|c| c.contact_id).collect::<Vec<_>>(), vec![acme.contact_id]);
}

// ─── Projects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn projects_are_listed_by_name_and_membership() {
  let s = store().await;
  let lead = s.create_user(new_user("lead", "lead@example.com")).await.unwrap();
  let acme = s.create_contact(NewContact::business("Acme")).await.unwrap();
  let jane = s.create_contact(person("Jane", "Doe", "")).await.unwrap();

  let web = s.create_project(project("Website", acme.contact_id, lead.user_id)).await.unwrap();
  let app = s.create_project(project("App", acme.contact_id, lead.user_id)).await.unwrap();

  let names: Vec<_> = s
    .list_projects(ProjectQuery::default())
    .await
    .unwrap()
    .into_iter()
    .map(|p| p.name)
    .collect();
  assert_eq!(names, ["App", "Website"]);

  s.add_project_contact(web.project_id, jane.contact_id, vec![]).await.unwrap();
  let janes = s
    .list_projects(ProjectQuery { business_id: None, contact_id: Some(jane.contact_id) })
    .await
    .unwrap();
  assert_eq!(janes.iter().map(|p| p.project_id).collect::<Vec<_>>(), vec![web.project_id]);

  // Owner and member both match, without duplicates.
  let both = s
    .projects_for_contacts(vec![jane.contact_id, acme.contact_id])
    .await
    .unwrap();
  assert_eq!(
    both.iter().map(|p| p.project_id).collect::<Vec<_>>(),
    vec![app.project_id, web.project_id]
  );
  assert!(s.projects_for_contacts(vec![]).await.unwrap().is_empty());

  let err = s
    .add_project_contact(web.project_id, jane.contact_id, vec![])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::Conflict);

  let members = s.project_contacts(web.project_id).await.unwrap();
  assert_eq!(members.len(), 1);
}

#[tokio::test]
async fn project_with_unknown_owner_is_not_found() {
  let s = store().await;
  let lead = s.create_user(new_user("lead", "lead@example.com")).await.unwrap();
  let err = s
    .create_project(project("Orphan", Uuid::new_v4(), lead.user_id))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::NotFound);
}

// ─── Interactions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn interactions_are_listed_newest_first() {
  let s = store().await;
  let jane = s.create_contact(person("Jane", "Doe", "")).await.unwrap();
  let bob = s.create_contact(person("Bob", "Roe", "")).await.unwrap();

  let at = |day| Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap();
  let log = |day, contacts: Vec<Uuid>| NewInteraction {
    date: at(day),
    kind: InteractionType::Phone,
    completed: true,
    project_id: None,
    memo: format!("call on day {day}"),
    cdr_id: None,
    contacts,
  };

  s.create_interaction(log(1, vec![jane.contact_id])).await.unwrap();
  s.create_interaction(log(3, vec![bob.contact_id])).await.unwrap();
  s.create_interaction(log(2, vec![jane.contact_id, bob.contact_id])).await.unwrap();

  let all = s.list_interactions(None).await.unwrap();
  let days: Vec<_> = all.iter().map(|i| i.date).collect();
  assert_eq!(days, vec![at(3), at(2), at(1)]);

  let janes = s.list_interactions(Some(jane.contact_id)).await.unwrap();
  assert_eq!(janes.len(), 2);
  assert_eq!(janes[0].date, at(2));
}

#[tokio::test]
async fn update_interaction_replaces_contacts() {
  let s = store().await;
  let jane = s.create_contact(person("Jane", "Doe", "")).await.unwrap();
  let bob = s.create_contact(person("Bob", "Roe", "")).await.unwrap();

  let mut interaction = s
    .create_interaction(NewInteraction {
      date:       Utc::now(),
      kind:       InteractionType::Meeting,
      completed:  false,
      project_id: None,
      memo:       "kickoff".into(),
      cdr_id:     None,
      contacts:   vec![jane.contact_id],
    })
    .await
    .unwrap();

  interaction.contacts = vec![bob.contact_id];
  interaction.completed = true;
  let updated = s.update_interaction(interaction.clone()).await.unwrap();
  assert_eq!(updated.contacts, vec![bob.contact_id]);
  assert!(updated.completed);

  let fetched = s.get_interaction(interaction.interaction_id).await.unwrap().unwrap();
  assert_eq!(fetched.contacts, vec![bob.contact_id]);
}

// ─── Mail recipients ─────────────────────────────────────────────────────────

#[tokio::test]
async fn recipients_are_users_linked_to_related_contacts() {
  let s = store().await;
  let lead = s.create_user(new_user("lead", "lead@example.com")).await.unwrap();
  let acme = s.create_contact(NewContact::business("Acme")).await.unwrap();
  let jane = s.create_contact(person("Jane", "Doe", "jane@example.com")).await.unwrap();
  let bob = s.create_contact(person("Bob", "Roe", "bob@example.com")).await.unwrap();

  for contact in [&jane, &bob] {
    let reg = s
      .create_registration(NewRegistration::for_contact(contact, vec![], Utc::now()))
      .await
      .unwrap();
    s.activate_registration(activation(&reg.activation_key)).await.unwrap();
  }

  // Jane points at Acme, Acme points at Bob.
  s.create_contact_relationship(jane.contact_id, acme.contact_id, vec![]).await.unwrap();
  s.create_contact_relationship(acme.contact_id, bob.contact_id, vec![]).await.unwrap();
  let for_business = s.users_for_business(acme.contact_id).await.unwrap();
  let emails: Vec<_> = for_business.iter().map(|u| u.email.as_str()).collect();
  assert_eq!(emails, ["jane@example.com", "bob@example.com"]);

  let web = s.create_project(project("Website", acme.contact_id, lead.user_id)).await.unwrap();
  s.add_project_contact(web.project_id, bob.contact_id, vec![]).await.unwrap();
  let for_project = s.users_for_project(web.project_id).await.unwrap();
  assert_eq!(for_project.len(), 1);
  assert_eq!(for_project[0].email, "bob@example.com");
}

// ─── Registrations ───────────────────────────────────────────────────────────

#[tokio::test]
async fn activation_creates_a_linked_user_once() {
  let s = store().await;
  let (staff, _) = s.get_or_create_group("Staff".into()).await.unwrap();
  let contact = s.create_contact(person("Jane", "Doe", "jane@example.com")).await.unwrap();

  let reg = s
    .create_registration(NewRegistration::for_contact(&contact, vec![staff.group_id], Utc::now()))
    .await
    .unwrap();
  assert_eq!(reg.activation_key.len(), 40);
  assert!(!reg.activated);

  let user = s.activate_registration(activation(&reg.activation_key)).await.unwrap();
  assert_eq!(user.username, "jane-doe");
  assert_eq!(user.email, "jane@example.com");
  assert_eq!((user.first_name.as_str(), user.last_name.as_str()), ("Jane", "Doe"));
  assert!(user.is_active);
  assert!(user.check_password("s3cret"));
  assert_eq!(user.groups, vec![staff.group_id]);

  let linked = s.find_contact_by_user(user.user_id).await.unwrap().unwrap();
  assert_eq!(linked.contact_id, contact.contact_id);

  let stored = s.get_registration_by_key(reg.activation_key.clone()).await.unwrap().unwrap();
  assert!(stored.activated);

  let err = s.activate_registration(activation(&reg.activation_key)).await.unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::AlreadyActivated);
  assert_eq!(s.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn activation_uniquifies_usernames() {
  let s = store().await;
  s.create_user(new_user("jane-doe", "other@example.com")).await.unwrap();
  let contact = s.create_contact(person("Jane", "Doe", "jane@example.com")).await.unwrap();
  let reg = s
    .create_registration(NewRegistration::for_contact(&contact, vec![], Utc::now()))
    .await
    .unwrap();

  let user = s.activate_registration(activation(&reg.activation_key)).await.unwrap();
  assert_eq!(user.username, "jane-doe-2");
}

#[tokio::test]
async fn second_registration_cannot_relink_contact() {
  let s = store().await;
  let contact = s.create_contact(person("Jane", "Doe", "jane@example.com")).await.unwrap();
  let first = s
    .create_registration(NewRegistration::for_contact(&contact, vec![], Utc::now()))
    .await
    .unwrap();
  let second = s
    .create_registration(NewRegistration::for_contact(&contact, vec![], Utc::now()))
    .await
    .unwrap();

  let user = s.activate_registration(activation(&first.activation_key)).await.unwrap();
  let err = s.activate_registration(activation(&second.activation_key)).await.unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::Conflict);

  // Nothing from the failed activation survives.
  assert_eq!(s.list_users().await.unwrap().len(), 1);
  let linked = s.find_contact_by_user(user.user_id).await.unwrap().unwrap();
  assert_eq!(linked.contact_id, contact.contact_id);
  let stored = s.get_registration_by_key(second.activation_key.clone()).await.unwrap().unwrap();
  assert!(!stored.activated);
}

#[tokio::test]
async fn expired_registration_cannot_be_activated() {
  let s = store().await;
  let contact = s.create_contact(person("Jane", "Doe", "jane@example.com")).await.unwrap();
  let reg = s
    .create_registration(NewRegistration::for_contact(
      &contact,
      vec![],
      Utc::now() - Duration::days(16),
    ))
    .await
    .unwrap();

  let err = s.activate_registration(activation(&reg.activation_key)).await.unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::Expired);
  assert!(s.list_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_activation_key_is_not_found() {
  let s = store().await;
  let err = s.activate_registration(activation("nope")).await.unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::NotFound);
}
