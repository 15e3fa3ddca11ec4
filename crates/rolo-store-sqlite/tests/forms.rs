//! Form validation and persistence against a real store.

use chrono::{TimeZone, Utc};
use rolo_core::{
  account::{NewUser, User},
  contact::{Contact, NewBusinessType, NewContact},
  forms::{
    FormError, INVALID_CHOICE, REQUIRED,
    business::BusinessForm,
    contact::{EMAIL_TAKEN, PersonForm, ProfileForm},
    email::{EmailForm, EmailScope, UNKNOWN_RECIPIENT, recipient_label},
    interaction::{InteractionContext, InteractionForm},
    project::ProjectForm,
    relationship::{BusinessRelationshipForm, ProjectRelationshipForm},
  },
  interaction::InteractionType,
  project::{Project, ProjectStatus, ProjectType},
  registration::{Activation, NewRegistration, SiteSettings},
  relationship::SaveRelationshipType,
  store::{ClassifyError, CrmStore, StoreErrorKind},
};
use rolo_store_sqlite::SqliteStore;
use uuid::Uuid;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn staff(s: &SqliteStore, username: &str, is_staff: bool) -> User {
  s.create_user(NewUser {
    username:      username.into(),
    email:         format!("{username}@example.com"),
    password_hash: String::new(),
    first_name:    username.into(),
    last_name:     "Staff".into(),
    is_staff,
    is_active:     true,
  })
  .await
  .unwrap()
}

async fn client_business(s: &SqliteStore, name: &str) -> Contact {
  let types = s.list_business_types().await.unwrap();
  let client = match types.into_iter().find(|bt| bt.is_client()) {
    Some(bt) => bt,
    None => s
      .create_business_type(NewBusinessType { name: "Client".into(), can_view_all_projects: false })
      .await
      .unwrap(),
  };
  let mut input = NewContact::business(name);
  input.business_types = vec![client.business_type_id];
  s.create_contact(input).await.unwrap()
}

fn project_form(name: &str, business: Option<Uuid>, point_person: Option<Uuid>) -> ProjectForm {
  ProjectForm {
    name: name.into(),
    business,
    trac_environment: None,
    point_person,
    kind: Some(ProjectType::Consultation),
    status: Some(ProjectStatus::Requested),
    description: "Scope TBD".into(),
  }
}

fn invalid<T: std::fmt::Debug, E: std::fmt::Debug>(
  result: Result<T, FormError<E>>,
) -> rolo_core::forms::ValidationErrors {
  match result {
    Err(FormError::Invalid(errors)) => errors,
    other => panic!("expected validation failure, got {other:?}"),
  }
}

// ─── PersonForm ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn person_form_requires_names_and_valid_email() {
  let s = store().await;
  let errors = invalid(
    PersonForm { first_name: " ".into(), last_name: String::new(), email: "nope".into() }
      .save(&s, None)
      .await,
  );
  assert_eq!(errors.field("first_name"), [REQUIRED]);
  assert_eq!(errors.field("last_name"), [REQUIRED]);
  assert!(errors.contains("email"));
  assert!(s.list_contacts(Default::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn person_form_rejects_taken_email_only_on_signup() {
  let s = store().await;
  staff(&s, "jane", false).await;

  let form = PersonForm {
    first_name: "Jane".into(),
    last_name:  "Doe".into(),
    email:      "JANE@example.com".into(),
  };
  let errors = invalid(form.clone().save(&s, None).await);
  assert_eq!(errors.field("email"), [EMAIL_TAKEN]);

  let other = PersonForm { email: "jd@example.com".into(), ..form.clone() }
    .save(&s, None)
    .await
    .unwrap();
  assert_eq!(other.sort_name, "Doe, Jane");

  // Editing an existing contact may keep any address.
  let edited = form.save(&s, Some(other.clone())).await.unwrap();
  assert_eq!(edited.contact_id, other.contact_id);
  assert_eq!(edited.email, "JANE@example.com");
}

#[tokio::test]
async fn person_form_enforces_name_length() {
  let s = store().await;
  let errors = invalid(
    PersonForm {
      first_name: "x".repeat(51),
      last_name:  "Doe".into(),
      email:      "x@example.com".into(),
    }
    .save(&s, None)
    .await,
  );
  assert_eq!(
    errors.field("first_name"),
    ["Ensure this value has at most 50 characters (it has 51)."]
  );
}

#[tokio::test]
async fn profile_form_saves_onto_the_users_contact() {
  let s = store().await;
  let contact = PersonForm {
    first_name: "Jane".into(),
    last_name:  "Doe".into(),
    email:      "jane@example.com".into(),
  }
  .save(&s, None)
  .await
  .unwrap();
  let reg = s
    .create_registration(NewRegistration::for_contact(&contact, vec![], Utc::now()))
    .await
    .unwrap();
  let user = s
    .activate_registration(Activation {
      activation_key:  reg.activation_key,
      password_hash:   String::new(),
      now:             Utc::now(),
      activation_days: 15,
    })
    .await
    .unwrap();

  let saved = ProfileForm { notes: Some("  hi  ".into()), picture: Some(" ".into()) }
    .save(&s, user.user_id)
    .await
    .unwrap();
  assert_eq!(saved.notes.as_deref(), Some("hi"));
  assert_eq!(saved.picture, None);
}

// ─── BusinessForm ────────────────────────────────────────────────────────────

#[tokio::test]
async fn business_form_checks_business_types() {
  let s = store().await;
  let acme = client_business(&s, "Seed").await;
  let client_type = acme.business_types[0];

  let errors = invalid(
    BusinessForm {
      name:           "Acme".into(),
      description:    None,
      notes:          None,
      business_types: vec![Uuid::new_v4()],
    }
    .save(&s, None)
    .await,
  );
  assert!(errors.contains("business_types"));

  let saved = BusinessForm {
    name:           " Acme ".into(),
    description:    Some("Widgets".into()),
    notes:          None,
    business_types: vec![client_type, client_type],
  }
  .save(&s, None)
  .await
  .unwrap();
  assert_eq!(saved.name, "Acme");
  assert_eq!(saved.slug, "acme");
  assert_eq!(saved.business_types, vec![client_type]);
}

// ─── Relationship forms ──────────────────────────────────────────────────────

#[tokio::test]
async fn business_relationship_form_validates_and_detects_duplicates() {
  let s = store().await;
  let jane = s.create_contact(NewContact::individual("Jane", "Doe")).await.unwrap();
  let acme = s.create_contact(NewContact::business("Acme")).await.unwrap();
  let employee = s
    .save_relationship_type(SaveRelationshipType { id: None, name: "Employee".into() })
    .await
    .unwrap();

  let errors = invalid(
    BusinessRelationshipForm { types: vec![] }
      .create(&s, jane.contact_id, jane.contact_id)
      .await,
  );
  assert!(errors.contains("to_contact"));

  let errors = invalid(
    BusinessRelationshipForm { types: vec![Uuid::new_v4()] }
      .create(&s, jane.contact_id, acme.contact_id)
      .await,
  );
  assert!(errors.contains("types"));

  let rel = BusinessRelationshipForm { types: vec![employee.relationship_type_id] }
    .create(&s, jane.contact_id, acme.contact_id)
    .await
    .unwrap();
  assert_eq!(rel.types, vec![employee.relationship_type_id]);

  match BusinessRelationshipForm::default()
    .create(&s, jane.contact_id, acme.contact_id)
    .await
  {
    Err(FormError::Store(err)) => assert_eq!(err.kind(), StoreErrorKind::Conflict),
    other => panic!("expected conflict, got {other:?}"),
  }

  let cleared = BusinessRelationshipForm::default()
    .save(&s, jane.contact_id, acme.contact_id)
    .await
    .unwrap();
  assert!(cleared.types.is_empty());
}

#[tokio::test]
async fn project_relationship_form_tags_members() {
  let s = store().await;
  let lead = staff(&s, "lead", true).await;
  let acme = client_business(&s, "Acme").await;
  let jane = s.create_contact(NewContact::individual("Jane", "Doe")).await.unwrap();
  let billing = s
    .save_relationship_type(SaveRelationshipType { id: None, name: "Billing".into() })
    .await
    .unwrap();
  let project = project_form("Site", Some(acme.contact_id), Some(lead.user_id))
    .save(&s, None)
    .await
    .unwrap();

  let errors = invalid(
    ProjectRelationshipForm::default()
      .create(&s, project.project_id, Uuid::new_v4())
      .await,
  );
  assert_eq!(errors.field("contact"), [INVALID_CHOICE]);

  ProjectRelationshipForm::default()
    .create(&s, project.project_id, jane.contact_id)
    .await
    .unwrap();
  let rel = ProjectRelationshipForm { types: vec![billing.relationship_type_id] }
    .save(&s, project.project_id, jane.contact_id)
    .await
    .unwrap();
  assert_eq!(rel.types, vec![billing.relationship_type_id]);
}

// ─── ProjectForm ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn project_form_reports_every_missing_field() {
  let s = store().await;
  let errors = invalid(
    ProjectForm {
      name:             String::new(),
      business:         None,
      trac_environment: None,
      point_person:     None,
      kind:             None,
      status:           None,
      description:      String::new(),
    }
    .save(&s, None)
    .await,
  );
  for field in ["name", "description", "business", "point_person", "type", "status"] {
    assert_eq!(errors.field(field), [REQUIRED], "{field}");
  }
}

#[tokio::test]
async fn project_form_restricts_business_and_point_person() {
  let s = store().await;
  let lead = staff(&s, "lead", true).await;
  let outsider = staff(&s, "outsider", false).await;
  let acme = client_business(&s, "Acme").await;
  let vendor = s.create_contact(NewContact::business("Vendor")).await.unwrap();

  let errors = invalid(
    project_form("Site", Some(vendor.contact_id), Some(outsider.user_id))
      .save(&s, None)
      .await,
  );
  assert_eq!(errors.field("business"), [INVALID_CHOICE]);
  assert_eq!(errors.field("point_person"), [INVALID_CHOICE]);

  let choices = ProjectForm::business_choices(&s).await.unwrap();
  assert_eq!(choices.iter().map(|c| c.value).collect::<Vec<_>>(), vec![acme.contact_id]);
  let people = ProjectForm::point_person_choices(&s).await.unwrap();
  assert_eq!(people.iter().map(|c| c.value).collect::<Vec<_>>(), vec![lead.user_id]);

  // A bound business wins over the submitted one, client or not.
  let project = project_form("Site", Some(acme.contact_id), Some(lead.user_id))
    .save(&s, Some(&vendor))
    .await
    .unwrap();
  assert_eq!(project.business_id, vendor.contact_id);
}

// ─── InteractionForm ─────────────────────────────────────────────────────────

struct World {
  store:   SqliteStore,
  me:      Contact,
  jane:    Contact,
  acme:    Contact,
  project: Project,
}

/// Jane works at client Acme and is on Acme's project; `me` is the CRM user.
async fn world() -> World {
  let s = store().await;
  let lead = staff(&s, "lead", true).await;
  let acme = client_business(&s, "Acme").await;
  let mut jane = NewContact::individual("Jane", "Doe");
  jane.email = "jane@example.com".into();
  let jane = s.create_contact(jane).await.unwrap();
  let me = s.create_contact(NewContact::individual("Carl", "Crm")).await.unwrap();
  s.create_contact_relationship(jane.contact_id, acme.contact_id, vec![]).await.unwrap();
  let project = project_form("Site", None, Some(lead.user_id))
    .save(&s, Some(&acme))
    .await
    .unwrap();
  s.add_project_contact(project.project_id, jane.contact_id, vec![]).await.unwrap();
  World { store: s, me, jane, acme, project }
}

fn call(project: Option<Uuid>, contacts: Vec<Uuid>) -> InteractionForm {
  InteractionForm {
    date: None,
    kind: Some(InteractionType::Phone),
    completed: true,
    contacts,
    project,
    memo: " left a message ".into(),
  }
}

#[tokio::test]
async fn new_interaction_includes_person_and_crm_user() {
  let w = world().await;
  let ctx = InteractionContext {
    person:   Some(w.jane.clone()),
    crm_user: Some(w.me.clone()),
    instance: None,
  };
  assert_eq!(ctx.initial_contacts(), vec![w.jane.contact_id, w.me.contact_id]);

  let choices = ctx.project_choices(&w.store).await.unwrap();
  assert_eq!(choices.iter().map(|p| p.project_id).collect::<Vec<_>>(), vec![w.project.project_id]);

  let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
  let saved = call(Some(w.project.project_id), vec![])
    .save(&w.store, &ctx, now)
    .await
    .unwrap();
  assert_eq!(saved.date, now);
  assert_eq!(saved.memo, "left a message");
  assert!(saved.contacts.contains(&w.jane.contact_id));
  assert!(saved.contacts.contains(&w.me.contact_id));
  assert_eq!(saved.project_id, Some(w.project.project_id));
}

#[tokio::test]
async fn interaction_project_must_be_a_choice() {
  let w = world().await;
  let ctx = InteractionContext { person: Some(w.me.clone()), crm_user: None, instance: None };

  let errors = invalid(
    call(Some(w.project.project_id), vec![])
      .save(&w.store, &ctx, Utc::now())
      .await,
  );
  assert_eq!(errors.field("project"), [INVALID_CHOICE]);

  let errors = invalid(
    InteractionForm { kind: None, ..call(None, vec![Uuid::new_v4()]) }
      .save(&w.store, &InteractionContext::default(), Utc::now())
      .await,
  );
  assert_eq!(errors.field("type"), [REQUIRED]);
  assert!(errors.contains("contacts"));
}

#[tokio::test]
async fn existing_interaction_offers_client_projects() {
  let w = world().await;
  let ctx = InteractionContext {
    person:   Some(w.jane.clone()),
    crm_user: None,
    instance: None,
  };
  let saved = call(None, vec![]).save(&w.store, &ctx, Utc::now()).await.unwrap();

  // Jane is related to client Acme, which owns the project.
  let edit = InteractionContext { person: None, crm_user: None, instance: Some(saved.clone()) };
  let choices = edit.project_choices(&w.store).await.unwrap();
  assert_eq!(choices.iter().map(|p| p.project_id).collect::<Vec<_>>(), vec![w.project.project_id]);

  let updated = call(Some(w.project.project_id), vec![w.acme.contact_id])
    .save(&w.store, &edit, Utc::now())
    .await
    .unwrap();
  assert_eq!(updated.interaction_id, saved.interaction_id);
  assert_eq!(updated.contacts, vec![w.acme.contact_id]);

  // A contact with no client ties offers nothing.
  let lonely = InteractionContext {
    instance: Some(rolo_core::interaction::Interaction { contacts: vec![w.me.contact_id], ..saved }),
    ..InteractionContext::default()
  };
  assert!(lonely.project_choices(&w.store).await.unwrap().is_empty());
}

// ─── EmailForm ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn email_form_validates_recipient_and_memo() {
  let w = world().await;
  let errors = invalid(
    EmailForm { to: None, memo: "  ".into() }
      .clean(&w.store, EmailScope::default())
      .await,
  );
  assert_eq!(errors.field("to"), [REQUIRED]);
  assert_eq!(errors.field("memo"), [REQUIRED]);

  let errors = invalid(
    EmailForm { to: Some(Uuid::new_v4()), memo: "x".repeat(4097) }
      .clean(&w.store, EmailScope::default())
      .await,
  );
  assert_eq!(errors.field("to"), [UNKNOWN_RECIPIENT]);
  assert!(errors.contains("memo"));
}

#[tokio::test]
async fn email_scope_limits_recipients() {
  let w = world().await;
  let reg = w
    .store
    .create_registration(NewRegistration::for_contact(&w.jane, vec![], Utc::now()))
    .await
    .unwrap();
  let jane_user = w
    .store
    .activate_registration(Activation {
      activation_key:  reg.activation_key,
      password_hash:   String::new(),
      now:             Utc::now(),
      activation_days: 15,
    })
    .await
    .unwrap();
  let lead = w.store.list_users().await.unwrap().into_iter().find(|u| u.username == "lead").unwrap();

  let scope = EmailScope { project_id: Some(w.project.project_id), business_id: None };
  let choices = scope.choices(&w.store).await.unwrap().unwrap();
  assert_eq!(choices.len(), 1);
  assert_eq!(choices[0].label, recipient_label(&jane_user));
  assert_eq!(choices[0].label, "Jane Doe (jane@example.com)");

  let errors = invalid(
    EmailForm { to: Some(lead.user_id), memo: "hi".into() }
      .clean(&w.store, scope)
      .await,
  );
  assert_eq!(errors.field("to"), [INVALID_CHOICE]);

  let cleaned = EmailForm { to: Some(jane_user.user_id), memo: " status update ".into() }
    .clean(&w.store, EmailScope { project_id: None, business_id: Some(w.acme.contact_id) })
    .await
    .unwrap();
  let email = cleaned.compose(&SiteSettings::default());
  assert_eq!(email.subject, "Message from Rolo");
  assert_eq!(email.body, "status update");
  assert_eq!(email.to, vec!["jane@example.com".to_owned()]);
}
