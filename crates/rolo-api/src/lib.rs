//! JSON REST API for Rolo.
//!
//! Exposes an axum [`Router`] backed by any [`rolo_core::store::CrmStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility; the
//! identity of the acting CRM user is passed explicitly where a form needs it.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rolo_api::api_router(store.clone(), mailer, settings))
//! ```

pub mod contacts;
pub mod email;
pub mod error;
pub mod interactions;
pub mod lookups;
pub mod projects;
pub mod registrations;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use rolo_core::{mail::Mailer, registration::SiteSettings, store::CrmStore};
use serde::Deserialize;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Site-wide settings the handlers render with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiSettings {
  #[serde(default)]
  pub site:     SiteSettings,
  /// Link template for a project's trac environment, e.g.
  /// `https://trac.example.com/%s/`.
  #[serde(default)]
  pub trac_url: Option<String>,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:    Arc<S>,
  pub mailer:   Arc<dyn Mailer>,
  pub settings: Arc<ApiSettings>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      mailer:   self.mailer.clone(),
      settings: self.settings.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(
  store: Arc<S>,
  mailer: Arc<dyn Mailer>,
  settings: ApiSettings,
) -> Router<()>
where
  S: CrmStore + 'static,
{
  let state = ApiState { store, mailer, settings: Arc::new(settings) };

  Router::new()
    // Contacts
    .route("/contacts", get(contacts::list::<S>).post(contacts::create::<S>))
    .route("/contacts/{id}", get(contacts::get_one::<S>))
    .route("/contacts/{id}/profile", put(contacts::save_profile::<S>))
    .route(
      "/contacts/{id}/relations",
      get(contacts::relations::<S>).post(contacts::relate::<S>),
    )
    .route("/contacts/{id}/relations/{to}", put(contacts::set_relation_types::<S>))
    .route("/businesses", post(contacts::create_business::<S>))
    // Lookup tables
    .route(
      "/business-types",
      get(lookups::list_business_types::<S>).post(lookups::create_business_type::<S>),
    )
    .route(
      "/relationship-types",
      get(lookups::list_relationship_types::<S>)
        .post(lookups::create_relationship_type::<S>),
    )
    .route("/relationship-types/{id}", put(lookups::rename_relationship_type::<S>))
    // Projects
    .route("/projects", get(projects::list::<S>).post(projects::create::<S>))
    .route("/projects/choices", get(projects::choices::<S>))
    .route("/projects/{id}", get(projects::get_one::<S>))
    .route(
      "/projects/{id}/contacts",
      get(projects::members::<S>).post(projects::add_member::<S>),
    )
    .route("/projects/{id}/contacts/{contact}", put(projects::set_member_types::<S>))
    // Interactions
    .route(
      "/interactions",
      get(interactions::list::<S>).post(interactions::create::<S>),
    )
    .route("/interactions/project-choices", get(interactions::project_choices::<S>))
    .route(
      "/interactions/{id}",
      get(interactions::get_one::<S>).put(interactions::update::<S>),
    )
    // Email
    .route("/email", post(email::send::<S>))
    .route("/email/recipients", get(email::recipients::<S>))
    // Registrations
    .route("/registrations", post(registrations::create::<S>))
    .route("/registrations/{key}", get(registrations::status::<S>))
    .route("/registrations/{key}/activate", post(registrations::activate::<S>))
    .with_state(state)
}
