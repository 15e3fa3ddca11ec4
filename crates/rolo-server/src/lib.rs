//! Server wiring for Rolo: configuration, the outbound mailer, and the
//! top-level router.

use std::{path::{Path, PathBuf}, sync::Arc};

use axum::Router;
use config::{Config, ConfigError, Environment, File};
use rolo_api::{ApiSettings, api_router};
use rolo_core::{
  mail::{MailError, Mailer, OutgoingEmail},
  registration::{DEFAULT_ACCOUNT_ACTIVATION_DAYS, SiteSettings},
  store::CrmStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/rolo/rolo.db") }
fn default_site_name() -> String { "Rolo".to_owned() }
fn default_site_domain() -> String { "localhost:8080".to_owned() }
fn default_from_email() -> String { "webmaster@localhost".to_owned() }
fn default_activation_days() -> u32 { DEFAULT_ACCOUNT_ACTIVATION_DAYS }

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROLO_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                    String,
  #[serde(default = "default_port")]
  pub port:                    u16,
  #[serde(default = "default_store_path")]
  pub store_path:              PathBuf,
  #[serde(default = "default_site_name")]
  pub site_name:               String,
  #[serde(default = "default_site_domain")]
  pub site_domain:             String,
  #[serde(default = "default_from_email")]
  pub default_from_email:      String,
  #[serde(default = "default_activation_days")]
  pub account_activation_days: u32,
  /// Project trac link template; `%s` is replaced by the environment name.
  #[serde(default)]
  pub trac_url:                Option<String>,
}

impl ServerConfig {
  /// Read `path` (optional) layered under `ROLO_*` environment variables.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(Environment::with_prefix("ROLO"))
      .build()?
      .try_deserialize()
  }

  pub fn api_settings(&self) -> ApiSettings {
    ApiSettings {
      site:     SiteSettings {
        name:                    self.site_name.clone(),
        domain:                  self.site_domain.clone(),
        default_from_email:      self.default_from_email.clone(),
        account_activation_days: self.account_activation_days,
      },
      trac_url: self.trac_url.clone(),
    }
  }
}

// ─── Mail ─────────────────────────────────────────────────────────────────────

/// Records outgoing mail in the log instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
  fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
    tracing::info!(
      subject = %email.subject,
      from = %email.from,
      to = ?email.to,
      "outgoing email"
    );
    tracing::debug!(body = %email.body);
    Ok(())
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The API mounted under `/api`, with request tracing.
pub fn app<S>(store: Arc<S>, mailer: Arc<dyn Mailer>, config: &ServerConfig) -> Router
where
  S: CrmStore + 'static,
{
  Router::new()
    .nest("/api", api_router(store, mailer, config.api_settings()))
    .layer(TraceLayer::new_for_http())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use config::FileFormat;
  use rolo_core::mail::send_silently;
  use rolo_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse("");
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.account_activation_days, 15);
    assert!(cfg.trac_url.is_none());
  }

  #[test]
  fn site_settings_come_from_flat_keys() {
    let cfg = parse(
      r#"
        port = 9000
        site_name = "Example CRM"
        default_from_email = "crm@example.com"
        account_activation_days = 7
        trac_url = "https://trac.example.com/%s/"
      "#,
    );
    let settings = cfg.api_settings();
    assert_eq!(cfg.port, 9000);
    assert_eq!(settings.site.name, "Example CRM");
    assert_eq!(settings.site.default_from_email, "crm@example.com");
    assert_eq!(settings.site.account_activation_days, 7);
    assert_eq!(settings.trac_url.as_deref(), Some("https://trac.example.com/%s/"));
  }

  #[test]
  fn missing_file_is_not_an_error() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/rolo.toml")).unwrap();
    assert!(!cfg.site_name.is_empty());
  }

  #[test]
  fn log_mailer_accepts_mail() {
    let email = OutgoingEmail {
      subject: "Hello".into(),
      body:    "Body".into(),
      from:    "crm@example.com".into(),
      to:      vec!["jane@example.com".into()],
    };
    assert!(send_silently(&LogMailer, &email));
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/rolo.db")), PathBuf::from(home).join("rolo.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/rolo.db")), PathBuf::from("/tmp/rolo.db"));
  }

  #[tokio::test]
  async fn api_is_mounted_under_prefix() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let app = app(store, Arc::new(LogMailer), &parse(""));

    let req = Request::builder().uri("/api/contacts").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, serde_json::json!([]));

    let req = Request::builder().uri("/contacts").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
