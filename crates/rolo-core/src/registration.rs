//! Self-registration and account activation.
//!
//! A registration is `pending` until activated. Activation is terminal. A
//! pending registration becomes `expired` once more than the configured
//! number of days has passed since it was created; expiry is derived on
//! read and never stored.

use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
  Error, Result,
  contact::Contact,
  mail::{Mailer, OutgoingEmail, send_silently},
};

pub const DEFAULT_ACCOUNT_ACTIVATION_DAYS: u32 = 15;

/// Activation keys are stored in a 40-character column.
pub const ACTIVATION_KEY_LEN: usize = 40;

// ─── Settings ────────────────────────────────────────────────────────────────

fn default_activation_days() -> u32 { DEFAULT_ACCOUNT_ACTIVATION_DAYS }

/// Site identity used when rendering notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
  pub name:                    String,
  pub domain:                  String,
  pub default_from_email:      String,
  #[serde(default = "default_activation_days")]
  pub account_activation_days: u32,
}

impl Default for SiteSettings {
  fn default() -> Self {
    Self {
      name:                    "Rolo".to_owned(),
      domain:                  "localhost:8080".to_owned(),
      default_from_email:      "webmaster@localhost".to_owned(),
      account_activation_days: DEFAULT_ACCOUNT_ACTIVATION_DAYS,
    }
  }
}

// ─── Registration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
  Pending,
  Activated,
  Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRegistration {
  pub registration_id: Uuid,
  pub contact_id:      Uuid,
  pub date:            DateTime<Utc>,
  pub activation_key:  String,
  pub activated:       bool,
  /// Groups the activated account joins.
  pub groups:          Vec<Uuid>,
}

impl LoginRegistration {
  /// Saturates at the latest representable instant.
  pub fn expires_at(&self, activation_days: u32) -> DateTime<Utc> {
    activation_window(activation_days)
      .and_then(|window| self.date.checked_add_signed(window))
      .unwrap_or(DateTime::<Utc>::MAX_UTC)
  }

  /// True iff strictly more than `activation_days` have elapsed since the
  /// registration was created.
  pub fn has_expired(&self, now: DateTime<Utc>, activation_days: u32) -> bool {
    activation_window(activation_days).is_some_and(|window| now - self.date > window)
  }

  pub fn status(&self, now: DateTime<Utc>, activation_days: u32) -> RegistrationStatus {
    if self.activated {
      RegistrationStatus::Activated
    } else if self.has_expired(now, activation_days) {
      RegistrationStatus::Expired
    } else {
      RegistrationStatus::Pending
    }
  }

  /// Fails unless the registration is pending.
  pub fn ensure_activatable(&self, now: DateTime<Utc>, activation_days: u32) -> Result<()> {
    match self.status(now, activation_days) {
      RegistrationStatus::Pending => Ok(()),
      RegistrationStatus::Activated => Err(Error::AlreadyActivated(self.registration_id)),
      RegistrationStatus::Expired => Err(Error::RegistrationExpired(self.registration_id)),
    }
  }

  /// Render the activation notification for `contact`.
  pub fn render_email(&self, contact: &Contact, site: &SiteSettings) -> OutgoingEmail {
    let subject = render_subject(site);
    let body = format!(
      "Hello {contact},\n\
       \n\
       An account has been created for you at {site_name}. To activate it,\n\
       open the following link:\n\
       \n\
       http://{domain}/activate/{key}/\n\
       \n\
       The link is valid for {days} days.\n",
      contact = contact.display_name(),
      site_name = site.name,
      domain = site.domain,
      key = self.activation_key,
      days = site.account_activation_days,
    );

    OutgoingEmail {
      subject,
      body,
      from: site.default_from_email.clone(),
      to: vec![contact.email.clone()],
    }
  }

  /// Render the notification and either dispatch it now (`send = true`,
  /// failures swallowed) or hand its parts back for deferred sending.
  pub fn prepare_email(
    &self,
    contact: &Contact,
    site: &SiteSettings,
    mailer: &dyn Mailer,
    send: bool,
  ) -> PreparedEmail {
    let email = self.render_email(contact, site);
    if send {
      PreparedEmail::Sent(send_silently(mailer, &email))
    } else {
      PreparedEmail::Deferred(email)
    }
  }
}

/// Outcome of [`LoginRegistration::prepare_email`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedEmail {
  /// Dispatched; the flag reports whether the transport accepted it.
  Sent(bool),
  Deferred(OutgoingEmail),
}

/// `None` when the day count does not fit a [`Duration`].
fn activation_window(activation_days: u32) -> Option<Duration> {
  Duration::try_days(i64::from(activation_days))
}

fn render_subject(site: &SiteSettings) -> String {
  let rendered = format!("Account activation on\n{}\n", site.name);
  // Subjects must stay on one line.
  rendered.lines().map(str::trim).collect::<Vec<_>>().join(" ").trim().to_owned()
}

/// A fresh activation key: SHA-256 over a random salt and the email address,
/// hex-encoded and cut to [`ACTIVATION_KEY_LEN`].
pub fn generate_activation_key(email: &str) -> String {
  let mut salt = [0_u8; 16];
  OsRng.fill_bytes(&mut salt);
  let digest = Sha256::new()
    .chain_update(salt)
    .chain_update(email.as_bytes())
    .finalize();
  let mut key = hex::encode(digest);
  key.truncate(ACTIVATION_KEY_LEN);
  key
}

/// Input to [`crate::store::CrmStore::create_registration`].
#[derive(Debug, Clone)]
pub struct NewRegistration {
  pub contact_id:     Uuid,
  pub date:           DateTime<Utc>,
  pub activation_key: String,
  pub groups:         Vec<Uuid>,
}

impl NewRegistration {
  /// A registration for `contact` created at `now` with a fresh key.
  pub fn for_contact(contact: &Contact, groups: Vec<Uuid>, now: DateTime<Utc>) -> Self {
    Self {
      contact_id: contact.contact_id,
      date: now,
      activation_key: generate_activation_key(&contact.email),
      groups,
    }
  }
}

/// Input to [`crate::store::CrmStore::activate_registration`].
#[derive(Debug, Clone)]
pub struct Activation {
  pub activation_key:  String,
  /// Argon2 PHC string for the new account.
  pub password_hash:   String,
  pub now:             DateTime<Utc>,
  pub activation_days: u32,
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::{contact::ContactKind, mail::MemoryMailer};

  fn jane() -> Contact {
    Contact {
      contact_id:     Uuid::new_v4(),
      kind:           ContactKind::Individual,
      user_id:        None,
      name:           String::new(),
      first_name:     "Jane".into(),
      middle_name:    String::new(),
      last_name:      "Doe".into(),
      sort_name:      "Doe, Jane".into(),
      slug:           "jane-doe".into(),
      email:          "jane@example.com".into(),
      description:    None,
      notes:          None,
      picture:        None,
      business_types: Vec::new(),
      locations:      Vec::new(),
      created_at:     Utc::now(),
    }
  }

  fn registration(date: DateTime<Utc>) -> LoginRegistration {
    LoginRegistration {
      registration_id: Uuid::new_v4(),
      contact_id:      Uuid::new_v4(),
      date,
      activation_key:  "k".repeat(ACTIVATION_KEY_LEN),
      activated:       false,
      groups:          Vec::new(),
    }
  }

  #[test]
  fn expiry_window_is_exclusive() {
    let day0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let reg = registration(day0);

    assert!(!reg.has_expired(day0 + Duration::days(14), 15));
    assert!(!reg.has_expired(day0 + Duration::days(15), 15));
    assert!(reg.has_expired(day0 + Duration::days(15) + Duration::seconds(1), 15));
    assert!(reg.has_expired(day0 + Duration::days(16), 15));
  }

  #[test]
  fn oversized_activation_window_never_expires() {
    let day0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let reg = registration(day0);

    assert_eq!(reg.expires_at(4_000_000_000), DateTime::<Utc>::MAX_UTC);
    assert!(!reg.has_expired(day0 + Duration::days(10_000), 4_000_000_000));
    assert_eq!(reg.status(day0, u32::MAX), RegistrationStatus::Pending);
    assert_eq!(reg.expires_at(15), day0 + Duration::days(15));
  }

  #[test]
  fn status_transitions() {
    let day0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let mut reg = registration(day0);
    assert_eq!(reg.status(day0, 15), RegistrationStatus::Pending);
    assert_eq!(reg.status(day0 + Duration::days(16), 15), RegistrationStatus::Expired);

    reg.activated = true;
    // Activation is terminal even past the expiry window.
    assert_eq!(reg.status(day0 + Duration::days(16), 15), RegistrationStatus::Activated);
    assert!(matches!(
      reg.ensure_activatable(day0, 15),
      Err(Error::AlreadyActivated(_))
    ));
  }

  #[test]
  fn expired_registration_cannot_activate() {
    let day0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let reg = registration(day0);
    assert!(matches!(
      reg.ensure_activatable(day0 + Duration::days(16), 15),
      Err(Error::RegistrationExpired(_))
    ));
  }

  #[test]
  fn activation_key_shape() {
    let a = generate_activation_key("jane@example.com");
    let b = generate_activation_key("jane@example.com");
    assert_eq!(a.len(), ACTIVATION_KEY_LEN);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, b);
  }

  #[test]
  fn email_mentions_key_and_expiry() {
    let reg = registration(Utc::now());
    let site = SiteSettings { name: "Example CRM".into(), ..SiteSettings::default() };
    let email = reg.render_email(&jane(), &site);

    assert_eq!(email.subject, "Account activation on Example CRM");
    assert!(!email.subject.contains('\n'));
    assert!(email.body.contains(&reg.activation_key));
    assert!(email.body.contains("valid for 15 days"));
    assert!(email.body.starts_with("Hello Jane Doe,"));
    assert_eq!(email.to, vec!["jane@example.com".to_string()]);
    assert_eq!(email.from, site.default_from_email);
  }

  #[test]
  fn prepare_email_send_or_defer() {
    let reg = registration(Utc::now());
    let site = SiteSettings::default();
    let mailer = MemoryMailer::new();

    let deferred = reg.prepare_email(&jane(), &site, &mailer, false);
    assert!(matches!(deferred, PreparedEmail::Deferred(ref e) if e.body.contains(&reg.activation_key)));
    assert!(mailer.outbox().is_empty());

    let sent = reg.prepare_email(&jane(), &site, &mailer, true);
    assert_eq!(sent, PreparedEmail::Sent(true));
    assert_eq!(mailer.outbox().len(), 1);
  }
}
