//! Outbound mail contract.
//!
//! The CRM only ever sends notifications, and delivery failures are never
//! surfaced to the caller: [`send_silently`] logs and reports a boolean.

use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

/// A fully-rendered message ready for a [`Mailer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
  pub subject: String,
  pub body:    String,
  pub from:    String,
  pub to:      Vec<String>,
}

#[derive(Debug, Error)]
pub enum MailError {
  #[error("message has no recipients")]
  NoRecipients,

  #[error("mail transport error: {0}")]
  Transport(String),
}

/// A mail transport.
pub trait Mailer: Send + Sync {
  fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Dispatch `email`, swallowing any failure. Returns whether it was sent.
pub fn send_silently(mailer: &dyn Mailer, email: &OutgoingEmail) -> bool {
  let result = if email.to.iter().all(|addr| addr.trim().is_empty()) {
    Err(MailError::NoRecipients)
  } else {
    mailer.send(email)
  };
  match result {
    Ok(()) => true,
    Err(e) => {
      tracing::warn!(error = %e, to = ?email.to, "failed to send email");
      false
    }
  }
}

/// Keeps every message in memory instead of delivering it.
#[derive(Debug, Default)]
pub struct MemoryMailer {
  outbox: Mutex<Vec<OutgoingEmail>>,
}

impl MemoryMailer {
  pub fn new() -> Self { Self::default() }

  /// Messages accepted so far, oldest first.
  pub fn outbox(&self) -> Vec<OutgoingEmail> {
    self
      .outbox
      .lock()
      .map(|outbox| outbox.clone())
      .unwrap_or_default()
  }
}

impl Mailer for MemoryMailer {
  fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
    self
      .outbox
      .lock()
      .map_err(|e| MailError::Transport(e.to_string()))?
      .push(email.clone());
    Ok(())
  }
}
