//! Interactions: the communication log.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
  Email,
  Meeting,
  Phone,
  Business,
  Exchange,
}

impl InteractionType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Email => "email",
      Self::Meeting => "meeting",
      Self::Phone => "phone",
      Self::Business => "business",
      Self::Exchange => "exchange",
    }
  }
}

impl FromStr for InteractionType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "email" => Ok(Self::Email),
      "meeting" => Ok(Self::Meeting),
      "phone" => Ok(Self::Phone),
      "business" => Ok(Self::Business),
      "exchange" => Ok(Self::Exchange),
      other => Err(Error::unknown("interaction type", other)),
    }
  }
}

/// A logged communication event. Listings are newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
  pub interaction_id: Uuid,
  pub date:           DateTime<Utc>,
  pub kind:           InteractionType,
  pub completed:      bool,
  pub project_id:     Option<Uuid>,
  pub memo:           String,
  /// Call-detail-record reference for phone interactions.
  pub cdr_id:         Option<String>,
  pub contacts:       Vec<Uuid>,
}

impl fmt::Display for Interaction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.date.format("%m/%d/%y"), self.kind.as_str())
  }
}

/// Input to [`crate::store::CrmStore::create_interaction`].
#[derive(Debug, Clone)]
pub struct NewInteraction {
  pub date:       DateTime<Utc>,
  pub kind:       InteractionType,
  pub completed:  bool,
  pub project_id: Option<Uuid>,
  pub memo:       String,
  pub cdr_id:     Option<String>,
  pub contacts:   Vec<Uuid>,
}
