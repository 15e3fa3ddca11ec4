//! Projects: units of client work owned by a business contact.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Placeholder replaced by the trac environment in the configured URL.
const TRAC_PLACEHOLDER: &str = "%s";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
  Consultation,
  Software,
}

impl ProjectType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Consultation => "consultation",
      Self::Software => "software",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Consultation => "Consultation",
      Self::Software => "Software Project",
    }
  }
}

impl FromStr for ProjectType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "consultation" => Ok(Self::Consultation),
      "software" => Ok(Self::Software),
      other => Err(Error::unknown("project type", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
  Requested,
  Accepted,
  Finished,
}

impl ProjectStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Requested => "requested",
      Self::Accepted => "accepted",
      Self::Finished => "finished",
    }
  }
}

impl FromStr for ProjectStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "requested" => Ok(Self::Requested),
      "accepted" => Ok(Self::Accepted),
      "finished" => Ok(Self::Finished),
      other => Err(Error::unknown("project status", other)),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
  pub project_id:       Uuid,
  pub name:             String,
  pub trac_environment: Option<String>,
  /// The business contact that owns the project.
  pub business_id:      Uuid,
  /// Staff user responsible for the project.
  pub point_person_id:  Uuid,
  pub kind:             ProjectType,
  pub status:           ProjectStatus,
  pub description:      String,
}

impl Project {
  /// Fill the trac environment into `template`'s `%s` placeholder.
  pub fn trac_url(&self, template: Option<&str>) -> Option<String> {
    let env = self.trac_environment.as_deref().filter(|e| !e.is_empty())?;
    Some(template?.replacen(TRAC_PLACEHOLDER, env, 1))
  }
}

impl fmt::Display for Project {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}

/// Input to [`crate::store::CrmStore::create_project`].
#[derive(Debug, Clone)]
pub struct NewProject {
  pub name:             String,
  pub trac_environment: Option<String>,
  pub business_id:      Uuid,
  pub point_person_id:  Uuid,
  pub kind:             ProjectType,
  pub status:           ProjectStatus,
  pub description:      String,
}

/// Filter for [`crate::store::CrmStore::list_projects`].
#[derive(Debug, Clone, Default)]
pub struct ProjectQuery {
  /// Restrict to projects owned by this business.
  pub business_id: Option<Uuid>,
  /// Restrict to projects this contact is a member of.
  pub contact_id:  Option<Uuid>,
}
