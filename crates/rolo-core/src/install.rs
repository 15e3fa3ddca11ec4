//! Permission bootstrap: seeds the permission catalogue and the two role
//! groups the CRM expects.

use serde::Serialize;

use crate::{
  account::{AUTH_APP, CRM_APP, permission_catalogue},
  store::CrmStore,
};

pub const CRM_ADMIN_GROUP: &str = "CRM Admin";
pub const PAGELET_ADMIN_GROUP: &str = "Pagelet Admin";

/// What [`install`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
  pub permissions:    usize,
  /// Names of the groups created by this run.
  pub groups_created: Vec<String>,
  pub grants:         usize,
}

/// Seed permissions and role groups. Permissions are only granted to a group
/// on the run that creates it.
pub async fn install<S: CrmStore>(store: &S) -> Result<InstallReport, S::Error> {
  let mut report = InstallReport::default();

  for perm in permission_catalogue() {
    store.ensure_permission(perm).await?;
    report.permissions += 1;
  }
  let permissions = store.list_permissions().await?;

  let (crm_admin, created) =
    store.get_or_create_group(CRM_ADMIN_GROUP.to_owned()).await?;
  if created {
    report.groups_created.push(crm_admin.name.clone());
    for perm in permissions
      .iter()
      .filter(|p| p.app_label == CRM_APP || p.app_label == AUTH_APP)
    {
      store.grant_permission(crm_admin.group_id, perm.permission_id).await?;
      report.grants += 1;
    }
  }

  let (pagelet_admin, created) =
    store.get_or_create_group(PAGELET_ADMIN_GROUP.to_owned()).await?;
  if created {
    report.groups_created.push(pagelet_admin.name.clone());
    for perm in permissions
      .iter()
      .filter(|p| p.codename.to_lowercase().contains("pagelet"))
    {
      store
        .grant_permission(pagelet_admin.group_id, perm.permission_id)
        .await?;
      report.grants += 1;
    }
  }

  tracing::info!(
    permissions = report.permissions,
    groups_created = ?report.groups_created,
    grants = report.grants,
    "permission bootstrap complete"
  );
  Ok(report)
}
