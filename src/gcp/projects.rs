//! GCP Projects
//!
//! Functions for listing the projects to audit.

use super::client::GcpClient;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fmt;

/// Project lifecycle state as reported by Resource Manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStatus {
    Active,
    Deleting,
    Deleted,
    Unknown,
}

impl LifecycleStatus {
    pub fn from_api(value: &str) -> Self {
        match value {
            "ACTIVE" => Self::Active,
            "DELETE_REQUESTED" | "DELETE_IN_PROGRESS" | "DELETING" => Self::Deleting,
            "DELETED" => Self::Deleted,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Deleting => "DELETING",
            Self::Deleted => "DELETED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub project_id: String,
    pub status: LifecycleStatus,
}

impl Project {
    pub fn new(project_id: &str, status: LifecycleStatus) -> Self {
        Self {
            project_id: project_id.to_string(),
            status,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let project_id = value.get("projectId").and_then(|v| v.as_str())?;
        let status = value
            .get("lifecycleState")
            .and_then(|v| v.as_str())
            .map(LifecycleStatus::from_api)
            .unwrap_or(LifecycleStatus::Unknown);

        Some(Self::new(project_id, status))
    }
}

/// List all accessible GCP projects, following pagination.
///
/// Projects are returned in API order with duplicates removed; an entry
/// without a `projectId` is skipped with a warning.
pub async fn list_projects(client: &GcpClient) -> Result<Vec<Project>> {
    let mut projects: Vec<Project> = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let url = match &page_token {
            Some(token) => format!(
                "{}?pageToken={}",
                client.resourcemanager_url("projects"),
                urlencoding::encode(token)
            ),
            None => client.resourcemanager_url("projects"),
        };

        let response = client
            .get(&url)
            .await
            .context("Failed to list projects")?;

        let entries = response
            .get("projects")
            .and_then(|v| v.as_array())
            .map(|arr| arr.as_slice())
            .unwrap_or_default();

        for entry in entries {
            match Project::from_value(entry) {
                Some(project) if projects.iter().any(|p| p.project_id == project.project_id) => {
                    tracing::debug!("Duplicate project {} ignored", project.project_id);
                }
                Some(project) => projects.push(project),
                None => tracing::warn!("Project entry without projectId skipped"),
            }
        }

        page_token = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        if page_token.is_none() {
            break;
        }
    }

    Ok(projects)
}

/// Narrow the listed projects to the requested ids and/or active ones.
///
/// An empty `ids` keeps every project. Requested ids that were not listed
/// are logged and ignored.
pub fn select(projects: Vec<Project>, ids: &[String], active_only: bool) -> Vec<Project> {
    for id in ids {
        if !projects.iter().any(|p| &p.project_id == id) {
            tracing::warn!("Requested project {} is not accessible, skipped", id);
        }
    }

    projects
        .into_iter()
        .filter(|p| ids.is_empty() || ids.contains(&p.project_id))
        .filter(|p| !active_only || p.status == LifecycleStatus::Active)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle_status_mapping() {
        assert_eq!(LifecycleStatus::from_api("ACTIVE"), LifecycleStatus::Active);
        assert_eq!(
            LifecycleStatus::from_api("DELETE_REQUESTED"),
            LifecycleStatus::Deleting
        );
        assert_eq!(LifecycleStatus::from_api("DELETED"), LifecycleStatus::Deleted);
        assert_eq!(
            LifecycleStatus::from_api("LIFECYCLE_STATE_UNSPECIFIED"),
            LifecycleStatus::Unknown
        );
        assert_eq!(LifecycleStatus::Deleting.to_string(), "DELETING");
    }

    #[test]
    fn test_project_from_value() {
        let project = Project::from_value(&json!({
            "projectId": "audit-prod",
            "lifecycleState": "ACTIVE"
        }))
        .unwrap();
        assert_eq!(project, Project::new("audit-prod", LifecycleStatus::Active));

        let missing_state = Project::from_value(&json!({ "projectId": "audit-dev" })).unwrap();
        assert_eq!(missing_state.status, LifecycleStatus::Unknown);

        assert!(Project::from_value(&json!({ "name": "no id" })).is_none());
    }

    #[test]
    fn test_select_projects() {
        let listed = vec![
            Project::new("audit-prod", LifecycleStatus::Active),
            Project::new("audit-old", LifecycleStatus::Deleting),
            Project::new("audit-dev", LifecycleStatus::Active),
        ];

        let all = select(listed.clone(), &[], false);
        assert_eq!(all.len(), 3);

        let active = select(listed.clone(), &[], true);
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|p| p.status == LifecycleStatus::Active));

        let wanted = select(
            listed,
            &["audit-old".to_string(), "missing-project".to_string()],
            false,
        );
        assert_eq!(wanted, vec![Project::new("audit-old", LifecycleStatus::Deleting)]);
    }
}
