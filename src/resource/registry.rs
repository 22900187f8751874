//! Record Schema Registry
//!
//! Declares the column schema of every [`ResourceKind`] and projects raw
//! API records into report rows. Projection is total for well-formed
//! records; a record missing a required field yields a [`ProjectionError`]
//! instead of a blank cell.

use super::kind::ResourceKind;
use crate::gcp::projects::Project;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Why a raw record could not be turned into a row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("missing required field `{path}`")]
    MissingField { path: String },

    #[error("field `{path}` has unexpected type {found}")]
    InvalidField { path: String, found: &'static str },

    #[error("{kind} row has {actual} fields, schema has {expected}")]
    FieldCount {
        kind: ResourceKind,
        expected: usize,
        actual: usize,
    },
}

/// One report line: fields in the kind's column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(Vec<String>);

impl Row {
    /// Build a row, checking it against the kind's column count
    pub fn from_fields(kind: ResourceKind, fields: Vec<String>) -> Result<Self, ProjectionError> {
        let expected = columns_for(kind).len();
        if fields.len() != expected {
            return Err(ProjectionError::FieldCount {
                kind,
                expected,
                actual: fields.len(),
            });
        }
        Ok(Self(fields))
    }

    /// Header row of a kind
    pub fn header(kind: ResourceKind) -> Self {
        Self(columns_for(kind).iter().map(|c| c.to_string()).collect())
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-joined line. Fields are not quoted or escaped.
    pub fn to_line(&self) -> String {
        self.0.join(",")
    }
}

/// Ordered column names for a kind
pub fn columns_for(kind: ResourceKind) -> &'static [&'static str] {
    kind.columns()
}

/// Project one raw record of `kind` into rows.
///
/// Every kind except [`ResourceKind::IamBinding`] produces exactly one row
/// per record; an IAM policy produces one row per principal.
pub fn project(
    kind: ResourceKind,
    project: &Project,
    raw: &Value,
) -> Result<Vec<Row>, ProjectionError> {
    match kind {
        ResourceKind::Vm => project_vm(project, raw).map(|row| vec![row]),
        ResourceKind::Disk => project_disk(project, raw).map(|row| vec![row]),
        ResourceKind::Snapshot => project_snapshot(project, raw).map(|row| vec![row]),
        ResourceKind::Firewall => project_firewall(project, raw).map(|row| vec![row]),
        ResourceKind::IamBinding => project_iam_policy(project, raw),
    }
}

fn project_vm(project: &Project, vm: &Value) -> Result<Row, ProjectionError> {
    // Only the first network interface is reported
    let nic = lookup(vm, "networkInterfaces.0").ok_or_else(|| missing("networkInterfaces.0"))?;
    let external_ip = match lookup(nic, "accessConfigs.0.natIP") {
        Some(value) => scalar("networkInterfaces.0.accessConfigs.0.natIP", value)?,
        None => String::new(),
    };

    Row::from_fields(
        ResourceKind::Vm,
        vec![
            project.project_id.clone(),
            project.status.to_string(),
            required(vm, "name")?,
            trailing_segment(&required(vm, "zone")?),
            required(vm, "machineType")?,
            scalar(
                "networkInterfaces.0.networkIP",
                lookup(nic, "networkIP").ok_or_else(|| missing("networkInterfaces.0.networkIP"))?,
            )?,
            external_ip,
            required(vm, "status")?,
        ],
    )
}

fn project_disk(project: &Project, disk: &Value) -> Result<Row, ProjectionError> {
    Row::from_fields(
        ResourceKind::Disk,
        vec![
            project.project_id.clone(),
            required(disk, "name")?,
            trailing_segment(&required(disk, "zone")?),
            required(disk, "sizeGb")?,
            trailing_segment(&required(disk, "type")?),
            required(disk, "status")?,
        ],
    )
}

fn project_snapshot(project: &Project, snapshot: &Value) -> Result<Row, ProjectionError> {
    Row::from_fields(
        ResourceKind::Snapshot,
        vec![
            project.project_id.clone(),
            required(snapshot, "name")?,
            required(snapshot, "creationTimestamp")?,
            required(snapshot, "diskSizeGb")?,
            required(snapshot, "status")?,
        ],
    )
}

fn project_firewall(project: &Project, firewall: &Value) -> Result<Row, ProjectionError> {
    let allow_rules = match firewall.get("allowed") {
        None | Some(Value::Null) => String::new(),
        Some(Value::Array(entries)) => render_allow_rules(entries)?,
        Some(other) => return Err(invalid("allowed", other)),
    };

    Row::from_fields(
        ResourceKind::Firewall,
        vec![
            project.project_id.clone(),
            required(firewall, "name")?,
            trailing_segment(&required(firewall, "network")?),
            required(firewall, "direction")?,
            required(firewall, "priority")?,
            allow_rules,
        ],
    )
}

/// Collapse `allowed` entries into `proto:port;proto:port;proto`
pub fn render_allow_rules(entries: &[Value]) -> Result<String, ProjectionError> {
    let mut rendered: Vec<String> = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        let protocol = required(entry, "IPProtocol").map_err(|e| prefix_path(e, "allowed", i))?;

        match entry.get("ports") {
            Some(Value::Array(ports)) if !ports.is_empty() => {
                for port in ports {
                    let port = scalar(&format!("allowed.{}.ports", i), port)?;
                    rendered.push(format!("{}:{}", protocol, port));
                }
            }
            None | Some(Value::Null) | Some(Value::Array(_)) => rendered.push(protocol),
            Some(other) => return Err(invalid(&format!("allowed.{}.ports", i), other)),
        }
    }

    Ok(rendered.join(";"))
}

/// Invert a project IAM policy into one row per principal.
///
/// Principals keep first-encounter order; each principal's roles keep
/// binding order. A role granted by several bindings is listed once per
/// binding.
fn project_iam_policy(project: &Project, policy: &Value) -> Result<Vec<Row>, ProjectionError> {
    let bindings = match policy.get("bindings") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(bindings)) => bindings,
        Some(other) => return Err(invalid("bindings", other)),
    };

    let mut members: Vec<(String, Vec<String>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (i, binding) in bindings.iter().enumerate() {
        let role = required(binding, "role").map_err(|e| prefix_path(e, "bindings", i))?;
        let role = trailing_segment(&role);

        let binding_members = match binding.get("members") {
            None | Some(Value::Null) => continue,
            Some(Value::Array(list)) => list,
            Some(other) => return Err(invalid(&format!("bindings.{}.members", i), other)),
        };

        for member in binding_members {
            let member = member
                .as_str()
                .ok_or_else(|| invalid(&format!("bindings.{}.members", i), member))?;

            let slot = *positions.entry(member.to_string()).or_insert_with(|| {
                members.push((member.to_string(), Vec::new()));
                members.len() - 1
            });

            members[slot].1.push(role.clone());
        }
    }

    members
        .into_iter()
        .map(|(member, roles)| {
            let (principal_type, principal) = split_member(&member);
            Row::from_fields(
                ResourceKind::IamBinding,
                vec![
                    project.project_id.clone(),
                    principal_type.to_string(),
                    principal.to_string(),
                    roles.join(";"),
                ],
            )
        })
        .collect()
}

/// Split `type:identifier` on the first colon
pub fn split_member(member: &str) -> (&str, &str) {
    member.split_once(':').unwrap_or((member, ""))
}

/// Last path segment of a resource URL
/// e.g., "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a" -> "us-central1-a"
pub fn trailing_segment(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Walk a dot-notation path; numeric parts index into arrays
fn lookup<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;

    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(idx) => current.get(idx)?,
            Err(_) => current.get(part)?,
        };
    }

    match current {
        Value::Null => None,
        value => Some(value),
    }
}

fn required(item: &Value, path: &str) -> Result<String, ProjectionError> {
    let value = lookup(item, path).ok_or_else(|| missing(path))?;
    scalar(path, value)
}

fn scalar(path: &str, value: &Value) -> Result<String, ProjectionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(missing(path)),
        other => Err(invalid(path, other)),
    }
}

fn missing(path: &str) -> ProjectionError {
    ProjectionError::MissingField {
        path: path.to_string(),
    }
}

fn invalid(path: &str, value: &Value) -> ProjectionError {
    let found = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    ProjectionError::InvalidField {
        path: path.to_string(),
        found,
    }
}

fn prefix_path(error: ProjectionError, parent: &str, index: usize) -> ProjectionError {
    match error {
        ProjectionError::MissingField { path } => ProjectionError::MissingField {
            path: format!("{}.{}.{}", parent, index, path),
        },
        ProjectionError::InvalidField { path, found } => ProjectionError::InvalidField {
            path: format!("{}.{}.{}", parent, index, path),
            found,
        },
        other => other,
    }
}
