//! Resource Collectors
//!
//! One collector per resource kind. A collector lists one project's
//! resources of its kind and projects them through the schema registry.

use super::kind::ResourceKind;
use super::listing;
use super::registry::{self, ProjectionError, Row};
use crate::gcp::auth::IamAuthorization;
use crate::gcp::client::GcpClient;
use crate::gcp::projects::Project;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Failure of one part of the collection; never fatal to the run
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("{kind} listing failed for project {project}: {cause:#}")]
    Listing {
        project: String,
        kind: ResourceKind,
        cause: anyhow::Error,
    },

    #[error("{kind} record dropped for project {project}: {error}")]
    Projection {
        project: String,
        kind: ResourceKind,
        #[source]
        error: ProjectionError,
    },

    #[error("{kind} authorization failed, kind skipped for every project: {cause:#}")]
    Authorization {
        kind: ResourceKind,
        cause: anyhow::Error,
    },

    #[error("{kind} task for project {project} aborted: {reason}")]
    Aborted {
        project: String,
        kind: ResourceKind,
        reason: String,
    },
}

impl CollectionError {
    /// Project the failure is attributed to; `None` for run-scoped failures
    pub fn project(&self) -> Option<&str> {
        match self {
            Self::Listing { project, .. }
            | Self::Projection { project, .. }
            | Self::Aborted { project, .. } => Some(project),
            Self::Authorization { .. } => None,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Listing { kind, .. }
            | Self::Projection { kind, .. }
            | Self::Authorization { kind, .. }
            | Self::Aborted { kind, .. } => *kind,
        }
    }
}

/// Rows produced by one successful (project, kind) collection
#[derive(Debug, Default)]
pub struct Batch {
    pub rows: Vec<Row>,
    /// Records that failed projection and were dropped
    pub rejected: Vec<ProjectionError>,
}

impl Batch {
    /// Project every record, keeping good rows and the errors of bad ones
    pub fn from_records(kind: ResourceKind, project: &Project, records: &[Value]) -> Self {
        let mut batch = Batch::default();

        for record in records {
            match registry::project(kind, project, record) {
                Ok(rows) => batch.rows.extend(rows),
                Err(error) => batch.rejected.push(error),
            }
        }

        batch
    }
}

/// Lists one kind of resource for a single project
#[async_trait]
pub trait Collector: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// One listing call against the provider
    async fn list(&self, project: &Project) -> Result<Vec<Value>>;

    /// List and project; an empty listing is a successful empty batch
    async fn collect(&self, project: &Project) -> Result<Batch, CollectionError> {
        let records = self
            .list(project)
            .await
            .map_err(|cause| CollectionError::Listing {
                project: project.project_id.clone(),
                kind: self.kind(),
                cause,
            })?;

        Ok(Batch::from_records(self.kind(), project, &records))
    }
}

/// Run-scoped prerequisite that yields a collector once it succeeds
#[async_trait]
pub trait CollectorGate: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn open(&self) -> Result<Arc<dyn Collector>>;
}

/// How the orchestrator schedules a kind
#[derive(Clone)]
pub enum CollectorPlan {
    /// Runs for every project immediately
    Ready(Arc<dyn Collector>),
    /// Runs for every project once the gate has opened
    Gated(Arc<dyn CollectorGate>),
}

impl CollectorPlan {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Ready(collector) => collector.kind(),
            Self::Gated(gate) => gate.kind(),
        }
    }
}

/// Compute Engine collector (VMs, disks, snapshots, firewall rules)
pub struct ComputeCollector {
    client: GcpClient,
    kind: ResourceKind,
}

impl ComputeCollector {
    pub fn new(client: GcpClient, kind: ResourceKind) -> Self {
        debug_assert!(kind != ResourceKind::IamBinding);
        Self { client, kind }
    }
}

#[async_trait]
impl Collector for ComputeCollector {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn list(&self, project: &Project) -> Result<Vec<Value>> {
        listing::list_compute(&self.client, self.kind, &project.project_id).await
    }
}

/// IAM policy collector; every instance shares one authorization handle
pub struct IamCollector {
    client: GcpClient,
    auth: Arc<IamAuthorization>,
}

impl IamCollector {
    pub fn new(client: GcpClient, auth: Arc<IamAuthorization>) -> Self {
        Self { client, auth }
    }
}

#[async_trait]
impl Collector for IamCollector {
    fn kind(&self) -> ResourceKind {
        ResourceKind::IamBinding
    }

    async fn list(&self, project: &Project) -> Result<Vec<Value>> {
        let policy = listing::get_iam_policy(&self.client, &self.auth, &project.project_id).await?;
        Ok(vec![policy])
    }
}

/// Acquires the IAM authorization handle before any IAM task starts
pub struct IamGate {
    client: GcpClient,
}

impl IamGate {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CollectorGate for IamGate {
    fn kind(&self) -> ResourceKind {
        ResourceKind::IamBinding
    }

    async fn open(&self) -> Result<Arc<dyn Collector>> {
        let auth = IamAuthorization::acquire(&self.client.credentials).await?;
        tracing::debug!("IAM authorization acquired");
        Ok(Arc::new(IamCollector::new(self.client.clone(), Arc::new(auth))))
    }
}

/// The collector plans of a full audit, in report order
pub fn build_plans(client: &GcpClient) -> Vec<CollectorPlan> {
    ResourceKind::ALL
        .iter()
        .map(|&kind| match kind {
            ResourceKind::IamBinding => {
                CollectorPlan::Gated(Arc::new(IamGate::new(client.clone())))
            }
            kind => CollectorPlan::Ready(Arc::new(ComputeCollector::new(client.clone(), kind))),
        })
        .collect()
}
