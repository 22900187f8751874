//! Collection Orchestrator
//!
//! Runs every (project, kind) pair as its own task and waits for all of
//! them behind a single barrier. Gated kinds (IAM) first open their gate
//! once; their project tasks are only spawned after it succeeds, while
//! the other kinds start right away.

use super::buffer::{FrozenSections, SectionBuffers};
use crate::gcp::client::format_gcp_error;
use crate::gcp::projects::Project;
use crate::resource::{CollectionError, Collector, CollectorGate, CollectorPlan, ResourceKind};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything the collection produced
#[derive(Debug)]
pub struct Collection {
    pub sections: FrozenSections,
    pub failures: Vec<CollectionError>,
    pub stats: CollectionStats,
}

/// Task counters for the run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// (project, kind) pairs planned
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Pairs never started because their gate failed
    pub skipped: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Succeeded,
    Failed,
    Skipped,
}

struct TaskReport {
    settled: Settled,
    count: usize,
    rows: usize,
    failures: Vec<CollectionError>,
}

impl TaskReport {
    fn failed(error: CollectionError) -> Self {
        Self {
            settled: Settled::Failed,
            count: 1,
            rows: 0,
            failures: vec![error],
        }
    }
}

/// Collect every kind for every project.
///
/// Never fails: listing, projection and authorization problems end up in
/// [`Collection::failures`] and the rows of every other task are kept.
pub async fn run(projects: &[Project], plans: &[CollectorPlan]) -> Collection {
    let buffers = Arc::new(SectionBuffers::new());
    let projects: Arc<[Project]> = projects.into();

    let mut branches: Vec<BoxFuture<'static, Vec<TaskReport>>> = Vec::new();

    for plan in plans {
        match plan {
            CollectorPlan::Ready(collector) => {
                for project in projects.iter() {
                    let handle = spawn_pair(Arc::clone(collector), project.clone(), &buffers);
                    branches.push(
                        settle(project.project_id.clone(), collector.kind(), handle)
                            .map(|report| vec![report])
                            .boxed(),
                    );
                }
            }
            CollectorPlan::Gated(gate) => {
                let handle = spawn_gated(Arc::clone(gate), Arc::clone(&projects), &buffers);
                let kind = gate.kind();
                let skipped = projects.len();
                branches.push(
                    async move {
                        match handle.await {
                            Ok(reports) => reports,
                            Err(join_error) => vec![TaskReport {
                                settled: Settled::Skipped,
                                count: skipped,
                                rows: 0,
                                failures: vec![CollectionError::Authorization {
                                    kind,
                                    cause: anyhow::anyhow!("gate task aborted: {}", join_error),
                                }],
                            }],
                        }
                    }
                    .boxed(),
                );
            }
        }
    }

    // Single join barrier: every branch settles, nothing short-circuits
    let reports: Vec<TaskReport> = futures::future::join_all(branches)
        .await
        .into_iter()
        .flatten()
        .collect();

    let mut stats = CollectionStats {
        planned: projects.len() * plans.len(),
        ..CollectionStats::default()
    };
    let mut failures = Vec::new();

    for report in reports {
        match report.settled {
            Settled::Succeeded => stats.succeeded += report.count,
            Settled::Failed => stats.failed += report.count,
            Settled::Skipped => stats.skipped += report.count,
        }
        stats.rows += report.rows;
        failures.extend(report.failures);
    }

    for failure in &failures {
        log_failure(failure);
    }

    Collection {
        sections: buffers.freeze().await,
        failures,
        stats,
    }
}

fn spawn_pair(
    collector: Arc<dyn Collector>,
    project: Project,
    buffers: &Arc<SectionBuffers>,
) -> JoinHandle<TaskReport> {
    let buffers = Arc::clone(buffers);
    tokio::spawn(async move { collect_pair(collector.as_ref(), &project, &buffers).await })
}

fn spawn_gated(
    gate: Arc<dyn CollectorGate>,
    projects: Arc<[Project]>,
    buffers: &Arc<SectionBuffers>,
) -> JoinHandle<Vec<TaskReport>> {
    let buffers = Arc::clone(buffers);
    tokio::spawn(async move {
        let kind = gate.kind();
        let collector = match gate.open().await {
            Ok(collector) => collector,
            Err(cause) => {
                return vec![TaskReport {
                    settled: Settled::Skipped,
                    count: projects.len(),
                    rows: 0,
                    failures: vec![CollectionError::Authorization { kind, cause }],
                }];
            }
        };

        let pending: Vec<_> = projects
            .iter()
            .map(|project| {
                let handle = spawn_pair(Arc::clone(&collector), project.clone(), &buffers);
                settle(project.project_id.clone(), kind, handle)
            })
            .collect();

        futures::future::join_all(pending).await
    })
}

async fn collect_pair(
    collector: &dyn Collector,
    project: &Project,
    buffers: &SectionBuffers,
) -> TaskReport {
    let kind = collector.kind();

    let batch = match collector.collect(project).await {
        Ok(batch) => batch,
        Err(error) => return TaskReport::failed(error),
    };

    let mut failures: Vec<CollectionError> = batch
        .rejected
        .into_iter()
        .map(|error| CollectionError::Projection {
            project: project.project_id.clone(),
            kind,
            error,
        })
        .collect();

    let rows = match buffers.get(kind).append(batch.rows).await {
        Ok(rows) => rows,
        Err(error) => {
            failures.push(CollectionError::Projection {
                project: project.project_id.clone(),
                kind,
                error,
            });
            0
        }
    };

    tracing::debug!(project = %project.project_id, %kind, rows, "Collected");

    TaskReport {
        settled: Settled::Succeeded,
        count: 1,
        rows,
        failures,
    }
}

async fn settle(
    project_id: String,
    kind: ResourceKind,
    handle: JoinHandle<TaskReport>,
) -> TaskReport {
    match handle.await {
        Ok(report) => report,
        Err(join_error) => TaskReport::failed(CollectionError::Aborted {
            project: project_id,
            kind,
            reason: join_error.to_string(),
        }),
    }
}

fn log_failure(failure: &CollectionError) {
    let project = failure.project().unwrap_or("*");
    let kind = failure.kind();

    match failure {
        CollectionError::Listing { cause, .. } => tracing::warn!(
            project,
            %kind,
            reason = %format_gcp_error(cause),
            "{}",
            failure
        ),
        CollectionError::Authorization { .. } => tracing::error!(project, %kind, "{}", failure),
        _ => tracing::warn!(project, %kind, "{}", failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::projects::LifecycleStatus;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Returns `per_project` disks per project, failing for listed projects
    struct FakeDisks {
        per_project: usize,
        failing: HashSet<String>,
        called: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl Collector for FakeDisks {
        fn kind(&self) -> ResourceKind {
            ResourceKind::Disk
        }

        async fn list(&self, project: &Project) -> Result<Vec<Value>> {
            if let Some(called) = &self.called {
                called.notify_one();
            }
            if self.failing.contains(&project.project_id) {
                return Err(anyhow::anyhow!("API request failed: 403 Forbidden"));
            }
            Ok((0..self.per_project)
                .map(|i| {
                    json!({
                        "name": format!("{}-disk-{}", project.project_id, i),
                        "zone": "zones/us-central1-a",
                        "sizeGb": "10",
                        "type": "diskTypes/pd-standard",
                        "status": "READY"
                    })
                })
                .collect())
        }
    }

    struct FakeFirewalls;

    #[async_trait]
    impl Collector for FakeFirewalls {
        fn kind(&self) -> ResourceKind {
            ResourceKind::Firewall
        }

        async fn list(&self, _project: &Project) -> Result<Vec<Value>> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(vec![])
        }
    }

    struct FakeIam {
        opened: Arc<AtomicBool>,
        early_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Collector for FakeIam {
        fn kind(&self) -> ResourceKind {
            ResourceKind::IamBinding
        }

        async fn list(&self, _project: &Project) -> Result<Vec<Value>> {
            if !self.opened.load(Ordering::SeqCst) {
                self.early_calls.fetch_add(1, Ordering::SeqCst);
            }
            Ok(vec![json!({
                "bindings": [{
                    "role": "roles/viewer",
                    "members": ["user:a@x.com", "user:b@x.com"]
                }]
            })])
        }
    }

    struct FakeGate {
        fail: bool,
        wait_for: Option<Arc<Notify>>,
        opened: Arc<AtomicBool>,
        early_calls: Arc<AtomicUsize>,
        opens: Arc<AtomicUsize>,
    }

    impl FakeGate {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                wait_for: None,
                opened: Arc::new(AtomicBool::new(false)),
                early_calls: Arc::new(AtomicUsize::new(0)),
                opens: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl CollectorGate for FakeGate {
        fn kind(&self) -> ResourceKind {
            ResourceKind::IamBinding
        }

        async fn open(&self) -> Result<Arc<dyn Collector>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if let Some(wait_for) = &self.wait_for {
                wait_for.notified().await;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail {
                return Err(anyhow::anyhow!("no application default credentials"));
            }
            self.opened.store(true, Ordering::SeqCst);
            Ok(Arc::new(FakeIam {
                opened: Arc::clone(&self.opened),
                early_calls: Arc::clone(&self.early_calls),
            }))
        }
    }

    fn projects(n: usize) -> Vec<Project> {
        (0..n)
            .map(|i| Project::new(&format!("project-{i}"), LifecycleStatus::Active))
            .collect()
    }

    fn disks(per_project: usize, failing: &[&str]) -> CollectorPlan {
        CollectorPlan::Ready(Arc::new(FakeDisks {
            per_project,
            failing: failing.iter().map(|s| s.to_string()).collect(),
            called: None,
        }))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_all_tasks_succeed() {
        let projects = projects(4);
        let gate = FakeGate::new(false);
        let plans = vec![
            disks(3, &[]),
            CollectorPlan::Ready(Arc::new(FakeFirewalls)),
            CollectorPlan::Gated(Arc::new(gate)),
        ];

        let collection = run(&projects, &plans).await;

        assert!(collection.failures.is_empty());
        assert_eq!(collection.sections.rows(ResourceKind::Disk).len(), 12);
        assert_eq!(collection.sections.rows(ResourceKind::IamBinding).len(), 8);
        assert!(!collection.sections.has_data(ResourceKind::Firewall));
        assert_eq!(
            collection.stats,
            CollectionStats {
                planned: 12,
                succeeded: 12,
                failed: 0,
                skipped: 0,
                rows: 20,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failed_task_keeps_sibling_rows() {
        let projects = projects(3);
        let plans = vec![disks(2, &["project-1"])];

        let collection = run(&projects, &plans).await;

        let rows = collection.sections.rows(ResourceKind::Disk);
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.fields()[0] != "project-1"));

        assert_eq!(collection.failures.len(), 1);
        assert_eq!(collection.failures[0].project(), Some("project-1"));
        assert!(matches!(collection.failures[0], CollectionError::Listing { .. }));
        assert_eq!(collection.stats.failed, 1);
        assert_eq!(collection.stats.succeeded, 2);
    }

    #[tokio::test]
    async fn test_gate_failure_skips_only_gated_kind() {
        let projects = projects(2);
        let gate = FakeGate::new(true);
        let plans = vec![disks(1, &[]), CollectorPlan::Gated(Arc::new(gate))];

        let collection = run(&projects, &plans).await;

        assert_eq!(collection.sections.rows(ResourceKind::Disk).len(), 2);
        assert!(!collection.sections.has_data(ResourceKind::IamBinding));
        assert_eq!(collection.failures.len(), 1);
        assert!(matches!(
            collection.failures[0],
            CollectionError::Authorization {
                kind: ResourceKind::IamBinding,
                ..
            }
        ));
        assert_eq!(collection.failures[0].project(), None);
        assert_eq!(collection.stats.skipped, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_gate_opens_once_before_gated_tasks() {
        let projects = projects(5);
        let gate = FakeGate::new(false);
        let early_calls = Arc::clone(&gate.early_calls);
        let opens = Arc::clone(&gate.opens);
        let plans = vec![CollectorPlan::Gated(Arc::new(gate))];

        let collection = run(&projects, &plans).await;

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(early_calls.load(Ordering::SeqCst), 0);
        assert_eq!(collection.sections.rows(ResourceKind::IamBinding).len(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_ungated_kinds_do_not_wait_for_gate() {
        // The gate only opens after a disk task has started; this would
        // deadlock if disk tasks were sequenced behind the gate.
        let disk_called = Arc::new(Notify::new());
        let mut gate = FakeGate::new(false);
        gate.wait_for = Some(Arc::clone(&disk_called));

        let plans = vec![
            CollectorPlan::Ready(Arc::new(FakeDisks {
                per_project: 1,
                failing: HashSet::new(),
                called: Some(disk_called),
            })),
            CollectorPlan::Gated(Arc::new(gate)),
        ];

        let collection = tokio::time::timeout(Duration::from_secs(5), run(&projects(2), &plans))
            .await
            .expect("run should not deadlock");

        assert!(collection.failures.is_empty());
        assert_eq!(collection.sections.rows(ResourceKind::IamBinding).len(), 4);
    }

    #[tokio::test]
    async fn test_projection_failure_is_a_diagnostic() {
        struct HalfBroken;

        #[async_trait]
        impl Collector for HalfBroken {
            fn kind(&self) -> ResourceKind {
                ResourceKind::Snapshot
            }

            async fn list(&self, _project: &Project) -> Result<Vec<Value>> {
                Ok(vec![
                    json!({
                        "name": "snap-1",
                        "creationTimestamp": "2026-10-01T00:00:00.000-07:00",
                        "diskSizeGb": "10",
                        "status": "READY"
                    }),
                    json!({ "name": "snap-2" }),
                ])
            }
        }

        let collection = run(&projects(1), &[CollectorPlan::Ready(Arc::new(HalfBroken))]).await;

        assert_eq!(collection.sections.rows(ResourceKind::Snapshot).len(), 1);
        assert_eq!(collection.failures.len(), 1);
        assert!(matches!(
            collection.failures[0],
            CollectionError::Projection { .. }
        ));
        assert_eq!(collection.stats.succeeded, 1);
    }

    #[tokio::test]
    async fn test_panicking_task_is_recorded() {
        struct Panics;

        #[async_trait]
        impl Collector for Panics {
            fn kind(&self) -> ResourceKind {
                ResourceKind::Vm
            }

            async fn list(&self, _project: &Project) -> Result<Vec<Value>> {
                panic!("collector bug");
            }
        }

        let plans = vec![CollectorPlan::Ready(Arc::new(Panics)), disks(1, &[])];
        let collection = run(&projects(1), &plans).await;

        assert_eq!(collection.sections.rows(ResourceKind::Disk).len(), 1);
        assert!(matches!(
            collection.failures[0],
            CollectionError::Aborted {
                kind: ResourceKind::Vm,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_no_projects() {
        let collection = run(&[], &[disks(1, &[])]).await;
        assert_eq!(collection.stats, CollectionStats::default());
        assert_eq!(collection.sections.total_rows(), 0);
    }
}
