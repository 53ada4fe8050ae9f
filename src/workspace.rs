// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Workspace provisioning.
//!
//! A workspace is backed by one virtual cluster. Creation runs
//! `provision -> await_ready -> configure_identity -> apply_quota -> active`
//! inside a task, and teardown runs `delete -> await_deleted`. A failed step
//! fails the task and leaves the workspace in the last status it reached;
//! [`WorkspaceOrchestrator::mark_failed`] moves it to `error` from there. A
//! cancelled wait puts the task back in the queue instead.

use crate::activity::{ActivityKind, ActivityLog};
use crate::cluster::{self, ClusterControl};
use crate::store::{self, Page, PageRequest, Store};
use crate::tasks::{self, TaskTracker};
use crate::types;
use crate::types::error::{InvalidFieldSnafu, Severity};
use crate::types::quota::{Plan, QuotaLimits, WORKSPACE_QUOTA_NAME};
use crate::types::task::{Task, TaskPayload, TaskType};
use crate::types::v1alpha1::virtual_cluster::VirtualCluster;
use crate::types::workspace::{
    ClusterPhase, CreateWorkspaceRequest, OidcSettings, QUOTA_NAMESPACE, Workspace,
    WorkspaceFilter, WorkspaceMember, WorkspaceRole, WorkspaceStatus,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use snafu::{ResultExt, Snafu, ensure};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod wait;
pub mod worker;

pub use wait::WaitPolicy;
pub use worker::WorkerOptions;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to {} workspace {}: {}", action, workspace_id, source))]
    Store {
        action: &'static str,
        workspace_id: String,
        source: store::Error,
    },

    #[snafu(display("failed to {} for workspace {}: {}", action, workspace_id, source))]
    Cluster {
        action: &'static str,
        workspace_id: String,
        source: cluster::Error,
    },

    #[snafu(display(
        "timed out after {:?} waiting for workspace {} to become {}",
        timeout,
        workspace_id,
        operation
    ))]
    Timeout {
        workspace_id: String,
        operation: &'static str,
        timeout: Duration,
    },

    #[snafu(display("wait for workspace {} to become {} was cancelled", workspace_id, operation))]
    Cancelled {
        workspace_id: String,
        operation: &'static str,
    },

    #[snafu(display("workspace {} is {}, expected active", workspace_id, status))]
    NotActive {
        workspace_id: String,
        status: WorkspaceStatus,
    },

    #[snafu(display("task {} is a {} task, expected {}", task_id, actual, expected))]
    UnexpectedTask {
        task_id: String,
        actual: TaskType,
        expected: TaskType,
    },

    #[snafu(transparent)]
    Tasks { source: tasks::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store { source, .. } => source.is_not_found(),
            Error::Cluster { source, .. } => source.is_not_found(),
            Error::Tasks { source } => source.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug)]
pub struct ProvisioningOptions {
    /// Host namespace holding every VirtualCluster object.
    pub vcluster_namespace: String,
    pub oidc_issuer_url: String,
    pub wait: WaitPolicy,
}

impl Default for ProvisioningOptions {
    fn default() -> Self {
        Self {
            vcluster_namespace: "hexabase-vclusters".to_owned(),
            oidc_issuer_url: "https://api.hexabase-kaas.io".to_owned(),
            wait: WaitPolicy::default(),
        }
    }
}

/// Live view of a workspace's virtual cluster.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterHealth {
    pub workspace_id: String,
    pub status: WorkspaceStatus,
    pub phase: ClusterPhase,
    pub healthy: bool,
    pub message: String,
    pub checked_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct WorkspaceOrchestrator {
    cluster: Arc<dyn ClusterControl>,
    store: Arc<dyn Store>,
    tasks: TaskTracker,
    activity: ActivityLog,
    options: ProvisioningOptions,
}

impl WorkspaceOrchestrator {
    pub fn new(
        cluster: Arc<dyn ClusterControl>,
        store: Arc<dyn Store>,
        options: ProvisioningOptions,
    ) -> Self {
        Self {
            tasks: TaskTracker::new(store.clone()),
            activity: ActivityLog::new(store.clone()),
            cluster,
            store,
            options,
        }
    }

    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Submits the virtual cluster for `workspace_id`. Does not wait for it.
    pub async fn provision(&self, workspace_id: &str, plan: Plan) -> Result<()> {
        let vc = VirtualCluster::for_workspace(workspace_id, plan, &self.options.vcluster_namespace);
        self.cluster
            .create_virtual_cluster(&vc)
            .await
            .context(ClusterSnafu {
                action: "provision virtual cluster",
                workspace_id,
            })?;
        info!("requested {} virtual cluster for workspace {}", plan, workspace_id);
        Ok(())
    }

    /// Polls until the control plane reports a phase that translates to
    /// `active`. A cluster that does not exist yet is still pending.
    pub async fn await_ready(
        &self,
        workspace_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ClusterPhase> {
        let phase = wait::poll_until(&self.options.wait, cancel, workspace_id, "ready", || async move {
            match self.cluster.virtual_cluster_phase(workspace_id).await {
                Ok(phase) if phase.to_internal() == WorkspaceStatus::Active => Ok(Some(phase)),
                Ok(phase) => {
                    debug!("workspace {} virtual cluster is {}", workspace_id, phase);
                    Ok(None)
                }
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e).context(ClusterSnafu {
                    action: "read virtual cluster phase",
                    workspace_id,
                }),
            }
        })
        .await?;

        info!("workspace {} virtual cluster is ready", workspace_id);
        Ok(phase)
    }

    /// Polls until the virtual cluster is gone. Absence is the only success
    /// signal.
    pub async fn await_deleted(&self, workspace_id: &str, cancel: &CancellationToken) -> Result<()> {
        wait::poll_until(&self.options.wait, cancel, workspace_id, "deleted", || async move {
            match self.cluster.virtual_cluster_phase(workspace_id).await {
                Err(e) if e.is_not_found() => Ok(Some(())),
                Ok(phase) => {
                    debug!("workspace {} virtual cluster still {}", workspace_id, phase);
                    Ok(None)
                }
                Err(e) => Err(e).context(ClusterSnafu {
                    action: "read virtual cluster phase",
                    workspace_id,
                }),
            }
        })
        .await?;

        info!("workspace {} virtual cluster deleted", workspace_id);
        Ok(())
    }

    /// Installs the OIDC trust config inside the virtual cluster. Safe to
    /// re-run whenever the member list changes.
    pub async fn configure_identity(&self, workspace_id: &str) -> Result<OidcSettings> {
        let oidc = OidcSettings::for_workspace(&self.options.oidc_issuer_url, workspace_id);
        self.cluster
            .apply(workspace_id, &oidc.new_config_map().into())
            .await
            .context(ClusterSnafu {
                action: "configure identity",
                workspace_id,
            })?;

        let mut workspace = self.load(workspace_id).await?;
        workspace.settings.oidc = Some(oidc.clone());
        self.save(workspace).await?;

        info!("configured OIDC trust for workspace {}", workspace_id);
        Ok(oidc)
    }

    /// Installs the plan's hard limits in the virtual cluster's default
    /// namespace and records them in the workspace settings.
    pub async fn apply_quota(&self, workspace_id: &str, plan: Plan) -> Result<QuotaLimits> {
        let limits = plan.limits();
        let quota = limits.new_resource_quota(WORKSPACE_QUOTA_NAME, QUOTA_NAMESPACE);
        self.cluster
            .apply(workspace_id, &quota.into())
            .await
            .context(ClusterSnafu {
                action: "apply resource quota",
                workspace_id,
            })?;

        let mut workspace = self.load(workspace_id).await?;
        workspace.settings.resource_quota = Some(limits.clone());
        self.save(workspace).await?;

        info!("applied {} quota to workspace {}", plan, workspace_id);
        Ok(limits)
    }

    /// Deletes the virtual cluster and waits for it to disappear. Deleting a
    /// cluster that is already gone succeeds.
    pub async fn teardown(&self, workspace_id: &str, cancel: &CancellationToken) -> Result<()> {
        match self.cluster.delete_virtual_cluster(workspace_id).await {
            Ok(()) => info!("requested deletion of workspace {} virtual cluster", workspace_id),
            Err(e) if e.is_not_found() => {
                debug!("workspace {} virtual cluster already absent", workspace_id)
            }
            Err(e) => {
                return Err(e).context(ClusterSnafu {
                    action: "delete virtual cluster",
                    workspace_id,
                });
            }
        }
        self.await_deleted(workspace_id, cancel).await
    }

    /// Adjusts the virtual cluster's replica count without waiting.
    pub async fn scale(&self, workspace_id: &str, replicas: i32) -> Result<()> {
        self.cluster
            .scale_virtual_cluster(workspace_id, replicas)
            .await
            .context(ClusterSnafu {
                action: "scale virtual cluster",
                workspace_id,
            })?;
        info!("scaled workspace {} to {} replicas", workspace_id, replicas);
        Ok(())
    }

    pub async fn create_workspace(
        &self,
        request: CreateWorkspaceRequest,
        actor: &str,
    ) -> Result<(Workspace, Task)> {
        validate_request(&request)?;

        let id = uuid::Uuid::new_v4().to_string();
        let workspace = Workspace::new(id.clone(), &request, &self.options.vcluster_namespace);
        let workspace = self
            .store
            .create_workspace(workspace)
            .await
            .context(StoreSnafu {
                action: "create",
                workspace_id: &id,
            })?;

        let task = self
            .tasks
            .create(
                &id,
                TaskType::Create,
                TaskPayload {
                    workspace_id: Some(id.clone()),
                    plan: Some(workspace.plan.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        self.activity
            .record(
                &id,
                None,
                actor,
                ActivityKind::WorkspaceCreated,
                format!("Created workspace {} on the {} plan", workspace.name, workspace.plan),
            )
            .await;
        info!("workspace {} created, provisioning task {}", id, task.id);
        Ok((workspace, task))
    }

    /// Marks the workspace `deleting` and queues the teardown. `None` when the
    /// workspace is already deleted or purged.
    pub async fn delete_workspace(&self, workspace_id: &str, actor: &str) -> Result<Option<Task>> {
        let mut workspace = match self.load(workspace_id).await {
            Ok(workspace) if workspace.deleted_at.is_some() => {
                debug!("workspace {} already deleted", workspace_id);
                return Ok(None);
            }
            Ok(workspace) => workspace,
            Err(e) if e.is_not_found() => {
                debug!("workspace {} already gone", workspace_id);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        workspace.transition(WorkspaceStatus::Deleting)?;
        self.save(workspace).await?;

        let task = self
            .tasks
            .create(
                workspace_id,
                TaskType::Delete,
                TaskPayload {
                    workspace_id: Some(workspace_id.to_owned()),
                    ..Default::default()
                },
            )
            .await?;

        self.activity
            .record(
                workspace_id,
                None,
                actor,
                ActivityKind::WorkspaceDeleted,
                "Requested workspace deletion",
            )
            .await;
        Ok(Some(task))
    }

    /// Moves a workspace whose pipeline gave up to `error`, from where it can
    /// be deleted.
    pub async fn mark_failed(&self, workspace_id: &str, reason: &str, actor: &str) -> Result<Workspace> {
        let mut workspace = self.load(workspace_id).await?;
        if workspace.status == WorkspaceStatus::Error {
            return Ok(workspace);
        }
        workspace.transition(WorkspaceStatus::Error)?;
        let workspace = self.save(workspace).await?;

        warn!("workspace {} marked failed: {}", workspace_id, reason);
        self.activity
            .record(
                workspace_id,
                None,
                actor,
                ActivityKind::WorkspaceFailed,
                format!("Workspace failed: {}", reason),
            )
            .await;
        Ok(workspace)
    }

    /// Moves an active workspace to `updating` and queues the plan change.
    pub async fn change_plan(&self, workspace_id: &str, plan: Plan, actor: &str) -> Result<Task> {
        let mut workspace = self.load(workspace_id).await?;
        let previous = workspace.plan;
        workspace.transition(WorkspaceStatus::Updating)?;
        self.save(workspace).await?;

        let task = self
            .tasks
            .create(
                workspace_id,
                TaskType::Update,
                TaskPayload {
                    workspace_id: Some(workspace_id.to_owned()),
                    plan: Some(plan.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        self.activity
            .record(
                workspace_id,
                None,
                actor,
                ActivityKind::WorkspacePlanChanged,
                format!("Changed plan from {} to {}", previous, plan),
            )
            .await;
        Ok(task)
    }

    /// Queues a backup or restore for an external consumer.
    pub async fn request_operation(
        &self,
        workspace_id: &str,
        task_type: TaskType,
        mut payload: TaskPayload,
    ) -> Result<Task> {
        ensure!(
            matches!(task_type, TaskType::Backup | TaskType::Restore),
            InvalidFieldSnafu {
                field: "type",
                message: format!("{} is not an on-demand operation", task_type),
            }
        );
        self.load(workspace_id).await?;

        payload.workspace_id = Some(workspace_id.to_owned());
        Ok(self.tasks.create(workspace_id, task_type, payload).await?)
    }

    /// Claims and runs a `create` task. `None` when another worker won the
    /// claim.
    pub async fn process_provisioning_task(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Task>> {
        let Some(task) = self.claim(task_id, TaskType::Create).await? else {
            return Ok(None);
        };
        let outcome = self.run_provisioning(&task, cancel).await;
        self.finish(&task, outcome).await.map(Some)
    }

    /// Claims and runs a `delete` task. On success the record is soft-deleted.
    pub async fn process_deletion_task(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Task>> {
        let Some(task) = self.claim(task_id, TaskType::Delete).await? else {
            return Ok(None);
        };
        let outcome = self.run_deletion(&task, cancel).await;
        self.finish(&task, outcome).await.map(Some)
    }

    /// Claims and runs an `update` task carrying the new plan.
    pub async fn process_update_task(&self, task_id: &str) -> Result<Option<Task>> {
        let Some(task) = self.claim(task_id, TaskType::Update).await? else {
            return Ok(None);
        };
        let outcome = self.run_update(&task).await;
        self.finish(&task, outcome).await.map(Some)
    }

    async fn run_provisioning(&self, task: &Task, cancel: &CancellationToken) -> Result<&'static str> {
        let workspace_id = task.workspace_id.as_str();
        let workspace = self.load(workspace_id).await?;
        let plan = task
            .payload
            .plan
            .as_deref()
            .map_or(workspace.plan, Plan::parse_or_default);

        self.provision(workspace_id, plan).await?;
        self.tasks
            .advance(&task.id, 20, "virtual cluster requested")
            .await?;

        self.await_ready(workspace_id, cancel).await?;
        self.tasks.advance(&task.id, 60, "virtual cluster ready").await?;

        self.configure_identity(workspace_id).await?;
        self.tasks.advance(&task.id, 75, "identity configured").await?;

        self.apply_quota(workspace_id, plan).await?;
        self.tasks.advance(&task.id, 90, "resource quota applied").await?;

        let refreshed = self.refresh_connection_info(workspace_id).await;
        Severity::Advisory.handle("refresh connection info", workspace_id, refreshed)?;

        let mut workspace = self.load(workspace_id).await?;
        workspace.transition(WorkspaceStatus::Active)?;
        self.save(workspace).await?;

        info!("workspace {} is active", workspace_id);
        Ok("workspace provisioned")
    }

    async fn run_deletion(&self, task: &Task, cancel: &CancellationToken) -> Result<&'static str> {
        let workspace_id = task.workspace_id.as_str();

        self.teardown(workspace_id, cancel).await?;
        self.tasks.advance(&task.id, 90, "virtual cluster deleted").await?;

        let mut workspace = self.load(workspace_id).await?;
        workspace.deleted_at = Some(Utc::now());
        workspace.updated_at = Utc::now();
        self.save(workspace).await?;

        info!("workspace {} deleted", workspace_id);
        Ok("workspace deleted")
    }

    async fn run_update(&self, task: &Task) -> Result<&'static str> {
        let workspace_id = task.workspace_id.as_str();
        let requested = task.payload.plan.as_deref().ok_or_else(|| {
            InvalidFieldSnafu {
                field: "plan",
                message: format!("update task {} carries no plan", task.id),
            }
            .build()
        })?;
        let plan = Plan::parse_or_default(requested);

        let mut workspace = self.load(workspace_id).await?;
        workspace.plan = plan;
        self.save(workspace).await?;

        self.provision(workspace_id, plan).await?;
        self.tasks
            .advance(&task.id, 40, "virtual cluster resized")
            .await?;

        self.apply_quota(workspace_id, plan).await?;
        self.tasks.advance(&task.id, 90, "resource quota applied").await?;

        let mut workspace = self.load(workspace_id).await?;
        workspace.transition(WorkspaceStatus::Active)?;
        self.save(workspace).await?;

        info!("workspace {} moved to the {} plan", workspace_id, plan);
        Ok("plan updated")
    }

    async fn claim(&self, task_id: &str, expected: TaskType) -> Result<Option<Task>> {
        let task = self.tasks.get(task_id).await?;
        ensure!(
            task.task_type == expected,
            UnexpectedTaskSnafu {
                task_id,
                actual: task.task_type,
                expected,
            }
        );
        Ok(self.tasks.claim(task_id).await?)
    }

    async fn finish(&self, task: &Task, outcome: Result<&'static str>) -> Result<Task> {
        match outcome {
            Ok(message) => Ok(self.tasks.complete(&task.id, message).await?),
            Err(e @ Error::Cancelled { .. }) => {
                info!(
                    "{} task {} for workspace {} interrupted: {}",
                    task.task_type, task.id, task.workspace_id, e
                );
                let requeued = self.tasks.requeue(&task.id).await;
                let _ = Severity::Advisory.handle("requeue task", &task.id, requeued);
                Err(e)
            }
            Err(e) => {
                error!(
                    "{} task {} for workspace {} failed: {}",
                    task.task_type, task.id, task.workspace_id, e
                );
                let recorded = self.tasks.fail(&task.id, &e.to_string()).await;
                let _ = Severity::Advisory.handle("record task failure", &task.id, recorded);
                Err(e)
            }
        }
    }

    /// `active -> stopping -> stopped`, scaling the virtual cluster to zero.
    pub async fn suspend(&self, workspace_id: &str, actor: &str) -> Result<Workspace> {
        let mut workspace = self.load(workspace_id).await?;
        workspace.transition(WorkspaceStatus::Stopping)?;
        let workspace = self.save(workspace).await?;

        let workspace = self
            .resize(workspace, 0, WorkspaceStatus::Stopped)
            .await?;
        self.activity
            .record(
                workspace_id,
                None,
                actor,
                ActivityKind::WorkspaceSuspended,
                "Suspended workspace",
            )
            .await;
        Ok(workspace)
    }

    /// `stopped -> starting -> active`, scaling the virtual cluster back up.
    pub async fn reactivate(&self, workspace_id: &str, actor: &str) -> Result<Workspace> {
        let mut workspace = self.load(workspace_id).await?;
        workspace.transition(WorkspaceStatus::Starting)?;
        let workspace = self.save(workspace).await?;

        let workspace = self
            .resize(workspace, 1, WorkspaceStatus::Active)
            .await?;
        self.activity
            .record(
                workspace_id,
                None,
                actor,
                ActivityKind::WorkspaceReactivated,
                "Reactivated workspace",
            )
            .await;
        Ok(workspace)
    }

    async fn resize(
        &self,
        mut workspace: Workspace,
        replicas: i32,
        settled: WorkspaceStatus,
    ) -> Result<Workspace> {
        if let Err(e) = self.scale(&workspace.id, replicas).await {
            warn!("workspace {} failed to settle in {}: {}", workspace.id, settled, e);
            workspace.transition(WorkspaceStatus::Error)?;
            self.save(workspace).await?;
            return Err(e);
        }

        workspace.transition(settled)?;
        workspace.cluster_info.replicas = Some(replicas);
        self.save(workspace).await
    }

    /// Stores the API endpoint and kubeconfig reported by the control plane.
    pub async fn refresh_connection_info(&self, workspace_id: &str) -> Result<Workspace> {
        let info = self
            .cluster
            .connection_info(workspace_id)
            .await
            .context(ClusterSnafu {
                action: "read connection info",
                workspace_id,
            })?;

        let mut workspace = self.load(workspace_id).await?;
        workspace.api_endpoint = info.endpoint;
        workspace.kubeconfig = Some(info.kubeconfig);
        workspace.updated_at = Utc::now();
        self.save(workspace).await
    }

    /// Kubeconfig of an active workspace, fetched on first use.
    pub async fn get_kubeconfig(&self, workspace_id: &str) -> Result<String> {
        let workspace = self.load(workspace_id).await?;
        ensure!(
            workspace.status == WorkspaceStatus::Active,
            NotActiveSnafu {
                workspace_id,
                status: workspace.status,
            }
        );

        if let Some(kubeconfig) = workspace.kubeconfig {
            return Ok(kubeconfig);
        }
        let workspace = self.refresh_connection_info(workspace_id).await?;
        workspace.kubeconfig.ok_or_else(|| Error::Cluster {
            action: "read connection info",
            workspace_id: workspace_id.to_owned(),
            source: cluster::Error::MissingKubeconfig {
                workspace_id: workspace_id.to_owned(),
            },
        })
    }

    /// Reads the live phase and records it in the workspace's cluster info.
    /// An unreadable phase is reported as unknown rather than failing.
    pub async fn cluster_health(&self, workspace_id: &str) -> Result<ClusterHealth> {
        let mut workspace = self.load(workspace_id).await?;
        let phase = match self.cluster.virtual_cluster_phase(workspace_id).await {
            Ok(phase) => phase,
            Err(e) => {
                warn!("failed to read workspace {} phase: {}", workspace_id, e);
                ClusterPhase::Unknown
            }
        };

        let now = Utc::now();
        workspace.cluster_info.phase = Some(phase);
        workspace.cluster_info.observed_at = Some(now);
        let workspace = self.save(workspace).await?;

        Ok(ClusterHealth {
            workspace_id: workspace.id,
            status: workspace.status,
            phase,
            healthy: phase.to_internal() == WorkspaceStatus::Active,
            message: format!("virtual cluster is {}", phase),
            checked_at: now,
        })
    }

    pub async fn add_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
        actor: &str,
    ) -> Result<()> {
        self.load(workspace_id).await?;
        self.store
            .add_workspace_member(WorkspaceMember {
                workspace_id: workspace_id.to_owned(),
                user_id: user_id.to_owned(),
                role,
                added_at: Utc::now(),
            })
            .await
            .context(StoreSnafu {
                action: "add member to",
                workspace_id,
            })?;

        self.resync_identity(workspace_id).await;
        self.activity
            .record(
                workspace_id,
                None,
                actor,
                ActivityKind::WorkspaceMemberAdded,
                format!("Added {} as {}", user_id, role),
            )
            .await;
        Ok(())
    }

    pub async fn remove_member(&self, workspace_id: &str, user_id: &str, actor: &str) -> Result<()> {
        self.store
            .remove_workspace_member(workspace_id, user_id)
            .await
            .context(StoreSnafu {
                action: "remove member from",
                workspace_id,
            })?;

        self.resync_identity(workspace_id).await;
        self.activity
            .record(
                workspace_id,
                None,
                actor,
                ActivityKind::WorkspaceMemberRemoved,
                format!("Removed {}", user_id),
            )
            .await;
        Ok(())
    }

    async fn resync_identity(&self, workspace_id: &str) {
        let result = self.configure_identity(workspace_id).await;
        let _ = Severity::Advisory.handle("configure identity", workspace_id, result);
    }

    pub async fn get_workspace(&self, workspace_id: &str) -> Result<Workspace> {
        self.load(workspace_id).await
    }

    pub async fn list_workspaces(
        &self,
        filter: &WorkspaceFilter,
        page: PageRequest,
    ) -> Result<Page<Workspace>> {
        self.store
            .list_workspaces(filter, page)
            .await
            .context(StoreSnafu {
                action: "list",
                workspace_id: "*",
            })
    }

    /// Purges soft-deleted workspaces deleted before `before`.
    pub async fn cleanup_deleted_workspaces(&self, before: DateTime<Utc>) -> Result<usize> {
        let purged = self
            .store
            .purge_workspaces(before)
            .await
            .context(StoreSnafu {
                action: "purge",
                workspace_id: "*",
            })?;
        if purged > 0 {
            info!("purged {} deleted workspaces", purged);
        }
        Ok(purged)
    }

    async fn load(&self, workspace_id: &str) -> Result<Workspace> {
        self.store
            .get_workspace(workspace_id)
            .await
            .context(StoreSnafu {
                action: "get",
                workspace_id,
            })
    }

    async fn save(&self, workspace: Workspace) -> Result<Workspace> {
        let workspace_id = workspace.id.clone();
        self.store
            .update_workspace(workspace)
            .await
            .context(StoreSnafu {
                action: "update",
                workspace_id,
            })
    }
}

fn validate_request(request: &CreateWorkspaceRequest) -> Result<(), types::error::Error> {
    ensure!(
        !request.organization_id.trim().is_empty(),
        InvalidFieldSnafu {
            field: "organizationId",
            message: "must not be empty",
        }
    );
    ensure!(
        !request.name.trim().is_empty(),
        InvalidFieldSnafu {
            field: "name",
            message: "must not be empty",
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ObjectKind, ObjectRef};
    use crate::store::MemoryStore;
    use crate::tests::MockCluster;
    use crate::types::task::TaskStatus;

    fn setup() -> (WorkspaceOrchestrator, Arc<MockCluster>, Arc<MemoryStore>) {
        let cluster = Arc::new(MockCluster::new());
        let store = Arc::new(MemoryStore::new());
        let orchestrator = WorkspaceOrchestrator::new(
            cluster.clone(),
            store.clone(),
            ProvisioningOptions::default(),
        );
        (orchestrator, cluster, store)
    }

    fn request(plan: &str) -> CreateWorkspaceRequest {
        CreateWorkspaceRequest {
            organization_id: "org-1".to_string(),
            name: "team".to_string(),
            plan: plan.to_string(),
            ..Default::default()
        }
    }

    async fn provisioned(orchestrator: &WorkspaceOrchestrator) -> Workspace {
        let (ws, task) = orchestrator
            .create_workspace(request("starter"), "u-1")
            .await
            .expect("create workspace");
        orchestrator
            .process_provisioning_task(&task.id, &CancellationToken::new())
            .await
            .expect("provision")
            .expect("claimed");
        orchestrator.get_workspace(&ws.id).await.expect("get")
    }

    // Test: full creation pipeline ends active with quota and identity installed
    #[tokio::test(start_paused = true)]
    async fn test_provisioning_pipeline() {
        let (orchestrator, cluster, store) = setup();
        let (ws, task) = orchestrator
            .create_workspace(request("professional"), "u-1")
            .await
            .expect("create workspace");
        assert_eq!(ws.status, WorkspaceStatus::Creating);
        assert_eq!(ws.vcluster_instance_name, ws.id);
        assert_eq!(task.payload.workspace_id.as_deref(), Some(ws.id.as_str()));

        cluster.script_phases(
            &ws.id,
            [ClusterPhase::PendingCreation, ClusterPhase::ConfiguringHnc, ClusterPhase::Running],
        );

        let done = orchestrator
            .process_provisioning_task(&task.id, &CancellationToken::new())
            .await
            .expect("provision")
            .expect("claimed");
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.completed_at.is_some());

        let ws = orchestrator.get_workspace(&ws.id).await.expect("get");
        assert_eq!(ws.status, WorkspaceStatus::Active);
        assert_eq!(ws.settings.resource_quota, Some(Plan::Professional.limits()));
        assert_eq!(ws.settings.oidc.as_ref().map(|o| o.client_id.as_str()), Some(ws.id.as_str()));
        assert!(ws.kubeconfig.is_some());

        assert_eq!(
            cluster.applied_kinds(&ws.id),
            vec![ObjectKind::ConfigMap, ObjectKind::ResourceQuota]
        );
        assert!(cluster.has_object(
            &ws.id,
            &ObjectRef::namespaced(ObjectKind::ResourceQuota, "default", "workspace-quota")
        ));

        let activities = store.list_activities(&ws.id).await.expect("activities");
        assert_eq!(activities[0].kind, "workspace_created");
    }

    // Test: a cluster that never gets ready fails the task and keeps the status
    #[tokio::test(start_paused = true)]
    async fn test_provisioning_timeout() {
        let (orchestrator, cluster, _) = setup();
        let (ws, task) = orchestrator
            .create_workspace(request("starter"), "u-1")
            .await
            .expect("create workspace");
        cluster.script_phases(&ws.id, [ClusterPhase::PendingCreation]);

        let err = orchestrator
            .process_provisioning_task(&task.id, &CancellationToken::new())
            .await
            .expect_err("never ready");
        assert!(matches!(err, Error::Timeout { .. }));

        let task = orchestrator.tasks().get(&task.id).await.expect("task");
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.progress, 20);
        assert!(task.error.is_some_and(|e| e.contains("timed out")));

        let ws = orchestrator.get_workspace(&ws.id).await.expect("get");
        assert_eq!(ws.status, WorkspaceStatus::Creating);
    }

    // Test: a failing provision request fails the task without activating
    #[tokio::test]
    async fn test_provision_failure() {
        let (orchestrator, cluster, _) = setup();
        cluster.state().fail_create = true;
        let (ws, task) = orchestrator
            .create_workspace(request("starter"), "u-1")
            .await
            .expect("create workspace");

        let err = orchestrator
            .process_provisioning_task(&task.id, &CancellationToken::new())
            .await
            .expect_err("create rejected");
        assert!(matches!(err, Error::Cluster { .. }));

        let task = orchestrator.tasks().get(&task.id).await.expect("task");
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.progress, 0);
        assert_ne!(
            orchestrator.get_workspace(&ws.id).await.expect("get").status,
            WorkspaceStatus::Active
        );
    }

    // Test: a second worker loses the claim
    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let (orchestrator, _, _) = setup();
        let (_, task) = orchestrator
            .create_workspace(request("starter"), "u-1")
            .await
            .expect("create workspace");

        orchestrator
            .process_provisioning_task(&task.id, &CancellationToken::new())
            .await
            .expect("first run")
            .expect("claimed");
        let second = orchestrator
            .process_provisioning_task(&task.id, &CancellationToken::new())
            .await
            .expect("second run");
        assert!(second.is_none());
    }

    // Test: tasks are routed only to their own pipeline
    #[tokio::test]
    async fn test_wrong_task_type() {
        let (orchestrator, _, _) = setup();
        let (_, task) = orchestrator
            .create_workspace(request("starter"), "u-1")
            .await
            .expect("create workspace");

        let err = orchestrator
            .process_update_task(&task.id)
            .await
            .expect_err("create task is not an update");
        assert!(matches!(err, Error::UnexpectedTask { .. }));
    }

    // Test: empty names are rejected before anything is persisted
    #[tokio::test]
    async fn test_create_validation() {
        let (orchestrator, _, store) = setup();
        let mut bad = request("starter");
        bad.name = " ".to_string();

        let err = orchestrator
            .create_workspace(bad, "u-1")
            .await
            .expect_err("empty name");
        assert!(matches!(err, Error::Types { .. }));
        assert_eq!(
            store
                .list_workspaces(&WorkspaceFilter::default(), PageRequest::default())
                .await
                .expect("list")
                .total,
            0
        );
    }

    // Test: teardown waits for absence and soft-deletes the record
    #[tokio::test(start_paused = true)]
    async fn test_deletion_pipeline() {
        let (orchestrator, cluster, _) = setup();
        let ws = provisioned(&orchestrator).await;
        cluster.state().linger_after_delete = 3;

        let task = orchestrator
            .delete_workspace(&ws.id, "u-1")
            .await
            .expect("delete")
            .expect("teardown queued");
        assert_eq!(
            orchestrator.get_workspace(&ws.id).await.expect("get").status,
            WorkspaceStatus::Deleting
        );

        let done = orchestrator
            .process_deletion_task(&task.id, &CancellationToken::new())
            .await
            .expect("teardown")
            .expect("claimed");
        assert_eq!(done.status, TaskStatus::Completed);

        let ws = orchestrator.get_workspace(&ws.id).await.expect("get");
        assert!(ws.deleted_at.is_some());
        let listed = orchestrator
            .list_workspaces(&WorkspaceFilter::default(), PageRequest::default())
            .await
            .expect("list");
        assert_eq!(listed.total, 0);
    }

    // Test: tearing down an absent cluster succeeds immediately
    #[tokio::test(start_paused = true)]
    async fn test_teardown_absent_cluster() {
        let (orchestrator, _, _) = setup();
        orchestrator
            .teardown("ws-gone", &CancellationToken::new())
            .await
            .expect("absence is success");
    }

    // Test: a cluster that never disappears times out distinctly
    #[tokio::test(start_paused = true)]
    async fn test_teardown_timeout() {
        let (orchestrator, cluster, _) = setup();
        let ws = provisioned(&orchestrator).await;
        cluster.state().linger_after_delete = usize::MAX;

        let err = orchestrator
            .teardown(&ws.id, &CancellationToken::new())
            .await
            .expect_err("still deleting");
        assert!(matches!(err, Error::Timeout { operation: "deleted", .. }));
    }

    // Test: cancelling the readiness wait leaves the workspace untouched
    #[tokio::test(start_paused = true)]
    async fn test_await_ready_cancelled() {
        let (orchestrator, cluster, _) = setup();
        let (ws, _) = orchestrator
            .create_workspace(request("starter"), "u-1")
            .await
            .expect("create workspace");
        orchestrator.provision(&ws.id, Plan::Starter).await.expect("provision");
        cluster.script_phases(&ws.id, [ClusterPhase::PendingCreation]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orchestrator
            .await_ready(&ws.id, &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, Error::Cancelled { .. }));
        assert_eq!(
            orchestrator.get_workspace(&ws.id).await.expect("get").status,
            WorkspaceStatus::Creating
        );
    }

    // Test: a cancelled provisioning wait requeues the task and a later run resumes it
    #[tokio::test(start_paused = true)]
    async fn test_cancelled_provisioning_resumes() {
        let (orchestrator, _, _) = setup();
        let (ws, task) = orchestrator
            .create_workspace(request("starter"), "u-1")
            .await
            .expect("create workspace");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orchestrator
            .process_provisioning_task(&task.id, &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, Error::Cancelled { .. }));

        let interrupted = orchestrator.tasks().get(&task.id).await.expect("task");
        assert_eq!(interrupted.status, TaskStatus::Pending);
        assert_eq!(interrupted.progress, 20);
        assert!(interrupted.error.is_none());
        assert_eq!(
            orchestrator.get_workspace(&ws.id).await.expect("get").status,
            WorkspaceStatus::Creating
        );

        let done = orchestrator
            .process_provisioning_task(&task.id, &CancellationToken::new())
            .await
            .expect("resume")
            .expect("claimed again");
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(
            orchestrator.get_workspace(&ws.id).await.expect("get").status,
            WorkspaceStatus::Active
        );
    }

    // Test: a workspace whose provisioning failed can be marked failed and deleted
    #[tokio::test(start_paused = true)]
    async fn test_failed_workspace_can_be_deleted() {
        let (orchestrator, cluster, store) = setup();
        cluster.state().fail_create = true;
        let (ws, task) = orchestrator
            .create_workspace(request("starter"), "u-1")
            .await
            .expect("create workspace");
        orchestrator
            .process_provisioning_task(&task.id, &CancellationToken::new())
            .await
            .expect_err("create rejected");

        let failed = orchestrator
            .mark_failed(&ws.id, "provisioning failed", "system")
            .await
            .expect("mark failed");
        assert_eq!(failed.status, WorkspaceStatus::Error);
        orchestrator
            .mark_failed(&ws.id, "provisioning failed", "system")
            .await
            .expect("already failed");

        let kinds: Vec<String> = store
            .list_activities(&ws.id)
            .await
            .expect("activities")
            .into_iter()
            .map(|a| a.kind)
            .collect();
        assert!(kinds.contains(&"workspace_failed".to_string()));

        let task = orchestrator
            .delete_workspace(&ws.id, "u-1")
            .await
            .expect("delete")
            .expect("teardown queued");
        orchestrator
            .process_deletion_task(&task.id, &CancellationToken::new())
            .await
            .expect("teardown")
            .expect("claimed");
        assert!(orchestrator.get_workspace(&ws.id).await.expect("get").deleted_at.is_some());
    }

    // Test: deleting a deleted or purged workspace is a no-op
    #[tokio::test(start_paused = true)]
    async fn test_delete_already_deleted() {
        let (orchestrator, _, _) = setup();
        let ws = provisioned(&orchestrator).await;
        let task = orchestrator
            .delete_workspace(&ws.id, "u-1")
            .await
            .expect("delete")
            .expect("teardown queued");
        orchestrator
            .process_deletion_task(&task.id, &CancellationToken::new())
            .await
            .expect("teardown");

        assert!(orchestrator.delete_workspace(&ws.id, "u-1").await.expect("deleted").is_none());

        orchestrator
            .cleanup_deleted_workspaces(Utc::now() + chrono::Duration::hours(1))
            .await
            .expect("cleanup");
        assert!(orchestrator.delete_workspace(&ws.id, "u-1").await.expect("purged").is_none());
        assert!(orchestrator.delete_workspace("ws-gone", "u-1").await.expect("unknown").is_none());
    }

    // Test: deleting twice is allowed, deleting while creating is not
    #[tokio::test]
    async fn test_delete_transitions() {
        let (orchestrator, _, _) = setup();
        let (ws, _) = orchestrator
            .create_workspace(request("starter"), "u-1")
            .await
            .expect("create workspace");

        let err = orchestrator
            .delete_workspace(&ws.id, "u-1")
            .await
            .expect_err("creating cannot be deleted");
        assert!(matches!(err, Error::Types { .. }));

        let ws = provisioned(&orchestrator).await;
        orchestrator.delete_workspace(&ws.id, "u-1").await.expect("first");
        orchestrator.delete_workspace(&ws.id, "u-1").await.expect("retry");
    }

    // Test: plan change re-applies the quota and returns to active
    #[tokio::test]
    async fn test_change_plan() {
        let (orchestrator, cluster, _) = setup();
        let ws = provisioned(&orchestrator).await;

        let task = orchestrator
            .change_plan(&ws.id, Plan::Enterprise, "u-1")
            .await
            .expect("change plan");
        assert_eq!(task.payload.plan.as_deref(), Some("enterprise"));
        assert_eq!(
            orchestrator.get_workspace(&ws.id).await.expect("get").status,
            WorkspaceStatus::Updating
        );

        orchestrator
            .process_update_task(&task.id)
            .await
            .expect("update")
            .expect("claimed");

        let ws = orchestrator.get_workspace(&ws.id).await.expect("get");
        assert_eq!(ws.status, WorkspaceStatus::Active);
        assert_eq!(ws.plan, Plan::Enterprise);
        assert_eq!(ws.settings.resource_quota, Some(Plan::Enterprise.limits()));
        assert_eq!(cluster.virtual_cluster_plan(&ws.id).as_deref(), Some("enterprise"));
    }

    // Test: suspend and reactivate scale the virtual cluster
    #[tokio::test]
    async fn test_suspend_and_reactivate() {
        let (orchestrator, cluster, _) = setup();
        let ws = provisioned(&orchestrator).await;

        let stopped = orchestrator.suspend(&ws.id, "u-1").await.expect("suspend");
        assert_eq!(stopped.status, WorkspaceStatus::Stopped);
        assert_eq!(cluster.virtual_cluster_replicas(&ws.id), Some(0));

        let active = orchestrator.reactivate(&ws.id, "u-1").await.expect("reactivate");
        assert_eq!(active.status, WorkspaceStatus::Active);
        assert_eq!(cluster.virtual_cluster_replicas(&ws.id), Some(1));

        assert!(orchestrator.reactivate(&ws.id, "u-1").await.is_err());
    }

    // Test: a failed scale-down leaves the workspace in error
    #[tokio::test]
    async fn test_suspend_failure() {
        let (orchestrator, cluster, _) = setup();
        let ws = provisioned(&orchestrator).await;
        cluster.state().fail_scale = true;

        assert!(orchestrator.suspend(&ws.id, "u-1").await.is_err());
        assert_eq!(
            orchestrator.get_workspace(&ws.id).await.expect("get").status,
            WorkspaceStatus::Error
        );
    }

    // Test: kubeconfig is only handed out for active workspaces
    #[tokio::test]
    async fn test_get_kubeconfig() {
        let (orchestrator, _, _) = setup();
        let (pending, _) = orchestrator
            .create_workspace(request("starter"), "u-1")
            .await
            .expect("create workspace");
        let err = orchestrator
            .get_kubeconfig(&pending.id)
            .await
            .expect_err("not active yet");
        assert!(matches!(err, Error::NotActive { .. }));

        let ws = provisioned(&orchestrator).await;
        let kubeconfig = orchestrator.get_kubeconfig(&ws.id).await.expect("kubeconfig");
        assert!(kubeconfig.contains(&ws.id));
    }

    // Test: health reflects the live phase and unreadable phases are unknown
    #[tokio::test]
    async fn test_cluster_health() {
        let (orchestrator, cluster, _) = setup();
        let ws = provisioned(&orchestrator).await;

        let health = orchestrator.cluster_health(&ws.id).await.expect("health");
        assert!(health.healthy);
        assert_eq!(health.phase, ClusterPhase::Running);

        cluster.state().virtual_clusters.clear();
        let health = orchestrator.cluster_health(&ws.id).await.expect("health");
        assert!(!health.healthy);
        assert_eq!(health.phase, ClusterPhase::Unknown);
        let ws = orchestrator.get_workspace(&ws.id).await.expect("get");
        assert_eq!(ws.cluster_info.phase, Some(ClusterPhase::Unknown));
    }

    // Test: member changes re-apply identity and tolerate its failure
    #[tokio::test]
    async fn test_members_resync_identity() {
        let (orchestrator, cluster, store) = setup();
        let ws = provisioned(&orchestrator).await;
        let before = cluster.applied_kinds(&ws.id).len();

        orchestrator
            .add_member(&ws.id, "u-2", WorkspaceRole::Member, "u-1")
            .await
            .expect("add member");
        assert_eq!(cluster.applied_kinds(&ws.id).len(), before + 1);

        cluster.fail_apply(ObjectKind::ConfigMap);
        orchestrator
            .remove_member(&ws.id, "u-2", "u-1")
            .await
            .expect("identity failure is advisory");
        assert!(store.list_workspace_members(&ws.id).await.expect("members").is_empty());

        let kinds: Vec<String> = store
            .list_activities(&ws.id)
            .await
            .expect("activities")
            .into_iter()
            .map(|a| a.kind)
            .collect();
        assert!(kinds.contains(&"workspace_member_added".to_string()));
        assert!(kinds.contains(&"workspace_member_removed".to_string()));
    }

    // Test: only backup and restore are accepted as on-demand operations
    #[tokio::test]
    async fn test_request_operation() {
        let (orchestrator, _, _) = setup();
        let ws = provisioned(&orchestrator).await;

        let task = orchestrator
            .request_operation(
                &ws.id,
                TaskType::Backup,
                TaskPayload {
                    backup_id: Some("b-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("backup");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.payload.workspace_id.as_deref(), Some(ws.id.as_str()));

        assert!(
            orchestrator
                .request_operation(&ws.id, TaskType::Create, TaskPayload::default())
                .await
                .is_err()
        );
    }

    // Test: retention purges soft-deleted workspaces only
    #[tokio::test(start_paused = true)]
    async fn test_cleanup_deleted_workspaces() {
        let (orchestrator, _, store) = setup();
        let keep = provisioned(&orchestrator).await;
        let gone = provisioned(&orchestrator).await;
        let task = orchestrator
            .delete_workspace(&gone.id, "u-1")
            .await
            .expect("delete")
            .expect("teardown queued");
        orchestrator
            .process_deletion_task(&task.id, &CancellationToken::new())
            .await
            .expect("teardown");

        let purged = orchestrator
            .cleanup_deleted_workspaces(Utc::now() + chrono::Duration::hours(1))
            .await
            .expect("cleanup");
        assert_eq!(purged, 1);
        assert!(store.get_workspace(&keep.id).await.is_ok());
        assert!(store.get_workspace(&gone.id).await.expect_err("purged").is_not_found());
    }
}
