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

use crate::cluster::KubeCluster;
use crate::config::Config;
use crate::store::MemoryStore;
use crate::types::quota::{Plan, WORKSPACE_QUOTA_NAME};
use crate::types::workspace::{CreateWorkspaceRequest, QUOTA_NAMESPACE, Workspace};
use crate::workspace::WorkspaceOrchestrator;
use kube::Client;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub mod activity;
pub mod cluster;
pub mod config;
mod context;
pub mod deploy;
pub mod project;
pub mod store;
pub mod tasks;
pub mod types;
pub mod workspace;


pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Actor recorded for operations started from the command line.
const CLI_ACTOR: &str = "cli";

async fn orchestrator(config: &Config) -> Result<WorkspaceOrchestrator, kube::Error> {
    let client = Client::try_default().await?;
    let cluster = Arc::new(KubeCluster::new(client, &config.vcluster_namespace));
    Ok(WorkspaceOrchestrator::new(
        cluster,
        Arc::new(MemoryStore::new()),
        config.provisioning_options(),
    ))
}

/// Provisions a workspace against the current kube context and writes the
/// resulting record, kubeconfig included, as YAML to `file` or stdout.
pub async fn provision(
    config: Config,
    request: CreateWorkspaceRequest,
    file: Option<String>,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = orchestrator(&config).await?;
    let workspace = provision_workspace(&orchestrator, request, &cancel).await?;

    let mut writer = output(file).await?;
    writer
        .write_all(serde_yaml_ng::to_string(&workspace)?.as_bytes())
        .await?;
    writer.flush().await?;
    Ok(())
}

/// Deletes the virtual cluster of `workspace_id` and waits until it is gone.
pub async fn teardown(
    config: Config,
    workspace_id: &str,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = orchestrator(&config).await?;
    orchestrator.teardown(workspace_id, &cancel).await?;
    info!("workspace {} torn down", workspace_id);
    Ok(())
}

/// Creates the workspace and runs its provisioning task in place. A failed
/// run leaves the workspace in `error`.
async fn provision_workspace(
    orchestrator: &WorkspaceOrchestrator,
    request: CreateWorkspaceRequest,
    cancel: &CancellationToken,
) -> workspace::Result<Workspace> {
    let (workspace, task) = orchestrator.create_workspace(request, CLI_ACTOR).await?;
    info!("provisioning workspace {} ({})", workspace.name, workspace.id);

    if let Err(e) = orchestrator.process_provisioning_task(&task.id, cancel).await {
        error!("provisioning workspace {} failed: {}", workspace.id, e);
        if let Err(mark) = orchestrator.mark_failed(&workspace.id, &e.to_string(), CLI_ACTOR).await {
            error!("failed to mark workspace {} failed: {}", workspace.id, mark);
        }
        return Err(e);
    }
    orchestrator.get_workspace(&workspace.id).await
}

/// Writes the workspace ResourceQuota of `plan` as YAML to `file`, or to
/// stdout when no file is given.
pub async fn quota(plan: &str, file: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = output(file).await?;
    writer.write_all(quota_yaml(Plan::parse_or_default(plan))?.as_bytes()).await?;
    writer.flush().await?;

    Ok(())
}

async fn output(file: Option<String>) -> std::io::Result<Pin<Box<dyn AsyncWrite + Send>>> {
    Ok(if let Some(file) = file {
        Box::pin(
            tokio::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(file)
                .await?,
        )
    } else {
        Box::pin(tokio::io::stdout())
    })
}

fn quota_yaml(plan: Plan) -> Result<String, serde_yaml_ng::Error> {
    let quota = plan
        .limits()
        .new_resource_quota(WORKSPACE_QUOTA_NAME, QUOTA_NAMESPACE);
    serde_yaml_ng::to_string(&quota)
}
