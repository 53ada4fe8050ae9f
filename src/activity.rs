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

//! Best-effort audit sink. A failed write is logged and never surfaces to
//! the operation that produced the record.

use crate::store::{Activity, Store};
use crate::types::error::Severity;
use chrono::Utc;
use std::sync::Arc;
use strum::Display;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ActivityKind {
    #[strum(to_string = "workspace_created")]
    WorkspaceCreated,

    #[strum(to_string = "workspace_deleted")]
    WorkspaceDeleted,

    #[strum(to_string = "workspace_plan_changed")]
    WorkspacePlanChanged,

    #[strum(to_string = "workspace_suspended")]
    WorkspaceSuspended,

    #[strum(to_string = "workspace_reactivated")]
    WorkspaceReactivated,

    #[strum(to_string = "workspace_failed")]
    WorkspaceFailed,

    #[strum(to_string = "workspace_member_added")]
    WorkspaceMemberAdded,

    #[strum(to_string = "workspace_member_removed")]
    WorkspaceMemberRemoved,

    #[strum(to_string = "project_created")]
    ProjectCreated,

    #[strum(to_string = "project_updated")]
    ProjectUpdated,

    #[strum(to_string = "project_deleted")]
    ProjectDeleted,

    #[strum(to_string = "quota_applied")]
    QuotaApplied,

    #[strum(to_string = "member_added")]
    MemberAdded,

    #[strum(to_string = "member_removed")]
    MemberRemoved,

    #[strum(to_string = "deployment.started")]
    DeploymentStarted,

    #[strum(to_string = "deployment.succeeded")]
    DeploymentSucceeded,

    #[strum(to_string = "deployment.failed")]
    DeploymentFailed,

    #[strum(to_string = "ingress.failed")]
    IngressFailed,

    #[strum(to_string = "update.started")]
    UpdateStarted,

    #[strum(to_string = "update.succeeded")]
    UpdateSucceeded,

    #[strum(to_string = "update.failed")]
    UpdateFailed,

    #[strum(to_string = "application.stopped")]
    ApplicationStopped,

    #[strum(to_string = "application.started")]
    ApplicationStarted,

    #[strum(to_string = "application.scaled")]
    ApplicationScaled,

    #[strum(to_string = "restart.completed")]
    RestartCompleted,

    #[strum(to_string = "application.deleted")]
    ApplicationDeleted,

    #[strum(to_string = "cronjob.triggered")]
    CronJobTriggered,
}

#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn Store>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        workspace_id: &str,
        project_id: Option<&str>,
        actor: &str,
        kind: ActivityKind,
        description: impl Into<String>,
    ) {
        let activity = Activity {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace_id.to_owned(),
            project_id: project_id.map(str::to_owned),
            actor: actor.to_owned(),
            kind: kind.to_string(),
            description: description.into(),
            created_at: Utc::now(),
        };

        let result = self.store.record_activity(activity).await;
        // advisory never yields Err
        let _ = Severity::Advisory.handle("record activity", workspace_id, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    // Test: records carry kind, actor and scope
    #[tokio::test]
    async fn test_record_activity() {
        let store = Arc::new(MemoryStore::new());
        let log = ActivityLog::new(store.clone());

        log.record(
            "ws-1",
            Some("p-1"),
            "u-1",
            ActivityKind::ProjectCreated,
            "Created project backend",
        )
        .await;

        let activities = store.list_activities("ws-1").await.expect("list");
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].kind, "project_created");
        assert_eq!(activities[0].actor, "u-1");
        assert_eq!(activities[0].project_id.as_deref(), Some("p-1"));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ActivityKind::DeploymentStarted.to_string(), "deployment.started");
        assert_eq!(ActivityKind::ApplicationScaled.to_string(), "application.scaled");
    }
}
