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

//! Relational persistence interface.
//!
//! The store is the source of truth for which workspaces, projects and
//! applications exist. Rows are keyed by id and writes are last-write-wins.

use crate::types;
use crate::types::application::Application;
use crate::types::project::{Project, ProjectMember};
use crate::types::task::{Task, TaskType};
use crate::types::workspace::{Workspace, WorkspaceFilter, WorkspaceMember};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::Snafu;

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{} '{}' not found", kind, id))]
    NotFound { kind: &'static str, id: String },

    #[snafu(display("conflict: {}", message))]
    Conflict { message: String },

    #[snafu(display("unexpected store error: {}", message))]
    Unexpected { message: String },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

impl PageRequest {
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

/// One entry of the append-only audit log.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub workspace_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    pub actor: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_workspace(&self, workspace: Workspace) -> Result<Workspace>;
    async fn get_workspace(&self, id: &str) -> Result<Workspace>;

    /// Rejects changes to fields that are fixed at creation.
    async fn update_workspace(&self, workspace: Workspace) -> Result<Workspace>;

    /// Deleting and soft-deleted workspaces are never returned.
    async fn list_workspaces(
        &self,
        filter: &WorkspaceFilter,
        page: PageRequest,
    ) -> Result<Page<Workspace>>;

    /// Removes soft-deleted workspaces deleted before `before`.
    async fn purge_workspaces(&self, before: DateTime<Utc>) -> Result<usize>;

    async fn add_workspace_member(&self, member: WorkspaceMember) -> Result<()>;
    async fn remove_workspace_member(&self, workspace_id: &str, user_id: &str) -> Result<()>;
    async fn list_workspace_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>>;

    /// Fails with a conflict when the name is taken in the workspace.
    async fn create_project(&self, project: Project) -> Result<Project>;
    async fn get_project(&self, id: &str) -> Result<Project>;
    async fn get_project_by_name(&self, workspace_id: &str, name: &str) -> Result<Option<Project>>;
    async fn update_project(&self, project: Project) -> Result<Project>;
    async fn delete_project(&self, id: &str) -> Result<()>;
    async fn list_projects(&self, workspace_id: &str) -> Result<Vec<Project>>;
    async fn list_child_projects(&self, parent_id: &str) -> Result<Vec<Project>>;

    async fn add_project_member(&self, member: ProjectMember) -> Result<()>;
    async fn remove_project_member(&self, project_id: &str, user_id: &str) -> Result<()>;
    async fn list_project_members(&self, project_id: &str) -> Result<Vec<ProjectMember>>;

    /// Fails with a conflict when the name is taken in the project.
    async fn create_application(&self, application: Application) -> Result<Application>;
    async fn get_application(&self, id: &str) -> Result<Application>;
    async fn get_application_by_name(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<Option<Application>>;
    async fn update_application(&self, application: Application) -> Result<Application>;
    async fn delete_application(&self, id: &str) -> Result<()>;
    async fn list_applications(&self, project_id: &str) -> Result<Vec<Application>>;

    async fn create_task(&self, task: Task) -> Result<Task>;
    async fn get_task(&self, id: &str) -> Result<Task>;
    async fn update_task(&self, task: Task) -> Result<Task>;

    /// Atomically moves a pending task to running. `None` when the task was
    /// no longer pending, i.e. another worker won the claim.
    async fn claim_task(&self, id: &str) -> Result<Option<Task>>;

    /// Pending tasks, oldest first.
    async fn pending_tasks(&self, task_type: Option<TaskType>, limit: usize) -> Result<Vec<Task>>;
    async fn list_tasks(&self, workspace_id: &str) -> Result<Vec<Task>>;

    /// Removes terminal tasks completed before `before`.
    async fn purge_tasks(&self, before: DateTime<Utc>) -> Result<usize>;

    async fn record_activity(&self, activity: Activity) -> Result<()>;
    async fn list_activities(&self, workspace_id: &str) -> Result<Vec<Activity>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(PageRequest::default().offset(), 0);
        assert_eq!(PageRequest { page: 3, page_size: 10 }.offset(), 20);
        assert_eq!(PageRequest { page: 0, page_size: 10 }.offset(), 0);
    }

    // Test: huge page numbers clamp instead of overflowing
    #[test]
    fn test_page_offset_saturates() {
        let page = PageRequest {
            page: usize::MAX,
            page_size: 20,
        };
        assert_eq!(page.offset(), usize::MAX);
    }
}
