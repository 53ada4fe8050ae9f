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

use super::{Activity, ConflictSnafu, NotFoundSnafu, Page, PageRequest, Result, Store};
use crate::types::application::Application;
use crate::types::project::{Project, ProjectMember};
use crate::types::task::{Task, TaskStatus, TaskType};
use crate::types::workspace::{Workspace, WorkspaceFilter, WorkspaceMember};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use snafu::OptionExt;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory [`Store`] for tests and single-process runs.
///
/// Each table sits behind its own lock, so one call never holds two write
/// locks at once. Tasks are kept in insertion order, which is what makes
/// [`Store::pending_tasks`] oldest-first.
#[derive(Default)]
pub struct MemoryStore {
    workspaces: RwLock<HashMap<String, Workspace>>,
    workspace_members: RwLock<HashMap<String, Vec<WorkspaceMember>>>,
    projects: RwLock<HashMap<String, Project>>,
    project_members: RwLock<HashMap<String, Vec<ProjectMember>>>,
    applications: RwLock<HashMap<String, Application>>,
    tasks: RwLock<Vec<Task>>,
    activities: RwLock<Vec<Activity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted<T>(items: impl Iterator<Item = T>, key: impl Fn(&T) -> (DateTime<Utc>, String)) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    items.sort_by_key(key);
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_workspace(&self, workspace: Workspace) -> Result<Workspace> {
        let mut workspaces = self.workspaces.write().await;
        if workspaces.contains_key(&workspace.id) {
            return ConflictSnafu {
                message: format!("workspace {} already exists", workspace.id),
            }
            .fail();
        }
        workspaces.insert(workspace.id.clone(), workspace.clone());
        Ok(workspace)
    }

    async fn get_workspace(&self, id: &str) -> Result<Workspace> {
        self.workspaces
            .read()
            .await
            .get(id)
            .cloned()
            .context(NotFoundSnafu { kind: "workspace", id })
    }

    async fn update_workspace(&self, workspace: Workspace) -> Result<Workspace> {
        let mut workspaces = self.workspaces.write().await;
        let stored = workspaces.get_mut(&workspace.id).context(NotFoundSnafu {
            kind: "workspace",
            id: workspace.id.as_str(),
        })?;
        workspace.check_immutable(stored)?;
        *stored = workspace.clone();
        Ok(workspace)
    }

    async fn list_workspaces(
        &self,
        filter: &WorkspaceFilter,
        page: PageRequest,
    ) -> Result<Page<Workspace>> {
        let workspaces = self.workspaces.read().await;
        let matching = sorted(
            workspaces
                .values()
                .filter(|ws| ws.is_listable() && filter.matches(ws))
                .cloned(),
            |ws| (ws.created_at, ws.id.clone()),
        );

        Ok(Page {
            total: matching.len(),
            items: matching
                .into_iter()
                .skip(page.offset())
                .take(page.page_size)
                .collect(),
            page: page.page,
            page_size: page.page_size,
        })
    }

    async fn purge_workspaces(&self, before: DateTime<Utc>) -> Result<usize> {
        let mut workspaces = self.workspaces.write().await;
        let count = workspaces.len();
        workspaces.retain(|_, ws| ws.deleted_at.is_none_or(|at| at >= before));
        Ok(count - workspaces.len())
    }

    async fn add_workspace_member(&self, member: WorkspaceMember) -> Result<()> {
        let mut members = self.workspace_members.write().await;
        let list = members.entry(member.workspace_id.clone()).or_default();
        if list.iter().any(|m| m.user_id == member.user_id) {
            return ConflictSnafu {
                message: format!(
                    "user {} is already a member of workspace {}",
                    member.user_id, member.workspace_id
                ),
            }
            .fail();
        }
        list.push(member);
        Ok(())
    }

    async fn remove_workspace_member(&self, workspace_id: &str, user_id: &str) -> Result<()> {
        let mut members = self.workspace_members.write().await;
        let list = members.entry(workspace_id.to_owned()).or_default();
        let before = list.len();
        list.retain(|m| m.user_id != user_id);
        if list.len() == before {
            return NotFoundSnafu {
                kind: "workspace member",
                id: user_id,
            }
            .fail();
        }
        Ok(())
    }

    async fn list_workspace_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>> {
        Ok(self
            .workspace_members
            .read()
            .await
            .get(workspace_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_project(&self, project: Project) -> Result<Project> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&project.id)
            || projects
                .values()
                .any(|p| p.workspace_id == project.workspace_id && p.name == project.name)
        {
            return ConflictSnafu {
                message: format!(
                    "project '{}' already exists in workspace {}",
                    project.name, project.workspace_id
                ),
            }
            .fail();
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: &str) -> Result<Project> {
        self.projects
            .read()
            .await
            .get(id)
            .cloned()
            .context(NotFoundSnafu { kind: "project", id })
    }

    async fn get_project_by_name(&self, workspace_id: &str, name: &str) -> Result<Option<Project>> {
        Ok(self
            .projects
            .read()
            .await
            .values()
            .find(|p| p.workspace_id == workspace_id && p.name == name)
            .cloned())
    }

    async fn update_project(&self, project: Project) -> Result<Project> {
        let mut projects = self.projects.write().await;
        let stored = projects.get_mut(&project.id).context(NotFoundSnafu {
            kind: "project",
            id: project.id.as_str(),
        })?;
        *stored = project.clone();
        Ok(project)
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        self.projects
            .write()
            .await
            .remove(id)
            .context(NotFoundSnafu { kind: "project", id })?;
        self.project_members.write().await.remove(id);
        Ok(())
    }

    async fn list_projects(&self, workspace_id: &str) -> Result<Vec<Project>> {
        let projects = self.projects.read().await;
        Ok(sorted(
            projects
                .values()
                .filter(|p| p.workspace_id == workspace_id)
                .cloned(),
            |p| (p.created_at, p.id.clone()),
        ))
    }

    async fn list_child_projects(&self, parent_id: &str) -> Result<Vec<Project>> {
        let projects = self.projects.read().await;
        Ok(sorted(
            projects
                .values()
                .filter(|p| p.parent_id.as_deref() == Some(parent_id))
                .cloned(),
            |p| (p.created_at, p.id.clone()),
        ))
    }

    async fn add_project_member(&self, member: ProjectMember) -> Result<()> {
        let mut members = self.project_members.write().await;
        let list = members.entry(member.project_id.clone()).or_default();
        if list.iter().any(|m| m.user_id == member.user_id) {
            return ConflictSnafu {
                message: format!(
                    "user {} is already a member of project {}",
                    member.user_id, member.project_id
                ),
            }
            .fail();
        }
        list.push(member);
        Ok(())
    }

    async fn remove_project_member(&self, project_id: &str, user_id: &str) -> Result<()> {
        let mut members = self.project_members.write().await;
        let list = members.entry(project_id.to_owned()).or_default();
        let before = list.len();
        list.retain(|m| m.user_id != user_id);
        if list.len() == before {
            return NotFoundSnafu {
                kind: "project member",
                id: user_id,
            }
            .fail();
        }
        Ok(())
    }

    async fn list_project_members(&self, project_id: &str) -> Result<Vec<ProjectMember>> {
        Ok(self
            .project_members
            .read()
            .await
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_application(&self, application: Application) -> Result<Application> {
        let mut applications = self.applications.write().await;
        if applications.contains_key(&application.id)
            || applications
                .values()
                .any(|a| a.project_id == application.project_id && a.name == application.name)
        {
            return ConflictSnafu {
                message: format!(
                    "application '{}' already exists in project {}",
                    application.name, application.project_id
                ),
            }
            .fail();
        }
        applications.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    async fn get_application(&self, id: &str) -> Result<Application> {
        self.applications
            .read()
            .await
            .get(id)
            .cloned()
            .context(NotFoundSnafu {
                kind: "application",
                id,
            })
    }

    async fn get_application_by_name(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<Option<Application>> {
        Ok(self
            .applications
            .read()
            .await
            .values()
            .find(|a| a.project_id == project_id && a.name == name)
            .cloned())
    }

    async fn update_application(&self, application: Application) -> Result<Application> {
        let mut applications = self.applications.write().await;
        let stored = applications
            .get_mut(&application.id)
            .context(NotFoundSnafu {
                kind: "application",
                id: application.id.as_str(),
            })?;
        *stored = application.clone();
        Ok(application)
    }

    async fn delete_application(&self, id: &str) -> Result<()> {
        self.applications
            .write()
            .await
            .remove(id)
            .context(NotFoundSnafu {
                kind: "application",
                id,
            })?;
        Ok(())
    }

    async fn list_applications(&self, project_id: &str) -> Result<Vec<Application>> {
        let applications = self.applications.read().await;
        Ok(sorted(
            applications
                .values()
                .filter(|a| a.project_id == project_id)
                .cloned(),
            |a| (a.created_at, a.id.clone()),
        ))
    }

    async fn create_task(&self, task: Task) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        if tasks.iter().any(|t| t.id == task.id) {
            return ConflictSnafu {
                message: format!("task {} already exists", task.id),
            }
            .fail();
        }
        tasks.push(task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: &str) -> Result<Task> {
        self.tasks
            .read()
            .await
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .context(NotFoundSnafu { kind: "task", id })
    }

    async fn update_task(&self, task: Task) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let stored = tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .context(NotFoundSnafu {
                kind: "task",
                id: task.id.as_str(),
            })?;
        *stored = task.clone();
        Ok(task)
    }

    async fn claim_task(&self, id: &str) -> Result<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        let stored = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .context(NotFoundSnafu { kind: "task", id })?;

        if stored.status != TaskStatus::Pending {
            return Ok(None);
        }
        stored.start()?;
        Ok(Some(stored.clone()))
    }

    async fn pending_tasks(&self, task_type: Option<TaskType>, limit: usize) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut pending: Vec<Task> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .filter(|t| task_type.is_none_or(|ty| t.task_type == ty))
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        pending.sort_by_key(|t| t.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn list_tasks(&self, workspace_id: &str) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| t.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn purge_tasks(&self, before: DateTime<Utc>) -> Result<usize> {
        let mut tasks = self.tasks.write().await;
        let count = tasks.len();
        tasks.retain(|t| {
            !(t.status.is_terminal() && t.completed_at.is_some_and(|at| at < before))
        });
        Ok(count - tasks.len())
    }

    async fn record_activity(&self, activity: Activity) -> Result<()> {
        self.activities.write().await.push(activity);
        Ok(())
    }

    async fn list_activities(&self, workspace_id: &str) -> Result<Vec<Activity>> {
        Ok(self
            .activities
            .read()
            .await
            .iter()
            .filter(|a| a.workspace_id == workspace_id)
            .cloned()
            .collect())
    }
}
