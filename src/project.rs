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

//! Project hierarchy.
//!
//! The store record is the source of truth for a project. Its namespace,
//! HNC anchor and RoleBindings are a projection into the virtual cluster and
//! are applied best-effort, except for resource quotas which callers ask for
//! explicitly.

use crate::activity::{ActivityKind, ActivityLog};
use crate::cluster::{self, ClusterControl, ObjectKind, ObjectRef};
use crate::store::{self, Store};
use crate::types;
use crate::types::error::{InvalidFieldSnafu, Severity};
use crate::types::project::{
    CreateProjectRequest, NamespaceState, Project, ProjectMember, ProjectNode, ProjectRole,
    UpdateProjectRequest, role_binding_name, validate_project_name,
};
use crate::types::quota::{PROJECT_QUOTA_NAME, QuotaLimits};
use chrono::Utc;
use futures::future::BoxFuture;
use snafu::{ResultExt, Snafu, ensure};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to {} project {}: {}", action, project_id, source))]
    Store {
        action: &'static str,
        project_id: String,
        source: store::Error,
    },

    #[snafu(display("failed to {} for project {}: {}", action, project_id, source))]
    Cluster {
        action: &'static str,
        project_id: String,
        source: cluster::Error,
    },

    #[snafu(display("project name '{}' is already taken in workspace {}", name, workspace_id))]
    NameTaken { workspace_id: String, name: String },

    #[snafu(display("user {} is already a member of project {}", user_id, project_id))]
    AlreadyMember { project_id: String, user_id: String },

    #[snafu(display("project {} cannot be placed under {}: it would form a cycle", project_id, parent_id))]
    Cycle { project_id: String, parent_id: String },

    #[snafu(display("project {} still has {} sub-projects", project_id, children))]
    HasChildren { project_id: String, children: usize },

    #[snafu(display("project {} still has {} applications", project_id, applications))]
    HasApplications { project_id: String, applications: usize },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store { source, .. } => source.is_not_found(),
            Error::Cluster { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone)]
pub struct HierarchyManager {
    cluster: Arc<dyn ClusterControl>,
    store: Arc<dyn Store>,
    activity: ActivityLog,
}

impl HierarchyManager {
    pub fn new(cluster: Arc<dyn ClusterControl>, store: Arc<dyn Store>) -> Self {
        Self {
            activity: ActivityLog::new(store.clone()),
            cluster,
            store,
        }
    }

    /// Validates, persists and projects a root-level project.
    pub async fn create_project(&self, request: CreateProjectRequest, actor: &str) -> Result<Project> {
        validate_project_name(&request.name)?;

        let taken = self
            .store
            .get_project_by_name(&request.workspace_id, &request.name)
            .await
            .context(StoreSnafu {
                action: "look up",
                project_id: &request.name,
            })?;
        ensure!(
            taken.is_none(),
            NameTakenSnafu {
                workspace_id: &request.workspace_id,
                name: &request.name,
            }
        );

        let id = uuid::Uuid::new_v4().to_string();
        let project = self
            .store
            .create_project(Project::new(id.clone(), &request))
            .await
            .context(StoreSnafu {
                action: "create",
                project_id: &id,
            })?;
        let project = self.provision_namespace(project).await?;

        self.activity
            .record(
                &project.workspace_id,
                Some(&project.id),
                actor,
                ActivityKind::ProjectCreated,
                format!("Created project {}", project.display_name),
            )
            .await;
        info!("created project {} ({}) in workspace {}", project.name, project.id, project.workspace_id);
        Ok(project)
    }

    /// Creates a project under `parent_id` in the parent's workspace.
    ///
    /// When attaching the new project to its parent fails, the project is
    /// deleted again before the error is returned.
    pub async fn create_sub_project(
        &self,
        parent_id: &str,
        request: CreateProjectRequest,
        actor: &str,
    ) -> Result<Project> {
        let parent = self.load(parent_id).await?;
        let request = CreateProjectRequest {
            workspace_id: parent.workspace_id.clone(),
            ..request
        };

        let child = self.create_project(request, actor).await?;
        let child = match self.set_parent(&child.id, parent_id).await {
            Ok(child) => child,
            Err(e) => {
                warn!("attaching project {} to {} failed, rolling back: {}", child.id, parent_id, e);
                self.rollback(&child).await;
                return Err(e);
            }
        };

        let anchor = child.new_subnamespace_anchor(&parent);
        let result = self.cluster.apply(&child.workspace_id, &anchor.into()).await;
        let _ = Severity::Advisory.handle("configure hierarchy", &child.id, result);

        Ok(child)
    }

    /// Reparents `project_id` under `parent_id`. Rejected when the parent is
    /// the project itself or one of its descendants.
    pub async fn set_parent(&self, project_id: &str, parent_id: &str) -> Result<Project> {
        ensure!(project_id != parent_id, CycleSnafu { project_id, parent_id });

        let mut project = self.load(project_id).await?;
        let parent = self.load(parent_id).await?;
        ensure!(
            parent.workspace_id == project.workspace_id,
            InvalidFieldSnafu {
                field: "parentId",
                message: format!(
                    "project {} belongs to workspace {}, not {}",
                    parent.id, parent.workspace_id, project.workspace_id
                ),
            }
        );

        let mut ancestors = HashSet::from([parent.id.clone()]);
        let mut cursor = parent.parent_id.clone();
        while let Some(id) = cursor {
            ensure!(id != project_id, CycleSnafu { project_id, parent_id });
            if !ancestors.insert(id.clone()) {
                break;
            }
            cursor = self.load(&id).await?.parent_id;
        }

        project.parent_id = Some(parent_id.to_owned());
        project.updated_at = Utc::now();
        self.save(project).await
    }

    /// Loads `root_id` and every descendant.
    pub async fn get_hierarchy(&self, root_id: &str) -> Result<ProjectNode> {
        let root = self.load(root_id).await?;
        self.build_node(root).await
    }

    fn build_node(&self, project: Project) -> BoxFuture<'_, Result<ProjectNode>> {
        Box::pin(async move {
            let children = self
                .store
                .list_child_projects(&project.id)
                .await
                .context(StoreSnafu {
                    action: "list children of",
                    project_id: &project.id,
                })?;

            let mut nodes = Vec::with_capacity(children.len());
            for child in children {
                nodes.push(self.build_node(child).await?);
            }
            Ok(ProjectNode {
                project,
                children: nodes,
            })
        })
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Project> {
        self.load(project_id).await
    }

    pub async fn list_projects(&self, workspace_id: &str) -> Result<Vec<Project>> {
        self.store
            .list_projects(workspace_id)
            .await
            .context(StoreSnafu {
                action: "list",
                project_id: "*",
            })
    }

    pub async fn update_project(
        &self,
        project_id: &str,
        update: UpdateProjectRequest,
        actor: &str,
    ) -> Result<Project> {
        let mut project = self.load(project_id).await?;
        if let Some(display_name) = update.display_name.filter(|d| !d.is_empty()) {
            project.display_name = display_name;
        }
        if let Some(description) = update.description {
            project.description = description;
        }
        project.updated_at = Utc::now();
        let project = self.save(project).await?;

        self.activity
            .record(
                &project.workspace_id,
                Some(&project.id),
                actor,
                ActivityKind::ProjectUpdated,
                format!("Updated project {}", project.display_name),
            )
            .await;
        Ok(project)
    }

    /// Deletes a leaf project without applications, and its namespace.
    /// Deleting a project that no longer exists succeeds.
    pub async fn delete_project(&self, project_id: &str, actor: &str) -> Result<()> {
        let project = match self.store.get_project(project_id).await {
            Ok(project) => project,
            Err(e) if e.is_not_found() => {
                debug!("project {} already deleted", project_id);
                return Ok(());
            }
            Err(e) => {
                return Err(e).context(StoreSnafu {
                    action: "get",
                    project_id,
                });
            }
        };

        let children = self
            .store
            .list_child_projects(project_id)
            .await
            .context(StoreSnafu {
                action: "list children of",
                project_id,
            })?;
        ensure!(
            children.is_empty(),
            HasChildrenSnafu {
                project_id,
                children: children.len(),
            }
        );

        let applications = self
            .store
            .list_applications(project_id)
            .await
            .context(StoreSnafu {
                action: "list applications of",
                project_id,
            })?;
        ensure!(
            applications.is_empty(),
            HasApplicationsSnafu {
                project_id,
                applications: applications.len(),
            }
        );

        self.delete_namespace(&project).await;
        self.store
            .delete_project(project_id)
            .await
            .context(StoreSnafu {
                action: "delete",
                project_id,
            })?;

        self.activity
            .record(
                &project.workspace_id,
                Some(project_id),
                actor,
                ActivityKind::ProjectDeleted,
                format!("Deleted project {}", project.display_name),
            )
            .await;
        info!("deleted project {}", project_id);
        Ok(())
    }

    /// Installs `quota` in the project namespace and records it in the
    /// project settings. Failure to install is fatal.
    pub async fn apply_resource_quota(
        &self,
        project_id: &str,
        quota: QuotaLimits,
        actor: &str,
    ) -> Result<Project> {
        let mut project = self.load(project_id).await?;
        let manifest = quota.new_resource_quota(PROJECT_QUOTA_NAME, project.namespace());
        self.cluster
            .apply(&project.workspace_id, &manifest.into())
            .await
            .context(ClusterSnafu {
                action: "apply resource quota",
                project_id,
            })?;

        project.settings.resource_quota = Some(quota);
        project.updated_at = Utc::now();
        let project = self.save(project).await?;

        self.activity
            .record(
                &project.workspace_id,
                Some(project_id),
                actor,
                ActivityKind::QuotaApplied,
                format!("Applied resource quota to {}", project.name),
            )
            .await;
        Ok(project)
    }

    pub async fn add_member(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
        actor: &str,
    ) -> Result<ProjectMember> {
        let project = self.load(project_id).await?;
        let members = self.list_members(project_id).await?;
        ensure!(
            !members.iter().any(|m| m.user_id == user_id),
            AlreadyMemberSnafu { project_id, user_id }
        );

        let member = ProjectMember {
            project_id: project_id.to_owned(),
            user_id: user_id.to_owned(),
            role,
            added_at: Utc::now(),
        };
        self.store
            .add_project_member(member.clone())
            .await
            .context(StoreSnafu {
                action: "add member to",
                project_id,
            })?;

        let binding = project.new_role_binding(user_id, role);
        let result = self.cluster.apply(&project.workspace_id, &binding.into()).await;
        let _ = Severity::Advisory.handle("grant role binding", project_id, result);

        self.activity
            .record(
                &project.workspace_id,
                Some(project_id),
                actor,
                ActivityKind::MemberAdded,
                format!("Added {} as {}", user_id, role),
            )
            .await;
        Ok(member)
    }

    pub async fn remove_member(&self, project_id: &str, user_id: &str, actor: &str) -> Result<()> {
        let project = self.load(project_id).await?;
        self.store
            .remove_project_member(project_id, user_id)
            .await
            .context(StoreSnafu {
                action: "remove member from",
                project_id,
            })?;

        let binding = ObjectRef::namespaced(
            ObjectKind::RoleBinding,
            project.namespace(),
            &role_binding_name(user_id),
        );
        match self.cluster.delete(&project.workspace_id, &binding).await {
            Err(e) if e.is_not_found() => debug!("{} was already absent", binding),
            result => {
                let _ = Severity::Advisory.handle("revoke role binding", project_id, result);
            }
        }

        self.activity
            .record(
                &project.workspace_id,
                Some(project_id),
                actor,
                ActivityKind::MemberRemoved,
                format!("Removed {}", user_id),
            )
            .await;
        Ok(())
    }

    pub async fn list_members(&self, project_id: &str) -> Result<Vec<ProjectMember>> {
        self.store
            .list_project_members(project_id)
            .await
            .context(StoreSnafu {
                action: "list members of",
                project_id,
            })
    }

    async fn provision_namespace(&self, mut project: Project) -> Result<Project> {
        let result = self
            .cluster
            .apply(&project.workspace_id, &project.new_namespace().into())
            .await;
        if !matches!(
            Severity::Advisory.handle("create namespace", &project.id, result),
            Ok(Some(()))
        ) {
            return Ok(project);
        }

        project.namespace_state = NamespaceState::Provisioned;
        project.updated_at = Utc::now();
        self.save(project).await
    }

    async fn delete_namespace(&self, project: &Project) {
        let namespace = ObjectRef::namespace(project.namespace());
        match self.cluster.delete(&project.workspace_id, &namespace).await {
            Err(e) if e.is_not_found() => debug!("{} was already absent", namespace),
            result => {
                let _ = Severity::Advisory.handle("delete namespace", &project.id, result);
            }
        }
    }

    async fn rollback(&self, project: &Project) {
        self.delete_namespace(project).await;
        if let Err(e) = self.store.delete_project(&project.id).await {
            error!("failed to roll back project {}: {}", project.id, e);
        }
    }

    async fn load(&self, project_id: &str) -> Result<Project> {
        self.store
            .get_project(project_id)
            .await
            .context(StoreSnafu {
                action: "get",
                project_id,
            })
    }

    async fn save(&self, project: Project) -> Result<Project> {
        let project_id = project.id.clone();
        self.store
            .update_project(project)
            .await
            .context(StoreSnafu {
                action: "update",
                project_id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Manifest;
    use crate::store::MemoryStore;
    use crate::tests::{FlakyStore, MockCluster, create_test_application};
    use crate::types::application::Workload;
    use crate::types::quota::Plan;

    fn setup() -> (HierarchyManager, Arc<MockCluster>, Arc<MemoryStore>) {
        let cluster = Arc::new(MockCluster::new());
        let store = Arc::new(MemoryStore::new());
        (HierarchyManager::new(cluster.clone(), store.clone()), cluster, store)
    }

    fn request(name: &str) -> CreateProjectRequest {
        CreateProjectRequest {
            workspace_id: "ws-1".to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    // Test: creation persists, provisions the namespace and records activity
    #[tokio::test]
    async fn test_create_project() {
        let (manager, cluster, store) = setup();

        let project = manager
            .create_project(request("backend"), "u-1")
            .await
            .expect("create");
        assert_eq!(project.display_name, "backend");
        assert_eq!(project.namespace_state, NamespaceState::Provisioned);

        let Some(Manifest::Namespace(ns)) =
            cluster.object("ws-1", &ObjectRef::namespace("backend"))
        else {
            panic!("namespace should be applied");
        };
        let labels = ns.metadata.labels.expect("labels");
        assert_eq!(labels["hexabase.io/project-id"], project.id);
        assert_eq!(labels["hexabase.io/managed"], "true");

        let activities = store.list_activities("ws-1").await.expect("activities");
        assert_eq!(activities[0].kind, "project_created");
        assert_eq!(activities[0].project_id.as_deref(), Some(project.id.as_str()));
    }

    // Test: invalid and duplicate names are rejected without a record
    #[tokio::test]
    async fn test_create_project_validation() {
        let (manager, _, store) = setup();

        let err = manager
            .create_project(request("Bad_Name"), "u-1")
            .await
            .expect_err("invalid name");
        assert!(matches!(err, Error::Types { .. }));

        manager.create_project(request("backend"), "u-1").await.expect("first");
        let err = manager
            .create_project(request("backend"), "u-1")
            .await
            .expect_err("duplicate");
        assert!(matches!(err, Error::NameTaken { .. }));
        assert_eq!(store.list_projects("ws-1").await.expect("list").len(), 1);
    }

    // Test: namespace failure does not fail project creation
    #[tokio::test]
    async fn test_namespace_failure_is_advisory() {
        let (manager, cluster, store) = setup();
        cluster.fail_apply(ObjectKind::Namespace);

        let project = manager
            .create_project(request("backend"), "u-1")
            .await
            .expect("create despite namespace failure");
        assert_eq!(project.namespace_state, NamespaceState::NotProvisioned);
        assert!(store.get_project(&project.id).await.is_ok());
    }

    // Test: sub-projects inherit the workspace and get an HNC anchor
    #[tokio::test]
    async fn test_create_sub_project() {
        let (manager, cluster, _) = setup();
        let parent = manager.create_project(request("platform"), "u-1").await.expect("parent");

        let child = manager
            .create_sub_project(
                &parent.id,
                CreateProjectRequest {
                    workspace_id: "ignored".to_string(),
                    ..request("platform-api")
                },
                "u-1",
            )
            .await
            .expect("child");
        assert_eq!(child.workspace_id, "ws-1");
        assert_eq!(child.parent_id.as_deref(), Some(parent.id.as_str()));
        assert!(cluster.has_object(
            "ws-1",
            &ObjectRef::namespaced(ObjectKind::SubnamespaceAnchor, "platform", "platform-api")
        ));
    }

    // Test: failing to attach the parent deletes the new project
    #[tokio::test]
    async fn test_create_sub_project_rolls_back() {
        let cluster = Arc::new(MockCluster::new());
        let store = Arc::new(FlakyStore::new());
        let manager = HierarchyManager::new(cluster.clone(), store.clone());

        let parent = manager.create_project(request("platform"), "u-1").await.expect("parent");
        store.fail_parent_updates(true);

        let err = manager
            .create_sub_project(&parent.id, request("platform-api"), "u-1")
            .await
            .expect_err("attach fails");
        assert!(matches!(err, Error::Store { .. }));

        let remaining = store.list_projects("ws-1").await.expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, parent.id);
        assert!(!cluster.has_object("ws-1", &ObjectRef::namespace("platform-api")));
    }

    // Test: a project cannot become its own ancestor
    #[tokio::test]
    async fn test_set_parent_rejects_cycles() {
        let (manager, _, _) = setup();
        let a = manager.create_project(request("a"), "u-1").await.expect("a");
        let b = manager.create_sub_project(&a.id, request("b"), "u-1").await.expect("b");
        let c = manager.create_sub_project(&b.id, request("c"), "u-1").await.expect("c");

        assert!(matches!(
            manager.set_parent(&a.id, &a.id).await,
            Err(Error::Cycle { .. })
        ));
        assert!(matches!(
            manager.set_parent(&a.id, &c.id).await,
            Err(Error::Cycle { .. })
        ));

        let d = manager.create_project(request("d"), "u-1").await.expect("d");
        manager.set_parent(&d.id, &c.id).await.expect("leaf move");
    }

    // Test: the hierarchy loads every descendant
    #[tokio::test]
    async fn test_get_hierarchy() {
        let (manager, _, _) = setup();
        let root = manager.create_project(request("root"), "u-1").await.expect("root");
        let left = manager.create_sub_project(&root.id, request("left"), "u-1").await.expect("left");
        manager.create_sub_project(&root.id, request("right"), "u-1").await.expect("right");
        manager.create_sub_project(&left.id, request("leaf"), "u-1").await.expect("leaf");

        let tree = manager.get_hierarchy(&root.id).await.expect("hierarchy");
        assert_eq!(tree.project.id, root.id);
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.count(), 4);
        assert_eq!(tree.depth(), 3);
    }

    // Test: delete ignores missing namespaces and is idempotent
    #[tokio::test]
    async fn test_delete_project() {
        let (manager, cluster, store) = setup();
        cluster.fail_apply(ObjectKind::Namespace);
        let project = manager.create_project(request("backend"), "u-1").await.expect("create");

        manager.delete_project(&project.id, "u-1").await.expect("delete");
        assert!(store.get_project(&project.id).await.is_err());
        manager.delete_project(&project.id, "u-1").await.expect("repeat delete");
    }

    // Test: parents with children cannot be deleted
    #[tokio::test]
    async fn test_delete_parent_rejected() {
        let (manager, _, _) = setup();
        let parent = manager.create_project(request("platform"), "u-1").await.expect("parent");
        manager
            .create_sub_project(&parent.id, request("platform-api"), "u-1")
            .await
            .expect("child");

        let err = manager
            .delete_project(&parent.id, "u-1")
            .await
            .expect_err("has children");
        assert!(matches!(err, Error::HasChildren { children: 1, .. }));
    }

    // Test: projects still holding applications cannot be deleted
    #[tokio::test]
    async fn test_delete_project_with_applications_rejected() {
        let (manager, _, store) = setup();
        let project = manager.create_project(request("backend"), "u-1").await.expect("create");
        let mut app = create_test_application("app-1", Workload::Stateless);
        app.project_id = project.id.clone();
        store.create_application(app).await.expect("app");

        let err = manager
            .delete_project(&project.id, "u-1")
            .await
            .expect_err("has applications");
        assert!(matches!(err, Error::HasApplications { applications: 1, .. }));
        assert!(store.get_project(&project.id).await.is_ok());

        store.delete_application("app-1").await.expect("remove app");
        manager.delete_project(&project.id, "u-1").await.expect("delete");
    }

    // Test: quota is installed in the namespace and persisted in settings
    #[tokio::test]
    async fn test_apply_resource_quota() {
        let (manager, cluster, _) = setup();
        let project = manager.create_project(request("backend"), "u-1").await.expect("create");

        let updated = manager
            .apply_resource_quota(&project.id, Plan::Professional.limits(), "u-1")
            .await
            .expect("quota");
        assert_eq!(updated.settings.resource_quota, Some(Plan::Professional.limits()));
        assert!(cluster.has_object(
            "ws-1",
            &ObjectRef::namespaced(ObjectKind::ResourceQuota, "backend", "project-quota")
        ));

        cluster.fail_apply(ObjectKind::ResourceQuota);
        let err = manager
            .apply_resource_quota(&project.id, Plan::Starter.limits(), "u-1")
            .await
            .expect_err("explicit quota failure is fatal");
        assert!(matches!(err, Error::Cluster { .. }));
        assert_eq!(
            manager.get_project(&project.id).await.expect("get").settings.resource_quota,
            Some(Plan::Professional.limits())
        );
    }

    // Test: members get a RoleBinding and duplicates are rejected
    #[tokio::test]
    async fn test_members() {
        let (manager, cluster, _) = setup();
        let project = manager.create_project(request("backend"), "u-1").await.expect("create");

        manager
            .add_member(&project.id, "u-2", ProjectRole::Developer, "u-1")
            .await
            .expect("add");
        let binding = ObjectRef::namespaced(ObjectKind::RoleBinding, "backend", "user-u-2");
        let Some(Manifest::RoleBinding(rb)) = cluster.object("ws-1", &binding) else {
            panic!("role binding should be applied");
        };
        assert_eq!(rb.role_ref.name, "edit");

        let err = manager
            .add_member(&project.id, "u-2", ProjectRole::Viewer, "u-1")
            .await
            .expect_err("duplicate");
        assert!(matches!(err, Error::AlreadyMember { .. }));

        manager.remove_member(&project.id, "u-2", "u-1").await.expect("remove");
        assert!(!cluster.has_object("ws-1", &binding));
        assert!(manager.list_members(&project.id).await.expect("members").is_empty());
    }

    // Test: RBAC failures do not block membership changes
    #[tokio::test]
    async fn test_member_rbac_is_advisory() {
        let (manager, cluster, _) = setup();
        let project = manager.create_project(request("backend"), "u-1").await.expect("create");
        cluster.fail_apply(ObjectKind::RoleBinding);

        manager
            .add_member(&project.id, "u-2", ProjectRole::Admin, "u-1")
            .await
            .expect("add despite RBAC failure");
        manager
            .remove_member(&project.id, "u-2", "u-1")
            .await
            .expect("remove with absent binding");
    }

    // Test: updates keep the name and default the display name
    #[tokio::test]
    async fn test_update_project() {
        let (manager, _, _) = setup();
        let project = manager.create_project(request("backend"), "u-1").await.expect("create");

        let updated = manager
            .update_project(
                &project.id,
                UpdateProjectRequest {
                    display_name: Some("Backend".to_string()),
                    description: Some("APIs".to_string()),
                },
                "u-1",
            )
            .await
            .expect("update");
        assert_eq!(updated.name, "backend");
        assert_eq!(updated.display_name, "Backend");
        assert_eq!(updated.description, "APIs");
    }
}
