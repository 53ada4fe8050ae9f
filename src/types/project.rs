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

use crate::types::error::{Error, InvalidEnumValueSnafu, InvalidProjectNameSnafu};
use crate::types::quota::QuotaLimits;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::Display;

mod rbac;

pub use rbac::role_binding_name;

pub const LABEL_PROJECT_ID: &str = "hexabase.io/project-id";
pub const LABEL_WORKSPACE_ID: &str = "hexabase.io/workspace-id";
pub const LABEL_MANAGED: &str = "hexabase.io/managed";

const MAX_NAME_LEN: usize = 63;

/// Validates a project name as a DNS label: 1-63 characters of lowercase
/// alphanumerics and `-`, starting and ending with an alphanumeric.
pub fn validate_project_name(name: &str) -> Result<(), Error> {
    let reason = if name.is_empty() {
        Some("must not be empty".to_owned())
    } else if name.len() > MAX_NAME_LEN {
        Some(format!("must be at most {MAX_NAME_LEN} characters"))
    } else if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        Some("must contain only lowercase alphanumeric characters or '-'".to_owned())
    } else if name.starts_with('-') || name.ends_with('-') {
        Some("must start and end with an alphanumeric character".to_owned())
    } else {
        None
    };

    match reason {
        Some(reason) => InvalidProjectNameSnafu { name, reason }.fail(),
        None => Ok(()),
    }
}

/// Whether the project's namespace exists in the virtual cluster yet.
#[derive(Default, Deserialize, Serialize, Clone, Copy, Debug, Display, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NamespaceState {
    #[default]
    #[strum(to_string = "notProvisioned")]
    NotProvisioned,

    #[strum(to_string = "provisioned")]
    Provisioned,
}

/// A namespace within a workspace.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub display_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub namespace_state: NamespaceState,

    #[serde(default)]
    pub settings: ProjectSettings,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_quota: Option<QuotaLimits>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub workspace_id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A project and all of its descendants.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    pub project: Project,
    pub children: Vec<ProjectNode>,
}

impl ProjectNode {
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ProjectNode::count).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(ProjectNode::depth).max().unwrap_or(0)
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    #[strum(to_string = "viewer")]
    Viewer,

    #[strum(to_string = "developer")]
    Developer,

    #[strum(to_string = "editor")]
    Editor,

    #[strum(to_string = "admin")]
    Admin,
}

impl ProjectRole {
    /// Built-in ClusterRole granted for this role.
    pub fn cluster_role(self) -> &'static str {
        match self {
            ProjectRole::Admin => "admin",
            ProjectRole::Editor | ProjectRole::Developer => "edit",
            ProjectRole::Viewer => "view",
        }
    }
}

impl FromStr for ProjectRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(ProjectRole::Viewer),
            "developer" => Ok(ProjectRole::Developer),
            "editor" => Ok(ProjectRole::Editor),
            "admin" => Ok(ProjectRole::Admin),
            other => InvalidEnumValueSnafu {
                kind: "project role",
                value: other,
            }
            .fail(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMember {
    pub project_id: String,
    pub user_id: String,
    pub role: ProjectRole,
    pub added_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: String, request: &CreateProjectRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            workspace_id: request.workspace_id.clone(),
            name: request.name.clone(),
            display_name: request
                .display_name
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| request.name.clone()),
            description: request.description.clone(),
            parent_id: None,
            namespace_state: NamespaceState::NotProvisioned,
            settings: ProjectSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Namespace backing this project inside the workspace's virtual cluster.
    pub fn namespace(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (LABEL_PROJECT_ID.to_owned(), self.id.clone()),
            (LABEL_WORKSPACE_ID.to_owned(), self.workspace_id.clone()),
            (LABEL_MANAGED.to_owned(), "true".to_owned()),
        ])
    }

    pub fn new_namespace(&self) -> corev1::Namespace {
        corev1::Namespace {
            metadata: metav1::ObjectMeta {
                name: Some(self.namespace().to_owned()),
                labels: Some(self.labels()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
