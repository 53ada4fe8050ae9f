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

use crate::types::error::{Error, IllegalTransitionSnafu, ImmutableFieldModifiedSnafu};
use crate::types::quota::{Plan, QuotaLimits};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::Display;

pub mod status;

pub use status::{ClusterPhase, WorkspaceStatus};

pub const OIDC_CONFIG_NAME: &str = "oidc-config";
pub const OIDC_CONFIG_NAMESPACE: &str = "kube-system";

/// Namespace inside the virtual cluster that carries the workspace quota.
pub const QUOTA_NAMESPACE: &str = "default";

/// A tenant's isolated virtual cluster.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub plan: Plan,
    pub status: WorkspaceStatus,

    /// Name of the VirtualCluster object, fixed at creation.
    pub vcluster_instance_name: String,

    /// Host namespace the virtual cluster runs in.
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,

    #[serde(default)]
    pub settings: WorkspaceSettings,

    #[serde(default)]
    pub cluster_info: ClusterInfo,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Known workspace settings plus whatever else callers store.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_quota: Option<QuotaLimits>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc: Option<OidcSettings>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OidcSettings {
    pub issuer_url: String,
    pub client_id: String,
    pub username_claim: String,
    pub groups_claim: String,
}

impl OidcSettings {
    pub fn for_workspace(issuer_url: &str, workspace_id: &str) -> Self {
        Self {
            issuer_url: issuer_url.to_owned(),
            client_id: workspace_id.to_owned(),
            username_claim: "sub".to_owned(),
            groups_claim: "groups".to_owned(),
        }
    }

    /// Trust configuration read by the virtual cluster's API server.
    pub fn new_config_map(&self) -> corev1::ConfigMap {
        corev1::ConfigMap {
            metadata: metav1::ObjectMeta {
                name: Some(OIDC_CONFIG_NAME.to_owned()),
                namespace: Some(OIDC_CONFIG_NAMESPACE.to_owned()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([
                ("issuer-url".to_owned(), self.issuer_url.clone()),
                ("client-id".to_owned(), self.client_id.clone()),
                ("username-claim".to_owned(), self.username_claim.clone()),
                ("groups-claim".to_owned(), self.groups_claim.clone()),
            ])),
            ..Default::default()
        }
    }
}

/// Last observed state of the backing virtual cluster.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ClusterPhase>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspaceRequest {
    pub organization_id: String,
    pub name: String,

    /// Free-form tier name; unknown tiers resolve to starter.
    pub plan: String,

    #[serde(default)]
    pub settings: WorkspaceSettings,
}

#[derive(Clone, Debug, Default)]
pub struct WorkspaceFilter {
    pub organization_id: Option<String>,
    pub status: Option<WorkspaceStatus>,
    pub plan: Option<Plan>,
}

impl WorkspaceFilter {
    pub fn matches(&self, ws: &Workspace) -> bool {
        self.organization_id
            .as_ref()
            .is_none_or(|org| &ws.organization_id == org)
            && self.status.is_none_or(|s| ws.status == s)
            && self.plan.is_none_or(|p| ws.plan == p)
    }
}

/// Members of a workspace are the identities trusted by its OIDC config.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    #[strum(to_string = "admin")]
    Admin,

    #[strum(to_string = "member")]
    Member,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMember {
    pub workspace_id: String,
    pub user_id: String,
    pub role: WorkspaceRole,
    pub added_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new(id: String, request: &CreateWorkspaceRequest, namespace: &str) -> Self {
        let now = Utc::now();
        Self {
            vcluster_instance_name: id.clone(),
            id,
            organization_id: request.organization_id.clone(),
            name: request.name.clone(),
            plan: Plan::parse_or_default(&request.plan),
            status: WorkspaceStatus::Creating,
            namespace: namespace.to_owned(),
            kubeconfig: None,
            api_endpoint: None,
            settings: request.settings.clone(),
            cluster_info: ClusterInfo::default(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Moves the workspace to `to`, rejecting anything the lifecycle forbids.
    pub fn transition(&mut self, to: WorkspaceStatus) -> Result<(), Error> {
        if !self.status.can_transition(to) {
            return IllegalTransitionSnafu {
                entity: "workspace",
                from: self.status.to_string(),
                to: to.to_string(),
            }
            .fail();
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Deleting and soft-deleted workspaces are hidden from listings.
    pub fn is_listable(&self) -> bool {
        self.deleted_at.is_none() && self.status != WorkspaceStatus::Deleting
    }

    /// Checks that `self` is a legal successor of the stored record `previous`.
    pub fn check_immutable(&self, previous: &Workspace) -> Result<(), Error> {
        if self.vcluster_instance_name != previous.vcluster_instance_name {
            return ImmutableFieldModifiedSnafu {
                name: self.id.clone(),
                field: "vclusterInstanceName",
                message: format!(
                    "assigned '{}' at creation, got '{}'",
                    previous.vcluster_instance_name, self.vcluster_instance_name
                ),
            }
            .fail();
        }
        Ok(())
    }
}

impl FromStr for WorkspaceRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(WorkspaceRole::Admin),
            "member" => Ok(WorkspaceRole::Member),
            other => crate::types::error::InvalidEnumValueSnafu {
                kind: "workspace role",
                value: other,
            }
            .fail(),
        }
    }
}
