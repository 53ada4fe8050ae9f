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

use crate::types::quota::Plan;
use crate::types::workspace::ClusterPhase;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LABEL_WORKSPACE_ID: &str = "hexabase.io/workspace-id";
pub const LABEL_PLAN: &str = "hexabase.io/plan";

/// Virtual cluster managed by the vcluster controller on the host cluster.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[kube(
    group = "cluster.loft.sh",
    version = "v1alpha1",
    kind = "VirtualCluster",
    namespaced,
    status = "VirtualClusterStatus",
    plural = "virtualclusters",
    singular = "virtualcluster",
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualClusterSpec {
    #[serde(default)]
    pub helm_release: HelmRelease,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmRelease {
    #[serde(default)]
    pub values: HelmValues,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmValues {
    #[serde(default)]
    pub syncer: SyncerValues,

    #[serde(default)]
    pub isolation: IsolationValues,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncerValues {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<SyncerResources>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
pub struct SyncerResources {
    pub limits: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
pub struct IsolationValues {
    pub enabled: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualClusterStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HelmValues {
    pub fn for_plan(plan: Plan) -> Self {
        let (cpu, memory) = plan.syncer_limits();
        Self {
            syncer: SyncerValues {
                extra_args: vec![
                    "--enable-storage-classes".to_owned(),
                    "--sync-all-nodes".to_owned(),
                ],
                resources: Some(SyncerResources {
                    limits: BTreeMap::from([
                        ("cpu".to_owned(), cpu.to_owned()),
                        ("memory".to_owned(), memory.to_owned()),
                    ]),
                }),
            },
            isolation: IsolationValues { enabled: true },
        }
    }
}

impl VirtualCluster {
    pub fn for_workspace(workspace_id: &str, plan: Plan, namespace: &str) -> Self {
        let mut vc = VirtualCluster::new(
            workspace_id,
            VirtualClusterSpec {
                helm_release: HelmRelease {
                    values: HelmValues::for_plan(plan),
                },
            },
        );
        vc.metadata = metav1::ObjectMeta {
            name: Some(workspace_id.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(BTreeMap::from([
                (LABEL_WORKSPACE_ID.to_owned(), workspace_id.to_owned()),
                (LABEL_PLAN.to_owned(), plan.to_string()),
            ])),
            ..Default::default()
        };
        vc
    }

    /// Maps the controller-reported status onto the external vocabulary.
    ///
    /// `ready: true` wins over any phase. Phases reported by the vcluster
    /// controller (`Pending`, `Running`, ...) are accepted alongside the
    /// control plane's own upper-case vocabulary.
    pub fn phase(&self) -> ClusterPhase {
        let Some(status) = &self.status else {
            return ClusterPhase::Unknown;
        };
        if status.ready == Some(true) {
            return ClusterPhase::Running;
        }

        match status.phase.as_deref() {
            None => ClusterPhase::Unknown,
            Some(phase) => match phase.to_ascii_lowercase().as_str() {
                "pending" | "initializing" => ClusterPhase::PendingCreation,
                "running" | "ready" => ClusterPhase::Running,
                "deleting" | "terminating" => ClusterPhase::Deleting,
                "failed" | "error" => ClusterPhase::Error,
                "stopped" | "sleeping" => ClusterPhase::Stopped,
                _ => ClusterPhase::parse(phase),
            },
        }
    }

    /// Name of the Secret holding the virtual cluster's kubeconfig.
    pub fn kubeconfig_secret_name(workspace_id: &str) -> String {
        format!("vc-{workspace_id}-kubeconfig")
    }

    /// Name of the StatefulSet running the virtual cluster control plane.
    pub fn statefulset_name(workspace_id: &str) -> String {
        format!("{workspace_id}-vcluster")
    }
}
