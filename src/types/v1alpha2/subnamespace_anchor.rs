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

use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hierarchical Namespace Controller anchor. Creating one in a parent
/// namespace makes HNC create the child namespace and propagate the parent's
/// RBAC and quota objects into it.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[kube(
    group = "hnc.x-k8s.io",
    version = "v1alpha2",
    kind = "SubnamespaceAnchor",
    namespaced,
    status = "SubnamespaceAnchorStatus",
    plural = "subnamespaceanchors",
    singular = "subnamespaceanchor",
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct SubnamespaceAnchorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<MetaKvp>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
pub struct MetaKvp {
    pub key: String,
    pub value: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct SubnamespaceAnchorStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl SubnamespaceAnchor {
    /// Anchor for `child` placed in `parent`, copying `labels` onto the child.
    pub fn for_child(parent: &str, child: &str, labels: &BTreeMap<String, String>) -> Self {
        let mut anchor = SubnamespaceAnchor::new(
            child,
            SubnamespaceAnchorSpec {
                labels: Some(
                    labels
                        .iter()
                        .map(|(key, value)| MetaKvp {
                            key: key.clone(),
                            value: value.clone(),
                        })
                        .collect(),
                ),
            },
        );
        anchor.metadata = metav1::ObjectMeta {
            name: Some(child.to_owned()),
            namespace: Some(parent.to_owned()),
            ..Default::default()
        };
        anchor
    }
}
