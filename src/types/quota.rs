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

//! Plan tiers and the hard resource limits derived from them.

use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{Display, EnumString};

pub const WORKSPACE_QUOTA_NAME: &str = "workspace-quota";
pub const PROJECT_QUOTA_NAME: &str = "project-quota";

/// Subscription tier of a workspace.
///
/// Parsing never fails: unknown tier names resolve to `Starter`, see
/// [`Plan::parse_or_default`].
#[derive(
    Default, Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, EnumString, PartialEq, Eq,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Plan {
    #[default]
    #[strum(to_string = "starter")]
    Starter,

    #[strum(to_string = "professional")]
    Professional,

    #[strum(to_string = "enterprise")]
    Enterprise,
}

impl Plan {
    pub fn parse_or_default(value: &str) -> Self {
        Plan::from_str(value.trim()).unwrap_or_default()
    }

    /// Hard limits for this tier.
    pub fn limits(self) -> QuotaLimits {
        let (cpu, memory, storage, pods, services, pvcs) = match self {
            Plan::Starter => ("2", "4Gi", "20Gi", "20", "10", "5"),
            Plan::Professional => ("8", "16Gi", "100Gi", "100", "50", "20"),
            Plan::Enterprise => ("32", "64Gi", "500Gi", "500", "200", "100"),
        };

        QuotaLimits {
            cpu: cpu.to_owned(),
            memory: memory.to_owned(),
            storage: storage.to_owned(),
            pods: pods.to_owned(),
            services: services.to_owned(),
            persistent_volume_claims: pvcs.to_owned(),
        }
    }

    /// CPU and memory limits of the virtual cluster syncer for this tier.
    pub fn syncer_limits(self) -> (&'static str, &'static str) {
        match self {
            Plan::Starter => ("500m", "512Mi"),
            Plan::Professional => ("1", "1Gi"),
            Plan::Enterprise => ("2", "2Gi"),
        }
    }
}

/// Deterministic hard limits applied to a namespace.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuotaLimits {
    pub cpu: String,
    pub memory: String,
    pub storage: String,
    pub pods: String,
    pub services: String,
    pub persistent_volume_claims: String,
}

impl QuotaLimits {
    pub fn hard(&self) -> BTreeMap<String, Quantity> {
        [
            ("cpu", &self.cpu),
            ("memory", &self.memory),
            ("requests.storage", &self.storage),
            ("pods", &self.pods),
            ("services", &self.services),
            ("persistentvolumeclaims", &self.persistent_volume_claims),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), Quantity(v.clone())))
        .collect()
    }

    pub fn new_resource_quota(&self, name: &str, namespace: &str) -> corev1::ResourceQuota {
        corev1::ResourceQuota {
            metadata: metav1::ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(namespace.to_owned()),
                labels: Some(BTreeMap::from([(
                    "hexabase.io/managed".to_owned(),
                    "true".to_owned(),
                )])),
                ..Default::default()
            },
            spec: Some(corev1::ResourceQuotaSpec {
                hard: Some(self.hard()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
