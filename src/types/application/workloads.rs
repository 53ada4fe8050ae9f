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

use super::{ANNOTATION_APP_ID, Application, ResourceRequests, Workload};
use crate::types;
use crate::types::error::InvalidFieldSnafu;
use k8s_openapi::api::apps::v1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use std::collections::BTreeMap;

const DATA_VOLUME_NAME: &str = "data";
const DEFAULT_STORAGE_SIZE: &str = "10Gi";
const DEFAULT_MOUNT_PATH: &str = "/data";

fn quantities(pairs: [(&str, &Option<String>); 2]) -> Option<BTreeMap<String, Quantity>> {
    let map: BTreeMap<_, _> = pairs
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_owned(), Quantity(v.clone()))))
        .collect();
    (!map.is_empty()).then_some(map)
}

impl ResourceRequests {
    pub fn to_requirements(&self) -> Option<corev1::ResourceRequirements> {
        let requests = quantities([("cpu", &self.cpu_request), ("memory", &self.memory_request)]);
        let limits = quantities([("cpu", &self.cpu_limit), ("memory", &self.memory_limit)]);
        if requests.is_none() && limits.is_none() {
            return None;
        }
        Some(corev1::ResourceRequirements {
            requests,
            limits,
            ..Default::default()
        })
    }
}

impl Application {
    pub fn pvc_name(&self) -> String {
        format!("{}-data", self.name)
    }

    pub fn object_meta(&self, namespace: &str) -> metav1::ObjectMeta {
        metav1::ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(namespace.to_owned()),
            labels: Some(self.selector_labels()),
            annotations: Some(BTreeMap::from([(
                ANNOTATION_APP_ID.to_owned(),
                self.id.clone(),
            )])),
            ..Default::default()
        }
    }

    pub(crate) fn image(&self) -> Result<String, types::error::Error> {
        match self.source.image() {
            Some(image) if !image.is_empty() => Ok(image.to_owned()),
            _ => InvalidFieldSnafu {
                field: "source.image",
                message: format!("application {} has no image to deploy yet", self.name),
            }
            .fail(),
        }
    }

    fn env(&self) -> Option<Vec<corev1::EnvVar>> {
        let mut env: Vec<corev1::EnvVar> = self
            .config
            .env_vars
            .iter()
            .map(|(name, value)| corev1::EnvVar {
                name: name.clone(),
                value: Some(value.clone()),
                ..Default::default()
            })
            .collect();

        if let Workload::Function(function) = &self.workload {
            env.push(corev1::EnvVar {
                name: "FUNCTION_HANDLER".to_owned(),
                value: Some(function.handler.clone()),
                ..Default::default()
            });
            env.push(corev1::EnvVar {
                name: "FUNCTION_RUNTIME".to_owned(),
                value: Some(function.runtime.to_string()),
                ..Default::default()
            });
            if let Some(timeout) = function.timeout_secs {
                env.push(corev1::EnvVar {
                    name: "FUNCTION_TIMEOUT".to_owned(),
                    value: Some(timeout.to_string()),
                    ..Default::default()
                });
            }
        }

        (!env.is_empty()).then_some(env)
    }

    pub(crate) fn container(&self) -> Result<corev1::Container, types::error::Error> {
        let volume_mounts = match (&self.workload, &self.config.storage) {
            (Workload::Stateful, storage) => Some(vec![corev1::VolumeMount {
                name: DATA_VOLUME_NAME.to_owned(),
                mount_path: storage
                    .as_ref()
                    .map(|s| s.mount_path.clone())
                    .unwrap_or_else(|| DEFAULT_MOUNT_PATH.to_owned()),
                ..Default::default()
            }]),
            _ => None,
        };

        Ok(corev1::Container {
            name: self.name.clone(),
            image: Some(self.image()?),
            ports: Some(vec![corev1::ContainerPort {
                container_port: self.config.port,
                name: Some("http".to_owned()),
                protocol: Some("TCP".to_owned()),
                ..Default::default()
            }]),
            env: self.env(),
            resources: self.config.resources.to_requirements(),
            volume_mounts,
            ..Default::default()
        })
    }

    pub(crate) fn pod_template(&self) -> Result<corev1::PodTemplateSpec, types::error::Error> {
        Ok(corev1::PodTemplateSpec {
            metadata: Some(metav1::ObjectMeta {
                labels: Some(self.selector_labels()),
                ..Default::default()
            }),
            spec: Some(corev1::PodSpec {
                containers: vec![self.container()?],
                node_selector: (!self.config.node_selector.is_empty())
                    .then(|| self.config.node_selector.clone()),
                ..Default::default()
            }),
        })
    }

    /// Deployment for stateless and function applications.
    pub fn new_deployment(&self, namespace: &str) -> Result<v1::Deployment, types::error::Error> {
        Ok(v1::Deployment {
            metadata: self.object_meta(namespace),
            spec: Some(v1::DeploymentSpec {
                replicas: Some(self.effective_replicas()),
                selector: metav1::LabelSelector {
                    match_labels: Some(self.selector_labels()),
                    ..Default::default()
                },
                template: self.pod_template()?,
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn pvc_spec(&self) -> corev1::PersistentVolumeClaimSpec {
        let storage = self.config.storage.as_ref();
        corev1::PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_owned()]),
            storage_class_name: storage.and_then(|s| s.storage_class.clone()),
            resources: Some(corev1::VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_owned(),
                    Quantity(
                        storage
                            .map(|s| s.size.clone())
                            .unwrap_or_else(|| DEFAULT_STORAGE_SIZE.to_owned()),
                    ),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn new_pvc(&self, namespace: &str) -> corev1::PersistentVolumeClaim {
        let mut metadata = self.object_meta(namespace);
        metadata.name = Some(self.pvc_name());
        corev1::PersistentVolumeClaim {
            metadata,
            spec: Some(self.pvc_spec()),
            ..Default::default()
        }
    }

    /// StatefulSet for stateful applications, one replica with a `data`
    /// volume claim template.
    pub fn new_statefulset(&self, namespace: &str) -> Result<v1::StatefulSet, types::error::Error> {
        Ok(v1::StatefulSet {
            metadata: self.object_meta(namespace),
            spec: Some(v1::StatefulSetSpec {
                replicas: Some(self.effective_replicas()),
                service_name: Some(self.name.clone()),
                selector: metav1::LabelSelector {
                    match_labels: Some(self.selector_labels()),
                    ..Default::default()
                },
                template: self.pod_template()?,
                volume_claim_templates: Some(vec![corev1::PersistentVolumeClaim {
                    metadata: metav1::ObjectMeta {
                        name: Some(DATA_VOLUME_NAME.to_owned()),
                        labels: Some(self.selector_labels()),
                        ..Default::default()
                    },
                    spec: Some(self.pvc_spec()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}
