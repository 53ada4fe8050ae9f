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

//! The cluster-control interface.
//!
//! Everything the orchestrators do to Kubernetes goes through
//! [`ClusterControl`]: virtual cluster lifecycle on the host cluster, and
//! manifests and pod queries inside a workspace's virtual cluster. Calls are
//! keyed by the owning workspace id and are idempotent on retry.

use crate::types;
use crate::types::application::PodUsage;
use crate::types::error::NoNamespaceSnafu;
use crate::types::v1alpha1::virtual_cluster::VirtualCluster;
use crate::types::v1alpha2::subnamespace_anchor::SubnamespaceAnchor;
use crate::types::workspace::ClusterPhase;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::batch::v1 as batchv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::networking::v1 as networkingv1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, Snafu};
use std::pin::Pin;
use strum::Display;

pub mod kubernetes;
pub mod metrics;

pub use kubernetes::KubeCluster;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{} '{}' not found", kind, name))]
    NotFound { kind: ObjectKind, name: String },

    #[snafu(display("kubeconfig for workspace {} is not available", workspace_id))]
    MissingKubeconfig { workspace_id: String },

    #[snafu(display("cluster unavailable: {}", message))]
    Unavailable { message: String },

    #[snafu(transparent)]
    Context { source: crate::context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    VirtualCluster,
    Namespace,
    ConfigMap,
    ResourceQuota,
    RoleBinding,
    SubnamespaceAnchor,
    Deployment,
    StatefulSet,
    PersistentVolumeClaim,
    Service,
    Ingress,
    CronJob,
    Job,
}

/// Identifies one object inside a virtual cluster.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub kind: ObjectKind,

    /// `None` for cluster-scoped kinds.
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectRef {
    pub fn namespaced(kind: ObjectKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            namespace: Some(namespace.to_owned()),
            name: name.to_owned(),
        }
    }

    pub fn namespace(name: &str) -> Self {
        Self {
            kind: ObjectKind::Namespace,
            namespace: None,
            name: name.to_owned(),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// A desired-state object to install inside a virtual cluster.
#[derive(Clone, Debug)]
pub enum Manifest {
    Namespace(corev1::Namespace),
    ConfigMap(corev1::ConfigMap),
    ResourceQuota(corev1::ResourceQuota),
    RoleBinding(rbacv1::RoleBinding),
    SubnamespaceAnchor(SubnamespaceAnchor),
    Deployment(appsv1::Deployment),
    StatefulSet(appsv1::StatefulSet),
    PersistentVolumeClaim(corev1::PersistentVolumeClaim),
    Service(corev1::Service),
    Ingress(networkingv1::Ingress),
    CronJob(batchv1::CronJob),
    Job(batchv1::Job),
}

macro_rules! manifest_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Manifest {
                fn from(value: $ty) -> Self {
                    Manifest::$variant(value)
                }
            }
        )*

        impl Manifest {
            pub fn kind(&self) -> ObjectKind {
                match self {
                    $(Manifest::$variant(_) => ObjectKind::$variant,)*
                }
            }

            pub fn name(&self) -> String {
                match self {
                    $(Manifest::$variant(o) => o.name_any(),)*
                }
            }

            fn raw_namespace(&self) -> Option<String> {
                match self {
                    $(Manifest::$variant(o) => o.namespace(),)*
                }
            }
        }
    };
}

manifest_from! {
    Namespace => corev1::Namespace,
    ConfigMap => corev1::ConfigMap,
    ResourceQuota => corev1::ResourceQuota,
    RoleBinding => rbacv1::RoleBinding,
    SubnamespaceAnchor => SubnamespaceAnchor,
    Deployment => appsv1::Deployment,
    StatefulSet => appsv1::StatefulSet,
    PersistentVolumeClaim => corev1::PersistentVolumeClaim,
    Service => corev1::Service,
    Ingress => networkingv1::Ingress,
    CronJob => batchv1::CronJob,
    Job => batchv1::Job,
}

impl Manifest {
    /// Namespace of a namespaced manifest. Builders always set one, so a
    /// missing namespace is a validation error rather than "default".
    pub fn namespace(&self) -> Result<String, types::error::Error> {
        self.raw_namespace().context(NoNamespaceSnafu)
    }

    pub fn object_ref(&self) -> Result<ObjectRef, types::error::Error> {
        let namespace = match self.kind() {
            ObjectKind::Namespace => None,
            _ => Some(self.namespace()?),
        };
        Ok(ObjectRef {
            kind: self.kind(),
            namespace,
            name: self.name(),
        })
    }
}

/// Where and how to reach a workspace's API server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub endpoint: Option<String>,
    pub kubeconfig: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSummary {
    pub name: String,
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    pub restarts: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub container: Option<String>,
    pub tail_lines: Option<i64>,
    pub since_seconds: Option<i64>,
    pub follow: bool,
}

/// An open log stream. Dropping it closes the underlying connection.
pub type LogStream = Pin<Box<dyn futures::AsyncBufRead + Send>>;

#[async_trait]
pub trait ClusterControl: Send + Sync {
    /// Submits the VirtualCluster object. Returns once the request is
    /// accepted; readiness is observed separately.
    async fn create_virtual_cluster(&self, vc: &VirtualCluster) -> Result<(), Error>;

    /// Fails with [`Error::NotFound`] when there is nothing to delete.
    async fn delete_virtual_cluster(&self, workspace_id: &str) -> Result<(), Error>;

    /// Fails with [`Error::NotFound`] once the virtual cluster is gone.
    async fn virtual_cluster_phase(&self, workspace_id: &str) -> Result<ClusterPhase, Error>;

    async fn scale_virtual_cluster(&self, workspace_id: &str, replicas: i32) -> Result<(), Error>;

    async fn connection_info(&self, workspace_id: &str) -> Result<ConnectionInfo, Error>;

    async fn apply(&self, workspace_id: &str, manifest: &Manifest) -> Result<(), Error>;

    /// Fails with [`Error::NotFound`] when the object does not exist.
    async fn delete(&self, workspace_id: &str, object: &ObjectRef) -> Result<(), Error>;

    async fn scale(&self, workspace_id: &str, object: &ObjectRef, replicas: i32) -> Result<(), Error>;

    async fn list_pods(
        &self,
        workspace_id: &str,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<PodSummary>, Error>;

    async fn pod_logs(
        &self,
        workspace_id: &str,
        namespace: &str,
        pod: &str,
        options: &LogOptions,
    ) -> Result<String, Error>;

    async fn stream_pod_logs(
        &self,
        workspace_id: &str,
        namespace: &str,
        pod: &str,
        options: &LogOptions,
    ) -> Result<LogStream, Error>;

    async fn delete_pods(&self, workspace_id: &str, namespace: &str, selector: &str) -> Result<(), Error>;

    async fn pod_metrics(
        &self,
        workspace_id: &str,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<PodUsage>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::create_test_project;

    // Test: manifests report kind, name and namespace of the wrapped object
    #[test]
    fn test_manifest_object_ref() {
        let project = create_test_project("p-1", "ws-1", "backend");

        let ns: Manifest = project.new_namespace().into();
        let ns_ref = ns.object_ref().expect("namespace ref");
        assert_eq!(ns_ref, ObjectRef::namespace("backend"));

        let binding: Manifest = project
            .new_role_binding("u-1", types::project::ProjectRole::Viewer)
            .into();
        assert_eq!(binding.kind(), ObjectKind::RoleBinding);
        assert_eq!(
            binding.object_ref().expect("binding ref"),
            ObjectRef::namespaced(ObjectKind::RoleBinding, "backend", "user-u-1")
        );
    }

    // Test: namespaced manifests without a namespace are rejected
    #[test]
    fn test_manifest_requires_namespace() {
        let manifest = Manifest::ConfigMap(corev1::ConfigMap::default());
        assert!(manifest.object_ref().is_err());
    }

    #[test]
    fn test_object_ref_display() {
        let r = ObjectRef::namespaced(ObjectKind::Deployment, "backend", "web");
        assert_eq!(r.to_string(), "Deployment backend/web");
        assert_eq!(ObjectRef::namespace("backend").to_string(), "Namespace backend");
    }
}
