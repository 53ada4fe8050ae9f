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

use super::{
    ClusterControl, ConnectionInfo, Error, LogOptions, LogStream, Manifest, MissingKubeconfigSnafu,
    NotFoundSnafu, ObjectKind, ObjectRef, PodSummary, UnavailableSnafu, metrics,
};
use crate::context::{Context, KubeSnafu};
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
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, LogParams};
use kube::runtime::events::EventType;
use snafu::futures::TryFutureExt;
use snafu::OptionExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const KUBECONFIG_KEY: &str = "config";

/// [`ClusterControl`] backed by real API servers.
///
/// VirtualCluster objects live on the host cluster in one shared namespace.
/// Everything else is sent to the virtual cluster itself, reached through
/// the kubeconfig Secret the vcluster controller publishes next to it.
pub struct KubeCluster {
    host: Context,
    vcluster_namespace: String,
    tenants: RwLock<HashMap<String, Arc<Context>>>,
}

impl KubeCluster {
    pub fn new(client: kube::Client, vcluster_namespace: &str) -> Self {
        Self {
            host: Context::new(client),
            vcluster_namespace: vcluster_namespace.to_owned(),
            tenants: RwLock::new(HashMap::new()),
        }
    }

    async fn tenant(&self, workspace_id: &str) -> Result<Arc<Context>, Error> {
        if let Some(ctx) = self.tenants.read().await.get(workspace_id) {
            return Ok(ctx.clone());
        }

        let info = self.connection_info(workspace_id).await?;
        let ctx = Arc::new(Context::from_kubeconfig(&info.kubeconfig).await?);
        debug!("connected to virtual cluster of workspace {}", workspace_id);

        self.tenants
            .write()
            .await
            .insert(workspace_id.to_owned(), ctx.clone());
        Ok(ctx)
    }

    async fn endpoint(&self, workspace_id: &str) -> Result<Option<String>, Error> {
        let svc = self
            .host
            .get_opt::<corev1::Service>(workspace_id, &self.vcluster_namespace)
            .await?;

        let ingress = svc
            .and_then(|s| s.status)
            .and_then(|s| s.load_balancer)
            .and_then(|lb| lb.ingress)
            .and_then(|i| i.into_iter().next());

        Ok(ingress
            .and_then(|i| i.hostname.or(i.ip))
            .map(|host| format!("https://{host}:443")))
    }
}

fn log_params(options: &LogOptions) -> LogParams {
    LogParams {
        container: options.container.clone(),
        tail_lines: options.tail_lines,
        since_seconds: options.since_seconds,
        follow: options.follow,
        ..Default::default()
    }
}

fn to_chrono(time: &metav1::Time) -> Option<DateTime<Utc>> {
    serde_json::to_value(time)
        .ok()
        .and_then(|v| serde_json::from_value(v).ok())
}

fn pod_summary(pod: corev1::Pod) -> PodSummary {
    let status = pod.status.unwrap_or_default();
    PodSummary {
        name: pod.metadata.name.unwrap_or_default(),
        status: status.phase.unwrap_or_else(|| "Unknown".to_owned()),
        node_name: pod.spec.and_then(|s| s.node_name),
        ip: status.pod_ip,
        start_time: status.start_time.as_ref().and_then(to_chrono),
        restarts: status
            .container_statuses
            .unwrap_or_default()
            .iter()
            .map(|c| c.restart_count)
            .sum(),
    }
}

fn object_namespace(object: &ObjectRef) -> Result<&str, Error> {
    Ok(object.namespace.as_deref().context(NoNamespaceSnafu)?)
}

#[async_trait]
impl ClusterControl for KubeCluster {
    async fn create_virtual_cluster(&self, vc: &VirtualCluster) -> Result<(), Error> {
        let created = self.host.apply(vc, &self.vcluster_namespace).await?;
        info!("virtual cluster {} submitted", vc.metadata.name.as_deref().unwrap_or_default());

        if let Err(e) = self
            .host
            .record(&created, EventType::Normal, "Provisioning", "virtual cluster submitted")
            .await
        {
            warn!("failed to record event: {}", e);
        }
        Ok(())
    }

    async fn delete_virtual_cluster(&self, workspace_id: &str) -> Result<(), Error> {
        self.tenants.write().await.remove(workspace_id);

        if !self
            .host
            .delete::<VirtualCluster>(workspace_id, &self.vcluster_namespace)
            .await?
        {
            return NotFoundSnafu {
                kind: ObjectKind::VirtualCluster,
                name: workspace_id,
            }
            .fail();
        }
        Ok(())
    }

    async fn virtual_cluster_phase(&self, workspace_id: &str) -> Result<ClusterPhase, Error> {
        let vc = self
            .host
            .get_opt::<VirtualCluster>(workspace_id, &self.vcluster_namespace)
            .await?
            .context(NotFoundSnafu {
                kind: ObjectKind::VirtualCluster,
                name: workspace_id,
            })?;
        Ok(vc.phase())
    }

    async fn scale_virtual_cluster(&self, workspace_id: &str, replicas: i32) -> Result<(), Error> {
        self.host
            .patch_replicas::<appsv1::StatefulSet>(
                &VirtualCluster::statefulset_name(workspace_id),
                &self.vcluster_namespace,
                replicas,
            )
            .await?;
        Ok(())
    }

    async fn connection_info(&self, workspace_id: &str) -> Result<ConnectionInfo, Error> {
        let secret = self
            .host
            .get_opt::<corev1::Secret>(
                &VirtualCluster::kubeconfig_secret_name(workspace_id),
                &self.vcluster_namespace,
            )
            .await?;

        let kubeconfig = secret
            .and_then(|s| s.data)
            .and_then(|mut d| d.remove(KUBECONFIG_KEY))
            .and_then(|bytes| String::from_utf8(bytes.0).ok())
            .context(MissingKubeconfigSnafu { workspace_id })?;

        Ok(ConnectionInfo {
            endpoint: self.endpoint(workspace_id).await?,
            kubeconfig,
        })
    }

    async fn apply(&self, workspace_id: &str, manifest: &Manifest) -> Result<(), Error> {
        let ctx = self.tenant(workspace_id).await?;
        match manifest {
            Manifest::Namespace(o) => {
                ctx.apply_cluster(o).await?;
            }
            Manifest::ConfigMap(o) => {
                ctx.apply(o, &manifest.namespace()?).await?;
            }
            Manifest::ResourceQuota(o) => {
                ctx.apply(o, &manifest.namespace()?).await?;
            }
            Manifest::RoleBinding(o) => {
                ctx.apply(o, &manifest.namespace()?).await?;
            }
            Manifest::SubnamespaceAnchor(o) => {
                ctx.apply(o, &manifest.namespace()?).await?;
            }
            Manifest::Deployment(o) => {
                ctx.apply(o, &manifest.namespace()?).await?;
            }
            Manifest::StatefulSet(o) => {
                ctx.apply(o, &manifest.namespace()?).await?;
            }
            Manifest::PersistentVolumeClaim(o) => {
                ctx.apply(o, &manifest.namespace()?).await?;
            }
            Manifest::Service(o) => {
                ctx.apply(o, &manifest.namespace()?).await?;
            }
            Manifest::Ingress(o) => {
                ctx.apply(o, &manifest.namespace()?).await?;
            }
            Manifest::CronJob(o) => {
                ctx.apply(o, &manifest.namespace()?).await?;
            }
            Manifest::Job(o) => {
                ctx.create(o, &manifest.namespace()?).await?;
            }
        }
        debug!("applied {} {} in workspace {}", manifest.kind(), manifest.name(), workspace_id);
        Ok(())
    }

    async fn delete(&self, workspace_id: &str, object: &ObjectRef) -> Result<(), Error> {
        let ctx = self.tenant(workspace_id).await?;
        let name = object.name.as_str();

        let deleted = match object.kind {
            ObjectKind::Namespace => ctx.delete_cluster::<corev1::Namespace>(name).await?,
            ObjectKind::ConfigMap => {
                ctx.delete::<corev1::ConfigMap>(name, object_namespace(object)?)
                    .await?
            }
            ObjectKind::ResourceQuota => {
                ctx.delete::<corev1::ResourceQuota>(name, object_namespace(object)?)
                    .await?
            }
            ObjectKind::RoleBinding => {
                ctx.delete::<rbacv1::RoleBinding>(name, object_namespace(object)?)
                    .await?
            }
            ObjectKind::SubnamespaceAnchor => {
                ctx.delete::<SubnamespaceAnchor>(name, object_namespace(object)?)
                    .await?
            }
            ObjectKind::Deployment => {
                ctx.delete::<appsv1::Deployment>(name, object_namespace(object)?)
                    .await?
            }
            ObjectKind::StatefulSet => {
                ctx.delete::<appsv1::StatefulSet>(name, object_namespace(object)?)
                    .await?
            }
            ObjectKind::PersistentVolumeClaim => {
                ctx.delete::<corev1::PersistentVolumeClaim>(name, object_namespace(object)?)
                    .await?
            }
            ObjectKind::Service => {
                ctx.delete::<corev1::Service>(name, object_namespace(object)?)
                    .await?
            }
            ObjectKind::Ingress => {
                ctx.delete::<networkingv1::Ingress>(name, object_namespace(object)?)
                    .await?
            }
            ObjectKind::CronJob => {
                ctx.delete::<batchv1::CronJob>(name, object_namespace(object)?)
                    .await?
            }
            ObjectKind::Job => {
                ctx.delete::<batchv1::Job>(name, object_namespace(object)?)
                    .await?
            }
            ObjectKind::VirtualCluster => return self.delete_virtual_cluster(name).await,
        };

        if !deleted {
            return NotFoundSnafu {
                kind: object.kind,
                name,
            }
            .fail();
        }
        Ok(())
    }

    async fn scale(&self, workspace_id: &str, object: &ObjectRef, replicas: i32) -> Result<(), Error> {
        let ctx = self.tenant(workspace_id).await?;
        let namespace = object_namespace(object)?;

        match object.kind {
            ObjectKind::Deployment => {
                ctx.patch_replicas::<appsv1::Deployment>(&object.name, namespace, replicas)
                    .await?;
            }
            ObjectKind::StatefulSet => {
                ctx.patch_replicas::<appsv1::StatefulSet>(&object.name, namespace, replicas)
                    .await?;
            }
            other => {
                return UnavailableSnafu {
                    message: format!("{other} cannot be scaled"),
                }
                .fail();
            }
        }
        Ok(())
    }

    async fn list_pods(
        &self,
        workspace_id: &str,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<PodSummary>, Error> {
        let ctx = self.tenant(workspace_id).await?;
        let pods = ctx.list::<corev1::Pod>(namespace, selector).await?;
        Ok(pods.items.into_iter().map(pod_summary).collect())
    }

    async fn pod_logs(
        &self,
        workspace_id: &str,
        namespace: &str,
        pod: &str,
        options: &LogOptions,
    ) -> Result<String, Error> {
        let ctx = self.tenant(workspace_id).await?;
        let api: Api<corev1::Pod> = Api::namespaced(ctx.client.clone(), namespace);
        let logs = api
            .logs(pod, &log_params(options))
            .context(KubeSnafu)
            .await?;
        Ok(logs)
    }

    async fn stream_pod_logs(
        &self,
        workspace_id: &str,
        namespace: &str,
        pod: &str,
        options: &LogOptions,
    ) -> Result<LogStream, Error> {
        let ctx = self.tenant(workspace_id).await?;
        let api: Api<corev1::Pod> = Api::namespaced(ctx.client.clone(), namespace);
        let params = LogParams {
            follow: true,
            ..log_params(options)
        };
        let stream = api
            .log_stream(pod, &params)
            .context(KubeSnafu)
            .await?;
        Ok(Box::pin(stream))
    }

    async fn delete_pods(&self, workspace_id: &str, namespace: &str, selector: &str) -> Result<(), Error> {
        let ctx = self.tenant(workspace_id).await?;
        ctx.delete_collection::<corev1::Pod>(namespace, selector)
            .await?;
        Ok(())
    }

    async fn pod_metrics(
        &self,
        workspace_id: &str,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<PodUsage>, Error> {
        let ctx = self.tenant(workspace_id).await?;
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "pods");
        let api: Api<DynamicObject> =
            Api::namespaced_with(ctx.client.clone(), namespace, &resource);

        let list = api
            .list(&ListParams::default().labels(selector))
            .context(KubeSnafu)
            .await?;
        Ok(list.items.iter().map(metrics::pod_usage).collect())
    }
}
