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

//! Application deployment.
//!
//! Every status write goes through [`Application::transition`]. A refused
//! transition is logged at error level and returned, never clamped.

use crate::activity::{ActivityKind, ActivityLog};
use crate::cluster::{self, ClusterControl, LogOptions, LogStream, Manifest, ObjectKind, ObjectRef, PodSummary};
use crate::store::{self, Store};
use crate::types;
use crate::types::application::{
    AggregateUsage, Application, ApplicationMetrics, ApplicationStatus, CreateApplicationRequest,
    UpdateApplicationRequest, Workload,
};
use crate::types::error::{InvalidFieldSnafu, Severity};
use chrono::Utc;
use snafu::{ResultExt, Snafu, ensure};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

mod cronjob;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to {} application {}: {}", action, application_id, source))]
    Store {
        action: &'static str,
        application_id: String,
        source: store::Error,
    },

    #[snafu(display("failed to {} for application {}: {}", action, application_id, source))]
    Cluster {
        action: &'static str,
        application_id: String,
        source: cluster::Error,
    },

    #[snafu(display("application name '{}' is already taken in project {}", name, project_id))]
    NameTaken { project_id: String, name: String },

    #[snafu(display("application {} is {}, expected running", application_id, status))]
    NotRunning {
        application_id: String,
        status: ApplicationStatus,
    },

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
pub struct DeploymentCoordinator {
    cluster: Arc<dyn ClusterControl>,
    store: Arc<dyn Store>,
    activity: ActivityLog,
}

impl DeploymentCoordinator {
    pub fn new(cluster: Arc<dyn ClusterControl>, store: Arc<dyn Store>) -> Self {
        Self {
            activity: ActivityLog::new(store.clone()),
            cluster,
            store,
        }
    }

    /// Validates and persists a `pending` application in its project's
    /// workspace. Nothing is installed until [`deploy`](Self::deploy).
    pub async fn create_application(&self, request: CreateApplicationRequest) -> Result<Application> {
        let project = self
            .store
            .get_project(&request.project_id)
            .await
            .context(StoreSnafu {
                action: "look up project of",
                application_id: &request.name,
            })?;

        let id = uuid::Uuid::new_v4().to_string();
        let application = Application::new(id.clone(), &project.workspace_id, request);
        application.validate()?;

        let taken = self
            .store
            .get_application_by_name(&application.project_id, &application.name)
            .await
            .context(StoreSnafu {
                action: "look up",
                application_id: &id,
            })?;
        ensure!(
            taken.is_none(),
            NameTakenSnafu {
                project_id: &application.project_id,
                name: &application.name,
            }
        );

        let application = self
            .store
            .create_application(application)
            .await
            .context(StoreSnafu {
                action: "create",
                application_id: &id,
            })?;
        info!(
            "created {} application {} in project {}",
            application.app_type(),
            application.name,
            application.project_id
        );
        Ok(application)
    }

    /// `pending|stopped|error -> deploying -> running`. Installs the workload,
    /// its Service and, best-effort, its Ingress.
    pub async fn deploy(&self, application_id: &str, actor: &str) -> Result<Application> {
        let mut app = self.load(application_id).await?;
        let namespace = self.namespace_of(&app).await?;
        self.set_status(&mut app, ApplicationStatus::Deploying).await?;
        self.record(&app, actor, ActivityKind::DeploymentStarted, format!("Deploying {}", app.name))
            .await;

        match self.install(&app, &namespace, actor).await {
            Ok(ingress_created) => {
                app.endpoints = app.derive_endpoints(&namespace, ingress_created);
                self.set_status(&mut app, ApplicationStatus::Running).await?;
                self.record(&app, actor, ActivityKind::DeploymentSucceeded, format!("Deployed {}", app.name))
                    .await;
                info!("application {} is running in {}", app.name, namespace);
                Ok(app)
            }
            Err(e) => Err(self.fail(app, actor, ActivityKind::DeploymentFailed, e).await),
        }
    }

    /// `running -> updating -> running`, re-installing the changed manifests.
    pub async fn update_application(
        &self,
        application_id: &str,
        update: UpdateApplicationRequest,
        actor: &str,
    ) -> Result<Application> {
        let mut app = self.load(application_id).await?;
        let namespace = self.namespace_of(&app).await?;

        let mut updated = app.clone();
        updated.apply_update(update);
        updated.validate()?;
        if updated.workload == Workload::Stateful {
            validate_stateful_replicas(updated.config.replicas)?;
        }

        self.set_status(&mut app, ApplicationStatus::Updating).await?;
        updated.status = app.status;
        let mut app = updated;
        self.record(&app, actor, ActivityKind::UpdateStarted, format!("Updating {}", app.name))
            .await;

        match self.install(&app, &namespace, actor).await {
            Ok(ingress_created) => {
                app.endpoints = app.derive_endpoints(&namespace, ingress_created);
                self.set_status(&mut app, ApplicationStatus::Running).await?;
                self.record(&app, actor, ActivityKind::UpdateSucceeded, format!("Updated {}", app.name))
                    .await;
                Ok(app)
            }
            Err(e) => Err(self.fail(app, actor, ActivityKind::UpdateFailed, e).await),
        }
    }

    /// `running -> stopping -> stopped`, scaling the workload to zero.
    pub async fn stop(&self, application_id: &str, actor: &str) -> Result<Application> {
        let mut app = self.load(application_id).await?;
        ensure_scalable(&app)?;
        let namespace = self.namespace_of(&app).await?;
        self.set_status(&mut app, ApplicationStatus::Stopping).await?;

        if let Err(e) = self.scale_workload(&app, &namespace, 0).await {
            return Err(self.fail(app, actor, ActivityKind::DeploymentFailed, e).await);
        }
        self.set_status(&mut app, ApplicationStatus::Stopped).await?;
        self.record(&app, actor, ActivityKind::ApplicationStopped, format!("Stopped {}", app.name))
            .await;
        Ok(app)
    }

    /// `stopped -> deploying -> running`, scaling back to the configured
    /// replica count.
    pub async fn start(&self, application_id: &str, actor: &str) -> Result<Application> {
        let mut app = self.load(application_id).await?;
        ensure_scalable(&app)?;
        ensure!(
            app.status == ApplicationStatus::Stopped,
            types::error::IllegalTransitionSnafu {
                entity: "application",
                from: app.status.to_string(),
                to: "starting",
            }
        );
        let namespace = self.namespace_of(&app).await?;
        self.set_status(&mut app, ApplicationStatus::Deploying).await?;

        if let Err(e) = self
            .scale_workload(&app, &namespace, app.effective_replicas())
            .await
        {
            return Err(self.fail(app, actor, ActivityKind::DeploymentFailed, e).await);
        }
        self.set_status(&mut app, ApplicationStatus::Running).await?;
        self.record(&app, actor, ActivityKind::ApplicationStarted, format!("Started {}", app.name))
            .await;
        Ok(app)
    }

    /// Deletes the running pods so their controller recreates them.
    pub async fn restart(&self, application_id: &str, actor: &str) -> Result<()> {
        let app = self.load(application_id).await?;
        ensure_scalable(&app)?;
        self.ensure_running(&app)?;
        let namespace = self.namespace_of(&app).await?;

        self.cluster
            .delete_pods(&app.workspace_id, &namespace, &app.label_selector())
            .await
            .context(ClusterSnafu {
                action: "restart pods",
                application_id,
            })?;
        self.record(&app, actor, ActivityKind::RestartCompleted, format!("Restarted {}", app.name))
            .await;
        Ok(())
    }

    /// Sets the replica count of a running application. Stateful
    /// applications run at most one replica.
    pub async fn scale(&self, application_id: &str, replicas: i32, actor: &str) -> Result<Application> {
        let mut app = self.load(application_id).await?;
        ensure_scalable(&app)?;
        ensure!(
            replicas >= 0,
            InvalidFieldSnafu {
                field: "replicas",
                message: "replicas must be non-negative",
            }
        );
        if app.workload == Workload::Stateful {
            validate_stateful_replicas(replicas)?;
        }
        self.ensure_running(&app)?;
        let namespace = self.namespace_of(&app).await?;

        app.config.replicas = replicas;
        self.scale_workload(&app, &namespace, app.effective_replicas())
            .await?;
        app.updated_at = Utc::now();
        let app = self.save(app).await?;

        self.record(
            &app,
            actor,
            ActivityKind::ApplicationScaled,
            format!("Scaled {} to {} replicas", app.name, replicas),
        )
        .await;
        Ok(app)
    }

    /// Moves the application to `deleting`, removes its cluster objects and
    /// then the record. A delete interrupted after the status change can be
    /// retried.
    pub async fn delete_application(&self, application_id: &str, actor: &str) -> Result<()> {
        let mut app = self.load(application_id).await?;
        let namespace = self.namespace_of(&app).await?;
        if app.status != ApplicationStatus::Deleting {
            self.set_status(&mut app, ApplicationStatus::Deleting).await?;
        }

        for object in owned_objects(&app, &namespace) {
            match self.cluster.delete(&app.workspace_id, &object).await {
                Ok(()) => debug!("deleted {}", object),
                Err(e) if e.is_not_found() => debug!("{} was already absent", object),
                Err(e) => {
                    return Err(e).context(ClusterSnafu {
                        action: "delete resources",
                        application_id,
                    });
                }
            }
        }

        self.store
            .delete_application(application_id)
            .await
            .context(StoreSnafu {
                action: "delete",
                application_id,
            })?;
        self.record(&app, actor, ActivityKind::ApplicationDeleted, format!("Deleted {}", app.name))
            .await;
        info!("deleted application {}", app.name);
        Ok(())
    }

    pub async fn get_application(&self, application_id: &str) -> Result<Application> {
        self.load(application_id).await
    }

    pub async fn list_applications(&self, project_id: &str) -> Result<Vec<Application>> {
        self.store
            .list_applications(project_id)
            .await
            .context(StoreSnafu {
                action: "list",
                application_id: "*",
            })
    }

    pub async fn list_pods(&self, application_id: &str) -> Result<Vec<PodSummary>> {
        let app = self.load(application_id).await?;
        let namespace = self.namespace_of(&app).await?;
        self.cluster
            .list_pods(&app.workspace_id, &namespace, &app.label_selector())
            .await
            .context(ClusterSnafu {
                action: "list pods",
                application_id,
            })
    }

    pub async fn pod_logs(
        &self,
        application_id: &str,
        pod: &str,
        options: &LogOptions,
    ) -> Result<String> {
        let app = self.load(application_id).await?;
        let namespace = self.namespace_of(&app).await?;
        self.cluster
            .pod_logs(&app.workspace_id, &namespace, pod, options)
            .await
            .context(ClusterSnafu {
                action: "fetch logs",
                application_id,
            })
    }

    /// Opens a log stream. The caller owns the stream and closes it by
    /// dropping it.
    pub async fn stream_pod_logs(
        &self,
        application_id: &str,
        pod: &str,
        options: &LogOptions,
    ) -> Result<LogStream> {
        let app = self.load(application_id).await?;
        let namespace = self.namespace_of(&app).await?;
        self.cluster
            .stream_pod_logs(&app.workspace_id, &namespace, pod, options)
            .await
            .context(ClusterSnafu {
                action: "stream logs",
                application_id,
            })
    }

    pub async fn metrics(&self, application_id: &str) -> Result<ApplicationMetrics> {
        let app = self.load(application_id).await?;
        let namespace = self.namespace_of(&app).await?;
        let pods = self
            .cluster
            .pod_metrics(&app.workspace_id, &namespace, &app.label_selector())
            .await
            .context(ClusterSnafu {
                action: "fetch metrics",
                application_id,
            })?;

        Ok(ApplicationMetrics {
            application_id: app.id,
            timestamp: Utc::now(),
            aggregate: AggregateUsage::from_pods(&pods),
            pods,
        })
    }

    /// Installs the workload and its networking. Returns whether an Ingress
    /// was created.
    async fn install(&self, app: &Application, namespace: &str, actor: &str) -> Result<bool> {
        let workload: Vec<Manifest> = match &app.workload {
            Workload::Stateless | Workload::Function(_) => vec![app.new_deployment(namespace)?.into()],
            Workload::Stateful => vec![
                app.new_pvc(namespace).into(),
                app.new_statefulset(namespace)?.into(),
            ],
            Workload::CronJob(cron) => {
                let template = match &cron.template_app_id {
                    Some(id) => Some(self.load(id).await?),
                    None => None,
                };
                vec![app.new_cron_job(namespace, template.as_ref())?.into()]
            }
        };
        for manifest in &workload {
            self.apply(app, manifest).await?;
        }

        if !app.exposes_service() {
            return Ok(false);
        }
        self.apply(app, &app.new_service(namespace).into()).await?;

        let Some(ingress) = app.new_ingress(namespace) else {
            self.remove_ingress(app, namespace).await;
            return Ok(false);
        };
        let result = self.apply(app, &ingress.into()).await;
        match Severity::Advisory.handle("create ingress", &app.id, result) {
            Ok(Some(())) => Ok(true),
            _ => {
                self.record(
                    app,
                    actor,
                    ActivityKind::IngressFailed,
                    format!("Ingress for {} could not be created", app.name),
                )
                .await;
                Ok(false)
            }
        }
    }

    /// Drops an Ingress left over from an earlier configuration.
    async fn remove_ingress(&self, app: &Application, namespace: &str) {
        let object = ObjectRef::namespaced(ObjectKind::Ingress, namespace, &app.name);
        match self.cluster.delete(&app.workspace_id, &object).await {
            Ok(()) => info!("removed {} of application {}", object, app.name),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!("failed to remove {} of application {}: {}", object, app.name, e),
        }
    }

    async fn apply(&self, app: &Application, manifest: &Manifest) -> Result<()> {
        self.cluster
            .apply(&app.workspace_id, manifest)
            .await
            .context(ClusterSnafu {
                action: "apply manifest",
                application_id: &app.id,
            })?;
        debug!("applied {} {} for application {}", manifest.kind(), manifest.name(), app.name);
        Ok(())
    }

    async fn scale_workload(&self, app: &Application, namespace: &str, replicas: i32) -> Result<()> {
        let object = workload_ref(app, namespace);
        self.cluster
            .scale(&app.workspace_id, &object, replicas)
            .await
            .context(ClusterSnafu {
                action: "scale workload",
                application_id: &app.id,
            })
    }

    /// Moves `app` to `to` and persists it.
    async fn set_status(&self, app: &mut Application, to: ApplicationStatus) -> Result<()> {
        if let Err(e) = app.transition(to) {
            error!("application {} refused status change: {}", app.id, e);
            return Err(e.into());
        }
        *app = self.save(app.clone()).await?;
        Ok(())
    }

    /// Moves `app` to `error` after a failed step and returns the step's
    /// error. Failing to record the error status is only logged.
    async fn fail(&self, mut app: Application, actor: &str, kind: ActivityKind, cause: Error) -> Error {
        warn!("application {} failed: {}", app.name, cause);
        let recorded = self.set_status(&mut app, ApplicationStatus::Error).await;
        let _ = Severity::Advisory.handle("record error status", &app.id, recorded);
        self.record(&app, actor, kind, cause.to_string()).await;
        cause
    }

    fn ensure_running(&self, app: &Application) -> Result<()> {
        ensure!(
            app.status == ApplicationStatus::Running,
            NotRunningSnafu {
                application_id: &app.id,
                status: app.status,
            }
        );
        Ok(())
    }

    async fn record(&self, app: &Application, actor: &str, kind: ActivityKind, description: String) {
        self.activity
            .record(&app.workspace_id, Some(&app.project_id), actor, kind, description)
            .await;
    }

    async fn namespace_of(&self, app: &Application) -> Result<String> {
        let project = self
            .store
            .get_project(&app.project_id)
            .await
            .context(StoreSnafu {
                action: "look up project of",
                application_id: &app.id,
            })?;
        Ok(project.namespace().to_owned())
    }

    async fn load(&self, application_id: &str) -> Result<Application> {
        self.store
            .get_application(application_id)
            .await
            .context(StoreSnafu {
                action: "get",
                application_id,
            })
    }

    async fn save(&self, app: Application) -> Result<Application> {
        let application_id = app.id.clone();
        self.store
            .update_application(app)
            .await
            .context(StoreSnafu {
                action: "update",
                application_id,
            })
    }
}

fn validate_stateful_replicas(replicas: i32) -> Result<(), types::error::Error> {
    ensure!(
        (0..=1).contains(&replicas),
        InvalidFieldSnafu {
            field: "replicas",
            message: "stateful applications run at most one replica",
        }
    );
    Ok(())
}

/// Cron applications follow their schedule and have no replica count.
fn ensure_scalable(app: &Application) -> Result<(), types::error::Error> {
    ensure!(
        !matches!(app.workload, Workload::CronJob(_)),
        InvalidFieldSnafu {
            field: "type",
            message: format!("cronjob application {} cannot be scaled", app.name),
        }
    );
    Ok(())
}

fn workload_ref(app: &Application, namespace: &str) -> ObjectRef {
    let kind = match app.workload {
        Workload::Stateful => ObjectKind::StatefulSet,
        Workload::CronJob(_) => ObjectKind::CronJob,
        Workload::Stateless | Workload::Function(_) => ObjectKind::Deployment,
    };
    ObjectRef::namespaced(kind, namespace, &app.name)
}

/// Everything [`DeploymentCoordinator::deploy`] may have created.
fn owned_objects(app: &Application, namespace: &str) -> Vec<ObjectRef> {
    let mut objects = vec![workload_ref(app, namespace)];
    if app.workload == Workload::Stateful {
        objects.push(ObjectRef::namespaced(
            ObjectKind::PersistentVolumeClaim,
            namespace,
            &app.pvc_name(),
        ));
    }
    if app.exposes_service() {
        objects.push(ObjectRef::namespaced(ObjectKind::Service, namespace, &app.name));
        objects.push(ObjectRef::namespaced(ObjectKind::Ingress, namespace, &app.name));
    }
    objects
}
