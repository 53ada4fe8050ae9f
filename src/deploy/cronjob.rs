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

use super::{DeploymentCoordinator, Result};
use crate::activity::ActivityKind;
use crate::types::application::{Application, ApplicationStatus, CreateApplicationRequest, Workload};
use crate::types::error::InvalidFieldSnafu;
use chrono::Utc;
use snafu::ensure;
use tracing::info;

impl DeploymentCoordinator {
    /// Creates and immediately deploys a cron application.
    pub async fn create_cron_job(
        &self,
        request: CreateApplicationRequest,
        actor: &str,
    ) -> Result<Application> {
        ensure!(
            matches!(request.workload, Workload::CronJob(_)),
            InvalidFieldSnafu {
                field: "type",
                message: format!("application {} is not a cronjob", request.name),
            }
        );
        let app = self.create_application(request).await?;
        self.deploy(&app.id, actor).await
    }

    /// Runs the job once outside its schedule and returns the Job name.
    pub async fn trigger_cron_job(&self, application_id: &str, actor: &str) -> Result<String> {
        let mut app = self.load(application_id).await?;
        let template_id = app.cron_spec()?.template_app_id.clone();
        let template = match template_id {
            Some(id) => Some(self.load(&id).await?),
            None => None,
        };
        let namespace = self.namespace_of(&app).await?;

        let now = Utc::now();
        let job = app.new_manual_job(&namespace, template.as_ref(), now.timestamp())?;
        let job_name = job.metadata.name.clone().unwrap_or_default();
        self.apply(&app, &job.into()).await?;

        if let Workload::CronJob(cron) = &mut app.workload {
            cron.last_execution_at = Some(now);
        }
        app.updated_at = now;
        let app = self.save(app).await?;

        self.record(
            &app,
            actor,
            ActivityKind::CronJobTriggered,
            format!("Triggered {} as {}", app.name, job_name),
        )
        .await;
        info!("triggered cronjob {} as job {}", app.name, job_name);
        Ok(job_name)
    }

    /// Replaces the schedule. A running CronJob is re-applied in place.
    pub async fn update_cron_schedule(
        &self,
        application_id: &str,
        schedule: &str,
        actor: &str,
    ) -> Result<Application> {
        ensure!(
            !schedule.trim().is_empty(),
            InvalidFieldSnafu {
                field: "schedule",
                message: "cron schedule must not be empty",
            }
        );
        let mut app = self.load(application_id).await?;
        app.cron_spec()?;
        if let Workload::CronJob(cron) = &mut app.workload {
            cron.schedule = schedule.trim().to_owned();
        }

        if app.status == ApplicationStatus::Running {
            let namespace = self.namespace_of(&app).await?;
            let template = match &app.cron_spec()?.template_app_id {
                Some(id) => Some(self.load(id).await?),
                None => None,
            };
            let cron_job = app.new_cron_job(&namespace, template.as_ref())?;
            self.apply(&app, &cron_job.into()).await?;
        }

        app.updated_at = Utc::now();
        let app = self.save(app).await?;
        self.record(
            &app,
            actor,
            ActivityKind::UpdateSucceeded,
            format!("Schedule of {} set to {}", app.name, schedule.trim()),
        )
        .await;
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::super::Error;
    use super::super::tests::{request, setup};
    use crate::cluster::{Manifest, ObjectKind, ObjectRef};
    use crate::types::application::{CronSpec, Workload};

    fn nightly() -> Workload {
        Workload::CronJob(CronSpec {
            schedule: "0 2 * * *".to_string(),
            command: vec!["backup.sh".to_string()],
            ..Default::default()
        })
    }

    fn cron_ref(name: &str) -> ObjectRef {
        ObjectRef::namespaced(ObjectKind::CronJob, "backend", name)
    }

    // Test: cron applications deploy a CronJob and no Service
    #[tokio::test]
    async fn test_create_cron_job() {
        let (coordinator, cluster, _) = setup().await;
        let app = coordinator
            .create_cron_job(request("nightly", nightly()), "u-1")
            .await
            .expect("create cron");

        assert!(cluster.has_object("ws-1", &cron_ref("nightly")));
        assert!(!cluster.has_object(
            "ws-1",
            &ObjectRef::namespaced(ObjectKind::Service, "backend", "nightly")
        ));
        assert!(app.endpoints.is_empty());

        let err = coordinator
            .create_cron_job(request("web", Workload::Stateless), "u-1")
            .await
            .expect_err("not a cronjob");
        assert!(matches!(err, Error::Types { .. }));
    }

    // Test: cron jobs from a template app run its image with the cron command
    #[tokio::test]
    async fn test_cron_job_template() {
        let (coordinator, cluster, _) = setup().await;
        let mut base = request("api", Workload::Stateless);
        base.source = crate::types::application::ApplicationSource::Image {
            image: "team/api:2.1".to_string(),
        };
        let base = coordinator.create_application(base).await.expect("base");

        coordinator
            .create_cron_job(
                request(
                    "cleanup",
                    Workload::CronJob(CronSpec {
                        schedule: "*/30 * * * *".to_string(),
                        command: vec!["cleanup".to_string()],
                        template_app_id: Some(base.id.clone()),
                        ..Default::default()
                    }),
                ),
                "u-1",
            )
            .await
            .expect("cron from template");

        let Some(Manifest::CronJob(cron)) = cluster.object("ws-1", &cron_ref("cleanup")) else {
            panic!("cronjob should be applied");
        };
        let pod = cron
            .spec
            .expect("spec")
            .job_template
            .spec
            .expect("job")
            .template
            .spec
            .expect("pod");
        assert_eq!(pod.containers[0].image.as_deref(), Some("team/api:2.1"));
        assert_eq!(pod.containers[0].command, Some(vec!["cleanup".to_string()]));
    }

    // Test: manual trigger applies a Job and stamps the execution time
    #[tokio::test]
    async fn test_trigger_cron_job() {
        let (coordinator, cluster, _) = setup().await;
        let app = coordinator
            .create_cron_job(request("nightly", nightly()), "u-1")
            .await
            .expect("create cron");

        let job_name = coordinator
            .trigger_cron_job(&app.id, "u-1")
            .await
            .expect("trigger");
        assert!(job_name.starts_with("nightly-manual-"));
        assert!(cluster.has_object(
            "ws-1",
            &ObjectRef::namespaced(ObjectKind::Job, "backend", &job_name)
        ));

        let app = coordinator.get_application(&app.id).await.expect("get");
        let Workload::CronJob(cron) = app.workload else {
            panic!("still a cronjob");
        };
        assert!(cron.last_execution_at.is_some());
    }

    // Test: schedule updates re-apply a running CronJob and reject blanks
    #[tokio::test]
    async fn test_update_cron_schedule() {
        let (coordinator, cluster, _) = setup().await;
        let app = coordinator
            .create_cron_job(request("nightly", nightly()), "u-1")
            .await
            .expect("create cron");

        coordinator
            .update_cron_schedule(&app.id, "0 4 * * *", "u-1")
            .await
            .expect("reschedule");
        let Some(Manifest::CronJob(cron)) = cluster.object("ws-1", &cron_ref("nightly")) else {
            panic!("cronjob should be applied");
        };
        assert_eq!(cron.spec.expect("spec").schedule, "0 4 * * *");

        assert!(
            coordinator
                .update_cron_schedule(&app.id, "  ", "u-1")
                .await
                .is_err()
        );
    }

    // Test: cron applications have no replica count to scale
    #[tokio::test]
    async fn test_cron_job_not_scalable() {
        let (coordinator, _, _) = setup().await;
        let app = coordinator
            .create_cron_job(request("nightly", nightly()), "u-1")
            .await
            .expect("create cron");

        assert!(coordinator.scale(&app.id, 2, "u-1").await.is_err());
        assert!(coordinator.stop(&app.id, "u-1").await.is_err());
    }
}
