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

use super::{ANNOTATION_APP_ID, Application, CronSpec, LABEL_APP, LABEL_TYPE, Workload};
use crate::types;
use crate::types::error::InvalidFieldSnafu;
use k8s_openapi::api::batch::v1 as batchv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use std::collections::BTreeMap;

const BACKOFF_LIMIT: i32 = 3;
const TTL_AFTER_FINISHED_SECS: i32 = 86400;

impl Application {
    pub fn cron_spec(&self) -> Result<&CronSpec, types::error::Error> {
        match &self.workload {
            Workload::CronJob(cron) => Ok(cron),
            other => InvalidFieldSnafu {
                field: "type",
                message: format!("application {} is {}, not cronjob", self.name, other.app_type()),
            }
            .fail(),
        }
    }

    fn cron_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (LABEL_APP.to_owned(), self.name.clone()),
            (LABEL_TYPE.to_owned(), "cronjob".to_owned()),
        ])
    }

    /// Job template. When `template` is given its image, ports, env and
    /// resources are used and the cron command overrides its entrypoint.
    fn job_template(
        &self,
        template: Option<&Application>,
    ) -> Result<batchv1::JobSpec, types::error::Error> {
        let cron = self.cron_spec()?;
        let mut container = match template {
            Some(t) => t.container()?,
            None => self.container()?,
        };
        container.name = self.name.clone();
        container.ports = None;
        container.volume_mounts = None;
        if !cron.command.is_empty() {
            container.command = Some(cron.command.clone());
        }
        if !cron.args.is_empty() {
            container.args = Some(cron.args.clone());
        }

        Ok(batchv1::JobSpec {
            backoff_limit: Some(BACKOFF_LIMIT),
            ttl_seconds_after_finished: Some(TTL_AFTER_FINISHED_SECS),
            template: corev1::PodTemplateSpec {
                metadata: Some(metav1::ObjectMeta {
                    labels: Some(self.cron_labels()),
                    ..Default::default()
                }),
                spec: Some(corev1::PodSpec {
                    containers: vec![container],
                    restart_policy: Some("OnFailure".to_owned()),
                    node_selector: (!self.config.node_selector.is_empty())
                        .then(|| self.config.node_selector.clone()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        })
    }

    fn cron_meta(&self, name: String, namespace: &str) -> metav1::ObjectMeta {
        metav1::ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_owned()),
            labels: Some(self.cron_labels()),
            annotations: Some(BTreeMap::from([(
                ANNOTATION_APP_ID.to_owned(),
                self.id.clone(),
            )])),
            ..Default::default()
        }
    }

    pub fn new_cron_job(
        &self,
        namespace: &str,
        template: Option<&Application>,
    ) -> Result<batchv1::CronJob, types::error::Error> {
        let cron = self.cron_spec()?;
        Ok(batchv1::CronJob {
            metadata: self.cron_meta(self.name.clone(), namespace),
            spec: Some(batchv1::CronJobSpec {
                schedule: cron.schedule.clone(),
                concurrency_policy: Some("Forbid".to_owned()),
                job_template: batchv1::JobTemplateSpec {
                    metadata: Some(metav1::ObjectMeta {
                        labels: Some(self.cron_labels()),
                        ..Default::default()
                    }),
                    spec: Some(self.job_template(template)?),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    /// One-off Job run outside the schedule, named `{name}-manual-{unix}`.
    pub fn new_manual_job(
        &self,
        namespace: &str,
        template: Option<&Application>,
        unix_ts: i64,
    ) -> Result<batchv1::Job, types::error::Error> {
        Ok(batchv1::Job {
            metadata: self.cron_meta(format!("{}-manual-{unix_ts}", self.name), namespace),
            spec: Some(self.job_template(template)?),
            ..Default::default()
        })
    }
}
