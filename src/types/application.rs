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

use crate::types::error::{Error, IllegalTransitionSnafu, InvalidFieldSnafu};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, EnumString};

pub mod cronjob;
pub mod services;
pub mod workloads;

pub const LABEL_APP: &str = "app";
pub const LABEL_TYPE: &str = "type";
pub const ANNOTATION_APP_ID: &str = "hexabase.io/app-id";

const DEFAULT_PORT: i32 = 8080;

/// Lifecycle status of a deployed workload.
#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, Display, EnumString, EnumIter, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[strum(to_string = "pending")]
    Pending,

    #[strum(to_string = "deploying")]
    Deploying,

    #[strum(to_string = "running")]
    Running,

    #[strum(to_string = "updating")]
    Updating,

    #[strum(to_string = "stopping")]
    Stopping,

    #[strum(to_string = "stopped")]
    Stopped,

    #[strum(to_string = "error")]
    Error,

    #[strum(to_string = "deleting")]
    Deleting,
}

impl ApplicationStatus {
    /// Statuses reachable from `self`. `deleting` is terminal.
    pub fn allowed_targets(self) -> &'static [ApplicationStatus] {
        use ApplicationStatus::*;

        match self {
            Pending => &[Deploying, Error],
            Deploying => &[Running, Error],
            Running => &[Updating, Stopping, Error],
            Updating => &[Running, Error],
            Stopping => &[Stopped, Error],
            Stopped => &[Deploying, Deleting],
            Error => &[Deploying, Deleting],
            Deleting => &[],
        }
    }

    pub fn can_transition(self, to: ApplicationStatus) -> bool {
        self.allowed_targets().contains(&to)
    }

    /// Same check over raw status strings. Unrecognised statuses never
    /// transition.
    pub fn can_transition_str(from: &str, to: &str) -> bool {
        match (from.parse::<ApplicationStatus>(), to.parse::<ApplicationStatus>()) {
            (Ok(from), Ok(to)) => from.can_transition(to),
            _ => false,
        }
    }
}

#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, Display, EnumString, EnumIter, PartialEq, Eq,
)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    #[strum(to_string = "stateless")]
    Stateless,

    #[strum(to_string = "stateful")]
    Stateful,

    #[strum(to_string = "cronjob")]
    CronJob,

    #[strum(to_string = "function")]
    Function,
}

/// Where the container image comes from.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ApplicationSource {
    Image {
        image: String,
    },
    Git {
        url: String,

        #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
        git_ref: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        buildpack: Option<String>,

        /// Image produced by the build pipeline for this source.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
}

impl ApplicationSource {
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            ApplicationSource::Image { image } if image.trim().is_empty() => InvalidFieldSnafu {
                field: "source.image",
                message: "image is required for image source",
            }
            .fail(),
            ApplicationSource::Git { url, .. } if url.trim().is_empty() => InvalidFieldSnafu {
                field: "source.url",
                message: "git url is required for git source",
            }
            .fail(),
            _ => Ok(()),
        }
    }

    /// Container image to run, if one is available yet.
    pub fn image(&self) -> Option<&str> {
        match self {
            ApplicationSource::Image { image } => Some(image),
            ApplicationSource::Git { image, .. } => image.as_deref(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequests {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub size: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    pub mount_path: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    #[serde(default)]
    pub create_ingress: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<String>,

    #[serde(default)]
    pub tls_enabled: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationConfig {
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    #[serde(default = "default_port")]
    pub port: i32,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env_vars: BTreeMap<String, String>,

    #[serde(default)]
    pub resources: ResourceRequests,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,
}

fn default_replicas() -> i32 {
    1
}

fn default_port() -> i32 {
    DEFAULT_PORT
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            port: default_port(),
            env_vars: BTreeMap::new(),
            resources: ResourceRequests::default(),
            node_selector: BTreeMap::new(),
            storage: None,
            network: None,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CronSpec {
    pub schedule: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Application whose image and configuration the job runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_app_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Display, EnumString, EnumIter, PartialEq, Eq)]
pub enum FunctionRuntime {
    #[serde(rename = "python3.9")]
    #[strum(to_string = "python3.9")]
    Python39,

    #[serde(rename = "python3.10")]
    #[strum(to_string = "python3.10")]
    Python310,

    #[serde(rename = "python3.11")]
    #[strum(to_string = "python3.11")]
    Python311,

    #[serde(rename = "nodejs16")]
    #[strum(to_string = "nodejs16")]
    Node16,

    #[serde(rename = "nodejs18")]
    #[strum(to_string = "nodejs18")]
    Node18,

    #[serde(rename = "go1.20")]
    #[strum(to_string = "go1.20")]
    Go120,

    #[serde(rename = "go1.21")]
    #[strum(to_string = "go1.21")]
    Go121,
}

#[derive(
    Default, Deserialize, Serialize, Clone, Copy, Debug, Display, EnumString, PartialEq, Eq,
)]
#[serde(rename_all = "lowercase")]
pub enum FunctionTriggerType {
    #[default]
    #[strum(to_string = "http")]
    Http,

    #[strum(to_string = "event")]
    Event,

    #[strum(to_string = "schedule")]
    Schedule,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub runtime: FunctionRuntime,
    pub handler: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u32>,

    #[serde(default)]
    pub trigger_type: FunctionTriggerType,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub trigger_config: serde_json::Map<String, serde_json::Value>,
}

/// Shape-specific part of an application.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Workload {
    Stateless,
    Stateful,
    #[serde(rename = "cronjob")]
    CronJob(CronSpec),
    Function(FunctionSpec),
}

impl Workload {
    pub fn app_type(&self) -> ApplicationType {
        match self {
            Workload::Stateless => ApplicationType::Stateless,
            Workload::Stateful => ApplicationType::Stateful,
            Workload::CronJob(_) => ApplicationType::CronJob,
            Workload::Function(_) => ApplicationType::Function,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Workload::CronJob(cron) => {
                if cron.schedule.trim().is_empty() {
                    return InvalidFieldSnafu {
                        field: "schedule",
                        message: "cron schedule is required for cronjob applications",
                    }
                    .fail();
                }
                if cron.command.is_empty() && cron.template_app_id.is_none() {
                    return InvalidFieldSnafu {
                        field: "command",
                        message: "either a command or a template application is required",
                    }
                    .fail();
                }
                Ok(())
            }
            Workload::Function(function) if function.handler.trim().is_empty() => {
                InvalidFieldSnafu {
                    field: "handler",
                    message: "function handler is required",
                }
                .fail()
            }
            _ => Ok(()),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    #[strum(to_string = "service")]
    Service,

    #[strum(to_string = "ingress")]
    Ingress,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    #[serde(rename = "type")]
    pub kind: EndpointKind,
    pub url: String,
}

/// A workload deployed into a project's namespace.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub workspace_id: String,
    pub project_id: String,
    pub name: String,
    pub status: ApplicationStatus,
    pub source: ApplicationSource,
    pub workload: Workload,

    #[serde(default)]
    pub config: ApplicationConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    pub project_id: String,
    pub name: String,
    pub source: ApplicationSource,
    pub workload: Workload,

    #[serde(default)]
    pub config: ApplicationConfig,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApplicationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Replaces the tag of an image source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_vars: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequests>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,
}

/// Resource usage of one pod, CPU in cores and memory in MB.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodUsage {
    pub pod_name: String,
    pub cpu_cores: f64,
    pub memory_mb: f64,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateUsage {
    pub total_cpu: f64,
    pub total_memory: f64,
    pub average_cpu: f64,
    pub average_memory: f64,
}

impl AggregateUsage {
    pub fn from_pods(pods: &[PodUsage]) -> Self {
        if pods.is_empty() {
            return Self::default();
        }
        let total_cpu: f64 = pods.iter().map(|p| p.cpu_cores).sum();
        let total_memory: f64 = pods.iter().map(|p| p.memory_mb).sum();
        let n = pods.len() as f64;
        Self {
            total_cpu,
            total_memory,
            average_cpu: total_cpu / n,
            average_memory: total_memory / n,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationMetrics {
    pub application_id: String,
    pub timestamp: DateTime<Utc>,
    pub pods: Vec<PodUsage>,
    pub aggregate: AggregateUsage,
}

impl Application {
    pub fn new(id: String, workspace_id: &str, request: CreateApplicationRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            workspace_id: workspace_id.to_owned(),
            project_id: request.project_id,
            name: request.name,
            status: ApplicationStatus::Pending,
            source: request.source,
            workload: request.workload,
            config: request.config,
            endpoints: Vec::new(),
            metadata: request.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn app_type(&self) -> ApplicationType {
        self.workload.app_type()
    }

    /// Checks name, source and workload before anything is persisted.
    pub fn validate(&self) -> Result<(), Error> {
        crate::types::project::validate_project_name(&self.name).map_err(|_| {
            Error::InvalidField {
                field: "name".to_owned(),
                message: format!("'{}' is not a valid DNS label", self.name),
            }
        })?;
        self.source.validate()?;
        self.workload.validate()?;
        if self.config.replicas < 0 {
            return InvalidFieldSnafu {
                field: "replicas",
                message: "replicas must be non-negative",
            }
            .fail();
        }
        Ok(())
    }

    /// Moves the application to `to`. Any pair outside the transition table
    /// is rejected.
    pub fn transition(&mut self, to: ApplicationStatus) -> Result<(), Error> {
        if !self.status.can_transition(to) {
            return IllegalTransitionSnafu {
                entity: "application",
                from: self.status.to_string(),
                to: to.to_string(),
            }
            .fail();
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(LABEL_APP.to_owned(), self.name.clone())])
    }

    pub fn label_selector(&self) -> String {
        format!("{LABEL_APP}={}", self.name)
    }

    /// Replicas actually requested from the cluster. Stateful applications
    /// run a single replica.
    pub fn effective_replicas(&self) -> i32 {
        match self.workload {
            Workload::Stateful => self.config.replicas.clamp(0, 1),
            _ => self.config.replicas.max(0),
        }
    }

    pub fn apply_update(&mut self, update: UpdateApplicationRequest) {
        if let Some(replicas) = update.replicas {
            self.config.replicas = replicas;
        }
        if let Some(version) = update.image_version
            && let ApplicationSource::Image { image } = &mut self.source
        {
            let repository = match image.rsplit_once(':') {
                Some((repo, tag)) if !tag.contains('/') => repo.to_owned(),
                _ => image.clone(),
            };
            *image = format!("{repository}:{version}");
        }
        if let Some(env) = update.env_vars {
            self.config.env_vars = env;
        }
        if let Some(resources) = update.resources {
            self.config.resources = resources;
        }
        if let Some(network) = update.network {
            self.config.network = Some(network);
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    const TABLE: &[(ApplicationStatus, &[ApplicationStatus])] = {
        use ApplicationStatus::*;
        &[
            (Pending, &[Deploying, Error]),
            (Deploying, &[Running, Error]),
            (Running, &[Updating, Stopping, Error]),
            (Updating, &[Running, Error]),
            (Stopping, &[Stopped, Error]),
            (Stopped, &[Deploying, Deleting]),
            (Error, &[Deploying, Deleting]),
            (Deleting, &[]),
        ]
    };

    // Test: every (from, to) pair agrees with the transition table
    #[test]
    fn test_can_transition_exhaustive() {
        assert_eq!(TABLE.len(), ApplicationStatus::iter().count());

        for from in ApplicationStatus::iter() {
            let allowed = TABLE
                .iter()
                .find(|(f, _)| *f == from)
                .map(|(_, to)| *to)
                .expect("every status has a table row");
            for to in ApplicationStatus::iter() {
                assert_eq!(
                    from.can_transition(to),
                    allowed.contains(&to),
                    "{from} -> {to}"
                );
            }
        }
    }

    // Test: unknown source statuses always reject
    #[test]
    fn test_can_transition_unknown_status() {
        assert!(ApplicationStatus::can_transition_str("pending", "deploying"));
        assert!(!ApplicationStatus::can_transition_str("paused", "running"));
        assert!(!ApplicationStatus::can_transition_str("running", "paused"));
        assert!(!ApplicationStatus::can_transition_str("", ""));
    }

    // Test: illegal transitions fail loudly and leave the status untouched
    #[test]
    fn test_transition_rejects_illegal() {
        let mut app = crate::tests::create_test_application("app-1", Workload::Stateless);
        app.transition(ApplicationStatus::Deploying)
            .expect("pending -> deploying");

        let err = app
            .transition(ApplicationStatus::Deleting)
            .expect_err("deploying -> deleting is illegal");
        assert!(matches!(err, Error::IllegalTransition { entity: "application", .. }));
        assert_eq!(app.status, ApplicationStatus::Deploying);
    }

    // Test: source validation
    #[test]
    fn test_source_validation() {
        assert!(
            ApplicationSource::Image {
                image: String::new()
            }
            .validate()
            .is_err()
        );
        assert!(
            ApplicationSource::Git {
                url: " ".to_string(),
                git_ref: None,
                buildpack: None,
                image: None,
            }
            .validate()
            .is_err()
        );
        assert!(
            ApplicationSource::Git {
                url: "https://example.com/repo.git".to_string(),
                git_ref: Some("main".to_string()),
                buildpack: None,
                image: None,
            }
            .validate()
            .is_ok()
        );
    }

    // Test: cron workloads need a schedule and something to run
    #[test]
    fn test_cron_validation() {
        let missing_schedule = Workload::CronJob(CronSpec {
            command: vec!["echo".to_string()],
            ..Default::default()
        });
        assert!(missing_schedule.validate().is_err());

        let missing_command = Workload::CronJob(CronSpec {
            schedule: "*/5 * * * *".to_string(),
            ..Default::default()
        });
        assert!(missing_command.validate().is_err());

        let from_template = Workload::CronJob(CronSpec {
            schedule: "*/5 * * * *".to_string(),
            template_app_id: Some("app-1".to_string()),
            ..Default::default()
        });
        assert!(from_template.validate().is_ok());
    }

    // Test: type and source tags deserialize from their enumerated sets only
    #[test]
    fn test_enumerated_tags() {
        let workload: Workload =
            serde_json::from_str(r#"{"type":"function","runtime":"go1.21","handler":"main"}"#)
                .expect("parse function workload");
        assert_eq!(workload.app_type(), ApplicationType::Function);

        assert!(serde_json::from_str::<Workload>(r#"{"type":"daemon"}"#).is_err());
        assert!(serde_json::from_str::<ApplicationSource>(r#"{"type":"zip"}"#).is_err());
        assert!(
            serde_json::from_str::<Workload>(
                r#"{"type":"function","runtime":"ruby3","handler":"main"}"#
            )
            .is_err()
        );
        assert_eq!(FunctionRuntime::iter().count(), 7);
    }

    // Test: stateful applications are clamped to one replica
    #[test]
    fn test_effective_replicas() {
        let mut app = crate::tests::create_test_application("app-1", Workload::Stateful);
        app.config.replicas = 3;
        assert_eq!(app.effective_replicas(), 1);

        app.workload = Workload::Stateless;
        assert_eq!(app.effective_replicas(), 3);
    }

    // Test: image_version replaces only the tag
    #[test]
    fn test_apply_update_image_version() {
        let mut app = crate::tests::create_test_application("app-1", Workload::Stateless);
        app.source = ApplicationSource::Image {
            image: "registry:5000/team/api:1.0".to_string(),
        };

        app.apply_update(UpdateApplicationRequest {
            image_version: Some("1.1".to_string()),
            replicas: Some(4),
            ..Default::default()
        });

        assert_eq!(app.source.image(), Some("registry:5000/team/api:1.1"));
        assert_eq!(app.config.replicas, 4);

        app.source = ApplicationSource::Image {
            image: "registry:5000/team/api".to_string(),
        };
        app.apply_update(UpdateApplicationRequest {
            image_version: Some("2.0".to_string()),
            ..Default::default()
        });
        assert_eq!(app.source.image(), Some("registry:5000/team/api:2.0"));
    }

    #[test]
    fn test_aggregate_usage() {
        let pods = vec![
            PodUsage {
                pod_name: "a".to_string(),
                cpu_cores: 0.25,
                memory_mb: 128.0,
            },
            PodUsage {
                pod_name: "b".to_string(),
                cpu_cores: 0.75,
                memory_mb: 256.0,
            },
        ];
        let agg = AggregateUsage::from_pods(&pods);
        assert_eq!(agg.total_cpu, 1.0);
        assert_eq!(agg.total_memory, 384.0);
        assert_eq!(agg.average_cpu, 0.5);
        assert_eq!(agg.average_memory, 192.0);
        assert_eq!(AggregateUsage::from_pods(&[]), AggregateUsage::default());
    }
}
