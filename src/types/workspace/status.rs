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

//! Workspace status vocabularies and the translation between them.
//!
//! The orchestrator tracks a workspace with [`WorkspaceStatus`]. The virtual
//! cluster control plane reports [`ClusterPhase`]. Both directions of the
//! mapping are explicit match tables so a new variant on either side fails to
//! compile until it is mapped.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Internal workspace lifecycle status.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Display, EnumIter, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    #[strum(to_string = "creating")]
    Creating,

    #[strum(to_string = "active")]
    Active,

    #[strum(to_string = "updating")]
    Updating,

    #[strum(to_string = "stopping")]
    Stopping,

    #[strum(to_string = "stopped")]
    Stopped,

    #[strum(to_string = "starting")]
    Starting,

    #[strum(to_string = "deleting")]
    Deleting,

    #[strum(to_string = "error")]
    Error,

    #[strum(to_string = "unknown")]
    Unknown,
}

/// Status vocabulary of the virtual cluster control plane.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Display, EnumIter, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterPhase {
    #[strum(to_string = "PENDING_CREATION")]
    PendingCreation,

    #[strum(to_string = "CONFIGURING_HNC")]
    ConfiguringHnc,

    #[strum(to_string = "RUNNING")]
    Running,

    #[strum(to_string = "UPDATING_PLAN")]
    UpdatingPlan,

    #[strum(to_string = "UPDATING_NODES")]
    UpdatingNodes,

    #[strum(to_string = "DELETING")]
    Deleting,

    #[strum(to_string = "ERROR")]
    Error,

    #[strum(to_string = "STOPPED")]
    Stopped,

    #[strum(to_string = "STARTING")]
    Starting,

    #[strum(to_string = "STOPPING")]
    Stopping,

    #[strum(to_string = "UNKNOWN")]
    Unknown,
}

impl WorkspaceStatus {
    /// Parses a stored status string, accepting the legacy aliases
    /// `provisioning`, `running` and `failed`. Anything unrecognised is
    /// `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value {
            "creating" | "provisioning" => WorkspaceStatus::Creating,
            "active" | "running" => WorkspaceStatus::Active,
            "updating" => WorkspaceStatus::Updating,
            "stopping" => WorkspaceStatus::Stopping,
            "stopped" => WorkspaceStatus::Stopped,
            "starting" => WorkspaceStatus::Starting,
            "deleting" => WorkspaceStatus::Deleting,
            "error" | "failed" => WorkspaceStatus::Error,
            _ => WorkspaceStatus::Unknown,
        }
    }

    pub fn to_external(self) -> ClusterPhase {
        match self {
            WorkspaceStatus::Creating => ClusterPhase::PendingCreation,
            WorkspaceStatus::Active => ClusterPhase::Running,
            WorkspaceStatus::Updating => ClusterPhase::UpdatingPlan,
            WorkspaceStatus::Stopping => ClusterPhase::Stopping,
            WorkspaceStatus::Stopped => ClusterPhase::Stopped,
            WorkspaceStatus::Starting => ClusterPhase::Starting,
            WorkspaceStatus::Deleting => ClusterPhase::Deleting,
            WorkspaceStatus::Error => ClusterPhase::Error,
            WorkspaceStatus::Unknown => ClusterPhase::Unknown,
        }
    }

    /// Workspace lifecycle table. `deleting` may be re-entered from `deleting`
    /// and `error` so a failed teardown can be retried.
    pub fn can_transition(self, to: WorkspaceStatus) -> bool {
        use WorkspaceStatus::*;

        match (self, to) {
            (Creating, Active) => true,
            (Active, Updating | Stopping | Deleting) => true,
            (Updating, Active) => true,
            (Stopping, Stopped) => true,
            (Stopped, Starting | Deleting) => true,
            (Starting, Active) => true,
            (Deleting, Deleting) => true,
            (Error, Deleting) => true,
            (Creating | Active | Updating | Stopping | Stopped | Starting | Unknown, Error) => true,
            _ => false,
        }
    }
}

impl ClusterPhase {
    /// Parses the external vocabulary. Anything unrecognised is `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value {
            "PENDING_CREATION" => ClusterPhase::PendingCreation,
            "CONFIGURING_HNC" => ClusterPhase::ConfiguringHnc,
            "RUNNING" => ClusterPhase::Running,
            "UPDATING_PLAN" => ClusterPhase::UpdatingPlan,
            "UPDATING_NODES" => ClusterPhase::UpdatingNodes,
            "DELETING" => ClusterPhase::Deleting,
            "ERROR" => ClusterPhase::Error,
            "STOPPED" => ClusterPhase::Stopped,
            "STARTING" => ClusterPhase::Starting,
            "STOPPING" => ClusterPhase::Stopping,
            _ => ClusterPhase::Unknown,
        }
    }

    pub fn to_internal(self) -> WorkspaceStatus {
        match self {
            ClusterPhase::PendingCreation | ClusterPhase::ConfiguringHnc => {
                WorkspaceStatus::Creating
            }
            ClusterPhase::Running => WorkspaceStatus::Active,
            ClusterPhase::UpdatingPlan | ClusterPhase::UpdatingNodes => WorkspaceStatus::Updating,
            ClusterPhase::Deleting => WorkspaceStatus::Deleting,
            ClusterPhase::Error => WorkspaceStatus::Error,
            ClusterPhase::Stopped => WorkspaceStatus::Stopped,
            ClusterPhase::Starting => WorkspaceStatus::Starting,
            ClusterPhase::Stopping => WorkspaceStatus::Stopping,
            ClusterPhase::Unknown => WorkspaceStatus::Unknown,
        }
    }
}

impl From<ClusterPhase> for WorkspaceStatus {
    fn from(phase: ClusterPhase) -> Self {
        phase.to_internal()
    }
}

impl From<WorkspaceStatus> for ClusterPhase {
    fn from(status: WorkspaceStatus) -> Self {
        status.to_external()
    }
}
