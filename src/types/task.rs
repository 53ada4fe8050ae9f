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

use crate::types::error::{Error, IllegalTransitionSnafu, ProgressRegressionSnafu, TaskTerminalSnafu};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, Display, EnumString, EnumIter, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[strum(to_string = "create")]
    Create,

    #[strum(to_string = "update")]
    Update,

    #[strum(to_string = "delete")]
    Delete,

    #[strum(to_string = "backup")]
    Backup,

    #[strum(to_string = "restore")]
    Restore,
}

#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, Display, EnumString, EnumIter, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[strum(to_string = "pending")]
    Pending,

    #[strum(to_string = "running")]
    Running,

    #[strum(to_string = "completed")]
    Completed,

    #[strum(to_string = "failed")]
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Payload carried by a task. Known keys are typed; the rest is kept as is.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct TaskPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_version: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A long-running operation against a workspace.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub workspace_id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub progress: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub payload: TaskPayload,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: String, workspace_id: &str, task_type: TaskType, payload: TaskPayload) -> Self {
        let now = Utc::now();
        Self {
            id,
            workspace_id: workspace_id.to_owned(),
            task_type,
            status: TaskStatus::Pending,
            progress: 0,
            message: None,
            error: None,
            payload,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// `pending -> running`.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.status != TaskStatus::Pending {
            return IllegalTransitionSnafu {
                entity: "task",
                from: self.status.to_string(),
                to: TaskStatus::Running.to_string(),
            }
            .fail();
        }
        let now = Utc::now();
        self.status = TaskStatus::Running;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `running -> pending` so an interrupted task can be claimed again.
    /// Progress is kept.
    pub fn requeue(&mut self) -> Result<(), Error> {
        if self.status != TaskStatus::Running {
            return IllegalTransitionSnafu {
                entity: "task",
                from: self.status.to_string(),
                to: TaskStatus::Pending.to_string(),
            }
            .fail();
        }
        self.status = TaskStatus::Pending;
        self.started_at = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records progress. Progress never decreases and is capped at 100.
    pub fn advance(&mut self, progress: u8, message: Option<String>) -> Result<(), Error> {
        self.ensure_open()?;
        let progress = progress.min(100);
        if progress < self.progress {
            return ProgressRegressionSnafu {
                task_id: self.id.clone(),
                current: self.progress,
                requested: progress,
            }
            .fail();
        }
        self.progress = progress;
        if message.is_some() {
            self.message = message;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self, message: Option<String>) -> Result<(), Error> {
        self.finish(TaskStatus::Completed)?;
        self.progress = 100;
        if message.is_some() {
            self.message = message;
        }
        Ok(())
    }

    pub fn fail(&mut self, error: String) -> Result<(), Error> {
        self.finish(TaskStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    fn finish(&mut self, status: TaskStatus) -> Result<(), Error> {
        self.ensure_open()?;
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.status.is_terminal() {
            return TaskTerminalSnafu {
                task_id: self.id.clone(),
                status: self.status.to_string(),
            }
            .fail();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(
            "task-1".to_string(),
            "ws-1",
            TaskType::Create,
            TaskPayload {
                workspace_id: Some("ws-1".to_string()),
                ..Default::default()
            },
        )
    }

    // Test: progress is monotonic while running
    #[test]
    fn test_progress_monotonic() {
        let mut t = task();
        t.start().expect("pending task starts");

        t.advance(20, Some("provisioning".to_string()))
            .expect("forward progress");
        t.advance(20, None).expect("same progress is allowed");
        assert_eq!(t.message.as_deref(), Some("provisioning"));

        let err = t.advance(10, None).expect_err("progress must not regress");
        assert!(matches!(err, Error::ProgressRegression { current: 20, requested: 10, .. }));
        assert_eq!(t.progress, 20);

        t.advance(250, None).expect("progress is capped");
        assert_eq!(t.progress, 100);
    }

    // Test: completed_at is set exactly once
    #[test]
    fn test_terminal_exactly_once() {
        let mut t = task();
        t.start().expect("start");
        t.complete(None).expect("complete");

        let completed_at = t.completed_at;
        assert!(completed_at.is_some());
        assert_eq!(t.progress, 100);
        assert_eq!(t.status, TaskStatus::Completed);

        assert!(t.fail("late failure".to_string()).is_err());
        assert!(t.complete(None).is_err());
        assert!(t.advance(100, None).is_err());
        assert_eq!(t.completed_at, completed_at);
        assert_eq!(t.status, TaskStatus::Completed);
        assert!(t.error.is_none());
    }

    // Test: failure records the error and keeps the progress reached
    #[test]
    fn test_fail_keeps_progress() {
        let mut t = task();
        t.start().expect("start");
        t.advance(60, None).expect("advance");
        t.fail("timed out".to_string()).expect("fail");

        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.progress, 60);
        assert_eq!(t.error.as_deref(), Some("timed out"));
        assert!(t.completed_at.is_some());
    }

    // Test: only a running task goes back to pending, keeping its progress
    #[test]
    fn test_requeue_only_from_running() {
        let mut t = task();
        assert!(t.requeue().is_err());

        t.start().expect("start");
        t.advance(20, None).expect("advance");
        t.requeue().expect("requeue");
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.progress, 20);
        assert!(t.started_at.is_none());
        t.start().expect("start again");
    }

    // Test: a task can only be started from pending
    #[test]
    fn test_start_only_from_pending() {
        let mut t = task();
        t.start().expect("first start");
        let err = t.start().expect_err("second start");
        assert!(matches!(err, Error::IllegalTransition { .. }));
    }

    #[test]
    fn test_payload_serde() {
        let json = r#"{"workspace_id":"ws-1","backup_id":"b-7","requested_by":"u-1"}"#;
        let payload: TaskPayload = serde_json::from_str(json).expect("parse payload");

        assert_eq!(payload.workspace_id.as_deref(), Some("ws-1"));
        assert_eq!(payload.backup_id.as_deref(), Some("b-7"));
        assert_eq!(
            payload.extra.get("requested_by"),
            Some(&serde_json::json!("u-1"))
        );
    }
}
