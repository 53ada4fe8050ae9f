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

use super::WorkspaceOrchestrator;
use crate::types::error::Severity;
use crate::types::task::{Task, TaskType};
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Task types this worker executes. Backup and restore stay pending for
/// external consumers.
const HANDLED: [TaskType; 3] = [TaskType::Create, TaskType::Update, TaskType::Delete];

#[derive(Clone, Copy, Debug)]
pub struct WorkerOptions {
    /// Tasks dispatched per round.
    pub batch_size: usize,

    /// Pause after a round that dispatched nothing.
    pub idle: Duration,

    /// Age after which terminal tasks and soft-deleted workspaces are purged.
    pub retention: chrono::Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            idle: Duration::from_secs(2),
            retention: chrono::Duration::days(7),
        }
    }
}

impl WorkspaceOrchestrator {
    /// Runs pending workspace tasks oldest-first until `cancel` fires.
    ///
    /// Each task is claimed before it runs, so several workers can share a
    /// store. Failures are recorded on the task and logged here.
    pub async fn run_worker(&self, options: WorkerOptions, cancel: CancellationToken) {
        info!("task worker started");

        while !cancel.is_cancelled() {
            let mut dispatched = 0;
            for task in self.next_batch(options.batch_size).await {
                if cancel.is_cancelled() {
                    break;
                }
                self.dispatch(&task, &cancel).await;
                dispatched += 1;
            }

            if dispatched == 0 {
                self.sweep(options.retention).await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(options.idle) => {}
                }
            }
        }

        info!("task worker stopped");
    }

    /// Oldest pending tasks across every handled type. Fetching per type
    /// keeps queued backups from crowding out work this worker can do.
    async fn next_batch(&self, batch_size: usize) -> Vec<Task> {
        let mut batch = Vec::new();
        for task_type in HANDLED {
            match self.tasks.pending(Some(task_type), batch_size).await {
                Ok(pending) => batch.extend(pending),
                Err(e) => warn!("failed to fetch pending {} tasks: {}", task_type, e),
            }
        }
        batch.sort_by_key(|t| t.created_at);
        batch.truncate(batch_size);
        batch
    }

    async fn dispatch(&self, task: &Task, cancel: &CancellationToken) {
        let result = match task.task_type {
            TaskType::Create => self.process_provisioning_task(&task.id, cancel).await,
            TaskType::Delete => self.process_deletion_task(&task.id, cancel).await,
            TaskType::Update => self.process_update_task(&task.id).await,
            TaskType::Backup | TaskType::Restore => return,
        };

        match result {
            Ok(Some(done)) => info!("{} task {} finished: {}", done.task_type, done.id, done.status),
            Ok(None) => debug!("task {} claimed by another worker", task.id),
            Err(e) => warn!("{} task {} failed: {}", task.task_type, task.id, e),
        }
    }

    async fn sweep(&self, retention: chrono::Duration) {
        let Some(before) = Utc::now().checked_sub_signed(retention) else {
            return;
        };

        let tasks = self.tasks.cleanup_expired(before).await;
        let _ = Severity::Advisory.handle("purge expired tasks", "*", tasks);

        let workspaces = self.cleanup_deleted_workspaces(before).await;
        let _ = Severity::Advisory.handle("purge deleted workspaces", "*", workspaces);
    }
}
