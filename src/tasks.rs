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

use crate::store::{self, Store};
use crate::types;
use crate::types::task::{Task, TaskPayload, TaskType};
use chrono::{DateTime, Utc};
use snafu::{ResultExt, Snafu};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to {} task {}: {}", action, task_id, source))]
    Store {
        action: &'static str,
        task_id: String,
        source: store::Error,
    },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Store { source, .. } if source.is_not_found())
    }
}

/// Persists long-running operations and their progress.
///
/// Every mutation reloads the row, applies the change through [`Task`] so its
/// invariants hold, and writes it back.
#[derive(Clone)]
pub struct TaskTracker {
    store: Arc<dyn Store>,
}

impl TaskTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        workspace_id: &str,
        task_type: TaskType,
        payload: TaskPayload,
    ) -> Result<Task, Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let task = Task::new(id.clone(), workspace_id, task_type, payload);
        let task = self
            .store
            .create_task(task)
            .await
            .context(StoreSnafu {
                action: "create",
                task_id: id,
            })?;
        info!("created {} task {} for workspace {}", task.task_type, task.id, workspace_id);
        Ok(task)
    }

    pub async fn get(&self, id: &str) -> Result<Task, Error> {
        self.store.get_task(id).await.context(StoreSnafu {
            action: "get",
            task_id: id,
        })
    }

    /// `pending -> running`, or `None` when someone else already claimed it.
    pub async fn claim(&self, id: &str) -> Result<Option<Task>, Error> {
        let claimed = self.store.claim_task(id).await.context(StoreSnafu {
            action: "claim",
            task_id: id,
        })?;
        if claimed.is_none() {
            debug!("task {} already claimed", id);
        }
        Ok(claimed)
    }

    pub async fn advance(&self, id: &str, progress: u8, message: &str) -> Result<Task, Error> {
        self.mutate(id, "advance", |task| {
            task.advance(progress, Some(message.to_owned()))
        })
        .await
    }

    pub async fn complete(&self, id: &str, message: &str) -> Result<Task, Error> {
        let task = self
            .mutate(id, "complete", |task| task.complete(Some(message.to_owned())))
            .await?;
        info!("task {} completed", id);
        Ok(task)
    }

    pub async fn fail(&self, id: &str, error: &str) -> Result<Task, Error> {
        let task = self
            .mutate(id, "fail", |task| task.fail(error.to_owned()))
            .await?;
        info!("task {} failed: {}", id, error);
        Ok(task)
    }

    /// Hands a running task back to the queue after its worker stopped early.
    pub async fn requeue(&self, id: &str) -> Result<Task, Error> {
        let task = self.mutate(id, "requeue", Task::requeue).await?;
        info!("task {} returned to the queue at {}%", id, task.progress);
        Ok(task)
    }

    /// Pending tasks oldest first. Callers must [`claim`](Self::claim) before
    /// working on one.
    pub async fn pending(&self, task_type: Option<TaskType>, limit: usize) -> Result<Vec<Task>, Error> {
        self.store
            .pending_tasks(task_type, limit)
            .await
            .context(StoreSnafu {
                action: "list pending",
                task_id: "*",
            })
    }

    pub async fn list_for_workspace(&self, workspace_id: &str) -> Result<Vec<Task>, Error> {
        self.store
            .list_tasks(workspace_id)
            .await
            .context(StoreSnafu {
                action: "list",
                task_id: "*",
            })
    }

    /// Purges terminal tasks that completed before `before`.
    pub async fn cleanup_expired(&self, before: DateTime<Utc>) -> Result<usize, Error> {
        let purged = self.store.purge_tasks(before).await.context(StoreSnafu {
            action: "purge",
            task_id: "*",
        })?;
        if purged > 0 {
            info!("purged {} expired tasks", purged);
        }
        Ok(purged)
    }

    async fn mutate<F>(&self, id: &str, action: &'static str, f: F) -> Result<Task, Error>
    where
        F: FnOnce(&mut Task) -> Result<(), types::error::Error>,
    {
        let mut task = self.get(id).await?;
        f(&mut task)?;
        self.store
            .update_task(task)
            .await
            .context(StoreSnafu { action, task_id: id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::task::TaskStatus;
    use chrono::Duration;

    fn tracker() -> TaskTracker {
        TaskTracker::new(Arc::new(MemoryStore::new()))
    }

    // Test: full happy path with monotonic progress
    #[tokio::test]
    async fn test_task_lifecycle() {
        let tracker = tracker();
        let task = tracker
            .create("ws-1", TaskType::Create, TaskPayload::default())
            .await
            .expect("create");
        assert_eq!(task.status, TaskStatus::Pending);

        tracker.claim(&task.id).await.expect("claim").expect("won claim");
        tracker.advance(&task.id, 20, "provisioning").await.expect("20");
        tracker.advance(&task.id, 60, "ready").await.expect("60");

        let err = tracker
            .advance(&task.id, 40, "backwards")
            .await
            .expect_err("progress cannot regress");
        assert!(matches!(
            err,
            Error::Types {
                source: types::error::Error::ProgressRegression { .. }
            }
        ));

        let done = tracker.complete(&task.id, "done").await.expect("complete");
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, 100);
        let completed_at = done.completed_at.expect("completed_at set");

        assert!(tracker.fail(&task.id, "late").await.is_err());
        let reloaded = tracker.get(&task.id).await.expect("get");
        assert_eq!(reloaded.completed_at, Some(completed_at));
        assert_eq!(reloaded.status, TaskStatus::Completed);
    }

    // Test: second claim of the same task loses
    #[tokio::test]
    async fn test_double_claim() {
        let tracker = tracker();
        let task = tracker
            .create("ws-1", TaskType::Delete, TaskPayload::default())
            .await
            .expect("create");

        assert!(tracker.claim(&task.id).await.expect("claim").is_some());
        assert!(tracker.claim(&task.id).await.expect("claim").is_none());
        assert!(tracker.pending(None, 10).await.expect("pending").is_empty());
    }

    // Test: a requeued task is pending again and can be claimed once more
    #[tokio::test]
    async fn test_requeue() {
        let tracker = tracker();
        let task = tracker
            .create("ws-1", TaskType::Create, TaskPayload::default())
            .await
            .expect("create");
        assert!(tracker.requeue(&task.id).await.is_err());

        tracker.claim(&task.id).await.expect("claim").expect("won claim");
        tracker.advance(&task.id, 20, "provisioning").await.expect("20");
        let requeued = tracker.requeue(&task.id).await.expect("requeue");
        assert_eq!(requeued.status, TaskStatus::Pending);
        assert_eq!(requeued.progress, 20);

        assert_eq!(tracker.pending(None, 10).await.expect("pending").len(), 1);
        assert!(tracker.claim(&task.id).await.expect("claim").is_some());
    }

    // Test: missing tasks are reported as not found
    #[tokio::test]
    async fn test_missing_task() {
        let err = tracker().get("nope").await.expect_err("missing");
        assert!(err.is_not_found());
    }

    // Test: cleanup removes only expired terminal tasks
    #[tokio::test]
    async fn test_cleanup_expired() {
        let tracker = tracker();
        let task = tracker
            .create("ws-1", TaskType::Backup, TaskPayload::default())
            .await
            .expect("create");
        tracker.claim(&task.id).await.expect("claim");
        tracker.fail(&task.id, "boom").await.expect("fail");

        assert_eq!(
            tracker
                .cleanup_expired(Utc::now() - Duration::hours(1))
                .await
                .expect("cleanup"),
            0
        );
        assert_eq!(
            tracker
                .cleanup_expired(Utc::now() + Duration::hours(1))
                .await
                .expect("cleanup"),
            1
        );
        assert!(tracker.list_for_workspace("ws-1").await.expect("list").is_empty());
    }
}
