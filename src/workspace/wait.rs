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

use super::{CancelledSnafu, Error, TimeoutSnafu};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Deadline and cadence of a readiness or deletion wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Runs `probe` once per poll interval until it yields a value.
///
/// The first probe runs immediately. Between probes the task is parked on
/// the next tick, the deadline and `cancel` at once. Probe errors end the
/// wait.
pub(crate) async fn poll_until<T, F, Fut>(
    policy: &WaitPolicy,
    cancel: &CancellationToken,
    workspace_id: &str,
    operation: &'static str,
    mut probe: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, Error>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut ticker = tokio::time::interval(policy.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                return CancelledSnafu { workspace_id, operation }.fail();
            }
            _ = tokio::time::sleep_until(deadline) => {
                return TimeoutSnafu {
                    workspace_id,
                    operation,
                    timeout: policy.timeout,
                }
                .fail();
            }
            _ = ticker.tick() => {
                if let Some(value) = probe().await? {
                    return Ok(value);
                }
            }
        }
    }
}
