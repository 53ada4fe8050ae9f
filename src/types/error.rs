// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use snafu::Snafu;
use strum::Display;
use tracing::warn;

/// Validation failures raised by the domain models. These are always fatal
/// and never retried automatically.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("object has no namespace associated"))]
    NoNamespace,

    #[snafu(display("invalid project name '{}': {}", name, reason))]
    InvalidProjectName { name: String, reason: String },

    #[snafu(display("invalid {} '{}'", kind, value))]
    InvalidEnumValue { kind: &'static str, value: String },

    #[snafu(display("invalid {}: {}", field, message))]
    InvalidField { field: String, message: String },

    #[snafu(display("illegal {} status transition: {} -> {}", entity, from, to))]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[snafu(display("cannot modify immutable field '{}' in {}: {}", field, name, message))]
    ImmutableFieldModified {
        name: String,
        field: String,
        message: String,
    },

    #[snafu(display("task {} progress cannot go from {} to {}", task_id, current, requested))]
    ProgressRegression {
        task_id: String,
        current: u8,
        requested: u8,
    },

    #[snafu(display("task {} is already {}", task_id, status))]
    TaskTerminal { task_id: String, status: String },

    #[snafu(display("serde_json error: {}", source))]
    SerdeJson { source: serde_json::Error },
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::SerdeJson { source }
    }
}

/// How the caller treats the failure of a step.
///
/// `Fatal` steps abort the enclosing operation. `Advisory` steps are side
/// effects on the eventually-consistent cluster projection: their failure is
/// logged and the operation proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Severity {
    #[strum(to_string = "fatal")]
    Fatal,

    #[strum(to_string = "advisory")]
    Advisory,
}

impl Severity {
    /// Applies the classification to the outcome of `action` on `subject`.
    ///
    /// Returns `Ok(Some(value))` on success, `Ok(None)` for a swallowed
    /// advisory failure, and `Err` only for fatal failures.
    pub fn handle<T, E>(
        self,
        action: &str,
        subject: &str,
        result: Result<T, E>,
    ) -> Result<Option<T>, E>
    where
        E: std::fmt::Display,
    {
        match (self, result) {
            (_, Ok(value)) => Ok(Some(value)),
            (Severity::Fatal, Err(e)) => Err(e),
            (Severity::Advisory, Err(e)) => {
                warn!("{} for {} failed, continuing: {}", action, subject, e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test: fatal failures propagate unchanged
    #[test]
    fn test_fatal_propagates() {
        let result: Result<(), String> = Err("boom".to_string());
        let handled = Severity::Fatal.handle("create namespace", "proj-1", result);
        assert_eq!(handled, Err("boom".to_string()));
    }

    // Test: advisory failures are swallowed
    #[test]
    fn test_advisory_swallows() {
        let result: Result<(), String> = Err("boom".to_string());
        let handled = Severity::Advisory.handle("create namespace", "proj-1", result);
        assert_eq!(handled, Ok(None));
    }

    // Test: success is reported the same way for both classes
    #[test]
    fn test_success_passes_through() {
        for severity in [Severity::Fatal, Severity::Advisory] {
            let handled = severity.handle::<_, String>("apply quota", "ws-1", Ok(7));
            assert_eq!(handled, Ok(Some(7)), "{severity} should keep the value");
        }
    }
}
