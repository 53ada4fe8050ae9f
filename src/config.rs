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

use crate::workspace::{ProvisioningOptions, WaitPolicy};
use clap::Args;
use std::time::Duration;

/// Runtime settings. Every flag can also be set through its environment
/// variable.
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Host namespace holding the VirtualCluster objects
    #[arg(long, env = "KAAS_VCLUSTER_NAMESPACE", default_value = "hexabase-vclusters")]
    pub vcluster_namespace: String,

    /// OIDC issuer configured inside each workspace
    #[arg(long, env = "KAAS_OIDC_ISSUER_URL", default_value = "https://api.hexabase-kaas.io")]
    pub oidc_issuer_url: String,

    /// How long to wait for a virtual cluster to become ready or disappear
    #[arg(long, env = "KAAS_READY_TIMEOUT_SECS", default_value_t = 300)]
    pub ready_timeout_secs: u64,

    #[arg(long, env = "KAAS_POLL_INTERVAL_SECS", default_value_t = 5)]
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            timeout: Duration::from_secs(self.ready_timeout_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
        }
    }

    pub fn provisioning_options(&self) -> ProvisioningOptions {
        ProvisioningOptions {
            vcluster_namespace: self.vcluster_namespace.clone(),
            oidc_issuer_url: self.oidc_issuer_url.clone(),
            wait: self.wait_policy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        config: Config,
    }

    // Test: defaults match the workspace defaults
    #[test]
    fn test_defaults() {
        let config = Cli::parse_from(["kaas"]).config;

        assert_eq!(config.wait_policy(), WaitPolicy::default());
        let options = config.provisioning_options();
        assert_eq!(options.vcluster_namespace, "hexabase-vclusters");
        assert_eq!(options.oidc_issuer_url, "https://api.hexabase-kaas.io");
    }

    // Test: flags override defaults
    #[test]
    fn test_flags() {
        let config = Cli::parse_from([
            "kaas",
            "--ready-timeout-secs",
            "60",
            "--poll-interval-secs",
            "0",
            "--vcluster-namespace",
            "vclusters",
        ])
        .config;

        let policy = config.wait_policy();
        assert_eq!(policy.timeout, Duration::from_secs(60));
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
        assert_eq!(config.provisioning_options().vcluster_namespace, "vclusters");
    }
}
