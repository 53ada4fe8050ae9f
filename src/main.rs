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

use clap::{Parser, Subcommand};
use kaas_orchestrator::config::Config;
use kaas_orchestrator::types::workspace::CreateWorkspaceRequest;
use kaas_orchestrator::{init_tracing, provision, quota, teardown};
use shadow_rs::shadow;
use tokio_util::sync::CancellationToken;
use tracing::info;

shadow!(build);

#[derive(Parser)]
#[command(name = "kaas-orchestrator")]
#[command(about = "Kubernetes-as-a-Service lifecycle orchestrator", long_about = None)]
#[command(version = build::PKG_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Output the workspace ResourceQuota of a plan in YAML
    Quota {
        /// starter, professional or enterprise. Unknown plans fall back to starter.
        #[arg(short, long, default_value = "starter")]
        plan: String,

        /// Optional output path. If not set, the output will be written to stdout.
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Provision a workspace and output its record, kubeconfig included, in YAML
    Provision {
        #[arg(long)]
        organization: String,

        #[arg(long)]
        name: String,

        #[arg(short, long, default_value = "starter")]
        plan: String,

        /// Optional output path. If not set, the output will be written to stdout.
        #[arg(short, long)]
        file: Option<String>,

        #[command(flatten)]
        config: Config,
    },

    /// Delete the virtual cluster of a workspace and wait until it is gone
    Teardown {
        workspace_id: String,

        #[command(flatten)]
        config: Config,
    },
}

/// Cancelled on Ctrl-C, so a pending wait stops early.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl-C, shutting down");
            }
            cancel.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Quota { plan, file } => quota(&plan, file).await?,
        Commands::Provision {
            organization,
            name,
            plan,
            file,
            config,
        } => {
            init_tracing();
            info!("kaas-orchestrator {} ({})", build::PKG_VERSION, build::SHORT_COMMIT);

            let request = CreateWorkspaceRequest {
                organization_id: organization,
                name,
                plan,
                ..Default::default()
            };
            provision(config, request, file, shutdown_token()).await?;
        }
        Commands::Teardown { workspace_id, config } => {
            init_tracing();
            info!("kaas-orchestrator {} ({})", build::PKG_VERSION, build::SHORT_COMMIT);

            teardown(config, &workspace_id, shutdown_token()).await?;
        }
    }

    Ok(())
}
