#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Build controller binary: composes the pipeline and logs what it delivers.

use std::time::Duration;

use buildflow_controller::config::ControllerConfig;
use buildflow_controller::factory::{BuildController, ControllerFactory};
use buildflow_controller::store::StoreReader;
use buildflow_controller::strategy::BuildStrategy;
use buildflow_core::model::BuildStatus;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "buildflow-controller", version, about = "Build controller event pipeline")]
struct Cli {
    /// Base URL of the resource authority.
    #[arg(long, env = "BUILDFLOW_AUTHORITY_URL", default_value = "http://127.0.0.1:8080")]
    authority_url: String,

    /// Bearer token for the authority.
    #[arg(long, env = "BUILDFLOW_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Refuse to start without a token.
    #[arg(long, default_value_t = false)]
    require_auth: bool,

    /// Pod listing interval in seconds.
    #[arg(long, default_value_t = 10)]
    pod_poll_seconds: u64,

    /// Pause before a failed Build sync re-lists, in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    relist_backoff_ms: u64,

    /// Image running Docker strategy builds.
    #[arg(long, default_value = "buildflow/docker-builder:latest")]
    docker_builder_image: String,

    /// Image running STI strategy builds.
    #[arg(long, default_value = "buildflow/sti-runner:latest")]
    sti_runner_image: String,

    /// Log level (env-filter syntax).
    #[arg(long, default_value = "info")]
    log: String,
}

impl Cli {
    fn config(&self) -> ControllerConfig {
        ControllerConfig {
            authority_url: self.authority_url.clone(),
            bearer_token: self.token.clone(),
            require_auth: self.require_auth,
            pod_poll_interval: Duration::from_secs(self.pod_poll_seconds),
            relist_backoff: Duration::from_millis(self.relist_backoff_ms),
            docker_builder_image: self.docker_builder_image.clone(),
            sti_runner_image: self.sti_runner_image.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::new(&cli.log))
        .init();

    let config = cli.config();
    info!(authority = %config.authority_url, "starting build controller pipeline");

    let factory = ControllerFactory::from_config(&config)?;
    let controller = factory.create();

    tokio::select! {
        _ = observe(&controller) => {}
        _ = shutdown_signal() => {}
    }
    controller.stop_sync();
    Ok(())
}

/// Drains both queues and reports what the reconciliation loop would see.
async fn observe(controller: &BuildController) {
    loop {
        tokio::select! {
            build = controller.next_build.next() => {
                if build.status != BuildStatus::New {
                    info!(build = %build.meta.id, status = ?build.status, "build changed");
                    continue;
                }
                match controller.build_strategy.create_build_pod(&build) {
                    Ok(pod) => info!(
                        build = %build.meta.id,
                        pod = %pod.meta.id,
                        image = ?pod.spec.containers.first().map(|c| c.image.as_str()),
                        "new build resolved to pod"
                    ),
                    Err(e) => warn!(build = %build.meta.id, error = %e, "cannot resolve build pod"),
                }
            }
            pod = controller.next_pod.next() => {
                let owner = pod
                    .meta
                    .labels
                    .get("build")
                    .and_then(|id| controller.build_store.get(id));
                info!(
                    pod = %pod.meta.id,
                    phase = ?pod.phase,
                    build_status = ?owner.map(|b| b.status),
                    "pod observed"
                );
            }
        }
    }
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown requested");
}
