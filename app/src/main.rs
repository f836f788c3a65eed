mod config;
mod console;
mod logging;

use std::sync::Arc;

use anyhow::Context;
use preflight_core::{create_event_bus, standard_probes, Collaborators, ReadinessCoordinator};
use preflight_platform::{AssetModelLoader, DeviceCamera, HostFacts, HttpApiClient};

use config::AppConfig;
use console::{Console, ConsoleCommand};

fn build_coordinator(config: &AppConfig) -> anyhow::Result<ReadinessCoordinator> {
    let api = Arc::new(
        HttpApiClient::new(config.api.clone()).context("building the service client")?,
    );
    let facts = Arc::new(HostFacts::new(&config.assets).context("reading host facts")?);
    let models =
        Arc::new(AssetModelLoader::new(&config.assets).context("building the model loader")?);

    let compatibility = standard_probes(
        facts,
        &config.readiness.thresholds,
        config.readiness.timeouts.probe(),
    );

    let collaborators = Collaborators {
        camera: Arc::new(DeviceCamera::new(config.camera.clone())),
        models,
        verifier: api.clone(),
        attempts: api.clone(),
        compatibility: Arc::new(compatibility),
    };

    Ok(ReadinessCoordinator::new(
        api,
        collaborators,
        config.readiness.clone(),
        create_event_bus(),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::setup(!cfg!(debug_assertions));

    let config = config::loader::load_config();
    tracing::info!("Configuration initialized (service {})", config.api.base_url);
    if config.api.user_id.is_empty() {
        tracing::warn!("No api.user_id configured; assessment lookup and attempt start will fail");
    }

    let coordinator = Arc::new(build_coordinator(&config)?);
    console::start_event_printer(coordinator.event_bus().clone());

    let console = Console::new(coordinator);
    if let Some(job_id) = std::env::args().nth(1) {
        console.execute(ConsoleCommand::Open(job_id)).await;
    }
    console.run().await
}
