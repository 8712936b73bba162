// Main entry point - CLI, dependency wiring and session lifecycle
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use redline_simulator::application::resilient_publisher::ResilientPublisher;
use redline_simulator::application::retry::RetryExecutor;
use redline_simulator::application::sampling_loop::SamplingLoop;
use redline_simulator::application::telemetry_generator::TelemetryGenerator;
use redline_simulator::infrastructure::config::{SimulatorConfig, load_config};
use redline_simulator::infrastructure::credentials::Credentials;
use redline_simulator::infrastructure::mqtt_transport::MqttTransport;

const RETRY_RNG_STREAM: u64 = 0;

/// Fleet vehicle telemetry simulator
#[derive(Parser, Debug)]
#[command(name = "redline-simulator", version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config/default.yml")]
    config: PathBuf,

    /// Override session duration (seconds)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    duration: Option<u64>,
}

impl Args {
    /// Command-line values win over the file and environment.
    fn apply_overrides(&self, config: &mut SimulatorConfig) {
        if let Some(duration) = self.duration {
            config.vehicle.session_duration_sec = duration;
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        tracing::error!(error = %format!("{err:#}"), "simulator_failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    tracing::info!(config_path = %args.config.display(), "loading_config");
    let mut config = load_config(&args.config)?;
    args.apply_overrides(&mut config);

    tracing::info!(
        vehicle_id = %config.vehicle.vehicle_id,
        duration = config.vehicle.session_duration_sec,
        sample_rate = config.vehicle.sample_rate_hz,
        "simulator_starting"
    );

    // Credentials are read once and never reloaded.
    let credentials = Credentials::load(
        &config.iot.cert_path,
        &config.iot.private_key_path,
        &config.iot.ca_path,
    )
    .context("failed to load device credentials")?;

    let transport = MqttTransport::new(&config.iot, Arc::new(credentials));
    let retry = RetryExecutor::new(config.vehicle.rng(RETRY_RNG_STREAM));
    let mut publisher = ResilientPublisher::new(transport, config.iot.topic.clone(), retry);
    let mut generator = TelemetryGenerator::from_config(&config).context("invalid sensor model")?;

    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));

    let span = tracing::info_span!(
        "session",
        vehicle_id = %generator.vehicle_id(),
        session_id = %generator.session_id()
    );

    tokio::select! {
        result = publisher.connect().instrument(span.clone()) => {
            result.context("failed to connect to broker")?;
        }
        _ = cancel.cancelled() => {
            tracing::info!("simulator_interrupted");
            return Ok(());
        }
    }

    SamplingLoop::new(config.vehicle.sample_rate_hz, config.vehicle.session_duration())
        .run(&mut generator, &mut publisher, &cancel)
        .instrument(span)
        .await;

    Ok(())
}

/// Cancel the session on SIGINT or SIGTERM.
async fn watch_signals(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "sigterm_handler_unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::warn!(error = %err, "sigint_handler_unavailable");
                return;
            }
            tracing::info!("received_sigint");
        }
        _ = terminate => tracing::info!("received_sigterm"),
    }

    cancel.cancel();
}
