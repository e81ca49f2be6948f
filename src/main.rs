use std::sync::Arc;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info};

use ai_nozzle::caching::{AppNameResolver, CachingResolver, CfApiClient};
use ai_nozzle::config::{NozzleConfig, FIREHOSE_SUBSCRIPTION_ID};
use ai_nozzle::firehose::{FirehoseClient, FirehoseConfig, HttpFirehose};
use ai_nozzle::insights::{AppInsightsSink, TelemetrySink, DEFAULT_TRACK_ENDPOINT};
use ai_nozzle::logging;
use ai_nozzle::nozzle::{Nozzle, NozzleExit, ShutdownSignal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = NozzleConfig::parse();
    logging::init_logging(&config.log_level);

    info!(skip_ssl_validation = config.skip_ssl_validation, "config");
    info!(idle_timeout = ?config.idle_timeout, "config");

    let resolver: Arc<dyn AppNameResolver> = Arc::new(CachingResolver::new(Box::new(
        CfApiClient::new(
            config.api_addr.clone(),
            config.firehose_user.clone(),
            config.firehose_user_password.clone(),
            config.skip_ssl_validation,
        )?,
    )));
    resolver.initialize().await;

    let firehose: Arc<dyn FirehoseClient> = Arc::new(HttpFirehose::new(
        FirehoseConfig {
            subscription_id: FIREHOSE_SUBSCRIPTION_ID.to_string(),
            traffic_controller_url: config.doppler_addr.clone(),
            idle_timeout: config.idle_timeout,
            skip_ssl_validation: config.skip_ssl_validation,
            username: config.firehose_user.clone(),
            password: config.firehose_user_password.clone(),
        },
        resolver,
    )?);

    let sink: Arc<dyn TelemetrySink> = Arc::new(AppInsightsSink::new(
        config.instrument_key.clone(),
        DEFAULT_TRACK_ENDPOINT.to_string(),
    )?);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let (shutdown_tx, shutdown_rx) = mpsc::channel(2);
    tokio::spawn(async move {
        let signal = tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Terminate,
            _ = sigint.recv() => ShutdownSignal::Interrupt,
        };
        let _ = shutdown_tx.send(signal).await;
    });

    let (records, errors) = firehose.connect().await?;

    let nozzle = Nozzle::new(firehose, sink);
    match nozzle.run(records, errors, shutdown_rx).await {
        Ok(NozzleExit::Shutdown) => {
            // Signal-triggered termination is immediate; queued telemetry
            // is abandoned.
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "nozzle stopped");
            Err(err.into())
        }
    }
}
