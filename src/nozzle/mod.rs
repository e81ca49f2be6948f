pub mod mapper;
pub mod rtr;

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::common::error::{NozzleError, Result};
use crate::firehose::envelope::{Envelope, LogMessage};
use crate::firehose::FirehoseClient;
use crate::insights::TelemetrySink;

const POLICY_VIOLATION_MARKER: &str = "close 1008 (policy violation)";

/// Process signal that requests termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "interrupt"),
            ShutdownSignal::Terminate => write!(f, "terminated"),
        }
    }
}

/// How the dispatch loop ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NozzleExit {
    /// A termination signal was observed; the caller owns process exit.
    Shutdown,
}

/// The event dispatch loop: waits on records, upstream errors, and the
/// shutdown channel; classifies each log line and forwards the derived
/// telemetry to the sink.
pub struct Nozzle {
    firehose: Arc<dyn FirehoseClient>,
    sink: Arc<dyn TelemetrySink>,
}

impl Nozzle {
    pub fn new(firehose: Arc<dyn FirehoseClient>, sink: Arc<dyn TelemetrySink>) -> Self {
        Self { firehose, sink }
    }

    /// Runs until a shutdown signal arrives (`Ok(NozzleExit::Shutdown)`)
    /// or the upstream fails (`Err`). Records are handled one at a time
    /// in delivery order; a slow sink throttles consumption.
    pub async fn run(
        &self,
        mut records: mpsc::Receiver<Envelope>,
        mut errors: mpsc::Receiver<NozzleError>,
        mut shutdown: mpsc::Receiver<ShutdownSignal>,
    ) -> Result<NozzleExit> {
        loop {
            tokio::select! {
                signal = shutdown.recv() => {
                    // A closed shutdown channel means the signal plumbing
                    // is gone; treat it as a termination request.
                    let signal = signal.unwrap_or(ShutdownSignal::Terminate);
                    info!(signal = %signal, "exiting");
                    if let Err(err) = self.firehose.close().await {
                        error!(error = %err, "error closing consumer");
                    }
                    return Ok(NozzleExit::Shutdown);
                }
                record = records.recv() => {
                    match record {
                        Some(envelope) => self.handle_envelope(envelope).await,
                        None => {
                            return self.fail(NozzleError::Firehose(
                                "firehose record stream closed".to_string(),
                            )).await;
                        }
                    }
                }
                upstream = errors.recv() => {
                    let err = upstream.unwrap_or_else(|| {
                        NozzleError::Firehose("firehose error stream closed".to_string())
                    });
                    return self.fail(err).await;
                }
            }
        }
    }

    async fn handle_envelope(&self, envelope: Envelope) {
        match envelope {
            Envelope::LogMessage(log) => self.handle_log_message(log).await,
            // Metric and lifecycle events carry nothing the backend wants.
            Envelope::CounterEvent
            | Envelope::ValueMetric
            | Envelope::ContainerMetric
            | Envelope::HttpStartStop
            | Envelope::Error => {}
        }
    }

    async fn handle_log_message(&self, log: LogMessage) {
        if log.source_type.contains("RTR") {
            match rtr::parse_rtr(&log.message) {
                Ok(parsed) => {
                    self.sink.track(mapper::request_telemetry(&parsed, &log)).await;
                }
                Err(err) => {
                    error!(error = %err, line = %log.message, "error parsing RTR message");
                }
            }
        } else {
            self.sink.track(mapper::trace_telemetry(&log)).await;
        }
    }

    /// Terminal upstream-error path: log, hint at capacity exhaustion
    /// when the disconnect looks like one, close the subscription, and
    /// hand the error back to the caller.
    async fn fail(&self, err: NozzleError) -> Result<NozzleExit> {
        error!(error = %err, "error while reading from the firehose");
        if err.to_string().contains(POLICY_VIOLATION_MARKER) {
            error!("disconnected because the nozzle could not keep up, try scaling up the nozzle");
        }
        error!("closing connection with traffic controller");
        let _ = self.firehose.close().await;
        Err(err)
    }
}
