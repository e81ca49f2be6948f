use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::common::error::Result;

pub const DEFAULT_TRACK_ENDPOINT: &str = "https://dc.services.visualstudio.com/v2/track";

/// Trace severity. The firehose only distinguishes stderr from everything
/// else, so only two of the backend's levels are ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Information,
    Error,
}

impl Severity {
    /// Application Insights severityLevel wire value.
    pub fn level(self) -> u8 {
        match self {
            Severity::Information => 1,
            Severity::Error => 3,
        }
    }
}

/// One tracked HTTP request derived from an RTR access-log line.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTelemetry {
    pub name: String,
    pub method: String,
    pub url: String,
    pub timestamp: DateTime<FixedOffset>,
    pub duration: Duration,
    pub response_code: u16,
    pub success: bool,
    /// Identity context, kept out of the generic property bag.
    pub user_agent: String,
    /// Location context, kept out of the generic property bag.
    pub client_ip: String,
    pub operation_name: String,
    pub properties: HashMap<String, String>,
}

/// One tracked log line that is not an access log.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceTelemetry {
    pub message: String,
    pub severity: Severity,
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    Request(RequestTelemetry),
    Trace(TraceTelemetry),
}

/// Sink for derived telemetry. `track` is expected to queue and return;
/// transmission happens asynchronously relative to the caller.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn track(&self, telemetry: Telemetry);
}

/// Sink posting track envelopes to the Application Insights ingestion
/// endpoint. `track` only enqueues; a background task owns the HTTP
/// transport. Delivery failures are logged and dropped, never retried.
pub struct AppInsightsSink {
    tx: mpsc::UnboundedSender<Telemetry>,
}

impl AppInsightsSink {
    pub fn new(instrumentation_key: String, endpoint: String) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Telemetry>();
        tokio::spawn(async move {
            while let Some(telemetry) = rx.recv().await {
                let body = track_envelope(&telemetry, &instrumentation_key);
                match http.post(&endpoint).json(&body).send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!(status = %response.status(), "telemetry item accepted");
                    }
                    Ok(response) => {
                        warn!(status = %response.status(), "telemetry item rejected");
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to post telemetry item");
                    }
                }
            }
        });
        Ok(Self { tx })
    }
}

#[async_trait]
impl TelemetrySink for AppInsightsSink {
    async fn track(&self, telemetry: Telemetry) {
        // Receiver only goes away at process teardown.
        let _ = self.tx.send(telemetry);
    }
}

/// Builds the ingestion envelope for one telemetry item.
fn track_envelope(telemetry: &Telemetry, instrumentation_key: &str) -> Value {
    match telemetry {
        Telemetry::Request(request) => json!({
            "name": "Microsoft.ApplicationInsights.Request",
            "time": request.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "iKey": instrumentation_key,
            "tags": {
                "ai.user.userAgent": request.user_agent,
                "ai.location.ip": request.client_ip,
                "ai.operation.name": request.operation_name,
            },
            "data": {
                "baseType": "RequestData",
                "baseData": {
                    "ver": 2,
                    "id": request.properties.get("vcap_request_id").cloned().unwrap_or_default(),
                    "name": request.name,
                    "url": request.url,
                    "duration": format_duration(request.duration),
                    "responseCode": request.response_code.to_string(),
                    "success": request.success,
                    "properties": request.properties,
                }
            }
        }),
        Telemetry::Trace(trace) => json!({
            "name": "Microsoft.ApplicationInsights.Message",
            "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "iKey": instrumentation_key,
            "data": {
                "baseType": "MessageData",
                "baseData": {
                    "ver": 2,
                    "message": trace.message,
                    "severityLevel": trace.severity.level(),
                    "properties": trace.properties,
                }
            }
        }),
    }
}

/// Renders a duration in the backend's `d.hh:mm:ss.fffffff` form
/// (seven fractional digits, 100ns ticks).
fn format_duration(duration: Duration) -> String {
    let ticks = duration.as_nanos() / 100;
    let fraction = ticks % 10_000_000;
    let total_seconds = ticks / 10_000_000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = (total_seconds / 3600) % 24;
    let days = total_seconds / 86_400;
    format!("{days}.{hours:02}:{minutes:02}:{seconds:02}.{fraction:07}")
}
