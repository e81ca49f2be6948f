use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One record delivered by the firehose. Only `LogMessage` carries a
/// payload; the other kinds exist so the dispatch loop can match the
/// full closed set and skip them explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum Envelope {
    LogMessage(LogMessage),
    CounterEvent,
    ValueMetric,
    ContainerMetric,
    HttpStartStop,
    Error,
}

/// An application or router log line with its source metadata.
///
/// `app_name` is resolved from `app_id` by the metadata resolver when the
/// envelope is constructed, never inside the dispatch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    pub message: String,
    /// "ERR" for stderr output, anything else is informational.
    pub message_type: String,
    pub timestamp: DateTime<Utc>,
    pub app_id: String,
    #[serde(default)]
    pub app_name: String,
    /// Source category tag, e.g. "RTR", "APP/PROC/WEB", "STG".
    pub source_type: String,
    pub source_instance: String,
}
