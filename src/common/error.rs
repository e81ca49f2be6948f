use thiserror::Error;

#[derive(Error, Debug)]
pub enum NozzleError {
    #[error("firehose error: {0}")]
    Firehose(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NozzleError>;

/// Failures raised by the RTR access-log parser. Each variant names the
/// field that failed and carries the offending input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RtrParseError {
    #[error("malformed RTR line: {0}")]
    MalformedLine(String),

    #[error("error parsing timestamp: {0}")]
    Timestamp(String),

    #[error("error parsing path and protocol: {0}")]
    PathProtocol(String),

    #[error("error parsing status code: {0}")]
    StatusCode(String),

    #[error("error parsing bytes received and sent: {0}")]
    ByteCounts(String),

    #[error("error parsing x_forwarded_for: {0}")]
    ForwardedFor(String),

    #[error("error parsing x_forwarded_proto: {0}")]
    ForwardedProto(String),

    #[error("error parsing vcap_request_id: {0}")]
    VcapRequestId(String),

    #[error("error parsing response time: {0}")]
    ResponseTime(String),

    #[error("error parsing app id: {0}")]
    AppId(String),

    #[error("error parsing app index: {0}")]
    AppIndex(String),
}
