use std::time::Duration;

use chrono::{DateTime, FixedOffset};

use crate::common::error::RtrParseError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Structured form of one gorouter access-log line.
#[derive(Debug, Clone, PartialEq)]
pub struct RtrMessage {
    pub host: String,
    pub timestamp: DateTime<FixedOffset>,
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub status_code: u16,
    pub is_success: bool,
    pub request_bytes_received: String,
    pub body_bytes_sent: String,
    pub referer: String,
    pub user_agent: String,
    pub remote_addr: String,
    pub dest_ip_and_port: String,
    pub x_forwarded_for: String,
    pub x_forwarded_proto: String,
    pub vcap_request_id: String,
    /// None when the line carries no response_time marker; the router
    /// omits it for some request classes and that is not an error.
    pub response_time: Option<Duration>,
    pub app_id: String,
    pub app_index: String,
}

/// Parses one RTR access-log line.
///
/// The line is quote-delimited with a fixed field order; any arity or
/// marker mismatch fails the whole line. Pure function, no state.
pub fn parse_rtr(line: &str) -> Result<RtrMessage, RtrParseError> {
    let segments: Vec<&str> = line.split('"').map(str::trim).collect();
    if segments.len() < 20 {
        return Err(RtrParseError::MalformedLine(line.to_string()));
    }

    // host and timestamp, e.g. `dora.example.com - [2017-02-01T10:35:11.111+0000]`
    let head: Vec<&str> = segments[0].split(' ').collect();
    let host = head[0].to_string();
    if head.len() < 3 {
        return Err(RtrParseError::Timestamp(segments[0].to_string()));
    }
    let stamp = head[2].trim_start_matches('[').trim_end_matches(']');
    let timestamp = DateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .map_err(|err| RtrParseError::Timestamp(format!("{stamp}: {err}")))?;

    // method, path and protocol
    let request: Vec<&str> = segments[1].split(' ').collect();
    let method = request[0].to_string();
    if request.len() < 3 {
        return Err(RtrParseError::PathProtocol(segments[1].to_string()));
    }
    let path = request[1].to_string();
    let protocol = request[2].to_string();

    // status code, request bytes received, body bytes sent
    let status: Vec<&str> = segments[2].split(' ').collect();
    let status_code: u16 = status[0]
        .parse()
        .map_err(|_| RtrParseError::StatusCode(segments[2].to_string()))?;
    let is_success = status_code < 400;
    if status.len() < 3 {
        return Err(RtrParseError::ByteCounts(segments[2].to_string()));
    }
    let request_bytes_received = status[1].to_string();
    let body_bytes_sent = status[2].to_string();

    let referer = segments[3].to_string();
    let user_agent = segments[5].to_string();
    let remote_addr = segments[7].to_string();
    let dest_ip_and_port = segments[9].to_string();

    if !segments[10].contains("x_forwarded_for") {
        return Err(RtrParseError::ForwardedFor(segments[10].to_string()));
    }
    let x_forwarded_for = segments[11]
        .split(',')
        .next()
        .unwrap_or("")
        .to_string();

    let x_forwarded_proto = match segments[13] {
        "http" => "http".to_string(),
        "https" => "https".to_string(),
        other => return Err(RtrParseError::ForwardedProto(other.to_string())),
    };

    if !segments[14].contains("vcap_request_id") {
        return Err(RtrParseError::VcapRequestId(segments[14].to_string()));
    }
    let vcap_request_id = segments[15].to_string();

    // response time and app id share segment 16. An absent response_time
    // marker is tolerated; a malformed value or a missing app_id is not.
    let trailer: Vec<&str> = segments[16].split(' ').collect();
    let mut response_time = None;
    if trailer[0].contains("response_time:") {
        let value = trailer[0].split(':').nth(1).unwrap_or("");
        let seconds: f64 = value
            .parse()
            .map_err(|_| RtrParseError::ResponseTime(trailer[0].to_string()))?;
        response_time = Some(Duration::from_nanos((seconds * 1_000_000_000.0) as u64));
    }
    if !(trailer.len() > 1 && trailer[1].contains("app_id")) {
        return Err(RtrParseError::AppId(segments[16].to_string()));
    }
    let app_id = segments[17].to_string();

    if !segments[18].contains("app_index") {
        return Err(RtrParseError::AppIndex(segments[18].to_string()));
    }
    let app_index = segments[19].to_string();

    Ok(RtrMessage {
        host,
        timestamp,
        method,
        path,
        protocol,
        status_code,
        is_success,
        request_bytes_received,
        body_bytes_sent,
        referer,
        user_agent,
        remote_addr,
        dest_ip_and_port,
        x_forwarded_for,
        x_forwarded_proto,
        vcap_request_id,
        response_time,
        app_id,
        app_index,
    })
}
