use std::collections::HashMap;

use crate::firehose::envelope::LogMessage;
use crate::insights::{RequestTelemetry, Severity, Telemetry, TraceTelemetry};

use super::rtr::RtrMessage;

/// Maps a parsed RTR line to request telemetry. The property bag keys are
/// fixed; `app_name` comes from the log envelope, not the parsed line.
pub fn request_telemetry(rtr: &RtrMessage, log: &LogMessage) -> Telemetry {
    let name = format!("{} {}", rtr.method, rtr.path);
    let url = format!("{}://{}{}", rtr.x_forwarded_proto, rtr.host, rtr.path);

    let mut properties = HashMap::new();
    properties.insert(
        "request_bytes_received".to_string(),
        rtr.request_bytes_received.clone(),
    );
    properties.insert("body_bytes_sent".to_string(), rtr.body_bytes_sent.clone());
    properties.insert("referer".to_string(), rtr.referer.clone());
    properties.insert("remote_addr".to_string(), rtr.remote_addr.clone());
    properties.insert("dest_ip_port".to_string(), rtr.dest_ip_and_port.clone());
    properties.insert("vcap_request_id".to_string(), rtr.vcap_request_id.clone());
    properties.insert("app_id".to_string(), rtr.app_id.clone());
    properties.insert("app_index".to_string(), rtr.app_index.clone());
    properties.insert("app_name".to_string(), log.app_name.clone());

    Telemetry::Request(RequestTelemetry {
        name: name.clone(),
        method: rtr.method.clone(),
        url,
        timestamp: rtr.timestamp,
        duration: rtr.response_time.unwrap_or_default(),
        response_code: rtr.status_code,
        success: rtr.is_success,
        user_agent: rtr.user_agent.clone(),
        client_ip: rtr.x_forwarded_for.clone(),
        operation_name: name,
        properties,
    })
}

/// Maps a non-RTR log line to trace telemetry. "ERR" is the only message
/// type that maps to the Error severity; every other value is
/// informational.
pub fn trace_telemetry(log: &LogMessage) -> Telemetry {
    let severity = if log.message_type == "ERR" {
        Severity::Error
    } else {
        Severity::Information
    };

    let mut properties = HashMap::new();
    properties.insert("app_id".to_string(), log.app_id.clone());
    properties.insert("app_name".to_string(), log.app_name.clone());
    properties.insert("source_type".to_string(), log.source_type.clone());
    properties.insert("source_instance".to_string(), log.source_instance.clone());

    Telemetry::Trace(TraceTelemetry {
        message: log.message.clone(),
        severity,
        properties,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::nozzle::rtr::parse_rtr;

    fn log_message(message_type: &str, source_type: &str) -> LogMessage {
        LogMessage {
            message: "some log output".to_string(),
            message_type: message_type.to_string(),
            timestamp: Utc::now(),
            app_id: "b2f397ce-7b14-4f5a-abc2-12cd0e4d91d5".to_string(),
            app_name: "dora".to_string(),
            source_type: source_type.to_string(),
            source_instance: "2".to_string(),
        }
    }

    #[test]
    fn request_telemetry_builds_name_url_and_property_bag() {
        let line = "dora.example.com - [2017-02-01T10:35:11.111+0000] \"GET /healthz HTTP/1.1\" 200 0 13 \"-\" \"curl/7.35.0\" \"10.0.1.5:52719\" \"10.10.147.77:61009\" x_forwarded_for:\"10.0.0.1, 10.0.0.2\" x_forwarded_proto:\"https\" vcap_request_id:\"e1604ad1-002c-48bb-78b8-7c6c5e397d0d\" response_time:0.001500 app_id:\"b2f397ce-7b14-4f5a-abc2-12cd0e4d91d5\" app_index:\"2\"";
        let rtr = parse_rtr(line).unwrap();
        let log = log_message("OUT", "RTR");

        let telemetry = request_telemetry(&rtr, &log);
        let request = match telemetry {
            Telemetry::Request(request) => request,
            Telemetry::Trace(_) => panic!("expected request telemetry"),
        };

        assert_eq!(request.name, "GET /healthz");
        assert_eq!(request.operation_name, "GET /healthz");
        assert_eq!(request.url, "https://dora.example.com/healthz");
        assert_eq!(request.duration, Duration::from_nanos(1_500_000));
        assert_eq!(request.response_code, 200);
        assert!(request.success);
        assert_eq!(request.user_agent, "curl/7.35.0");
        assert_eq!(request.client_ip, "10.0.0.1");

        assert_eq!(request.properties["request_bytes_received"], "0");
        assert_eq!(request.properties["body_bytes_sent"], "13");
        assert_eq!(request.properties["referer"], "-");
        assert_eq!(request.properties["remote_addr"], "10.0.1.5:52719");
        assert_eq!(request.properties["dest_ip_port"], "10.10.147.77:61009");
        assert_eq!(
            request.properties["vcap_request_id"],
            "e1604ad1-002c-48bb-78b8-7c6c5e397d0d"
        );
        assert_eq!(
            request.properties["app_id"],
            "b2f397ce-7b14-4f5a-abc2-12cd0e4d91d5"
        );
        assert_eq!(request.properties["app_index"], "2");
        assert_eq!(request.properties["app_name"], "dora");
        assert_eq!(request.properties.len(), 9);
    }

    #[test]
    fn missing_response_time_maps_to_zero_duration() {
        let line = "dora.example.com - [2017-02-01T10:35:11.111+0000] \"GET /healthz HTTP/1.1\" 200 0 13 \"-\" \"curl/7.35.0\" \"10.0.1.5:52719\" \"10.10.147.77:61009\" x_forwarded_for:\"10.0.0.1\" x_forwarded_proto:\"https\" vcap_request_id:\"e1604ad1\" gorouter_time:0.000200 app_id:\"b2f397ce\" app_index:\"2\"";
        let rtr = parse_rtr(line).unwrap();
        let telemetry = request_telemetry(&rtr, &log_message("OUT", "RTR"));
        match telemetry {
            Telemetry::Request(request) => assert_eq!(request.duration, Duration::ZERO),
            Telemetry::Trace(_) => panic!("expected request telemetry"),
        }
    }

    #[test]
    fn err_message_type_maps_to_error_severity() {
        let telemetry = trace_telemetry(&log_message("ERR", "APP/PROC/WEB"));
        match telemetry {
            Telemetry::Trace(trace) => assert_eq!(trace.severity, Severity::Error),
            Telemetry::Request(_) => panic!("expected trace telemetry"),
        }
    }

    #[test]
    fn any_other_message_type_maps_to_information() {
        for message_type in ["OUT", "err", ""] {
            let telemetry = trace_telemetry(&log_message(message_type, "STG"));
            match telemetry {
                Telemetry::Trace(trace) => {
                    assert_eq!(trace.severity, Severity::Information)
                }
                Telemetry::Request(_) => panic!("expected trace telemetry"),
            }
        }
    }

    #[test]
    fn trace_property_bag_comes_from_the_envelope() {
        let telemetry = trace_telemetry(&log_message("OUT", "STG"));
        let trace = match telemetry {
            Telemetry::Trace(trace) => trace,
            Telemetry::Request(_) => panic!("expected trace telemetry"),
        };
        assert_eq!(trace.message, "some log output");
        assert_eq!(
            trace.properties["app_id"],
            "b2f397ce-7b14-4f5a-abc2-12cd0e4d91d5"
        );
        assert_eq!(trace.properties["app_name"], "dora");
        assert_eq!(trace.properties["source_type"], "STG");
        assert_eq!(trace.properties["source_instance"], "2");
        assert_eq!(trace.properties.len(), 4);
    }
}
