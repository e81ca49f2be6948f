use std::time::Duration;

use clap::Parser;

/// Subscription id presented to the traffic controller.
pub const FIREHOSE_SUBSCRIPTION_ID: &str = "ai-nozzle";

/// Operator-facing configuration. Every flag can also come from the
/// environment, which is how the nozzle is configured when pushed as an
/// app.
#[derive(Parser, Debug, Clone)]
#[command(name = "ai-nozzle")]
#[command(about = "Forwards Cloud Foundry firehose logs to Application Insights")]
#[command(version = "0.1.0")]
pub struct NozzleConfig {
    /// Api URL
    #[arg(long = "api-addr", env = "API_ADDR")]
    pub api_addr: String,

    /// Traffic controller URL
    #[arg(long = "doppler-addr", env = "DOPPLER_ADDR")]
    pub doppler_addr: String,

    /// CF user with admin and firehose access
    #[arg(long = "firehose-user", env = "FIREHOSE_USER")]
    pub firehose_user: String,

    /// Password of the CF user
    #[arg(long = "firehose-user-password", env = "FIREHOSE_USER_PASSWORD")]
    pub firehose_user_password: String,

    /// Skip SSL validation
    #[arg(long = "skip-ssl-validation", env = "SKIP_SSL_VALIDATION", default_value_t = false)]
    pub skip_ssl_validation: bool,

    /// Keep alive duration for the firehose consumer, e.g. "25s" or "2m"
    #[arg(long = "idle-timeout", env = "IDLE_TIMEOUT", default_value = "25s", value_parser = parse_duration)]
    pub idle_timeout: Duration,

    /// Log level: DEBUG, INFO, ERROR
    #[arg(long = "log-level", env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Application Insights instrumentation key
    #[arg(long = "instrument-key", env = "INSTRUMENT_KEY")]
    pub instrument_key: String,
}

/// Parses durations of the form "30", "30s", "5m", or "1h".
fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let (number, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => value.split_at(pos),
        None => (value, "s"),
    };
    let number: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {value}"))?;
    match unit {
        "s" => Ok(Duration::from_secs(number)),
        "m" => Ok(Duration::from_secs(number * 60)),
        "h" => Ok(Duration::from_secs(number * 3600)),
        other => Err(format!("unknown duration unit: {other}")),
    }
}
