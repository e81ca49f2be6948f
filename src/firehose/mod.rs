pub mod envelope;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::caching::AppNameResolver;
use crate::common::error::{NozzleError, Result};

use self::envelope::Envelope;

/// Upstream firehose subscription. `connect` hands back a record channel
/// and an error channel; the consumer never reconnects on its own.
#[async_trait]
pub trait FirehoseClient: Send + Sync {
    async fn connect(&self) -> Result<(mpsc::Receiver<Envelope>, mpsc::Receiver<NozzleError>)>;
    async fn close(&self) -> Result<()>;
}

pub struct FirehoseConfig {
    pub subscription_id: String,
    pub traffic_controller_url: String,
    pub idle_timeout: Duration,
    pub skip_ssl_validation: bool,
    pub username: String,
    pub password: String,
}

/// Firehose client consuming one streaming HTTP response of
/// newline-delimited JSON envelopes. App names are resolved at envelope
/// construction so the dispatch loop never touches the resolver.
pub struct HttpFirehose {
    config: FirehoseConfig,
    resolver: Arc<dyn AppNameResolver>,
    http: reqwest::Client,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl HttpFirehose {
    pub fn new(config: FirehoseConfig, resolver: Arc<dyn AppNameResolver>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.skip_ssl_validation)
            .build()?;
        Ok(Self {
            config,
            resolver,
            http,
            reader: Mutex::new(None),
        })
    }
}

#[async_trait]
impl FirehoseClient for HttpFirehose {
    async fn connect(&self) -> Result<(mpsc::Receiver<Envelope>, mpsc::Receiver<NozzleError>)> {
        let url = format!(
            "{}/firehose/{}",
            self.config.traffic_controller_url.trim_end_matches('/'),
            self.config.subscription_id
        );
        info!(url = %url, "connecting to the firehose");
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?
            .error_for_status()?;

        let (record_tx, record_rx) = mpsc::channel(1024);
        let (error_tx, error_rx) = mpsc::channel(1);
        let resolver = self.resolver.clone();
        let idle_timeout = self.config.idle_timeout;

        let handle = tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            loop {
                let chunk = match tokio::time::timeout(idle_timeout, stream.next()).await {
                    Err(_) => {
                        let _ = error_tx
                            .send(NozzleError::Firehose(format!(
                                "no firehose activity for {idle_timeout:?}"
                            )))
                            .await;
                        return;
                    }
                    Ok(None) => {
                        let _ = error_tx
                            .send(NozzleError::Firehose("firehose stream ended".to_string()))
                            .await;
                        return;
                    }
                    Ok(Some(Err(err))) => {
                        let _ = error_tx.send(NozzleError::Http(err)).await;
                        return;
                    }
                    Ok(Some(Ok(chunk))) => chunk,
                };
                buffer.extend_from_slice(&chunk);
                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let frame: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = &frame[..frame.len() - 1];
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    match serde_json::from_slice::<Envelope>(line) {
                        Ok(mut record) => {
                            if let Envelope::LogMessage(ref mut log) = record {
                                if log.app_name.is_empty() {
                                    log.app_name = resolver.resolve(&log.app_id).await;
                                }
                            }
                            if record_tx.send(record).await.is_err() {
                                debug!("record channel dropped, stopping reader");
                                return;
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "dropping undecodable firehose frame");
                        }
                    }
                }
            }
        });
        *self.reader.lock().await = Some(handle);

        Ok((record_rx, error_rx))
    }

    async fn close(&self) -> Result<()> {
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
            info!("firehose consumer closed");
        }
        Ok(())
    }
}
