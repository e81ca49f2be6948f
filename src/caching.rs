use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::common::error::Result;

/// Upstream lookup translating an application GUID into its display name.
#[async_trait]
pub trait AppInfoSource: Send + Sync {
    async fn app_name(&self, app_guid: &str) -> Result<String>;
}

/// Resolver port consumed by the firehose when it constructs log
/// envelopes. Lookups never fail into the caller: a miss or an upstream
/// error resolves to an empty name.
#[async_trait]
pub trait AppNameResolver: Send + Sync {
    async fn initialize(&self);
    async fn resolve(&self, app_guid: &str) -> String;
}

/// Caching wrapper around any [`AppInfoSource`]. Entries are kept for the
/// lifetime of the process; staleness is tolerated.
pub struct CachingResolver {
    source: Box<dyn AppInfoSource>,
    cache: RwLock<HashMap<String, String>>,
}

impl CachingResolver {
    pub fn new(source: Box<dyn AppInfoSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AppNameResolver for CachingResolver {
    async fn initialize(&self) {
        self.cache.write().await.clear();
        info!("app metadata cache initialized");
    }

    async fn resolve(&self, app_guid: &str) -> String {
        if app_guid.is_empty() {
            return String::new();
        }
        if let Some(name) = self.cache.read().await.get(app_guid) {
            return name.clone();
        }
        match self.source.app_name(app_guid).await {
            Ok(name) => {
                debug!(app_guid = %app_guid, app_name = %name, "cached app name");
                self.cache
                    .write()
                    .await
                    .insert(app_guid.to_string(), name.clone());
                name
            }
            Err(err) => {
                // Not cached, so a later lookup can still succeed.
                warn!(app_guid = %app_guid, error = %err, "app name lookup failed");
                String::new()
            }
        }
    }
}

/// Cloud Controller lookup for app metadata.
pub struct CfApiClient {
    http: reqwest::Client,
    api_addr: String,
    username: String,
    password: String,
}

impl CfApiClient {
    pub fn new(
        api_addr: String,
        username: String,
        password: String,
        skip_ssl_validation: bool,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(skip_ssl_validation)
            .build()?;
        Ok(Self {
            http,
            api_addr,
            username,
            password,
        })
    }
}

#[async_trait]
impl AppInfoSource for CfApiClient {
    async fn app_name(&self, app_guid: &str) -> Result<String> {
        let url = format!("{}/v2/apps/{}", self.api_addr.trim_end_matches('/'), app_guid);
        let body: Value = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body["entity"]["name"].as_str().unwrap_or_default().to_string())
    }
}
