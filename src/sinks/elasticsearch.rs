//! Elasticsearch bulk API sink
//!
//! Records are sent as NDJSON `create` actions to `{host}/_bulk`. Per-item
//! statuses from the bulk response decide what gets retried:
//! 2xx is delivered, 429 and 5xx are transient, any other status is a
//! permanent rejection (mapping errors and the like).

use crate::core::{EncodedRecord, ItemResult, Result, ShipperError, SinkClient};
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

/// Index used when none is configured
pub const DEFAULT_INDEX: &str = "logs-app-default";

#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    /// Base URL of the cluster, e.g. `http://localhost:9200`
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub index: String,
    /// Gzip request bodies
    pub compress: bool,
    pub timeout: Duration,
}

impl ElasticsearchConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: None,
            password: None,
            index: DEFAULT_INDEX.to_string(),
            compress: false,
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

pub struct ElasticsearchSink {
    config: ElasticsearchConfig,
    bulk_url: Url,
    // Built on first use, on the shipper thread.
    client: Option<Client>,
}

impl ElasticsearchSink {
    /// Validate the configuration. No connection is made here.
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        let base = Url::parse(config.host.trim())
            .map_err(|e| ShipperError::sink_construction("elasticsearch", format!("invalid host '{}': {}", config.host, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ShipperError::sink_construction(
                "elasticsearch",
                format!("unsupported scheme '{}'", base.scheme()),
            ));
        }
        if config.index.trim().is_empty() {
            return Err(ShipperError::sink_construction("elasticsearch", "index name is empty"));
        }

        let bulk_url = Url::parse(&format!("{}/_bulk", base.as_str().trim_end_matches('/')))
            .map_err(|e| ShipperError::sink_construction("elasticsearch", e.to_string()))?;

        Ok(Self {
            config,
            bulk_url,
            client: None,
        })
    }

    pub fn bulk_url(&self) -> &Url {
        &self.bulk_url
    }

    fn client(&mut self) -> Result<&Client> {
        if self.client.is_none() {
            let client = Client::builder().timeout(self.config.timeout).build()?;
            self.client = Some(client);
        }
        self.client
            .as_ref()
            .ok_or_else(|| ShipperError::sink_unavailable("HTTP client not initialized"))
    }
}

/// Build the NDJSON bulk body: one `create` action line per document.
pub fn build_bulk_body(index: &str, batch: &[EncodedRecord]) -> String {
    let action = serde_json::json!({ "create": { "_index": index } }).to_string();
    let mut body = String::with_capacity(batch.iter().map(|r| r.payload().len() + action.len() + 2).sum());
    for record in batch {
        body.push_str(&action);
        body.push('\n');
        body.push_str(record.payload());
        body.push('\n');
    }
    body
}

fn gzip(body: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 4), Compression::default());
    encoder.write_all(body)?;
    Ok(encoder.finish()?)
}

/// Map a per-item HTTP status to a result
pub fn classify(status: u16, reason: impl Into<String>) -> ItemResult {
    match status {
        200..=299 => ItemResult::Ok,
        429 | 500..=599 => ItemResult::transient(reason),
        _ => ItemResult::permanent(reason),
    }
}

fn parse_bulk_response(body: &str, expected: usize) -> Result<Vec<ItemResult>> {
    let response: BulkResponse = serde_json::from_str(body)?;
    let mut results = Vec::with_capacity(expected);
    for item in response.items.into_iter().take(expected) {
        // Each item is keyed by its action name ("create").
        let result = match item.into_values().next() {
            Some(BulkItem { status, error }) => {
                let reason = error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| format!("status {}", status));
                classify(status, reason)
            }
            None => ItemResult::transient("empty bulk item"),
        };
        results.push(result);
    }
    Ok(results)
}

impl SinkClient for ElasticsearchSink {
    fn submit_batch(&mut self, batch: &[EncodedRecord]) -> Result<Vec<ItemResult>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let body = build_bulk_body(&self.config.index, batch);
        let compress = self.config.compress;
        let url = self.bulk_url.clone();
        let username = self.config.username.clone();
        let password = self.config.password.clone();

        let client = self.client()?;
        let mut request = client
            .post(url)
            .header(CONTENT_TYPE, "application/x-ndjson");
        if let Some(user) = username {
            request = request.basic_auth(user, password);
        }
        request = if compress {
            request
                .header(CONTENT_ENCODING, "gzip")
                .body(gzip(body.as_bytes())?)
        } else {
            request.body(body)
        };

        let response = request.send()?;
        let status = response.status();
        let text = response.text().unwrap_or_else(|_| "<no body>".to_string());
        if !status.is_success() {
            return Err(ShipperError::sink_unavailable(format!(
                "bulk request failed with status {}: {}",
                status, text
            )));
        }

        parse_bulk_response(&text, batch.len())
    }

    fn name(&self) -> &str {
        "elasticsearch"
    }
}

impl std::fmt::Debug for ElasticsearchSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchSink")
            .field("bulk_url", &self.bulk_url.as_str())
            .field("index", &self.config.index)
            .field("compress", &self.config.compress)
            .finish()
    }
}
