//! REST client for the evaluation platform's public API.
//!
//! One explicitly constructed `RestClient` implements all three store traits.
//! There is no process-global client: construct one from a [`RestConfig`] and
//! pass it (usually as `Arc<dyn Trait>`) to whatever needs it.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::merge::deep_merge;
use crate::store_traits::*;

/// Label a judge prompt must carry unless configured otherwise.
pub const DEFAULT_PROMPT_LABEL: &str = "production";

/// Page size used when listing scores attached to a trace.
const TRACE_SCORES_LIMIT: u32 = 100;

/// Calls whose non-success statuses carry meaning beyond "failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    DatasetLookup,
    RunListing,
    PromptLookup,
    MetadataPatch,
    Other,
}

/// How a response status settles a call before its body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Success; read the payload.
    Body,
    /// The platform verifiably has no such resource.
    Absent,
    /// The platform does not support the operation.
    Unsupported,
    /// Could not verify; map the status to a `StoreError`.
    Error,
}

fn disposition(call: Call, status: StatusCode) -> Disposition {
    if status.is_success() {
        return Disposition::Body;
    }
    match (call, status) {
        (Call::DatasetLookup | Call::RunListing | Call::PromptLookup, StatusCode::NOT_FOUND) => {
            Disposition::Absent
        }
        (
            Call::MetadataPatch,
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED,
        ) => Disposition::Unsupported,
        _ => Disposition::Error,
    }
}

/// Server errors mean the platform is unavailable; anything else is a
/// rejected request.
fn status_error(status: StatusCode, body: String) -> StoreError {
    if status.is_server_error() {
        StoreError::Unavailable(format!("HTTP {}: {}", status.as_u16(), body))
    } else {
        StoreError::Http {
            status: status.as_u16(),
            body,
        }
    }
}

/// REST client configuration
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Platform base URL
    pub host: String,
    /// Public API key (basic-auth user)
    pub public_key: Option<String>,
    /// Secret API key (basic-auth password)
    pub secret_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Label a judge prompt must carry to count as existing
    pub prompt_label: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        let timeout_secs = std::env::var("EVALGATE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);
        RestConfig {
            host: std::env::var("EVALGATE_HOST")
                .unwrap_or_else(|_| "https://cloud.langfuse.com".to_string()),
            public_key: std::env::var("EVALGATE_PUBLIC_KEY").ok(),
            secret_key: std::env::var("EVALGATE_SECRET_KEY").ok(),
            timeout: Duration::from_secs(timeout_secs),
            prompt_label: std::env::var("EVALGATE_PROMPT_LABEL")
                .unwrap_or_else(|_| DEFAULT_PROMPT_LABEL.to_string()),
        }
    }
}

impl RestConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific host, no credentials
    pub fn new(host: &str) -> Self {
        RestConfig {
            host: host.to_string(),
            public_key: None,
            secret_key: None,
            timeout: Duration::from_secs(30),
            prompt_label: DEFAULT_PROMPT_LABEL.to_string(),
        }
    }

    /// Set API credentials
    pub fn with_credentials(mut self, public_key: &str, secret_key: &str) -> Self {
        self.public_key = Some(public_key.to_string());
        self.secret_key = Some(secret_key.to_string());
        self
    }

    /// Set per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the label judge prompts are looked up under
    pub fn with_prompt_label(mut self, label: &str) -> Self {
        self.prompt_label = label.to_string();
        self
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DatasetDto {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

impl From<DatasetDto> for DatasetRecord {
    fn from(dto: DatasetDto) -> Self {
        DatasetRecord {
            id: dto.id,
            name: dto.name,
            description: dto.description,
            metadata: dto.metadata.unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunNameDto {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunListDto {
    #[serde(default)]
    data: Vec<RunNameDto>,
}

#[derive(Debug, Default, Deserialize)]
struct PageMetaDto {
    #[serde(rename = "totalPages", default)]
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RunItemDto {
    #[serde(rename = "datasetItemId")]
    dataset_item_id: String,
    #[serde(rename = "traceId", default)]
    trace_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunItemListDto {
    #[serde(default)]
    data: Vec<RunItemDto>,
    #[serde(default)]
    meta: PageMetaDto,
}

#[derive(Debug, Deserialize)]
struct ScoreDto {
    name: String,
    #[serde(default)]
    value: Option<Value>,
    #[serde(rename = "stringValue", default)]
    string_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScoreListDto {
    #[serde(default)]
    data: Vec<ScoreDto>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP implementation of [`DatasetStore`], [`RunResultsStore`] and
/// [`PromptRegistry`].
#[derive(Debug, Clone)]
pub struct RestClient {
    base: Url,
    public_key: String,
    secret_key: String,
    timeout: Duration,
    prompt_label: String,
    http: reqwest::Client,
}

impl RestClient {
    /// Create a new client. Fails if credentials are missing or the host is
    /// not a valid base URL.
    pub fn new(config: RestConfig) -> StoreResult<Self> {
        let (Some(public_key), Some(secret_key)) = (config.public_key, config.secret_key) else {
            return Err(StoreError::MissingCredentials(
                "EVALGATE_PUBLIC_KEY and EVALGATE_SECRET_KEY are required".to_string(),
            ));
        };
        let base = Url::parse(&config.host)
            .map_err(|e| StoreError::InvalidRequest(format!("host {}: {e}", config.host)))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("evalgate-store/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;

        Ok(RestClient {
            base,
            public_key,
            secret_key,
            timeout: config.timeout,
            prompt_label: config.prompt_label,
            http,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> StoreResult<Self> {
        Self::new(RestConfig::from_env())
    }

    fn endpoint(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidRequest(format!("not a base URL: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.public_key, Some(&self.secret_key))
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> StoreResult<reqwest::Response> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout {
                    millis: self.timeout.as_millis() as u64,
                }
            } else {
                StoreError::from(e)
            }
        })
    }

    async fn fetch_dataset(&self, name: &str) -> StoreResult<Option<DatasetRecord>> {
        let url = self.endpoint(&["api", "public", "datasets", name])?;
        debug!(dataset = %name, "fetching dataset");
        let resp = self.send(self.request(reqwest::Method::GET, url)).await?;
        match disposition(Call::DatasetLookup, resp.status()) {
            Disposition::Absent => Ok(None),
            Disposition::Body => {
                let dto: DatasetDto = resp.json().await?;
                Ok(Some(dto.into()))
            }
            _ => Err(error_from(resp).await),
        }
    }

    async fn fetch_trace_scores(&self, trace_id: &str) -> StoreResult<Vec<ItemScore>> {
        let url = self.endpoint(&["api", "public", "scores"])?;
        let builder = self.request(reqwest::Method::GET, url).query(&[
            ("traceId", trace_id.to_string()),
            ("limit", TRACE_SCORES_LIMIT.to_string()),
        ]);
        let list: ScoreListDto = ensure_success(self.send(builder).await?)
            .await?
            .json()
            .await?;
        Ok(list
            .data
            .into_iter()
            .map(|s| ItemScore {
                name: s.name,
                value: s
                    .value
                    .or_else(|| s.string_value.map(Value::String))
                    .unwrap_or(Value::Null),
            })
            .collect())
    }
}

async fn error_from(resp: reqwest::Response) -> StoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    status_error(status, body)
}

async fn ensure_success(resp: reqwest::Response) -> StoreResult<reqwest::Response> {
    match disposition(Call::Other, resp.status()) {
        Disposition::Body => Ok(resp),
        _ => Err(error_from(resp).await),
    }
}

#[async_trait]
impl DatasetStore for RestClient {
    async fn get_dataset_by_name(&self, name: &str) -> StoreResult<Option<DatasetRecord>> {
        self.fetch_dataset(name).await
    }

    async fn create_or_fetch_dataset(
        &self,
        name: &str,
        description: Option<&str>,
        metadata: Value,
    ) -> StoreResult<DatasetHandle> {
        if let Some(existing) = self.fetch_dataset(name).await? {
            return Ok(DatasetHandle {
                id: existing.id,
                name: existing.name,
                created: false,
            });
        }

        let url = self.endpoint(&["api", "public", "datasets"])?;
        let body = json!({
            "name": name,
            "description": description,
            "metadata": metadata,
        });
        let resp = self
            .send(self.request(reqwest::Method::POST, url).json(&body))
            .await?;
        let dto: DatasetDto = ensure_success(resp).await?.json().await?;
        Ok(DatasetHandle {
            id: dto.id,
            name: dto.name,
            created: true,
        })
    }

    async fn patch_dataset_metadata(&self, name: &str, patch: &Value) -> StoreResult<PatchOutcome> {
        let existing = self
            .fetch_dataset(name)
            .await?
            .ok_or_else(|| StoreError::DatasetNotFound {
                name: name.to_string(),
            })?;
        let merged = deep_merge(&existing.metadata, patch);

        let url = self.endpoint(&["api", "public", "datasets", name])?;
        let resp = self
            .send(
                self.request(reqwest::Method::PATCH, url)
                    .json(&json!({ "metadata": merged })),
            )
            .await?;

        let status = resp.status();
        match disposition(Call::MetadataPatch, status) {
            Disposition::Unsupported => {
                warn!(dataset = %name, %status, "platform rejected metadata update");
                Ok(PatchOutcome::Warning {
                    metadata: merged,
                    reason: format!("metadata update not supported by platform ({status})"),
                })
            }
            Disposition::Body => Ok(PatchOutcome::Updated { metadata: merged }),
            _ => Err(error_from(resp).await),
        }
    }
}

#[async_trait]
impl RunResultsStore for RestClient {
    async fn list_run_names(&self, dataset_name: &str) -> StoreResult<Vec<String>> {
        let url = self.endpoint(&["api", "public", "datasets", dataset_name, "runs"])?;
        debug!(dataset = %dataset_name, "listing runs");
        let resp = self.send(self.request(reqwest::Method::GET, url)).await?;
        match disposition(Call::RunListing, resp.status()) {
            Disposition::Absent => Err(StoreError::DatasetNotFound {
                name: dataset_name.to_string(),
            }),
            Disposition::Body => {
                let list: RunListDto = resp.json().await?;
                Ok(list.data.into_iter().filter_map(|r| r.name).collect())
            }
            _ => Err(error_from(resp).await),
        }
    }

    async fn list_run_item_scores(
        &self,
        dataset_id: &str,
        run_name: &str,
        page: PageRequest,
    ) -> StoreResult<RunItemPage> {
        let url = self.endpoint(&["api", "public", "dataset-run-items"])?;
        let builder = self.request(reqwest::Method::GET, url).query(&[
            ("datasetId", dataset_id.to_string()),
            ("runName", run_name.to_string()),
            ("limit", page.limit.to_string()),
            ("page", page.page.to_string()),
        ]);
        debug!(dataset_id = %dataset_id, run = %run_name, page = page.page, "fetching run items");
        let list: RunItemListDto = ensure_success(self.send(builder).await?)
            .await?
            .json()
            .await?;

        // A failed lookup fails the page: an item silently missing its
        // scores would read as "not scored" downstream.
        let score_lookups = list.data.iter().map(|item| async move {
            match item.trace_id.as_deref() {
                Some(trace_id) => self.fetch_trace_scores(trace_id).await.map_err(|err| {
                    warn!(trace_id = %trace_id, error = %err, "score lookup failed");
                    err
                }),
                None => Ok(Vec::new()),
            }
        });
        let scores = join_all(score_lookups)
            .await
            .into_iter()
            .collect::<StoreResult<Vec<_>>>()?;

        let items = list
            .data
            .into_iter()
            .zip(scores)
            .map(|(item, scores)| RunItemScores {
                item_id: item.dataset_item_id,
                trace_id: item.trace_id,
                scores,
            })
            .collect();

        Ok(RunItemPage {
            items,
            total_pages: list.meta.total_pages,
        })
    }
}

#[async_trait]
impl PromptRegistry for RestClient {
    async fn prompt_exists(&self, name: &str) -> StoreResult<bool> {
        let url = self.endpoint(&["api", "public", "v2", "prompts", name])?;
        let builder = self
            .request(reqwest::Method::GET, url)
            .query(&[("label", self.prompt_label.as_str())]);
        let resp = self.send(builder).await?;
        match disposition(Call::PromptLookup, resp.status()) {
            Disposition::Absent => Ok(false),
            Disposition::Body => Ok(true),
            _ => Err(error_from(resp).await),
        }
    }
}
