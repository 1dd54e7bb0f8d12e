//! Runtime configuration for the evaluation core.

use std::future::Future;
use std::time::Duration;

use evalgate_store::StoreResult;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// Items requested per run-results page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper bound on pages fetched for one run, whatever the remote reports.
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Core configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Page size for run item listing
    pub page_size: u32,
    /// Safety cap on pages per aggregation
    pub max_pages: u32,
    /// Timeout applied to each remote call
    pub request_timeout: Duration,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl EvalConfig {
    /// Defaults overridden by `EVALGATE_PAGE_SIZE` and
    /// `EVALGATE_TIMEOUT_SECS` when set and parseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = env_parse::<u32>("EVALGATE_PAGE_SIZE").filter(|s| *s > 0) {
            config.page_size = size;
        }
        if let Some(secs) = env_parse::<u64>("EVALGATE_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub(crate) fn timeout_millis(&self) -> u64 {
        u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Run one remote call under `request_timeout`.
    pub(crate) async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(EvalError::Timeout {
                operation: operation.to_string(),
                millis: self.timeout_millis(),
            }),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
