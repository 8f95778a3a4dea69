//! Catalog persistence + HTTP fetch utilities for the fund catalog.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fundcat_core::{
    AssetComposition, CatalogFund, ClassificationInput, Dividend, FundRecord, Holding,
    IndustryComposition, ManagedFund, ManagerAttribution, ManagerProfile,
};
use rand::seq::SliceRandom;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

mod memory;
mod postgres;

pub use memory::MemoryCatalog;
pub use postgres::PgCatalog;

pub const CRATE_NAME: &str = "fundcat-storage";

/// Rows per INSERT statement when bulk-inserting child collections.
pub const INSERT_BATCH_SIZE: usize = 100;

pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36",
];

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Stable fingerprint of a record's content; `last_update_time` only moves when it changes.
pub fn content_fingerprint(record: &FundRecord) -> Result<String, StorageError> {
    let bytes = serde_json::to_vec(record).map_err(|source| StorageError::Encode {
        what: "fund record",
        source,
    })?;
    Ok(sha256_hex(&bytes))
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("encoding {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("fund {0} is not in the catalog")]
    MissingFund(String),
}

/// Child collections with no natural dedup key: replaced wholesale on every refresh.
#[derive(Debug, Clone, Copy)]
pub enum ChildCollection<'a> {
    Holdings(&'a [Holding]),
    Dividends(&'a [Dividend]),
    IndustryComposition(&'a [IndustryComposition]),
}

impl ChildCollection<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Holdings(_) => "holdings",
            Self::Dividends(_) => "dividends",
            Self::IndustryComposition(_) => "industry_composition",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Holdings(rows) => rows.len(),
            Self::Dividends(rows) => rows.len(),
            Self::IndustryComposition(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Child rows with a stable natural key: upserted, never deleted-then-inserted.
#[derive(Debug, Clone, Copy)]
pub enum KeyedChild<'a> {
    /// Keyed by (fund code, manager id).
    Manager(&'a ManagerAttribution),
    /// Keyed by (fund code, pub date).
    AssetComposition(&'a AssetComposition),
}

/// Read side of the catalog plus the entry point for transactions.
///
/// One instance is shared by every pipeline stage; readers always query it directly.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, StorageError>;

    /// Upstream codes that are unknown locally or have never been synced, in upstream order.
    async fn select_new_candidates(
        &self,
        upstream_codes: &[String],
    ) -> Result<Vec<String>, StorageError>;

    /// Synced funds whose last sync is older than `cutoff`, stalest first.
    async fn select_stale_candidates(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<String>, StorageError>;

    async fn classification_inputs(&self) -> Result<Vec<ClassificationInput>, StorageError>;

    async fn fund(&self, code: &str) -> Result<Option<CatalogFund>, StorageError>;
    async fn holdings(&self, code: &str) -> Result<Vec<Holding>, StorageError>;
    async fn managers(&self, code: &str) -> Result<Vec<ManagerAttribution>, StorageError>;
    async fn dividends(&self, code: &str) -> Result<Vec<Dividend>, StorageError>;
    async fn asset_compositions(&self, code: &str) -> Result<Vec<AssetComposition>, StorageError>;
    async fn industry_compositions(
        &self,
        code: &str,
    ) -> Result<Vec<IndustryComposition>, StorageError>;
    async fn manager_profile(&self, manager_id: &str)
        -> Result<Option<ManagerProfile>, StorageError>;
    /// Stock industry board names in stored order.
    async fn industry_list(&self) -> Result<Vec<String>, StorageError>;
}

/// Write side. Nothing is visible to readers until `commit`; dropping discards everything.
#[async_trait]
pub trait CatalogTransaction: Send {
    /// Insert or overwrite every content column. Sync metadata and the 4433 flag are untouched.
    async fn upsert_fund_record(
        &mut self,
        record: &FundRecord,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn replace_child_collection(
        &mut self,
        fund_code: &str,
        rows: ChildCollection<'_>,
    ) -> Result<(), StorageError>;

    async fn upsert_by_natural_key(
        &mut self,
        fund_code: &str,
        row: KeyedChild<'_>,
    ) -> Result<(), StorageError>;

    /// Drop manager attributions for `fund_code` other than `keep`.
    async fn retain_managers(
        &mut self,
        fund_code: &str,
        keep: Option<&str>,
    ) -> Result<(), StorageError>;

    /// `sync_version += 1`, `last_sync_time = at`.
    async fn mark_synced(&mut self, fund_code: &str, at: DateTime<Utc>) -> Result<(), StorageError>;

    async fn batch_update_flag(&mut self, codes: &[String], value: bool)
        -> Result<u64, StorageError>;

    /// Sets the flag on every fund whose code is not in `codes`.
    async fn batch_update_flag_except(
        &mut self,
        codes: &[String],
        value: bool,
    ) -> Result<u64, StorageError>;

    async fn upsert_manager_profile(
        &mut self,
        profile: &ManagerProfile,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn replace_managed_funds(
        &mut self,
        manager_id: &str,
        funds: &[ManagedFund],
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Clears the industry list and bulk-inserts `names` in order.
    async fn replace_industry_list(
        &mut self,
        names: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

/// Fixed-attempt, fixed-delay retry for a single idempotent unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: usize, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Runs `operation` until it succeeds or the attempts are used up, returning the last error.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts => {
                    debug!(label, attempt, error = %err, "attempt failed, retrying");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    /// One is picked at random for every request.
    pub user_agents: Vec<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agents: Vec<String>,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            client,
            user_agents: config.user_agents,
        })
    }

    fn pick_user_agent(&self) -> Option<&str> {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    /// Single GET with no retries; callers decide whether a failure is worth repeating.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let started = Instant::now();
        let mut request = self.client.get(url).query(query);
        if let Some(user_agent) = self.pick_user_agent() {
            request = request.header(reqwest::header::USER_AGENT, user_agent);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let body = resp.bytes().await?;
        debug!(
            url = %final_url,
            latency_ms = started.elapsed().as_millis() as u64,
            bytes = body.len(),
            "provider request finished"
        );
        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: final_url,
            source,
        })
    }
}

pub(crate) fn position(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}
