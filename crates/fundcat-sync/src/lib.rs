//! Incremental catalog sync: change detection, bounded refresh, classification, scheduling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc, Weekday};
use fundcat_adapters::{EastMoneyProvider, FundProvider, ProviderError};
use fundcat_core::UniverseEntry;
use fundcat_storage::{
    CatalogRepository, HttpClientConfig, HttpFetcher, PgCatalog, RetryPolicy, StorageError,
};
use serde::Serialize;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

mod classify;
mod config;
mod executor;
mod industries;
mod managers;
mod persist;
mod telemetry;
#[cfg(test)]
mod test_support;

pub use classify::{ClassificationSummary, Classifier};
pub use config::{
    ClassifierConfig, DatabaseConfig, MetricsConfig, ProviderConfig, RunConfig, SchedulerConfig,
    SyncConfig,
};
pub use executor::{BatchTally, FailureStage, FundFailure, UpdateExecutor};
pub use industries::{sync_industry_list, IndustrySyncSummary};
pub use managers::{sync_fund_managers, ManagerSyncSummary};
pub use persist::persist_aggregate;
pub use telemetry::{install_metrics, SYNC_ERRORS_TOTAL};

use telemetry::{record_sync_error, JOB_SYNC_FUND, JOB_UPDATE_4433};

pub const CRATE_NAME: &str = "fundcat-sync";

/// Failures that abort a whole run. Per-fund problems end up in [`SyncRunSummary::failures`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetching fund universe for category {category}: {source}")]
    Universe {
        category: String,
        #[source]
        source: ProviderError,
    },
    #[error("fetching manager list for category {category}: {source}")]
    Managers {
        category: String,
        #[source]
        source: ProviderError,
    },
    #[error("fetching industry list: {source}")]
    Industries {
        #[source]
        source: ProviderError,
    },
    #[error("catalog query failed: {0}")]
    Catalog(#[from] StorageError),
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub universe_size: usize,
    pub selected: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub failures: Vec<FundFailure>,
    /// `None` when nothing was refreshed or the classifier failed.
    pub classification: Option<ClassificationSummary>,
}

/// Codes to refresh this run: every new fund in upstream order, then the stalest
/// synced funds until `batch_size` is reached.
///
/// New funds are never capped; when they alone fill the budget no stale fund is picked.
pub async fn detect_changes(
    catalog: &dyn CatalogRepository,
    upstream: &[UniverseEntry],
    max_age_days: u32,
    batch_size: usize,
    now: DateTime<Utc>,
) -> Result<Vec<String>, StorageError> {
    let upstream_codes = upstream
        .iter()
        .map(|entry| entry.code.clone())
        .collect::<Vec<_>>();
    let mut selected = catalog.select_new_candidates(&upstream_codes).await?;

    let remaining = batch_size.saturating_sub(selected.len());
    if remaining == 0 {
        return Ok(selected);
    }
    let cutoff = now - chrono::Duration::days(i64::from(max_age_days));
    let stale = catalog.select_stale_candidates(cutoff, remaining).await?;
    selected.extend(stale);
    Ok(selected)
}

#[derive(Clone)]
pub struct SyncPipeline {
    catalog: Arc<dyn CatalogRepository>,
    provider: Arc<dyn FundProvider>,
    categories: Vec<String>,
    retry: RetryPolicy,
    classifier: Classifier,
}

impl SyncPipeline {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        provider: Arc<dyn FundProvider>,
        categories: Vec<String>,
    ) -> Self {
        Self {
            catalog,
            provider,
            categories,
            retry: RetryPolicy::default(),
            classifier: Classifier::default(),
        }
    }

    pub fn from_config(
        config: &SyncConfig,
        catalog: Arc<dyn CatalogRepository>,
        provider: Arc<dyn FundProvider>,
    ) -> Self {
        Self::new(catalog, provider, config.provider.categories.clone())
            .with_retry_policy(config.sync.retry_policy())
            .with_classifier(Classifier::new(config.classifier.thresholds()))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogRepository> {
        &self.catalog
    }

    /// One full pass: universe, selection, bounded refresh, then classification.
    ///
    /// Errors only when the universe or the candidate selection cannot be read; every
    /// per-fund failure is counted in the summary instead.
    pub async fn run_incremental_sync(
        &self,
        max_age_days: u32,
        batch_size: usize,
        max_concurrency: usize,
    ) -> Result<SyncRunSummary, SyncError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("incremental_sync", %run_id);
        self.run_inner(run_id, max_age_days, batch_size, max_concurrency)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        max_age_days: u32,
        batch_size: usize,
        max_concurrency: usize,
    ) -> Result<SyncRunSummary, SyncError> {
        let started_at = Utc::now();
        info!(max_age_days, batch_size, max_concurrency, "incremental sync started");

        let upstream = self.fetch_universe().await?;
        let selected = detect_changes(
            self.catalog.as_ref(),
            &upstream,
            max_age_days,
            batch_size,
            started_at,
        )
        .await?;
        let selected_count = selected.len();
        info!(
            universe = upstream.len(),
            selected = selected_count,
            "refresh candidates selected"
        );

        let (tally, classification) = if selected.is_empty() {
            info!("catalog is up to date");
            (BatchTally::default(), None)
        } else {
            let executor = UpdateExecutor::new(
                Arc::clone(&self.provider),
                Arc::clone(&self.catalog),
                self.retry,
            );
            let tally = executor.execute(selected, max_concurrency).await;
            let classification = match self.classify().await {
                Ok(summary) => Some(summary),
                Err(err) => {
                    warn!(error = %err, "4433 classification failed; flags left as they were");
                    None
                }
            };
            (tally, classification)
        };

        info!(
            success = tally.success_count,
            error = tally.error_count,
            skipped = tally.skipped_count,
            "incremental sync finished"
        );
        Ok(SyncRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            universe_size: upstream.len(),
            selected: selected_count,
            success_count: tally.success_count,
            error_count: tally.error_count,
            skipped_count: tally.skipped_count,
            failures: tally.failures,
            classification,
        })
    }

    /// The universe list is fetched once per category with no retry.
    async fn fetch_universe(&self) -> Result<Vec<UniverseEntry>, SyncError> {
        let mut upstream = Vec::new();
        for category in &self.categories {
            let entries = self
                .provider
                .fetch_universe(category)
                .await
                .map_err(|source| {
                    record_sync_error(JOB_SYNC_FUND, "universe");
                    SyncError::Universe {
                        category: category.clone(),
                        source,
                    }
                })?;
            info!(category = %category, funds = entries.len(), "fund universe fetched");
            upstream.extend(entries);
        }
        Ok(upstream)
    }

    pub async fn classify(&self) -> Result<ClassificationSummary, StorageError> {
        let result = self.classifier.run(self.catalog.as_ref()).await;
        if result.is_err() {
            record_sync_error(JOB_UPDATE_4433, "classify");
        }
        result
    }

    pub async fn sync_managers(&self, category: &str) -> Result<ManagerSyncSummary, SyncError> {
        sync_fund_managers(self.provider.as_ref(), self.catalog.as_ref(), category).await
    }

    pub async fn sync_industries(&self) -> Result<IndustrySyncSummary, SyncError> {
        sync_industry_list(self.provider.as_ref(), self.catalog.as_ref()).await
    }
}

pub async fn connect_catalog(config: &SyncConfig) -> Result<PgCatalog> {
    PgCatalog::connect(&config.database.url, config.database.max_connections)
        .await
        .context("connecting to catalog database")
}

pub fn build_provider(config: &SyncConfig) -> Result<EastMoneyProvider> {
    let http = HttpFetcher::new(HttpClientConfig {
        timeout: Duration::from_secs(config.provider.http_timeout_secs),
        ..Default::default()
    })?;
    Ok(EastMoneyProvider::new(http, config.provider.base_url.clone())
        .with_page_size(config.provider.page_size)
        .with_industry_list_url(config.provider.industry_list_url.clone()))
}

/// Connects, applies pending migrations, and wires the live provider.
pub async fn build_pipeline(config: &SyncConfig) -> Result<SyncPipeline> {
    let catalog = connect_catalog(config).await?;
    catalog.migrate().await.context("applying migrations")?;
    let provider = build_provider(config)?;
    Ok(SyncPipeline::from_config(
        config,
        Arc::new(catalog),
        Arc::new(provider),
    ))
}

pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[derive(Debug)]
pub enum TickOutcome {
    Completed(SyncRunSummary),
    Failed(SyncError),
    SkippedOverlap,
    SkippedNonTradingDay,
}

/// Clears the overlap flag when a tick ends, including by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One scheduler job: runs the pipeline with fixed parameters, never two at once.
#[derive(Clone)]
pub struct ScheduledSync {
    pipeline: SyncPipeline,
    run: RunConfig,
    trading_days_only: bool,
    running: Arc<AtomicBool>,
}

impl ScheduledSync {
    pub fn new(pipeline: SyncPipeline, run: RunConfig, trading_days_only: bool) -> Self {
        Self {
            pipeline,
            run,
            trading_days_only,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn tick(&self, today: NaiveDate) -> TickOutcome {
        if self.trading_days_only && !is_trading_day(today) {
            info!(%today, "not a trading day; scheduled sync skipped");
            return TickOutcome::SkippedNonTradingDay;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("previous sync still running; tick skipped");
            return TickOutcome::SkippedOverlap;
        }
        let _running = RunningGuard(Arc::clone(&self.running));

        let result = self
            .pipeline
            .run_incremental_sync(
                self.run.max_age_days,
                self.run.batch_size,
                self.run.max_concurrency,
            )
            .await;

        match result {
            Ok(summary) => TickOutcome::Completed(summary),
            Err(err) => {
                warn!(error = %err, "scheduled sync aborted");
                TickOutcome::Failed(err)
            }
        }
    }
}

pub async fn maybe_build_scheduler(
    pipeline: SyncPipeline,
    config: &SyncConfig,
) -> Result<Option<JobScheduler>> {
    if !config.scheduler.enabled {
        return Ok(None);
    }

    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let scheduled = ScheduledSync::new(
        pipeline,
        config.sync.clone(),
        config.scheduler.trading_days_only,
    );
    let every = Duration::from_secs(config.scheduler.interval_secs.max(1));
    let job = Job::new_repeated_async(every, move |_uuid, _lock| {
        let scheduled = scheduled.clone();
        Box::pin(async move {
            scheduled.tick(Local::now().date_naive()).await;
        })
    })
    .with_context(|| format!("creating sync job repeating every {}s", every.as_secs()))?;
    sched.add(job).await.context("adding scheduler job")?;
    Ok(Some(sched))
}
