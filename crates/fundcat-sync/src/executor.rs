use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use fundcat_adapters::FundProvider;
use fundcat_core::is_fund_code;
use fundcat_storage::{CatalogRepository, RetryPolicy};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info_span, warn, Instrument};

use crate::persist::persist_aggregate;
use crate::telemetry::{record_sync_error, JOB_SYNC_FUND};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Persist,
    /// The refresh task panicked or was cancelled.
    Aborted,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Persist => f.write_str("persist"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// A fund that could not be refreshed this run. Recorded, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundFailure {
    pub code: String,
    pub stage: FailureStage,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchTally {
    pub success_count: usize,
    pub error_count: usize,
    /// Codes dropped by the shape check; not errors.
    pub skipped_count: usize,
    pub failures: Vec<FundFailure>,
}

impl BatchTally {
    fn record(&mut self, outcome: Result<(), FundFailure>) {
        match outcome {
            Ok(()) => self.success_count += 1,
            Err(failure) => {
                self.error_count += 1;
                self.failures.push(failure);
            }
        }
    }
}

/// Fixed pool of workers draining a shared queue of fund codes.
///
/// At most `max_concurrency` refreshes are in flight; `execute` returns once every
/// worker has joined.
#[derive(Clone)]
pub struct UpdateExecutor {
    provider: Arc<dyn FundProvider>,
    catalog: Arc<dyn CatalogRepository>,
    retry: RetryPolicy,
}

impl UpdateExecutor {
    pub fn new(
        provider: Arc<dyn FundProvider>,
        catalog: Arc<dyn CatalogRepository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            catalog,
            retry,
        }
    }

    pub async fn execute(&self, codes: Vec<String>, max_concurrency: usize) -> BatchTally {
        let mut tally = BatchTally::default();
        let mut queue = VecDeque::with_capacity(codes.len());
        for code in codes {
            if is_fund_code(&code) {
                queue.push_back(code);
            } else {
                debug!(code = %code, "skipping malformed fund code");
                tally.skipped_count += 1;
            }
        }
        if queue.is_empty() {
            return tally;
        }

        let workers = max_concurrency.max(1).min(queue.len());
        let queue = Arc::new(Mutex::new(queue));
        let tally = Arc::new(Mutex::new(tally));

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let this = self.clone();
            let queue = Arc::clone(&queue);
            let tally = Arc::clone(&tally);
            pool.spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(code) = next else {
                        break;
                    };
                    let outcome = this.refresh_isolated(worker, code).await;
                    tally.lock().await.record(outcome);
                }
            });
        }
        while let Some(joined) = pool.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "sync worker aborted");
            }
        }

        let mut tally = tally.lock().await;
        std::mem::take(&mut *tally)
    }

    /// Runs one refresh on its own task so a panic costs only that fund.
    async fn refresh_isolated(&self, worker: usize, code: String) -> Result<(), FundFailure> {
        let span = info_span!("fund", worker, code = %code);
        let this = self.clone();
        let unit_code = code.clone();
        let unit = tokio::spawn(
            async move { this.refresh_fund(&unit_code).await }.instrument(span),
        );
        match unit.await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(code = %code, error = %err, "fund refresh aborted");
                record_sync_error(JOB_SYNC_FUND, "aborted");
                Err(FundFailure {
                    code,
                    stage: FailureStage::Aborted,
                    message: err.to_string(),
                })
            }
        }
    }

    async fn refresh_fund(&self, code: &str) -> Result<(), FundFailure> {
        let aggregate = self
            .retry
            .run(code, || self.provider.fetch_detail(code))
            .await
            .map_err(|err| {
                warn!(error = %err, "fund fetch failed after retries");
                record_sync_error(JOB_SYNC_FUND, "fetch");
                FundFailure {
                    code: code.to_string(),
                    stage: FailureStage::Fetch,
                    message: err.to_string(),
                }
            })?;

        persist_aggregate(self.catalog.as_ref(), &aggregate, Utc::now())
            .await
            .map_err(|err| {
                error!(error = %err, "fund persist rolled back");
                record_sync_error(JOB_SYNC_FUND, "persist");
                FundFailure {
                    code: code.to_string(),
                    stage: FailureStage::Persist,
                    message: err.to_string(),
                }
            })?;
        debug!(holdings = aggregate.holdings.len(), "fund refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sync_errors;
    use crate::test_support::{universe, ScriptedProvider};
    use fundcat_storage::MemoryCatalog;
    use std::time::Duration;

    fn executor(provider: Arc<ScriptedProvider>, catalog: MemoryCatalog) -> UpdateExecutor {
        UpdateExecutor::new(
            provider,
            Arc::new(catalog),
            RetryPolicy::new(3, Duration::from_millis(1)),
        )
    }

    fn codes(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{i:06}")).collect()
    }

    #[tokio::test]
    async fn in_flight_fetches_never_exceed_the_limit() {
        for limit in [1, 3, 5] {
            let provider =
                Arc::new(ScriptedProvider::new(Vec::new()).with_delay(Duration::from_millis(10)));
            let catalog = MemoryCatalog::new();
            let tally = executor(provider.clone(), catalog.clone())
                .execute(codes(12), limit)
                .await;

            assert_eq!(tally.success_count, 12);
            assert_eq!(
                provider.max_in_flight(),
                limit,
                "expected exactly {limit} concurrent fetches"
            );
            assert_eq!(catalog.fund_count().await, 12);
        }
    }

    #[tokio::test]
    async fn zero_concurrency_still_makes_progress() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let tally = executor(provider.clone(), MemoryCatalog::new())
            .execute(codes(3), 0)
            .await;
        assert_eq!(tally.success_count, 3);
        assert_eq!(provider.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn malformed_codes_are_skipped_not_failed() {
        let provider = Arc::new(ScriptedProvider::new(universe(&[])));
        let tally = executor(provider.clone(), MemoryCatalog::new())
            .execute(
                vec![
                    "000001".into(),
                    "12345".into(),
                    "ABCDEF".into(),
                    "".into(),
                ],
                4,
            )
            .await;
        assert_eq!(tally.success_count, 1);
        assert_eq!(tally.error_count, 0);
        assert_eq!(tally.skipped_count, 3);
        assert_eq!(provider.fetched_codes(), vec!["000001"]);
    }

    #[tokio::test]
    async fn transient_failures_recover_within_the_retry_budget() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()).with_failures("000001", 2));
        let tally = executor(provider.clone(), MemoryCatalog::new())
            .execute(codes(1), 1)
            .await;
        assert_eq!(tally.success_count, 1);
        assert_eq!(provider.calls("000001"), 3);
    }

    #[tokio::test]
    async fn panicking_refresh_is_tallied_and_the_queue_drains() {
        crate::telemetry::test_recorder();
        let before = sync_errors(JOB_SYNC_FUND, "aborted");
        let provider = Arc::new(ScriptedProvider::new(Vec::new()).with_panic("000002"));
        let catalog = MemoryCatalog::new();
        let tally = executor(provider.clone(), catalog.clone())
            .execute(codes(4), 1)
            .await;

        assert_eq!(tally.success_count + tally.error_count + tally.skipped_count, 4);
        assert_eq!(tally.success_count, 3);
        assert_eq!(tally.error_count, 1);
        assert_eq!(tally.failures[0].code, "000002");
        assert_eq!(tally.failures[0].stage, FailureStage::Aborted);
        assert_eq!(catalog.fund_count().await, 3);
        assert!(sync_errors(JOB_SYNC_FUND, "aborted") > before);
    }

    #[tokio::test]
    async fn fetch_failures_are_counted() {
        crate::telemetry::test_recorder();
        let before = sync_errors(JOB_SYNC_FUND, "fetch");
        let provider =
            Arc::new(ScriptedProvider::new(Vec::new()).with_failures("000001", usize::MAX));
        let tally = executor(provider, MemoryCatalog::new())
            .execute(codes(1), 1)
            .await;
        assert_eq!(tally.error_count, 1);
        assert!(sync_errors(JOB_SYNC_FUND, "fetch") > before);
    }

    #[tokio::test]
    async fn empty_selection_is_a_no_op() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let tally = executor(provider.clone(), MemoryCatalog::new())
            .execute(Vec::new(), 8)
            .await;
        assert_eq!(tally, BatchTally::default());
        assert_eq!(provider.total_calls(), 0);
    }
}
