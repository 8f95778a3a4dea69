use chrono::{DateTime, Utc};
use fundcat_adapters::FundProvider;
use fundcat_core::ManagerProfile;
use fundcat_storage::{CatalogRepository, StorageError};
use serde::Serialize;
use tracing::{info, warn};

use crate::telemetry::{record_sync_error, JOB_SYNC_MANAGERS};
use crate::SyncError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManagerSyncSummary {
    pub category: String,
    pub fetched: usize,
    pub saved: usize,
    pub failed: usize,
}

/// Refreshes manager profiles and their managed-fund lists, one transaction per manager.
pub async fn sync_fund_managers(
    provider: &dyn FundProvider,
    catalog: &dyn CatalogRepository,
    category: &str,
) -> Result<ManagerSyncSummary, SyncError> {
    let managers = provider
        .fetch_managers(category)
        .await
        .map_err(|source| {
            record_sync_error(JOB_SYNC_MANAGERS, "list");
            SyncError::Managers {
                category: category.to_string(),
                source,
            }
        })?;

    let mut summary = ManagerSyncSummary {
        category: category.to_string(),
        fetched: managers.len(),
        ..Default::default()
    };
    let now = Utc::now();
    for manager in &managers {
        match save_manager(catalog, manager, now).await {
            Ok(()) => summary.saved += 1,
            Err(err) => {
                warn!(manager_id = %manager.manager_id, error = %err, "saving manager failed");
                record_sync_error(JOB_SYNC_MANAGERS, "persist");
                summary.failed += 1;
            }
        }
    }
    info!(
        category,
        fetched = summary.fetched,
        saved = summary.saved,
        failed = summary.failed,
        "fund managers synced"
    );
    Ok(summary)
}

async fn save_manager(
    catalog: &dyn CatalogRepository,
    manager: &ManagerProfile,
    at: DateTime<Utc>,
) -> Result<(), StorageError> {
    let mut tx = catalog.begin().await?;
    tx.upsert_manager_profile(manager, at).await?;
    tx.replace_managed_funds(&manager.manager_id, &manager.funds, at)
        .await?;
    tx.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sync_errors;
    use crate::test_support::{manager_profile, ScriptedProvider};
    use fundcat_storage::MemoryCatalog;

    #[tokio::test]
    async fn profiles_and_fund_lists_are_replaced() {
        let catalog = MemoryCatalog::new();
        let first = ScriptedProvider::new(Vec::new())
            .with_managers(vec![manager_profile("30001", &["000001", "000002"])]);
        sync_fund_managers(&first, &catalog, "zq")
            .await
            .expect("first sync");

        let second = ScriptedProvider::new(Vec::new()).with_managers(vec![
            manager_profile("30001", &["000003"]),
            manager_profile("30002", &[]),
        ]);
        let summary = sync_fund_managers(&second, &catalog, "zq")
            .await
            .expect("second sync");
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.saved, 2);
        assert_eq!(summary.failed, 0);

        let stored = catalog
            .manager_profile("30001")
            .await
            .expect("read")
            .expect("profile");
        assert_eq!(stored.funds.len(), 1);
        assert_eq!(stored.funds[0].fund_code, "000003");
        assert!(catalog
            .manager_profile("30002")
            .await
            .expect("read")
            .is_some());
    }

    #[tokio::test]
    async fn list_fetch_failure_is_fatal_for_the_run() {
        crate::telemetry::test_recorder();
        let before = sync_errors(JOB_SYNC_MANAGERS, "list");
        let provider = ScriptedProvider::failing_universe();
        let err = sync_fund_managers(&provider, &MemoryCatalog::new(), "zq")
            .await
            .expect_err("list failure");
        assert!(matches!(err, SyncError::Managers { .. }));
        assert!(sync_errors(JOB_SYNC_MANAGERS, "list") > before);
    }
}
