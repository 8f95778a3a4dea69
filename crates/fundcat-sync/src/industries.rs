use chrono::Utc;
use fundcat_adapters::FundProvider;
use fundcat_storage::{CatalogRepository, StorageError};
use serde::Serialize;
use tracing::{error, info};

use crate::telemetry::{record_sync_error, JOB_SYNC_INDUSTRIES};
use crate::SyncError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndustrySyncSummary {
    pub fetched: usize,
    pub saved: usize,
}

/// Replaces the stored industry board list with the provider's current one.
///
/// The list is swapped in a single transaction, so a failed write keeps the previous list.
pub async fn sync_industry_list(
    provider: &dyn FundProvider,
    catalog: &dyn CatalogRepository,
) -> Result<IndustrySyncSummary, SyncError> {
    let names = provider.fetch_industry_list().await.map_err(|source| {
        record_sync_error(JOB_SYNC_INDUSTRIES, "list");
        SyncError::Industries { source }
    })?;

    if let Err(err) = replace_list(catalog, &names).await {
        error!(error = %err, "saving industry list rolled back");
        record_sync_error(JOB_SYNC_INDUSTRIES, "persist");
        return Err(err.into());
    }

    let summary = IndustrySyncSummary {
        fetched: names.len(),
        saved: names.len(),
    };
    info!(saved = summary.saved, "industry list synced");
    Ok(summary)
}

async fn replace_list(catalog: &dyn CatalogRepository, names: &[String]) -> Result<(), StorageError> {
    let mut tx = catalog.begin().await?;
    tx.replace_industry_list(names, Utc::now()).await?;
    tx.commit().await
}
