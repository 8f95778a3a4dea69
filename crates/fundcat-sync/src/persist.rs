use chrono::{DateTime, Utc};
use fundcat_core::FundAggregate;
use fundcat_storage::{
    CatalogRepository, CatalogTransaction, ChildCollection, KeyedChild, StorageError,
};
use tracing::{debug, warn};

/// Commits one fetched fund as a unit: record, children, then the sync marker.
///
/// On any failure the transaction is rolled back and the fund keeps its previous state.
pub async fn persist_aggregate(
    catalog: &dyn CatalogRepository,
    aggregate: &FundAggregate,
    at: DateTime<Utc>,
) -> Result<(), StorageError> {
    let mut tx = catalog.begin().await?;
    let written = write_aggregate(tx.as_mut(), aggregate, at).await;
    match written {
        Ok(()) => tx.commit().await,
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(code = %aggregate.record.code, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

async fn write_aggregate(
    tx: &mut dyn CatalogTransaction,
    aggregate: &FundAggregate,
    at: DateTime<Utc>,
) -> Result<(), StorageError> {
    let code = aggregate.record.code.as_str();
    tx.upsert_fund_record(&aggregate.record, at).await?;

    for rows in [
        ChildCollection::Holdings(&aggregate.holdings),
        ChildCollection::Dividends(&aggregate.dividends),
        ChildCollection::IndustryComposition(&aggregate.industry_composition),
    ] {
        debug!(code, kind = rows.kind(), rows = rows.len(), "replacing child rows");
        tx.replace_child_collection(code, rows).await?;
    }

    if let Some(manager) = &aggregate.manager {
        tx.upsert_by_natural_key(code, KeyedChild::Manager(manager))
            .await?;
    }
    tx.retain_managers(
        code,
        aggregate.manager.as_ref().map(|m| m.manager_id.as_str()),
    )
    .await?;
    if let Some(assets) = &aggregate.asset_composition {
        tx.upsert_by_natural_key(code, KeyedChild::AssetComposition(assets))
            .await?;
    }

    tx.mark_synced(code, at).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{aggregate, FailingCatalog};
    use fundcat_core::{AssetComposition, ManagerAttribution};
    use fundcat_storage::MemoryCatalog;

    fn manager(id: &str) -> ManagerAttribution {
        ManagerAttribution {
            manager_id: id.into(),
            manager_name: format!("manager {id}"),
            working_days: Some(1000.0),
            manage_days: Some(400.0),
            manage_return: Some(12.0),
            years_avg_return: Some(4.0),
        }
    }

    #[tokio::test]
    async fn first_commit_stores_every_child_collection() {
        let catalog = MemoryCatalog::new();
        let fund = aggregate("000001", 3);
        persist_aggregate(&catalog, &fund, Utc::now())
            .await
            .expect("persist");

        let stored = catalog.fund("000001").await.expect("read").expect("fund");
        assert_eq!(stored.sync.sync_version, 1);
        assert!(stored.sync.last_update_time.is_some());
        assert_eq!(catalog.holdings("000001").await.expect("read").len(), 3);
        assert_eq!(catalog.dividends("000001").await.expect("read").len(), 1);
        assert_eq!(
            catalog.industry_compositions("000001").await.expect("read"),
            fund.industry_composition
        );
        assert_eq!(catalog.managers("000001").await.expect("read").len(), 1);
        assert_eq!(catalog.asset_compositions("000001").await.expect("read").len(), 1);
    }

    #[tokio::test]
    async fn refresh_replaces_children_and_keeps_one_current_manager() {
        let catalog = MemoryCatalog::new();
        let mut fund = aggregate("000001", 5);
        fund.manager = Some(manager("m1"));
        persist_aggregate(&catalog, &fund, Utc::now())
            .await
            .expect("first");

        fund.holdings.truncate(2);
        fund.manager = Some(manager("m2"));
        let mut next_quarter = fund.asset_composition.clone().expect("assets");
        next_quarter.pub_date = next_quarter
            .pub_date
            .succ_opt()
            .expect("next day");
        fund.asset_composition = Some(next_quarter);
        persist_aggregate(&catalog, &fund, Utc::now())
            .await
            .expect("second");

        assert_eq!(catalog.holdings("000001").await.expect("read").len(), 2);
        let managers = catalog.managers("000001").await.expect("read");
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].manager_id, "m2");
        let assets: Vec<AssetComposition> =
            catalog.asset_compositions("000001").await.expect("read");
        assert_eq!(assets.len(), 2);
        let stored = catalog.fund("000001").await.expect("read").expect("fund");
        assert_eq!(stored.sync.sync_version, 2);
    }

    #[tokio::test]
    async fn failure_between_upsert_and_holdings_keeps_previous_state() {
        let memory = MemoryCatalog::new();
        let original = aggregate("000001", 4);
        persist_aggregate(&memory, &original, Utc::now())
            .await
            .expect("seed");
        let before = memory.fund("000001").await.expect("read").expect("fund");

        let failing = FailingCatalog::new(memory.clone(), "000001");
        let mut changed = aggregate("000001", 1);
        changed.record.name = "Renamed".into();
        let err = persist_aggregate(&failing, &changed, Utc::now())
            .await
            .expect_err("injected failure");
        assert!(matches!(err, StorageError::Encode { .. }));

        let after = memory.fund("000001").await.expect("read").expect("fund");
        assert_eq!(after, before);
        assert_eq!(
            memory.holdings("000001").await.expect("read"),
            original.holdings
        );
    }
}
