use fundcat_core::{ClassificationInput, RankThresholds};
use fundcat_storage::{CatalogRepository, StorageError};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationSummary {
    pub evaluated: usize,
    pub passed: usize,
}

/// Recomputes the 4433 flag for the whole catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    thresholds: RankThresholds,
}

impl Classifier {
    pub fn new(thresholds: RankThresholds) -> Self {
        Self { thresholds }
    }

    /// Codes of the funds that pass, in input order.
    pub fn evaluate(&self, inputs: &[ClassificationInput]) -> Vec<String> {
        inputs
            .iter()
            .filter(|input| self.thresholds.passes(&input.performance))
            .map(|input| input.code.clone())
            .collect()
    }

    /// Both flag phases share one transaction and one matching snapshot, so readers never
    /// see a half-updated set. An empty match still clears every flag.
    pub async fn run(
        &self,
        catalog: &dyn CatalogRepository,
    ) -> Result<ClassificationSummary, StorageError> {
        let inputs = catalog.classification_inputs().await?;
        let matching = self.evaluate(&inputs);

        let mut tx = catalog.begin().await?;
        let marked = tx.batch_update_flag(&matching, true).await?;
        let cleared = tx.batch_update_flag_except(&matching, false).await?;
        tx.commit().await?;

        info!(
            evaluated = inputs.len(),
            passed = matching.len(),
            marked,
            cleared,
            "4433 classification updated"
        );
        Ok(ClassificationSummary {
            evaluated: inputs.len(),
            passed: matching.len(),
        })
    }
}
