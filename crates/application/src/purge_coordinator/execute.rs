use std::collections::HashSet;

use super::*;

impl PurgeCoordinator {
    /// Purges the ids (unless dry-run), then signs and stores a receipt.
    ///
    /// Failures from the target, signer or receipt store propagate and leave
    /// no receipt behind.
    pub async fn execute(&self, input: ExecutePurgeInput) -> AppResult<PurgeReceipt> {
        let actor = NonEmptyString::new(input.actor.trim()).map_err(|_| {
            AppError::Validation("purge actor must not be empty".to_owned())
        })?;

        let started_ts = now_epoch_seconds();
        let ids = self.bounded_unique_ids(input.ids);

        let purged_count = if input.dry_run || ids.is_empty() {
            0
        } else {
            self.targets
                .target_for(input.resource)
                .purge_ids(&input.tenant, &ids)
                .await?
        };

        let receipt = PurgeReceipt::new(PurgeReceiptInput {
            tenant: input.tenant,
            resource: input.resource,
            affected_ids: ids,
            purged_count,
            started_ts,
            completed_ts: now_epoch_seconds(),
            actor: actor.into(),
            mode: input.mode,
            dry_run: input.dry_run,
            meta: self.meta.clone(),
        });
        let signature = self.signer.sign(&receipt)?;
        let stored = StoredPurgeReceipt { receipt, signature };
        self.receipts.store_receipt(&stored).await?;

        let receipt = stored.receipt;
        info!(
            tenant = %receipt.tenant(),
            resource = %receipt.resource(),
            receipt_id = %receipt.id(),
            count = receipt.count(),
            dry_run = receipt.dry_run(),
            mode = %receipt.mode(),
            actor = %receipt.actor(),
            "purge receipt recorded"
        );

        if receipt.dry_run() {
            self.record(receipt.tenant(), "purge_dry_runs", 1).await;
        } else {
            self.record(receipt.tenant(), "purge_runs", 1).await;
            self.record(receipt.tenant(), "purge_items", receipt.count())
                .await;
        }

        Ok(receipt)
    }

    fn bounded_unique_ids(&self, ids: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::with_capacity(ids.len());
        ids.into_iter()
            .filter(|id| seen.insert(id.clone()))
            .take(self.max_ids_per_run)
            .collect()
    }
}
