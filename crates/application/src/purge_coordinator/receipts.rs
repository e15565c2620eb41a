use super::*;

impl PurgeCoordinator {
    /// Returns the tenant's most recent receipts, newest first.
    pub async fn latest_receipts(
        &self,
        tenant: &TenantId,
        limit: usize,
    ) -> AppResult<Vec<StoredPurgeReceipt>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.receipts.latest_receipts(tenant, limit).await
    }

    /// Loads one receipt with its signature.
    pub async fn get_receipt(&self, receipt_id: &str) -> AppResult<Option<StoredPurgeReceipt>> {
        self.receipts.load_receipt(receipt_id).await
    }

    /// Returns whether the stored signature still matches the stored receipt.
    ///
    /// Unknown ids verify as `false`.
    pub async fn verify_receipt(&self, receipt_id: &str) -> AppResult<bool> {
        let Some(stored) = self.receipts.load_receipt(receipt_id).await? else {
            return Ok(false);
        };

        Ok(self.signer.verify(&stored.receipt, &stored.signature))
    }
}
