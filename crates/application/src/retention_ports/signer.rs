use guardrail_core::AppResult;
use guardrail_domain::{PurgeReceipt, ReceiptSignature, SignatureAlgorithm};

/// Signs and verifies canonical receipt payloads.
pub trait ReceiptSigner: Send + Sync {
    /// Returns the algorithm this signer produces.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Returns the key id embedded in signatures.
    fn key_id(&self) -> &str;

    /// Signs the receipt's canonical payload.
    fn sign(&self, receipt: &PurgeReceipt) -> AppResult<ReceiptSignature>;

    /// Returns whether the signature matches the receipt.
    ///
    /// Any mismatch, including a foreign algorithm or key id, yields `false`.
    fn verify(&self, receipt: &PurgeReceipt, signature: &ReceiptSignature) -> bool;
}
