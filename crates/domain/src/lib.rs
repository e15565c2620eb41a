//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod canonical_json;
mod dlq;
mod receipt;
mod retention;

pub use canonical_json::canonical_json;
pub use dlq::{DlqMessage, DlqRetryPolicy};
pub use receipt::{
    PurgeMode, PurgeReceipt, PurgeReceiptInput, RECEIPT_ID_SAMPLE_LIMIT, ReceiptMeta,
    ReceiptSignature, SignatureAlgorithm, StoredPurgeReceipt,
};
pub use retention::{RetentionPolicy, RetentionPolicyInput, RetentionResource};
