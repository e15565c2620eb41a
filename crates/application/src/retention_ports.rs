mod policy_store;
mod purge_target;
mod receipts;
mod signer;

pub use policy_store::RetentionStore;
pub use purge_target::PurgeTarget;
pub use receipts::PurgeReceiptRepository;
pub use signer::ReceiptSigner;
