use async_trait::async_trait;
use guardrail_core::AppResult;
use guardrail_domain::DlqMessage;

/// Port for re-attempting one dead-lettered delivery.
#[async_trait]
pub trait DlqDeliveryTransport: Send + Sync {
    /// Delivers the message payload; any error counts as a failed attempt.
    async fn deliver(&self, message: &DlqMessage) -> AppResult<()>;
}
