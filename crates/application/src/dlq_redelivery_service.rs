//! Background redelivery of due DLQ messages.

use std::sync::Arc;

use guardrail_core::AppResult;
use guardrail_domain::DlqMessage;
use tracing::{debug, info, warn};

use crate::dlq_ports::DlqDeliveryTransport;
use crate::dlq_service::DlqService;

/// Outcome counters for one redelivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedeliveryReport {
    /// Messages handed to the transport.
    pub attempted: usize,
    /// Deliveries that succeeded and were acked.
    pub delivered: usize,
    /// Deliveries that failed and were rescheduled.
    pub rescheduled: usize,
    /// Deliveries that failed and exhausted the retry budget.
    pub quarantined: usize,
    /// Messages whose ack or nack could not be stored.
    pub storage_errors: usize,
    /// Queues whose due messages could not be read.
    pub queue_failures: usize,
}

/// Pulls due messages from every queue and retries them through a transport.
#[derive(Clone)]
pub struct DlqRedeliveryService {
    dlq: DlqService,
    transport: Arc<dyn DlqDeliveryTransport>,
}

impl DlqRedeliveryService {
    /// Creates a redelivery service.
    #[must_use]
    pub fn new(dlq: DlqService, transport: Arc<dyn DlqDeliveryTransport>) -> Self {
        Self { dlq, transport }
    }

    /// Attempts up to `per_queue_limit` due messages in each known queue.
    ///
    /// A queue whose due messages cannot be read is logged and counted; the
    /// pass moves on to the next queue.
    pub async fn redeliver_due(
        &self,
        now: f64,
        per_queue_limit: usize,
    ) -> AppResult<RedeliveryReport> {
        let mut report = RedeliveryReport::default();
        if per_queue_limit == 0 {
            return Ok(report);
        }

        for queue in self.dlq.list_queues().await? {
            let due = match self
                .dlq
                .next_due(&queue.tenant, &queue.topic, now, per_queue_limit)
                .await
            {
                Ok(due) => due,
                Err(error) => {
                    report.queue_failures += 1;
                    warn!(
                        tenant = %queue.tenant,
                        topic = %queue.topic,
                        error = %error,
                        "failed to read due dlq messages"
                    );
                    continue;
                }
            };
            for message in due {
                report.attempted += 1;
                self.redeliver_one(&message, &mut report).await;
            }
        }

        if report.attempted > 0 || report.queue_failures > 0 {
            info!(
                attempted = report.attempted,
                delivered = report.delivered,
                rescheduled = report.rescheduled,
                quarantined = report.quarantined,
                storage_errors = report.storage_errors,
                queue_failures = report.queue_failures,
                "dlq redelivery pass finished"
            );
        }

        Ok(report)
    }

    async fn redeliver_one(&self, message: &DlqMessage, report: &mut RedeliveryReport) {
        match self.transport.deliver(message).await {
            Ok(()) => match self.dlq.ack(&message.id).await {
                Ok(_) => {
                    report.delivered += 1;
                    debug!(
                        message_id = %message.id,
                        tenant = %message.tenant,
                        "dlq message redelivered"
                    );
                }
                Err(error) => {
                    report.storage_errors += 1;
                    warn!(
                        message_id = %message.id,
                        error = %error,
                        "failed to ack redelivered dlq message"
                    );
                }
            },
            Err(delivery_error) => {
                match self.dlq.nack(&message.id, &delivery_error.to_string()).await {
                    Ok(Some(_)) => report.rescheduled += 1,
                    Ok(None) => report.quarantined += 1,
                    Err(error) => {
                        report.storage_errors += 1;
                        warn!(
                            message_id = %message.id,
                            error = %error,
                            "failed to nack dlq message"
                        );
                    }
                }
            }
        }
    }
}
