//! Guardrail lifecycle worker: periodic retention sweeps and DLQ redelivery.

mod lifecycle_context;
mod worker_config;

use guardrail_core::{AppError, now_epoch_seconds};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::lifecycle_context::LifecycleContext;
use crate::worker_config::WorkerConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let context = LifecycleContext::build(&config).await?;

    log_startup_state(&context, &config).await;

    loop {
        let now = now_epoch_seconds();

        match context.sweep.sweep_once(now).await {
            Ok(report) if report.pairs_purged > 0 || report.failures > 0 => info!(
                worker_id = %config.worker_id,
                policies_seen = report.policies_seen,
                pairs_purged = report.pairs_purged,
                items_purged = report.items_purged,
                failures = report.failures,
                "retention sweep finished"
            ),
            Ok(report) => debug!(
                worker_id = %config.worker_id,
                policies_seen = report.policies_seen,
                "retention sweep found nothing expired"
            ),
            Err(error) => warn!(
                worker_id = %config.worker_id,
                error = %error,
                "retention sweep failed"
            ),
        }

        if let Some(redelivery) = &context.redelivery {
            match redelivery.redeliver_due(now, config.redelivery_batch).await {
                Ok(report) if report.attempted > 0 || report.queue_failures > 0 => info!(
                    worker_id = %config.worker_id,
                    attempted = report.attempted,
                    delivered = report.delivered,
                    rescheduled = report.rescheduled,
                    quarantined = report.quarantined,
                    storage_errors = report.storage_errors,
                    queue_failures = report.queue_failures,
                    "dlq redelivery pass finished"
                ),
                Ok(_) => {}
                Err(error) => warn!(
                    worker_id = %config.worker_id,
                    error = %error,
                    "dlq redelivery pass failed"
                ),
            }
        }

        tokio::time::sleep(config.sweep_interval).await;
    }
}

async fn log_startup_state(context: &LifecycleContext, config: &WorkerConfig) {
    let policies = match context.coordinator.list_policies(None).await {
        Ok(policies) => policies.len(),
        Err(error) => {
            warn!(
                worker_id = %config.worker_id,
                error = %error,
                "failed to list retention policies"
            );
            0
        }
    };
    let queues = match context.dlq.list_queues().await {
        Ok(queues) => queues.len(),
        Err(error) => {
            warn!(worker_id = %config.worker_id, error = %error, "failed to list dlq queues");
            0
        }
    };

    info!(
        worker_id = %config.worker_id,
        host = %config.host,
        policies,
        queues,
        max_ids_per_run = context.coordinator.max_ids_per_run(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        sweep_dry_run = config.sweep_dry_run,
        redelivery_enabled = context.redelivery.is_some(),
        "guardrail worker started"
    );
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
