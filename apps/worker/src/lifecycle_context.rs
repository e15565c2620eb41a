use std::sync::Arc;

use guardrail_application::{
    DlqPurgeTarget, DlqRedeliveryService, DlqRepository, DlqService, LifecycleMetrics,
    PurgeCoordinator, PurgeReceiptRepository, PurgeSweepService, PurgeTarget,
    PurgeTargetRegistry, RetentionStore,
};
use guardrail_core::{AppError, AppResult};
use guardrail_domain::{ReceiptMeta, RetentionResource};
use guardrail_infrastructure::{
    HttpWebhookDeliveryTransport, InMemoryDlqRepository, InMemoryLifecycleMetrics,
    InMemoryPurgeReceiptRepository, InMemoryPurgeTarget, InMemoryRetentionStore,
    PostgresAuditLogPurgeTarget, RedisDlqRepository, RedisLifecycleMetrics,
    RedisPurgeReceiptRepository, RedisRetentionStore, RedisZsetPurgeTarget, build_receipt_signer,
};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::worker_config::{LifecycleStore, WorkerConfig};

/// Storage adapters selected by `LIFECYCLE_STORE`.
struct Stores {
    dlq: Arc<dyn DlqRepository>,
    policies: Arc<dyn RetentionStore>,
    receipts: Arc<dyn PurgeReceiptRepository>,
    metrics: Arc<dyn LifecycleMetrics>,
    idempotency_keys: Arc<dyn PurgeTarget>,
    webhook_logs: Arc<dyn PurgeTarget>,
}

/// Services shared by the worker loop, built once at startup.
pub struct LifecycleContext {
    pub dlq: DlqService,
    pub coordinator: PurgeCoordinator,
    pub sweep: PurgeSweepService,
    pub redelivery: Option<DlqRedeliveryService>,
}

impl LifecycleContext {
    pub async fn build(config: &WorkerConfig) -> AppResult<Self> {
        let signer = build_receipt_signer(&config.signing)?;
        let stores = build_stores(config)?;

        let dlq = DlqService::new(stores.dlq, config.retry_policy)
            .with_metrics(stores.metrics.clone());

        let mut targets = PurgeTargetRegistry::new()
            .with_target(
                RetentionResource::DlqMsg,
                Arc::new(DlqPurgeTarget::new(dlq.clone())),
            )
            .with_target(RetentionResource::IdempKeys, stores.idempotency_keys)
            .with_target(RetentionResource::WebhookLogs, stores.webhook_logs);
        if let Some(database_url) = config.audit_database_url.as_deref() {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .map_err(|error| {
                    AppError::Unavailable(format!("failed to connect audit database: {error}"))
                })?;
            targets = targets.with_target(
                RetentionResource::Audit,
                Arc::new(PostgresAuditLogPurgeTarget::new(pool)),
            );
        } else {
            warn!("audit retention purges are disabled; set RETENTION_SQL_PURGE_ENABLED=true");
        }

        let meta = ReceiptMeta {
            host: config.host.clone(),
            instance: config.worker_id.clone(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        };
        let coordinator = PurgeCoordinator::new(
            stores.policies,
            targets,
            signer,
            stores.receipts,
            meta,
            config.max_ids_per_run,
        )
        .with_metrics(stores.metrics);

        let sweep = PurgeSweepService::new(coordinator.clone(), config.sweep_per_resource_limit)
            .with_dry_run(config.sweep_dry_run);

        let redelivery = if config.redelivery_enabled {
            let http_client = reqwest::Client::builder()
                .timeout(config.delivery_timeout)
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build webhook http client: {error}"))
                })?;
            let transport =
                HttpWebhookDeliveryTransport::new(http_client, config.delivery_timeout);
            Some(DlqRedeliveryService::new(dlq.clone(), Arc::new(transport)))
        } else {
            None
        };

        Ok(Self {
            dlq,
            coordinator,
            sweep,
            redelivery,
        })
    }
}

fn build_stores(config: &WorkerConfig) -> AppResult<Stores> {
    match &config.store {
        LifecycleStore::Redis { url } => {
            let client = redis::Client::open(url.as_str()).map_err(|error| {
                AppError::Configuration(format!("invalid REDIS_URL: {error}"))
            })?;
            let prefix = config.key_prefix.as_str();
            info!(key_prefix = prefix, "lifecycle state stored in redis");

            Ok(Stores {
                dlq: Arc::new(RedisDlqRepository::new(client.clone(), prefix)),
                policies: Arc::new(RedisRetentionStore::new(client.clone(), prefix)),
                receipts: Arc::new(RedisPurgeReceiptRepository::new(client.clone(), prefix)),
                metrics: Arc::new(RedisLifecycleMetrics::new(client.clone(), prefix)),
                idempotency_keys: Arc::new(RedisZsetPurgeTarget::idempotency_keys(
                    client.clone(),
                    prefix,
                )),
                webhook_logs: Arc::new(RedisZsetPurgeTarget::webhook_logs(client, prefix)),
            })
        }
        LifecycleStore::Memory => {
            warn!("lifecycle state is process-local and lost on restart");

            Ok(Stores {
                dlq: Arc::new(InMemoryDlqRepository::new()),
                policies: Arc::new(InMemoryRetentionStore::new()),
                receipts: Arc::new(InMemoryPurgeReceiptRepository::new()),
                metrics: Arc::new(InMemoryLifecycleMetrics::new()),
                idempotency_keys: Arc::new(InMemoryPurgeTarget::new()),
                webhook_logs: Arc::new(InMemoryPurgeTarget::new()),
            })
        }
    }
}
