//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod ed25519_receipt_signer;
mod hmac_receipt_signer;
mod http_webhook_delivery_transport;
mod in_memory_dlq_repository;
mod in_memory_lifecycle_metrics;
mod in_memory_purge_receipt_repository;
mod in_memory_purge_target;
mod in_memory_retention_store;
mod postgres_audit_log_purge_target;
mod receipt_signer_factory;
mod redis_dlq_repository;
mod redis_lifecycle_metrics;
mod redis_purge_receipt_repository;
mod redis_retention_store;
mod redis_support;
mod redis_zset_purge_target;

#[cfg(test)]
mod lifecycle_scenarios;

pub use ed25519_receipt_signer::Ed25519Signer;
pub use hmac_receipt_signer::HmacSigner;
pub use http_webhook_delivery_transport::HttpWebhookDeliveryTransport;
pub use in_memory_dlq_repository::InMemoryDlqRepository;
pub use in_memory_lifecycle_metrics::InMemoryLifecycleMetrics;
pub use in_memory_purge_receipt_repository::InMemoryPurgeReceiptRepository;
pub use in_memory_purge_target::InMemoryPurgeTarget;
pub use in_memory_retention_store::InMemoryRetentionStore;
pub use postgres_audit_log_purge_target::PostgresAuditLogPurgeTarget;
pub use receipt_signer_factory::{SigningSettings, build_receipt_signer};
pub use redis_dlq_repository::RedisDlqRepository;
pub use redis_lifecycle_metrics::RedisLifecycleMetrics;
pub use redis_purge_receipt_repository::RedisPurgeReceiptRepository;
pub use redis_retention_store::RedisRetentionStore;
pub use redis_zset_purge_target::RedisZsetPurgeTarget;
