//! End-to-end lifecycle flows over the in-memory adapters.

use std::sync::Arc;

use guardrail_application::{
    DlqPurgeTarget, DlqService, ExecutePurgeInput, PurgeCoordinator, PurgeSweepService,
    PurgeTargetRegistry, SWEEP_ACTOR,
};
use guardrail_core::{AppResult, TenantId, now_epoch_seconds};
use guardrail_domain::{
    DlqRetryPolicy, PurgeMode, ReceiptMeta, RetentionPolicyInput, RetentionResource,
};
use serde_json::json;

use crate::{
    HmacSigner, InMemoryDlqRepository, InMemoryLifecycleMetrics, InMemoryPurgeReceiptRepository,
    InMemoryPurgeTarget, InMemoryRetentionStore,
};

struct Lifecycle {
    dlq: DlqService,
    coordinator: PurgeCoordinator,
    idemp: Arc<InMemoryPurgeTarget>,
    metrics: Arc<InMemoryLifecycleMetrics>,
}

fn lifecycle() -> AppResult<Lifecycle> {
    let metrics = Arc::new(InMemoryLifecycleMetrics::new());
    let dlq = DlqService::new(
        Arc::new(InMemoryDlqRepository::new()),
        DlqRetryPolicy {
            jitter_frac: 0.0,
            ..DlqRetryPolicy::default()
        },
    )
    .with_metrics(metrics.clone());
    let idemp = Arc::new(InMemoryPurgeTarget::new());

    let targets = PurgeTargetRegistry::new()
        .with_target(
            RetentionResource::DlqMsg,
            Arc::new(DlqPurgeTarget::new(dlq.clone())),
        )
        .with_target(RetentionResource::IdempKeys, idemp.clone());
    let coordinator = PurgeCoordinator::new(
        Arc::new(InMemoryRetentionStore::new()),
        targets,
        Arc::new(HmacSigner::new(b"s", "k1")?),
        Arc::new(InMemoryPurgeReceiptRepository::new()),
        ReceiptMeta {
            host: "test-host".to_owned(),
            instance: "worker-test".to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        },
        1000,
    )
    .with_metrics(metrics.clone());

    Ok(Lifecycle {
        dlq,
        coordinator,
        idemp,
        metrics,
    })
}

async fn set_policy(
    coordinator: &PurgeCoordinator,
    tenant: &str,
    resource: &str,
    ttl_seconds: i64,
) -> AppResult<()> {
    coordinator
        .set_policy(RetentionPolicyInput {
            tenant: tenant.to_owned(),
            resource: resource.to_owned(),
            ttl_seconds,
            enabled: true,
        })
        .await
        .map(|_| ())
}

#[tokio::test]
async fn dlq_messages_expire_through_a_signed_purge() -> AppResult<()> {
    let lifecycle = lifecycle()?;
    let acme = TenantId::new("acme")?;
    set_policy(&lifecycle.coordinator, "acme", "dlq_msg", 60).await?;

    let mut ids = Vec::new();
    for index in 0..3 {
        let message = lifecycle
            .dlq
            .enqueue(&acme, "webhooks", json!({"n": index}), Some("503"))
            .await?;
        ids.push(message.id);
    }
    let later = now_epoch_seconds() + 120.0;

    let planned = lifecycle
        .coordinator
        .plan(&acme, RetentionResource::DlqMsg, later, 10)
        .await?;
    assert_eq!(planned.len(), 3);
    assert!(planned.iter().all(|id| ids.contains(id)));

    let dry = lifecycle
        .coordinator
        .execute(ExecutePurgeInput {
            tenant: acme.clone(),
            resource: RetentionResource::DlqMsg,
            ids: planned.clone(),
            dry_run: true,
            actor: "ops@acme".to_owned(),
            mode: PurgeMode::Manual,
        })
        .await?;
    assert_eq!((dry.count(), dry.dry_run()), (0, true));
    assert_eq!(
        lifecycle
            .coordinator
            .plan(&acme, RetentionResource::DlqMsg, later, 10)
            .await?,
        planned
    );

    let live = lifecycle
        .coordinator
        .execute(ExecutePurgeInput {
            tenant: acme.clone(),
            resource: RetentionResource::DlqMsg,
            ids: planned,
            dry_run: false,
            actor: "ops@acme".to_owned(),
            mode: PurgeMode::Manual,
        })
        .await?;
    assert_eq!(live.count(), 3);
    assert_eq!(lifecycle.dlq.queue_depth(&acme, "webhooks").await?, (0, 0));
    assert!(lifecycle.coordinator.verify_receipt(live.id()).await?);
    assert!(lifecycle.coordinator.verify_receipt(dry.id()).await?);

    let latest = lifecycle.coordinator.latest_receipts(&acme, 10).await?;
    assert_eq!(latest.len(), 2);
    assert_eq!(lifecycle.metrics.get(&acme, "dlq_enqueued").await, 3);
    assert_eq!(lifecycle.metrics.get(&acme, "purge_items").await, 3);
    Ok(())
}

#[tokio::test]
async fn sweep_only_touches_expired_items() -> AppResult<()> {
    let lifecycle = lifecycle()?;
    let acme = TenantId::new("acme")?;
    let now = 1_700_000_000.0;
    set_policy(&lifecycle.coordinator, "acme", "idemp_keys", 3600).await?;
    lifecycle.idemp.track(&acme, "old-1", now - 7200.0).await;
    lifecycle.idemp.track(&acme, "old-2", now - 3600.0).await;
    lifecycle.idemp.track(&acme, "new", now - 60.0).await;

    let report = PurgeSweepService::new(lifecycle.coordinator.clone(), 500)
        .sweep_once(now)
        .await?;

    assert_eq!(report.items_purged, 2);
    assert_eq!(lifecycle.idemp.len(&acme).await, 1);
    let latest = lifecycle.coordinator.latest_receipts(&acme, 1).await?;
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].receipt.actor(), SWEEP_ACTOR);
    assert_eq!(latest[0].receipt.ids(), ["old-1".to_owned(), "old-2".to_owned()].as_slice());
    Ok(())
}

#[tokio::test]
async fn receipts_do_not_verify_under_another_secret() -> AppResult<()> {
    let lifecycle = lifecycle()?;
    let acme = TenantId::new("acme")?;
    lifecycle.idemp.track(&acme, "k-1", 1.0).await;

    let receipt = lifecycle
        .coordinator
        .execute(ExecutePurgeInput {
            tenant: acme.clone(),
            resource: RetentionResource::IdempKeys,
            ids: vec!["k-1".to_owned()],
            dry_run: false,
            actor: "ops@acme".to_owned(),
            mode: PurgeMode::Manual,
        })
        .await?;
    let stored = lifecycle.coordinator.get_receipt(receipt.id()).await?;

    let rotated = HmacSigner::new(b"t", "k1")?;
    assert!(stored.is_some_and(|stored| {
        !guardrail_application::ReceiptSigner::verify(&rotated, &stored.receipt, &stored.signature)
    }));
    Ok(())
}
