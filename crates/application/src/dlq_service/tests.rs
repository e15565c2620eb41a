use std::sync::Arc;

use guardrail_core::{AppError, AppResult, TenantId, now_epoch_seconds};
use guardrail_domain::DlqRetryPolicy;
use serde_json::json;

use crate::test_support::{FakeDlqRepository, RecordingMetrics, tenant};

use super::DlqService;

fn service_with(policy: DlqRetryPolicy) -> DlqService {
    DlqService::new(Arc::new(FakeDlqRepository::default()), policy)
}

fn no_jitter() -> DlqRetryPolicy {
    DlqRetryPolicy {
        jitter_frac: 0.0,
        ..DlqRetryPolicy::default()
    }
}

async fn nack_concurrently(
    service: &DlqService,
    message_id: &str,
    attempts: u32,
) -> AppResult<()> {
    let handles: Vec<_> = (0..attempts)
        .map(|attempt| {
            let service = service.clone();
            let message_id = message_id.to_owned();
            tokio::spawn(async move {
                service
                    .nack(&message_id, &format!("failure {attempt}"))
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle
            .await
            .map_err(|error| AppError::Internal(format!("nack task panicked: {error}")))??;
    }

    Ok(())
}

async fn scheduled_and_quarantined(
    service: &DlqService,
    tenant: &TenantId,
) -> AppResult<(Vec<u32>, Vec<u32>)> {
    let pending = service.list_pending(tenant, "webhooks", 10).await?;
    let quarantined = service.list_quarantine(tenant, "webhooks", 10).await?;

    Ok((
        pending.iter().map(|message| message.tries).collect(),
        quarantined.iter().map(|message| message.tries).collect(),
    ))
}

fn far_future() -> f64 {
    now_epoch_seconds() + 1_000_000.0
}

#[tokio::test]
async fn enqueued_message_is_due_immediately() -> AppResult<()> {
    let service = service_with(no_jitter());
    let acme = tenant("acme");

    let message = service
        .enqueue(&acme, "webhooks", json!({"url": "https://hooks.test"}), Some("503"))
        .await?;
    let due = service
        .next_due(&acme, "webhooks", message.next_attempt_ts, 10)
        .await?;

    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, message.id);
    assert_eq!(due[0].tries, 0);
    assert_eq!(due[0].last_error.as_deref(), Some("503"));
    Ok(())
}

#[tokio::test]
async fn nack_backs_off_by_documented_offsets() -> AppResult<()> {
    let service = service_with(DlqRetryPolicy {
        base_delay_sec: 5.0,
        backoff_mult: 6.0,
        max_delay_sec: 900.0,
        jitter_frac: 0.0,
        ..DlqRetryPolicy::default()
    });
    let acme = tenant("acme");
    let message = service.enqueue(&acme, "webhooks", json!({}), None).await?;

    let mut offsets = Vec::new();
    for attempt in 1..=3 {
        let updated = service
            .nack(&message.id, &format!("failure {attempt}"))
            .await?
            .unwrap_or_else(|| panic!("message should be rescheduled"));
        let attempted_at = updated.last_attempt_ts.unwrap_or_default();
        offsets.push((updated.next_attempt_ts - attempted_at).round());
        assert_eq!(updated.tries, attempt);
    }

    assert_eq!(offsets, vec![5.0, 30.0, 180.0]);
    Ok(())
}

#[tokio::test]
async fn exhausted_message_moves_to_quarantine() -> AppResult<()> {
    let service = service_with(DlqRetryPolicy {
        max_tries: 2,
        ..no_jitter()
    });
    let acme = tenant("acme");
    let message = service.enqueue(&acme, "webhooks", json!({}), None).await?;

    assert!(service.nack(&message.id, "first").await?.is_some());
    assert!(service.nack(&message.id, "second").await?.is_none());

    let due = service.next_due(&acme, "webhooks", far_future(), 10).await?;
    assert!(due.is_empty());

    let pending = service.list_pending(&acme, "webhooks", 10).await?;
    assert!(pending.is_empty());

    let quarantined = service.list_quarantine(&acme, "webhooks", 10).await?;
    assert_eq!(quarantined.len(), 1);
    assert_eq!(quarantined[0].id, message.id);
    assert_eq!(quarantined[0].tries, 2);
    assert_eq!(service.queue_depth(&acme, "webhooks").await?, (0, 1));
    Ok(())
}

#[tokio::test]
async fn ack_is_idempotent_and_tolerates_unknown_ids() -> AppResult<()> {
    let service = service_with(no_jitter());
    let acme = tenant("acme");
    let message = service.enqueue(&acme, "webhooks", json!({}), None).await?;

    assert!(!service.ack("missing").await?);
    assert!(service.ack(&message.id).await?);
    assert!(!service.ack(&message.id).await?);
    assert!(service.nack(&message.id, "late failure").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn replay_now_releases_quarantined_message() -> AppResult<()> {
    let service = service_with(DlqRetryPolicy {
        max_tries: 1,
        ..no_jitter()
    });
    let acme = tenant("acme");
    let message = service.enqueue(&acme, "webhooks", json!({}), None).await?;
    assert!(service.nack(&message.id, "boom").await?.is_none());

    let replayed = service
        .replay_now(&message.id)
        .await?
        .unwrap_or_else(|| panic!("message should exist"));
    assert_eq!(replayed.tries, 1);

    let due = service.next_due(&acme, "webhooks", far_future(), 10).await?;
    assert_eq!(due.len(), 1);
    assert!(service.list_quarantine(&acme, "webhooks", 10).await?.is_empty());
    assert!(service.replay_now("missing").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn pending_listing_is_sorted_by_next_attempt() -> AppResult<()> {
    let service = service_with(no_jitter());
    let acme = tenant("acme");
    let first = service.enqueue(&acme, "webhooks", json!({"n": 1}), None).await?;
    let second = service.enqueue(&acme, "webhooks", json!({"n": 2}), None).await?;
    service.nack(&first.id, "slow").await?;

    let pending = service.list_pending(&acme, "webhooks", 10).await?;
    let ids: Vec<&str> = pending.iter().map(|message| message.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    Ok(())
}

#[tokio::test]
async fn purge_counts_only_owned_existing_messages() -> AppResult<()> {
    let service = service_with(no_jitter());
    let acme = tenant("acme");
    let globex = tenant("globex");
    let owned = service.enqueue(&acme, "webhooks", json!({}), None).await?;
    let foreign = service.enqueue(&globex, "webhooks", json!({}), None).await?;

    let ids = vec![owned.id.clone(), foreign.id.clone(), "missing".to_owned()];
    assert_eq!(service.purge(&acme, &ids).await?, 1);
    assert_eq!(service.purge(&acme, &ids).await?, 0);
    assert_eq!(service.list_pending(&globex, "webhooks", 10).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn metrics_failures_do_not_break_transitions() -> AppResult<()> {
    let metrics = Arc::new(RecordingMetrics::failing());
    let service = service_with(no_jitter()).with_metrics(metrics);
    let acme = tenant("acme");

    let message = service.enqueue(&acme, "webhooks", json!({}), None).await?;
    assert!(service.ack(&message.id).await?);
    Ok(())
}

#[tokio::test]
async fn metrics_count_state_transitions() -> AppResult<()> {
    let metrics = Arc::new(RecordingMetrics::default());
    let service = service_with(DlqRetryPolicy {
        max_tries: 2,
        ..no_jitter()
    })
    .with_metrics(metrics.clone());
    let acme = tenant("acme");

    let message = service.enqueue(&acme, "webhooks", json!({}), None).await?;
    service.nack(&message.id, "one").await?;
    service.nack(&message.id, "two").await?;

    assert_eq!(metrics.get("dlq_enqueued").await, 1);
    assert_eq!(metrics.get("dlq_rescheduled").await, 1);
    assert_eq!(metrics.get("dlq_quarantined").await, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_nacks_count_every_failure() -> AppResult<()> {
    let service = service_with(DlqRetryPolicy {
        max_tries: 20,
        ..no_jitter()
    });
    let acme = tenant("acme");
    let message = service.enqueue(&acme, "webhooks", json!({}), None).await?;

    nack_concurrently(&service, &message.id, 8).await?;

    let (pending, quarantined) = scheduled_and_quarantined(&service, &acme).await?;
    assert_eq!(pending, vec![8]);
    assert!(quarantined.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_nacks_past_the_budget_end_in_quarantine_only() -> AppResult<()> {
    let service = service_with(DlqRetryPolicy {
        max_tries: 3,
        ..no_jitter()
    });
    let acme = tenant("acme");
    let message = service.enqueue(&acme, "webhooks", json!({}), None).await?;

    nack_concurrently(&service, &message.id, 8).await?;

    let (pending, quarantined) = scheduled_and_quarantined(&service, &acme).await?;
    assert!(pending.is_empty());
    assert_eq!(quarantined, vec![8]);
    assert!(service.next_due(&acme, "webhooks", far_future(), 10).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn purge_loads_and_deletes_in_bulk() -> AppResult<()> {
    let repository = Arc::new(FakeDlqRepository::default());
    let service = DlqService::new(repository.clone(), no_jitter());
    let acme = tenant("acme");
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(service.enqueue(&acme, "webhooks", json!({}), None).await?.id);
    }
    ids.push("missing".to_owned());

    let before = repository.record_round_trips();
    assert_eq!(service.purge(&acme, &ids).await?, 5);

    // One bulk load, one untrack for the missing id, one bulk delete.
    assert_eq!(repository.record_round_trips() - before, 3);
    assert_eq!(service.queue_depth(&acme, "webhooks").await?, (0, 0));
    Ok(())
}

#[tokio::test]
async fn blank_topic_is_rejected() {
    let service = service_with(no_jitter());
    let result = service.enqueue(&tenant("acme"), "  ", json!({}), None).await;
    assert!(result.is_err());
}
