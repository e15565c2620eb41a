use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use guardrail_application::PurgeTarget;
use guardrail_core::{AppError, AppResult, TenantId};

/// PostgreSQL purge target for `audit_log_entries` rows.
///
/// Rows are keyed by UUID tenant and entry ids; identifiers that are not
/// UUIDs cannot match any row and are skipped.
#[derive(Clone)]
pub struct PostgresAuditLogPurgeTarget {
    pool: PgPool,
}

impl PostgresAuditLogPurgeTarget {
    /// Creates a target with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurgeTarget for PostgresAuditLogPurgeTarget {
    async fn list_expired(
        &self,
        tenant: &TenantId,
        cutoff_ts: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let Some(tenant_uuid) = tenant_uuid(tenant) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let capped_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM audit_log_entries
            WHERE tenant_id = $1
                AND created_at <= to_timestamp($2)
            ORDER BY created_at ASC, id ASC
            LIMIT $3
            "#,
        )
        .bind(tenant_uuid)
        .bind(cutoff_ts)
        .bind(capped_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("list expired audit log entries", error))?;

        Ok(ids.into_iter().map(|id| id.to_string()).collect())
    }

    async fn purge_ids(&self, tenant: &TenantId, ids: &[String]) -> AppResult<u64> {
        let Some(tenant_uuid) = tenant_uuid(tenant) else {
            return Ok(0);
        };
        let entry_ids = entry_uuids(ids);
        if entry_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM audit_log_entries
            WHERE tenant_id = $1
                AND id = ANY($2)
            "#,
        )
        .bind(tenant_uuid)
        .bind(entry_ids)
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("purge audit log entries", error))?;

        Ok(result.rows_affected())
    }
}

fn tenant_uuid(tenant: &TenantId) -> Option<Uuid> {
    Uuid::parse_str(tenant.as_str()).ok()
}

fn entry_uuids(ids: &[String]) -> Vec<Uuid> {
    ids.iter()
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect()
}

/// Connection-level failures mean the database is unreachable; anything else
/// is a query or data problem.
fn database_error(action: &str, error: sqlx::Error) -> AppError {
    match error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => AppError::Unavailable(format!("failed to {action}: {error}")),
        other => AppError::Internal(format!("failed to {action}: {other}")),
    }
}
